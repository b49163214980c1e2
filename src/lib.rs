//! # Ionodrive
//!
//! Command-line front end for the ionospheric simulation driver.
//!
//! The work happens in the member crates:
//! - `ionodrive_data`: configuration, clock, cadence and buffer types
//! - `ionodrive_core`: the lifecycle, the time-step controller and built-in physics
//! - `ionodrive_io`: config loading and output frames
//!
//! This crate parses the command line and runs a worker group.

pub mod cli;
pub mod launch;

pub use cli::{normalize_legacy_args, Args};
pub use launch::{launch, run_group, run_group_with, run_workers};
