//! # Ionodrive IO
//!
//! File-facing layer of the driver.
//!
//! This crate provides:
//! - Structured error handling with custom error types
//! - Run-config loading from `<out_dir>/inputs/config.toml`
//! - Output-directory validation
//! - Gzip JSON output frames and the run summary

/// Run configuration loading and fingerprinting
pub mod config;
/// Error types and result aliases for I/O operations
pub mod error;
/// Output frame writer
pub mod output;
/// Output-directory validation and `~` expansion
pub mod paths;

pub use config::{fingerprint, load_run_config, parse_run_config, parse_ymd};
pub use error::{IoError, Result};
pub use output::{read_frame, write_run_summary, FileOutputWriter, Frame, FrameHeader, FrameKind};
pub use paths::{expand_user, resolve_output_dir};
