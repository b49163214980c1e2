//! # Ionodrive Core
//!
//! The time-stepping driver of a distributed ionospheric plasma simulation.
//!
//! This crate sequences a run; it does not solve the physics. It contains:
//! - Process-grid resolution and per-worker subdomains
//! - The ordered one-time initialization of the input subsystems
//! - The control loop: step selection, subsystem calls, cadence-gated output
//! - Collective operations and failure agreement across workers
//! - Ownership and release of the field buffers
//! - Reference collaborators for self-contained runs
//!
//! ## Example
//!
//! ```
//! use ionodrive_core::builtin::NullOutput;
//! use ionodrive_core::comm::SerialComm;
//! use ionodrive_core::{run_worker, Subsystems};
//! use ionodrive_data::{BaseConfig, GridSettings, LaunchOptions, SimulationConfig};
//!
//! let mut config = SimulationConfig::new(
//!     LaunchOptions::default(),
//!     BaseConfig::new([2023, 5, 1], 0.0, 60.0, 30.0),
//! );
//! config.grid = GridSettings { lx1: 8, lx2all: 2, lx3all: 2, lsp: 3, ..GridSettings::default() };
//! let mut subsystems = Subsystems::builtin(&config, Box::new(NullOutput::default()));
//! let summary = run_worker(&config, &mut SerialComm, &mut subsystems).unwrap();
//! assert!(summary.clock.t >= 60.0);
//! ```

/// Reference implementations of every collaborator
pub mod builtin;
/// Cadence gates for neutral updates and output
pub mod cadence;
/// Collaborator traits and the records passed through them
pub mod collaborators;
/// Worker group collectives and failure agreement
pub mod comm;
/// The per-iteration control loop
pub mod controller;
/// One worker's lifecycle from startup to release
pub mod driver;
/// Error taxonomy
pub mod error;
/// Non-finite value detection
pub mod finite;
/// Ordered input initialization
pub mod initializers;
/// Run metrics and structured logging
pub mod metrics;
/// Field buffer ownership
pub mod store;
/// Process-grid resolution
pub mod topology;

pub use cadence::{CadenceGate, CadenceKind, CadenceSchedule, Trigger};
pub use collaborators::Subsystems;
pub use comm::{ChannelComm, Communicator, SerialComm};
pub use controller::{Phase, RunSummary, StepReport, Termination, TimeStepController};
pub use driver::{run_worker, run_worker_with};
pub use error::{DriverError, DriverResult};
pub use metrics::{init_logging, RunMetrics};
