//! # Ionodrive Data
//!
//! Plain data shared by the ionodrive crates: the resolved run configuration,
//! the simulation clock and calendar, process topology records, the field
//! buffers owned by each worker, and cadence bookkeeping.
//!
//! Nothing in this crate talks to other workers or touches the filesystem.

/// Field buffer layout and storage
pub mod buffers;
/// Next-due bookkeeping for the four cadences
pub mod cadence;
/// Simulation clock and calendar increment
pub mod clock;
/// Resolved run configuration
pub mod config;
/// Background grid drift
pub mod drift;
/// Grid extents and per-worker subdomains
pub mod topology;

pub use buffers::{BufferLayout, ElectroVar, FieldBuffers, FieldKind, FluidVar};
pub use cadence::CadenceState;
pub use clock::{CalendarTime, InitialConditions, SimulationClock};
pub use config::{
    BaseConfig, DiagnosticsConfig, EfieldSettings, GridSettings, LaunchOptions, ManualGrid,
    NeutralConfig, OutputConfig, OutputMode, PrecipSettings, SimulationConfig, SolverSettings,
};
pub use drift::DriftField;
pub use topology::{GridExtents, LocalTopology, ProcessGrid};
