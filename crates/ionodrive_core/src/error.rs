//! Error taxonomy for the driver.
//!
//! Startup errors ([`DriverError::Config`], [`DriverError::Topology`]) are
//! raised before any field buffer exists. Everything else is raised after
//! allocation and still passes through the release sequence.

use thiserror::Error;

/// Fatal conditions that end a run.
#[derive(Error, Debug)]
pub enum DriverError {
    /// Bad command line or run configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Process grid incompatible with the worker count or grid
    #[error("Topology error: {0}")]
    Topology(String),

    /// Missing or malformed input data during initialization
    #[error("Input error during {stage}: {source:#}")]
    Input {
        stage: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// Field buffers could not be allocated
    #[error("Allocation error: {source:#}")]
    Allocation {
        #[source]
        source: anyhow::Error,
    },

    /// Non-finite values in the state
    #[error("Numerical divergence at iteration {it} (t = {t:.6} s): {detail}")]
    NumericalDivergence { it: u64, t: f64, detail: String },

    /// A solver collaborator failed mid-run
    #[error("Solver error during {stage}: {source:#}")]
    Solver {
        stage: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// The output writer failed
    #[error("Output error during {stage}: {source:#}")]
    Output {
        stage: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// Another worker failed at a synchronisation point
    #[error("Another worker failed during {stage}")]
    PeerFailure { stage: &'static str },

    /// The worker group is broken
    #[error("Communication error: {0}")]
    Communication(String),
}

/// Result type alias for driver operations.
pub type DriverResult<T> = std::result::Result<T, DriverError>;

impl DriverError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new topology error.
    #[must_use]
    pub fn topology<S: Into<String>>(msg: S) -> Self {
        Self::Topology(msg.into())
    }

    #[must_use]
    pub fn input(stage: &'static str, source: anyhow::Error) -> Self {
        Self::Input { stage, source }
    }

    #[must_use]
    pub fn solver(stage: &'static str, source: anyhow::Error) -> Self {
        Self::Solver { stage, source }
    }

    #[must_use]
    pub fn output(stage: &'static str, source: anyhow::Error) -> Self {
        Self::Output { stage, source }
    }

    #[must_use]
    pub fn communication<S: Into<String>>(msg: S) -> Self {
        Self::Communication(msg.into())
    }

    /// True for errors raised before any state was allocated.
    #[must_use]
    pub fn is_startup(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Topology(_))
    }

    /// Process exit code for this error.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        if self.is_startup() {
            2
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DriverError::config("base:ymd not found");
        assert_eq!(err.to_string(), "Configuration error: base:ymd not found");
    }

    #[test]
    fn test_stage_in_message() {
        let err = DriverError::input("precipitation input", anyhow::anyhow!("missing file"));
        let text = err.to_string();
        assert!(text.contains("precipitation input"));
        assert!(text.contains("missing file"));
    }

    #[test]
    fn test_startup_classification() {
        assert!(DriverError::topology("3 x 2 != 4").is_startup());
        assert_eq!(DriverError::topology("x").exit_code(), 2);
        let err = DriverError::NumericalDivergence {
            it: 3,
            t: 1.0,
            detail: "NaN".into(),
        };
        assert!(!err.is_startup());
        assert_eq!(err.exit_code(), 1);
    }
}
