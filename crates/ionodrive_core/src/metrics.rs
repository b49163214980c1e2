//! Run metrics and logging setup.
//!
//! Counts iterations and gate firings per worker and emits structured
//! progress lines through `tracing`.

use crate::cadence::CadenceKind;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Per-worker counters for one run.
#[derive(Debug)]
pub struct RunMetrics {
    iterations: u64,
    fired: HashMap<CadenceKind, u64>,
    perturbations: u64,
    slowest_step: Duration,
    start_time: Instant,
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RunMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            iterations: 0,
            fired: HashMap::new(),
            perturbations: 0,
            slowest_step: Duration::ZERO,
            start_time: Instant::now(),
        }
    }

    /// Records a completed iteration and its wall-clock duration.
    pub fn record_step(&mut self, duration: Duration) {
        self.iterations += 1;
        self.slowest_step = self.slowest_step.max(duration);
    }

    pub fn record_fire(&mut self, kind: CadenceKind) {
        *self.fired.entry(kind).or_insert(0) += 1;
    }

    pub fn record_perturbation(&mut self) {
        self.perturbations += 1;
    }

    #[must_use]
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    #[must_use]
    pub fn fired(&self, kind: CadenceKind) -> u64 {
        self.fired.get(&kind).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn perturbations(&self) -> u64 {
        self.perturbations
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Logs the end-of-run summary.
    pub fn log_summary(&self, rank: usize) {
        tracing::info!(
            rank,
            iterations = self.iterations,
            neutral_background = self.fired(CadenceKind::NeutralBackground),
            field_outputs = self.fired(CadenceKind::FieldOutput),
            aux_outputs = self.fired(CadenceKind::AuxOutput),
            milestones = self.fired(CadenceKind::Milestone),
            slowest_step_ms = self.slowest_step.as_millis() as u64,
            elapsed_ms = self.elapsed().as_millis() as u64,
            "Run summary"
        );
    }
}

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `debug` raises the default level.
pub fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing::subscriber::set_global_default(
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .finish(),
    )
    .ok();
}
