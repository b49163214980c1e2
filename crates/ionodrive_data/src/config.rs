//! Resolved run configuration.
//!
//! A [`SimulationConfig`] is built once at startup from the command line
//! ([`LaunchOptions`]) and the run's `inputs/config.toml`, validated, and then
//! shared read-only by every worker.
//!
//! ## Example `config.toml`
//!
//! ```toml
//! [base]
//! ymd = "2023,5,1"
//! ut_sec0 = 36000.0
//! tdur = 300.0
//! dtout = 60.0
//!
//! [output]
//! mode = 1
//! glow = false
//!
//! [neutral]
//! background = true
//! dt_background = 900.0
//! ```

use crate::topology::GridExtents;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Longest accepted output directory path, in bytes.
pub const LMAX: usize = 1000;

/// Process grid forced from the command line.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManualGrid {
    pub lid2: usize,
    pub lid3: usize,
}

/// What a field output file contains.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(try_from = "u8", into = "u8")]
pub enum OutputMode {
    /// Every fluid and electrodynamic quantity.
    #[default]
    Full,
    /// Species-averaged plasma quantities.
    Averaged,
    /// Electron density only.
    ElectronDensity,
}

impl TryFrom<u8> for OutputMode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Full),
            2 => Ok(Self::Averaged),
            3 => Ok(Self::ElectronDensity),
            other => Err(format!("output mode must be 1, 2 or 3, got {other}")),
        }
    }
}

impl From<OutputMode> for u8 {
    fn from(mode: OutputMode) -> Self {
        match mode {
            OutputMode::Full => 1,
            OutputMode::Averaged => 2,
            OutputMode::ElectronDensity => 3,
        }
    }
}

/// Options that come from the command line rather than the config file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LaunchOptions {
    pub out_dir: PathBuf,
    pub debug: bool,
    pub dryrun: bool,
    pub manual_grid: Option<ManualGrid>,
}

/// `[base]` section: start time, duration and output cadence.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BaseConfig {
    /// Start date as (year, month, day).
    pub ymd: [i32; 3],
    /// UT seconds of day at `t = 0`.
    pub ut_sec0: f64,
    /// Simulated duration in seconds.
    pub tdur: f64,
    /// Field output interval in seconds.
    pub dtout: f64,
    /// Solar/geomagnetic activity (F10.7a, F10.7, Ap).
    pub activ: [f64; 3],
    /// Target CFL number for step selection.
    pub tcfl: f64,
}

impl BaseConfig {
    #[must_use]
    pub fn new(ymd: [i32; 3], ut_sec0: f64, tdur: f64, dtout: f64) -> Self {
        Self {
            ymd,
            ut_sec0,
            tdur,
            dtout,
            activ: Self::DEFAULT_ACTIV,
            tcfl: Self::DEFAULT_TCFL,
        }
    }

    pub const DEFAULT_ACTIV: [f64; 3] = [150.0, 150.0, 4.0];
    pub const DEFAULT_TCFL: f64 = 0.9;
}

/// `[output]` section.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub mode: OutputMode,
    /// Write auxiliary (GLOW emission) output.
    pub glow: bool,
    pub dtglowout: f64,
    /// Milestone every `mcadence` field outputs; 0 disables milestones.
    pub mcadence: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            mode: OutputMode::Full,
            glow: false,
            dtglowout: 0.0,
            mcadence: 0,
        }
    }
}

impl OutputConfig {
    /// Milestone interval in seconds, if milestones are enabled.
    #[must_use]
    pub fn milestone_interval(&self, dtout: f64) -> Option<f64> {
        (self.mcadence > 0).then(|| dtout * f64::from(self.mcadence))
    }
}

/// `[neutral]` section.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct NeutralConfig {
    /// Recompute the neutral background during the run.
    pub background: bool,
    pub dt_background: f64,
    /// Apply neutral perturbations every step.
    pub perturb: bool,
    /// Cadence of the perturbation input files.
    pub dt_perturb: f64,
}

/// `[grid]` section, used by the reference grid service.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GridSettings {
    pub lx1: usize,
    pub lx2all: usize,
    pub lx3all: usize,
    /// Number of plasma species, electrons last.
    pub lsp: usize,
    pub alt_min_km: f64,
    pub alt_max_km: f64,
    pub dx2_m: f64,
    pub dx3_m: f64,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            lx1: 32,
            lx2all: 16,
            lx3all: 16,
            lsp: 7,
            alt_min_km: 80.0,
            alt_max_km: 1000.0,
            dx2_m: 10_000.0,
            dx3_m: 10_000.0,
        }
    }
}

/// `[efield]` section: uniform background field.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EfieldSettings {
    /// Background field along x2, V/m.
    pub e2_bg: f64,
    /// Background field along x3, V/m.
    pub e3_bg: f64,
    /// Magnetic field magnitude, T.
    pub b0: f64,
    /// Move the grid with the background E x B drift.
    pub lagrangian: bool,
}

impl Default for EfieldSettings {
    fn default() -> Self {
        Self {
            e2_bg: 0.0,
            e3_bg: 0.0,
            b0: 5.0e-5,
            lagrangian: false,
        }
    }
}

/// `[precip]` section.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PrecipSettings {
    /// Total energy flux, mW/m^2.
    pub q: f64,
    /// Characteristic energy, eV.
    pub e0: f64,
}

impl Default for PrecipSettings {
    fn default() -> Self {
        Self { q: 1.0, e0: 1000.0 }
    }
}

/// `[solver]` section, used by the reference solvers.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SolverSettings {
    pub dtmin: f64,
    pub dtmax: f64,
    /// Seed for the initial-state perturbation.
    pub seed: u64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            dtmin: 1.0e-6,
            dtmax: 10.0,
            seed: 42,
        }
    }
}

/// `[diagnostics]` section.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Log a progress line every this many iterations.
    pub update_cadence: u64,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self { update_cadence: 1 }
    }
}

/// Fully resolved, immutable run configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub out_dir: PathBuf,
    pub debug: bool,
    pub dryrun: bool,
    pub manual_grid: Option<ManualGrid>,
    pub base: BaseConfig,
    pub output: OutputConfig,
    pub neutral: NeutralConfig,
    pub grid: GridSettings,
    pub efield: EfieldSettings,
    pub precip: PrecipSettings,
    pub solver: SolverSettings,
    pub diagnostics: DiagnosticsConfig,
}

impl SimulationConfig {
    /// Config with default optional sections.
    #[must_use]
    pub fn new(launch: LaunchOptions, base: BaseConfig) -> Self {
        Self {
            out_dir: launch.out_dir,
            debug: launch.debug,
            dryrun: launch.dryrun,
            manual_grid: launch.manual_grid,
            base,
            output: OutputConfig::default(),
            neutral: NeutralConfig::default(),
            grid: GridSettings::default(),
            efield: EfieldSettings::default(),
            precip: PrecipSettings::default(),
            solver: SolverSettings::default(),
            diagnostics: DiagnosticsConfig::default(),
        }
    }

    /// Validates configuration values.
    ///
    /// Returns an error if any value is out of its valid range.
    pub fn validate(&self) -> anyhow::Result<()> {
        let [year, month, day] = self.base.ymd;
        anyhow::ensure!(
            month > 0
                && day > 0
                && chrono::NaiveDate::from_ymd_opt(year, month as u32, day as u32).is_some(),
            "base:ymd is not a calendar date: {year}-{month}-{day}"
        );
        anyhow::ensure!(
            self.base.ut_sec0.is_finite() && self.base.ut_sec0 >= 0.0,
            "base:ut_sec0 must be a non-negative number of seconds"
        );
        anyhow::ensure!(
            self.base.tdur.is_finite() && self.base.tdur > 0.0,
            "base:tdur must be positive"
        );
        anyhow::ensure!(
            self.base.dtout.is_finite() && self.base.dtout > 0.0,
            "base:dtout must be positive"
        );
        anyhow::ensure!(
            self.base.tcfl > 0.0 && self.base.tcfl <= 1.0,
            "base:tcfl must be in (0.0, 1.0]"
        );
        anyhow::ensure!(
            self.base.activ.iter().all(|a| a.is_finite() && *a >= 0.0),
            "base:activ values must be non-negative"
        );

        if self.output.glow {
            anyhow::ensure!(
                self.output.dtglowout > 0.0,
                "output:dtglowout must be positive when glow is enabled"
            );
        }
        if self.neutral.background {
            anyhow::ensure!(
                self.neutral.dt_background > 0.0,
                "neutral:dt_background must be positive when the background is enabled"
            );
        }
        if self.neutral.perturb {
            anyhow::ensure!(
                self.neutral.dt_perturb > 0.0,
                "neutral:dt_perturb must be positive when perturbations are enabled"
            );
        }

        if let Some(grid) = self.manual_grid {
            anyhow::ensure!(
                grid.lid2 > 0 && grid.lid3 > 0,
                "manual grid dimensions must be positive, got {} x {}",
                grid.lid2,
                grid.lid3
            );
        }

        anyhow::ensure!(
            self.grid.lx1 > 0 && self.grid.lx2all > 0 && self.grid.lx3all > 0,
            "grid extents must be positive"
        );
        anyhow::ensure!(
            GridExtents::new(self.grid.lx1, self.grid.lx2all, self.grid.lx3all)
                .checked_cells()
                .is_some(),
            "grid extents {} x {} x {} are too large",
            self.grid.lx1,
            self.grid.lx2all,
            self.grid.lx3all
        );
        anyhow::ensure!(self.grid.lsp >= 2, "grid:lsp needs at least one ion and electrons");
        anyhow::ensure!(
            self.grid.alt_max_km > self.grid.alt_min_km,
            "grid:alt_max_km must exceed grid:alt_min_km"
        );
        anyhow::ensure!(
            self.grid.dx2_m > 0.0 && self.grid.dx3_m > 0.0,
            "grid spacing must be positive"
        );
        anyhow::ensure!(self.efield.b0 > 0.0, "efield:b0 must be positive");
        anyhow::ensure!(
            self.solver.dtmin > 0.0 && self.solver.dtmax >= self.solver.dtmin,
            "solver:dtmin must be positive and not exceed solver:dtmax"
        );
        anyhow::ensure!(
            self.diagnostics.update_cadence > 0,
            "diagnostics:update_cadence must be positive"
        );

        Ok(())
    }
}
