//! The time-stepping control loop.
//!
//! One iteration:
//! 1. step-size selection, reduced to the group minimum
//! 2. neutral background update, when its gate is due (never on iteration 1)
//! 3. neutral perturbations, every iteration while enabled
//! 4. electrodynamics solve
//! 5. fluid advance
//! 6. finiteness check
//! 7. clock advance and calendar increment
//! 8. dry-run stop
//! 9. field, aux and milestone output, each on its own cadence
//!
//! Every worker executes the same sequence. Local failures are voted on at
//! fixed points (after selection, after the physics calls, after the
//! finiteness scan, after output) so all workers leave the loop together.

use crate::cadence::{CadenceKind, CadenceSchedule};
use crate::collaborators::{FluidStep, OutputRecord, StepContext, StepRequest, Subsystems};
use crate::comm::{agree, Communicator};
use crate::error::{DriverError, DriverResult};
use crate::finite;
use crate::metrics::RunMetrics;
use ionodrive_data::{
    CadenceState, DriftField, FieldBuffers, OutputMode, SimulationClock, SimulationConfig,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Where the controller is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Stepping,
    Finalizing,
}

/// Loop parameters fixed for the whole run.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopSettings {
    pub duration: f64,
    pub dryrun: bool,
    pub perturb: bool,
    pub tcfl: f64,
    pub output_mode: OutputMode,
    pub species: usize,
    pub update_cadence: u64,
}

impl LoopSettings {
    #[must_use]
    pub fn from_config(config: &SimulationConfig, species: usize, duration: f64) -> Self {
        Self {
            duration,
            dryrun: config.dryrun,
            perturb: config.neutral.perturb,
            tcfl: config.base.tcfl,
            output_mode: config.output.mode,
            species,
            update_cadence: config.diagnostics.update_cadence.max(1),
        }
    }
}

/// What happened during one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StepReport {
    /// Iteration number that ran.
    pub it: u64,
    /// Simulated time after the iteration.
    pub t: f64,
    pub dt: f64,
    pub neutral_background: bool,
    pub perturbed: bool,
    pub field_output: bool,
    pub aux_output: bool,
    pub milestone: bool,
    /// The run stops here because it is a dry run.
    pub dry_run_stop: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    DurationReached,
    DryRun,
}

/// Outcome of a completed loop.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Completed iterations.
    pub iterations: u64,
    pub clock: SimulationClock,
    pub cadence: CadenceState,
    pub termination: Termination,
    pub neutral_updates: u64,
    pub field_outputs: u64,
    pub aux_outputs: u64,
    pub milestones: u64,
}

/// Borrowed state the loop works on.
pub struct LoopResources<'a> {
    pub comm: &'a mut dyn Communicator,
    pub subsystems: &'a mut Subsystems,
    pub buffers: &'a mut FieldBuffers,
    pub drift: &'a DriftField,
}

pub struct TimeStepController {
    settings: LoopSettings,
    clock: SimulationClock,
    cadence: CadenceSchedule,
    phase: Phase,
    metrics: RunMetrics,
}

impl TimeStepController {
    #[must_use]
    pub fn new(settings: LoopSettings, clock: SimulationClock, cadence: CadenceSchedule) -> Self {
        Self {
            settings,
            clock,
            cadence,
            phase: Phase::Initializing,
            metrics: RunMetrics::new(),
        }
    }

    #[must_use]
    pub fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    #[must_use]
    pub fn cadence(&self) -> &CadenceSchedule {
        &self.cadence
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    /// Steps until the duration is reached, the dry run stops, or an error.
    pub fn run(&mut self, res: &mut LoopResources<'_>) -> DriverResult<RunSummary> {
        self.phase = Phase::Stepping;
        let rank = res.comm.rank();

        let termination = loop {
            if self.clock.t >= self.settings.duration {
                break Termination::DurationReached;
            }
            match self.step(res) {
                Ok(report) if report.dry_run_stop => break Termination::DryRun,
                Ok(_) => {}
                Err(err) => {
                    self.phase = Phase::Finalizing;
                    tracing::error!(rank, it = self.clock.it, t = self.clock.t, error = %err, "Leaving time loop");
                    return Err(err);
                }
            }
        };

        self.phase = Phase::Finalizing;
        if rank == 0 {
            self.metrics.log_summary(rank);
        }
        Ok(self.summary(termination))
    }

    /// Runs one iteration.
    pub fn step(&mut self, res: &mut LoopResources<'_>) -> DriverResult<StepReport> {
        self.phase = Phase::Stepping;
        let started = Instant::now();
        let rank = res.comm.rank();
        let it = self.clock.it;
        let mut report = StepReport {
            it,
            ..StepReport::default()
        };

        let dt = self.select_step(res)?;
        self.clock.set_step(dt);
        report.dt = dt;
        tracing::debug!(rank, it, dt, "Selected time step");

        let physics = self.update_physics(res, &mut report);
        agree(res.comm, physics, "physics update")?;

        self.check_finite(res)?;

        self.clock.advance();
        report.t = self.clock.t;
        if rank == 0 && it % self.settings.update_cadence == 0 {
            let [year, month, day] = self.clock.time.ymd();
            tracing::info!(
                it,
                year,
                month,
                day,
                ut_sec = self.clock.time.ut_sec(),
                t = self.clock.t,
                dt,
                "Time step finished"
            );
        }

        if self.settings.dryrun {
            report.dry_run_stop = true;
            self.metrics.record_step(started.elapsed());
            if rank == 0 {
                tracing::info!("Dry run complete, stopping after one iteration");
            }
            return Ok(report);
        }

        let outputs = self.write_due_outputs(res, &mut report);
        agree(res.comm, outputs, "file output")?;
        tracing::debug!(rank, cadence = ?self.cadence.state(), "Output cadence");

        self.metrics.record_step(started.elapsed());
        Ok(report)
    }

    fn context(&self) -> StepContext {
        StepContext {
            it: self.clock.it,
            t: self.clock.t,
            dt: self.clock.dt,
            time: self.clock.time,
        }
    }

    fn select_step(&mut self, res: &mut LoopResources<'_>) -> DriverResult<f64> {
        let request = StepRequest {
            it: self.clock.it,
            t: self.clock.t,
            previous_dt: self.clock.dt,
            tcfl: self.settings.tcfl,
            next_field_output: self.cadence.field_output.next_due(),
            next_aux_output: self.cadence.aux_output.next_due(),
        };

        let local = res
            .subsystems
            .selector
            .select(&request, res.buffers)
            .map_err(|source| DriverError::solver("step selection", source))
            .and_then(|selection| {
                if selection.dt.is_finite() && selection.dt > 0.0 {
                    Ok(selection.dt)
                } else {
                    Err(DriverError::solver(
                        "step selection",
                        anyhow::anyhow!("selected step {} is not positive", selection.dt),
                    ))
                }
            });

        let local_dt = agree(res.comm, local, "step selection")?;
        res.comm.all_reduce_min(local_dt)
    }

    fn update_physics(
        &mut self,
        res: &mut LoopResources<'_>,
        report: &mut StepReport,
    ) -> DriverResult<()> {
        let ctx = self.context();
        let rank = res.comm.rank();

        if !self.clock.is_first() && self.cadence.neutral_background.is_due(self.clock.t) {
            res.subsystems
                .neutrals
                .background_winds(&self.clock.time)
                .map_err(|source| DriverError::solver("neutral background winds", source))?;
            res.subsystems
                .neutrals
                .apply_winds(res.drift)
                .map_err(|source| DriverError::solver("neutral wind update", source))?;
            self.cadence.neutral_background.mark_fired();
            self.metrics.record_fire(CadenceKind::NeutralBackground);
            report.neutral_background = true;
            tracing::debug!(rank, it = ctx.it, next_due = ?self.cadence.neutral_background.next_due(), "Computed neutral background");
        }

        if self.settings.perturb {
            res.subsystems
                .neutrals
                .perturb(&ctx, res.drift)
                .map_err(|source| DriverError::solver("neutral perturbations", source))?;
            self.metrics.record_perturbation();
            report.perturbed = true;
            tracing::debug!(rank, it = ctx.it, "Computed neutral perturbations");
        }

        res.subsystems
            .electrodynamics
            .solve(&ctx, res.buffers)
            .map_err(|source| DriverError::solver("electrodynamics", source))?;
        tracing::debug!(rank, it = ctx.it, "Computed electrodynamics solution");

        let fluid = FluidStep {
            ctx,
            first: self.clock.is_first(),
            species: self.settings.species,
            rank,
        };
        res.subsystems
            .fluid
            .advance(&fluid, res.buffers)
            .map_err(|source| DriverError::solver("fluid advance", source))?;
        tracing::debug!(rank, it = ctx.it, "Computed fluid update");

        Ok(())
    }

    fn check_finite(&self, res: &mut LoopResources<'_>) -> DriverResult<()> {
        let local = finite::first_non_finite(res.buffers);
        let diverged = res.comm.all_reduce_any(local.is_some())?;
        let detail = match local {
            Some(found) => found.to_string(),
            None if diverged => "non-finite state reported by another worker".to_string(),
            None => return Ok(()),
        };
        Err(DriverError::NumericalDivergence {
            it: self.clock.it,
            t: self.clock.t,
            detail,
        })
    }

    fn write_due_outputs(
        &mut self,
        res: &mut LoopResources<'_>,
        report: &mut StepReport,
    ) -> DriverResult<()> {
        let t = self.clock.t;
        let record = OutputRecord {
            it: report.it,
            t,
            time: self.clock.time,
            mode: self.settings.output_mode,
            rank: res.comm.rank(),
        };

        if self.cadence.field_output.is_due(t) {
            res.subsystems
                .output
                .write_field(&record, res.buffers)
                .map_err(|source| DriverError::output("field output", source))?;
            self.cadence.field_output.mark_fired();
            self.metrics.record_fire(CadenceKind::FieldOutput);
            report.field_output = true;
        }

        if self.cadence.aux_output.is_due(t) {
            res.subsystems
                .output
                .write_aux(&record, res.buffers)
                .map_err(|source| DriverError::output("aux output", source))?;
            self.cadence.aux_output.mark_fired();
            self.metrics.record_fire(CadenceKind::AuxOutput);
            report.aux_output = true;
        }

        if self.cadence.milestone.is_due(t) {
            res.subsystems
                .output
                .write_milestone(&record, res.buffers)
                .map_err(|source| DriverError::output("milestone output", source))?;
            self.cadence.milestone.mark_fired();
            self.metrics.record_fire(CadenceKind::Milestone);
            report.milestone = true;
        }

        Ok(())
    }

    fn summary(&self, termination: Termination) -> RunSummary {
        RunSummary {
            iterations: self.metrics.iterations(),
            clock: self.clock,
            cadence: self.cadence.state(),
            termination,
            neutral_updates: self.metrics.fired(CadenceKind::NeutralBackground),
            field_outputs: self.metrics.fired(CadenceKind::FieldOutput),
            aux_outputs: self.metrics.fired(CadenceKind::AuxOutput),
            milestones: self.metrics.fired(CadenceKind::Milestone),
        }
    }
}
