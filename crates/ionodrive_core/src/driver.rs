//! One worker's run, from configuration to release.
//!
//! Startup (validation, topology, grid read) happens before any buffer
//! exists. Once allocation has been attempted, the buffers are released and
//! the neutral model is cleared on every path, success or failure.

use crate::cadence::CadenceSchedule;
use crate::collaborators::{StepContext, Subsystems};
use crate::comm::{agree, Communicator};
use crate::controller::{LoopResources, LoopSettings, RunSummary, TimeStepController};
use crate::error::{DriverError, DriverResult};
use crate::initializers::{initialize_inputs, InitializedInputs};
use crate::store::StateStore;
use crate::topology::{self, BalancedPlanner, ProcessGridPlanner};
use ionodrive_data::{
    BufferLayout, FieldBuffers, LocalTopology, SimulationClock, SimulationConfig,
};

/// Runs one worker with the default process-grid planner.
pub fn run_worker(
    config: &SimulationConfig,
    comm: &mut dyn Communicator,
    subsystems: &mut Subsystems,
) -> DriverResult<RunSummary> {
    run_worker_with(config, comm, subsystems, &BalancedPlanner)
}

/// Runs one worker through the whole lifecycle.
pub fn run_worker_with(
    config: &SimulationConfig,
    comm: &mut dyn Communicator,
    subsystems: &mut Subsystems,
    planner: &dyn ProcessGridPlanner,
) -> DriverResult<RunSummary> {
    let startup = resolve_layout(config, comm, subsystems, planner);
    let (topology, layout) = agree(comm, startup, "startup")?;

    let store = allocate(layout, comm, subsystems);
    let outcome = match store {
        Ok(mut store) => {
            let outcome = run_allocated(config, &topology, comm, subsystems, store.buffers_mut())
                .and_then(|summary| {
                    // No worker releases while a peer may still be writing.
                    comm.barrier()?;
                    Ok(summary)
                });
            store.release(subsystems.allocator.as_mut());
            outcome
        }
        Err(err) => Err(err),
    };

    subsystems.neutrals.clear_background();
    subsystems.neutrals.clear_perturbations();
    if topology.is_root() {
        match &outcome {
            Ok(summary) => tracing::info!(
                iterations = summary.iterations,
                t = summary.clock.t,
                "Simulation finished"
            ),
            Err(err) => tracing::error!(error = %err, "Simulation aborted"),
        }
    }
    outcome
}

fn resolve_layout(
    config: &SimulationConfig,
    comm: &mut dyn Communicator,
    subsystems: &mut Subsystems,
    planner: &dyn ProcessGridPlanner,
) -> DriverResult<(LocalTopology, BufferLayout)> {
    config
        .validate()
        .map_err(|err| DriverError::config(format!("{err:#}")))?;

    let global = subsystems
        .grid
        .full_grid_size()
        .map_err(|source| DriverError::input("grid size", source))?;
    let topology = topology::resolve(
        global,
        config.manual_grid,
        comm.size(),
        comm.rank(),
        planner,
    )?;
    if topology.is_root() {
        tracing::info!(
            workers = topology.workers,
            lid2 = topology.process_grid.lid2,
            lid3 = topology.process_grid.lid3,
            "Process grid established"
        );
    }

    subsystems
        .grid
        .read_grid(&topology)
        .map_err(|source| DriverError::input("grid", source))?;
    let lsp = subsystems.grid.species_count();
    if lsp == 0 {
        return Err(DriverError::input(
            "grid",
            anyhow::anyhow!("grid service reports no plasma species"),
        ));
    }
    if topology.is_root() {
        tracing::info!(
            lx1 = global.lx1,
            lx2 = global.lx2,
            lx3 = global.lx3,
            lsp,
            "Computed grid"
        );
    }
    tracing::debug!(
        rank = topology.rank,
        lx1 = topology.local.lx1,
        lx2 = topology.local.lx2,
        lx3 = topology.local.lx3,
        "Local subgrid"
    );

    let layout = BufferLayout::new(topology.local, lsp);
    if layout.checked_total_len().is_none() {
        return Err(DriverError::topology(format!(
            "local subgrid {} x {} x {} with {lsp} species is too large to allocate",
            topology.local.lx1, topology.local.lx2, topology.local.lx3
        )));
    }

    Ok((topology, layout))
}

/// Allocates on every worker. A worker whose allocation succeeded while a
/// peer's failed hands its buffers straight back.
fn allocate(
    layout: BufferLayout,
    comm: &mut dyn Communicator,
    subsystems: &mut Subsystems,
) -> DriverResult<StateStore> {
    let local = StateStore::allocate(layout, subsystems.allocator.as_mut());
    let failed = comm.all_reduce_any(local.is_err());
    match (local, failed) {
        (Ok(store), Ok(false)) => Ok(store),
        (Ok(store), Ok(true)) => {
            store.release(subsystems.allocator.as_mut());
            Err(DriverError::PeerFailure {
                stage: "allocation",
            })
        }
        (Ok(store), Err(err)) => {
            store.release(subsystems.allocator.as_mut());
            Err(err)
        }
        (Err(err), _) => Err(err),
    }
}

fn run_allocated(
    config: &SimulationConfig,
    topology: &LocalTopology,
    comm: &mut dyn Communicator,
    subsystems: &mut Subsystems,
    buffers: &mut FieldBuffers,
) -> DriverResult<RunSummary> {
    let rank = topology.rank;
    let root = topology.is_root();

    let prepared = subsystems
        .output
        .prepare(topology)
        .map_err(|source| DriverError::output("output preparation", source));
    agree(comm, prepared, "output preparation")?;

    if root {
        tracing::info!("Loading initial conditions...");
    }
    let loaded = subsystems
        .initial_state
        .load(topology, buffers)
        .map_err(|source| DriverError::input("initial state", source))
        .and_then(|initial| {
            if initial.tdur.is_finite() && initial.tdur > 0.0 {
                Ok(initial)
            } else {
                Err(DriverError::input(
                    "initial state",
                    anyhow::anyhow!("simulation duration {} is not positive", initial.tdur),
                ))
            }
        });
    let initial = agree(comm, loaded, "initial state")?;
    if root {
        let [year, month, day] = initial.time.ymd();
        tracing::info!(
            year,
            month,
            day,
            ut_sec = initial.time.ut_sec(),
            tdur = initial.tdur,
            "Initial conditions loaded"
        );
    }

    let clock = SimulationClock::start(initial.time);
    let ctx = StepContext {
        it: clock.it,
        t: clock.t,
        dt: clock.dt,
        time: clock.time,
    };
    let inputs = initialize_inputs(&ctx, rank, subsystems, buffers);
    let InitializedInputs { drift, .. } = agree(comm, inputs, "input initialization")?;
    tracing::debug!(rank, v2 = drift.v2, v3 = drift.v3, "Background grid drift");

    let drifts = subsystems
        .electrodynamics
        .initial_drifts(buffers)
        .map_err(|source| DriverError::solver("initial drifts", source));
    agree(comm, drifts, "initial drifts")?;
    if root {
        tracing::info!("Initial drifts computed, entering time loop");
    }

    let settings = LoopSettings::from_config(config, subsystems.grid.species_count(), initial.tdur);
    let cadence = CadenceSchedule::from_config(config, clock.t);
    let mut controller = TimeStepController::new(settings, clock, cadence);
    let mut resources = LoopResources {
        comm,
        subsystems,
        buffers,
        drift: &drift,
    };
    controller.run(&mut resources)
}
