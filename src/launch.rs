//! Runs a worker group to completion.
//!
//! Each worker is a thread owning its [`Subsystems`]; the group talks
//! through [`ChannelComm`]. A single worker runs on the calling thread.

use crate::cli::Args;
use ionodrive_core::builtin::NullOutput;
use ionodrive_core::{
    run_worker, ChannelComm, Communicator, DriverError, DriverResult, RunSummary, SerialComm,
    Subsystems,
};
use ionodrive_data::SimulationConfig;
use ionodrive_io::{fingerprint, load_run_config, write_run_summary, FileOutputWriter};
use std::thread;
use tracing::info;
use uuid::Uuid;

/// Resolves the launch, runs the group and writes the run summary.
pub fn launch(args: &Args) -> DriverResult<RunSummary> {
    if args.workers == 0 {
        return Err(DriverError::config("-workers must be at least 1"));
    }
    let config = load_run_config(args.launch_options()?)?;
    let fingerprint =
        fingerprint(&config).map_err(|e| DriverError::config(format!("fingerprint: {e}")))?;
    let run_id = Uuid::new_v4();
    info!(
        %run_id,
        out_dir = %config.out_dir.display(),
        workers = args.workers,
        dryrun = config.dryrun,
        "Launching run"
    );

    let summary = run_group_with(&config, args.workers, |_rank| {
        let writer = FileOutputWriter::new(&config.out_dir, run_id, fingerprint.clone());
        Subsystems::builtin(&config, Box::new(writer))
    })?;

    if !config.dryrun {
        let path = write_run_summary(&config.out_dir, run_id, &summary)?;
        info!(path = %path.display(), "Wrote run summary");
    }
    Ok(summary)
}

/// Runs the built-in subsystems without writing any files.
pub fn run_group(config: &SimulationConfig, workers: usize) -> DriverResult<RunSummary> {
    run_group_with(config, workers, |_rank| {
        Subsystems::builtin(config, Box::new(NullOutput::default()))
    })
}

/// Runs `workers` workers and reduces their outcomes to one.
///
/// On success every worker holds the same summary and rank 0's is returned.
/// On failure the lowest-ranked error that is not a [`DriverError::PeerFailure`]
/// wins, since that is the worker that saw the cause.
pub fn run_group_with<F>(
    config: &SimulationConfig,
    workers: usize,
    factory: F,
) -> DriverResult<RunSummary>
where
    F: Fn(usize) -> Subsystems + Sync,
{
    let mut results = run_workers(config, workers, factory);
    if results.iter().all(Result::is_ok) {
        return results.swap_remove(0);
    }

    let mut errors: Vec<DriverError> = results.into_iter().filter_map(Result::err).collect();
    let cause = errors
        .iter()
        .position(|err| !matches!(err, DriverError::PeerFailure { .. }))
        .unwrap_or(0);
    Err(errors.swap_remove(cause))
}

/// Runs the group and returns each worker's result, indexed by rank.
pub fn run_workers<F>(
    config: &SimulationConfig,
    workers: usize,
    factory: F,
) -> Vec<DriverResult<RunSummary>>
where
    F: Fn(usize) -> Subsystems + Sync,
{
    if workers <= 1 {
        let mut subsystems = factory(0);
        return vec![run_worker(config, &mut SerialComm, &mut subsystems)];
    }

    let factory = &factory;
    thread::scope(|scope| {
        let handles: Vec<_> = ChannelComm::group(workers)
            .into_iter()
            .map(|mut comm| {
                scope.spawn(move || {
                    let mut subsystems = factory(comm.rank());
                    run_worker(config, &mut comm, &mut subsystems)
                })
            })
            .collect();

        handles
            .into_iter()
            .enumerate()
            .map(|(rank, handle)| {
                handle.join().unwrap_or_else(|_| {
                    Err(DriverError::communication(format!("worker {rank} panicked")))
                })
            })
            .collect()
    })
}
