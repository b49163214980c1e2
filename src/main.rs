use clap::Parser;
use ionodrive_core::init_logging;
use ionodrive_lib::{launch, normalize_legacy_args, Args};
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = Args::parse_from(normalize_legacy_args(std::env::args()));
    init_logging(args.debug);

    match launch(&args) {
        Ok(summary) => {
            tracing::info!(
                iterations = summary.iterations,
                t = summary.clock.t,
                field_outputs = summary.field_outputs,
                "Run complete"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "Run failed");
            eprintln!("ionodrive: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
