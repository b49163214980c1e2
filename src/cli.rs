//! Command-line surface.

use clap::Parser;
use ionodrive_data::{LaunchOptions, ManualGrid};
use ionodrive_io::resolve_output_dir;

const AFTER_HELP: &str = "\
The run is configured by <OUTPUT_DIRECTORY>/inputs/config.toml.
Field frames are written to <OUTPUT_DIRECTORY>, auroral frames to aurmaps/
and milestones to milestones/.

Single-dash spellings (-debug, -dryrun, -manual_grid, -workers) are accepted.";

/// Time-stepping driver for an ionospheric plasma simulation
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "ionodrive", author, version, about, long_about = None, after_help = AFTER_HELP)]
pub struct Args {
    /// Output directory holding inputs/config.toml
    pub output_directory: String,

    /// Verbose diagnostics
    #[arg(short, long)]
    pub debug: bool,

    /// Run a single time step and write nothing
    #[arg(long)]
    pub dryrun: bool,

    /// Force the process grid: workers along x2 and along x3
    #[arg(long = "manual-grid", num_args = 2, value_names = ["LID2", "LID3"])]
    pub manual_grid: Option<Vec<usize>>,

    /// Number of workers in the group
    #[arg(short, long, default_value_t = 1)]
    pub workers: usize,
}

impl Args {
    #[must_use]
    pub fn manual_grid(&self) -> Option<ManualGrid> {
        match self.manual_grid.as_deref() {
            Some(&[lid2, lid3]) => Some(ManualGrid { lid2, lid3 }),
            _ => None,
        }
    }

    /// Checks the output directory and builds the launch options.
    pub fn launch_options(&self) -> ionodrive_io::Result<LaunchOptions> {
        Ok(LaunchOptions {
            out_dir: resolve_output_dir(&self.output_directory)?,
            debug: self.debug,
            dryrun: self.dryrun,
            manual_grid: self.manual_grid(),
        })
    }
}

/// Rewrites single-dash long flags into their `--` form.
pub fn normalize_legacy_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    args.into_iter()
        .map(|arg| match arg.as_str() {
            "-debug" => "--debug".to_string(),
            "-dryrun" => "--dryrun".to_string(),
            "-help" => "--help".to_string(),
            "-manual_grid" | "--manual_grid" => "--manual-grid".to_string(),
            "-workers" => "--workers".to_string(),
            _ => arg,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        let argv = std::iter::once("ionodrive")
            .chain(args.iter().copied())
            .map(String::from);
        Args::try_parse_from(normalize_legacy_args(argv))
    }

    #[test]
    fn test_positional_directory() {
        let args = parse(&["/tmp/run"]).unwrap();
        assert_eq!(args.output_directory, "/tmp/run");
        assert!(!args.debug);
        assert!(!args.dryrun);
        assert_eq!(args.manual_grid(), None);
        assert_eq!(args.workers, 1);
    }

    #[test]
    fn test_legacy_flags() {
        let args = parse(&["/tmp/run", "-debug", "-dryrun", "-manual_grid", "2", "3"]).unwrap();
        assert!(args.debug);
        assert!(args.dryrun);
        assert_eq!(args.manual_grid(), Some(ManualGrid { lid2: 2, lid3: 3 }));
    }

    #[test]
    fn test_manual_grid_needs_two_values() {
        assert!(parse(&["/tmp/run", "--manual-grid", "2"]).is_err());
    }

    #[test]
    fn test_missing_directory_is_usage_error() {
        let err = parse(&[]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_help_flag() {
        let err = parse(&["-help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
        assert!(err.to_string().contains("inputs/config.toml"));
    }

    #[test]
    fn test_workers_flag() {
        let args = parse(&["-workers", "4", "/tmp/run"]).unwrap();
        assert_eq!(args.workers, 4);
    }
}
