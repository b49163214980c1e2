//! Run configuration from `<out_dir>/inputs/config.toml`.
//!
//! Keys are addressed as `section:key` in messages, so `base.ymd` reads as
//! `base:ymd`. Only `[base]` is required; every other section has defaults.

use crate::error::{IoError, Result};
use ionodrive_data::{
    BaseConfig, DiagnosticsConfig, EfieldSettings, GridSettings, LaunchOptions, NeutralConfig,
    OutputConfig, PrecipSettings, SimulationConfig, SolverSettings,
};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

pub const CONFIG_DIR: &str = "inputs";
pub const CONFIG_FILE: &str = "config.toml";

/// `base.ymd` as a comma-separated string or an integer array.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
enum YmdField {
    Text(String),
    List(Vec<i64>),
}

#[derive(Deserialize, Debug, Default)]
struct RawBase {
    ymd: Option<YmdField>,
    ut_sec0: Option<f64>,
    tdur: Option<f64>,
    dtout: Option<f64>,
    activ: Option<[f64; 3]>,
    tcfl: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct RawConfig {
    base: Option<RawBase>,
    output: OutputConfig,
    neutral: NeutralConfig,
    grid: GridSettings,
    efield: EfieldSettings,
    precip: PrecipSettings,
    solver: SolverSettings,
    diagnostics: DiagnosticsConfig,
}

#[must_use]
pub fn config_path(out_dir: &Path) -> PathBuf {
    out_dir.join(CONFIG_DIR).join(CONFIG_FILE)
}

fn missing(key: &str, source: &Path) -> IoError {
    IoError::config(format!("base:{key} not found in {}", source.display()))
}

/// Parses a start date such as `"2023,5,1"`.
pub fn parse_ymd(text: &str) -> Result<[i32; 3]> {
    let parts = text
        .split(',')
        .map(|part| part.trim().parse::<i32>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| {
            IoError::config(format!(
                "base:ymd must be comma-separated integers: {text:?}"
            ))
        })?;
    three(&parts, text)
}

fn three(parts: &[i32], shown: &str) -> Result<[i32; 3]> {
    match parts {
        [year, month, day] => Ok([*year, *month, *day]),
        _ => Err(IoError::config(format!(
            "base:ymd must have 3 elements: {shown}"
        ))),
    }
}

fn resolve_ymd(field: &YmdField) -> Result<[i32; 3]> {
    match field {
        YmdField::Text(text) => parse_ymd(text),
        YmdField::List(values) => {
            let shown = format!("{values:?}");
            let parts = values
                .iter()
                .map(|v| i32::try_from(*v))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|_| IoError::config(format!("base:ymd out of range: {shown}")))?;
            three(&parts, &shown)
        }
    }
}

/// Builds the run configuration from the text of a config file.
///
/// `source` only labels error messages.
pub fn parse_run_config(
    text: &str,
    launch: LaunchOptions,
    source: &Path,
) -> Result<SimulationConfig> {
    let raw: RawConfig = toml::from_str(text)
        .map_err(|e| IoError::config(format!("cannot parse {}: {e}", source.display())))?;

    let base = raw.base.unwrap_or_default();
    let ymd = resolve_ymd(base.ymd.as_ref().ok_or_else(|| missing("ymd", source))?)?;
    let ut_sec0 = base.ut_sec0.ok_or_else(|| missing("ut_sec0", source))?;
    let tdur = base.tdur.ok_or_else(|| missing("tdur", source))?;
    let dtout = base.dtout.ok_or_else(|| missing("dtout", source))?;

    let mut base_config = BaseConfig::new(ymd, ut_sec0, tdur, dtout);
    if let Some(activ) = base.activ {
        base_config.activ = activ;
    }
    if let Some(tcfl) = base.tcfl {
        base_config.tcfl = tcfl;
    }

    let mut config = SimulationConfig::new(launch, base_config);
    config.output = raw.output;
    config.neutral = raw.neutral;
    config.grid = raw.grid;
    config.efield = raw.efield;
    config.precip = raw.precip;
    config.solver = raw.solver;
    config.diagnostics = raw.diagnostics;

    config
        .validate()
        .map_err(|e| IoError::config(format!("{}: {e:#}", source.display())))?;
    Ok(config)
}

/// Reads and validates `<out_dir>/inputs/config.toml`.
pub fn load_run_config(launch: LaunchOptions) -> Result<SimulationConfig> {
    let path = config_path(&launch.out_dir);
    let text = std::fs::read_to_string(&path)
        .map_err(|e| IoError::config(format!("cannot read {}: {e}", path.display())))?;
    let config = parse_run_config(&text, launch, &path)?;
    tracing::debug!(path = %path.display(), "Loaded run configuration");
    Ok(config)
}

/// SHA-256 of the physical configuration, hex encoded.
///
/// Launch options (directory, flags, process grid) are not part of it.
pub fn fingerprint(config: &SimulationConfig) -> Result<String> {
    let physical = (
        &config.base,
        &config.output,
        &config.neutral,
        &config.grid,
        &config.efield,
        &config.precip,
        &config.solver,
    );
    let bytes = serde_json::to_vec(&physical)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[base]
ymd = "2023,5,1"
ut_sec0 = 36000.0
tdur = 300.0
dtout = 60.0
"#;

    fn parse(text: &str) -> Result<SimulationConfig> {
        parse_run_config(text, LaunchOptions::default(), Path::new("config.toml"))
    }

    #[test]
    fn test_ymd_string_parsed() {
        assert_eq!(parse_ymd("2023,5,1").unwrap(), [2023, 5, 1]);
        assert_eq!(parse_ymd(" 2023, 12 ,31 ").unwrap(), [2023, 12, 31]);
    }

    #[test]
    fn test_ymd_wrong_length_rejected() {
        let err = parse_ymd("2023,5").unwrap_err();
        assert!(err.to_string().contains("base:ymd must have 3 elements"));
        assert!(parse_ymd("2023,5,1,2").is_err());
        assert!(parse_ymd("2023,may,1").is_err());
    }

    #[test]
    fn test_minimal_config() {
        let config = parse(MINIMAL).unwrap();
        assert_eq!(config.base.ymd, [2023, 5, 1]);
        assert_eq!(config.base.tdur, 300.0);
        assert_eq!(config.base.tcfl, BaseConfig::DEFAULT_TCFL);
        assert!(!config.neutral.background);
        assert_eq!(config.grid, GridSettings::default());
    }

    #[test]
    fn test_ymd_as_integer_array() {
        let text = MINIMAL.replace("\"2023,5,1\"", "[2024, 2, 29]");
        assert_eq!(parse(&text).unwrap().base.ymd, [2024, 2, 29]);
    }

    #[test]
    fn test_missing_ymd_is_config_error() {
        let text = MINIMAL.replace("ymd = \"2023,5,1\"\n", "");
        let err = parse(&text).unwrap_err();
        assert!(matches!(err, IoError::Config(_)));
        assert!(err.to_string().contains("base:ymd not found"));
    }

    #[test]
    fn test_missing_base_section() {
        let err = parse("[output]\nmode = 1\n").unwrap_err();
        assert!(err.to_string().contains("base:ymd not found"));
    }

    #[test]
    fn test_two_element_ymd_rejected() {
        let text = MINIMAL.replace("\"2023,5,1\"", "\"2023,5\"");
        assert!(matches!(parse(&text), Err(IoError::Config(_))));
    }

    #[test]
    fn test_optional_sections() {
        let text = format!(
            "{MINIMAL}\n[output]\nmode = 3\nglow = true\ndtglowout = 30.0\nmcadence = 2\n\n[neutral]\nbackground = true\ndt_background = 900.0\n"
        );
        let config = parse(&text).unwrap();
        assert_eq!(config.output.mode, ionodrive_data::OutputMode::ElectronDensity);
        assert!(config.output.glow);
        assert_eq!(config.output.milestone_interval(60.0), Some(120.0));
        assert_eq!(config.neutral.dt_background, 900.0);
    }

    #[test]
    fn test_bad_output_mode_rejected() {
        let text = format!("{MINIMAL}\n[output]\nmode = 7\n");
        assert!(parse(&text).is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let text = MINIMAL.replace("tdur = 300.0", "tdur = -1.0");
        assert!(matches!(parse(&text), Err(IoError::Config(_))));
    }

    #[test]
    fn test_load_from_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(CONFIG_DIR)).unwrap();
        std::fs::write(config_path(dir.path()), MINIMAL).unwrap();

        let launch = LaunchOptions {
            out_dir: dir.path().to_path_buf(),
            dryrun: true,
            ..LaunchOptions::default()
        };
        let config = load_run_config(launch).unwrap();
        assert!(config.dryrun);
        assert_eq!(config.out_dir, dir.path());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let launch = LaunchOptions {
            out_dir: dir.path().to_path_buf(),
            ..LaunchOptions::default()
        };
        assert!(matches!(load_run_config(launch), Err(IoError::Config(_))));
    }

    #[test]
    fn test_fingerprint_ignores_launch_options() {
        let a = parse(MINIMAL).unwrap();
        let mut b = a.clone();
        b.dryrun = true;
        b.debug = true;
        assert_eq!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
        assert_eq!(fingerprint(&a).unwrap().len(), 64);

        b.base.tdur = 600.0;
        assert_ne!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }
}
