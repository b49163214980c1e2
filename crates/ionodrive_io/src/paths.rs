//! Output-directory argument handling.

use crate::error::{IoError, Result};
use ionodrive_data::config::LMAX;
use std::path::PathBuf;

/// Expands a leading `~` to `$HOME`.
#[must_use]
pub fn expand_user(path: &str) -> PathBuf {
    let home = std::env::var_os("HOME");
    match (path.strip_prefix('~'), home) {
        (Some(""), Some(home)) => PathBuf::from(home),
        (Some(rest), Some(home)) if rest.starts_with('/') => {
            PathBuf::from(home).join(rest.trim_start_matches('/'))
        }
        _ => PathBuf::from(path),
    }
}

/// Validates the output directory named on the command line.
pub fn resolve_output_dir(arg: &str) -> Result<PathBuf> {
    if arg.trim().is_empty() {
        return Err(IoError::path("no output directory given"));
    }
    let dir = expand_user(arg);
    let len = dir.as_os_str().len();
    if len > LMAX {
        return Err(IoError::path(format!(
            "output directory path has {len} characters, the maximum is {LMAX}"
        )));
    }
    if !dir.is_dir() {
        return Err(IoError::not_found(format!(
            "output directory {}",
            dir.display()
        )));
    }
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_path_unchanged() {
        assert_eq!(expand_user("/tmp/run"), PathBuf::from("/tmp/run"));
        assert_eq!(expand_user("rel/~x"), PathBuf::from("rel/~x"));
    }

    #[test]
    fn test_tilde_expands_to_home() {
        if let Some(home) = std::env::var_os("HOME") {
            assert_eq!(expand_user("~/sim"), PathBuf::from(&home).join("sim"));
            assert_eq!(expand_user("~"), PathBuf::from(home));
        }
    }

    #[test]
    fn test_existing_directory_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve_output_dir(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(resolved, dir.path());
    }

    #[test]
    fn test_missing_directory_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = resolve_output_dir(missing.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, IoError::NotFound(_)));
    }

    #[test]
    fn test_overlong_path_rejected() {
        let long = "a".repeat(LMAX + 1);
        assert!(matches!(
            resolve_output_dir(&long),
            Err(IoError::Path(_))
        ));
        assert!(matches!(resolve_output_dir(""), Err(IoError::Path(_))));
    }
}
