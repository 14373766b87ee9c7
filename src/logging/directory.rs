//! Log root resolution
//!
//! Precedence: explicit override > `AUTOAD_LOG_DIR` > `~/.autoad/logs`.
//! No existence check happens here; the SessionLogger creates directories
//! at scope entry, so a resolved path may not exist yet.

use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::LoggingError;

/// Environment variable overriding the default log root
pub const LOG_DIR_ENV_VAR: &str = "AUTOAD_LOG_DIR";

/// Resolve the effective log root.
///
/// An empty override or an empty environment value counts as unset.
pub fn resolve(explicit_override: Option<&Path>) -> Result<PathBuf, LoggingError> {
    if let Some(dir) = explicit_override
        && !dir.as_os_str().is_empty()
    {
        debug!(dir = %dir.display(), "resolve: using explicit log dir override");
        return Ok(dir.to_path_buf());
    }

    if let Ok(value) = env::var(LOG_DIR_ENV_VAR)
        && !value.is_empty()
    {
        debug!(%value, "resolve: using {} from environment", LOG_DIR_ENV_VAR);
        return Ok(PathBuf::from(value));
    }

    let home = dirs::home_dir().ok_or(LoggingError::HomeDirUnavailable)?;
    let default = home.join(".autoad").join("logs");
    debug!(dir = %default.display(), "resolve: using default log dir");
    Ok(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        unsafe { env::remove_var(LOG_DIR_ENV_VAR) };
    }

    #[test]
    #[serial]
    fn test_explicit_override_wins_over_env() {
        unsafe { env::set_var(LOG_DIR_ENV_VAR, "/tmp/from-env") };

        let resolved = resolve(Some(Path::new("/tmp/from-cli"))).unwrap();
        assert_eq!(resolved, PathBuf::from("/tmp/from-cli"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_var_used_without_override() {
        unsafe { env::set_var(LOG_DIR_ENV_VAR, "/tmp/from-env") };

        let resolved = resolve(None).unwrap();
        assert_eq!(resolved, PathBuf::from("/tmp/from-env"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_default_under_home() {
        clear_env();

        let resolved = resolve(None).unwrap();
        assert!(resolved.ends_with(".autoad/logs"));
    }

    #[test]
    #[serial]
    fn test_empty_override_falls_through() {
        unsafe { env::set_var(LOG_DIR_ENV_VAR, "/tmp/from-env") };

        let resolved = resolve(Some(Path::new(""))).unwrap();
        assert_eq!(resolved, PathBuf::from("/tmp/from-env"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_empty_env_falls_through_to_default() {
        unsafe { env::set_var(LOG_DIR_ENV_VAR, "") };

        let resolved = resolve(None).unwrap();
        assert!(resolved.ends_with(".autoad/logs"));

        clear_env();
    }
}
