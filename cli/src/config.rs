use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;
use std::time::Duration;

use larder_core::db::DEFAULT_BUSY_TIMEOUT;

pub const DB_ENV: &str = "LARDER_DB";
pub const BUSY_TIMEOUT_ENV: &str = "LARDER_BUSY_TIMEOUT_MS";

pub struct Config {
    pub db_path: PathBuf,
    pub busy_timeout: Duration,
}

impl Config {
    /// Resolve the database location: `--db` flag, then `LARDER_DB`, then
    /// the platform data directory.
    pub fn load(db_flag: Option<PathBuf>) -> Result<Self> {
        Self::resolve(
            db_flag,
            std::env::var(DB_ENV).ok(),
            std::env::var(BUSY_TIMEOUT_ENV).ok(),
            default_data_dir,
        )
    }

    fn resolve(
        db_flag: Option<PathBuf>,
        db_env: Option<String>,
        busy_timeout_env: Option<String>,
        data_dir: impl FnOnce() -> Result<PathBuf>,
    ) -> Result<Self> {
        let db_path = match db_flag.or_else(|| db_env.filter(|s| !s.is_empty()).map(PathBuf::from))
        {
            Some(path) => path,
            None => {
                let data_dir = data_dir()?;
                std::fs::create_dir_all(&data_dir).with_context(|| {
                    format!("Failed to create data directory: {}", data_dir.display())
                })?;
                data_dir.join("larder.db")
            }
        };

        let busy_timeout = match busy_timeout_env {
            Some(ms) => Duration::from_millis(ms.trim().parse().with_context(|| {
                format!("Invalid {BUSY_TIMEOUT_ENV} '{ms}'. Use a number of milliseconds")
            })?),
            None => DEFAULT_BUSY_TIMEOUT,
        };

        Ok(Config {
            db_path,
            busy_timeout,
        })
    }
}

fn default_data_dir() -> Result<PathBuf> {
    let proj_dirs =
        ProjectDirs::from("", "", "larder").context("Could not determine home directory")?;
    Ok(proj_dirs.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_dir() -> Result<PathBuf> {
        anyhow::bail!("data dir should not be consulted")
    }

    #[test]
    fn test_flag_wins_over_env() {
        let config = Config::resolve(
            Some(PathBuf::from("/tmp/flag.db")),
            Some("/tmp/env.db".into()),
            None,
            no_dir,
        )
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/flag.db"));
        assert_eq!(config.busy_timeout, DEFAULT_BUSY_TIMEOUT);
    }

    #[test]
    fn test_env_used_without_flag() {
        let config = Config::resolve(None, Some("/tmp/env.db".into()), None, no_dir).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/env.db"));
    }

    #[test]
    fn test_falls_back_to_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("nested").join("larder");
        let expected = data_dir.clone();
        let config = Config::resolve(None, Some(String::new()), None, move || Ok(data_dir)).unwrap();
        assert_eq!(config.db_path, expected.join("larder.db"));
        assert!(expected.is_dir());
    }

    #[test]
    fn test_busy_timeout_env() {
        let config =
            Config::resolve(Some("x.db".into()), None, Some("250".into()), no_dir).unwrap();
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
        assert!(Config::resolve(Some("x.db".into()), None, Some("soon".into()), no_dir).is_err());
    }
}
