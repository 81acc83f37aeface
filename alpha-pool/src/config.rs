//! Alpha pool configuration

use anyhow::Context;
use chrono::NaiveDate;
use common::{AlphaError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the pool keeps its artifacts and which evaluation it compares under
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Root directory, one subdirectory per factor
    #[serde(default = "default_root")]
    pub root: PathBuf,

    pub start: NaiveDate,
    pub end: NaiveDate,

    /// `all` or a universe preset registered with the engine
    #[serde(default = "default_universe")]
    pub universe: String,
}

fn default_root() -> PathBuf {
    PathBuf::from("alpha")
}

fn default_universe() -> String {
    "all".to_string()
}

impl PoolConfig {
    pub fn new(root: impl Into<PathBuf>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            root: root.into(),
            start,
            end,
            universe: default_universe(),
        }
    }

    pub fn with_universe(mut self, universe: &str) -> Self {
        self.universe = universe.to_string();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.start > self.end {
            return Err(AlphaError::InvalidConfig(format!(
                "pool window start {} is after end {}",
                self.start, self.end
            )));
        }
        if self.universe.is_empty() {
            return Err(AlphaError::InvalidConfig(
                "pool universe name is empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> anyhow::Result<PoolConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read pool config {}", path))?;
    let config: PoolConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Save configuration to TOML file
pub fn save_config(config: &PoolConfig, path: &str) -> anyhow::Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, m, day).unwrap()
    }

    #[test]
    fn test_minimal_file_uses_defaults() {
        let config: PoolConfig =
            toml::from_str("start = \"2021-01-04\"\nend = \"2021-12-31\"\n").unwrap();
        assert_eq!(config.root, PathBuf::from("alpha"));
        assert_eq!(config.universe, "all");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pool.toml");
        let path = path.to_str().unwrap();

        let config = PoolConfig::new("/data/alpha", d(1, 4), d(6, 30)).with_universe("hs300");
        save_config(&config, path).unwrap();
        assert_eq!(load_config(path).unwrap(), config);
    }

    #[test]
    fn test_reversed_window_is_rejected() {
        let config = PoolConfig::new("alpha", d(6, 30), d(1, 4));
        assert!(matches!(config.validate(), Err(AlphaError::InvalidConfig(_))));
    }
}
