//! Explicit configuration threaded through constructors.
//!
//! Replaces any notion of process-wide mutable flags: every component that
//! needs a threshold or a tolerance takes it from a `Config` value passed in
//! at construction time.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlotConfig {
    /// Default `k` exponent used when the CLI omits `-k`.
    pub default_k: u32,
    /// Directory new plots are written into when the CLI omits a target dir.
    pub default_dir: PathBuf,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            default_k: 10,
            default_dir: default_plot_dir(),
        }
    }
}

/// `$XDG_DATA_HOME/shadowy/plots` (or platform equivalent), falling back to
/// `./plots` when the platform data directory can't be resolved.
fn default_plot_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("./data"))
        .join("shadowy")
        .join("plots")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidatorConfig {
    /// Minimum fee-equivalent value, in satoshis, enforced by `FeeValidator`.
    pub min_fee: u64,
    /// Maximum serialized `SignedTransaction` size, in bytes.
    pub max_tx_size: usize,
    /// Maximum inputs/outputs per transaction accepted by `SizeValidator`.
    pub max_io_count: usize,
    /// How far into the future `not_until`/`timestamp` may sit (seconds).
    pub max_future_skew_secs: i64,
    /// How far into the past `timestamp` may sit (seconds).
    pub max_past_skew_secs: i64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            min_fee: 1_000,
            max_tx_size: 1_000_000,
            max_io_count: 1_000,
            max_future_skew_secs: 10 * 60,
            max_past_skew_secs: 24 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub enable_console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            enable_console: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    pub plot: PlotConfig,
    pub validator: ValidatorConfig,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn from_file(path: &PathBuf) -> Result<Self, crate::error::ShadowyError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| crate::error::ShadowyError::Format(format!("config: {e}")))
    }

    pub fn to_file(&self, path: &PathBuf) -> Result<(), crate::error::ShadowyError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::ShadowyError::Format(format!("config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config_roundtrips_through_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let cfg = Config::default();
        cfg.to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn defaults_match_spec_constants() {
        let cfg = Config::default();
        assert_eq!(cfg.validator.max_future_skew_secs, 600);
        assert_eq!(cfg.validator.max_past_skew_secs, 86_400);
    }
}
