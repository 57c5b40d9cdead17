//! Configuration loading and management.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use gauge_core::{DEFAULT_SENSOR_SERVICE, OutlierConfig};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,

    /// Outlier correction thresholds for live readings.
    #[serde(default)]
    pub outlier: OutlierConfig,

    /// Service UUID advertised by compatible sensors.
    #[serde(default = "default_sensor_service")]
    pub sensor_service: Uuid,
}

const fn default_sensor_service() -> Uuid {
    DEFAULT_SENSOR_SERVICE
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("gauge.db"),
            outlier: OutlierConfig::default(),
            sensor_service: DEFAULT_SENSOR_SERVICE,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        Self::figment(config_path).extract()
    }

    fn figment(config_path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // GAUGE_OUTLIER__ENABLED=false reaches `outlier.enabled`
        figment.merge(Env::prefixed("GAUGE_").split("__"))
    }
}

/// Returns the platform-specific config directory for gauge.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("gauge"))
}

/// Returns the platform-specific data directory for gauge.
///
/// On Linux: `~/.local/share/gauge`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("gauge"))
}
