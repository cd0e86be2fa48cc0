//! Configuration for paragate.
//!
//! Read once at startup from a TOML file and handed to the scheduler and the
//! review pool as plain values. Nothing here is mutated after load.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pool::NewCardOrder;

const CONFIG_FILE_NAME: &str = "config.toml";

/// One year.
pub const MAX_STEP_MINUTES: f64 = 525_600.0;
/// One year.
pub const MAX_BURY_DELAY_HOURS: f64 = 8_760.0;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("{name} must be a non-empty ascending list of positive minutes, each at most one year")]
    InvalidSteps { name: &'static str },

    #[error("bury_delay_hours must be positive and at most one year, got {0}")]
    InvalidBuryDelay(f64),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Root directory holding subject folders, documents and decks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault: Option<PathBuf>,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub review: ReviewConfig,
}

impl Config {
    /// Load the config file, falling back to defaults when it does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.scheduler.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Vault root: `PARAGATE_VAULT`, then the `vault` key, then the working directory.
    pub fn vault_root(&self) -> PathBuf {
        if let Ok(path) = std::env::var("PARAGATE_VAULT") {
            return PathBuf::from(path);
        }
        self.vault.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("PARAGATE_CONFIG") {
        return PathBuf::from(path);
    }

    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("paragate")
        .join(CONFIG_FILE_NAME)
}

/// Step tables driving the learning and relearning phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Minutes between learning steps of a new card.
    #[serde(default = "default_learning_steps")]
    pub learning_steps: Vec<f64>,
    /// Minutes between relearning steps after a lapse.
    #[serde(default = "default_relearn_steps")]
    pub relearn_steps: Vec<f64>,
    /// Hours a buried card is pushed back. Used by the bury action only.
    #[serde(default = "default_bury_delay_hours")]
    pub bury_delay_hours: f64,
}

fn default_learning_steps() -> Vec<f64> {
    vec![1.0, 10.0]
}

fn default_relearn_steps() -> Vec<f64> {
    vec![10.0]
}

fn default_bury_delay_hours() -> f64 {
    24.0
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            learning_steps: default_learning_steps(),
            relearn_steps: default_relearn_steps(),
            bury_delay_hours: default_bury_delay_hours(),
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !valid_steps(&self.learning_steps) {
            return Err(ConfigError::InvalidSteps {
                name: "learning_steps",
            });
        }
        if !valid_steps(&self.relearn_steps) {
            return Err(ConfigError::InvalidSteps {
                name: "relearn_steps",
            });
        }
        let bury = self.bury_delay_hours;
        if !(bury.is_finite() && bury > 0.0 && bury <= MAX_BURY_DELAY_HOURS) {
            return Err(ConfigError::InvalidBuryDelay(bury));
        }
        Ok(())
    }
}

fn valid_steps(steps: &[f64]) -> bool {
    !steps.is_empty()
        && steps
            .iter()
            .all(|s| s.is_finite() && *s > 0.0 && *s <= MAX_STEP_MINUTES)
        && steps.windows(2).all(|w| w[0] <= w[1])
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewConfig {
    #[serde(default)]
    pub new_card_order: NewCardOrder,
}
