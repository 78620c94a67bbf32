//! TOML-based configuration for MergeAdvisor.
//!
//! Configuration is entirely optional: every field has a default and the
//! advisor runs with no config file at all. When present, the file is
//! searched at `./.mergeadvisor.toml` first, then the platform config
//! directory (`~/.config/mergeadvisor/config.toml` on Linux).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;

/// File name searched in the repository root.
const LOCAL_CONFIG_NAME: &str = ".mergeadvisor.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level advisor configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdvisorConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Verification gate settings.
    #[serde(default)]
    pub verify: VerifyConfig,

    /// Strategy recommendation scoring settings.
    #[serde(default)]
    pub strategy: StrategyConfig,
}

// ---------------------------------------------------------------------------
// General
// ---------------------------------------------------------------------------

/// General behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "warn".into()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Verification gate settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyConfig {
    /// Explicit test command. When set, project-type probing is skipped.
    #[serde(default)]
    pub test_command: Option<String>,

    /// Seconds before a test run is considered hung (default 600).
    #[serde(default = "default_test_timeout")]
    pub timeout_secs: u64,
}

fn default_test_timeout() -> u64 {
    600
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            test_command: None,
            timeout_secs: default_test_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// Strategy scoring
// ---------------------------------------------------------------------------

/// Weights for the completeness scoring used by the strategy recommender.
///
/// The relative weighting between maturity signals is judgment-based, so it
/// is exposed here rather than hard-coded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Weight of the "no TODO/FIXME markers" signal (default 1.0).
    #[serde(default = "default_todo_weight")]
    pub todo_weight: f64,

    /// Weight of the "side present consistently across records" signal
    /// (default 0.5).
    #[serde(default = "default_consistency_weight")]
    pub consistency_weight: f64,

    /// Minimum score margin before one side is considered dominant
    /// (default 0.5). Below this margin the recommender proposes manual
    /// resolution.
    #[serde(default = "default_dominance_threshold")]
    pub dominance_threshold: f64,
}

fn default_todo_weight() -> f64 {
    1.0
}

fn default_consistency_weight() -> f64 {
    0.5
}

fn default_dominance_threshold() -> f64 {
    0.5
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            todo_weight: default_todo_weight(),
            consistency_weight: default_consistency_weight(),
            dominance_threshold: default_dominance_threshold(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl AdvisorConfig {
    /// Load configuration for a repository at `workdir`.
    ///
    /// With `explicit` set, that file must exist and parse. Otherwise the
    /// search order is the repository-local file, then the platform config
    /// directory, then built-in defaults.
    pub fn load(workdir: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.display().to_string()));
            }
            return Self::from_file(path);
        }

        let local = workdir.join(LOCAL_CONFIG_NAME);
        if local.exists() {
            return Self::from_file(&local);
        }

        if let Some(global) = Self::global_path() {
            if global.exists() {
                return Self::from_file(&global);
            }
        }

        debug!("no configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Platform config file location.
    pub fn global_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("mergeadvisor").join("config.toml"))
    }

    /// Parse a config file, then validate it.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        info!(path = %path.display(), "loading configuration");
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Validate value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.verify.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "verify.timeout_secs".into(),
                detail: "must be greater than zero".into(),
            });
        }
        for (field, value) in [
            ("strategy.todo_weight", self.strategy.todo_weight),
            (
                "strategy.consistency_weight",
                self.strategy.consistency_weight,
            ),
            (
                "strategy.dominance_threshold",
                self.strategy.dominance_threshold,
            ),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: field.into(),
                    detail: "must be a non-negative number".into(),
                });
            }
        }
        if let Some(cmd) = &self.verify.test_command {
            if cmd.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "verify.test_command".into(),
                    detail: "must not be empty".into(),
                });
            }
        }
        Ok(())
    }
}
