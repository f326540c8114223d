//! Configuration management for storyfind
//!
//! Loading, profile/env overrides and validation of the TOML configuration.
//! Fusion weights, the dedup window and the default relevance window live
//! here rather than as constants so they can be tuned per deployment.

use crate::error::{Result, StoryfindError};
use crate::retrieval::{
    FusionConfig, FusionError, SearchMode, DEFAULT_DEDUP_EPSILON, DEFAULT_LEXICAL_WEIGHT,
    DEFAULT_SEMANTIC_WEIGHT,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

pub const SCHEMA_VERSION: &str = "1.0.0";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Relevance engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Mode used when a caller does not pick one
    pub default_mode: SearchMode,
    /// Page size used when a caller does not pick one
    pub default_limit: usize,
    /// Weight of normalized BM25 scores in hybrid fusion
    pub lexical_weight: f64,
    /// Weight of semantic certainty in hybrid fusion
    pub semantic_weight: f64,
    /// Start times within this many seconds collapse into one hit
    pub dedup_epsilon_secs: f64,
    /// Default lower relevance bound (inclusive)
    pub threshold_min: f64,
    /// Default upper relevance bound (inclusive)
    pub threshold_max: f64,
}

impl RetrievalConfig {
    pub fn fusion(&self) -> std::result::Result<FusionConfig, FusionError> {
        FusionConfig::new(self.lexical_weight, self.semantic_weight)
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_mode: SearchMode::Hybrid,
            default_limit: 1000,
            lexical_weight: DEFAULT_LEXICAL_WEIGHT,
            semantic_weight: DEFAULT_SEMANTIC_WEIGHT,
            dedup_epsilon_secs: DEFAULT_DEDUP_EPSILON,
            threshold_min: 0.4,
            threshold_max: 1.0,
        }
    }
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_mode: Option<SearchMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold_max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lexical_weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_weight: Option<f64>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(StoryfindError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| StoryfindError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        // Apply environment variable overrides
        config.apply_env_overrides()?;

        ConfigValidator::validate(&config)?;

        tracing::info!("Loaded configuration from {}", path.display());

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| StoryfindError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| StoryfindError::ProfileNotFound {
                name: profile.to_string(),
            })?;

        if let Some(mode) = overrides.default_mode {
            self.retrieval.default_mode = mode;
        }
        if let Some(min) = overrides.threshold_min {
            self.retrieval.threshold_min = min;
        }
        if let Some(max) = overrides.threshold_max {
            self.retrieval.threshold_max = max;
        }
        if let Some(weight) = overrides.lexical_weight {
            self.retrieval.lexical_weight = weight;
        }
        if let Some(weight) = overrides.semantic_weight {
            self.retrieval.semantic_weight = weight;
        }

        tracing::debug!("Applied profile '{}'", profile);
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: STORYFIND_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(std::env::vars())
    }

    /// Apply `STORYFIND_`-prefixed key/value overrides
    pub fn apply_overrides<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix("STORYFIND_") {
                self.set_value_from_env(config_key, &value)?;
            }
        }
        Ok(())
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "RETRIEVAL__DEFAULT_MODE" => {
                self.retrieval.default_mode =
                    value.parse().map_err(|_| invalid_value(path, value, "mode"))?;
            }
            "RETRIEVAL__DEFAULT_LIMIT" => {
                self.retrieval.default_limit = value
                    .parse()
                    .map_err(|_| invalid_value(path, value, "integer"))?;
            }
            "RETRIEVAL__LEXICAL_WEIGHT" => {
                self.retrieval.lexical_weight = parse_float(path, value)?;
            }
            "RETRIEVAL__SEMANTIC_WEIGHT" => {
                self.retrieval.semantic_weight = parse_float(path, value)?;
            }
            "RETRIEVAL__DEDUP_EPSILON_SECS" => {
                self.retrieval.dedup_epsilon_secs = parse_float(path, value)?;
            }
            "RETRIEVAL__THRESHOLD_MIN" => {
                self.retrieval.threshold_min = parse_float(path, value)?;
            }
            "RETRIEVAL__THRESHOLD_MAX" => {
                self.retrieval.threshold_max = parse_float(path, value)?;
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            StoryfindError::Config("Cannot determine config directory".to_string())
        })?;

        Ok(config_dir.join("storyfind").join("config.toml"))
    }
}

fn parse_float(path: &str, value: &str) -> Result<f64> {
    value
        .parse()
        .map_err(|_| invalid_value(path, value, "number"))
}

fn invalid_value(path: &str, value: &str, expected: &str) -> StoryfindError {
    StoryfindError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}' as {}", value, expected),
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut profiles = HashMap::new();
        profiles.insert(
            "strict".to_string(),
            ProfileOverrides {
                threshold_min: Some(0.7),
                ..ProfileOverrides::default()
            },
        );
        profiles.insert(
            "keyword".to_string(),
            ProfileOverrides {
                default_mode: Some(SearchMode::Lexical),
                threshold_min: Some(0.0),
                ..ProfileOverrides::default()
            },
        );

        Self {
            meta: MetaConfig {
                schema_version: SCHEMA_VERSION.to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            retrieval: RetrievalConfig::default(),
            profiles,
        }
    }
}
