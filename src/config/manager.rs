use super::{evolution::EvolutionConfig, traits::ConfigSection, tree::TreeConfig};
use crate::error::{GpError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Prefix for environment overrides, e.g. `GPEVO__EVOLUTION__MU=50`
pub const ENV_PREFIX: &str = "GPEVO";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub evolution: EvolutionConfig,
    pub tree: TreeConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        self.evolution.validate()?;
        self.tree.validate()?;
        Ok(())
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)
            .map_err(|e| GpError::Configuration(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}

pub struct ConfigManager {
    config: Arc<RwLock<AppConfig>>,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(AppConfig::default())),
        }
    }

    /// Load a config file (format picked from its extension) layered with
    /// environment overrides, then validate it before it replaces the current one.
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let config: AppConfig = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()?;

        config.validate()?;

        *self.config.write().map_err(poisoned)? = config;
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let config = self.config.read().map_err(poisoned)?;
        let toml_str = toml::to_string_pretty(&*config)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    pub fn get(&self) -> Result<AppConfig> {
        Ok(self.config.read().map_err(poisoned)?.clone())
    }

    /// Apply `f` to a copy of the config and keep it only if it still validates.
    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut config = self.config.write().map_err(poisoned)?;
        let mut candidate = config.clone();
        f(&mut candidate);
        candidate.validate()?;
        *config = candidate;
        Ok(())
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> GpError {
    GpError::Configuration("Config lock poisoned".to_string())
}
