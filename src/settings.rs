use std::path::PathBuf;

use anyhow::{bail, Result};
use config::{Config, Environment};
use serde::Deserialize;

use crate::query::MAX_LIMIT;

const ENV_PREFIX: &str = "RECIPES";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// SQLite file backing the record store.
    pub database_path: PathBuf,
    /// JSON source used by `load` when no path is given.
    pub data_file: PathBuf,
    pub bind: String,
    pub default_limit: i64,
}

impl Settings {
    /// Defaults overridden by `RECIPES_*` environment variables.
    pub fn load() -> Result<Self> {
        Self::from_env(Environment::with_prefix(ENV_PREFIX))
    }

    fn from_env(env: Environment) -> Result<Self> {
        let settings: Settings = Config::builder()
            .set_default("database_path", "data/recipes.sqlite")?
            .set_default("data_file", "data/recipes.json")?
            .set_default("bind", "127.0.0.1:8000")?
            .set_default("default_limit", 10)?
            .add_source(env.try_parsing(true))
            .build()?
            .try_deserialize()?;

        if settings.default_limit < 1 || settings.default_limit > MAX_LIMIT as i64 {
            bail!(
                "{}_DEFAULT_LIMIT must be between 1 and {} (got {})",
                ENV_PREFIX,
                MAX_LIMIT,
                settings.default_limit
            );
        }
        Ok(settings)
    }
}
