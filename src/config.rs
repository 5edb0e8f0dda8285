use std::path::PathBuf;

use anyhow::{Context, Result};
use ::config::{Config, Environment};
use serde::Deserialize;

const ENV_PREFIX: &str = "GOOFISH";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    pub db_path: PathBuf,
    pub logs_dir: PathBuf,
    pub collection: String,
    pub parallel: bool,
}

impl Settings {
    /// Defaults, then `GOOFISH_*` environment variables.
    pub fn load() -> Result<Self> {
        Self::from_env(Environment::with_prefix(ENV_PREFIX))
    }

    fn from_env(env: Environment) -> Result<Self> {
        Config::builder()
            .set_default("input_path", "data/raw/response.json")?
            .set_default("output_dir", "data/output")?
            .set_default("db_path", "data/goofish.sqlite")?
            .set_default("logs_dir", "logs")?
            .set_default("collection", "search_results")?
            .set_default("parallel", false)?
            .add_source(env.try_parsing(true))
            .build()
            .and_then(|c| c.try_deserialize())
            .context("Failed to load settings")
    }
}
