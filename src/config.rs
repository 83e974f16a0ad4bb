//! Runtime configuration: built-in defaults, then `rowkit.toml`, then
//! `ROWKIT_*` environment variables.

use crate::db::{DatabaseOptions, WhereMode};
use crate::error::RowkitError;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "rowkit.toml";
pub const ENV_PREFIX: &str = "ROWKIT_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub shared_cache: bool,
    pub where_mode: WhereMode,
    pub fixture_dir: PathBuf,
    pub fixture_file: String,
    pub load_fixtures: bool,
    /// Empty fixture tables before loading, so restarts do not duplicate rows.
    pub truncate_tables: bool,
    /// Relation eager-loaded by the startup query; empty loads none.
    pub relation: String,
    pub loglevel: String,
}

impl Default for Config {
    fn default() -> Self {
        let db = DatabaseOptions::default();
        Self {
            database_url: db.url,
            shared_cache: db.shared_cache,
            where_mode: db.where_mode,
            fixture_dir: PathBuf::from("."),
            fixture_file: "fixture.yml".to_string(),
            load_fixtures: true,
            truncate_tables: true,
            relation: "Profile".to_string(),
            loglevel: "info".to_string(),
        }
    }
}

impl Config {
    /// Load from `rowkit.toml` in the working directory (if present) and the environment.
    pub fn load() -> Result<Self, RowkitError> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self, RowkitError> {
        Ok(Self::figment(path).extract()?)
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn database_options(&self) -> DatabaseOptions {
        DatabaseOptions {
            url: self.database_url.clone(),
            shared_cache: self.shared_cache,
            where_mode: self.where_mode,
        }
    }
}
