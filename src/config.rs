//! TOML configuration.
//!
//! Every key is optional; a missing default config file yields the defaults.

use crate::backend::{InMemoryBackend, SqliteBackend};
use crate::constants::{CONFIG_FILE, DB_ENV, DEFAULT_LIMIT, JSON_FILE, SQLITE_FILE};
use crate::store::Store;
use crate::{Error, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Which storage backend to open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Sqlite,
    /// The in-memory backend, persisted as one JSON file after each change.
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub backend: BackendKind,
    /// Database file; defaults to a file in the data directory.
    pub database: Option<PathBuf>,
    /// Number of history entries shown when no limit is given.
    pub default_limit: usize,
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Directory of the rolling log files; defaults to the data directory.
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            database: None,
            default_limit: DEFAULT_LIMIT,
            log_filter: "warn".to_string(),
            log_dir: None,
        }
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("", "", "clipstash")
        .ok_or_else(|| Error::Config("could not determine the home directory".into()))
}

impl Config {
    /// Parses a TOML document.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Loads the configuration.
    ///
    /// An explicit `path` must exist. Without one, `<config dir>/config.toml` is
    /// read if present. `CLIPSTASH_DB` then overrides `database`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::read(path)?,
            None => match Self::default_path() {
                Ok(path) if path.exists() => Self::read(&path)?,
                _ => {
                    debug!("no config file, using defaults");
                    Self::default()
                }
            },
        };
        config.override_database(std::env::var_os(DB_ENV));
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml(&text)?;
        info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Replaces `database` with a non-empty override value.
    pub fn override_database(&mut self, value: Option<OsString>) {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.database = Some(PathBuf::from(value));
        }
    }

    pub fn default_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join(CONFIG_FILE))
    }

    pub fn data_dir() -> Result<PathBuf> {
        Ok(project_dirs()?.data_dir().to_path_buf())
    }

    /// The configured database path, or the backend's default file in the data directory.
    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.database {
            return Ok(path.clone());
        }
        let file = match self.backend {
            BackendKind::Sqlite => SQLITE_FILE,
            BackendKind::Json => JSON_FILE,
        };
        Ok(Self::data_dir()?.join(file))
    }

    pub fn log_dir(&self) -> Result<PathBuf> {
        match &self.log_dir {
            Some(dir) => Ok(dir.clone()),
            None => Self::data_dir(),
        }
    }

    /// Opens the configured backend and wraps it in a `Store`.
    pub fn open_store(&self) -> Result<Store> {
        let path = self.database_path()?;
        info!(backend = ?self.backend, path = %path.display(), "opening store");
        let store = match self.backend {
            BackendKind::Sqlite => Store::new(Box::new(SqliteBackend::open(&path)?)),
            BackendKind::Json => Store::new(Box::new(InMemoryBackend::load_from_file(&path)?)),
        };
        Ok(store)
    }

    /// Writes the JSON backend back to its file. SQLite commits on its own.
    pub fn persist(&self, store: &Store) -> Result<()> {
        if self.backend != BackendKind::Json {
            return Ok(());
        }
        let path = self.database_path()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        store.with_backend(|backend| {
            match backend.as_any().downcast_ref::<InMemoryBackend>() {
                Some(memory) => memory.save_to_file(&path),
                None => Err(Error::Config("store is not backed by the JSON backend".into())),
            }
        })?
    }
}
