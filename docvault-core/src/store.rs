// docvault-core/src/store.rs
// Data directory with named collections and singleton documents

use crate::collection::Collection;
use crate::config::StoreConfig;
use crate::document::Document;
use crate::error::{Result, VaultError};
use crate::log_info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Collection names used by the medical office application
pub mod collections {
    pub const PATIENTS: &str = "patients";
    pub const PRESCRIPTIONS: &str = "prescriptions";
    pub const APPOINTMENTS: &str = "appointments";
    pub const INVENTORY: &str = "inventory";
}

/// Singleton document names used by the medical office application
pub mod documents {
    pub const DOCTOR_INFO: &str = "doctor_info";
}

const FILE_EXTENSION: &str = "json";

/// Entry point: a data directory plus the settings every transaction uses.
///
/// `Store` keeps no per-collection state; handles it returns can be cloned
/// and moved across threads, and several `Store`s (or processes) may point
/// at the same directory.
#[derive(Debug, Clone)]
pub struct Store {
    config: Arc<StoreConfig>,
}

impl Store {
    /// Validate `config` and create the data directory if needed.
    pub fn open(config: StoreConfig) -> Result<Self> {
        config.validate()?;

        if !config.data_dir.exists() {
            fs::create_dir_all(&config.data_dir)?;
            log_info!("Created data directory {}", config.data_dir.display());
        }

        Ok(Store {
            config: Arc::new(config),
        })
    }

    /// [`Store::open`] with a default config rooted at `data_dir`
    pub fn open_dir<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        Self::open(StoreConfig::new(data_dir))
    }

    /// [`Store::open`] with [`StoreConfig::from_env`]
    pub fn from_env() -> Result<Self> {
        Self::open(StoreConfig::from_env()?)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    pub fn collection(&self, name: &str) -> Result<Collection> {
        let path = self.file_path(name)?;
        Ok(Collection::new(name.to_string(), path, Arc::clone(&self.config)))
    }

    pub fn document(&self, name: &str) -> Result<Document> {
        let path = self.file_path(name)?;
        Ok(Document::new(name.to_string(), path, Arc::clone(&self.config)))
    }

    /// `<data_dir>/<name>.json`; rejects names that could leave the directory.
    pub fn file_path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self
            .config
            .data_dir
            .join(format!("{}.{}", name, FILE_EXTENSION)))
    }

    /// Names of collection files currently present, sorted
    pub fn list_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.config.data_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_name(stem).is_ok() {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(VaultError::InvalidName("name is empty".to_string()));
    }
    if name.len() > 128 {
        return Err(VaultError::InvalidName(format!(
            "'{}...' is longer than 128 characters",
            name.chars().take(32).collect::<String>()
        )));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(VaultError::InvalidName(format!(
            "'{}' contains '{}'; use letters, digits, '_' or '-'",
            name, bad
        )));
    }
    Ok(())
}
