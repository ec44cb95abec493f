use directories::ProjectDirs;
use doc_model::{ModelError, ViewerConfig};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

mod annotations;
mod assets;

pub use annotations::JsonAnnotationStore;
pub use assets::FileAssetResolver;

const SCHEMA_VERSION: u32 = 1;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("{} was written by a newer version (schema {found})", path.display())]
    UnsupportedVersion { path: PathBuf, found: u32 },
    #[error("{} holds an unusable config: {source}", path.display())]
    InvalidConfig { path: PathBuf, source: ModelError },
}

/// User settings kept apart from the viewer config because they hold secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self { gemini_api_key: None, gemini_model: DEFAULT_GEMINI_MODEL.to_owned() }
    }
}

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    version: u32,
    data: T,
}

impl Storage {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs = ProjectDirs::from("dev", "PaperReader", "PaperReader")
            .ok_or(StorageError::NoDataDirectory)?;

        Ok(Self { root: dirs.data_local_dir().to_path_buf() })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Loads `config.json`, or the defaults when it does not exist. A config
    /// with unusable zoom limits is an error, never silently repaired.
    pub fn load_config(&self) -> Result<ViewerConfig, StorageError> {
        let path = self.config_path();
        let config: ViewerConfig = read_envelope(&path)?.unwrap_or_default();
        config.validate().map_err(|source| StorageError::InvalidConfig { path, source })?;
        Ok(config)
    }

    pub fn save_config(&self, config: &ViewerConfig) -> Result<(), StorageError> {
        let path = self.config_path();
        config
            .validate()
            .map_err(|source| StorageError::InvalidConfig { path: path.clone(), source })?;
        write_envelope(&self.root, &path, config)
    }

    pub fn load_settings(&self) -> Result<Settings, StorageError> {
        Ok(read_envelope(&self.settings_path())?.unwrap_or_default())
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<(), StorageError> {
        write_envelope(&self.root, &self.settings_path(), settings)
    }

    pub fn annotation_store(&self) -> Result<JsonAnnotationStore, StorageError> {
        JsonAnnotationStore::open(self.root.join("highlights.json"))
    }

    fn config_path(&self) -> PathBuf {
        self.root.join("config.json")
    }

    fn settings_path(&self) -> PathBuf {
        self.root.join("settings.json")
    }
}

/// Reads a versioned JSON file. A missing file is `None`.
pub(crate) fn read_envelope<T: DeserializeOwned>(
    path: &Path,
) -> Result<Option<T>, StorageError> {
    if !path.exists() {
        debug!(path = %path.display(), "no stored file, using defaults");
        return Ok(None);
    }

    let bytes = fs::read(path)?;
    let envelope: Envelope<T> = serde_json::from_slice(&bytes)?;
    if envelope.version > SCHEMA_VERSION {
        return Err(StorageError::UnsupportedVersion {
            path: path.to_path_buf(),
            found: envelope.version,
        });
    }

    Ok(Some(envelope.data))
}

pub(crate) fn write_envelope<T: Serialize>(
    root: &Path,
    path: &Path,
    data: &T,
) -> Result<(), StorageError> {
    fs::create_dir_all(root)?;

    let envelope = Envelope { version: SCHEMA_VERSION, data };
    let bytes = serde_json::to_vec_pretty(&envelope)?;
    fs::write(path, bytes)?;
    Ok(())
}
