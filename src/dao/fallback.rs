//! Local persisted key/value copy used whenever the remote store cannot be reached.

use std::{
    collections::HashMap,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
};

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::dao::models::GameSettingEntity;

/// Result alias for fallback store operations.
pub type FallbackResult<T> = Result<T, FallbackError>;

/// Failures raised while reading or writing the fallback copy.
#[derive(Debug, Error)]
pub enum FallbackError {
    /// The entry exists but could not be read.
    #[error("failed to read fallback entry `{key}`")]
    Read {
        /// Entry key.
        key: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The entry could not be stored.
    #[error("failed to write fallback entry `{key}`")]
    Write {
        /// Entry key.
        key: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Stored content is not a valid list of rows.
    #[error("malformed fallback entry `{key}`")]
    Malformed {
        /// Entry key.
        key: String,
        /// Decoding error.
        #[source]
        source: serde_json::Error,
    },
    /// The rows could not be encoded.
    #[error("failed to serialize fallback entry `{key}`")]
    Serialize {
        /// Entry key.
        key: String,
        /// Encoding error.
        #[source]
        source: serde_json::Error,
    },
}

/// Synchronous string store holding serialized values under string keys.
pub trait FallbackStore: Send + Sync {
    /// Value stored under `key`, or `None` when nothing was ever written.
    fn read(&self, key: &str) -> FallbackResult<Option<String>>;
    /// Replace the value stored under `key`.
    fn write(&self, key: &str, value: &str) -> FallbackResult<()>;
}

/// Read and decode the list of rows stored under `key`.
pub fn load_settings(
    store: &dyn FallbackStore,
    key: &str,
) -> FallbackResult<Option<Vec<GameSettingEntity>>> {
    let Some(raw) = store.read(key)? else {
        return Ok(None);
    };

    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| FallbackError::Malformed {
            key: key.to_string(),
            source,
        })
}

/// Encode `settings` and store them under `key`.
pub fn save_settings(
    store: &dyn FallbackStore,
    key: &str,
    settings: &[GameSettingEntity],
) -> FallbackResult<()> {
    let raw = serde_json::to_string(settings).map_err(|source| FallbackError::Serialize {
        key: key.to_string(),
        source,
    })?;
    store.write(key, &raw)
}

/// Fallback store keeping one `<key>.json` file per entry inside a directory.
#[derive(Debug, Clone)]
pub struct FileFallbackStore {
    directory: PathBuf,
}

impl FileFallbackStore {
    /// Use `directory` as the storage root; it is created lazily on first write.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Directory holding the entry files.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.directory.join(format!("{key}.json"))
    }
}

impl FallbackStore for FileFallbackStore {
    fn read(&self, key: &str) -> FallbackResult<Option<String>> {
        match fs::read_to_string(self.entry_path(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(FallbackError::Read {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn write(&self, key: &str, value: &str) -> FallbackResult<()> {
        let write_err = |source| FallbackError::Write {
            key: key.to_string(),
            source,
        };

        fs::create_dir_all(&self.directory).map_err(write_err)?;
        // Every write stages its own file next to the entry, then atomically replaces it.
        let mut staging = NamedTempFile::new_in(&self.directory).map_err(write_err)?;
        staging.write_all(value.as_bytes()).map_err(write_err)?;
        staging
            .persist(self.entry_path(key))
            .map_err(|err| write_err(err.error))?;
        Ok(())
    }
}

/// Process-local fallback store, mostly useful for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryFallbackStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryFallbackStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl FallbackStore for MemoryFallbackStore {
    fn read(&self, key: &str) -> FallbackResult<Option<String>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> FallbackResult<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
