//! Flag persistence
//!
//! Features:
//! - `FlagStore` trait over string key/value storage
//! - In-memory store for tests and headless runs
//! - Native file store with a versioned JSON envelope (tmp → save)
//! - LocalStorage store on wasm32
//!
//! Load failures never stop the game: callers log and treat the flag as
//! unset.

use std::collections::HashMap;

use thiserror::Error;

/// Storage key for the awakened ending. Renamed once to reset old players.
pub const AWAKENED_KEY: &str = "masks_awakened_true";
pub const AWAKENED_VALUE: &str = "true";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("save file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("unsupported save version {0}")]
    Version(u32),
}

/// String key/value storage
pub trait FlagStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// True only for the exact stored value `"true"`
pub fn load_awakened(store: &dyn FlagStore) -> bool {
    match store.get(AWAKENED_KEY) {
        Ok(Some(v)) => v == AWAKENED_VALUE,
        Ok(None) => false,
        Err(e) => {
            log::warn!("Could not read awakened flag: {}", e);
            false
        }
    }
}

pub fn save_awakened(store: &mut dyn FlagStore) -> bool {
    match store.set(AWAKENED_KEY, AWAKENED_VALUE) {
        Ok(()) => {
            log::info!("Awakened flag saved");
            true
        }
        Err(e) => {
            log::warn!("Could not save awakened flag: {}", e);
            false
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FlagStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use file::FileStore;

#[cfg(not(target_arch = "wasm32"))]
mod file {
    use std::collections::BTreeMap;
    use std::fs;
    use std::io::ErrorKind;
    use std::path::{Path, PathBuf};

    use serde::{Deserialize, Serialize};

    use super::{FlagStore, StorageError};

    /// On-disk layout for native saves
    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Envelope {
        version: u32,
        values: BTreeMap<String, String>,
    }

    impl Envelope {
        const VERSION: u32 = 1;

        fn empty() -> Self {
            Self {
                version: Self::VERSION,
                values: BTreeMap::new(),
            }
        }
    }

    /// JSON file store. Writes go to a temporary file first and are renamed
    /// over the save.
    #[derive(Debug, Clone)]
    pub struct FileStore {
        path: PathBuf,
    }

    impl FileStore {
        pub fn new(path: impl Into<PathBuf>) -> Self {
            Self { path: path.into() }
        }

        pub fn path(&self) -> &Path {
            &self.path
        }

        fn read(&self) -> Result<Envelope, StorageError> {
            let json = match fs::read_to_string(&self.path) {
                Ok(json) => json,
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Envelope::empty()),
                Err(e) => return Err(e.into()),
            };
            let envelope: Envelope = serde_json::from_str(&json)?;
            if envelope.version != Envelope::VERSION {
                return Err(StorageError::Version(envelope.version));
            }
            Ok(envelope)
        }
    }

    impl FlagStore for FileStore {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            Ok(self.read()?.values.get(key).cloned())
        }

        fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
            let mut envelope = match self.read() {
                Ok(e) => e,
                Err(e) => {
                    log::warn!("Replacing unreadable save {}: {}", self.path.display(), e);
                    Envelope::empty()
                }
            };
            envelope.values.insert(key.to_string(), value.to_string());

            if let Some(dir) = self.path.parent() {
                if !dir.as_os_str().is_empty() {
                    fs::create_dir_all(dir)?;
                }
            }
            let tmp = self.path.with_extension("tmp");
            fs::write(&tmp, serde_json::to_string_pretty(&envelope)?)?;
            fs::rename(&tmp, &self.path)?;
            Ok(())
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use local::LocalStore;

#[cfg(target_arch = "wasm32")]
mod local {
    use super::{FlagStore, StorageError};

    /// Browser LocalStorage
    #[derive(Debug, Clone, Default)]
    pub struct LocalStore;

    impl LocalStore {
        fn storage() -> Result<web_sys::Storage, StorageError> {
            web_sys::window()
                .and_then(|w| w.local_storage().ok())
                .flatten()
                .ok_or_else(|| StorageError::Unavailable("no LocalStorage".into()))
        }
    }

    impl FlagStore for LocalStore {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            Self::storage()?
                .get_item(key)
                .map_err(|e| StorageError::Unavailable(format!("{:?}", e)))
        }

        fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
            Self::storage()?
                .set_item(key, value)
                .map_err(|e| StorageError::Unavailable(format!("{:?}", e)))
        }
    }
}
