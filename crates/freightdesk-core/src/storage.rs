//! Durable string key-value storage for session data.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::StoreError;

pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Process-local store. Contents are lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    kv: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.kv.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.kv.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.kv.write().remove(key);
        Ok(())
    }
}

/// JSON document on disk, rewritten on every mutation.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    kv: RwLock<HashMap<String, String>>,
}

impl FileStore {
    /// Opens `path`, starting empty when the file does not exist yet. A
    /// document that does not parse is deleted and the store starts empty.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let kv = if path.exists() {
            let data = std::fs::read(&path)?;
            if data.iter().all(|b| b.is_ascii_whitespace()) {
                HashMap::new()
            } else {
                match serde_json::from_slice(&data) {
                    Ok(kv) => kv,
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "session file is corrupted, discarding it");
                        std::fs::remove_file(&path)?;
                        HashMap::new()
                    }
                }
            }
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            kv: RwLock::new(kv),
        })
    }

    fn flush(&self, kv: &HashMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(kv)?;
        let mut file = File::create(&self.path)?;
        file.write_all(&data)?;
        file.flush()?;
        Ok(())
    }
}

impl SessionStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.kv.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut guard = self.kv.write();
        guard.insert(key.to_string(), value.to_string());
        self.flush(&guard)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut guard = self.kv.write();
        if guard.remove(key).is_some() {
            self.flush(&guard)?;
        }
        Ok(())
    }
}
