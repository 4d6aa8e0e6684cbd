use crate::api_error::{ApiError, ApiErrorType};
use directories::{BaseDirs, ProjectDirs};
use fs2::FileExt;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::fs::{create_dir_all, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

/// Process wide key-value storage for the session token.  The browser
/// dashboard used local storage for this.
///
/// Calls may block on file I/O and locks.  The client makes them from
/// `spawn_blocking` when it is inside a request.
pub trait TokenStore: Send + Sync + Debug {
    fn get(&self, key: &str) -> Result<Option<String>, ApiError>;
    fn set(&self, key: &str, value: &str) -> Result<(), ApiError>;
    fn remove(&self, key: &str) -> Result<(), ApiError>;
}

/// Tokens kept in a JSON object on disk.  Every access takes an
/// exclusive lock on the file, so several shells can share it.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

type Entries = BTreeMap<String, String>;

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `session.json` in the per-user local data directory
    pub fn at_default_location() -> Result<Self, ApiError> {
        Ok(Self::new(Self::default_path()?))
    }

    pub fn default_path() -> Result<PathBuf, ApiError> {
        let data_dir = match ProjectDirs::from("org", "edu", "edu-admin") {
            Some(dirs) => dirs.data_local_dir().to_owned(),
            None => match BaseDirs::new() {
                Some(dirs) => dirs.data_local_dir().join("edu-admin"),
                None => {
                    return Err(ApiError::bare(ApiErrorType::Storage(
                        "No home directory for the token file".to_string(),
                    )))
                }
            },
        };
        Ok(data_dir.join("session.json"))
    }

    /// Lock the file, hand its entries to `f`, write back what `f`
    /// leaves if it changed anything.
    fn read_write_atomic<T>(&self, f: impl FnOnce(&mut Entries) -> T) -> Result<T, ApiError> {
        if let Some(parent_dir) = self.path.parent() {
            create_dir_all(parent_dir)?;
        }
        let mut file = OpenOptions::new()
            .write(true)
            .read(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        file.lock_exclusive()?;

        let mut contents = String::new();
        let sz = file.read_to_string(&mut contents)?;
        let mut entries: Entries = if sz != 0 {
            serde_json::from_str(&contents).map_err(|err| {
                ApiError::bare(ApiErrorType::Storage(format!(
                    "{}: {err}",
                    self.path.display()
                )))
            })?
        } else {
            Entries::new()
        };
        let before = entries.clone();
        let result = f(&mut entries);
        if entries != before {
            file.set_len(0)?;
            file.seek(SeekFrom::Start(0))?;
            file.write_all(serde_json::to_string(&entries)?.as_bytes())?;
        }
        file.unlock()?;
        Ok(result)
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: &str) -> Result<Option<String>, ApiError> {
        self.read_write_atomic(|entries| entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ApiError> {
        self.read_write_atomic(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), ApiError> {
        self.read_write_atomic(|entries| {
            entries.remove(key);
        })
    }
}

/// Tokens that live as long as the process
#[derive(Default)]
pub struct MemoryTokenStore {
    entries: Mutex<HashMap<String, String>>,
}

impl Debug for MemoryTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<&String> = entries.keys().collect();
        keys.sort();
        f.debug_struct("MemoryTokenStore").field("keys", &keys).finish()
    }
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(key: &str, token: &str) -> Self {
        let store = Self::default();
        store
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), token.to_string());
        store
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: &str) -> Result<Option<String>, ApiError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ApiError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), ApiError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_keeps_other_keys() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = FileTokenStore::new(dir.path().join("nested").join("session.json"));

        assert_eq!(store.get("access_token").unwrap(), None);
        store.set("access_token", "abc").unwrap();
        store.set("userAvatar", "/static/avatars/1.png").unwrap();
        assert_eq!(store.get("access_token").unwrap().as_deref(), Some("abc"));

        store.remove("access_token").unwrap();
        assert_eq!(store.get("access_token").unwrap(), None);
        assert_eq!(
            store.get("userAvatar").unwrap().as_deref(),
            Some("/static/avatars/1.png")
        );
    }

    #[test]
    fn file_store_overwrites_shorter_value() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("session.json");
        let store = FileTokenStore::new(&path);
        store.set("access_token", "a-rather-long-token-value").unwrap();
        store.set("access_token", "short").unwrap();

        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert_eq!(on_disk, r#"{"access_token":"short"}"#);
    }

    #[test]
    fn corrupt_file_is_a_storage_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json").unwrap();
        let err = FileTokenStore::new(&path).get("access_token").unwrap_err();
        assert!(matches!(err.error_type, ApiErrorType::Storage(_)));
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryTokenStore::with_token("access_token", "t1");
        assert_eq!(store.get("access_token").unwrap().as_deref(), Some("t1"));
        store.remove("access_token").unwrap();
        assert_eq!(store.get("access_token").unwrap(), None);
    }
}
