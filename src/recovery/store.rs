//! Local auth state storage: in-memory and TOML-file backends.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::ReloginError;

/// Client-side storage area cleared by recovery strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StorageArea {
    Local,
    Session,
    Cookie,
}

/// Storage abstraction for locally cached auth state.
pub trait StateStore: Send + Sync {
    fn get(&self, area: StorageArea, key: &str) -> Result<Option<String>, ReloginError>;
    fn set(&self, area: StorageArea, key: &str, value: &str) -> Result<(), ReloginError>;
    fn remove(&self, area: StorageArea, key: &str) -> Result<(), ReloginError>;
    fn keys(&self, area: StorageArea) -> Result<Vec<String>, ReloginError>;

    /// Remove every key in `area` whose name matches `pattern`; returns how many.
    fn clear_matching(&self, area: StorageArea, pattern: &Regex) -> Result<usize, ReloginError> {
        let mut removed = 0;
        for key in self.keys(area)? {
            if pattern.is_match(&key) {
                self.remove(area, &key)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Process-local store; the default backend.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    entries: Mutex<HashMap<(StorageArea, String), String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<(StorageArea, String), String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, area: StorageArea, key: &str) -> Result<Option<String>, ReloginError> {
        Ok(self.entries().get(&(area, key.to_string())).cloned())
    }

    fn set(&self, area: StorageArea, key: &str, value: &str) -> Result<(), ReloginError> {
        self.entries()
            .insert((area, key.to_string()), value.to_string());
        Ok(())
    }

    fn remove(&self, area: StorageArea, key: &str) -> Result<(), ReloginError> {
        self.entries().remove(&(area, key.to_string()));
        Ok(())
    }

    fn keys(&self, area: StorageArea) -> Result<Vec<String>, ReloginError> {
        let mut keys: Vec<String> = self
            .entries()
            .keys()
            .filter(|(a, _)| *a == area)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}

/// File-backed store: one TOML file per storage area under `base_dir`.
///
/// Clones share one lock, so read-modify-write cycles never interleave within
/// the process. Files are replaced atomically through a sibling temp file.
///
/// # Example
/// ```no_run
/// use relogin::recovery::store::{FileStateStore, StateStore, StorageArea};
///
/// let store = FileStateStore::new_default();
/// store.set(StorageArea::Local, "oauth_state", "abc123")?;
/// # Ok::<(), relogin::error::ReloginError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileStateStore {
    base_dir: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl FileStateStore {
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn new_default() -> Self {
        Self::new(default_state_dir())
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn area_path(&self, area: StorageArea) -> PathBuf {
        self.base_dir.join(format!("{area}.toml"))
    }

    fn read_area(&self, area: StorageArea) -> Result<AreaFile, ReloginError> {
        let path = self.area_path(area);
        let raw = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(AreaFile::empty(area))
            }
            Err(err) => return Err(ReloginError::Storage(err.to_string())),
        };
        Ok(toml::from_str(&raw)?)
    }

    fn write_area(&self, area: StorageArea, mut file: AreaFile) -> Result<(), ReloginError> {
        let path = self.area_path(area);
        if file.entries.is_empty() {
            return match fs::remove_file(&path) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(err) => Err(ReloginError::Storage(err.to_string())),
            };
        }
        fs::create_dir_all(&self.base_dir)?;
        file.saved_at = Utc::now();
        let serialized = toml::to_string(&file)?;
        let tmp = path.with_extension("toml.tmp");
        fs::write(&tmp, serialized)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

impl StateStore for FileStateStore {
    fn get(&self, area: StorageArea, key: &str) -> Result<Option<String>, ReloginError> {
        let _guard = self.guard();
        Ok(self.read_area(area)?.entries.get(key).cloned())
    }

    fn set(&self, area: StorageArea, key: &str, value: &str) -> Result<(), ReloginError> {
        let _guard = self.guard();
        let mut file = self.read_area(area)?;
        file.entries.insert(key.to_string(), value.to_string());
        self.write_area(area, file)
    }

    fn remove(&self, area: StorageArea, key: &str) -> Result<(), ReloginError> {
        let _guard = self.guard();
        let mut file = self.read_area(area)?;
        if file.entries.remove(key).is_none() {
            return Ok(());
        }
        self.write_area(area, file)
    }

    fn keys(&self, area: StorageArea) -> Result<Vec<String>, ReloginError> {
        let _guard = self.guard();
        Ok(self.read_area(area)?.entries.into_keys().collect())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AreaFile {
    version: u32,
    area: StorageArea,
    saved_at: DateTime<Utc>,
    entries: BTreeMap<String, String>,
}

impl AreaFile {
    fn empty(area: StorageArea) -> Self {
        Self {
            version: 1,
            area,
            saved_at: Utc::now(),
            entries: BTreeMap::new(),
        }
    }
}

/// `~/.relogin/state`, or `.relogin/state` when no home directory is known.
pub fn default_state_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".relogin").join("state"))
        .unwrap_or_else(|| PathBuf::from(".relogin").join("state"))
}
