use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use super::domain::GroupOverride;

/// Key-value access to group overrides, keyed by cleaned group name.
pub trait OverrideStore: Send + Sync {
    fn get(&self, group: &str) -> Result<Option<GroupOverride>, StoreError>;
    /// Consistent copy of every rule, taken once at the start of a run.
    fn snapshot(&self) -> Result<BTreeMap<String, GroupOverride>, StoreError>;
    fn put(&self, group: &str, rule: GroupOverride) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("override store io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("override store at {} is not valid JSON: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("override store lock poisoned")]
    Poisoned,
}

#[derive(Debug, Default)]
pub struct MemoryOverrideStore {
    rules: RwLock<BTreeMap<String, GroupOverride>>,
}

impl MemoryOverrideStore {
    pub fn with_rules(rules: BTreeMap<String, GroupOverride>) -> Self {
        Self {
            rules: RwLock::new(rules),
        }
    }
}

impl OverrideStore for MemoryOverrideStore {
    fn get(&self, group: &str) -> Result<Option<GroupOverride>, StoreError> {
        let guard = self.rules.read().map_err(|_| StoreError::Poisoned)?;
        Ok(guard.get(group).cloned())
    }

    fn snapshot(&self) -> Result<BTreeMap<String, GroupOverride>, StoreError> {
        let guard = self.rules.read().map_err(|_| StoreError::Poisoned)?;
        Ok(guard.clone())
    }

    fn put(&self, group: &str, rule: GroupOverride) -> Result<(), StoreError> {
        let mut guard = self.rules.write().map_err(|_| StoreError::Poisoned)?;
        guard.insert(group.to_string(), rule);
        Ok(())
    }
}

/// Overrides persisted as one pretty-printed JSON object. Every read loads
/// the file; writes go through a temp file and rename so readers never see
/// a partial document.
#[derive(Debug)]
pub struct JsonFileOverrideStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileOverrideStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, GroupOverride>, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => return Err(self.io_error(source)),
        };
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&content).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl OverrideStore for JsonFileOverrideStore {
    fn get(&self, group: &str) -> Result<Option<GroupOverride>, StoreError> {
        Ok(self.load()?.remove(group))
    }

    fn snapshot(&self) -> Result<BTreeMap<String, GroupOverride>, StoreError> {
        self.load()
    }

    fn put(&self, group: &str, rule: GroupOverride) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut rules = self.load()?;
        rules.insert(group.to_string(), rule);

        let body = serde_json::to_string_pretty(&rules).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        let staging = staging_path(&self.path);
        std::fs::write(&staging, body).map_err(|source| self.io_error(source))?;
        std::fs::rename(&staging, &self.path).map_err(|source| self.io_error(source))?;
        Ok(())
    }
}

pub(crate) fn staging_path(path: &Path) -> PathBuf {
    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    PathBuf::from(staging)
}
