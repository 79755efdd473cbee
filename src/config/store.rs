//! Flat key/value preference storage with change notification.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

pub type PrefMap = serde_json::Map<String, Value>;

/// Old and new value of one changed key. `None` means absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageChange {
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

pub type StorageChanges = BTreeMap<String, StorageChange>;

/// Capacity of the change-notification channel. Slow subscribers that fall
/// further behind than this see a `Lagged` error and resync.
const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Preference storage as the core consumes it.
pub trait PreferenceStore: Send + Sync {
    /// Stored values for `keys`; absent keys are simply missing from the map.
    fn get(&self, keys: &[&str]) -> anyhow::Result<PrefMap>;
    fn set(&self, items: PrefMap) -> anyhow::Result<()>;
    fn remove(&self, key: &str) -> anyhow::Result<()>;
    fn subscribe(&self) -> broadcast::Receiver<StorageChanges>;
}

/// JSON-file-backed store. Without a path it lives only in memory.
pub struct LocalStorage {
    path: Option<PathBuf>,
    values: Mutex<PrefMap>,
    changes: broadcast::Sender<StorageChanges>,
}

impl LocalStorage {
    /// Open the store at `path`. A missing file is an empty store; an
    /// unreadable or unparsable one is logged and treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = read_json_file(&path).unwrap_or_default();
        Self::with_values(Some(path), values)
    }

    pub fn in_memory() -> Self {
        Self::with_values(None, PrefMap::new())
    }

    fn with_values(path: Option<PathBuf>, values: PrefMap) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            path,
            values: Mutex::new(values),
            changes,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn persist(&self, values: &PrefMap) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(values)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    fn notify(&self, changes: StorageChanges) {
        if changes.is_empty() {
            return;
        }
        debug!(keys = ?changes.keys().collect::<Vec<_>>(), "Preferences changed");
        // No subscribers is fine.
        let _ = self.changes.send(changes);
    }
}

impl PreferenceStore for LocalStorage {
    fn get(&self, keys: &[&str]) -> anyhow::Result<PrefMap> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        Ok(keys
            .iter()
            .filter_map(|k| values.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    fn set(&self, items: PrefMap) -> anyhow::Result<()> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        let mut next = values.clone();
        let mut changes = StorageChanges::new();
        for (key, value) in items {
            let old_value = next.insert(key.clone(), value.clone());
            if old_value.as_ref() != Some(&value) {
                changes.insert(
                    key,
                    StorageChange {
                        old_value,
                        new_value: Some(value),
                    },
                );
            }
        }
        // Nothing changes in memory unless the write succeeded.
        self.persist(&next)?;
        *values = next;
        drop(values);
        self.notify(changes);
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        if !values.contains_key(key) {
            return Ok(());
        }
        let mut next = values.clone();
        let old_value = next.remove(key);
        self.persist(&next)?;
        *values = next;
        drop(values);
        let mut changes = StorageChanges::new();
        changes.insert(
            key.to_string(),
            StorageChange {
                old_value,
                new_value: None,
            },
        );
        self.notify(changes);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChanges> {
        self.changes.subscribe()
    }
}

fn read_json_file(path: &Path) -> Option<PrefMap> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(val) => Some(val),
            Err(e) => {
                warn!("Failed to parse {}: {}", path.display(), e);
                None
            }
        },
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to read {}: {}", path.display(), e);
            }
            None
        }
    }
}
