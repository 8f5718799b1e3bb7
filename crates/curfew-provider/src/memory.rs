//! In-memory `RegistryStore` used by dry runs and tests.
//!
//! Paths and value names compare case-insensitively, matching the registry.
//! Clones share the same backing map so a test can keep a handle while the
//! controller owns another.

use crate::registry::{Hive, RegistryKey, RegistryStore, StoreError};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Typed value held by the memory store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredValue {
    Dword(u32),
    Text(String),
}

impl StoredValue {
    fn type_name(&self) -> &'static str {
        match self {
            StoredValue::Dword(_) => "REG_DWORD",
            StoredValue::Text(_) => "REG_SZ",
        }
    }
}

type Values = BTreeMap<String, StoredValue>;

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    keys: Arc<Mutex<BTreeMap<(Hive, String), Values>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed `key` with a DWORD value, creating the containing key.
    pub fn with_dword(self, key: RegistryKey, value: u32) -> Self {
        self.insert(key.hive, key.path, key.value_name, StoredValue::Dword(value));
        self
    }

    /// Insert an arbitrary value, creating the containing key and its parents.
    pub fn insert(&self, hive: Hive, path: &str, name: &str, value: StoredValue) {
        let mut keys = self.lock();
        create_with_parents(&mut keys, hive, path);
        keys.entry((hive, normalise(path)))
            .or_default()
            .insert(normalise(name), value);
    }

    /// Snapshot of the value at `key`, if present.
    pub fn value(&self, key: RegistryKey) -> Option<StoredValue> {
        self.lock()
            .get(&(key.hive, normalise(key.path)))
            .and_then(|values| values.get(&normalise(key.value_name)))
            .cloned()
    }

    /// Names of every value stored under `path`.
    pub fn value_names(&self, hive: Hive, path: &str) -> Vec<String> {
        self.lock()
            .get(&(hive, normalise(path)))
            .map(|values| values.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<(Hive, String), Values>> {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RegistryStore for MemoryStore {
    fn key_exists(&self, hive: Hive, path: &str) -> Result<bool, StoreError> {
        Ok(self.lock().contains_key(&(hive, normalise(path))))
    }

    fn create_key(&self, hive: Hive, path: &str) -> Result<(), StoreError> {
        create_with_parents(&mut self.lock(), hive, path);
        Ok(())
    }

    fn read_dword(&self, hive: Hive, path: &str, name: &str) -> Result<Option<u32>, StoreError> {
        let keys = self.lock();
        let Some(values) = keys.get(&(hive, normalise(path))) else {
            return Ok(None);
        };
        match values.get(&normalise(name)) {
            None => Ok(None),
            Some(StoredValue::Dword(value)) => Ok(Some(*value)),
            Some(other) => Err(StoreError::TypeMismatch {
                name: name.to_string(),
                found: other.type_name().to_string(),
            }),
        }
    }

    fn write_dword(
        &self,
        hive: Hive,
        path: &str,
        name: &str,
        value: u32,
    ) -> Result<(), StoreError> {
        let mut keys = self.lock();
        let values = keys
            .get_mut(&(hive, normalise(path)))
            .ok_or_else(|| StoreError::KeyNotFound(format!("{hive}\\{path}")))?;
        values.insert(normalise(name), StoredValue::Dword(value));
        Ok(())
    }

    fn delete_value(&self, hive: Hive, path: &str, name: &str) -> Result<(), StoreError> {
        if let Some(values) = self.lock().get_mut(&(hive, normalise(path))) {
            values.remove(&normalise(name));
        }
        Ok(())
    }
}

fn normalise(segment: &str) -> String {
    segment.trim_matches('\\').to_ascii_lowercase()
}

fn create_with_parents(keys: &mut BTreeMap<(Hive, String), Values>, hive: Hive, path: &str) {
    let normalised = normalise(path);
    let mut prefix = String::with_capacity(normalised.len());
    for segment in normalised.split('\\').filter(|segment| !segment.is_empty()) {
        if !prefix.is_empty() {
            prefix.push('\\');
        }
        prefix.push_str(segment);
        keys.entry((hive, prefix.clone())).or_default();
    }
}
