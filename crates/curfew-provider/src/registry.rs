//! Provider contract for hierarchical key/value stores shaped like the Windows registry.

use std::fmt;
use thiserror::Error;

/// Root hive a registry path is resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Hive {
    CurrentUser,
    LocalMachine,
}

impl Hive {
    /// Short form used in log lines and diagnostics (`HKCU`, `HKLM`).
    pub fn short_name(self) -> &'static str {
        match self {
            Hive::CurrentUser => "HKCU",
            Hive::LocalMachine => "HKLM",
        }
    }
}

impl fmt::Display for Hive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Fully-qualified location of a single persisted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistryKey {
    pub hive: Hive,
    /// Key path below the hive, backslash separated.
    pub path: &'static str,
    /// Name of the value stored under `path`.
    pub value_name: &'static str,
}

impl fmt::Display for RegistryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\\{}\\{}", self.hive, self.path, self.value_name)
    }
}

/// Failures surfaced by store implementations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("access denied to {0}")]
    AccessDenied(String),

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("value {name} has type {found}, expected a 32-bit integer")]
    TypeMismatch { name: String, found: String },

    #[error("registry call failed for {target} (code {code})")]
    Os { target: String, code: u32 },

    #[error("registry access is not supported on this platform")]
    Unsupported,
}

/// Abstraction over the persisted store the restriction lives in.
///
/// Every operation addresses a single key or value; implementations must make
/// each call atomic at that granularity. Methods take `&self` so stores can be
/// shared between the controller and diagnostics.
pub trait RegistryStore {
    /// Return whether the key at `path` exists.
    fn key_exists(&self, hive: Hive, path: &str) -> Result<bool, StoreError>;

    /// Create the key at `path` (and any missing parents). Existing keys are left untouched.
    fn create_key(&self, hive: Hive, path: &str) -> Result<(), StoreError>;

    /// Read a 32-bit integer value. Returns `Ok(None)` when the key or value is absent and
    /// `StoreError::TypeMismatch` when the value exists with another type.
    fn read_dword(&self, hive: Hive, path: &str, name: &str) -> Result<Option<u32>, StoreError>;

    /// Write a 32-bit integer value under an existing key.
    fn write_dword(&self, hive: Hive, path: &str, name: &str, value: u32)
        -> Result<(), StoreError>;

    /// Remove a value. Removing an absent value succeeds.
    fn delete_value(&self, hive: Hive, path: &str, name: &str) -> Result<(), StoreError>;
}

impl<T> RegistryStore for Box<T>
where
    T: RegistryStore + ?Sized,
{
    fn key_exists(&self, hive: Hive, path: &str) -> Result<bool, StoreError> {
        (**self).key_exists(hive, path)
    }

    fn create_key(&self, hive: Hive, path: &str) -> Result<(), StoreError> {
        (**self).create_key(hive, path)
    }

    fn read_dword(&self, hive: Hive, path: &str, name: &str) -> Result<Option<u32>, StoreError> {
        (**self).read_dword(hive, path, name)
    }

    fn write_dword(
        &self,
        hive: Hive,
        path: &str,
        name: &str,
        value: u32,
    ) -> Result<(), StoreError> {
        (**self).write_dword(hive, path, name, value)
    }

    fn delete_value(&self, hive: Hive, path: &str, name: &str) -> Result<(), StoreError> {
        (**self).delete_value(hive, path, name)
    }
}
