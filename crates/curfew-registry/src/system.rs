//! System-backed `RegistryStore` implementation.

use curfew_provider::{Hive, RegistryStore, StoreError};

/// Store that reads and writes the live registry of the current host.
///
/// Keys are opened per call and closed before returning, so the store holds no
/// OS handles and can move between threads freely.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRegistryStore;

impl SystemRegistryStore {
    pub fn new() -> Self {
        Self
    }

    /// Whether this build can reach a real registry.
    pub fn supported() -> bool {
        cfg!(windows)
    }
}

#[cfg(windows)]
impl RegistryStore for SystemRegistryStore {
    fn key_exists(&self, hive: Hive, path: &str) -> Result<bool, StoreError> {
        crate::win32::key_exists(hive, path)
    }

    fn create_key(&self, hive: Hive, path: &str) -> Result<(), StoreError> {
        crate::win32::create_key(hive, path)
    }

    fn read_dword(&self, hive: Hive, path: &str, name: &str) -> Result<Option<u32>, StoreError> {
        crate::win32::read_dword(hive, path, name)
    }

    fn write_dword(
        &self,
        hive: Hive,
        path: &str,
        name: &str,
        value: u32,
    ) -> Result<(), StoreError> {
        crate::win32::write_dword(hive, path, name, value)
    }

    fn delete_value(&self, hive: Hive, path: &str, name: &str) -> Result<(), StoreError> {
        crate::win32::delete_value(hive, path, name)
    }
}

#[cfg(not(windows))]
impl RegistryStore for SystemRegistryStore {
    fn key_exists(&self, hive: Hive, path: &str) -> Result<bool, StoreError> {
        unsupported(hive, path)
    }

    fn create_key(&self, hive: Hive, path: &str) -> Result<(), StoreError> {
        unsupported(hive, path)
    }

    fn read_dword(&self, hive: Hive, path: &str, _name: &str) -> Result<Option<u32>, StoreError> {
        unsupported(hive, path)
    }

    fn write_dword(
        &self,
        hive: Hive,
        path: &str,
        _name: &str,
        _value: u32,
    ) -> Result<(), StoreError> {
        unsupported(hive, path)
    }

    fn delete_value(&self, hive: Hive, path: &str, _name: &str) -> Result<(), StoreError> {
        unsupported(hive, path)
    }
}

#[cfg(not(windows))]
fn unsupported<T>(hive: Hive, path: &str) -> Result<T, StoreError> {
    log::debug!("registry access to {hive}\\{path} requested on a non-Windows host");
    Err(StoreError::Unsupported)
}

#[cfg(all(test, not(windows)))]
mod tests {
    use super::*;

    #[test]
    fn non_windows_hosts_report_unsupported() {
        let store = SystemRegistryStore::new();
        assert!(!SystemRegistryStore::supported());
        assert_eq!(
            store.read_dword(Hive::CurrentUser, r"Software\Curfew", "Flag"),
            Err(StoreError::Unsupported)
        );
        assert_eq!(
            store.create_key(Hive::CurrentUser, r"Software\Curfew"),
            Err(StoreError::Unsupported)
        );
    }
}
