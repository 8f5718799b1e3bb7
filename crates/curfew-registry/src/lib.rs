//! System provider for the Windows registry.
//!
//! Integrates with the host via the Win32 registry API (`RegCreateKeyExW`,
//! `RegQueryValueExW`, `RegSetValueExW`, `RegDeleteValueW`). Other platforms
//! get a store that reports `StoreError::Unsupported` on every call, so the
//! enforcement session fails closed instead of pretending to restrict.

mod system;
#[cfg(windows)]
mod win32;

pub use system::SystemRegistryStore;
