//! Thin wrappers around the Win32 registry API.
//!
//! Every call opens the narrowest access mask it needs and closes the handle
//! through `OwnedKey` before returning.

use curfew_provider::{Hive, StoreError};
use log::debug;
use std::ffi::OsStr;
use std::iter::once;
use std::os::windows::ffi::OsStrExt;
use std::ptr;
use windows_sys::Win32::Foundation::{
    ERROR_ACCESS_DENIED, ERROR_FILE_NOT_FOUND, ERROR_PATH_NOT_FOUND, ERROR_SUCCESS, WIN32_ERROR,
};
use windows_sys::Win32::System::Registry::{
    RegCloseKey, RegCreateKeyExW, RegDeleteValueW, RegOpenKeyExW, RegQueryValueExW,
    RegSetValueExW, HKEY, HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, KEY_QUERY_VALUE, KEY_SET_VALUE,
    REG_DWORD, REG_OPTION_NON_VOLATILE, REG_SAM_FLAGS, REG_VALUE_TYPE,
};

struct OwnedKey(HKEY);

impl Drop for OwnedKey {
    fn drop(&mut self) {
        // SAFETY: the handle was produced by a successful open/create call and is closed once.
        unsafe {
            RegCloseKey(self.0);
        }
    }
}

pub(crate) fn key_exists(hive: Hive, path: &str) -> Result<bool, StoreError> {
    match open(hive, path, KEY_QUERY_VALUE) {
        Ok(_) => Ok(true),
        Err(StoreError::KeyNotFound(_)) => Ok(false),
        Err(err) => Err(err),
    }
}

pub(crate) fn create_key(hive: Hive, path: &str) -> Result<(), StoreError> {
    let subkey = wide(path);
    let mut handle: HKEY = ptr::null_mut();
    let mut disposition = 0u32;
    // SAFETY: `subkey` is NUL-terminated and outlives the call; out-pointers are valid locals.
    let status = unsafe {
        RegCreateKeyExW(
            root(hive),
            subkey.as_ptr(),
            0,
            ptr::null(),
            REG_OPTION_NON_VOLATILE,
            KEY_QUERY_VALUE | KEY_SET_VALUE,
            ptr::null(),
            &mut handle,
            &mut disposition,
        )
    };
    check(status, hive, path)?;
    let _key = OwnedKey(handle);
    debug!("registry key {hive}\\{path} ready (disposition {disposition})");
    Ok(())
}

pub(crate) fn read_dword(hive: Hive, path: &str, name: &str) -> Result<Option<u32>, StoreError> {
    let key = match open(hive, path, KEY_QUERY_VALUE) {
        Ok(key) => key,
        Err(StoreError::KeyNotFound(_)) => return Ok(None),
        Err(err) => return Err(err),
    };
    let value_name = wide(name);

    let mut kind: REG_VALUE_TYPE = 0;
    let mut size = 0u32;
    // SAFETY: a size query with a null data pointer is the documented way to learn type/length.
    let status = unsafe {
        RegQueryValueExW(
            key.0,
            value_name.as_ptr(),
            ptr::null(),
            &mut kind,
            ptr::null_mut(),
            &mut size,
        )
    };
    if status == ERROR_FILE_NOT_FOUND {
        return Ok(None);
    }
    check(status, hive, path)?;
    if kind != REG_DWORD || size != 4 {
        return Err(StoreError::TypeMismatch {
            name: name.to_string(),
            found: format!("type {kind} ({size} bytes)"),
        });
    }

    let mut data = [0u8; 4];
    let mut size = data.len() as u32;
    // SAFETY: `data` provides exactly `size` writable bytes.
    let status = unsafe {
        RegQueryValueExW(
            key.0,
            value_name.as_ptr(),
            ptr::null(),
            &mut kind,
            data.as_mut_ptr(),
            &mut size,
        )
    };
    if status == ERROR_FILE_NOT_FOUND {
        return Ok(None);
    }
    check(status, hive, path)?;
    Ok(Some(u32::from_le_bytes(data)))
}

pub(crate) fn write_dword(
    hive: Hive,
    path: &str,
    name: &str,
    value: u32,
) -> Result<(), StoreError> {
    let key = open(hive, path, KEY_SET_VALUE)?;
    let value_name = wide(name);
    let data = value.to_le_bytes();
    // SAFETY: `data` is 4 readable bytes matching REG_DWORD.
    let status = unsafe {
        RegSetValueExW(
            key.0,
            value_name.as_ptr(),
            0,
            REG_DWORD,
            data.as_ptr(),
            data.len() as u32,
        )
    };
    check(status, hive, path)
}

pub(crate) fn delete_value(hive: Hive, path: &str, name: &str) -> Result<(), StoreError> {
    let key = match open(hive, path, KEY_SET_VALUE) {
        Ok(key) => key,
        Err(StoreError::KeyNotFound(_)) => return Ok(()),
        Err(err) => return Err(err),
    };
    let value_name = wide(name);
    // SAFETY: `value_name` is NUL-terminated and the key handle is open.
    let status = unsafe { RegDeleteValueW(key.0, value_name.as_ptr()) };
    if status == ERROR_FILE_NOT_FOUND {
        return Ok(());
    }
    check(status, hive, path)
}

fn open(hive: Hive, path: &str, access: REG_SAM_FLAGS) -> Result<OwnedKey, StoreError> {
    let subkey = wide(path);
    let mut handle: HKEY = ptr::null_mut();
    // SAFETY: `subkey` is NUL-terminated and `handle` is a valid out-pointer.
    let status = unsafe { RegOpenKeyExW(root(hive), subkey.as_ptr(), 0, access, &mut handle) };
    check(status, hive, path)?;
    Ok(OwnedKey(handle))
}

fn root(hive: Hive) -> HKEY {
    match hive {
        Hive::CurrentUser => HKEY_CURRENT_USER,
        Hive::LocalMachine => HKEY_LOCAL_MACHINE,
    }
}

fn check(status: WIN32_ERROR, hive: Hive, path: &str) -> Result<(), StoreError> {
    let target = format!("{hive}\\{path}");
    match status {
        ERROR_SUCCESS => Ok(()),
        ERROR_FILE_NOT_FOUND | ERROR_PATH_NOT_FOUND => Err(StoreError::KeyNotFound(target)),
        ERROR_ACCESS_DENIED => Err(StoreError::AccessDenied(target)),
        code => Err(StoreError::Os { target, code }),
    }
}

fn wide(value: &str) -> Vec<u16> {
    OsStr::new(value).encode_wide().chain(once(0)).collect()
}
