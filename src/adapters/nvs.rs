//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements both [`ConfigPort`] and [`StoragePort`] for the kiln node.
//!
//! - Config: one postcard blob under `kiln::syscfg`, validated before it
//!   is written and again after it is read back.
//! - Schedules: one fixed-size record per slot in the `sched` namespace,
//!   written and read through [`StoragePort`].
//! - ESP-IDF NVS commits are atomic per `nvs_commit()`; the host backend
//!   is an in-memory map used by tests and the simulator.

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::SystemConfig;

#[cfg(not(target_os = "espidf"))]
use std::{cell::RefCell, collections::HashMap};

const CONFIG_NAMESPACE: &str = "kiln";
const CONFIG_KEY: &str = "syscfg";

/// Largest config blob accepted.
const MAX_BLOB_SIZE: usize = 1024;

/// NVS keys and namespaces are limited to 15 characters.
const NVS_KEY_MAX: usize = 15;

fn check_name(name: &str) -> Result<(), StorageError> {
    if name.is_empty() || name.len() > NVS_KEY_MAX {
        return Err(StorageError::IoError);
    }
    Ok(())
}

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    blobs: RefCell<HashMap<(String, String), Vec<u8>>>,
}

impl NvsAdapter {
    /// Bring up NVS flash.  A full or outdated partition is erased once
    /// and initialised again.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        device::init_flash()?;

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: in-memory backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            blobs: RefCell::new(HashMap::new()),
        })
    }

    // ── Backend primitives ────────────────────────────────────

    #[cfg(not(target_os = "espidf"))]
    fn get(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        check_name(namespace)?;
        check_name(key)?;
        let blobs = self.blobs.borrow();
        let blob = blobs
            .get(&(namespace.to_owned(), key.to_owned()))
            .ok_or(StorageError::NotFound)?;
        let n = blob.len().min(buf.len());
        buf[..n].copy_from_slice(&blob[..n]);
        Ok(n)
    }

    #[cfg(not(target_os = "espidf"))]
    fn put(&self, namespace: &str, key: &str, data: &[u8]) -> Result<usize, StorageError> {
        check_name(namespace)?;
        check_name(key)?;
        self.blobs
            .borrow_mut()
            .insert((namespace.to_owned(), key.to_owned()), data.to_vec());
        Ok(data.len())
    }

    #[cfg(not(target_os = "espidf"))]
    fn erase(&self, namespace: &str, key: &str) -> Result<(), StorageError> {
        check_name(namespace)?;
        check_name(key)?;
        self.blobs
            .borrow_mut()
            .remove(&(namespace.to_owned(), key.to_owned()));
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn contains(&self, namespace: &str, key: &str) -> bool {
        check_name(namespace).is_ok()
            && check_name(key).is_ok()
            && self
                .blobs
                .borrow()
                .contains_key(&(namespace.to_owned(), key.to_owned()))
    }

    #[cfg(target_os = "espidf")]
    fn get(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        device::get_blob(namespace, key, buf)
    }

    #[cfg(target_os = "espidf")]
    fn put(&self, namespace: &str, key: &str, data: &[u8]) -> Result<usize, StorageError> {
        device::set_blob(namespace, key, data)
    }

    #[cfg(target_os = "espidf")]
    fn erase(&self, namespace: &str, key: &str) -> Result<(), StorageError> {
        device::erase_key(namespace, key)
    }

    #[cfg(target_os = "espidf")]
    fn contains(&self, namespace: &str, key: &str) -> bool {
        device::find_key(namespace, key)
    }
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let mut buf = [0u8; MAX_BLOB_SIZE];
        let len = match self.get(CONFIG_NAMESPACE, CONFIG_KEY, &mut buf) {
            Ok(len) => len,
            Err(StorageError::NotFound) => {
                info!("NvsAdapter: no stored config, using defaults");
                return Ok(SystemConfig::default());
            }
            Err(e) => {
                warn!("NvsAdapter: config read failed ({}), using defaults", e);
                return Ok(SystemConfig::default());
            }
        };
        let cfg: SystemConfig =
            postcard::from_bytes(&buf[..len]).map_err(|_| ConfigError::Corrupted)?;
        if let Err(e) = cfg.validate() {
            warn!("NvsAdapter: stored config out of range ({})", e);
            return Err(ConfigError::Corrupted);
        }
        info!("NvsAdapter: config loaded ({} bytes)", len);
        Ok(cfg)
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        if bytes.len() > MAX_BLOB_SIZE {
            return Err(ConfigError::StorageFull);
        }
        match self.put(CONFIG_NAMESPACE, CONFIG_KEY, &bytes) {
            Ok(_) => {
                info!("NvsAdapter: config saved ({} bytes)", bytes.len());
                Ok(())
            }
            Err(StorageError::Full) => Err(ConfigError::StorageFull),
            Err(e) => {
                warn!("NvsAdapter: config write failed ({})", e);
                Err(ConfigError::IoError)
            }
        }
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        self.get(namespace, key, buf)
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<usize, StorageError> {
        self.put(namespace, key, data)
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.erase(namespace, key)
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.contains(namespace, key)
    }
}

// ── ESP-IDF backend ───────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod device {
    use esp_idf_svc::sys::*;
    use log::{info, warn};

    use super::{NVS_KEY_MAX, check_name};
    use crate::app::ports::{ConfigError, StorageError};

    pub(super) fn init_flash() -> Result<(), ConfigError> {
        // SAFETY: called once from the main task before any other NVS access.
        let mut ret = unsafe { nvs_flash_init() };
        if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
            warn!("NVS: partition full or outdated, erasing");
            // SAFETY: no handle is open yet.
            ret = unsafe { nvs_flash_erase() };
            if ret == ESP_OK {
                ret = unsafe { nvs_flash_init() };
            }
        }
        if ret != ESP_OK {
            warn!("NVS: init failed ({})", ret);
            return Err(ConfigError::IoError);
        }
        info!("NvsAdapter: ESP-IDF NVS ready");
        Ok(())
    }

    /// NUL-terminated copy of a namespace or key.
    fn c_name(name: &str) -> Result<[u8; NVS_KEY_MAX + 1], StorageError> {
        check_name(name)?;
        let mut buf = [0u8; NVS_KEY_MAX + 1];
        buf[..name.len()].copy_from_slice(name.as_bytes());
        Ok(buf)
    }

    fn to_storage_error(code: esp_err_t) -> StorageError {
        match code {
            ESP_ERR_NVS_NOT_FOUND => StorageError::NotFound,
            ESP_ERR_NVS_NOT_ENOUGH_SPACE => StorageError::Full,
            _ => StorageError::IoError,
        }
    }

    fn check(code: esp_err_t) -> Result<(), StorageError> {
        if code == ESP_OK {
            Ok(())
        } else {
            Err(to_storage_error(code))
        }
    }

    /// Run `f` on an open handle of `namespace`; the handle is always closed.
    fn with_handle<T>(
        namespace: &str,
        mode: nvs_open_mode_t,
        f: impl FnOnce(nvs_handle_t) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let ns = c_name(namespace)?;
        let mut handle: nvs_handle_t = 0;
        // SAFETY: `ns` is NUL-terminated and outlives the call.
        check(unsafe { nvs_open(ns.as_ptr().cast(), mode, &mut handle) })?;
        let result = f(handle);
        // SAFETY: `handle` was opened above and is not used afterwards.
        unsafe { nvs_close(handle) };
        result
    }

    pub(super) fn get_blob(
        namespace: &str,
        key: &str,
        buf: &mut [u8],
    ) -> Result<usize, StorageError> {
        let key = c_name(key)?;
        with_handle(namespace, nvs_open_mode_t_NVS_READONLY, |h| {
            let mut size = buf.len();
            // SAFETY: `buf` is valid for `size` bytes.
            check(unsafe { nvs_get_blob(h, key.as_ptr().cast(), buf.as_mut_ptr().cast(), &mut size) })?;
            Ok(size)
        })
    }

    pub(super) fn set_blob(namespace: &str, key: &str, data: &[u8]) -> Result<usize, StorageError> {
        let key = c_name(key)?;
        with_handle(namespace, nvs_open_mode_t_NVS_READWRITE, |h| {
            // SAFETY: `data` is valid for `data.len()` bytes.
            check(unsafe { nvs_set_blob(h, key.as_ptr().cast(), data.as_ptr().cast(), data.len()) })?;
            check(unsafe { nvs_commit(h) })?;
            Ok(data.len())
        })
    }

    pub(super) fn erase_key(namespace: &str, key: &str) -> Result<(), StorageError> {
        let key = c_name(key)?;
        with_handle(namespace, nvs_open_mode_t_NVS_READWRITE, |h| {
            match check(unsafe { nvs_erase_key(h, key.as_ptr().cast()) }) {
                Ok(()) | Err(StorageError::NotFound) => {}
                Err(e) => return Err(e),
            }
            check(unsafe { nvs_commit(h) })
        })
    }

    pub(super) fn find_key(namespace: &str, key: &str) -> bool {
        let Ok(key) = c_name(key) else {
            return false;
        };
        with_handle(namespace, nvs_open_mode_t_NVS_READONLY, |h| {
            check(unsafe { nvs_find_key(h, key.as_ptr().cast(), core::ptr::null_mut()) })
        })
        .is_ok()
    }
}
