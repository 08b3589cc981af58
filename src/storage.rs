//! Storage module
//!
//! This module provides the durable blob store used for the credential
//! record: NVS on the device, a plain file on host builds.

use log::warn;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Durable fixed-record blob store
pub trait Storage {
    /// Load the record into `buffer`, returning the stored length, or
    /// `None` if no record exists
    fn load(&mut self, buffer: &mut [u8]) -> Result<Option<usize>>;

    /// Replace the record
    fn save(&mut self, data: &[u8]) -> Result<()>;
}

/// File-backed store for host builds
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Storage for FileStorage {
    fn load(&mut self, buffer: &mut [u8]) -> Result<Option<usize>> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                warn!("Error reading {}: {}", self.path.display(), e);
                return Ok(None);
            }
        };

        let len = data.len().min(buffer.len());
        buffer[..len].copy_from_slice(&data[..len]);
        Ok(Some(len))
    }

    fn save(&mut self, data: &[u8]) -> Result<()> {
        fs::write(&self.path, data)
            .map_err(|e| Error::StorageError(format!("Failed to write {}: {}", self.path.display(), e)))
    }
}

#[cfg(feature = "esp32")]
pub use esp::NvsStorage;

#[cfg(feature = "esp32")]
mod esp {
    use super::Storage;
    use crate::error::{Error, Result};
    use esp_idf_svc::nvs::{EspCustomNvsPartition, EspNvs, NvsCustom};
    use log::warn;

    /// Key for the credential record in NVS
    const CREDS_KEY: &str = "creds";

    /// NVS-backed store
    pub struct NvsStorage {
        nvs: EspNvs<NvsCustom>,
    }

    impl NvsStorage {
        /// Open the application namespace on the custom NVS partition
        pub fn new() -> Result<Self> {
            let partition = EspCustomNvsPartition::take("nvs")
                .map_err(|e| Error::StorageError(format!("Failed to take custom NVS partition: {}", e)))?;

            let nvs = EspNvs::new(partition, "modem_cfg", true)
                .map_err(|e| Error::StorageError(format!("Failed to open NVS namespace: {}", e)))?;

            Ok(Self { nvs })
        }
    }

    impl Storage for NvsStorage {
        fn load(&mut self, buffer: &mut [u8]) -> Result<Option<usize>> {
            match self.nvs.get_raw(CREDS_KEY, buffer) {
                Ok(Some(data)) => Ok(Some(data.len())),
                Ok(None) => Ok(None),
                Err(e) => {
                    warn!("Error reading credentials from NVS: {}", e);
                    Ok(None)
                }
            }
        }

        fn save(&mut self, data: &[u8]) -> Result<()> {
            self.nvs
                .set_raw(CREDS_KEY, data)
                .map(|_| ())
                .map_err(|e| Error::StorageError(format!("Failed to save credentials to NVS: {}", e)))
        }
    }
}
