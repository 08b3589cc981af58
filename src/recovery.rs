//! Recovery register module
//!
//! A tiny value in reset-surviving scratch memory that records the active
//! server port (or 0). It survives a soft reset but not a power cycle, so a
//! restart with a valid nonzero value means a server was running and should
//! be resumed. Layout: 3-byte marker, byte-sum checksum, i32 little-endian.

use log::warn;

/// Size of the scratch region in bytes
pub const SCRATCH_LEN: usize = 8;

const MARKER: [u8; 3] = *b"RUM";

/// Reset-surviving scratch memory region
pub trait ScratchRegion {
    /// Read the region; false if the backing memory is unreadable
    fn read(&mut self, buffer: &mut [u8; SCRATCH_LEN]) -> bool;

    /// Write the region; false if the backing memory is unwritable
    fn write(&mut self, data: &[u8; SCRATCH_LEN]) -> bool;
}

/// The recovery register on top of its scratch region
pub struct RecoveryRegister<R: ScratchRegion> {
    region: R,
}

impl<R: ScratchRegion> RecoveryRegister<R> {
    pub fn new(region: R) -> Self {
        Self { region }
    }

    /// Store a value, tagging it with the marker and checksum
    pub fn store(&mut self, value: i32) {
        let mut record = [0u8; SCRATCH_LEN];
        record[..3].copy_from_slice(&MARKER);
        record[4..].copy_from_slice(&value.to_le_bytes());
        record[3] = checksum(&record[4..]);

        if !self.region.write(&record) {
            warn!("Failed to write recovery register");
        }
    }

    /// Read back the stored value; `None` if the marker or checksum
    /// mismatches (no prior state)
    pub fn load(&mut self) -> Option<i32> {
        let mut record = [0u8; SCRATCH_LEN];
        if !self.region.read(&mut record) {
            return None;
        }

        if record[..3] != MARKER || record[3] != checksum(&record[4..]) {
            return None;
        }

        Some(i32::from_le_bytes([record[4], record[5], record[6], record[7]]))
    }
}

fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
}

/// File-backed scratch region for host builds
///
/// A file in the temp directory survives a process restart the way RTC
/// memory survives a soft reset.
pub struct FileScratch {
    path: std::path::PathBuf,
}

impl FileScratch {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ScratchRegion for FileScratch {
    fn read(&mut self, buffer: &mut [u8; SCRATCH_LEN]) -> bool {
        match std::fs::read(&self.path) {
            Ok(data) if data.len() == SCRATCH_LEN => {
                buffer.copy_from_slice(&data);
                true
            }
            _ => false,
        }
    }

    fn write(&mut self, data: &[u8; SCRATCH_LEN]) -> bool {
        std::fs::write(&self.path, data).is_ok()
    }
}

#[cfg(feature = "esp32")]
pub use esp::RtcScratch;

#[cfg(feature = "esp32")]
mod esp {
    use super::{ScratchRegion, SCRATCH_LEN};

    // survives a soft reset, zeroed on power-up
    #[link_section = ".rtc_noinit"]
    static mut RTC_SCRATCH: [u8; SCRATCH_LEN] = [0; SCRATCH_LEN];

    /// RTC-memory scratch region
    pub struct RtcScratch;

    impl ScratchRegion for RtcScratch {
        fn read(&mut self, buffer: &mut [u8; SCRATCH_LEN]) -> bool {
            unsafe {
                buffer.copy_from_slice(&*core::ptr::addr_of!(RTC_SCRATCH));
            }
            true
        }

        fn write(&mut self, data: &[u8; SCRATCH_LEN]) -> bool {
            unsafe {
                (*core::ptr::addr_of_mut!(RTC_SCRATCH)).copy_from_slice(data);
            }
            true
        }
    }
}
