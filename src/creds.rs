//! Credential record module
//!
//! WiFi credentials persist as a fixed 99-byte record: a 16-bit additive
//! integrity tag, the NUL-padded password, the NUL-padded SSID. A record
//! whose tag does not match is treated as absent.

use heapless::String;
use log::{info, warn};

use crate::error::Result;
use crate::storage::Storage;

/// Max length of a WiFi SSID in bytes
pub const SSID_MAX: usize = 32;
/// Max length of a WiFi password in bytes
pub const PASS_MAX: usize = 63;

const PASS_FIELD: usize = PASS_MAX + 1;
const SSID_FIELD: usize = SSID_MAX + 1;
/// Stored record: tag (2, LE) + password field + ssid field
pub const RECORD_LEN: usize = 2 + PASS_FIELD + SSID_FIELD;

const TAG_SEED: u16 = 14337;

/// One SSID/password pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub ssid: String<SSID_MAX>,
    pub password: String<PASS_MAX>,
}

impl Credentials {
    /// Integrity tag over the zero-padded ssid and password fields
    fn tag(pass_field: &[u8; PASS_FIELD], ssid_field: &[u8; SSID_FIELD]) -> u16 {
        let mut tag = 0u16;
        for &b in ssid_field.iter() {
            tag = tag.wrapping_add(b as u16);
        }
        for &b in pass_field.iter() {
            tag = tag.wrapping_add(b as u16);
        }
        tag.wrapping_add(TAG_SEED)
    }

    /// Encode into the fixed persistence layout
    pub fn encode(&self) -> [u8; RECORD_LEN] {
        let mut pass_field = [0u8; PASS_FIELD];
        let mut ssid_field = [0u8; SSID_FIELD];
        pass_field[..self.password.len()].copy_from_slice(self.password.as_bytes());
        ssid_field[..self.ssid.len()].copy_from_slice(self.ssid.as_bytes());

        let tag = Self::tag(&pass_field, &ssid_field);

        let mut record = [0u8; RECORD_LEN];
        record[..2].copy_from_slice(&tag.to_le_bytes());
        record[2..2 + PASS_FIELD].copy_from_slice(&pass_field);
        record[2 + PASS_FIELD..].copy_from_slice(&ssid_field);
        record
    }

    /// Decode a stored record; `None` if the tag mismatches or the record
    /// is malformed
    pub fn decode(record: &[u8]) -> Option<Self> {
        if record.len() < RECORD_LEN {
            return None;
        }

        let stored = u16::from_le_bytes([record[0], record[1]]);

        let mut pass_field = [0u8; PASS_FIELD];
        let mut ssid_field = [0u8; SSID_FIELD];
        pass_field.copy_from_slice(&record[2..2 + PASS_FIELD]);
        ssid_field.copy_from_slice(&record[2 + PASS_FIELD..RECORD_LEN]);

        if stored != Self::tag(&pass_field, &ssid_field) {
            return None;
        }

        Some(Self {
            ssid: field_str(&ssid_field)?,
            password: field_str(&pass_field)?,
        })
    }
}

fn field_str<const CAP: usize>(field: &[u8]) -> Option<String<CAP>> {
    let len = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    let text = core::str::from_utf8(&field[..len.min(CAP)]).ok()?;
    String::try_from(text).ok()
}

/// Credential store: the cached pair plus its durable backing
pub struct CredentialStore<S: Storage> {
    storage: S,
    current: Option<Credentials>,
}

impl<S: Storage> CredentialStore<S> {
    /// Load the stored pair, falling back to none on a failed integrity check
    pub fn open(mut storage: S) -> Self {
        let mut record = [0u8; RECORD_LEN];
        let current = match storage.load(&mut record) {
            Ok(Some(len)) => {
                let decoded = Credentials::decode(&record[..len]);
                if decoded.is_none() {
                    warn!("Stored credentials failed the integrity check, starting empty");
                }
                decoded
            }
            Ok(None) => {
                info!("No stored credentials");
                None
            }
            Err(e) => {
                warn!("Failed to load credentials: {}", e);
                None
            }
        };

        Self { storage, current }
    }

    /// The active pair, if any
    pub fn current(&self) -> Option<&Credentials> {
        self.current.as_ref()
    }

    /// Replace the pair and persist it before returning
    pub fn replace(&mut self, creds: Credentials) -> Result<()> {
        self.storage.save(&creds.encode())?;
        info!("Credentials for \"{}\" saved", creds.ssid);
        self.current = Some(creds);
        Ok(())
    }
}
