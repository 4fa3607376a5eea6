//! WiFi credentials and their file format
//!
//! `WIFI.CFG` holds two lines: the SSID, then the password. No escaping;
//! surrounding whitespace is trimmed on load.

use alloc::string::String;
use core::fmt::Debug;

use log::{error, info};
use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::storage::Storage;

pub const CREDENTIALS_FILE: &str = "WIFI.CFG";

pub const MAX_SSID_LEN: usize = 32;
pub const MAX_PASSWORD_LEN: usize = 64;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialsError {
    #[error("SSID is empty")]
    MissingSsid,
    #[error("{0} is too long")]
    TooLong(&'static str),
    #[error("credential file {0} failed")]
    Io(&'static str),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct WifiCredentials {
    pub ssid: heapless::String<MAX_SSID_LEN>,
    pub password: heapless::String<MAX_PASSWORD_LEN>,
}

impl WifiCredentials {
    pub fn new(ssid: &str, password: &str) -> Result<Self, CredentialsError> {
        let ssid = ssid.trim();
        if ssid.is_empty() {
            return Err(CredentialsError::MissingSsid);
        }
        Ok(Self {
            ssid: heapless::String::try_from(ssid).map_err(|_| CredentialsError::TooLong("SSID"))?,
            password: heapless::String::try_from(password.trim())
                .map_err(|_| CredentialsError::TooLong("password"))?,
        })
    }

    /// Parse the credential file contents. A missing password line means an
    /// open network.
    pub fn parse(contents: &str) -> Result<Self, CredentialsError> {
        let mut lines = contents.lines();
        let ssid = lines.next().unwrap_or_default();
        let password = lines.next().unwrap_or_default();
        Self::new(ssid, password)
    }

    pub fn to_file_contents(&self) -> String {
        let mut contents = String::with_capacity(self.ssid.len() + self.password.len() + 2);
        contents.push_str(&self.ssid);
        contents.push('\n');
        contents.push_str(&self.password);
        contents.push('\n');
        contents
    }

    /// Load from [`CREDENTIALS_FILE`]. `Ok(None)` if the file does not exist.
    pub fn load<S: Storage>(storage: &mut S) -> Result<Option<Self>, CredentialsError> {
        let exists = storage.exists(CREDENTIALS_FILE).map_err(|e| {
            error!("Credential file stat failed: {:?}", e);
            CredentialsError::Io("stat")
        })?;
        if !exists {
            return Ok(None);
        }

        let mut raw = [0u8; MAX_SSID_LEN + MAX_PASSWORD_LEN + 16];
        let mut len = 0;
        while len < raw.len() {
            let n = storage
                .read_at(CREDENTIALS_FILE, len as u32, &mut raw[len..])
                .map_err(|e| {
                    error!("Credential file read failed: {:?}", e);
                    CredentialsError::Io("read")
                })?;
            if n == 0 {
                break;
            }
            len += n;
        }

        let contents = String::from_utf8_lossy(&raw[..len]);
        let credentials = Self::parse(&contents)?;
        info!("Loaded WiFi credentials for '{}'", credentials.ssid);
        Ok(Some(credentials))
    }

    /// Replace [`CREDENTIALS_FILE`] with these credentials.
    pub fn save<S: Storage>(&self, storage: &mut S) -> Result<(), CredentialsError> {
        storage.truncate(CREDENTIALS_FILE).map_err(|e| {
            error!("Credential file truncate failed: {:?}", e);
            CredentialsError::Io("truncate")
        })?;
        storage
            .append(CREDENTIALS_FILE, self.to_file_contents().as_bytes())
            .map_err(|e| {
                error!("Credential file write failed: {:?}", e);
                CredentialsError::Io("write")
            })?;
        info!("Saved WiFi credentials for '{}'", self.ssid);
        Ok(())
    }
}
