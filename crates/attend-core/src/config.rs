//! Device configuration
//!
//! Everything tunable lives here with its default. The firmware uses the
//! defaults (plus build-time WiFi secrets); the simulator may override parts
//! from the environment.

use alloc::format;
use alloc::string::String;

use serde::{Deserialize, Serialize};

use crate::credentials::WifiCredentials;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct DeviceConfig {
    pub input: InputConfig,
    pub ledger: LedgerConfig,
    pub sync: SyncConfig,
    pub sensor: SensorConfig,
    pub prompt: PromptConfig,
    /// Used when no credential file exists yet
    pub fallback_credentials: Option<WifiCredentials>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct InputConfig {
    /// Longest accepted command line, in bytes
    pub max_line_len: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self { max_line_len: 128 }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LedgerConfig {
    /// Date stamped on records until the operator sets one
    pub default_date: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            default_date: String::from("19/5"),
        }
    }
}

/// Where uploads go
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SheetEndpoint {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl SheetEndpoint {
    /// The endpoint as a URL. Port 443 means HTTPS, anything else plain HTTP.
    pub fn url(&self) -> String {
        match self.port {
            443 => format!("https://{}{}", self.host, self.path),
            80 => format!("http://{}{}", self.host, self.path),
            port => format!("http://{}:{}{}", self.host, port, self.path),
        }
    }
}

impl Default for SheetEndpoint {
    fn default() -> Self {
        Self {
            host: String::from("script.google.com"),
            port: 80,
            path: String::from("/macros/s/DEPLOYMENT_ID/exec"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SyncConfig {
    pub endpoint: SheetEndpoint,
    /// `command` field of the upload body
    pub command: String,
    /// `sheet_name` field of the upload body
    pub sheet_name: String,
    pub connect_timeout_ms: u32,
    pub response_timeout_ms: u32,
    /// Treat an upload with no response before the timeout as delivered.
    ///
    /// Can mask a real delivery failure; the records are then never retried.
    pub optimistic_timeout: bool,
    /// Only count 2xx/3xx replies as delivered.
    ///
    /// Off by default: any reply from the server means the batch arrived.
    pub strict_status: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            endpoint: SheetEndpoint::default(),
            command: String::from("batch_attendance"),
            sheet_name: String::from("Attendance"),
            connect_timeout_ms: 20_000,
            response_timeout_ms: 20_000,
            optimistic_timeout: true,
            strict_status: false,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SensorConfig {
    pub address: u32,
    pub password: u32,
    /// Template slots; enrollment ids run 1..=capacity
    pub capacity: u16,
    pub response_timeout_ms: u32,
    /// How long enrollment waits for a finger to be placed or lifted
    pub finger_timeout_ms: u32,
    pub post_match_delay_ms: u32,
    pub scan_interval_ms: u32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            address: 0xFFFF_FFFF,
            password: 0,
            capacity: 127,
            response_timeout_ms: 1_000,
            finger_timeout_ms: 30_000,
            post_match_delay_ms: 2_000,
            scan_interval_ms: 100,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct PromptConfig {
    /// A prompt with no answer after this long counts as cancelled
    pub timeout_ms: u32,
    /// Delay between input polls while waiting
    pub poll_interval_ms: u32,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 60_000,
            poll_interval_ms: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url_follows_port() {
        let mut endpoint = SheetEndpoint {
            host: String::from("script.google.com"),
            port: 443,
            path: String::from("/macros/s/abc/exec"),
        };
        assert_eq!(endpoint.url(), "https://script.google.com/macros/s/abc/exec");

        endpoint.port = 80;
        assert_eq!(endpoint.url(), "http://script.google.com/macros/s/abc/exec");

        endpoint.host = String::from("127.0.0.1");
        endpoint.port = 8080;
        assert_eq!(endpoint.url(), "http://127.0.0.1:8080/macros/s/abc/exec");
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: DeviceConfig =
            serde_json::from_str(r#"{"sync":{"optimistic_timeout":false}}"#).unwrap();
        assert!(!config.sync.optimistic_timeout);
        assert!(!config.sync.strict_status);
        assert_eq!(config.sync.command, "batch_attendance");
        assert_eq!(config.input.max_line_len, 128);
        assert_eq!(config.sensor.capacity, 127);
    }

    #[test]
    fn test_round_trip() {
        let config = DeviceConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(serde_json::from_str::<DeviceConfig>(&json).unwrap(), config);
    }
}
