//! WiFi credentials baked in at build time from `.env`.
//!
//! Only used until the operator saves credentials from the menu.

use attend_core::credentials::WifiCredentials;
use log::warn;

pub const SSID: &str = env!("WIFI_SSID");
pub const PASSWORD: &str = env!("WIFI_PASSWORD");

/// `None` when the build had no SSID.
pub fn fallback_credentials() -> Option<WifiCredentials> {
    if SSID.is_empty() {
        return None;
    }
    WifiCredentials::new(SSID, PASSWORD)
        .inspect_err(|e| warn!("Build-time WiFi credentials unusable: {}", e))
        .ok()
}
