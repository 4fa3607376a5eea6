//! Desktop simulator for the attend-rs fingerprint attendance device.
//!
//! Runs the device menu against host stand-ins for every peripheral so the
//! flows can be exercised without hardware.
//!
//! | Device part        | Simulator                                   |
//! |--------------------|---------------------------------------------|
//! | UART console       | this terminal (stdin / stdout)              |
//! | BLE UART service   | TCP socket, `ATTEND_SIM_WIRELESS_ADDR`      |
//! | SD card            | a directory (first argument or `ATTEND_DATA_DIR`) |
//! | R30x sensor        | mock, matches every `ATTEND_SIM_MATCH_EVERY`th scan |
//! | WiFi + HTTP        | `reqwest`, HTTPS on port 443; `ATTEND_SIM_OFFLINE=1` fails to join |
//! | Status LED         | log lines                                   |
//!
//! An optional `attend.json` in the data directory overrides any part of the
//! device configuration.

mod fs_storage;
mod http_client;
mod mock_sensor;
mod stdio;
mod wireless;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use attend_core::app::{App, Devices, Platform};
use attend_core::config::DeviceConfig;
use attend_core::indicator::StatusIndicator;
use attend_core::transport::ChannelLink;
use embassy_futures::block_on;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embedded_hal_async::delay::DelayNs;
use log::{error, info, warn};

use fs_storage::FsStorage;
use http_client::HostNetwork;
use mock_sensor::MockSensor;
use stdio::StdioSerial;
use wireless::LINK_DEPTH;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const DEFAULT_DATA_DIR: &str = "attend-data";
const DEFAULT_WIRELESS_ADDR: &str = "127.0.0.1:7878";
const DEFAULT_MATCH_EVERY: u32 = 50;
const CONFIG_FILE: &str = "attend.json";

// ---------------------------------------------------------------------------
// Host peripherals
// ---------------------------------------------------------------------------

/// `thread::sleep` as an async delay; the loop is single threaded anyway.
struct StdDelay;

impl DelayNs for StdDelay {
    async fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(u64::from(ns)));
    }
}

struct LogIndicator;

impl StatusIndicator for LogIndicator {
    async fn success(&mut self) {
        info!("LED: green");
    }

    async fn failure(&mut self) {
        info!("LED: red");
    }

    async fn waiting(&mut self, on: bool) {
        info!("LED: blue {}", if on { "on" } else { "off" });
    }
}

struct SimPlatform;

impl Platform for SimPlatform {
    type Storage = FsStorage;
    type Serial = StdioSerial;
    type Wireless = ChannelLink<'static, CriticalSectionRawMutex, LINK_DEPTH>;
    type Sensor = MockSensor;
    type Network = HostNetwork;
    type Indicator = LogIndicator;
    type Delay = StdDelay;
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

fn data_dir() -> PathBuf {
    env::args_os()
        .nth(1)
        .or_else(|| env::var_os("ATTEND_DATA_DIR"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

fn load_config(dir: &Path) -> DeviceConfig {
    let path = dir.join(CONFIG_FILE);
    let Ok(text) = fs::read_to_string(&path) else {
        return DeviceConfig::default();
    };
    match serde_json::from_str(&text) {
        Ok(config) => {
            info!("Loaded configuration from {}", path.display());
            config
        }
        Err(e) => {
            warn!("Ignoring {}: {}", path.display(), e);
            DeviceConfig::default()
        }
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name).is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    env_logger::init();
    info!("Starting attend-rs simulator");

    let dir = data_dir();
    let storage = match FsStorage::open(&dir) {
        Ok(storage) => storage,
        Err(e) => {
            error!("Cannot use data directory {}: {}", dir.display(), e);
            return ExitCode::FAILURE;
        }
    };
    info!("Data directory: {}", storage.root().display());

    let config = load_config(&dir);

    let wireless_addr =
        env::var("ATTEND_SIM_WIRELESS_ADDR").unwrap_or_else(|_| DEFAULT_WIRELESS_ADDR.into());
    if let Err(e) = wireless::spawn(&wireless_addr, &wireless::LINK) {
        warn!("Wireless link disabled: {}", e);
    }

    let match_every = env::var("ATTEND_SIM_MATCH_EVERY")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_MATCH_EVERY);

    let network = match HostNetwork::new(&config.sync, env_flag("ATTEND_SIM_OFFLINE")) {
        Ok(network) => network,
        Err(e) => {
            error!("Cannot create HTTP client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let devices = Devices::<SimPlatform> {
        storage,
        serial: StdioSerial::spawn(),
        wireless: ChannelLink::new(&wireless::LINK),
        sensor: MockSensor::new(config.sensor.capacity, match_every),
        network,
        indicator: LogIndicator,
        delay: StdDelay,
    };

    let mut app = match block_on(App::boot(config, devices)) {
        Ok(app) => app,
        Err(e) => {
            error!("Boot failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    block_on(app.run());
    ExitCode::SUCCESS
}
