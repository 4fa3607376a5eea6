//! Fakes shared by the integration tests
#![allow(dead_code)]

use std::collections::VecDeque;

use attend_core::app::{App, Devices, Platform};
use attend_core::config::{DeviceConfig, SheetEndpoint};
use attend_core::credentials::WifiCredentials;
use attend_core::indicator::StatusIndicator;
use attend_core::ledger::{HEADER, LEDGER_FILE};
use attend_core::net::{NetError, NetworkClient, SubmitOutcome};
use attend_core::sensors::{
    FingerprintSensor, ImageStatus, PersonId, ScanOutcome, SearchMatch, SensorError, TemplateSlot,
};
use attend_core::storage::MemStorage;
use attend_core::transport::{SerialPort, WirelessTransport};
use embassy_futures::block_on;
use embedded_hal_async::delay::DelayNs;

/// Serial console fed from a script. Each read hands out one chunk; an empty
/// chunk reads as "nothing arrived yet", which ends one poll.
#[derive(Default)]
pub struct ScriptedSerial {
    pub input: VecDeque<Vec<u8>>,
    pub output: Vec<String>,
}

impl ScriptedSerial {
    pub fn new(script: &[&str]) -> Self {
        Self {
            input: script.iter().map(|s| s.as_bytes().to_vec()).collect(),
            output: Vec::new(),
        }
    }

    pub fn printed(&self, text: &str) -> bool {
        self.output.iter().any(|line| line.contains(text))
    }
}

impl SerialPort for ScriptedSerial {
    fn read_available(&mut self, buf: &mut [u8]) -> usize {
        read_chunk(&mut self.input, buf)
    }

    fn write_line(&mut self, line: &str) {
        self.output.push(line.to_string());
    }
}

/// Hand out the next scripted chunk, leaving any part that does not fit in
/// `buf` for the next read.
fn read_chunk(input: &mut VecDeque<Vec<u8>>, buf: &mut [u8]) -> usize {
    let Some(mut chunk) = input.pop_front() else {
        return 0;
    };
    if chunk.len() > buf.len() {
        let rest = chunk.split_off(buf.len());
        input.push_front(rest);
    }
    buf[..chunk.len()].copy_from_slice(&chunk);
    chunk.len()
}

#[derive(Default)]
pub struct FakeWireless {
    pub connected: bool,
    pub input: VecDeque<Vec<u8>>,
    pub notifications: Vec<Vec<u8>>,
}

impl WirelessTransport for FakeWireless {
    fn is_client_connected(&self) -> bool {
        self.connected
    }

    fn read_available(&mut self, buf: &mut [u8]) -> usize {
        read_chunk(&mut self.input, buf)
    }

    fn notify(&mut self, chunk: &[u8]) {
        self.notifications.push(chunk.to_vec());
    }
}

/// Sensor with a scripted sequence of scans and captures. Once a script
/// runs out the finger is absent.
pub struct FakeSensor {
    pub present: bool,
    pub scans: VecDeque<ScanOutcome>,
    pub captures: VecDeque<ImageStatus>,
    pub stored: Vec<PersonId>,
    pub fail_create: Option<SensorError>,
}

impl Default for FakeSensor {
    fn default() -> Self {
        Self {
            present: true,
            scans: VecDeque::new(),
            captures: VecDeque::new(),
            stored: Vec::new(),
            fail_create: None,
        }
    }
}

impl FakeSensor {
    pub fn with_matches(ids: &[PersonId]) -> Self {
        Self {
            scans: ids
                .iter()
                .map(|&id| {
                    ScanOutcome::Match(SearchMatch {
                        id,
                        confidence: 120,
                    })
                })
                .collect(),
            ..Self::default()
        }
    }
}

impl FingerprintSensor for FakeSensor {
    async fn verify(&mut self) -> Result<(), SensorError> {
        if self.present {
            Ok(())
        } else {
            Err(SensorError::NotFound)
        }
    }

    async fn capture_image(&mut self) -> Result<ImageStatus, SensorError> {
        Ok(self.captures.pop_front().unwrap_or(ImageStatus::NoFinger))
    }

    async fn convert_image(&mut self, _slot: TemplateSlot) -> Result<(), SensorError> {
        Ok(())
    }

    async fn create_model(&mut self) -> Result<(), SensorError> {
        match self.fail_create {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn store_model(&mut self, id: PersonId) -> Result<(), SensorError> {
        self.stored.push(id);
        Ok(())
    }

    async fn search(&mut self) -> Result<Option<SearchMatch>, SensorError> {
        Ok(None)
    }

    async fn empty_database(&mut self) -> Result<(), SensorError> {
        self.stored.clear();
        Ok(())
    }

    async fn template_count(&mut self) -> Result<u16, SensorError> {
        Ok(self.stored.len() as u16)
    }

    fn capacity(&self) -> u16 {
        127
    }

    async fn scan(&mut self) -> Result<ScanOutcome, SensorError> {
        Ok(self.scans.pop_front().unwrap_or(ScanOutcome::NoFinger))
    }
}

/// Network whose connect and submit results are scripted
pub struct FakeNetwork {
    pub reachable: bool,
    pub outcomes: VecDeque<SubmitOutcome>,
    pub submissions: Vec<Vec<u8>>,
    pub connects: usize,
    pub disconnects: usize,
}

impl FakeNetwork {
    pub fn answering(outcomes: &[SubmitOutcome]) -> Self {
        Self {
            reachable: true,
            outcomes: outcomes.iter().copied().collect(),
            submissions: Vec::new(),
            connects: 0,
            disconnects: 0,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::answering(&[])
        }
    }
}

impl NetworkClient for FakeNetwork {
    async fn connect(&mut self, _: &WifiCredentials, _: u32) -> Result<(), NetError> {
        self.connects += 1;
        if self.reachable {
            Ok(())
        } else {
            Err(NetError::ConnectTimeout)
        }
    }

    async fn submit(&mut self, _: &SheetEndpoint, payload: &[u8]) -> SubmitOutcome {
        self.submissions.push(payload.to_vec());
        self.outcomes
            .pop_front()
            .unwrap_or(SubmitOutcome::Accepted { status: 200 })
    }

    async fn disconnect(&mut self) {
        self.disconnects += 1;
    }
}

#[derive(Default)]
pub struct CountingIndicator {
    pub successes: usize,
    pub failures: usize,
}

impl StatusIndicator for CountingIndicator {
    async fn success(&mut self) {
        self.successes += 1;
    }

    async fn failure(&mut self) {
        self.failures += 1;
    }

    async fn waiting(&mut self, _on: bool) {}
}

pub struct NoDelay;

impl DelayNs for NoDelay {
    async fn delay_ns(&mut self, _ns: u32) {}
}

pub struct TestPlatform;

impl Platform for TestPlatform {
    type Storage = MemStorage;
    type Serial = ScriptedSerial;
    type Wireless = FakeWireless;
    type Sensor = FakeSensor;
    type Network = FakeNetwork;
    type Indicator = CountingIndicator;
    type Delay = NoDelay;
}

pub fn test_config() -> DeviceConfig {
    let mut config = DeviceConfig::default();
    config.prompt.timeout_ms = 100;
    config.fallback_credentials = Some(WifiCredentials::new("Campus", "secret").unwrap());
    config
}

pub fn ledger_storage(lines: &[&str]) -> MemStorage {
    let mut contents = format!("{HEADER}\n");
    for line in lines {
        contents.push_str(line);
        contents.push('\n');
    }
    MemStorage::new().with_file(LEDGER_FILE, contents.as_bytes())
}

pub fn boot(
    storage: MemStorage,
    serial: ScriptedSerial,
    sensor: FakeSensor,
    network: FakeNetwork,
) -> App<TestPlatform> {
    let devices = Devices {
        storage,
        serial,
        wireless: FakeWireless::default(),
        sensor,
        network,
        indicator: CountingIndicator::default(),
        delay: NoDelay,
    };
    block_on(App::boot(test_config(), devices)).unwrap()
}

/// Run the loop until the serial script is used up.
pub fn drain(app: &mut App<TestPlatform>) {
    loop {
        let handled = block_on(app.tick());
        if !handled && app.console_mut().serial_mut().input.is_empty() {
            break;
        }
    }
}

pub fn ledger_text(app: &mut App<TestPlatform>) -> String {
    let lines: Vec<String> = app
        .ledger_mut()
        .unwrap()
        .scan_all()
        .map(Result::unwrap)
        .collect();
    lines.join("\n")
}
