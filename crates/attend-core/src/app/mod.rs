//! Operator menu and the flows behind each entry
//!
//! [`App`] owns every device collaborator plus the [`DeviceContext`]. The
//! main loop calls [`App::tick`], which polls both transports once and, if a
//! command is waiting, runs the matching flow to completion. Flows that need
//! an answer from the operator wait for it with a bound
//! ([`PromptConfig::timeout_ms`](crate::config::PromptConfig)).

mod attendance;
mod enroll;
mod menu;
mod records;

pub use menu::{MENU, MenuChoice};

use alloc::format;

use embedded_hal_async::delay::DelayNs;
use log::{error, info, warn};

use crate::app_state::{AppError, AppRunState, DeviceContext};
use crate::config::DeviceConfig;
use crate::console::Console;
use crate::credentials::WifiCredentials;
use crate::indicator::StatusIndicator;
use crate::input::Command;
use crate::ledger::{AttendanceLedger, LEDGER_FILE, LedgerError};
use crate::net::NetworkClient;
use crate::sensors::FingerprintSensor;
use crate::storage::Storage;
use crate::transport::{SerialPort, WirelessTransport};

/// Idle time between loop iterations when nothing arrived
const IDLE_POLL_MS: u32 = 20;

/// Concrete collaborator types for one build of the device
pub trait Platform {
    type Storage: Storage;
    type Serial: SerialPort;
    type Wireless: WirelessTransport;
    type Sensor: FingerprintSensor;
    type Network: NetworkClient;
    type Indicator: StatusIndicator;
    type Delay: DelayNs;
}

/// Everything [`App::boot`] needs, already brought up by the platform
pub struct Devices<P: Platform> {
    pub storage: P::Storage,
    pub serial: P::Serial,
    pub wireless: P::Wireless,
    pub sensor: P::Sensor,
    pub network: P::Network,
    pub indicator: P::Indicator,
    pub delay: P::Delay,
}

pub struct App<P: Platform> {
    config: DeviceConfig,
    context: DeviceContext,
    /// `None` if the storage could not be opened at boot
    ledger: Option<AttendanceLedger<P::Storage>>,
    console: Console<P::Serial, P::Wireless>,
    sensor: P::Sensor,
    network: P::Network,
    indicator: P::Indicator,
    delay: P::Delay,
}

impl<P: Platform> App<P> {
    /// Bring the device up and show the menu.
    ///
    /// A missing fingerprint sensor is the one unrecoverable condition; the
    /// error is reported on the console before it is returned. Storage that
    /// fails to open leaves the device running without a ledger.
    pub async fn boot(config: DeviceConfig, devices: Devices<P>) -> Result<Self, AppError> {
        let Devices {
            storage,
            serial,
            wireless,
            sensor,
            network,
            indicator,
            delay,
        } = devices;

        let mut console = Console::new(serial, wireless, config.input.max_line_len);
        console.println("System initializing...");

        let ledger = match AttendanceLedger::open(storage) {
            Ok(ledger) => {
                console.println("Attendance storage ready");
                Some(ledger)
            }
            Err(e) => {
                error!("Ledger open failed: {}", e);
                console.println(&format!("Storage mount failed: {e}"));
                None
            }
        };

        let mut app = Self {
            context: DeviceContext::new(&config.ledger.default_date),
            config,
            ledger,
            console,
            sensor,
            network,
            indicator,
            delay,
        };

        app.init_sensor().await?;
        app.load_credentials();

        app.context.enter(AppRunState::Idle);
        app.show_menu();
        Ok(app)
    }

    async fn init_sensor(&mut self) -> Result<(), AppError> {
        self.console.println("Initializing sensor...");
        if let Err(e) = self.sensor.verify().await {
            error!("Fingerprint sensor not found: {}", e);
            self.console.println("Did not find fingerprint sensor :(");
            self.context.enter(AppRunState::Halted);
            return Err(AppError::SensorNotFound(e));
        }
        self.console.println("Found fingerprint sensor!");

        match self.sensor.template_count().await {
            Ok(0) => self.console.println(
                "Sensor doesn't contain any fingerprint data. Please enroll a fingerprint.",
            ),
            Ok(count) => self
                .console
                .println(&format!("Sensor contains {count} templates")),
            Err(e) => warn!("Could not read template count: {}", e),
        }
        Ok(())
    }

    /// Credentials from the credential file, else the configured fallback.
    fn load_credentials(&mut self) {
        if self.context.credentials.is_some() {
            return;
        }
        let loaded = match self.ledger.as_mut() {
            Some(ledger) => WifiCredentials::load(ledger.storage_mut()),
            None => Ok(None),
        };
        self.context.credentials = match loaded {
            Ok(Some(credentials)) => Some(credentials),
            Ok(None) => {
                info!("No saved WiFi credentials found");
                self.config.fallback_credentials.clone()
            }
            Err(e) => {
                warn!("Could not load WiFi credentials: {}", e);
                self.config.fallback_credentials.clone()
            }
        };
    }

    pub fn context(&self) -> &DeviceContext {
        &self.context
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn console_mut(&mut self) -> &mut Console<P::Serial, P::Wireless> {
        &mut self.console
    }

    pub fn ledger_mut(&mut self) -> Option<&mut AttendanceLedger<P::Storage>> {
        self.ledger.as_mut()
    }

    pub fn sensor_mut(&mut self) -> &mut P::Sensor {
        &mut self.sensor
    }

    pub fn network_mut(&mut self) -> &mut P::Network {
        &mut self.network
    }

    pub fn indicator_mut(&mut self) -> &mut P::Indicator {
        &mut self.indicator
    }

    /// Poll once and run the selected flow, if any. Returns whether a command
    /// was handled.
    pub async fn tick(&mut self) -> bool {
        match self.console.poll_command() {
            Some(command) => {
                self.dispatch(command).await;
                true
            }
            None => false,
        }
    }

    /// The device main loop. Never returns.
    pub async fn run(&mut self) {
        loop {
            if !self.tick().await {
                self.delay.delay_ms(IDLE_POLL_MS).await;
            }
        }
    }

    pub async fn dispatch(&mut self, command: Command) {
        let Some(choice) = MenuChoice::parse(&command) else {
            self.show_menu();
            return;
        };
        info!("Menu: {:?}", choice);

        match choice {
            MenuChoice::Enroll => self.enroll_mode().await,
            MenuChoice::Attendance => self.attendance_mode().await,
            MenuChoice::ClearFingerprints => self.clear_fingerprints().await,
            MenuChoice::ViewRecords => self.view_records(),
            MenuChoice::Sync => self.sync().await,
            MenuChoice::ClearAttendance => self.clear_attendance().await,
            MenuChoice::SetDate => self.set_date().await,
            MenuChoice::UpdateWifi => self.update_wifi().await,
            MenuChoice::FingerprintCount => self.show_fingerprint_count().await,
            MenuChoice::Help => self.show_menu(),
        }
        self.context.enter(AppRunState::Idle);
    }

    pub fn show_menu(&mut self) {
        self.console.println("");
        self.console.print_block(MENU);
    }

    fn say(&mut self, message: &str) {
        self.console.println(message);
    }

    /// Print `message` and wait for the next command. `None` on timeout.
    async fn prompt(&mut self, message: &str) -> Option<Command> {
        self.say(message);
        self.next_command().await
    }

    async fn next_command(&mut self) -> Option<Command> {
        let timeout = self.config.prompt.timeout_ms;
        let step = self.config.prompt.poll_interval_ms.max(1);
        let mut waited = 0;
        loop {
            if let Some(command) = self.console.poll_command() {
                return Some(command);
            }
            if waited >= timeout {
                info!("Prompt timed out after {} ms", waited);
                return None;
            }
            self.delay.delay_ms(step).await;
            waited += step;
        }
    }

    fn ledger(&mut self) -> Result<&mut AttendanceLedger<P::Storage>, AppError> {
        self.ledger
            .as_mut()
            .ok_or(AppError::Storage(missing_ledger()))
    }
}

/// Reported by flows that need the ledger when storage failed at boot
fn missing_ledger() -> LedgerError {
    LedgerError::Io {
        op: "open",
        file: LEDGER_FILE,
    }
}
