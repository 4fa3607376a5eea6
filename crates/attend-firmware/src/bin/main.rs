#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use bt_hci::controller::ExternalController;
use embassy_executor::Spawner;
use embassy_net::{Runner, StackResources};
use embassy_time::Delay;
use embedded_hal_bus::spi::ExclusiveDevice;
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{Level, Output, OutputConfig};
use esp_hal::rng::Rng;
use esp_hal::spi::master::{Config as SpiConfig, Spi};
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use esp_hal::uart::{Config as UartConfig, Uart};
use esp_radio::ble::controller::BleConnector;
use esp_radio::wifi::WifiDevice;
use log::{error, info};
use static_cell::StaticCell;

use attend_core::app::{App, Devices, Platform};
use attend_core::config::DeviceConfig;
use attend_core::sensors::r30x::R30xSensor;
use attend_core::transport::ChannelLink;
use attend_firmware::ble::{self, LINK_DEPTH};
use attend_firmware::indicator::LedIndicator;
use attend_firmware::sd_storage::{FixedClock, SdStorage};
use attend_firmware::uart_console::UartConsole;
use attend_firmware::wifi::WifiNetwork;
use attend_firmware::wifi_secrets;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

/// Fingerprint sensor UART baud rate
const SENSOR_BAUD: u32 = 57_600;
const CONSOLE_BAUD: u32 = 115_200;

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

type SdSpi = ExclusiveDevice<Spi<'static, esp_hal::Blocking>, Output<'static>, Delay>;

struct Esp32Platform;

impl Platform for Esp32Platform {
    type Storage = SdStorage<SdSpi, Delay, FixedClock>;
    type Serial = UartConsole<'static>;
    type Wireless = ChannelLink<'static, CriticalSectionRawMutex, LINK_DEPTH>;
    type Sensor = R30xSensor<Uart<'static, esp_hal::Async>, Delay>;
    type Network = WifiNetwork<'static>;
    type Indicator = LedIndicator<'static>;
    type Delay = Delay;
}

#[embassy_executor::task]
async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) -> ! {
    runner.run().await
}

#[embassy_executor::task]
async fn ble_task(controller: ExternalController<BleConnector<'static>, 20>) {
    ble::run(controller, &ble::LINK).await
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("Embassy initialized!");

    let mut device_config = DeviceConfig::default();
    device_config.fallback_credentials = wifi_secrets::fallback_credentials();

    // Radio: WiFi station for sync, BLE for the wireless console
    static RADIO: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();
    let radio = RADIO.init(esp_radio::init().expect("Failed to initialize Wi-Fi/BLE controller"));

    let (wifi_controller, interfaces) =
        esp_radio::wifi::new(radio, peripherals.WIFI, Default::default())
            .expect("Failed to initialize Wi-Fi controller");

    let rng = Rng::new();
    let seed = u64::from(rng.random()) << 32 | u64::from(rng.random());
    static NET_RESOURCES: StaticCell<StackResources<3>> = StaticCell::new();
    let (stack, net_runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        NET_RESOURCES.init(StackResources::new()),
        seed,
    );
    spawner.must_spawn(net_task(net_runner));

    let connector = BleConnector::new(radio, peripherals.BT, Default::default());
    spawner.must_spawn(ble_task(ExternalController::new(connector)));

    // Operator console on UART0 (USB bridge)
    let console_uart = Uart::new(
        peripherals.UART0,
        UartConfig::default().with_baudrate(CONSOLE_BAUD),
    )
    .expect("Failed to initialize console UART")
    .with_rx(peripherals.GPIO44)
    .with_tx(peripherals.GPIO43);

    // Fingerprint sensor on UART1
    let sensor_uart = Uart::new(
        peripherals.UART1,
        UartConfig::default().with_baudrate(SENSOR_BAUD),
    )
    .expect("Failed to initialize sensor UART")
    .with_rx(peripherals.GPIO17)
    .with_tx(peripherals.GPIO16)
    .into_async();

    // SD card on SPI2
    let sd_spi = Spi::new(
        peripherals.SPI2,
        SpiConfig::default().with_frequency(Rate::from_khz(400)),
    )
    .expect("Failed to initialize SD card SPI")
    .with_sck(peripherals.GPIO36)
    .with_mosi(peripherals.GPIO37)
    .with_miso(peripherals.GPIO38);
    let sd_cs = Output::new(peripherals.GPIO4, Level::High, OutputConfig::default());
    let sd_device =
        ExclusiveDevice::new(sd_spi, sd_cs, Delay).expect("Failed to create SD card SPI device");
    let storage = SdStorage::new(embedded_sdmmc::SdCard::new(sd_device, Delay), FixedClock);
    if let Err(e) = storage.mount() {
        error!("SD card mount failed: {:?}", e);
    }

    let led = Output::new(peripherals.GPIO48, Level::Low, OutputConfig::default());

    let devices = Devices::<Esp32Platform> {
        storage,
        serial: UartConsole::new(console_uart),
        wireless: ChannelLink::new(&ble::LINK),
        sensor: R30xSensor::new(sensor_uart, Delay, &device_config.sensor),
        network: WifiNetwork::new(wifi_controller, stack, &device_config.sync),
        indicator: LedIndicator::new(led),
        delay: Delay,
    };

    match App::boot(device_config, devices).await {
        Ok(mut app) => app.run().await,
        Err(e) => error!("Boot failed: {}", e),
    }

    // Halted: a missing sensor is not recoverable without a reset
    loop {
        embassy_time::Timer::after_secs(1).await;
    }
}
