//! BLE UART service (Nordic UART UUIDs) as the wireless console.
//!
//! Writes to the RX characteristic are pushed into [`LINK`]; chunks the main
//! loop queues on the outbound side go out as TX notifications. One central
//! at a time; advertising restarts after it disconnects.

use embassy_futures::join::join;
use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use heapless::Vec;
use log::{info, warn};
use trouble_host::prelude::*;

use attend_core::transport::{LinkChannels, NOTIFY_CHUNK};

pub const DEVICE_NAME: &str = "ESP32-S3 Attendance";

/// Depth of each direction of the link
pub const LINK_DEPTH: usize = 32;

pub type BleLink = LinkChannels<CriticalSectionRawMutex, LINK_DEPTH>;

pub static LINK: BleLink = LinkChannels::new();

const CONNECTIONS_MAX: usize = 1;
const L2CAP_CHANNELS_MAX: usize = 2;

#[gatt_server]
struct Server {
    uart: UartService,
}

#[gatt_service(uuid = "6E400001-B5A3-F393-E0A9-E50E24DCCA9E")]
struct UartService {
    /// Central to device
    #[characteristic(uuid = "6E400002-B5A3-F393-E0A9-E50E24DCCA9E", write, write_without_response)]
    rx: Vec<u8, NOTIFY_CHUNK>,
    /// Device to central
    #[characteristic(uuid = "6E400003-B5A3-F393-E0A9-E50E24DCCA9E", notify)]
    tx: Vec<u8, NOTIFY_CHUNK>,
}

/// Run the BLE host forever.
pub async fn run<C: Controller>(controller: C, link: &'static BleLink) {
    let address = Address::random([0xa7, 0x7e, 0x4d, 0x00, 0x53, 0xff]);
    let mut resources: HostResources<DefaultPacketPool, CONNECTIONS_MAX, L2CAP_CHANNELS_MAX> =
        HostResources::new();
    let stack = trouble_host::new(controller, &mut resources).set_random_address(address);
    let Host {
        mut peripheral,
        mut runner,
        ..
    } = stack.build();

    let server = match Server::new_with_config(GapConfig::Peripheral(PeripheralConfig {
        name: DEVICE_NAME,
        appearance: &appearance::UNKNOWN,
    })) {
        Ok(server) => server,
        Err(e) => {
            warn!("BLE GATT server setup failed: {:?}", e);
            return;
        }
    };

    let host = async {
        if let Err(e) = runner.run().await {
            warn!("BLE host stopped: {:?}", e);
        }
    };

    let sessions = async {
        loop {
            match advertise(&mut peripheral, &server).await {
                Ok(conn) => {
                    info!("BLE central connected");
                    link.set_connected(true);
                    serve(&server, &conn, link).await;
                    link.set_connected(false);
                    info!("BLE central disconnected");
                }
                Err(e) => warn!("BLE advertising failed: {:?}", e),
            }
        }
    };

    join(host, sessions).await;
}

async fn advertise<'values, 'server, C: Controller>(
    peripheral: &mut Peripheral<'values, C, DefaultPacketPool>,
    server: &'server Server<'values>,
) -> Result<GattConnection<'values, 'server, DefaultPacketPool>, BleHostError<C::Error>> {
    let mut adv_data = [0; 31];
    let len = AdStructure::encode_slice(
        &[
            AdStructure::Flags(LE_GENERAL_DISCOVERABLE | BR_EDR_NOT_SUPPORTED),
            AdStructure::CompleteLocalName(DEVICE_NAME.as_bytes()),
        ],
        &mut adv_data[..],
    )?;

    let advertiser = peripheral
        .advertise(
            &Default::default(),
            Advertisement::ConnectableScannableUndirected {
                adv_data: &adv_data[..len],
                scan_data: &[],
            },
        )
        .await?;
    info!("BLE advertising as {}", DEVICE_NAME);

    let conn = advertiser.accept().await?.with_attribute_server(server)?;
    Ok(conn)
}

async fn serve(
    server: &Server<'_>,
    conn: &GattConnection<'_, '_, DefaultPacketPool>,
    link: &BleLink,
) {
    let rx = server.uart.rx.handle;

    loop {
        match select(conn.next(), link.outbound.receive()).await {
            Either::First(GattConnectionEvent::Disconnected { reason }) => {
                info!("BLE disconnect reason: {:?}", reason);
                return;
            }
            Either::First(GattConnectionEvent::Gatt { event }) => {
                if let GattEvent::Write(write) = &event {
                    if write.handle() == rx {
                        let data = write.data();
                        if link.push_inbound(data) < data.len() {
                            warn!("BLE input dropped, queue full");
                        }
                    }
                }
                match event.accept() {
                    Ok(reply) => reply.send().await,
                    Err(e) => warn!("BLE reply failed: {:?}", e),
                }
            }
            Either::First(_) => {}
            Either::Second(chunk) => {
                if let Err(e) = server.uart.tx.notify(conn, &chunk).await {
                    warn!("BLE notify failed: {:?}", e);
                }
            }
        }
    }
}
