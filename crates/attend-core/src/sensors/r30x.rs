//! R30x / AS608 optical fingerprint module over UART
//!
//! Packet layout (all multi-byte fields big-endian):
//!
//! | start `EF 01` | address (4) | packet id (1) | length (2) | payload | checksum (2) |
//!
//! `length` counts payload plus checksum. The checksum is the 16-bit sum of
//! packet id, both length bytes and every payload byte.

use embassy_futures::select::{Either, select};
use embedded_hal_async::delay::DelayNs;
use embedded_io_async::{Read, Write};
use heapless::Vec;
use log::{debug, error, info};

use super::{
    FingerprintSensor, ImageStatus, PersonId, SearchMatch, SensorError, TemplateSlot,
};
use crate::config::SensorConfig;

const START_CODE: [u8; 2] = [0xEF, 0x01];
const HEADER_LEN: usize = 9;
const MAX_PACKET: usize = 64;

const PID_COMMAND: u8 = 0x01;
const PID_ACK: u8 = 0x07;

mod instruction {
    pub const GET_IMAGE: u8 = 0x01;
    pub const IMAGE_TO_TZ: u8 = 0x02;
    pub const REG_MODEL: u8 = 0x05;
    pub const STORE: u8 = 0x06;
    pub const EMPTY: u8 = 0x0D;
    pub const VERIFY_PASSWORD: u8 = 0x13;
    pub const FAST_SEARCH: u8 = 0x1B;
    pub const TEMPLATE_COUNT: u8 = 0x1D;
}

mod code {
    pub const OK: u8 = 0x00;
    pub const PACKET_RECEIVE_ERR: u8 = 0x01;
    pub const NO_FINGER: u8 = 0x02;
    pub const IMAGE_FAIL: u8 = 0x03;
    pub const IMAGE_MESS: u8 = 0x06;
    pub const FEATURE_FAIL: u8 = 0x07;
    pub const NOT_FOUND: u8 = 0x09;
    pub const ENROLL_MISMATCH: u8 = 0x0A;
    pub const BAD_LOCATION: u8 = 0x0B;
    pub const WRONG_PASSWORD: u8 = 0x13;
    pub const INVALID_IMAGE: u8 = 0x15;
    pub const FLASH_ERR: u8 = 0x18;
}

pub type Packet = Vec<u8, MAX_PACKET>;

fn checksum(pid: u8, length: u16, payload: &[u8]) -> u16 {
    let [hi, lo] = length.to_be_bytes();
    payload
        .iter()
        .fold(pid as u16 + hi as u16 + lo as u16, |sum, &b| {
            sum.wrapping_add(b as u16)
        })
}

/// Frame a command packet.
pub fn encode_command(address: u32, payload: &[u8]) -> Result<Packet, SensorError> {
    let length = (payload.len() + 2) as u16;
    let parts: [&[u8]; 6] = [
        &START_CODE,
        &address.to_be_bytes(),
        &[PID_COMMAND],
        &length.to_be_bytes(),
        payload,
        &checksum(PID_COMMAND, length, payload).to_be_bytes(),
    ];

    let mut packet = Packet::new();
    for part in parts {
        packet
            .extend_from_slice(part)
            .map_err(|_| SensorError::Protocol)?;
    }
    Ok(packet)
}

/// Validate an acknowledge packet and return its payload (confirmation code
/// first).
pub fn decode_ack(packet: &[u8]) -> Result<&[u8], SensorError> {
    if packet.len() < HEADER_LEN + 3 || packet[..2] != START_CODE {
        return Err(SensorError::Protocol);
    }
    let pid = packet[6];
    if pid != PID_ACK {
        return Err(SensorError::Protocol);
    }
    let length = u16::from_be_bytes([packet[7], packet[8]]);
    if packet.len() != HEADER_LEN + length as usize {
        return Err(SensorError::Protocol);
    }

    let (payload, sum) = packet[HEADER_LEN..].split_at(length as usize - 2);
    let expected = u16::from_be_bytes([sum[0], sum[1]]);
    if checksum(pid, length, payload) != expected {
        error!("R30x: checksum mismatch");
        return Err(SensorError::Communication);
    }
    Ok(payload)
}

/// Map a confirmation code to a result.
fn confirm(code: u8) -> Result<(), SensorError> {
    match code {
        code::OK => Ok(()),
        code::PACKET_RECEIVE_ERR => Err(SensorError::Communication),
        code::IMAGE_FAIL => Err(SensorError::ImageFailed),
        code::IMAGE_MESS => Err(SensorError::ImageMessy),
        code::FEATURE_FAIL | code::INVALID_IMAGE => Err(SensorError::FeatureFailed),
        code::ENROLL_MISMATCH => Err(SensorError::EnrollMismatch),
        code::BAD_LOCATION => Err(SensorError::BadLocation),
        code::FLASH_ERR => Err(SensorError::FlashError),
        code::WRONG_PASSWORD => Err(SensorError::NotFound),
        other => Err(SensorError::Other(other)),
    }
}

async fn read_ack<U: Read>(uart: &mut U) -> Result<Packet, SensorError> {
    let mut header = [0u8; HEADER_LEN];
    uart.read_exact(&mut header).await.map_err(|e| {
        error!("R30x: header read failed: {:?}", e);
        SensorError::Communication
    })?;
    if header[..2] != START_CODE {
        return Err(SensorError::Protocol);
    }

    let length = u16::from_be_bytes([header[7], header[8]]) as usize;
    if length < 3 || HEADER_LEN + length > MAX_PACKET {
        return Err(SensorError::Protocol);
    }

    let mut packet = Packet::new();
    packet
        .extend_from_slice(&header)
        .map_err(|_| SensorError::Protocol)?;
    packet
        .resize(HEADER_LEN + length, 0)
        .map_err(|_| SensorError::Protocol)?;
    uart.read_exact(&mut packet[HEADER_LEN..])
        .await
        .map_err(|e| {
            error!("R30x: body read failed: {:?}", e);
            SensorError::Communication
        })?;
    Ok(packet)
}

/// Driver for R30x-family modules (R305, R307, AS608 and clones)
pub struct R30xSensor<U, D> {
    uart: U,
    delay: D,
    address: u32,
    password: u32,
    capacity: u16,
    response_timeout_ms: u32,
}

impl<U: Read + Write, D: DelayNs> R30xSensor<U, D> {
    pub fn new(uart: U, delay: D, config: &SensorConfig) -> Self {
        Self {
            uart,
            delay,
            address: config.address,
            password: config.password,
            capacity: config.capacity,
            response_timeout_ms: config.response_timeout_ms,
        }
    }

    /// Send one command and wait for its acknowledge. Returns the ack payload.
    async fn transact(&mut self, payload: &[u8]) -> Result<Packet, SensorError> {
        let packet = encode_command(self.address, payload)?;
        self.uart.write_all(&packet).await.map_err(|e| {
            error!("R30x: write failed: {:?}", e);
            SensorError::Communication
        })?;
        self.uart.flush().await.map_err(|e| {
            error!("R30x: flush failed: {:?}", e);
            SensorError::Communication
        })?;

        let response = match select(
            read_ack(&mut self.uart),
            self.delay.delay_ms(self.response_timeout_ms),
        )
        .await
        {
            Either::First(response) => response?,
            Either::Second(()) => {
                debug!("R30x: no response to instruction {:#04x}", payload[0]);
                return Err(SensorError::Timeout);
            }
        };

        let ack = decode_ack(&response)?;
        Packet::from_slice(ack).map_err(|_| SensorError::Protocol)
    }

    /// Send a command whose ack carries only a confirmation code.
    async fn simple(&mut self, payload: &[u8]) -> Result<(), SensorError> {
        let ack = self.transact(payload).await?;
        confirm(ack[0])
    }
}

impl<U: Read + Write, D: DelayNs> FingerprintSensor for R30xSensor<U, D> {
    async fn verify(&mut self) -> Result<(), SensorError> {
        let [a, b, c, d] = self.password.to_be_bytes();
        match self.simple(&[instruction::VERIFY_PASSWORD, a, b, c, d]).await {
            Ok(()) => {
                info!("Found fingerprint sensor");
                Ok(())
            }
            Err(SensorError::Timeout) => Err(SensorError::NotFound),
            Err(e) => Err(e),
        }
    }

    async fn capture_image(&mut self) -> Result<ImageStatus, SensorError> {
        let ack = self.transact(&[instruction::GET_IMAGE]).await?;
        match ack[0] {
            code::NO_FINGER => Ok(ImageStatus::NoFinger),
            other => confirm(other).map(|()| ImageStatus::Captured),
        }
    }

    async fn convert_image(&mut self, slot: TemplateSlot) -> Result<(), SensorError> {
        self.simple(&[instruction::IMAGE_TO_TZ, slot as u8]).await
    }

    async fn create_model(&mut self) -> Result<(), SensorError> {
        self.simple(&[instruction::REG_MODEL]).await
    }

    async fn store_model(&mut self, id: PersonId) -> Result<(), SensorError> {
        let [hi, lo] = id.to_be_bytes();
        self.simple(&[instruction::STORE, TemplateSlot::First as u8, hi, lo])
            .await
    }

    async fn search(&mut self) -> Result<Option<SearchMatch>, SensorError> {
        let [count_hi, count_lo] = self.capacity.saturating_add(1).to_be_bytes();
        let ack = self
            .transact(&[
                instruction::FAST_SEARCH,
                TemplateSlot::First as u8,
                0x00,
                0x00,
                count_hi,
                count_lo,
            ])
            .await?;
        match ack[0] {
            code::NOT_FOUND => Ok(None),
            other => {
                confirm(other)?;
                if ack.len() < 5 {
                    return Err(SensorError::Protocol);
                }
                let found = SearchMatch {
                    id: u16::from_be_bytes([ack[1], ack[2]]),
                    confidence: u16::from_be_bytes([ack[3], ack[4]]),
                };
                debug!("R30x: found #{} ({})", found.id, found.confidence);
                Ok(Some(found))
            }
        }
    }

    async fn empty_database(&mut self) -> Result<(), SensorError> {
        self.simple(&[instruction::EMPTY]).await
    }

    async fn template_count(&mut self) -> Result<u16, SensorError> {
        let ack = self.transact(&[instruction::TEMPLATE_COUNT]).await?;
        confirm(ack[0])?;
        if ack.len() < 3 {
            return Err(SensorError::Protocol);
        }
        Ok(u16::from_be_bytes([ack[1], ack[2]]))
    }

    fn capacity(&self) -> u16 {
        self.capacity
    }
}
