//! ESP32-S3 firmware-specific modules for attend-rs
//!
//! This crate contains the hardware-bound implementations of the
//! `attend_core` collaborator traits: SD card storage, the UART console, the
//! BLE UART service, WiFi networking and the status LED.

#![no_std]

extern crate alloc;

pub mod ble;
pub mod indicator;
pub mod sd_storage;
pub mod uart_console;
pub mod wifi;
pub mod wifi_secrets;
