//! Hardware-independent core library for attend-rs
//!
//! This crate contains all platform-agnostic logic for the fingerprint
//! attendance device: the attendance ledger and its crash-safe rewrite
//! protocol, the batch sync engine, the dual-transport command multiplexer,
//! the R30x fingerprint sensor protocol, and the operator menu dispatcher.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets (ESP32-S3) and desktop hosts (for the simulator and tests).

#![no_std]

extern crate alloc;

pub mod app;
pub mod app_state;
pub mod config;
pub mod console;
pub mod credentials;
pub mod indicator;
pub mod input;
pub mod ledger;
pub mod net;
pub mod sensors;
pub mod storage;
pub mod sync;
pub mod transport;
