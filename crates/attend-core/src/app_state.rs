//! Application-wide state and error types

use alloc::string::String;

use log::debug;
use thiserror_no_std::Error;

use crate::credentials::{CredentialsError, WifiCredentials};
use crate::ledger::LedgerError;
use crate::sensors::SensorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppRunState {
    Booting,
    Idle,
    Enrolling,
    TakingAttendance,
    Syncing,
    /// Unrecoverable boot failure; the loop only reports it
    Halted,
}

/// Mutable device state shared by the menu flows
#[derive(Debug, Clone)]
pub struct DeviceContext {
    pub run_state: AppRunState,
    /// Operator-supplied date stamped on new records
    pub current_date: String,
    pub credentials: Option<WifiCredentials>,
}

impl DeviceContext {
    pub fn new(default_date: &str) -> Self {
        Self {
            run_state: AppRunState::Booting,
            current_date: String::from(default_date),
            credentials: None,
        }
    }

    pub fn enter(&mut self, state: AppRunState) {
        if self.run_state != state {
            debug!("Run state: {:?} -> {:?}", self.run_state, state);
            self.run_state = state;
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("fingerprint sensor not found: {0}")]
    SensorNotFound(SensorError),
    #[error("attendance storage unavailable: {0}")]
    Storage(LedgerError),
    #[error("credential file error: {0}")]
    Credentials(CredentialsError),
}

impl From<LedgerError> for AppError {
    fn from(value: LedgerError) -> Self {
        Self::Storage(value)
    }
}

impl From<CredentialsError> for AppError {
    fn from(value: CredentialsError) -> Self {
        Self::Credentials(value)
    }
}
