use alloc::format;
use alloc::string::{String, ToString};

use embedded_hal_async::delay::DelayNs;
use log::{debug, warn};

use super::{App, Platform};
use crate::app_state::{AppError, AppRunState};
use crate::indicator::StatusIndicator;
use crate::ledger::{AttendanceRecord, LedgerError, checked_field};
use crate::sensors::{FingerprintSensor, PersonId, ScanOutcome, SearchMatch};

impl<P: Platform> App<P> {
    /// Ask for the date stamped on new records.
    pub(super) async fn set_date(&mut self) {
        let Some(input) = self
            .prompt("Enter today's date in DD/MM format (e.g., 19/5):")
            .await
        else {
            let message = format!(
                "No date entered. Keeping current date: {}",
                self.context.current_date
            );
            self.say(&message);
            return;
        };

        if input.is_token("X") {
            let message = format!(
                "Date change canceled. Keeping current date: {}",
                self.context.current_date
            );
            self.say(&message);
            return;
        }

        match checked_field("date", input.as_str()) {
            Ok(date) => {
                self.context.current_date = String::from(date);
                let message = format!("Date set to: {date}");
                self.say(&message);
            }
            Err(e) => {
                let message = format!(
                    "Invalid date ({e}). Keeping current date: {}",
                    self.context.current_date
                );
                self.say(&message);
            }
        }
    }

    /// Scan fingers until the operator sends `X`.
    pub(super) async fn attendance_mode(&mut self) {
        self.set_date().await;
        self.context.enter(AppRunState::TakingAttendance);

        let message = format!(
            "Entering Attendance Mode for date: {}",
            self.context.current_date
        );
        self.say(&message);
        self.say("Place Finger... (Press 'X' to exit)");

        let scan_interval = self.config.sensor.scan_interval_ms;
        loop {
            if let Some(command) = self.console.poll_command() {
                if command.is_token("X") {
                    self.say("Exiting Attendance Mode...");
                    return;
                }
                debug!("Ignoring '{}' in attendance mode", command);
            }

            match self.sensor.scan().await {
                Ok(ScanOutcome::Match(found)) => {
                    self.record_attendance(found).await;
                    self.delay
                        .delay_ms(self.config.sensor.post_match_delay_ms)
                        .await;
                    self.say("Place Finger... (Press 'X' to exit)");
                }
                Ok(ScanOutcome::NoMatch) => {
                    self.say("Fingerprint not recognized");
                    self.indicator.failure().await;
                }
                Ok(ScanOutcome::NoFinger | ScanOutcome::Unreadable) => {}
                Err(e) => {
                    warn!("Scan failed: {}", e);
                    let message = format!("Sensor error: {e}");
                    self.say(&message);
                }
            }

            self.delay.delay_ms(scan_interval).await;
        }
    }

    async fn record_attendance(&mut self, found: SearchMatch) {
        let message = format!(
            "Found ID #{} with confidence of {}",
            found.id, found.confidence
        );
        self.say(&message);
        let message = format!("Welcome {}", found.id);
        self.say(&message);

        let saved = self.save_record(found.id);

        match saved {
            Ok(record) => {
                let message = format!("Saved attendance record to file: {record}");
                self.say(&message);
                self.indicator.success().await;
            }
            Err(e) => {
                let message = format!("Failed to save attendance: {e}");
                self.say(&message);
                self.indicator.failure().await;
            }
        }
    }

    fn save_record(&mut self, id: PersonId) -> Result<AttendanceRecord, AppError> {
        let record = AttendanceRecord::present(&self.context.current_date, &id.to_string())
            .map_err(|e| AppError::Storage(LedgerError::Record(e)))?;
        self.ledger()?.append(&record)?;
        Ok(record)
    }
}
