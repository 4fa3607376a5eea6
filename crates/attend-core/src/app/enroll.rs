use alloc::format;

use embedded_hal_async::delay::DelayNs;
use log::{info, warn};

use super::{App, Platform};
use crate::app_state::AppRunState;
use crate::indicator::StatusIndicator;
use crate::sensors::{FingerprintSensor, ImageStatus, PersonId, SensorError, TemplateSlot};

/// Why an enrollment stopped before the template was stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnrollStop {
    Cancelled,
    TimedOut,
    Sensor(SensorError),
}

impl From<SensorError> for EnrollStop {
    fn from(value: SensorError) -> Self {
        Self::Sensor(value)
    }
}

impl<P: Platform> App<P> {
    pub(super) async fn enroll_mode(&mut self) {
        self.context.enter(AppRunState::Enrolling);
        self.say("Entering Enroll Mode...");

        loop {
            self.enroll_one().await;

            self.say("");
            self.say("Enrollment options:");
            self.say("1. Enroll another fingerprint");
            match self.prompt("2. Return to main menu").await {
                Some(option) if option.as_str() == "1" => continue,
                _ => break,
            }
        }
    }

    async fn enroll_one(&mut self) {
        let capacity = self.sensor.capacity();
        self.say("Ready to enroll a fingerprint!");
        let message =
            format!("Please type in the ID # (from 1 to {capacity}) you want to save this finger as...");
        self.say(&message);

        let Some(input) = self
            .prompt("(Press 'C' to cancel and return to main menu)")
            .await
        else {
            self.say("No ID entered. Returning to main menu.");
            return;
        };
        if input.is_token("C") {
            self.say("Enrollment cancelled by user");
            return;
        }

        let id = match input.as_str().parse::<PersonId>() {
            Ok(id) if (1..=capacity).contains(&id) => id,
            _ => {
                self.say("Invalid ID. Returning to main menu.");
                return;
            }
        };

        let message = format!("Enrolling ID #{id}");
        self.say(&message);

        match self.enroll_sequence(id).await {
            Ok(()) => {
                info!("Enrolled template #{}", id);
                self.say("Fingerprint enrolled successfully!");
                self.indicator.success().await;
            }
            Err(EnrollStop::Cancelled) => self.say("Enrollment cancelled by user"),
            Err(EnrollStop::TimedOut) => {
                self.say("Timed out waiting for finger. Enrollment failed.");
                self.indicator.failure().await;
            }
            Err(EnrollStop::Sensor(e)) => {
                warn!("Enrollment of #{} failed: {}", id, e);
                let message = format!("Enrollment failed: {e}");
                self.say(&message);
                self.indicator.failure().await;
            }
        }
    }

    /// Two captures of the same finger, merged and stored as `id`.
    ///
    /// The template is only written by the final step, so stopping anywhere
    /// earlier leaves the sensor library unchanged.
    async fn enroll_sequence(&mut self, id: PersonId) -> Result<(), EnrollStop> {
        let message = format!("Waiting for valid finger to enroll as #{id}");
        self.say(&message);
        self.say("(Press 'C' to cancel enrollment)");

        self.wait_for_finger(true).await?;
        self.say("Image taken");
        self.sensor.convert_image(TemplateSlot::First).await?;
        self.say("Image converted");

        self.say("Remove finger");
        self.wait_for_finger(false).await?;

        self.say("Place same finger again");
        self.say("(Press 'C' to cancel enrollment)");
        self.wait_for_finger(true).await?;
        self.say("Image taken");
        self.sensor.convert_image(TemplateSlot::Second).await?;
        self.say("Image converted");

        self.sensor.create_model().await?;
        self.say("Prints matched!");
        self.sensor.store_model(id).await?;
        self.say("Stored!");
        Ok(())
    }

    /// Wait until a finger is on (`present`) or off the sensor.
    async fn wait_for_finger(&mut self, present: bool) -> Result<(), EnrollStop> {
        let timeout = self.config.sensor.finger_timeout_ms;
        let step = self.config.sensor.scan_interval_ms.max(1);
        let mut waited = 0;

        loop {
            if let Some(command) = self.console.poll_command() {
                if command.is_token("C") {
                    return Err(EnrollStop::Cancelled);
                }
            }

            match self.sensor.capture_image().await {
                Ok(ImageStatus::Captured) if present => return Ok(()),
                Ok(ImageStatus::NoFinger) if !present => return Ok(()),
                Ok(_) => {}
                Err(e @ (SensorError::ImageFailed | SensorError::Communication)) => {
                    let message = format!("{e}");
                    self.say(&message);
                    self.indicator.failure().await;
                }
                Err(e) => return Err(EnrollStop::Sensor(e)),
            }

            if waited >= timeout {
                return Err(EnrollStop::TimedOut);
            }
            self.delay.delay_ms(step).await;
            waited += step;
        }
    }

    pub(super) async fn clear_fingerprints(&mut self) {
        let confirmed = self
            .prompt("Are you sure you want to clear all fingerprints? (Y/N)")
            .await
            .is_some_and(|answer| answer.is_yes());
        if !confirmed {
            self.say("Clear operation canceled.");
            return;
        }

        self.say("Clearing all fingerprints...");
        match self.sensor.empty_database().await {
            Ok(()) => {
                info!("Fingerprint library emptied");
                self.say("All fingerprints cleared successfully!");
                self.indicator.success().await;
            }
            Err(e) => {
                warn!("Empty database failed: {}", e);
                self.say("Failed to clear fingerprints.");
                self.indicator.failure().await;
            }
        }
    }

    pub(super) async fn show_fingerprint_count(&mut self) {
        self.say("Retrieving fingerprint count...");
        let capacity = self.sensor.capacity();
        match self.sensor.template_count().await {
            Ok(count) => {
                self.say("=== Fingerprint Count ===");
                let message = format!("Total registered fingerprints: {count}");
                self.say(&message);
                let message = format!("Maximum capacity: {capacity}");
                self.say(&message);
                let message = format!("Available slots: {}", capacity.saturating_sub(count));
                self.say(&message);
                self.say("========================");
            }
            Err(e) => {
                warn!("Template count failed: {}", e);
                self.say("Error retrieving fingerprint count from sensor.");
            }
        }
    }
}
