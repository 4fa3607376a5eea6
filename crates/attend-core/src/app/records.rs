use alloc::format;

use log::{info, warn};

use super::{App, Platform, missing_ledger};
use crate::app_state::{AppError, AppRunState};
use crate::credentials::WifiCredentials;
use crate::indicator::StatusIndicator;
use crate::sync::{SyncEngine, SyncFailure, SyncOutcome};

impl<P: Platform> App<P> {
    pub(super) fn view_records(&mut self) {
        let Some(ledger) = self.ledger.as_mut() else {
            self.console.println("Failed to open attendance file");
            return;
        };

        self.console.println("");
        self.console.println("--- Stored Attendance Records ---");
        for line in ledger.scan_all() {
            match line {
                Ok(line) => self.console.println(&line),
                Err(e) => {
                    self.console.println(&format!("Read error: {e}"));
                    break;
                }
            }
        }
        self.console.println("--- End of Records ---");

        match ledger.stats() {
            Ok(stats) => {
                let mut summary = format!(
                    "Total: {} record(s), {} not yet synced",
                    stats.records, stats.unsynced
                );
                if stats.quarantined > 0 {
                    summary.push_str(&format!(", {} unreadable line(s)", stats.quarantined));
                }
                self.console.println(&summary);
            }
            Err(e) => warn!("Ledger stats failed: {}", e),
        }
    }

    /// Two-step confirmation, then drop every record.
    pub(super) async fn clear_attendance(&mut self) {
        let confirmed = self
            .prompt("Are you sure you want to clear all attendance records? (Y/N)")
            .await
            .is_some_and(|answer| answer.is_yes());
        if !confirmed {
            self.say("Operation canceled");
            return;
        }

        self.say("ALL ATTENDANCE RECORDS WILL BE PERMANENTLY DELETED!");
        let confirmed = self
            .prompt("Type 'CONFIRM' to proceed:")
            .await
            .is_some_and(|answer| answer.is_confirm());
        if !confirmed {
            self.say("Operation canceled: Confirmation text didn't match");
            return;
        }

        let cleared = self
            .ledger()
            .and_then(|ledger| ledger.clear().map_err(AppError::from));
        match cleared {
            Ok(()) => {
                self.say("All attendance records have been cleared successfully!");
                self.indicator.success().await;
            }
            Err(e) => {
                let message = format!("Error: {e}");
                self.say(&message);
                self.indicator.failure().await;
            }
        }
    }

    /// Prompt for new WiFi credentials and persist them.
    pub(super) async fn update_wifi(&mut self) {
        let current = self
            .context
            .credentials
            .as_ref()
            .map(|c| c.ssid.as_str())
            .unwrap_or("(none)");
        let message = format!("Current SSID: {current}");
        self.say(&message);

        let ssid = match self
            .prompt("Enter new SSID (or X to keep current):")
            .await
        {
            Some(ssid) if !ssid.is_token("X") => ssid,
            _ => {
                self.say("SSID unchanged");
                return;
            }
        };

        let message = format!("Enter password for {ssid}:");
        let password = self.prompt(&message).await;
        let password = password.as_ref().map(|p| p.as_str()).unwrap_or_default();

        let credentials = match WifiCredentials::new(ssid.as_str(), password) {
            Ok(credentials) => credentials,
            Err(e) => {
                let message = format!("Invalid WiFi settings: {e}");
                self.say(&message);
                return;
            }
        };

        let saved = self
            .ledger()
            .and_then(|ledger| credentials.save(ledger.storage_mut()).map_err(AppError::from));
        match saved {
            Ok(()) => self.say("WiFi credentials saved successfully"),
            Err(e) => {
                warn!("Saving WiFi credentials failed: {}", e);
                self.say("Failed to save WiFi credentials");
            }
        }

        self.context.credentials = Some(credentials);
        self.say("WiFi settings updated");
    }

    pub(super) async fn sync(&mut self) {
        self.context.enter(AppRunState::Syncing);
        self.say("Syncing data to Google Sheets...");

        self.load_credentials();
        if self.context.credentials.is_none() {
            self.say("No WiFi credentials found. Please set them now:");
            self.update_wifi().await;
        }

        let mut outcome = self.run_sync().await;
        if outcome == SyncOutcome::Failed(SyncFailure::NetworkUnavailable) {
            self.say("WiFi not connected. Cannot sync to Google Sheets.");
            let retry = self
                .prompt("Update WiFi settings and try again? (Y/N)")
                .await
                .is_some_and(|answer| answer.is_yes());
            if retry {
                self.update_wifi().await;
                outcome = self.run_sync().await;
            }
        }

        let message = format!("{outcome}");
        self.say(&message);
        match outcome {
            SyncOutcome::Completed { .. } => self.indicator.success().await,
            SyncOutcome::Skipped(_) => {}
            SyncOutcome::Failed(_) => self.indicator.failure().await,
        }
    }

    async fn run_sync(&mut self) -> SyncOutcome {
        let Some(credentials) = self.context.credentials.clone() else {
            return SyncOutcome::Failed(SyncFailure::NetworkUnavailable);
        };
        let Some(ledger) = self.ledger.as_mut() else {
            return SyncOutcome::Failed(SyncFailure::Storage(missing_ledger()));
        };

        self.console
            .println(&format!("Connecting to {} ...", credentials.ssid));
        self.indicator.waiting(true).await;
        let outcome = SyncEngine::new(&mut self.network, &self.config.sync)
            .run(ledger, &credentials)
            .await;
        self.indicator.waiting(false).await;

        info!("Sync finished: {:?}", outcome);
        outcome
    }
}
