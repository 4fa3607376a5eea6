//! Batch upload of unsynced attendance records
//!
//! One [`SyncEngine::run`] is one attempt: join the network, collect every
//! unsynced record, upload them in a single request, then rewrite the ledger
//! so exactly the delivered records carry the synced flag. The engine keeps
//! no state between runs; a failed run is retried in full by the next one.

mod payload;

pub use payload::{BatchPayload, UploadRecord};

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::{self, Display};

use log::{debug, error, info, warn};
use thiserror_no_std::Error;

use crate::config::SyncConfig;
use crate::credentials::WifiCredentials;
use crate::ledger::{AttendanceLedger, AttendanceRecord, LedgerError, ScannedLine};
use crate::net::{NetError, NetworkClient, SubmitOutcome, http};
use crate::storage::Storage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    ConnectingNetwork,
    ConnectFailed,
    Connected,
    Uploading,
    UploadFailed,
    Success,
    Reconciling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NothingToSync,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncFailure {
    #[error("could not connect to WiFi")]
    NetworkUnavailable,
    #[error("upload rejected (status {status:?})")]
    UploadRejected { status: Option<u16> },
    #[error("ledger error: {0}")]
    Storage(LedgerError),
    #[error("could not encode upload")]
    Encoding,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed { count: usize },
    Skipped(SkipReason),
    Failed(SyncFailure),
}

impl Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed { count } => write!(f, "Sync complete: {count} record(s) uploaded"),
            Self::Skipped(SkipReason::NothingToSync) => f.write_str("No new records to sync"),
            Self::Failed(failure) => write!(f, "Sync failed: {failure}"),
        }
    }
}

/// What one attempt will upload. Lives only for the duration of a run.
#[derive(Debug)]
pub struct PendingUpload {
    /// Ledger positions of the records, ascending
    pub positions: Vec<usize>,
    pub records: Vec<AttendanceRecord>,
    pub payload: Vec<u8>,
}

impl PendingUpload {
    fn collect(scanned: Vec<ScannedLine>, config: &SyncConfig) -> Result<Option<Self>, SyncFailure> {
        let mut positions = Vec::new();
        let mut records = Vec::new();
        for line in scanned {
            if let ScannedLine::Record { position, record } = line {
                if !record.synced {
                    positions.push(position);
                    records.push(record);
                }
            }
        }
        if records.is_empty() {
            return Ok(None);
        }

        let payload = BatchPayload::new(&config.command, &config.sheet_name, &records)
            .to_json()
            .map_err(|e| {
                error!("Failed to encode upload payload: {:?}", e);
                SyncFailure::Encoding
            })?;

        Ok(Some(Self {
            positions,
            records,
            payload,
        }))
    }
}

pub struct SyncEngine<'a, N> {
    network: &'a mut N,
    config: &'a SyncConfig,
    phase: SyncPhase,
}

impl<'a, N: NetworkClient> SyncEngine<'a, N> {
    pub fn new(network: &'a mut N, config: &'a SyncConfig) -> Self {
        Self {
            network,
            config,
            phase: SyncPhase::Idle,
        }
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    fn transition(&mut self, next: SyncPhase) {
        debug!("Sync: {:?} -> {:?}", self.phase, next);
        self.phase = next;
    }

    /// Run one sync attempt to completion. Always ends back in `Idle`.
    pub async fn run<S: Storage>(
        &mut self,
        ledger: &mut AttendanceLedger<S>,
        credentials: &WifiCredentials,
    ) -> SyncOutcome {
        self.transition(SyncPhase::ConnectingNetwork);
        if let Err(e) = self
            .network
            .connect(credentials, self.config.connect_timeout_ms)
            .await
        {
            warn!("Sync: WiFi connection failed: {}", e);
            self.transition(SyncPhase::ConnectFailed);
            self.transition(SyncPhase::Idle);
            return SyncOutcome::Failed(SyncFailure::NetworkUnavailable);
        }
        self.transition(SyncPhase::Connected);

        let outcome = self.upload(ledger).await;

        self.network.disconnect().await;
        self.transition(SyncPhase::Idle);
        info!("{}", outcome);
        outcome
    }

    async fn upload<S: Storage>(&mut self, ledger: &mut AttendanceLedger<S>) -> SyncOutcome {
        let pending = match ledger.records() {
            Ok(scanned) => match PendingUpload::collect(scanned, self.config) {
                Ok(Some(pending)) => pending,
                Ok(None) => return SyncOutcome::Skipped(SkipReason::NothingToSync),
                Err(failure) => return SyncOutcome::Failed(failure),
            },
            Err(e) => return SyncOutcome::Failed(SyncFailure::Storage(e)),
        };

        self.transition(SyncPhase::Uploading);
        info!("Sync: uploading {} record(s)", pending.records.len());
        let submitted = self
            .network
            .submit(&self.config.endpoint, &pending.payload)
            .await;
        let result = self.classify(submitted);

        let delivered = result.is_ok();
        self.transition(if delivered {
            SyncPhase::Success
        } else {
            SyncPhase::UploadFailed
        });
        if delivered {
            self.transition(SyncPhase::Reconciling);
        }

        if let Err(e) = reconcile(ledger, &pending.positions, delivered) {
            return SyncOutcome::Failed(SyncFailure::Storage(e));
        }

        match result {
            Ok(()) => SyncOutcome::Completed {
                count: pending.records.len(),
            },
            Err(failure) => SyncOutcome::Failed(failure),
        }
    }

    fn classify(&self, outcome: SubmitOutcome) -> Result<(), SyncFailure> {
        match outcome {
            SubmitOutcome::Accepted { status } if http::is_success(status) => {
                debug!("Sync: server answered {}", status);
                Ok(())
            }
            SubmitOutcome::Accepted { status } if self.config.strict_status => {
                warn!("Sync: server rejected upload with {}", status);
                Err(SyncFailure::UploadRejected {
                    status: Some(status),
                })
            }
            SubmitOutcome::Accepted { status } => {
                warn!("Sync: server answered {}, counting the batch as delivered", status);
                Ok(())
            }
            SubmitOutcome::TimedOut if self.config.optimistic_timeout => {
                warn!("Sync: no response before timeout, assuming delivered");
                Ok(())
            }
            SubmitOutcome::TimedOut => Err(SyncFailure::UploadRejected { status: None }),
            SubmitOutcome::Failed(NetError::NoCredentials) => {
                Err(SyncFailure::NetworkUnavailable)
            }
            SubmitOutcome::Failed(e) => {
                warn!("Sync: upload failed: {}", e);
                Err(SyncFailure::UploadRejected { status: None })
            }
        }
    }
}

/// Rewrite the ledger, flipping the records at `positions` to synced when
/// `delivered`. Every other line passes through untouched.
fn reconcile<S: Storage>(
    ledger: &mut AttendanceLedger<S>,
    positions: &[usize],
    delivered: bool,
) -> Result<(), LedgerError> {
    let mut position = 0;
    let mut next = positions.iter().copied().peekable();

    ledger.replace_all(|line| {
        let current = position;
        position += 1;

        if next.peek() != Some(&current) {
            return Some(String::from(line));
        }
        next.next();

        if !delivered {
            return Some(String::from(line));
        }
        match AttendanceRecord::parse(line) {
            Ok(record) => Some(record.mark_synced().to_line()),
            Err(_) => Some(String::from(line)),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SheetEndpoint;
    use crate::ledger::LEDGER_FILE;
    use crate::storage::MemStorage;
    use alloc::vec;
    use embassy_futures::block_on;

    struct ScriptedNetwork {
        connect: Result<(), NetError>,
        submit: SubmitOutcome,
        submitted: Vec<Vec<u8>>,
        disconnects: usize,
    }

    impl ScriptedNetwork {
        fn new(submit: SubmitOutcome) -> Self {
            Self {
                connect: Ok(()),
                submit,
                submitted: Vec::new(),
                disconnects: 0,
            }
        }
    }

    impl NetworkClient for ScriptedNetwork {
        async fn connect(&mut self, _: &WifiCredentials, _: u32) -> Result<(), NetError> {
            self.connect
        }

        async fn submit(&mut self, _: &SheetEndpoint, payload: &[u8]) -> SubmitOutcome {
            self.submitted.push(payload.to_vec());
            self.submit
        }

        async fn disconnect(&mut self) {
            self.disconnects += 1;
        }
    }

    fn ledger_with(contents: &str) -> AttendanceLedger<MemStorage> {
        AttendanceLedger::open(MemStorage::new().with_file(LEDGER_FILE, contents.as_bytes()))
            .unwrap()
    }

    fn text(ledger: AttendanceLedger<MemStorage>) -> String {
        String::from(ledger.into_inner().text(LEDGER_FILE).unwrap())
    }

    fn creds() -> WifiCredentials {
        WifiCredentials::new("Campus", "secret").unwrap()
    }

    const MIXED: &str = "date,student_id,status,synced\n\
                         19/5,7,present,1\n\
                         19/5,12,present,0\n\
                         broken line\n\
                         19/5,3,present,0\n";

    #[test]
    fn test_success_marks_only_candidates() {
        let mut ledger = ledger_with(MIXED);
        let mut network = ScriptedNetwork::new(SubmitOutcome::Accepted { status: 302 });
        let config = SyncConfig::default();

        let outcome = block_on(SyncEngine::new(&mut network, &config).run(&mut ledger, &creds()));

        assert_eq!(outcome, SyncOutcome::Completed { count: 2 });
        assert_eq!(network.submitted.len(), 1);
        assert_eq!(network.disconnects, 1);
        assert_eq!(
            text(ledger),
            "date,student_id,status,synced\n19/5,7,present,1\n19/5,12,present,1\nbroken line\n19/5,3,present,1\n"
        );
    }

    #[test]
    fn test_error_status_still_counts_as_delivered() {
        let mut ledger = ledger_with(MIXED);
        let mut network = ScriptedNetwork::new(SubmitOutcome::Accepted { status: 500 });
        let config = SyncConfig::default();

        let outcome = block_on(SyncEngine::new(&mut network, &config).run(&mut ledger, &creds()));

        assert_eq!(outcome, SyncOutcome::Completed { count: 2 });
        assert_eq!(
            text(ledger),
            "date,student_id,status,synced\n19/5,7,present,1\n19/5,12,present,1\nbroken line\n19/5,3,present,1\n"
        );
    }

    #[test]
    fn test_strict_status_rejection_leaves_flags_alone() {
        let mut ledger = ledger_with(MIXED);
        let mut network = ScriptedNetwork::new(SubmitOutcome::Accepted { status: 500 });
        let config = SyncConfig {
            strict_status: true,
            ..SyncConfig::default()
        };

        let outcome = block_on(SyncEngine::new(&mut network, &config).run(&mut ledger, &creds()));

        assert_eq!(
            outcome,
            SyncOutcome::Failed(SyncFailure::UploadRejected { status: Some(500) })
        );
        assert_eq!(text(ledger), MIXED);
    }

    #[test]
    fn test_timeout_without_optimism_is_a_failure() {
        let mut ledger = ledger_with(MIXED);
        let mut network = ScriptedNetwork::new(SubmitOutcome::TimedOut);
        let config = SyncConfig {
            optimistic_timeout: false,
            ..SyncConfig::default()
        };

        let outcome = block_on(SyncEngine::new(&mut network, &config).run(&mut ledger, &creds()));

        assert_eq!(
            outcome,
            SyncOutcome::Failed(SyncFailure::UploadRejected { status: None })
        );
        assert_eq!(text(ledger), MIXED);
    }

    #[test]
    fn test_connect_failure_touches_nothing() {
        let mut ledger = ledger_with(MIXED);
        let mut network = ScriptedNetwork::new(SubmitOutcome::Accepted { status: 200 });
        network.connect = Err(NetError::ConnectTimeout);
        let config = SyncConfig::default();

        let mut engine = SyncEngine::new(&mut network, &config);
        let outcome = block_on(engine.run(&mut ledger, &creds()));

        assert_eq!(outcome, SyncOutcome::Failed(SyncFailure::NetworkUnavailable));
        assert_eq!(engine.phase(), SyncPhase::Idle);
        assert!(network.submitted.is_empty());
        assert_eq!(text(ledger), MIXED);
    }

    #[test]
    fn test_payload_carries_only_unsynced_records() {
        let mut ledger = ledger_with(MIXED);
        let mut network = ScriptedNetwork::new(SubmitOutcome::Accepted { status: 200 });
        let config = SyncConfig::default();

        block_on(SyncEngine::new(&mut network, &config).run(&mut ledger, &creds()));

        let body: serde_json::Value = serde_json::from_slice(&network.submitted[0]).unwrap();
        let ids: Vec<&str> = body["records"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["student_id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["12", "3"]);
        assert_eq!(body["command"], "batch_attendance");
        assert_eq!(body["sheet_name"], "Attendance");
    }

    #[test]
    fn test_outcome_messages() {
        assert_eq!(
            alloc::format!("{}", SyncOutcome::Completed { count: 2 }),
            "Sync complete: 2 record(s) uploaded"
        );
        assert_eq!(
            alloc::format!("{}", SyncOutcome::Failed(SyncFailure::NetworkUnavailable)),
            "Sync failed: could not connect to WiFi"
        );
    }
}
