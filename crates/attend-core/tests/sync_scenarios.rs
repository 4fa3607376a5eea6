mod common;

use attend_core::config::SyncConfig;
use attend_core::credentials::WifiCredentials;
use attend_core::ledger::{AttendanceLedger, LEDGER_FILE};
use attend_core::net::{NetError, SubmitOutcome};
use attend_core::storage::MemStorage;
use attend_core::sync::{SkipReason, SyncEngine, SyncFailure, SyncOutcome};
use common::{FakeNetwork, ledger_storage};
use embassy_futures::block_on;

fn credentials() -> WifiCredentials {
    WifiCredentials::new("Campus", "secret").unwrap()
}

fn sync(
    network: &mut FakeNetwork,
    config: &SyncConfig,
    ledger: &mut AttendanceLedger<MemStorage>,
) -> SyncOutcome {
    block_on(SyncEngine::new(network, config).run(ledger, &credentials()))
}

fn ledger_bytes(ledger: &mut AttendanceLedger<MemStorage>) -> Vec<u8> {
    ledger.storage_mut().file(LEDGER_FILE).unwrap().to_vec()
}

#[test]
fn test_two_students_sync_once() {
    let storage = ledger_storage(&["19/5,7,present,0", "19/5,12,present,0"]);
    let mut ledger = AttendanceLedger::open(storage).unwrap();
    let mut network = FakeNetwork::answering(&[SubmitOutcome::Accepted { status: 302 }]);
    let config = SyncConfig::default();

    assert_eq!(
        sync(&mut network, &config, &mut ledger),
        SyncOutcome::Completed { count: 2 }
    );
    assert_eq!(
        ledger.storage_mut().text(LEDGER_FILE).unwrap(),
        "date,student_id,status,synced\n19/5,7,present,1\n19/5,12,present,1\n"
    );

    let payload: serde_json::Value = serde_json::from_slice(&network.submissions[0]).unwrap();
    assert_eq!(payload["command"], "batch_attendance");
    assert_eq!(payload["sheet_name"], "Attendance");
    assert_eq!(payload["records"][1]["student_id"], "12");
    assert_eq!(payload["records"].as_array().unwrap().len(), 2);

    let before = ledger_bytes(&mut ledger);
    assert_eq!(
        sync(&mut network, &config, &mut ledger),
        SyncOutcome::Skipped(SkipReason::NothingToSync)
    );
    assert_eq!(network.submissions.len(), 1);
    assert_eq!(ledger_bytes(&mut ledger), before);
}

#[test]
fn test_failed_upload_keeps_records_for_retry() {
    let storage = ledger_storage(&["19/5,7,present,0", "19/5,3,present,1"]);
    let mut ledger = AttendanceLedger::open(storage).unwrap();
    let mut network = FakeNetwork::answering(&[
        SubmitOutcome::Accepted { status: 500 },
        SubmitOutcome::Failed(NetError::Connect),
        SubmitOutcome::Accepted { status: 200 },
    ]);
    let config = SyncConfig {
        strict_status: true,
        ..SyncConfig::default()
    };
    let original = ledger_bytes(&mut ledger);

    assert_eq!(
        sync(&mut network, &config, &mut ledger),
        SyncOutcome::Failed(SyncFailure::UploadRejected { status: Some(500) })
    );
    assert_eq!(ledger_bytes(&mut ledger), original);

    assert_eq!(
        sync(&mut network, &config, &mut ledger),
        SyncOutcome::Failed(SyncFailure::UploadRejected { status: None })
    );
    assert_eq!(ledger_bytes(&mut ledger), original);
    assert_eq!(ledger.stats().unwrap().unsynced, 1);

    assert_eq!(
        sync(&mut network, &config, &mut ledger),
        SyncOutcome::Completed { count: 1 }
    );
    assert_eq!(ledger.stats().unwrap().unsynced, 0);

    // Every attempt carried the same single record
    assert_eq!(network.submissions.len(), 3);
    assert!(network.submissions.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(network.disconnects, 3);
}

#[test]
fn test_timeout_counts_as_delivered_when_optimistic() {
    let storage = ledger_storage(&["19/5,7,present,0"]);
    let mut ledger = AttendanceLedger::open(storage).unwrap();
    let mut network = FakeNetwork::answering(&[SubmitOutcome::TimedOut]);

    let outcome = sync(&mut network, &SyncConfig::default(), &mut ledger);
    assert_eq!(outcome, SyncOutcome::Completed { count: 1 });
    assert_eq!(ledger.stats().unwrap().unsynced, 0);
}

#[test]
fn test_timeout_is_a_failure_when_not_optimistic() {
    let storage = ledger_storage(&["19/5,7,present,0"]);
    let mut ledger = AttendanceLedger::open(storage).unwrap();
    let mut network = FakeNetwork::answering(&[SubmitOutcome::TimedOut]);
    let config = SyncConfig {
        optimistic_timeout: false,
        ..SyncConfig::default()
    };

    let outcome = sync(&mut network, &config, &mut ledger);
    assert_eq!(
        outcome,
        SyncOutcome::Failed(SyncFailure::UploadRejected { status: None })
    );
    assert_eq!(ledger.stats().unwrap().unsynced, 1);
}

#[test]
fn test_unreachable_network_touches_nothing() {
    let storage = ledger_storage(&["19/5,7,present,0"]);
    let mut ledger = AttendanceLedger::open(storage).unwrap();
    let writes = ledger.storage_mut().write_count();
    let mut network = FakeNetwork::unreachable();

    let outcome = sync(&mut network, &SyncConfig::default(), &mut ledger);
    assert_eq!(outcome, SyncOutcome::Failed(SyncFailure::NetworkUnavailable));
    assert!(network.submissions.is_empty());
    assert_eq!(ledger.storage_mut().write_count(), writes);
}

#[test]
fn test_unreadable_lines_survive_sync_verbatim() {
    let storage = ledger_storage(&["19/5,7,present,0", "garbage,,here", "19/5,9,present,0"]);
    let mut ledger = AttendanceLedger::open(storage).unwrap();
    let mut network = FakeNetwork::answering(&[]);

    let outcome = sync(&mut network, &SyncConfig::default(), &mut ledger);
    assert_eq!(outcome, SyncOutcome::Completed { count: 2 });
    assert_eq!(
        ledger.storage_mut().text(LEDGER_FILE).unwrap(),
        "date,student_id,status,synced\n19/5,7,present,1\ngarbage,,here\n19/5,9,present,1\n"
    );
    assert!(!String::from_utf8_lossy(&network.submissions[0]).contains("garbage"));
}

#[test]
fn test_records_appended_after_sync_go_in_the_next_batch() {
    let storage = ledger_storage(&["19/5,7,present,0"]);
    let mut ledger = AttendanceLedger::open(storage).unwrap();
    let mut network = FakeNetwork::answering(&[]);
    let config = SyncConfig::default();

    sync(&mut network, &config, &mut ledger);
    ledger
        .append(&attend_core::ledger::AttendanceRecord::present("20/5", "12").unwrap())
        .unwrap();

    assert_eq!(
        sync(&mut network, &config, &mut ledger),
        SyncOutcome::Completed { count: 1 }
    );
    let second: serde_json::Value = serde_json::from_slice(&network.submissions[1]).unwrap();
    assert_eq!(second["records"][0]["date"], "20/5");
    assert_eq!(second["records"].as_array().unwrap().len(), 1);
}
