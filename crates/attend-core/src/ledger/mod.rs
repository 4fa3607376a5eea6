//! Attendance ledger: the on-device record store
//!
//! The ledger is a CSV file, header first, one record per line. It is only
//! ever mutated in two ways: [`AttendanceLedger::append`] for new records and
//! [`AttendanceLedger::replace_all`] for whole-file rewrites (clearing, and
//! marking records synced).
//!
//! ## Atomic replace
//!
//! The storage backends cannot rename files, so a rewrite goes through a
//! temporary file plus a commit marker:
//!
//! 1. remove any stale `ATTEND.TMP`
//! 2. stream the header and the transformed lines into `ATTEND.TMP`
//! 3. create `ATTEND.CMT` (the commit point)
//! 4. truncate `ATTEND.CSV` and copy `ATTEND.TMP` into it
//! 5. remove `ATTEND.CMT`, then `ATTEND.TMP`
//!
//! Recovery runs on [`AttendanceLedger::open`] and after any failed rewrite:
//! a marker means the temporary file is complete and steps 4-5 are redone; a
//! temporary file without a marker is an orphan and is discarded. Either way
//! the ledger ends up wholly old or wholly new.

mod lines;
mod record;

pub use lines::LedgerLines;
pub use record::{AttendanceRecord, HEADER, RecordError, Status};

pub(crate) use record::checked_field;

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Debug;

use log::{debug, error, info, warn};
use thiserror_no_std::Error;

use crate::storage::Storage;
use lines::LineCursor;

pub const LEDGER_FILE: &str = "ATTEND.CSV";
pub const TEMP_FILE: &str = "ATTEND.TMP";
pub const COMMIT_FILE: &str = "ATTEND.CMT";

/// Rewrites are buffered and flushed to storage in pieces of about this size
const WRITE_CHUNK: usize = 256;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("storage {op} failed on {file}")]
    Io {
        op: &'static str,
        file: &'static str,
    },
    #[error("invalid record: {0}")]
    Record(RecordError),
}

impl From<RecordError> for LedgerError {
    fn from(value: RecordError) -> Self {
        Self::Record(value)
    }
}

pub(crate) fn io_error<E: Debug>(op: &'static str, file: &'static str, e: E) -> LedgerError {
    error!("Ledger {} failed on {}: {:?}", op, file, e);
    LedgerError::Io { op, file }
}

/// A data line as read back from the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScannedLine {
    Record {
        position: usize,
        record: AttendanceRecord,
    },
    /// A line that does not parse. It is kept verbatim and never uploaded.
    Quarantined {
        position: usize,
        line: String,
        reason: RecordError,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerStats {
    pub records: usize,
    pub unsynced: usize,
    pub quarantined: usize,
}

/// Sole owner of the on-device attendance records
pub struct AttendanceLedger<S: Storage> {
    storage: S,
    /// Set while a rewrite is in flight or after one failed part-way
    needs_recovery: bool,
    /// The last append may have been cut short; the tail needs checking
    tail_unchecked: bool,
}

impl<S: Storage> AttendanceLedger<S> {
    /// Open the ledger, finishing or discarding any interrupted rewrite and
    /// creating the file (header only) if it does not exist yet.
    pub fn open(storage: S) -> Result<Self, LedgerError> {
        let mut ledger = Self {
            storage,
            needs_recovery: true,
            tail_unchecked: true,
        };
        ledger.recover()?;
        ledger.ensure_header()?;
        ledger.terminate_torn_tail()?;
        Ok(ledger)
    }

    /// Access to the underlying storage for sibling files (credentials).
    ///
    /// The ledger files themselves must only be touched through this type.
    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn into_inner(self) -> S {
        self.storage
    }

    /// Append one record. The write is flushed before this returns.
    pub fn append(&mut self, record: &AttendanceRecord) -> Result<(), LedgerError> {
        self.recover()?;
        self.terminate_torn_tail()?;
        let mut line = record.to_line();
        line.push('\n');
        self.storage
            .append(LEDGER_FILE, line.as_bytes())
            .map_err(|e| {
                self.tail_unchecked = true;
                io_error("append", LEDGER_FILE, e)
            })?;
        debug!("Appended ledger record: {}", record);
        Ok(())
    }

    /// Every line of the ledger, header first, read lazily from storage.
    ///
    /// Each call starts again from the beginning of the file.
    pub fn scan_all(&mut self) -> LedgerLines<'_, S> {
        match self.recover() {
            Ok(()) => LedgerLines::new(&mut self.storage, LEDGER_FILE),
            Err(e) => LedgerLines::failed(&mut self.storage, LEDGER_FILE, e),
        }
    }

    /// All data lines, parsed. Lines that do not parse are quarantined.
    pub fn records(&mut self) -> Result<Vec<ScannedLine>, LedgerError> {
        let mut scanned = Vec::new();
        let mut position = 0;
        for (index, line) in self.scan_all().enumerate() {
            let line = line?;
            if index == 0 && line == HEADER {
                continue;
            }
            scanned.push(match AttendanceRecord::parse(&line) {
                Ok(record) => ScannedLine::Record { position, record },
                Err(reason) => {
                    warn!(
                        "Quarantined ledger line {} ({}): {}",
                        position, reason, line
                    );
                    ScannedLine::Quarantined {
                        position,
                        line,
                        reason,
                    }
                }
            });
            position += 1;
        }
        Ok(scanned)
    }

    pub fn stats(&mut self) -> Result<LedgerStats, LedgerError> {
        let mut stats = LedgerStats::default();
        for line in self.records()? {
            match line {
                ScannedLine::Record { record, .. } => {
                    stats.records += 1;
                    if !record.synced {
                        stats.unsynced += 1;
                    }
                }
                ScannedLine::Quarantined { .. } => stats.quarantined += 1,
            }
        }
        Ok(stats)
    }

    /// Atomically rewrite the ledger.
    ///
    /// The header is always written first. `transform` sees every data line
    /// in order and returns its replacement, or `None` to drop it. Readers
    /// see either the old or the new ledger, never a mix (see module docs).
    pub fn replace_all<F>(&mut self, mut transform: F) -> Result<(), LedgerError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        self.recover()?;
        self.needs_recovery = true;

        self.storage
            .remove(TEMP_FILE)
            .map_err(|e| io_error("remove", TEMP_FILE, e))?;

        let mut out = String::with_capacity(WRITE_CHUNK + 64);
        out.push_str(HEADER);
        out.push('\n');

        let mut cursor = LineCursor::new(LEDGER_FILE);
        let mut first = true;
        while let Some(line) = cursor.next_line(&mut self.storage)? {
            if core::mem::take(&mut first) && line == HEADER {
                continue;
            }
            if let Some(replacement) = transform(&line) {
                out.push_str(&replacement);
                out.push('\n');
            }
            if out.len() >= WRITE_CHUNK {
                self.write_temp(&out)?;
                out.clear();
            }
        }
        if !out.is_empty() {
            self.write_temp(&out)?;
        }

        self.storage
            .truncate(COMMIT_FILE)
            .map_err(|e| io_error("commit", COMMIT_FILE, e))?;

        self.install()?;
        self.needs_recovery = false;
        Ok(())
    }

    /// Drop every record, keeping only the header.
    pub fn clear(&mut self) -> Result<(), LedgerError> {
        self.replace_all(|_| None)?;
        info!("Attendance ledger cleared");
        Ok(())
    }

    fn write_temp(&mut self, data: &str) -> Result<(), LedgerError> {
        self.storage
            .append(TEMP_FILE, data.as_bytes())
            .map_err(|e| io_error("append", TEMP_FILE, e))
    }

    /// Finish or discard an interrupted rewrite.
    fn recover(&mut self) -> Result<(), LedgerError> {
        if !self.needs_recovery {
            return Ok(());
        }

        let committed = self
            .storage
            .exists(COMMIT_FILE)
            .map_err(|e| io_error("stat", COMMIT_FILE, e))?;
        let temp_present = self
            .storage
            .exists(TEMP_FILE)
            .map_err(|e| io_error("stat", TEMP_FILE, e))?;

        match (committed, temp_present) {
            (true, true) => {
                warn!("Completing interrupted ledger rewrite");
                self.install()?;
            }
            (true, false) => {
                // Marker outlived its temp file; nothing left to install
                warn!("Removing stale ledger commit marker");
                self.storage
                    .remove(COMMIT_FILE)
                    .map_err(|e| io_error("remove", COMMIT_FILE, e))?;
            }
            (false, true) => {
                warn!("Discarding orphaned temporary ledger");
                self.storage
                    .remove(TEMP_FILE)
                    .map_err(|e| io_error("remove", TEMP_FILE, e))?;
            }
            (false, false) => {}
        }

        self.needs_recovery = false;
        Ok(())
    }

    /// Copy the committed temporary file over the ledger (steps 4-5).
    fn install(&mut self) -> Result<(), LedgerError> {
        self.storage
            .truncate(LEDGER_FILE)
            .map_err(|e| io_error("truncate", LEDGER_FILE, e))?;

        let mut buf = [0u8; WRITE_CHUNK];
        let mut offset = 0u32;
        loop {
            let n = self
                .storage
                .read_at(TEMP_FILE, offset, &mut buf)
                .map_err(|e| io_error("read", TEMP_FILE, e))?;
            if n == 0 {
                break;
            }
            self.storage
                .append(LEDGER_FILE, &buf[..n])
                .map_err(|e| io_error("append", LEDGER_FILE, e))?;
            offset += n as u32;
        }

        self.storage
            .remove(COMMIT_FILE)
            .map_err(|e| io_error("remove", COMMIT_FILE, e))?;
        self.storage
            .remove(TEMP_FILE)
            .map_err(|e| io_error("remove", TEMP_FILE, e))?;
        debug!("Installed rewritten ledger ({} bytes)", offset);
        Ok(())
    }

    /// End a partial last line (left by an append cut short by power loss)
    /// so the next record starts on its own line. The fragment stays in the
    /// ledger and is quarantined like any other unreadable line.
    fn terminate_torn_tail(&mut self) -> Result<(), LedgerError> {
        if !self.tail_unchecked {
            return Ok(());
        }

        let mut buf = [0u8; WRITE_CHUNK];
        let mut offset = 0u32;
        let mut last = None;
        loop {
            let n = self
                .storage
                .read_at(LEDGER_FILE, offset, &mut buf)
                .map_err(|e| io_error("read", LEDGER_FILE, e))?;
            if n == 0 {
                break;
            }
            last = Some(buf[n - 1]);
            offset += n as u32;
        }

        if matches!(last, Some(byte) if byte != b'\n') {
            warn!("Ledger ends in a partial line; terminating it");
            self.storage
                .append(LEDGER_FILE, b"\n")
                .map_err(|e| io_error("append", LEDGER_FILE, e))?;
        }
        self.tail_unchecked = false;
        Ok(())
    }

    fn ensure_header(&mut self) -> Result<(), LedgerError> {
        let exists = self
            .storage
            .exists(LEDGER_FILE)
            .map_err(|e| io_error("stat", LEDGER_FILE, e))?;

        let first = if exists {
            LineCursor::new(LEDGER_FILE).next_line(&mut self.storage)?
        } else {
            None
        };

        match first {
            Some(line) if line == HEADER => {
                info!("Attendance file exists");
            }
            Some(_) => {
                warn!("Ledger header missing; restoring it");
                // replace_all always writes the header and keeps every line
                self.replace_all(|line| Some(String::from(line)))?;
            }
            None => {
                let mut header = String::from(HEADER);
                header.push('\n');
                self.storage
                    .truncate(LEDGER_FILE)
                    .map_err(|e| io_error("create", LEDGER_FILE, e))?;
                self.storage
                    .append(LEDGER_FILE, header.as_bytes())
                    .map_err(|e| io_error("append", LEDGER_FILE, e))?;
                info!("Created attendance file with headers");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemStorage;
    use alloc::string::ToString;
    use alloc::vec;

    const TWO_RECORDS: &str = "date,student_id,status,synced\n19/5,7,present,0\n19/5,12,present,1\n";

    fn ledger_text(ledger: &AttendanceLedger<MemStorage>) -> String {
        ledger.storage.text(LEDGER_FILE).unwrap_or_default().to_string()
    }

    #[test]
    fn test_open_creates_header_only_ledger() {
        let ledger = AttendanceLedger::open(MemStorage::new()).unwrap();
        assert_eq!(ledger_text(&ledger), "date,student_id,status,synced\n");
    }

    #[test]
    fn test_open_keeps_existing_ledger() {
        let storage = MemStorage::new().with_file(LEDGER_FILE, TWO_RECORDS.as_bytes());
        let ledger = AttendanceLedger::open(storage).unwrap();
        assert_eq!(ledger_text(&ledger), TWO_RECORDS);
    }

    #[test]
    fn test_open_restores_missing_header() {
        let storage = MemStorage::new().with_file(LEDGER_FILE, b"19/5,7,present,0\n");
        let ledger = AttendanceLedger::open(storage).unwrap();
        assert_eq!(
            ledger_text(&ledger),
            "date,student_id,status,synced\n19/5,7,present,0\n"
        );
    }

    #[test]
    fn test_append_then_scan_round_trips() {
        let mut ledger = AttendanceLedger::open(MemStorage::new()).unwrap();
        let record = AttendanceRecord::present("19/5", "7").unwrap();
        ledger.append(&record).unwrap();

        let lines: Vec<String> = ledger.scan_all().map(Result::unwrap).collect();
        assert_eq!(lines, vec![HEADER.to_string(), "19/5,7,present,0".to_string()]);
        assert_eq!(AttendanceRecord::parse(&lines[1]).unwrap(), record);
    }

    #[test]
    fn test_scan_all_is_restartable() {
        let storage = MemStorage::new().with_file(LEDGER_FILE, TWO_RECORDS.as_bytes());
        let mut ledger = AttendanceLedger::open(storage).unwrap();
        assert_eq!(ledger.scan_all().count(), 3);
        assert_eq!(ledger.scan_all().count(), 3);
    }

    #[test]
    fn test_replace_all_rewrites_and_drops() {
        let storage = MemStorage::new().with_file(LEDGER_FILE, TWO_RECORDS.as_bytes());
        let mut ledger = AttendanceLedger::open(storage).unwrap();

        ledger
            .replace_all(|line| line.ends_with(",0").then(|| line.replace(",0", ",1")))
            .unwrap();

        assert_eq!(
            ledger_text(&ledger),
            "date,student_id,status,synced\n19/5,7,present,1\n"
        );
        assert!(!ledger.storage.exists(TEMP_FILE).unwrap());
        assert!(!ledger.storage.exists(COMMIT_FILE).unwrap());
    }

    #[test]
    fn test_clear_keeps_header() {
        let storage = MemStorage::new().with_file(LEDGER_FILE, TWO_RECORDS.as_bytes());
        let mut ledger = AttendanceLedger::open(storage).unwrap();
        ledger.clear().unwrap();
        assert_eq!(ledger_text(&ledger), "date,student_id,status,synced\n");
        assert_eq!(ledger.stats().unwrap(), LedgerStats::default());
    }

    #[test]
    fn test_open_discards_orphaned_temp_file() {
        let storage = MemStorage::new()
            .with_file(LEDGER_FILE, TWO_RECORDS.as_bytes())
            .with_file(TEMP_FILE, b"date,student_id,status,synced\n");
        let ledger = AttendanceLedger::open(storage).unwrap();
        assert_eq!(ledger_text(&ledger), TWO_RECORDS);
        assert!(ledger.storage.file(TEMP_FILE).is_none());
    }

    #[test]
    fn test_open_completes_committed_rewrite() {
        let storage = MemStorage::new()
            .with_file(LEDGER_FILE, b"date,student_id,status,syn")
            .with_file(TEMP_FILE, b"date,student_id,status,synced\n19/5,7,present,1\n")
            .with_file(COMMIT_FILE, b"");
        let ledger = AttendanceLedger::open(storage).unwrap();
        assert_eq!(
            ledger_text(&ledger),
            "date,student_id,status,synced\n19/5,7,present,1\n"
        );
        assert!(ledger.storage.file(TEMP_FILE).is_none());
        assert!(ledger.storage.file(COMMIT_FILE).is_none());
    }

    #[test]
    fn test_malformed_lines_are_quarantined() {
        let storage = MemStorage::new().with_file(
            LEDGER_FILE,
            b"date,student_id,status,synced\n19/5,7,present,0\ngarbage\n19/5,9,present,1\n",
        );
        let mut ledger = AttendanceLedger::open(storage).unwrap();

        let scanned = ledger.records().unwrap();
        assert_eq!(scanned.len(), 3);
        assert!(matches!(
            &scanned[1],
            ScannedLine::Quarantined { position: 1, line, reason: RecordError::FieldCount(1) }
                if line == "garbage"
        ));
        assert_eq!(
            ledger.stats().unwrap(),
            LedgerStats {
                records: 2,
                unsynced: 1,
                quarantined: 1
            }
        );
    }

    #[test]
    fn test_append_after_torn_tail_starts_a_new_line() {
        let storage = MemStorage::new().with_file(
            LEDGER_FILE,
            b"date,student_id,status,synced\n19/5,7,present,0\n19/5,9,pre",
        );
        let mut ledger = AttendanceLedger::open(storage).unwrap();
        ledger
            .append(&AttendanceRecord::present("19/5", "12").unwrap())
            .unwrap();

        assert_eq!(
            ledger_text(&ledger),
            "date,student_id,status,synced\n19/5,7,present,0\n19/5,9,pre\n19/5,12,present,0\n"
        );
        assert_eq!(
            ledger.stats().unwrap(),
            LedgerStats {
                records: 2,
                unsynced: 2,
                quarantined: 1
            }
        );
    }

    #[test]
    fn test_append_failure_reports_io_error() {
        let mut storage = MemStorage::new();
        storage.fail_after_writes(2); // header create + header write
        let mut ledger = AttendanceLedger::open(storage).unwrap();
        let record = AttendanceRecord::present("19/5", "7").unwrap();
        assert_eq!(
            ledger.append(&record),
            Err(LedgerError::Io {
                op: "append",
                file: LEDGER_FILE
            })
        );
    }
}
