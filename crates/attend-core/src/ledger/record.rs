use alloc::string::{String, ToString};
use core::fmt::{self, Display};

use thiserror_no_std::Error;

/// First line of every ledger file
pub const HEADER: &str = "date,student_id,status,synced";

const FIELD_SEPARATOR: char = ',';
const FIELD_COUNT: usize = 4;

/// Why a stored line could not be read back as a record, or why a record
/// could not be built.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordError {
    #[error("expected 4 fields, found {0}")]
    FieldCount(usize),
    #[error("field `{0}` is empty")]
    EmptyField(&'static str),
    #[error("unknown status value")]
    UnknownStatus,
    #[error("synced flag must be 0 or 1")]
    BadSyncedFlag,
    #[error("field `{0}` contains a comma or line break")]
    InvalidField(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Present,
}

impl Status {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
        }
    }

    fn parse(value: &str) -> Result<Self, RecordError> {
        if value.eq_ignore_ascii_case("present") {
            Ok(Self::Present)
        } else {
            Err(RecordError::UnknownStatus)
        }
    }
}

/// One attendance entry
///
/// Records have no key: identity is their position in the ledger. The
/// `synced` flag only ever goes from `false` to `true`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceRecord {
    pub date: String,
    pub person_id: String,
    pub status: Status,
    pub synced: bool,
}

impl AttendanceRecord {
    /// A fresh, unsynced "present" record.
    pub fn present(date: &str, person_id: &str) -> Result<Self, RecordError> {
        Ok(Self {
            date: checked_field("date", date)?.to_string(),
            person_id: checked_field("student_id", person_id)?.to_string(),
            status: Status::Present,
            synced: false,
        })
    }

    /// Parse a stored data line (without its terminator).
    pub fn parse(line: &str) -> Result<Self, RecordError> {
        let mut fields = line.trim_end_matches('\r').split(FIELD_SEPARATOR);
        let count = line.split(FIELD_SEPARATOR).count();
        if count != FIELD_COUNT {
            return Err(RecordError::FieldCount(count));
        }

        // Count checked above
        let date = fields.next().unwrap_or_default();
        let person_id = fields.next().unwrap_or_default();
        let status = fields.next().unwrap_or_default();
        let synced = fields.next().unwrap_or_default();

        if date.is_empty() {
            return Err(RecordError::EmptyField("date"));
        }
        if person_id.is_empty() {
            return Err(RecordError::EmptyField("student_id"));
        }

        Ok(Self {
            date: date.to_string(),
            person_id: person_id.to_string(),
            status: Status::parse(status)?,
            synced: match synced {
                "0" => false,
                "1" => true,
                _ => return Err(RecordError::BadSyncedFlag),
            },
        })
    }

    /// Canonical storage line, without terminator.
    pub fn to_line(&self) -> String {
        self.to_string()
    }

    pub fn mark_synced(mut self) -> Self {
        self.synced = true;
        self
    }
}

impl Display for AttendanceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.date,
            self.person_id,
            self.status.as_str(),
            if self.synced { '1' } else { '0' }
        )
    }
}

/// Reject values that would break the line format.
pub(crate) fn checked_field<'a>(
    name: &'static str,
    value: &'a str,
) -> Result<&'a str, RecordError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(RecordError::EmptyField(name));
    }
    if value.contains([FIELD_SEPARATOR, '\n', '\r']) {
        return Err(RecordError::InvalidField(name));
    }
    Ok(value)
}
