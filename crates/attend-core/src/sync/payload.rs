use alloc::vec::Vec;

use serde::Serialize;

use crate::ledger::AttendanceRecord;

/// Body of the batch upload request
#[derive(Serialize, Debug)]
pub struct BatchPayload<'a> {
    pub command: &'a str,
    pub sheet_name: &'a str,
    pub records: Vec<UploadRecord<'a>>,
}

#[derive(Serialize, Debug)]
pub struct UploadRecord<'a> {
    pub date: &'a str,
    pub student_id: &'a str,
    pub status: &'static str,
}

impl<'a> From<&'a AttendanceRecord> for UploadRecord<'a> {
    fn from(record: &'a AttendanceRecord) -> Self {
        Self {
            date: &record.date,
            student_id: &record.person_id,
            status: record.status.as_str(),
        }
    }
}

impl<'a> BatchPayload<'a> {
    pub fn new(command: &'a str, sheet_name: &'a str, records: &'a [AttendanceRecord]) -> Self {
        Self {
            command,
            sheet_name,
            records: records.iter().map(UploadRecord::from).collect(),
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
