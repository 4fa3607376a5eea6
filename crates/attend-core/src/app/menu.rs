use crate::input::Command;

pub const MENU: &str = "\
=== Attendance System Menu ===
1. Enroll Mode
2. Attendance Mode
3. Clear All Fingerprints
4. View Stored Records
5. Sync to Google Sheets
6. Clear Attendance Data
7. Set Current Date
8. Update WiFi Settings
9. Show Fingerprint Count
10. Show Menu (Help)
==============================";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Enroll,
    Attendance,
    ClearFingerprints,
    ViewRecords,
    Sync,
    ClearAttendance,
    SetDate,
    UpdateWifi,
    FingerprintCount,
    Help,
}

impl MenuChoice {
    /// `None` for anything that is not a menu entry.
    pub fn parse(command: &Command) -> Option<Self> {
        Some(match command.as_str() {
            "1" => Self::Enroll,
            "2" => Self::Attendance,
            "3" => Self::ClearFingerprints,
            "4" => Self::ViewRecords,
            "5" => Self::Sync,
            "6" => Self::ClearAttendance,
            "7" => Self::SetDate,
            "8" => Self::UpdateWifi,
            "9" => Self::FingerprintCount,
            "10" | "?" => Self::Help,
            other if other.eq_ignore_ascii_case("help") => Self::Help,
            _ => return None,
        })
    }
}
