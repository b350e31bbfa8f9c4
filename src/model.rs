use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub roll_no: String,
    pub name: String,
    pub department: String,
    pub semester: u32,
    /// Empty when not given; legacy files store the empty field.
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceStatus {
    #[serde(rename = "P")]
    Present,
    #[serde(rename = "A")]
    Absent,
}

impl AttendanceStatus {
    pub fn code(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "P",
            AttendanceStatus::Absent => "A",
        }
    }

    /// Word used in report rows.
    pub fn word(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Absent => "Absent",
        }
    }

    /// Legacy files only ever hold `P` or `A`; anything that is not `P` counts as absent.
    pub fn from_code(code: &str) -> Self {
        if code == "P" {
            AttendanceStatus::Present
        } else {
            AttendanceStatus::Absent
        }
    }

    pub fn parse_input(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "P" | "PRESENT" => Some(AttendanceStatus::Present),
            "A" | "ABSENT" => Some(AttendanceStatus::Absent),
            _ => None,
        }
    }

    pub fn is_present(self) -> bool {
        self == AttendanceStatus::Present
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub roll_no: String,
    pub date: String,
    pub status: AttendanceStatus,
    /// Empty string means general (not tied to a subject).
    pub subject: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamResult {
    pub roll_no: String,
    pub semester: String,
    pub subject: String,
    pub marks: f64,
    pub grade: String,
    pub exam_type: String,
}
