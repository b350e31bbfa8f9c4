//! One record per line, fields joined with `|` in a fixed order.
//!
//! Field values are written as-is. A value holding the delimiter shifts every
//! later field of that line on the next load; write paths reject such values
//! before they reach this module (see `validate`).

use crate::model::{AttendanceRecord, AttendanceStatus, ExamResult, Student};
use std::str::FromStr;

pub const DELIMITER: char = '|';

pub trait Record: Sized {
    /// Short name used in log lines.
    const KIND: &'static str;

    fn encode(&self) -> String;
    /// Total: every line yields a record, missing fields read as empty or zero.
    fn decode(line: &str) -> Self;
}

pub fn contains_delimiter(field: &str) -> bool {
    field.contains(DELIMITER)
}

struct Fields<'a> {
    parts: Vec<&'a str>,
}

impl<'a> Fields<'a> {
    fn split(line: &'a str) -> Self {
        Self {
            parts: line.split(DELIMITER).collect(),
        }
    }

    fn text(&self, idx: usize) -> String {
        self.parts.get(idx).map(|s| s.to_string()).unwrap_or_default()
    }

    fn u32_or_zero(&self, idx: usize) -> u32 {
        self.parts
            .get(idx)
            .and_then(|s| {
                let s = s.trim_start();
                let s = s.strip_prefix('+').unwrap_or(s);
                let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
                s[..end].parse::<u32>().ok()
            })
            .unwrap_or(0)
    }

    fn f64_or_zero(&self, idx: usize) -> f64 {
        self.parts
            .get(idx)
            .and_then(|s| leading_number::<f64>(s.trim_start()))
            .unwrap_or(0.0)
    }
}

/// Longest prefix of `s` that parses as `T`, so `87.5 (retest)` reads as 87.5.
fn leading_number<T: FromStr>(s: &str) -> Option<T> {
    (1..=s.len())
        .rev()
        .filter(|&end| s.is_char_boundary(end))
        .find_map(|end| s[..end].parse::<T>().ok())
}

/// Two decimals like the legacy writer, unless that would lose precision.
fn encode_marks(marks: f64) -> String {
    let fixed = format!("{:.2}", marks);
    if fixed.parse::<f64>().ok() == Some(marks) {
        fixed
    } else {
        marks.to_string()
    }
}

impl Record for Student {
    const KIND: &'static str = "student";

    fn encode(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}",
            self.roll_no, self.name, self.department, self.semester, self.email, self.phone
        )
    }

    fn decode(line: &str) -> Self {
        let f = Fields::split(line);
        Student {
            roll_no: f.text(0),
            name: f.text(1),
            department: f.text(2),
            semester: f.u32_or_zero(3),
            email: f.text(4),
            phone: f.text(5),
        }
    }
}

impl Record for AttendanceRecord {
    const KIND: &'static str = "attendance";

    fn encode(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.roll_no,
            self.date,
            self.status.code(),
            self.subject
        )
    }

    fn decode(line: &str) -> Self {
        let f = Fields::split(line);
        AttendanceRecord {
            roll_no: f.text(0),
            date: f.text(1),
            status: AttendanceStatus::from_code(&f.text(2)),
            subject: f.text(3),
        }
    }
}

impl Record for ExamResult {
    const KIND: &'static str = "exam_result";

    fn encode(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}",
            self.roll_no,
            self.semester,
            self.subject,
            encode_marks(self.marks),
            self.grade,
            self.exam_type
        )
    }

    fn decode(line: &str) -> Self {
        let f = Fields::split(line);
        ExamResult {
            roll_no: f.text(0),
            semester: f.text(1),
            subject: f.text(2),
            marks: f.f64_or_zero(3),
            grade: f.text(4),
            exam_type: f.text(5),
        }
    }
}
