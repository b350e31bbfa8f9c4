//! CSV report artifacts.
//!
//! Builders turn loaded collections into a [`ReportDocument`] and return
//! `None` when there is nothing to report; [`generate`] writes the document to
//! a freshly named file and never replaces an existing one.

use crate::calc::{self, AttendanceTally};
use crate::model::{AttendanceRecord, ExamResult, Student};
use anyhow::{anyhow, Context};
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const MAX_NAME_ATTEMPTS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Attendance,
    Daily,
    Department,
    Monthly,
    Performance,
}

impl ReportKind {
    pub fn stem(self) -> &'static str {
        match self {
            ReportKind::Attendance => "attendance_report",
            ReportKind::Daily => "daily_attendance",
            ReportKind::Department => "department_report",
            ReportKind::Monthly => "monthly_report",
            ReportKind::Performance => "student_performance",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportDocument {
    pub kind: ReportKind,
    /// Identifying part of the file name (date, student, month).
    pub key: Option<String>,
    pub header: Vec<&'static str>,
    pub rows: Vec<Vec<String>>,
    pub summary: Vec<(&'static str, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutcome {
    Written { path: PathBuf, row_count: usize },
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateSelector {
    All,
    On(String),
}

impl DateSelector {
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("all") {
            DateSelector::All
        } else {
            DateSelector::On(s.to_string())
        }
    }

    fn key(&self) -> &str {
        match self {
            DateSelector::All => "all",
            DateSelector::On(d) => d,
        }
    }

    fn includes(&self, date: &str) -> bool {
        match self {
            DateSelector::All => true,
            DateSelector::On(d) => d == date,
        }
    }
}

pub fn format_pct(pct: f64) -> String {
    format!("{:.2}%", pct)
}

fn tally_summary(t: &AttendanceTally) -> Vec<(&'static str, String)> {
    vec![
        ("Total Days", t.total.to_string()),
        ("Present Days", t.present.to_string()),
        ("Absent Days", t.absent.to_string()),
        ("Attendance %", format_pct(t.percentage())),
    ]
}

/// One row per student with overall counts and status band.
pub fn attendance_report(
    students: &[Student],
    records: &[AttendanceRecord],
) -> Option<ReportDocument> {
    if students.is_empty() {
        return None;
    }
    let rows = students
        .iter()
        .map(|s| {
            let t = calc::attendance_tally(records, &s.roll_no, None);
            let pct = t.percentage();
            vec![
                s.roll_no.clone(),
                s.name.clone(),
                s.department.clone(),
                s.semester.to_string(),
                t.total.to_string(),
                t.present.to_string(),
                t.absent.to_string(),
                format_pct(pct),
                calc::status_band(pct).as_str().to_string(),
            ]
        })
        .collect();
    Some(ReportDocument {
        kind: ReportKind::Attendance,
        key: None,
        header: vec![
            "Roll No",
            "Name",
            "Department",
            "Semester",
            "Total Days",
            "Present Days",
            "Absent Days",
            "Attendance %",
            "Status",
        ],
        rows,
        summary: Vec::new(),
    })
}

/// One row per attendance record on `date` (or every record), names resolved.
pub fn daily_report(
    students: &[Student],
    records: &[AttendanceRecord],
    date: &DateSelector,
) -> Option<ReportDocument> {
    let names: HashMap<&str, &str> = students
        .iter()
        .map(|s| (s.roll_no.as_str(), s.name.as_str()))
        .collect();

    let rows: Vec<Vec<String>> = records
        .iter()
        .filter(|r| date.includes(&r.date))
        .map(|r| {
            let name = names
                .get(r.roll_no.as_str())
                .copied()
                .filter(|n| !n.is_empty())
                .unwrap_or("Unknown");
            vec![
                r.roll_no.clone(),
                name.to_string(),
                r.date.clone(),
                r.status.word().to_string(),
                r.subject.clone(),
            ]
        })
        .collect();
    if rows.is_empty() {
        return None;
    }
    Some(ReportDocument {
        kind: ReportKind::Daily,
        key: Some(date.key().to_string()),
        header: vec!["Roll No", "Name", "Date", "Status", "Subject"],
        rows,
        summary: Vec::new(),
    })
}

pub fn department_report(
    students: &[Student],
    records: &[AttendanceRecord],
) -> Option<ReportDocument> {
    let summaries = calc::department_summaries(students, records);
    if summaries.is_empty() {
        return None;
    }
    let rows = summaries
        .into_iter()
        .map(|d| {
            vec![
                d.department,
                d.student_count.to_string(),
                format_pct(d.average_pct),
                d.good.to_string(),
                d.average.to_string(),
                d.poor.to_string(),
            ]
        })
        .collect();
    Some(ReportDocument {
        kind: ReportKind::Department,
        key: None,
        header: vec![
            "Department",
            "Total Students",
            "Average Attendance %",
            "Good Attendance (>75%)",
            "Average Attendance (50-75%)",
            "Poor Attendance (<50%)",
        ],
        rows,
        summary: Vec::new(),
    })
}

/// Records of one student in one `YYYY-MM` month, with a totals block.
pub fn monthly_report(
    records: &[AttendanceRecord],
    roll_no: &str,
    month: &str,
) -> Option<ReportDocument> {
    let matching = calc::month_filter(records, roll_no, month);
    if matching.is_empty() {
        return None;
    }
    let mut tally = AttendanceTally::default();
    let mut rows = Vec::with_capacity(matching.len());
    for r in matching {
        tally.add(r);
        let remark = if r.status.is_present() {
            "Attended"
        } else {
            "Absent"
        };
        rows.push(vec![
            r.date.clone(),
            r.status.word().to_string(),
            r.subject.clone(),
            remark.to_string(),
        ]);
    }
    Some(ReportDocument {
        kind: ReportKind::Monthly,
        key: Some(format!("{roll_no}_{month}")),
        header: vec!["Date", "Status", "Subject", "Remarks"],
        rows,
        summary: tally_summary(&tally),
    })
}

/// Exam results of one student; the overall grade is graded from the average.
pub fn performance_report(results: &[ExamResult], roll_no: &str) -> Option<ReportDocument> {
    let mine: Vec<&ExamResult> = results.iter().filter(|r| r.roll_no == roll_no).collect();
    let summary = calc::performance_summary(mine.iter().copied())?;
    let rows = mine
        .iter()
        .map(|r| {
            vec![
                r.semester.clone(),
                r.subject.clone(),
                r.exam_type.clone(),
                format!("{:.2}", r.marks),
                r.grade.clone(),
            ]
        })
        .collect();
    Some(ReportDocument {
        kind: ReportKind::Performance,
        key: Some(roll_no.to_string()),
        header: vec!["Semester", "Subject", "Exam Type", "Marks", "Grade"],
        rows,
        summary: vec![
            ("Total Subjects", summary.count.to_string()),
            ("Average Marks", format!("{:.2}", summary.average_marks)),
            ("Overall Grade", summary.overall_grade),
        ],
    })
}

fn csv_writer(buf: Vec<u8>) -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .flexible(true)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(buf)
}

/// Renders the table, then a blank line and a `Summary` block when present.
pub fn render_csv(doc: &ReportDocument) -> anyhow::Result<Vec<u8>> {
    let mut table = csv_writer(Vec::new());
    table
        .write_record(&doc.header)
        .context("failed to write report header")?;
    for row in &doc.rows {
        table
            .write_record(row)
            .context("failed to write report row")?;
    }
    let mut out = table
        .into_inner()
        .map_err(|e| anyhow!("failed to finish report table: {}", e.error()))?;

    if doc.summary.is_empty() {
        return Ok(out);
    }
    out.push(b'\n');
    let mut block = csv_writer(out);
    block
        .write_record(["Summary"])
        .context("failed to write report summary")?;
    for (label, value) in &doc.summary {
        block
            .write_record([*label, value.as_str()])
            .context("failed to write report summary")?;
    }
    block
        .into_inner()
        .map_err(|e| anyhow!("failed to finish report summary: {}", e.error()))
}

fn file_key(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `<kind>_[<key>_]<YYYYMMDD_HHMMSS>`
pub fn base_file_name(doc: &ReportDocument, now: NaiveDateTime) -> String {
    let stamp = now.format("%Y%m%d_%H%M%S");
    match &doc.key {
        Some(key) => format!("{}_{}_{}", doc.kind.stem(), file_key(key), stamp),
        None => format!("{}_{}", doc.kind.stem(), stamp),
    }
}

/// Writes `doc` under `dir` with a name no earlier report holds.
pub fn write_report(dir: &Path, doc: &ReportDocument, now: NaiveDateTime) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create directory {}", dir.to_string_lossy()))?;
    let bytes = render_csv(doc)?;
    let base = base_file_name(doc, now);

    for attempt in 1..=MAX_NAME_ATTEMPTS {
        let name = if attempt == 1 {
            format!("{base}.csv")
        } else {
            format!("{base}-{attempt}.csv")
        };
        let path = dir.join(name);
        let file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("failed to create report {}", path.to_string_lossy())
                })
            }
        };
        fill_or_discard(file, &path, &bytes)?;
        return Ok(path);
    }
    Err(anyhow!("no free report file name for {base}"))
}

/// Writes `bytes` to the freshly created `path`, removing it again if the write fails.
fn fill_or_discard(mut out: impl Write, path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let written = out.write_all(bytes).and_then(|_| out.flush());
    drop(out);
    if let Err(e) = written {
        if let Err(rm) = std::fs::remove_file(path) {
            tracing::warn!(path = %path.display(), "failed to remove partial report: {rm}");
        }
        return Err(e).with_context(|| format!("failed to write report {}", path.to_string_lossy()));
    }
    Ok(())
}

pub fn generate(
    dir: &Path,
    doc: Option<ReportDocument>,
    now: NaiveDateTime,
) -> anyhow::Result<ReportOutcome> {
    let Some(doc) = doc else {
        tracing::info!("nothing to report");
        return Ok(ReportOutcome::Empty);
    };
    let path = write_report(dir, &doc, now)?;
    tracing::info!(kind = doc.kind.stem(), path = %path.display(), rows = doc.rows.len(), "report written");
    Ok(ReportOutcome::Written {
        path,
        row_count: doc.rows.len(),
    })
}
