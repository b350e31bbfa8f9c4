use crate::calc;
use crate::ipc::helpers::{
    authorize, optional_str, required_scoped_roll_no, required_str, respond, scoped_roll_no,
    HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{AttendanceRecord, AttendanceStatus};
use crate::session::Capability;
use crate::validate::{self, ValidationError};
use serde_json::json;
use std::collections::HashSet;

fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

/// `date` (defaults to today) and `subject` (defaults to general) shared by both mark methods.
fn mark_target(req: &Request) -> Result<(String, String), HandlerErr> {
    let date = optional_str(req, "date")
        .filter(|d| !d.is_empty())
        .unwrap_or_else(today);
    validate::date("date", &date)?;
    let subject = optional_str(req, "subject").unwrap_or_default();
    validate::storable("subject", &subject)?;
    Ok((date, subject))
}

fn parse_status(raw: &str) -> Result<AttendanceStatus, HandlerErr> {
    AttendanceStatus::parse_input(raw)
        .ok_or_else(|| ValidationError::Status { field: "status" }.into())
}

fn handle_mark(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (ws, _) = authorize(state, Capability::MarkAttendance)?;
    let (date, subject) = mark_target(req)?;
    let Some(entries) = req.params.get("entries").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("missing entries"));
    };
    if entries.is_empty() {
        return Err(HandlerErr::bad_params("entries must not be empty"));
    }

    let students = ws.load_students().map_err(HandlerErr::io)?;
    let registered: HashSet<&str> = students.iter().map(|s| s.roll_no.as_str()).collect();

    let mut records = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let Some(roll_no) = entry.get("rollNo").and_then(|v| v.as_str()).map(str::trim) else {
            return Err(HandlerErr::bad_params(format!("entries[{}] missing rollNo", i)));
        };
        let Some(raw_status) = entry.get("status").and_then(|v| v.as_str()) else {
            return Err(HandlerErr::bad_params(format!("entries[{}] missing status", i)));
        };
        validate::roll_no("rollNo", roll_no)?;
        if !registered.contains(roll_no) {
            return Err(HandlerErr::not_found(format!("student {} not found", roll_no))
                .with_details(json!({ "index": i })));
        }
        records.push(AttendanceRecord {
            roll_no: roll_no.to_string(),
            date: date.clone(),
            status: parse_status(raw_status)?,
            subject: subject.clone(),
        });
    }

    match records.as_slice() {
        [one] => ws.append_attendance(one),
        many => ws.append_attendance_batch(many),
    }
    .map_err(HandlerErr::io)?;
    tracing::info!(date = %date, subject = %subject, count = records.len(), "attendance marked");
    Ok(json!({ "written": records.len(), "date": date, "subject": subject }))
}

fn handle_mark_all(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (ws, _) = authorize(state, Capability::MarkAttendance)?;
    let (date, subject) = mark_target(req)?;
    let status = parse_status(&required_str(req, "status")?)?;

    let students = ws.load_students().map_err(HandlerErr::io)?;
    if students.is_empty() {
        return Err(HandlerErr::not_found("no students registered"));
    }
    let records: Vec<AttendanceRecord> = students
        .iter()
        .map(|s| AttendanceRecord {
            roll_no: s.roll_no.clone(),
            date: date.clone(),
            status,
            subject: subject.clone(),
        })
        .collect();

    ws.append_attendance_batch(&records).map_err(HandlerErr::io)?;
    tracing::info!(date = %date, status = status.code(), count = records.len(), "attendance marked for all");
    Ok(json!({ "written": records.len(), "date": date, "subject": subject }))
}

fn handle_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (ws, session) = authorize(state, Capability::ReadAttendance)?;
    let roll_no = scoped_roll_no(session, optional_str(req, "rollNo"))?;
    let date = optional_str(req, "date").filter(|d| !d.is_empty());

    let records: Vec<serde_json::Value> = ws
        .load_attendance()
        .map_err(HandlerErr::io)?
        .into_iter()
        .filter(|r| roll_no.as_deref().map(|x| r.roll_no == x).unwrap_or(true))
        .filter(|r| date.as_deref().map(|x| r.date == x).unwrap_or(true))
        .map(|r| {
            json!({
                "rollNo": r.roll_no,
                "date": r.date,
                "status": r.status.code(),
                "subject": r.subject,
            })
        })
        .collect();
    Ok(json!({ "records": records }))
}

fn handle_percentage(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (ws, session) = authorize(state, Capability::ReadAttendance)?;
    let roll_no = required_scoped_roll_no(session, req)?;
    let subject = optional_str(req, "subject").filter(|s| !s.is_empty());

    let records = ws.attendance.load_all_or_empty();
    let tally = calc::attendance_tally(&records, &roll_no, subject.as_deref());
    let pct = tally.percentage();
    Ok(json!({
        "rollNo": roll_no,
        "subject": subject,
        "tally": tally,
        "percentage": calc::round_off_2_decimals(pct),
        "band": calc::status_band(pct),
    }))
}

fn handle_summary(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (ws, session) = authorize(state, Capability::ReadAttendance)?;
    let roll_no = required_scoped_roll_no(session, req)?;
    let records = ws.attendance.load_all_or_empty();
    Ok(json!(calc::subject_breakdown(&records, &roll_no)))
}

fn handle_dates(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (ws, session) = authorize(state, Capability::ReadAttendance)?;
    let mut records = ws.attendance.load_all_or_empty();
    if let Some(own) = session.role.own_roll_no() {
        records.retain(|r| r.roll_no == own);
    }
    Ok(json!({ "dates": calc::distinct_dates(&records) }))
}

fn handle_subjects(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (ws, session) = authorize(state, Capability::ReadAttendance)?;
    let roll_no = required_scoped_roll_no(session, req)?;
    let records = ws.attendance.load_all_or_empty();
    Ok(json!({ "rollNo": roll_no, "subjects": calc::distinct_subjects(&records, &roll_no) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "attendance.mark" => handle_mark(state, req),
        "attendance.markAll" => handle_mark_all(state, req),
        "attendance.list" => handle_list(state, req),
        "attendance.percentage" => handle_percentage(state, req),
        "attendance.summary" => handle_summary(state, req),
        "attendance.dates" => handle_dates(state, req),
        "attendance.subjects" => handle_subjects(state, req),
        _ => return None,
    };
    Some(respond(req, res))
}
