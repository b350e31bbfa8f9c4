use crate::ipc::helpers::{
    authorize, required_scoped_roll_no, required_str, respond, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::reports::{self, DateSelector, ReportDocument, ReportOutcome};
use crate::session::Capability;
use crate::store::Workspace;
use crate::validate;
use serde_json::json;

fn finish(ws: &Workspace, doc: Option<ReportDocument>) -> Result<serde_json::Value, HandlerErr> {
    let now = chrono::Local::now().naive_local();
    match reports::generate(ws.reports_dir(), doc, now).map_err(HandlerErr::io)? {
        ReportOutcome::Written { path, row_count } => Ok(json!({
            "status": "written",
            "path": path.to_string_lossy(),
            "rowCount": row_count,
        })),
        ReportOutcome::Empty => Ok(json!({ "status": "empty" })),
    }
}

fn handle_attendance(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (ws, _) = authorize(state, Capability::AttendanceReports)?;
    let students = ws.students.load_all_or_empty();
    let records = ws.attendance.load_all_or_empty();
    finish(ws, reports::attendance_report(&students, &records))
}

fn handle_daily(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (ws, _) = authorize(state, Capability::AttendanceReports)?;
    let raw = required_str(req, "date")?;
    let selector = DateSelector::parse(&raw);
    if let DateSelector::On(date) = &selector {
        validate::date("date", date)?;
    }
    let students = ws.students.load_all_or_empty();
    let records = ws.attendance.load_all_or_empty();
    finish(ws, reports::daily_report(&students, &records, &selector))
}

fn handle_department(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (ws, _) = authorize(state, Capability::AttendanceReports)?;
    let students = ws.students.load_all_or_empty();
    let records = ws.attendance.load_all_or_empty();
    finish(ws, reports::department_report(&students, &records))
}

fn handle_monthly(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (ws, _) = authorize(state, Capability::AttendanceReports)?;
    let roll_no = required_str(req, "rollNo")?;
    let month = required_str(req, "month")?;
    validate::roll_no("rollNo", &roll_no)?;
    validate::month("month", &month)?;
    let records = ws.attendance.load_all_or_empty();
    finish(ws, reports::monthly_report(&records, &roll_no, &month))
}

fn handle_performance(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (ws, session) = authorize(state, Capability::PerformanceReports)?;
    let roll_no = required_scoped_roll_no(session, req)?;
    validate::roll_no("rollNo", &roll_no)?;
    let results = ws.exam_results.load_all_or_empty();
    finish(ws, reports::performance_report(&results, &roll_no))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "reports.attendance" => handle_attendance(state, req),
        "reports.daily" => handle_daily(state, req),
        "reports.department" => handle_department(state, req),
        "reports.monthly" => handle_monthly(state, req),
        "reports.performance" => handle_performance(state, req),
        _ => return None,
    };
    Some(respond(req, res))
}
