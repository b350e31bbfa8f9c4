use crate::calc;
use crate::ipc::helpers::{
    authorize, optional_str, required_f64, required_str, respond, scoped_roll_no, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::ExamResult;
use crate::session::Capability;
use crate::validate;
use serde_json::json;

fn handle_add(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let result = {
        let (ws, _) = authorize(state, Capability::ManageExams)?;
        let roll_no = required_str(req, "rollNo")?;
        let semester = required_str(req, "semester")?;
        let subject = required_str(req, "subject")?;
        let exam_type = required_str(req, "examType")?;
        let marks = required_f64(req, "marks")?;

        validate::roll_no("rollNo", &roll_no)?;
        validate::non_empty("semester", &semester)?;
        validate::storable("semester", &semester)?;
        validate::non_empty("subject", &subject)?;
        validate::storable("subject", &subject)?;
        validate::storable("examType", &exam_type)?;

        let students = ws.load_students().map_err(HandlerErr::io)?;
        if !students.iter().any(|s| s.roll_no == roll_no) {
            return Err(HandlerErr::not_found(format!("student {} not found", roll_no)));
        }

        let result = ExamResult {
            grade: calc::grade_from_marks(marks).to_string(),
            roll_no,
            semester,
            subject,
            marks,
            exam_type,
        };
        ws.append_exam_result(&result).map_err(HandlerErr::io)?;
        result
    };

    tracing::info!(roll_no = %result.roll_no, subject = %result.subject, grade = %result.grade, "exam result added");
    if let Some(session) = state.session.as_mut() {
        session.notify(format!(
            "New exam result for {} in {}: {}",
            result.roll_no, result.subject, result.grade
        ));
    }
    Ok(json!({ "result": result }))
}

fn handle_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (ws, session) = authorize(state, Capability::ReadExams)?;
    let roll_no = scoped_roll_no(session, optional_str(req, "rollNo"))?;

    let results: Vec<ExamResult> = ws
        .load_exam_results()
        .map_err(HandlerErr::io)?
        .into_iter()
        .filter(|r| roll_no.as_deref().map(|x| r.roll_no == x).unwrap_or(true))
        .collect();
    let summary = calc::performance_summary(&results);
    Ok(json!({ "results": results, "summary": summary }))
}

fn handle_notifications(
    state: &mut AppState,
    _req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let (ws, session) = authorize(state, Capability::Notifications)?;
    let students = ws.students.load_all_or_empty();
    let records = ws.attendance.load_all_or_empty();
    let alerts = calc::low_attendance_alerts(
        &students,
        &records,
        ws.config().low_attendance_threshold,
    );
    let alert_messages: Vec<String> = alerts.iter().map(|a| a.message()).collect();
    Ok(json!({
        "notifications": session.notifications(),
        "lowAttendance": alerts,
        "alerts": alert_messages,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "exams.add" => handle_add(state, req),
        "exams.list" => handle_list(state, req),
        "notifications.list" => handle_notifications(state, req),
        _ => return None,
    };
    Some(respond(req, res))
}
