use crate::calc;
use crate::ipc::helpers::{
    authorize, optional_str, required_i64, required_scoped_roll_no, required_str, respond,
    scoped_roll_no, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::Student;
use crate::session::Capability;
use crate::validate;
use serde_json::json;

fn student_fields_from(req: &Request, roll_no: String) -> Result<Student, HandlerErr> {
    let name = required_str(req, "name")?;
    let department = required_str(req, "department")?;
    let semester = required_i64(req, "semester")?;
    let email = optional_str(req, "email").unwrap_or_default();
    let phone = optional_str(req, "phone").unwrap_or_default();

    validate::name("name", &name)?;
    validate::storable("department", &department)?;
    let semester = validate::semester("semester", semester)?;
    validate::email("email", &email)?;
    validate::storable("phone", &phone)?;

    Ok(Student {
        roll_no,
        name,
        department,
        semester,
        email,
        phone,
    })
}

fn handle_list(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (ws, session) = authorize(state, Capability::ReadStudents)?;
    let only = scoped_roll_no(session, None)?;
    let students: Vec<Student> = ws
        .load_students()
        .map_err(HandlerErr::io)?
        .into_iter()
        .filter(|s| only.as_deref().map(|r| s.roll_no == r).unwrap_or(true))
        .collect();
    Ok(json!({ "students": students }))
}

fn handle_get(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (ws, session) = authorize(state, Capability::ReadStudents)?;
    let roll_no = required_scoped_roll_no(session, req)?;
    let student = ws
        .load_students()
        .map_err(HandlerErr::io)?
        .into_iter()
        .find(|s| s.roll_no == roll_no)
        .ok_or_else(|| HandlerErr::not_found(format!("student {} not found", roll_no)))?;
    let pct = ws.attendance_percentage(&roll_no, None);
    Ok(json!({
        "student": student,
        "attendancePercentage": calc::round_off_2_decimals(pct),
        "band": calc::status_band(pct),
    }))
}

fn handle_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (ws, _) = authorize(state, Capability::ManageStudents)?;
    let roll_no = required_str(req, "rollNo")?;
    validate::roll_no("rollNo", &roll_no)?;
    let student = student_fields_from(req, roll_no)?;

    let mut students = ws.load_students().map_err(HandlerErr::io)?;
    if students.iter().any(|s| s.roll_no == student.roll_no) {
        return Err(HandlerErr::new(
            "duplicate",
            format!("roll number {} already exists", student.roll_no),
        ));
    }
    students.push(student.clone());
    ws.save_students(&students).map_err(HandlerErr::io)?;
    tracing::info!(roll_no = %student.roll_no, "student added");
    Ok(json!({ "student": student }))
}

fn handle_update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (ws, _) = authorize(state, Capability::ManageStudents)?;
    let roll_no = required_str(req, "rollNo")?;

    let mut students = ws.load_students().map_err(HandlerErr::io)?;
    let Some(slot) = students.iter_mut().find(|s| s.roll_no == roll_no) else {
        return Err(HandlerErr::not_found(format!("student {} not found", roll_no)));
    };
    *slot = student_fields_from(req, roll_no.clone())?;
    let updated = slot.clone();
    ws.save_students(&students).map_err(HandlerErr::io)?;
    tracing::info!(roll_no = %roll_no, "student updated");
    Ok(json!({ "student": updated }))
}

/// Attendance and exam lines of the student are kept; reports show them as `Unknown`.
fn handle_delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (ws, _) = authorize(state, Capability::ManageStudents)?;
    let roll_no = required_str(req, "rollNo")?;

    let mut students = ws.load_students().map_err(HandlerErr::io)?;
    let before = students.len();
    students.retain(|s| s.roll_no != roll_no);
    if students.len() == before {
        return Err(HandlerErr::not_found(format!("student {} not found", roll_no)));
    }
    ws.save_students(&students).map_err(HandlerErr::io)?;
    tracing::info!(roll_no = %roll_no, "student deleted");
    Ok(json!({ "deleted": roll_no }))
}

fn handle_statistics(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (ws, _) = authorize(state, Capability::ManageStudents)?;
    let students = ws.load_students().map_err(HandlerErr::io)?;
    Ok(json!(calc::register_statistics(&students)))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "students.list" => handle_list(state, req),
        "students.get" => handle_get(state, req),
        "students.create" => handle_create(state, req),
        "students.update" => handle_update(state, req),
        "students.delete" => handle_delete(state, req),
        "students.statistics" => handle_statistics(state, req),
        _ => return None,
    };
    Some(respond(req, res))
}
