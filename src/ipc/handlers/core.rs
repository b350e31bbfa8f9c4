use crate::ipc::helpers::{optional_str, required_str, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::session::{Role, Session};
use crate::store::Workspace;
use crate::validate;
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    Ok(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "workspacePath": state.workspace.as_ref().map(|w| w.root().to_string_lossy().to_string()),
        "role": state.session.as_ref().map(|s| s.role.name()),
    }))
}

fn handle_workspace_select(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let path = PathBuf::from(required_str(req, "path")?);
    let ws = Workspace::open(&path).map_err(|e| HandlerErr::new("workspace_open_failed", format!("{e:#}")))?;

    let cfg = ws.config();
    let result = json!({
        "workspacePath": path.to_string_lossy(),
        "files": {
            "students": cfg.students_file.to_string_lossy(),
            "attendance": cfg.attendance_file.to_string_lossy(),
            "examResults": cfg.exam_results_file.to_string_lossy(),
            "reportsDir": cfg.reports_dir.to_string_lossy(),
        },
    });
    tracing::info!(path = %path.display(), "workspace selected");
    state.workspace = Some(ws);
    Ok(result)
}

fn handle_session_begin(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let role_name = required_str(req, "role")?;
    let roll_no = optional_str(req, "rollNo");
    if let Some(r) = roll_no.as_deref() {
        validate::roll_no("rollNo", r)?;
    }
    let role = Role::parse(&role_name, roll_no.as_deref()).ok_or_else(|| {
        HandlerErr::bad_params("role must be admin, teacher, or student (with rollNo)")
            .with_details(json!({ "role": role_name }))
    })?;

    let result = json!({
        "role": role.name(),
        "rollNo": role.own_roll_no(),
        "capabilities": role.capabilities(),
    });
    tracing::info!(role = role.name(), "session started");
    state.session = Some(Session::new(role));
    Ok(result)
}

fn handle_session_end(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let ended = state.session.take().is_some();
    Ok(json!({ "ended": ended }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "health" => handle_health(state, req),
        "workspace.select" => handle_workspace_select(state, req),
        "session.begin" => handle_session_begin(state, req),
        "session.end" => handle_session_end(state, req),
        _ => return None,
    };
    Some(respond(req, res))
}
