use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::session::{Capability, Session};
use crate::store::Workspace;
use crate::validate::ValidationError;
use serde_json::json;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", message)
    }

    pub fn io(e: anyhow::Error) -> Self {
        tracing::error!("{e:#}");
        Self::new("io_failed", format!("{e:#}"))
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<ValidationError> for HandlerErr {
    fn from(e: ValidationError) -> Self {
        HandlerErr::new("invalid_field", e.to_string()).with_details(json!({ "field": e.field() }))
    }
}

pub fn required_str(req: &Request, key: &str) -> Result<String, HandlerErr> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn optional_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
}

/// Accepts a JSON integer or a numeric string.
pub fn required_i64(req: &Request, key: &str) -> Result<i64, HandlerErr> {
    let v = req
        .params
        .get(key)
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))?;
    v.as_i64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse::<i64>().ok()))
        .ok_or_else(|| HandlerErr::bad_params(format!("{} must be an integer", key)))
}

pub fn required_f64(req: &Request, key: &str) -> Result<f64, HandlerErr> {
    let v = req
        .params
        .get(key)
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))?;
    v.as_f64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
        .filter(|x| x.is_finite())
        .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a number", key)))
}

/// Workspace and session, once the session's role permits `cap`.
pub fn authorize(
    state: &AppState,
    cap: Capability,
) -> Result<(&Workspace, &Session), HandlerErr> {
    let ws = state
        .workspace
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))?;
    let session = state
        .session
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_session", "begin a session first"))?;
    if !session.role.permits(cap) {
        return Err(HandlerErr::new(
            "forbidden",
            format!("{} may not do this", session.role.name()),
        )
        .with_details(json!({ "capability": cap })));
    }
    Ok((ws, session))
}

/// Student sessions are pinned to their own roll number; other roles pass through.
pub fn scoped_roll_no(
    session: &Session,
    requested: Option<String>,
) -> Result<Option<String>, HandlerErr> {
    match (session.role.own_roll_no(), requested) {
        (Some(own), None) => Ok(Some(own.to_string())),
        (Some(own), Some(r)) if r == own => Ok(Some(r)),
        (Some(_), Some(_)) => Err(HandlerErr::new(
            "forbidden",
            "students may only access their own records",
        )),
        (None, requested) => Ok(requested),
    }
}

pub fn required_scoped_roll_no(session: &Session, req: &Request) -> Result<String, HandlerErr> {
    scoped_roll_no(session, optional_str(req, "rollNo"))?
        .ok_or_else(|| HandlerErr::bad_params("missing rollNo"))
}

pub fn respond(req: &Request, res: Result<serde_json::Value, HandlerErr>) -> serde_json::Value {
    match res {
        Ok(v) => crate::ipc::error::ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}
