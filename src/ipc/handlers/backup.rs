use crate::backup;
use crate::ipc::helpers::{authorize, required_str, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::session::Capability;
use serde_json::json;
use std::path::PathBuf;

fn non_empty_path(req: &Request, key: &str) -> Result<PathBuf, HandlerErr> {
    let raw = required_str(req, key)?;
    if raw.is_empty() {
        return Err(HandlerErr::bad_params(format!("missing {}", key)));
    }
    Ok(PathBuf::from(raw))
}

fn handle_export(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (ws, _) = authorize(state, Capability::Backup)?;
    let out = non_empty_path(req, "outPath")?;
    let export = backup::export_workspace_bundle(&ws.data_files(), &out).map_err(|e| {
        HandlerErr::io(e).with_details(json!({ "path": out.to_string_lossy() }))
    })?;
    Ok(json!({
        "path": out.to_string_lossy(),
        "bundleFormat": export.bundle_format,
        "entryCount": export.entry_count,
        "datasets": export.datasets,
    }))
}

fn handle_import(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (ws, _) = authorize(state, Capability::Backup)?;
    let input = non_empty_path(req, "inPath")?;
    let import = backup::import_workspace_bundle(&input, &ws.data_files()).map_err(|e| {
        HandlerErr::io(e).with_details(json!({ "path": input.to_string_lossy() }))
    })?;
    Ok(json!({
        "bundleFormatDetected": import.bundle_format_detected,
        "datasetsRestored": import.datasets_restored,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "backup.export" => handle_export(state, req),
        "backup.import" => handle_import(state, req),
        _ => return None,
    };
    Some(respond(req, res))
}
