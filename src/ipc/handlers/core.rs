use crate::dates;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::get_required_str;
use crate::ipc::types::{AppState, Request};
use crate::roster::Roster;
use crate::store::SqliteStore;
use serde_json::json;
use std::path::{Path, PathBuf};

/// Opens (creating if needed) the workspace database and loads its roster.
/// Returns the number of students loaded.
pub fn open_workspace(state: &mut AppState, path: &Path) -> anyhow::Result<usize> {
    // Release the previous connection before opening another.
    state.roster = None;
    let conn = db::open_db(path)?;
    let roster = Roster::open(Box::new(SqliteStore::new(conn)));
    let count = roster.len();
    state.workspace = Some(path.to_path_buf());
    state.roster = Some(roster);
    tracing::info!(workspace = %path.display(), students = count, "workspace opened");
    Ok(count)
}

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match open_workspace(state, &path) {
        Ok(count) => ok(
            &req.id,
            json!({
                "workspacePath": path.to_string_lossy(),
                "studentCount": count
            }),
        ),
        Err(e) => {
            tracing::warn!(workspace = %path.display(), "failed to open workspace: {e:#}");
            state.workspace = None;
            err(&req.id, "db_open_failed", format!("{e:#}"), None)
        }
    }
}

fn handle_dates_today(req: &Request) -> serde_json::Value {
    ok(&req.id, json!({ "date": dates::today() }))
}

fn handle_dates_validate(req: &Request) -> serde_json::Value {
    match get_required_str(&req.params, "date") {
        Ok(date) => ok(&req.id, json!({ "valid": dates::is_valid_date(&date) })),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "dates.today" => Some(handle_dates_today(req)),
        "dates.validate" => Some(handle_dates_validate(req)),
        _ => None,
    }
}
