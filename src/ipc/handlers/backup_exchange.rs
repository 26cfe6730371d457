use crate::backup;
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::handlers::core::open_workspace;
use crate::ipc::helpers::{get_required_text, write_export};
use crate::ipc::types::{AppState, Request};
use crate::report;
use serde_json::json;
use std::path::{Path, PathBuf};

fn workspace_of(state: &AppState) -> Result<PathBuf, HandlerErr> {
    state
        .workspace
        .clone()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

fn io_failed(path: &str, e: anyhow::Error) -> HandlerErr {
    HandlerErr::new("io_failed", format!("{e:#}")).with_details(json!({ "path": path }))
}

fn backup_export(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let out_path = get_required_text(params, "outPath")?;
    let workspace = workspace_of(state)?;
    let export = backup::export_workspace_bundle(&workspace, Path::new(&out_path)).map_err(|e| {
        tracing::warn!(path = %out_path, "backup export failed: {e:#}");
        io_failed(&out_path, e)
    })?;
    tracing::info!(path = %out_path, sha256 = %export.db_sha256, "workspace bundle exported");
    Ok(json!({
        "path": out_path,
        "bundleFormat": export.bundle_format,
        "entryCount": export.entry_count,
        "dbSha256": export.db_sha256,
    }))
}

/// The roster's connection is closed for the swap and the workspace is
/// reopened afterwards, whether or not the import went through.
fn backup_import(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let in_path = get_required_text(params, "inPath")?;
    let workspace = workspace_of(state)?;
    if !Path::new(&in_path).is_file() {
        return Err(HandlerErr::not_found("bundle file not found")
            .with_details(json!({ "path": in_path })));
    }

    state.roster = None;
    let imported = backup::import_workspace_bundle(Path::new(&in_path), &workspace);
    let reopened = open_workspace(state, &workspace);

    let import = imported.map_err(|e| {
        tracing::warn!(path = %in_path, "backup import failed: {e:#}");
        io_failed(&in_path, e)
    });
    let count = match reopened {
        Ok(count) => count,
        Err(e) => {
            tracing::warn!(workspace = %workspace.display(), "failed to reopen workspace: {e:#}");
            // Import errors take precedence.
            import?;
            return Err(HandlerErr::new("db_open_failed", format!("{e:#}")));
        }
    };
    let import = import?;
    tracing::info!(path = %in_path, students = count, "workspace bundle imported");
    Ok(json!({
        "workspacePath": workspace.to_string_lossy(),
        "bundleFormatDetected": import.bundle_format_detected,
        "studentCount": count,
    }))
}

fn export_class_csv(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_name = get_required_text(params, "className")?;
    let out_path = get_required_text(params, "outPath")?;
    let roster = state
        .roster
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))?;
    let (text, rows) = report::class_attendance_csv(roster, &class_name);
    write_export(&out_path, &text)?;
    Ok(json!({ "path": out_path, "rowsExported": rows }))
}

fn export_roster_json(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let out_path = get_required_text(params, "outPath")?;
    let roster = state
        .roster
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))?;
    let text =
        report::roster_json(roster).map_err(|e| HandlerErr::new("io_failed", e.to_string()))?;
    write_export(&out_path, &text)?;
    Ok(json!({ "path": out_path, "studentsExported": roster.len() }))
}

type StateFn = fn(&mut AppState, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>;

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let f: StateFn = match req.method.as_str() {
        "backup.exportWorkspaceBundle" => backup_export,
        "backup.importWorkspaceBundle" => backup_import,
        "exchange.exportClassCsv" => export_class_csv,
        "exchange.exportRosterJson" => export_roster_json,
        _ => return None,
    };
    Some(match f(state, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    })
}
