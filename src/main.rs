mod backup;
mod config;
mod dates;
mod db;
mod ipc;
mod logging;
mod report;
mod roster;
mod store;
mod student;

use std::io::{self, BufRead, Write};

fn main() {
    let cfg = config::Config::from_env();
    logging::init_logging(cfg.log_filter.as_deref());

    let mut state = ipc::AppState::default();
    if let Some(path) = cfg.workspace.as_ref() {
        if let Err(e) = ipc::open_workspace(&mut state, path) {
            tracing::warn!(workspace = %path.display(), "failed to open configured workspace: {e:#}");
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("stdin read failed, exiting: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }

    tracing::debug!("stdin closed, shutting down");
}
