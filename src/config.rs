//! Startup configuration, read from `ROLLCALLD_*` environment variables.
//!
//! Everything else is configured at runtime through IPC requests
//! (`workspace.select`).

use std::path::PathBuf;

pub const WORKSPACE_ENV: &str = "ROLLCALLD_WORKSPACE";
pub const LOG_ENV: &str = "ROLLCALLD_LOG";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Workspace opened before the first request, if set.
    pub workspace: Option<PathBuf>,
    /// `EnvFilter` directives; falls back to `RUST_LOG`, then `info`.
    pub log_filter: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            workspace: non_empty(WORKSPACE_ENV).map(PathBuf::from),
            log_filter: non_empty(LOG_ENV),
        }
    }
}
