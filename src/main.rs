mod auth;
mod calc;
mod config;
mod db;
mod ipc;
mod ledger;
mod level;

use std::io::{self, BufRead, Write};

use chrono::TimeDelta;
use serde_json::json;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() {
    // stdout carries the IPC stream; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rankd=info")),
        )
        .with_writer(io::stderr)
        .init();

    let config = config::Config::load();
    let ttl = TimeDelta::try_hours(config.session_ttl_hours).unwrap_or_default();
    let gate = match auth::PasswordGate::new(&config.admin_password, ttl) {
        Ok(g) => g,
        Err(e) => {
            error!("cannot start admin gate: {e}");
            std::process::exit(1);
        }
    };
    let mut state = ipc::AppState::new(config, Box::new(gate));

    if let Some(path) = state.config.workspace.clone() {
        match db::open_db(&path) {
            Ok(conn) => {
                info!(workspace = %path.display(), "workspace opened from environment");
                state.workspace = Some(path);
                state.db = Some(conn);
            }
            Err(e) => warn!(workspace = %path.display(), "could not open workspace: {e:#}"),
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), "rankd ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                error!("stdin read failed: {e}");
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
                warn!("dropping malformed request: {e}");
                let _ = writeln!(
                    stdout,
                    "{}",
                    json!({
                        "ok": false,
                        "error": { "code": "bad_json", "message": e.to_string() }
                    })
                );
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

    info!("stdin closed, shutting down");
}
