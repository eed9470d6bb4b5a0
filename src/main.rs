mod attendance;
mod config;
mod db;
mod ipc;

use serde_json::json;
use std::io::{self, BufRead, Write};
use tracing::{error, info, warn};

fn main() {
    let config = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("attendanced: invalid configuration: {e:#}");
            std::process::exit(1);
        }
    };

    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(config.log_level)
        .with_ansi(false)
        .with_target(false)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "attendanced starting");

    let startup_workspace = config.workspace.clone();
    let mut state = ipc::AppState {
        config,
        workspace: None,
        db: None,
    };
    if let Some(path) = startup_workspace {
        if let Err(e) = ipc::select_workspace(&mut state, path.clone()) {
            error!(workspace = %path.display(), error = ?e, "configured workspace could not be opened");
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                warn!(error = %e, "unparseable request line");
                let reply = json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", reply);
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

    info!("stdin closed, attendanced exiting");
}
