use anyhow::Context;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_DB_FILE: &str = "attendance.sqlite3";

#[derive(Debug, Clone)]
pub struct Config {
    /// Workspace opened before the first request, if any.
    pub workspace: Option<PathBuf>,
    pub db_file: String,
    pub busy_timeout_ms: u64,
    pub log_level: tracing::Level,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: None,
            db_file: DEFAULT_DB_FILE.to_string(),
            busy_timeout_ms: 5000,
            log_level: tracing::Level::INFO,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let workspace = env::var("ATTENDANCED_WORKSPACE")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        let db_file = env::var("ATTENDANCED_DB_FILE")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.db_file);

        let busy_timeout_ms = match env::var("ATTENDANCED_BUSY_TIMEOUT_MS") {
            Ok(v) => v
                .trim()
                .parse::<u64>()
                .with_context(|| format!("ATTENDANCED_BUSY_TIMEOUT_MS is not a number: {v:?}"))?,
            Err(_) => defaults.busy_timeout_ms,
        };

        let log_level = match env::var("ATTENDANCED_LOG") {
            Ok(v) => v
                .trim()
                .parse::<tracing::Level>()
                .with_context(|| format!("ATTENDANCED_LOG is not a log level: {v:?}"))?,
            Err(_) => defaults.log_level,
        };

        Ok(Self {
            workspace,
            db_file,
            busy_timeout_ms,
            log_level,
        })
    }
}
