use std::env;
use std::path::PathBuf;
use std::time::Duration;

use matchdesk_core::{AppError, AppResult};
use tracing_subscriber::EnvFilter;

const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:3001/api";
const DEFAULT_SESSION_FILE: &str = ".matchdesk/session.json";
const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleConfig {
    pub api_base_url: String,
    /// `None` keeps credentials in memory for the lifetime of the process.
    pub session_file: Option<PathBuf>,
    pub http_timeout: Duration,
}

impl ConsoleConfig {
    pub fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let api_base_url = lookup("MATCHDESK_API_BASE_URL")
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_owned());

        let session_file = match lookup("MATCHDESK_SESSION_FILE") {
            Some(value) if value.trim().is_empty() => None,
            Some(value) => Some(PathBuf::from(value.trim())),
            None => Some(PathBuf::from(DEFAULT_SESSION_FILE)),
        };

        let timeout_seconds = parse_u64(
            "MATCHDESK_HTTP_TIMEOUT_SECONDS",
            lookup("MATCHDESK_HTTP_TIMEOUT_SECONDS"),
            DEFAULT_HTTP_TIMEOUT_SECONDS,
        )?;
        if timeout_seconds == 0 {
            return Err(AppError::Validation(
                "MATCHDESK_HTTP_TIMEOUT_SECONDS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            api_base_url,
            session_file,
            http_timeout: Duration::from_secs(timeout_seconds),
        })
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn parse_u64(name: &str, value: Option<String>, default: u64) -> AppResult<u64> {
    match value {
        Some(value) => value.trim().parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}
