use std::time::Duration;

use cw_core::error::AppError;
use tracing::debug;

const LOOPBACK: &str = "http://127.0.0.1";
const HEALTH_TIMEOUT: Duration = Duration::from_millis(800);

/// `http://127.0.0.1` with an optional non-zero port and nothing after it.
fn is_loopback_url(url: &str) -> bool {
    match url.strip_prefix(LOOPBACK) {
        Some("") => true,
        Some(rest) => rest
            .strip_prefix(':')
            .and_then(|port| port.parse::<u16>().ok())
            .is_some_and(|port| port != 0),
        None => false,
    }
}

/// Handle on the local embedding daemon. Never talks to anything but the loopback address.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let base_url = base_url.trim_end_matches('/');
        if !is_loopback_url(base_url) {
            return Err(AppError::new(
                "OLLAMA_REMOTE_NOT_ALLOWED",
                "Embedding service must listen on 127.0.0.1",
            )
            .with_details(format!("base_url={base_url}")));
        }
        Ok(Self {
            base_url: base_url.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Probe `/api/tags`. Unreachable daemons are retryable; bad statuses are not.
    pub fn health_check(&self) -> Result<(), AppError> {
        let url = format!("{}/api/tags", self.base_url);
        debug!(url = %url, "probing embedding service");

        match ureq::get(&url).timeout(HEALTH_TIMEOUT).call() {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(code, _)) => Err(AppError::new(
                "OLLAMA_UNHEALTHY",
                "Embedding service answered with an error",
            )
            .with_details(format!("status={code}"))),
            Err(e) => Err(AppError::new(
                "OLLAMA_UNREACHABLE",
                "Embedding service is not reachable",
            )
            .with_details(e.to_string())
            .with_retryable(true)),
        }
    }
}
