//! Error kinds surfaced by the sensor hub.

use garmin_connect_client::GarminError;
use serde::Serialize;
use thiserror::Error;

/// Integration errors.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IntegrationError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Rate limited: {0}")]
    RateLimit(String),

    #[error("Fetch failed: {0}")]
    TransientFetch(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown reference: {0}")]
    Reference(String),

    #[error("Garmin Connect rejected the request: {0}")]
    Upstream(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Machine-readable error kind, used in health output and metric labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Auth,
    RateLimit,
    TransientFetch,
    Validation,
    Reference,
    Upstream,
    Config,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Auth => "auth",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::TransientFetch => "transient_fetch",
            ErrorKind::Validation => "validation",
            ErrorKind::Reference => "reference",
            ErrorKind::Upstream => "upstream",
            ErrorKind::Config => "config",
        }
    }
}

impl IntegrationError {
    /// Classify a client failure that happened while polling.
    pub fn from_fetch(err: GarminError) -> Self {
        if err.is_auth() {
            return IntegrationError::Auth(err.to_string());
        }
        if err.is_rate_limited() {
            return IntegrationError::RateLimit(err.to_string());
        }
        match err {
            GarminError::Config(msg) => IntegrationError::Config(msg),
            other => IntegrationError::TransientFetch(other.to_string()),
        }
    }

    /// Classify a client failure that happened while running an action.
    pub fn from_action(err: GarminError) -> Self {
        if err.is_auth() {
            return IntegrationError::Auth(err.to_string());
        }
        if err.is_rate_limited() {
            return IntegrationError::RateLimit(err.to_string());
        }
        match err {
            GarminError::Config(msg) => IntegrationError::Config(msg),
            other => IntegrationError::Upstream(other.to_string()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            IntegrationError::Auth(_) => ErrorKind::Auth,
            IntegrationError::RateLimit(_) => ErrorKind::RateLimit,
            IntegrationError::TransientFetch(_) => ErrorKind::TransientFetch,
            IntegrationError::Validation(_) => ErrorKind::Validation,
            IntegrationError::Reference(_) => ErrorKind::Reference,
            IntegrationError::Upstream(_) => ErrorKind::Upstream,
            IntegrationError::Config(_) => ErrorKind::Config,
        }
    }
}

impl From<serde_json::Error> for IntegrationError {
    fn from(err: serde_json::Error) -> Self {
        IntegrationError::Validation(err.to_string())
    }
}

/// Result type alias for integration operations.
pub type IntegrationResult<T> = Result<T, IntegrationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_classification() {
        let auth = IntegrationError::from_fetch(GarminError::Auth("expired".into()));
        assert_eq!(auth.kind(), ErrorKind::Auth);

        let limited = IntegrationError::from_fetch(GarminError::TooManyRequests("x".into()));
        assert_eq!(limited.kind(), ErrorKind::RateLimit);

        let timeout = IntegrationError::from_fetch(GarminError::Timeout("30s".into()));
        assert_eq!(timeout.kind(), ErrorKind::TransientFetch);

        let server = IntegrationError::from_fetch(GarminError::Status {
            status: 500,
            body: String::new(),
        });
        assert_eq!(server.kind(), ErrorKind::TransientFetch);
    }

    #[test]
    fn action_classification_reports_upstream() {
        let rejected = IntegrationError::from_action(GarminError::InvalidInput("bad".into()));
        assert_eq!(rejected.kind(), ErrorKind::Upstream);
        assert!(rejected.to_string().contains("bad"));

        let auth = IntegrationError::from_action(GarminError::Auth("no".into()));
        assert_eq!(auth.kind(), ErrorKind::Auth);
    }
}
