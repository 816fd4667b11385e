use std::fmt;

use thiserror::Error;

/// Failure classification callers match on to pick a status code or exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ConnectionError,
    UnexpectedStatusCode,
    UnexpectedResponse,
    NoSourcesSelected,
    NotFound,
    InvalidInput,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConnectionError => "connection_error",
            ErrorKind::UnexpectedStatusCode => "unexpected_status_code",
            ErrorKind::UnexpectedResponse => "unexpected_response",
            ErrorKind::NoSourcesSelected => "no_sources_selected",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidInput => "invalid_input",
        }
    }

    /// True when the caller asked for something unanswerable, false when an
    /// upstream service misbehaved.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::NoSourcesSelected | ErrorKind::NotFound | ErrorKind::InvalidInput
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum TemperatureError {
    #[error("could not connect to {service}: {message}")]
    Connection { service: String, message: String },

    #[error("{service} answered with unexpected status {status}. Response: {body}")]
    UnexpectedStatusCode {
        service: String,
        status: u16,
        body: String,
    },

    #[error("{service} returned an unexpected response: {description}. Response: {body}")]
    UnexpectedResponse {
        service: String,
        description: String,
        body: String,
    },

    #[error("none of the requested sources are available (filter: {filter:?})")]
    NoSourcesSelected { filter: Vec<String> },

    #[error("no location found for postal code '{postal_code}'")]
    NotFound { postal_code: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl TemperatureError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TemperatureError::Connection { .. } => ErrorKind::ConnectionError,
            TemperatureError::UnexpectedStatusCode { .. } => ErrorKind::UnexpectedStatusCode,
            TemperatureError::UnexpectedResponse { .. } => ErrorKind::UnexpectedResponse,
            TemperatureError::NoSourcesSelected { .. } => ErrorKind::NoSourcesSelected,
            TemperatureError::NotFound { .. } => ErrorKind::NotFound,
            TemperatureError::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }

    pub fn connection(service: &str, message: impl Into<String>) -> Self {
        TemperatureError::Connection { service: service.to_string(), message: message.into() }
    }

    pub fn unexpected_status(service: &str, status: u16, body: &str) -> Self {
        TemperatureError::UnexpectedStatusCode {
            service: service.to_string(),
            status,
            body: truncate_body(body),
        }
    }

    pub fn unexpected_response(service: &str, description: impl Into<String>, body: &str) -> Self {
        TemperatureError::UnexpectedResponse {
            service: service.to_string(),
            description: description.into(),
            body: truncate_body(body),
        }
    }

    /// Name of the upstream service involved, if any.
    pub fn service(&self) -> Option<&str> {
        match self {
            TemperatureError::Connection { service, .. }
            | TemperatureError::UnexpectedStatusCode { service, .. }
            | TemperatureError::UnexpectedResponse { service, .. } => Some(service),
            _ => None,
        }
    }
}

pub type Result<T, E = TemperatureError> = std::result::Result<T, E>;

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        let head: String = body.chars().take(MAX).collect();
        format!("{head}...")
    } else {
        body.to_string()
    }
}
