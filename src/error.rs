// Error module: one sum type for every failure the client can surface.
// Each variant carries the same `ErrorDetails` so callers can match on the
// kind and still read the status, raw body and retry hint.

use reqwest::blocking::Response;
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TonieError>;

/// Diagnostic payload shared by every error kind.
///
/// `message` is the only user-visible part. It is built from the API's own
/// error body or from a fixed local description, never from request data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorDetails {
    pub message: String,
    pub status: Option<u16>,
    pub body: Option<String>,
    pub retry_after: Option<u64>,
}

impl ErrorDetails {
    pub fn new(message: impl Into<String>) -> Self {
        ErrorDetails {
            message: message.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TonieError {
    /// Malformed or oversized local input, or HTTP 400.
    #[error("validation error: {}", .0.message)]
    Validation(ErrorDetails),
    /// HTTP 401/403, or missing credentials.
    #[error("authentication error: {}", .0.message)]
    Authentication(ErrorDetails),
    /// HTTP 404, or a chapter id absent from the current tonie.
    #[error("not found: {}", .0.message)]
    NotFound(ErrorDetails),
    /// HTTP 429. `retry_after` holds the `Retry-After` seconds if sent.
    #[error("rate limit exceeded: {}", .0.message)]
    RateLimit(ErrorDetails),
    /// HTTP 5xx, or any failure reported by the storage backend.
    #[error("server error: {}", .0.message)]
    Server(ErrorDetails),
    /// Anything unclassified: transport failures, unexpected payloads.
    #[error("api error: {}", .0.message)]
    Api(ErrorDetails),
}

impl TonieError {
    pub fn validation(message: impl Into<String>) -> Self {
        TonieError::Validation(ErrorDetails::new(message))
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        TonieError::Authentication(ErrorDetails::new(message))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        TonieError::NotFound(ErrorDetails::new(message))
    }

    pub fn details(&self) -> &ErrorDetails {
        match self {
            TonieError::Validation(d)
            | TonieError::Authentication(d)
            | TonieError::NotFound(d)
            | TonieError::RateLimit(d)
            | TonieError::Server(d)
            | TonieError::Api(d) => d,
        }
    }

    pub fn status(&self) -> Option<u16> {
        self.details().status
    }

    pub fn retry_after(&self) -> Option<u64> {
        self.details().retry_after
    }
}

impl From<reqwest::Error> for TonieError {
    fn from(err: reqwest::Error) -> Self {
        // Drop the URL so query strings never end up in messages.
        let err = err.without_url();
        TonieError::Api(ErrorDetails {
            message: err.to_string(),
            status: err.status().map(|s| s.as_u16()),
            ..Default::default()
        })
    }
}

impl From<serde_json::Error> for TonieError {
    fn from(err: serde_json::Error) -> Self {
        TonieError::Api(ErrorDetails::new(format!("unexpected response payload: {err}")))
    }
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

/// Map a status code plus the raw response pieces onto an error kind.
///
/// Callers pass only what came back from the server; no request data ever
/// reaches this function.
pub fn classify(status: u16, body: &str, retry_after: Option<&str>) -> TonieError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
        .unwrap_or_else(|| format!("HTTP {status}"));

    let details = ErrorDetails {
        message,
        status: Some(status),
        body: (!body.is_empty()).then(|| body.to_string()),
        retry_after: None,
    };

    match status {
        400 => TonieError::Validation(details),
        401 | 403 => TonieError::Authentication(details),
        404 => TonieError::NotFound(details),
        429 => TonieError::RateLimit(ErrorDetails {
            retry_after: retry_after.and_then(parse_retry_after),
            ..details
        }),
        500..=599 => TonieError::Server(details),
        _ => TonieError::Api(details),
    }
}

/// Only the delta-seconds form counts; HTTP dates and junk yield `None`.
pub fn parse_retry_after(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

/// Pass a successful response through, or consume it into a classified error.
pub(crate) fn check_response(res: Response) -> Result<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    Err(error_from_response(status, res))
}

fn error_from_response(status: StatusCode, res: Response) -> TonieError {
    let retry_after = res
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = res.text().unwrap_or_default();
    classify(status.as_u16(), &body, retry_after.as_deref())
}
