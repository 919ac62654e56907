//! forge::http
//!
//! Shared HTTP plumbing for the native backend clients.
//!
//! # Design
//!
//! Native clients speak [`ApiError`], never [`ForgeError`]. An `ApiError` is
//! what the wire told us: an optional status code, a message and an optional
//! `Retry-After`. Classification into the taxonomy happens later, in the
//! adapters, via [`map_api_error`].
//!
//! [`ForgeError`]: super::ForgeError
//! [`map_api_error`]: super::map_api_error

use reqwest::header::RETRY_AFTER;
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;

/// How an [`ApiError`] came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// The backend answered with a failure status
    Status,
    /// A failure the backend reported with a message but no status
    Transport,
    /// No answer at all: connection, TLS, timeout, or a request that could
    /// not be built. The message is ours, not the backend's.
    Connection,
    /// The backend answered but the body did not have the expected shape
    Decode,
}

/// A failure reported by a native backend client.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    /// HTTP status, when the backend provided one
    pub status: Option<u16>,
    pub message: String,
    /// Seconds from a `Retry-After` header
    pub retry_after: Option<u64>,
}

impl ApiError {
    /// A failure with an HTTP status.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Status,
            status: Some(status),
            message: message.into(),
            retry_after: None,
        }
    }

    /// A failure that only has a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Transport,
            status: None,
            message: message.into(),
            retry_after: None,
        }
    }

    /// The request got no answer.
    pub fn connection(message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Connection,
            status: None,
            message: message.into(),
            retry_after: None,
        }
    }

    /// A response body that could not be decoded.
    pub fn decode(message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Decode,
            status: None,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Attach a `Retry-After` value.
    pub fn with_retry_after(mut self, retry_after: Option<u64>) -> Self {
        self.retry_after = retry_after;
        self
    }

    /// Whether this is a 404.
    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }
}

// The request URL carries caller text (paths, branch names), so it is
// dropped from the message.
impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status();
        let message = err.without_url().to_string();
        match status {
            Some(status) => ApiError::status(status.as_u16(), message),
            None => ApiError::connection(message),
        }
    }
}

/// Build an endpoint URL by appending path segments to `base`.
///
/// Each segment is percent-encoded as a single path segment, so
/// `"acme/widgets"` becomes `acme%2Fwidgets`.
pub(crate) fn endpoint(base: &str, segments: &[&str]) -> Result<Url, ApiError> {
    let mut url = Url::parse(base)
        .map_err(|e| ApiError::connection(format!("bad base url '{}': {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| ApiError::connection(format!("base url '{}' cannot take a path", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Send a request, turning non-success statuses into [`ApiError`].
pub(crate) async fn send(request: RequestBuilder) -> Result<Response, ApiError> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(error_from_response(response).await)
    }
}

/// Send a request and decode a JSON success body.
pub(crate) async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ApiError> {
    let response = send(request).await?;
    let status = response.status();
    response.json().await.map_err(|e| {
        ApiError::decode(format!(
            "failed to decode {} response body: {}",
            status.as_u16(),
            e
        ))
    })
}

/// Turn a failure response into an [`ApiError`], keeping the backend message.
pub(crate) async fn error_from_response(response: Response) -> ApiError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());

    let body = response.text().await.unwrap_or_default();
    let message = extract_message(&body).unwrap_or_else(|| fallback_message(status));

    ApiError::status(status.as_u16(), message).with_retry_after(retry_after)
}

/// Pull a human message out of an error body.
///
/// Backends disagree: GitHub and Azure use `message`, GitLab uses `message`
/// (a string, list or object of field errors) or `error`.
fn extract_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "error", "error_description"]
        .iter()
        .filter_map(|key| value.get(key))
        .find_map(|field| match field {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Null => None,
            serde_json::Value::String(_) => None,
            other => Some(other.to_string()),
        })
}

fn fallback_message(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("HTTP {} {}", status.as_u16(), reason),
        None => format!("HTTP {}", status.as_u16()),
    }
}
