//! Typed errors for failed API responses.
//!
//! Every error carries the message extracted from the response body, an
//! optional application-level code and a [`RateLimit`] snapshot of the
//! response headers. The concrete kind of error is chosen from a static
//! registry keyed by HTTP status code.

use log::{debug, warn};
use reqwest::header::HeaderMap;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use crate::http::Response;
use crate::rate_limit::RateLimit;

/// Concrete kind of an [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    NotAcceptable,
    UnprocessableEntity,
    TooManyRequests,
    InternalServerError,
    BadGateway,
    ServiceUnavailable,
    GatewayTimeout,
    /// Any 4xx status without a registered kind
    ClientError,
    /// Any 5xx status without a registered kind
    ServerError,
    /// The request never produced a response
    Transport,
}

/// Status code registrations. Each kind appears at most once.
pub const REGISTRATIONS: &[(u16, ErrorKind)] = &[
    (400, ErrorKind::BadRequest),
    (401, ErrorKind::Unauthorized),
    (403, ErrorKind::Forbidden),
    (404, ErrorKind::NotFound),
    (406, ErrorKind::NotAcceptable),
    (422, ErrorKind::UnprocessableEntity),
    (429, ErrorKind::TooManyRequests),
    (500, ErrorKind::InternalServerError),
    (502, ErrorKind::BadGateway),
    (503, ErrorKind::ServiceUnavailable),
    (504, ErrorKind::GatewayTimeout),
];

static REGISTRY: LazyLock<HashMap<u16, ErrorKind>> = LazyLock::new(|| {
    let mut registry = HashMap::with_capacity(REGISTRATIONS.len());
    for &(status, kind) in REGISTRATIONS {
        if let Some(previous) = registry.insert(status, kind) {
            warn!(
                "HTTP status {} registered twice ({:?} replaced by {:?})",
                status, previous, kind
            );
        }
    }
    registry
});

impl ErrorKind {
    /// Mapping from HTTP status code to error kind.
    ///
    /// Built once from the compile-time `REGISTRATIONS` table, so every
    /// kind is registered before the first lookup and the map never changes.
    pub fn registry() -> &'static HashMap<u16, ErrorKind> {
        &REGISTRY
    }

    /// Registered kind for `status`, if any.
    pub fn lookup(status: u16) -> Option<ErrorKind> {
        REGISTRY.get(&status).copied()
    }

    /// Kind used to classify a response with `status`.
    ///
    /// Registered statuses map to their kind; other 4xx and 5xx statuses map
    /// to [`ErrorKind::ClientError`] and [`ErrorKind::ServerError`]. Anything
    /// else is not an error.
    pub fn for_status(status: u16) -> Option<ErrorKind> {
        match Self::lookup(status) {
            Some(kind) => Some(kind),
            None if (400..500).contains(&status) => Some(ErrorKind::ClientError),
            None if (500..600).contains(&status) => Some(ErrorKind::ServerError),
            None => None,
        }
    }

    /// Status code this kind is registered under.
    pub fn http_status_code(self) -> Option<u16> {
        REGISTRATIONS
            .iter()
            .find(|(_, kind)| *kind == self)
            .map(|(status, _)| *status)
    }

    pub fn is_client_error(self) -> bool {
        match self {
            ErrorKind::ClientError => true,
            kind => kind
                .http_status_code()
                .is_some_and(|s| (400..500).contains(&s)),
        }
    }

    pub fn is_server_error(self) -> bool {
        match self {
            ErrorKind::ServerError => true,
            kind => kind
                .http_status_code()
                .is_some_and(|s| (500..600).contains(&s)),
        }
    }

    /// Builds an error of this kind from a failed response.
    pub fn from_response(self, response: &Response) -> ApiError {
        let (message, code) = parse_error(response.body());
        ApiError::new(self, message, response.headers(), code)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::BadRequest => "bad request",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not found",
            ErrorKind::NotAcceptable => "not acceptable",
            ErrorKind::UnprocessableEntity => "unprocessable entity",
            ErrorKind::TooManyRequests => "too many requests",
            ErrorKind::InternalServerError => "internal server error",
            ErrorKind::BadGateway => "bad gateway",
            ErrorKind::ServiceUnavailable => "service unavailable",
            ErrorKind::GatewayTimeout => "gateway timeout",
            ErrorKind::ClientError => "client error",
            ErrorKind::ServerError => "server error",
            ErrorKind::Transport => "transport error",
        };
        f.write_str(name)
    }
}

/// The raw value an [`ApiError`] was built from.
#[derive(Debug, Clone)]
pub enum Cause {
    Message(String),
    Error(Arc<dyn std::error::Error + Send + Sync>),
}

impl Cause {
    pub fn message(&self) -> String {
        match self {
            Cause::Message(message) => message.clone(),
            Cause::Error(error) => error.to_string(),
        }
    }
}

impl From<String> for Cause {
    fn from(message: String) -> Self {
        Cause::Message(message)
    }
}

impl From<&str> for Cause {
    fn from(message: &str) -> Self {
        Cause::Message(message.to_string())
    }
}

impl From<reqwest::Error> for Cause {
    fn from(error: reqwest::Error) -> Self {
        Cause::Error(Arc::new(error))
    }
}

/// Error returned for a failed API call.
#[derive(Debug, Clone)]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
    code: Option<i64>,
    rate_limit: RateLimit,
    wrapped: Cause,
}

impl ApiError {
    /// Builds an error from a raw cause.
    ///
    /// The message is the cause itself for strings and its `Display` output
    /// for lower-level errors. The rate limit is always parsed from
    /// `headers`.
    pub fn new(
        kind: ErrorKind,
        cause: impl Into<Cause>,
        headers: &HeaderMap,
        code: Option<i64>,
    ) -> Self {
        let wrapped = cause.into();
        Self {
            kind,
            message: wrapped.message(),
            code,
            rate_limit: RateLimit::new(headers),
            wrapped,
        }
    }

    /// Classifies a failed response through the status registry.
    ///
    /// Responses whose status is not an error status are classified as
    /// [`ErrorKind::ClientError`].
    pub fn from_response(response: &Response) -> Self {
        let status = response.status().as_u16();
        let kind = ErrorKind::for_status(status).unwrap_or_else(|| {
            debug!("HTTP status {} is not an error status", status);
            ErrorKind::ClientError
        });
        kind.from_response(response)
    }

    /// Classification of the failure.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Message parsed from the body, or the cause's message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Error code from the body, if the API sent one.
    pub fn code(&self) -> Option<i64> {
        self.code
    }

    /// Rate limit headers of the failed response.
    pub fn rate_limit(&self) -> &RateLimit {
        &self.rate_limit
    }

    /// The message or error this value was built from.
    pub fn wrapped_exception(&self) -> &Cause {
        &self.wrapped
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.wrapped {
            Cause::Message(_) => None,
            Cause::Error(error) => Some(error.as_ref()),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        ApiError::new(ErrorKind::Transport, error, &HeaderMap::new(), None)
    }
}

/// Extracts `(message, code)` from an error response body.
///
/// Bodies without a usable `error` or `errors` field yield an empty message.
pub fn parse_error(body: Option<&Value>) -> (String, Option<i64>) {
    let Some(Value::Object(body)) = body else {
        return (String::new(), None);
    };

    if let Some(error) = body.get("error").filter(|v| is_truthy(v)) {
        return (text(error), None);
    }

    if let Some(errors) = body.get("errors").filter(|v| is_truthy(v)) {
        let first = match errors {
            Value::Array(items) => items.first(),
            other => Some(other),
        };
        return match first {
            Some(Value::Object(record)) => {
                let message = record.get("message").map(text).unwrap_or_default();
                let code = record.get("code").and_then(Value::as_i64);
                (chomp(&message).to_string(), code)
            }
            Some(other) => (chomp(&text(other)).to_string(), None),
            None => (String::new(), None),
        };
    }

    (String::new(), None)
}

fn is_truthy(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Strips one trailing line terminator.
fn chomp(s: &str) -> &str {
    s.strip_suffix("\r\n")
        .or_else(|| s.strip_suffix('\n'))
        .or_else(|| s.strip_suffix('\r'))
        .unwrap_or(s)
}
