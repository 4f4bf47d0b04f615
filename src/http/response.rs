//! Parsed API responses and status classification.

use log::{debug, warn};
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde_json::Value;

use crate::error::{ApiError, ErrorKind};

/// A response whose body has already been parsed.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<Value>,
}

impl Response {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Option<Value>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Reads and parses the body of a reqwest response.
    ///
    /// Empty bodies and bodies that are not JSON become `None`.
    pub async fn from_reqwest(response: reqwest::Response) -> Result<Self, ApiError> {
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.bytes().await?;
        Ok(Self::new(status, headers, parse_body(&bytes)))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn into_body(self) -> Option<Value> {
        self.body
    }
}

fn parse_body(bytes: &[u8]) -> Option<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    match serde_json::from_slice(bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Response body is not valid JSON: {}", e);
            None
        }
    }
}

/// Passes successful responses through and turns everything else into an
/// [`ApiError`] of the registered kind.
pub fn raise_for_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status().as_u16();
    match ErrorKind::for_status(status) {
        Some(kind) => {
            debug!("HTTP {} classified as {:?}", status, kind);
            Err(kind.from_response(&response))
        }
        None => Ok(response),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_body_json() {
        assert_eq!(parse_body(br#"{"id": 1}"#), Some(json!({"id": 1})));
    }

    #[test]
    fn test_parse_body_empty() {
        assert_eq!(parse_body(b""), None);
        assert_eq!(parse_body(b"  \n"), None);
    }

    #[test]
    fn test_parse_body_invalid() {
        assert_eq!(parse_body(b"<html>oops</html>"), None);
    }

    #[test]
    fn test_raise_for_status_success() {
        let response = Response::new(StatusCode::OK, HeaderMap::new(), Some(json!({"id": 1})));
        let response = raise_for_status(response).unwrap();
        assert_eq!(response.body(), Some(&json!({"id": 1})));
    }

    #[test]
    fn test_raise_for_status_registered_error() {
        let response = Response::new(
            StatusCode::UNAUTHORIZED,
            HeaderMap::new(),
            Some(json!({"error": "Invalid token"})),
        );
        let err = raise_for_status(response).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(err.message(), "Invalid token");
    }

    #[test]
    fn test_raise_for_status_unregistered_error() {
        let response = Response::new(StatusCode::IM_A_TEAPOT, HeaderMap::new(), None);
        let err = raise_for_status(response).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClientError);
        assert_eq!(err.message(), "");
    }

    #[tokio::test]
    async fn test_from_reqwest() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/")
            .with_status(404)
            .with_header("x-city-ratelimit-remaining-by-ip", "12")
            .with_body(r#"{"error": "Not found"}"#)
            .create_async()
            .await;

        let response = reqwest::Client::new().get(server.url()).send().await.unwrap();
        let response = Response::from_reqwest(response).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.body(), Some(&json!({"error": "Not found"})));
        assert!(response.headers().contains_key("x-city-ratelimit-remaining-by-ip"));
    }
}
