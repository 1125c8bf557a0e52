//! API key authentication shared by the REST API and the MCP endpoint.

use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use vitals_types::ErrorResponse;

/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "api-key";

/// Prefix every accepted API key starts with.
pub const API_KEY_PREFIX: &str = "sk-";

/// Message returned when a request carries no usable API key.
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized: invalid or missing api-key";

/// A validated API key.
///
/// The key doubles as the data owner: every stored record is scoped to the
/// credential that ingested it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(Arc<str>);

impl Credential {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Keys end up in log lines via `{:?}`; only show the prefix.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({}…)", API_KEY_PREFIX)
    }
}

/// Validate a raw API key.
///
/// Accepts only strings starting with [`API_KEY_PREFIX`]; absent and empty
/// values are rejected.
pub fn validate_api_key(raw: Option<&str>) -> Option<Credential> {
    raw.filter(|key| key.starts_with(API_KEY_PREFIX))
        .map(|key| Credential(Arc::from(key)))
}

/// Validate the `api-key` header of a request.
pub fn credential_from_headers(headers: &HeaderMap) -> Option<Credential> {
    validate_api_key(headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()))
}

/// Middleware guarding the REST API.
///
/// On success the [`Credential`] is placed in the request extensions for
/// handlers to pick up with `Extension<Credential>`.
pub async fn require_api_key(mut request: Request, next: Next) -> Response {
    match credential_from_headers(request.headers()) {
        Some(credential) => {
            request.extensions_mut().insert(credential);
            next.run(request).await
        }
        None => {
            debug!("Rejecting {} {}: no valid api-key", request.method(), request.uri().path());
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new(UNAUTHORIZED_MESSAGE)),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_accepts_prefixed_key() {
        let credential = validate_api_key(Some("sk-test-token")).unwrap();
        assert_eq!(credential.as_str(), "sk-test-token");
    }

    #[test]
    fn test_rejects_missing_empty_and_unprefixed() {
        assert!(validate_api_key(None).is_none());
        assert!(validate_api_key(Some("")).is_none());
        assert!(validate_api_key(Some("invalid-token")).is_none());
        assert!(validate_api_key(Some("SK-upper")).is_none());
    }

    #[test]
    fn test_credential_from_headers() {
        let mut headers = HeaderMap::new();
        assert!(credential_from_headers(&headers).is_none());

        headers.insert(API_KEY_HEADER, HeaderValue::from_static("sk-abc"));
        assert_eq!(credential_from_headers(&headers).unwrap().as_str(), "sk-abc");
    }

    #[test]
    fn test_debug_does_not_leak_key() {
        let credential = validate_api_key(Some("sk-very-secret")).unwrap();
        assert!(!format!("{:?}", credential).contains("very-secret"));
    }
}
