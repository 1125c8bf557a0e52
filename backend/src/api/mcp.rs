//! MCP Streamable HTTP endpoint handler.
//!
//! One method-polymorphic endpoint:
//!
//! - `POST /mcp` - Send a JSON-RPC message, creating a session if needed
//! - `GET /mcp` - Open an SSE stream for server-initiated messages
//! - `DELETE /mcp` - Terminate a session (always 204)
//!
//! Transport failures never reach the engine. They are answered here with
//! a JSON-RPC style error envelope.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::StreamExt;
use serde_json::Value;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, info};

use crate::auth::{credential_from_headers, UNAUTHORIZED_MESSAGE};
use crate::mcp::protocol::{JsonRpcResponse, PARSE_ERROR, SERVER_ERROR};
use crate::state::AppState;

/// Header name for MCP session ID.
pub const MCP_SESSION_ID_HEADER: &str = "mcp-session-id";

/// Interval between SSE keep-alive comments.
const SSE_KEEP_ALIVE: Duration = Duration::from_secs(15);

/// Transport-level rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Parse error")]
    Parse,

    #[error("{}", UNAUTHORIZED_MESSAGE)]
    Unauthorized,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Method not allowed")]
    MethodNotAllowed,
}

impl TransportError {
    pub fn status(&self) -> StatusCode {
        match self {
            TransportError::Parse | TransportError::SessionNotFound => StatusCode::BAD_REQUEST,
            TransportError::Unauthorized => StatusCode::UNAUTHORIZED,
            TransportError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            TransportError::Parse => PARSE_ERROR,
            _ => SERVER_ERROR,
        }
    }
}

impl IntoResponse for TransportError {
    fn into_response(self) -> Response {
        let envelope = JsonRpcResponse::error(Value::Null, self.code(), self.to_string());
        let mut response = (self.status(), Json(envelope)).into_response();
        if self == TransportError::MethodNotAllowed {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static("GET, POST, DELETE"));
        }
        response
    }
}

/// Extract session ID from headers.
fn get_session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(MCP_SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn set_session_header(response: &mut Response, session_id: &str) {
    if let Ok(value) = HeaderValue::from_str(session_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(MCP_SESSION_ID_HEADER), value);
    }
}

/// `/mcp` - dispatch on HTTP method.
pub async fn mcp_endpoint(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let result = match method {
        Method::POST => mcp_post(&state, &headers, &body).await,
        Method::GET => mcp_get(&state, &headers).await,
        Method::DELETE => Ok(mcp_delete(&state, &headers).await),
        _ => Err(TransportError::MethodNotAllowed),
    };

    result.unwrap_or_else(|e| {
        debug!("MCP {}: rejected with {}: {}", method, e.status(), e);
        e.into_response()
    })
}

/// POST - route one message into the caller's session.
///
/// The body is parsed before any session lookup. A known session id is
/// enough on its own; otherwise a valid `api-key` creates a new session.
async fn mcp_post(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response, TransportError> {
    let message: Value = serde_json::from_slice(body).map_err(|_| TransportError::Parse)?;

    let existing = match get_session_id(headers) {
        Some(id) => state.sessions().get_session(&id).await,
        None => None,
    };
    let session = match existing {
        Some(session) => session,
        None => {
            let credential =
                credential_from_headers(headers).ok_or(TransportError::Unauthorized)?;
            state.sessions().create_session(credential).await
        }
    };
    debug!("MCP POST: session={}", session.id);

    let reply = session
        .adapter()
        .handle_unary(message)
        .await
        .map_err(|_| TransportError::SessionNotFound)?;

    let mut response = match reply.body {
        Some(body) => (reply.status, Json(body)).into_response(),
        None => reply.status.into_response(),
    };
    set_session_header(&mut response, &session.id);
    Ok(response)
}

/// GET - open the server push stream for an existing session.
async fn mcp_get(state: &AppState, headers: &HeaderMap) -> Result<Response, TransportError> {
    let session_id = get_session_id(headers).ok_or(TransportError::SessionNotFound)?;
    let session = state
        .sessions()
        .get_session(&session_id)
        .await
        .ok_or(TransportError::SessionNotFound)?;
    let stream = session
        .adapter()
        .open_stream()
        .map_err(|_| TransportError::SessionNotFound)?;

    info!("MCP: SSE stream opened for session {}", session_id);

    let events = stream.map(|frame| {
        Ok::<_, Infallible>(Event::default().event("message").data(frame.to_string()))
    });
    let mut response = Sse::new(events)
        .keep_alive(KeepAlive::new().interval(SSE_KEEP_ALIVE))
        .into_response();

    let response_headers = response.headers_mut();
    response_headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response_headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    set_session_header(&mut response, &session_id);
    Ok(response)
}

/// DELETE - terminate a session. Unknown or missing ids are a no-op.
async fn mcp_delete(state: &AppState, headers: &HeaderMap) -> Response {
    if let Some(session_id) = get_session_id(headers) {
        state.sessions().terminate(&session_id).await;
    }
    StatusCode::NO_CONTENT.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn envelope(error: TransportError) -> (StatusCode, HeaderMap, Value) {
        let response = error.into_response();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_parse_error_envelope() {
        let (status, _, body) = envelope(TransportError::Parse).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({"jsonrpc": "2.0", "error": {"code": -32700, "message": "Parse error"}, "id": null})
        );
    }

    #[tokio::test]
    async fn test_unauthorized_envelope() {
        let (status, _, body) = envelope(TransportError::Unauthorized).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], -32000);
        assert_eq!(body["error"]["message"], UNAUTHORIZED_MESSAGE);
    }

    #[tokio::test]
    async fn test_method_not_allowed_lists_allowed_methods() {
        let (status, headers, body) = envelope(TransportError::MethodNotAllowed).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(headers.get(header::ALLOW).unwrap(), "GET, POST, DELETE");
        assert_eq!(body["error"]["message"], "Method not allowed");
    }

    #[test]
    fn test_session_id_header_must_be_non_empty() {
        let mut headers = HeaderMap::new();
        assert_eq!(get_session_id(&headers), None);
        headers.insert(MCP_SESSION_ID_HEADER, HeaderValue::from_static(""));
        assert_eq!(get_session_id(&headers), None);
        headers.insert(MCP_SESSION_ID_HEADER, HeaderValue::from_static("abc"));
        assert_eq!(get_session_id(&headers).as_deref(), Some("abc"));
    }
}
