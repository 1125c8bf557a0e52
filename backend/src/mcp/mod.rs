//! MCP (Model Context Protocol) Streamable HTTP support.
//!
//! This module implements the MCP 2025-03-26 Streamable HTTP transport,
//! giving language-model agents access to the stored health data through a
//! single HTTP endpoint with an SSE stream for server-initiated messages.
//!
//! ## Endpoints
//!
//! - `POST /mcp` - Send JSON-RPC messages
//! - `GET /mcp` - Open SSE stream for server messages
//! - `DELETE /mcp` - Terminate session
//!
//! ## Session Management
//!
//! Sessions are identified by the `mcp-session-id` header. A POST without a
//! known session id creates a session bound to the request's `api-key`;
//! later requests only need the session id.
//!
//! ## Layers
//!
//! - [`session`]: the process-wide session table
//! - [`adapter`]: maps POST and GET onto one session's engine
//! - [`engine`]: the engine seams and the buffered/streaming response sink
//! - [`handler`] and [`tools`]: the health data engine itself

pub mod adapter;
pub mod engine;
pub mod handler;
pub mod protocol;
pub mod session;
pub mod tools;

pub use adapter::{AdapterError, PushStream, SessionAdapter, UnaryReply};
pub use engine::{EngineFactory, Notifier, ResponseSink, RpcEngine, SinkClosed};
pub use handler::{HealthEngine, HealthEngineFactory};
pub use session::{McpSession, McpSessionManager};
