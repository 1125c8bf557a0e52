//! MCP JSON-RPC engine for health data.
//!
//! Handles MCP protocol methods and dispatches tool calls to [`HealthTools`]
//! under the session's credential.

use super::engine::{EngineFactory, Notifier, ResponseSink, RpcEngine, SinkClosed};
use super::protocol::{
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, INTERNAL_ERROR, INVALID_PARAMS,
    INVALID_REQUEST, METHOD_NOT_FOUND, PROTOCOL_VERSION,
};
use super::tools::{tool_definitions, HealthTools};
use crate::auth::Credential;
use crate::storage::Storage;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Name reported in `serverInfo` and as the logger of pushed log messages.
pub const SERVER_NAME: &str = "health-data-server";

/// Syslog-style levels used by MCP `logging/setLevel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Notice => "notice",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Critical => "critical",
            LogLevel::Alert => "alert",
            LogLevel::Emergency => "emergency",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "notice" => Ok(LogLevel::Notice),
            "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            "critical" => Ok(LogLevel::Critical),
            "alert" => Ok(LogLevel::Alert),
            "emergency" => Ok(LogLevel::Emergency),
            other => Err(format!("Unknown log level: {}", other)),
        }
    }
}

/// Tool call parameters from MCP.
#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct SetLevelParams {
    level: String,
}

/// One session's MCP engine.
pub struct HealthEngine {
    tools: HealthTools,
    notifier: Notifier,
    log_level: LogLevel,
}

impl HealthEngine {
    pub fn new(tools: HealthTools, notifier: Notifier) -> Self {
        Self {
            tools,
            notifier,
            log_level: LogLevel::Info,
        }
    }

    /// Handle a single message. Returns `None` for notifications.
    async fn dispatch(&mut self, message: Value) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_value(message.clone()) {
            Ok(request) => request,
            Err(e) => {
                debug!("MCP: Invalid request: {}", e);
                let id = message.get("id").cloned().unwrap_or(Value::Null);
                return Some(JsonRpcResponse::error(id, INVALID_REQUEST, "Invalid Request"));
            }
        };

        if request.jsonrpc != "2.0" {
            let id = request.id.unwrap_or(Value::Null);
            return Some(JsonRpcResponse::error(id, INVALID_REQUEST, "Invalid Request"));
        }

        if request.is_notification() {
            debug!("MCP: Notification: {}", request.method);
            return None;
        }
        let id = request.id.clone().unwrap_or(Value::Null);

        debug!("MCP: Handling method: {}", request.method);
        let response = match request.method.as_str() {
            "initialize" => Self::handle_initialize(id),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "logging/setLevel" => self.handle_set_level(id, request.params),
            "tools/list" => JsonRpcResponse::success(id, json!({ "tools": tool_definitions() })),
            "tools/call" => self.handle_call_tool(id, request.params).await,
            _ => JsonRpcResponse::error(
                id,
                METHOD_NOT_FOUND,
                format!("Method not found: {}", request.method),
            ),
        };
        Some(response)
    }

    /// Handle the initialize request.
    fn handle_initialize(id: Value) -> JsonRpcResponse {
        JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": {},
                    "logging": {}
                },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        )
    }

    fn handle_set_level(&mut self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let level = params
            .and_then(|p| serde_json::from_value::<SetLevelParams>(p).ok())
            .ok_or_else(|| "level is required".to_string())
            .and_then(|p| p.level.parse::<LogLevel>());

        match level {
            Ok(level) => {
                debug!("MCP: Log level set to {}", level.as_str());
                self.log_level = level;
                JsonRpcResponse::success(id, json!({}))
            }
            Err(message) => JsonRpcResponse::error(id, INVALID_PARAMS, message),
        }
    }

    /// Handle a tools/call request.
    async fn handle_call_tool(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let params: ToolCallParams = match serde_json::from_value(params.unwrap_or(json!({}))) {
            Ok(params) => params,
            Err(e) => {
                let message = format!("Invalid params: {}", e);
                return JsonRpcResponse::error(id, INVALID_PARAMS, message);
            }
        };
        let arguments = params.arguments.unwrap_or(json!({}));

        match self.tools.call(&params.name, &arguments).await {
            Ok(result) => {
                self.log(LogLevel::Info, format!("Tool {} completed", params.name))
                    .await;
                JsonRpcResponse::success(id, result)
            }
            Err(e) if e.is_invalid_params() => {
                JsonRpcResponse::error(id, INVALID_PARAMS, e.to_string())
            }
            Err(e) => {
                warn!("MCP: Tool {} failed: {}", params.name, e);
                JsonRpcResponse::error(id, INTERNAL_ERROR, format!("Tool call failed: {}", e))
            }
        }
    }

    /// Push a `notifications/message` log frame if `level` passes the
    /// client's threshold.
    async fn log(&self, level: LogLevel, data: String) {
        if level < self.log_level {
            return;
        }
        let frame = JsonRpcNotification::new(
            "notifications/message",
            json!({
                "level": level.as_str(),
                "logger": SERVER_NAME,
                "data": data
            }),
        );
        self.notifier.notify(frame.to_value()).await;
    }
}

#[async_trait]
impl RpcEngine for HealthEngine {
    async fn handle(&mut self, message: Value, sink: &mut ResponseSink) -> Result<(), SinkClosed> {
        match message {
            Value::Array(batch) if batch.is_empty() => {
                let response =
                    JsonRpcResponse::error(Value::Null, INVALID_REQUEST, "Invalid Request");
                sink.write(response.to_value()).await
            }
            Value::Array(batch) => {
                let mut replies = Vec::new();
                for item in batch {
                    if let Some(response) = self.dispatch(item).await {
                        replies.push(response.to_value());
                    }
                }
                if replies.is_empty() {
                    Ok(())
                } else {
                    sink.write(Value::Array(replies)).await
                }
            }
            message => match self.dispatch(message).await {
                Some(response) => sink.write(response.to_value()).await,
                None => Ok(()),
            },
        }
    }
}

/// Builds a [`HealthEngine`] per session over shared storage.
pub struct HealthEngineFactory {
    storage: Arc<dyn Storage>,
}

impl HealthEngineFactory {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }
}

impl EngineFactory for HealthEngineFactory {
    fn create(&self, credential: Credential, notifier: Notifier) -> Box<dyn RpcEngine> {
        let tools = HealthTools::new(self.storage.clone(), credential);
        Box::new(HealthEngine::new(tools, notifier))
    }
}
