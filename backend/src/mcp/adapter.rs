//! Per-session bridge between HTTP verbs and the RPC engine.

use super::engine::{Notifier, ResponseSink, RpcEngine};
use axum::http::StatusCode;
use futures::Stream;
use serde_json::Value;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::Mutex;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

/// Frames buffered per push stream before the engine has to wait.
const PUSH_STREAM_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AdapterError {
    #[error("session is closed")]
    Closed,
}

/// Aggregated answer to one POSTed message.
#[derive(Debug, Clone, PartialEq)]
pub struct UnaryReply {
    pub status: StatusCode,
    /// `None` when the engine produced nothing (notifications).
    pub body: Option<Value>,
}

impl UnaryReply {
    fn from_frames(mut frames: Vec<Value>) -> Self {
        match frames.len() {
            0 => Self {
                status: StatusCode::ACCEPTED,
                body: None,
            },
            1 => Self {
                status: StatusCode::OK,
                body: frames.pop(),
            },
            _ => Self {
                status: StatusCode::OK,
                body: Some(Value::Array(frames)),
            },
        }
    }
}

/// Drives one session's engine for both the unary and the streaming path.
///
/// Engine calls are serialized, so messages POSTed to the same session are
/// applied in arrival order and `close` waits for any call in flight.
pub struct SessionAdapter {
    engine: Mutex<Box<dyn RpcEngine>>,
    notifier: Notifier,
}

impl SessionAdapter {
    pub fn new(engine: Box<dyn RpcEngine>, notifier: Notifier) -> Self {
        Self {
            engine: Mutex::new(engine),
            notifier,
        }
    }

    /// Feed one message to the engine and collect everything it emits.
    pub async fn handle_unary(&self, message: Value) -> Result<UnaryReply, AdapterError> {
        let mut engine = self.engine.lock().await;
        if self.notifier.is_closed() {
            return Err(AdapterError::Closed);
        }

        let mut sink = ResponseSink::buffer();
        if let Err(e) = engine.handle(message, &mut sink).await {
            warn!("Engine reported a closed sink on the unary path: {}", e);
        }
        let reply = UnaryReply::from_frames(sink.into_frames());
        debug!("Unary reply status {}", reply.status);
        Ok(reply)
    }

    /// Open the server push stream, ending any stream opened before.
    pub fn open_stream(&self) -> Result<PushStream, AdapterError> {
        let (receiver, generation) = self
            .notifier
            .attach(PUSH_STREAM_CAPACITY)
            .ok_or(AdapterError::Closed)?;
        Ok(PushStream {
            inner: ReceiverStream::new(receiver),
            notifier: self.notifier.clone(),
            generation,
        })
    }

    /// Close the session: waits for an in-flight engine call, then ends the
    /// push stream. Later calls fail with [`AdapterError::Closed`].
    pub async fn close(&self) {
        let _engine = self.engine.lock().await;
        self.notifier.close();
    }

    pub fn is_closed(&self) -> bool {
        self.notifier.is_closed()
    }

    pub fn has_stream(&self) -> bool {
        self.notifier.is_attached()
    }
}

/// Server-initiated frames for one `GET /mcp` response.
///
/// Ends when the session is closed or a newer stream replaces it. Dropping
/// it (client disconnect) detaches it from the session.
pub struct PushStream {
    inner: ReceiverStream<Value>,
    notifier: Notifier,
    generation: u64,
}

impl Stream for PushStream {
    type Item = Value;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl Drop for PushStream {
    fn drop(&mut self) {
        self.notifier.detach(self.generation);
    }
}
