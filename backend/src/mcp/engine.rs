//! Seams between the HTTP transport and the RPC engine.
//!
//! The transport never interprets protocol messages. It hands each parsed
//! message to an [`RpcEngine`] together with a [`ResponseSink`] and forwards
//! whatever the engine writes. Server-initiated frames go through the
//! session's [`Notifier`] onto the push stream opened by `GET /mcp`.

use crate::auth::Credential;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// How long a server push may wait for room in a slow stream.
const PUSH_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// A write hit a push channel whose reader has gone away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("push channel closed")]
pub struct SinkClosed;

/// Destination for frames produced by the engine.
///
/// The unary path collects frames in a buffer and returns them once the
/// engine call completes. The streaming path forwards each frame to the
/// HTTP response writer as soon as it is written.
#[derive(Debug)]
pub enum ResponseSink {
    Buffer(Vec<Value>),
    Channel(mpsc::Sender<Value>),
}

impl ResponseSink {
    pub fn buffer() -> Self {
        ResponseSink::Buffer(Vec::new())
    }

    pub fn channel(sender: mpsc::Sender<Value>) -> Self {
        ResponseSink::Channel(sender)
    }

    /// Write one frame. Buffer writes never fail.
    pub async fn write(&mut self, frame: Value) -> Result<(), SinkClosed> {
        match self {
            ResponseSink::Buffer(frames) => {
                frames.push(frame);
                Ok(())
            }
            ResponseSink::Channel(sender) => sender.send(frame).await.map_err(|_| SinkClosed),
        }
    }

    /// Frames accumulated so far. Always empty for a channel sink.
    pub fn into_frames(self) -> Vec<Value> {
        match self {
            ResponseSink::Buffer(frames) => frames,
            ResponseSink::Channel(_) => Vec::new(),
        }
    }
}

/// A message-oriented RPC engine bound to one session.
#[async_trait]
pub trait RpcEngine: Send {
    /// Process one inbound message, writing zero or more frames to `sink`.
    ///
    /// Protocol errors are written to the sink as ordinary frames. An `Err`
    /// only means the sink stopped accepting writes.
    async fn handle(&mut self, message: Value, sink: &mut ResponseSink) -> Result<(), SinkClosed>;
}

/// Creates one engine per session, bound to the session's credential.
pub trait EngineFactory: Send + Sync {
    fn create(&self, credential: Credential, notifier: Notifier) -> Box<dyn RpcEngine>;
}

#[derive(Debug, Default)]
struct PushSlot {
    sender: Option<mpsc::Sender<Value>>,
    generation: u64,
    closed: bool,
}

/// Handle for pushing server-initiated frames to a session's open stream.
///
/// At most one stream is attached at a time; attaching a new one ends the
/// previous stream. Once closed, no stream can be attached again.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    slot: Arc<Mutex<PushSlot>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a frame to the attached stream.
    ///
    /// Returns `false` when no stream is open or the frame could not be
    /// delivered; a stream whose reader has gone is detached.
    pub async fn notify(&self, frame: Value) -> bool {
        let (sender, generation) = {
            let slot = self.slot.lock();
            match &slot.sender {
                Some(sender) => (sender.clone(), slot.generation),
                None => {
                    debug!("No push stream attached, dropping frame");
                    return false;
                }
            }
        };

        let mut sink = ResponseSink::channel(sender);
        match tokio::time::timeout(PUSH_SEND_TIMEOUT, sink.write(frame)).await {
            Ok(Ok(())) => true,
            Ok(Err(SinkClosed)) => {
                debug!("Push stream reader gone, detaching");
                self.detach(generation);
                false
            }
            Err(_) => {
                debug!("Push stream is not draining, dropping frame");
                false
            }
        }
    }

    /// Attach a new stream, replacing any previous one.
    ///
    /// Returns the receiving half and a generation used to detach exactly
    /// this stream later, or `None` if the notifier is closed.
    pub fn attach(&self, capacity: usize) -> Option<(mpsc::Receiver<Value>, u64)> {
        let mut slot = self.slot.lock();
        if slot.closed {
            return None;
        }
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        slot.generation += 1;
        slot.sender = Some(sender);
        Some((receiver, slot.generation))
    }

    /// Detach the stream with the given generation, if it is still current.
    pub fn detach(&self, generation: u64) {
        let mut slot = self.slot.lock();
        if slot.generation == generation {
            slot.sender = None;
        }
    }

    /// End the current stream and refuse future ones.
    pub fn close(&self) {
        let mut slot = self.slot.lock();
        slot.closed = true;
        slot.sender = None;
    }

    pub fn is_closed(&self) -> bool {
        self.slot.lock().closed
    }

    pub fn is_attached(&self) -> bool {
        self.slot.lock().sender.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_buffer_sink_collects_in_order() {
        let mut sink = ResponseSink::buffer();
        sink.write(json!(1)).await.unwrap();
        sink.write(json!(2)).await.unwrap();
        assert_eq!(sink.into_frames(), vec![json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn test_channel_sink_reports_closed_reader() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let mut sink = ResponseSink::channel(tx);
        assert_eq!(sink.write(json!(1)).await, Err(SinkClosed));
    }

    #[tokio::test]
    async fn test_notify_without_stream_is_dropped() {
        let notifier = Notifier::new();
        assert!(!notifier.notify(json!({"method": "x"})).await);
    }

    #[tokio::test]
    async fn test_notify_reaches_attached_stream() {
        let notifier = Notifier::new();
        let (mut rx, _) = notifier.attach(4).unwrap();
        assert!(notifier.notify(json!({"n": 1})).await);
        assert_eq!(rx.recv().await, Some(json!({"n": 1})));
    }

    #[tokio::test]
    async fn test_new_stream_supersedes_old_one() {
        let notifier = Notifier::new();
        let (mut first, first_gen) = notifier.attach(4).unwrap();
        let (mut second, _) = notifier.attach(4).unwrap();

        // Old sender was dropped, so the first stream ends
        assert_eq!(first.recv().await, None);

        // Detaching a stale generation leaves the current stream alone
        notifier.detach(first_gen);
        assert!(notifier.notify(json!("hello")).await);
        assert_eq!(second.recv().await, Some(json!("hello")));
    }

    #[tokio::test]
    async fn test_notify_detaches_dropped_reader() {
        let notifier = Notifier::new();
        let (rx, _) = notifier.attach(4).unwrap();
        drop(rx);
        assert!(!notifier.notify(json!(1)).await);
        assert!(!notifier.is_attached());
    }

    #[tokio::test]
    async fn test_close_ends_stream_and_blocks_attach() {
        let notifier = Notifier::new();
        let (mut rx, _) = notifier.attach(4).unwrap();
        notifier.close();
        assert_eq!(rx.recv().await, None);
        assert!(notifier.is_closed());
        assert!(notifier.attach(4).is_none());
    }
}
