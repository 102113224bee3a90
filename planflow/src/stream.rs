//! Per-connection event channel and SSE framing.
//!
//! An [`EventStream`] assigns each event a sequence id (`"1"`, `"2"`, ...)
//! and queues it for a single consumer. Closing is terminal: later emissions
//! are dropped without error, and the consumer stops once the buffer drains.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{SecondsFormat, Utc};
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use serde_json::{Map, Value};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

use crate::core::events::{ClarificationNeeded, DiscoveryResult, EventKind, SelectionRequired};
use crate::core::types::{Preview, TaskState};
use crate::error::FrameError;
use crate::protocol::message::A2aMessage;

/// Minimum size of the buffer-flush comment frame's padding.
pub const MIN_FLUSH_PADDING: usize = 2048;

/// One framed unit of the event stream.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    pub event: String,
    pub data: Map<String, Value>,
    pub id: Option<String>,
    pub retry: Option<u64>,
}

impl SseEvent {
    pub fn new(event: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            event: event.into(),
            data,
            id: None,
            retry: None,
        }
    }

    pub fn kind(&self) -> Option<EventKind> {
        EventKind::parse(&self.event)
    }

    /// `id:`, `retry:`, `event:` and `data:` lines followed by a blank line.
    pub fn encode(&self) -> String {
        let mut frame = String::new();
        if let Some(id) = &self.id {
            frame.push_str(&format!("id: {id}\n"));
        }
        if let Some(retry) = self.retry {
            frame.push_str(&format!("retry: {retry}\n"));
        }
        let data = serde_json::to_string(&self.data).unwrap_or_else(|_| "{}".to_string());
        frame.push_str(&format!("event: {}\ndata: {data}\n\n", self.event));
        frame
    }

    /// Parse one frame produced by [`SseEvent::encode`].
    ///
    /// Comment lines are ignored and repeated `data:` lines are joined with
    /// `\n`, as in the SSE format.
    pub fn decode(frame: &str) -> Result<Self, FrameError> {
        let mut event = None;
        let mut data: Option<String> = None;
        let mut id = None;
        let mut retry = None;

        for line in frame.lines() {
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "event" => event = Some(value.to_string()),
                "data" => match data.as_mut() {
                    Some(existing) => {
                        existing.push('\n');
                        existing.push_str(value);
                    }
                    None => data = Some(value.to_string()),
                },
                "id" => id = Some(value.to_string()),
                "retry" => retry = value.parse().ok(),
                _ => {}
            }
        }

        let event = event.ok_or(FrameError::MissingEvent)?;
        let data = data.ok_or(FrameError::MissingData)?;
        match serde_json::from_str(&data)? {
            Value::Object(data) => Ok(Self {
                event,
                data,
                id,
                retry,
            }),
            _ => Err(FrameError::NotAnObject),
        }
    }
}

/// Body of the comment frame that forces intermediary buffers to flush.
///
/// Sent as `: <padding>` ahead of the first event.
pub fn flush_comment(padding: usize) -> String {
    " ".repeat(padding.max(MIN_FLUSH_PADDING))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

struct Inner {
    sender: Mutex<Option<UnboundedSender<SseEvent>>>,
    receiver: Mutex<Option<UnboundedReceiver<SseEvent>>>,
    next_id: AtomicU64,
}

/// Ordered, single-consumer event sink for one connection.
///
/// Cloning yields another handle to the same channel.
#[derive(Clone)]
pub struct EventStream {
    inner: Arc<Inner>,
}

impl Default for EventStream {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl EventStream {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                sender: Mutex::new(Some(tx)),
                receiver: Mutex::new(Some(rx)),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// A channel that was never open; every emission is dropped.
    pub fn closed() -> Self {
        let stream = Self::new();
        stream.close();
        stream
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.inner.sender).is_none()
    }

    /// Stop accepting events. Idempotent.
    pub fn close(&self) {
        lock(&self.inner.sender).take();
    }

    /// Queue one event, stamping `state`, `timestamp` and the next sequence id.
    ///
    /// Returns `false` when the event was dropped because the channel is closed.
    pub fn emit(&self, kind: EventKind, state: TaskState, mut data: Map<String, Value>) -> bool {
        data.insert("state".to_string(), Value::String(state.as_str().to_string()));
        data.insert("timestamp".to_string(), Value::String(now_rfc3339()));

        // Ids are assigned under the sender lock so they match queue order.
        let mut sender = lock(&self.inner.sender);
        let Some(tx) = sender.as_ref() else {
            debug!(event = %kind, "dropping event emitted after close");
            return false;
        };
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let event = SseEvent {
            event: kind.as_str().to_string(),
            data,
            id: Some(id.to_string()),
            retry: None,
        };
        if tx.send(event).is_err() {
            debug!(event = %kind, "consumer gone, closing stream");
            sender.take();
            return false;
        }
        true
    }

    pub fn emit_status(
        &self,
        state: TaskState,
        message: Option<&str>,
        extra: Map<String, Value>,
    ) -> bool {
        let mut data = extra;
        if let Some(message) = message {
            data.insert("message".to_string(), Value::String(message.to_string()));
        }
        self.emit(EventKind::StatusUpdate, state, data)
    }

    /// `message` is omitted from the payload when `None`.
    pub fn emit_progress(&self, percent: f64, message: Option<&str>) -> bool {
        let mut extra = Map::new();
        extra.insert("progress".to_string(), Value::from(percent));
        self.emit_status(TaskState::Working, message, extra)
    }

    pub fn emit_clarification(&self, clarification: &ClarificationNeeded) -> bool {
        self.emit(
            EventKind::ClarificationNeeded,
            TaskState::InputRequired,
            clarification.to_payload(),
        )
    }

    pub fn emit_discovery(&self, discovery: &DiscoveryResult) -> bool {
        self.emit(
            EventKind::DiscoveryResult,
            TaskState::Working,
            discovery.to_payload(),
        )
    }

    pub fn emit_selection(&self, selection: &SelectionRequired) -> bool {
        self.emit(
            EventKind::SelectionRequired,
            TaskState::InputRequired,
            selection.to_payload(),
        )
    }

    pub fn emit_preview(&self, preview: &Preview) -> bool {
        self.emit(
            EventKind::PreviewReady,
            TaskState::InputRequired,
            preview.to_payload(),
        )
    }

    /// Agent message; the final one moves the task to `completed`.
    pub fn emit_result(&self, message: &A2aMessage, is_final: bool) -> bool {
        let mut data = Map::new();
        data.insert(
            "message".to_string(),
            serde_json::to_value(message).unwrap_or(Value::Null),
        );
        data.insert("final".to_string(), Value::Bool(is_final));
        let state = if is_final {
            TaskState::Completed
        } else {
            TaskState::Working
        };
        self.emit(EventKind::Message, state, data)
    }

    pub fn emit_error(
        &self,
        error_type: &str,
        message: &str,
        recoverable: bool,
        extra: Map<String, Value>,
    ) -> bool {
        let mut data = extra;
        data.insert(
            "error_type".to_string(),
            Value::String(error_type.to_string()),
        );
        data.insert("message".to_string(), Value::String(message.to_string()));
        data.insert("recoverable".to_string(), Value::Bool(recoverable));
        self.emit(EventKind::Error, TaskState::Failed, data)
    }

    /// Announce an output file for the orchestrator to pick up.
    pub fn emit_file_created(&self, path: &str, name: Option<&str>, summary: Option<&str>) -> bool {
        let mut extra = Map::new();
        extra.insert("type".to_string(), Value::from("file_created"));
        extra.insert("path".to_string(), Value::from(path));
        if let Some(name) = name {
            extra.insert("name".to_string(), Value::from(name));
        }
        if let Some(summary) = summary {
            extra.insert("summary".to_string(), Value::from(summary));
        }
        self.emit_status(TaskState::Working, None, extra)
    }

    /// Take the consuming end. Only the first caller receives events.
    ///
    /// The stream ends once the channel is closed and every queued event has
    /// been yielded.
    pub fn events(&self) -> BoxStream<'static, SseEvent> {
        let Some(mut rx) = lock(&self.inner.receiver).take() else {
            warn!("event stream already has a consumer");
            return stream::empty().boxed();
        };
        async_stream::stream! {
            while let Some(event) = rx.recv().await {
                yield event;
            }
        }
        .boxed()
    }

    /// Everything queued so far, without waiting. Empty once [`Self::events`]
    /// has taken the consumer.
    pub fn drain_buffered(&self) -> Vec<SseEvent> {
        let mut receiver = lock(&self.inner.receiver);
        let Some(rx) = receiver.as_mut() else {
            return Vec::new();
        };
        let mut drained = Vec::new();
        while let Ok(event) = rx.try_recv() {
            drained.push(event);
        }
        drained
    }
}
