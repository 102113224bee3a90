//! Streams one dispatched call back to the client as Server-Sent Events.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderName;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use planflow::core::types::TaskState;
use planflow::dispatch::Dispatcher;
use planflow::protocol::jsonrpc::JsonRpcRequest;
use planflow::stream::{EventStream, SseEvent, flush_comment};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::state::AppState;

/// Error type of the event that reports a failed JSON-RPC call.
const RPC_ERROR: &str = "rpc_error";

/// `type` of the status event that closes a successful call.
const SESSION_STATUS: &str = "session";

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// Closes the channel when the dispatch task ends, even by panic.
struct CloseOnDrop(EventStream);

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        self.0.close();
    }
}

fn to_frame(event: SseEvent) -> Event {
    let mut frame = Event::default();
    if let Some(id) = &event.id {
        frame = frame.id(id);
    }
    if let Some(retry) = event.retry {
        frame = frame.retry(Duration::from_millis(retry));
    }
    let data = serde_json::to_string(&event.data).unwrap_or_else(|_| "{}".to_string());
    frame.event(event.event).data(data)
}

/// Status event naming the session a successful call ran in, in the state
/// the session was left.
async fn report_session(dispatcher: &Dispatcher, stream: &EventStream, result: &Value) {
    let Some(session_id) = result.get("sessionId").and_then(Value::as_str) else {
        return;
    };
    let state = match dispatcher.registry().get(session_id).await {
        Some(session) => session.lock().await.workflow.task_state(),
        None => TaskState::Working,
    };
    let mut extra = Map::new();
    extra.insert("type".to_string(), json!(SESSION_STATUS));
    extra.insert("sessionId".to_string(), json!(session_id));
    stream.emit_status(state, None, extra);
}

/// Dispatch `request` in a background task and stream its events.
///
/// The body opens with the buffer-flush comment. A successful call ends with
/// a `session` status event carrying its session id; a JSON-RPC failure ends
/// with an `error` event carrying its code.
pub fn stream_call(state: &AppState, request: JsonRpcRequest) -> Response {
    let stream = EventStream::new();
    let events = stream.events();
    let dispatcher = Arc::clone(&state.dispatcher);

    tokio::spawn(async move {
        let guard = CloseOnDrop(stream.clone());
        let response = dispatcher.handle_request(request, stream).await;
        if let Some(error) = response.error {
            warn!(code = error.code, message = %error.message, "call failed, reporting on stream");
            let mut extra = Map::new();
            extra.insert("code".to_string(), json!(error.code));
            guard.0.emit_error(RPC_ERROR, &error.message, false, extra);
        } else if let Some(result) = response.result {
            report_session(&dispatcher, &guard.0, &result).await;
        }
        debug!("call finished, closing event stream");
    });

    let flush = Event::default().comment(flush_comment(state.config.flush_padding_bytes));
    let frames = futures::stream::once(async move { flush })
        .chain(events.map(to_frame))
        .map(Ok::<_, Infallible>);

    let sse = Sse::new(frames).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    );
    ([(X_ACCEL_BUFFERING, "no")], sse).into_response()
}
