//! HTTP route handlers.

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use planflow::config::AgentCard;
use planflow::error::ProtocolError;
use planflow::protocol::jsonrpc::{
    JsonRpcRequest, JsonRpcResponse, METHOD_RESPOND, METHOD_SEND, METHOD_STREAM,
};
use planflow::stream::EventStream;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::sse;
use crate::state::AppState;

/// Build the router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(rpc))
        .route("/respond", post(respond))
        .route("/health", get(health))
        .route("/.well-known/agent.json", get(agent_card))
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    agent_id: String,
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "healthy",
        agent_id: state.config.agent_id.clone(),
    })
}

/// GET /.well-known/agent.json
async fn agent_card(State(state): State<AppState>) -> Json<AgentCard> {
    Json(state.agent_card())
}

/// POST / - JSON-RPC entry point.
///
/// Message and respond calls stream their events; anything else gets a plain
/// JSON-RPC response.
async fn rpc(State(state): State<AppState>, body: Bytes) -> Response {
    let request = match JsonRpcRequest::parse(&body) {
        Ok(request) => request,
        Err(err) => {
            info!(code = err.code(), error = %err, "rejecting request body");
            return Json(JsonRpcResponse::failure(Value::Null, err)).into_response();
        }
    };
    match request.method.as_str() {
        METHOD_SEND | METHOD_STREAM | METHOD_RESPOND => sse::stream_call(&state, request),
        _ => {
            debug!(method = %request.method, "non-streaming call");
            let response = state
                .dispatcher
                .handle_request(request, EventStream::closed())
                .await;
            Json(response).into_response()
        }
    }
}

/// POST /respond - bare respond params, wrapped into a `respond` call.
async fn respond(State(state): State<AppState>, body: Bytes) -> Response {
    let params: Value = match serde_json::from_slice(&body) {
        Ok(params) => params,
        Err(err) => {
            let err = ProtocolError::Parse(err.to_string());
            return Json(JsonRpcResponse::failure(Value::Null, err)).into_response();
        }
    };
    let request = JsonRpcRequest::new("respond", METHOD_RESPOND, params);
    sse::stream_call(&state, request)
}
