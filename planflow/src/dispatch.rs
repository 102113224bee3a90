//! Request dispatcher: routes RPC calls to user callbacks.
//!
//! Each call resolves its session in the [`SessionRegistry`], binds the
//! call's [`EventStream`] to the session's workflow, and hands the callback a
//! context that owns the session lock until the callback returns.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tokio::sync::OwnedMutexGuard;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::core::types::TaskState;
use crate::error::ProtocolError;
use crate::protocol::jsonrpc::{
    JsonRpcRequest, JsonRpcResponse, METHOD_RESPOND, METHOD_SEND, METHOD_STREAM,
};
use crate::protocol::message::A2aMessage;
use crate::protocol::params::{RespondParams, ResponseKind, SendMessageParams};
use crate::session::{Session, SessionRegistry};
use crate::stream::EventStream;
use crate::translation::{DEFAULT_LANGUAGE, Translator};
use crate::workflow::WorkflowContext;

/// Callback for inbound user messages.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn on_message(&self, ctx: &mut MessageContext) -> anyhow::Result<()>;
}

/// Callback for inbound human answers.
#[async_trait]
pub trait RespondHandler: Send + Sync {
    async fn on_respond(&self, ctx: &mut ResponseContext) -> anyhow::Result<()>;
}

/// State shared by both context kinds: the session, held for the call.
pub struct CallScope {
    pub session_id: String,
    pub metadata: Map<String, Value>,
    session: OwnedMutexGuard<Session>,
    translator: Option<Arc<dyn Translator>>,
    /// Interaction ids outstanding when the call began.
    pending_at_open: Vec<String>,
}

impl CallScope {
    pub fn workflow(&self) -> &WorkflowContext {
        &self.session.workflow
    }

    pub fn workflow_mut(&mut self) -> &mut WorkflowContext {
        &mut self.session.workflow
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn stream(&self) -> &EventStream {
        self.session.workflow.stream()
    }

    /// `metadata.language`, defaulting to English.
    pub fn user_language(&self) -> &str {
        self.metadata
            .get("language")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_LANGUAGE)
    }

    pub fn emit_status(&self, state: TaskState, message: &str) -> bool {
        self.stream().emit_status(state, Some(message), Map::new())
    }

    pub fn emit_progress(&self, percent: f64, message: Option<&str>) -> bool {
        self.stream().emit_progress(percent, message)
    }

    /// Final agent message; `data` becomes a second, structured part.
    pub fn emit_result(&self, text: &str, data: Option<Map<String, Value>>) -> bool {
        let message = match data {
            Some(data) => A2aMessage::agent_with_data(text, data),
            None => A2aMessage::agent(text),
        };
        self.stream().emit_result(&message, true)
    }

    /// Translate agent text into `to`. Returns `text` unchanged when no
    /// translator is attached, the languages match, or translation fails.
    pub async fn translate(&self, text: &str, to: &str) -> String {
        let Some(translator) = &self.translator else {
            return text.to_string();
        };
        if to == DEFAULT_LANGUAGE {
            return text.to_string();
        }
        match translator.translate(text, DEFAULT_LANGUAGE, to).await {
            Ok(translated) => translated,
            Err(err) => {
                warn!(error = %err, to, "translation failed, using original text");
                text.to_string()
            }
        }
    }
}

/// Context of a `message/send` or `message/stream` call.
pub struct MessageContext {
    pub message: A2aMessage,
    scope: CallScope,
}

impl MessageContext {
    pub fn text(&self) -> String {
        self.message.text()
    }
}

impl Deref for MessageContext {
    type Target = CallScope;

    fn deref(&self) -> &CallScope {
        &self.scope
    }
}

impl DerefMut for MessageContext {
    fn deref_mut(&mut self) -> &mut CallScope {
        &mut self.scope
    }
}

/// Context of a `respond` call.
pub struct ResponseContext {
    pub response: ResponseKind,
    scope: CallScope,
}

impl Deref for ResponseContext {
    type Target = CallScope;

    fn deref(&self) -> &CallScope {
        &self.scope
    }
}

impl DerefMut for ResponseContext {
    fn deref_mut(&mut self) -> &mut CallScope {
        &mut self.scope
    }
}

fn pending_ids(workflow: &WorkflowContext) -> Vec<String> {
    workflow.pending_ids().into_iter().map(str::to_string).collect()
}

fn fresh_session_id() -> String {
    Uuid::new_v4().to_string()
}

fn non_empty(id: Option<String>) -> Option<String> {
    id.filter(|id| !id.is_empty())
}

/// Routes JSON-RPC calls to the registered callbacks.
pub struct Dispatcher {
    registry: SessionRegistry,
    message_handler: Option<Arc<dyn MessageHandler>>,
    respond_handler: Option<Arc<dyn RespondHandler>>,
    translator: Option<Arc<dyn Translator>>,
}

impl Dispatcher {
    pub fn new(registry: SessionRegistry) -> Self {
        Self {
            registry,
            message_handler: None,
            respond_handler: None,
            translator: None,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Register the message callback, replacing any previous one.
    pub fn set_message_handler(&mut self, handler: Arc<dyn MessageHandler>) {
        if self.message_handler.replace(handler).is_some() {
            warn!("replacing registered message handler");
        }
    }

    /// Register the respond callback, replacing any previous one.
    pub fn set_respond_handler(&mut self, handler: Arc<dyn RespondHandler>) {
        if self.respond_handler.replace(handler).is_some() {
            warn!("replacing registered respond handler");
        }
    }

    /// Register one object for both slots.
    pub fn register<H>(&mut self, handler: H)
    where
        H: MessageHandler + RespondHandler + 'static,
    {
        let handler = Arc::new(handler);
        self.set_message_handler(handler.clone());
        self.set_respond_handler(handler);
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Dispatch one call, emitting its events on `stream`.
    ///
    /// Never fails: protocol problems and callback errors become JSON-RPC
    /// error responses. The caller owns `stream` and closes it afterwards.
    #[instrument(skip_all, fields(method = %request.method))]
    pub async fn handle_request(&self, request: JsonRpcRequest, stream: EventStream) -> JsonRpcResponse {
        let id = request.response_id();
        let outcome = match request.method.as_str() {
            METHOD_SEND | METHOD_STREAM => self.handle_message(request.params, stream).await,
            METHOD_RESPOND => self.handle_respond(&request.params, stream).await,
            other => Err(ProtocolError::MethodNotFound(other.to_string())),
        };
        match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(err) => {
                warn!(code = err.code(), error = %err, "request failed");
                JsonRpcResponse::failure(id, err)
            }
        }
    }

    async fn handle_message(&self, params: Value, stream: EventStream) -> Result<Value, ProtocolError> {
        let handler = self
            .message_handler
            .clone()
            .ok_or_else(|| ProtocolError::Internal("No message handler registered".to_string()))?;
        let params = SendMessageParams::from_value(params)?;
        let metadata = params.merged_metadata();
        let session_id = non_empty(params.session_id).unwrap_or_else(fresh_session_id);
        info!(session_id = %session_id, "dispatching message");

        let scope = self.open_scope(session_id, metadata, stream).await;
        let mut ctx = MessageContext {
            message: params.message,
            scope,
        };
        let result = handler.on_message(&mut ctx).await;
        self.close_scope(ctx.scope, result).await
    }

    async fn handle_respond(&self, params: &Value, stream: EventStream) -> Result<Value, ProtocolError> {
        let handler = self
            .respond_handler
            .clone()
            .ok_or_else(|| ProtocolError::Internal("No respond handler registered".to_string()))?;
        let params = RespondParams::from_value(params)?;

        let linked = match params.response.interaction_id() {
            Some(interaction_id) => self.registry.resolve_interaction(interaction_id).await,
            None => None,
        };
        let resolved_from = if linked.is_some() {
            "interaction_id"
        } else {
            "session_id"
        };
        let session_id = linked
            .or_else(|| non_empty(params.session_id))
            .unwrap_or_else(fresh_session_id);
        info!(
            session_id = %session_id,
            response_type = params.response.response_type().as_str(),
            resolved_from,
            "dispatching response"
        );

        let scope = self.open_scope(session_id, params.metadata, stream).await;
        let mut ctx = ResponseContext {
            response: params.response,
            scope,
        };
        let result = handler.on_respond(&mut ctx).await;
        self.close_scope(ctx.scope, result).await
    }

    async fn open_scope(
        &self,
        session_id: String,
        metadata: Map<String, Value>,
        stream: EventStream,
    ) -> CallScope {
        let session = self.registry.get_or_create(&session_id).await;
        let mut session = session.lock_owned().await;
        session.workflow.bind_stream(stream);
        let pending_at_open = pending_ids(&session.workflow);
        CallScope {
            session_id,
            metadata,
            session,
            translator: self.translator.clone(),
            pending_at_open,
        }
    }

    /// Release the session and re-index its interactions: ids the call
    /// cleared are unlinked, ids it left outstanding are linked. The session
    /// survives a failed callback so a later `respond` can retry.
    async fn close_scope(
        &self,
        scope: CallScope,
        result: anyhow::Result<()>,
    ) -> Result<Value, ProtocolError> {
        let pending = pending_ids(scope.workflow());
        let session_id = scope.session_id.clone();
        let answered: Vec<String> = scope
            .pending_at_open
            .iter()
            .filter(|id| !pending.contains(id))
            .cloned()
            .collect();
        drop(scope);

        for interaction_id in &answered {
            self.registry.unlink_interaction(interaction_id).await;
        }
        for interaction_id in &pending {
            self.registry
                .link_interaction(interaction_id, &session_id)
                .await;
        }

        match result {
            Ok(()) => Ok(json!({ "sessionId": session_id })),
            Err(err) => {
                warn!(session_id = %session_id, error = %format!("{err:#}"), "handler failed");
                Err(ProtocolError::Internal(format!("{err:#}")))
            }
        }
    }
}
