//! Declarative agent flavor.
//!
//! Implementors of [`PlanModeAgent`] return [`Outcome`]s instead of calling
//! workflow operations. [`PlanModeHandler`] adapts such an agent to both
//! dispatcher slots and hands every outcome to
//! [`resolve_outcome`](crate::autopilot::resolve_outcome).

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::autopilot::{ExecutionMode, LiteModeConfig, resolve_outcome};
use crate::core::outcome::Outcome;
use crate::core::types::TaskState;
use crate::dispatch::{MessageContext, MessageHandler, RespondHandler, ResponseContext};
use crate::protocol::params::ResponseKind;
use crate::session::{AgentState, Session};
use crate::stream::EventStream;

/// What an agent callback can see and emit.
pub struct AgentContext<'a> {
    pub state: &'a mut AgentState,
    stream: EventStream,
}

impl<'a> AgentContext<'a> {
    pub fn new(state: &'a mut AgentState, stream: EventStream) -> Self {
        Self { state, stream }
    }

    pub fn emit_progress(&self, message: &str) -> bool {
        self.stream
            .emit_status(TaskState::Working, Some(message), Map::new())
    }

    pub fn emit_file(&self, path: &str, name: Option<&str>, summary: Option<&str>) -> bool {
        self.stream.emit_file_created(path, name, summary)
    }
}

/// An agent expressed as three stages plus an optional clarification hook.
#[async_trait]
pub trait PlanModeAgent: Send + Sync {
    /// A new query. Any outcome is allowed.
    async fn on_query(&self, query: &str, ctx: &mut AgentContext<'_>) -> anyhow::Result<Outcome>;

    /// Ids chosen from the last discovery; usually returns a preview.
    async fn on_selection(
        &self,
        selected: &[String],
        ctx: &mut AgentContext<'_>,
    ) -> anyhow::Result<Outcome>;

    /// The approved plan; usually returns a result.
    async fn on_execute(&self, ctx: &mut AgentContext<'_>) -> anyhow::Result<Outcome>;

    /// Default: merge answers into `state.context` and re-run the query.
    async fn on_clarification(
        &self,
        answers: &Map<String, Value>,
        ctx: &mut AgentContext<'_>,
    ) -> anyhow::Result<Outcome> {
        ctx.state.context.extend(answers.clone());
        let query = ctx.state.query.clone();
        self.on_query(&query, ctx).await
    }
}

/// Plugs a [`PlanModeAgent`] into both dispatcher slots.
pub struct PlanModeHandler<A> {
    agent: A,
    lite_mode: LiteModeConfig,
}

impl<A: PlanModeAgent> PlanModeHandler<A> {
    pub fn new(agent: A) -> Self {
        Self {
            agent,
            lite_mode: LiteModeConfig::default(),
        }
    }

    pub fn with_lite_mode(mut self, lite_mode: LiteModeConfig) -> Self {
        self.lite_mode = lite_mode;
        self
    }

    pub fn agent(&self) -> &A {
        &self.agent
    }

    /// Run one agent stage and resolve its outcome. Lite mode is read from
    /// the metadata stored when the workflow started.
    async fn run_stage(&self, session: &mut Session, stage: Stage<'_>) -> anyhow::Result<()> {
        let mode = ExecutionMode::from_metadata(&session.agent.metadata, self.lite_mode);
        let outcome = {
            let Session {
                workflow,
                agent: state,
                ..
            } = &mut *session;
            let mut ctx = AgentContext::new(state, workflow.stream().clone());
            match stage {
                Stage::Query(query) => self.agent.on_query(query, &mut ctx).await?,
                Stage::Clarification(answers) => {
                    self.agent.on_clarification(answers, &mut ctx).await?
                }
                Stage::Selection(selected) => self.agent.on_selection(selected, &mut ctx).await?,
                Stage::Execute => self.agent.on_execute(&mut ctx).await?,
            }
        };
        info!(session_id = %session.id, outcome = outcome.label(), lite = mode.is_lite(), "agent stage finished");
        resolve_outcome(&self.agent, session, outcome, mode).await
    }

    async fn route_response(&self, session: &mut Session, response: ResponseKind) -> anyhow::Result<()> {
        match response {
            ResponseKind::Clarification(response) => {
                session.workflow.set_clarification_response(
                    response.answers.clone(),
                    Some(response.clarification_id.as_str()),
                );
                self.run_stage(session, Stage::Clarification(&response.answers))
                    .await
            }
            ResponseKind::Selection(response) => {
                session.workflow.set_selection_response(
                    response.selected_ids.clone(),
                    Some(response.selection_id.as_str()),
                );
                session.agent.selected = response.selected_ids.clone();
                self.run_stage(session, Stage::Selection(&response.selected_ids))
                    .await
            }
            ResponseKind::Plan(approval) => {
                session.workflow.set_plan_approval(
                    approval.approved,
                    Some(approval.plan_id.as_str()),
                    approval.modifications,
                );
                if !approval.approved {
                    session
                        .workflow
                        .error("cancelled", "Cancelled by user", true, Map::new());
                    return Ok(());
                }
                session.workflow.start_execution(None);
                self.run_stage(session, Stage::Execute).await
            }
            ResponseKind::Unknown => {
                warn!(session_id = %session.id, "response carries no interaction id, ignoring");
                Ok(())
            }
        }
    }
}

enum Stage<'a> {
    Query(&'a str),
    Clarification(&'a Map<String, Value>),
    Selection(&'a [String]),
    Execute,
}

#[async_trait]
impl<A: PlanModeAgent + 'static> MessageHandler for PlanModeHandler<A> {
    async fn on_message(&self, ctx: &mut MessageContext) -> anyhow::Result<()> {
        let query = ctx.text();
        let metadata = ctx.metadata.clone();
        let session = ctx.session_mut();
        session.workflow.reset();
        session.agent.clear();
        session.agent.query = query.clone();
        session.agent.metadata = metadata;
        info!(session_id = %session.id, query_len = query.len(), "new query");

        if let Err(err) = self.run_stage(session, Stage::Query(&query)).await {
            warn!(session_id = %session.id, error = %format!("{err:#}"), "query failed");
            session
                .workflow
                .error("query_failed", &format!("{err:#}"), false, Map::new());
        }
        Ok(())
    }
}

#[async_trait]
impl<A: PlanModeAgent + 'static> RespondHandler for PlanModeHandler<A> {
    async fn on_respond(&self, ctx: &mut ResponseContext) -> anyhow::Result<()> {
        let response = ctx.response.clone();
        let session = ctx.session_mut();
        info!(session_id = %session.id, response_type = response.response_type().as_str(), "routing response");

        if let Err(err) = self.route_response(session, response).await {
            warn!(session_id = %session.id, error = %format!("{err:#}"), "response handler failed");
            session
                .workflow
                .error("handler_failed", &format!("{err:#}"), false, Map::new());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::phases::Phase;
    use crate::dispatch::Dispatcher;
    use crate::protocol::jsonrpc::{JsonRpcRequest, METHOD_RESPOND, METHOD_SEND};
    use crate::session::SessionRegistry;
    use crate::test_support::ScriptedAgent;
    use serde_json::json;

    fn dispatcher(agent: ScriptedAgent) -> Dispatcher {
        let mut dispatcher = Dispatcher::new(SessionRegistry::new().with_agent_id("scripted"));
        dispatcher.register(PlanModeHandler::new(agent));
        dispatcher
    }

    async fn call(dispatcher: &Dispatcher, method: &str, params: Value) -> Vec<crate::stream::SseEvent> {
        let stream = EventStream::new();
        let response = dispatcher
            .handle_request(JsonRpcRequest::new(1, method, params), stream.clone())
            .await;
        assert!(!response.is_error(), "{response:?}");
        stream.drain_buffered()
    }

    #[tokio::test]
    async fn query_failure_becomes_query_failed_event() {
        let dispatcher = dispatcher(ScriptedAgent {
            fail_on_query: true,
            ..ScriptedAgent::default()
        });
        let events = call(
            &dispatcher,
            METHOD_SEND,
            json!({"sessionId": "s", "message": {"parts": [{"text": "hi"}]}}),
        )
        .await;
        assert_eq!(events.last().unwrap().data["error_type"], json!("query_failed"));
        assert_eq!(events.last().unwrap().data["message"], json!("query exploded"));
    }

    #[tokio::test]
    async fn rejected_plan_emits_cancelled() {
        let dispatcher = dispatcher(ScriptedAgent {
            query_outcome: Some(Outcome::preview("intent", Map::new())),
            ..ScriptedAgent::default()
        });
        let events = call(
            &dispatcher,
            METHOD_SEND,
            json!({"sessionId": "s", "message": {"parts": [{"text": "go"}]}}),
        )
        .await;
        let plan_id = events[0].data["planId"].clone();

        let events = call(
            &dispatcher,
            METHOD_RESPOND,
            json!({"planId": plan_id, "approved": false}),
        )
        .await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data["error_type"], json!("cancelled"));
        assert_eq!(events[0].data["message"], json!("Cancelled by user"));
        assert_eq!(events[0].data["recoverable"], json!(true));
    }

    #[tokio::test]
    async fn execution_failure_becomes_handler_failed() {
        let dispatcher = dispatcher(ScriptedAgent {
            query_outcome: Some(Outcome::preview("intent", Map::new())),
            fail_on_execute: true,
            ..ScriptedAgent::default()
        });
        let events = call(
            &dispatcher,
            METHOD_SEND,
            json!({"sessionId": "s", "message": {"parts": [{"text": "go"}]}}),
        )
        .await;
        let plan_id = events[0].data["planId"].clone();
        let events = call(
            &dispatcher,
            METHOD_RESPOND,
            json!({"planId": plan_id, "approved": true}),
        )
        .await;
        let kinds: Vec<&str> = events.iter().map(|e| e.event.as_str()).collect();
        assert_eq!(kinds, ["status-update", "error"]);
        assert_eq!(events[1].data["error_type"], json!("handler_failed"));

        let session = dispatcher.registry().get("s").await.unwrap();
        assert_eq!(session.lock().await.workflow.phase(), Phase::Error);
    }

    /// A new message resets whatever the previous workflow left behind.
    #[tokio::test]
    async fn new_message_resets_state() {
        let dispatcher = dispatcher(ScriptedAgent::default());
        let params = |text: &str| {
            json!({
                "sessionId": "s",
                "message": {"parts": [{"text": text}]},
                "metadata": {"user_id": "u1"},
            })
        };
        call(&dispatcher, METHOD_SEND, params("first")).await;
        call(&dispatcher, METHOD_SEND, params("second")).await;

        let session = dispatcher.registry().get("s").await.unwrap();
        let session = session.lock().await;
        assert_eq!(session.agent.query, "second");
        assert_eq!(session.agent.metadata["user_id"], json!("u1"));
        assert_eq!(session.workflow.phase(), Phase::Completed);
    }

    #[tokio::test]
    async fn unknown_response_is_ignored() {
        let dispatcher = dispatcher(ScriptedAgent::default());
        let events = call(&dispatcher, METHOD_RESPOND, json!({"sessionId": "s"})).await;
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn agent_context_helpers_emit_status() {
        let stream = EventStream::new();
        let mut state = AgentState::default();
        let ctx = AgentContext::new(&mut state, stream.clone());
        ctx.emit_progress("halfway");
        ctx.emit_file("/out/a.csv", None, Some("rows"));
        let events = stream.drain_buffered();
        assert_eq!(events[0].data["message"], json!("halfway"));
        assert_eq!(events[1].data["summary"], json!("rows"));
    }
}
