//! Outcome resolution for interactive and lite execution.
//!
//! [`resolve_outcome`] is the single place that turns an agent's declarative
//! [`Outcome`] into workflow operations. In interactive mode it emits the
//! matching event and returns, leaving the workflow paused for a human. In
//! lite mode it answers on the human's behalf and feeds the next stage back
//! into the agent until a result or error ends the run.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::agent::{AgentContext, PlanModeAgent};
use crate::core::outcome::{FALLBACK_ANSWER, Outcome, to_discovered_items};
use crate::core::types::{DiscoveredItem, Question};
use crate::session::Session;
use crate::workflow::{ClarificationRequest, SelectionRequest};

/// Metadata key that switches a request into lite mode.
pub const LITE_MODE_FLAG: &str = "lite_mode_enabled";

/// Upper bound on agent callbacks chained by one lite run.
pub const MAX_AUTOPILOT_STEPS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiteModeConfig {
    pub max_select: usize,
    pub auto_approve_plan: bool,
}

impl Default for LiteModeConfig {
    fn default() -> Self {
        Self {
            max_select: 5,
            auto_approve_plan: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Interactive,
    Lite(LiteModeConfig),
}

impl ExecutionMode {
    /// Lite when `metadata[LITE_MODE_FLAG]` is `true`.
    pub fn from_metadata(metadata: &Map<String, Value>, config: LiteModeConfig) -> Self {
        match metadata.get(LITE_MODE_FLAG).and_then(Value::as_bool) {
            Some(true) => ExecutionMode::Lite(config),
            _ => ExecutionMode::Interactive,
        }
    }

    pub fn is_lite(&self) -> bool {
        matches!(self, ExecutionMode::Lite(_))
    }
}

/// First `max` item ids in input order.
pub fn auto_select(items: &[DiscoveredItem], max: usize) -> Vec<String> {
    items.iter().take(max).map(|item| item.id.clone()).collect()
}

/// Answer every question without asking: the first option for choice
/// questions, otherwise the question's default, otherwise `"default"`.
pub fn auto_answer(questions: &[Question]) -> Map<String, Value> {
    questions
        .iter()
        .map(|question| {
            let first_option = question
                .options
                .as_ref()
                .filter(|_| question.question_type.is_choice())
                .and_then(|options| options.first())
                .map(|option| Value::String(option.id.clone()));
            let answer = first_option
                .or_else(|| question.default.clone())
                .unwrap_or_else(|| Value::String(FALLBACK_ANSWER.to_string()));
            (question.id.clone(), answer)
        })
        .collect()
}

fn non_empty(text: &str) -> Option<String> {
    (!text.is_empty()).then(|| text.to_string())
}

/// Drive `outcome` through the session's workflow.
///
/// Errors come only from agent callbacks invoked in lite mode; the caller
/// decides which workflow error they become.
pub async fn resolve_outcome<A>(
    agent: &A,
    session: &mut Session,
    mut outcome: Outcome,
    mode: ExecutionMode,
) -> anyhow::Result<()>
where
    A: PlanModeAgent + ?Sized,
{
    let Session {
        id,
        workflow,
        agent: state,
    } = session;

    for step in 0..MAX_AUTOPILOT_STEPS {
        debug!(session_id = %id, step, outcome = outcome.label(), lite = mode.is_lite(), "resolving outcome");
        let next = match (outcome, mode) {
            (Outcome::Discovery(discovery), ExecutionMode::Lite(config)) => {
                let items = to_discovered_items(&discovery.items);
                let limit = discovery
                    .max_select
                    .map_or(config.max_select, |max| max.min(config.max_select));
                let selected = auto_select(&items, limit);
                info!(session_id = %id, available = items.len(), selected = selected.len(), "lite mode auto-selected items");
                state.discovered = discovery.items;
                state.selected = selected.clone();
                workflow.set_discovered_items(items);
                workflow.set_selected_ids(selected.clone());
                let mut ctx = AgentContext::new(state, workflow.stream().clone());
                agent.on_selection(&selected, &mut ctx).await?
            }
            (Outcome::Discovery(discovery), ExecutionMode::Interactive) => {
                let items = to_discovered_items(&discovery.items);
                state.discovered = discovery.items;
                workflow.emit_discovery(items.clone(), &discovery.item_type, None);
                workflow.request_selection(SelectionRequest {
                    items: Some(items),
                    discovery_type: Some(discovery.item_type),
                    min_select: discovery.min_select,
                    max_select: discovery.max_select,
                    message: non_empty(&discovery.message),
                });
                return Ok(());
            }
            (Outcome::Clarification(clarification), ExecutionMode::Lite(_)) => {
                let answers = auto_answer(&clarification.to_questions());
                info!(session_id = %id, "lite mode auto-answered clarification");
                workflow.set_clarification_response(answers.clone(), None);
                let mut ctx = AgentContext::new(state, workflow.stream().clone());
                agent.on_clarification(&answers, &mut ctx).await?
            }
            (Outcome::Clarification(clarification), ExecutionMode::Interactive) => {
                workflow.request_clarification(
                    ClarificationRequest::new(clarification.to_questions())
                        .with_message(&clarification.question),
                );
                return Ok(());
            }
            (Outcome::Preview(_), ExecutionMode::Lite(config)) if config.auto_approve_plan => {
                info!(session_id = %id, "lite mode auto-approved plan");
                workflow.start_execution(None);
                let mut ctx = AgentContext::new(state, workflow.stream().clone());
                agent.on_execute(&mut ctx).await?
            }
            (Outcome::Preview(preview), _) => {
                let preview = preview.to_search_preview(workflow.user_answers());
                workflow.emit_preview(preview);
                return Ok(());
            }
            (Outcome::Result(result), _) => {
                workflow.complete(result.to_result(), Some(result.answer.as_str()));
                return Ok(());
            }
            (Outcome::Error(error), _) => {
                workflow.error("agent_error", &error.message, error.recoverable, Map::new());
                return Ok(());
            }
        };
        outcome = next;
    }

    warn!(session_id = %id, steps = MAX_AUTOPILOT_STEPS, "autopilot did not converge");
    workflow.error(
        "autopilot_loop",
        "Lite mode did not reach a result",
        false,
        Map::new(),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::phases::Phase;
    use crate::core::types::{QuestionOption, QuestionType};
    use crate::session::AgentState;
    use crate::stream::EventStream;
    use crate::test_support::{ScriptedAgent, item_records, items};
    use crate::workflow::WorkflowContext;
    use serde_json::json;

    fn lite() -> ExecutionMode {
        ExecutionMode::Lite(LiteModeConfig::default())
    }

    fn session() -> Session {
        Session {
            id: "s".to_string(),
            workflow: WorkflowContext::new(EventStream::new()).with_agent_id("test-agent"),
            agent: AgentState {
                query: "test query".to_string(),
                ..AgentState::default()
            },
        }
    }

    #[test]
    fn mode_follows_metadata_flag() {
        let mut metadata = Map::new();
        let config = LiteModeConfig::default();
        assert_eq!(
            ExecutionMode::from_metadata(&metadata, config),
            ExecutionMode::Interactive
        );
        metadata.insert(LITE_MODE_FLAG.to_string(), json!("yes"));
        assert!(!ExecutionMode::from_metadata(&metadata, config).is_lite());
        metadata.insert(LITE_MODE_FLAG.to_string(), json!(true));
        assert!(ExecutionMode::from_metadata(&metadata, config).is_lite());
    }

    #[test]
    fn auto_select_keeps_input_order() {
        let all = items(&["e", "d", "c", "b", "a", "z", "y"]);
        assert_eq!(auto_select(&all, 5), vec!["e", "d", "c", "b", "a"]);
        assert_eq!(auto_select(&all[..2], 5), vec!["e", "d"]);
    }

    #[test]
    fn auto_answer_uses_declared_ids() {
        let questions = vec![
            Question::single_choice(
                "topic",
                "Topic?",
                vec![QuestionOption::new("gaming", "Gaming")],
            ),
            Question::new("budget", QuestionType::NumericRange, "Budget?").with_default(500),
            Question::free_text("notes", "Notes?"),
            Question::new("ok", QuestionType::YesNo, "Proceed?"),
        ];
        let answers = auto_answer(&questions);
        assert_eq!(answers["topic"], json!("gaming"));
        assert_eq!(answers["budget"], json!(500));
        assert_eq!(answers["notes"], json!("default"));
        assert_eq!(answers["ok"], json!("default"));
    }

    #[tokio::test]
    async fn interactive_discovery_emits_discovery_then_selection() {
        let mut session = session();
        let agent = ScriptedAgent::default();
        let outcome = Outcome::discovery(item_records(3));
        resolve_outcome(&agent, &mut session, outcome, ExecutionMode::Interactive)
            .await
            .unwrap();

        let events = session.workflow.stream().drain_buffered();
        let kinds: Vec<&str> = events.iter().map(|e| e.event.as_str()).collect();
        assert_eq!(kinds, ["discovery_result", "selection_required"]);
        assert_eq!(session.workflow.phase(), Phase::Selection);
        assert_eq!(session.agent.discovered.len(), 3);
        assert!(agent.calls().is_empty());
    }

    /// Lite mode chains selection, execution and completion without any
    /// interactive event.
    #[tokio::test]
    async fn lite_discovery_runs_to_completion() {
        let mut session = session();
        let agent = ScriptedAgent::default();
        resolve_outcome(&agent, &mut session, Outcome::discovery(item_records(10)), lite())
            .await
            .unwrap();

        assert_eq!(
            session.workflow.selected_ids(),
            ["item-0", "item-1", "item-2", "item-3", "item-4"]
        );
        assert_eq!(session.workflow.phase(), Phase::Completed);
        assert_eq!(agent.calls(), vec!["on_selection:5", "on_execute"]);

        let events = session.workflow.stream().drain_buffered();
        assert!(events.iter().all(|e| {
            !matches!(
                e.event.as_str(),
                "discovery_result" | "selection_required" | "preview_ready" | "clarification_needed"
            )
        }));
        assert_eq!(events.last().unwrap().data["final"], json!(true));
    }

    #[tokio::test]
    async fn lite_selection_respects_smaller_outcome_max() {
        let mut session = session();
        let agent = ScriptedAgent::default();
        let outcome = crate::core::outcome::DiscoveryOutcome::new(item_records(10)).with_max_select(2);
        resolve_outcome(&agent, &mut session, outcome.into(), lite())
            .await
            .unwrap();
        assert_eq!(session.workflow.selected_ids().len(), 2);
    }

    #[tokio::test]
    async fn lite_clarification_answers_q1() {
        let mut session = session();
        let agent = ScriptedAgent::default();
        let outcome = Outcome::clarify(
            "Topic?",
            Some(vec![QuestionOption::new("gaming", "Gaming")]),
        );
        resolve_outcome(&agent, &mut session, outcome, lite())
            .await
            .unwrap();
        assert_eq!(session.workflow.user_answers()["q1"], json!("gaming"));
        assert_eq!(session.agent.context["q1"], json!("gaming"));
        assert_eq!(agent.calls()[0], "on_query:test query");
    }

    /// An open question gets the fallback answer under the question's own id.
    #[tokio::test]
    async fn lite_free_text_clarification_gets_fallback() {
        let mut session = session();
        let agent = ScriptedAgent::default();
        resolve_outcome(&agent, &mut session, Outcome::clarify("Describe it", None), lite())
            .await
            .unwrap();
        assert_eq!(session.workflow.user_answers()["q1"], json!("default"));
        assert_eq!(session.agent.context["q1"], json!("default"));
        assert_eq!(session.workflow.pending_clarification_id(), None);
    }

    #[tokio::test]
    async fn lite_preview_without_auto_approve_emits_preview() {
        let mut session = session();
        let agent = ScriptedAgent::default();
        let mode = ExecutionMode::Lite(LiteModeConfig {
            auto_approve_plan: false,
            ..LiteModeConfig::default()
        });
        resolve_outcome(&agent, &mut session, Outcome::preview("x", Map::new()), mode)
            .await
            .unwrap();
        assert_eq!(session.workflow.phase(), Phase::Preview);
        assert!(agent.calls().is_empty());
    }

    /// Lite mode never swallows failures.
    #[tokio::test]
    async fn errors_surface_in_both_modes() {
        for mode in [ExecutionMode::Interactive, lite()] {
            let mut session = session();
            let agent = ScriptedAgent::default();
            resolve_outcome(&agent, &mut session, Outcome::error("nope"), mode)
                .await
                .unwrap();
            let events = session.workflow.stream().drain_buffered();
            assert_eq!(events[0].event, "error");
            assert_eq!(events[0].data["error_type"], json!("agent_error"));
            assert_eq!(events[0].data["recoverable"], json!(true));
            assert_eq!(session.workflow.phase(), Phase::Error);
        }
    }

    #[tokio::test]
    async fn looping_agent_is_cut_off() {
        let mut session = session();
        let agent = ScriptedAgent {
            clarify_forever: true,
            ..ScriptedAgent::default()
        };
        resolve_outcome(&agent, &mut session, Outcome::clarify("again?", None), lite())
            .await
            .unwrap();
        let events = session.workflow.stream().drain_buffered();
        assert_eq!(events.last().unwrap().data["error_type"], json!("autopilot_loop"));
        assert_eq!(agent.calls().len(), MAX_AUTOPILOT_STEPS);
    }
}
