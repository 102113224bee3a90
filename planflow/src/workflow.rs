//! Per-session workflow context.
//!
//! Agent code drives a session through [`WorkflowContext`]: each interactive
//! operation records a phase transition and emits exactly one event, while
//! the `set_*` operations called on a human's answer are silent.
//!
//! Transitions are advisory. An illegal move is logged and reported through
//! the returned flag, but `phase` always reflects the last requested phase.

use std::collections::BTreeSet;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::core::events::{ClarificationNeeded, DiscoveryResult, SelectionRequired};
use crate::core::phases::{Phase, validate_transition};
use crate::core::types::{DiscoveredItem, Preview, Question, TaskState};
use crate::protocol::message::A2aMessage;
use crate::stream::EventStream;

pub const DEFAULT_EXECUTION_MESSAGE: &str = "Starting execution...";
pub const DEFAULT_COMPLETION_MESSAGE: &str = "Task completed";

/// Arguments of [`WorkflowContext::request_clarification`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClarificationRequest {
    pub questions: Vec<Question>,
    pub context: Option<String>,
    pub message: Option<String>,
    /// Advisory; passed through to the client, never enforced here.
    pub timeout_ms: Option<u64>,
}

impl ClarificationRequest {
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            questions,
            ..Self::default()
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// Arguments of [`WorkflowContext::request_selection`].
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionRequest {
    /// Defaults to the context's discovered items.
    pub items: Option<Vec<DiscoveredItem>>,
    pub discovery_type: Option<String>,
    pub min_select: usize,
    pub max_select: Option<usize>,
    pub message: Option<String>,
}

impl Default for SelectionRequest {
    fn default() -> Self {
        Self {
            items: None,
            discovery_type: None,
            min_select: 1,
            max_select: None,
            message: None,
        }
    }
}

impl SelectionRequest {
    pub fn with_items(mut self, items: Vec<DiscoveredItem>) -> Self {
        self.items = Some(items);
        self
    }

    pub fn with_discovery_type(mut self, discovery_type: impl Into<String>) -> Self {
        self.discovery_type = Some(discovery_type.into());
        self
    }

    pub fn with_bounds(mut self, min_select: usize, max_select: Option<usize>) -> Self {
        self.min_select = min_select;
        self.max_select = max_select;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Warn when a response answers something other than the pending request.
fn check_pending(kind: &str, pending: Option<&str>, supplied: Option<&str>) {
    let supplied = supplied.filter(|id| !id.is_empty());
    if let Some(supplied) = supplied
        && pending != Some(supplied)
    {
        warn!(
            kind,
            supplied,
            pending = pending.unwrap_or("<none>"),
            "response id does not match pending request, proceeding"
        );
    }
}

/// Mutable state of one workflow session.
#[derive(Debug)]
pub struct WorkflowContext {
    stream: EventStream,
    phase: Phase,
    user_answers: Map<String, Value>,
    discovered_items: Vec<DiscoveredItem>,
    selected_ids: Vec<String>,
    pending_clarification_id: Option<String>,
    pending_selection_id: Option<String>,
    pending_plan_id: Option<String>,
    supported_phases: Option<BTreeSet<Phase>>,
    agent_id: String,
}

impl WorkflowContext {
    /// Context in `idle` with no declared phases.
    pub fn new(stream: EventStream) -> Self {
        Self {
            stream,
            phase: Phase::Idle,
            user_answers: Map::new(),
            discovered_items: Vec::new(),
            selected_ids: Vec::new(),
            pending_clarification_id: None,
            pending_selection_id: None,
            pending_plan_id: None,
            supported_phases: None,
            agent_id: String::new(),
        }
    }

    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = agent_id.into();
        self
    }

    pub fn with_supported_phases(mut self, phases: impl IntoIterator<Item = Phase>) -> Self {
        self.supported_phases = Some(phases.into_iter().collect());
        self
    }

    /// Route later events to the channel of the current call.
    pub fn bind_stream(&mut self, stream: EventStream) {
        self.stream = stream;
    }

    /// Back to `idle` with all accumulated state dropped. Agent id and
    /// declared phases are kept.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.user_answers.clear();
        self.discovered_items.clear();
        self.selected_ids.clear();
        self.pending_clarification_id = None;
        self.pending_selection_id = None;
        self.pending_plan_id = None;
    }

    pub fn stream(&self) -> &EventStream {
        &self.stream
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn user_answers(&self) -> &Map<String, Value> {
        &self.user_answers
    }

    pub fn discovered_items(&self) -> &[DiscoveredItem] {
        &self.discovered_items
    }

    pub fn selected_ids(&self) -> &[String] {
        &self.selected_ids
    }

    pub fn pending_clarification_id(&self) -> Option<&str> {
        self.pending_clarification_id.as_deref()
    }

    pub fn pending_selection_id(&self) -> Option<&str> {
        self.pending_selection_id.as_deref()
    }

    pub fn pending_plan_id(&self) -> Option<&str> {
        self.pending_plan_id.as_deref()
    }

    /// Every outstanding interaction id.
    pub fn pending_ids(&self) -> Vec<&str> {
        [
            &self.pending_clarification_id,
            &self.pending_selection_id,
            &self.pending_plan_id,
        ]
        .into_iter()
        .filter_map(|id| id.as_deref())
        .collect()
    }

    /// Coarse state of the session as a whole: waiting on a human while any
    /// interaction is outstanding, otherwise following the phase.
    pub fn task_state(&self) -> TaskState {
        if !self.pending_ids().is_empty() {
            return TaskState::InputRequired;
        }
        match self.phase {
            Phase::Completed => TaskState::Completed,
            Phase::Error => TaskState::Failed,
            _ => TaskState::Working,
        }
    }

    pub fn supported_phases(&self) -> Option<&BTreeSet<Phase>> {
        self.supported_phases.as_ref()
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    fn stamped_agent_id(&self) -> Option<String> {
        (!self.agent_id.is_empty()).then(|| self.agent_id.clone())
    }

    /// Replace discovered items without emitting.
    pub fn set_discovered_items(&mut self, items: Vec<DiscoveredItem>) {
        self.discovered_items = items;
    }

    /// Replace the selection without emitting.
    pub fn set_selected_ids(&mut self, selected_ids: Vec<String>) {
        self.selected_ids = selected_ids;
    }

    /// Move to `to`, returning whether the move was legal.
    pub fn transition_to(&mut self, to: Phase) -> bool {
        let from = self.phase;
        let valid = validate_transition(from, to, self.supported_phases.as_ref());
        if valid {
            debug!(%from, %to, "phase transition");
        } else {
            warn!(%from, %to, agent_id = %self.agent_id, "invalid phase transition, proceeding");
        }
        self.phase = to;
        valid
    }

    pub fn request_clarification(&mut self, request: ClarificationRequest) -> String {
        self.transition_to(Phase::Clarification);
        let clarification = ClarificationNeeded {
            agent_id: self.stamped_agent_id(),
            context: request.context,
            message: request.message,
            timeout_ms: request.timeout_ms,
            ..ClarificationNeeded::new(request.questions)
        };
        let id = clarification.clarification_id.clone();
        self.pending_clarification_id = Some(id.clone());
        self.stream.emit_clarification(&clarification);
        id
    }

    /// Merge `answers` into the accumulated answers; later keys win.
    pub fn set_clarification_response(
        &mut self,
        answers: Map<String, Value>,
        clarification_id: Option<&str>,
    ) {
        check_pending(
            "clarification",
            self.pending_clarification_id.as_deref(),
            clarification_id,
        );
        self.user_answers.extend(answers);
        self.pending_clarification_id = None;
    }

    /// Replace the discovered items and announce them.
    pub fn emit_discovery(
        &mut self,
        items: Vec<DiscoveredItem>,
        discovery_type: &str,
        message: Option<&str>,
    ) -> String {
        self.transition_to(Phase::Discovery);
        self.discovered_items = items.clone();
        let discovery = DiscoveryResult {
            agent_id: self.stamped_agent_id(),
            message: message.map(str::to_string),
            ..DiscoveryResult::new(discovery_type, items)
        };
        self.stream.emit_discovery(&discovery);
        discovery.discovery_id
    }

    pub fn request_selection(&mut self, request: SelectionRequest) -> String {
        self.transition_to(Phase::Selection);
        let items = request
            .items
            .unwrap_or_else(|| self.discovered_items.clone());
        let selection = SelectionRequired {
            agent_id: self.stamped_agent_id(),
            discovery_type: request.discovery_type,
            min_select: request.min_select,
            max_select: request.max_select,
            message: request.message,
            ..SelectionRequired::new(items)
        };
        let id = selection.selection_id.clone();
        self.pending_selection_id = Some(id.clone());
        self.stream.emit_selection(&selection);
        id
    }

    pub fn set_selection_response(&mut self, selected_ids: Vec<String>, selection_id: Option<&str>) {
        check_pending(
            "selection",
            self.pending_selection_id.as_deref(),
            selection_id,
        );
        self.selected_ids = selected_ids;
        self.pending_selection_id = None;
    }

    pub fn emit_preview(&mut self, preview: impl Into<Preview>) -> String {
        let mut preview = preview.into();
        preview.stamp_agent_id(&self.agent_id);
        self.transition_to(Phase::Preview);
        let id = preview.plan_id().to_string();
        self.pending_plan_id = Some(id.clone());
        self.stream.emit_preview(&preview);
        id
    }

    /// Record the verdict on a plan. Modifications are merged into the
    /// answers whether or not the plan was approved.
    pub fn set_plan_approval(
        &mut self,
        approved: bool,
        plan_id: Option<&str>,
        modifications: Option<Map<String, Value>>,
    ) {
        check_pending("plan", self.pending_plan_id.as_deref(), plan_id);
        info!(approved, plan_id = plan_id.unwrap_or_default(), "plan approval received");
        if let Some(modifications) = modifications {
            self.user_answers.extend(modifications);
        }
        self.pending_plan_id = None;
    }

    pub fn start_execution(&mut self, message: Option<&str>) {
        self.transition_to(Phase::Executing);
        self.stream.emit_status(
            TaskState::Working,
            Some(message.unwrap_or(DEFAULT_EXECUTION_MESSAGE)),
            Map::new(),
        );
    }

    /// Finish the workflow with a final agent message carrying `result`.
    pub fn complete(&mut self, result: Map<String, Value>, message: Option<&str>) {
        self.transition_to(Phase::Completed);
        let text = message.unwrap_or(DEFAULT_COMPLETION_MESSAGE);
        self.stream
            .emit_result(&A2aMessage::agent_with_data(text, result), true);
    }

    pub fn error(
        &mut self,
        error_type: &str,
        message: &str,
        recoverable: bool,
        extra: Map<String, Value>,
    ) {
        self.transition_to(Phase::Error);
        self.stream
            .emit_error(error_type, message, recoverable, extra);
    }

    /// Selected items in the order of `selected_ids`. Ids that match no
    /// discovered item are skipped.
    pub fn get_selected_items(&self) -> Vec<DiscoveredItem> {
        self.selected_ids
            .iter()
            .filter_map(|id| self.discovered_items.iter().find(|item| &item.id == id))
            .cloned()
            .collect()
    }
}
