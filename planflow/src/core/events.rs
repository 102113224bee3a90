//! Typed event payloads and their wire dictionaries.
//!
//! Outgoing payloads serialise camelCase and carry a `type` discriminator.
//! Incoming responses parse leniently: absent ids become `""` and absent
//! collections become empty.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::core::types::{DiscoveredItem, Question, new_id, tagged_payload};

/// SSE `event:` label for each frame kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    StatusUpdate,
    ClarificationNeeded,
    DiscoveryResult,
    SelectionRequired,
    PreviewReady,
    Message,
    Error,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        EventKind::StatusUpdate,
        EventKind::ClarificationNeeded,
        EventKind::DiscoveryResult,
        EventKind::SelectionRequired,
        EventKind::PreviewReady,
        EventKind::Message,
        EventKind::Error,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::StatusUpdate => "status-update",
            EventKind::ClarificationNeeded => "clarification_needed",
            EventKind::DiscoveryResult => "discovery_result",
            EventKind::SelectionRequired => "selection_required",
            EventKind::PreviewReady => "preview_ready",
            EventKind::Message => "message",
            EventKind::Error => "error",
        }
    }

    pub fn parse(label: &str) -> Option<EventKind> {
        EventKind::ALL.into_iter().find(|kind| kind.as_str() == label)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request for human answers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClarificationNeeded {
    pub clarification_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub questions: Vec<Question>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl ClarificationNeeded {
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            clarification_id: new_id(),
            agent_id: None,
            questions,
            context: None,
            message: None,
            timeout_ms: None,
        }
    }

    pub fn to_payload(&self) -> Map<String, Value> {
        tagged_payload(self, "clarification_needed")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryResult {
    pub discovery_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub discovery_type: String,
    pub items: Vec<DiscoveredItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DiscoveryResult {
    pub fn new(discovery_type: impl Into<String>, items: Vec<DiscoveredItem>) -> Self {
        Self {
            discovery_id: new_id(),
            agent_id: None,
            discovery_type: discovery_type.into(),
            items,
            message: None,
        }
    }

    pub fn to_payload(&self) -> Map<String, Value> {
        tagged_payload(self, "discovery_result")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionRequired {
    pub selection_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovery_type: Option<String>,
    pub items: Vec<DiscoveredItem>,
    pub min_select: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_select: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SelectionRequired {
    pub fn new(items: Vec<DiscoveredItem>) -> Self {
        Self {
            selection_id: new_id(),
            agent_id: None,
            discovery_type: None,
            items,
            min_select: 1,
            max_select: None,
            message: None,
        }
    }

    pub fn to_payload(&self) -> Map<String, Value> {
        tagged_payload(self, "selection_required")
    }
}

fn str_field(data: &Value, key: &str) -> String {
    data.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn object_field(data: &Value, key: &str) -> Option<Map<String, Value>> {
    data.get(key).and_then(Value::as_object).cloned()
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClarificationResponse {
    pub clarification_id: String,
    pub answers: Map<String, Value>,
}

impl ClarificationResponse {
    pub fn from_value(data: &Value) -> Self {
        Self {
            clarification_id: str_field(data, "clarificationId"),
            answers: object_field(data, "answers").unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectionResponse {
    pub selection_id: String,
    pub selected_ids: Vec<String>,
}

impl SelectionResponse {
    /// Non-string entries in `selectedIds` are skipped.
    pub fn from_value(data: &Value) -> Self {
        let selected_ids = data
            .get("selectedIds")
            .and_then(Value::as_array)
            .map(|ids| {
                ids.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Self {
            selection_id: str_field(data, "selectionId"),
            selected_ids,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlanApproval {
    pub plan_id: String,
    pub approved: bool,
    pub modifications: Option<Map<String, Value>>,
}

impl PlanApproval {
    pub fn from_value(data: &Value) -> Self {
        Self {
            plan_id: str_field(data, "planId"),
            approved: data
                .get("approved")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            modifications: object_field(data, "modifications"),
        }
    }
}
