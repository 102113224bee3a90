//! Data model shared by the workflow context and the event payloads.
//!
//! Every struct here serialises to the camelCase wire shape clients expect.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Serialise `value` into a JSON object and stamp the `type` discriminator.
pub(crate) fn tagged_payload<T: Serialize>(value: &T, kind: &str) -> Map<String, Value> {
    let mut payload = match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    payload.insert("type".to_string(), Value::String(kind.to_string()));
    payload
}

/// A candidate surfaced by discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredItem {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl DiscoveredItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            metadata: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    FreeText,
    YesNo,
    NumericRange,
}

impl QuestionType {
    pub fn is_choice(self) -> bool {
        matches!(
            self,
            QuestionType::SingleChoice | QuestionType::MultipleChoice | QuestionType::YesNo
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl QuestionOption {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
        }
    }
}

/// One question inside a clarification request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(rename = "questionId")]
    pub id: String,
    pub question_type: QuestionType,
    #[serde(rename = "question")]
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<QuestionOption>>,
    #[serde(default)]
    pub allow_free_text: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
}

impl Question {
    pub fn new(id: impl Into<String>, question_type: QuestionType, prompt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            question_type,
            prompt: prompt.into(),
            header: None,
            options: None,
            allow_free_text: false,
            default: None,
            placeholder: None,
            min: None,
            max: None,
            step: None,
        }
    }

    pub fn free_text(id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::new(id, QuestionType::FreeText, prompt)
    }

    pub fn single_choice(
        id: impl Into<String>,
        prompt: impl Into<String>,
        options: Vec<QuestionOption>,
    ) -> Self {
        Self::new(id, QuestionType::SingleChoice, prompt).with_options(options)
    }

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    pub fn with_options(mut self, options: Vec<QuestionOption>) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn with_range(mut self, min: f64, max: f64, step: Option<f64>) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self.step = step;
        self
    }

    pub fn allowing_free_text(mut self) -> Self {
        self.allow_free_text = true;
        self
    }
}

fn pending_status() -> String {
    "pending".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStep {
    pub id: String,
    pub description: String,
    #[serde(default = "pending_status")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

impl PlanStep {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            status: pending_status(),
            estimated_duration: None,
            tool_hint: None,
            dependencies: Vec::new(),
        }
    }
}

/// Generic plan awaiting approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanProposed {
    pub plan_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub title: String,
    pub steps: Vec<PlanStep>,
    #[serde(default)]
    pub requires_approval: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_start_after_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PlanProposed {
    pub const DEFAULT_AUTO_START_MS: u64 = 5000;

    pub fn new(title: impl Into<String>, steps: Vec<PlanStep>) -> Self {
        Self {
            plan_id: new_id(),
            agent_id: None,
            title: title.into(),
            steps,
            requires_approval: false,
            auto_start_after_ms: Some(Self::DEFAULT_AUTO_START_MS),
            message: None,
        }
    }
}

/// Plan preview specialised for search-style agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPlanPreview {
    pub plan_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_url: Option<String>,
    pub user_intent: String,
    #[serde(default)]
    pub user_answers: Map<String, Value>,
    #[serde(default)]
    pub search_keywords: Vec<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    pub follower_min: u64,
    pub follower_max: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub min_engagement: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subreddits: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SearchPlanPreview {
    pub fn new(user_intent: impl Into<String>) -> Self {
        Self {
            plan_id: new_id(),
            agent_id: None,
            agent_url: None,
            user_intent: user_intent.into(),
            user_answers: Map::new(),
            search_keywords: Vec::new(),
            hashtags: Vec::new(),
            follower_min: 1000,
            follower_max: 100_000,
            location: None,
            min_engagement: 0.03,
            subreddits: Vec::new(),
            message: None,
        }
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.search_keywords = keywords;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Anything `emit_preview` can present for approval.
#[derive(Debug, Clone, PartialEq)]
pub enum Preview {
    Plan(PlanProposed),
    Search(SearchPlanPreview),
}

impl Preview {
    pub fn plan_id(&self) -> &str {
        match self {
            Preview::Plan(plan) => &plan.plan_id,
            Preview::Search(search) => &search.plan_id,
        }
    }

    /// Fill in the agent id unless the caller already set one.
    pub fn stamp_agent_id(&mut self, agent_id: &str) {
        let slot = match self {
            Preview::Plan(plan) => &mut plan.agent_id,
            Preview::Search(search) => &mut search.agent_id,
        };
        if slot.is_none() && !agent_id.is_empty() {
            *slot = Some(agent_id.to_string());
        }
    }

    pub fn to_payload(&self) -> Map<String, Value> {
        match self {
            Preview::Plan(plan) => tagged_payload(plan, "plan_proposed"),
            Preview::Search(search) => tagged_payload(search, "search_plan"),
        }
    }
}

impl From<PlanProposed> for Preview {
    fn from(plan: PlanProposed) -> Self {
        Preview::Plan(plan)
    }
}

impl From<SearchPlanPreview> for Preview {
    fn from(search: SearchPlanPreview) -> Self {
        Preview::Search(search)
    }
}

/// Coarse task lifecycle mirrored into every event's `state` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    Working,
    InputRequired,
    Completed,
    Failed,
    Canceled,
}

impl TaskState {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Working => "working",
            TaskState::InputRequired => "input-required",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
            TaskState::Canceled => "canceled",
        }
    }
}
