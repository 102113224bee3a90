//! Declarative outcomes returned by agent callbacks.
//!
//! Both execution modes consume the same [`Outcome`]; the conversions here
//! are pure so the resolver only has to decide *what* to do with them.

use serde_json::{Map, Value};

use crate::core::types::{DiscoveredItem, Question, QuestionOption, QuestionType, SearchPlanPreview};

/// Description length kept when converting discovery records.
pub const MAX_DESCRIPTION_CHARS: usize = 200;

/// Positional id given to the single question of a simplified clarification.
pub const SIMPLE_QUESTION_ID: &str = "q1";

/// Answer used when a question offers nothing better.
pub const FALLBACK_ANSWER: &str = "default";

/// What an agent callback wants to happen next.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Discovery(DiscoveryOutcome),
    Clarification(ClarificationOutcome),
    Preview(PreviewOutcome),
    Result(ResultOutcome),
    Error(ErrorOutcome),
}

impl Outcome {
    pub fn discovery(items: Vec<Map<String, Value>>) -> Self {
        Outcome::Discovery(DiscoveryOutcome::new(items))
    }

    pub fn clarify(question: impl Into<String>, options: Option<Vec<QuestionOption>>) -> Self {
        Outcome::Clarification(ClarificationOutcome {
            question: question.into(),
            options,
            header: ClarificationOutcome::DEFAULT_HEADER.to_string(),
        })
    }

    pub fn preview(intent: impl Into<String>, plan: Map<String, Value>) -> Self {
        Outcome::Preview(PreviewOutcome {
            intent: intent.into(),
            plan,
            message: String::new(),
        })
    }

    pub fn result(answer: impl Into<String>, data: Map<String, Value>) -> Self {
        Outcome::Result(ResultOutcome {
            answer: answer.into(),
            data,
        })
    }

    /// Recoverable failure, matching how agents usually report problems.
    pub fn error(message: impl Into<String>) -> Self {
        Outcome::Error(ErrorOutcome {
            message: message.into(),
            recoverable: true,
        })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Discovery(_) => "discovery",
            Outcome::Clarification(_) => "clarification",
            Outcome::Preview(_) => "preview",
            Outcome::Result(_) => "result",
            Outcome::Error(_) => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryOutcome {
    /// Raw records; see [`to_discovered_items`].
    pub items: Vec<Map<String, Value>>,
    pub message: String,
    pub item_type: String,
    pub min_select: usize,
    pub max_select: Option<usize>,
}

impl DiscoveryOutcome {
    pub fn new(items: Vec<Map<String, Value>>) -> Self {
        Self {
            items,
            message: String::new(),
            item_type: "items".to_string(),
            min_select: 1,
            max_select: None,
        }
    }

    pub fn with_item_type(mut self, item_type: impl Into<String>) -> Self {
        self.item_type = item_type.into();
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_max_select(mut self, max_select: usize) -> Self {
        self.max_select = Some(max_select);
        self
    }
}

impl From<DiscoveryOutcome> for Outcome {
    fn from(discovery: DiscoveryOutcome) -> Self {
        Outcome::Discovery(discovery)
    }
}

/// A single question without an explicit id.
#[derive(Debug, Clone, PartialEq)]
pub struct ClarificationOutcome {
    pub question: String,
    pub options: Option<Vec<QuestionOption>>,
    pub header: String,
}

impl ClarificationOutcome {
    pub const DEFAULT_HEADER: &'static str = "Question";

    /// Expand into the one-question list sent to the client.
    pub fn to_questions(&self) -> Vec<Question> {
        let question = match &self.options {
            Some(options) if !options.is_empty() => {
                Question::single_choice(SIMPLE_QUESTION_ID, &self.question, options.clone())
            }
            _ => Question::new(SIMPLE_QUESTION_ID, QuestionType::FreeText, &self.question),
        };
        vec![question.with_header(&self.header)]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreviewOutcome {
    pub intent: String,
    /// Free-form plan; `targets`, `keywords` and `hashtags` are recognised.
    pub plan: Map<String, Value>,
    pub message: String,
}

impl PreviewOutcome {
    pub fn to_search_preview(&self, user_answers: &Map<String, Value>) -> SearchPlanPreview {
        let mut preview = SearchPlanPreview::new(&self.intent);
        preview.subreddits = string_list(&self.plan, "targets");
        preview.search_keywords = string_list(&self.plan, "keywords");
        preview.hashtags = string_list(&self.plan, "hashtags");
        preview.user_answers = user_answers.clone();
        if !self.message.is_empty() {
            preview.message = Some(self.message.clone());
        }
        preview
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultOutcome {
    pub answer: String,
    pub data: Map<String, Value>,
}

impl ResultOutcome {
    /// `{"answer": .., ..data}`; keys in `data` win over `answer`.
    pub fn to_result(&self) -> Map<String, Value> {
        let mut result = Map::new();
        result.insert("answer".to_string(), Value::String(self.answer.clone()));
        result.extend(self.data.clone());
        result
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorOutcome {
    pub message: String,
    pub recoverable: bool,
}

fn string_list(map: &Map<String, Value>, key: &str) -> Vec<String> {
    map.get(key)
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Convert raw discovery records. `id` falls back to `name`; descriptions are
/// cut to [`MAX_DESCRIPTION_CHARS`] characters.
pub fn to_discovered_items(records: &[Map<String, Value>]) -> Vec<DiscoveredItem> {
    records
        .iter()
        .map(|record| {
            let name = record
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let id = record
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| name.clone());
            let description = record
                .get("description")
                .and_then(Value::as_str)
                .map(|text| text.chars().take(MAX_DESCRIPTION_CHARS).collect());
            let metadata = record.get("metadata").and_then(Value::as_object).cloned();
            DiscoveredItem {
                id,
                name,
                description,
                metadata,
            }
        })
        .collect()
}
