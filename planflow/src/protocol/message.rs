//! Message model carried by `message/send` and `message` events.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}

fn json_mime() -> String {
    "application/json".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Agent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    Data {
        data: Value,
        #[serde(rename = "mimeType", default = "json_mime")]
        mime_type: String,
    },
    File {
        file: Value,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn data(data: Map<String, Value>) -> Self {
        Part::Data {
            data: Value::Object(data),
            mime_type: json_mime(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct A2aMessage {
    #[serde(default = "new_message_id")]
    pub message_id: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<Part>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl A2aMessage {
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self {
            message_id: new_message_id(),
            role,
            parts,
            metadata: Map::new(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![Part::text(text)])
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self::new(Role::Agent, vec![Part::text(text)])
    }

    pub fn agent_with_data(text: impl Into<String>, data: Map<String, Value>) -> Self {
        Self::new(Role::Agent, vec![Part::text(text), Part::data(data)])
    }

    /// Concatenation of every text part, in order.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_mixed_parts_and_defaults() {
        let message: A2aMessage = serde_json::from_value(json!({
            "role": "user",
            "parts": [
                {"text": "find "},
                {"data": {"k": 1}},
                {"file": {"uri": "s3://x"}},
                {"text": "gaming subs"},
            ],
        }))
        .unwrap();
        assert!(!message.message_id.is_empty());
        assert_eq!(message.text(), "find gaming subs");
        assert_eq!(
            message.parts[1],
            Part::Data {
                data: json!({"k": 1}),
                mime_type: "application/json".to_string(),
            }
        );
        assert!(matches!(message.parts[2], Part::File { .. }));
    }

    #[test]
    fn agent_with_data_serialises_two_parts() {
        let mut data = Map::new();
        data.insert("items".to_string(), json!(1));
        let value = serde_json::to_value(A2aMessage::agent_with_data("done", data)).unwrap();
        assert_eq!(value["role"], json!("agent"));
        assert_eq!(value["parts"][0], json!({"text": "done"}));
        assert_eq!(
            value["parts"][1],
            json!({"data": {"items": 1}, "mimeType": "application/json"})
        );
    }
}
