//! Typed params for the engine's RPC methods.
//!
//! `respond` carries no explicit kind; it is inferred from which interaction
//! id is present, checked in [`RESPONSE_KIND_PRECEDENCE`] order.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::core::events::{ClarificationResponse, PlanApproval, SelectionResponse};
use crate::error::ProtocolError;
use crate::protocol::message::A2aMessage;

/// Params of `message/send` and `message/stream`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageParams {
    pub message: A2aMessage,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl SendMessageParams {
    pub fn from_value(params: Value) -> Result<Self, ProtocolError> {
        serde_json::from_value(params).map_err(|err| ProtocolError::InvalidParams(err.to_string()))
    }

    /// Message-level metadata overlaid with request-level metadata.
    pub fn merged_metadata(&self) -> Map<String, Value> {
        let mut merged = self.message.metadata.clone();
        merged.extend(self.metadata.clone());
        merged
    }
}

/// Kind of answer a `respond` call carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    Clarification,
    Selection,
    Plan,
    Unknown,
}

impl ResponseType {
    /// Wire field whose presence selects this kind.
    pub fn id_field(self) -> Option<&'static str> {
        match self {
            ResponseType::Clarification => Some("clarificationId"),
            ResponseType::Selection => Some("selectionId"),
            ResponseType::Plan => Some("planId"),
            ResponseType::Unknown => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResponseType::Clarification => "clarification",
            ResponseType::Selection => "selection",
            ResponseType::Plan => "plan",
            ResponseType::Unknown => "unknown",
        }
    }
}

/// Order in which interaction ids are checked when several co-occur.
pub const RESPONSE_KIND_PRECEDENCE: [ResponseType; 3] = [
    ResponseType::Clarification,
    ResponseType::Selection,
    ResponseType::Plan,
];

/// First kind in precedence order whose id field is present and non-null.
pub fn infer_response_type(params: &Value) -> ResponseType {
    RESPONSE_KIND_PRECEDENCE
        .into_iter()
        .find(|kind| {
            kind.id_field()
                .and_then(|field| params.get(field))
                .is_some_and(|value| !value.is_null())
        })
        .unwrap_or(ResponseType::Unknown)
}

/// Parsed answer of a `respond` call.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseKind {
    Clarification(ClarificationResponse),
    Selection(SelectionResponse),
    Plan(PlanApproval),
    Unknown,
}

impl ResponseKind {
    pub fn from_params(params: &Value) -> Self {
        match infer_response_type(params) {
            ResponseType::Clarification => {
                ResponseKind::Clarification(ClarificationResponse::from_value(params))
            }
            ResponseType::Selection => ResponseKind::Selection(SelectionResponse::from_value(params)),
            ResponseType::Plan => ResponseKind::Plan(PlanApproval::from_value(params)),
            ResponseType::Unknown => ResponseKind::Unknown,
        }
    }

    pub fn response_type(&self) -> ResponseType {
        match self {
            ResponseKind::Clarification(_) => ResponseType::Clarification,
            ResponseKind::Selection(_) => ResponseType::Selection,
            ResponseKind::Plan(_) => ResponseType::Plan,
            ResponseKind::Unknown => ResponseType::Unknown,
        }
    }

    /// Id of the interaction being answered, if any.
    pub fn interaction_id(&self) -> Option<&str> {
        let id = match self {
            ResponseKind::Clarification(response) => response.clarification_id.as_str(),
            ResponseKind::Selection(response) => response.selection_id.as_str(),
            ResponseKind::Plan(approval) => approval.plan_id.as_str(),
            ResponseKind::Unknown => return None,
        };
        (!id.is_empty()).then_some(id)
    }
}

/// Params of `respond`.
#[derive(Debug, Clone, PartialEq)]
pub struct RespondParams {
    pub session_id: Option<String>,
    pub metadata: Map<String, Value>,
    pub response: ResponseKind,
}

impl RespondParams {
    pub fn from_value(params: &Value) -> Result<Self, ProtocolError> {
        if !params.is_object() {
            return Err(ProtocolError::InvalidParams(
                "respond params must be an object".to_string(),
            ));
        }
        Ok(Self {
            session_id: params
                .get("sessionId")
                .and_then(Value::as_str)
                .map(str::to_string),
            metadata: params
                .get("metadata")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            response: ResponseKind::from_params(params),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Precedence is clarification, then selection, then plan.
    #[test]
    fn precedence_constant_order() {
        assert_eq!(
            RESPONSE_KIND_PRECEDENCE,
            [
                ResponseType::Clarification,
                ResponseType::Selection,
                ResponseType::Plan
            ]
        );
    }

    #[test]
    fn inference_by_single_field() {
        assert_eq!(
            infer_response_type(&json!({"clarificationId": "c", "answers": {}})),
            ResponseType::Clarification
        );
        assert_eq!(
            infer_response_type(&json!({"selectionId": "s", "selectedIds": []})),
            ResponseType::Selection
        );
        assert_eq!(
            infer_response_type(&json!({"planId": "p", "approved": true})),
            ResponseType::Plan
        );
        assert_eq!(
            infer_response_type(&json!({"sessionId": "x"})),
            ResponseType::Unknown
        );
    }

    /// Co-occurring ids resolve by precedence; explicit nulls count as absent.
    #[test]
    fn inference_with_co_occurring_ids() {
        assert_eq!(
            infer_response_type(&json!({"planId": "p", "selectionId": "s", "clarificationId": "c"})),
            ResponseType::Clarification
        );
        assert_eq!(
            infer_response_type(&json!({"planId": "p", "selectionId": "s"})),
            ResponseType::Selection
        );
        assert_eq!(
            infer_response_type(&json!({"clarificationId": null, "planId": "p"})),
            ResponseType::Plan
        );
    }

    #[test]
    fn respond_params_parse_plan_approval() {
        let params = RespondParams::from_value(&json!({
            "sessionId": "sess-1",
            "planId": "plan-1",
            "approved": false,
            "modifications": {"keywords": ["x"]},
        }))
        .unwrap();
        assert_eq!(params.session_id.as_deref(), Some("sess-1"));
        assert_eq!(params.response.interaction_id(), Some("plan-1"));
        let ResponseKind::Plan(approval) = params.response else {
            panic!("expected plan approval");
        };
        assert!(!approval.approved);
        assert_eq!(approval.modifications.unwrap()["keywords"], json!(["x"]));
    }

    #[test]
    fn respond_params_reject_non_object() {
        let err = RespondParams::from_value(&json!("nope")).unwrap_err();
        assert_eq!(err.code(), crate::protocol::jsonrpc::INVALID_PARAMS);
    }

    #[test]
    fn send_params_merge_metadata() {
        let params = SendMessageParams::from_value(json!({
            "message": {
                "role": "user",
                "parts": [{"text": "hi"}],
                "metadata": {"lite_mode_enabled": false, "language": "ko"},
            },
            "metadata": {"lite_mode_enabled": true},
        }))
        .unwrap();
        assert_eq!(params.session_id, None);
        let merged = params.merged_metadata();
        assert_eq!(merged["lite_mode_enabled"], json!(true));
        assert_eq!(merged["language"], json!("ko"));
    }

    #[test]
    fn send_params_require_message() {
        let err = SendMessageParams::from_value(json!({"sessionId": "s"})).unwrap_err();
        assert_eq!(err.code(), crate::protocol::jsonrpc::INVALID_PARAMS);
    }
}
