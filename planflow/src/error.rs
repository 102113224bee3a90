//! Typed errors surfaced at the wire boundary.
//!
//! Workflow failures are not errors in this sense: they travel as `error`
//! events and the RPC call itself still succeeds.

use thiserror::Error;

use crate::protocol::jsonrpc::{self, JsonRpcError};

/// Protocol-level failures, each mapping to one JSON-RPC error code.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Method not found: {0}")]
    MethodNotFound(String),
    #[error("Invalid params: {0}")]
    InvalidParams(String),
    #[error("{0}")]
    Internal(String),
    #[error("Task not found: {0}")]
    TaskNotFound(String),
    #[error("Task canceled: {0}")]
    TaskCanceled(String),
    #[error("Input required: {0}")]
    InputRequired(String),
}

impl ProtocolError {
    pub fn code(&self) -> i64 {
        match self {
            ProtocolError::Parse(_) => jsonrpc::PARSE_ERROR,
            ProtocolError::InvalidRequest(_) => jsonrpc::INVALID_REQUEST,
            ProtocolError::MethodNotFound(_) => jsonrpc::METHOD_NOT_FOUND,
            ProtocolError::InvalidParams(_) => jsonrpc::INVALID_PARAMS,
            ProtocolError::Internal(_) => jsonrpc::INTERNAL_ERROR,
            ProtocolError::TaskNotFound(_) => jsonrpc::TASK_NOT_FOUND,
            ProtocolError::TaskCanceled(_) => jsonrpc::TASK_CANCELED,
            ProtocolError::InputRequired(_) => jsonrpc::INPUT_REQUIRED,
        }
    }
}

impl From<ProtocolError> for JsonRpcError {
    fn from(err: ProtocolError) -> Self {
        JsonRpcError {
            code: err.code(),
            message: err.to_string(),
            data: None,
        }
    }
}

/// Failures decoding a single SSE frame.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame has no event line")]
    MissingEvent,
    #[error("frame has no data line")]
    MissingData,
    #[error("invalid data line: {0}")]
    Data(#[from] serde_json::Error),
    #[error("data line is not a JSON object")]
    NotAnObject,
}
