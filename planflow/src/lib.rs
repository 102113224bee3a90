//! Interactive plan-mode workflow engine.
//!
//! This crate lets a long-running agent pause to ask a human for clarification,
//! present discovered candidates for selection, or request approval of a plan,
//! and then resume, all over a stateless JSON-RPC request/response transport
//! whose responses are streamed as Server-Sent Events.
//!
//! - **[`core`]**: Pure, deterministic logic (phase table, data model, event
//!   payloads, declarative outcomes). No I/O, fully testable in isolation.
//! - **[`protocol`]**: JSON-RPC envelope, message model and typed params.
//! - **[`stream`]**: Per-connection ordered event channel and SSE framing.
//! - **[`workflow`]**: Per-session workflow context driven by agent code.
//! - **[`session`]**: Registry that keeps workflows alive across calls.
//! - **[`dispatch`]**: Routes inbound RPC calls to user callbacks.
//!
//! The declarative agent flavors ([`agent`], [`tool_mode`]) sit on top of the
//! dispatcher and share a single outcome resolver ([`autopilot`]) for the
//! interactive and lite execution modes.

pub mod agent;
pub mod autopilot;
pub mod config;
pub mod core;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod session;
pub mod stream;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tool_mode;
pub mod translation;
pub mod workflow;
