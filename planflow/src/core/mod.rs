//! Deterministic, pure logic shared by the workflow engine.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests; the
//! only nondeterminism allowed is fresh id generation for new payloads.

pub mod events;
pub mod outcome;
pub mod phases;
pub mod types;
