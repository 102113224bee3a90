//! Wire protocol: JSON-RPC 2.0 envelope, message model and typed params.

pub mod jsonrpc;
pub mod message;
pub mod params;
