//! Translation facility offered to handler contexts.
//!
//! Translation is opportunistic: a failing or missing translator leaves the
//! text unchanged.

use async_trait::async_trait;

/// Language assumed for agent-authored text.
pub const DEFAULT_LANGUAGE: &str = "en";

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, from: &str, to: &str) -> anyhow::Result<String>;
}
