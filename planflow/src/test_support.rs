//! Test-only helpers for building items, answers and scripted agents.

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::bail;
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tempfile::TempDir;

use crate::agent::{AgentContext, PlanModeAgent};
use crate::core::outcome::Outcome;
use crate::core::types::DiscoveredItem;

/// Items whose id and name are both the given string.
pub fn items(ids: &[&str]) -> Vec<DiscoveredItem> {
    ids.iter().map(|id| DiscoveredItem::new(*id, *id)).collect()
}

/// `n` raw item records with ids `item-0`, `item-1`, ...
pub fn item_records(n: usize) -> Vec<Map<String, Value>> {
    (0..n)
        .map(|i| {
            json!({
                "id": format!("item-{i}"),
                "name": format!("Item {i}"),
                "description": format!("Description of item {i}"),
            })
            .as_object()
            .cloned()
            .unwrap_or_default()
        })
        .collect()
}

/// Answers map from `(question id, answer)` pairs.
pub fn answers(pairs: &[(&str, &str)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(id, answer)| (id.to_string(), Value::String(answer.to_string())))
        .collect()
}

/// Write `contents` to `config.toml` in a fresh temp dir.
pub fn temp_config(contents: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, contents).expect("write config");
    (dir, path)
}

/// Declarative agent with canned behavior that records every callback.
///
/// - `on_query` returns `query_outcome`, or a plain result.
/// - `on_selection` returns a preview targeting the selected ids.
/// - `on_execute` returns a `"done"` result.
#[derive(Default)]
pub struct ScriptedAgent {
    pub query_outcome: Option<Outcome>,
    /// `on_query` always asks another clarification.
    pub clarify_forever: bool,
    pub fail_on_query: bool,
    pub fail_on_execute: bool,
    /// Callback log, read through [`Self::calls`].
    pub log: Mutex<Vec<String>>,
}

impl ScriptedAgent {
    pub fn with_query_outcome(outcome: impl Into<Outcome>) -> Self {
        Self {
            query_outcome: Some(outcome.into()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.lock().expect("log lock").clone()
    }

    fn record(&self, call: String) {
        self.log.lock().expect("log lock").push(call);
    }
}

#[async_trait]
impl PlanModeAgent for ScriptedAgent {
    async fn on_query(&self, query: &str, _ctx: &mut AgentContext<'_>) -> anyhow::Result<Outcome> {
        self.record(format!("on_query:{query}"));
        if self.fail_on_query {
            bail!("query exploded");
        }
        if self.clarify_forever {
            return Ok(Outcome::clarify("again?", None));
        }
        Ok(self
            .query_outcome
            .clone()
            .unwrap_or_else(|| Outcome::result("answered", Map::new())))
    }

    async fn on_selection(
        &self,
        selected: &[String],
        _ctx: &mut AgentContext<'_>,
    ) -> anyhow::Result<Outcome> {
        self.record(format!("on_selection:{}", selected.len()));
        let mut plan = Map::new();
        plan.insert("targets".to_string(), json!(selected));
        Ok(Outcome::preview("scripted plan", plan))
    }

    async fn on_execute(&self, _ctx: &mut AgentContext<'_>) -> anyhow::Result<Outcome> {
        self.record("on_execute".to_string());
        if self.fail_on_execute {
            bail!("execution exploded");
        }
        Ok(Outcome::result("done", Map::new()))
    }
}
