//! Built-in demo agent so the binary is runnable without custom code.
//!
//! Discovers communities from a static catalog, lets the user pick some,
//! previews a search plan over them and reports a canned result.

use async_trait::async_trait;
use planflow::agent::{AgentContext, PlanModeAgent};
use planflow::core::outcome::{DiscoveryOutcome, Outcome};
use planflow::core::types::QuestionOption;
use serde_json::{Map, Value, json};

const CATALOG: &[(&str, &str, &str)] = &[
    ("gaming", "r/gaming", "General gaming news and discussion"),
    ("pcgaming", "r/pcgaming", "PC gaming hardware and releases"),
    ("indiegaming", "r/indiegaming", "Independent game development"),
    ("technology", "r/technology", "Technology news"),
    ("programming", "r/programming", "Software development"),
    ("rust", "r/rust", "The Rust programming language"),
    ("cooking", "r/cooking", "Recipes and kitchen tips"),
    ("travel", "r/travel", "Trip reports and advice"),
];

#[derive(Debug, Default)]
pub struct DemoAgent;

impl DemoAgent {
    fn matches(query: &str) -> Vec<Map<String, Value>> {
        let query = query.to_lowercase();
        CATALOG
            .iter()
            .filter(|(id, _, description)| {
                query
                    .split_whitespace()
                    .any(|word| id.contains(word) || description.to_lowercase().contains(word))
            })
            .filter_map(|(id, name, description)| {
                json!({"id": id, "name": name, "description": description})
                    .as_object()
                    .cloned()
            })
            .collect()
    }
}

#[async_trait]
impl PlanModeAgent for DemoAgent {
    async fn on_query(&self, query: &str, ctx: &mut AgentContext<'_>) -> anyhow::Result<Outcome> {
        // Clarification answers are folded into the search terms.
        let mut terms = query.to_string();
        for answer in ctx.state.context.values().filter_map(Value::as_str) {
            terms.push(' ');
            terms.push_str(answer);
        }

        let found = Self::matches(&terms);
        if found.is_empty() {
            return Ok(Outcome::clarify(
                "Which topic should I search?",
                Some(vec![
                    QuestionOption::new("gaming", "Gaming"),
                    QuestionOption::new("programming", "Programming"),
                    QuestionOption::new("travel", "Travel"),
                ]),
            ));
        }
        ctx.emit_progress(&format!("Found {} communities", found.len()));
        Ok(DiscoveryOutcome::new(found)
            .with_item_type("subreddits")
            .with_message("Pick the communities to search")
            .into())
    }

    async fn on_selection(
        &self,
        selected: &[String],
        ctx: &mut AgentContext<'_>,
    ) -> anyhow::Result<Outcome> {
        let keywords: Vec<String> = ctx
            .state
            .query
            .split_whitespace()
            .map(str::to_string)
            .collect();
        let mut plan = Map::new();
        plan.insert("targets".to_string(), json!(selected));
        plan.insert("keywords".to_string(), json!(keywords));
        Ok(Outcome::preview(ctx.state.query.clone(), plan))
    }

    async fn on_execute(&self, ctx: &mut AgentContext<'_>) -> anyhow::Result<Outcome> {
        let targets = ctx.state.selected.join(", ");
        ctx.emit_progress(&format!("Searching {targets}"));
        let mut data = Map::new();
        data.insert("targets".to_string(), json!(ctx.state.selected));
        data.insert("posts".to_string(), json!(ctx.state.selected.len() * 10));
        Ok(Outcome::result(format!("Searched {targets}"), data))
    }
}
