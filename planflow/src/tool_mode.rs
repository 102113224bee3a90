//! Tool-selecting agent flavor.
//!
//! A [`ToolAgent`] declares tools and picks which to call for a query.
//! [`ToolModeAgent`] wraps it as a [`PlanModeAgent`]: selected calls run in
//! order, the first interactive outcome short-circuits, and plain results are
//! merged into one.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::agent::{AgentContext, PlanModeAgent};
use crate::core::outcome::Outcome;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
}

impl Tool {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

#[async_trait]
pub trait ToolAgent: Send + Sync {
    fn tools(&self) -> Vec<Tool>;

    /// Calls to make for `query`, in order. Empty means nothing applies.
    async fn select_tools(&self, query: &str, tools: &[Tool]) -> anyhow::Result<Vec<ToolCall>>;

    async fn call_tool(&self, call: &ToolCall, ctx: &mut AgentContext<'_>) -> anyhow::Result<Outcome>;

    async fn on_selection(
        &self,
        selected: &[String],
        ctx: &mut AgentContext<'_>,
    ) -> anyhow::Result<Outcome>;

    async fn on_execute(&self, ctx: &mut AgentContext<'_>) -> anyhow::Result<Outcome>;

    /// `None` falls back to re-running tool selection with the merged answers.
    async fn on_clarification(
        &self,
        _answers: &Map<String, Value>,
        _ctx: &mut AgentContext<'_>,
    ) -> anyhow::Result<Option<Outcome>> {
        Ok(None)
    }
}

pub struct ToolModeAgent<T> {
    inner: T,
}

impl<T: ToolAgent> ToolModeAgent<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: ToolAgent> PlanModeAgent for ToolModeAgent<T> {
    async fn on_query(&self, query: &str, ctx: &mut AgentContext<'_>) -> anyhow::Result<Outcome> {
        let tools = self.inner.tools();
        let calls = self.inner.select_tools(query, &tools).await?;
        if calls.is_empty() {
            debug!(query, "no tool selected");
            return Ok(Outcome::result(
                "I couldn't find a tool that matches this request.",
                Map::new(),
            ));
        }

        let mut answers = Vec::new();
        let mut data = Map::new();
        for call in calls {
            if !tools.iter().any(|tool| tool.name == call.name) {
                warn!(tool = %call.name, "selected tool is not declared");
                return Ok(Outcome::error(format!("Unknown tool: {}", call.name)));
            }
            debug!(tool = %call.name, "calling tool");
            match self.inner.call_tool(&call, ctx).await? {
                Outcome::Result(result) => {
                    answers.push(result.answer);
                    data.insert(call.name, Value::Object(result.data));
                }
                interactive => return Ok(interactive),
            }
        }
        Ok(Outcome::result(answers.join("\n"), data))
    }

    async fn on_selection(
        &self,
        selected: &[String],
        ctx: &mut AgentContext<'_>,
    ) -> anyhow::Result<Outcome> {
        self.inner.on_selection(selected, ctx).await
    }

    async fn on_execute(&self, ctx: &mut AgentContext<'_>) -> anyhow::Result<Outcome> {
        self.inner.on_execute(ctx).await
    }

    async fn on_clarification(
        &self,
        answers: &Map<String, Value>,
        ctx: &mut AgentContext<'_>,
    ) -> anyhow::Result<Outcome> {
        if let Some(outcome) = self.inner.on_clarification(answers, ctx).await? {
            return Ok(outcome);
        }
        ctx.state.context.extend(answers.clone());
        let query = ctx.state.query.clone();
        self.on_query(&query, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::AgentState;
    use crate::stream::EventStream;
    use serde_json::json;

    /// Routes on keywords: "weather" and "news" each map to a tool.
    struct Keywords;

    #[async_trait]
    impl ToolAgent for Keywords {
        fn tools(&self) -> Vec<Tool> {
            vec![
                Tool::new("weather", "Current weather"),
                Tool::new("news", "Headlines"),
                Tool::new("ask", "Needs a follow-up"),
            ]
        }

        async fn select_tools(&self, query: &str, _tools: &[Tool]) -> anyhow::Result<Vec<ToolCall>> {
            Ok(query
                .split_whitespace()
                .map(|word| ToolCall::new(word, Map::new()))
                .filter(|call| call.name != "please")
                .collect())
        }

        async fn call_tool(
            &self,
            call: &ToolCall,
            _ctx: &mut AgentContext<'_>,
        ) -> anyhow::Result<Outcome> {
            Ok(match call.name.as_str() {
                "ask" => Outcome::clarify("Which city?", None),
                name => {
                    let mut data = Map::new();
                    data.insert("source".to_string(), json!(name));
                    Outcome::result(format!("{name} ok"), data)
                }
            })
        }

        async fn on_selection(
            &self,
            _selected: &[String],
            _ctx: &mut AgentContext<'_>,
        ) -> anyhow::Result<Outcome> {
            Ok(Outcome::error("no selection step"))
        }

        async fn on_execute(&self, _ctx: &mut AgentContext<'_>) -> anyhow::Result<Outcome> {
            Ok(Outcome::result("executed", Map::new()))
        }
    }

    async fn query(text: &str) -> Outcome {
        let agent = ToolModeAgent::new(Keywords);
        let mut state = AgentState::default();
        let mut ctx = AgentContext::new(&mut state, EventStream::closed());
        agent.on_query(text, &mut ctx).await.unwrap()
    }

    #[tokio::test]
    async fn results_are_combined_in_call_order() {
        let Outcome::Result(result) = query("weather news").await else {
            panic!("expected result");
        };
        assert_eq!(result.answer, "weather ok\nnews ok");
        assert_eq!(result.data["weather"]["source"], json!("weather"));
        assert_eq!(result.data["news"]["source"], json!("news"));
    }

    #[tokio::test]
    async fn interactive_outcome_short_circuits() {
        let outcome = query("weather ask news").await;
        assert_eq!(outcome.label(), "clarification");
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let Outcome::Error(error) = query("stocks").await else {
            panic!("expected error");
        };
        assert_eq!(error.message, "Unknown tool: stocks");
    }

    #[tokio::test]
    async fn no_selection_yields_explanatory_result() {
        let Outcome::Result(result) = query("please").await else {
            panic!("expected result");
        };
        assert!(result.answer.contains("couldn't find a tool"));
        assert!(result.data.is_empty());
    }

    #[tokio::test]
    async fn clarification_falls_back_to_reselecting() {
        let agent = ToolModeAgent::new(Keywords);
        let mut state = AgentState {
            query: "news".to_string(),
            ..AgentState::default()
        };
        let mut ctx = AgentContext::new(&mut state, EventStream::closed());
        let mut answers = Map::new();
        answers.insert("q1".to_string(), json!("Seoul"));
        let outcome = agent.on_clarification(&answers, &mut ctx).await.unwrap();
        assert_eq!(outcome.label(), "result");
        assert_eq!(state.context["q1"], json!("Seoul"));
    }
}
