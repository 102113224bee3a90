//! End-to-end workflow scenarios driven through the public context API.
//!
//! Each test plays both sides: the agent calls workflow operations and the
//! "client" answers through the matching `set_*` call, reading the ids from
//! the emitted events exactly like a remote orchestrator would.

use planflow::core::phases::Phase;
use planflow::core::types::{PlanProposed, PlanStep, Question, QuestionOption, SearchPlanPreview};
use planflow::stream::{EventStream, SseEvent};
use planflow::test_support::{answers, items};
use planflow::workflow::{ClarificationRequest, SelectionRequest, WorkflowContext};
use serde_json::{Map, json};

fn kinds(events: &[SseEvent]) -> Vec<&str> {
    events.iter().map(|e| e.event.as_str()).collect()
}

/// Full interactive path:
/// ```text
/// idle -> clarification -> discovery -> selection -> preview -> executing -> completed
/// ```
#[test]
fn full_interactive_workflow() {
    let stream = EventStream::new();
    let mut ctx = WorkflowContext::new(stream.clone()).with_agent_id("reddit-agent");

    let clarification_id = ctx.request_clarification(ClarificationRequest::new(vec![
        Question::single_choice(
            "topic",
            "Which topic?",
            vec![
                QuestionOption::new("gaming", "Gaming"),
                QuestionOption::new("tech", "Tech"),
            ],
        ),
    ]));
    ctx.set_clarification_response(answers(&[("topic", "gaming")]), Some(clarification_id.as_str()));

    ctx.emit_discovery(items(&["r/gaming", "r/pcgaming", "r/games"]), "subreddits", None);
    let selection_id = ctx.request_selection(SelectionRequest::default().with_bounds(1, Some(2)));
    ctx.set_selection_response(
        vec!["r/gaming".to_string(), "r/games".to_string()],
        Some(selection_id.as_str()),
    );

    let mut preview = SearchPlanPreview::new("gaming news");
    preview.subreddits = ctx.selected_ids().to_vec();
    preview.user_answers = ctx.user_answers().clone();
    let plan_id = ctx.emit_preview(preview);
    ctx.set_plan_approval(true, Some(plan_id.as_str()), None);

    ctx.start_execution(None);
    let mut result = Map::new();
    result.insert("posts".to_string(), json!(42));
    ctx.complete(result, Some("Found 42 posts"));

    assert_eq!(ctx.phase(), Phase::Completed);
    assert!(ctx.pending_ids().is_empty());
    let selected: Vec<String> = ctx.get_selected_items().into_iter().map(|i| i.id).collect();
    assert_eq!(selected, ["r/gaming", "r/games"]);

    let events = stream.drain_buffered();
    assert_eq!(
        kinds(&events),
        [
            "clarification_needed",
            "discovery_result",
            "selection_required",
            "preview_ready",
            "status-update",
            "message",
        ]
    );

    // Sequence ids are strictly increasing in emission order.
    let ids: Vec<u64> = events
        .iter()
        .map(|e| e.id.as_deref().unwrap().parse().unwrap())
        .collect();
    assert!(ids.windows(2).all(|w| w[0] < w[1]));

    assert_eq!(events[0].data["clarificationId"], json!(clarification_id));
    assert_eq!(events[0].data["state"], json!("input-required"));
    assert_eq!(events[2].data["selectionId"], json!(selection_id));
    assert_eq!(events[2].data["maxSelect"], json!(2));
    assert_eq!(events[2].data["items"].as_array().unwrap().len(), 3);
    assert_eq!(events[3].data["planId"], json!(plan_id));
    assert_eq!(events[3].data["agentId"], json!("reddit-agent"));
    assert_eq!(events[3].data["subreddits"], json!(["r/gaming", "r/games"]));
    assert_eq!(events[5].data["final"], json!(true));
    assert_eq!(events[5].data["state"], json!("completed"));
    assert_eq!(events[5].data["message"]["parts"][1]["data"]["posts"], json!(42));
}

/// Rejecting a plan and asking again is a legal rollback, and the first
/// answers survive it.
#[test]
fn rejected_plan_rolls_back_to_clarification() {
    let stream = EventStream::new();
    let mut ctx = WorkflowContext::new(stream.clone());

    let first = ctx.request_clarification(ClarificationRequest::new(vec![Question::free_text(
        "topic", "Topic?",
    )]));
    ctx.set_clarification_response(answers(&[("topic", "gaming")]), Some(first.as_str()));

    let plan_id = ctx.emit_preview(PlanProposed::new(
        "Search",
        vec![PlanStep::new("s1", "Search subreddits")],
    ));
    let mut modifications = Map::new();
    modifications.insert("note".to_string(), json!("too broad"));
    ctx.set_plan_approval(false, Some(plan_id.as_str()), Some(modifications));
    assert_eq!(ctx.pending_plan_id(), None);

    let second = ctx.request_clarification(ClarificationRequest::new(vec![Question::free_text(
        "scope", "Narrow it down?",
    )]));
    assert_eq!(ctx.phase(), Phase::Clarification);
    assert_ne!(first, second);
    ctx.set_clarification_response(answers(&[("scope", "indie")]), Some(second.as_str()));

    assert_eq!(ctx.user_answers()["topic"], json!("gaming"));
    assert_eq!(ctx.user_answers()["note"], json!("too broad"));
    assert_eq!(ctx.user_answers()["scope"], json!("indie"));
    assert_eq!(
        kinds(&stream.drain_buffered()),
        ["clarification_needed", "preview_ready", "clarification_needed"]
    );
}

/// Illegal and undeclared transitions are reported but never block.
#[test]
fn invalid_transitions_proceed() {
    let stream = EventStream::new();
    let mut ctx =
        WorkflowContext::new(stream.clone()).with_supported_phases([Phase::Discovery]);

    assert!(!ctx.transition_to(Phase::Preview));
    assert_eq!(ctx.phase(), Phase::Preview);

    // Undeclared clarification still emits its event.
    ctx.reset();
    ctx.request_clarification(ClarificationRequest::new(vec![Question::free_text("q", "Q?")]));
    assert_eq!(ctx.phase(), Phase::Clarification);
    assert_eq!(kinds(&stream.drain_buffered()), ["clarification_needed"]);

    // Always-permitted phases are legal whenever the table allows them.
    assert!(ctx.transition_to(Phase::Executing));
    assert!(ctx.transition_to(Phase::Completed));
}

/// Answers accumulate across rounds; later keys overwrite earlier ones.
#[test]
fn answers_accumulate_across_rounds() {
    let mut ctx = WorkflowContext::new(EventStream::closed());
    for (key, value) in [("a", "1"), ("b", "2"), ("a", "3")] {
        let id = ctx.request_clarification(ClarificationRequest::new(vec![Question::free_text(
            key, "?",
        )]));
        ctx.set_clarification_response(answers(&[(key, value)]), Some(id.as_str()));
    }
    assert_eq!(ctx.user_answers().len(), 2);
    assert_eq!(ctx.user_answers()["a"], json!("3"));
    assert_eq!(ctx.user_answers()["b"], json!("2"));
}

/// Emissions after the channel closes are dropped without failing the
/// workflow.
#[test]
fn emissions_after_close_are_dropped() {
    let stream = EventStream::new();
    let mut ctx = WorkflowContext::new(stream.clone());
    ctx.emit_discovery(items(&["a"]), "items", None);
    stream.close();
    ctx.request_selection(SelectionRequest::default());
    ctx.error("late", "nobody listens", true, Map::new());

    assert_eq!(ctx.phase(), Phase::Error);
    assert_eq!(kinds(&stream.drain_buffered()), ["discovery_result"]);
}
