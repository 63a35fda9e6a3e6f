//! End-to-end conversations over the real roster.
//!
//! Every participant shares one `ScenarioModel`, and every research tool goes
//! through one `StubGrounding`, so each test sees the full turn cycle
//! including the create/run/delete sequence for each tool call.

use std::sync::Arc;
use std::time::Duration;

use council_agents::model::Completion;
use council_agents::prompts::{news_analysis_brief, news_system_prompt, NEWS_AGENT};
use council_agents::test_support::{tool_call, ScenarioModel, ScriptedModel, StubGrounding};
use council_agents::tool::ResearchTimeouts;
use council_agents::{
    build_investment_team, AgentError, CapabilitySet, ConversationScheduler, ConversationalAgent,
    GroundedResearchTool, Participant, TerminationPredicate, ToolInvoker,
};
use council_models::config::{ConversationConfig, CouncilConfig};
use council_models::{StopReason, Verdict};
use rust_decimal_macros::dec;
use tokio_util::sync::CancellationToken;

fn team(model: Arc<ScenarioModel>, grounding: Arc<StubGrounding>) -> ConversationScheduler {
    build_investment_team(model, grounding, &CouncilConfig::default()).unwrap()
}

#[tokio::test]
async fn aapl_without_decision_runs_to_message_limit() {
    let model = Arc::new(ScenarioModel::undecided());
    let grounding = Arc::new(StubGrounding::answering("AAPL closed at 227.50, up 6% in 3 months."));
    let outcome = team(model, grounding.clone())
        .run("AAPL", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.transcript.len(), 15);
    assert_eq!(outcome.turns, 14);
    assert_eq!(outcome.stop_reason, StopReason::MessageLimit);
    assert!(outcome.verdict().is_none());

    let senders: Vec<&str> = outcome
        .transcript
        .iter()
        .map(|m| m.sender.as_str())
        .collect();
    assert_eq!(senders[0], "user");
    assert_eq!(senders[1], "stock_trends_agent");
    assert_eq!(senders[14], "news_agent");
    let cycle = ["stock_trends_agent", "news_agent", "sentiment_agent", "decision_agent"];
    for (i, sender) in senders.iter().enumerate().skip(1) {
        assert_eq!(*sender, cycle[(i - 1) % 4], "message {i}");
    }

    // 4 trends turns, 4 news turns, 3 sentiment turns with three tools each.
    assert_eq!(grounding.created_agents(), 17);
    assert_eq!(grounding.deleted_agents().len(), 17);
}

#[tokio::test]
async fn tsla_decision_on_third_turn_stops_at_thirteen() {
    let model = Arc::new(ScenarioModel::deciding_on_turn(3));
    let grounding = Arc::new(StubGrounding::answering("TSLA deliveries beat estimates."));
    let outcome = team(model, grounding)
        .run("TSLA", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.transcript.len(), 13);
    assert_eq!(outcome.stop_reason, StopReason::MarkerFound);

    let last = outcome.transcript.last().unwrap();
    assert_eq!(last.sender, "decision_agent");
    assert!(last.content.ends_with("Decision Made"));

    let verdict = outcome.verdict().unwrap();
    assert_eq!(verdict.verdict, Verdict::Invest);
    assert_eq!(verdict.current_price, Some(dec!(250.10)));
}

#[tokio::test]
async fn marker_alone_still_terminates() {
    let model = Arc::new(ScenarioModel::deciding_on_turn(3).marker_only());
    let outcome = team(model, Arc::new(StubGrounding::answering("ok")))
        .run("TSLA", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.transcript.len(), 13);
    assert_eq!(outcome.stop_reason, StopReason::MarkerFound);
    assert!(outcome.verdict().is_none());
}

#[tokio::test]
async fn structured_verdict_terminates_without_marker_predicate() {
    let config = CouncilConfig {
        conversation: ConversationConfig {
            termination_marker: String::new(),
            ..ConversationConfig::default()
        },
        ..CouncilConfig::default()
    };
    let scheduler = build_investment_team(
        Arc::new(ScenarioModel::deciding_on_turn(1)),
        Arc::new(StubGrounding::answering("ok")),
        &config,
    )
    .unwrap();
    let outcome = scheduler
        .run("NVDA", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.transcript.len(), 5);
    assert_eq!(outcome.stop_reason, StopReason::VerdictReached);
}

#[tokio::test]
async fn marker_in_task_stops_before_any_turn() {
    let model = Arc::new(ScenarioModel::undecided());
    let outcome = team(model.clone(), Arc::new(StubGrounding::answering("ok")))
        .run("AAPL. Decision Made already?", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.transcript.len(), 1);
    assert_eq!(outcome.turns, 0);
    assert_eq!(outcome.stop_reason, StopReason::MarkerFound);
    assert!(model.requests().await.is_empty());
}

#[tokio::test]
async fn analysts_receive_tool_output() {
    let model = Arc::new(ScenarioModel::deciding_on_turn(1));
    let grounding = Arc::new(StubGrounding::answering("MSFT up 3% on cloud growth."));
    team(model.clone(), grounding)
        .run("MSFT", &CancellationToken::new())
        .await
        .unwrap();

    let requests = model.requests().await;
    // Trends: tool request + reflection.
    assert_eq!(requests[0].tools.len(), 1);
    assert_eq!(requests[0].tools[0].name, "stock_price_trends");
    let reflection = format!("{:?}", requests[1].messages.last());
    assert!(reflection.contains("MSFT up 3% on cloud growth."));
}

#[tokio::test]
async fn failing_research_aborts_and_releases_agent() {
    let grounding = Arc::new(StubGrounding::answering("unused").with_run_status("failed"));
    let scheduler = team(Arc::new(ScenarioModel::undecided()), grounding.clone());

    for _ in 0..2 {
        let err = scheduler
            .run("AAPL", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_tool_failure());
        assert!(matches!(err, AgentError::Tool { ref tool, .. } if tool == "stock_price_trends"));
    }
    assert_eq!(grounding.created_agents(), 2);
    assert_eq!(grounding.deleted_agents().len(), 2);
}

#[tokio::test]
async fn concurrent_sessions_share_backends() {
    let model = Arc::new(ScenarioModel::undecided());
    let grounding = Arc::new(StubGrounding::answering("ok"));
    let scheduler = Arc::new(team(model, grounding.clone()));

    let a = {
        let s = Arc::clone(&scheduler);
        tokio::spawn(async move { s.run("AAPL", &CancellationToken::new()).await })
    };
    let b = {
        let s = Arc::clone(&scheduler);
        tokio::spawn(async move { s.run("AMZN", &CancellationToken::new()).await })
    };
    let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());

    assert_ne!(a.session_id, b.session_id);
    assert_eq!(a.transcript.len(), 15);
    assert_eq!(b.transcript.len(), 15);
    assert_eq!(grounding.created_agents(), 34);
}

fn slow_researcher(grounding: Arc<StubGrounding>, turn_timeout: Duration) -> ConversationScheduler {
    let model = Arc::new(ScriptedModel::new(vec![Ok(Completion::ToolCalls(vec![
        tool_call("call_1", "news_analysis", "AAPL"),
    ]))]));
    let tool = Arc::new(GroundedResearchTool::new(
        news_analysis_brief(),
        "gpt-4o",
        grounding,
        ResearchTimeouts::default(),
    )) as Arc<dyn ToolInvoker>;
    let news = Participant::new(NEWS_AGENT, news_system_prompt(), model)
        .with_capabilities(CapabilitySet::new(vec![tool]).unwrap());
    ConversationScheduler::new(
        vec![Arc::new(news) as Arc<dyn ConversationalAgent>],
        TerminationPredicate::MessageCountAtLeast(15),
        turn_timeout,
    )
    .unwrap()
}

#[tokio::test]
async fn turn_deadline_mid_research_still_deletes_agent() {
    let grounding =
        Arc::new(StubGrounding::answering("late").with_run_delay(Duration::from_secs(30)));
    let scheduler = slow_researcher(grounding.clone(), Duration::from_millis(50));

    let err = scheduler
        .run("AAPL", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::Timeout { .. }));
    assert!(err.to_string().contains("50ms"));

    grounding
        .wait_for_deletions(1, Duration::from_secs(2))
        .await;
    assert_eq!(grounding.created_agents(), 1);
    assert_eq!(grounding.deleted_agents(), vec!["agent_1".to_string()]);
}

#[tokio::test]
async fn cancel_mid_research_still_deletes_agent() {
    let grounding =
        Arc::new(StubGrounding::answering("late").with_run_delay(Duration::from_secs(30)));
    let scheduler = slow_researcher(grounding.clone(), Duration::from_secs(60));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = scheduler.run("AAPL", &cancel).await.unwrap_err();
    assert!(matches!(err, AgentError::Cancelled));

    grounding
        .wait_for_deletions(1, Duration::from_secs(2))
        .await;
    assert_eq!(grounding.created_agents(), 1);
    assert_eq!(grounding.deleted_agents(), vec!["agent_1".to_string()]);
}
