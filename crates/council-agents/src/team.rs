use std::sync::Arc;
use std::time::Duration;

use council_models::config::{ConversationConfig, CouncilConfig};

use crate::capability::CapabilitySet;
use crate::error::AgentError;
use crate::grounding::GroundingBackend;
use crate::model::ModelBackend;
use crate::participant::{ConversationalAgent, Participant, TurnSettings};
use crate::prompts::{self, DECISION_AGENT, NEWS_AGENT, SENTIMENT_AGENT, STOCK_TRENDS_AGENT};
use crate::scheduler::ConversationScheduler;
use crate::termination::TerminationPredicate;
use crate::tool::{GroundedResearchTool, ResearchBrief, ResearchTimeouts, ToolInvoker};

/// Stop condition built from the conversation settings.
pub fn termination_for(config: &ConversationConfig) -> TerminationPredicate {
    let mut predicate = TerminationPredicate::MessageCountAtLeast(config.max_messages);
    if !config.termination_marker.is_empty() {
        predicate = predicate
            | TerminationPredicate::ContentContains(config.termination_marker.clone());
    }
    if config.stop_on_verdict {
        predicate = predicate | TerminationPredicate::VerdictReached;
    }
    predicate
}

/// Assemble the four-member investment roster over shared backends.
///
/// Order is fixed: stock trends, news, sentiment, decision.
pub fn build_investment_team(
    model: Arc<dyn ModelBackend>,
    grounding: Arc<dyn GroundingBackend>,
    config: &CouncilConfig,
) -> Result<ConversationScheduler, AgentError> {
    let timeouts = ResearchTimeouts {
        research: Duration::from_secs(config.grounding.tool_timeout_seconds),
        cleanup: Duration::from_secs(config.grounding.cleanup_timeout_seconds),
    };
    let research = |briefs: Vec<ResearchBrief>| -> Result<CapabilitySet, AgentError> {
        let tools = briefs
            .into_iter()
            .map(|brief| {
                Arc::new(GroundedResearchTool::new(
                    brief,
                    config.grounding.agent_model.clone(),
                    Arc::clone(&grounding),
                    timeouts,
                )) as Arc<dyn ToolInvoker>
            })
            .collect();
        CapabilitySet::new(tools)
    };

    let settings = TurnSettings {
        max_tool_rounds: config.model.max_tool_rounds,
        reflect_on_tool_use: config.conversation.reflect_on_tool_use,
        emits_verdict: false,
    };

    let roster = vec![
        (
            STOCK_TRENDS_AGENT,
            research(vec![prompts::stock_price_trends_brief()])?,
            settings,
        ),
        (
            NEWS_AGENT,
            research(vec![prompts::news_analysis_brief()])?,
            settings,
        ),
        (
            SENTIMENT_AGENT,
            research(vec![
                prompts::market_sentiment_brief(),
                prompts::analyst_reports_brief(),
                prompts::expert_opinions_brief(),
            ])?,
            settings,
        ),
        (
            DECISION_AGENT,
            CapabilitySet::empty(),
            TurnSettings {
                emits_verdict: true,
                ..settings
            },
        ),
    ];

    let mut participants: Vec<Arc<dyn ConversationalAgent>> = Vec::with_capacity(roster.len());
    for (name, capabilities, settings) in roster {
        let instructions = prompts::get_participant_prompt(name).ok_or_else(|| {
            AgentError::Configuration(format!("No system prompt for participant: {name}"))
        })?;
        participants.push(Arc::new(
            Participant::new(name, instructions, Arc::clone(&model))
                .with_capabilities(capabilities)
                .with_settings(settings),
        ));
    }

    ConversationScheduler::new(
        participants,
        termination_for(&config.conversation),
        Duration::from_secs(config.conversation.turn_timeout_seconds),
    )
}
