use crate::tool::ResearchBrief;

pub const STOCK_TRENDS_AGENT: &str = "stock_trends_agent";
pub const NEWS_AGENT: &str = "news_agent";
pub const SENTIMENT_AGENT: &str = "sentiment_agent";
pub const DECISION_AGENT: &str = "decision_agent";

/// Literal the decision participant ends its final answer with.
pub const DECISION_MARKER: &str = "Decision Made";

/// Example verdict block shown to the decision participant.
fn verdict_schema() -> String {
    let example = serde_json::json!({
        "verdict": "invest | do_not_invest",
        "current_price": "182.52",
        "rationale": "<one or two sentences>"
    });
    serde_json::to_string_pretty(&example).unwrap_or_default()
}

pub fn stock_trends_system_prompt() -> String {
    "You are the Stock Price Trends Agent. \
     You fetch and summarize stock prices, changes over the last few months, and general market trends. \
     Do NOT provide any final investment decision."
        .to_string()
}

pub fn news_system_prompt() -> String {
    "You are the News Agent. \
     You retrieve and summarize the latest news stories related to the given stock. \
     Do NOT provide any final investment decision."
        .to_string()
}

pub fn sentiment_system_prompt() -> String {
    "You are the Market Sentiment Agent. \
     You gather overall market sentiment, relevant analyst reports, and expert opinions. \
     Do NOT provide any final investment decision."
        .to_string()
}

pub fn decision_system_prompt() -> String {
    format!(
        "You are the Decision Agent. After reviewing the stock data, news, sentiment, analyst \
         reports, and expert opinions from the other agents, you provide the final investment \
         decision. Make a clear call to either invest or not invest, and state the current \
         stock price.\n\n\
         After your explanation, include a fenced JSON block with your decision:\n\
         ```json\n{}\n```\n\n\
         End your response with '{DECISION_MARKER}' once you finalize the decision.",
        verdict_schema()
    )
}

/// Instructions for a roster member, by participant name.
pub fn get_participant_prompt(name: &str) -> Option<String> {
    match name {
        STOCK_TRENDS_AGENT => Some(stock_trends_system_prompt()),
        NEWS_AGENT => Some(news_system_prompt()),
        SENTIMENT_AGENT => Some(sentiment_system_prompt()),
        DECISION_AGENT => Some(decision_system_prompt()),
        _ => None,
    }
}

fn brief(name: &str, description: &str, agent_instructions: &str, query: &str) -> ResearchBrief {
    ResearchBrief {
        name: name.to_string(),
        description: description.to_string(),
        agent_instructions: agent_instructions.to_string(),
        query: query.to_string(),
    }
}

pub fn stock_price_trends_brief() -> ResearchBrief {
    brief(
        "stock_price_trends",
        "Real-time stock price, changes over the last few months, and market trends for a stock.",
        "Focus on retrieving real-time stock prices, changes over the last few months, \
         and summarize market trends for {subject}.",
        "Please get stock price trends data for {subject}.",
    )
}

pub fn news_analysis_brief() -> ResearchBrief {
    brief(
        "news_analysis",
        "Latest news highlights for a stock.",
        "Focus on the latest news highlights for the stock {subject}.",
        "Retrieve the latest news articles and summaries about {subject}.",
    )
}

pub fn market_sentiment_brief() -> ResearchBrief {
    brief(
        "market_sentiment",
        "General market sentiment and user opinions about a stock.",
        "Focus on analyzing general market sentiment regarding {subject}.",
        "Gather market sentiment, user opinions, and overall feeling about {subject}.",
    )
}

pub fn analyst_reports_brief() -> ResearchBrief {
    brief(
        "analyst_reports",
        "Analyst reports, price targets, and professional analyses of a stock.",
        "Focus on any relevant analyst reports or professional analyses about {subject}.",
        "Find recent analyst reports, price targets, or professional opinions on {subject}.",
    )
}

pub fn expert_opinions_brief() -> ResearchBrief {
    brief(
        "expert_opinions",
        "Opinions of industry experts and thought leaders on a stock.",
        "Focus on industry expert or thought leader opinions regarding {subject}.",
        "Collect expert opinions or quotes about {subject}.",
    )
}
