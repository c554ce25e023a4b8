//! Prompt templates for the board-game capabilities
//!
//! The capability set is fixed, so each template is a pure function from a
//! typed variable bundle plus conversation history to the final message
//! sequence (hosted backend) or flat prompt string (local backend).

use std::sync::OnceLock;

use regex::Regex;

use crate::llm::ChatMessage;

/// The enumerated prompt templates, one per capability plus the full-rules
/// fallback used when chunk retrieval misses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Recommendation,
    RuleQuestion,
    RuleQuestionFullRules,
    RuleSummary,
}

pub struct RecommendationVars<'a> {
    pub query: &'a str,
    pub context: &'a str,
}

pub struct RuleQuestionVars<'a> {
    pub game_name: &'a str,
    pub question: &'a str,
    pub context: &'a str,
}

pub struct FullRulesVars<'a> {
    pub game_name: &'a str,
    pub question: &'a str,
    pub rule_text: &'a str,
}

pub struct RuleSummaryVars<'a> {
    pub game_name: &'a str,
    pub rule_text: &'a str,
}

fn compose(system: String, history: &[ChatMessage], human: String) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system));
    messages.extend_from_slice(history);
    messages.push(ChatMessage::user(human));
    messages
}

/// Game recommendation prompt: retrieved corpus entries as context, the
/// answer constrained to that list.
#[must_use]
pub fn recommendation_messages(
    vars: &RecommendationVars<'_>,
    history: &[ChatMessage],
) -> Vec<ChatMessage> {
    let system = format!(
        "You are a board-game recommendation assistant. These are the games you may recommend:\n\n\
         {}\n\n\
         Recommend only from this list. Never invent a game that is not listed.\n\
         Pick the games that fit the request and answer in the form:\n\
         game name: reason",
        vars.context
    );
    compose(system, history, vars.query.to_string())
}

/// Rule question prompt over retrieved rule chunks
#[must_use]
pub fn rule_question_messages(
    vars: &RuleQuestionVars<'_>,
    history: &[ChatMessage],
) -> Vec<ChatMessage> {
    let system = format!(
        "You are an expert on the rules of the board game '{}'. You must follow these rules:\n\
         - Use the conversation history to understand context (e.g. a role the user mentioned earlier).\n\
         - Answer only from the rule excerpts provided below. Never invent rules that are not there.\n\
         - For strategy questions, base the strategy on the rulebook.\n\
         - Keep answers consistent with the conversation so far.",
        vars.game_name
    );
    let human = format!(
        "Here are excerpts from the rules of '{}':\n\n{}\n\n\
         Based on these rules, answer the following question precisely:\n\nQuestion: {}",
        vars.game_name, vars.context, vars.question
    );
    compose(system, history, human)
}

/// Fallback prompt when chunk retrieval misses: the full rule text stands in
/// as context for the same question.
#[must_use]
pub fn full_rules_messages(vars: &FullRulesVars<'_>, history: &[ChatMessage]) -> Vec<ChatMessage> {
    let system = rules_system_text();
    let human = format!(
        "Here is the complete rule text of the board game '{}':\n\n{}\n\n\
         Based on these rules, answer the following question precisely:\n\nQuestion: {}",
        vars.game_name, vars.rule_text, vars.question
    );
    compose(system, history, human)
}

/// Rule summary prompt over the full rule text
#[must_use]
pub fn rule_summary_messages(
    vars: &RuleSummaryVars<'_>,
    history: &[ChatMessage],
) -> Vec<ChatMessage> {
    let system = rules_system_text();
    let human = format!(
        "Game name: {}\n\nFull rules:\n{}\n\nExplain the rules of this game.",
        vars.game_name, vars.rule_text
    );
    compose(system, history, human)
}

fn rules_system_text() -> String {
    "You are an expert on board-game rules. You must follow these rules:\n\
     - Answer only from the rule text provided below. Never invent rules that are not there.\n\
     - Do not guess or fabricate names, places, durations or player counts.\n\
     - For strategy questions, base the strategy on the rulebook."
        .to_string()
}

// Role markers used by the locally served fine-tuned model
pub const SYSTEM_MARKER: &str = "[|system|]";
pub const USER_MARKER: &str = "[|user|]";
pub const ASSISTANT_MARKER: &str = "[|assistant|]";

/// Flat prompt grammar for the local backend: explicit role markers in a
/// single string, no structured message list.
#[must_use]
pub fn flat_prompt(system: &str, question: &str) -> String {
    format!("{SYSTEM_MARKER}{system}\n{USER_MARKER}{question}\n{ASSISTANT_MARKER}")
}

/// System text for the local backend with retrieved context inlined
#[must_use]
pub fn local_context_system(context: &str) -> String {
    format!(
        "You are an expert on board-game rules. You must follow these rules:\n\
         - Answer only from the rule excerpts below. Never invent rules that are not there.\n\
         - For strategy questions, base the strategy on the rulebook.\n\n\
         Relevant rule excerpts:\n{context}\n\n\
         Answer precisely based on the rules above."
    )
}

/// System text for the local backend carrying the full rule text
#[must_use]
pub fn local_full_rules_system(game_name: &str, rule_text: &str) -> String {
    format!(
        "You are an expert on board-game rules. You must follow these rules:\n\
         - Answer only from the full rule text below. Never invent rules that are not there.\n\
         - Do not guess or fabricate names, places, durations or player counts.\n\n\
         Here is the complete rule text of the board game '{game_name}':\n\n{rule_text}\n\n\
         Answer precisely based on the rules above."
    )
}

/// Parse an explicit "N개" (N items) count out of a recommendation query.
/// First match wins; no bound is enforced beyond what the index tolerates.
#[must_use]
pub fn parse_requested_count(query: &str) -> Option<usize> {
    static COUNT_RE: OnceLock<Regex> = OnceLock::new();
    let re = COUNT_RE.get_or_init(|| Regex::new(r"(\d+)\s*개").expect("valid count pattern"));
    re.captures(query)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
