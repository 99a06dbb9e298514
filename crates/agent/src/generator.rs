use std::sync::Arc;

use tracing::debug;

use concierge_core::domain::conversation::ConversationTurn;
use concierge_core::domain::knowledge::GenerationResult;
use concierge_core::errors::ExternalCallFailed;
use concierge_core::resilience::RetryPolicy;

use crate::language::DEFAULT_LANGUAGE;
use crate::llm::{ChatMessage, LlmClient};

pub const SYSTEM_PROMPT: &str = "You are a helpful AI assistant for a fashion import business. \
You help customers find clothing items, answer questions about products, sizes, shipping, and returns.

Guidelines:
- Be friendly and professional
- Focus only on fashion/clothing related questions
- Provide accurate information based on the context provided
- If you don't have specific information, say so honestly
- Keep responses concise and helpful
- Respond in the same language as the customer's message

Available size formats: XS, S, M, L, XL, XXL and numeric sizes (2-16 US, 34-48 EU)";

const CONFIDENCE_WITH_CONTEXT: f64 = 0.85;
const CONFIDENCE_WITHOUT_CONTEXT: f64 = 0.65;
const HEDGE_PENALTY: f64 = 0.20;
const HEDGING_PHRASES: &[&str] =
    &["i'm not sure", "i don't know", "i cannot", "unfortunately", "i apologize"];

/// Produces the answer for general questions with one completion call.
#[derive(Clone)]
pub struct ResponseGenerator {
    llm: Arc<dyn LlmClient>,
    policy: RetryPolicy,
}

impl ResponseGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, policy: RetryPolicy) -> Self {
        Self { llm, policy }
    }

    pub async fn generate(
        &self,
        message: &str,
        context: &str,
        history: &[ConversationTurn],
        language: &str,
    ) -> Result<GenerationResult, ExternalCallFailed> {
        let messages = build_prompt(message, context, history, language);
        let llm = &self.llm;
        let response_text = self.policy.call("llm.complete", || llm.complete(&messages)).await?;

        let confidence_score = confidence_score(&response_text, !context.trim().is_empty());
        debug!(
            event_name = "generation.completed",
            prompt_messages = messages.len(),
            confidence_score,
            "response generated"
        );

        Ok(GenerationResult { response_text, confidence_score })
    }
}

/// System instruction, optional knowledge context, prior turns oldest first,
/// then the new customer message.
pub fn build_prompt(
    message: &str,
    context: &str,
    history: &[ConversationTurn],
    language: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 3);

    if language == DEFAULT_LANGUAGE {
        messages.push(ChatMessage::system(SYSTEM_PROMPT));
    } else {
        messages.push(ChatMessage::system(format!(
            "{SYSTEM_PROMPT}\n\nRespond in the language with ISO code `{language}`."
        )));
    }

    if !context.trim().is_empty() {
        messages.push(ChatMessage::system(format!("Relevant information:\n{context}")));
    }

    messages.extend(history.iter().map(ChatMessage::from));
    messages.push(ChatMessage::user(message));
    messages
}

/// Heuristic score in `[0, 1]`, rounded to two decimals.
pub fn confidence_score(response_text: &str, has_context: bool) -> f64 {
    let mut score =
        if has_context { CONFIDENCE_WITH_CONTEXT } else { CONFIDENCE_WITHOUT_CONTEXT };

    let normalized = response_text.to_lowercase();
    if HEDGING_PHRASES.iter().any(|phrase| normalized.contains(phrase)) {
        score -= HEDGE_PENALTY;
    }

    (score.clamp(0.0, 1.0) * 100.0).round() / 100.0
}
