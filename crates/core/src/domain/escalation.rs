use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::conversation::{ConversationKey, ConversationTurn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    ExplicitRequest,
    LowConfidence,
}

impl EscalationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExplicitRequest => "explicit_request",
            Self::LowConfidence => "low_confidence",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EscalationEvent {
    pub conversation_key: ConversationKey,
    pub reason: EscalationReason,
    pub description: String,
    pub confidence_score: Option<f64>,
    pub last_message: String,
    pub recent_history: Vec<ConversationTurn>,
    pub timestamp: DateTime<Utc>,
}
