use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::conversation::ConversationKey;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    Interactive,
    Image,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Interactive => "interactive",
            Self::Image => "image",
        }
    }
}

/// One row of the conversation analytics log, written once per completed turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsRecord {
    pub record_id: String,
    pub conversation_key: ConversationKey,
    pub message_type: MessageType,
    pub direction: String,
    pub content: Option<String>,
    pub intent: String,
    pub confidence_score: Option<f64>,
    pub response_time_ms: u64,
    pub escalated: bool,
    pub metadata: BTreeMap<String, String>,
    pub recorded_at: DateTime<Utc>,
}

impl AnalyticsRecord {
    pub fn inbound(
        conversation_key: ConversationKey,
        message_type: MessageType,
        intent: impl Into<String>,
    ) -> Self {
        Self {
            record_id: Uuid::new_v4().to_string(),
            conversation_key,
            message_type,
            direction: "inbound".to_owned(),
            content: None,
            intent: intent.into(),
            confidence_score: None,
            response_time_ms: 0,
            escalated: false,
            metadata: BTreeMap::new(),
            recorded_at: Utc::now(),
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
