use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use concierge_core::collaborators::SessionCache;
use concierge_core::domain::conversation::{ConversationKey, ConversationTurn};
use concierge_core::errors::{CallFailure, CollaboratorError, ExternalCallFailed};
use concierge_core::resilience::RetryPolicy;

pub const DEFAULT_MAX_TURNS: usize = 10;
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Bounded, expiring window of recent turns per conversation.
///
/// Reads degrade to an empty window and writes are best-effort: the turn
/// pipeline never fails because the session store did.
#[derive(Clone)]
pub struct SessionContextStore {
    cache: Arc<dyn SessionCache>,
    policy: RetryPolicy,
    max_turns: usize,
    ttl: Duration,
}

impl SessionContextStore {
    pub fn new(cache: Arc<dyn SessionCache>, policy: RetryPolicy) -> Self {
        Self { cache, policy, max_turns: DEFAULT_MAX_TURNS, ttl: DEFAULT_SESSION_TTL }
    }

    pub fn with_limits(mut self, max_turns: usize, ttl: Duration) -> Self {
        self.max_turns = max_turns.max(1);
        self.ttl = ttl;
        self
    }

    pub async fn get_window(&self, key: &ConversationKey) -> Vec<ConversationTurn> {
        let cache_key = cache_key(key);
        let cache = &self.cache;
        let max_turns = self.max_turns;
        let values = match self
            .policy
            .call("session.range", || cache.range_last(&cache_key, max_turns))
            .await
        {
            Ok(values) => values,
            Err(failure) => {
                warn!(
                    event_name = "session.read_failed",
                    conversation_key = %key,
                    error = %failure,
                    "session window unavailable, continuing without history"
                );
                return Vec::new();
            }
        };

        values
            .iter()
            .filter_map(|value| match serde_json::from_str::<ConversationTurn>(value) {
                Ok(turn) => Some(turn),
                Err(error) => {
                    warn!(
                        event_name = "session.entry_undecodable",
                        conversation_key = %key,
                        error = %error,
                        "skipping undecodable session entry"
                    );
                    None
                }
            })
            .collect()
    }

    pub async fn append_turn(&self, key: &ConversationKey, turn: &ConversationTurn) {
        if let Err(failure) = self.try_append(key, turn).await {
            warn!(
                event_name = "session.append_failed",
                conversation_key = %key,
                role = turn.role.as_str(),
                error = %failure,
                "session turn was not stored"
            );
        }
    }

    /// Deletes the window. Returns whether the store call succeeded; a missing
    /// window counts as success.
    pub async fn clear_window(&self, key: &ConversationKey) -> bool {
        let cache_key = cache_key(key);
        let cache = &self.cache;
        match self.policy.call("session.delete", || cache.delete(&cache_key)).await {
            Ok(()) => true,
            Err(failure) => {
                warn!(
                    event_name = "session.clear_failed",
                    conversation_key = %key,
                    error = %failure,
                    "session window could not be cleared"
                );
                false
            }
        }
    }

    async fn try_append(
        &self,
        key: &ConversationKey,
        turn: &ConversationTurn,
    ) -> Result<(), ExternalCallFailed> {
        let cache_key = cache_key(key);
        let value = serde_json::to_string(turn).map_err(|error| ExternalCallFailed {
            operation: "session.push",
            attempts: 0,
            cause: CallFailure::Collaborator(CollaboratorError::Decode(error.to_string())),
        })?;
        let cache = &self.cache;
        let max_turns = self.max_turns;
        let ttl = self.ttl;

        self.policy.call("session.push", || cache.push(&cache_key, value.clone())).await?;
        self.policy.call("session.trim", || cache.trim_to_last(&cache_key, max_turns)).await?;
        self.policy.call("session.expire", || cache.expire(&cache_key, ttl)).await?;
        Ok(())
    }
}

fn cache_key(key: &ConversationKey) -> String {
    format!("session:{key}")
}
