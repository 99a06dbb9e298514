use std::sync::Arc;

use tracing::{info, warn};

use concierge_core::collaborators::Notifier;
use concierge_core::domain::escalation::{EscalationEvent, EscalationReason};
use concierge_core::resilience::RetryPolicy;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.70;

pub const ESCALATION_ACKNOWLEDGMENT: &str = "I'm connecting you with a human agent who can better assist you.\n\n\
A team member will respond shortly during business hours (Mon-Fri 9AM-6PM EST).\n\n\
In the meantime, you can continue to send messages and I'll make sure they see your full conversation.";

pub const LOW_CONFIDENCE_NOTICE: &str = "---\n\
I've also notified a team member to review this conversation in case you need additional assistance.";

const HANDOFF_PHRASES: &[&str] = &[
    "talk to human",
    "talk to a human",
    "talk with a human",
    "speak to human",
    "speak to a human",
    "speak with a human",
    "human agent",
    "real person",
    "customer service",
    "support agent",
    "talk to someone",
    "speak to someone",
    "representative",
    "help me please",
    "need help",
    "agent please",
];

#[derive(Clone, Debug, PartialEq)]
pub enum EscalationDecision {
    Stay,
    Escalate { reason: EscalationReason, description: String },
}

impl EscalationDecision {
    pub fn should_escalate(&self) -> bool {
        matches!(self, Self::Escalate { .. })
    }

    pub fn reason(&self) -> Option<EscalationReason> {
        match self {
            Self::Stay => None,
            Self::Escalate { reason, .. } => Some(*reason),
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::Stay => "",
            Self::Escalate { description, .. } => description,
        }
    }
}

/// Case-insensitive match against the human-handoff vocabulary.
pub fn detect_escalation_request(text: &str) -> bool {
    let normalized = text.to_lowercase();
    HANDOFF_PHRASES.iter().any(|phrase| normalized.contains(phrase))
}

/// Decides when a conversation needs a person and forwards the hand-off.
#[derive(Clone)]
pub struct EscalationEngine {
    notifier: Arc<dyn Notifier>,
    policy: RetryPolicy,
    confidence_threshold: f64,
}

impl EscalationEngine {
    pub fn new(notifier: Arc<dyn Notifier>, policy: RetryPolicy) -> Self {
        Self { notifier, policy, confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD }
    }

    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn should_escalate(&self, confidence: Option<f64>, explicit: bool) -> EscalationDecision {
        if explicit {
            return EscalationDecision::Escalate {
                reason: EscalationReason::ExplicitRequest,
                description: "Customer requested human assistance".to_owned(),
            };
        }

        match confidence {
            Some(score) if score < self.confidence_threshold => EscalationDecision::Escalate {
                reason: EscalationReason::LowConfidence,
                description: format!("Low confidence score: {score:.2}"),
            },
            _ => EscalationDecision::Stay,
        }
    }

    /// Posts the hand-off. A failed notification is logged and reported as
    /// `false`; the customer reply goes out either way.
    pub async fn escalate(&self, event: &EscalationEvent) -> bool {
        let notifier = &self.notifier;
        match self.policy.call("escalation.notify", || notifier.post(event)).await {
            Ok(()) => {
                info!(
                    event_name = "escalation.notified",
                    conversation_key = %event.conversation_key,
                    reason = event.reason.as_str(),
                    "escalation forwarded to the team"
                );
                true
            }
            Err(failure) => {
                warn!(
                    event_name = "escalation.notify_failed",
                    conversation_key = %event.conversation_key,
                    reason = event.reason.as_str(),
                    error = %failure,
                    "escalation notification failed"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;

    use concierge_core::collaborators::Notifier;
    use concierge_core::domain::conversation::ConversationKey;
    use concierge_core::domain::escalation::{EscalationEvent, EscalationReason};
    use concierge_core::errors::CollaboratorError;
    use concierge_core::resilience::RetryPolicy;

    use super::{detect_escalation_request, EscalationDecision, EscalationEngine};

    struct CountingNotifier {
        calls: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for CountingNotifier {
        async fn post(&self, _event: &EscalationEvent) -> Result<(), CollaboratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(CollaboratorError::Status { status: 502, body: "bad gateway".to_owned() })
            } else {
                Ok(())
            }
        }
    }

    fn engine(fail: bool) -> (EscalationEngine, Arc<CountingNotifier>) {
        let notifier = Arc::new(CountingNotifier { calls: AtomicU32::new(0), fail });
        let policy = RetryPolicy::new(1, Duration::from_millis(100), Duration::ZERO);
        (EscalationEngine::new(notifier.clone(), policy), notifier)
    }

    fn event() -> EscalationEvent {
        EscalationEvent {
            conversation_key: ConversationKey::new("15551230000"),
            reason: EscalationReason::ExplicitRequest,
            description: "Customer requested human assistance".to_owned(),
            confidence_score: None,
            last_message: "I want to talk to a human".to_owned(),
            recent_history: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn threshold_boundary_does_not_escalate() {
        let (engine, _) = engine(false);
        assert_eq!(engine.should_escalate(Some(0.70), false), EscalationDecision::Stay);
        assert_eq!(engine.should_escalate(Some(0.70), false).description(), "");
        assert_eq!(engine.should_escalate(None, false), EscalationDecision::Stay);
    }

    #[test]
    fn low_confidence_escalates_with_description() {
        let (engine, _) = engine(false);
        let decision = engine.should_escalate(Some(0.69), false);
        assert!(decision.should_escalate());
        assert_eq!(decision.reason(), Some(EscalationReason::LowConfidence));
        assert_eq!(decision.description(), "Low confidence score: 0.69");
    }

    #[test]
    fn explicit_request_wins_over_high_confidence() {
        let (engine, _) = engine(false);
        let decision = engine.should_escalate(Some(0.95), true);
        assert_eq!(decision.reason(), Some(EscalationReason::ExplicitRequest));
        assert_eq!(decision.description(), "Customer requested human assistance");
    }

    #[test]
    fn configured_threshold_moves_the_boundary() {
        let (engine, _) = engine(false);
        let engine = engine.with_confidence_threshold(0.5);
        assert_eq!(engine.should_escalate(Some(0.65), false), EscalationDecision::Stay);
    }

    #[test]
    fn handoff_vocabulary_matches_case_insensitively() {
        assert!(detect_escalation_request("I want to talk to a HUMAN"));
        assert!(detect_escalation_request("can I get a Representative?"));
        assert!(detect_escalation_request("customer service please"));
        assert!(!detect_escalation_request("do you have this in blue?"));
    }

    #[tokio::test]
    async fn escalate_reports_success() {
        let (engine, notifier) = engine(false);
        assert!(engine.escalate(&event()).await);
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn escalate_swallows_notifier_failure_after_retry() {
        let (engine, notifier) = engine(true);
        assert!(!engine.escalate(&event()).await);
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 2);
    }
}
