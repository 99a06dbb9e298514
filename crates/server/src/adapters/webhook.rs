use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};

use concierge_core::collaborators::Notifier;
use concierge_core::config::EscalationConfig;
use concierge_core::domain::escalation::EscalationEvent;
use concierge_core::errors::CollaboratorError;

use super::{ensure_success, transport_error};

pub const SECRET_HEADER: &str = "X-Webhook-Secret";

/// Posts escalation events as JSON to the team's automation webhook.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: Option<String>,
    secret: Option<SecretString>,
}

impl WebhookNotifier {
    pub fn from_config(config: &EscalationConfig, client: Client) -> Self {
        Self { client, url: config.webhook_url.clone(), secret: config.webhook_secret.clone() }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn post(&self, event: &EscalationEvent) -> Result<(), CollaboratorError> {
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| CollaboratorError::NotConfigured("escalation.webhook_url".to_owned()))?;

        let mut request = self.client.post(url).json(event);
        if let Some(secret) = &self.secret {
            request = request.header(SECRET_HEADER, secret.expose_secret());
        }

        let response = request.send().await.map_err(transport_error)?;
        ensure_success(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use concierge_core::collaborators::Notifier;
    use concierge_core::config::AppConfig;
    use concierge_core::domain::conversation::ConversationKey;
    use concierge_core::domain::escalation::{EscalationEvent, EscalationReason};
    use concierge_core::errors::CollaboratorError;

    use super::WebhookNotifier;

    fn event() -> EscalationEvent {
        EscalationEvent {
            conversation_key: ConversationKey::new("15550009999"),
            reason: EscalationReason::LowConfidence,
            description: "Low confidence score: 0.45".to_owned(),
            confidence_score: Some(0.45),
            last_message: "do you carry acme?".to_owned(),
            recent_history: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn unconfigured_webhook_reports_not_configured() {
        let notifier =
            WebhookNotifier::from_config(&AppConfig::default().escalation, reqwest::Client::new());
        let error = notifier.post(&event()).await.expect_err("no webhook configured");
        assert_eq!(error, CollaboratorError::NotConfigured("escalation.webhook_url".to_owned()));
    }

    #[test]
    fn payload_uses_snake_case_reason() {
        let payload = serde_json::to_value(event()).expect("serialize event");
        assert_eq!(payload["reason"], "low_confidence");
        assert_eq!(payload["conversation_key"], "15550009999");
        assert_eq!(payload["confidence_score"], 0.45);
    }
}
