use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};

use concierge_core::collaborators::{MediaSource, OutboundMessenger};
use concierge_core::config::WhatsAppConfig;
use concierge_core::domain::conversation::ConversationKey;
use concierge_core::domain::outbound::OutboundMessage;
use concierge_core::domain::vision::{ImageData, MediaId};
use concierge_core::errors::CollaboratorError;

use super::{ensure_success, transport_error};

const MAX_BUTTONS: usize = 3;
const BUTTON_TITLE_MAX_CHARS: usize = 20;
const LIST_ROWS_MAX: usize = 10;
const SECTION_TITLE_MAX_CHARS: usize = 24;
const DEFAULT_MEDIA_MIME: &str = "image/jpeg";

/// Sends replies through the WhatsApp Cloud API messages endpoint and
/// downloads inbound media through the Graph media endpoints.
#[derive(Clone)]
pub struct WhatsAppMessenger {
    client: Client,
    messages_url: String,
    graph_url: String,
    access_token: SecretString,
}

#[derive(Debug, Deserialize)]
struct MediaMetadata {
    url: String,
    mime_type: Option<String>,
}

impl WhatsAppMessenger {
    pub fn from_config(config: &WhatsAppConfig, client: Client) -> Self {
        let graph_url = format!("{}/{}", config.base_url.trim_end_matches('/'), config.api_version);
        let messages_url = format!("{graph_url}/{}/messages", config.phone_number_id);
        Self { client, messages_url, graph_url, access_token: config.access_token.clone() }
    }

    fn media_url(&self, media_id: &MediaId) -> String {
        format!("{}/{}", self.graph_url, media_id.as_str())
    }
}

#[async_trait]
impl OutboundMessenger for WhatsAppMessenger {
    async fn send(
        &self,
        recipient: &ConversationKey,
        message: &OutboundMessage,
    ) -> Result<(), CollaboratorError> {
        let response = self
            .client
            .post(&self.messages_url)
            .bearer_auth(self.access_token.expose_secret())
            .json(&payload(recipient, message))
            .send()
            .await
            .map_err(transport_error)?;
        ensure_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl MediaSource for WhatsAppMessenger {
    /// Resolves the media id to a short-lived download URL, then fetches the
    /// bytes. Both requests carry the access token.
    async fn fetch(&self, media_id: &MediaId) -> Result<ImageData, CollaboratorError> {
        let response = self
            .client
            .get(self.media_url(media_id))
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await
            .map_err(transport_error)?;
        let metadata: MediaMetadata =
            ensure_success(response).await?.json().await.map_err(transport_error)?;

        let response = self
            .client
            .get(&metadata.url)
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await
            .map_err(transport_error)?;
        let bytes = ensure_success(response).await?.bytes().await.map_err(transport_error)?;

        Ok(ImageData {
            bytes: bytes.to_vec(),
            mime_type: metadata.mime_type.unwrap_or_else(|| DEFAULT_MEDIA_MIME.to_owned()),
        })
    }
}

/// Cloud API request body for one outbound message.
pub fn payload(recipient: &ConversationKey, message: &OutboundMessage) -> Value {
    let (message_type, content) = match message {
        OutboundMessage::Text { body } => ("text", json!({ "body": body })),
        OutboundMessage::Menu { header, body, options } => {
            let buttons = options
                .iter()
                .take(MAX_BUTTONS)
                .map(|option| {
                    json!({
                        "type": "reply",
                        "reply": {
                            "id": option.id,
                            "title": truncate_chars(&option.title, BUTTON_TITLE_MAX_CHARS),
                        }
                    })
                })
                .collect::<Vec<_>>();
            (
                "interactive",
                with_header(
                    json!({
                        "type": "button",
                        "body": { "text": body },
                        "action": { "buttons": buttons },
                    }),
                    header,
                ),
            )
        }
        OutboundMessage::List { header, body, button_label, rows } => {
            let rows = rows
                .iter()
                .take(LIST_ROWS_MAX)
                .map(|row| json!({ "id": row.id, "title": row.title, "description": row.description }))
                .collect::<Vec<_>>();
            (
                "interactive",
                with_header(
                    json!({
                        "type": "list",
                        "body": { "text": body },
                        "action": {
                            "button": button_label,
                            "sections": [{
                                "title": truncate_chars(header, SECTION_TITLE_MAX_CHARS),
                                "rows": rows,
                            }],
                        },
                    }),
                    header,
                ),
            )
        }
    };

    let mut payload = json!({
        "messaging_product": "whatsapp",
        "recipient_type": "individual",
        "to": recipient.as_str(),
        "type": message_type,
    });
    payload[message_type] = content;
    payload
}

fn with_header(mut interactive: Value, header: &str) -> Value {
    if !header.is_empty() {
        interactive["header"] = json!({ "type": "text", "text": header });
    }
    interactive
}

fn truncate_chars(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}
