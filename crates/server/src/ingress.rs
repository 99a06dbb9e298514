//! Minimal HTTP ingress. Each accepted event becomes its own task; the
//! response only acknowledges receipt.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use concierge_agent::ConversationRuntime;
use concierge_core::domain::conversation::ConversationKey;
use concierge_core::domain::outbound::InteractiveReply;
use concierge_core::domain::vision::MediaId;
use concierge_db::DbPool;

#[derive(Clone)]
pub struct IngressState {
    pub runtime: Arc<ConversationRuntime>,
    pub db_pool: DbPool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct InboundMessage {
    pub from: String,
    pub text: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct InboundInteractive {
    pub from: String,
    pub reply: InteractiveReply,
}

#[derive(Clone, Debug, Deserialize)]
pub struct InboundImage {
    pub from: String,
    pub media_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Accepted {
    pub status: &'static str,
    pub conversation_key: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IngressError {
    pub error: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: String,
    pub checked_at: String,
}

type IngressResult = Result<(StatusCode, Json<Accepted>), (StatusCode, Json<IngressError>)>;

pub fn router(state: IngressState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/messages", post(accept_message))
        .route("/v1/interactive", post(accept_interactive))
        .route("/v1/images", post(accept_image))
        .route("/v1/conversations/{key}", delete(clear_conversation))
        .with_state(state)
}

pub async fn accept_message(
    State(state): State<IngressState>,
    Json(message): Json<InboundMessage>,
) -> IngressResult {
    let key = conversation_key(&message.from)?;
    if message.text.trim().is_empty() {
        return Err(bad_request("text must not be empty"));
    }

    let runtime = state.runtime.clone();
    let task_key = key.clone();
    tokio::spawn(async move {
        runtime.handle_inbound_message(&task_key, &message.text).await;
    });

    Ok(accepted(&key))
}

pub async fn accept_interactive(
    State(state): State<IngressState>,
    Json(event): Json<InboundInteractive>,
) -> IngressResult {
    let key = conversation_key(&event.from)?;

    let runtime = state.runtime.clone();
    let task_key = key.clone();
    tokio::spawn(async move {
        runtime.handle_interactive_reply(&task_key, &event.reply).await;
    });

    Ok(accepted(&key))
}

pub async fn accept_image(
    State(state): State<IngressState>,
    Json(image): Json<InboundImage>,
) -> IngressResult {
    let key = conversation_key(&image.from)?;
    let media_id = image.media_id.trim();
    if media_id.is_empty() {
        return Err(bad_request("media_id must not be empty"));
    }

    let runtime = state.runtime.clone();
    let task_key = key.clone();
    let media_id = MediaId(media_id.to_owned());
    tokio::spawn(async move {
        runtime.handle_image_message(&task_key, &media_id).await;
    });

    Ok(accepted(&key))
}

pub async fn clear_conversation(
    State(state): State<IngressState>,
    Path(key): Path<String>,
) -> IngressResult {
    let key = conversation_key(&key)?;

    let runtime = state.runtime.clone();
    let task_key = key.clone();
    tokio::spawn(async move {
        runtime.clear_conversation(&task_key).await;
    });

    Ok(accepted(&key))
}

pub async fn health(State(state): State<IngressState>) -> (StatusCode, Json<HealthResponse>) {
    let (ready, database) = match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&state.db_pool).await
    {
        Ok(_) => (true, "database query succeeded".to_owned()),
        Err(error) => (false, format!("database query failed: {error}")),
    };

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        database,
        checked_at: Utc::now().to_rfc3339(),
    };
    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

pub async fn serve(
    bind_address: &str,
    port: u16,
    state: IngressState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.ingress.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "ingress listening"
    );

    axum::serve(listener, router(state)).with_graceful_shutdown(shutdown).await.map_err(|error| {
        error!(
            event_name = "system.ingress.error",
            correlation_id = "shutdown",
            error = %error,
            "ingress server terminated unexpectedly"
        );
        error
    })
}

fn conversation_key(raw: &str) -> Result<ConversationKey, (StatusCode, Json<IngressError>)> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        warn!(event_name = "ingress.rejected", reason = "empty_sender", "rejected inbound event");
        return Err(bad_request("sender must not be empty"));
    }
    Ok(ConversationKey::new(trimmed))
}

fn accepted(key: &ConversationKey) -> (StatusCode, Json<Accepted>) {
    (
        StatusCode::ACCEPTED,
        Json(Accepted { status: "accepted", conversation_key: key.as_str().to_owned() }),
    )
}

fn bad_request(message: &str) -> (StatusCode, Json<IngressError>) {
    (StatusCode::BAD_REQUEST, Json(IngressError { error: message.to_owned() }))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use concierge_agent::llm::{ChatMessage, EmbeddingClient, LlmClient};
    use concierge_agent::{ConversationRuntime, RuntimeCollaborators, RuntimeSettings};
    use concierge_core::collaborators::{
        ImageAnalyzer, MediaSource, Notifier, OutboundMessenger, SessionCache, VectorSearch,
    };
    use concierge_core::domain::conversation::ConversationKey;
    use concierge_core::domain::escalation::EscalationEvent;
    use concierge_core::domain::knowledge::RetrievedDocument;
    use concierge_core::domain::outbound::OutboundMessage;
    use concierge_core::domain::vision::{ImageAnalysis, ImageData, MediaId};
    use concierge_core::errors::CollaboratorError;
    use concierge_db::{
        connect_with_settings, InMemoryAnalyticsSink, InMemoryCatalog, InMemoryOrderDirectory,
        InMemorySessionCache,
    };

    use super::{router, IngressState};

    struct CannedLlm;

    #[async_trait]
    impl LlmClient for CannedLlm {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, CollaboratorError> {
            Ok("We ship worldwide.".to_owned())
        }
    }

    #[async_trait]
    impl EmbeddingClient for CannedLlm {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, CollaboratorError> {
            Ok(vec![0.1; 4])
        }
    }

    struct NoKnowledge;

    #[async_trait]
    impl VectorSearch for NoKnowledge {
        async fn search(
            &self,
            _embedding: &[f32],
            _threshold: f64,
            _limit: usize,
        ) -> Result<Vec<RetrievedDocument>, CollaboratorError> {
            Ok(Vec::new())
        }
    }

    struct StubPhoto;

    #[async_trait]
    impl MediaSource for StubPhoto {
        async fn fetch(&self, _media_id: &MediaId) -> Result<ImageData, CollaboratorError> {
            Ok(ImageData { bytes: vec![0xff, 0xd8], mime_type: "image/jpeg".to_owned() })
        }
    }

    #[async_trait]
    impl ImageAnalyzer for StubPhoto {
        async fn analyze(&self, _image: &ImageData) -> Result<ImageAnalysis, CollaboratorError> {
            Ok(ImageAnalysis::NotClothing { reason: "This looks like a landscape.".to_owned() })
        }
    }

    struct SilentNotifier;

    #[async_trait]
    impl Notifier for SilentNotifier {
        async fn post(&self, _event: &EscalationEvent) -> Result<(), CollaboratorError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingMessenger {
        sent: Mutex<Vec<(ConversationKey, OutboundMessage)>>,
    }

    #[async_trait]
    impl OutboundMessenger for RecordingMessenger {
        async fn send(
            &self,
            recipient: &ConversationKey,
            message: &OutboundMessage,
        ) -> Result<(), CollaboratorError> {
            self.sent.lock().expect("sent lock").push((recipient.clone(), message.clone()));
            Ok(())
        }
    }

    async fn state() -> (IngressState, Arc<RecordingMessenger>, Arc<InMemorySessionCache>) {
        let messenger = Arc::new(RecordingMessenger::default());
        let sessions = Arc::new(InMemorySessionCache::default());
        let llm = Arc::new(CannedLlm);
        let collaborators = RuntimeCollaborators {
            session_cache: sessions.clone(),
            llm: llm.clone(),
            embeddings: llm,
            vector_search: Arc::new(NoKnowledge),
            notifier: Arc::new(SilentNotifier),
            outbound: messenger.clone(),
            orders: Arc::new(InMemoryOrderDirectory::default()),
            catalog: Arc::new(InMemoryCatalog::default()),
            analytics: Arc::new(InMemoryAnalyticsSink::default()),
            media: Arc::new(StubPhoto),
            vision: Arc::new(StubPhoto),
        };
        let db_pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");
        let runtime = Arc::new(ConversationRuntime::new(collaborators, RuntimeSettings::default()));
        (IngressState { runtime, db_pool }, messenger, sessions)
    }

    fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_owned()))
            .expect("request")
    }

    async fn wait_for_replies(messenger: &RecordingMessenger, expected: usize) -> usize {
        for _ in 0..50 {
            let count = messenger.sent.lock().expect("sent lock").len();
            if count >= expected {
                return count;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        messenger.sent.lock().expect("sent lock").len()
    }

    #[tokio::test]
    async fn inbound_message_is_accepted_and_answered_in_the_background() {
        let (state, messenger, _) = state().await;

        let response = router(state)
            .oneshot(json_request(
                "POST",
                "/v1/messages",
                r#"{"from": "15551234567", "text": "Do you ship abroad?"}"#,
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(wait_for_replies(&messenger, 1).await, 1);
        let sent = messenger.sent.lock().expect("sent lock").clone();
        assert_eq!(sent[0].0, ConversationKey::new("15551234567"));
    }

    #[tokio::test]
    async fn interactive_reply_is_accepted() {
        let (state, messenger, _) = state().await;

        let response = router(state)
            .oneshot(json_request(
                "POST",
                "/v1/interactive",
                r#"{"from": "15551234567", "reply": {"type": "button_reply", "id": "help"}}"#,
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(wait_for_replies(&messenger, 1).await, 1);
    }

    #[tokio::test]
    async fn image_event_is_accepted_and_answered_in_the_background() {
        let (state, messenger, _) = state().await;

        let response = router(state)
            .oneshot(json_request(
                "POST",
                "/v1/images",
                r#"{"from": "15551234567", "media_id": "1029384756"}"#,
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(wait_for_replies(&messenger, 1).await, 1);
        let sent = messenger.sent.lock().expect("sent lock").clone();
        let OutboundMessage::Text { body } = &sent[0].1 else {
            panic!("expected a text reply");
        };
        assert!(body.starts_with("I can only help with clothing items."));
    }

    #[tokio::test]
    async fn blank_media_id_is_rejected() {
        let (state, _, _) = state().await;

        let response = router(state)
            .oneshot(json_request("POST", "/v1/images", r#"{"from": "15551234567", "media_id": " "}"#))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn empty_sender_is_rejected() {
        let (state, messenger, _) = state().await;

        let response = router(state)
            .oneshot(json_request("POST", "/v1/messages", r#"{"from": "  ", "text": "hi"}"#))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(messenger.sent.lock().expect("sent lock").is_empty());
    }

    #[tokio::test]
    async fn clearing_a_conversation_returns_accepted() {
        let (state, _, sessions) = state().await;
        sessions.push("session:15551234567", "{}".to_owned()).await.expect("seed session");

        let response = router(state)
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/v1/conversations/15551234567")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        for _ in 0..50 {
            if sessions.len("session:15551234567").await == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(sessions.len("session:15551234567").await, 0);
    }

    #[tokio::test]
    async fn health_reports_ready_database() {
        let (state, _, _) = state().await;

        let response = router(state)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
    }
}
