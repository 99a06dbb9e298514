use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use concierge_core::collaborators::{
    AnalyticsSink, Catalog, ImageAnalyzer, MediaSource, Notifier, OrderDirectory,
    OutboundMessenger, SessionCache, VectorSearch,
};
use concierge_core::config::AppConfig;
use concierge_core::domain::analytics::{AnalyticsRecord, MessageType};
use concierge_core::domain::conversation::{ConversationKey, ConversationTurn};
use concierge_core::domain::escalation::EscalationEvent;
use concierge_core::domain::intent::{BrowseTrigger, Intent, OrderId};
use concierge_core::domain::outbound::{InteractiveReply, OutboundMessage};
use concierge_core::domain::product::ProductId;
use concierge_core::domain::vision::{ImageAnalysis, MediaId};
use concierge_core::errors::{ExternalCallFailed, TurnError};
use concierge_core::flows::{TurnEvent, TurnState, TurnTrace};
use concierge_core::resilience::{ResiliencePolicies, RetryPolicy};

use crate::escalation::{
    EscalationDecision, EscalationEngine, DEFAULT_CONFIDENCE_THRESHOLD, ESCALATION_ACKNOWLEDGMENT,
    LOW_CONFIDENCE_NOTICE,
};
use crate::generator::ResponseGenerator;
use crate::language::detect_language;
use crate::llm::{EmbeddingClient, LlmClient};
use crate::replies::{
    self, CATALOG_PAGE_SIZE, HELP_TEXT, PRODUCT_NOT_FOUND, TRACK_ORDER_PROMPT, VISUAL_SEARCH_LIMIT,
};
use crate::retrieval::{RetrievalAdapter, DEFAULT_MATCH_COUNT, DEFAULT_SIMILARITY_THRESHOLD};
use crate::router::IntentRouter;
use crate::session::{SessionContextStore, DEFAULT_MAX_TURNS, DEFAULT_SESSION_TTL};

/// Everything the runtime talks to, built once at bootstrap.
#[derive(Clone)]
pub struct RuntimeCollaborators {
    pub session_cache: Arc<dyn SessionCache>,
    pub llm: Arc<dyn LlmClient>,
    pub embeddings: Arc<dyn EmbeddingClient>,
    pub vector_search: Arc<dyn VectorSearch>,
    pub notifier: Arc<dyn Notifier>,
    pub outbound: Arc<dyn OutboundMessenger>,
    pub orders: Arc<dyn OrderDirectory>,
    pub catalog: Arc<dyn Catalog>,
    pub analytics: Arc<dyn AnalyticsSink>,
    pub media: Arc<dyn MediaSource>,
    pub vision: Arc<dyn ImageAnalyzer>,
}

#[derive(Clone, Debug)]
pub struct RuntimeSettings {
    pub policies: ResiliencePolicies,
    pub max_turns: usize,
    pub session_ttl: Duration,
    pub match_count: usize,
    pub similarity_threshold: f64,
    pub confidence_threshold: f64,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            policies: ResiliencePolicies::default(),
            max_turns: DEFAULT_MAX_TURNS,
            session_ttl: DEFAULT_SESSION_TTL,
            match_count: DEFAULT_MATCH_COUNT,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

impl From<&AppConfig> for RuntimeSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            policies: ResiliencePolicies::from(&config.resilience),
            max_turns: config.session.max_turns,
            session_ttl: Duration::from_secs(config.session.ttl_secs),
            match_count: config.retrieval.match_count,
            similarity_threshold: config.retrieval.similarity_threshold,
            confidence_threshold: config.escalation.confidence_threshold,
        }
    }
}

/// What happened during one turn. The transport never sees this; it exists
/// for logs, the operator tools and tests.
#[derive(Clone, Debug, PartialEq)]
pub struct TurnReport {
    pub conversation_key: ConversationKey,
    pub intent: Option<Intent>,
    pub visited: Vec<TurnState>,
    pub escalated: bool,
    pub outbound_count: u32,
    pub error_class: Option<&'static str>,
}

impl TurnReport {
    pub fn final_state(&self) -> TurnState {
        self.visited.last().copied().unwrap_or(TurnState::Received)
    }
}

struct TurnProgress {
    trace: TurnTrace,
    intent: Option<Intent>,
    escalated: bool,
    outbound_count: u32,
}

impl TurnProgress {
    fn new() -> Self {
        Self { trace: TurnTrace::default(), intent: None, escalated: false, outbound_count: 0 }
    }
}

enum TurnInput<'a> {
    Text(&'a str),
    Interactive(&'a InteractiveReply),
    Image(&'a MediaId),
}

type PreparedReply = (OutboundMessage, AnalyticsRecord);

/// Drives one inbound event from classification to reply.
///
/// Every failure ends in the fallback menu; nothing propagates to the caller.
#[derive(Clone)]
pub struct ConversationRuntime {
    router: IntentRouter,
    sessions: SessionContextStore,
    retrieval: RetrievalAdapter,
    generator: ResponseGenerator,
    escalation: EscalationEngine,
    outbound: Arc<dyn OutboundMessenger>,
    orders: Arc<dyn OrderDirectory>,
    catalog: Arc<dyn Catalog>,
    analytics: Arc<dyn AnalyticsSink>,
    media: Arc<dyn MediaSource>,
    vision: Arc<dyn ImageAnalyzer>,
    policies: ResiliencePolicies,
    fallback_policy: RetryPolicy,
}

impl ConversationRuntime {
    pub fn new(collaborators: RuntimeCollaborators, settings: RuntimeSettings) -> Self {
        let RuntimeSettings {
            policies,
            max_turns,
            session_ttl,
            match_count,
            similarity_threshold,
            confidence_threshold,
        } = settings;

        Self {
            router: IntentRouter::new(),
            sessions: SessionContextStore::new(collaborators.session_cache, policies.lookup.clone())
                .with_limits(max_turns, session_ttl),
            retrieval: RetrievalAdapter::new(
                collaborators.embeddings,
                collaborators.vector_search,
                policies.lookup.clone(),
            )
            .with_defaults(match_count, similarity_threshold),
            generator: ResponseGenerator::new(collaborators.llm, policies.critical.clone()),
            escalation: EscalationEngine::new(collaborators.notifier, policies.critical.clone())
                .with_confidence_threshold(confidence_threshold),
            outbound: collaborators.outbound,
            orders: collaborators.orders,
            catalog: collaborators.catalog,
            analytics: collaborators.analytics,
            media: collaborators.media,
            vision: collaborators.vision,
            fallback_policy: RetryPolicy { attempts: 0, ..policies.lookup.clone() },
            policies,
        }
    }

    pub fn from_config(config: &AppConfig, collaborators: RuntimeCollaborators) -> Self {
        Self::new(collaborators, RuntimeSettings::from(config))
    }

    pub async fn handle_inbound_message(&self, key: &ConversationKey, text: &str) -> TurnReport {
        let span = info_span!(
            "turn",
            correlation_id = %Uuid::new_v4(),
            conversation_key = %key,
            message_type = MessageType::Text.as_str()
        );
        self.run_turn(key, TurnInput::Text(text)).instrument(span).await
    }

    pub async fn handle_interactive_reply(
        &self,
        key: &ConversationKey,
        reply: &InteractiveReply,
    ) -> TurnReport {
        let span = info_span!(
            "turn",
            correlation_id = %Uuid::new_v4(),
            conversation_key = %key,
            message_type = MessageType::Interactive.as_str()
        );
        self.run_turn(key, TurnInput::Interactive(reply)).instrument(span).await
    }

    /// Visual search: analyzes the customer's photo and replies with similar
    /// catalog items. Photos never enter the session window.
    pub async fn handle_image_message(
        &self,
        key: &ConversationKey,
        media_id: &MediaId,
    ) -> TurnReport {
        let span = info_span!(
            "turn",
            correlation_id = %Uuid::new_v4(),
            conversation_key = %key,
            message_type = MessageType::Image.as_str()
        );
        self.run_turn(key, TurnInput::Image(media_id)).instrument(span).await
    }

    /// Drops the stored session window. Safe to call repeatedly.
    pub async fn clear_conversation(&self, key: &ConversationKey) -> bool {
        let cleared = self.sessions.clear_window(key).await;
        info!(
            event_name = "session.cleared",
            conversation_key = %key,
            cleared,
            "conversation history cleared"
        );
        cleared
    }

    async fn run_turn(&self, key: &ConversationKey, input: TurnInput<'_>) -> TurnReport {
        let started = Instant::now();
        let mut turn = TurnProgress::new();

        let outcome = match input {
            TurnInput::Text(text) => self.text_turn(key, text, &mut turn, started).await,
            TurnInput::Interactive(reply) => {
                self.interactive_turn(key, reply, &mut turn, started).await
            }
            TurnInput::Image(media_id) => self.image_turn(key, media_id, &mut turn, started).await,
        };

        let error_class = match outcome {
            Ok(()) => None,
            Err(failure) => {
                error!(
                    event_name = "turn.fallback",
                    error_class = failure.error_class(),
                    state = turn.trace.state().as_str(),
                    error = %failure,
                    "turn failed, sending fallback menu"
                );
                self.send_fallback_menu(key, &mut turn).await;
                Some(failure.error_class())
            }
        };

        let final_state = turn.trace.state();
        info!(
            event_name = "turn.completed",
            intent = turn.intent.as_ref().map(Intent::label).unwrap_or("unclassified"),
            final_state = final_state.as_str(),
            escalated = turn.escalated,
            outbound_count = turn.outbound_count,
            elapsed_ms = elapsed_ms(started),
            "turn completed"
        );

        TurnReport {
            conversation_key: key.clone(),
            intent: turn.intent,
            visited: turn.trace.into_visited(),
            escalated: turn.escalated,
            outbound_count: turn.outbound_count,
            error_class,
        }
    }

    async fn text_turn(
        &self,
        key: &ConversationKey,
        text: &str,
        turn: &mut TurnProgress,
        started: Instant,
    ) -> Result<(), TurnError> {
        turn.trace.apply(TurnEvent::Classify)?;
        let intent = self.router.classify(text);
        debug!(event_name = "turn.classified", intent = intent.label(), "message classified");
        turn.intent = Some(intent.clone());

        let record = AnalyticsRecord::inbound(key.clone(), MessageType::Text, intent.label());
        let (reply, record) = match &intent {
            Intent::OrderLookup(order_id) => {
                turn.trace.apply(TurnEvent::RouteOrderLookup)?;
                self.order_reply(order_id, record).await?
            }
            Intent::CatalogBrowse(trigger) => {
                turn.trace.apply(TurnEvent::RouteCatalogBrowse)?;
                self.browse_reply(*trigger, record).await?
            }
            Intent::EscalationRequest => {
                turn.trace.apply(TurnEvent::RouteEscalation)?;
                let history = self.sessions.get_window(key).await;
                let decision = self.escalation.should_escalate(None, true);
                self.notify(key, text, decision, None, history).await;
                turn.escalated = true;

                let mut record = record.with_content(text);
                record.escalated = true;
                (OutboundMessage::text(ESCALATION_ACKNOWLEDGMENT), record)
            }
            Intent::GeneralQa => {
                turn.trace.apply(TurnEvent::RouteAnswer)?;
                self.answer(key, text, turn, record).await?
            }
        };

        self.log_and_reply(key, turn, &reply, record, started).await?;

        self.sessions.append_turn(key, &ConversationTurn::user(text)).await;
        self.sessions.append_turn(key, &ConversationTurn::assistant(reply.summary())).await;
        Ok(())
    }

    async fn interactive_turn(
        &self,
        key: &ConversationKey,
        reply: &InteractiveReply,
        turn: &mut TurnProgress,
        started: Instant,
    ) -> Result<(), TurnError> {
        turn.trace.apply(TurnEvent::Classify)?;

        let (message, record) = match reply {
            InteractiveReply::ButtonReply(button_id) => match button_id.as_str() {
                "browse" => {
                    let intent = Intent::CatalogBrowse(BrowseTrigger::NewArrivals);
                    let record =
                        AnalyticsRecord::inbound(key.clone(), MessageType::Interactive, intent.label());
                    turn.intent = Some(intent);
                    turn.trace.apply(TurnEvent::RouteCatalogBrowse)?;
                    self.browse_reply(BrowseTrigger::NewArrivals, record).await?
                }
                "track" => {
                    turn.trace.apply(TurnEvent::RouteFixedReply)?;
                    let record = AnalyticsRecord::inbound(
                        key.clone(),
                        MessageType::Interactive,
                        "order_tracking_prompt",
                    )
                    .with_content(button_id.as_str());
                    (OutboundMessage::text(TRACK_ORDER_PROMPT), record)
                }
                "help" => {
                    turn.trace.apply(TurnEvent::RouteFixedReply)?;
                    let record =
                        AnalyticsRecord::inbound(key.clone(), MessageType::Interactive, "help")
                            .with_content(button_id.as_str());
                    (OutboundMessage::text(HELP_TEXT), record)
                }
                unknown => {
                    warn!(
                        event_name = "turn.unrecognized_button",
                        button_id = unknown,
                        "unrecognized button reply"
                    );
                    self.send_fallback_menu(key, turn).await;
                    return Ok(());
                }
            },
            InteractiveReply::ListReply(product_id) => {
                turn.trace.apply(TurnEvent::RouteCatalogBrowse)?;
                let product_id = ProductId(product_id.clone());
                let catalog = &self.catalog;
                let product = self
                    .policies
                    .lookup
                    .call("catalog.find_product", || catalog.find_product(&product_id))
                    .await
                    .map_err(TurnError::Lookup)?;

                let record =
                    AnalyticsRecord::inbound(key.clone(), MessageType::Interactive, "product_detail")
                        .with_content(product_id.0.as_str())
                        .with_metadata("product_id", product_id.0.as_str());
                let message = match product {
                    Some(product) => replies::product_detail(&product),
                    None => OutboundMessage::text(PRODUCT_NOT_FOUND),
                };
                (message, record)
            }
        };

        self.log_and_reply(key, turn, &message, record, started).await
    }

    async fn image_turn(
        &self,
        key: &ConversationKey,
        media_id: &MediaId,
        turn: &mut TurnProgress,
        started: Instant,
    ) -> Result<(), TurnError> {
        turn.trace.apply(TurnEvent::Classify)?;
        turn.trace.apply(TurnEvent::RouteVisualSearch)?;

        let media = &self.media;
        let image = self
            .policies
            .lookup
            .call("media.fetch", || media.fetch(media_id))
            .await
            .map_err(TurnError::Lookup)?;

        let vision = &self.vision;
        let analysis = self
            .policies
            .lookup
            .call("vision.analyze", || vision.analyze(&image))
            .await
            .map_err(TurnError::Generation)?;

        let record = AnalyticsRecord::inbound(key.clone(), MessageType::Image, "visual_search")
            .with_content(media_id.as_str())
            .with_metadata("media_id", media_id.as_str());

        let (message, record) = match analysis {
            ImageAnalysis::NotClothing { reason } => {
                debug!(event_name = "visual_search.rejected", reason = %reason, "photo is not clothing");
                (replies::not_clothing(&reason), record.with_metadata("is_clothing", "false"))
            }
            ImageAnalysis::Clothing(attributes) => {
                let catalog = &self.catalog;
                let mut products = self
                    .policies
                    .lookup
                    .call("catalog.search_by_attributes", || {
                        catalog.search_by_attributes(&attributes, VISUAL_SEARCH_LIMIT)
                    })
                    .await
                    .map_err(TurnError::Lookup)?;
                products.truncate(VISUAL_SEARCH_LIMIT);

                let record = record
                    .with_metadata("is_clothing", "true")
                    .with_metadata("garment_type", attributes.garment_type.as_str())
                    .with_metadata("search_terms", attributes.search_terms().join(" "))
                    .with_metadata("products_found", products.len().to_string());
                (replies::visual_matches(&products), record)
            }
        };

        self.log_and_reply(key, turn, &message, record, started).await
    }

    async fn order_reply(
        &self,
        order_id: &OrderId,
        record: AnalyticsRecord,
    ) -> Result<PreparedReply, TurnError> {
        let orders = &self.orders;
        let order = self
            .policies
            .lookup
            .call("orders.find", || orders.find_order(order_id))
            .await
            .map_err(TurnError::Lookup)?;

        let record =
            record.with_content(order_id.as_str()).with_metadata("order_id", order_id.as_str());
        Ok(match order {
            Some(order) => (
                replies::order_status(&order),
                record.with_metadata("order_status", order.status.as_str()),
            ),
            None => (replies::order_not_found(order_id), record.with_metadata("found", "false")),
        })
    }

    async fn browse_reply(
        &self,
        trigger: BrowseTrigger,
        record: AnalyticsRecord,
    ) -> Result<PreparedReply, TurnError> {
        let catalog = &self.catalog;
        let mut products = self
            .policies
            .lookup
            .call("catalog.browse", || catalog.browse(trigger, CATALOG_PAGE_SIZE))
            .await
            .map_err(TurnError::Lookup)?;
        products.truncate(CATALOG_PAGE_SIZE);

        let record = record
            .with_content(trigger.as_str())
            .with_metadata("category", trigger.as_str())
            .with_metadata("products_shown", products.len().to_string());
        Ok((replies::catalog_list(trigger, &products), record))
    }

    async fn answer(
        &self,
        key: &ConversationKey,
        text: &str,
        turn: &mut TurnProgress,
        record: AnalyticsRecord,
    ) -> Result<PreparedReply, TurnError> {
        let language = detect_language(text);
        let history = self.sessions.get_window(key).await;
        let context = self.retrieval.formatted_context(text).await;
        let generated = self
            .generator
            .generate(text, &context, &history, language)
            .await
            .map_err(TurnError::Generation)?;

        let mut record = record.with_content(text).with_metadata("language", language);
        record.confidence_score = Some(generated.confidence_score);

        let decision = self.escalation.should_escalate(Some(generated.confidence_score), false);
        if !decision.should_escalate() {
            return Ok((OutboundMessage::text(generated.response_text), record));
        }

        turn.trace.apply(TurnEvent::LowConfidence)?;
        self.notify(key, text, decision, Some(generated.confidence_score), history).await;
        turn.escalated = true;
        record.escalated = true;

        let body = format!("{}\n\n{}", generated.response_text, LOW_CONFIDENCE_NOTICE);
        Ok((OutboundMessage::text(body), record))
    }

    async fn notify(
        &self,
        key: &ConversationKey,
        text: &str,
        decision: EscalationDecision,
        confidence_score: Option<f64>,
        recent_history: Vec<ConversationTurn>,
    ) -> bool {
        let EscalationDecision::Escalate { reason, description } = decision else {
            return false;
        };

        let event = EscalationEvent {
            conversation_key: key.clone(),
            reason,
            description,
            confidence_score,
            last_message: text.to_owned(),
            recent_history,
            timestamp: Utc::now(),
        };
        self.escalation.escalate(&event).await
    }

    async fn log_and_reply(
        &self,
        key: &ConversationKey,
        turn: &mut TurnProgress,
        reply: &OutboundMessage,
        mut record: AnalyticsRecord,
        started: Instant,
    ) -> Result<(), TurnError> {
        turn.trace.apply(TurnEvent::RecordAnalytics)?;
        record.response_time_ms = elapsed_ms(started);
        self.record_analytics(&record).await;

        self.deliver(key, reply, &self.policies.lookup).await.map_err(TurnError::Delivery)?;
        turn.outbound_count += 1;
        turn.trace.apply(TurnEvent::DeliverReply)?;
        Ok(())
    }

    async fn record_analytics(&self, record: &AnalyticsRecord) {
        let analytics = &self.analytics;
        if let Err(failure) =
            self.policies.lookup.call("analytics.record", || analytics.record(record)).await
        {
            warn!(
                event_name = "analytics.record_failed",
                intent = record.intent.as_str(),
                error = %failure,
                "analytics record dropped"
            );
        }
    }

    async fn deliver(
        &self,
        key: &ConversationKey,
        message: &OutboundMessage,
        policy: &RetryPolicy,
    ) -> Result<(), ExternalCallFailed> {
        let outbound = &self.outbound;
        policy.call("outbound.send", || outbound.send(key, message)).await
    }

    async fn send_fallback_menu(&self, key: &ConversationKey, turn: &mut TurnProgress) {
        if !turn.trace.fail() {
            warn!(
                event_name = "turn.fallback_after_terminal",
                state = turn.trace.state().as_str(),
                "fallback requested after the turn already ended"
            );
        }

        match self.deliver(key, &replies::fallback_menu(), &self.fallback_policy).await {
            Ok(()) => turn.outbound_count += 1,
            Err(failure) => error!(
                event_name = "turn.fallback_delivery_failed",
                error = %failure,
                "fallback menu could not be delivered"
            ),
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
