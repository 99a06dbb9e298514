//! Interfaces to everything the conversation runtime talks to but does not own.
//!
//! Each trait is one external collaborator. Implementations report failures as
//! [`CollaboratorError`]; retry and timeout handling live in
//! [`crate::resilience`], never inside an implementation.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::analytics::AnalyticsRecord;
use crate::domain::conversation::ConversationKey;
use crate::domain::escalation::EscalationEvent;
use crate::domain::intent::{BrowseTrigger, OrderId};
use crate::domain::knowledge::RetrievedDocument;
use crate::domain::order::Order;
use crate::domain::outbound::OutboundMessage;
use crate::domain::product::{Product, ProductId};
use crate::domain::vision::{ClothingAttributes, ImageAnalysis, ImageData, MediaId};
use crate::errors::CollaboratorError;

/// List-shaped key/value cache holding serialized session turns.
#[async_trait]
pub trait SessionCache: Send + Sync {
    async fn push(&self, key: &str, value: String) -> Result<(), CollaboratorError>;
    /// Returns up to `count` most recent values, oldest first.
    async fn range_last(&self, key: &str, count: usize) -> Result<Vec<String>, CollaboratorError>;
    async fn trim_to_last(&self, key: &str, count: usize) -> Result<(), CollaboratorError>;
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CollaboratorError>;
    async fn delete(&self, key: &str) -> Result<(), CollaboratorError>;
}

#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// `false` when no search backend is wired up; callers skip the query
    /// embedding entirely.
    fn is_configured(&self) -> bool {
        true
    }

    /// Documents at or above `threshold`, most similar first, at most `limit`.
    async fn search(
        &self,
        embedding: &[f32],
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<RetrievedDocument>, CollaboratorError>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn post(&self, event: &EscalationEvent) -> Result<(), CollaboratorError>;
}

#[async_trait]
pub trait OutboundMessenger: Send + Sync {
    async fn send(
        &self,
        recipient: &ConversationKey,
        message: &OutboundMessage,
    ) -> Result<(), CollaboratorError>;
}

#[async_trait]
pub trait OrderDirectory: Send + Sync {
    async fn find_order(&self, order_id: &OrderId) -> Result<Option<Order>, CollaboratorError>;
}

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn browse(
        &self,
        trigger: BrowseTrigger,
        limit: usize,
    ) -> Result<Vec<Product>, CollaboratorError>;
    async fn find_product(&self, id: &ProductId) -> Result<Option<Product>, CollaboratorError>;
    /// Active products ranked by how well they match the attributes, best first.
    async fn search_by_attributes(
        &self,
        attributes: &ClothingAttributes,
        limit: usize,
    ) -> Result<Vec<Product>, CollaboratorError>;
}

/// Resolves an inbound media handle to the image bytes.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn fetch(&self, media_id: &MediaId) -> Result<ImageData, CollaboratorError>;
}

/// Vision model that decides whether an image shows clothing and extracts its attributes.
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    async fn analyze(&self, image: &ImageData) -> Result<ImageAnalysis, CollaboratorError>;
}

#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn record(&self, record: &AnalyticsRecord) -> Result<(), CollaboratorError>;
}
