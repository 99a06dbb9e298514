//! Domain types, configuration and cross-cutting policies for the concierge runtime.

pub mod collaborators;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod resilience;

pub use collaborators::{
    AnalyticsSink, Catalog, ImageAnalyzer, MediaSource, Notifier, OrderDirectory,
    OutboundMessenger, SessionCache, VectorSearch,
};
pub use domain::conversation::{ConversationKey, ConversationTurn, Role};
pub use domain::intent::{BrowseTrigger, Intent, OrderId};
pub use domain::outbound::{InteractiveReply, OutboundMessage};
pub use domain::product::{Product, ProductId};
pub use domain::vision::{ClothingAttributes, ImageAnalysis, ImageData, MediaId};
pub use errors::{
    CallFailure, CollaboratorError, ExternalCallFailed, RetrievalError, TurnError,
};
pub use flows::{TurnEvent, TurnState, TurnTrace};
pub use resilience::{ResiliencePolicies, RetryPolicy};
