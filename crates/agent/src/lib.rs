//! Conversation runtime: routes each inbound customer message to an order
//! lookup, a catalog browse, a human hand-off or a generated answer, matches
//! customer photos against the catalog, and sends exactly one reply per turn.
//!
//! # Architecture
//!
//! 1. **Classification** (`router`) - deterministic first-match intent rules
//! 2. **Context** (`session`, `retrieval`) - recent turns and knowledge snippets
//! 3. **Answering** (`generator`) - one completion call plus a confidence score
//! 4. **Escalation** (`escalation`) - explicit requests and low-confidence answers
//! 5. **Visual search** (`vision`) - photo analysis matched against the catalog
//! 6. **Orchestration** (`runtime`) - the turn state machine and fallback menu
//!
//! The completion model only ever writes free-text answers. Order status,
//! catalog listings and every fixed reply come from `replies`.

pub mod escalation;
pub mod generator;
pub mod language;
pub mod llm;
pub mod replies;
pub mod retrieval;
pub mod router;
pub mod runtime;
pub mod session;
pub mod vision;

pub use escalation::{EscalationDecision, EscalationEngine};
pub use generator::ResponseGenerator;
pub use llm::{ChatMessage, ChatRole, EmbeddingClient, LlmClient};
pub use retrieval::RetrievalAdapter;
pub use router::IntentRouter;
pub use runtime::{ConversationRuntime, RuntimeCollaborators, RuntimeSettings, TurnReport};
pub use session::SessionContextStore;
