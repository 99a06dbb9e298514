use std::time::Duration;

use thiserror::Error;

use crate::flows::TurnTransitionError;

/// Failure reported by a single call to an external collaborator.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("collaborator returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode collaborator response: {0}")]
    Decode(String),
    #[error("collaborator is not configured: {0}")]
    NotConfigured(String),
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CallFailure {
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

/// A collaborator call that exhausted its retry budget.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("external call `{operation}` failed after {attempts} attempt(s): {cause}")]
pub struct ExternalCallFailed {
    pub operation: &'static str,
    pub attempts: u32,
    #[source]
    pub cause: CallFailure,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RetrievalError {
    #[error("knowledge retrieval failed: {0}")]
    RetrievalFailed(#[from] ExternalCallFailed),
}

/// Failures that abort a turn and send it to the fallback menu.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TurnError {
    #[error("response generation failed: {0}")]
    Generation(#[source] ExternalCallFailed),
    #[error("read-only lookup failed: {0}")]
    Lookup(#[source] ExternalCallFailed),
    #[error("reply delivery failed: {0}")]
    Delivery(#[source] ExternalCallFailed),
    #[error("classification defect: {0}")]
    InvalidTransition(#[from] TurnTransitionError),
}

impl TurnError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Generation(_) => "external_call_failed.generation",
            Self::Lookup(_) => "external_call_failed.lookup",
            Self::Delivery(_) => "external_call_failed.delivery",
            Self::InvalidTransition(_) => "classification_error",
        }
    }
}
