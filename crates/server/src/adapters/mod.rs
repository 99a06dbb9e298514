//! HTTP implementations of the runtime's collaborator traits.
//!
//! Adapters make exactly one request per call. Retries and timeouts are the
//! runtime's job.

pub mod openai;
pub mod vector_search;
pub mod webhook;
pub mod whatsapp;

use std::time::Duration;

use concierge_core::errors::CollaboratorError;
use reqwest::{Client, Response};

const MAX_ERROR_BODY_CHARS: usize = 512;

pub fn http_client() -> Result<Client, reqwest::Error> {
    Client::builder().connect_timeout(Duration::from_secs(5)).build()
}

pub(crate) fn transport_error(error: reqwest::Error) -> CollaboratorError {
    if error.is_decode() {
        CollaboratorError::Decode(error.to_string())
    } else {
        CollaboratorError::Transport(error.to_string())
    }
}

/// Passes successful responses through and turns everything else into
/// [`CollaboratorError::Status`] with a truncated body.
pub(crate) async fn ensure_success(response: Response) -> Result<Response, CollaboratorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(CollaboratorError::Status {
        status: status.as_u16(),
        body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
    })
}
