use std::sync::Arc;

use tracing::{debug, warn};

use concierge_core::collaborators::VectorSearch;
use concierge_core::domain::knowledge::RetrievedDocument;
use concierge_core::errors::RetrievalError;
use concierge_core::resilience::RetryPolicy;

use crate::llm::EmbeddingClient;

pub const DEFAULT_MATCH_COUNT: usize = 3;
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;

/// Embeds a query and runs it against the knowledge base.
#[derive(Clone)]
pub struct RetrievalAdapter {
    embeddings: Arc<dyn EmbeddingClient>,
    search: Arc<dyn VectorSearch>,
    policy: RetryPolicy,
    match_count: usize,
    similarity_threshold: f64,
}

impl RetrievalAdapter {
    pub fn new(
        embeddings: Arc<dyn EmbeddingClient>,
        search: Arc<dyn VectorSearch>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            embeddings,
            search,
            policy,
            match_count: DEFAULT_MATCH_COUNT,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }

    pub fn with_defaults(mut self, match_count: usize, similarity_threshold: f64) -> Self {
        self.match_count = match_count;
        self.similarity_threshold = similarity_threshold;
        self
    }

    /// Most similar first, never more than `limit`. The threshold is applied
    /// by the search collaborator.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        threshold: f64,
    ) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        if self.skip_unconfigured() {
            return Ok(Vec::new());
        }

        let embeddings = &self.embeddings;
        let embedding = self.policy.call("retrieval.embed", || embeddings.embed(query)).await?;

        let search = &self.search;
        let mut documents = self
            .policy
            .call("retrieval.search", || search.search(&embedding, threshold, limit))
            .await?;

        documents.sort_by(|left, right| right.similarity_score.total_cmp(&left.similarity_score));
        documents.truncate(limit);
        Ok(documents)
    }

    /// Knowledge snippets joined by blank lines, or an empty string when
    /// nothing matched or retrieval failed.
    pub async fn formatted_context(&self, query: &str) -> String {
        if self.skip_unconfigured() {
            return String::new();
        }

        match self.search(query, self.match_count, self.similarity_threshold).await {
            Ok(documents) => {
                debug!(
                    event_name = "retrieval.completed",
                    documents = documents.len(),
                    "knowledge retrieval completed"
                );
                documents
                    .iter()
                    .map(|document| document.content.trim())
                    .filter(|content| !content.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n\n")
            }
            Err(error) => {
                warn!(
                    event_name = "retrieval.degraded",
                    error = %error,
                    "answering without knowledge context"
                );
                String::new()
            }
        }
    }

    fn skip_unconfigured(&self) -> bool {
        if self.search.is_configured() {
            return false;
        }
        debug!(
            event_name = "retrieval.skipped",
            reason = "vector_search_unconfigured",
            "no knowledge base configured"
        );
        true
    }
}
