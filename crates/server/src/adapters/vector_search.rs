use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use concierge_core::collaborators::VectorSearch;
use concierge_core::config::RetrievalConfig;
use concierge_core::domain::knowledge::RetrievedDocument;
use concierge_core::errors::CollaboratorError;

use super::{ensure_success, transport_error};

/// Knowledge-base similarity search exposed as a single RPC endpoint
/// (a PostgREST `rpc/match_knowledge_base` style function).
#[derive(Clone)]
pub struct RpcVectorSearch {
    client: Client,
    rpc_url: Option<String>,
    api_key: Option<SecretString>,
}

#[derive(Serialize)]
struct MatchRequest<'a> {
    query_embedding: &'a [f32],
    match_threshold: f64,
    match_count: usize,
}

impl RpcVectorSearch {
    pub fn from_config(config: &RetrievalConfig, client: Client) -> Self {
        Self { client, rpc_url: config.rpc_url.clone(), api_key: config.api_key.clone() }
    }
}

#[async_trait]
impl VectorSearch for RpcVectorSearch {
    fn is_configured(&self) -> bool {
        self.rpc_url.is_some()
    }

    async fn search(
        &self,
        embedding: &[f32],
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<RetrievedDocument>, CollaboratorError> {
        let rpc_url = self
            .rpc_url
            .as_deref()
            .ok_or_else(|| CollaboratorError::NotConfigured("retrieval.rpc_url".to_owned()))?;

        let mut request = self.client.post(rpc_url).json(&MatchRequest {
            query_embedding: embedding,
            match_threshold: threshold,
            match_count: limit,
        });
        if let Some(api_key) = &self.api_key {
            request = request
                .header("apikey", api_key.expose_secret())
                .bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await.map_err(transport_error)?;
        let documents: Vec<RetrievedDocument> =
            ensure_success(response).await?.json().await.map_err(transport_error)?;
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use concierge_core::collaborators::VectorSearch;
    use concierge_core::config::AppConfig;
    use concierge_core::domain::knowledge::RetrievedDocument;
    use concierge_core::errors::CollaboratorError;
    use serde_json::json;

    use super::{MatchRequest, RpcVectorSearch};

    #[test]
    fn request_carries_embedding_threshold_and_count() {
        let body = serde_json::to_value(MatchRequest {
            query_embedding: &[0.5, 0.25],
            match_threshold: 0.7,
            match_count: 3,
        })
        .expect("serialize request");

        assert_eq!(
            body,
            json!({"query_embedding": [0.5, 0.25], "match_threshold": 0.7, "match_count": 3})
        );
    }

    #[test]
    fn rows_decode_with_similarity_alias() {
        let rows: Vec<RetrievedDocument> = serde_json::from_value(json!([
            {"id": 7, "content": "Free returns within 30 days.", "similarity": 0.82}
        ]))
        .expect("decode rows");
        assert_eq!(rows[0].similarity_score, 0.82);
    }

    #[tokio::test]
    async fn missing_rpc_url_is_not_configured() {
        let search = RpcVectorSearch::from_config(&AppConfig::default().retrieval, reqwest::Client::new());
        assert!(!search.is_configured());
        let error = search.search(&[0.1], 0.7, 3).await.expect_err("no endpoint configured");
        assert!(matches!(error, CollaboratorError::NotConfigured(_)));
    }

    #[test]
    fn configured_rpc_url_enables_search() {
        let mut config = AppConfig::default().retrieval;
        config.rpc_url = Some("https://kb.example.com/rest/v1/rpc/match_knowledge_base".to_owned());
        assert!(RpcVectorSearch::from_config(&config, reqwest::Client::new()).is_configured());
    }
}
