use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub content: String,
    #[serde(alias = "similarity")]
    pub similarity_score: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GenerationResult {
    pub response_text: String,
    pub confidence_score: f64,
}
