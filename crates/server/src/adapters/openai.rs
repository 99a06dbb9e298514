use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use concierge_agent::llm::{ChatMessage, EmbeddingClient, LlmClient};
use concierge_agent::vision::{parse_image_analysis, VISION_PROMPT};
use concierge_core::collaborators::ImageAnalyzer;
use concierge_core::config::{LlmConfig, LlmProvider};
use concierge_core::domain::vision::{ImageAnalysis, ImageData};
use concierge_core::errors::CollaboratorError;

use super::{ensure_success, transport_error};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";
const VISION_TEMPERATURE: f32 = 0.3;

/// Chat completions and embeddings against any OpenAI-compatible API,
/// including Ollama's `/v1` endpoints.
#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
    embedding_model: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

/// Chat completion whose single user message carries text and an image.
#[derive(Serialize)]
struct VisionRequest<'a> {
    model: &'a str,
    messages: [VisionMessage; 1],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct VisionMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiCompatibleClient {
    pub fn from_config(config: &LlmConfig, client: Client) -> Self {
        let default_base_url = match config.provider {
            LlmProvider::OpenAi => OPENAI_BASE_URL,
            LlmProvider::Ollama => OLLAMA_BASE_URL,
        };
        let base_url = config.base_url.as_deref().unwrap_or(default_base_url);

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            embedding_model: config.embedding_model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let request = self.client.post(format!("{}/{path}", self.base_url));
        match &self.api_key {
            Some(api_key) => request.bearer_auth(api_key.expose_secret()),
            None => request,
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CollaboratorError> {
        let body = CompletionRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };
        let response =
            self.post("chat/completions").json(&body).send().await.map_err(transport_error)?;
        let payload: CompletionResponse =
            ensure_success(response).await?.json().await.map_err(transport_error)?;
        completion_text(payload)
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiCompatibleClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CollaboratorError> {
        let body = EmbeddingRequest { model: &self.embedding_model, input: text };
        let response = self.post("embeddings").json(&body).send().await.map_err(transport_error)?;
        let payload: EmbeddingResponse =
            ensure_success(response).await?.json().await.map_err(transport_error)?;
        first_embedding(payload)
    }
}

#[async_trait]
impl ImageAnalyzer for OpenAiCompatibleClient {
    async fn analyze(&self, image: &ImageData) -> Result<ImageAnalysis, CollaboratorError> {
        let body = vision_request(&self.model, self.max_tokens, image);
        let response =
            self.post("chat/completions").json(&body).send().await.map_err(transport_error)?;
        let payload: CompletionResponse =
            ensure_success(response).await?.json().await.map_err(transport_error)?;
        Ok(parse_image_analysis(&completion_text(payload)?))
    }
}

fn vision_request<'a>(model: &'a str, max_tokens: u32, image: &ImageData) -> VisionRequest<'a> {
    let data_url =
        format!("data:{};base64,{}", image.mime_type, BASE64_STANDARD.encode(&image.bytes));
    VisionRequest {
        model,
        messages: [VisionMessage {
            role: "user",
            content: vec![
                ContentPart::Text { text: VISION_PROMPT.to_owned() },
                ContentPart::ImageUrl { image_url: ImageUrl { url: data_url } },
            ],
        }],
        max_tokens,
        temperature: VISION_TEMPERATURE,
    }
}

fn completion_text(payload: CompletionResponse) -> Result<String, CollaboratorError> {
    payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_owned())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| CollaboratorError::Decode("completion returned no content".to_owned()))
}

fn first_embedding(payload: EmbeddingResponse) -> Result<Vec<f32>, CollaboratorError> {
    payload
        .data
        .into_iter()
        .next()
        .map(|data| data.embedding)
        .filter(|embedding| !embedding.is_empty())
        .ok_or_else(|| CollaboratorError::Decode("embedding response was empty".to_owned()))
}

#[cfg(test)]
mod tests {
    use concierge_agent::llm::ChatMessage;
    use concierge_agent::vision::VISION_PROMPT;
    use concierge_core::config::{AppConfig, LlmProvider};
    use concierge_core::domain::vision::ImageData;
    use concierge_core::errors::CollaboratorError;
    use serde_json::json;

    use super::{
        completion_text, first_embedding, vision_request, CompletionRequest, CompletionResponse,
        EmbeddingResponse, OpenAiCompatibleClient,
    };

    #[test]
    fn completion_request_uses_openai_wire_names() {
        let messages = vec![ChatMessage::system("be brief"), ChatMessage::user("hi")];
        let body = serde_json::to_value(CompletionRequest {
            model: "gpt-4o",
            messages: &messages,
            max_tokens: 500,
            temperature: 0.5,
        })
        .expect("serialize request");

        assert_eq!(
            body,
            json!({
                "model": "gpt-4o",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "hi"}
                ],
                "max_tokens": 500,
                "temperature": 0.5
            })
        );
    }

    #[test]
    fn vision_request_inlines_the_photo_as_a_data_url() {
        let image = ImageData { bytes: b"jpeg".to_vec(), mime_type: "image/jpeg".to_owned() };
        let body = serde_json::to_value(vision_request("gpt-4o", 500, &image))
            .expect("serialize request");

        let content = &body["messages"][0]["content"];
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(content[0], json!({"type": "text", "text": VISION_PROMPT}));
        assert_eq!(
            content[1],
            json!({"type": "image_url", "image_url": {"url": "data:image/jpeg;base64,anBlZw=="}})
        );
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 500);
    }

    #[test]
    fn completion_text_takes_the_first_choice() {
        let payload: CompletionResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": "  We ship worldwide. "}}]
        }))
        .expect("decode response");
        assert_eq!(completion_text(payload), Ok("We ship worldwide.".to_owned()));
    }

    #[test]
    fn empty_completion_is_a_decode_error() {
        let payload: CompletionResponse =
            serde_json::from_value(json!({"choices": []})).expect("decode response");
        assert!(matches!(completion_text(payload), Err(CollaboratorError::Decode(_))));
    }

    #[test]
    fn embedding_response_yields_the_first_vector() {
        let payload: EmbeddingResponse = serde_json::from_value(json!({
            "data": [{"embedding": [0.5, -0.25], "index": 0}]
        }))
        .expect("decode response");
        assert_eq!(first_embedding(payload), Ok(vec![0.5, -0.25]));
    }

    #[test]
    fn ollama_provider_defaults_to_local_endpoint() {
        let mut config = AppConfig::default().llm;
        config.provider = LlmProvider::Ollama;
        let client = OpenAiCompatibleClient::from_config(&config, reqwest::Client::new());
        assert_eq!(client.base_url, "http://localhost:11434/v1");
    }
}
