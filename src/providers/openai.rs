use std::{env, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};

use crate::{
    error::LLMError,
    providers::LLMProvider,
    types::{
        ChatMessage, CompletionRequest, CompletionResponse, Embedding, EmbeddingRequest,
        EmbeddingResponse, ProviderCapabilities, TokenUsage,
    },
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub base_url: String,
    pub organization: Option<String>,
    pub request_timeout: Duration,
}

impl OpenAIConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            organization: None,
            request_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Any endpoint speaking the OpenAI chat-completions and embeddings protocol,
/// including local inference servers that emulate it.
#[derive(Debug, Clone)]
pub struct OpenAI {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAI {
    pub fn new(api_key: impl Into<String>) -> Result<Self, LLMError> {
        Self::from_config(OpenAIConfig::new(api_key))
    }

    pub fn from_env() -> Result<Self, LLMError> {
        let api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| LLMError::MissingApiKey("OPENAI_API_KEY"))?;
        let mut config = OpenAIConfig::new(api_key);

        if let Ok(base_url) = env::var("OPENAI_BASE_URL") {
            config.base_url = base_url;
        }
        if let Ok(org) = env::var("OPENAI_ORGANIZATION") {
            config.organization = Some(org);
        }
        if let Ok(timeout_ms) = env::var("OPENAI_REQUEST_TIMEOUT_MS") {
            if let Ok(ms) = timeout_ms.parse::<u64>() {
                config.request_timeout = Duration::from_millis(ms);
            }
        }

        Self::from_config(config)
    }

    pub fn from_config(config: OpenAIConfig) -> Result<Self, LLMError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn with_default_headers(&self, builder: RequestBuilder) -> RequestBuilder {
        let mut builder = builder.bearer_auth(&self.config.api_key);

        if let Some(ref org) = self.config.organization {
            builder = builder.header("OpenAI-Organization", org);
        }

        builder
    }
}

#[derive(Debug, Serialize)]
struct OpenAIRequestBody {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ResponseChoice>,
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct ResponseChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorEnvelope {
    error: OpenAIError,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    message: String,
}

#[derive(Debug, Serialize)]
struct OpenAIEmbeddingRequestBody {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<Embedding>,
}

async fn ensure_success(response: Response) -> Result<Response, LLMError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await?;
    if let Ok(error) = serde_json::from_str::<OpenAIErrorEnvelope>(&text) {
        return Err(LLMError::Provider(error.error.message));
    }

    Err(LLMError::Provider(format!("unexpected status {status}: {text}")))
}

#[async_trait]
impl LLMProvider for OpenAI {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, LLMError> {
        let CompletionRequest {
            model,
            messages,
            max_tokens,
            temperature,
            top_p,
        } = request;

        let body = OpenAIRequestBody {
            model,
            messages,
            max_tokens,
            temperature,
            top_p,
        };

        let builder = self
            .with_default_headers(self.client.post(self.endpoint("chat/completions")))
            .json(&body);

        let response = ensure_success(builder.send().await?).await?;

        let parsed: ChatCompletionResponse = response.json().await?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or(LLMError::InvalidResponse("response did not contain any choices"))?;

        Ok(CompletionResponse {
            message: choice.message,
            usage: parsed.usage,
        })
    }

    async fn create_embeddings(
        &self,
        request: EmbeddingRequest,
    ) -> Result<EmbeddingResponse, LLMError> {
        let body = OpenAIEmbeddingRequestBody {
            model: request.model,
            input: request.input,
        };

        let builder = self
            .with_default_headers(self.client.post(self.endpoint("embeddings")))
            .json(&body);

        let response = ensure_success(builder.send().await?).await?;
        let parsed: OpenAIEmbeddingResponse = response.json().await?;

        Ok(EmbeddingResponse { data: parsed.data })
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_embeddings: true,
        }
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::{OpenAI, OpenAIConfig, OpenAIEmbeddingResponse};
    use crate::{providers::LLMProvider, types::ProviderCapabilities};

    #[test]
    fn endpoint_joins_without_double_slashes() {
        let provider = OpenAI::from_config(
            OpenAIConfig::new("key").with_base_url("http://localhost:8080/v1/"),
        )
        .expect("client should build");

        assert_eq!(
            provider.endpoint("/chat/completions"),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn advertises_embedding_support() {
        let provider = OpenAI::new("key").expect("client should build");
        assert_eq!(
            provider.capabilities(),
            ProviderCapabilities {
                supports_embeddings: true
            }
        );
    }

    #[test]
    fn embedding_payload_ignores_model_and_usage() {
        let parsed: OpenAIEmbeddingResponse = serde_json::from_str(
            r#"{"object": "list", "model": "text-embedding-3-small",
                "data": [{"object": "embedding", "index": 1, "embedding": [0.5, 0.25]}],
                "usage": {"prompt_tokens": 4, "total_tokens": 4}}"#,
        )
        .expect("payload parses");

        assert_eq!(parsed.data.len(), 1);
        assert_eq!(parsed.data[0].index, 1);
        assert_eq!(parsed.data[0].embedding, vec![0.5, 0.25]);
    }
}
