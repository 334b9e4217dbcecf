use std::{sync::Arc, time::Duration};

use tokio::time;
use tracing::{debug, warn};

use crate::{
    text::{clean_response, GENERATION_FAILURE},
    types::CompletionRequest,
    LLMProvider,
};

/// A provider bound to one model and one set of sampling settings.
///
/// [`GenerationClient::generate`] never fails: provider errors, timeouts and
/// empty replies all come back as [`GENERATION_FAILURE`]. Successful replies
/// are passed through [`clean_response`].
#[derive(Clone)]
pub struct GenerationClient {
    provider: Arc<dyn LLMProvider>,
    model: String,
    temperature: Option<f32>,
    top_p: Option<f32>,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for GenerationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationClient")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GenerationClient {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: None,
            top_p: None,
            timeout: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub async fn generate(&self, prompt: &str, max_tokens: u32) -> String {
        let mut request = CompletionRequest::from_prompt(self.model.clone(), prompt, max_tokens);

        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }

        if let Some(top_p) = self.top_p {
            request = request.with_top_p(top_p);
        }

        let call = self.provider.complete(request);
        let result = match self.timeout {
            Some(limit) => match time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(model = %self.model, timeout_ms = limit.as_millis() as u64, "generation timed out");
                    return GENERATION_FAILURE.to_string();
                }
            },
            None => call.await,
        };

        match result {
            Ok(response) => {
                let raw = response.message.text().unwrap_or_default();
                // Some servers echo the prompt before the completion.
                let raw = raw.strip_prefix(prompt).unwrap_or(raw);
                if raw.trim().is_empty() {
                    warn!(model = %self.model, "generation returned no text");
                    return GENERATION_FAILURE.to_string();
                }
                let completion_tokens = response.usage.map(|usage| usage.completion_tokens);
                debug!(model = %self.model, chars = raw.len(), ?completion_tokens, "generation completed");
                clean_response(raw)
            }
            Err(err) => {
                warn!(model = %self.model, error = %err, "generation failed");
                GENERATION_FAILURE.to_string()
            }
        }
    }
}
