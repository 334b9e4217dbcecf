use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One chat turn on the wire. Debate prompts are always a single user turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: Some(content.into()),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: Some(content.into()),
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.content.as_deref()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

impl CompletionRequest {
    /// A request carrying `prompt` as its only message.
    pub fn from_prompt(model: impl Into<String>, prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            messages: vec![ChatMessage::user(prompt)],
            max_tokens: Some(max_tokens),
            temperature: None,
            top_p: None,
        }
    }

    pub fn with_temperature(mut self, value: f32) -> Self {
        self.temperature = Some(value);
        self
    }

    pub fn with_top_p(mut self, value: f32) -> Self {
        self.top_p = Some(value);
        self
    }

    /// Text of the last user message.
    pub fn prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == MessageRole::User)
            .and_then(ChatMessage::text)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub message: ChatMessage,
    pub usage: Option<TokenUsage>,
}

/// Batch of texts to embed; results come back tagged with their input index.
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingRequest {
    pub model: String,
    pub input: Vec<String>,
}

impl EmbeddingRequest {
    pub fn new(model: impl Into<String>, input: Vec<String>) -> Self {
        Self {
            model: model.into(),
            input,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Embedding {
    pub embedding: Vec<f32>,
    pub index: usize,
}

#[derive(Debug, Clone)]
pub struct EmbeddingResponse {
    pub data: Vec<Embedding>,
}

/// What a provider can do besides chat completions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProviderCapabilities {
    pub supports_embeddings: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_request_serializes_as_a_single_user_turn() {
        let request = CompletionRequest::from_prompt("judge", "Score both sides.", 512)
            .with_temperature(0.7);
        let body = serde_json::to_value(&request).expect("serializes");

        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Score both sides.");
        assert_eq!(body["max_tokens"], 512);
        assert!(body.get("top_p").is_none());
        assert_eq!(request.prompt(), Some("Score both sides."));
    }

    #[test]
    fn null_content_deserializes_as_none() {
        let message: ChatMessage =
            serde_json::from_str(r#"{"role": "assistant", "content": null}"#).expect("parses");
        assert_eq!(message.role, MessageRole::Assistant);
        assert!(message.text().is_none());
    }
}
