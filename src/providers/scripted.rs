use std::{collections::VecDeque, fs, path::Path, sync::Mutex};

use async_trait::async_trait;

use crate::{
    providers::LLMProvider,
    types::{ChatMessage, CompletionRequest, CompletionResponse},
    DebateError, LLMError,
};

/// Replays canned responses in order and records every prompt it was asked to complete.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Loads a YAML sequence of response strings.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, DebateError> {
        let raw = fs::read_to_string(path)?;
        let responses: Vec<String> = serde_yaml::from_str(&raw)?;
        Ok(Self::from_responses(responses))
    }

    pub fn remaining(&self) -> usize {
        self.lock_responses().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        match self.prompts.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn lock_responses(&self) -> std::sync::MutexGuard<'_, VecDeque<String>> {
        match self.responses.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LLMError> {
        if let Some(prompt) = request.prompt() {
            match self.prompts.lock() {
                Ok(mut guard) => guard.push(prompt.to_string()),
                Err(poisoned) => poisoned.into_inner().push(prompt.to_string()),
            }
        }

        let response = self
            .lock_responses()
            .pop_front()
            .ok_or_else(|| LLMError::Provider("no more scripted responses".to_string()))?;

        Ok(CompletionResponse {
            message: ChatMessage::assistant(response),
            usage: None,
        })
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
