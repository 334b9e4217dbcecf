use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LLMError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("missing API key: set the {0} environment variable")]
    MissingApiKey(&'static str),

    #[error("invalid response from provider: {0}")]
    InvalidResponse(&'static str),

    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
}

#[derive(Debug, Error)]
pub enum DebateError {
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid debate config: {0}")]
    InvalidConfig(String),

    #[error("document not found: {0}")]
    DocumentNotFound(PathBuf),

    #[error("template error: {0}")]
    Template(#[from] handlebars::TemplateError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transcript sink failed: {0}")]
    Sink(String),

    #[error("debate already finished")]
    AlreadyFinished,

    #[error(transparent)]
    Provider(#[from] LLMError),
}
