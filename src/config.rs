use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    advocate::{DEFAULT_STATEMENT_PASSAGES, DEFAULT_STATEMENT_TOKENS},
    evaluator::{DEFAULT_EVALUATION_PASSAGES, DEFAULT_EVALUATION_QUERY, DEFAULT_EVALUATION_TOKENS},
    phase::SideProfile,
    prompt::PromptTemplates,
    retrieval::ChunkOptions,
    DebateError,
};

pub const DEFAULT_CASE_DESCRIPTION: &str = "This case concerns the rights of book authors versus LLM companies regarding the use of copyrighted literary works for training large language models without explicit permission or compensation to the authors.";

fn default_case_description() -> String {
    DEFAULT_CASE_DESCRIPTION.to_string()
}

fn default_case_title() -> String {
    "Authors vs. LLM Companies".to_string()
}

fn default_transcript_output() -> PathBuf {
    PathBuf::from("courtroom_transcript.txt")
}

/// Everything a debate run needs besides the provider itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateConfig {
    #[serde(default = "default_case_description")]
    pub case_description: String,
    #[serde(default = "default_case_title")]
    pub case_title: String,
    #[serde(default = "SideProfile::book_authors")]
    pub for_side: SideProfile,
    #[serde(default = "SideProfile::llm_companies")]
    pub against_side: SideProfile,
    #[serde(default)]
    pub generation: GenerationSettings,
    #[serde(default)]
    pub retrieval: RetrievalSettings,
    #[serde(default)]
    pub prompts: PromptTemplates,
    #[serde(default)]
    pub models: ModelSettings,
    #[serde(default)]
    pub documents: DocumentSettings,
    #[serde(default = "default_transcript_output")]
    pub transcript_output: PathBuf,
}

impl Default for DebateConfig {
    fn default() -> Self {
        Self {
            case_description: default_case_description(),
            case_title: default_case_title(),
            for_side: SideProfile::book_authors(),
            against_side: SideProfile::llm_companies(),
            generation: GenerationSettings::default(),
            retrieval: RetrievalSettings::default(),
            prompts: PromptTemplates::default(),
            models: ModelSettings::default(),
            documents: DocumentSettings::default(),
            transcript_output: default_transcript_output(),
        }
    }
}

impl DebateConfig {
    pub fn from_yaml_str(input: &str) -> Result<Self, DebateError> {
        Ok(serde_yaml::from_str(input)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, DebateError> {
        let raw = fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    pub fn to_yaml_string(&self) -> Result<String, DebateError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Checks that models are named and documents exist, creating the
    /// transcript's parent directory when it is missing.
    pub fn validate(&self) -> Result<(), DebateError> {
        if self.models.judge.as_deref().map_or(true, str::is_empty) {
            return Err(DebateError::InvalidConfig("judge model is required".into()));
        }
        if self.models.for_side.as_deref().map_or(true, str::is_empty) {
            return Err(DebateError::InvalidConfig("model for the 'for' side is required".into()));
        }
        if self.models.against_side.as_deref().map_or(true, str::is_empty) {
            return Err(DebateError::InvalidConfig(
                "model for the 'against' side is required".into(),
            ));
        }

        for path in [&self.documents.for_side, &self.documents.against_side] {
            if !path.exists() {
                return Err(DebateError::DocumentNotFound(path.clone()));
            }
        }

        if let Some(parent) = self.transcript_output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub statement_max_tokens: u32,
    pub evaluation_max_tokens: u32,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub timeout_ms: Option<u64>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            statement_max_tokens: DEFAULT_STATEMENT_TOKENS,
            evaluation_max_tokens: DEFAULT_EVALUATION_TOKENS,
            temperature: Some(0.7),
            top_p: Some(0.9),
            timeout_ms: None,
        }
    }
}

impl GenerationSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub statement_passages: usize,
    pub evaluation_passages: usize,
    pub evaluation_query: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub min_chunk_chars: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        let chunks = ChunkOptions::default();
        Self {
            statement_passages: DEFAULT_STATEMENT_PASSAGES,
            evaluation_passages: DEFAULT_EVALUATION_PASSAGES,
            evaluation_query: DEFAULT_EVALUATION_QUERY.to_string(),
            chunk_size: chunks.chunk_size,
            chunk_overlap: chunks.overlap,
            min_chunk_chars: chunks.min_chars,
        }
    }
}

impl RetrievalSettings {
    pub fn chunk_options(&self) -> ChunkOptions {
        ChunkOptions {
            chunk_size: self.chunk_size,
            overlap: self.chunk_overlap,
            min_chars: self.min_chunk_chars,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub judge: Option<String>,
    #[serde(rename = "for")]
    pub for_side: Option<String>,
    #[serde(rename = "against")]
    pub against_side: Option<String>,
    /// Embedding model for semantic retrieval; lexical ranking is used without one.
    pub embedding: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentSettings {
    #[serde(rename = "for")]
    pub for_side: PathBuf,
    #[serde(rename = "against")]
    pub against_side: PathBuf,
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self {
            for_side: PathBuf::from("data/inputs/for_motion.txt"),
            against_side: PathBuf::from("data/inputs/against_motion.txt"),
        }
    }
}
