pub mod error;
pub mod providers;
pub mod types;
pub mod phase;
pub mod text;
pub mod scoring;
pub mod prompt;
pub mod generation;
pub mod retrieval;
pub mod transcript;
pub mod advocate;
pub mod evaluator;
pub mod config;
pub mod orchestrator;

pub use error::{DebateError, LLMError};
pub use providers::LLMProvider;
pub use types::{
    ChatMessage, CompletionRequest, CompletionResponse, Embedding, EmbeddingRequest,
    EmbeddingResponse, MessageRole, ProviderCapabilities, TokenUsage,
};
pub use phase::{Phase, Side, SideProfile};
pub use text::{clean_response, GENERATION_FAILURE};
pub use scoring::{
    extract_scores, MarkerAttribution, ScoreAttribution, ScoreLedger, ScoreParser, ScoreTriple,
    SideScores, StructuredAttribution,
};
pub use prompt::{PromptLibrary, PromptSection, PromptTemplate, PromptTemplates};
pub use generation::GenerationClient;
pub use retrieval::{
    select_retriever, CaseIndexes, ChunkOptions, EmbeddingRetriever, LexicalRetriever, Passage,
    PassageIndex, Retriever,
};
pub use transcript::{
    Evaluation, FileTranscriptSink, MemoryTranscriptSink, Statement, Transcript, TranscriptBlock,
    TranscriptSink,
};
pub use advocate::ArgumentGenerator;
pub use evaluator::Evaluator;
pub use config::DebateConfig;
pub use orchestrator::{DebateEvent, DebateOrchestrator, DebateProgress, DebateRun, DebateState};
