use std::{collections::HashSet, path::Path, sync::Arc};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{types::EmbeddingRequest, DebateError, LLMError, LLMProvider};

pub mod chunking;

pub use chunking::{chunk_text, load_document, ChunkOptions};

#[derive(Debug, Clone, PartialEq)]
pub struct Passage {
    pub text: String,
    pub source: Option<String>,
    pub position: usize,
    pub embedding: Option<Vec<f32>>,
}

/// Read-only set of passages that a [`Retriever`] searches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassageIndex {
    passages: Vec<Passage>,
}

impl PassageIndex {
    /// Builds an index over document chunks; `None` when there is nothing to index.
    pub fn from_chunks(source: Option<&str>, chunks: Vec<String>) -> Option<Self> {
        if chunks.is_empty() {
            return None;
        }

        let passages = chunks
            .into_iter()
            .enumerate()
            .map(|(position, text)| Passage {
                text,
                source: source.map(str::to_string),
                position,
                embedding: None,
            })
            .collect();

        Some(Self { passages })
    }

    /// Concatenates several indexes, keeping each passage's source.
    pub fn merge<'a, I>(indexes: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a PassageIndex>,
    {
        let passages: Vec<Passage> = indexes
            .into_iter()
            .flat_map(|index| index.passages.iter().cloned())
            .collect();

        if passages.is_empty() {
            None
        } else {
            Some(Self { passages })
        }
    }

    pub fn passages(&self) -> &[Passage] {
        &self.passages
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub fn is_embedded(&self) -> bool {
        !self.passages.is_empty() && self.passages.iter().all(|passage| passage.embedding.is_some())
    }

    /// Attaches an embedding to every passage using a single batched request.
    pub async fn embed(mut self, provider: &dyn LLMProvider, model: &str) -> Result<Self, LLMError> {
        let input = self.passages.iter().map(|passage| passage.text.clone()).collect();
        let response = provider
            .create_embeddings(EmbeddingRequest::new(model, input))
            .await?;

        if response.data.len() != self.passages.len() {
            return Err(LLMError::InvalidResponse(
                "embedding count does not match passage count",
            ));
        }

        for embedding in response.data {
            let passage = self
                .passages
                .get_mut(embedding.index)
                .ok_or(LLMError::InvalidResponse("embedding index out of range"))?;
            passage.embedding = Some(embedding.embedding);
        }

        debug!(passages = self.passages.len(), model, "index embedded");
        Ok(self)
    }
}

/// Per-side indexes plus the combined corpus the judge searches.
#[derive(Debug, Clone, Default)]
pub struct CaseIndexes {
    pub for_side: Option<Arc<PassageIndex>>,
    pub against_side: Option<Arc<PassageIndex>>,
    pub combined: Option<Arc<PassageIndex>>,
}

impl CaseIndexes {
    pub fn new(for_side: Option<PassageIndex>, against_side: Option<PassageIndex>) -> Self {
        let combined = PassageIndex::merge(for_side.iter().chain(against_side.iter()));
        Self {
            for_side: for_side.map(Arc::new),
            against_side: against_side.map(Arc::new),
            combined: combined.map(Arc::new),
        }
    }

    /// Chunks both documents. A document that yields no passages leaves its
    /// side without an index; a missing file is an error.
    pub fn load(
        for_path: impl AsRef<Path>,
        against_path: impl AsRef<Path>,
        options: ChunkOptions,
    ) -> Result<Self, DebateError> {
        let for_path = for_path.as_ref();
        let against_path = against_path.as_ref();

        let for_side = PassageIndex::from_chunks(
            Some(&for_path.display().to_string()),
            load_document(for_path, options)?,
        );
        let against_side = PassageIndex::from_chunks(
            Some(&against_path.display().to_string()),
            load_document(against_path, options)?,
        );

        if for_side.is_none() || against_side.is_none() {
            warn!("a case document produced no passages, its side will argue without context");
        }

        Ok(Self::new(for_side, against_side))
    }

    /// Embeds every index. Each side is embedded once and the combined corpus
    /// is rebuilt from the embedded halves.
    pub async fn embed(self, provider: &dyn LLMProvider, model: &str) -> Result<Self, LLMError> {
        let for_side = match self.for_side {
            Some(index) => Some(index.as_ref().clone().embed(provider, model).await?),
            None => None,
        };
        let against_side = match self.against_side {
            Some(index) => Some(index.as_ref().clone().embed(provider, model).await?),
            None => None,
        };
        Ok(Self::new(for_side, against_side))
    }
}

/// Picks the retriever for a run and embeds the indexes when it is semantic.
///
/// Without an embedding model, or with a provider that cannot embed, passages
/// are ranked lexically and the indexes are returned untouched.
pub async fn select_retriever(
    provider: Arc<dyn LLMProvider>,
    indexes: CaseIndexes,
    embedding_model: Option<&str>,
) -> Result<(CaseIndexes, Arc<dyn Retriever>), DebateError> {
    let Some(model) = embedding_model else {
        return Ok((indexes, Arc::new(LexicalRetriever)));
    };

    if !provider.capabilities().supports_embeddings {
        warn!(
            provider = provider.name(),
            model, "provider cannot embed, ranking passages lexically"
        );
        return Ok((indexes, Arc::new(LexicalRetriever)));
    }

    let indexes = indexes.embed(provider.as_ref(), model).await?;
    Ok((indexes, Arc::new(EmbeddingRetriever::new(provider, model))))
}

/// Looks up the passages most relevant to a query.
///
/// Implementations never fail: a missing index, an empty index or a lookup
/// error all produce an empty result.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, index: Option<&PassageIndex>, k: usize) -> Vec<String>;
}

/// Ranks passages by how many distinct query terms they contain.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalRetriever;

#[async_trait]
impl Retriever for LexicalRetriever {
    async fn retrieve(&self, query: &str, index: Option<&PassageIndex>, k: usize) -> Vec<String> {
        match index {
            Some(index) => lexical_rank(query, index, k),
            None => Vec::new(),
        }
    }
}

/// Nearest neighbours by cosine similarity between query and passage embeddings.
///
/// Indexes without embeddings, and queries whose embedding request fails, are
/// ranked lexically instead.
#[derive(Clone)]
pub struct EmbeddingRetriever {
    provider: Arc<dyn LLMProvider>,
    model: String,
}

impl EmbeddingRetriever {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, LLMError> {
        let response = self
            .provider
            .create_embeddings(EmbeddingRequest::new(&self.model, vec![query.to_string()]))
            .await?;

        response
            .data
            .into_iter()
            .next()
            .map(|embedding| embedding.embedding)
            .ok_or(LLMError::InvalidResponse("embedding response was empty"))
    }
}

#[async_trait]
impl Retriever for EmbeddingRetriever {
    async fn retrieve(&self, query: &str, index: Option<&PassageIndex>, k: usize) -> Vec<String> {
        let Some(index) = index else {
            return Vec::new();
        };

        if !index.is_embedded() {
            debug!("index has no embeddings, ranking lexically");
            return lexical_rank(query, index, k);
        }

        let query_embedding = match self.embed_query(query).await {
            Ok(embedding) => embedding,
            Err(err) => {
                warn!(error = %err, "query embedding failed, ranking lexically");
                return lexical_rank(query, index, k);
            }
        };

        let mut scored: Vec<(f32, &Passage)> = index
            .passages()
            .iter()
            .map(|passage| {
                let similarity = passage
                    .embedding
                    .as_deref()
                    .map(|embedding| cosine_similarity(&query_embedding, embedding))
                    .unwrap_or(0.0);
                (similarity, passage)
            })
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored
            .into_iter()
            .take(k)
            .map(|(_, passage)| passage.text.clone())
            .collect()
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|term| term.chars().count() > 2)
        .map(str::to_lowercase)
        .collect()
}

fn lexical_rank(query: &str, index: &PassageIndex, k: usize) -> Vec<String> {
    let query_terms = terms(query);
    let mut scored: Vec<(usize, &Passage)> = index
        .passages()
        .iter()
        .map(|passage| {
            let passage_terms = terms(&passage.text);
            (query_terms.intersection(&passage_terms).count(), passage)
        })
        .collect();

    // Stable sort keeps document order among equally relevant passages.
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored
        .into_iter()
        .take(k)
        .map(|(_, passage)| passage.text.clone())
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}
