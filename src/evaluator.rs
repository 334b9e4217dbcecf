use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    generation::GenerationClient,
    phase::{Phase, SideProfile},
    prompt::{PromptLibrary, PromptSection, PromptTemplate},
    retrieval::{PassageIndex, Retriever},
    transcript::Evaluation,
};

pub const DEFAULT_EVALUATION_TOKENS: u32 = 512;
pub const DEFAULT_EVALUATION_PASSAGES: usize = 4;
pub const DEFAULT_EVALUATION_QUERY: &str =
    "Key legal principles for fair use and copyright in digital contexts";

const SCORING_KEYWORDS: [&str; 6] = [
    "score",
    "rating",
    "point",
    "legal reasoning",
    "evidence",
    "persuasiveness",
];

/// Whether the text mentions scoring at all, ignoring case.
pub fn mentions_scoring(text: &str) -> bool {
    let lowered = text.to_lowercase();
    SCORING_KEYWORDS.iter().any(|keyword| lowered.contains(keyword))
}

/// Canned 7/7/7 block appended when a scored evaluation says nothing about scores.
pub fn default_score_block(for_side: &SideProfile, against_side: &SideProfile) -> String {
    format!(
        "Scores - {}: Legal Reasoning: 7, Evidence: 7, Persuasiveness: 7. {}: Legal Reasoning: 7, Evidence: 7, Persuasiveness: 7.",
        for_side.marker, against_side.marker
    )
}

/// The judge: compares both sides' statements against the combined corpus.
#[derive(Debug, Clone)]
pub struct Evaluator {
    case_description: String,
    for_side: SideProfile,
    against_side: SideProfile,
    index: Option<Arc<PassageIndex>>,
    client: GenerationClient,
    prompts: Arc<PromptLibrary>,
    query: String,
    max_tokens: u32,
    passages: usize,
}

impl Evaluator {
    pub fn new(
        case_description: impl Into<String>,
        for_side: SideProfile,
        against_side: SideProfile,
        client: GenerationClient,
    ) -> Self {
        Self {
            case_description: case_description.into(),
            for_side,
            against_side,
            index: None,
            client,
            prompts: Arc::new(PromptLibrary::default()),
            query: DEFAULT_EVALUATION_QUERY.to_string(),
            max_tokens: DEFAULT_EVALUATION_TOKENS,
            passages: DEFAULT_EVALUATION_PASSAGES,
        }
    }

    pub fn with_index(mut self, index: Option<Arc<PassageIndex>>) -> Self {
        self.index = index;
        self
    }

    pub fn with_prompts(mut self, prompts: Arc<PromptLibrary>) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_passages(mut self, passages: usize) -> Self {
        self.passages = passages;
        self
    }

    pub fn prompt(
        &self,
        for_text: &str,
        against_text: &str,
        phase: Phase,
        context: Vec<String>,
    ) -> PromptTemplate {
        let instruction = if phase == Phase::Final {
            self.prompts.verdict(phase, &self.for_side, &self.against_side)
        } else {
            self.prompts.scoring(phase, &self.for_side, &self.against_side)
        };

        PromptTemplate::new()
            .with_section(PromptSection::Case(self.case_description.clone()))
            .with_section(PromptSection::Context {
                heading: "Legal Context".to_string(),
                passages: context,
            })
            .with_section(PromptSection::Argument {
                heading: format!("Argument from {}", self.for_side.marker),
                text: for_text.to_string(),
            })
            .with_section(PromptSection::Argument {
                heading: format!("Argument from {}", self.against_side.marker),
                text: against_text.to_string(),
            })
            .with_section(PromptSection::Instruction(instruction))
    }

    pub async fn evaluate(
        &self,
        for_text: &str,
        against_text: &str,
        phase: Phase,
        retriever: &dyn Retriever,
    ) -> Evaluation {
        let context = retriever
            .retrieve(&self.query, self.index.as_deref(), self.passages)
            .await;
        debug!(phase = %phase, passages = context.len(), "legal context retrieved");

        let prompt = self.prompt(for_text, against_text, phase, context).render();
        let mut text = self.client.generate(&prompt, self.max_tokens).await;

        if phase != Phase::Final && !mentions_scoring(&text) {
            info!(phase = %phase, "evaluation carried no scores, adding default block");
            text.push_str("\n\n");
            text.push_str(&default_score_block(&self.for_side, &self.against_side));
        }

        Evaluation { phase, text }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        providers::scripted::ScriptedProvider,
        retrieval::LexicalRetriever,
        scoring::{ScoreAttribution, ScoreParser, ScoreTriple},
    };

    use super::*;

    fn evaluator(provider: Arc<ScriptedProvider>) -> Evaluator {
        Evaluator::new(
            "Authors v. Models",
            SideProfile::book_authors(),
            SideProfile::llm_companies(),
            GenerationClient::new(provider, "judge"),
        )
    }

    #[test]
    fn keyword_detection_ignores_case() {
        assert!(mentions_scoring("The EVIDENCE was thin."));
        assert!(mentions_scoring("Five points to the authors."));
        assert!(!mentions_scoring("Both sides spoke well."));
    }

    #[test]
    fn prompt_carries_both_unlabeled_arguments() {
        let evaluator = evaluator(Arc::new(ScriptedProvider::new()));
        let prompt = evaluator
            .prompt("Pay the authors.", "Fair use applies.", Phase::Opening, Vec::new())
            .render();

        assert!(prompt.contains("Argument from Book Authors:\nPay the authors."));
        assert!(prompt.contains("Argument from LLM Companies:\nFair use applies."));
        assert!(prompt.contains("Score each side (1-10)"));
    }

    #[test]
    fn final_prompt_asks_for_a_winner() {
        let evaluator = evaluator(Arc::new(ScriptedProvider::new()));
        let prompt = evaluator
            .prompt("a.", "b.", Phase::Final, Vec::new())
            .render();
        assert!(prompt.contains("final verdict"));
        assert!(!prompt.contains("Score each side"));
    }

    #[tokio::test]
    async fn scoreless_evaluation_gets_default_block() {
        let provider = Arc::new(ScriptedProvider::from_responses(["Both sides spoke well."]));
        let evaluation = evaluator(provider)
            .evaluate("a.", "b.", Phase::FirstRebuttal, &LexicalRetriever)
            .await;

        assert!(evaluation.text.starts_with("Both sides spoke well.\n\nScores - Book Authors"));
        assert!(evaluation.label().starts_with("Judge (rebuttal):\n"));

        let parser = ScoreParser::from_profiles(&SideProfile::book_authors(), &SideProfile::llm_companies());
        let scores = parser.attribute(&evaluation.text);
        assert_eq!(scores.for_side, ScoreTriple::DEFAULT);
        assert_eq!(scores.against, ScoreTriple::DEFAULT);
    }

    #[tokio::test]
    async fn counsel_headings_survive_to_attribution() {
        let provider = Arc::new(ScriptedProvider::from_responses([
            "Book Authors' Counsel: Legal Reasoning: 8, Evidence: 6, Persuasiveness: 9.\n\
             LLM Companies' Counsel: Legal Reasoning: 5, Evidence: 5, Persuasiveness: 5.",
        ]));
        let evaluation = evaluator(provider)
            .evaluate("a.", "b.", Phase::Opening, &LexicalRetriever)
            .await;

        assert!(evaluation.text.starts_with("Book Authors' Counsel: Legal Reasoning: 8"));

        let parser = ScoreParser::from_profiles(&SideProfile::book_authors(), &SideProfile::llm_companies());
        let scores = parser.attribute(&evaluation.text);
        assert_eq!(scores.for_side, ScoreTriple::new(8, 6, 9));
        assert_eq!(scores.against, ScoreTriple::new(5, 5, 5));
    }

    #[tokio::test]
    async fn final_evaluation_is_left_untouched() {
        let provider = Arc::new(ScriptedProvider::from_responses(["The authors prevail."]));
        let evaluation = evaluator(provider)
            .evaluate("a.", "b.", Phase::Final, &LexicalRetriever)
            .await;
        assert_eq!(evaluation.text, "The authors prevail.");
    }

    #[tokio::test]
    async fn uses_the_fixed_query_regardless_of_phase() {
        let provider = Arc::new(ScriptedProvider::from_responses(["Score: 5.", "Score: 6."]));
        let index = PassageIndex::from_chunks(
            None,
            vec![
                "Unrelated passage about weather.".into(),
                "Fair use and copyright principles in digital contexts.".into(),
            ],
        )
        .map(Arc::new);
        let evaluator = evaluator(Arc::clone(&provider))
            .with_index(index)
            .with_passages(1);

        evaluator.evaluate("a.", "b.", Phase::Opening, &LexicalRetriever).await;
        evaluator.evaluate("a.", "b.", Phase::SecondRebuttal, &LexicalRetriever).await;

        for prompt in provider.prompts() {
            assert!(prompt.contains("Legal Context:\nFair use and copyright principles"));
        }
    }
}
