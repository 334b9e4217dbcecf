use std::sync::Arc;

use tracing::debug;

use crate::{
    generation::GenerationClient,
    phase::{Phase, Side, SideProfile},
    prompt::{PromptLibrary, PromptSection, PromptTemplate},
    retrieval::{PassageIndex, Retriever},
    text::{complete_sentence, strip_speaker_label, GENERATION_FAILURE},
    transcript::Statement,
};

pub const DEFAULT_STATEMENT_TOKENS: u32 = 180;
pub const DEFAULT_STATEMENT_PASSAGES: usize = 3;

/// Counsel for one side: retrieves from that side's documents and argues.
#[derive(Debug, Clone)]
pub struct ArgumentGenerator {
    side: Side,
    profile: SideProfile,
    case_description: String,
    index: Option<Arc<PassageIndex>>,
    client: GenerationClient,
    prompts: Arc<PromptLibrary>,
    max_tokens: u32,
    passages: usize,
}

impl ArgumentGenerator {
    pub fn new(
        side: Side,
        profile: SideProfile,
        case_description: impl Into<String>,
        client: GenerationClient,
    ) -> Self {
        Self {
            side,
            profile,
            case_description: case_description.into(),
            index: None,
            client,
            prompts: Arc::new(PromptLibrary::default()),
            max_tokens: DEFAULT_STATEMENT_TOKENS,
            passages: DEFAULT_STATEMENT_PASSAGES,
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

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_passages(mut self, passages: usize) -> Self {
        self.passages = passages;
        self
    }

    pub fn profile(&self) -> &SideProfile {
        &self.profile
    }

    pub fn query(&self, phase: Phase, previous: Option<&str>) -> String {
        match (phase, previous) {
            (Phase::Opening, _) => format!("arguments supporting {}", self.profile.position),
            (Phase::FirstRebuttal | Phase::SecondRebuttal, Some(previous)) => {
                format!("counter this: {previous}")
            }
            (Phase::Closing, _) => {
                format!("summarize strongest points for {}", self.profile.position)
            }
            _ => format!("legal arguments for the {} side", self.side),
        }
    }

    pub fn prompt(&self, phase: Phase, context: Vec<String>, previous: Option<&str>) -> PromptTemplate {
        let mut instruction = self.prompts.statement(&self.profile, phase);
        if phase.is_rebuttal() {
            if let Some(previous) = previous {
                instruction.push(' ');
                instruction.push_str(&self.prompts.rebuttal(previous));
            }
        }

        PromptTemplate::new()
            .with_section(PromptSection::Case(self.case_description.clone()))
            .with_section(PromptSection::Context {
                heading: "Document Context".to_string(),
                passages: context,
            })
            .with_section(PromptSection::Instruction(instruction))
    }

    /// Produces this side's statement for `phase`; `previous` is the opponent's
    /// last statement text when rebutting.
    pub async fn generate(
        &self,
        phase: Phase,
        retriever: &dyn Retriever,
        previous: Option<&str>,
    ) -> Statement {
        let query = self.query(phase, previous);
        let context = retriever
            .retrieve(&query, self.index.as_deref(), self.passages)
            .await;
        debug!(side = %self.side, phase = %phase, passages = context.len(), "context retrieved");

        let prompt = self.prompt(phase, context, previous).render();
        let generated = self.client.generate(&prompt, self.max_tokens).await;
        let text = match strip_speaker_label(&generated, &self.profile.agent_name) {
            "" => GENERATION_FAILURE.to_string(),
            body => complete_sentence(body.to_string()),
        };

        Statement {
            side: self.side,
            phase,
            speaker: self.profile.agent_name.clone(),
            text,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        providers::scripted::ScriptedProvider,
        retrieval::{LexicalRetriever, PassageIndex},
    };

    use super::*;

    fn generator(provider: Arc<ScriptedProvider>) -> ArgumentGenerator {
        ArgumentGenerator::new(
            Side::For,
            SideProfile::book_authors(),
            "Authors v. Models",
            GenerationClient::new(provider, "lawyer"),
        )
    }

    #[test]
    fn queries_depend_on_phase() {
        let generator = generator(Arc::new(ScriptedProvider::new()));
        assert!(generator
            .query(Phase::Opening, None)
            .starts_with("arguments supporting arguing for copyright"));
        assert_eq!(
            generator.query(Phase::SecondRebuttal, Some("Training is fair use.")),
            "counter this: Training is fair use."
        );
        assert_eq!(
            generator.query(Phase::FirstRebuttal, None),
            "legal arguments for the for side"
        );
        assert!(generator
            .query(Phase::Closing, None)
            .starts_with("summarize strongest points for"));
    }

    #[test]
    fn rebuttal_prompt_quotes_the_opponent() {
        let generator = generator(Arc::new(ScriptedProvider::new()));
        let prompt = generator
            .prompt(Phase::FirstRebuttal, vec!["passage".into()], Some("It is fair use."))
            .render();

        assert!(prompt.starts_with("Case: Authors v. Models"));
        assert!(prompt.contains("Document Context:\npassage"));
        assert!(prompt.contains("provide a concise and powerful rebuttal statement."));
        assert!(prompt.ends_with("Directly counter this argument: 'It is fair use.'"));
    }

    #[test]
    fn opening_prompt_has_no_counter_instruction() {
        let generator = generator(Arc::new(ScriptedProvider::new()));
        let prompt = generator.prompt(Phase::Opening, Vec::new(), Some("ignored")).render();
        assert!(!prompt.contains("Directly counter"));
    }

    #[tokio::test]
    async fn statement_is_labeled_and_completed() {
        let provider = Arc::new(ScriptedProvider::from_responses(["Authors deserve payment"]));
        let index = PassageIndex::from_chunks(None, vec!["Authors own their works.".into()])
            .map(Arc::new);
        let generator = generator(Arc::clone(&provider)).with_index(index);

        let statement = generator.generate(Phase::Opening, &LexicalRetriever, None).await;

        assert_eq!(statement.text, "Authors deserve payment.");
        assert_eq!(
            statement.label(),
            "Book Authors' Counsel (opening): Authors deserve payment."
        );
        assert!(provider.prompts()[0].contains("Authors own their works."));
    }

    #[tokio::test]
    async fn echoed_own_label_is_removed() {
        let provider = Arc::new(ScriptedProvider::from_responses([
            "Book Authors' Counsel (opening): Authors deserve payment.",
        ]));
        let statement = generator(provider)
            .generate(Phase::Opening, &LexicalRetriever, None)
            .await;

        assert_eq!(statement.text, "Authors deserve payment.");
    }

    #[tokio::test]
    async fn bare_label_counts_as_a_failed_generation() {
        let provider = Arc::new(ScriptedProvider::from_responses(["Book Authors' Counsel:"]));
        let statement = generator(provider)
            .generate(Phase::Opening, &LexicalRetriever, None)
            .await;

        assert_eq!(statement.text, GENERATION_FAILURE);
    }

    #[tokio::test]
    async fn generation_failure_yields_placeholder() {
        let generator = generator(Arc::new(ScriptedProvider::new()));
        let statement = generator.generate(Phase::Closing, &LexicalRetriever, None).await;
        assert_eq!(statement.text, GENERATION_FAILURE);
    }
}
