use std::sync::Arc;

use chrono::{Local, NaiveDate};
use tracing::{debug, info};

use crate::{
    advocate::ArgumentGenerator,
    config::DebateConfig,
    evaluator::Evaluator,
    generation::GenerationClient,
    phase::{Phase, Side, SideProfile},
    prompt::PromptLibrary,
    retrieval::{CaseIndexes, Retriever},
    scoring::{ScoreAttribution, ScoreLedger, ScoreParser},
    transcript::{Evaluation, SideTally, Statement, Transcript, TranscriptBlock, TranscriptSink},
    DebateError, LLMProvider,
};

/// Where a debate stands. Phases run strictly in [`Phase::ALL`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebateState {
    Init,
    InPhase(Phase),
    Done,
}

#[derive(Debug, Clone)]
pub enum DebateEvent {
    PhaseStarted { phase: Phase },
    Statement(Statement),
    Evaluation(Evaluation),
    ScoresUpdated { phase: Phase, ledger: ScoreLedger },
    Verdict { winner: Side, name: String },
}

/// Everything a debate has produced so far. Each call to
/// [`DebateOrchestrator::advance`] consumes one value and returns the next.
#[derive(Debug, Clone)]
pub struct DebateProgress {
    pub state: DebateState,
    pub ledger: ScoreLedger,
    pub transcript: Transcript,
    /// Both sides' statements from the most recent phase, FOR first.
    pub previous: Option<(Statement, Statement)>,
    pub winner: Option<Side>,
    pub events: Vec<DebateEvent>,
}

impl Default for DebateProgress {
    fn default() -> Self {
        Self {
            state: DebateState::Init,
            ledger: ScoreLedger::new(),
            transcript: Transcript::new(),
            previous: None,
            winner: None,
            events: Vec::new(),
        }
    }
}

impl DebateProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_done(&self) -> bool {
        self.state == DebateState::Done
    }
}

#[derive(Debug, Clone)]
pub struct DebateRun {
    pub transcript: Transcript,
    pub ledger: ScoreLedger,
    pub winner: Side,
    pub events: Vec<DebateEvent>,
}

impl DebateRun {
    pub fn render(&self) -> String {
        self.transcript.render()
    }
}

pub struct DebateOrchestrator {
    case_title: String,
    case_description: String,
    for_counsel: ArgumentGenerator,
    against_counsel: ArgumentGenerator,
    judge: Evaluator,
    retriever: Arc<dyn Retriever>,
    attribution: Box<dyn ScoreAttribution>,
    sink: Arc<dyn TranscriptSink>,
    date: Option<NaiveDate>,
    event_callback: Option<Arc<dyn Fn(&DebateEvent) + Send + Sync>>,
}

impl DebateOrchestrator {
    pub fn new(
        case_description: impl Into<String>,
        for_counsel: ArgumentGenerator,
        against_counsel: ArgumentGenerator,
        judge: Evaluator,
        retriever: Arc<dyn Retriever>,
        sink: Arc<dyn TranscriptSink>,
    ) -> Self {
        let attribution =
            ScoreParser::from_profiles(for_counsel.profile(), against_counsel.profile());
        Self {
            case_title: "Authors vs. LLM Companies".to_string(),
            case_description: case_description.into(),
            for_counsel,
            against_counsel,
            judge,
            retriever,
            attribution: Box::new(attribution),
            sink,
            date: None,
            event_callback: None,
        }
    }

    /// Wires generators, judge and scoring from a loaded configuration.
    pub fn from_config(
        config: &DebateConfig,
        provider: Arc<dyn LLMProvider>,
        indexes: CaseIndexes,
        retriever: Arc<dyn Retriever>,
        sink: Arc<dyn TranscriptSink>,
    ) -> Result<Self, DebateError> {
        let prompts = Arc::new(PromptLibrary::new(&config.prompts)?);
        let client = |model: &Option<String>, role: &str| -> Result<GenerationClient, DebateError> {
            let model = model
                .as_deref()
                .filter(|model| !model.is_empty())
                .ok_or_else(|| DebateError::InvalidConfig(format!("{role} model is required")))?;

            let mut client = GenerationClient::new(Arc::clone(&provider), model);
            if let Some(temperature) = config.generation.temperature {
                client = client.with_temperature(temperature);
            }
            if let Some(top_p) = config.generation.top_p {
                client = client.with_top_p(top_p);
            }
            if let Some(timeout) = config.generation.timeout() {
                client = client.with_timeout(timeout);
            }
            Ok(client)
        };

        let counsel = |side: Side, profile: &SideProfile, client, index| {
            ArgumentGenerator::new(side, profile.clone(), config.case_description.clone(), client)
                .with_index(index)
                .with_prompts(Arc::clone(&prompts))
                .with_max_tokens(config.generation.statement_max_tokens)
                .with_passages(config.retrieval.statement_passages)
        };

        let for_counsel = counsel(
            Side::For,
            &config.for_side,
            client(&config.models.for_side, "for")?,
            indexes.for_side,
        );
        let against_counsel = counsel(
            Side::Against,
            &config.against_side,
            client(&config.models.against_side, "against")?,
            indexes.against_side,
        );

        let judge = Evaluator::new(
            config.case_description.clone(),
            config.for_side.clone(),
            config.against_side.clone(),
            client(&config.models.judge, "judge")?,
        )
        .with_index(indexes.combined)
        .with_prompts(Arc::clone(&prompts))
        .with_query(config.retrieval.evaluation_query.clone())
        .with_max_tokens(config.generation.evaluation_max_tokens)
        .with_passages(config.retrieval.evaluation_passages);

        Ok(Self::new(
            config.case_description.clone(),
            for_counsel,
            against_counsel,
            judge,
            retriever,
            sink,
        )
        .with_case_title(config.case_title.clone()))
    }

    pub fn with_case_title(mut self, title: impl Into<String>) -> Self {
        self.case_title = title.into();
        self
    }

    /// Fixes the header date instead of reading the local clock.
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_attribution(mut self, attribution: impl ScoreAttribution + 'static) -> Self {
        self.attribution = Box::new(attribution);
        self
    }

    pub fn with_event_callback(mut self, callback: impl Fn(&DebateEvent) + Send + Sync + 'static) -> Self {
        self.event_callback = Some(Arc::new(callback));
        self
    }

    fn emit_event(&self, progress: &mut DebateProgress, event: DebateEvent) {
        if let Some(callback) = &self.event_callback {
            callback(&event);
        }
        progress.events.push(event);
    }

    /// Runs the debate to completion and hands the transcript to the sink once.
    pub async fn run(&self) -> Result<DebateRun, DebateError> {
        let mut progress = DebateProgress::new();
        while !progress.is_done() {
            progress = self.advance(progress).await?;
        }

        self.sink.write(progress.transcript.blocks())?;

        let winner = progress.winner.unwrap_or_else(|| progress.ledger.leader());
        let (for_total, against_total) = progress.ledger.totals();
        info!(winner = %winner, for_total, against_total, "debate finished");

        Ok(DebateRun {
            transcript: progress.transcript,
            ledger: progress.ledger,
            winner,
            events: progress.events,
        })
    }

    /// Performs one transition. Calling it on a finished debate is an error.
    pub async fn advance(&self, mut progress: DebateProgress) -> Result<DebateProgress, DebateError> {
        let phase = match progress.state {
            DebateState::Init => {
                let date = self.date.unwrap_or_else(|| Local::now().date_naive());
                progress.transcript.push(TranscriptBlock::Header {
                    date,
                    title: self.case_title.clone(),
                    case_description: self.case_description.clone(),
                });
                progress.state = DebateState::InPhase(Phase::Opening);
                return Ok(progress);
            }
            DebateState::InPhase(phase) => phase,
            DebateState::Done => return Err(DebateError::AlreadyFinished),
        };

        info!(phase = %phase, banner = phase.banner(), "phase started");
        self.emit_event(&mut progress, DebateEvent::PhaseStarted { phase });

        if phase == Phase::Final {
            self.conclude(&mut progress).await;
        } else {
            self.argue(phase, &mut progress).await;
        }

        progress.state = phase.next().map_or(DebateState::Done, DebateState::InPhase);
        Ok(progress)
    }

    async fn argue(&self, phase: Phase, progress: &mut DebateProgress) {
        // Each side rebuts what the other side said in the preceding phase.
        let (for_previous, against_previous) = match (&progress.previous, phase.is_rebuttal()) {
            (Some((for_statement, against_statement)), true) => (
                Some(against_statement.text.clone()),
                Some(for_statement.text.clone()),
            ),
            _ => (None, None),
        };

        let for_statement = self
            .for_counsel
            .generate(phase, self.retriever.as_ref(), for_previous.as_deref())
            .await;
        self.record_statement(progress, &for_statement);

        let against_statement = self
            .against_counsel
            .generate(phase, self.retriever.as_ref(), against_previous.as_deref())
            .await;
        self.record_statement(progress, &against_statement);

        if phase.is_scored() {
            let evaluation = self
                .judge
                .evaluate(
                    &for_statement.text,
                    &against_statement.text,
                    phase,
                    self.retriever.as_ref(),
                )
                .await;
            progress
                .transcript
                .push(TranscriptBlock::Evaluation(evaluation.clone()));

            progress.ledger = progress.ledger.apply(&evaluation.text, self.attribution.as_ref());
            let (for_total, against_total) = progress.ledger.totals();
            debug!(phase = %phase, for_total, against_total, "ledger updated");

            self.emit_event(progress, DebateEvent::Evaluation(evaluation));
            let ledger = progress.ledger;
            self.emit_event(progress, DebateEvent::ScoresUpdated { phase, ledger });
        }

        progress.previous = Some((for_statement, against_statement));
    }

    async fn conclude(&self, progress: &mut DebateProgress) {
        let for_profile = self.for_counsel.profile();
        let against_profile = self.against_counsel.profile();

        progress.transcript.push(TranscriptBlock::ScoreSummary {
            for_side: SideTally {
                name: for_profile.verdict_name.clone(),
                scores: progress.ledger.for_side,
            },
            against: SideTally {
                name: against_profile.verdict_name.clone(),
                scores: progress.ledger.against,
            },
        });

        let (for_closing, against_closing) = progress
            .previous
            .as_ref()
            .map(|(for_statement, against_statement)| {
                (for_statement.text.as_str(), against_statement.text.as_str())
            })
            .unwrap_or_default();

        let evaluation = self
            .judge
            .evaluate(for_closing, against_closing, Phase::Final, self.retriever.as_ref())
            .await;
        progress
            .transcript
            .push(TranscriptBlock::Evaluation(evaluation.clone()));
        self.emit_event(progress, DebateEvent::Evaluation(evaluation));

        let winner = progress.ledger.leader();
        let name = match winner {
            Side::For => for_profile.verdict_name.clone(),
            Side::Against => against_profile.verdict_name.clone(),
        };
        progress.transcript.push(TranscriptBlock::Verdict {
            winner,
            name: name.clone(),
        });
        progress.winner = Some(winner);
        info!(winner = %name, "verdict declared");
        self.emit_event(progress, DebateEvent::Verdict { winner, name });
    }

    fn record_statement(&self, progress: &mut DebateProgress, statement: &Statement) {
        debug!(side = %statement.side, phase = %statement.phase, "statement recorded");
        progress
            .transcript
            .push(TranscriptBlock::Statement(statement.clone()));
        self.emit_event(progress, DebateEvent::Statement(statement.clone()));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use crate::{
        providers::scripted::ScriptedProvider,
        retrieval::LexicalRetriever,
        scoring::{ScoreTriple, SideScores},
        text::GENERATION_FAILURE,
        transcript::MemoryTranscriptSink,
    };

    use super::*;

    fn orchestrator(provider: Arc<ScriptedProvider>, sink: Arc<MemoryTranscriptSink>) -> DebateOrchestrator {
        let client = GenerationClient::new(provider, "model");
        let for_counsel = ArgumentGenerator::new(
            Side::For,
            SideProfile::book_authors(),
            "Authors v. Models",
            client.clone(),
        );
        let against_counsel = ArgumentGenerator::new(
            Side::Against,
            SideProfile::llm_companies(),
            "Authors v. Models",
            client.clone(),
        );
        let judge = Evaluator::new(
            "Authors v. Models",
            SideProfile::book_authors(),
            SideProfile::llm_companies(),
            client,
        );

        DebateOrchestrator::new(
            "Authors v. Models",
            for_counsel,
            against_counsel,
            judge,
            Arc::new(LexicalRetriever),
            sink,
        )
        .with_date(NaiveDate::from_ymd_opt(2024, 5, 1).expect("valid date"))
    }

    struct FixedAttribution(SideScores);

    impl ScoreAttribution for FixedAttribution {
        fn attribute(&self, _evaluation: &str) -> SideScores {
            self.0
        }
    }

    #[tokio::test]
    async fn init_writes_only_the_header() {
        let orchestrator = orchestrator(
            Arc::new(ScriptedProvider::new()),
            Arc::new(MemoryTranscriptSink::new()),
        );
        let progress = orchestrator.advance(DebateProgress::new()).await.expect("advance");

        assert_eq!(progress.state, DebateState::InPhase(Phase::Opening));
        assert_eq!(progress.transcript.len(), 1);
        assert!(progress.transcript.render().contains("Date: 2024-05-01"));
    }

    #[tokio::test]
    async fn finished_debate_rejects_further_transitions() {
        let orchestrator = orchestrator(
            Arc::new(ScriptedProvider::new()),
            Arc::new(MemoryTranscriptSink::new()),
        );
        let progress = DebateProgress {
            state: DebateState::Done,
            ..DebateProgress::new()
        };
        let error = orchestrator.advance(progress).await.unwrap_err();
        assert!(matches!(error, DebateError::AlreadyFinished));
    }

    #[tokio::test]
    async fn rebuttals_answer_the_opposing_statement() {
        let provider = Arc::new(ScriptedProvider::from_responses([
            "Authors opening.",
            "Companies opening.",
            "Score: 5.",
            "Authors rebuttal.",
            "Companies rebuttal.",
        ]));
        let orchestrator = orchestrator(
            Arc::clone(&provider),
            Arc::new(MemoryTranscriptSink::new()),
        );

        let mut progress = DebateProgress::new();
        for _ in 0..3 {
            progress = orchestrator.advance(progress).await.expect("advance");
        }

        let prompts = provider.prompts();
        assert!(prompts[3].ends_with("Directly counter this argument: 'Companies opening.'"));
        assert!(prompts[4].ends_with("Directly counter this argument: 'Authors opening.'"));
        assert_eq!(progress.state, DebateState::InPhase(Phase::SecondRebuttal));
    }

    #[tokio::test]
    async fn closing_is_not_evaluated_and_failures_become_placeholders() {
        let provider = Arc::new(ScriptedProvider::new());
        let sink = Arc::new(MemoryTranscriptSink::new());
        let run = orchestrator(Arc::clone(&provider), Arc::clone(&sink))
            .with_attribution(FixedAttribution(SideScores::symmetric(ScoreTriple::DEFAULT)))
            .run()
            .await
            .expect("run completes");

        let closings: Vec<_> = run
            .transcript
            .blocks()
            .iter()
            .filter(|block| block.phase() == Some(Phase::Closing))
            .collect();
        assert_eq!(closings.len(), 2);
        assert!(closings
            .iter()
            .all(|block| matches!(block, TranscriptBlock::Statement(s) if s.text == GENERATION_FAILURE)));

        // Tied totals go to the against side.
        assert_eq!(run.ledger.totals(), (63, 63));
        assert_eq!(run.winner, Side::Against);
        assert_eq!(sink.written().len(), 1);
    }

    #[tokio::test]
    async fn events_are_reported_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let run = orchestrator(
            Arc::new(ScriptedProvider::new()),
            Arc::new(MemoryTranscriptSink::new()),
        )
        .with_event_callback(move |event| {
            if let DebateEvent::PhaseStarted { phase } = event {
                recorder.lock().expect("lock").push(*phase);
            }
        })
        .run()
        .await
        .expect("run completes");

        assert_eq!(*seen.lock().expect("lock"), Phase::ALL.to_vec());
        assert!(matches!(run.events.last(), Some(DebateEvent::Verdict { winner: Side::Against, .. })));
    }
}
