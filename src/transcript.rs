use std::{
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use crate::{
    phase::{Phase, Side},
    scoring::ScoreTriple,
    DebateError,
};

const RULE: &str = "================================";

/// One side's generated text for one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statement {
    pub side: Side,
    pub phase: Phase,
    pub speaker: String,
    pub text: String,
}

impl Statement {
    pub fn label(&self) -> String {
        format!("{} ({}): {}", self.speaker, self.phase.label(), self.text)
    }
}

/// The judge's text for one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    pub phase: Phase,
    pub text: String,
}

impl Evaluation {
    pub fn label(&self) -> String {
        format!("Judge ({}):\n{}", self.phase.label(), self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SideTally {
    pub name: String,
    pub scores: ScoreTriple,
}

impl SideTally {
    fn render(&self) -> String {
        format!(
            "{}:\n- Legal Reasoning: {}\n- Evidence: {}\n- Persuasiveness: {}\n- TOTAL: {}",
            self.name,
            self.scores.legal_reasoning,
            self.scores.evidence,
            self.scores.persuasiveness,
            self.scores.total()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TranscriptBlock {
    Header {
        date: NaiveDate,
        title: String,
        case_description: String,
    },
    Statement(Statement),
    Evaluation(Evaluation),
    ScoreSummary {
        for_side: SideTally,
        against: SideTally,
    },
    Verdict {
        winner: Side,
        name: String,
    },
}

impl TranscriptBlock {
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::Header { .. } => None,
            Self::Statement(statement) => Some(statement.phase),
            Self::Evaluation(evaluation) => Some(evaluation.phase),
            Self::ScoreSummary { .. } | Self::Verdict { .. } => Some(Phase::Final),
        }
    }

    pub fn text(&self) -> String {
        match self {
            Self::Header {
                date,
                title,
                case_description,
            } => format!(
                "{RULE}\nAI COURTROOM PROCEEDINGS\nDate: {}\nCase: {title}\n{RULE}\n\n{}\n",
                date.format("%Y-%m-%d"),
                case_description.trim()
            ),
            Self::Statement(statement) => format!("{}\n", statement.label()),
            Self::Evaluation(evaluation) => format!("{}\n", evaluation.label()),
            Self::ScoreSummary { for_side, against } => format!(
                "\nSCORES SUMMARY:\n{}\n\n{}\n",
                for_side.render(),
                against.render()
            ),
            Self::Verdict { name, .. } => {
                format!("\n{RULE}\nThe court rules in favor of: {name}\n{RULE}")
            }
        }
    }
}

/// Append-only record of a debate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Transcript {
    blocks: Vec<TranscriptBlock>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, block: TranscriptBlock) {
        self.blocks.push(block);
    }

    pub fn blocks(&self) -> &[TranscriptBlock] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn render(&self) -> String {
        render_transcript(&self.blocks)
    }
}

/// Renders blocks newline-joined, with a banner whenever the phase changes.
pub fn render_transcript(blocks: &[TranscriptBlock]) -> String {
    let mut lines = Vec::with_capacity(blocks.len() * 2);
    let mut current = None;

    for block in blocks {
        if let Some(phase) = block.phase() {
            if current != Some(phase) {
                lines.push(format!("\n===== {} =====\n", phase.banner()));
                current = Some(phase);
            }
        }
        lines.push(block.text());
    }

    lines.join("\n")
}

/// Destination for the finished transcript; written once per debate.
pub trait TranscriptSink: Send + Sync {
    fn write(&self, blocks: &[TranscriptBlock]) -> Result<(), DebateError>;
}

#[derive(Debug, Clone)]
pub struct FileTranscriptSink {
    path: PathBuf,
}

impl FileTranscriptSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TranscriptSink for FileTranscriptSink {
    fn write(&self, blocks: &[TranscriptBlock]) -> Result<(), DebateError> {
        fs::write(&self.path, render_transcript(blocks))
            .map_err(|err| DebateError::Sink(format!("{}: {err}", self.path.display())))?;
        info!(path = %self.path.display(), blocks = blocks.len(), "transcript saved");
        Ok(())
    }
}

/// Keeps rendered transcripts in memory.
#[derive(Debug, Default)]
pub struct MemoryTranscriptSink {
    written: Mutex<Vec<String>>,
}

impl MemoryTranscriptSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn written(&self) -> Vec<String> {
        match self.written.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl TranscriptSink for MemoryTranscriptSink {
    fn write(&self, blocks: &[TranscriptBlock]) -> Result<(), DebateError> {
        let rendered = render_transcript(blocks);
        match self.written.lock() {
            Ok(mut guard) => guard.push(rendered),
            Err(poisoned) => poisoned.into_inner().push(rendered),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statement(side: Side, phase: Phase, text: &str) -> TranscriptBlock {
        TranscriptBlock::Statement(Statement {
            side,
            phase,
            speaker: "Counsel".into(),
            text: text.into(),
        })
    }

    #[test]
    fn labels_follow_speaker_and_phase() {
        let statement = Statement {
            side: Side::For,
            phase: Phase::FirstRebuttal,
            speaker: "Book Authors' Counsel".into(),
            text: "Copying is copying.".into(),
        };
        assert_eq!(
            statement.label(),
            "Book Authors' Counsel (rebuttal): Copying is copying."
        );

        let evaluation = Evaluation {
            phase: Phase::Final,
            text: "Authors win.".into(),
        };
        assert_eq!(evaluation.label(), "Judge (FINAL):\nAuthors win.");
    }

    #[test]
    fn banners_appear_once_per_phase() {
        let blocks = vec![
            statement(Side::For, Phase::Opening, "a."),
            statement(Side::Against, Phase::Opening, "b."),
            statement(Side::For, Phase::Closing, "c."),
        ];
        let rendered = render_transcript(&blocks);

        assert_eq!(rendered.matches("===== OPENING STATEMENTS =====").count(), 1);
        assert_eq!(rendered.matches("===== CLOSING ARGUMENTS =====").count(), 1);
        assert!(rendered.find("OPENING").unwrap() < rendered.find("CLOSING").unwrap());
    }

    #[test]
    fn file_sink_writes_rendered_text() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("transcript.txt");
        let sink = FileTranscriptSink::new(&path);

        let blocks = vec![TranscriptBlock::Verdict {
            winner: Side::For,
            name: "BOOK AUTHORS".into(),
        }];
        sink.write(&blocks).expect("write succeeds");

        let written = fs::read_to_string(&path).expect("read back");
        assert!(written.contains("The court rules in favor of: BOOK AUTHORS"));
    }

    #[test]
    fn file_sink_failure_is_reported() {
        let dir = tempfile::tempdir().expect("temp dir");
        let sink = FileTranscriptSink::new(dir.path().join("missing").join("transcript.txt"));
        let error = sink.write(&[]).unwrap_err();
        assert!(matches!(error, DebateError::Sink(_)));
    }
}
