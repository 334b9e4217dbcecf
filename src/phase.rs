use std::fmt;

use serde::{Deserialize, Serialize};

/// Stage of the fixed debate sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Opening,
    FirstRebuttal,
    SecondRebuttal,
    Closing,
    Final,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Opening,
        Phase::FirstRebuttal,
        Phase::SecondRebuttal,
        Phase::Closing,
        Phase::Final,
    ];

    /// Label used inside statement and evaluation headers.
    pub fn label(self) -> &'static str {
        match self {
            Self::Opening => "opening",
            Self::FirstRebuttal | Self::SecondRebuttal => "rebuttal",
            Self::Closing => "closing",
            Self::Final => "FINAL",
        }
    }

    /// Section banner printed once when the transcript enters this phase.
    pub fn banner(self) -> &'static str {
        match self {
            Self::Opening => "OPENING STATEMENTS",
            Self::FirstRebuttal => "FIRST REBUTTALS",
            Self::SecondRebuttal => "SECOND REBUTTALS",
            Self::Closing => "CLOSING ARGUMENTS",
            Self::Final => "FINAL VERDICT",
        }
    }

    pub fn next(self) -> Option<Phase> {
        match self {
            Self::Opening => Some(Self::FirstRebuttal),
            Self::FirstRebuttal => Some(Self::SecondRebuttal),
            Self::SecondRebuttal => Some(Self::Closing),
            Self::Closing => Some(Self::Final),
            Self::Final => None,
        }
    }

    pub fn is_rebuttal(self) -> bool {
        matches!(self, Self::FirstRebuttal | Self::SecondRebuttal)
    }

    /// Phases whose evaluation feeds the score ledger.
    pub fn is_scored(self) -> bool {
        matches!(self, Self::Opening | Self::FirstRebuttal | Self::SecondRebuttal)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    For,
    Against,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::For => "for",
            Self::Against => "against",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one side of the debate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideProfile {
    /// Speaker name used in statement labels, e.g. "Book Authors' Counsel".
    pub agent_name: String,
    /// Phrase the judge uses to refer to this side; drives prose score attribution.
    pub marker: String,
    /// Name announced in the score summary and the verdict line.
    pub verdict_name: String,
    /// One-sentence position, quoted verbatim in every prompt for this side.
    pub position: String,
}

impl SideProfile {
    pub fn new(
        agent_name: impl Into<String>,
        marker: impl Into<String>,
        verdict_name: impl Into<String>,
        position: impl Into<String>,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            marker: marker.into(),
            verdict_name: verdict_name.into(),
            position: position.into(),
        }
    }

    pub fn book_authors() -> Self {
        Self::new(
            "Book Authors' Counsel",
            "Book Authors",
            "BOOK AUTHORS",
            "arguing for copyright protection and compensation for all works used to train LLMs.",
        )
    }

    pub fn llm_companies() -> Self {
        Self::new(
            "LLM Companies' Counsel",
            "LLM Companies",
            "LLM COMPANIES",
            "arguing that using published works falls under fair use without requiring additional permissions",
        )
    }
}
