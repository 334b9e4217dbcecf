use std::ops::{Add, AddAssign};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::phase::{Side, SideProfile};

/// Scores awarded to one side for one evaluation, or accumulated over several.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreTriple {
    pub legal_reasoning: u32,
    pub evidence: u32,
    pub persuasiveness: u32,
}

impl ScoreTriple {
    /// Neutral score used when an evaluation yields nothing extractable.
    pub const DEFAULT: ScoreTriple = ScoreTriple::new(7, 7, 7);

    pub const fn new(legal_reasoning: u32, evidence: u32, persuasiveness: u32) -> Self {
        Self {
            legal_reasoning,
            evidence,
            persuasiveness,
        }
    }

    pub fn total(&self) -> u32 {
        self.legal_reasoning
            .saturating_add(self.evidence)
            .saturating_add(self.persuasiveness)
    }

    /// An all-zero triple carries no judgement and reads as [`Self::DEFAULT`].
    pub fn or_default(self) -> Self {
        if self.total() == 0 {
            Self::DEFAULT
        } else {
            self
        }
    }
}

impl Add for ScoreTriple {
    type Output = ScoreTriple;

    fn add(self, rhs: ScoreTriple) -> ScoreTriple {
        ScoreTriple {
            legal_reasoning: self.legal_reasoning.saturating_add(rhs.legal_reasoning),
            evidence: self.evidence.saturating_add(rhs.evidence),
            persuasiveness: self.persuasiveness.saturating_add(rhs.persuasiveness),
        }
    }
}

impl AddAssign for ScoreTriple {
    fn add_assign(&mut self, rhs: ScoreTriple) {
        *self = *self + rhs;
    }
}

static RE_LEGAL_REASONING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)legal reasoning:?\s*([0-9]+)").unwrap());
static RE_EVIDENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)evidence:?\s*([0-9]+)").unwrap());
static RE_PERSUASIVENESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)persuasiveness:?\s*([0-9]+)").unwrap());

// ASCII digits only fail to parse on overflow, which saturates.
fn first_number(pattern: &Regex, text: &str) -> u32 {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|value| value.as_str().parse().unwrap_or(u32::MAX))
        .unwrap_or(0)
}

/// Pulls the three named scores out of free text.
///
/// Each dimension is searched independently and defaults to zero. Only when
/// nothing at all was found does the whole triple fall back to
/// [`ScoreTriple::DEFAULT`]; partial matches are returned as they are.
pub fn extract_scores(text: &str) -> ScoreTriple {
    ScoreTriple::new(
        first_number(&RE_LEGAL_REASONING, text),
        first_number(&RE_EVIDENCE, text),
        first_number(&RE_PERSUASIVENESS, text),
    )
    .or_default()
}

/// Scores attributed to each side by a single evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideScores {
    #[serde(rename = "for")]
    pub for_side: ScoreTriple,
    pub against: ScoreTriple,
}

impl SideScores {
    pub fn symmetric(scores: ScoreTriple) -> Self {
        Self {
            for_side: scores,
            against: scores,
        }
    }

    fn or_default(self) -> Self {
        Self {
            for_side: self.for_side.or_default(),
            against: self.against.or_default(),
        }
    }
}

/// Turns an evaluation into per-side scores.
pub trait ScoreAttribution: Send + Sync {
    fn attribute(&self, evaluation: &str) -> SideScores;
}

/// Prose attribution keyed on the phrases the judge uses for each side.
///
/// When both markers occur, every occurrence contributes the scores found
/// between it and the next marker, so a side mentioned twice is scored twice.
/// Without both markers the whole text is scored once and credited to both
/// sides alike.
#[derive(Debug, Clone)]
pub struct MarkerAttribution {
    for_marker: String,
    against_marker: String,
    pattern: Regex,
}

impl MarkerAttribution {
    pub fn new(for_marker: impl Into<String>, against_marker: impl Into<String>) -> Self {
        let for_marker = for_marker.into();
        let against_marker = against_marker.into();
        let pattern = Regex::new(&format!(
            "{}|{}",
            regex::escape(&for_marker),
            regex::escape(&against_marker)
        ))
        .expect("escaped markers form a valid pattern");

        Self {
            for_marker,
            against_marker,
            pattern,
        }
    }

    pub fn from_profiles(for_side: &SideProfile, against_side: &SideProfile) -> Self {
        Self::new(for_side.marker.clone(), against_side.marker.clone())
    }
}

impl ScoreAttribution for MarkerAttribution {
    fn attribute(&self, evaluation: &str) -> SideScores {
        let both_present = !self.for_marker.is_empty()
            && !self.against_marker.is_empty()
            && evaluation.contains(&self.for_marker)
            && evaluation.contains(&self.against_marker);
        if !both_present {
            return SideScores::symmetric(extract_scores(evaluation));
        }

        let markers: Vec<_> = self.pattern.find_iter(evaluation).collect();
        let mut scores = SideScores::default();

        for (position, marker) in markers.iter().enumerate() {
            let end = markers
                .get(position + 1)
                .map(|next| next.start())
                .unwrap_or(evaluation.len());
            let segment = &evaluation[marker.start()..end];
            let extracted = extract_scores(segment);

            if marker.as_str() == self.for_marker {
                scores.for_side += extracted;
            } else {
                scores.against += extracted;
            }
        }

        scores
    }
}

#[derive(Debug, Deserialize)]
struct ScoreRecord {
    scores: SideScores,
}

/// Reads a side-tagged JSON score record embedded in the evaluation, e.g.
/// `{"scores": {"for": {...}, "against": {...}}}`. A side scored all zeros,
/// such as an echoed template, gets the default triple.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredAttribution;

impl StructuredAttribution {
    pub fn parse(&self, evaluation: &str) -> Option<SideScores> {
        self.find_record(evaluation).map(SideScores::or_default)
    }

    fn find_record(&self, evaluation: &str) -> Option<SideScores> {
        if let Ok(record) = serde_json::from_str::<ScoreRecord>(evaluation.trim()) {
            return Some(record.scores);
        }

        if let Some(fenced) = extract_json_from_fenced_block(evaluation) {
            if let Ok(record) = serde_json::from_str::<ScoreRecord>(&fenced) {
                return Some(record.scores);
            }
        }

        json_objects(evaluation)
            .into_iter()
            .find_map(|candidate| serde_json::from_str::<ScoreRecord>(candidate).ok())
            .map(|record| record.scores)
    }
}

/// Structured record first, prose markers as the compatibility fallback.
#[derive(Debug, Clone)]
pub struct ScoreParser {
    structured: StructuredAttribution,
    fallback: MarkerAttribution,
}

impl ScoreParser {
    pub fn new(fallback: MarkerAttribution) -> Self {
        Self {
            structured: StructuredAttribution,
            fallback,
        }
    }

    pub fn from_profiles(for_side: &SideProfile, against_side: &SideProfile) -> Self {
        Self::new(MarkerAttribution::from_profiles(for_side, against_side))
    }
}

impl ScoreAttribution for ScoreParser {
    fn attribute(&self, evaluation: &str) -> SideScores {
        if let Some(scores) = self.structured.parse(evaluation) {
            debug!("scores attributed from structured record");
            return scores;
        }

        debug!("no structured score record, attributing from prose");
        self.fallback.attribute(evaluation)
    }
}

/// Running per-side totals across the scored phases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreLedger {
    #[serde(rename = "for")]
    pub for_side: ScoreTriple,
    pub against: ScoreTriple,
}

impl ScoreLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(mut self, scores: SideScores) -> Self {
        self.for_side += scores.for_side;
        self.against += scores.against;
        self
    }

    pub fn apply(self, evaluation: &str, attribution: &dyn ScoreAttribution) -> Self {
        self.record(attribution.attribute(evaluation))
    }

    pub fn totals(&self) -> (u32, u32) {
        (self.for_side.total(), self.against.total())
    }

    /// FOR only wins with a strictly greater total; a tie goes to AGAINST.
    pub fn leader(&self) -> Side {
        let (for_total, against_total) = self.totals();
        if for_total > against_total {
            Side::For
        } else {
            Side::Against
        }
    }
}

fn extract_json_from_fenced_block(content: &str) -> Option<String> {
    let start = content.find("```json").or_else(|| content.find("```"))?;
    let remainder = &content[start..];
    let after_language = remainder.find('\n')?;
    let body = &remainder[after_language + 1..];
    let end = body.find("```")?;
    Some(body[..end].trim().to_string())
}

// Quote/escape-aware scan for complete top-level JSON objects, in order.
fn json_objects(content: &str) -> Vec<&str> {
    let mut objects = Vec::new();
    let mut start = None;
    let mut depth: u32 = 0;
    let mut in_str = false;
    let mut escaped = false;

    for (i, b) in content.bytes().enumerate() {
        if in_str {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_str = false;
            }
            continue;
        }

        match b {
            b'"' if depth > 0 => in_str = true,
            b'{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        objects.push(&content[s..=i]);
                    }
                }
            }
            _ => {}
        }
    }

    objects
}
