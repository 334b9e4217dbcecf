use handlebars::Handlebars;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use crate::{
    phase::{Phase, SideProfile},
    DebateError,
};

const STATEMENT: &str = "statement";
const REBUTTAL: &str = "rebuttal";
const SCORING: &str = "scoring";
const VERDICT: &str = "verdict";

/// Shape of the score record the judge is asked to open its evaluation with.
pub const SCORE_RECORD_FORMAT: &str = r#"{"scores": {"for": {"legal_reasoning": 0, "evidence": 0, "persuasiveness": 0}, "against": {"legal_reasoning": 0, "evidence": 0, "persuasiveness": 0}}}"#;

/// One typed block of a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptSection {
    Case(String),
    Context { heading: String, passages: Vec<String> },
    Argument { heading: String, text: String },
    Instruction(String),
}

impl PromptSection {
    fn render(&self) -> String {
        match self {
            Self::Case(description) => format!("Case: {description}"),
            Self::Context { heading, passages } => {
                format!("{heading}:\n{}", passages.join("\n\n"))
            }
            Self::Argument { heading, text } => format!("{heading}:\n{text}"),
            Self::Instruction(text) => text.clone(),
        }
    }
}

/// Ordered prompt sections, rendered without any model in the loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptTemplate {
    sections: Vec<PromptSection>,
}

impl PromptTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_section(mut self, section: PromptSection) -> Self {
        self.sections.push(section);
        self
    }

    pub fn render(&self) -> String {
        self.sections
            .iter()
            .map(PromptSection::render)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

fn default_statement() -> String {
    "As the {{agent_name}}, {{position}}, provide a concise and powerful {{phase}} statement.".to_string()
}

fn default_rebuttal() -> String {
    "Directly counter this argument: '{{previous}}'".to_string()
}

fn default_scoring() -> String {
    "As the Judge, evaluate these {{phase}} arguments concisely. Score each side (1-10) on: \
     Legal Reasoning, Evidence, Persuasiveness. The two sides must not receive the same score \
     on any dimension. Start your answer with one line holding a JSON score record shaped like \
     {{record_format}} where \"for\" is {{for_marker}} and \"against\" is {{against_marker}}, \
     then give your reasoning."
        .to_string()
}

fn default_verdict() -> String {
    "As the Judge, evaluate these {{phase}} arguments concisely. This is the final verdict: \
     state whether {{for_marker}} or {{against_marker}} wins, with reasoning."
        .to_string()
}

/// Handlebars sources for the instruction section of each prompt kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplates {
    #[serde(default = "default_statement")]
    pub statement: String,
    #[serde(default = "default_rebuttal")]
    pub rebuttal: String,
    #[serde(default = "default_scoring")]
    pub scoring: String,
    #[serde(default = "default_verdict")]
    pub verdict: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            statement: default_statement(),
            rebuttal: default_rebuttal(),
            scoring: default_scoring(),
            verdict: default_verdict(),
        }
    }
}

/// Compiled instruction templates.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    registry: Handlebars<'static>,
    sources: PromptTemplates,
}

impl PromptLibrary {
    pub fn new(templates: &PromptTemplates) -> Result<Self, DebateError> {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        registry.register_template_string(STATEMENT, &templates.statement)?;
        registry.register_template_string(REBUTTAL, &templates.rebuttal)?;
        registry.register_template_string(SCORING, &templates.scoring)?;
        registry.register_template_string(VERDICT, &templates.verdict)?;

        Ok(Self {
            registry,
            sources: templates.clone(),
        })
    }

    pub fn statement(&self, profile: &SideProfile, phase: Phase) -> String {
        self.render(
            STATEMENT,
            &json!({
                "agent_name": profile.agent_name,
                "position": profile.position,
                "phase": phase.label(),
            }),
        )
    }

    pub fn rebuttal(&self, previous: &str) -> String {
        self.render(REBUTTAL, &json!({ "previous": previous }))
    }

    pub fn scoring(&self, phase: Phase, for_side: &SideProfile, against_side: &SideProfile) -> String {
        self.render(SCORING, &judge_data(phase, for_side, against_side))
    }

    pub fn verdict(&self, phase: Phase, for_side: &SideProfile, against_side: &SideProfile) -> String {
        self.render(VERDICT, &judge_data(phase, for_side, against_side))
    }

    fn render(&self, name: &str, data: &Value) -> String {
        match self.registry.render(name, data) {
            Ok(rendered) => rendered,
            Err(err) => {
                warn!(template = name, error = %err, "prompt template failed to render, using source");
                self.source(name).to_string()
            }
        }
    }

    fn source(&self, name: &str) -> &str {
        match name {
            STATEMENT => &self.sources.statement,
            REBUTTAL => &self.sources.rebuttal,
            SCORING => &self.sources.scoring,
            _ => &self.sources.verdict,
        }
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::new(&PromptTemplates::default()).expect("built-in prompt templates compile")
    }
}

fn judge_data(phase: Phase, for_side: &SideProfile, against_side: &SideProfile) -> Value {
    json!({
        "phase": phase.label(),
        "for_marker": for_side.marker,
        "against_marker": against_side.marker,
        "record_format": SCORE_RECORD_FORMAT,
    })
}
