use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::normalize::truncate_chars;

/// Maximum characters of chunk text carried in a citation.
pub const CITATION_MAX_CHARS: usize = 280;
/// Maximum characters of evidence text quoted in a synthesized answer.
pub const ANSWER_EVIDENCE_MAX_CHARS: usize = 500;
/// Minimum question length accepted by the ask contract.
pub const QUESTION_MIN_CHARS: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedDoc {
    pub source_id: String,
    pub text: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Citation {
    pub source_id: String,
    pub text: String,
}

impl Citation {
    pub fn from_doc(doc: &RetrievedDoc) -> Self {
        Self {
            source_id: doc.source_id.clone(),
            text: truncate_chars(&doc.text, CITATION_MAX_CHARS).to_string(),
        }
    }
}

/// One record of the orchestration trace. Serialized as `{"step": "<name>", ...fields}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum TraceStep {
    Planner { retrieval_used: bool, summary: String },
    Retriever { num_docs: usize },
    Synthesizer { summary: String },
}

impl TraceStep {
    pub fn name(&self) -> &'static str {
        match self {
            TraceStep::Planner { .. } => "planner",
            TraceStep::Retriever { .. } => "retriever",
            TraceStep::Synthesizer { .. } => "synthesizer",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Trace {
    pub steps: Vec<TraceStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl AskRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            top_k: None,
            session_id: None,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let len = self.question.chars().count();
        if len < QUESTION_MIN_CHARS {
            return Err(AppError::new(
                "REQUEST_INVALID",
                format!("Question must be at least {QUESTION_MIN_CHARS} characters"),
            )
            .with_details(format!("len={len}")));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AskResponse {
    pub request_id: String,
    pub answer: String,
    pub citations: Vec<Citation>,
    pub trace: Trace,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvalItem {
    pub id: String,
    pub question: String,
    #[serde(default)]
    pub top_k: Option<usize>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Scores {
    pub citation_coverage: f64,
    pub groundedness_proxy: f64,
    pub refusal_policy: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvalRow {
    pub id: String,
    pub scores: Scores,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Thresholds {
    pub citation_coverage: f64,
    pub groundedness_proxy: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QualityGate {
    pub pass: bool,
    pub thresholds: Thresholds,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    pub items: Vec<EvalRow>,
    pub aggregate: Scores,
    pub quality_gate: QualityGate,
}
