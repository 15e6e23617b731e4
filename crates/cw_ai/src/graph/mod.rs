use std::sync::Arc;

use cw_core::config::Settings;
use cw_core::domain::{
    AskRequest, AskResponse, Citation, RetrievedDoc, Trace, TraceStep, ANSWER_EVIDENCE_MAX_CHARS,
};
use cw_core::error::AppError;
use cw_core::normalize::truncate_chars;
use tracing::debug;

use crate::retrieve::{select_backend, BackendChoice, RetrievalBackend};

/// Question terms that route a request through retrieval.
pub const DOMAIN_TERMS: [&str; 6] = ["trial", "treatment", "clinical", "disease", "biomarker", "care"];

pub const GENERAL_RESPONSE: &str =
    "I can help with healthcare intelligence questions. Please provide a domain-specific question.";
pub const NO_EVIDENCE_RESPONSE: &str = "I couldn't find supporting evidence in the local corpus.";
pub const EVIDENCE_PREFIX: &str = "Based on retrieved evidence:";

pub const PLAN_RETRIEVE: &str = "retrieve evidence";
pub const PLAN_GENERAL: &str = "general safe response";
pub const SYNTHESIS_SUMMARY: &str = "generated grounded response";

/// Docs quoted in the answer; every retrieved doc is still cited.
const SYNTHESIS_DOCS: usize = 2;

/// Accumulator for one run. Created per call and dropped with it.
#[derive(Debug, Clone)]
pub struct GraphState {
    pub question: String,
    pub top_k: usize,
    pub retrieval_used: bool,
    pub plan_summary: String,
    pub docs: Vec<RetrievedDoc>,
    pub answer: String,
}

impl GraphState {
    fn new(question: &str, top_k: usize) -> Self {
        Self {
            question: question.to_string(),
            top_k,
            retrieval_used: false,
            plan_summary: String::new(),
            docs: Vec::new(),
            answer: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphOutput {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub trace: Trace,
}

impl GraphOutput {
    pub fn retrieval_used(&self) -> bool {
        self.trace.steps.iter().any(|s| {
            matches!(
                s,
                TraceStep::Planner {
                    retrieval_used: true,
                    ..
                }
            )
        })
    }
}

pub fn is_in_domain(question: &str) -> bool {
    let q = question.to_lowercase();
    DOMAIN_TERMS.iter().any(|t| q.contains(t))
}

/// Plan, retrieve, synthesize. The backend is shared; all per-request state is local.
pub struct CareGraph {
    retriever: Arc<dyn RetrievalBackend>,
    default_top_k: usize,
}

impl CareGraph {
    pub fn new(retriever: Arc<dyn RetrievalBackend>, settings: &Settings) -> Self {
        Self {
            retriever,
            default_top_k: settings.default_top_k,
        }
    }

    pub fn from_settings(settings: &Settings, choice: BackendChoice) -> Self {
        let selected = select_backend(settings, choice);
        Self::new(selected.backend, settings)
    }

    pub fn backend(&self) -> &Arc<dyn RetrievalBackend> {
        &self.retriever
    }

    pub fn effective_top_k(&self, requested: Option<usize>) -> usize {
        requested.filter(|k| *k > 0).unwrap_or(self.default_top_k)
    }

    pub fn run(&self, question: &str, top_k: usize) -> Result<GraphOutput, AppError> {
        let mut state = GraphState::new(question, top_k);
        let mut trace = Trace::default();

        plan(&mut state);
        trace.steps.push(TraceStep::Planner {
            retrieval_used: state.retrieval_used,
            summary: state.plan_summary.clone(),
        });

        if state.retrieval_used {
            self.retrieve(&mut state)?;
            trace.steps.push(TraceStep::Retriever {
                num_docs: state.docs.len(),
            });
        }

        synthesize(&mut state);
        trace.steps.push(TraceStep::Synthesizer {
            summary: SYNTHESIS_SUMMARY.to_string(),
        });

        Ok(GraphOutput {
            citations: state.docs.iter().map(Citation::from_doc).collect(),
            answer: state.answer,
            trace,
        })
    }

    /// Validate an ask request, run it with the effective top_k and shape the response.
    pub fn answer(&self, req: &AskRequest, request_id: impl Into<String>) -> Result<AskResponse, AppError> {
        req.validate()?;
        let out = self.run(&req.question, self.effective_top_k(req.top_k))?;
        Ok(AskResponse {
            request_id: request_id.into(),
            answer: out.answer,
            citations: out.citations,
            trace: out.trace,
        })
    }

    fn retrieve(&self, state: &mut GraphState) -> Result<(), AppError> {
        state.docs = self.retriever.retrieve(&state.question, state.top_k)?;
        debug!(
            backend = self.retriever.name(),
            top_k = state.top_k,
            num_docs = state.docs.len(),
            "retrieved evidence"
        );
        Ok(())
    }
}

fn plan(state: &mut GraphState) {
    state.retrieval_used = is_in_domain(&state.question);
    state.plan_summary = if state.retrieval_used {
        PLAN_RETRIEVE.to_string()
    } else {
        PLAN_GENERAL.to_string()
    };
    debug!(retrieval_used = state.retrieval_used, summary = %state.plan_summary, "planned");
}

fn synthesize(state: &mut GraphState) {
    if !state.retrieval_used {
        state.answer = GENERAL_RESPONSE.to_string();
        debug!(branch = "general", "synthesized");
        return;
    }
    if state.docs.is_empty() {
        state.answer = NO_EVIDENCE_RESPONSE.to_string();
        debug!(branch = "no_evidence", "synthesized");
        return;
    }
    let summary = state
        .docs
        .iter()
        .take(SYNTHESIS_DOCS)
        .map(|d| d.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    state.answer = format!(
        "{EVIDENCE_PREFIX} {}",
        truncate_chars(&summary, ANSWER_EVIDENCE_MAX_CHARS)
    );
    debug!(branch = "evidence", "synthesized");
}
