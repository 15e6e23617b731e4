use std::process::ExitCode;

use cw_ai::graph::CareGraph;
use cw_ai::retrieve::{BackendChoice, RetrievalBackend};
use cw_core::config::Settings;
use cw_core::domain::AskRequest;
use cw_core::error::AppError;
use tracing::{debug, info, info_span};
use uuid::Uuid;

use super::print_json;

#[derive(Debug, Clone)]
pub struct AskArgs {
    pub question: String,
    pub top_k: Option<usize>,
    pub session_id: Option<String>,
    pub request_id: Option<String>,
}

pub fn run(settings: &Settings, choice: BackendChoice, args: AskArgs) -> Result<ExitCode, AppError> {
    let request_id = args
        .request_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let span = info_span!("ask", request_id = %request_id);
    let _enter = span.enter();

    let graph = CareGraph::from_settings(settings, choice);
    let req = AskRequest {
        question: args.question,
        top_k: args.top_k,
        session_id: args.session_id,
    };
    debug!(question = %req.question, top_k = ?req.top_k, "received question");

    let resp = graph.answer(&req, request_id.as_str())?;
    info!(
        backend = graph.backend().name(),
        citations = resp.citations.len(),
        "answered"
    );
    print_json(&resp)?;
    Ok(ExitCode::SUCCESS)
}
