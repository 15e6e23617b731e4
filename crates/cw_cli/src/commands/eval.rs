use std::process::ExitCode;

use cw_ai::eval::run_eval_from_settings;
use cw_ai::graph::CareGraph;
use cw_ai::retrieve::BackendChoice;
use cw_core::config::Settings;
use cw_core::error::AppError;

use super::print_json;

/// Exit status when the report was produced but the quality gate did not pass.
pub const GATE_FAILED_EXIT: u8 = 2;

pub fn run(settings: &Settings, choice: BackendChoice, n: Option<usize>) -> Result<ExitCode, AppError> {
    let graph = CareGraph::from_settings(settings, choice);
    let report = run_eval_from_settings(&graph, settings, n)?;
    print_json(&report.aggregate)?;
    if !report.quality_gate.pass {
        eprintln!("Quality gate failed");
        return Ok(ExitCode::from(GATE_FAILED_EXIT));
    }
    Ok(ExitCode::SUCCESS)
}
