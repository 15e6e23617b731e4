use cw_core::config::Settings;
use cw_core::domain::{EvalItem, EvalRow, Report, Thresholds};
use cw_core::error::AppError;
use cw_core::metrics::score_item;
use cw_core::report::{load_dataset, write_report};
use tracing::{debug, info};

use crate::graph::CareGraph;

/// Run the graph over the first `n` items (all when `None`) and fold the scores into a report.
///
/// Items run sequentially and rows keep dataset order.
pub fn run_eval(
    graph: &CareGraph,
    items: &[EvalItem],
    n: Option<usize>,
    thresholds: Thresholds,
) -> Result<Report, AppError> {
    let selected = match n {
        Some(n) => &items[..n.min(items.len())],
        None => items,
    };
    if selected.is_empty() {
        return Err(AppError::new("EVAL_EMPTY_SET", "empty evaluation set"));
    }

    let mut rows = Vec::with_capacity(selected.len());
    for item in selected {
        let out = graph.run(&item.question, graph.effective_top_k(item.top_k))?;
        let scores = score_item(&item.question, &out.answer, &out.citations);
        debug!(id = %item.id, ?scores, "scored evaluation item");
        rows.push(EvalRow {
            id: item.id.clone(),
            scores,
        });
    }

    Report::from_rows(rows, thresholds)
}

/// Load the configured dataset, evaluate it, and persist the report (overwriting).
pub fn run_eval_from_settings(
    graph: &CareGraph,
    settings: &Settings,
    n: Option<usize>,
) -> Result<Report, AppError> {
    let items = load_dataset(&settings.eval_set_path)?;
    let report = run_eval(graph, &items, n, settings.thresholds())?;
    write_report(&settings.eval_report_path, &report)?;
    info!(
        items = report.items.len(),
        citation_coverage = report.aggregate.citation_coverage,
        groundedness_proxy = report.aggregate.groundedness_proxy,
        refusal_policy = report.aggregate.refusal_policy,
        pass = report.quality_gate.pass,
        path = %settings.eval_report_path.display(),
        "evaluation finished"
    );
    Ok(report)
}
