use std::path::PathBuf;
use std::sync::Arc;

use cw_ai::eval::{run_eval, run_eval_from_settings};
use cw_ai::graph::CareGraph;
use cw_ai::retrieve::LexicalBackend;
use cw_core::config::Settings;
use cw_core::domain::{EvalItem, Thresholds};
use cw_core::report::{load_dataset, read_report};
use tempfile::tempdir;

fn data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../data")
}

fn sample_settings() -> Settings {
    Settings {
        corpus_path: data_dir().join("sample_corpus"),
        eval_set_path: data_dir().join("eval_set.jsonl"),
        ..Settings::default()
    }
}

fn graph_over(settings: &Settings) -> CareGraph {
    CareGraph::new(Arc::new(LexicalBackend::new(settings)), settings)
}

#[test]
fn sample_set_passes_the_default_gate() {
    let settings = sample_settings();
    let items = load_dataset(&settings.eval_set_path).expect("dataset");
    let report = run_eval(&graph_over(&settings), &items, None, settings.thresholds()).expect("eval");

    let ids: Vec<&str> = report.items.iter().map(|r| r.id.as_str()).collect();
    let expected: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, expected);

    for row in &report.items {
        for v in [
            row.scores.citation_coverage,
            row.scores.groundedness_proxy,
            row.scores.refusal_policy,
        ] {
            assert!((0.0..=1.0).contains(&v));
        }
    }
    assert_eq!(report.aggregate.citation_coverage, 1.0);
    assert!(report.aggregate.groundedness_proxy >= 0.2);
    assert!(report.quality_gate.pass);
}

#[test]
fn out_of_scope_items_are_refused() {
    let settings = sample_settings();
    let items = load_dataset(&settings.eval_set_path).expect("dataset");
    let report = run_eval(&graph_over(&settings), &items, None, settings.thresholds()).expect("eval");

    for id in ["q07", "q08"] {
        let row = report.items.iter().find(|r| r.id == id).expect("row");
        assert_eq!(row.scores.refusal_policy, 1.0);
        assert_eq!(row.scores.citation_coverage, 1.0);
        assert_eq!(row.scores.groundedness_proxy, 0.0);
    }
}

#[test]
fn n_limits_to_the_leading_items() {
    let settings = sample_settings();
    let items = load_dataset(&settings.eval_set_path).expect("dataset");
    let graph = graph_over(&settings);

    let report = run_eval(&graph, &items, Some(3), settings.thresholds()).expect("eval");
    let ids: Vec<&str> = report.items.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["q01", "q02", "q03"]);

    let all = run_eval(&graph, &items, Some(100), settings.thresholds()).expect("eval");
    assert_eq!(all.items.len(), items.len());
}

#[test]
fn empty_selection_is_an_error() {
    let settings = sample_settings();
    let graph = graph_over(&settings);
    let items = vec![EvalItem {
        id: "only".to_string(),
        question: "clinical care".to_string(),
        top_k: None,
    }];

    assert_eq!(
        run_eval(&graph, &items, Some(0), settings.thresholds()).unwrap_err().code,
        "EVAL_EMPTY_SET"
    );
    assert_eq!(
        run_eval(&graph, &[], None, settings.thresholds()).unwrap_err().code,
        "EVAL_EMPTY_SET"
    );
}

#[test]
fn strict_thresholds_fail_the_gate() {
    let settings = sample_settings();
    let items = load_dataset(&settings.eval_set_path).expect("dataset");
    let strict = Thresholds {
        citation_coverage: 1.0,
        groundedness_proxy: 1.0,
    };
    let report = run_eval(&graph_over(&settings), &items, None, strict).expect("eval");
    assert!(!report.quality_gate.pass);
    assert_eq!(report.quality_gate.thresholds, strict);
}

#[test]
fn report_is_written_to_the_configured_path() {
    let dir = tempdir().unwrap();
    let settings = Settings {
        eval_report_path: dir.path().join("artifacts").join("eval_report.json"),
        ..sample_settings()
    };
    let report = run_eval_from_settings(&graph_over(&settings), &settings, Some(2)).expect("eval");

    let on_disk = read_report(&settings.eval_report_path).expect("read");
    let ids: Vec<&str> = on_disk.items.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["q01", "q02"]);
    assert_eq!(on_disk.quality_gate, report.quality_gate);
}
