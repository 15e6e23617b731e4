use std::fs;
use std::path::PathBuf;

use cw_ai::retrieve::{LexicalBackend, RetrievalBackend};
use cw_core::chunking::Chunk;
use cw_core::config::Settings;
use tempfile::tempdir;

fn chunk(source_id: &str, text: &str) -> Chunk {
    Chunk {
        source_id: source_id.to_string(),
        text: text.to_string(),
    }
}

fn settings_for(corpus: PathBuf) -> Settings {
    Settings {
        corpus_path: corpus,
        ..Settings::default()
    }
}

#[test]
fn superset_overlap_ranks_higher_and_ties_keep_index_order() {
    let backend = LexicalBackend::from_chunks(
        &Settings::default(),
        vec![
            chunk("c", "gamma delta"),
            chunk("b1", "Alpha beta"),
            chunk("a", "alpha beta gamma alpha"),
            chunk("b2", "beta ALPHA"),
            chunk("z", "unrelated words"),
        ],
    );

    let docs = backend.retrieve("alpha beta gamma", 10).expect("retrieve");
    let ids: Vec<&str> = docs.iter().map(|d| d.source_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b1", "b2", "c", "z"]);
    let scores: Vec<f64> = docs.iter().map(|d| d.score).collect();
    assert_eq!(scores, vec![3.0, 2.0, 2.0, 1.0, 0.0]);

    let top2 = backend.retrieve("alpha beta gamma", 2).expect("retrieve");
    assert_eq!(top2.len(), 2);
    assert_eq!(top2[1].source_id, "b1");
}

#[test]
fn blank_query_or_zero_top_k_returns_nothing() {
    let backend = LexicalBackend::from_chunks(&Settings::default(), vec![chunk("a", "care plan")]);
    assert!(backend.retrieve("   ", 3).expect("retrieve").is_empty());
    assert!(backend.retrieve("care", 0).expect("retrieve").is_empty());
}

#[test]
fn first_retrieve_indexes_lazily_and_only_once() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("trials.md"), "Randomized trials reduce bias.").unwrap();
    let backend = LexicalBackend::new(&settings_for(dir.path().to_path_buf()));

    let docs = backend.retrieve("trials bias", 5).expect("retrieve");
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].source_id, "trials");

    // A file added after the lazy build is invisible until an explicit rebuild.
    fs::write(dir.path().join("notes.txt"), "Bias in observational notes.").unwrap();
    assert_eq!(backend.retrieve("bias", 5).expect("retrieve").len(), 1);

    assert_eq!(backend.index_corpus().expect("index"), 2);
    assert_eq!(backend.retrieve("bias", 5).expect("retrieve").len(), 2);
}

#[test]
fn missing_corpus_surfaces_as_a_read_error() {
    let dir = tempdir().unwrap();
    let backend = LexicalBackend::new(&settings_for(dir.path().join("nope")));
    let err = backend.retrieve("care", 3).unwrap_err();
    assert_eq!(err.code, "CORPUS_READ_FAILED");
    assert!(backend.index_corpus().is_err());
}

#[test]
fn sample_corpus_indexes_every_chunk() {
    let corpus = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../data/sample_corpus");
    let backend = LexicalBackend::new(&settings_for(corpus));
    let total = backend.index_corpus().expect("index");
    assert!(total >= 10, "expected at least one chunk per paragraph, got {total}");

    let docs = backend
        .retrieve("how do randomized clinical trials reduce bias?", 3)
        .expect("retrieve");
    assert_eq!(docs.len(), 3);
    assert_eq!(docs[0].source_id, "clinical_trials");
    assert!(docs.windows(2).all(|w| w[0].score >= w[1].score));
}
