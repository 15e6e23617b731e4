use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::chunking::validate_window;
use crate::domain::Thresholds;
use crate::error::AppError;

/// Process configuration. Built once, validated, then handed to each component by reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    pub app_name: String,
    pub debug: bool,
    pub default_top_k: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub corpus_path: PathBuf,
    pub vector_store_path: PathBuf,
    pub eval_set_path: PathBuf,
    pub eval_report_path: PathBuf,
    pub threshold_citation_coverage: f64,
    pub threshold_groundedness_proxy: f64,
    pub ollama_base_url: String,
    pub embedding_model: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "CareWeave".to_string(),
            debug: false,
            default_top_k: 3,
            chunk_size: 420,
            chunk_overlap: 50,
            corpus_path: PathBuf::from("data/sample_corpus"),
            vector_store_path: PathBuf::from("data/vector_store"),
            eval_set_path: PathBuf::from("data/eval_set.jsonl"),
            eval_report_path: PathBuf::from("artifacts/eval_report.json"),
            threshold_citation_coverage: 0.80,
            threshold_groundedness_proxy: 0.20,
            ollama_base_url: "http://127.0.0.1:11434".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_window(self.chunk_size, self.chunk_overlap).map_err(|e| {
            AppError::new("CONFIG_INVALID", "Invalid chunking configuration")
                .with_details(format!("{}; {}", e.message, e.details.unwrap_or_default()))
        })?;
        if self.default_top_k == 0 {
            return Err(AppError::new(
                "CONFIG_INVALID",
                "Default top_k must be at least 1",
            ));
        }
        for (name, value) in [
            ("threshold_citation_coverage", self.threshold_citation_coverage),
            ("threshold_groundedness_proxy", self.threshold_groundedness_proxy),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AppError::new(
                    "CONFIG_INVALID",
                    "Quality gate thresholds must be within [0, 1]",
                )
                .with_details(format!("{name}={value}")));
            }
        }
        Ok(())
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            citation_coverage: self.threshold_citation_coverage,
            groundedness_proxy: self.threshold_groundedness_proxy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Settings::default().validate().expect("defaults");
    }

    #[test]
    fn overlap_at_or_above_size_is_rejected() {
        let settings = Settings {
            chunk_size: 50,
            chunk_overlap: 50,
            ..Settings::default()
        };
        let err = settings.validate().unwrap_err();
        assert_eq!(err.code, "CONFIG_INVALID");
    }

    #[test]
    fn thresholds_outside_unit_interval_are_rejected() {
        let settings = Settings {
            threshold_groundedness_proxy: 1.5,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }
}
