use std::process::ExitCode;

use cw_ai::retrieve::{select_backend, BackendChoice, RetrievalBackend};
use cw_core::config::Settings;
use cw_core::error::AppError;

pub fn run(settings: &Settings, choice: BackendChoice) -> Result<ExitCode, AppError> {
    let selected = select_backend(settings, choice);
    let total = selected.backend.index_corpus()?;
    println!("Indexed chunks: {total}");
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_corpus_fails_the_command() {
        let dir = tempdir().unwrap();
        let settings = Settings {
            corpus_path: dir.path().join("missing"),
            ..Settings::default()
        };
        let err = run(&settings, BackendChoice::Lexical).unwrap_err();
        assert_eq!(err.code, "CORPUS_READ_FAILED");
    }

    #[test]
    fn lexical_index_over_a_small_corpus_succeeds() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("care.md"), "Care plans.\n\nFollow-up visits.").unwrap();
        let settings = Settings {
            corpus_path: dir.path().to_path_buf(),
            ..Settings::default()
        };
        assert_eq!(run(&settings, BackendChoice::Lexical).expect("index"), ExitCode::SUCCESS);
    }
}
