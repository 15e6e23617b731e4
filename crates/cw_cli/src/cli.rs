use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use cw_ai::retrieve::BackendChoice;
use cw_core::config::Settings;
use cw_core::error::AppError;

/// CareWeave - grounded question answering over a local clinical corpus
#[derive(Parser, Debug)]
#[command(name = "careweave")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Retrieval backend to use
    #[arg(long, global = true, value_enum, default_value_t = BackendArg::Auto)]
    pub backend: BackendArg,

    #[command(flatten)]
    pub settings: SettingsArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    /// Vector retrieval when the local embedding service is available, lexical otherwise
    Auto,
    /// Lexical retrieval only
    Lexical,
}

impl From<BackendArg> for BackendChoice {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Auto => BackendChoice::Auto,
            BackendArg::Lexical => BackendChoice::Lexical,
        }
    }
}

/// Every setting is a flag that also reads its environment variable.
/// Unset values take the defaults of [`Settings::default`].
#[derive(Args, Debug, Default)]
pub struct SettingsArgs {
    #[arg(long, env = "APP_NAME")]
    pub app_name: Option<String>,
    /// Raise the log level to debug
    #[arg(long, env = "DEBUG")]
    pub debug: bool,
    #[arg(long, env = "RETRIEVAL_TOP_K")]
    pub default_top_k: Option<usize>,
    #[arg(long, env = "CHUNK_SIZE")]
    pub chunk_size: Option<usize>,
    #[arg(long, env = "CHUNK_OVERLAP")]
    pub chunk_overlap: Option<usize>,
    #[arg(long, env = "CORPUS_PATH")]
    pub corpus_path: Option<PathBuf>,
    #[arg(long, env = "VECTOR_STORE_PATH")]
    pub vector_store_path: Option<PathBuf>,
    #[arg(long, env = "EVAL_SET_PATH")]
    pub eval_set_path: Option<PathBuf>,
    #[arg(long, env = "EVAL_REPORT_PATH")]
    pub eval_report_path: Option<PathBuf>,
    #[arg(long, env = "THRESHOLD_CITATION_COVERAGE")]
    pub threshold_citation_coverage: Option<f64>,
    #[arg(long, env = "THRESHOLD_GROUNDEDNESS_PROXY")]
    pub threshold_groundedness_proxy: Option<f64>,
    #[arg(long, env = "OLLAMA_BASE_URL")]
    pub ollama_base_url: Option<String>,
    #[arg(long, env = "EMBEDDING_MODEL")]
    pub embedding_model: Option<String>,
}

impl SettingsArgs {
    pub fn into_settings(self) -> Result<Settings, AppError> {
        let d = Settings::default();
        let settings = Settings {
            app_name: self.app_name.unwrap_or(d.app_name),
            debug: self.debug || d.debug,
            default_top_k: self.default_top_k.unwrap_or(d.default_top_k),
            chunk_size: self.chunk_size.unwrap_or(d.chunk_size),
            chunk_overlap: self.chunk_overlap.unwrap_or(d.chunk_overlap),
            corpus_path: self.corpus_path.unwrap_or(d.corpus_path),
            vector_store_path: self.vector_store_path.unwrap_or(d.vector_store_path),
            eval_set_path: self.eval_set_path.unwrap_or(d.eval_set_path),
            eval_report_path: self.eval_report_path.unwrap_or(d.eval_report_path),
            threshold_citation_coverage: self
                .threshold_citation_coverage
                .unwrap_or(d.threshold_citation_coverage),
            threshold_groundedness_proxy: self
                .threshold_groundedness_proxy
                .unwrap_or(d.threshold_groundedness_proxy),
            ollama_base_url: self.ollama_base_url.unwrap_or(d.ollama_base_url),
            embedding_model: self.embedding_model.unwrap_or(d.embedding_model),
        };
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// (Re)build the retrieval index from the corpus
    Index,

    /// Answer one question and print the response JSON
    Ask {
        /// The question to answer
        question: String,

        /// Number of documents to retrieve (0 or unset uses the configured default)
        #[arg(long)]
        top_k: Option<usize>,

        /// Opaque session identifier, carried through unchanged
        #[arg(long)]
        session_id: Option<String>,

        /// Request id to tag logs and the response with (generated when unset)
        #[arg(long)]
        request_id: Option<String>,
    },

    /// Run the evaluation set, write the report and apply the quality gate
    Eval {
        /// Evaluate only the first N items
        #[arg(long)]
        n: Option<usize>,
    },
}
