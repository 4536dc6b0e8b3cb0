//! Caption Corrector - A Rust CLI tool for cleaning up YouTube captions
//!
//! This library fetches a video's caption track through a fallback cascade of
//! language preferences, splits the text into word-bounded chunks and asks an
//! LLM completion endpoint to correct each chunk before reassembling the result.

pub mod cli;
pub mod config;
pub mod extractors;
pub mod output;
pub mod rewrite;
pub mod transcribe;
pub mod utils;

pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use extractors::{extract_video_id, CaptionSegment, CaptionSource, VideoId};
pub use rewrite::{CompletionService, Rewriter};
pub use transcribe::{video_id_from_url, CorrectionPipeline, CorrectionReport};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types that end a correction run early
#[derive(thiserror::Error, Debug)]
pub enum CorrectorError {
    #[error("No video identifier found in URL: {0}")]
    NoVideoId(String),

    #[error("No transcript could be retrieved for video {0}")]
    NoTranscript(String),

    #[error("Missing API key: {env_var} environment variable is not set")]
    MissingApiKey { env_var: String },
}
