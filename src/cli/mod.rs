use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "caption-corrector",
    about = "Caption Corrector - Fetch YouTube captions and fix transcription errors with an LLM",
    version,
    long_about = "Fetches the caption track of a YouTube video, preferring human-written captions in your languages, splits it into word-bounded chunks and asks an LLM completion endpoint to correct each chunk. The corrected transcript is printed and copied to the clipboard."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Correct the captions of a YouTube video
    Correct {
        /// YouTube video URL (youtube.com/watch?v=... or youtu.be/...)
        #[arg(value_name = "URL")]
        url: String,

        /// Preferred caption languages, most preferred first (overrides config)
        #[arg(short, long, value_name = "LANGS", value_delimiter = ',', env = "CAPTION_LANGUAGES")]
        languages: Option<Vec<String>>,

        /// Maximum words per completion request (overrides config)
        #[arg(short = 'w', long, value_name = "COUNT", value_parser = clap::value_parser!(u32).range(1..))]
        max_words: Option<u32>,

        /// Completion model (overrides config)
        #[arg(short, long, value_name = "MODEL")]
        model: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Also save the output to this file
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Do not copy the corrected transcript to the clipboard
        #[arg(long)]
        no_clipboard: bool,
    },

    /// Show or set up configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}

#[derive(ValueEnum, Clone, Debug)]
pub enum OutputFormat {
    /// Corrected transcript as plain text
    Text,
    /// Report with per-chunk originals and corrections
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
