use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::extractors::youtube::YtDlpCaptionSource;
use crate::extractors::{extract_video_id, CaptionSource, VideoId};
use crate::rewrite::{ChatCompletionClient, Rewriter};
use crate::utils::format_duration;
use crate::CorrectorError;

pub mod chunker;
pub mod retriever;

pub use chunker::{chunk_text, DEFAULT_MAX_WORDS};
pub use retriever::{CascadeStep, Transcript, TranscriptRetriever, DEFAULT_LANGUAGES};

/// Correction result with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionReport {
    /// Video the captions belong to
    pub video_id: VideoId,

    /// Cascade step that produced the captions
    pub caption_step: Option<CascadeStep>,

    /// Time covered by the captions in seconds
    pub caption_duration: f64,

    /// Model that corrected the chunks
    pub model: String,

    /// Per-chunk input and output, in transcript order
    pub chunks: Vec<ChunkCorrection>,

    /// Corrected chunks joined by newlines
    pub corrected_text: String,

    /// Timestamp when correction completed
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkCorrection {
    /// 1-based position in the transcript
    pub index: usize,

    pub original: String,

    /// `None` when the completion request failed
    pub corrected: Option<String>,
}

impl CorrectionReport {
    /// Number of chunks whose correction failed
    pub fn failed_chunks(&self) -> usize {
        self.chunks.iter().filter(|c| c.corrected.is_none()).count()
    }
}

/// Resolve a user-supplied URL to the video it points to
pub fn video_id_from_url(url: &str) -> std::result::Result<VideoId, CorrectorError> {
    extract_video_id(url).map_err(|e| {
        tracing::debug!("{}", e);
        CorrectorError::NoVideoId(url.to_string())
    })
}

/// Main correction pipeline
pub struct CorrectionPipeline {
    source: Box<dyn CaptionSource>,
    rewriter: Rewriter,
    languages: Vec<String>,
    max_words: usize,
    show_progress: bool,
}

impl CorrectionPipeline {
    /// Create a pipeline from explicit caption and completion services
    pub fn new(
        source: Box<dyn CaptionSource>,
        rewriter: Rewriter,
        languages: Vec<String>,
        max_words: usize,
    ) -> Self {
        Self {
            source,
            rewriter,
            languages,
            max_words,
            show_progress: false,
        }
    }

    /// Create the production pipeline: yt-dlp captions and an HTTP completion client
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.api_key()?;

        let source = YtDlpCaptionSource::new(&config.captions.yt_dlp_path);
        let client = ChatCompletionClient::new(&config.completion, api_key);
        let rewriter = Rewriter::new(Box::new(client), &config.completion.prompt_template);

        Ok(Self::new(
            Box::new(source),
            rewriter,
            config.captions.languages.clone(),
            config.app.max_words,
        ))
    }

    /// Show a progress bar while chunks are corrected
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Fetch, chunk and correct the captions of a video
    pub async fn correct_video(&self, video_id: VideoId) -> Result<CorrectionReport> {
        tracing::info!(
            "Retrieving {} captions (preferred languages: {})",
            self.source.platform_name(),
            self.languages.join(", ")
        );
        let transcript = TranscriptRetriever::new(self.source.as_ref(), self.languages.clone())
            .retrieve(&video_id)
            .await;

        if transcript.is_empty() {
            return Err(CorrectorError::NoTranscript(video_id.to_string()).into());
        }
        tracing::info!(
            "Transcript has {} segments covering {}",
            transcript.segments.len(),
            format_duration(transcript.duration())
        );

        let chunks = chunk_text(&transcript.full_text(), self.max_words);
        tracing::info!("Split transcript into {} chunks of up to {} words", chunks.len(), self.max_words);

        let corrections = self.rewrite_chunks(chunks).await;

        let corrected_text = corrections
            .iter()
            .map(|c| c.corrected.as_deref().unwrap_or_default())
            .collect::<Vec<_>>()
            .join("\n");

        Ok(CorrectionReport {
            video_id,
            caption_step: transcript.step,
            caption_duration: transcript.duration(),
            model: self.rewriter.model().to_string(),
            chunks: corrections,
            corrected_text,
            completed_at: chrono::Utc::now(),
        })
    }

    /// Rewrite chunks one at a time, keeping their order
    async fn rewrite_chunks(&self, chunks: Vec<String>) -> Vec<ChunkCorrection> {
        let total = chunks.len();
        let progress = if self.show_progress {
            let bar = ProgressBar::new(total as u64);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar.set_message("Correcting chunks...");
            bar
        } else {
            ProgressBar::hidden()
        };

        let mut corrections = Vec::with_capacity(total);
        for (i, chunk) in chunks.into_iter().enumerate() {
            let index = i + 1;
            progress.suspend(|| println!("Processing chunk {}/{}...", index, total));

            let corrected = self.rewriter.rewrite(&chunk).await.filter(|text| !text.is_empty());
            if corrected.is_none() {
                tracing::warn!("Chunk {}/{} could not be corrected; leaving it empty", index, total);
            }

            corrections.push(ChunkCorrection {
                index,
                original: chunk,
                corrected,
            });
            progress.inc(1);
        }

        progress.finish_with_message("Correction complete");
        corrections
    }
}
