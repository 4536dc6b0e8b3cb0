use serde::{Deserialize, Serialize};

use crate::extractors::{CaptionError, CaptionSegment, CaptionSource, TrackSelector, VideoId};

/// Default caption languages, in order of preference
pub const DEFAULT_LANGUAGES: &[&str] = &["es", "en"];

/// One step of the caption fallback cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeStep {
    /// Any track in a preferred language that the video offers
    PreferredLanguages,
    /// A generated track in a preferred language that the video offers
    PreferredGenerated,
    /// Whatever the caption source picks by default
    Unfiltered,
    /// A generated track in any language the video offers
    AnyGenerated,
}

impl CascadeStep {
    /// Order in which the steps are tried
    pub const ORDER: [CascadeStep; 4] = [
        CascadeStep::PreferredLanguages,
        CascadeStep::PreferredGenerated,
        CascadeStep::Unfiltered,
        CascadeStep::AnyGenerated,
    ];

    pub fn description(&self) -> &'static str {
        match self {
            CascadeStep::PreferredLanguages => "preferred languages",
            CascadeStep::PreferredGenerated => "generated track in preferred languages",
            CascadeStep::Unfiltered => "default track",
            CascadeStep::AnyGenerated => "generated track in any language",
        }
    }
}

/// Outcome of a single cascade step
#[derive(Debug)]
pub enum Attempt {
    Found(Vec<CaptionSegment>),
    Inapplicable,
    Failed(CaptionError),
}

/// Caption segments for a video and the step that produced them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    pub segments: Vec<CaptionSegment>,
    pub step: Option<CascadeStep>,
}

impl Transcript {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segment texts joined with single spaces, in caption order
    pub fn full_text(&self) -> String {
        self.segments
            .iter()
            .map(|segment| segment.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Total time covered by the captions, in seconds
    pub fn duration(&self) -> f64 {
        self.segments
            .last()
            .map(|segment| segment.start + segment.duration)
            .unwrap_or_default()
    }
}

/// What the listing step learned about the video
struct CascadeContext {
    /// Every language with a track, `None` when listing failed
    available: Option<Vec<String>>,
    /// Preferred languages the video offers, in preference order
    preferred: Vec<String>,
}

impl CascadeContext {
    fn selector_for(&self, step: CascadeStep) -> Option<TrackSelector> {
        match step {
            CascadeStep::PreferredLanguages if !self.preferred.is_empty() => {
                Some(TrackSelector::Languages(self.preferred.clone()))
            }
            CascadeStep::PreferredGenerated if !self.preferred.is_empty() => {
                Some(TrackSelector::Generated(self.preferred.clone()))
            }
            CascadeStep::Unfiltered => Some(TrackSelector::Default),
            CascadeStep::AnyGenerated => self
                .available
                .as_ref()
                .filter(|langs| !langs.is_empty())
                .map(|langs| TrackSelector::Generated(langs.clone())),
            _ => None,
        }
    }
}

/// Caption retrieval with a fixed fallback order over language preferences
pub struct TranscriptRetriever<'a> {
    source: &'a dyn CaptionSource,
    languages: Vec<String>,
}

impl<'a> TranscriptRetriever<'a> {
    pub fn new(source: &'a dyn CaptionSource, languages: Vec<String>) -> Self {
        Self { source, languages }
    }

    /// Retrieve a transcript, returning an empty one when every step fails
    pub async fn retrieve(&self, video_id: &VideoId) -> Transcript {
        let context = match self.source.list_tracks(video_id).await {
            Ok(tracks) => {
                let mut available: Vec<String> = Vec::new();
                for track in tracks {
                    if !available.contains(&track.language_code) {
                        available.push(track.language_code);
                    }
                }
                tracing::info!("Caption tracks found for languages: {:?}", available);

                let preferred = self
                    .languages
                    .iter()
                    .filter(|lang| available.contains(*lang))
                    .cloned()
                    .collect();

                CascadeContext {
                    available: Some(available),
                    preferred,
                }
            }
            Err(e @ (CaptionError::NoCaptionsAvailable | CaptionError::CaptionsDisabled)) => {
                tracing::warn!("{}", e);
                return Transcript::default();
            }
            Err(e) => {
                tracing::warn!("{}; falling back to the default track", e);
                CascadeContext {
                    available: None,
                    preferred: Vec::new(),
                }
            }
        };

        for step in CascadeStep::ORDER {
            match self.attempt(video_id, step, &context).await {
                Attempt::Found(segments) => {
                    tracing::info!(
                        "Retrieved {} caption segments using {}",
                        segments.len(),
                        step.description()
                    );
                    return Transcript {
                        segments,
                        step: Some(step),
                    };
                }
                Attempt::Inapplicable => {
                    tracing::debug!("Skipping {}: not applicable", step.description());
                }
                Attempt::Failed(e) => {
                    tracing::warn!("Caption retrieval via {} failed: {}", step.description(), e);
                }
            }
        }

        Transcript::default()
    }

    async fn attempt(&self, video_id: &VideoId, step: CascadeStep, context: &CascadeContext) -> Attempt {
        let Some(selector) = context.selector_for(step) else {
            return Attempt::Inapplicable;
        };

        tracing::info!("Trying {} ({})", step.description(), selector);
        match self.source.fetch(video_id, &selector).await {
            Ok(segments) if segments.is_empty() => {
                Attempt::Failed(CaptionError::FetchFailed("track contains no segments".to_string()))
            }
            Ok(segments) => Attempt::Found(segments),
            Err(e) => Attempt::Failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::{CaptionTrack, MockCaptionSource, TrackKind};
    use mockall::Sequence;

    fn video() -> VideoId {
        VideoId::new("abc123").unwrap()
    }

    fn langs(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    fn segments(text: &str) -> Vec<CaptionSegment> {
        vec![CaptionSegment {
            text: text.to_string(),
            start: 0.0,
            duration: 1.5,
        }]
    }

    fn fetch_failed() -> CaptionError {
        CaptionError::FetchFailed("boom".to_string())
    }

    #[tokio::test]
    async fn test_preferred_language_succeeds_first() {
        let mut source = MockCaptionSource::new();
        source.expect_list_tracks().times(1).returning(|_| {
            Ok(vec![
                CaptionTrack::new("es", TrackKind::Manual),
                CaptionTrack::new("en", TrackKind::Generated),
                CaptionTrack::new("fr", TrackKind::Manual),
            ])
        });
        source
            .expect_fetch()
            .withf(|_, selector| *selector == TrackSelector::Languages(langs(&["en", "es"])))
            .times(1)
            .returning(|_, _| Ok(segments("hello")));

        let retriever = TranscriptRetriever::new(&source, langs(&["en", "de", "es"]));
        let transcript = retriever.retrieve(&video()).await;

        assert_eq!(transcript.step, Some(CascadeStep::PreferredLanguages));
        assert_eq!(transcript.full_text(), "hello");
    }

    #[tokio::test]
    async fn test_falls_back_to_generated_preferred_track() {
        let mut source = MockCaptionSource::new();
        let mut seq = Sequence::new();
        source
            .expect_list_tracks()
            .returning(|_| Ok(vec![CaptionTrack::new("es", TrackKind::Generated)]));
        source
            .expect_fetch()
            .withf(|_, selector| *selector == TrackSelector::Languages(langs(&["es"])))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(fetch_failed()));
        source
            .expect_fetch()
            .withf(|_, selector| *selector == TrackSelector::Generated(langs(&["es"])))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(segments("hola")));

        let retriever = TranscriptRetriever::new(&source, langs(&["es", "en"]));
        let transcript = retriever.retrieve(&video()).await;

        assert_eq!(transcript.step, Some(CascadeStep::PreferredGenerated));
        assert_eq!(transcript.full_text(), "hola");
    }

    #[tokio::test]
    async fn test_non_preferred_languages_reach_last_resort() {
        let mut source = MockCaptionSource::new();
        let mut seq = Sequence::new();
        source.expect_list_tracks().returning(|_| {
            Ok(vec![
                CaptionTrack::new("de", TrackKind::Manual),
                CaptionTrack::new("fr", TrackKind::Generated),
                CaptionTrack::new("de", TrackKind::Generated),
            ])
        });
        source
            .expect_fetch()
            .withf(|_, selector| *selector == TrackSelector::Default)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(fetch_failed()));
        source
            .expect_fetch()
            .withf(|_, selector| *selector == TrackSelector::Generated(langs(&["de", "fr"])))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(CaptionError::NoMatchingTrack("generated".to_string())));

        let retriever = TranscriptRetriever::new(&source, langs(&["es", "en"]));
        let transcript = retriever.retrieve(&video()).await;

        assert!(transcript.is_empty());
        assert_eq!(transcript.step, None);
    }

    #[tokio::test]
    async fn test_unfiltered_retrieval_for_foreign_captions() {
        let mut source = MockCaptionSource::new();
        source
            .expect_list_tracks()
            .returning(|_| Ok(vec![CaptionTrack::new("pt", TrackKind::Manual)]));
        source
            .expect_fetch()
            .withf(|_, selector| *selector == TrackSelector::Default)
            .times(1)
            .returning(|_, _| Ok(segments("olá")));

        let retriever = TranscriptRetriever::new(&source, langs(&["es", "en"]));
        let transcript = retriever.retrieve(&video()).await;

        assert_eq!(transcript.step, Some(CascadeStep::Unfiltered));
    }

    #[tokio::test]
    async fn test_terminal_listing_errors_return_empty() {
        for error in [CaptionError::NoCaptionsAvailable, CaptionError::CaptionsDisabled] {
            let mut source = MockCaptionSource::new();
            source
                .expect_list_tracks()
                .times(1)
                .returning(move |_| Err(error.clone()));
            source.expect_fetch().times(0);

            let retriever = TranscriptRetriever::new(&source, langs(&["es", "en"]));
            assert!(retriever.retrieve(&video()).await.is_empty());
        }
    }

    #[tokio::test]
    async fn test_listing_failure_goes_straight_to_default_track() {
        let mut source = MockCaptionSource::new();
        source
            .expect_list_tracks()
            .returning(|_| Err(CaptionError::ListingFailed("network down".to_string())));
        source
            .expect_fetch()
            .withf(|_, selector| *selector == TrackSelector::Default)
            .times(1)
            .returning(|_, _| Err(fetch_failed()));

        let retriever = TranscriptRetriever::new(&source, langs(&["es", "en"]));
        assert!(retriever.retrieve(&video()).await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_track_counts_as_failure() {
        let mut source = MockCaptionSource::new();
        let mut seq = Sequence::new();
        source
            .expect_list_tracks()
            .returning(|_| Ok(vec![CaptionTrack::new("en", TrackKind::Manual)]));
        source
            .expect_fetch()
            .withf(|_, selector| *selector == TrackSelector::Languages(langs(&["en"])))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(Vec::new()));
        source
            .expect_fetch()
            .withf(|_, selector| *selector == TrackSelector::Generated(langs(&["en"])))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(segments("second try")));

        let retriever = TranscriptRetriever::new(&source, langs(&["en"]));
        let transcript = retriever.retrieve(&video()).await;

        assert_eq!(transcript.step, Some(CascadeStep::PreferredGenerated));
    }

    #[test]
    fn test_transcript_text_and_duration() {
        let transcript = Transcript {
            segments: vec![
                CaptionSegment { text: "first part".into(), start: 0.0, duration: 2.0 },
                CaptionSegment { text: "second".into(), start: 2.0, duration: 3.5 },
            ],
            step: Some(CascadeStep::Unfiltered),
        };

        assert_eq!(transcript.full_text(), "first part second");
        assert_eq!(transcript.duration(), 5.5);
        assert_eq!(Transcript::default().duration(), 0.0);
    }
}
