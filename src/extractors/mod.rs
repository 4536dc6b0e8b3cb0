use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

pub mod youtube;

/// Opaque YouTube video identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    /// Wrap an identifier, rejecting empty strings
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical watch page URL for this video
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum UrlParseError {
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),

    #[error("Unsupported host in URL: {0}")]
    UnsupportedHost(String),

    #[error("No video identifier found in URL: {0}")]
    MissingId(String),
}

/// Extract the video identifier from a long-form or short-form YouTube URL.
///
/// The value is returned exactly as it appears in the URL: no percent-decoding
/// and no validation of the identifier's shape.
pub fn extract_video_id(url: &str) -> Result<VideoId, UrlParseError> {
    let parsed = Url::parse(url).map_err(|_| UrlParseError::InvalidUrl(url.to_string()))?;
    let host = parsed.host_str().unwrap_or_default();

    let id = if host.contains("youtube.com") {
        raw_query_param(&parsed, "v").unwrap_or_default()
    } else if host.contains("youtu.be") {
        parsed.path().trim_start_matches('/')
    } else {
        return Err(UrlParseError::UnsupportedHost(url.to_string()));
    };

    VideoId::new(id).ok_or_else(|| UrlParseError::MissingId(url.to_string()))
}

/// Look up the first non-empty value of a query parameter, without decoding it
fn raw_query_param<'a>(url: &'a Url, key: &str) -> Option<&'a str> {
    url.query()?.split('&').find_map(|pair| {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        (name == key && !value.is_empty()).then_some(value)
    })
}

/// A timed unit of caption text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionSegment {
    pub text: String,

    /// Start time in seconds
    pub start: f64,

    /// Duration in seconds
    pub duration: f64,
}

/// Whether a caption track was written by a person or produced by speech recognition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Manual,
    Generated,
}

/// A caption track advertised for a video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionTrack {
    pub language_code: String,
    pub language_name: Option<String>,
    pub kind: TrackKind,
}

impl CaptionTrack {
    pub fn new(language_code: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            language_code: language_code.into(),
            language_name: None,
            kind,
        }
    }
}

/// How a caption source should pick the track to fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackSelector {
    /// First language in order that has any track, manual tracks preferred
    Languages(Vec<String>),

    /// First language in order that has a generated track
    Generated(Vec<String>),

    /// The source's own default choice
    Default,
}

impl std::fmt::Display for TrackSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackSelector::Languages(langs) => write!(f, "languages [{}]", langs.join(", ")),
            TrackSelector::Generated(langs) => write!(f, "generated [{}]", langs.join(", ")),
            TrackSelector::Default => write!(f, "default track"),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptionError {
    #[error("No captions are available for this video")]
    NoCaptionsAvailable,

    #[error("Captions are disabled for this video")]
    CaptionsDisabled,

    #[error("Failed to list caption tracks: {0}")]
    ListingFailed(String),

    #[error("No caption track matches {0}")]
    NoMatchingTrack(String),

    #[error("Failed to fetch caption track: {0}")]
    FetchFailed(String),
}

/// Black-box access to a video platform's caption tracks
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CaptionSource: Send + Sync {
    /// List the caption tracks available for a video
    async fn list_tracks(&self, video_id: &VideoId) -> Result<Vec<CaptionTrack>, CaptionError>;

    /// Fetch the segments of the track picked by `selector`
    async fn fetch(
        &self,
        video_id: &VideoId,
        selector: &TrackSelector,
    ) -> Result<Vec<CaptionSegment>, CaptionError>;

    /// Get the name of the platform behind this source
    fn platform_name(&self) -> &'static str;
}
