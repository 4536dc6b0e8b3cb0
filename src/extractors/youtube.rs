use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::process::Stdio;
use std::sync::Mutex;
use tokio::process::Command;

use super::{CaptionError, CaptionSegment, CaptionSource, CaptionTrack, TrackKind, TrackSelector, VideoId};

/// Caption format requested from YouTube's timed text endpoint
const CAPTION_FORMAT: &str = "json3";

/// A listed track together with the URL its body is served from
#[derive(Debug, Clone)]
pub struct RemoteTrack {
    pub track: CaptionTrack,
    pub url: String,
}

/// Subset of `yt-dlp --dump-json` output describing caption tracks
#[derive(Debug, Deserialize)]
struct VideoInfo {
    #[serde(default)]
    subtitles: Option<BTreeMap<String, Vec<SubtitleFormat>>>,
    #[serde(default)]
    automatic_captions: Option<BTreeMap<String, Vec<SubtitleFormat>>>,
}

#[derive(Debug, Deserialize)]
struct SubtitleFormat {
    ext: String,
    url: String,
    name: Option<String>,
}

/// YouTube timed text body in `json3` format
#[derive(Debug, Deserialize)]
struct Json3Body {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Json3Event {
    #[serde(default)]
    t_start_ms: u64,
    #[serde(default)]
    d_duration_ms: u64,
    segs: Option<Vec<Json3Seg>>,
}

#[derive(Debug, Deserialize)]
struct Json3Seg {
    #[serde(default)]
    utf8: String,
}

/// YouTube caption source using yt-dlp for listings and HTTPS for caption bodies
pub struct YtDlpCaptionSource {
    yt_dlp_path: String,
    client: Client,
    listings: Mutex<HashMap<VideoId, Vec<RemoteTrack>>>,
}

impl YtDlpCaptionSource {
    pub fn new(yt_dlp_path: impl Into<String>) -> Self {
        Self {
            yt_dlp_path: yt_dlp_path.into(),
            client: Client::new(),
            listings: Mutex::new(HashMap::new()),
        }
    }

    /// Get video information using yt-dlp
    async fn get_video_info(&self, video_id: &VideoId) -> Result<String, CaptionError> {
        let url = video_id.watch_url();
        tracing::debug!("Listing caption tracks for: {}", url);

        let output = Command::new(&self.yt_dlp_path)
            .args(["--dump-json", "--skip-download", "--no-playlist", "--no-warnings", &url])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| CaptionError::ListingFailed(format!("failed to run {}: {}", self.yt_dlp_path, e)))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            if error.to_lowercase().contains("subtitles are disabled") {
                return Err(CaptionError::CaptionsDisabled);
            }
            return Err(CaptionError::ListingFailed(format!("yt-dlp failed: {}", error.trim())));
        }

        String::from_utf8(output.stdout)
            .map_err(|e| CaptionError::ListingFailed(format!("yt-dlp returned invalid UTF-8: {}", e)))
    }

    /// Listed tracks for a video, running yt-dlp at most once per successful listing
    async fn remote_tracks(&self, video_id: &VideoId) -> Result<Vec<RemoteTrack>, CaptionError> {
        if let Some(tracks) = self.cached(video_id) {
            return Ok(tracks);
        }

        let json = self.get_video_info(video_id).await?;
        let tracks = parse_video_info(&json)?;

        if let Ok(mut listings) = self.listings.lock() {
            listings.insert(video_id.clone(), tracks.clone());
        }
        Ok(tracks)
    }

    fn cached(&self, video_id: &VideoId) -> Option<Vec<RemoteTrack>> {
        self.listings.lock().ok()?.get(video_id).cloned()
    }

    /// Download and decode one caption body
    async fn download_track(&self, track: &RemoteTrack) -> Result<Vec<CaptionSegment>, CaptionError> {
        tracing::debug!(
            "Downloading {:?} caption track: {}",
            track.track.kind,
            track.track.language_code
        );

        let response = self
            .client
            .get(&track.url)
            .send()
            .await
            .map_err(|e| CaptionError::FetchFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CaptionError::FetchFailed(format!("HTTP {}", response.status())));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CaptionError::FetchFailed(e.to_string()))?;

        parse_json3(&body)
    }
}

#[async_trait]
impl CaptionSource for YtDlpCaptionSource {
    async fn list_tracks(&self, video_id: &VideoId) -> Result<Vec<CaptionTrack>, CaptionError> {
        let tracks = self.remote_tracks(video_id).await?;
        Ok(tracks.into_iter().map(|remote| remote.track).collect())
    }

    async fn fetch(
        &self,
        video_id: &VideoId,
        selector: &TrackSelector,
    ) -> Result<Vec<CaptionSegment>, CaptionError> {
        let tracks = self.remote_tracks(video_id).await?;
        let track = select_track(&tracks, selector)?;
        self.download_track(track).await
    }

    fn platform_name(&self) -> &'static str {
        "YouTube"
    }
}

impl Default for YtDlpCaptionSource {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

/// Turn `yt-dlp --dump-json` output into the list of usable caption tracks.
///
/// Machine translations of the automatic track (`tlang=` URLs) are skipped and
/// `xx-orig` keys are reported as `xx`.
pub fn parse_video_info(json: &str) -> Result<Vec<RemoteTrack>, CaptionError> {
    let info: VideoInfo = serde_json::from_str(json)
        .map_err(|e| CaptionError::ListingFailed(format!("invalid yt-dlp output: {}", e)))?;

    if info.subtitles.is_none() && info.automatic_captions.is_none() {
        return Err(CaptionError::CaptionsDisabled);
    }

    let mut tracks = Vec::new();
    collect_tracks(&mut tracks, info.subtitles.unwrap_or_default(), TrackKind::Manual);
    collect_tracks(
        &mut tracks,
        info.automatic_captions.unwrap_or_default(),
        TrackKind::Generated,
    );

    if tracks.is_empty() {
        return Err(CaptionError::NoCaptionsAvailable);
    }
    Ok(tracks)
}

fn collect_tracks(
    tracks: &mut Vec<RemoteTrack>,
    listing: BTreeMap<String, Vec<SubtitleFormat>>,
    kind: TrackKind,
) {
    for (key, formats) in listing {
        if key == "live_chat" {
            continue;
        }

        let Some(format) = formats
            .into_iter()
            .find(|f| f.ext == CAPTION_FORMAT && !f.url.contains("tlang="))
        else {
            continue;
        };

        let language_code = key.strip_suffix("-orig").unwrap_or(&key).to_string();
        let duplicate = tracks
            .iter()
            .any(|t| t.track.kind == kind && t.track.language_code == language_code);
        if duplicate {
            continue;
        }

        tracks.push(RemoteTrack {
            track: CaptionTrack {
                language_code,
                language_name: format.name,
                kind,
            },
            url: format.url,
        });
    }
}

/// Pick the track a selector refers to
pub fn select_track<'a>(
    tracks: &'a [RemoteTrack],
    selector: &TrackSelector,
) -> Result<&'a RemoteTrack, CaptionError> {
    let find = |lang: &str, kind: TrackKind| {
        tracks
            .iter()
            .find(|t| t.track.kind == kind && t.track.language_code == lang)
    };

    let selected = match selector {
        TrackSelector::Languages(langs) => langs.iter().find_map(|lang| {
            find(lang, TrackKind::Manual).or_else(|| find(lang, TrackKind::Generated))
        }),
        TrackSelector::Generated(langs) => {
            langs.iter().find_map(|lang| find(lang, TrackKind::Generated))
        }
        TrackSelector::Default => find("en", TrackKind::Manual)
            .or_else(|| find("en", TrackKind::Generated))
            .or_else(|| tracks.iter().find(|t| t.track.kind == TrackKind::Manual))
            .or_else(|| tracks.first()),
    };

    selected.ok_or_else(|| CaptionError::NoMatchingTrack(selector.to_string()))
}

/// Decode a `json3` caption body into segments, dropping empty events
pub fn parse_json3(body: &str) -> Result<Vec<CaptionSegment>, CaptionError> {
    let parsed: Json3Body = serde_json::from_str(body)
        .map_err(|e| CaptionError::FetchFailed(format!("invalid caption body: {}", e)))?;

    let segments = parsed
        .events
        .into_iter()
        .filter_map(|event| {
            let text = event
                .segs?
                .iter()
                .map(|seg| seg.utf8.as_str())
                .collect::<String>()
                .replace('\n', " ");
            let text = text.trim();
            if text.is_empty() {
                return None;
            }

            Some(CaptionSegment {
                text: text.to_string(),
                start: event.t_start_ms as f64 / 1000.0,
                duration: event.d_duration_ms as f64 / 1000.0,
            })
        })
        .collect();

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INFO: &str = r#"{
        "id": "abc",
        "title": "Demo",
        "subtitles": {
            "de": [{"ext": "vtt", "url": "https://yt/de.vtt"}, {"ext": "json3", "url": "https://yt/de.json3", "name": "German"}],
            "live_chat": [{"ext": "json", "url": "https://yt/chat"}]
        },
        "automatic_captions": {
            "en": [{"ext": "json3", "url": "https://yt/asr?lang=es&tlang=en"}],
            "es-orig": [{"ext": "json3", "url": "https://yt/asr?lang=es", "name": "Spanish (Original)"}],
            "es": [{"ext": "json3", "url": "https://yt/asr?lang=es"}]
        }
    }"#;

    fn codes(tracks: &[RemoteTrack]) -> Vec<(String, TrackKind)> {
        tracks
            .iter()
            .map(|t| (t.track.language_code.clone(), t.track.kind))
            .collect()
    }

    #[test]
    fn test_parse_video_info() {
        let tracks = parse_video_info(INFO).unwrap();
        assert_eq!(
            codes(&tracks),
            vec![
                ("de".to_string(), TrackKind::Manual),
                ("es".to_string(), TrackKind::Generated),
            ]
        );
        assert_eq!(tracks[0].url, "https://yt/de.json3");
        assert_eq!(tracks[0].track.language_name.as_deref(), Some("German"));
    }

    #[test]
    fn test_parse_video_info_without_captions() {
        let empty = r#"{"subtitles": {}, "automatic_captions": {}}"#;
        assert_eq!(parse_video_info(empty).unwrap_err(), CaptionError::NoCaptionsAvailable);

        let disabled = r#"{"id": "abc"}"#;
        assert_eq!(parse_video_info(disabled).unwrap_err(), CaptionError::CaptionsDisabled);

        assert!(matches!(
            parse_video_info("not json"),
            Err(CaptionError::ListingFailed(_))
        ));
    }

    #[test]
    fn test_select_track() {
        let tracks = parse_video_info(INFO).unwrap();

        let track = select_track(&tracks, &TrackSelector::Languages(vec!["es".into(), "de".into()])).unwrap();
        assert_eq!(track.track.kind, TrackKind::Generated);
        assert_eq!(track.track.language_code, "es");

        let track = select_track(&tracks, &TrackSelector::Default).unwrap();
        assert_eq!(track.track.language_code, "de");

        assert!(matches!(
            select_track(&tracks, &TrackSelector::Generated(vec!["de".into()])),
            Err(CaptionError::NoMatchingTrack(_))
        ));
    }

    #[test]
    fn test_default_selection_accepts_generated_tracks() {
        let english_asr = r#"{"subtitles": {}, "automatic_captions": {
            "en": [{"ext": "json3", "url": "https://yt/asr?lang=en"}]
        }}"#;
        let tracks = parse_video_info(english_asr).unwrap();
        let track = select_track(&tracks, &TrackSelector::Default).unwrap();
        assert_eq!(track.track.language_code, "en");
        assert_eq!(track.track.kind, TrackKind::Generated);

        let foreign_asr = r#"{"subtitles": {}, "automatic_captions": {
            "ja": [{"ext": "json3", "url": "https://yt/asr?lang=ja"}]
        }}"#;
        let tracks = parse_video_info(foreign_asr).unwrap();
        let track = select_track(&tracks, &TrackSelector::Default).unwrap();
        assert_eq!(track.track.language_code, "ja");
    }

    #[test]
    fn test_default_selection_prefers_human_english() {
        let info = r#"{
            "subtitles": {"fr": [{"ext": "json3", "url": "https://yt/fr"}], "en": [{"ext": "json3", "url": "https://yt/en"}]},
            "automatic_captions": {"en": [{"ext": "json3", "url": "https://yt/asr?lang=en"}]}
        }"#;
        let tracks = parse_video_info(info).unwrap();
        let track = select_track(&tracks, &TrackSelector::Default).unwrap();
        assert_eq!(track.url, "https://yt/en");

        let info = r#"{
            "subtitles": {"fr": [{"ext": "json3", "url": "https://yt/fr"}]},
            "automatic_captions": {"en": [{"ext": "json3", "url": "https://yt/asr?lang=en"}]}
        }"#;
        let tracks = parse_video_info(info).unwrap();
        let track = select_track(&tracks, &TrackSelector::Default).unwrap();
        assert_eq!(track.url, "https://yt/asr?lang=en");
    }

    #[test]
    fn test_parse_json3() {
        let body = r#"{"events": [
            {"tStartMs": 0, "dDurationMs": 5000},
            {"tStartMs": 1200, "dDurationMs": 2500, "segs": [{"utf8": "hola"}, {"utf8": " a todos"}]},
            {"tStartMs": 3700, "dDurationMs": 10, "segs": [{"utf8": "\n"}]},
            {"tStartMs": 4000, "dDurationMs": 1500, "segs": [{"utf8": "bienvenidos\nal canal"}]}
        ]}"#;

        let segments = parse_json3(body).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "hola a todos");
        assert_eq!(segments[0].start, 1.2);
        assert_eq!(segments[0].duration, 2.5);
        assert_eq!(segments[1].text, "bienvenidos al canal");
    }
}
