use std::cmp::Ordering;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{is_url, MediaResolver};
use crate::config::Config;
use crate::error::ResolutionError;
use crate::player::track::{CandidateTrack, Track};

/// Resolver backed by the yt-dlp executable.
///
/// Single-item resolution asks for the full format table (`-J`) and picks a
/// stream locally. Searches use `--flat-playlist`, which returns listing
/// metadata without touching any watch page.
pub struct YtDlpResolver {
    bin: String,
    socket_timeout: u64,
}

impl YtDlpResolver {
    pub fn new(bin: impl Into<String>, socket_timeout: u64) -> Self {
        Self {
            bin: bin.into(),
            socket_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.ytdlp_bin.clone(), config.ytdlp_socket_timeout)
    }

    async fn probe(&self, target: &str, player_client: &str) -> Result<Vec<u8>, ResolutionError> {
        let output = tokio::process::Command::new(&self.bin)
            .args([
                "-J",
                "--no-playlist",
                "--quiet",
                "--no-warnings",
                "--socket-timeout",
                &self.socket_timeout.to_string(),
                "--extractor-args",
                &format!("youtube:player_client={player_client}"),
            ])
            .arg(target)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ResolutionError::Upstream(stderr));
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl MediaResolver for YtDlpResolver {
    async fn resolve_one(&self, reference: &str) -> Result<Track, ResolutionError> {
        let target = if is_url(reference) {
            reference.to_string()
        } else {
            format!("ytsearch1:{reference}")
        };

        let stdout = match self.probe(&target, "web").await {
            Ok(stdout) => stdout,
            // Some videos are withheld from the web client; the android
            // client usually still serves them.
            Err(ResolutionError::Upstream(message))
                if message.contains("not available on this app") =>
            {
                warn!(%target, "web client refused, retrying with android client");
                self.probe(&target, "android").await?
            }
            Err(err) => return Err(err),
        };

        let info: ProbeInfo = serde_json::from_slice(&stdout)?;
        track_from_info(info, reference)
    }

    async fn search_flat(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<CandidateTrack>, ResolutionError> {
        let target = format!("ytsearch{limit}:{query}");
        let output = tokio::process::Command::new(&self.bin)
            .args([
                "-J",
                "--flat-playlist",
                "--skip-download",
                "--quiet",
                "--no-warnings",
                "--socket-timeout",
                &self.socket_timeout.to_string(),
            ])
            .arg(&target)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ResolutionError::Upstream(stderr));
        }

        let listing: FlatListing = serde_json::from_slice(&output.stdout)?;
        let candidates: Vec<CandidateTrack> = listing
            .entries
            .into_iter()
            .flatten()
            .filter_map(candidate_from_entry)
            .take(limit)
            .collect();
        debug!(%query, hits = candidates.len(), "flat search finished");
        Ok(candidates)
    }
}

#[derive(Debug, Deserialize)]
struct ProbeInfo {
    title: Option<String>,
    webpage_url: Option<String>,
    url: Option<String>,
    #[serde(default)]
    formats: Vec<FormatInfo>,
    entries: Option<Vec<ProbeInfo>>,
}

#[derive(Debug, Deserialize)]
struct FormatInfo {
    url: Option<String>,
    acodec: Option<String>,
    vcodec: Option<String>,
    abr: Option<f64>,
    tbr: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct FlatListing {
    entries: Option<Vec<FlatEntry>>,
}

#[derive(Debug, Deserialize)]
struct FlatEntry {
    id: Option<String>,
    url: Option<String>,
    title: Option<String>,
    duration: Option<f64>,
    channel: Option<String>,
    uploader: Option<String>,
}

fn has_codec(codec: &Option<String>) -> bool {
    matches!(codec.as_deref(), Some(value) if value != "none")
}

fn bitrate(format: &FormatInfo) -> f64 {
    format.abr.or(format.tbr).unwrap_or(0.0)
}

/// Stream choice order: best audio-only format, then best progressive
/// format, then whatever top-level URL the extractor reports.
fn pick_stream_url(info: &ProbeInfo) -> Option<String> {
    let by_bitrate = |a: &&FormatInfo, b: &&FormatInfo| {
        bitrate(a).partial_cmp(&bitrate(b)).unwrap_or(Ordering::Equal)
    };

    let audio_only = info
        .formats
        .iter()
        .filter(|f| f.url.is_some() && has_codec(&f.acodec) && !has_codec(&f.vcodec))
        .max_by(by_bitrate);
    if let Some(format) = audio_only {
        return format.url.clone();
    }

    let progressive = info
        .formats
        .iter()
        .filter(|f| f.url.is_some() && has_codec(&f.acodec) && has_codec(&f.vcodec))
        .max_by(by_bitrate);
    if let Some(format) = progressive {
        return format.url.clone();
    }

    info.url.clone()
}

fn track_from_info(info: ProbeInfo, reference: &str) -> Result<Track, ResolutionError> {
    // A search target comes back as a one-entry playlist.
    let info = match info.entries {
        Some(entries) => entries
            .into_iter()
            .next()
            .ok_or(ResolutionError::NoResults)?,
        None => info,
    };

    let stream_url = pick_stream_url(&info).ok_or(ResolutionError::NoStream)?;
    Ok(Track {
        title: info.title.unwrap_or_else(|| "Unknown".to_string()),
        stream_url,
        page_url: info
            .webpage_url
            .unwrap_or_else(|| reference.to_string()),
    })
}

fn looks_like_video_id(value: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("hardcoded pattern"))
        .is_match(value)
}

/// Flat listings sometimes carry a bare video id where the url belongs.
fn candidate_from_entry(entry: FlatEntry) -> Option<CandidateTrack> {
    let reference = entry.url.or(entry.id)?;
    let page_url = if looks_like_video_id(&reference) {
        format!("https://www.youtube.com/watch?v={reference}")
    } else {
        reference
    };

    Some(CandidateTrack {
        title: entry.title.unwrap_or_else(|| "Untitled".to_string()),
        page_url,
        duration: entry.duration.map(|d| d as u64),
        channel: entry.channel.or(entry.uploader),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn probe(json: &str) -> ProbeInfo {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn prefers_best_audio_only_format() {
        let info = probe(
            r#"{
                "title": "t",
                "formats": [
                    {"url": "https://cdn/a128", "acodec": "opus", "vcodec": "none", "abr": 128.0},
                    {"url": "https://cdn/a64", "acodec": "opus", "vcodec": "none", "abr": 64.0},
                    {"url": "https://cdn/prog", "acodec": "aac", "vcodec": "h264", "tbr": 900.0}
                ]
            }"#,
        );
        assert_eq!(pick_stream_url(&info).unwrap(), "https://cdn/a128");
    }

    #[test]
    fn audio_only_falls_back_to_tbr_when_abr_missing() {
        let info = probe(
            r#"{
                "formats": [
                    {"url": "https://cdn/low", "acodec": "opus", "vcodec": "none", "tbr": 50.0},
                    {"url": "https://cdn/high", "acodec": "opus", "vcodec": "none", "tbr": 70.0}
                ]
            }"#,
        );
        assert_eq!(pick_stream_url(&info).unwrap(), "https://cdn/high");
    }

    #[test]
    fn falls_back_to_progressive() {
        let info = probe(
            r#"{
                "formats": [
                    {"url": "https://cdn/video-only", "acodec": "none", "vcodec": "vp9", "tbr": 2000.0},
                    {"url": "https://cdn/prog", "acodec": "aac", "vcodec": "h264", "tbr": 700.0}
                ]
            }"#,
        );
        assert_eq!(pick_stream_url(&info).unwrap(), "https://cdn/prog");
    }

    #[test]
    fn falls_back_to_top_level_url() {
        let info = probe(r#"{"url": "https://cdn/direct", "formats": []}"#);
        assert_eq!(pick_stream_url(&info).unwrap(), "https://cdn/direct");
    }

    #[test]
    fn no_usable_stream_is_none() {
        let info = probe(
            r#"{"formats": [{"url": "https://cdn/v", "acodec": "none", "vcodec": "vp9"}]}"#,
        );
        assert!(pick_stream_url(&info).is_none());
    }

    #[test]
    fn search_wrapper_unwraps_first_entry() {
        let info = probe(
            r#"{
                "entries": [
                    {"title": "hit", "webpage_url": "https://www.youtube.com/watch?v=abcdefghijk",
                     "formats": [{"url": "https://cdn/hit", "acodec": "opus", "vcodec": "none"}]}
                ]
            }"#,
        );
        let track = track_from_info(info, "ytsearch1:hit").unwrap();
        assert_eq!(track.title, "hit");
        assert_eq!(track.stream_url, "https://cdn/hit");
        assert_eq!(track.page_url, "https://www.youtube.com/watch?v=abcdefghijk");
    }

    #[test]
    fn empty_search_wrapper_is_no_results() {
        let info = probe(r#"{"entries": []}"#);
        assert!(matches!(
            track_from_info(info, "ytsearch1:nothing"),
            Err(ResolutionError::NoResults)
        ));
    }

    #[test]
    fn missing_stream_is_no_stream() {
        let info = probe(r#"{"title": "t", "formats": []}"#);
        assert!(matches!(
            track_from_info(info, "https://example.com/watch"),
            Err(ResolutionError::NoStream)
        ));
    }

    #[test]
    fn page_url_falls_back_to_the_reference() {
        let info = probe(
            r#"{"title": "t", "formats": [{"url": "https://cdn/s", "acodec": "mp4a", "vcodec": "none"}]}"#,
        );
        let track = track_from_info(info, "https://example.com/page").unwrap();
        assert_eq!(track.page_url, "https://example.com/page");
    }

    #[test]
    fn bare_video_id_becomes_watch_url() {
        let entry: FlatEntry =
            serde_json::from_str(r#"{"id": "dQw4w9WgXcQ", "title": "gotcha", "duration": 212.0}"#)
                .unwrap();
        let candidate = candidate_from_entry(entry).unwrap();
        assert_eq!(
            candidate.page_url,
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
        assert_eq!(candidate.duration, Some(212));
    }

    #[test]
    fn full_url_entry_is_kept_as_is() {
        let entry: FlatEntry = serde_json::from_str(
            r#"{"url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ", "title": "x", "uploader": "ch"}"#,
        )
        .unwrap();
        let candidate = candidate_from_entry(entry).unwrap();
        assert_eq!(
            candidate.page_url,
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
        assert_eq!(candidate.channel.as_deref(), Some("ch"));
    }

    #[test]
    fn entry_without_reference_is_dropped() {
        let entry: FlatEntry = serde_json::from_str(r#"{"title": "ghost"}"#).unwrap();
        assert!(candidate_from_entry(entry).is_none());
    }

    #[test]
    fn listing_parse_skips_unusable_entries() {
        let listing: FlatListing = serde_json::from_str(
            r#"{"entries": [
                {"id": "dQw4w9WgXcQ", "title": "a"},
                {"title": "no reference"},
                {"url": "https://www.youtube.com/watch?v=abcdefghijk", "title": "b"}
            ]}"#,
        )
        .unwrap();
        let candidates: Vec<CandidateTrack> = listing
            .entries
            .into_iter()
            .flatten()
            .filter_map(candidate_from_entry)
            .collect();
        assert_eq!(candidates.len(), 2);
    }
}
