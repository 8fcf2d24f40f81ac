use crate::media::model::{MediaFormat, MediaMetadata};
use crate::media::utils::{ClassificationTable, PlatformClass};
use crate::utils::{ANALYSIS_TIMEOUT, ENGINE_PATH};
use serde_json::Value;
use std::cmp::Reverse;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, error};
use youtube_dl::YoutubeDl;

pub const DESKTOP_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

/// Browsers tried for session cookies, in order, when a plain run finds nothing.
pub const COOKIE_BROWSERS: [&str; 3] = ["chrome", "edge", "firefox"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineProfile {
    Direct,
    BrowserCookies(&'static str),
}

/// Bounded front of the yt-dlp subprocess. Every run holds one permit so a
/// burst of analyze calls cannot fork an unbounded number of engines.
#[derive(Clone)]
pub struct ExtractionEngine {
    permits: Arc<Semaphore>,
    platforms: Arc<ClassificationTable>,
}

impl ExtractionEngine {
    pub fn new(concurrency: usize, platforms: Arc<ClassificationTable>) -> Self {
        ExtractionEngine {
            permits: Arc::new(Semaphore::new(concurrency)),
            platforms,
        }
    }

    /// Runs the engine against the URL and parses its JSON report.
    /// Every failure is logged and collapses to None.
    pub async fn analyze(&self, url: &str, profile: EngineProfile) -> Option<MediaMetadata> {
        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => return None,
        };

        debug!(url = %url, profile = ?profile, "Dispatching extraction engine");

        let mut command = YoutubeDl::new(url.to_string());
        command
            .socket_timeout("10")
            .user_agent(DESKTOP_UA)
            .referer("https://www.google.com/")
            .flat_playlist(true)
            .extra_arg("--no-check-certificates")
            .extra_arg("--geo-bypass")
            .process_timeout(Duration::from_secs(*ANALYSIS_TIMEOUT));

        if let Some(path) = ENGINE_PATH.as_ref() {
            command.youtube_dl_path(path);
        }
        if let EngineProfile::BrowserCookies(browser) = profile {
            command.extra_arg("--cookies-from-browser").extra_arg(browser);
        }

        match command.run_raw_async().await {
            Ok(raw) => Some(parse_engine_output(raw, url, &self.platforms)),
            Err(error) => {
                error!(url = %url, profile = ?profile, error = %error, "Extraction engine run failed");
                None
            }
        }
    }
}

fn text_field(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(text)) => Some(text.clone()),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    }
}

fn numeric_field(value: Option<&Value>) -> Option<u64> {
    let value = value?;
    value
        .as_u64()
        .or_else(|| value.as_f64().map(|number| number as u64))
}

/// Turns a raw engine report into metadata. Total over any JSON shape the
/// engine emits, including playlists and format-less direct results.
pub fn parse_engine_output(
    raw: Value,
    original_url: &str,
    platforms: &ClassificationTable,
) -> MediaMetadata {
    let mut info = raw;
    if let Some(entries) = info.get("entries").and_then(Value::as_array) {
        if !entries.is_empty() {
            info = entries[0].clone();
        }
    }

    let class = platforms.classify(original_url);

    let raw_formats: Vec<Value> = match info.get("formats").and_then(Value::as_array) {
        Some(formats) if !formats.is_empty() => formats.clone(),
        _ => {
            // A direct result carries its one playable URL at the top level
            if info.get("url").and_then(Value::as_str).is_some() {
                vec![info.clone()]
            } else {
                Vec::new()
            }
        }
    };

    let mut formats = Vec::new();
    for entry in &raw_formats {
        let url = match entry.get("url").and_then(Value::as_str) {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => continue,
        };

        let vcodec = entry.get("vcodec").and_then(Value::as_str).unwrap_or("none");
        let acodec = entry.get("acodec").and_then(Value::as_str).unwrap_or("none");
        let combined = vcodec != "none" && acodec != "none";

        let extension = entry
            .get("ext")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        // Strict platforms lose their separate streams, everything else is
        // kept liberally since it usually plays in-browser anyway.
        let include = match class {
            PlatformClass::Strict => {
                combined || matches!(extension.as_str(), "mp4" | "m4a" | "mp3")
            }
            PlatformClass::Liberal | PlatformClass::Standard => true,
        };
        if !include {
            continue;
        }

        let resolution = entry
            .get("resolution")
            .and_then(Value::as_str)
            .filter(|label| !label.is_empty())
            .map(|label| label.to_string())
            .or_else(|| numeric_field(entry.get("height")).map(|height| format!("{}p", height)))
            .unwrap_or_else(|| "HD".to_string());

        let filesize =
            numeric_field(entry.get("filesize")).or_else(|| numeric_field(entry.get("filesize_approx")));

        formats.push(MediaFormat {
            format_id: text_field(entry.get("format_id")).unwrap_or_default(),
            extension: if extension.is_empty() {
                "mp4".to_string()
            } else {
                extension
            },
            resolution: Some(resolution),
            filesize,
            quality_label: None,
            url,
        });
    }

    formats.sort_by_key(|format| {
        (
            Reverse(format.extension == "mp4"),
            Reverse(format.resolution.as_deref() != Some("HD")),
        )
    });

    MediaMetadata {
        id: text_field(info.get("id"))
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| "media".to_string()),
        title: text_field(info.get("title")).unwrap_or_else(|| "Media".to_string()),
        thumbnail: info
            .get("thumbnail")
            .and_then(Value::as_str)
            .map(str::to_string),
        duration: info.get("duration").and_then(Value::as_f64),
        uploader: text_field(info.get("uploader")),
        platform: text_field(info.get("extractor_key")).unwrap_or_else(|| "Platform".to_string()),
        formats,
        original_url: original_url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table() -> ClassificationTable {
        ClassificationTable::default()
    }

    #[test]
    fn strict_platform_drops_separate_streams_and_sorts_mp4_first() {
        let raw = json!({
            "id": "dQw4w9WgXcQ",
            "title": "Some Clip",
            "thumbnail": "https://i.test/t.jpg",
            "duration": 212,
            "uploader": "someone",
            "extractor_key": "Youtube",
            "formats": [
                {"format_id": "140", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2",
                 "url": "https://v.test/140"},
                {"format_id": "248", "ext": "webm", "vcodec": "vp9", "acodec": "none",
                 "height": 1080, "url": "https://v.test/248"},
                {"format_id": "22", "ext": "mp4", "vcodec": "avc1", "acodec": "mp4a.40.2",
                 "height": 720, "filesize": 1048576, "url": "https://v.test/22"},
            ],
        });

        let meta = parse_engine_output(raw, "https://www.youtube.com/watch?v=dQw4w9WgXcQ", &table());

        assert_eq!(meta.id, "dQw4w9WgXcQ");
        assert_eq!(meta.platform, "Youtube");
        assert_eq!(meta.duration, Some(212.0));
        assert_eq!(meta.formats.len(), 2);
        assert_eq!(meta.formats[0].format_id, "22");
        assert_eq!(meta.formats[0].resolution.as_deref(), Some("720p"));
        assert_eq!(meta.formats[0].filesize, Some(1048576));
        assert_eq!(meta.formats[1].format_id, "140");
        assert_eq!(meta.formats[1].resolution.as_deref(), Some("HD"));
    }

    #[test]
    fn standard_platform_keeps_separate_streams() {
        let raw = json!({
            "id": "clip9",
            "title": "Elsewhere",
            "formats": [
                {"format_id": "hls-1080", "ext": "webm", "vcodec": "vp9", "acodec": "none",
                 "resolution": "1920x1080", "height": 1080, "url": "https://v.test/hls"},
            ],
        });

        let meta = parse_engine_output(raw, "https://example.com/watch/clip9", &table());

        assert_eq!(meta.formats.len(), 1);
        assert_eq!(meta.formats[0].resolution.as_deref(), Some("1920x1080"));
    }

    #[test]
    fn liberal_platform_keeps_separate_streams() {
        let raw = json!({
            "id": "CxYz12AbQ_r",
            "title": "Reel",
            "extractor_key": "Instagram",
            "formats": [
                {"format_id": "dash-v", "ext": "mp4", "vcodec": "avc1", "acodec": "none",
                 "height": 1080, "url": "https://ig.test/v"},
                {"format_id": "dash-a", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2",
                 "url": "https://ig.test/a"},
                {"format_id": "hls-360", "ext": "webm", "vcodec": "vp9", "acodec": "none",
                 "height": 360, "url": "https://ig.test/hls"},
            ],
        });

        let meta = parse_engine_output(
            raw,
            "https://www.instagram.com/reel/CxYz12AbQ_r/",
            &table(),
        );

        assert_eq!(meta.platform, "Instagram");
        assert_eq!(meta.formats.len(), 3);
        assert_eq!(meta.formats[0].format_id, "dash-v");
        assert_eq!(meta.formats[1].format_id, "hls-360");
        assert_eq!(meta.formats[2].format_id, "dash-a");
    }

    #[test]
    fn collections_collapse_to_their_first_entry() {
        let raw = json!({
            "entries": [
                {"id": "first", "title": "First", "url": "https://cdn.test/first.mp4", "ext": "mp4"},
                {"id": "second", "title": "Second", "url": "https://cdn.test/second.mp4", "ext": "mp4"},
            ],
        });

        let meta = parse_engine_output(raw, "https://example.com/playlist", &table());

        assert_eq!(meta.id, "first");
        assert_eq!(meta.formats.len(), 1);
        assert_eq!(meta.formats[0].url, "https://cdn.test/first.mp4");
    }

    #[test]
    fn bare_url_results_synthesize_one_format() {
        let raw = json!({
            "id": "x1",
            "title": "Bare",
            "url": "https://cdn.test/clip.mp4",
            "ext": "mp4",
        });

        let meta = parse_engine_output(raw, "https://example.com/x1", &table());

        assert_eq!(meta.formats.len(), 1);
        assert_eq!(meta.formats[0].extension, "mp4");
        assert_eq!(meta.formats[0].url, "https://cdn.test/clip.mp4");
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let meta = parse_engine_output(json!({}), "https://example.com/empty", &table());

        assert_eq!(meta.id, "media");
        assert_eq!(meta.title, "Media");
        assert_eq!(meta.platform, "Platform");
        assert!(meta.formats.is_empty());
    }

    #[test]
    fn empty_collections_keep_their_own_description() {
        let raw = json!({"entries": [], "id": "pl1", "title": "Empty playlist"});

        let meta = parse_engine_output(raw, "https://example.com/pl1", &table());

        assert_eq!(meta.id, "pl1");
        assert_eq!(meta.title, "Empty playlist");
        assert!(meta.formats.is_empty());
    }

    #[test]
    fn approximate_sizes_and_fractional_numbers_are_accepted() {
        let raw = json!({
            "id": "s1",
            "title": "Sized",
            "formats": [
                {"format_id": "0", "ext": "mp4", "vcodec": "avc1", "acodec": "aac",
                 "filesize_approx": 1234567.8, "url": "https://v.test/s1"},
            ],
        });

        let meta = parse_engine_output(raw, "https://example.com/s1", &table());

        assert_eq!(meta.formats[0].filesize, Some(1234567));
    }

    #[test]
    fn entries_without_urls_are_skipped() {
        let raw = json!({
            "id": "u1",
            "title": "Mixed",
            "formats": [
                {"format_id": "broken", "ext": "mp4", "vcodec": "avc1", "acodec": "aac"},
                {"format_id": "ok", "ext": "mp4", "vcodec": "avc1", "acodec": "aac",
                 "url": "https://v.test/ok"},
            ],
        });

        let meta = parse_engine_output(raw, "https://example.com/u1", &table());

        assert_eq!(meta.formats.len(), 1);
        assert_eq!(meta.formats[0].format_id, "ok");
    }
}
