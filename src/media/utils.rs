use crate::media::model::{MediaFormat, MediaMetadata};
use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref REEL_ID: Regex = Regex::new(r"/(?:reels?|p|stories)/([A-Za-z0-9_-]+)").unwrap();
    static ref REDIRECT_TARGET: Regex = Regex::new(r"url=([^&]+)").unwrap();
    /// Scanned in order over a search result page, first match wins.
    static ref SEARCH_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"https?://(?:www\.)?youtube\.com/watch\?v=([\w-]{11})").unwrap(),
        Regex::new(r"https?://youtu\.be/([\w-]{11})").unwrap(),
        Regex::new(r"https?://(?:www\.)?instagram\.com/(?:p|reel)/([\w-]{11})").unwrap(),
        Regex::new(r#"https?://[^"'<>]+\.mp4"#).unwrap(),
    ];
    static ref WRAPPED_RESULT: Regex = Regex::new(r"/url\?q=(https?://[^&]+)").unwrap();
}

const IMAGE_EXTS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "bmp"];
const VIDEO_EXTS: [&str; 5] = ["mp4", "webm", "ogg", "mov", "avi"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformClass {
    /// Separate audio/video streams are unplayable in-browser, filter them
    /// and dispatch through the engine only.
    Strict,
    /// Keep every engine format.
    Liberal,
    Standard,
}

/// Maps domain fragments to the filtering/dispatch policy of a platform.
#[derive(Debug, Clone)]
pub struct ClassificationTable {
    strict: Vec<String>,
    liberal: Vec<String>,
}

impl Default for ClassificationTable {
    fn default() -> Self {
        ClassificationTable {
            strict: vec!["youtube.com".to_string(), "youtu.be".to_string()],
            liberal: vec!["instagram.com".to_string()],
        }
    }
}

impl ClassificationTable {
    pub fn classify(&self, url: &str) -> PlatformClass {
        if self.strict.iter().any(|domain| url.contains(domain.as_str())) {
            return PlatformClass::Strict;
        }
        if self.liberal.iter().any(|domain| url.contains(domain.as_str())) {
            return PlatformClass::Liberal;
        }
        PlatformClass::Standard
    }
}

/// Rewrites share links and redirect wrappers into a resolvable form.
/// At most one rule applies, anything else passes through unchanged.
pub fn normalize_url(url: &str) -> String {
    if url.contains("instagram.com") {
        if let Some(caps) = REEL_ID.captures(url) {
            let id = caps.get(1).map_or("", |m| m.as_str());
            return format!("https://www.instagram.com/reel/{}/", id);
        }
    }

    if url.contains("google.") && url.contains("/url?") {
        if let Some(caps) = REDIRECT_TARGET.captures(url) {
            let raw = caps.get(1).map_or("", |m| m.as_str());
            return match urlencoding::decode(raw) {
                Ok(decoded) => decoded.into_owned(),
                Err(_) => raw.to_string(),
            };
        }
    }

    url.to_string()
}

/// Pulls the first embedded media link out of a search result page body.
pub fn scan_search_results(body: &str) -> Option<String> {
    for pattern in SEARCH_PATTERNS.iter() {
        if let Some(found) = pattern.find(body) {
            return Some(found.as_str().to_string());
        }
    }

    // Wrapped result links carry the target percent-encoded after q=
    if let Some(caps) = WRAPPED_RESULT.captures(body) {
        let raw = caps.get(1).map_or("", |m| m.as_str());
        let link = match urlencoding::decode(raw) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => raw.to_string(),
        };
        if link.contains("youtube.com") || link.contains("instagram.com") || link.ends_with(".mp4")
        {
            return Some(link);
        }
    }

    None
}

pub fn data_uri_metadata(url: &str) -> MediaMetadata {
    let mut preview: String = url.chars().take(100).collect();
    preview.push_str("...");

    MediaMetadata {
        id: "base64-img".to_string(),
        title: "Base64 Image Content".to_string(),
        thumbnail: Some(url.to_string()),
        duration: None,
        uploader: None,
        platform: "Internal".to_string(),
        formats: vec![MediaFormat {
            format_id: "raw".to_string(),
            extension: "jpg".to_string(),
            resolution: Some("Original".to_string()),
            filesize: None,
            quality_label: None,
            url: url.to_string(),
        }],
        original_url: preview,
    }
}

/// Classifies a URL by extension suffix alone, no reachability check.
pub fn direct_file_metadata(url: &str) -> Option<MediaMetadata> {
    let lower = url.to_lowercase();
    let path = lower.split('?').next().unwrap_or_default();

    let is_image = IMAGE_EXTS.iter().any(|ext| path.ends_with(&format!(".{}", ext)));
    let is_video = VIDEO_EXTS.iter().any(|ext| path.ends_with(&format!(".{}", ext)));
    if !is_image && !is_video {
        return None;
    }

    let extension = path.rsplit('.').next().unwrap_or_default().to_string();

    Some(MediaMetadata {
        id: Utc::now().timestamp().to_string(),
        title: format!("Direct {} Content", extension.to_uppercase()),
        thumbnail: if is_video { None } else { Some(url.to_string()) },
        duration: None,
        uploader: None,
        platform: "DirectLink".to_string(),
        formats: vec![MediaFormat {
            format_id: "direct".to_string(),
            extension,
            resolution: Some("Original".to_string()),
            filesize: None,
            quality_label: None,
            url: url.to_string(),
        }],
        original_url: url.to_string(),
    })
}
