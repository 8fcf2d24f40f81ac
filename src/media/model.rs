use poem_openapi::{payload::Json, Object};
use serde::Serialize;

/// A single playable rendition of the analyzed media
#[derive(Debug, Object, Clone, Serialize)]
pub struct MediaFormat {
    /// Engine-assigned identifier of the format
    pub format_id: String,
    /// Container extension (mp4, m4a, ...)
    pub extension: String,
    /// Resolution label, "HD" when the source reports nothing better
    pub resolution: Option<String>,
    /// Size in bytes when the source reports one
    pub filesize: Option<u64>,
    /// Human readable quality note
    pub quality_label: Option<String>,
    /// Directly fetchable media URL
    pub url: String,
}

/// Metadata of an analyzed media link
#[derive(Debug, Object, Clone, Serialize)]
pub struct MediaMetadata {
    /// Stable identifier of the media on its platform
    pub id: String,
    /// The title of the media
    pub title: String,
    /// Preview image URL
    pub thumbnail: Option<String>,
    /// Duration in seconds as reported by the platform
    pub duration: Option<f64>,
    /// Account that published the media
    pub uploader: Option<String>,
    /// Name of the platform the media was extracted from
    pub platform: String,
    /// Playable formats, best candidates first
    pub formats: Vec<MediaFormat>,
    /// The URL the analysis was requested for
    pub original_url: String,
}

/// Analyze request schema
#[derive(Debug, Object, Clone, Serialize)]
pub struct AnalysisRequest {
    /// Link to analyze
    pub url: String,
}

/// Envelope every analyze call resolves to, regardless of outcome
#[derive(Debug, Object, Clone, Serialize)]
pub struct AnalysisResponse {
    /// Whether usable media was found
    pub success: bool,
    /// Extracted metadata on success
    pub data: Option<MediaMetadata>,
    /// Human readable failure reason
    pub error: Option<String>,
}

impl AnalysisResponse {
    pub fn ok(data: MediaMetadata) -> Json<AnalysisResponse> {
        Json(AnalysisResponse {
            success: true,
            data: Some(data),
            error: None,
        })
    }

    pub fn failed(error: impl ToString) -> Json<AnalysisResponse> {
        Json(AnalysisResponse {
            success: false,
            data: None,
            error: Some(error.to_string()),
        })
    }
}
