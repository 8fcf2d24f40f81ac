use lazy_static::lazy_static;
use poem_openapi::Tags;
use std::env;

lazy_static! {
    pub static ref PROJECT_NAME: String =
        env::var("PROJECT_NAME").unwrap_or("MediaFlow".to_string());
    pub static ref DOWNLOAD_PATH: String =
        env::var("DOWNLOAD_PATH").unwrap_or("downloads".to_string());
    /// Hard ceiling in seconds for a single extraction engine run.
    pub static ref ANALYSIS_TIMEOUT: u64 = env::var("ANALYSIS_TIMEOUT")
        .ok()
        .and_then(|secs| secs.parse().ok())
        .unwrap_or(15);
    pub static ref RESOLVER_API: String =
        env::var("RESOLVER_API").unwrap_or("https://api.cobalt.tools/api/json".to_string());
    pub static ref RESOLVER_REFERER: String =
        env::var("RESOLVER_REFERER").unwrap_or("https://cobalt.tools/".to_string());
    /// Explicit path to the yt-dlp binary, falling back to $PATH lookup.
    pub static ref ENGINE_PATH: Option<String> = env::var("ENGINE_PATH").ok();
    pub static ref ENGINE_CONCURRENCY: usize = env::var("ENGINE_CONCURRENCY")
        .ok()
        .and_then(|n| n.parse().ok())
        .unwrap_or(2);
    pub static ref ENGINE_BROWSER_COOKIES: bool = env::var("ENGINE_BROWSER_COOKIES")
        .map(|flag| flag != "false" && flag != "0")
        .unwrap_or(true);
    pub static ref CACHE_CAPACITY: usize = env::var("CACHE_CAPACITY")
        .ok()
        .and_then(|n| n.parse().ok())
        .unwrap_or(512);
    pub static ref FRONTEND_PATH: String =
        env::var("FRONTEND_PATH").unwrap_or("frontend".to_string());
}

#[derive(Tags)]
pub enum ApiTags {
    /// Media link analysis service
    MediaAnalysis,
    /// Health check endpoints
    HealthCheck,
}

pub fn get_host() -> String {
    let host = env::var("HOST").unwrap_or("http://127.0.0.1:8000".to_string());
    return host;
}

pub fn get_port() -> String {
    let port = env::var("PORT").unwrap_or("8000".to_string());
    return port;
}
