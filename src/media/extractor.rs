use crate::media::engine::{EngineProfile, ExtractionEngine, COOKIE_BROWSERS};
use crate::media::model::{MediaFormat, MediaMetadata};
use crate::media::utils::{self, ClassificationTable, PlatformClass};
use crate::utils::{ENGINE_BROWSER_COOKIES, ENGINE_CONCURRENCY, RESOLVER_API, RESOLVER_REFERER};
use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

const MOBILE_UA: &str = "Mozilla/5.0 (Linux; Android 10; K) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Mobile Safari/537.36";
const CRAWLER_UA: &str = "facebookexternalhit/1.1";

lazy_static! {
    static ref OG_VIDEO: Regex =
        Regex::new(r#"property="og:video(:secure_url)?" content="([^"]+)""#).unwrap();
}

/// The closed set of resolution strategies. Adding one means adding a
/// variant here and a dispatch arm in [`MediaExtractor::attempt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    DirectFile,
    RapidScrape,
    EngineDirect,
    FallbackResolver,
}

impl Strategy {
    /// Launch order for the generic race.
    pub const RACE_ORDER: [Strategy; 4] = [
        Strategy::DirectFile,
        Strategy::RapidScrape,
        Strategy::EngineDirect,
        Strategy::FallbackResolver,
    ];
}

/// Multi-strategy extraction pipeline. Cheap to clone, every strategy
/// resource is shared.
#[derive(Clone)]
pub struct MediaExtractor {
    client: Client,
    search_client: Client,
    engine: ExtractionEngine,
    platforms: Arc<ClassificationTable>,
}

impl MediaExtractor {
    pub fn new() -> MediaExtractor {
        let client = match Client::builder().timeout(Duration::from_secs(10)).build() {
            Ok(client) => client,
            Err(error) => panic!("Failed to build HTTP client: {:?}", error),
        };

        // Search result pages sit behind ad-hoc TLS setups often enough that
        // certificate validation is skipped for this one client.
        let search_client = match Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(Duration::from_secs(10))
            .build()
        {
            Ok(client) => client,
            Err(error) => panic!("Failed to build search HTTP client: {:?}", error),
        };

        let platforms = Arc::new(ClassificationTable::default());
        let engine = ExtractionEngine::new(*ENGINE_CONCURRENCY, Arc::clone(&platforms));

        MediaExtractor {
            client,
            search_client,
            engine,
            platforms,
        }
    }

    /// Runs the full pipeline for one link: data URI short circuit, search
    /// page resolution, normalization, then platform dispatch.
    pub async fn extract_info(&self, url: &str) -> Option<MediaMetadata> {
        if url.starts_with("data:image") {
            return Some(utils::data_uri_metadata(url));
        }

        let mut working_url = url.to_string();
        if working_url.contains("google.com/search") {
            if let Some(resolved) = self.resolve_search_page(&working_url).await {
                working_url = resolved;
            }
        }

        let clean_url = utils::normalize_url(&working_url);
        info!(url = %clean_url, "Analyzing");

        let result = match self.platforms.classify(&clean_url) {
            PlatformClass::Strict => self.strict_dispatch(&clean_url).await,
            PlatformClass::Liberal | PlatformClass::Standard => {
                self.race_dispatch(&clean_url).await
            }
        };

        if result.is_none() {
            warn!(url = %clean_url, "All extraction strategies failed");
        }
        result
    }

    /// One strategy, one attempt. Never errors past this boundary.
    pub async fn attempt(&self, strategy: Strategy, url: &str) -> Option<MediaMetadata> {
        match strategy {
            Strategy::DirectFile => utils::direct_file_metadata(url),
            Strategy::RapidScrape => self.rapid_scrape(url).await,
            Strategy::EngineDirect => self.engine.analyze(url, EngineProfile::Direct).await,
            Strategy::FallbackResolver => self.fallback_resolver(url).await,
        }
    }

    /// The strict platform only ever goes through the engine, since scraping
    /// it produces broken results. A plain run first, then the browser
    /// cookie chain when enabled.
    async fn strict_dispatch(&self, url: &str) -> Option<MediaMetadata> {
        if let Some(found) = self
            .engine
            .analyze(url, EngineProfile::Direct)
            .await
            .and_then(usable)
        {
            return Some(found);
        }

        if *ENGINE_BROWSER_COOKIES {
            for browser in COOKIE_BROWSERS {
                warn!(url = %url, browser = %browser, "Plain engine run found nothing, retrying with browser cookies");
                if let Some(found) = self
                    .engine
                    .analyze(url, EngineProfile::BrowserCookies(browser))
                    .await
                    .and_then(usable)
                {
                    return Some(found);
                }
            }
        }

        None
    }

    /// Launches every strategy at once and takes the first format-bearing
    /// result in completion order. Losers are aborted on acceptance, and
    /// dropping the set cleans up whatever is left on any other exit path.
    async fn race_dispatch(&self, url: &str) -> Option<MediaMetadata> {
        let mut race = JoinSet::new();
        for strategy in Strategy::RACE_ORDER {
            let extractor = self.clone();
            let url = url.to_string();
            race.spawn(async move {
                let outcome = extractor.attempt(strategy, &url).await;
                (strategy, outcome)
            });
        }

        first_usable_result(&mut race).await
    }

    async fn rapid_scrape(&self, url: &str) -> Option<MediaMetadata> {
        match self.try_rapid_scrape(url).await {
            Ok(found) => found,
            Err(error) => {
                debug!(url = %url, error = %error, "Scrape strategy failed");
                None
            }
        }
    }

    async fn try_rapid_scrape(&self, url: &str) -> anyhow::Result<Option<MediaMetadata>> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", CRAWLER_UA)
            .send()
            .await?;
        if response.status() != StatusCode::OK {
            return Ok(None);
        }
        let body = response.text().await?;

        let video_link = match OG_VIDEO.captures(&body) {
            Some(caps) => caps
                .get(2)
                .map_or("", |tag| tag.as_str())
                .replace("&amp;", "&"),
            None => return Ok(None),
        };

        Ok(Some(MediaMetadata {
            id: Utc::now().timestamp().to_string(),
            title: "Media Content".to_string(),
            thumbnail: None,
            duration: None,
            uploader: None,
            platform: "RapidScrape".to_string(),
            formats: vec![MediaFormat {
                format_id: "hd".to_string(),
                extension: "mp4".to_string(),
                resolution: None,
                filesize: None,
                quality_label: None,
                url: video_link,
            }],
            original_url: url.to_string(),
        }))
    }

    async fn fallback_resolver(&self, url: &str) -> Option<MediaMetadata> {
        match self.try_fallback_resolver(url).await {
            Ok(found) => found,
            Err(error) => {
                debug!(url = %url, error = %error, "Fallback resolver failed");
                None
            }
        }
    }

    async fn try_fallback_resolver(&self, url: &str) -> anyhow::Result<Option<MediaMetadata>> {
        let response = self
            .client
            .post(RESOLVER_API.as_str())
            .header("Accept", "application/json")
            .header("Referer", RESOLVER_REFERER.as_str())
            .json(&serde_json::json!({ "url": url }))
            .send()
            .await?;
        if response.status() != StatusCode::OK {
            return Ok(None);
        }
        let data: Value = response.json().await?;

        Ok(resolver_metadata(&data, url))
    }

    /// Resolves a search result page to the first media link it embeds.
    pub async fn resolve_search_page(&self, url: &str) -> Option<String> {
        match self.try_resolve_search_page(url).await {
            Ok(found) => found,
            Err(error) => {
                debug!(url = %url, error = %error, "Search page resolution failed");
                None
            }
        }
    }

    async fn try_resolve_search_page(&self, url: &str) -> anyhow::Result<Option<String>> {
        let response = self
            .search_client
            .get(url)
            .header("User-Agent", MOBILE_UA)
            .send()
            .await?;
        if response.status() != StatusCode::OK {
            return Ok(None);
        }
        let body = response.text().await?;

        let resolved = utils::scan_search_results(&body);
        if let Some(link) = resolved.as_ref() {
            info!(url = %url, resolved = %link, "Resolved search page to media link");
        }
        Ok(resolved)
    }
}

fn usable(metadata: MediaMetadata) -> Option<MediaMetadata> {
    if metadata.formats.is_empty() {
        None
    } else {
        Some(metadata)
    }
}

/// Builds metadata from a resolver reply. A blank `url` field falls through
/// to `stream`; a reply carrying neither is a miss.
fn resolver_metadata(data: &Value, original_url: &str) -> Option<MediaMetadata> {
    let media_url = data
        .get("url")
        .and_then(Value::as_str)
        .filter(|found| !found.is_empty())
        .or_else(|| data.get("stream").and_then(Value::as_str))
        .filter(|found| !found.is_empty())?;

    Some(MediaMetadata {
        id: Utc::now().timestamp().to_string(),
        title: "Media Content (Resolved via Fallback)".to_string(),
        thumbnail: data
            .get("thumbnail")
            .and_then(Value::as_str)
            .map(str::to_string),
        duration: None,
        uploader: None,
        platform: "FallbackAPI".to_string(),
        formats: vec![MediaFormat {
            format_id: "fallback".to_string(),
            extension: "mp4".to_string(),
            resolution: Some("HD".to_string()),
            filesize: None,
            quality_label: None,
            url: media_url.to_string(),
        }],
        original_url: original_url.to_string(),
    })
}

/// Consumes race tasks in completion order and accepts the first result
/// carrying at least one format. Panicked tasks count as non-matches.
pub(crate) async fn first_usable_result<L: Debug + 'static>(
    race: &mut JoinSet<(L, Option<MediaMetadata>)>,
) -> Option<MediaMetadata> {
    while let Some(joined) = race.join_next().await {
        match joined {
            Ok((strategy, Some(metadata))) if !metadata.formats.is_empty() => {
                info!(strategy = ?strategy, platform = %metadata.platform, "Strategy success");
                race.abort_all();
                return Some(metadata);
            }
            Ok((strategy, _)) => {
                debug!(strategy = ?strategy, "Strategy returned no usable result");
            }
            Err(error) => {
                if !error.is_cancelled() {
                    error!(error = %error, "Strategy task failed");
                }
            }
        }
    }
    None
}
