use futures::TryStreamExt;
use poem::{http::StatusCode, Body, Response};
use reqwest::Client;
use std::io;
use std::time::Duration;
use tracing::error;

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Relays a remote media URL to the client, forwarding range requests
/// upstream and mirroring the upstream status line back.
#[derive(Clone)]
pub struct StreamProxy {
    client: Client,
}

impl StreamProxy {
    pub fn new() -> StreamProxy {
        // No total timeout: long downloads are legitimate. Stalls are cut by
        // the read timeout instead.
        let client = match Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .read_timeout(Duration::from_secs(30))
            .build()
        {
            Ok(client) => client,
            Err(error) => panic!("Failed to build streaming HTTP client: {:?}", error),
        };
        StreamProxy { client }
    }

    /// One upstream GET. Status and headers arrive before the body is
    /// polled, then the body is relayed chunk by chunk without buffering.
    /// Dropping the relay closes the upstream connection on every exit path.
    pub async fn proxy(
        &self,
        url: &str,
        range_header: Option<&str>,
        filename: Option<&str>,
    ) -> anyhow::Result<Response> {
        let mut request = self.client.get(url).header("User-Agent", BROWSER_UA);
        if let Some(range) = range_header {
            request = request.header("Range", range);
        }

        let upstream = request.send().await?;

        let status = StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::OK);
        let content_type =
            header_value(&upstream, "Content-Type").unwrap_or_else(|| "video/mp4".to_string());
        let content_length = header_value(&upstream, "Content-Length");
        let content_range = header_value(&upstream, "Content-Range");

        let mut response = Response::builder()
            .status(status)
            .header("Content-Type", content_type)
            .header("Accept-Ranges", "bytes")
            .header("Access-Control-Allow-Origin", "*");

        if let Some(length) = content_length {
            response = response.header("Content-Length", length);
        }
        if let Some(range) = content_range {
            response = response.header("Content-Range", range);
        }
        if let Some(name) = filename.filter(|name| !name.is_empty()) {
            response = response.header(
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", name),
            );
        }

        let source_url = url.to_string();
        let relay = upstream.bytes_stream().map_err(move |error| {
            error!(url = %source_url, error = %error, "Streaming error");
            io::Error::new(io::ErrorKind::Other, error)
        });

        Ok(response.body(Body::from_bytes_stream(relay)))
    }
}

/// Upstream header as text, with blank values treated as absent.
fn header_value(upstream: &reqwest::Response, name: &str) -> Option<String> {
    upstream
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
        .filter(|value| !value.is_empty())
}
