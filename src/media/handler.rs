use super::model::{AnalysisRequest, AnalysisResponse};
use crate::media::extractor::MediaExtractor;
use crate::media::jobs::JobController;
use crate::media::store::MetadataStore;
use crate::media::streamer::StreamProxy;
use crate::utils::ApiTags;
use poem::web::{Data, Query};
use poem::{handler, http::StatusCode, Request, Response};
use poem_openapi::{payload::Json, OpenApi};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

const NO_RESULT_ERROR: &str =
    "Analysis failed. The link might be private, restricted, or unsupported. Try a different link.";

pub struct MediaApi {
    extractor: MediaExtractor,
    store: Arc<MetadataStore>,
    jobs: JobController,
}

#[OpenApi(prefix_path = "/v1", tag = "ApiTags::MediaAnalysis")]
impl MediaApi {
    pub fn new(extractor: MediaExtractor, store: Arc<MetadataStore>, jobs: JobController) -> Self {
        Self {
            extractor,
            store,
            jobs,
        }
    }

    /// Analyze a link and report its playable formats. Failures are part of
    /// the payload, the transport status is always 200.
    #[oai(path = "/analyze", method = "post", operation_id = "media::analyze")]
    async fn analyze(&self, request: Json<AnalysisRequest>) -> Json<AnalysisResponse> {
        let url = request.0.url;
        info!(url = %url, "Analyze request received");

        if let Some(cached) = self.store.lookup(&url).await {
            info!(url = %url, id = %cached.id, "Cache hit");
            return AnalysisResponse::ok(cached);
        }

        let extractor = self.extractor.clone();
        let task_url = url.clone();
        let (job_id, handle) = self
            .jobs
            .submit(async move { extractor.extract_info(&task_url).await })
            .await;

        match handle.await {
            Ok(Some(metadata)) => {
                info!(
                    url = %url,
                    job = %job_id,
                    title = %metadata.title,
                    platform = %metadata.platform,
                    formats = metadata.formats.len(),
                    "Analysis completed"
                );
                self.store.insert(&url, metadata.clone()).await;
                AnalysisResponse::ok(metadata)
            }
            Ok(None) => AnalysisResponse::failed(NO_RESULT_ERROR),
            Err(error) => {
                error!(url = %url, job = %job_id, error = %error, "Analysis task crashed");
                AnalysisResponse::failed(format!("Analysis error: {}", error))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StreamParams {
    url: String,
    filename: Option<String>,
}

/// Stream relay endpoint. Kept outside the OpenAPI surface because its
/// status line mirrors whatever upstream answers.
#[handler]
pub async fn stream_media(
    Query(params): Query<StreamParams>,
    req: &Request,
    proxy: Data<&StreamProxy>,
) -> poem::Result<Response> {
    let range = req.header("Range");

    match proxy.proxy(&params.url, range, params.filename.as_deref()).await {
        Ok(response) => Ok(response),
        Err(error) => {
            error!(url = %params.url, error = %error, "Stream relay failed");
            Err(poem::Error::from_string(
                error.to_string(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::handler::HealthCheck;
    use poem::listener::{Acceptor, Listener, TcpListener};
    use poem::test::TestClient;
    use poem::{Endpoint, EndpointExt, Route, Server};
    use poem_openapi::OpenApiService;
    use serde_json::json;

    fn client() -> TestClient<impl Endpoint> {
        let media_api = MediaApi::new(
            MediaExtractor::new(),
            Arc::new(MetadataStore::new(64)),
            JobController::new(),
        );
        let api_service = OpenApiService::new((media_api, HealthCheck::new()), "MediaFlow", "1.0");

        let route = Route::new()
            .at("/api/v1/stream", poem::get(stream_media))
            .nest("/api", api_service)
            .data(StreamProxy::new());

        TestClient::new(route)
    }

    #[handler]
    fn clip(req: &Request) -> Response {
        match req.header("Range") {
            Some(_) => Response::builder()
                .status(StatusCode::PARTIAL_CONTENT)
                .header("Content-Type", "video/mp4")
                .header("Content-Range", "bytes 100-1023/1024")
                .body(vec![0u8; 924]),
            None => Response::builder()
                .header("Content-Type", "video/mp4")
                .body(vec![0u8; 1024]),
        }
    }

    async fn spawn_origin() -> String {
        let acceptor = TcpListener::bind("127.0.0.1:0")
            .into_acceptor()
            .await
            .unwrap();
        let addr = acceptor.local_addr().remove(0);
        let socket = addr.as_socket_addr().copied().unwrap();

        tokio::spawn(async move {
            let _ = Server::new_with_acceptor(acceptor)
                .run(Route::new().at("/clip", poem::get(clip)))
                .await;
        });

        format!("http://{}/clip", socket)
    }

    #[tokio::test]
    async fn analyze_reports_direct_files_without_touching_the_network() {
        let cli = client();

        let res = cli
            .post("/api/v1/analyze")
            .body_json(&json!({"url": "https://example.com/video.mp4"}))
            .send()
            .await;
        res.assert_status_is_ok();

        let body = res.json().await;
        let envelope = body.value().object();
        assert!(envelope.get("success").bool());

        let data = envelope.get("data").object();
        assert_eq!(data.get("platform").string(), "DirectLink");

        let formats = data.get("formats").array();
        assert_eq!(formats.len(), 1);
        let format = formats.get(0).object();
        assert_eq!(format.get("format_id").string(), "direct");
        assert_eq!(format.get("extension").string(), "mp4");
        assert_eq!(format.get("resolution").string(), "Original");
        assert_eq!(format.get("url").string(), "https://example.com/video.mp4");
    }

    #[tokio::test]
    async fn analyze_failures_stay_http_200_with_the_generic_message() {
        let cli = client();

        let res = cli
            .post("/api/v1/analyze")
            .body_json(&json!({"url": "https://unsupported.invalid/page"}))
            .send()
            .await;
        res.assert_status_is_ok();

        let body = res.json().await;
        let envelope = body.value().object();
        assert!(!envelope.get("success").bool());
        assert_eq!(envelope.get("error").string(), NO_RESULT_ERROR);
    }

    #[tokio::test]
    async fn analyze_serves_repeat_requests_from_the_store() {
        let cli = client();
        let payload = json!({"url": "https://example.com/repeat.mp4"});

        let first = cli.post("/api/v1/analyze").body_json(&payload).send().await;
        let first_id = first
            .json()
            .await
            .value()
            .object()
            .get("data")
            .object()
            .get("id")
            .string()
            .to_string();

        let second = cli.post("/api/v1/analyze").body_json(&payload).send().await;
        let second_id = second
            .json()
            .await
            .value()
            .object()
            .get("data")
            .object()
            .get("id")
            .string()
            .to_string();

        assert_eq!(first_id, second_id);
    }

    #[tokio::test]
    async fn health_endpoint_reports_the_service_online() {
        let cli = client();

        let res = cli.get("/api/health").send().await;
        res.assert_status_is_ok();

        let body = res.json().await;
        let status = body.value().object();
        assert_eq!(status.get("status").string(), "online");
        assert_eq!(status.get("project").string(), "MediaFlow");
    }

    #[tokio::test]
    async fn stream_endpoint_mirrors_upstream_partial_content() {
        let cli = client();
        let origin = spawn_origin().await;

        let res = cli
            .get("/api/v1/stream")
            .query("url", &origin)
            .header("Range", "bytes=100-")
            .send()
            .await;

        res.assert_status(StatusCode::PARTIAL_CONTENT);
        res.assert_header("Content-Range", "bytes 100-1023/1024");
        res.assert_header("Access-Control-Allow-Origin", "*");
    }

    #[tokio::test]
    async fn stream_endpoint_maps_relay_errors_to_500() {
        let cli = client();

        let res = cli
            .get("/api/v1/stream")
            .query("url", &"http://127.0.0.1:1/clip".to_string())
            .send()
            .await;

        res.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    }
}
