#[deny(clippy::all)]
use dotenv::dotenv;
use media::media_api;
use poem::{
    endpoint::StaticFilesEndpoint,
    listener::TcpListener,
    middleware::{Cors, Tracing},
    EndpointExt, Route, Server,
};
use poem_openapi::OpenApiService;
use tokio::time::Duration;
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod health;
mod media;
mod utils;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenv().ok(); // This line loads the environment variables from the ".env" file.
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_env("RUST_LOG"))
        .init();

    let hostname = utils::get_host();
    let port = utils::get_port();

    let download_path = utils::DOWNLOAD_PATH.as_str();
    if let Err(error) = std::fs::create_dir_all(download_path) {
        warn!(path = %download_path, error = %error, "Failed to create download directory");
    }

    let (media_api, stream_proxy) = media_api().await;
    let health_api = health::health_checks().await;

    let api_service = OpenApiService::new((media_api, health_api), "MediaFlow", "1.0")
        .server(format!("{}/api", hostname));
    let ui = api_service.swagger_ui();
    let spec = api_service.spec_endpoint_yaml();

    let mut route = Route::new()
        .at("/api/v1/stream", poem::get(media::handler::stream_media))
        .nest("/api", api_service)
        .nest("/swagger", ui)
        .nest("/swagger/spec", spec);

    let frontend = std::path::Path::new(utils::FRONTEND_PATH.as_str());
    if frontend.is_dir() {
        route = route.nest(
            "/",
            StaticFilesEndpoint::new(frontend).index_file("index.html"),
        );
    }

    let app = route
        .with(Cors::new())
        .with(Tracing)
        .data(stream_proxy);

    Server::new(TcpListener::bind(format!("0.0.0.0:{}", port)))
        .run_with_graceful_shutdown(
            app,
            async move {
                let _ = tokio::signal::ctrl_c().await;
            },
            Some(Duration::from_secs(5)),
        )
        .await?;

    Ok(())
}
