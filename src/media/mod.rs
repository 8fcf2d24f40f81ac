use crate::utils::CACHE_CAPACITY;
use std::sync::Arc;

pub mod engine;
pub mod extractor;
pub mod handler;
pub mod jobs;
pub mod model;
pub mod store;
pub mod streamer;
pub mod utils;

pub async fn media_api() -> (handler::MediaApi, streamer::StreamProxy) {
    let extractor = extractor::MediaExtractor::new();
    let store = Arc::new(store::MetadataStore::new(*CACHE_CAPACITY));
    let jobs = jobs::JobController::new();

    let api = handler::MediaApi::new(extractor, store, jobs);
    let proxy = streamer::StreamProxy::new();

    (api, proxy)
}
