use crate::media::model::MediaMetadata;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

/// Two level analysis cache: source URLs alias a media id, the id keys the
/// stored metadata. Bounded, oldest analysis evicted first.
pub struct MetadataStore {
    capacity: usize,
    inner: Mutex<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    url_index: HashMap<String, String>,
    metadata: HashMap<String, MediaMetadata>,
    order: VecDeque<String>,
}

impl MetadataStore {
    pub fn new(capacity: usize) -> Self {
        MetadataStore {
            capacity: capacity.max(1),
            inner: Mutex::new(StoreInner::default()),
        }
    }

    /// Cached metadata for a source URL. Aliases whose target was evicted
    /// behave like a miss.
    pub async fn lookup(&self, url: &str) -> Option<MediaMetadata> {
        let inner = self.inner.lock().await;
        let id = inner.url_index.get(url)?;
        inner.metadata.get(id).cloned()
    }

    pub async fn insert(&self, url: &str, metadata: MediaMetadata) {
        let mut inner = self.inner.lock().await;
        let id = metadata.id.clone();

        if !inner.metadata.contains_key(&id) {
            inner.order.push_back(id.clone());
        }
        inner.metadata.insert(id.clone(), metadata);
        inner.url_index.insert(url.to_string(), id);

        while inner.order.len() > self.capacity {
            if let Some(evicted) = inner.order.pop_front() {
                inner.metadata.remove(&evicted);
                inner.url_index.retain(|_, aliased| aliased != &evicted);
            }
        }
    }
}
