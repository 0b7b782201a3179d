use moka::future::Cache;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};

const MAX_CACHED_PAGES: u64 = 1_000;

/// Rendered home timeline fragments keyed by the raw `page` query value.
///
/// Entries expire after a fixed time only; writes do not invalidate them.
#[derive(Clone, Debug)]
pub struct PageCache {
    pages: Cache<String, Arc<str>>,
}

impl PageCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let pages = Cache::builder()
            .max_capacity(MAX_CACHED_PAGES)
            .time_to_live(ttl)
            .build();

        Self { pages }
    }

    pub async fn get(&self, key: &str) -> Option<Arc<str>> {
        let page = self.pages.get(key).await;
        debug!(key, hit = page.is_some(), "Page cache lookup");
        page
    }

    pub async fn insert(&self, key: String, page: Arc<str>) {
        self.pages.insert(key, page).await;
    }

    pub fn clear(&self) {
        self.pages.invalidate_all();
        info!("Page cache cleared");
    }
}
