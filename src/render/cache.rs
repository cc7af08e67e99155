//! LRU cache for rendered page pixmaps

use std::collections::HashMap;
use std::num::NonZeroUsize;

use log::debug;
use lru::LruCache;

use super::request::{Pixmap, PixmapRequest, RequestId};

/// Cache key for rendered pages
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub page: usize,
    pub width: u32,
    pub height: u32,
}

impl CacheKey {
    #[must_use]
    pub fn from_request(request: &PixmapRequest) -> Self {
        Self {
            page: request.page,
            width: request.width,
            height: request.height,
        }
    }
}

/// LRU cache that reconciles out-of-order results.
///
/// Every issued request is registered first; a result is accepted only when no
/// newer request for the same page has been issued since.
pub struct PixmapCache {
    cache: LruCache<CacheKey, Pixmap>,
    latest: HashMap<usize, RequestId>,
}

impl PixmapCache {
    /// Create a new cache with the given capacity
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            ),
            latest: HashMap::new(),
        }
    }

    /// Record that `request` is now the freshest one for its page
    pub fn register(&mut self, request: &PixmapRequest) {
        let entry = self.latest.entry(request.page).or_insert(request.id);
        if request.id > *entry {
            *entry = request.id;
        }
    }

    pub fn is_stale(&self, request: &PixmapRequest) -> bool {
        self.latest
            .get(&request.page)
            .is_some_and(|latest| request.id < *latest)
    }

    /// Store a result unless a fresher request for the page exists; returns whether it was kept
    pub fn accept(&mut self, pixmap: Pixmap) -> bool {
        if self.is_stale(&pixmap.request) {
            debug!(
                "Discarding stale pixmap {:?} for page {}",
                pixmap.request.id, pixmap.request.page
            );
            return false;
        }
        self.register(&pixmap.request);
        let key = CacheKey::from_request(&pixmap.request);
        self.cache.put(key, pixmap);
        true
    }

    /// Get a cached pixmap, promoting it in the LRU order
    #[must_use]
    pub fn get(&mut self, key: &CacheKey) -> Option<&Pixmap> {
        self.cache.get(key)
    }

    /// Most recently accepted pixmap for a page at any size
    #[must_use]
    pub fn latest_for_page(&self, page: usize) -> Option<&Pixmap> {
        self.cache
            .iter()
            .filter(|(k, _)| k.page == page)
            .map(|(_, v)| v)
            .max_by_key(|p| p.request.id)
    }

    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.cache.contains(key)
    }

    pub fn invalidate_all(&mut self) {
        self.cache.clear();
        self.latest.clear();
    }

    /// Invalidate all cached versions of a specific page
    pub fn invalidate_page(&mut self, page: usize) {
        let keys_to_remove: Vec<_> = self
            .cache
            .iter()
            .filter(|(k, _)| k.page == page)
            .map(|(k, _)| k.clone())
            .collect();

        for key in keys_to_remove {
            self.cache.pop(&key);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }
}
