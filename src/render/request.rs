//! Pixmap request and response types

use std::sync::Arc;

use image::RgbImage;

/// Unique, monotonically increasing identifier for pixmap requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Hands out request ids in issue order
#[derive(Debug)]
pub struct RequestIdGenerator {
    next: u64,
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl RequestIdGenerator {
    pub fn next_id(&mut self) -> RequestId {
        let id = RequestId::new(self.next);
        self.next += 1;
        id
    }
}

/// Request to rasterize one page at a target size
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixmapRequest {
    pub id: RequestId,
    /// Page number (0-indexed)
    pub page: usize,
    pub width: u32,
    pub height: u32,
}

impl PixmapRequest {
    #[must_use]
    pub const fn new(id: RequestId, page: usize, width: u32, height: u32) -> Self {
        Self {
            id,
            page,
            width,
            height,
        }
    }
}

/// Rendered page, tagged with the request that produced it
#[derive(Clone)]
pub struct Pixmap {
    pub request: PixmapRequest,
    pub image: Arc<RgbImage>,
}

impl std::fmt::Debug for Pixmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pixmap")
            .field("request", &self.request)
            .field("width", &self.image.width())
            .field("height", &self.image.height())
            .finish_non_exhaustive()
    }
}
