//! Page pixmap requests and result caching

mod cache;
mod request;

pub use cache::{CacheKey, PixmapCache};
pub use request::{Pixmap, PixmapRequest, RequestId, RequestIdGenerator};

pub const DEFAULT_CACHE_SIZE: usize = 16;
