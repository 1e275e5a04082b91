//! Image cache for offline reading
//!
//! The sync engine only needs two operations: cache one URL and evict
//! stale entries. Hosts look cached files up by URL through
//! [`FileImageCache::cached_path`].

mod file;

use anyhow::Result;

pub use file::FileImageCache;

/// Local cache of story images
pub trait ImageCache: Send + Sync {
    /// Download and store one image; a no-op if it is already cached
    fn cache(&self, url: &str) -> Result<()>;

    /// Evict entries that are no longer worth keeping
    fn cleanup(&self) -> Result<()>;
}
