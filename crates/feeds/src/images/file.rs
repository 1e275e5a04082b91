//! File-based image cache

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use base64::prelude::*;
use log::{debug, warn};
use sha2::{Digest, Sha256};
use ureq::Agent;

use super::ImageCache;

/// Cached images not touched for this long are evicted
const MAX_IMAGE_AGE_DAYS: u64 = 30;

/// Images larger than this are not cached
const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

/// File-based image cache
///
/// Directory structure:
/// ```text
/// images/
///   Xy/
///     Xy3f...Q   # raw bytes of one image, named by the digest of its URL
///   a_/
///     a_09...w
/// ```
pub struct FileImageCache {
    root: PathBuf,
    agent: Agent,
    max_age: Duration,
}

impl FileImageCache {
    /// Create a new image cache at the given path
    pub fn new(root: impl AsRef<Path>, timeout: Duration) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).context("Failed to create image cache directory")?;
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Ok(Self {
            root,
            agent,
            max_age: Duration::from_secs(MAX_IMAGE_AGE_DAYS * 24 * 60 * 60),
        })
    }

    /// Override the eviction age
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// File name for a URL: URL-safe base64 of its SHA-256
    fn file_name(url: &str) -> String {
        let digest = Sha256::digest(url.as_bytes());
        BASE64_URL_SAFE_NO_PAD.encode(digest)
    }

    fn image_path(&self, url: &str) -> PathBuf {
        let name = Self::file_name(url);
        self.root.join(&name[..2]).join(name)
    }

    /// Path of the cached copy of `url`, if there is one
    pub fn cached_path(&self, url: &str) -> Option<PathBuf> {
        let path = self.image_path(url);
        path.exists().then_some(path)
    }

    /// Store already-downloaded bytes for `url`
    pub fn put(&self, url: &str, data: &[u8]) -> Result<()> {
        let path = self.image_path(url);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write atomically (write to temp, then rename)
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, data)?;
        fs::rename(&temp_path, &path)?;
        Ok(())
    }

    fn download(&self, url: &str) -> Result<Vec<u8>> {
        let mut response = self
            .agent
            .get(url)
            .call()
            .with_context(|| format!("Failed to fetch image {}", url))?;
        response
            .body_mut()
            .with_config()
            .limit(MAX_IMAGE_BYTES)
            .read_to_vec()
            .with_context(|| format!("Failed to read image {}", url))
    }
}

impl ImageCache for FileImageCache {
    fn cache(&self, url: &str) -> Result<()> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            anyhow::bail!("Not a fetchable image url: {}", url);
        }
        if self.image_path(url).exists() {
            return Ok(());
        }

        let data = self.download(url)?;
        self.put(url, &data)?;
        debug!("Cached image {} ({} bytes)", url, data.len());
        Ok(())
    }

    fn cleanup(&self) -> Result<()> {
        let now = SystemTime::now();
        let mut removed = 0;

        let shards = fs::read_dir(&self.root)
            .with_context(|| format!("Failed to list image cache {}", self.root.display()))?;
        for shard in shards.flatten() {
            if !shard.file_type().is_ok_and(|t| t.is_dir()) {
                continue;
            }
            let entries = match fs::read_dir(shard.path()) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Skipping image cache shard {}: {}", shard.path().display(), e);
                    continue;
                }
            };
            // Entries can vanish mid-scan (a .tmp being renamed); skip them
            for entry in entries.flatten() {
                let path = entry.path();
                let modified = match entry.metadata().and_then(|m| m.modified()) {
                    Ok(modified) => modified,
                    Err(e) => {
                        debug!("Skipping {}: {}", path.display(), e);
                        continue;
                    }
                };
                if now.duration_since(modified).unwrap_or_default() < self.max_age {
                    continue;
                }
                match fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => warn!("Failed to evict cached image {}: {}", path.display(), e),
                }
            }
        }

        debug!("Image cache cleanup removed {} files", removed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn cache_in(dir: &Path) -> FileImageCache {
        FileImageCache::new(dir.join("images"), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_file_name_is_stable_and_path_safe() {
        let a = FileImageCache::file_name("https://example.com/a.png");
        let b = FileImageCache::file_name("https://example.com/a.png");
        assert_eq!(a, b);
        assert_eq!(a.len(), 43);
        assert!(!a.contains('/'));
        assert_ne!(a, FileImageCache::file_name("https://example.com/b.png"));
    }

    #[test]
    fn test_put_then_cache_is_noop() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());
        let url = "https://example.invalid/a.png";

        assert!(cache.cached_path(url).is_none());
        cache.put(url, b"png").unwrap();
        // Already present, so no network access happens
        cache.cache(url).unwrap();

        let path = cache.cached_path(url).unwrap();
        assert_eq!(fs::read(path).unwrap(), b"png");
    }

    #[test]
    fn test_rejects_non_http() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());
        assert!(cache.cache("data:image/png;base64,AAAA").is_err());
    }

    #[test]
    fn test_cleanup_evicts_old_files() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path()).with_max_age(Duration::ZERO);
        cache.put("https://example.invalid/a.png", b"a").unwrap();

        cache.cleanup().unwrap();
        assert!(cache.cached_path("https://example.invalid/a.png").is_none());

        let keep = cache_in(dir.path());
        keep.put("https://example.invalid/b.png", b"b").unwrap();
        keep.cleanup().unwrap();
        assert!(keep.cached_path("https://example.invalid/b.png").is_some());
    }

    #[test]
    fn test_cleanup_continues_past_unremovable_entries() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path()).with_max_age(Duration::ZERO);
        let url = "https://example.invalid/a.png";
        cache.put(url, b"a").unwrap();

        // A directory where a file is expected can't be removed with remove_file
        let shard = cache.cached_path(url).unwrap().parent().unwrap().to_path_buf();
        fs::create_dir(shard.join("stuck")).unwrap();
        fs::create_dir_all(dir.path().join("images").join("zz").join("also-stuck")).unwrap();

        cache.cleanup().unwrap();
        assert!(cache.cached_path(url).is_none());
        assert!(shard.join("stuck").exists());
    }
}
