//! One sync pass
//!
//! Phases run in a fixed order: pending feed set paging, metadata refresh
//! (with cleanup), unread hash discovery, unread fetch, image prefetch.
//! Every phase checks the halt signal at its start and at each batch or
//! page boundary. Hold skips whatever would reset pagination or evict
//! stories the reader may be looking at, but still lets paging append.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use log::{debug, error, info, warn};

use super::shared::SyncShared;
use super::state::Phase;
use super::timing::cooldown_elapsed;
use crate::api::{ApiError, RemoteApi};
use crate::config::SyncSettings;
use crate::images::ImageCache;
use crate::models::{Feed, FeedId, FeedSet, Story, StoryHash};
use crate::storage::FeedStore;

/// Errors that end a pass early
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The server no longer accepts the session
    #[error("Logged out: the server rejected the session")]
    LoggedOut,
}

/// Counters from one pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassStats {
    pub metadata_refreshed: bool,
    pub feeds_synced: usize,
    pub orphaned_feeds: usize,
    pub unread_queued: usize,
    pub unread_fetched: usize,
    pub pages_fetched: usize,
    pub stories_paged: usize,
    pub images_cached: usize,
    pub halted: bool,
}

/// What the unread hash phase needs from a successful metadata refresh
struct MetadataRefresh {
    kept_feeds: HashSet<FeedId>,
    is_premium: bool,
}

fn is_not_authenticated(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<ApiError>(), Some(ApiError::NotAuthenticated))
}

/// Runs sync passes against the injected collaborators
pub struct SyncOrchestrator {
    api: Arc<dyn RemoteApi>,
    store: Arc<dyn FeedStore>,
    images: Arc<dyn ImageCache>,
    shared: Arc<SyncShared>,
    settings: SyncSettings,
}

impl SyncOrchestrator {
    pub fn new(
        api: Arc<dyn RemoteApi>,
        store: Arc<dyn FeedStore>,
        images: Arc<dyn ImageCache>,
        shared: Arc<SyncShared>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            api,
            store,
            images,
            shared,
            settings,
        }
    }

    pub fn shared(&self) -> &Arc<SyncShared> {
        &self.shared
    }

    pub fn store(&self) -> &Arc<dyn FeedStore> {
        &self.store
    }

    fn halted(&self) -> bool {
        self.shared.run.is_halted()
    }

    fn held(&self) -> bool {
        self.shared.run.is_held()
    }

    /// Run every phase once
    ///
    /// Only a rejected session ends the pass with an error; transport and
    /// storage failures are logged and the affected phase stops.
    pub fn run_pass(&self) -> Result<PassStats, SyncError> {
        let mut stats = PassStats::default();
        debug!("Starting sync pass");

        // Explicit reader requests first
        self.sync_pending_feed_sets(&mut stats)?;

        if let Some(refresh) = self.sync_metadata(&mut stats)? {
            self.sync_unread_hashes(&refresh, &mut stats)?;
        }

        self.sync_unreads(&mut stats)?;
        self.prefetch_images(&mut stats);

        stats.halted = self.halted();
        info!(
            "Sync pass done: {} feeds, {} unread fetched, {} pages ({} stories), {} images{}",
            stats.feeds_synced,
            stats.unread_fetched,
            stats.pages_fetched,
            stats.stories_paged,
            stats.images_cached,
            if stats.halted { " (halted)" } else { "" }
        );
        Ok(stats)
    }

    /// Turn an auth failure into a logged-out pass abort; other errors pass through
    fn check_auth(&self, err: &anyhow::Error) -> Result<(), SyncError> {
        if is_not_authenticated(err) {
            self.mark_logged_out();
            return Err(SyncError::LoggedOut);
        }
        Ok(())
    }

    fn mark_logged_out(&self) {
        warn!("Server rejected the session, abandoning sync");
        self.shared.run.set_logged_out(true);
        self.shared.notify_logged_out();
        self.shared.notify();
    }

    /// Persist fetched stories and queue their images
    fn store_stories(&self, stories: &[Story]) {
        if stories.is_empty() {
            return;
        }
        if let Err(e) = self.store.insert_stories(stories) {
            error!("Failed to store {} stories: {:#}", stories.len(), e);
        }
        if self.settings.prefetch_images {
            for story in stories {
                self.shared.prefetch.enqueue_all(story.image_urls.iter().cloned());
            }
        }
    }

    // === Phase: pending feed set paging ===

    fn sync_pending_feed_sets(&self, stats: &mut PassStats) -> Result<(), SyncError> {
        let pending = self.shared.requests.pending_snapshot();
        if pending.is_empty() {
            return Ok(());
        }

        let _phase = self.shared.run.enter(Phase::Paging);
        self.shared.notify();
        let result = self.page_feed_sets(pending, stats);
        drop(_phase);
        self.shared.notify();
        result
    }

    fn page_feed_sets(
        &self,
        pending: Vec<FeedSet>,
        stats: &mut PassStats,
    ) -> Result<(), SyncError> {
        let requests = &self.shared.requests;

        for feed_set in pending {
            if self.halted() {
                return Ok(());
            }

            if requests.is_exhausted(&feed_set) {
                info!("No more stories for feed set {}", feed_set);
                requests.remove_pending(&feed_set);
                continue;
            }

            let (order, filter) = self.shared.reading_prefs(&feed_set);
            let mut cursor = requests.cursor(&feed_set);

            while requests.desired(&feed_set).is_some_and(|want| cursor.seen < want) {
                if self.halted() {
                    // Still wanted; the next pass picks it up
                    return Ok(());
                }

                let page = cursor.page + 1;
                let stories = match self.api.stories(&feed_set, page, order, filter) {
                    Ok(stories) => stories,
                    Err(e) => {
                        error!("Failed to fetch page {} of {}: {:#}", page, feed_set, e);
                        requests.remove_pending(&feed_set);
                        self.check_auth(&e)?;
                        return Ok(());
                    }
                };

                cursor = requests.record_page(&feed_set, page, stories.len());
                stats.pages_fetched += 1;
                stats.stories_paged += stories.len();
                self.store_stories(&stories);
                self.shared.notify();

                if stories.is_empty() {
                    debug!("Feed set {} exhausted after {} pages", feed_set, cursor.page);
                    requests.mark_exhausted(&feed_set);
                    break;
                }
            }

            requests.complete(&feed_set);
        }
        Ok(())
    }

    // === Phase: metadata refresh ===

    fn sync_metadata(&self, stats: &mut PassStats) -> Result<Option<MetadataRefresh>, SyncError> {
        let run = &self.shared.run;
        if self.halted() || self.held() {
            return Ok(None);
        }

        let forced = run.take_force_metadata();
        if !forced && !cooldown_elapsed(run.last_metadata_sync(), self.settings.auto_sync_interval_secs) {
            return Ok(None);
        }
        run.set_last_metadata_sync(Utc::now());

        self.cleanup();
        if self.halted() || self.held() {
            if forced {
                run.force_metadata();
            }
            return Ok(None);
        }

        let _phase = run.enter(Phase::Metadata);
        self.shared.notify();
        let result = self.refresh_feeds_folders(stats);
        drop(_phase);
        self.shared.notify();
        result
    }

    /// Story and image eviction; runs only as part of a metadata refresh
    fn cleanup(&self) {
        let _phase = self.shared.run.enter(Phase::Cleanup);
        self.shared.notify();

        if let Err(e) = self.store.cleanup(self.settings.keep_old_stories) {
            warn!("Story cleanup failed: {:#}", e);
        }
        if let Err(e) = self.images.cleanup() {
            warn!("Image cache cleanup failed: {:#}", e);
        }

        drop(_phase);
        self.shared.notify();
    }

    fn refresh_feeds_folders(
        &self,
        stats: &mut PassStats,
    ) -> Result<Option<MetadataRefresh>, SyncError> {
        let mapping = match self.api.folder_feed_mapping(true) {
            Ok(mapping) => mapping,
            Err(e) => {
                self.check_auth(&e)?;
                error!("Feed/folder sync failed: {:#}", e);
                return Ok(None);
            }
        };

        if !mapping.authenticated {
            self.mark_logged_out();
            return Err(SyncError::LoggedOut);
        }
        self.shared.run.set_logged_out(false);

        // Paused mid-fetch: leave cursors and tables alone and retry next pass
        if self.held() || self.halted() {
            debug!("Hold during feed/folder sync; deferring refresh");
            self.shared.run.force_metadata();
            return Ok(None);
        }

        // The server reset pagination for this session
        self.shared.requests.clear_pagination();
        self.shared.unread.clear();

        let foldered: HashSet<&FeedId> = mapping
            .folders
            .iter()
            .flat_map(|folder| folder.feed_ids.iter())
            .collect();
        let (kept, orphans): (Vec<Feed>, Vec<Feed>) = mapping
            .feeds
            .iter()
            .cloned()
            .partition(|feed| foldered.contains(&feed.id));
        for orphan in &orphans {
            warn!("Ignoring feed {} that is in no folder", orphan.id);
        }

        if let Err(e) =
            self.store
                .replace_feeds_folders(&kept, &mapping.folders, &mapping.social_feeds)
        {
            error!("Failed to store feeds and folders: {:#}", e);
        }
        if let Err(e) = self.store.update_starred_count(mapping.starred_count) {
            error!("Failed to store starred count: {:#}", e);
        }

        stats.metadata_refreshed = true;
        stats.feeds_synced = kept.len();
        stats.orphaned_feeds = orphans.len();
        info!(
            "Synced {} feeds, {} folders, {} social feeds",
            kept.len(),
            mapping.folders.len(),
            mapping.social_feeds.len()
        );

        Ok(Some(MetadataRefresh {
            kept_feeds: kept.into_iter().map(|feed| feed.id).collect(),
            is_premium: mapping.is_premium,
        }))
    }

    // === Phase: unread hash discovery ===

    fn sync_unread_hashes(
        &self,
        refresh: &MetadataRefresh,
        stats: &mut PassStats,
    ) -> Result<(), SyncError> {
        if self.halted() || self.held() {
            return Ok(());
        }

        let _phase = self.shared.run.enter(Phase::UnreadHashes);
        self.shared.notify();
        let result = self.discover_unread(refresh, stats);
        drop(_phase);
        self.shared.notify();
        result
    }

    fn discover_unread(
        &self,
        refresh: &MetadataRefresh,
        stats: &mut PassStats,
    ) -> Result<(), SyncError> {
        let server_unread = match self.api.unread_story_hashes() {
            Ok(hashes) => hashes,
            Err(e) => {
                self.check_auth(&e)?;
                error!("Failed to fetch unread hashes: {:#}", e);
                return Ok(());
            }
        };

        // Locally unread stories the server no longer lists as unread
        let mut stale_unread: HashSet<StoryHash> = match self.store.unread_story_hashes() {
            Ok(hashes) => hashes.into_iter().collect(),
            Err(e) => {
                warn!("Failed to read local unread hashes: {:#}", e);
                HashSet::new()
            }
        };

        for (feed_id, hashes) in server_unread {
            if !refresh.kept_feeds.contains(&feed_id) {
                debug!("Skipping unread hashes of orphaned feed {}", feed_id);
                continue;
            }

            let existing: HashSet<StoryHash> = match self.store.story_hashes_for_feed(&feed_id) {
                Ok(hashes) => hashes.into_iter().collect(),
                Err(e) => {
                    warn!("Failed to read stored hashes of feed {}: {:#}", feed_id, e);
                    HashSet::new()
                }
            };

            for hash in hashes {
                stale_unread.remove(&hash);
                if !existing.contains(&hash) && self.shared.unread.enqueue(hash) {
                    stats.unread_queued += 1;
                }
            }
        }

        // Only premium accounts report complete unread state
        if refresh.is_premium && !stale_unread.is_empty() {
            let stale: Vec<StoryHash> = stale_unread.into_iter().collect();
            match self.store.mark_stories_read(&stale) {
                Ok(()) => info!("Marked {} stories read to match the server", stale.len()),
                Err(e) => warn!("Failed to mark stale unread stories read: {:#}", e),
            }
        }

        debug!("Queued {} unread stories for fetch", stats.unread_queued);
        Ok(())
    }

    // === Phase: unread fetch ===

    fn sync_unreads(&self, stats: &mut PassStats) -> Result<(), SyncError> {
        if self.shared.unread.is_empty() {
            return Ok(());
        }

        let _phase = self.shared.run.enter(Phase::UnreadFetch);
        self.shared.notify();
        let result = self.fetch_unreads(stats);
        drop(_phase);
        self.shared.notify();
        result
    }

    fn fetch_unreads(&self, stats: &mut PassStats) -> Result<(), SyncError> {
        let batch_size = self.settings.unread_fetch_batch_size.max(1);

        loop {
            if self.halted() || self.held() {
                return Ok(());
            }

            let batch = self.shared.unread.drain_batch(batch_size);
            if batch.is_empty() {
                return Ok(());
            }

            let stories = match self.api.stories_by_hash(&batch) {
                Ok(stories) => stories,
                Err(e) => {
                    // The drained batch is dropped, not requeued
                    error!("Failed to fetch unread batch, abandoning unread sync: {:#}", e);
                    self.check_auth(&e)?;
                    return Ok(());
                }
            };

            stats.unread_fetched += stories.len();
            self.store_stories(&stories);
            self.shared.notify();
        }
    }

    // === Phase: image prefetch ===

    fn prefetch_images(&self, stats: &mut PassStats) {
        if !self.settings.prefetch_images || self.shared.prefetch.is_empty() {
            return;
        }

        let _phase = self.shared.run.enter(Phase::Prefetch);
        self.shared.notify();
        let batch_size = self.settings.image_prefetch_batch_size.max(1);

        'batches: loop {
            let batch = self.shared.prefetch.drain_batch(batch_size);
            if batch.is_empty() {
                break;
            }

            let mut remaining = batch.into_iter();
            while let Some(url) = remaining.next() {
                if self.halted() || self.held() {
                    // Unvisited urls go back for a later pass
                    self.shared.prefetch.enqueue(url);
                    self.shared.prefetch.enqueue_all(remaining);
                    break 'batches;
                }

                match self.images.cache(&url) {
                    Ok(()) => stats.images_cached += 1,
                    Err(e) => warn!("Failed to cache image {}: {:#}", url, e),
                }
            }
            self.shared.notify();
        }

        drop(_phase);
        self.shared.notify();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_auth_detection_through_context() {
        let err = Err::<(), _>(ApiError::NotAuthenticated)
            .context("Failed to fetch feeds")
            .unwrap_err();
        assert!(is_not_authenticated(&err));

        let other = anyhow::anyhow!("connection reset");
        assert!(!is_not_authenticated(&other));
        let bad = anyhow::Error::from(ApiError::BadResponse("null stories".into()));
        assert!(!is_not_authenticated(&bad));
    }
}
