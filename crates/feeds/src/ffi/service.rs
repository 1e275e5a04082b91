//! FeedSyncService - Main FFI entry point
//!
//! Wraps the sync worker, the local store and the action handler behind one
//! object so Swift/Kotlin never see a trait object or a lock.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::info;

use super::types::*;
use crate::actions::ActionHandler;
use crate::api::{NewsBlurClient, RemoteApi};
use crate::config::{Credentials, SyncSettings};
use crate::images::FileImageCache;
use crate::models::{FeedId, FeedSet, StoryHash};
use crate::storage::{FeedStore, SqliteFeedStore};
use crate::sync::{SyncHandle, SyncOrchestrator, SyncShared};

/// Main service for feed sync operations
///
/// Thread-safe; every method returns without waiting for a sync pass.
#[derive(uniffi::Object)]
pub struct FeedSyncService {
    store: Arc<SqliteFeedStore>,
    images: Arc<FileImageCache>,
    actions: ActionHandler,
    sync: SyncHandle,
}

fn parse_settings(settings_json: Option<String>) -> Result<SyncSettings, FeedsError> {
    match settings_json {
        Some(json) => serde_json::from_str(&json).map_err(|e| FeedsError::InvalidArgument {
            message: format!("Invalid settings JSON: {}", e),
        }),
        None => Ok(SyncSettings::default()),
    }
}

#[uniffi::export]
impl FeedSyncService {
    /// Create the service and start its sync worker
    ///
    /// # Arguments
    /// * `db_path` - Path to the SQLite database file
    /// * `image_cache_path` - Directory for prefetched images
    /// * `session_id` - Session cookie of the logged-in user
    /// * `settings_json` - Optional serialized sync settings; defaults otherwise
    #[uniffi::constructor]
    pub fn new(
        db_path: String,
        image_cache_path: String,
        session_id: String,
        settings_json: Option<String>,
    ) -> Result<Arc<Self>, FeedsError> {
        if session_id.trim().is_empty() {
            return Err(FeedsError::AuthRequired);
        }
        let settings = parse_settings(settings_json)?;
        let credentials = Credentials::new(session_id);

        let store = Arc::new(SqliteFeedStore::new(PathBuf::from(&db_path))?);
        let images = Arc::new(FileImageCache::new(
            PathBuf::from(&image_cache_path),
            Duration::from_secs(settings.request_timeout_secs),
        )?);
        let api: Arc<dyn RemoteApi> = Arc::new(NewsBlurClient::from_settings(&settings, &credentials));

        let shared = Arc::new(SyncShared::new(
            settings.default_story_order,
            settings.default_read_filter,
        ));
        let orchestrator = SyncOrchestrator::new(
            Arc::clone(&api),
            store.clone(),
            images.clone(),
            shared,
            settings,
        );
        let sync = SyncHandle::spawn(orchestrator)?;
        let actions = ActionHandler::new(api, store.clone());

        info!("Feed sync service started with database {}", db_path);
        Ok(Arc::new(Self {
            store,
            images,
            actions,
            sync,
        }))
    }

    // ========================================================================
    // Sync control
    // ========================================================================

    /// Ask the worker for a pass; bursts coalesce into one follow-up pass
    pub fn request_pass(&self) {
        self.sync.request_pass();
    }

    pub fn hold(&self, hold: bool) {
        self.sync.hold(hold);
    }

    pub fn halt(&self) {
        self.sync.halt();
    }

    /// Refresh feeds and folders on the next pass
    pub fn force_metadata(&self) {
        self.sync.force_metadata();
        self.sync.request_pass();
    }

    /// Ask for at least `desired` stories of a feed set
    ///
    /// Returns false when the feed set is already exhausted.
    pub fn request_more(&self, feed_set: FfiFeedSet, desired: u32) -> bool {
        self.sync.request_more(&FeedSet::from(feed_set), desired as usize)
    }

    /// Forget pagination for a feed set so the next request starts at page 1
    pub fn reset_feed_set(&self, feed_set: FfiFeedSet) {
        self.sync.reset_feed_set(&FeedSet::from(feed_set));
    }

    /// Change order/filter for a feed set; returns true when this reset it
    pub fn set_reading_prefs(&self, feed_set: FfiFeedSet, order: FfiStoryOrder, filter: FfiReadFilter) -> bool {
        self.sync
            .set_reading_prefs(&FeedSet::from(feed_set), order.into(), filter.into())
    }

    // ========================================================================
    // Status
    // ========================================================================

    pub fn status(&self) -> FfiSyncStatus {
        self.sync.status().into()
    }

    pub fn status_message(&self) -> Option<String> {
        self.sync.status_message()
    }

    pub fn is_running(&self) -> bool {
        self.sync.is_running()
    }

    pub fn is_feed_set_syncing(&self, feed_set: FfiFeedSet) -> bool {
        self.sync.is_feed_set_syncing(&FeedSet::from(feed_set))
    }

    /// Register for status changes and logout notifications
    pub fn add_status_callback(&self, callback: Box<dyn StatusCallback>) {
        self.sync.add_listener(Arc::new(CallbackListener(callback)));
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn list_feeds(&self) -> Result<Vec<FfiFeed>, FeedsError> {
        Ok(self.store.list_feeds()?.into_iter().map(FfiFeed::from).collect())
    }

    pub fn list_folders(&self) -> Result<Vec<FfiFolder>, FeedsError> {
        Ok(self.store.list_folders()?.into_iter().map(FfiFolder::from).collect())
    }

    pub fn list_social_feeds(&self) -> Result<Vec<FfiSocialFeed>, FeedsError> {
        Ok(self
            .store
            .list_social_feeds()?
            .into_iter()
            .map(FfiSocialFeed::from)
            .collect())
    }

    /// Stored stories of a feed set, using its current reading prefs
    pub fn list_stories(&self, feed_set: FfiFeedSet, limit: u32, offset: u32) -> Result<Vec<FfiStory>, FeedsError> {
        let feed_set = FeedSet::from(feed_set);
        let (order, filter) = self.sync.shared().reading_prefs(&feed_set);
        let stories = self
            .store
            .list_stories(&feed_set, order, filter, limit as usize, offset as usize)?;
        Ok(stories.into_iter().map(FfiStory::from).collect())
    }

    pub fn get_story(&self, hash: String) -> Result<FfiStory, FeedsError> {
        self.store
            .get_story(&StoryHash::new(hash.clone()))?
            .map(FfiStory::from)
            .ok_or(FeedsError::NotFound {
                resource: format!("story {}", hash),
            })
    }

    pub fn starred_count(&self) -> Result<u32, FeedsError> {
        Ok(self.store.starred_count()?)
    }

    /// Local file of a prefetched image, if it has been cached
    pub fn cached_image_path(&self, url: String) -> Option<String> {
        self.images
            .cached_path(&url)
            .map(|path| path.to_string_lossy().into_owned())
    }

    // ========================================================================
    // Actions
    // ========================================================================

    /// Mark a story read; false if it was already read or isn't stored
    pub fn mark_story_read(&self, hash: String) -> Result<bool, FeedsError> {
        Ok(self.actions.mark_story_read(&StoryHash::new(hash))?)
    }

    pub fn mark_story_unread(&self, hash: String) -> Result<bool, FeedsError> {
        Ok(self.actions.mark_story_unread(&StoryHash::new(hash))?)
    }

    pub fn mark_stories_read(&self, hashes: Vec<String>) -> Result<(), FeedsError> {
        let hashes: Vec<StoryHash> = hashes.into_iter().map(StoryHash::new).collect();
        Ok(self.actions.mark_stories_read(&hashes)?)
    }

    pub fn set_story_starred(&self, hash: String, starred: bool) -> Result<(), FeedsError> {
        Ok(self.actions.set_starred(&StoryHash::new(hash), starred)?)
    }

    /// Returns the new starred state
    pub fn toggle_star(&self, hash: String) -> Result<bool, FeedsError> {
        Ok(self.actions.toggle_star(&StoryHash::new(hash))?)
    }

    pub fn delete_feed(&self, feed_id: String, folder: Option<String>) -> Result<(), FeedsError> {
        Ok(self
            .actions
            .delete_feed(&FeedId::new(feed_id), folder.as_deref())?)
    }

    pub fn train_classifier(
        &self,
        feed_id: String,
        kind: FfiClassifierKind,
        key: String,
        action: FfiClassifierAction,
    ) -> Result<(), FeedsError> {
        Ok(self
            .actions
            .train_classifier(&FeedId::new(feed_id), kind.into(), &key, action.into())?)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Stop the worker and close the database; the service is unusable after
    pub fn shutdown(&self) -> Result<(), FeedsError> {
        Ok(self.sync.shutdown()?)
    }
}

/// Default sync settings as JSON, for hosts that persist them
#[uniffi::export]
pub fn default_settings_json() -> String {
    serde_json::to_string(&SyncSettings::default()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_settings() {
        let settings = parse_settings(Some(r#"{ "prefetch_images": false }"#.to_string())).unwrap();
        assert!(!settings.prefetch_images);
        assert_eq!(settings.unread_fetch_batch_size, 50);

        assert!(matches!(
            parse_settings(Some("not json".to_string())),
            Err(FeedsError::InvalidArgument { .. })
        ));
        assert_eq!(parse_settings(None).unwrap(), SyncSettings::default());
    }

    #[test]
    fn test_default_settings_json_round_trips() {
        let settings: SyncSettings = serde_json::from_str(&default_settings_json()).unwrap();
        assert_eq!(settings, SyncSettings::default());
    }

    #[test]
    fn test_empty_session_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = FeedSyncService::new(
            dir.path().join("feeds.db").to_string_lossy().into_owned(),
            dir.path().join("images").to_string_lossy().into_owned(),
            "  ".to_string(),
            None,
        );
        assert!(matches!(result, Err(FeedsError::AuthRequired)));
    }
}
