//! Action handler for story operations
//!
//! Coordinates between the content API and local storage for mutations.

use anyhow::{Context, Result};
use log::{info, warn};
use std::sync::Arc;

use crate::api::{ClassifierAction, ClassifierKind, RemoteApi};
use crate::models::{FeedId, StoryHash};
use crate::storage::FeedStore;

/// Handler for story actions like read/unread, star, unsubscribe
///
/// Actions are performed in two steps:
/// 1. Update local storage so the reader sees the change immediately
/// 2. Call the content API to update server state
///
/// A local write failure is logged and the server call still happens; the
/// next metadata refresh brings local state back in line. Server failures
/// are returned to the caller.
pub struct ActionHandler {
    api: Arc<dyn RemoteApi>,
    store: Arc<dyn FeedStore>,
}

/// Story hashes look like "<feed id>:<digest>"
fn feed_id_from_hash(hash: &StoryHash) -> Option<FeedId> {
    hash.as_str()
        .split_once(':')
        .map(|(feed, _)| FeedId::new(feed))
}

impl ActionHandler {
    /// Create a new action handler
    pub fn new(api: Arc<dyn RemoteApi>, store: Arc<dyn FeedStore>) -> Self {
        Self { api, store }
    }

    pub fn mark_story_read(&self, hash: &StoryHash) -> Result<bool> {
        self.set_read(hash, true)
    }

    pub fn mark_story_unread(&self, hash: &StoryHash) -> Result<bool> {
        self.set_read(hash, false)
    }

    /// Set a story's read state
    ///
    /// Re-reads the stored story first and does nothing if it is missing or
    /// already in the requested state, so feed counters never move twice.
    /// Returns whether anything changed.
    pub fn set_read(&self, hash: &StoryHash, read: bool) -> Result<bool> {
        let Some(story) = self.store.get_story(hash)? else {
            warn!("Can't mark story {} as {}: not stored", hash, if read { "read" } else { "unread" });
            return Ok(false);
        };
        if story.read == read {
            return Ok(false);
        }

        info!("Marking story {} as {}", hash, if read { "read" } else { "unread" });

        if let Err(e) = self.store.set_story_read(hash, read) {
            warn!("Could not update unread counts in local storage: {:#}", e);
        }

        if read {
            self.api
                .mark_story_read(hash)
                .with_context(|| format!("Failed to mark story {} read", hash))?;
        } else {
            self.api
                .mark_story_unread(&story.feed_id, hash)
                .with_context(|| format!("Failed to mark story {} unread", hash))?;
        }
        Ok(true)
    }

    /// Mark a batch of stories read in one server call
    pub fn mark_stories_read(&self, hashes: &[StoryHash]) -> Result<()> {
        if hashes.is_empty() {
            return Ok(());
        }

        info!("Marking {} stories as read", hashes.len());
        if let Err(e) = self.store.mark_stories_read(hashes) {
            warn!("Could not update unread counts in local storage: {:#}", e);
        }

        self.api
            .mark_stories_read(hashes)
            .context("Failed to mark stories read")
    }

    /// Star or unstar a story
    pub fn set_starred(&self, hash: &StoryHash, starred: bool) -> Result<()> {
        let stored = self.store.get_story(hash)?;
        let feed_id = stored
            .as_ref()
            .map(|story| story.feed_id.clone())
            .or_else(|| feed_id_from_hash(hash))
            .with_context(|| format!("Can't tell which feed story {} belongs to", hash))?;

        info!("{} story {}", if starred { "Starring" } else { "Unstarring" }, hash);

        if stored.is_some_and(|story| story.starred != starred) {
            let local = self.store.set_story_starred(hash, starred).and_then(|()| {
                let count = self.store.starred_count()?;
                let count = if starred { count + 1 } else { count.saturating_sub(1) };
                self.store.update_starred_count(count)
            });
            if let Err(e) = local {
                warn!("Could not update starred state in local storage: {:#}", e);
            }
        }

        self.api
            .set_story_starred(&feed_id, hash, starred)
            .with_context(|| format!("Failed to update starred state of {}", hash))
    }

    /// Toggle star status for a story
    ///
    /// Returns the new starred state (true = starred, false = unstarred).
    pub fn toggle_star(&self, hash: &StoryHash) -> Result<bool> {
        let is_starred = self
            .store
            .get_story(hash)?
            .map(|story| story.starred)
            .unwrap_or(false);
        let new_starred = !is_starred;
        self.set_starred(hash, new_starred)?;
        Ok(new_starred)
    }

    /// Unsubscribe from a feed
    ///
    /// `folder` limits the removal to one folder on the server; locally the
    /// feed and its stories go away until the next metadata refresh says
    /// otherwise.
    pub fn delete_feed(&self, feed_id: &FeedId, folder: Option<&str>) -> Result<()> {
        info!("Deleting feed {}", feed_id);

        if let Err(e) = self.store.delete_feed(feed_id) {
            warn!("Could not delete feed {} from local storage: {:#}", feed_id, e);
        }

        self.api
            .delete_feed(feed_id, folder)
            .with_context(|| format!("Failed to delete feed {}", feed_id))
    }

    /// Teach the server's intelligence classifier about a title, author, tag or feed
    pub fn train_classifier(
        &self,
        feed_id: &FeedId,
        kind: ClassifierKind,
        key: &str,
        action: ClassifierAction,
    ) -> Result<()> {
        info!("Training {:?} classifier on feed {}: {:?}", kind, feed_id, action);
        self.api
            .train_classifier(feed_id, kind, key, action)
            .with_context(|| format!("Failed to save classifier for feed {}", feed_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Feed, FeedFolderMapping, FeedSet, ReadFilter, Story, StoryOrder};
    use crate::storage::InMemoryFeedStore;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Records every mutating call; optionally fails them
    #[derive(Default)]
    struct RecordingApi {
        calls: Mutex<Vec<String>>,
        fail: bool,
    }

    impl RecordingApi {
        fn record(&self, call: String) -> Result<()> {
            self.calls.lock().unwrap().push(call);
            if self.fail {
                anyhow::bail!("server unavailable");
            }
            Ok(())
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl RemoteApi for RecordingApi {
        fn folder_feed_mapping(&self, _include_counts: bool) -> Result<FeedFolderMapping> {
            Ok(FeedFolderMapping::default())
        }

        fn unread_story_hashes(&self) -> Result<HashMap<FeedId, Vec<StoryHash>>> {
            Ok(HashMap::new())
        }

        fn stories_by_hash(&self, _hashes: &[StoryHash]) -> Result<Vec<Story>> {
            Ok(Vec::new())
        }

        fn stories(&self, _: &FeedSet, _: u32, _: StoryOrder, _: ReadFilter) -> Result<Vec<Story>> {
            Ok(Vec::new())
        }

        fn mark_story_read(&self, hash: &StoryHash) -> Result<()> {
            self.record(format!("read {}", hash))
        }

        fn mark_story_unread(&self, feed_id: &FeedId, hash: &StoryHash) -> Result<()> {
            self.record(format!("unread {} {}", feed_id, hash))
        }

        fn mark_stories_read(&self, hashes: &[StoryHash]) -> Result<()> {
            self.record(format!("read-batch {}", hashes.len()))
        }

        fn set_story_starred(&self, feed_id: &FeedId, hash: &StoryHash, starred: bool) -> Result<()> {
            self.record(format!("starred {} {} {}", feed_id, hash, starred))
        }

        fn delete_feed(&self, feed_id: &FeedId, folder: Option<&str>) -> Result<()> {
            self.record(format!("delete {} {:?}", feed_id, folder))
        }

        fn train_classifier(
            &self,
            feed_id: &FeedId,
            kind: ClassifierKind,
            key: &str,
            action: ClassifierAction,
        ) -> Result<()> {
            self.record(format!("classifier {} {:?} {} {:?}", feed_id, kind, key, action))
        }
    }

    fn setup(fail: bool) -> (ActionHandler, Arc<RecordingApi>, Arc<InMemoryFeedStore>) {
        let api = Arc::new(RecordingApi {
            fail,
            ..Default::default()
        });
        let store = Arc::new(InMemoryFeedStore::new());
        store
            .replace_feeds_folders(&[Feed::new("100", "HN").with_counts(0, 1, 0)], &[], &[])
            .unwrap();
        store
            .insert_stories(&[Story::builder("100:a", "100").build()])
            .unwrap();
        let handler = ActionHandler::new(api.clone(), store.clone());
        (handler, api, store)
    }

    #[test]
    fn test_mark_read_is_idempotent() {
        let (handler, api, store) = setup(false);
        let hash = StoryHash::new("100:a");

        assert!(handler.mark_story_read(&hash).unwrap());
        assert!(!handler.mark_story_read(&hash).unwrap());

        assert_eq!(api.calls(), vec!["read 100:a".to_string()]);
        let feed = store.get_feed(&FeedId::new("100")).unwrap().unwrap();
        assert_eq!(feed.neutral_count, 0);
    }

    #[test]
    fn test_mark_unread_sends_feed_id() {
        let (handler, api, _store) = setup(false);
        let hash = StoryHash::new("100:a");
        handler.mark_story_read(&hash).unwrap();
        assert!(handler.mark_story_unread(&hash).unwrap());
        assert_eq!(api.calls()[1], "unread 100 100:a");
    }

    #[test]
    fn test_missing_story_is_noop() {
        let (handler, api, _store) = setup(false);
        assert!(!handler.mark_story_read(&StoryHash::new("100:zzz")).unwrap());
        assert!(api.calls().is_empty());
    }

    #[test]
    fn test_local_update_survives_server_error() {
        let (handler, _api, store) = setup(true);
        let hash = StoryHash::new("100:a");

        assert!(handler.mark_story_read(&hash).is_err());
        assert!(store.get_story(&hash).unwrap().unwrap().read);
    }

    #[test]
    fn test_toggle_star_updates_count() {
        let (handler, api, store) = setup(false);
        let hash = StoryHash::new("100:a");

        assert!(handler.toggle_star(&hash).unwrap());
        assert!(store.get_story(&hash).unwrap().unwrap().starred);
        assert_eq!(store.starred_count().unwrap(), 1);

        assert!(!handler.toggle_star(&hash).unwrap());
        assert_eq!(store.starred_count().unwrap(), 0);
        assert_eq!(api.calls()[0], "starred 100 100:a true");
    }

    #[test]
    fn test_star_unstored_story_uses_hash_prefix() {
        let (handler, api, _store) = setup(false);
        handler.set_starred(&StoryHash::new("200:b"), true).unwrap();
        assert_eq!(api.calls(), vec!["starred 200 200:b true".to_string()]);
    }

    #[test]
    fn test_delete_feed_and_classifier() {
        let (handler, api, store) = setup(false);
        handler.delete_feed(&FeedId::new("100"), Some("Tech")).unwrap();
        assert!(store.list_feeds().unwrap().is_empty());
        assert_eq!(store.count_stories().unwrap(), 0);

        handler
            .train_classifier(&FeedId::new("100"), ClassifierKind::Author, "jane", ClassifierAction::Like)
            .unwrap();
        assert_eq!(
            api.calls(),
            vec![
                "delete 100 Some(\"Tech\")".to_string(),
                "classifier 100 Author jane Like".to_string()
            ]
        );
    }

    #[test]
    fn test_mark_stories_read_batch() {
        let (handler, api, store) = setup(false);
        handler.mark_stories_read(&[StoryHash::new("100:a")]).unwrap();
        handler.mark_stories_read(&[]).unwrap();
        assert!(store.unread_story_hashes().unwrap().is_empty());
        assert_eq!(api.calls(), vec!["read-batch 1".to_string()]);
    }
}
