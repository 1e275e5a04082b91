//! In-memory storage implementation
//!
//! Used by tests and by hosts that do not need stories to outlive the
//! process.

use anyhow::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::traits::STORY_RETENTION_DAYS;
use super::FeedStore;
use crate::models::{
    Feed, FeedId, FeedSet, Folder, Intelligence, ReadFilter, SocialFeed, Story, StoryHash,
    StoryOrder,
};

/// In-memory implementation of FeedStore
///
/// Uses HashMaps protected by RwLocks for thread-safe access.
pub struct InMemoryFeedStore {
    feeds: RwLock<HashMap<FeedId, Feed>>,
    folders: RwLock<Vec<Folder>>,
    social_feeds: RwLock<Vec<SocialFeed>>,
    stories: RwLock<HashMap<StoryHash, Story>>,
    starred_count: RwLock<u32>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryFeedStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self {
            feeds: RwLock::new(HashMap::new()),
            folders: RwLock::new(Vec::new()),
            social_feeds: RwLock::new(Vec::new()),
            stories: RwLock::new(HashMap::new()),
            starred_count: RwLock::new(0),
        }
    }

    /// Move one unread story between "unread" and "read" on its feed's counters
    fn adjust_feed_counts(&self, feed_id: &FeedId, bucket: Intelligence, delta: i32) {
        let mut feeds = write(&self.feeds);
        if let Some(feed) = feeds.get_mut(feed_id) {
            let counts = (&mut feed.positive_count, &mut feed.neutral_count, &mut feed.negative_count);
            bump(counts, bucket, delta);
        }
    }

    /// Same for every followed user who shared the story
    fn adjust_social_counts(&self, shared_by: &[String], bucket: Intelligence, delta: i32) {
        let mut social_feeds = write(&self.social_feeds);
        for social in social_feeds.iter_mut().filter(|s| shared_by.contains(&s.user_id)) {
            let counts = (
                &mut social.positive_count,
                &mut social.neutral_count,
                &mut social.negative_count,
            );
            bump(counts, bucket, delta);
        }
    }
}

fn bump(counts: (&mut i32, &mut i32, &mut i32), bucket: Intelligence, delta: i32) {
    let counter = match bucket {
        Intelligence::Positive => counts.0,
        Intelligence::Neutral => counts.1,
        Intelligence::Negative => counts.2,
    };
    *counter = (*counter + delta).max(0);
}

impl Default for InMemoryFeedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedStore for InMemoryFeedStore {
    fn replace_feeds_folders(
        &self,
        feeds: &[Feed],
        folders: &[Folder],
        social_feeds: &[SocialFeed],
    ) -> Result<()> {
        // Take every lock up front so readers never see a half-swapped state
        let mut feed_map = write(&self.feeds);
        let mut folder_list = write(&self.folders);
        let mut social_list = write(&self.social_feeds);

        *feed_map = feeds.iter().map(|f| (f.id.clone(), f.clone())).collect();
        *folder_list = folders.to_vec();
        *social_list = social_feeds.to_vec();
        Ok(())
    }

    fn insert_stories(&self, stories: &[Story]) -> Result<()> {
        let mut map = write(&self.stories);
        for story in stories {
            map.insert(story.hash.clone(), story.clone());
        }
        Ok(())
    }

    fn unread_story_hashes(&self) -> Result<Vec<StoryHash>> {
        let stories = read(&self.stories);
        Ok(stories
            .values()
            .filter(|s| !s.read)
            .map(|s| s.hash.clone())
            .collect())
    }

    fn story_hashes_for_feed(&self, feed_id: &FeedId) -> Result<Vec<StoryHash>> {
        let stories = read(&self.stories);
        Ok(stories
            .values()
            .filter(|s| &s.feed_id == feed_id)
            .map(|s| s.hash.clone())
            .collect())
    }

    fn mark_stories_read(&self, hashes: &[StoryHash]) -> Result<()> {
        for hash in hashes {
            self.set_story_read(hash, true)?;
        }
        Ok(())
    }

    fn set_story_read(&self, hash: &StoryHash, read: bool) -> Result<bool> {
        let changed = {
            let mut stories = write(&self.stories);
            match stories.get_mut(hash) {
                Some(story) if story.read != read => {
                    story.read = read;
                    Some((
                        story.feed_id.clone(),
                        story.shared_by.clone(),
                        story.intelligence_bucket(),
                    ))
                }
                _ => None,
            }
        };

        let Some((feed_id, shared_by, bucket)) = changed else {
            return Ok(false);
        };
        let delta = if read { -1 } else { 1 };
        self.adjust_feed_counts(&feed_id, bucket, delta);
        self.adjust_social_counts(&shared_by, bucket, delta);
        Ok(true)
    }

    fn set_story_starred(&self, hash: &StoryHash, starred: bool) -> Result<()> {
        let mut stories = write(&self.stories);
        if let Some(story) = stories.get_mut(hash) {
            story.starred = starred;
        }
        Ok(())
    }

    fn update_starred_count(&self, count: u32) -> Result<()> {
        *write(&self.starred_count) = count;
        Ok(())
    }

    fn starred_count(&self) -> Result<u32> {
        Ok(*read(&self.starred_count))
    }

    fn cleanup(&self, keep_old_stories: bool) -> Result<()> {
        let cutoff = Utc::now() - chrono::Duration::days(STORY_RETENTION_DAYS);
        let mut stories = write(&self.stories);
        stories.retain(|_, s| {
            if s.starred || !s.read {
                return true;
            }
            keep_old_stories && s.timestamp >= cutoff
        });
        Ok(())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }

    fn list_feeds(&self) -> Result<Vec<Feed>> {
        let feeds = read(&self.feeds);
        let mut list: Vec<Feed> = feeds.values().cloned().collect();
        list.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()));
        Ok(list)
    }

    fn list_folders(&self) -> Result<Vec<Folder>> {
        Ok(read(&self.folders).clone())
    }

    fn list_social_feeds(&self) -> Result<Vec<SocialFeed>> {
        Ok(read(&self.social_feeds).clone())
    }

    fn get_feed(&self, id: &FeedId) -> Result<Option<Feed>> {
        Ok(read(&self.feeds).get(id).cloned())
    }

    fn get_story(&self, hash: &StoryHash) -> Result<Option<Story>> {
        Ok(read(&self.stories).get(hash).cloned())
    }

    fn has_story(&self, hash: &StoryHash) -> Result<bool> {
        Ok(read(&self.stories).contains_key(hash))
    }

    fn list_stories(
        &self,
        feed_set: &FeedSet,
        order: StoryOrder,
        filter: ReadFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Story>> {
        let stories = read(&self.stories);
        let mut list: Vec<Story> = stories
            .values()
            .filter(|s| feed_set.contains(s))
            .filter(|s| filter == ReadFilter::All || !s.read)
            .cloned()
            .collect();

        match order {
            StoryOrder::Newest => list.sort_by(|a, b| b.timestamp.cmp(&a.timestamp)),
            StoryOrder::Oldest => list.sort_by(|a, b| a.timestamp.cmp(&b.timestamp)),
        }

        Ok(list.into_iter().skip(offset).take(limit).collect())
    }

    fn count_stories(&self) -> Result<usize> {
        Ok(read(&self.stories).len())
    }

    fn delete_feed(&self, id: &FeedId) -> Result<()> {
        write(&self.feeds).remove(id);
        for folder in write(&self.folders).iter_mut() {
            folder.feed_ids.retain(|f| f != id);
        }
        write(&self.stories).retain(|_, s| &s.feed_id != id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn story(hash: &str, feed: &str, age_days: i64) -> Story {
        Story::builder(hash, feed)
            .title(format!("Story {}", hash))
            .timestamp(Utc::now() - chrono::Duration::days(age_days))
            .build()
    }

    #[test]
    fn test_replace_is_full_state() {
        let store = InMemoryFeedStore::new();
        store
            .replace_feeds_folders(&[Feed::new("1", "One")], &[], &[])
            .unwrap();
        store
            .replace_feeds_folders(&[Feed::new("2", "Two")], &[], &[])
            .unwrap();

        let feeds = store.list_feeds().unwrap();
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].id.as_str(), "2");
    }

    #[test]
    fn test_insert_is_idempotent() {
        let store = InMemoryFeedStore::new();
        let s = story("1:a", "1", 0);
        store.insert_stories(&[s.clone()]).unwrap();
        store.insert_stories(&[s]).unwrap();
        assert_eq!(store.count_stories().unwrap(), 1);
    }

    #[test]
    fn test_set_story_read_adjusts_counts() {
        let store = InMemoryFeedStore::new();
        store
            .replace_feeds_folders(&[Feed::new("1", "One").with_counts(0, 2, 0)], &[], &[])
            .unwrap();
        store.insert_stories(&[story("1:a", "1", 0)]).unwrap();

        let hash = StoryHash::new("1:a");
        assert!(store.set_story_read(&hash, true).unwrap());
        // Second flip to the same state is a no-op
        assert!(!store.set_story_read(&hash, true).unwrap());

        let feed = store.get_feed(&FeedId::new("1")).unwrap().unwrap();
        assert_eq!(feed.neutral_count, 1);
        assert!(store.unread_story_hashes().unwrap().is_empty());
    }

    #[test]
    fn test_set_story_read_adjusts_social_counts() {
        let store = InMemoryFeedStore::new();
        let mut alice = SocialFeed::new("42", "alice");
        alice.positive_count = 3;
        let mut bob = SocialFeed::new("43", "bob");
        bob.positive_count = 3;
        store
            .replace_feeds_folders(&[Feed::new("1", "One").with_counts(1, 0, 0)], &[], &[alice, bob])
            .unwrap();
        let shared = Story::builder("1:a", "1")
            .intelligence(2)
            .shared_by(vec!["42".to_string()])
            .build();
        store.insert_stories(&[shared]).unwrap();

        store.set_story_read(&StoryHash::new("1:a"), true).unwrap();
        let counts: Vec<(String, i32)> = store
            .list_social_feeds()
            .unwrap()
            .into_iter()
            .map(|s| (s.user_id, s.positive_count))
            .collect();
        assert!(counts.contains(&("42".to_string(), 2)));
        assert!(counts.contains(&("43".to_string(), 3)));

        store.set_story_read(&StoryHash::new("1:a"), false).unwrap();
        let alice = store
            .list_social_feeds()
            .unwrap()
            .into_iter()
            .find(|s| s.user_id == "42")
            .unwrap();
        assert_eq!(alice.positive_count, 3);
        assert_eq!(store.get_feed(&FeedId::new("1")).unwrap().unwrap().positive_count, 1);
    }

    #[test]
    fn test_cleanup_keeps_starred_and_unread() {
        let store = InMemoryFeedStore::new();
        let mut read_old = story("1:old", "1", 60);
        read_old.read = true;
        let mut read_new = story("1:new", "1", 1);
        read_new.read = true;
        let mut starred = story("1:star", "1", 60);
        starred.read = true;
        starred.starred = true;
        let unread = story("1:unread", "1", 60);
        store
            .insert_stories(&[read_old, read_new, starred, unread])
            .unwrap();

        store.cleanup(true).unwrap();
        assert!(!store.has_story(&StoryHash::new("1:old")).unwrap());
        assert!(store.has_story(&StoryHash::new("1:new")).unwrap());

        store.cleanup(false).unwrap();
        assert!(!store.has_story(&StoryHash::new("1:new")).unwrap());
        assert!(store.has_story(&StoryHash::new("1:star")).unwrap());
        assert!(store.has_story(&StoryHash::new("1:unread")).unwrap());
    }

    #[test]
    fn test_list_stories_order_and_filter() {
        let store = InMemoryFeedStore::new();
        let mut older = story("1:a", "1", 2);
        older.read = true;
        let newer = story("1:b", "1", 1);
        store.insert_stories(&[older, newer]).unwrap();

        let fs = FeedSet::feed("1");
        let newest = store
            .list_stories(&fs, StoryOrder::Newest, ReadFilter::All, 10, 0)
            .unwrap();
        assert_eq!(newest[0].hash.as_str(), "1:b");

        let oldest = store
            .list_stories(&fs, StoryOrder::Oldest, ReadFilter::All, 10, 0)
            .unwrap();
        assert_eq!(oldest[0].hash.as_str(), "1:a");

        let unread = store
            .list_stories(&fs, StoryOrder::Newest, ReadFilter::Unread, 10, 0)
            .unwrap();
        assert_eq!(unread.len(), 1);
    }
}
