//! Storage trait definitions

use crate::models::{Feed, FeedId, FeedSet, Folder, ReadFilter, SocialFeed, Story, StoryHash, StoryOrder};
use anyhow::Result;

/// Trait for local feed storage operations
///
/// This trait abstracts over different storage backends (in-memory, SQLite)
/// and provides the operations the sync engine and the story actions need.
pub trait FeedStore: Send + Sync {
    /// Replace every feed, folder and social feed in one step
    ///
    /// This is a full-state resync, not a diff: anything not in the
    /// arguments is gone afterwards. Stories are left alone.
    fn replace_feeds_folders(
        &self,
        feeds: &[Feed],
        folders: &[Folder],
        social_feeds: &[SocialFeed],
    ) -> Result<()>;

    /// Insert or update a batch of stories
    ///
    /// The server is authoritative, so an existing story takes the
    /// incoming read and starred state.
    fn insert_stories(&self, stories: &[Story]) -> Result<()>;

    /// Hashes of every story currently marked unread
    fn unread_story_hashes(&self) -> Result<Vec<StoryHash>>;

    /// Hashes of every stored story of a feed
    fn story_hashes_for_feed(&self, feed_id: &FeedId) -> Result<Vec<StoryHash>>;

    /// Mark stories read, adjusting their feeds' unread counters
    fn mark_stories_read(&self, hashes: &[StoryHash]) -> Result<()>;

    /// Flip a single story's read state
    ///
    /// Returns false when the story is missing or already in that state.
    fn set_story_read(&self, hash: &StoryHash, read: bool) -> Result<bool>;

    /// Flip a single story's starred state
    fn set_story_starred(&self, hash: &StoryHash, starred: bool) -> Result<()>;

    /// Record the server's count of starred stories
    fn update_starred_count(&self, count: u32) -> Result<()>;

    fn starred_count(&self) -> Result<u32>;

    /// Evict old stories
    ///
    /// Starred and unread stories always survive. With `keep_old_stories`
    /// only read stories older than the retention window are removed,
    /// otherwise every read story is.
    fn cleanup(&self, keep_old_stories: bool) -> Result<()>;

    /// Flush and release the backing storage
    fn close(&self) -> Result<()>;

    // === Queries ===

    fn list_feeds(&self) -> Result<Vec<Feed>>;

    fn list_folders(&self) -> Result<Vec<Folder>>;

    fn list_social_feeds(&self) -> Result<Vec<SocialFeed>>;

    fn get_feed(&self, id: &FeedId) -> Result<Option<Feed>>;

    fn get_story(&self, hash: &StoryHash) -> Result<Option<Story>>;

    fn has_story(&self, hash: &StoryHash) -> Result<bool>;

    /// List the stories of a feed set in the given order
    fn list_stories(
        &self,
        feed_set: &FeedSet,
        order: StoryOrder,
        filter: ReadFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Story>>;

    fn count_stories(&self) -> Result<usize>;

    /// Remove a feed, its folder memberships and its stories
    fn delete_feed(&self, id: &FeedId) -> Result<()>;
}

/// Stories read longer ago than this are evicted even when old stories are kept
pub const STORY_RETENTION_DAYS: i64 = 30;
