//! Content API integration
//!
//! This module provides:
//! - The `RemoteApi` seam the sync engine and actions talk to
//! - A blocking NewsBlur-style HTTP client implementing it
//! - Normalization of wire responses to domain models

mod client;
mod normalize;

use std::collections::HashMap;

use anyhow::Result;

use crate::models::{FeedFolderMapping, FeedId, FeedSet, ReadFilter, Story, StoryHash, StoryOrder};

pub use client::NewsBlurClient;
pub use normalize::{normalize_folders, normalize_mapping, normalize_story};

/// Errors callers branch on; everything else is plain transport failure
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The session is missing or was rejected
    #[error("Not authenticated with the content API")]
    NotAuthenticated,
    /// The server answered but the body is unusable
    #[error("Bad response from the content API: {0}")]
    BadResponse(String),
}

/// What a classifier rule matches on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierKind {
    Title,
    Author,
    Tag,
    Feed,
}

impl ClassifierKind {
    pub fn as_param(&self) -> &'static str {
        match self {
            ClassifierKind::Title => "title",
            ClassifierKind::Author => "author",
            ClassifierKind::Tag => "tag",
            ClassifierKind::Feed => "feed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierAction {
    Like,
    Dislike,
    Clear,
}

/// Form field naming a classifier change, e.g. `like_author`
pub fn classifier_field(kind: ClassifierKind, action: ClassifierAction) -> String {
    let prefix = match action {
        ClassifierAction::Like => "like",
        ClassifierAction::Dislike => "dislike",
        ClassifierAction::Clear => "remove_like",
    };
    format!("{}_{}", prefix, kind.as_param())
}

/// Remote content API used by the sync engine and story actions
///
/// Implementations must enforce their own request timeout. Errors that
/// callers need to tell apart are returned as [`ApiError`] inside the
/// `anyhow::Error`.
pub trait RemoteApi: Send + Sync {
    /// Full feed/folder/social mapping plus account flags
    fn folder_feed_mapping(&self, include_counts: bool) -> Result<FeedFolderMapping>;

    /// Unread story hashes per feed, as the server sees them
    fn unread_story_hashes(&self) -> Result<HashMap<FeedId, Vec<StoryHash>>>;

    /// Fetch full stories by hash
    fn stories_by_hash(&self, hashes: &[StoryHash]) -> Result<Vec<Story>>;

    /// Fetch one page (1-based) of a feed set's stories
    fn stories(
        &self,
        feed_set: &FeedSet,
        page: u32,
        order: StoryOrder,
        filter: ReadFilter,
    ) -> Result<Vec<Story>>;

    fn mark_story_read(&self, hash: &StoryHash) -> Result<()>;

    fn mark_story_unread(&self, feed_id: &FeedId, hash: &StoryHash) -> Result<()>;

    fn mark_stories_read(&self, hashes: &[StoryHash]) -> Result<()>;

    fn set_story_starred(&self, feed_id: &FeedId, hash: &StoryHash, starred: bool) -> Result<()>;

    /// Unsubscribe from a feed, optionally only within one folder
    fn delete_feed(&self, feed_id: &FeedId, folder: Option<&str>) -> Result<()>;

    fn train_classifier(
        &self,
        feed_id: &FeedId,
        kind: ClassifierKind,
        key: &str,
        action: ClassifierAction,
    ) -> Result<()>;
}

/// Content API response types
pub mod wire {
    use std::collections::HashMap;

    use serde::Deserialize;
    use serde_json::Value;

    /// Response from /reader/feeds
    #[derive(Debug, Deserialize)]
    pub struct FeedsResponse {
        #[serde(default)]
        pub authenticated: bool,
        #[serde(default)]
        pub feeds: HashMap<String, WireFeed>,
        /// Nested folder tree: feed ids at this level and `{name: [...]}` subfolders
        #[serde(default)]
        pub folders: Vec<Value>,
        #[serde(default)]
        pub social_feeds: Vec<WireSocialFeed>,
        #[serde(default)]
        pub starred_count: u32,
        pub user_profile: Option<UserProfile>,
        #[serde(default)]
        pub is_premium: bool,
    }

    #[derive(Debug, Deserialize)]
    pub struct UserProfile {
        #[serde(default)]
        pub is_premium: bool,
    }

    /// Feed as served inside the feeds map
    #[derive(Debug, Deserialize)]
    pub struct WireFeed {
        pub id: Value,
        #[serde(default)]
        pub feed_title: String,
        #[serde(default)]
        pub feed_address: String,
        pub favicon_url: Option<String>,
        #[serde(default)]
        pub ps: i32,
        #[serde(default)]
        pub nt: i32,
        #[serde(default)]
        pub ng: i32,
        #[serde(default = "default_true")]
        pub active: bool,
    }

    #[derive(Debug, Deserialize)]
    pub struct WireSocialFeed {
        pub user_id: Value,
        #[serde(default)]
        pub username: String,
        #[serde(default)]
        pub feed_title: String,
        pub photo_url: Option<String>,
        #[serde(default)]
        pub ps: i32,
        #[serde(default)]
        pub nt: i32,
        #[serde(default)]
        pub ng: i32,
    }

    /// Response from /reader/unread_story_hashes
    #[derive(Debug, Deserialize)]
    pub struct UnreadHashesResponse {
        pub unread_feed_story_hashes: Option<HashMap<String, Vec<Value>>>,
    }

    /// Response from every story-listing endpoint
    #[derive(Debug, Deserialize)]
    pub struct StoriesResponse {
        pub stories: Option<Vec<WireStory>>,
        #[serde(default = "default_true")]
        pub authenticated: bool,
    }

    #[derive(Debug, Deserialize)]
    pub struct WireStory {
        pub story_hash: String,
        pub story_feed_id: Value,
        #[serde(default)]
        pub story_title: String,
        #[serde(default)]
        pub story_permalink: String,
        #[serde(default)]
        pub story_content: String,
        #[serde(default)]
        pub story_authors: String,
        /// Epoch seconds, served as a string or a number
        pub story_timestamp: Option<Value>,
        #[serde(default)]
        pub read_status: i32,
        #[serde(default)]
        pub starred: bool,
        #[serde(default)]
        pub image_urls: Vec<String>,
        #[serde(default)]
        pub shared_by_friends: Vec<Value>,
        #[serde(default)]
        pub intelligence: WireIntelligence,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct WireIntelligence {
        #[serde(default)]
        pub feed: i32,
        #[serde(default)]
        pub author: i32,
        #[serde(default)]
        pub tags: i32,
        #[serde(default)]
        pub title: i32,
    }

    /// Generic `{ "result": "ok" }` acknowledgement
    #[derive(Debug, Deserialize)]
    pub struct ResultResponse {
        pub result: Option<String>,
        #[serde(default = "default_true")]
        pub authenticated: bool,
    }

    fn default_true() -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifier_field() {
        assert_eq!(
            classifier_field(ClassifierKind::Author, ClassifierAction::Like),
            "like_author"
        );
        assert_eq!(
            classifier_field(ClassifierKind::Tag, ClassifierAction::Clear),
            "remove_like_tag"
        );
    }

    #[test]
    fn test_api_error_downcast() {
        let err: anyhow::Error = ApiError::NotAuthenticated.into();
        assert!(matches!(
            err.downcast_ref::<ApiError>(),
            Some(ApiError::NotAuthenticated)
        ));
    }
}
