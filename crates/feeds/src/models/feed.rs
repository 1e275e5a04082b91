//! Feed, folder and social feed models

use serde::{Deserialize, Serialize};

/// Name of the pseudo-folder holding feeds that live at the top level
pub const ROOT_FOLDER: &str = "[root]";

/// Unique identifier for a feed (server feed ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeedId(pub String);

impl FeedId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for FeedId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for FeedId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<i64> for FeedId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for FeedId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A subscribed content source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    pub id: FeedId,
    pub title: String,
    /// Site address the feed was discovered from
    pub address: String,
    pub favicon_url: Option<String>,
    /// Unread stories the classifier scored positively
    pub positive_count: i32,
    pub neutral_count: i32,
    pub negative_count: i32,
    pub active: bool,
}

impl Feed {
    pub fn new(id: impl Into<FeedId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            address: String::new(),
            favicon_url: None,
            positive_count: 0,
            neutral_count: 0,
            negative_count: 0,
            active: true,
        }
    }

    /// Builder method to set the unread counters
    pub fn with_counts(mut self, positive: i32, neutral: i32, negative: i32) -> Self {
        self.positive_count = positive;
        self.neutral_count = neutral;
        self.negative_count = negative;
        self
    }

    /// Total unread stories across all classifier buckets
    pub fn unread_count(&self) -> i32 {
        self.positive_count + self.neutral_count + self.negative_count
    }
}

/// A named group of feeds
///
/// Doubles as the folder-to-feed mapping: every feed listed here belongs
/// to this folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub name: String,
    pub feed_ids: Vec<FeedId>,
}

impl Folder {
    pub fn new(name: impl Into<String>, feed_ids: Vec<FeedId>) -> Self {
        Self {
            name: name.into(),
            feed_ids,
        }
    }

    pub fn is_root(&self) -> bool {
        self.name == ROOT_FOLDER
    }
}

/// Another user's shared stories, followed like a feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialFeed {
    pub user_id: String,
    pub username: String,
    pub title: String,
    pub photo_url: Option<String>,
    pub positive_count: i32,
    pub neutral_count: i32,
    pub negative_count: i32,
}

impl SocialFeed {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            user_id: user_id.into(),
            title: username.clone(),
            username,
            photo_url: None,
            positive_count: 0,
            neutral_count: 0,
            negative_count: 0,
        }
    }
}

/// The full feed/folder state reported by the server
#[derive(Debug, Clone, Default)]
pub struct FeedFolderMapping {
    /// False when the session cookie is no longer accepted
    pub authenticated: bool,
    /// Premium accounts get an authoritative unread-hash listing
    pub is_premium: bool,
    pub feeds: Vec<Feed>,
    pub folders: Vec<Folder>,
    pub social_feeds: Vec<SocialFeed>,
    pub starred_count: u32,
}
