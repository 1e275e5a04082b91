//! Feed set selectors and the paging parameters that go with them

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{FeedId, Story};

/// What the user wants to see: the unit of pagination and request tracking
///
/// Equality is structural, so two selections of the same folder with the
/// same feeds are the same feed set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeedSet {
    /// A single feed
    Feed(FeedId),
    /// A folder and the feeds it contains
    Folder { name: String, feeds: BTreeSet<FeedId> },
    /// Every subscribed feed
    AllFeeds,
    /// Stories shared by one followed user
    Social(String),
    /// Stories shared by every followed user
    AllSocial,
    /// Starred stories
    Saved,
}

impl FeedSet {
    pub fn feed(id: impl Into<FeedId>) -> Self {
        FeedSet::Feed(id.into())
    }

    pub fn folder<I, F>(name: impl Into<String>, feeds: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<FeedId>,
    {
        FeedSet::Folder {
            name: name.into(),
            feeds: feeds.into_iter().map(Into::into).collect(),
        }
    }

    pub fn social(user_id: impl Into<String>) -> Self {
        FeedSet::Social(user_id.into())
    }

    /// Whether a stored story belongs to this selection
    pub fn contains(&self, story: &Story) -> bool {
        match self {
            FeedSet::Feed(id) => &story.feed_id == id,
            FeedSet::Folder { feeds, .. } => feeds.contains(&story.feed_id),
            FeedSet::AllFeeds => true,
            FeedSet::Social(user_id) => story.shared_by.iter().any(|u| u == user_id),
            FeedSet::AllSocial => !story.shared_by.is_empty(),
            FeedSet::Saved => story.starred,
        }
    }
}

impl std::fmt::Display for FeedSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedSet::Feed(id) => write!(f, "feed:{}", id),
            FeedSet::Folder { name, feeds } => write!(f, "folder:{} ({} feeds)", name, feeds.len()),
            FeedSet::AllFeeds => f.write_str("all"),
            FeedSet::Social(user_id) => write!(f, "social:{}", user_id),
            FeedSet::AllSocial => f.write_str("all-social"),
            FeedSet::Saved => f.write_str("saved"),
        }
    }
}

/// Order in which the server pages stories
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoryOrder {
    #[default]
    Newest,
    Oldest,
}

impl StoryOrder {
    pub fn as_param(&self) -> &'static str {
        match self {
            StoryOrder::Newest => "newest",
            StoryOrder::Oldest => "oldest",
        }
    }
}

/// Which stories the server includes when paging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadFilter {
    #[default]
    All,
    Unread,
}

impl ReadFilter {
    pub fn as_param(&self) -> &'static str {
        match self {
            ReadFilter::All => "all",
            ReadFilter::Unread => "unread",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_equality() {
        let a = FeedSet::folder("Tech", ["100", "101"]);
        let b = FeedSet::folder("Tech", ["101", "100"]);
        assert_eq!(a, b);
        assert_ne!(a, FeedSet::folder("Tech", ["100"]));
        assert_eq!(FeedSet::feed("100"), FeedSet::Feed(FeedId::new("100")));
    }

    #[test]
    fn test_contains() {
        let story = Story::builder("100:a", "100")
            .shared_by(vec!["42".to_string()])
            .build();
        assert!(FeedSet::feed("100").contains(&story));
        assert!(!FeedSet::feed("200").contains(&story));
        assert!(FeedSet::folder("Tech", ["100"]).contains(&story));
        assert!(FeedSet::social("42").contains(&story));
        assert!(FeedSet::AllSocial.contains(&story));
        assert!(!FeedSet::Saved.contains(&story));
    }

    #[test]
    fn test_params() {
        assert_eq!(StoryOrder::Oldest.as_param(), "oldest");
        assert_eq!(ReadFilter::Unread.as_param(), "unread");
        let order: StoryOrder = serde_json::from_str("\"oldest\"").unwrap();
        assert_eq!(order, StoryOrder::Oldest);
    }
}
