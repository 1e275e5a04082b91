//! Story model representing a single item of a feed

use super::FeedId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a story ("<feed id>:<hash>")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoryHash(pub String);

impl StoryHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for StoryHash {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for StoryHash {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for StoryHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which unread counter of a feed a story contributes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intelligence {
    Positive,
    Neutral,
    Negative,
}

impl Intelligence {
    /// Bucket a classifier score total
    pub fn from_score(score: i32) -> Self {
        match score {
            s if s > 0 => Intelligence::Positive,
            0 => Intelligence::Neutral,
            _ => Intelligence::Negative,
        }
    }
}

/// A single story within a feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub hash: StoryHash,
    pub feed_id: FeedId,
    pub title: String,
    pub permalink: String,
    /// Story body as served (HTML)
    pub content: String,
    pub authors: String,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
    pub starred: bool,
    /// Images referenced by the story body, candidates for prefetch
    pub image_urls: Vec<String>,
    /// Social users who shared this story
    pub shared_by: Vec<String>,
    /// Sum of the classifier scores (feed, author, tags, title)
    pub intelligence: i32,
}

impl Story {
    /// Create a new story builder
    pub fn builder(hash: impl Into<StoryHash>, feed_id: impl Into<FeedId>) -> StoryBuilder {
        StoryBuilder::new(hash.into(), feed_id.into())
    }

    pub fn intelligence_bucket(&self) -> Intelligence {
        Intelligence::from_score(self.intelligence)
    }
}

/// Builder for creating Story instances
pub struct StoryBuilder {
    hash: StoryHash,
    feed_id: FeedId,
    title: String,
    permalink: String,
    content: String,
    authors: String,
    timestamp: Option<DateTime<Utc>>,
    read: bool,
    starred: bool,
    image_urls: Vec<String>,
    shared_by: Vec<String>,
    intelligence: i32,
}

impl StoryBuilder {
    fn new(hash: StoryHash, feed_id: FeedId) -> Self {
        Self {
            hash,
            feed_id,
            title: String::new(),
            permalink: String::new(),
            content: String::new(),
            authors: String::new(),
            timestamp: None,
            read: false,
            starred: false,
            image_urls: Vec::new(),
            shared_by: Vec::new(),
            intelligence: 0,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn permalink(mut self, permalink: impl Into<String>) -> Self {
        self.permalink = permalink.into();
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn authors(mut self, authors: impl Into<String>) -> Self {
        self.authors = authors.into();
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn read(mut self, read: bool) -> Self {
        self.read = read;
        self
    }

    pub fn starred(mut self, starred: bool) -> Self {
        self.starred = starred;
        self
    }

    pub fn image_urls(mut self, image_urls: Vec<String>) -> Self {
        self.image_urls = image_urls;
        self
    }

    pub fn shared_by(mut self, shared_by: Vec<String>) -> Self {
        self.shared_by = shared_by;
        self
    }

    pub fn intelligence(mut self, intelligence: i32) -> Self {
        self.intelligence = intelligence;
        self
    }

    pub fn build(self) -> Story {
        Story {
            hash: self.hash,
            feed_id: self.feed_id,
            title: self.title,
            permalink: self.permalink,
            content: self.content,
            authors: self.authors,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            read: self.read,
            starred: self.starred,
            image_urls: self.image_urls,
            shared_by: self.shared_by,
            intelligence: self.intelligence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let story = Story::builder("100:abc", "100").title("Hello").build();
        assert_eq!(story.hash.as_str(), "100:abc");
        assert_eq!(story.feed_id.as_str(), "100");
        assert!(!story.read);
        assert!(!story.starred);
        assert!(story.image_urls.is_empty());
    }

    #[test]
    fn test_intelligence_bucket() {
        assert_eq!(Intelligence::from_score(2), Intelligence::Positive);
        assert_eq!(Intelligence::from_score(0), Intelligence::Neutral);
        assert_eq!(Intelligence::from_score(-1), Intelligence::Negative);
    }
}
