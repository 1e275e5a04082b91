//! Content API response normalization
//!
//! Converts wire responses to domain models.

use chrono::{DateTime, Utc};
use log::debug;
use serde_json::Value;

use super::wire::{FeedsResponse, WireStory};
use crate::models::{Feed, FeedFolderMapping, FeedId, Folder, ROOT_FOLDER, SocialFeed, Story};

/// Separator between parent and child names of nested folders
const FOLDER_SEPARATOR: &str = " - ";

/// Normalize the /reader/feeds response
pub fn normalize_mapping(response: FeedsResponse) -> FeedFolderMapping {
    let feeds = response
        .feeds
        .into_values()
        .map(|wire| Feed {
            id: FeedId::new(id_string(&wire.id)),
            title: wire.feed_title,
            address: wire.feed_address,
            favicon_url: wire.favicon_url,
            positive_count: wire.ps,
            neutral_count: wire.nt,
            negative_count: wire.ng,
            active: wire.active,
        })
        .collect();

    let social_feeds = response
        .social_feeds
        .into_iter()
        .map(|wire| SocialFeed {
            user_id: id_string(&wire.user_id),
            username: wire.username,
            title: wire.feed_title,
            photo_url: wire.photo_url,
            positive_count: wire.ps,
            neutral_count: wire.nt,
            negative_count: wire.ng,
        })
        .collect();

    let is_premium = response.is_premium || response.user_profile.is_some_and(|p| p.is_premium);

    FeedFolderMapping {
        authenticated: response.authenticated,
        is_premium,
        feeds,
        folders: normalize_folders(&response.folders),
        social_feeds,
        starred_count: response.starred_count,
    }
}

/// Flatten the nested folder tree
///
/// Feed ids at the top level land in the root folder. Subfolders are named
/// by their path, joined with " - ". The root folder is always present.
pub fn normalize_folders(tree: &[Value]) -> Vec<Folder> {
    let mut folders = vec![Folder::new(ROOT_FOLDER, Vec::new())];
    flatten_level(tree, ROOT_FOLDER, &mut folders);
    folders
}

fn flatten_level(items: &[Value], name: &str, folders: &mut Vec<Folder>) {
    let index = match folders.iter().position(|f| f.name == name) {
        Some(i) => i,
        None => {
            folders.push(Folder::new(name, Vec::new()));
            folders.len() - 1
        }
    };

    for item in items {
        match item {
            Value::Number(_) | Value::String(_) => {
                let id = FeedId::new(id_string(item));
                if !folders[index].feed_ids.contains(&id) {
                    folders[index].feed_ids.push(id);
                }
            }
            Value::Object(children) => {
                for (child, nested) in children {
                    let child_name = if name == ROOT_FOLDER {
                        child.clone()
                    } else {
                        format!("{name}{FOLDER_SEPARATOR}{child}")
                    };
                    let nested = nested.as_array().map(Vec::as_slice).unwrap_or_default();
                    flatten_level(nested, &child_name, folders);
                }
            }
            other => debug!("Ignoring unexpected folder entry: {}", other),
        }
    }
}

/// Normalize a wire story to a Story
pub fn normalize_story(wire: WireStory) -> Story {
    let timestamp = wire
        .story_timestamp
        .as_ref()
        .and_then(epoch_seconds)
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now);

    let intelligence = wire.intelligence.feed
        + wire.intelligence.author
        + wire.intelligence.tags
        + wire.intelligence.title;

    Story::builder(wire.story_hash, id_string(&wire.story_feed_id))
        .title(wire.story_title)
        .permalink(wire.story_permalink)
        .content(wire.story_content)
        .authors(wire.story_authors)
        .timestamp(timestamp)
        .read(wire.read_status != 0)
        .starred(wire.starred)
        .image_urls(wire.image_urls)
        .shared_by(wire.shared_by_friends.iter().map(id_string).collect())
        .intelligence(intelligence)
        .build()
}

/// Ids arrive as numbers or strings depending on the endpoint
pub(crate) fn id_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn epoch_seconds(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_folders() {
        let tree = json!([100, {"Tech": [101, 102, {"Rust": [103]}]}, {"News": []}]);
        let folders = normalize_folders(tree.as_array().unwrap());

        let names: Vec<&str> = folders.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec![ROOT_FOLDER, "Tech", "Tech - Rust", "News"]);
        assert_eq!(folders[0].feed_ids, vec![FeedId::new("100")]);
        assert_eq!(folders[1].feed_ids, vec![FeedId::new("101"), FeedId::new("102")]);
        assert_eq!(folders[2].feed_ids, vec![FeedId::new("103")]);
        assert!(folders[3].feed_ids.is_empty());
    }

    #[test]
    fn test_normalize_mapping() {
        let body = json!({
            "authenticated": true,
            "feeds": {
                "100": {"id": 100, "feed_title": "Hacker News", "feed_address": "https://hn", "ps": 1, "nt": 4, "ng": 0},
                "200": {"id": 200, "feed_title": "Orphan"}
            },
            "folders": [{"Tech": [100]}],
            "social_feeds": [{"user_id": 42, "username": "alice", "feed_title": "Alice's blurblog"}],
            "starred_count": 7,
            "user_profile": {"is_premium": true}
        });
        let response: FeedsResponse = serde_json::from_value(body).unwrap();
        let mapping = normalize_mapping(response);

        assert!(mapping.authenticated);
        assert!(mapping.is_premium);
        assert_eq!(mapping.feeds.len(), 2);
        assert_eq!(mapping.starred_count, 7);
        assert_eq!(mapping.social_feeds[0].user_id, "42");
        let hn = mapping.feeds.iter().find(|f| f.id.as_str() == "100").unwrap();
        assert_eq!(hn.unread_count(), 5);
        assert!(hn.active);
    }

    #[test]
    fn test_normalize_story() {
        let body = json!({
            "story_hash": "100:abc",
            "story_feed_id": 100,
            "story_title": "Hello",
            "story_timestamp": "1700000000",
            "read_status": 1,
            "image_urls": ["https://example.com/a.png"],
            "shared_by_friends": [42],
            "intelligence": {"feed": 0, "author": 1, "tags": 0, "title": 0}
        });
        let wire: WireStory = serde_json::from_value(body).unwrap();
        let story = normalize_story(wire);

        assert_eq!(story.feed_id.as_str(), "100");
        assert!(story.read);
        assert_eq!(story.timestamp.timestamp(), 1_700_000_000);
        assert_eq!(story.shared_by, vec!["42".to_string()]);
        assert_eq!(story.intelligence, 1);
    }
}
