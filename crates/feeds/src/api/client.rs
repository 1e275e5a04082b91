//! Content API HTTP client
//!
//! Provides the `RemoteApi` implementation for NewsBlur-compatible servers.
//! Uses synchronous HTTP (ureq) to be executor-agnostic. Every request is
//! bounded by the agent's global timeout.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use log::debug;
use serde::de::DeserializeOwned;
use serde_json::Value;
use ureq::Agent;
use url::Url;

use super::normalize::{normalize_mapping, normalize_story};
use super::wire::{FeedsResponse, ResultResponse, StoriesResponse, UnreadHashesResponse};
use super::{ApiError, ClassifierAction, ClassifierKind, RemoteApi, classifier_field};
use crate::config::{Credentials, SyncSettings};
use crate::models::{FeedFolderMapping, FeedId, FeedSet, ReadFilter, Story, StoryHash, StoryOrder};

/// Session cookie name expected by the server
const SESSION_COOKIE: &str = "newsblur_sessionid";

/// Blocking client for the content API
pub struct NewsBlurClient {
    agent: Agent,
    base: String,
    cookie: String,
}

impl NewsBlurClient {
    /// Create a client for `base` (e.g. "https://www.newsblur.com")
    pub fn new(base: impl Into<String>, credentials: &Credentials, timeout: Duration) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();

        Self {
            agent,
            base: base.into().trim_end_matches('/').to_string(),
            cookie: format!("{}={}", SESSION_COOKIE, credentials.session_id),
        }
    }

    /// Create a client from loaded settings
    pub fn from_settings(settings: &SyncSettings, credentials: &Credentials) -> Self {
        Self::new(
            settings.api_base.clone(),
            credentials,
            Duration::from_secs(settings.request_timeout_secs),
        )
    }

    fn url(&self, path: &str, query: &[(&str, String)]) -> Result<Url> {
        let raw = format!("{}{}", self.base, path);
        Url::parse_with_params(&raw, query).with_context(|| format!("Invalid API url: {}", raw))
    }

    /// GET a JSON document
    fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = self.url(path, query)?;
        debug!("GET {}", path);

        let response = self
            .agent
            .get(url.as_str())
            .header("Cookie", &self.cookie)
            .call();

        match response {
            Ok(mut resp) => resp
                .body_mut()
                .read_json()
                .with_context(|| format!("Failed to parse response from {}", path)),
            Err(ureq::Error::StatusCode(401 | 403)) => Err(ApiError::NotAuthenticated.into()),
            Err(e) => Err(anyhow::anyhow!("Request to {} failed: {}", path, e)),
        }
    }

    /// POST a form and check the acknowledgement
    fn post_form(&self, path: &str, form: &[(&str, String)]) -> Result<()> {
        let url = self.url(path, &[])?;
        debug!("POST {}", path);

        let response = self
            .agent
            .post(url.as_str())
            .header("Cookie", &self.cookie)
            .send_form(form.iter().map(|(k, v)| (*k, v.as_str())));

        let ack: ResultResponse = match response {
            Ok(mut resp) => resp
                .body_mut()
                .read_json()
                .with_context(|| format!("Failed to parse response from {}", path))?,
            Err(ureq::Error::StatusCode(401 | 403)) => return Err(ApiError::NotAuthenticated.into()),
            Err(e) => return Err(anyhow::anyhow!("Request to {} failed: {}", path, e)),
        };

        if !ack.authenticated {
            return Err(ApiError::NotAuthenticated.into());
        }
        match ack.result.as_deref() {
            Some("ok") | None => Ok(()),
            Some(other) => Err(ApiError::BadResponse(format!("{} returned {}", path, other)).into()),
        }
    }

    /// Decode a story listing; a null story list is a bad response
    fn read_stories(&self, path: &str, query: &[(&str, String)]) -> Result<Vec<Story>> {
        let response: StoriesResponse = self.get_json(path, query)?;
        if !response.authenticated {
            return Err(ApiError::NotAuthenticated.into());
        }
        let stories = response
            .stories
            .ok_or_else(|| ApiError::BadResponse(format!("{} returned no story list", path)))?;
        Ok(stories.into_iter().map(normalize_story).collect())
    }
}

/// Endpoint path and selector parameters for paging a feed set
fn feed_set_endpoint(feed_set: &FeedSet) -> (String, Vec<(&'static str, String)>) {
    match feed_set {
        FeedSet::Feed(id) => (
            format!("/reader/feed/{}", urlencoding::encode(id.as_str())),
            Vec::new(),
        ),
        FeedSet::Folder { feeds, .. } => (
            "/reader/river_stories".to_string(),
            feeds.iter().map(|id| ("f", id.0.clone())).collect(),
        ),
        FeedSet::AllFeeds => ("/reader/river_stories".to_string(), Vec::new()),
        FeedSet::Social(user_id) => (
            format!("/social/stories/{}/", urlencoding::encode(user_id)),
            Vec::new(),
        ),
        FeedSet::AllSocial => ("/social/river_stories".to_string(), Vec::new()),
        FeedSet::Saved => ("/reader/starred_stories".to_string(), Vec::new()),
    }
}

/// Unread hashes come as bare strings or `[hash, timestamp]` pairs
fn unread_hash(value: &Value) -> Option<StoryHash> {
    match value {
        Value::String(s) => Some(StoryHash::new(s.as_str())),
        Value::Array(pair) => pair.first().and_then(Value::as_str).map(StoryHash::new),
        _ => None,
    }
}

impl RemoteApi for NewsBlurClient {
    fn folder_feed_mapping(&self, include_counts: bool) -> Result<FeedFolderMapping> {
        let query = [
            ("flat", "false".to_string()),
            ("include_favicons", "false".to_string()),
            ("update_counts", include_counts.to_string()),
        ];
        let response: FeedsResponse = self.get_json("/reader/feeds", &query)?;
        Ok(normalize_mapping(response))
    }

    fn unread_story_hashes(&self) -> Result<HashMap<FeedId, Vec<StoryHash>>> {
        let response: UnreadHashesResponse =
            self.get_json("/reader/unread_story_hashes", &[])?;
        let by_feed = response.unread_feed_story_hashes.ok_or_else(|| {
            ApiError::BadResponse("unread_story_hashes returned no hash map".to_string())
        })?;

        Ok(by_feed
            .into_iter()
            .map(|(feed_id, hashes)| {
                let hashes = hashes.iter().filter_map(unread_hash).collect();
                (FeedId::new(feed_id), hashes)
            })
            .collect())
    }

    fn stories_by_hash(&self, hashes: &[StoryHash]) -> Result<Vec<Story>> {
        let mut query: Vec<(&str, String)> = hashes.iter().map(|h| ("h", h.0.clone())).collect();
        query.push(("include_hidden", "true".to_string()));
        self.read_stories("/reader/river_stories", &query)
    }

    fn stories(
        &self,
        feed_set: &FeedSet,
        page: u32,
        order: StoryOrder,
        filter: ReadFilter,
    ) -> Result<Vec<Story>> {
        let (path, mut query) = feed_set_endpoint(feed_set);
        query.push(("page", page.to_string()));
        query.push(("order", order.as_param().to_string()));
        query.push(("read_filter", filter.as_param().to_string()));
        self.read_stories(&path, &query)
    }

    fn mark_story_read(&self, hash: &StoryHash) -> Result<()> {
        self.mark_stories_read(std::slice::from_ref(hash))
    }

    fn mark_story_unread(&self, feed_id: &FeedId, hash: &StoryHash) -> Result<()> {
        self.post_form(
            "/reader/mark_story_hash_as_unread",
            &[("story_hash", hash.0.clone()), ("feed_id", feed_id.0.clone())],
        )
    }

    fn mark_stories_read(&self, hashes: &[StoryHash]) -> Result<()> {
        if hashes.is_empty() {
            return Ok(());
        }
        let form: Vec<(&str, String)> = hashes.iter().map(|h| ("story_hash", h.0.clone())).collect();
        self.post_form("/reader/mark_story_hashes_as_read", &form)
    }

    fn set_story_starred(&self, feed_id: &FeedId, hash: &StoryHash, starred: bool) -> Result<()> {
        let path = if starred {
            "/reader/mark_story_hash_as_starred"
        } else {
            "/reader/mark_story_hash_as_unstarred"
        };
        self.post_form(
            path,
            &[("story_hash", hash.0.clone()), ("feed_id", feed_id.0.clone())],
        )
    }

    fn delete_feed(&self, feed_id: &FeedId, folder: Option<&str>) -> Result<()> {
        let mut form = vec![("feed_id", feed_id.0.clone())];
        if let Some(folder) = folder {
            form.push(("in_folder", folder.to_string()));
        }
        self.post_form("/reader/delete_feed", &form)
    }

    fn train_classifier(
        &self,
        feed_id: &FeedId,
        kind: ClassifierKind,
        key: &str,
        action: ClassifierAction,
    ) -> Result<()> {
        let field = classifier_field(kind, action);
        let value = if kind == ClassifierKind::Feed {
            feed_id.0.clone()
        } else {
            key.to_string()
        };
        let form = [("feed_id", feed_id.0.clone()), (field.as_str(), value)];
        self.post_form("/classifier/save", &form)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::normalize::id_string;
    use serde_json::json;

    #[test]
    fn test_feed_set_endpoints() {
        let (path, query) = feed_set_endpoint(&FeedSet::feed("100"));
        assert_eq!(path, "/reader/feed/100");
        assert!(query.is_empty());

        let (path, query) = feed_set_endpoint(&FeedSet::folder("Tech", ["101", "100"]));
        assert_eq!(path, "/reader/river_stories");
        assert_eq!(query, vec![("f", "100".to_string()), ("f", "101".to_string())]);

        let (path, _) = feed_set_endpoint(&FeedSet::social("42"));
        assert_eq!(path, "/social/stories/42/");
        assert_eq!(feed_set_endpoint(&FeedSet::Saved).0, "/reader/starred_stories");
    }

    #[test]
    fn test_url_building() {
        let client = NewsBlurClient::new(
            "https://example.com/",
            &Credentials::new("s3cret"),
            Duration::from_secs(5),
        );
        let url = client
            .url("/reader/river_stories", &[("h", "100:a b".to_string())])
            .unwrap();
        assert_eq!(url.as_str(), "https://example.com/reader/river_stories?h=100%3Aa+b");
        assert_eq!(client.cookie, "newsblur_sessionid=s3cret");
    }

    #[test]
    fn test_unread_hash_shapes() {
        assert_eq!(unread_hash(&json!("100:a")), Some(StoryHash::new("100:a")));
        assert_eq!(
            unread_hash(&json!(["100:b", 1700000000])),
            Some(StoryHash::new("100:b"))
        );
        assert_eq!(unread_hash(&json!(5)), None);
        assert_eq!(id_string(&json!(5)), "5");
    }
}
