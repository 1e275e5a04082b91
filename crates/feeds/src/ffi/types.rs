//! FFI-friendly type wrappers for UniFFI export
//!
//! These types convert internal Rust types to FFI-compatible versions:
//! - `DateTime<Utc>` → `i64` (Unix timestamp)
//! - `FeedId`/`StoryHash` → `String`
//! - `FeedSet` → a flat enum with string ids

use std::collections::BTreeSet;

use crate::api::{ApiError, ClassifierAction, ClassifierKind};
use crate::models::{Feed, FeedId, FeedSet, Folder, ReadFilter, SocialFeed, Story, StoryOrder};
use crate::sync::{StatusListener, SyncError, SyncStatus};

// ============================================================================
// Error Types
// ============================================================================

/// FFI-friendly error type
#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum FeedsError {
    #[error("Database error: {message}")]
    Database { message: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Authentication required")]
    AuthRequired,

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Sync error: {message}")]
    Sync { message: String },
}

impl From<anyhow::Error> for FeedsError {
    fn from(e: anyhow::Error) -> Self {
        let message = format!("{:#}", e);
        match e.downcast_ref::<ApiError>() {
            Some(ApiError::NotAuthenticated) => return FeedsError::AuthRequired,
            Some(ApiError::BadResponse(_)) => return FeedsError::Network { message },
            None => {}
        }
        if e.downcast_ref::<rusqlite::Error>().is_some() {
            FeedsError::Database { message }
        } else if e.downcast_ref::<ureq::Error>().is_some() || message.contains("Request to") {
            FeedsError::Network { message }
        } else {
            FeedsError::Sync { message }
        }
    }
}

impl From<SyncError> for FeedsError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::LoggedOut => FeedsError::AuthRequired,
        }
    }
}

// ============================================================================
// Feed Sets
// ============================================================================

/// FFI-friendly feed set selector
#[derive(Debug, Clone, uniffi::Enum)]
pub enum FfiFeedSet {
    Feed { feed_id: String },
    Folder { name: String, feed_ids: Vec<String> },
    AllFeeds,
    Social { user_id: String },
    AllSocial,
    Saved,
}

impl From<FfiFeedSet> for FeedSet {
    fn from(fs: FfiFeedSet) -> Self {
        match fs {
            FfiFeedSet::Feed { feed_id } => FeedSet::Feed(FeedId::new(feed_id)),
            FfiFeedSet::Folder { name, feed_ids } => FeedSet::Folder {
                name,
                feeds: feed_ids.into_iter().map(FeedId::new).collect::<BTreeSet<_>>(),
            },
            FfiFeedSet::AllFeeds => FeedSet::AllFeeds,
            FfiFeedSet::Social { user_id } => FeedSet::Social(user_id),
            FfiFeedSet::AllSocial => FeedSet::AllSocial,
            FfiFeedSet::Saved => FeedSet::Saved,
        }
    }
}

#[derive(Debug, Clone, Copy, uniffi::Enum)]
pub enum FfiStoryOrder {
    Newest,
    Oldest,
}

impl From<FfiStoryOrder> for StoryOrder {
    fn from(order: FfiStoryOrder) -> Self {
        match order {
            FfiStoryOrder::Newest => StoryOrder::Newest,
            FfiStoryOrder::Oldest => StoryOrder::Oldest,
        }
    }
}

#[derive(Debug, Clone, Copy, uniffi::Enum)]
pub enum FfiReadFilter {
    All,
    Unread,
}

impl From<FfiReadFilter> for ReadFilter {
    fn from(filter: FfiReadFilter) -> Self {
        match filter {
            FfiReadFilter::All => ReadFilter::All,
            FfiReadFilter::Unread => ReadFilter::Unread,
        }
    }
}

// ============================================================================
// Feeds and Folders
// ============================================================================

/// FFI-friendly feed representation
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiFeed {
    pub id: String,
    pub title: String,
    pub address: String,
    pub favicon_url: Option<String>,
    pub positive_count: i32,
    pub neutral_count: i32,
    pub negative_count: i32,
    pub active: bool,
}

impl From<Feed> for FfiFeed {
    fn from(f: Feed) -> Self {
        Self {
            id: f.id.0,
            title: f.title,
            address: f.address,
            favicon_url: f.favicon_url,
            positive_count: f.positive_count,
            neutral_count: f.neutral_count,
            negative_count: f.negative_count,
            active: f.active,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiFolder {
    pub name: String,
    pub feed_ids: Vec<String>,
    pub is_root: bool,
}

impl From<Folder> for FfiFolder {
    fn from(f: Folder) -> Self {
        Self {
            is_root: f.is_root(),
            name: f.name,
            feed_ids: f.feed_ids.into_iter().map(|id| id.0).collect(),
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSocialFeed {
    pub user_id: String,
    pub username: String,
    pub title: String,
    pub photo_url: Option<String>,
    pub positive_count: i32,
    pub neutral_count: i32,
    pub negative_count: i32,
}

impl From<SocialFeed> for FfiSocialFeed {
    fn from(f: SocialFeed) -> Self {
        Self {
            user_id: f.user_id,
            username: f.username,
            title: f.title,
            photo_url: f.photo_url,
            positive_count: f.positive_count,
            neutral_count: f.neutral_count,
            negative_count: f.negative_count,
        }
    }
}

// ============================================================================
// Stories
// ============================================================================

/// FFI-friendly story representation
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiStory {
    pub hash: String,
    pub feed_id: String,
    pub title: String,
    pub permalink: String,
    pub content: String,
    pub authors: String,
    /// Unix timestamp (seconds since epoch)
    pub timestamp: i64,
    pub read: bool,
    pub starred: bool,
    pub image_urls: Vec<String>,
    pub shared_by: Vec<String>,
    pub intelligence: i32,
}

impl From<Story> for FfiStory {
    fn from(s: Story) -> Self {
        Self {
            hash: s.hash.0,
            feed_id: s.feed_id.0,
            title: s.title,
            permalink: s.permalink,
            content: s.content,
            authors: s.authors,
            timestamp: s.timestamp.timestamp(),
            read: s.read,
            starred: s.starred,
            image_urls: s.image_urls,
            shared_by: s.shared_by,
            intelligence: s.intelligence,
        }
    }
}

// ============================================================================
// Classifier
// ============================================================================

#[derive(Debug, Clone, Copy, uniffi::Enum)]
pub enum FfiClassifierKind {
    Title,
    Author,
    Tag,
    Feed,
}

impl From<FfiClassifierKind> for ClassifierKind {
    fn from(kind: FfiClassifierKind) -> Self {
        match kind {
            FfiClassifierKind::Title => ClassifierKind::Title,
            FfiClassifierKind::Author => ClassifierKind::Author,
            FfiClassifierKind::Tag => ClassifierKind::Tag,
            FfiClassifierKind::Feed => ClassifierKind::Feed,
        }
    }
}

#[derive(Debug, Clone, Copy, uniffi::Enum)]
pub enum FfiClassifierAction {
    Like,
    Dislike,
    Clear,
}

impl From<FfiClassifierAction> for ClassifierAction {
    fn from(action: FfiClassifierAction) -> Self {
        match action {
            FfiClassifierAction::Like => ClassifierAction::Like,
            FfiClassifierAction::Dislike => ClassifierAction::Dislike,
            FfiClassifierAction::Clear => ClassifierAction::Clear,
        }
    }
}

// ============================================================================
// Sync Status
// ============================================================================

/// FFI-friendly sync status snapshot
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSyncStatus {
    /// Status line for the UI, None when idle
    pub message: Option<String>,
    pub running: bool,
    pub metadata_running: bool,
    pub cleanup_running: bool,
    pub unread_hashes_running: bool,
    pub unread_fetch_running: bool,
    pub paging_running: bool,
    pub prefetch_running: bool,
    pub held: bool,
    pub logged_out: bool,
    pub pending_feed_sets: u32,
    pub unread_queue_len: u32,
    pub prefetch_queue_len: u32,
    /// Unix timestamp of the last feed/folder refresh
    pub last_metadata_sync: Option<i64>,
}

impl From<SyncStatus> for FfiSyncStatus {
    fn from(s: SyncStatus) -> Self {
        Self {
            message: s.message(),
            running: s.is_running(),
            metadata_running: s.metadata_running,
            cleanup_running: s.cleanup_running,
            unread_hashes_running: s.unread_hashes_running,
            unread_fetch_running: s.unread_fetch_running,
            paging_running: s.paging_running,
            prefetch_running: s.prefetch_running,
            held: s.held,
            logged_out: s.logged_out,
            pending_feed_sets: s.pending_feed_sets as u32,
            unread_queue_len: s.unread_queue_len as u32,
            prefetch_queue_len: s.prefetch_queue_len as u32,
            last_metadata_sync: s.last_metadata_sync.map(|t| t.timestamp()),
        }
    }
}

/// Callback interface for sync status updates
///
/// Called from the sync worker thread; hop to the main thread before
/// touching UI.
#[uniffi::export(callback_interface)]
pub trait StatusCallback: Send + Sync {
    fn on_status_changed(&self, status: FfiSyncStatus);
    /// The server rejected the session; prompt for login
    fn on_logged_out(&self);
}

/// Adapts a host callback to the engine's listener trait
pub(crate) struct CallbackListener(pub Box<dyn StatusCallback>);

impl StatusListener for CallbackListener {
    fn on_status_changed(&self, status: &SyncStatus) {
        self.0.on_status_changed(FfiSyncStatus::from(status.clone()));
    }

    fn on_logged_out(&self) {
        self.0.on_logged_out();
    }
}

// ============================================================================
// Log Callback
// ============================================================================

/// Log level for FFI callback
#[derive(Debug, Clone, Copy, uniffi::Enum)]
pub enum FfiLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<log::Level> for FfiLogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => FfiLogLevel::Error,
            log::Level::Warn => FfiLogLevel::Warn,
            log::Level::Info => FfiLogLevel::Info,
            log::Level::Debug => FfiLogLevel::Debug,
            log::Level::Trace => FfiLogLevel::Trace,
        }
    }
}

impl From<FfiLogLevel> for log::Level {
    fn from(level: FfiLogLevel) -> Self {
        match level {
            FfiLogLevel::Error => log::Level::Error,
            FfiLogLevel::Warn => log::Level::Warn,
            FfiLogLevel::Info => log::Level::Info,
            FfiLogLevel::Debug => log::Level::Debug,
            FfiLogLevel::Trace => log::Level::Trace,
        }
    }
}

/// Callback interface for receiving log messages from Rust
///
/// Swift should implement this using os_log/Logger, Kotlin with android.util.Log.
#[uniffi::export(callback_interface)]
pub trait LogCallback: Send + Sync {
    /// Called for every enabled record; `target` is the module path,
    /// e.g. "feeds::sync::orchestrator"
    fn on_log(&self, level: FfiLogLevel, target: String, message: String);
}
