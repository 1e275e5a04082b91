//! Feeds crate - Business logic for feed reading and sync
//!
//! This crate provides platform-independent feed reader functionality including:
//! - Domain models (Feed, Folder, Story, FeedSet)
//! - NewsBlur-style content API client
//! - Storage trait abstractions with SQLite and in-memory backends
//! - Background sync orchestrator with pagination and unread queues
//! - Image prefetch cache
//! - Action handlers for mutations (read/unread, star, unsubscribe, classifiers)
//!
//! This crate has zero UI dependencies and exports its service via UniFFI
//! for mobile hosts.

uniffi::setup_scaffolding!();

pub mod actions;
pub mod api;
pub mod config;
pub mod ffi;
pub mod images;
pub mod models;
pub mod storage;
pub mod sync;

pub use actions::ActionHandler;
pub use api::{ApiError, ClassifierAction, ClassifierKind, NewsBlurClient, RemoteApi};
pub use config::{Credentials, SyncSettings};
pub use images::{FileImageCache, ImageCache};
pub use models::{
    Feed, FeedFolderMapping, FeedId, FeedSet, Folder, Intelligence, ReadFilter, SocialFeed, Story,
    StoryHash, StoryOrder, ROOT_FOLDER,
};
pub use storage::{FeedStore, InMemoryFeedStore, SqliteFeedStore, STORY_RETENTION_DAYS};
pub use sync::{
    // Engine
    PassStats, SyncError, SyncHandle, SyncOrchestrator, SyncShared,
    // Request bookkeeping
    RequestMore, RequestQueue,
    // Status reporting
    StatusListener, SyncStatus,
    // Sync timing (for UI cooldown management)
    cooldown_elapsed, seconds_until_due,
};
