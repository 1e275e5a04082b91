//! Storage traits and implementations
//!
//! This module defines the storage abstraction layer for feeds, folders
//! and stories. The trait-based design allows swapping between in-memory
//! and persistent storage implementations.

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryFeedStore;
pub use sqlite::SqliteFeedStore;
pub use traits::{FeedStore, STORY_RETENTION_DAYS};
