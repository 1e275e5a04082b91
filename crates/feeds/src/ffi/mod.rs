//! FFI bindings for UniFFI export
//!
//! This module provides Swift/Kotlin bindings for the feeds crate via UniFFI.
//!
//! ## Usage from Swift
//!
//! ```swift
//! import FeedsFFI
//!
//! // Initialize logging first
//! initializeLogging(callback: myLogCallback, maxLevel: .info)
//!
//! let service = try FeedSyncService(
//!     dbPath: "/path/to/feeds.db",
//!     imageCachePath: "/path/to/images",
//!     sessionId: sessionCookie,
//!     settingsJson: nil
//! )
//! service.addStatusCallback(callback: statusBar)
//!
//! // Refresh everything, then page a feed as the reader scrolls
//! service.forceMetadata()
//! _ = service.requestMore(feedSet: .feed(feedId: "42"), desired: 40)
//! let stories = try service.listStories(feedSet: .feed(feedId: "42"), limit: 40, offset: 0)
//! ```

mod logging;
mod service;
mod types;

pub use logging::{init_ffi_logger, initialize_logging, set_log_callback, set_log_level};
pub use service::*;
pub use types::*;
