//! Story actions module
//!
//! Provides high-level action handlers for reader operations like
//! read/unread, starring, unsubscribing and classifier training.

mod handler;

pub use handler::ActionHandler;
