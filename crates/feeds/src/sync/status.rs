//! Sync status reporting
//!
//! Status is computed from the phase flags and queue sizes whenever it is
//! asked for; nothing polls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of what the sync worker is doing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub metadata_running: bool,
    pub cleanup_running: bool,
    pub unread_hashes_running: bool,
    pub unread_fetch_running: bool,
    pub paging_running: bool,
    pub prefetch_running: bool,
    pub held: bool,
    pub logged_out: bool,
    pub pending_feed_sets: usize,
    pub unread_queue_len: usize,
    pub prefetch_queue_len: usize,
    pub last_metadata_sync: Option<DateTime<Utc>>,
}

impl SyncStatus {
    /// One status line for the highest-priority running phase
    ///
    /// Never carries error detail.
    pub fn message(&self) -> Option<String> {
        if self.metadata_running {
            return Some("Syncing feeds . . .".to_string());
        }
        if self.cleanup_running {
            return Some("Cleaning up storage . . .".to_string());
        }
        if self.unread_hashes_running {
            return Some("Syncing unread status . . .".to_string());
        }
        if self.unread_fetch_running {
            return Some(format!("Syncing {} stories . . .", self.unread_queue_len));
        }
        if self.prefetch_running {
            return Some(format!("Caching {} images . . .", self.prefetch_queue_len));
        }
        if self.paging_running {
            return Some("Syncing stories . . .".to_string());
        }
        None
    }

    pub fn is_running(&self) -> bool {
        self.metadata_running
            || self.cleanup_running
            || self.unread_hashes_running
            || self.unread_fetch_running
            || self.paging_running
            || self.prefetch_running
    }
}

/// Observer of sync progress
///
/// Called from the sync worker thread; implementations must not block.
pub trait StatusListener: Send + Sync {
    fn on_status_changed(&self, status: &SyncStatus);

    /// The server rejected the session; the host should prompt for login
    fn on_logged_out(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_has_no_message() {
        let status = SyncStatus::default();
        assert_eq!(status.message(), None);
        assert!(!status.is_running());
    }

    #[test]
    fn test_message_priority() {
        let mut status = SyncStatus {
            paging_running: true,
            prefetch_running: true,
            prefetch_queue_len: 4,
            ..Default::default()
        };
        assert_eq!(status.message().as_deref(), Some("Caching 4 images . . ."));

        status.unread_fetch_running = true;
        status.unread_queue_len = 12;
        assert_eq!(status.message().as_deref(), Some("Syncing 12 stories . . ."));

        status.cleanup_running = true;
        assert_eq!(status.message().as_deref(), Some("Cleaning up storage . . ."));

        status.metadata_running = true;
        assert_eq!(status.message().as_deref(), Some("Syncing feeds . . ."));
    }

    #[test]
    fn test_paging_alone() {
        let status = SyncStatus {
            paging_running: true,
            ..Default::default()
        };
        assert_eq!(status.message().as_deref(), Some("Syncing stories . . ."));
        assert!(status.is_running());
    }
}
