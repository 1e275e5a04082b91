//! State shared between the sync worker and its callers

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use log::debug;

use super::queue::{HashQueue, RequestMore, RequestQueue};
use super::state::{Phase, RunState};
use super::status::{StatusListener, SyncStatus};
use crate::models::{FeedSet, ReadFilter, StoryHash, StoryOrder};

/// Everything a sync pass reads or writes besides its collaborators
///
/// Cursors and queues live here so they persist across passes.
pub struct SyncShared {
    pub run: RunState,
    pub requests: RequestQueue,
    pub unread: HashQueue<StoryHash>,
    pub prefetch: HashQueue<String>,
    reading_prefs: Mutex<HashMap<FeedSet, (StoryOrder, ReadFilter)>>,
    default_prefs: (StoryOrder, ReadFilter),
    listeners: RwLock<Vec<Arc<dyn StatusListener>>>,
}

impl SyncShared {
    pub fn new(default_order: StoryOrder, default_filter: ReadFilter) -> Self {
        Self {
            run: RunState::new(),
            requests: RequestQueue::new(),
            unread: HashQueue::new(),
            prefetch: HashQueue::new(),
            reading_prefs: Mutex::new(HashMap::new()),
            default_prefs: (default_order, default_filter),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn status(&self) -> SyncStatus {
        SyncStatus {
            metadata_running: self.run.is_running(Phase::Metadata),
            cleanup_running: self.run.is_running(Phase::Cleanup),
            unread_hashes_running: self.run.is_running(Phase::UnreadHashes),
            unread_fetch_running: self.run.is_running(Phase::UnreadFetch),
            paging_running: self.run.is_running(Phase::Paging),
            prefetch_running: self.run.is_running(Phase::Prefetch),
            held: self.run.is_held(),
            logged_out: self.run.is_logged_out(),
            pending_feed_sets: self.requests.pending_len(),
            unread_queue_len: self.unread.len(),
            prefetch_queue_len: self.prefetch.len(),
            last_metadata_sync: self.run.last_metadata_sync(),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn StatusListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    fn listeners(&self) -> Vec<Arc<dyn StatusListener>> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Publish the current status to every listener
    pub fn notify(&self) {
        let listeners = self.listeners();
        if listeners.is_empty() {
            return;
        }
        let status = self.status();
        for listener in listeners {
            listener.on_status_changed(&status);
        }
    }

    pub fn notify_logged_out(&self) {
        for listener in self.listeners() {
            listener.on_logged_out();
        }
    }

    /// Record a request for more stories and tell observers about it
    pub fn request_more(&self, feed_set: &FeedSet, desired: usize) -> RequestMore {
        let result = self.requests.request_more(feed_set, desired);
        if result == RequestMore::Enqueued {
            self.notify();
        }
        result
    }

    pub fn reset_feed_set(&self, feed_set: &FeedSet) {
        self.requests.reset(feed_set);
    }

    /// Order and filter used when paging `feed_set`
    pub fn reading_prefs(&self, feed_set: &FeedSet) -> (StoryOrder, ReadFilter) {
        self.reading_prefs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(feed_set)
            .copied()
            .unwrap_or(self.default_prefs)
    }

    /// Change how a feed set is paged; resets it when anything changed
    pub fn set_reading_prefs(&self, feed_set: &FeedSet, order: StoryOrder, filter: ReadFilter) -> bool {
        let previous = self
            .reading_prefs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(feed_set.clone(), (order, filter))
            .unwrap_or(self.default_prefs);

        let changed = previous != (order, filter);
        if changed {
            debug!("Reading prefs for {} changed, resetting pagination", feed_set);
            self.reset_feed_set(feed_set);
        }
        changed
    }

    /// Whether the reader is waiting on stories for this feed set
    pub fn is_feed_set_syncing(&self, feed_set: &FeedSet) -> bool {
        self.requests.is_pending(feed_set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingListener(AtomicUsize);

    impl StatusListener for CountingListener {
        fn on_status_changed(&self, _status: &SyncStatus) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_request_more_notifies_only_when_enqueued() {
        let shared = SyncShared::new(StoryOrder::Newest, ReadFilter::All);
        let listener = Arc::new(CountingListener(AtomicUsize::new(0)));
        shared.add_listener(listener.clone());

        let fs = FeedSet::feed("100");
        shared.request_more(&fs, 20);
        shared.request_more(&fs, 10);
        assert_eq!(listener.0.load(Ordering::SeqCst), 1);
        assert!(shared.is_feed_set_syncing(&fs));
    }

    #[test]
    fn test_reading_prefs_change_resets() {
        let shared = SyncShared::new(StoryOrder::Newest, ReadFilter::All);
        let fs = FeedSet::feed("100");
        shared.requests.record_page(&fs, 2, 40);
        shared.requests.mark_exhausted(&fs);

        assert!(!shared.set_reading_prefs(&fs, StoryOrder::Newest, ReadFilter::All));
        assert!(shared.requests.is_exhausted(&fs));

        assert!(shared.set_reading_prefs(&fs, StoryOrder::Oldest, ReadFilter::All));
        assert_eq!(shared.reading_prefs(&fs), (StoryOrder::Oldest, ReadFilter::All));
        assert!(!shared.requests.is_exhausted(&fs));
        assert_eq!(shared.requests.cursor(&fs).seen, 0);
    }
}
