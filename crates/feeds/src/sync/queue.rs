//! Work queues shared between the interactive layer and the sync worker
//!
//! [`RequestQueue`] tracks which feed sets the reader wants populated and
//! how far each has been paged. [`HashQueue`] is the de-duplicating
//! accumulator behind the unread and image prefetch queues.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, warn};

use crate::models::FeedSet;

/// How far a feed set has been paged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageCursor {
    /// Highest page fetched (1-based; 0 before the first fetch)
    pub page: u32,
    /// Total stories seen across those pages
    pub seen: usize,
}

/// Outcome of [`RequestQueue::request_more`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMore {
    /// Recorded; the worker owes a pass
    Enqueued,
    /// An earlier request or earlier paging already covers it
    AlreadySatisfied,
    /// Nothing left to page; rejected
    Exhausted,
}

impl RequestMore {
    /// Whether more stories will (or already did) arrive
    pub fn accepted(&self) -> bool {
        !matches!(self, RequestMore::Exhausted)
    }
}

#[derive(Default)]
struct RequestState {
    pending: HashMap<FeedSet, usize>,
    cursors: HashMap<FeedSet, PageCursor>,
    exhausted: HashSet<FeedSet>,
}

/// Pending feed set requests, pagination cursors and exhaustion marks
#[derive(Default)]
pub struct RequestQueue {
    inner: Mutex<RequestState>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RequestState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ask for at least `desired` stories of `feed_set`
    ///
    /// Never lowers an existing request and never touches pending state for
    /// an exhausted feed set.
    pub fn request_more(&self, feed_set: &FeedSet, desired: usize) -> RequestMore {
        let mut state = self.lock();

        if state.exhausted.contains(feed_set) {
            warn!("Rejecting request for exhausted feed set {}", feed_set);
            return RequestMore::Exhausted;
        }
        if state.pending.get(feed_set).is_some_and(|&n| desired <= n) {
            return RequestMore::AlreadySatisfied;
        }
        if state.cursors.get(feed_set).is_some_and(|c| desired <= c.seen) {
            return RequestMore::AlreadySatisfied;
        }

        debug!("Enqueued request for {} stories of {}", desired, feed_set);
        state.pending.insert(feed_set.clone(), desired);
        RequestMore::Enqueued
    }

    /// Forget exhaustion and pagination so the feed set pages from the start
    pub fn reset(&self, feed_set: &FeedSet) {
        let mut state = self.lock();
        state.exhausted.remove(feed_set);
        state.cursors.insert(feed_set.clone(), PageCursor::default());
    }

    /// Drop every cursor and exhaustion mark (server pagination was reset)
    pub fn clear_pagination(&self) {
        let mut state = self.lock();
        state.cursors.clear();
        state.exhausted.clear();
    }

    /// Feed sets currently pending, in no particular order
    pub fn pending_snapshot(&self) -> Vec<FeedSet> {
        self.lock().pending.keys().cloned().collect()
    }

    pub fn desired(&self, feed_set: &FeedSet) -> Option<usize> {
        self.lock().pending.get(feed_set).copied()
    }

    pub fn is_pending(&self, feed_set: &FeedSet) -> bool {
        self.lock().pending.contains_key(feed_set)
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn remove_pending(&self, feed_set: &FeedSet) {
        self.lock().pending.remove(feed_set);
    }

    /// Drop the pending request if paging has met it or nothing is left
    ///
    /// Returns false when a larger request arrived while the page loop was
    /// finishing; that request stays pending for the next pass.
    pub fn complete(&self, feed_set: &FeedSet) -> bool {
        let mut state = self.lock();
        let seen = state.cursors.get(feed_set).map_or(0, |c| c.seen);
        let done = state.exhausted.contains(feed_set)
            || state.pending.get(feed_set).is_none_or(|&want| seen >= want);
        if done {
            state.pending.remove(feed_set);
        }
        done
    }

    pub fn cursor(&self, feed_set: &FeedSet) -> PageCursor {
        self.lock().cursors.get(feed_set).copied().unwrap_or_default()
    }

    /// Record a fetched page and the number of stories on it
    pub fn record_page(&self, feed_set: &FeedSet, page: u32, stories: usize) -> PageCursor {
        let mut state = self.lock();
        let cursor = state.cursors.entry(feed_set.clone()).or_default();
        cursor.page = page;
        cursor.seen += stories;
        *cursor
    }

    pub fn mark_exhausted(&self, feed_set: &FeedSet) {
        self.lock().exhausted.insert(feed_set.clone());
    }

    pub fn is_exhausted(&self, feed_set: &FeedSet) -> bool {
        self.lock().exhausted.contains(feed_set)
    }
}

/// De-duplicating work queue drained in bounded batches
pub struct HashQueue<T> {
    items: Mutex<HashSet<T>>,
}

impl<T: Eq + Hash + Clone> HashQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(HashSet::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add one item; false if it was already queued
    pub fn enqueue(&self, item: T) -> bool {
        self.lock().insert(item)
    }

    pub fn enqueue_all(&self, items: impl IntoIterator<Item = T>) {
        self.lock().extend(items);
    }

    /// Remove and return up to `max` items
    pub fn drain_batch(&self, max: usize) -> Vec<T> {
        let mut items = self.lock();
        let batch: Vec<T> = items.iter().take(max).cloned().collect();
        for item in &batch {
            items.remove(item);
        }
        batch
    }

    pub fn contains(&self, item: &T) -> bool {
        self.lock().contains(item)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl<T: Eq + Hash + Clone> Default for HashQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tech() -> FeedSet {
        FeedSet::folder("Tech", ["100"])
    }

    #[test]
    fn test_request_more_never_lowers() {
        let queue = RequestQueue::new();
        assert_eq!(queue.request_more(&tech(), 20), RequestMore::Enqueued);
        assert_eq!(queue.request_more(&tech(), 10), RequestMore::AlreadySatisfied);
        assert_eq!(queue.request_more(&tech(), 20), RequestMore::AlreadySatisfied);
        assert_eq!(queue.desired(&tech()), Some(20));

        assert_eq!(queue.request_more(&tech(), 30), RequestMore::Enqueued);
        assert_eq!(queue.desired(&tech()), Some(30));
    }

    #[test]
    fn test_request_more_satisfied_by_seen() {
        let queue = RequestQueue::new();
        queue.record_page(&tech(), 1, 25);
        assert_eq!(queue.request_more(&tech(), 20), RequestMore::AlreadySatisfied);
        assert!(!queue.is_pending(&tech()));
    }

    #[test]
    fn test_exhausted_rejects_without_mutation() {
        let queue = RequestQueue::new();
        queue.mark_exhausted(&tech());

        let result = queue.request_more(&tech(), 10);
        assert_eq!(result, RequestMore::Exhausted);
        assert!(!result.accepted());
        assert_eq!(queue.pending_len(), 0);
    }

    #[test]
    fn test_reset() {
        let queue = RequestQueue::new();
        queue.record_page(&tech(), 3, 60);
        queue.mark_exhausted(&tech());

        queue.reset(&tech());
        assert_eq!(queue.cursor(&tech()), PageCursor { page: 0, seen: 0 });
        assert!(!queue.is_exhausted(&tech()));
    }

    #[test]
    fn test_clear_pagination_keeps_pending() {
        let queue = RequestQueue::new();
        queue.request_more(&tech(), 10);
        queue.record_page(&tech(), 1, 5);
        queue.mark_exhausted(&FeedSet::Saved);

        queue.clear_pagination();
        assert_eq!(queue.cursor(&tech()), PageCursor::default());
        assert!(!queue.is_exhausted(&FeedSet::Saved));
        assert!(queue.is_pending(&tech()));
    }

    #[test]
    fn test_complete_keeps_larger_request() {
        let queue = RequestQueue::new();
        queue.request_more(&tech(), 10);
        queue.record_page(&tech(), 1, 10);
        queue.request_more(&tech(), 30);
        assert!(!queue.complete(&tech()));
        assert!(queue.is_pending(&tech()));

        queue.mark_exhausted(&tech());
        assert!(queue.complete(&tech()));
        assert!(!queue.is_pending(&tech()));
    }

    #[test]
    fn test_hash_queue_dedup_and_drain() {
        let queue: HashQueue<String> = HashQueue::new();
        assert!(queue.enqueue("a".to_string()));
        assert!(!queue.enqueue("a".to_string()));
        queue.enqueue_all(["b".to_string(), "c".to_string(), "a".to_string()]);
        assert_eq!(queue.len(), 3);

        let first = queue.drain_batch(2);
        assert_eq!(first.len(), 2);
        let rest = queue.drain_batch(2);
        assert_eq!(rest.len(), 1);
        assert!(queue.drain_batch(2).is_empty());
        assert!(queue.is_empty());
    }
}
