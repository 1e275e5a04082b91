//! Background worker that runs sync passes one at a time
//!
//! Callers never block on a pass. A wake-up that arrives while a pass is
//! running only sets the fresh-request flag, so any burst of requests
//! during a pass costs exactly one more pass.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, mpsc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info, warn};

use super::orchestrator::SyncOrchestrator;
use super::shared::SyncShared;
use super::status::{StatusListener, SyncStatus};
use crate::models::{FeedSet, ReadFilter, StoryOrder};
use crate::storage::FeedStore;

enum Command {
    Wake,
    Shutdown,
}

#[derive(Default)]
struct WorkerState {
    active: bool,
    passes: usize,
}

/// Run lock, fresh-request flag and pass counter
#[derive(Default)]
struct SchedulerControl {
    fresh: AtomicBool,
    state: Mutex<WorkerState>,
    idle: Condvar,
}

impl SchedulerControl {
    fn lock(&self) -> MutexGuard<'_, WorkerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_active(&self, active: bool) {
        self.lock().active = active;
        self.idle.notify_all();
    }

    fn pass_finished(&self) {
        self.lock().passes += 1;
    }
}

/// Handle to the sync worker thread
///
/// Every method is non-blocking except [`SyncHandle::wait_idle`] and
/// [`SyncHandle::shutdown`].
pub struct SyncHandle {
    cmd_tx: mpsc::Sender<Command>,
    control: Arc<SchedulerControl>,
    shared: Arc<SyncShared>,
    store: Arc<dyn FeedStore>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SyncHandle {
    /// Start the worker thread; it idles until the first pass request
    pub fn spawn(orchestrator: SyncOrchestrator) -> Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let control = Arc::new(SchedulerControl::default());
        let shared = Arc::clone(orchestrator.shared());
        let store = Arc::clone(orchestrator.store());

        let worker_control = Arc::clone(&control);
        let worker = thread::Builder::new()
            .name("feed-sync".to_string())
            .spawn(move || worker_loop(orchestrator, cmd_rx, worker_control))
            .context("Failed to spawn sync worker thread")?;

        Ok(Self {
            cmd_tx,
            control,
            shared,
            store,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Ask for a pass; coalesces with any pass already owed
    pub fn request_pass(&self) {
        self.shared.run.clear_halt();
        if !self.control.fresh.swap(true, Ordering::SeqCst) {
            // Worker gone means shutdown already happened
            let _ = self.cmd_tx.send(Command::Wake);
        }
    }

    /// While held, passes append but never reset pagination or evict
    pub fn hold(&self, hold: bool) {
        self.shared.run.set_hold(hold);
    }

    /// Stop the current pass at its next boundary
    pub fn halt(&self) {
        debug!("Soft stop requested");
        self.shared.run.halt();
    }

    /// Refresh feeds and folders on the next pass regardless of the interval
    pub fn force_metadata(&self) {
        self.shared.run.force_metadata();
        self.shared.notify();
    }

    /// Ask for at least `desired` stories of a feed set
    ///
    /// Returns false if the feed set has nothing more to page.
    pub fn request_more(&self, feed_set: &FeedSet, desired: usize) -> bool {
        let result = self.shared.request_more(feed_set, desired);
        if result == super::RequestMore::Enqueued {
            self.request_pass();
        }
        result.accepted()
    }

    pub fn reset_feed_set(&self, feed_set: &FeedSet) {
        self.shared.reset_feed_set(feed_set);
    }

    pub fn set_reading_prefs(&self, feed_set: &FeedSet, order: StoryOrder, filter: ReadFilter) -> bool {
        self.shared.set_reading_prefs(feed_set, order, filter)
    }

    pub fn status(&self) -> SyncStatus {
        self.shared.status()
    }

    pub fn status_message(&self) -> Option<String> {
        self.shared.status().message()
    }

    pub fn is_feed_set_syncing(&self, feed_set: &FeedSet) -> bool {
        self.shared.is_feed_set_syncing(feed_set)
    }

    /// Whether any phase is running right now
    pub fn is_running(&self) -> bool {
        self.shared.run.any_running()
    }

    pub fn add_listener(&self, listener: Arc<dyn StatusListener>) {
        self.shared.add_listener(listener);
    }

    pub fn shared(&self) -> &Arc<SyncShared> {
        &self.shared
    }

    /// Passes run since the worker started
    pub fn passes_completed(&self) -> usize {
        self.control.lock().passes
    }

    /// Block until no pass is running or owed; false on timeout
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let guard = self.control.lock();
        let (_guard, result) = self
            .control
            .idle
            .wait_timeout_while(guard, timeout, |state| {
                state.active || self.control.fresh.load(Ordering::SeqCst)
            })
            .unwrap_or_else(PoisonError::into_inner);
        !result.timed_out()
    }

    /// Halt, stop the worker, wait for it and close the store
    pub fn shutdown(&self) -> Result<()> {
        self.halt();
        let _ = self.cmd_tx.send(Command::Shutdown);

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                warn!("Sync worker panicked");
            }
            self.store.close().context("Failed to close feed store")?;
            info!("Sync worker shut down");
        }
        Ok(())
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        // Let the worker wind down on its own; joining here could deadlock
        // if the last handle is dropped from a listener callback.
        self.shared.run.halt();
        let _ = self.cmd_tx.send(Command::Shutdown);
    }
}

fn worker_loop(
    orchestrator: SyncOrchestrator,
    cmd_rx: mpsc::Receiver<Command>,
    control: Arc<SchedulerControl>,
) {
    while let Ok(command) = cmd_rx.recv() {
        match command {
            Command::Shutdown => break,
            Command::Wake => {
                control.set_active(true);
                while control.fresh.swap(false, Ordering::SeqCst) {
                    match orchestrator.run_pass() {
                        Ok(stats) => debug!("Pass finished: {:?}", stats),
                        Err(e) => warn!("Sync pass aborted: {}", e),
                    }
                    control.pass_finished();
                }
                control.set_active(false);
            }
        }
    }
    debug!("Sync worker exiting");
}
