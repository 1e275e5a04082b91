//! Phase flags and cooperative control signals

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One step of a sync pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Metadata,
    Cleanup,
    UnreadHashes,
    UnreadFetch,
    Paging,
    Prefetch,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::Metadata,
        Phase::Cleanup,
        Phase::UnreadHashes,
        Phase::UnreadFetch,
        Phase::Paging,
        Phase::Prefetch,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Phase flags plus the hold, halt and force signals
///
/// Everything here is advisory: the worker polls the signals at phase and
/// batch boundaries, and observers read the flags to build status.
#[derive(Default)]
pub struct RunState {
    phases: [AtomicBool; 6],
    hold: AtomicBool,
    halt: AtomicBool,
    force_metadata: AtomicBool,
    logged_out: AtomicBool,
    last_metadata_sync: Mutex<Option<DateTime<Utc>>>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise a phase flag until the guard drops
    pub fn enter(&self, phase: Phase) -> PhaseGuard<'_> {
        self.phases[phase.index()].store(true, Ordering::SeqCst);
        PhaseGuard { state: self, phase }
    }

    pub fn is_running(&self, phase: Phase) -> bool {
        self.phases[phase.index()].load(Ordering::SeqCst)
    }

    pub fn any_running(&self) -> bool {
        Phase::ALL.iter().any(|&p| self.is_running(p))
    }

    pub fn set_hold(&self, hold: bool) {
        self.hold.store(hold, Ordering::SeqCst);
    }

    pub fn is_held(&self) -> bool {
        self.hold.load(Ordering::SeqCst)
    }

    pub fn halt(&self) {
        self.halt.store(true, Ordering::SeqCst);
    }

    pub fn clear_halt(&self) {
        self.halt.store(false, Ordering::SeqCst);
    }

    pub fn is_halted(&self) -> bool {
        self.halt.load(Ordering::SeqCst)
    }

    pub fn force_metadata(&self) {
        self.force_metadata.store(true, Ordering::SeqCst);
    }

    pub fn is_metadata_forced(&self) -> bool {
        self.force_metadata.load(Ordering::SeqCst)
    }

    /// Consume the force flag
    pub fn take_force_metadata(&self) -> bool {
        self.force_metadata.swap(false, Ordering::SeqCst)
    }

    pub fn set_logged_out(&self, logged_out: bool) {
        self.logged_out.store(logged_out, Ordering::SeqCst);
    }

    pub fn is_logged_out(&self) -> bool {
        self.logged_out.load(Ordering::SeqCst)
    }

    pub fn last_metadata_sync(&self) -> Option<DateTime<Utc>> {
        *self
            .last_metadata_sync
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_last_metadata_sync(&self, at: DateTime<Utc>) {
        *self
            .last_metadata_sync
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(at);
    }
}

/// Clears its phase flag on drop, including on early return
pub struct PhaseGuard<'a> {
    state: &'a RunState,
    phase: Phase,
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.state.phases[self.phase.index()].store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_guard_clears_flag() {
        let state = RunState::new();
        {
            let _guard = state.enter(Phase::Prefetch);
            assert!(state.is_running(Phase::Prefetch));
            assert!(state.any_running());
        }
        assert!(!state.is_running(Phase::Prefetch));
        assert!(!state.any_running());
    }

    #[test]
    fn test_force_metadata_is_consumed() {
        let state = RunState::new();
        state.force_metadata();
        assert!(state.take_force_metadata());
        assert!(!state.take_force_metadata());
    }

    #[test]
    fn test_signals() {
        let state = RunState::new();
        state.set_hold(true);
        state.halt();
        assert!(state.is_held());
        assert!(state.is_halted());
        state.clear_halt();
        assert!(!state.is_halted());
        assert!(state.last_metadata_sync().is_none());
    }
}
