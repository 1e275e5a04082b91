//! Background sync engine
//!
//! A single worker thread runs passes of the [`SyncOrchestrator`]. The
//! reader talks to it through a [`SyncHandle`]: it requests passes, asks
//! for more stories of a feed set, and holds or halts background work.

mod orchestrator;
mod queue;
mod scheduler;
mod shared;
mod state;
mod status;
mod timing;

pub use orchestrator::{PassStats, SyncError, SyncOrchestrator};
pub use queue::{HashQueue, PageCursor, RequestMore, RequestQueue};
pub use scheduler::SyncHandle;
pub use shared::SyncShared;
pub use state::{Phase, PhaseGuard, RunState};
pub use status::{StatusListener, SyncStatus};
pub use timing::{cooldown_elapsed, seconds_until_due};
