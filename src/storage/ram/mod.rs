//! In-memory store with per-client watchers
//!
//! ```text
//! RamStore::create/update/delete
//!   └─> GenericEvent queued under the state lock (version order)
//!         └─> WatchDispatcher task
//!               ├─> non_blocking_add() on every watcher
//!               └─> add() with one shared deadline for those that were full
//!                     └─> Watcher inbound buffer
//!                           └─> WatcherProcess: version check, projection
//!                                 └─> outbound buffer -> client
//! ```
//!
//! A watcher that still cannot admit an event when the shared deadline
//! passes is stopped; its client observes end-of-stream and must re-list.
mod dispatcher;
mod event;
mod store;
mod watcher;

pub use dispatcher::*;
pub use event::*;
pub use store::*;
pub use watcher::*;
