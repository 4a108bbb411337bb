//! # ram-watch
//!
//! In-memory object store offering Kubernetes-style "list + watch": a client
//! takes a consistent snapshot of a collection together with its resource
//! version, then receives an ordered, gap-free, duplicate-free stream of the
//! later changes it is interested in.
//!
//! ## Key Types
//!
//! - [`RamStore`] - objects, resource version counter and watcher registry
//! - [`Watcher`] - per-client delivery engine: bounded input and result
//!   buffers, one delivery task, idempotent [`Watcher::stop`]
//! - [`WatchDispatcher`] - fans every mutation out to the registered watchers
//! - [`InternalEvent`] - raw change record projected through [`Selectors`]
//!
//! ## Backpressure
//!
//! A slow client never blocks delivery to the others. Each event is offered
//! to every watcher without blocking first; the watchers that were full then
//! share one bounded wait. A watcher that misses that deadline is stopped and
//! its client sees the end of the stream, after which it must re-list.
//!
//! ```ignore
//! let store = RamStore::<MyObject>::new("pods", StoreConfig::new()?)?;
//! store.start()?;
//!
//! let (objects, resource_version) = store.list(&Selectors::everything());
//! let watcher = store.watch(CancellationToken::new(), Selectors::everything())?;
//! let mut events = watcher.result_chan().expect("first call");
//! while let Some(event) = events.recv().await {
//!     println!("{:?} {:?} @{}", event.event_type, event.object, event.resource_version);
//! }
//! watcher.stop();
//! ```

mod config;
mod errors;
mod metrics;
mod storage;

pub use self::config::*;
pub use errors::*;
pub use metrics::*;
pub use storage::ram::*;
pub use storage::*;

#[cfg(test)]
pub mod test_utils;

#[cfg(test)]
mod errors_test;
