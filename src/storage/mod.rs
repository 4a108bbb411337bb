//! Versioned object storage with list + watch semantics
//!
//! - [`InternalEvent`] is the seam between a store and its watchers: a raw
//!   change record that knows its resource version and how to project itself
//!   through a watcher's [`Selectors`].
//! - [`ram`] holds the in-memory implementation: the per-client watcher, the
//!   fan-out dispatcher and the object store.
mod event;
pub mod ram;
mod selectors;

pub use event::*;
pub use selectors::*;
