use super::Selectors;

/// Kind of change a client-facing notification describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchEventType {
    /// Object entered the watcher's view: created, or updated into matching
    Added,
    /// Object stayed in the watcher's view and changed
    Modified,
    /// Object left the watcher's view: deleted, or updated out of matching
    Deleted,
}

/// Client-facing notification produced by projecting a raw event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent<O> {
    pub event_type: WatchEventType,
    pub object: O,
    /// Resource version of the mutation that produced this notification
    pub resource_version: u64,
}

/// Raw change record produced by a store, before per-watcher filtering.
///
/// Implementations are shared by every watcher a mutation is fanned out to,
/// so projection must not mutate the event.
pub trait InternalEvent: Send + Sync + 'static {
    type Object: Clone + Send + Sync + 'static;

    /// Position of this change in the store's mutation history
    fn resource_version(&self) -> u64;

    /// Projects the event through a watcher's selectors.
    ///
    /// Returns `None` when the watcher is not interested in the change.
    fn to_watch_event(
        &self,
        selectors: &Selectors,
    ) -> Option<WatchEvent<Self::Object>>;
}
