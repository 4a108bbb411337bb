use crate::InternalEvent;
use crate::Selectors;
use crate::StoreObject;
use crate::WatchEvent;
use crate::WatchEventType;

/// Raw change record emitted by [`crate::RamStore`] for every mutation
///
/// Carries both the previous and the current state so each watcher can
/// decide whether the object entered, stayed in, or left its view.
#[derive(Debug, Clone)]
pub struct GenericEvent<O> {
    key: String,
    prev_object: Option<O>,
    cur_object: Option<O>,
    resource_version: u64,
}

impl<O: StoreObject> GenericEvent<O> {
    pub fn added(
        object: O,
        resource_version: u64,
    ) -> Self {
        Self {
            key: object.key(),
            prev_object: None,
            cur_object: Some(object),
            resource_version,
        }
    }

    pub fn modified(
        prev: O,
        cur: O,
        resource_version: u64,
    ) -> Self {
        Self {
            key: cur.key(),
            prev_object: Some(prev),
            cur_object: Some(cur),
            resource_version,
        }
    }

    pub fn deleted(
        prev: O,
        resource_version: u64,
    ) -> Self {
        Self {
            key: prev.key(),
            prev_object: Some(prev),
            cur_object: None,
            resource_version,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl<O: StoreObject> InternalEvent for GenericEvent<O> {
    type Object = O;

    fn resource_version(&self) -> u64 {
        self.resource_version
    }

    fn to_watch_event(
        &self,
        selectors: &Selectors,
    ) -> Option<WatchEvent<O>> {
        let prev = self.prev_object.as_ref().filter(|o| selectors.matches(&self.key, *o));
        let cur = self.cur_object.as_ref().filter(|o| selectors.matches(&self.key, *o));

        let (event_type, object) = match (prev, cur) {
            (None, None) => return None,
            (None, Some(cur)) => (WatchEventType::Added, cur),
            (Some(_), Some(cur)) => (WatchEventType::Modified, cur),
            (Some(prev), None) => (WatchEventType::Deleted, prev),
        };

        Some(WatchEvent {
            event_type,
            object: object.clone(),
            resource_version: self.resource_version,
        })
    }
}
