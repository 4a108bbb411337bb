//! In-memory object store with list + watch
//!
//! Every mutation bumps the store's resource version by one and queues a
//! [`GenericEvent`] while the state lock is still held, so the dispatcher sees
//! events in version order. A watch request takes its snapshot and registers
//! the new watcher under the same lock: any event the dispatcher later hands
//! to it is either newer than the snapshot, or filtered out by the watcher's
//! baseline check.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use parking_lot::RwLock;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;

use super::GenericEvent;
use super::WatchDispatcher;
use super::Watcher;
use super::WatcherRegistry;
use crate::init_metrics;
use crate::Result;
use crate::Selectors;
use crate::StoreConfig;
use crate::StoreError;
use crate::StoreObject;
use crate::WatchConfig;
use crate::WATCH_ACTIVE_WATCHERS;

struct VersionedObject<O> {
    object: O,
    /// Version of the mutation that last wrote this object
    resource_version: u64,
}

struct StoreState<O> {
    objects: BTreeMap<String, VersionedObject<O>>,
    resource_version: u64,
}

pub struct RamStore<O: StoreObject> {
    /// Resource name, e.g. `addressgroups`; used in logs and metric labels
    resource: String,

    config: WatchConfig,

    state: RwLock<StoreState<O>>,

    watchers: Arc<WatcherRegistry<GenericEvent<O>>>,

    /// Next watcher ID (monotonically increasing)
    next_watcher_id: AtomicU64,

    event_tx: mpsc::UnboundedSender<Arc<GenericEvent<O>>>,

    /// Consumed by `start()`
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<Arc<GenericEvent<O>>>>>,

    shutdown: CancellationToken,
}

impl<O: StoreObject> fmt::Debug for RamStore<O> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("RamStore")
            .field("resource", &self.resource)
            .field("resource_version", &self.resource_version())
            .field("watchers", &self.watchers.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<O: StoreObject> RamStore<O> {
    /// Creates an empty store. Call [`RamStore::start`] to begin serving watches.
    pub fn new(
        resource: impl Into<String>,
        config: StoreConfig,
    ) -> Result<Self> {
        let config = config.validate()?.watch;
        if config.enable_metrics {
            init_metrics();
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Ok(Self {
            resource: resource.into(),
            config,
            state: RwLock::new(StoreState {
                objects: BTreeMap::new(),
                resource_version: 0,
            }),
            watchers: Arc::new(DashMap::new()),
            next_watcher_id: AtomicU64::new(1),
            event_tx,
            event_rx: Mutex::new(Some(event_rx)),
            shutdown: CancellationToken::new(),
        })
    }

    /// Spawns the dispatcher on the current tokio runtime.
    ///
    /// Calling `start()` when the dispatcher is already running is a no-op.
    pub fn start(&self) -> Result<()> {
        let handle = Handle::try_current().map_err(|_| StoreError::NotRunning)?;

        let Some(event_rx) = self.event_rx.lock().take() else {
            return Ok(());
        };

        let dispatcher = WatchDispatcher::new(
            self.resource.clone(),
            Arc::clone(&self.watchers),
            event_rx,
            self.shutdown.clone(),
            &self.config,
        );
        handle.spawn(dispatcher.run());
        Ok(())
    }

    /// Stops the dispatcher and every registered watcher.
    ///
    /// Mutations after `stop()` still update the objects, but their events
    /// are discarded.
    pub fn stop(&self) {
        {
            let _state = self.state.write();
            self.shutdown.cancel();
            // Never started: drop the parked receiver so the queue closes.
            drop(self.event_rx.lock().take());
        }

        let watchers: Vec<_> = self
            .watchers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for watcher in watchers {
            watcher.stop();
        }
        debug!(resource = %self.resource, "Store stopped");
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn resource_version(&self) -> u64 {
        self.state.read().resource_version
    }

    /// Number of registered watchers.
    ///
    /// This is primarily for testing and monitoring purposes.
    pub fn watcher_count(&self) -> usize {
        self.watchers.len()
    }

    pub fn get(
        &self,
        key: &str,
    ) -> Option<(O, u64)> {
        self.state
            .read()
            .objects
            .get(key)
            .map(|v| (v.object.clone(), v.resource_version))
    }

    /// Returns the objects matching `selectors`, ordered by key, and the
    /// store's resource version at the time of the copy.
    pub fn list(
        &self,
        selectors: &Selectors,
    ) -> (Vec<O>, u64) {
        let state = self.state.read();
        let objects = state
            .objects
            .iter()
            .filter(|(key, v)| selectors.matches(key, &v.object))
            .map(|(_, v)| v.object.clone())
            .collect();
        (objects, state.resource_version)
    }

    /// Stores a new object, returning the resource version of the change.
    pub fn create(
        &self,
        object: O,
    ) -> Result<u64> {
        let key = object.key();
        let mut state = self.state.write();
        if state.objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists { key }.into());
        }

        let resource_version = Self::next_version(&mut state);
        state.objects.insert(
            key,
            VersionedObject {
                object: object.clone(),
                resource_version,
            },
        );
        self.enqueue(GenericEvent::added(object, resource_version));
        Ok(resource_version)
    }

    /// Replaces an existing object, returning the resource version of the change.
    pub fn update(
        &self,
        object: O,
    ) -> Result<u64> {
        let key = object.key();
        let mut state = self.state.write();
        if !state.objects.contains_key(&key) {
            return Err(StoreError::NotFound { key }.into());
        }

        let resource_version = Self::next_version(&mut state);
        let prev = state.objects.insert(
            key,
            VersionedObject {
                object: object.clone(),
                resource_version,
            },
        );
        if let Some(prev) = prev {
            self.enqueue(GenericEvent::modified(prev.object, object, resource_version));
        }
        Ok(resource_version)
    }

    /// Removes an object, returning the resource version of the change.
    pub fn delete(
        &self,
        key: &str,
    ) -> Result<u64> {
        let mut state = self.state.write();
        let Some(prev) = state.objects.remove(key) else {
            return Err(StoreError::NotFound { key: key.to_string() }.into());
        };

        let resource_version = Self::next_version(&mut state);
        self.enqueue(GenericEvent::deleted(prev.object, resource_version));
        Ok(resource_version)
    }

    /// Starts a watch: the returned watcher first emits an `Added`
    /// notification for every object currently matching `selectors`, then
    /// every later change matching them, until `ctx` is canceled or the
    /// watcher is stopped.
    pub fn watch(
        &self,
        ctx: CancellationToken,
        selectors: Selectors,
    ) -> Result<Arc<Watcher<GenericEvent<O>>>> {
        let handle = Handle::try_current().map_err(|_| StoreError::NotRunning)?;

        let state = self.state.read();
        if self.shutdown.is_cancelled() {
            return Err(StoreError::NotRunning.into());
        }

        let init_events: Vec<GenericEvent<O>> = state
            .objects
            .iter()
            .filter(|(key, v)| selectors.matches(key, &v.object))
            .map(|(_, v)| GenericEvent::added(v.object.clone(), v.resource_version))
            .collect();
        let resource_version = state.resource_version;

        let id = self.next_watcher_id.fetch_add(1, Ordering::Relaxed);
        let forget = self.forget_fn(id);
        let (watcher, process) = Watcher::new(id, self.config.buffer_size(), selectors, forget);
        self.watchers.insert(id, Arc::clone(&watcher));
        drop(state);

        if self.config.enable_metrics {
            WATCH_ACTIVE_WATCHERS.with_label_values(&[self.resource.as_str()]).inc();
        }
        trace!(
            resource = %self.resource,
            watcher_id = id,
            resource_version,
            init_events = init_events.len(),
            "Watcher registered"
        );

        handle.spawn(process.run(ctx, init_events, resource_version));
        Ok(watcher)
    }

    fn forget_fn(
        &self,
        id: u64,
    ) -> impl FnOnce() + Send + 'static {
        // Weak: the registry owns the watcher, which owns this closure.
        let registry = Arc::downgrade(&self.watchers);
        let resource = self.resource.clone();
        let enable_metrics = self.config.enable_metrics;
        move || {
            if let Some(registry) = registry.upgrade() {
                registry.remove(&id);
            }
            if enable_metrics {
                WATCH_ACTIVE_WATCHERS.with_label_values(&[resource.as_str()]).dec();
            }
            trace!(resource = %resource, watcher_id = id, "Watcher unregistered");
        }
    }

    fn next_version(state: &mut StoreState<O>) -> u64 {
        state.resource_version += 1;
        state.resource_version
    }

    /// Must be called with the state write lock held.
    fn enqueue(
        &self,
        event: GenericEvent<O>,
    ) {
        // Only fails once the store is stopped, when nobody is watching.
        let _ = self.event_tx.send(Arc::new(event));
    }

    #[cfg(test)]
    pub(crate) fn is_event_queue_closed(&self) -> bool {
        self.event_tx.is_closed()
    }
}
