//! Fan-out of store events to registered watchers
//!
//! One dispatcher task runs per [`crate::RamStore`]. Events are dispatched one
//! at a time, in the order the store queued them, which is what keeps every
//! watcher's stream ordered by resource version.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::Watcher;
use crate::InternalEvent;
use crate::WatchConfig;
use crate::WATCH_ADMISSION_REJECTED;
use crate::WATCH_EVENTS_DISPATCHED;
use crate::WATCH_WATCHERS_TERMINATED;

/// Live watchers keyed by watcher id
pub type WatcherRegistry<E> = DashMap<u64, Arc<Watcher<E>>>;

pub struct WatchDispatcher<E: InternalEvent> {
    /// Resource name used in logs and metric labels
    resource: String,

    watchers: Arc<WatcherRegistry<E>>,

    /// Store mutations, in resource version order
    event_rx: mpsc::UnboundedReceiver<Arc<E>>,

    shutdown: CancellationToken,

    /// Shared wait budget for watchers that were full on the first attempt
    timeout: Duration,

    enable_metrics: bool,
}

impl<E: InternalEvent> WatchDispatcher<E> {
    pub fn new(
        resource: impl Into<String>,
        watchers: Arc<WatcherRegistry<E>>,
        event_rx: mpsc::UnboundedReceiver<Arc<E>>,
        shutdown: CancellationToken,
        config: &WatchConfig,
    ) -> Self {
        Self {
            resource: resource.into(),
            watchers,
            event_rx,
            shutdown,
            timeout: config.dispatch_timeout(),
            enable_metrics: config.enable_metrics,
        }
    }

    /// Run the dispatcher until shutdown or until the store's queue closes
    pub async fn run(mut self) {
        info!(resource = %self.resource, "Watch dispatcher started");

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    info!(resource = %self.resource, "Watch dispatcher shutting down");
                    break;
                }
                event = self.event_rx.recv() => match event {
                    Some(event) => self.dispatch_event(event).await,
                    None => {
                        debug!(resource = %self.resource, "Watch event channel closed");
                        break;
                    }
                },
            }
        }

        info!(resource = %self.resource, "Watch dispatcher stopped");
    }

    /// Delivers `event` to every registered watcher.
    ///
    /// Every watcher gets a non-blocking attempt first. Only the ones that
    /// were full then wait, concurrently, for one shared deadline; a watcher
    /// that still cannot take the event is stopped so its client re-lists
    /// instead of silently missing the change.
    pub async fn dispatch_event(
        &self,
        event: Arc<E>,
    ) {
        // Clone the handles out so no registry shard stays locked while
        // waiting or while a watcher's `forget` removes itself.
        let watchers: Vec<Arc<Watcher<E>>> = self
            .watchers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let resource_version = event.resource_version();
        let mut failed = Vec::new();
        for watcher in watchers {
            if watcher.non_blocking_add(Arc::clone(&event)) {
                continue;
            }
            if watcher.is_closed() {
                self.release_closed(&watcher);
                continue;
            }
            failed.push(watcher);
        }

        if self.enable_metrics {
            WATCH_EVENTS_DISPATCHED.with_label_values(&[self.resource.as_str()]).inc();
        }

        if failed.is_empty() {
            trace!(resource = %self.resource, resource_version, "Event dispatched");
            return;
        }

        debug!(
            resource = %self.resource,
            resource_version,
            slow_watchers = failed.len(),
            "Retrying dispatch with a shared deadline"
        );
        if self.enable_metrics {
            WATCH_ADMISSION_REJECTED
                .with_label_values(&[self.resource.as_str()])
                .inc_by(failed.len() as u64);
        }

        let deadline = Instant::now() + self.timeout;
        let results = join_all(
            failed
                .iter()
                .map(|watcher| watcher.add(Arc::clone(&event), Some(deadline))),
        )
        .await;

        for (watcher, admitted) in failed.iter().zip(results) {
            if admitted {
                continue;
            }
            // Client went away during the wait; not a slow consumer.
            if watcher.is_closed() {
                self.release_closed(watcher);
                continue;
            }
            warn!(
                resource = %self.resource,
                watcher_id = watcher.id(),
                resource_version,
                "Watcher could not keep up within {:?}, terminating it",
                self.timeout
            );
            watcher.stop();
            if self.enable_metrics {
                WATCH_WATCHERS_TERMINATED.with_label_values(&[self.resource.as_str()]).inc();
            }
        }
    }

    /// Unregisters a watcher whose client is already gone.
    ///
    /// Its process task exited on the client's lifetime token, or it was
    /// stopped concurrently. Neither is a slow consumer, so nothing is counted.
    fn release_closed(
        &self,
        watcher: &Watcher<E>,
    ) {
        if !watcher.is_stopped() {
            debug!(
                resource = %self.resource,
                watcher_id = watcher.id(),
                "Watcher process has exited, unregistering it"
            );
            watcher.stop();
        }
    }
}
