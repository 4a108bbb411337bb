//! Per-client watcher
//!
//! A [`Watcher`] sits between the store's dispatcher and one client stream.
//! It owns two bounded buffers of the same capacity:
//!
//! - **input**: raw events admitted by the dispatcher, drained by the
//!   watcher's single [`WatcherProcess`] task
//! - **result**: projected notifications waiting to be read by the client
//!
//! Admission never blocks the dispatcher beyond the deadline it supplies, so a
//! slow client only ever loses its own events. The process task suppresses
//! events already covered by the client's snapshot (resource version not newer
//! than the baseline) and notifications the selectors are not interested in.
//!
//! # Shutdown
//!
//! [`Watcher::stop`] runs exactly once: it calls `forget` (removing the
//! watcher from the store registry, so no further admissions are attempted),
//! fires the `done` signal, then closes the input buffer. The result buffer is
//! only ever closed by the process task, as its final action.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing::trace;

use crate::InternalEvent;
use crate::Selectors;
use crate::WatchEvent;

/// Callback removing a watcher from its owner's registry
pub type ForgetFn = Box<dyn FnOnce() + Send + 'static>;

/// Notification type produced by a watcher over events `E`
pub type WatchEventOf<E> = WatchEvent<<E as InternalEvent>::Object>;

/// Why a non-blocking admission failed
enum Rejected<E> {
    /// Input buffer at capacity; the event is handed back for a bounded wait
    Full(Arc<E>),
    /// Watcher stopped or its process task gone
    Closed,
}

pub struct Watcher<E: InternalEvent> {
    id: u64,

    /// Sender side of the input buffer; `None` once stopped
    input: ArcSwapOption<mpsc::Sender<Arc<E>>>,

    /// Receiver side of the result buffer until handed to the client
    result: Mutex<Option<mpsc::Receiver<WatchEventOf<E>>>>,

    /// Fired once by `stop`
    done: CancellationToken,

    /// Taken by the first `stop`; the lock also makes concurrent callers wait
    /// for the shutdown sequence to finish
    forget: Mutex<Option<ForgetFn>>,
}

/// The delivery loop of one watcher
///
/// Created together with its [`Watcher`]; [`WatcherProcess::run`] consumes it,
/// so a watcher can never have more than one loop.
pub struct WatcherProcess<E: InternalEvent> {
    id: u64,
    input: mpsc::Receiver<Arc<E>>,
    result: mpsc::Sender<WatchEventOf<E>>,
    done: CancellationToken,
    selectors: Selectors,
}

impl<E: InternalEvent> fmt::Debug for Watcher<E> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("id", &self.id)
            .field("stopped", &self.done.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl<E: InternalEvent> Watcher<E> {
    /// Creates a watcher whose buffers both hold `chan_size` entries.
    ///
    /// The returned process must be driven (usually spawned) by the caller.
    pub fn new(
        id: u64,
        chan_size: NonZeroUsize,
        selectors: Selectors,
        forget: impl FnOnce() + Send + 'static,
    ) -> (Arc<Self>, WatcherProcess<E>) {
        let (input_tx, input_rx) = mpsc::channel(chan_size.get());
        let (result_tx, result_rx) = mpsc::channel(chan_size.get());
        let done = CancellationToken::new();

        let watcher = Arc::new(Self {
            id,
            input: ArcSwapOption::new(Some(Arc::new(input_tx))),
            result: Mutex::new(Some(result_rx)),
            done: done.clone(),
            forget: Mutex::new(Some(Box::new(forget))),
        });

        let process = WatcherProcess {
            id,
            input: input_rx,
            result: result_tx,
            done,
            selectors,
        };

        (watcher, process)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_stopped(&self) -> bool {
        self.done.is_cancelled()
    }

    /// Tries to admit `event` into the input buffer without blocking.
    ///
    /// Returns false if the buffer is full or the watcher is closed.
    pub fn non_blocking_add(
        &self,
        event: Arc<E>,
    ) -> bool {
        self.try_add(event).is_ok()
    }

    /// Admits `event`, first without blocking, then by waiting for room until
    /// `deadline` if one is supplied.
    ///
    /// The non-blocking attempt always comes first, even when the deadline has
    /// already passed: a dispatcher sharing one deadline across many watchers
    /// still gives every watcher with room an immediate chance. A closed
    /// watcher is rejected at once.
    pub async fn add(
        &self,
        event: Arc<E>,
        deadline: Option<Instant>,
    ) -> bool {
        let event = match self.try_add(event) {
            Ok(()) => return true,
            Err(Rejected::Closed) => return false,
            Err(Rejected::Full(event)) => event,
        };

        let Some(deadline) = deadline else {
            return false;
        };
        let Some(input) = self.input.load_full() else {
            return false;
        };

        trace!(watcher_id = self.id, "Input buffer full, waiting for room");

        tokio::select! {
            biased;
            _ = self.done.cancelled() => false,
            res = input.send(event) => res.is_ok(),
            _ = tokio::time::sleep_until(deadline) => false,
        }
    }

    /// True once the watcher can never admit another event: it was stopped,
    /// or its process task has exited and dropped the input buffer.
    pub fn is_closed(&self) -> bool {
        if self.done.is_cancelled() {
            return true;
        }
        match &*self.input.load() {
            Some(input) => input.is_closed(),
            None => true,
        }
    }

    fn try_add(
        &self,
        event: Arc<E>,
    ) -> std::result::Result<(), Rejected<E>> {
        if self.done.is_cancelled() {
            return Err(Rejected::Closed);
        }
        let guard = self.input.load();
        let Some(input) = &*guard else {
            return Err(Rejected::Closed);
        };
        input.try_send(event).map_err(|e| match e {
            TrySendError::Full(event) => Rejected::Full(event),
            TrySendError::Closed(_) => Rejected::Closed,
        })
    }

    /// Hands out the receiver of outgoing notifications.
    ///
    /// Only the first call returns `Some`. The channel ends once the watcher
    /// is stopped or its lifetime token is canceled.
    pub fn result_chan(&self) -> Option<mpsc::Receiver<WatchEventOf<E>>> {
        self.result.lock().take()
    }

    /// Same as [`Watcher::result_chan`], as a `Stream`.
    pub fn result_stream(&self) -> Option<ReceiverStream<WatchEventOf<E>>> {
        self.result_chan().map(ReceiverStream::new)
    }

    /// Stops this watcher.
    ///
    /// Idempotent and thread safe: it may be called concurrently by the client
    /// handler and by the dispatcher terminating a slow watcher.
    pub fn stop(&self) {
        let mut forget = self.forget.lock();
        let Some(forget_fn) = forget.take() else {
            return;
        };

        forget_fn();
        self.done.cancel();
        // Removed from the registry by `forget`, so nothing admits into the
        // input buffer any more and it is safe to close it.
        self.input.store(None);

        trace!(watcher_id = self.id, "Watcher stopped");
    }
}

impl<E: InternalEvent> WatcherProcess<E> {
    /// Sends `init_events` first, then every admitted event newer than
    /// `resource_version`, until the input buffer is closed or `ctx` is
    /// canceled. Closes the result buffer on return.
    pub async fn run(
        mut self,
        ctx: CancellationToken,
        init_events: Vec<E>,
        resource_version: u64,
    ) {
        for event in &init_events {
            self.send_watch_event(&ctx, event).await;
        }
        drop(init_events);

        loop {
            tokio::select! {
                biased;
                _ = ctx.cancelled() => {
                    info!(watcher_id = self.id, "The context had been canceled, stopping process");
                    break;
                }
                event = self.input.recv() => match event {
                    Some(event) => {
                        if event.resource_version() > resource_version {
                            self.send_watch_event(&ctx, &event).await;
                        }
                    }
                    None => {
                        info!(watcher_id = self.id, "The input channel had been closed, stopping process");
                        break;
                    }
                },
            }
        }

        drop(self.result);
    }

    /// Projects `event` through the selectors and places the notification on
    /// the result buffer, unless the watcher is done first.
    async fn send_watch_event(
        &self,
        ctx: &CancellationToken,
        event: &E,
    ) {
        let Some(watch_event) = event.to_watch_event(&self.selectors) else {
            // Watcher is not interested in that object.
            return;
        };

        if self.done.is_cancelled() {
            return;
        }

        let permit = tokio::select! {
            biased;
            _ = self.done.cancelled() => return,
            _ = ctx.cancelled() => return,
            permit = self.result.reserve() => match permit {
                Ok(permit) => permit,
                // Client dropped its receiver.
                Err(_) => return,
            },
        };

        if self.done.is_cancelled() {
            return;
        }
        permit.send(watch_event);
    }
}
