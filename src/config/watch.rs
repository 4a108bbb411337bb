use std::num::NonZeroUsize;
use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

use crate::Error;
use crate::Result;

/// Configuration for per-watcher buffering and dispatch backpressure
///
/// # Configuration Example
///
/// ```toml
/// [watch]
/// watcher_buffer_size = 1000
/// dispatch_timeout_in_ms = 1000
/// enable_metrics = false
/// ```
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WatchConfig {
    /// Capacity of each watcher's inbound and outbound buffer
    ///
    /// Every watcher owns two bounded queues of this size: raw events
    /// waiting to be filtered, and notifications waiting for the consumer.
    /// A watcher whose inbound queue stays full past the dispatch timeout is
    /// terminated and its client must re-list.
    ///
    /// **Default**: 1000
    #[serde(default = "default_watcher_buffer_size")]
    pub watcher_buffer_size: usize,

    /// Shared wait budget (milliseconds) for one event's fan-out
    ///
    /// Watchers that reject the best-effort admission get a bounded-wait
    /// retry, all sharing one deadline of this length.
    ///
    /// **Default**: 1000
    #[serde(default = "default_dispatch_timeout_in_ms")]
    pub dispatch_timeout_in_ms: u64,

    /// Record prometheus metrics for the dispatch path
    ///
    /// **Default**: false
    #[serde(default = "default_enable_watch_metrics")]
    pub enable_metrics: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            watcher_buffer_size: default_watcher_buffer_size(),
            dispatch_timeout_in_ms: default_dispatch_timeout_in_ms(),
            enable_metrics: default_enable_watch_metrics(),
        }
    }
}

impl WatchConfig {
    /// Validates watch configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.watcher_buffer_size == 0 {
            return Err(Error::Config(ConfigError::Message(
                "watch.watcher_buffer_size must be greater than 0".into(),
            )));
        }

        if self.watcher_buffer_size > 100_000 {
            warn!(
                "watch.watcher_buffer_size ({}) is very large. Each watcher preallocates two queues of this size",
                self.watcher_buffer_size
            );
        }

        if self.dispatch_timeout_in_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "watch.dispatch_timeout_in_ms must be greater than 0".into(),
            )));
        }

        Ok(())
    }

    /// Buffer capacity as a non-zero size; falls back to 1 for an unvalidated zero.
    pub fn buffer_size(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.watcher_buffer_size).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_in_ms)
    }
}

const fn default_watcher_buffer_size() -> usize {
    1000
}

const fn default_dispatch_timeout_in_ms() -> u64 {
    1000
}

const fn default_enable_watch_metrics() -> bool {
    false
}
