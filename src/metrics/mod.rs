use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{IntCounterVec, IntGaugeVec, Opts, Registry};

lazy_static! {
    pub static ref WATCH_EVENTS_DISPATCHED: IntCounterVec = IntCounterVec::new(
        Opts::new("watch_events_dispatched", "events fanned out to registered watchers"),
        &["resource"]
    )
    .expect("Should succeed to create metric");

    pub static ref WATCH_ADMISSION_REJECTED: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "watch_admission_rejected",
            "best-effort admissions rejected because a watcher input buffer was full"
        ),
        &["resource"]
    )
    .expect("Should succeed to create metric");

    pub static ref WATCH_WATCHERS_TERMINATED: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "watch_watchers_terminated",
            "watchers stopped by the dispatcher because they could not keep up"
        ),
        &["resource"]
    )
    .expect("Should succeed to create metric");

    pub static ref WATCH_ACTIVE_WATCHERS: IntGaugeVec = IntGaugeVec::new(
        Opts::new("watch_active_watchers", "watchers currently registered"),
        &["resource"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

/// Registers every watch collector on `registry`.
pub fn register_custom_metrics(registry: &Registry) {
    registry
        .register(Box::new(WATCH_EVENTS_DISPATCHED.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(WATCH_ADMISSION_REJECTED.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(WATCH_WATCHERS_TERMINATED.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(WATCH_ACTIVE_WATCHERS.clone()))
        .expect("collector can be registered");
}

static REGISTER_ONCE: Once = Once::new();

/// Registers the collectors on the crate [`REGISTRY`]; later calls are no-ops.
pub fn init_metrics() {
    REGISTER_ONCE.call_once(|| register_custom_metrics(&REGISTRY));
}

/// Export the crate registry in the prometheus text format
pub fn get_metrics_body() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::error!("could not encode custom metrics: {}", e);
    };
    match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!("custom metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    }
}
