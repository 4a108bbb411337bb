use std::collections::BTreeMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::StoreObject;
use crate::WatchEvent;

/// Minimal labelled object keyed by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestObject {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub data: String,
}

impl TestObject {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            labels: BTreeMap::new(),
            data: String::new(),
        }
    }

    pub fn with_label(
        mut self,
        key: &str,
        value: &str,
    ) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_data(
        mut self,
        data: &str,
    ) -> Self {
        self.data = data.to_string();
        self
    }
}

impl StoreObject for TestObject {
    fn key(&self) -> String {
        self.name.clone()
    }

    fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }
}

/// Receives the next notification, panicking if none arrives in time.
/// `None` means the stream ended.
pub async fn recv_within(
    rx: &mut mpsc::Receiver<WatchEvent<TestObject>>,
    duration: Duration,
) -> Option<WatchEvent<TestObject>> {
    timeout(duration, rx.recv())
        .await
        .expect("Timeout waiting for watch event")
}

/// Asserts nothing is readable right now without ending the stream.
pub fn assert_no_pending(rx: &mut mpsc::Receiver<WatchEvent<TestObject>>) {
    match rx.try_recv() {
        Err(mpsc::error::TryRecvError::Empty) => {}
        other => panic!("expected an empty, open result channel, got {:?}", other),
    }
}
