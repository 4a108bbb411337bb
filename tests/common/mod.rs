use std::collections::BTreeMap;
use std::time::Duration;

use ram_watch::RamStore;
use ram_watch::StoreConfig;
use ram_watch::StoreObject;

pub const WAIT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pod {
    pub namespace: String,
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub node: String,
}

impl Pod {
    pub fn new(
        namespace: &str,
        name: &str,
        node: &str,
    ) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            labels: BTreeMap::new(),
            node: node.to_string(),
        }
    }

    pub fn labelled(
        mut self,
        key: &str,
        value: &str,
    ) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }
}

impl StoreObject for Pod {
    fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }
}

pub fn pod_store(
    resource: &str,
    watcher_buffer_size: usize,
) -> RamStore<Pod> {
    let mut config = StoreConfig::default();
    config.watch.watcher_buffer_size = watcher_buffer_size;
    config.watch.dispatch_timeout_in_ms = 100;
    let store = RamStore::new(resource, config.validate().expect("valid config")).expect("store");
    store.start().expect("inside runtime");
    store
}
