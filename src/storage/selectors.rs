use std::collections::BTreeMap;
use std::fmt::Debug;

static NO_LABELS: BTreeMap<String, String> = BTreeMap::new();

/// Object kept by a [`crate::RamStore`]
pub trait StoreObject: Clone + Debug + Send + Sync + 'static {
    /// Unique key of the object within its store, e.g. `namespace/name`
    fn key(&self) -> String;

    /// Labels used by [`LabelSelector`]; objects without labels match only
    /// the empty selector.
    fn labels(&self) -> &BTreeMap<String, String> {
        &NO_LABELS
    }
}

/// Equality-based label selector. The empty selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    match_labels: BTreeMap<String, String>,
}

impl LabelSelector {
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn with_label(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.match_labels.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.match_labels.is_empty()
    }

    pub fn matches(
        &self,
        labels: &BTreeMap<String, String>,
    ) -> bool {
        self.match_labels
            .iter()
            .all(|(k, v)| labels.get(k).is_some_and(|actual| actual == v))
    }
}

/// A watcher's conditions to select objects
///
/// Immutable for a watcher's lifetime; passed unchanged to every
/// [`crate::InternalEvent::to_watch_event`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selectors {
    /// Exact object key; `None` selects every key
    pub key: Option<String>,
    pub label: LabelSelector,
}

impl Selectors {
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn for_key(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            label: LabelSelector::everything(),
        }
    }

    pub fn with_label_selector(label: LabelSelector) -> Self {
        Self { key: None, label }
    }

    pub fn matches<O: StoreObject>(
        &self,
        key: &str,
        object: &O,
    ) -> bool {
        if let Some(wanted) = &self.key {
            if wanted != key {
                return false;
            }
        }
        self.label.matches(object.labels())
    }
}
