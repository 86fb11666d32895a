//! Topic registry reconciliation.
//!
//! Every refresh tick hands the latest published-topic snapshot to
//! [`TopicRegistry::reconcile`]. When nothing changed the call is a single
//! equality check. Otherwise handles for topics still published are carried
//! over, handles for new topics are constructed, and handles for vanished
//! topics are stopped and dropped.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use crate::monitor::{MonitorFactory, TopicMonitor};

/// A published topic and its message type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublishedTopic {
    pub name: String,
    pub type_name: String,
}

/// The published topics at one poll instant, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicSnapshot {
    topics: BTreeSet<PublishedTopic>,
}

impl TopicSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, type_name: impl Into<String>) {
        self.topics.insert(PublishedTopic {
            name: name.into(),
            type_name: type_name.into(),
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &PublishedTopic> {
        self.topics.iter()
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Type of the first entry published under `name`.
    pub fn type_of(&self, name: &str) -> Option<&str> {
        self.topics
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.type_name.as_str())
    }
}

impl<N: Into<String>, T: Into<String>> FromIterator<(N, T)> for TopicSnapshot {
    fn from_iter<I: IntoIterator<Item = (N, T)>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for (name, type_name) in iter {
            snapshot.insert(name, type_name);
        }
        snapshot
    }
}

/// What a reconcile pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Topics that gained a handle.
    pub added: BTreeSet<String>,
    /// Topics whose handle was stopped and dropped.
    pub removed: BTreeSet<String>,
    /// Topics whose handle was carried over.
    pub unchanged: BTreeSet<String>,
    /// Topics whose handle could not be constructed; retried next call.
    pub failed: BTreeSet<String>,
    /// True when the display tree must be rebuilt.
    pub changed: bool,
}

/// Topic-name-keyed collection of monitor handles.
///
/// Holds exactly one handle per currently published topic whose handle
/// could be constructed.
#[derive(Debug, Default)]
pub struct TopicRegistry {
    current: TopicSnapshot,
    handles: BTreeMap<String, Box<dyn TopicMonitor>>,
    pending: BTreeSet<String>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring the handle set in line with `snapshot`.
    pub fn reconcile(
        &mut self,
        snapshot: TopicSnapshot,
        factory: &dyn MonitorFactory,
    ) -> ReconcileOutcome {
        if snapshot == self.current {
            if self.pending.is_empty() {
                return ReconcileOutcome::default();
            }
            return self.retry_pending(factory);
        }

        let mut outcome = ReconcileOutcome {
            changed: true,
            ..Default::default()
        };
        let mut next: BTreeMap<String, Box<dyn TopicMonitor>> = BTreeMap::new();
        self.pending.clear();

        for topic in snapshot.iter() {
            if next.contains_key(&topic.name) || outcome.failed.contains(&topic.name) {
                continue;
            }
            if let Some(handle) = self.handles.remove(&topic.name) {
                next.insert(topic.name.clone(), handle);
                outcome.unchanged.insert(topic.name.clone());
                continue;
            }
            match factory.create(&topic.name) {
                Ok(handle) => {
                    next.insert(topic.name.clone(), handle);
                    outcome.added.insert(topic.name.clone());
                }
                Err(e) => {
                    debug!("No monitor for {}: {}", topic.name, e);
                    self.pending.insert(topic.name.clone());
                    outcome.failed.insert(topic.name.clone());
                }
            }
        }

        for (name, mut handle) in std::mem::take(&mut self.handles) {
            handle.stop_monitoring();
            outcome.removed.insert(name);
        }

        self.handles = next;
        self.current = snapshot;

        info!(
            "Topics reconciled: {} added, {} removed, {} kept, {} pending",
            outcome.added.len(),
            outcome.removed.len(),
            outcome.unchanged.len(),
            outcome.failed.len()
        );
        outcome
    }

    /// Retry construction for topics that failed earlier without touching
    /// any live handle.
    fn retry_pending(&mut self, factory: &dyn MonitorFactory) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();
        for name in std::mem::take(&mut self.pending) {
            match factory.create(&name) {
                Ok(handle) => {
                    self.handles.insert(name.clone(), handle);
                    outcome.added.insert(name);
                }
                Err(_) => {
                    self.pending.insert(name.clone());
                    outcome.failed.insert(name);
                }
            }
        }
        outcome.unchanged = self
            .handles
            .keys()
            .filter(|name| !outcome.added.contains(*name))
            .cloned()
            .collect();
        outcome.changed = !outcome.added.is_empty();
        outcome
    }

    /// The snapshot the handles were last reconciled against.
    pub fn snapshot(&self) -> &TopicSnapshot {
        &self.current
    }

    pub fn get(&self, name: &str) -> Option<&dyn TopicMonitor> {
        self.handles.get(name).map(|h| h.as_ref())
    }

    /// Toggle monitoring of `name`. Returns the new state, or `None` if no
    /// handle exists.
    pub fn toggle_monitoring(&mut self, name: &str) -> Option<bool> {
        let handle = self.handles.get_mut(name)?;
        handle.toggle_monitoring();
        Some(handle.is_monitoring())
    }

    pub fn handles(&self) -> impl Iterator<Item = (&str, &dyn TopicMonitor)> {
        self.handles.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handles.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Stop and drop every handle. Returns how many were stopped.
    pub fn shutdown(&mut self) -> usize {
        let handles = std::mem::take(&mut self.handles);
        let count = handles.len();
        for (_, mut handle) in handles {
            handle.stop_monitoring();
        }
        self.current = TopicSnapshot::default();
        self.pending.clear();
        count
    }
}
