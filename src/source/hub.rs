//! In-process view of the bus.
//!
//! The hub keeps the advertised topics and their types, and fans published
//! messages out to the stats taps of monitored topics. Taps belong to their
//! monitor, not to the advertisement: a topic that is unadvertised or
//! expires and comes back keeps feeding the same taps. The hub is both the
//! [`TopicSource`] and the [`MonitorFactory`] of a live session.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{BusEvent, TopicSource};
use crate::data::{MessageSchema, MessageValue, TopicSnapshot, TypeRegistry, TypeResolver};
use crate::monitor::{
    BandwidthStats, MonitorError, MonitorFactory, RateStats, TopicMonitor, TopicStats,
    DEFAULT_WINDOW,
};

/// Hub behaviour knobs.
#[derive(Debug, Clone)]
pub struct HubOptions {
    /// Arrivals kept per monitored topic.
    pub window: usize,
    /// Drop topics that have been silent for longer than this.
    pub topic_ttl: Option<Duration>,
    /// Start monitoring as soon as a handle is created.
    pub monitor_on_start: bool,
}

impl Default for HubOptions {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            topic_ttl: None,
            monitor_on_start: false,
        }
    }
}

type Tap = Arc<Mutex<TopicStats>>;

#[derive(Debug)]
struct HubTopic {
    type_name: String,
    last_seen: Instant,
}

#[derive(Debug)]
struct HubState {
    topics: BTreeMap<String, HubTopic>,
    taps: HashMap<String, HashMap<u64, Tap>>,
    next_tap: u64,
    error: Option<String>,
    received: u64,
}

/// Shared registry of bus topics. Clones share state.
#[derive(Debug, Clone)]
pub struct BusHub {
    state: Arc<Mutex<HubState>>,
    types: Arc<TypeRegistry>,
    options: HubOptions,
    description: String,
}

impl BusHub {
    pub fn new(types: Arc<TypeRegistry>, options: HubOptions, description: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(HubState {
                topics: BTreeMap::new(),
                taps: HashMap::new(),
                next_tap: 0,
                error: None,
                received: 0,
            })),
            types,
            options,
            description: description.to_string(),
        }
    }

    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    pub fn apply(&self, event: BusEvent) {
        self.apply_at(event, Instant::now());
    }

    /// Apply one bus event observed at `now`.
    pub fn apply_at(&self, event: BusEvent, now: Instant) {
        let mut state = self.state.lock();
        match event {
            BusEvent::Advertise { topic, type_name } => {
                advertise(&mut state.topics, topic, type_name, now);
            }
            BusEvent::Unadvertise { topic } => {
                if state.topics.remove(&topic).is_some() {
                    debug!("Topic {} unadvertised", topic);
                }
            }
            BusEvent::Publish {
                topic,
                type_name,
                msg,
            } => {
                state.received += 1;
                let type_name = advertise(&mut state.topics, topic.clone(), type_name, now)
                    .type_name
                    .clone();
                let Some(taps) = state.taps.get(&topic).filter(|taps| !taps.is_empty()) else {
                    return;
                };

                let size = msg.to_string().len();
                let decoded = match self.types.decode(&type_name, &msg) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        warn!("Cannot decode message on {}: {}", topic, e);
                        None
                    }
                };
                for tap in taps.values() {
                    tap.lock().record(now, size, decoded.clone());
                }
                if decoded.is_none() {
                    state.error = Some(format!("Decode error on {}", topic));
                }
            }
        }
    }

    /// Record an ingestion error, or clear it with `None`.
    pub fn set_error(&self, error: Option<String>) {
        self.state.lock().error = error;
    }

    /// Total messages published through the hub.
    pub fn received(&self) -> u64 {
        self.state.lock().received
    }

    /// Published topics at `now`, dropping those past their TTL.
    pub fn snapshot_at(&self, now: Instant) -> TopicSnapshot {
        let mut state = self.state.lock();
        if let Some(ttl) = self.options.topic_ttl {
            state.topics.retain(|name, topic| {
                let alive = now.saturating_duration_since(topic.last_seen) <= ttl;
                if !alive {
                    debug!("Topic {} expired", name);
                }
                alive
            });
        }
        state
            .topics
            .iter()
            .map(|(name, topic)| (name.as_str(), topic.type_name.as_str()))
            .collect()
    }

    /// Register a fresh stats tap on `topic`.
    fn attach(&self, topic: &str) -> (u64, Tap) {
        let mut state = self.state.lock();
        let id = state.next_tap;
        state.next_tap += 1;
        let tap = Arc::new(Mutex::new(TopicStats::new(self.options.window)));
        state
            .taps
            .entry(topic.to_string())
            .or_default()
            .insert(id, tap.clone());
        (id, tap)
    }

    fn detach(&self, topic: &str, id: u64) {
        let mut state = self.state.lock();
        if let Some(taps) = state.taps.get_mut(topic) {
            taps.remove(&id);
            if taps.is_empty() {
                state.taps.remove(topic);
            }
        }
    }

    #[cfg(test)]
    fn tap_count(&self, topic: &str) -> usize {
        self.state.lock().taps.get(topic).map_or(0, HashMap::len)
    }
}

fn advertise(
    topics: &mut BTreeMap<String, HubTopic>,
    topic: String,
    type_name: String,
    now: Instant,
) -> &mut HubTopic {
    let entry = topics.entry(topic).or_insert_with(|| HubTopic {
        type_name: type_name.clone(),
        last_seen: now,
    });
    entry.last_seen = now;
    if entry.type_name != type_name {
        entry.type_name = type_name;
    }
    entry
}

impl TopicSource for BusHub {
    fn published_topics(&mut self) -> TopicSnapshot {
        self.snapshot_at(Instant::now())
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<String> {
        self.state.lock().error.clone()
    }
}

impl MonitorFactory for BusHub {
    fn create(&self, topic_name: &str) -> Result<Box<dyn TopicMonitor>, MonitorError> {
        let type_name = self
            .state
            .lock()
            .topics
            .get(topic_name)
            .map(|t| t.type_name.clone())
            .ok_or_else(|| MonitorError::UnknownTopic(topic_name.to_string()))?;

        let schema = self
            .types
            .schema(&type_name)
            .ok_or_else(|| MonitorError::UnresolvedType {
                topic: topic_name.to_string(),
                type_name: type_name.clone(),
            })?;

        let mut monitor = HubMonitor {
            hub: self.clone(),
            topic: topic_name.to_string(),
            schema,
            tap: None,
            stats: Arc::new(Mutex::new(TopicStats::new(self.options.window))),
        };
        if self.options.monitor_on_start {
            monitor.start();
        }
        Ok(Box::new(monitor))
    }
}

/// Monitor handle for a hub topic.
///
/// While monitoring, a stats tap on the hub records every published
/// message of the topic.
#[derive(Debug)]
pub struct HubMonitor {
    hub: BusHub,
    topic: String,
    schema: Arc<MessageSchema>,
    tap: Option<u64>,
    stats: Tap,
}

impl HubMonitor {
    fn start(&mut self) {
        if self.tap.is_some() {
            return;
        }
        let (id, stats) = self.hub.attach(&self.topic);
        self.tap = Some(id);
        self.stats = stats;
    }

    fn stop(&mut self) {
        if let Some(id) = self.tap.take() {
            self.hub.detach(&self.topic, id);
        }
    }

    /// Messages received since monitoring last started.
    pub fn received(&self) -> u64 {
        self.stats.lock().received()
    }
}

impl TopicMonitor for HubMonitor {
    fn topic_name(&self) -> &str {
        &self.topic
    }

    fn is_monitoring(&self) -> bool {
        self.tap.is_some()
    }

    fn toggle_monitoring(&mut self) {
        if self.tap.is_some() {
            self.stop();
        } else {
            self.start();
        }
    }

    fn stop_monitoring(&mut self) {
        self.stop();
    }

    fn rate(&self) -> Option<RateStats> {
        self.stats.lock().rate()
    }

    fn bandwidth(&self) -> Option<BandwidthStats> {
        self.stats.lock().bandwidth(Instant::now())
    }

    fn message_class(&self) -> Arc<MessageSchema> {
        self.schema.clone()
    }

    fn last_message(&self) -> Option<MessageValue> {
        self.stats.lock().last_message().cloned()
    }
}

impl Drop for HubMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
