//! In-memory topic source and monitor factory for tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::data::{MessageSchema, MessageValue, TopicSnapshot};
use crate::monitor::{
    BandwidthStats, MonitorError, MonitorFactory, RateStats, TopicMonitor,
};
use crate::source::TopicSource;

/// Values a fake monitor reports.
#[derive(Debug, Clone, Default)]
pub struct FakeSample {
    pub rate: Option<f64>,
    pub bandwidth: Option<f64>,
    pub message: Option<MessageValue>,
}

#[derive(Debug, Default)]
struct FakeBusState {
    topics: TopicSnapshot,
    polls: usize,
    failing: BTreeSet<String>,
    attempts: Vec<String>,
    stops: Vec<String>,
    samples: HashMap<String, FakeSample>,
    schemas: HashMap<String, Arc<MessageSchema>>,
    monitor_on_create: bool,
}

/// Shared state behind [`FakeSource`], [`FakeFactory`] and [`FakeMonitor`].
#[derive(Debug, Clone, Default)]
pub struct FakeBus {
    state: Arc<Mutex<FakeBusState>>,
}

impl FakeBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(&self) -> FakeSource {
        FakeSource { bus: self.clone() }
    }

    pub fn factory(&self) -> FakeFactory {
        FakeFactory { bus: self.clone() }
    }

    pub fn publish(&self, topics: TopicSnapshot) {
        self.state.lock().topics = topics;
    }

    pub fn fail_on(&self, topic: &str) {
        self.state.lock().failing.insert(topic.to_string());
    }

    pub fn recover(&self, topic: &str) {
        self.state.lock().failing.remove(topic);
    }

    pub fn monitor_on_create(&self, enabled: bool) {
        self.state.lock().monitor_on_create = enabled;
    }

    pub fn set_sample(&self, topic: &str, sample: FakeSample) {
        self.state.lock().samples.insert(topic.to_string(), sample);
    }

    pub fn set_schema(&self, topic: &str, schema: MessageSchema) {
        self.state
            .lock()
            .schemas
            .insert(topic.to_string(), Arc::new(schema));
    }

    pub fn attempts(&self) -> Vec<String> {
        self.state.lock().attempts.clone()
    }

    pub fn stops(&self) -> Vec<String> {
        self.state.lock().stops.clone()
    }

    pub fn polls(&self) -> usize {
        self.state.lock().polls
    }
}

#[derive(Debug)]
pub struct FakeSource {
    bus: FakeBus,
}

impl TopicSource for FakeSource {
    fn published_topics(&mut self) -> TopicSnapshot {
        let mut state = self.bus.state.lock();
        state.polls += 1;
        state.topics.clone()
    }

    fn description(&self) -> &str {
        "fake"
    }

    fn error(&self) -> Option<String> {
        None
    }
}

#[derive(Debug)]
pub struct FakeFactory {
    bus: FakeBus,
}

impl MonitorFactory for FakeFactory {
    fn create(&self, topic_name: &str) -> Result<Box<dyn TopicMonitor>, MonitorError> {
        let mut state = self.bus.state.lock();
        state.attempts.push(topic_name.to_string());
        if state.failing.contains(topic_name) {
            return Err(MonitorError::UnresolvedType {
                topic: topic_name.to_string(),
                type_name: "unknown".to_string(),
            });
        }
        Ok(Box::new(FakeMonitor {
            name: topic_name.to_string(),
            monitoring: state.monitor_on_create,
            bus: self.bus.clone(),
        }))
    }
}

#[derive(Debug)]
pub struct FakeMonitor {
    name: String,
    monitoring: bool,
    bus: FakeBus,
}

impl FakeMonitor {
    fn sample(&self) -> FakeSample {
        self.bus
            .state
            .lock()
            .samples
            .get(&self.name)
            .cloned()
            .unwrap_or_default()
    }
}

impl TopicMonitor for FakeMonitor {
    fn topic_name(&self) -> &str {
        &self.name
    }

    fn is_monitoring(&self) -> bool {
        self.monitoring
    }

    fn toggle_monitoring(&mut self) {
        self.monitoring = !self.monitoring;
    }

    fn stop_monitoring(&mut self) {
        self.monitoring = false;
        self.bus.state.lock().stops.push(self.name.clone());
    }

    fn rate(&self) -> Option<RateStats> {
        self.sample().rate.map(|rate| RateStats {
            rate,
            min_delta: 0.0,
            max_delta: 0.0,
            std_dev: 0.0,
            window: 1,
        })
    }

    fn bandwidth(&self) -> Option<BandwidthStats> {
        self.sample().bandwidth.map(|bytes_per_sec| BandwidthStats {
            bytes_per_sec,
            mean_size: 0.0,
            min_size: 0,
            max_size: 0,
        })
    }

    fn message_class(&self) -> Arc<MessageSchema> {
        self.bus
            .state
            .lock()
            .schemas
            .get(&self.name)
            .cloned()
            .unwrap_or_else(|| {
                Arc::new(MessageSchema {
                    name: "std_msgs/Empty".to_string(),
                    fields: Vec::new(),
                    constants: Vec::new(),
                })
            })
    }

    fn last_message(&self) -> Option<MessageValue> {
        self.sample().message
    }
}
