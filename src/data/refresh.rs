//! The timer-driven refresh cycle.
//!
//! [`TopicPanel`] ties the topic source, the monitor handles and the display
//! tree together. Each [`TopicPanel::tick`] runs one complete, synchronous
//! pass: poll the source, reconcile handles, rebuild the tree if the topic
//! set changed and push fresh values. Column widths belong to the view.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::format::{format_bandwidth, format_rate, NOT_MONITORED};
use super::registry::{PublishedTopic, TopicRegistry};
use super::schema::TypeResolver;
use super::tree::{NodeId, TopicTree};
use crate::monitor::{MonitorFactory, TopicMonitor};
use crate::source::TopicSource;

/// Default refresh period.
pub const DEFAULT_REFRESH: Duration = Duration::from_secs(1);

/// Periodic timer driving the refresh cycle.
///
/// A late poll fires once and re-arms one period later; missed periods are
/// not queued.
#[derive(Debug, Clone)]
pub struct RefreshTimer {
    period: Duration,
    next_due: Option<Instant>,
}

impl RefreshTimer {
    /// Create a timer that is due immediately.
    pub fn new(period: Duration, now: Instant) -> Self {
        Self {
            period,
            next_due: Some(now),
        }
    }

    /// Returns true (and re-arms) if the timer is due at `now`.
    pub fn poll_due(&mut self, now: Instant) -> bool {
        match self.next_due {
            Some(due) if now >= due => {
                self.next_due = Some(now + self.period);
                true
            }
            _ => false,
        }
    }

    /// Stop the timer for good.
    pub fn cancel(&mut self) {
        self.next_due = None;
    }

    pub fn is_active(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

/// State of the refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Refreshing,
    ShutDown,
}

/// Actions offered by the context menu of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextAction {
    /// Toggle monitoring of the node's topic.
    ToggleMonitoring,
    ExpandAllChildren,
    CollapseAllChildren,
}

impl ContextAction {
    pub const ALL: [ContextAction; 3] = [
        ContextAction::ToggleMonitoring,
        ContextAction::ExpandAllChildren,
        ContextAction::CollapseAllChildren,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ContextAction::ToggleMonitoring => "Toggle Monitoring",
            ContextAction::ExpandAllChildren => "Expand All Children",
            ContextAction::CollapseAllChildren => "Collapse All Children",
        }
    }
}

/// Options for a [`TopicPanel`].
#[derive(Debug, Clone)]
pub struct PanelOptions {
    pub refresh_interval: Duration,
}

impl Default for PanelOptions {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH,
        }
    }
}

/// Topic monitor panel state.
pub struct TopicPanel {
    source: Box<dyn TopicSource>,
    factory: Box<dyn MonitorFactory>,
    resolver: Arc<dyn TypeResolver + Send + Sync>,
    registry: TopicRegistry,
    tree: TopicTree,
    timer: RefreshTimer,
    state: CycleState,
    ticks: u64,
}

impl TopicPanel {
    /// Create a panel. The first tick is due immediately.
    pub fn new(
        source: Box<dyn TopicSource>,
        factory: Box<dyn MonitorFactory>,
        resolver: Arc<dyn TypeResolver + Send + Sync>,
        options: PanelOptions,
    ) -> Self {
        Self {
            source,
            factory,
            resolver,
            registry: TopicRegistry::new(),
            tree: TopicTree::new(),
            timer: RefreshTimer::new(options.refresh_interval, Instant::now()),
            state: CycleState::Idle,
            ticks: 0,
        }
    }

    /// Run a tick if the timer is due at `now`.
    pub fn poll_timer(&mut self, now: Instant) -> bool {
        if self.timer.poll_due(now) {
            self.tick()
        } else {
            false
        }
    }

    /// Run one refresh pass. Returns false once the panel is shut down.
    pub fn tick(&mut self) -> bool {
        if self.state == CycleState::ShutDown {
            return false;
        }
        self.state = CycleState::Refreshing;

        let snapshot = self.source.published_topics();
        let outcome = self.registry.reconcile(snapshot, self.factory.as_ref());
        if outcome.changed {
            self.rebuild();
        }
        self.refresh_values();

        self.ticks += 1;
        self.state = CycleState::Idle;
        true
    }

    /// Rebuild the tree for every topic that has a handle.
    fn rebuild(&mut self) {
        let expanded = self.tree.expanded_keys();
        self.tree.clear();

        let topics: Vec<PublishedTopic> = self.registry.snapshot().iter().cloned().collect();
        for topic in topics {
            let Some(handle) = self.registry.get(&topic.name) else {
                continue;
            };
            if self.tree.find_topic(&topic.name).is_some() {
                continue;
            }
            let schema = handle.message_class();
            let sample = handle.last_message();
            self.tree.build_topic(
                &topic.name,
                &topic.type_name,
                &schema,
                sample.as_ref(),
                self.resolver.as_ref(),
            );
        }

        self.tree.restore_expanded(&expanded);
        debug!("Rebuilt tree: {} topics, {} nodes", self.tree.roots().len(), self.tree.len());
    }

    /// Push rate, bandwidth and field values of every handle into the tree.
    fn refresh_values(&mut self) {
        for (name, handle) in self.registry.handles() {
            if handle.is_monitoring() {
                let rate = format_rate(handle.rate().map(|r| r.rate));
                let bandwidth = format_bandwidth(handle.bandwidth().map(|b| b.bytes_per_sec));
                if let Some(message) = handle.last_message() {
                    self.tree.update_value(name, name, &message, self.resolver.as_ref());
                }
                self.tree.set_topic_columns(name, rate, bandwidth, String::new());
            } else {
                self.tree.set_topic_columns(
                    name,
                    String::new(),
                    String::new(),
                    NOT_MONITORED.to_string(),
                );
            }
        }
    }

    /// Apply a context menu action to `node`.
    pub fn apply_action(&mut self, node: NodeId, action: ContextAction) {
        if self.state == CycleState::ShutDown {
            return;
        }
        match action {
            ContextAction::ToggleMonitoring => {
                let Some(topic) = self.topic_of(node).map(str::to_string) else {
                    return;
                };
                if let Some(monitoring) = self.registry.toggle_monitoring(&topic) {
                    info!("Monitoring {} for {}", if monitoring { "on" } else { "off" }, topic);
                    self.refresh_values();
                }
            }
            ContextAction::ExpandAllChildren => self.tree.set_expanded_recursive(node, true),
            ContextAction::CollapseAllChildren => self.tree.set_expanded_recursive(node, false),
        }
    }

    /// Expand or collapse a single node.
    pub fn toggle_expanded(&mut self, node: NodeId) {
        self.tree.toggle_expanded(node);
    }

    pub fn set_expanded(&mut self, node: NodeId, expanded: bool) {
        self.tree.set_expanded(node, expanded);
    }

    /// Topic name of the root above `node`.
    pub fn topic_of(&self, node: NodeId) -> Option<&str> {
        let root = self.tree.root_of(node)?;
        self.tree.node(root).map(|n| n.path.as_str())
    }

    /// Cancel the timer, then stop every live handle. Returns the number of
    /// handles stopped; later calls stop nothing.
    pub fn shutdown(&mut self) -> usize {
        if self.state == CycleState::ShutDown {
            return 0;
        }
        self.timer.cancel();
        self.state = CycleState::ShutDown;
        let stopped = self.registry.shutdown();
        info!("Topic panel shut down, {} monitors stopped", stopped);
        stopped
    }

    pub fn tree(&self) -> &TopicTree {
        &self.tree
    }

    pub fn registry(&self) -> &TopicRegistry {
        &self.registry
    }

    pub fn monitor(&self, topic: &str) -> Option<&dyn TopicMonitor> {
        self.registry.get(topic)
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn timer(&self) -> &RefreshTimer {
        &self.timer
    }

    /// Number of completed ticks.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn source_description(&self) -> &str {
        self.source.description()
    }

    pub fn source_error(&self) -> Option<String> {
        self.source.error()
    }
}

impl Drop for TopicPanel {
    fn drop(&mut self) {
        self.shutdown();
    }
}
