//! Per-topic monitor handles.
//!
//! A [`TopicMonitor`] tracks the live subscription of one topic: whether
//! it is being monitored, its latest message, and aggregated rate and
//! bandwidth. Handles are created through a [`MonitorFactory`]; construction
//! fails when the topic's message type cannot be resolved.

mod stats;

pub use stats::{BandwidthStats, RateStats, TopicStats, DEFAULT_WINDOW};

use std::fmt::Debug;
use std::sync::Arc;

use thiserror::Error;

use crate::data::{MessageSchema, MessageValue};

/// Errors raised when constructing a monitor handle.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The topic is not (or no longer) published.
    #[error("topic not published: {0}")]
    UnknownTopic(String),

    /// The topic's message type has no known schema.
    #[error("cannot resolve message type {type_name} of {topic}")]
    UnresolvedType { topic: String, type_name: String },
}

/// Monitor handle for one topic.
///
/// Sampling happens outside the refresh cycle; the accessors only read
/// already-aggregated values and never block.
pub trait TopicMonitor: Send + Debug {
    fn topic_name(&self) -> &str;

    fn is_monitoring(&self) -> bool;

    /// Start monitoring if stopped, stop it otherwise.
    fn toggle_monitoring(&mut self);

    /// Release the underlying subscription.
    fn stop_monitoring(&mut self);

    fn rate(&self) -> Option<RateStats>;

    fn bandwidth(&self) -> Option<BandwidthStats>;

    /// Schema of the topic's message type.
    fn message_class(&self) -> Arc<MessageSchema>;

    fn last_message(&self) -> Option<MessageValue>;
}

/// Creates monitor handles by topic name.
pub trait MonitorFactory: Send + Debug {
    fn create(&self, topic_name: &str) -> Result<Box<dyn TopicMonitor>, MonitorError>;
}
