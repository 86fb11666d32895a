//! Topic sources: where the list of published topics comes from.
//!
//! A [`TopicSource`] is polled once per refresh tick for the topics that
//! are currently published. The live implementation is a [`BusHub`] fed
//! with newline-delimited JSON [`BusEvent`]s by a [`StreamSource`], either
//! from a TCP connection or from a capture file.

mod hub;
mod stream;

pub use hub::{BusHub, HubMonitor, HubOptions};
pub use stream::StreamSource;

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::data::TopicSnapshot;

/// Trait for polling the set of published topics.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use topicwatch::{BusHub, HubOptions, TopicSource, TypeRegistry};
///
/// let mut hub = BusHub::new(Arc::new(TypeRegistry::new()), HubOptions::default(), "demo");
/// assert!(hub.published_topics().is_empty());
/// ```
pub trait TopicSource: Send + Debug {
    /// Current `(name, type)` pairs. Must not block.
    fn published_topics(&mut self) -> TopicSnapshot;

    /// Returns a human-readable description of the source.
    ///
    /// Used for display in the TUI header.
    fn description(&self) -> &str;

    /// Last error reported by the source, if any.
    fn error(&self) -> Option<String>;
}

/// One line of the bus wire format.
///
/// ```text
/// {"op":"advertise","topic":"/chatter","type":"std_msgs/String"}
/// {"op":"publish","topic":"/chatter","type":"std_msgs/String","msg":{"data":"hi"}}
/// {"op":"unadvertise","topic":"/chatter"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BusEvent {
    Advertise {
        topic: String,
        #[serde(rename = "type")]
        type_name: String,
    },
    Unadvertise {
        topic: String,
    },
    /// A message; also advertises the topic.
    Publish {
        topic: String,
        #[serde(rename = "type")]
        type_name: String,
        msg: serde_json::Value,
    },
}

impl BusEvent {
    pub fn topic(&self) -> &str {
        match self {
            BusEvent::Advertise { topic, .. }
            | BusEvent::Unadvertise { topic }
            | BusEvent::Publish { topic, .. } => topic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_ops() {
        let advertise: BusEvent =
            serde_json::from_str(r#"{"op":"advertise","topic":"/a","type":"std_msgs/String"}"#)
                .unwrap();
        assert_eq!(
            advertise,
            BusEvent::Advertise {
                topic: "/a".to_string(),
                type_name: "std_msgs/String".to_string(),
            }
        );

        let gone: BusEvent = serde_json::from_str(r#"{"op":"unadvertise","topic":"/a"}"#).unwrap();
        assert_eq!(gone.topic(), "/a");

        let publish: BusEvent = serde_json::from_str(
            r#"{"op":"publish","topic":"/a","type":"std_msgs/String","msg":{"data":"hi"}}"#,
        )
        .unwrap();
        match publish {
            BusEvent::Publish { msg, .. } => assert_eq!(msg["data"], "hi"),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn rejects_unknown_op() {
        let result = serde_json::from_str::<BusEvent>(r#"{"op":"subscribe","topic":"/a"}"#);
        assert!(result.is_err());
    }
}
