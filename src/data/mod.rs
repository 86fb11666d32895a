//! Data models for the topic panel.
//!
//! ## Submodules
//!
//! - [`message`]: Typed message values ([`MessageValue`]) and their display text
//! - [`schema`]: Message type definitions, array type parsing and the [`TypeRegistry`]
//! - [`registry`]: Reconciliation of published topics against monitor handles
//! - [`tree`]: The display tree built from message structure ([`TopicTree`])
//! - [`format`]: Rate, bandwidth and column width formatting
//! - [`refresh`]: The timer-driven refresh cycle ([`TopicPanel`])
//!
//! ## Data Flow
//!
//! ```text
//! TopicSource::published_topics()
//!        │
//!        ▼
//! TopicRegistry::reconcile() ──changed──▶ TopicTree::build_topic() (all topics)
//!        │
//!        ▼
//! TopicMonitor::last_message() ──▶ TopicTree::update_value()
//!        │
//!        └──▶ rate / bandwidth columns
//! ```

pub mod format;
pub mod message;
pub mod refresh;
pub mod registry;
pub mod schema;
pub mod tree;

pub use message::{Field, Message, MessageValue};
pub use refresh::{ContextAction, CycleState, RefreshTimer, TopicPanel};
pub use registry::{PublishedTopic, ReconcileOutcome, TopicRegistry, TopicSnapshot};
pub use schema::{
    parse_array_type, ArrayType, MessageSchema, SchemaError, TypeRegistry, TypeResolver,
};
pub use tree::{NodeId, NodeKey, TopicTree, TreeNode};
