// Library crate: public API items may not be used by the binary
#![allow(unused)]

//! # topicwatch
//!
//! A terminal topic monitor for publish/subscribe message buses.
//!
//! The monitor lists every published topic with its message type, and for
//! the topics being monitored shows the message rate, the bandwidth and the
//! latest value of every field, expanded into a tree that follows the
//! message structure.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Application                          │
//! │  ┌─────────┐    ┌──────────────┐    ┌─────────┐             │
//! │  │  app    │───▶│ data         │───▶│   ui    │──▶ Terminal │
//! │  │ (state) │    │ (TopicPanel) │    │ (table) │             │
//! │  └─────────┘    └──────┬───────┘    └─────────┘             │
//! │                        │                                    │
//! │            ┌───────────┴───────────┐                        │
//! │            ▼                       ▼                        │
//! │  ┌──────────────────┐   ┌────────────────────┐              │
//! │  │ source           │   │ monitor            │              │
//! │  │ (TopicSource)    │   │ (TopicMonitor)     │              │
//! │  └────────▲─────────┘   └─────────▲──────────┘              │
//! │           └──── BusHub ◀── StreamSource (TCP | file)        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`data`]**: Message schemas and values, the topic registry diff, the
//!   display tree and the refresh cycle ([`TopicPanel`])
//! - **[`monitor`]**: Per-topic monitor handles and rate/bandwidth statistics
//! - **[`source`]**: The [`TopicSource`] trait and the NDJSON bus feed
//! - **[`ui`]**: Terminal rendering using ratatui
//! - **[`config`]**: Settings from a TOML file and the environment
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Follow a capture file of bus events
//! topicwatch --file capture.jsonl --msg-path ./msg
//!
//! # Connect to a bus bridge over TCP
//! topicwatch --connect localhost:9090 --monitor-all
//! ```
//!
//! ### As a library
//!
//! ```no_run
//! use std::sync::Arc;
//! use topicwatch::{BusHub, HubOptions, PanelOptions, StreamSource, TopicPanel, TypeRegistry};
//!
//! # tokio_test::block_on(async {
//! let types = Arc::new(TypeRegistry::new());
//! let hub = BusHub::new(types.clone(), HubOptions::default(), "capture");
//! let source = StreamSource::follow_file("capture.jsonl".as_ref(), hub.clone());
//!
//! let mut panel = TopicPanel::new(Box::new(source), Box::new(hub), types, PanelOptions::default());
//! panel.tick();
//! println!("{} topics", panel.tree().roots().len());
//! # });
//! ```

pub mod app;
pub mod config;
pub mod data;
pub mod events;
pub mod monitor;
pub mod source;
pub mod ui;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use app::App;
pub use config::Settings;
pub use data::refresh::PanelOptions;
pub use data::{
    MessageSchema, MessageValue, TopicPanel, TopicRegistry, TopicSnapshot, TopicTree,
    TypeRegistry, TypeResolver,
};
pub use monitor::{MonitorError, MonitorFactory, TopicMonitor, TopicStats};
pub use source::{BusEvent, BusHub, HubMonitor, HubOptions, StreamSource, TopicSource};
