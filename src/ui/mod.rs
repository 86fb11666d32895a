//! Terminal rendering of the topic panel.
//!
//! - [`tree_view`]: The topic tree table
//! - [`columns`]: Column definitions and auto-sized widths
//! - [`common`]: Header, status bar, help overlay and context menu
//! - [`theme`]: Dark and light themes

pub mod columns;
pub mod common;
pub mod theme;
pub mod tree_view;

pub use columns::{Column, ColumnLayout};
pub use theme::Theme;
