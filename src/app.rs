//! Application state and navigation logic.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;
use ratatui::widgets::TableState;

use crate::data::{ContextAction, NodeId, NodeKey, TopicPanel};
use crate::ui::{ColumnLayout, Theme};

/// How long a status message stays visible.
const STATUS_MESSAGE_TTL: Duration = Duration::from_secs(3);

/// Open context menu of a tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextMenu {
    /// Topic and path of the node the menu was opened on.
    pub key: NodeKey,
    /// Index into [`ContextAction::ALL`].
    pub selected: usize,
}

/// Main application state.
pub struct App {
    pub running: bool,
    pub show_help: bool,
    pub context_menu: Option<ContextMenu>,

    pub panel: TopicPanel,

    // Selection follows the node key so it survives tree rebuilds
    selected_key: Option<NodeKey>,
    selected_row: usize,
    pub table_state: TableState,
    pub columns: ColumnLayout,

    pub theme: Theme,
    pub status_message: Option<(String, Instant)>,
}

impl App {
    pub fn new(panel: TopicPanel, theme: Theme) -> Self {
        Self {
            running: true,
            show_help: false,
            context_menu: None,
            panel,
            selected_key: None,
            selected_row: 0,
            table_state: TableState::default(),
            columns: ColumnLayout::default(),
            theme,
            status_message: None,
        }
    }

    /// Use `columns` for the tree view's column widths.
    pub fn with_columns(mut self, columns: ColumnLayout) -> Self {
        self.columns = columns;
        self
    }

    /// Returns a description of the current topic source.
    pub fn source_description(&self) -> &str {
        self.panel.source_description()
    }

    /// Run a refresh tick if one is due.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.panel.poll_timer(now)
    }

    /// Set a temporary status message that will be shown for a few seconds.
    pub fn set_status_message(&mut self, message: String) {
        self.status_message = Some((message, Instant::now()));
    }

    /// Get the current status message if it hasn't expired.
    pub fn get_status_message(&self) -> Option<&str> {
        if let Some((msg, time)) = &self.status_message {
            if time.elapsed() < STATUS_MESSAGE_TTL {
                return Some(msg);
            }
        }
        None
    }

    fn visible_rows(&self) -> Vec<NodeId> {
        self.panel.tree().visible_rows()
    }

    /// Row index of the selection among the visible rows.
    ///
    /// When the selected node is gone or hidden, the selection stays at the
    /// same row position.
    pub fn selected_row(&self) -> Option<usize> {
        let rows = self.visible_rows();
        if rows.is_empty() {
            return None;
        }
        let tree = self.panel.tree();
        if let Some(key) = &self.selected_key {
            let found = tree
                .find_key(key)
                .and_then(|id| rows.iter().position(|row| *row == id));
            if let Some(row) = found {
                return Some(row);
            }
        }
        Some(self.selected_row.min(rows.len() - 1))
    }

    /// The selected node, if any row is visible.
    pub fn selected_node(&self) -> Option<NodeId> {
        let row = self.selected_row()?;
        self.visible_rows().get(row).copied()
    }

    /// Path of the selected node.
    pub fn selected_path(&self) -> Option<String> {
        let id = self.selected_node()?;
        self.panel.tree().node(id).map(|n| n.path.clone())
    }

    /// Topic name of the selected node's root.
    pub fn selected_topic(&self) -> Option<String> {
        let id = self.selected_node()?;
        self.panel.topic_of(id).map(str::to_string)
    }

    /// Select the visible row at `row`, clamped to the last row.
    pub fn select_row(&mut self, row: usize) {
        let rows = self.visible_rows();
        if rows.is_empty() {
            return;
        }
        let row = row.min(rows.len() - 1);
        self.selected_row = row;
        self.selected_key = self.panel.tree().key(rows[row]);
    }

    pub fn select_next(&mut self) {
        self.select_next_n(1);
    }

    pub fn select_prev(&mut self) {
        self.select_prev_n(1);
    }

    pub fn select_next_n(&mut self, n: usize) {
        if let Some(row) = self.selected_row() {
            self.select_row(row.saturating_add(n));
        }
    }

    pub fn select_prev_n(&mut self, n: usize) {
        if let Some(row) = self.selected_row() {
            self.select_row(row.saturating_sub(n));
        }
    }

    pub fn select_first(&mut self) {
        self.select_row(0);
    }

    pub fn select_last(&mut self) {
        self.select_row(usize::MAX);
    }

    /// Expand or collapse the selected node.
    pub fn toggle_selected(&mut self) {
        if let Some(id) = self.selected_node() {
            self.panel.toggle_expanded(id);
        }
    }

    pub fn expand_selected(&mut self) {
        if let Some(id) = self.selected_node() {
            self.panel.set_expanded(id, true);
        }
    }

    /// Collapse the selected node, or move to its parent if it is already
    /// collapsed.
    pub fn collapse_selected(&mut self) {
        let Some(id) = self.selected_node() else {
            return;
        };
        let Some(node) = self.panel.tree().node(id) else {
            return;
        };
        if node.expanded && !node.is_leaf() {
            self.panel.set_expanded(id, false);
            return;
        }
        if let Some(parent) = node.parent {
            self.selected_key = self.panel.tree().key(parent);
        }
    }

    /// Toggle monitoring of the selected node's topic.
    pub fn toggle_monitoring_selected(&mut self) {
        if let Some(id) = self.selected_node() {
            self.apply_action(id, ContextAction::ToggleMonitoring);
        }
    }

    fn apply_action(&mut self, id: NodeId, action: ContextAction) {
        self.panel.apply_action(id, action);
        if action == ContextAction::ToggleMonitoring {
            if let Some(topic) = self.panel.topic_of(id).map(str::to_string) {
                let on = self
                    .panel
                    .monitor(&topic)
                    .is_some_and(|m| m.is_monitoring());
                self.set_status_message(format!(
                    "Monitoring {} {}",
                    if on { "started for" } else { "stopped for" },
                    topic
                ));
            }
        }
    }

    /// Open the context menu on the selected node.
    pub fn open_context_menu(&mut self) {
        let key = self.selected_node().and_then(|id| self.panel.tree().key(id));
        if let Some(key) = key {
            self.context_menu = Some(ContextMenu { key, selected: 0 });
        }
    }

    pub fn close_context_menu(&mut self) {
        self.context_menu = None;
    }

    pub fn menu_next(&mut self) {
        if let Some(menu) = &mut self.context_menu {
            menu.selected = (menu.selected + 1) % ContextAction::ALL.len();
        }
    }

    pub fn menu_prev(&mut self) {
        if let Some(menu) = &mut self.context_menu {
            menu.selected = (menu.selected + ContextAction::ALL.len() - 1) % ContextAction::ALL.len();
        }
    }

    /// Run the highlighted menu action and close the menu.
    pub fn menu_activate(&mut self) {
        let Some(menu) = self.context_menu.take() else {
            return;
        };
        let Some(id) = self.panel.tree().find_key(&menu.key) else {
            self.set_status_message(format!("{} is gone", menu.key.1));
            return;
        };
        let action = ContextAction::ALL[menu.selected % ContextAction::ALL.len()];
        self.apply_action(id, action);
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    /// Stop the refresh cycle and every monitor, then leave the main loop.
    pub fn quit(&mut self) {
        self.panel.shutdown();
        self.running = false;
    }

    /// Export the current topic table to a JSON file.
    pub fn export_state(&self, path: &Path) -> Result<()> {
        let tree = self.panel.tree();
        let topics: Vec<serde_json::Value> = tree
            .roots()
            .iter()
            .filter_map(|id| tree.node(*id).map(|root| (*id, root)))
            .map(|(id, root)| {
                let monitoring = self
                    .panel
                    .monitor(&root.path)
                    .is_some_and(|m| m.is_monitoring());
                let prefix = format!("{}/", root.path);
                let fields: serde_json::Map<String, serde_json::Value> = tree
                    .nodes()
                    .filter(|n| n.root == id && n.parent.is_some())
                    .filter(|n| n.is_leaf() && n.path.starts_with(&prefix) && !n.value.is_empty())
                    .map(|n| (n.path[prefix.len()..].to_string(), n.value.clone().into()))
                    .collect();
                serde_json::json!({
                    "topic": root.path,
                    "type": root.type_name,
                    "monitoring": monitoring,
                    "rate": root.rate,
                    "bandwidth": root.bandwidth,
                    "fields": fields,
                })
            })
            .collect();

        let json = serde_json::to_string_pretty(&serde_json::json!({ "topics": topics }))?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::refresh::PanelOptions;
    use crate::data::{TypeRegistry, TypeResolver};
    use crate::testing::FakeBus;
    use std::sync::Arc;

    const POINT: &str = "geometry_msgs/Point";

    fn app(topics: &[&str]) -> (FakeBus, App) {
        let mut types = TypeRegistry::new();
        types
            .add_definition(POINT, "float64 x\nfloat64 y\nfloat64 z")
            .unwrap();
        let schema = types.schema(POINT).unwrap();
        let bus = FakeBus::new();
        for topic in topics {
            bus.set_schema(topic, (*schema).clone());
        }
        bus.publish(topics.iter().map(|t| (*t, POINT)).collect());
        let panel = TopicPanel::new(
            Box::new(bus.source()),
            Box::new(bus.factory()),
            Arc::new(types),
            PanelOptions::default(),
        );
        let mut app = App::new(panel, Theme::dark());
        app.panel.tick();
        (bus, app)
    }

    #[test]
    fn navigation_is_clamped() {
        let (_bus, mut app) = app(&["/a", "/b"]);
        assert_eq!(app.selected_row(), Some(0));
        app.select_prev();
        assert_eq!(app.selected_row(), Some(0));
        app.select_next_n(10);
        assert_eq!(app.selected_path().as_deref(), Some("/b"));
        app.select_first();
        assert_eq!(app.selected_path().as_deref(), Some("/a"));
    }

    #[test]
    fn selection_follows_path_across_rebuilds() {
        let (bus, mut app) = app(&["/b"]);
        app.select_first();
        app.expand_selected();
        app.select_next_n(2);
        assert_eq!(app.selected_path().as_deref(), Some("/b/y"));

        // a new topic sorts in front; the selection stays on /b/y
        let schema = app.panel.monitor("/b").unwrap().message_class();
        bus.set_schema("/a", (*schema).clone());
        bus.publish([("/a", POINT), ("/b", POINT)].into_iter().collect());
        app.panel.tick();

        assert_eq!(app.selected_path().as_deref(), Some("/b/y"));
        assert_eq!(app.selected_row(), Some(3));
    }

    #[test]
    fn selection_tells_nested_topic_from_field() {
        let (bus, mut app) = app(&["/a", "/a/x"]);
        app.select_first();
        app.expand_selected();
        app.select_last();
        let id = app.selected_node().unwrap();
        assert_eq!(app.panel.tree().node(id).unwrap().parent, None);
        assert_eq!(app.selected_topic().as_deref(), Some("/a/x"));

        let schema = app.panel.monitor("/a").unwrap().message_class();
        bus.set_schema("/0", (*schema).clone());
        bus.publish([("/0", POINT), ("/a", POINT), ("/a/x", POINT)].into_iter().collect());
        app.panel.tick();

        assert_eq!(app.selected_row(), Some(5));
        assert_eq!(app.selected_topic().as_deref(), Some("/a/x"));
        let id = app.selected_node().unwrap();
        assert_eq!(app.panel.tree().node(id).unwrap().parent, None);
    }

    #[test]
    fn collapse_moves_to_parent() {
        let (_bus, mut app) = app(&["/a"]);
        app.expand_selected();
        app.select_next();
        assert_eq!(app.selected_path().as_deref(), Some("/a/x"));

        app.collapse_selected();
        assert_eq!(app.selected_path().as_deref(), Some("/a"));
        app.collapse_selected();
        assert_eq!(app.panel.tree().visible_rows().len(), 1);
    }

    #[test]
    fn context_menu_runs_selected_action() {
        let (_bus, mut app) = app(&["/a"]);
        app.open_context_menu();
        app.menu_next();
        assert_eq!(app.context_menu.as_ref().unwrap().selected, 1);
        app.menu_activate();

        assert!(app.context_menu.is_none());
        assert_eq!(app.panel.tree().visible_rows().len(), 4);

        app.open_context_menu();
        app.menu_prev();
        app.menu_prev();
        app.menu_prev();
        app.menu_activate();
        assert!(app.panel.monitor("/a").unwrap().is_monitoring());
        assert!(app.get_status_message().unwrap().contains("/a"));
    }

    #[test]
    fn quit_shuts_panel_down() {
        let (bus, mut app) = app(&["/a", "/b"]);
        app.quit();
        assert!(!app.running);
        assert_eq!(bus.stops().len(), 2);
        assert!(!app.tick(Instant::now() + Duration::from_secs(5)));

        drop(app);
        assert_eq!(bus.stops().len(), 2);
    }

    #[test]
    fn export_writes_topics() {
        let (_bus, mut app) = app(&["/a"]);
        app.toggle_monitoring_selected();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.json");
        app.export_state(&path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["topics"][0]["topic"], "/a");
        assert_eq!(json["topics"][0]["monitoring"], true);
        assert_eq!(json["topics"][0]["rate"], "unknown");
    }
}
