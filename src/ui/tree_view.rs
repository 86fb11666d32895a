//! Topic tree rendering.
//!
//! Displays the visible rows of the topic tree as a five-column table:
//! topic, type, bandwidth, rate and value.

use ratatui::{
    layout::{Constraint, Rect},
    style::Style,
    widgets::{Block, Borders, Cell, Row, Table},
    Frame,
};

use super::columns::{Column, INDENT};
use crate::app::App;
use crate::data::format::NOT_MONITORED;
use crate::data::TreeNode;

/// Topic column text: indentation, expansion marker and label.
pub fn topic_cell(node: &TreeNode) -> String {
    let marker = if node.is_leaf() {
        "  "
    } else if node.expanded {
        "▼ "
    } else {
        "▶ "
    };
    format!(
        "{}{}{}",
        " ".repeat(node.depth * INDENT as usize),
        marker,
        node.label
    )
}

/// Render the topic tree table, refitting the columns to the visible rows.
pub fn render(frame: &mut Frame, app: &mut App, area: Rect) {
    app.columns.fit(app.panel.tree());
    let widths = Column::ALL.map(|c| Constraint::Length(app.columns.width(c)));

    let tree = app.panel.tree();
    let rows = tree.visible_rows();

    let header = Row::new(Column::ALL.map(|c| Cell::from(c.title())))
        .height(1)
        .style(app.theme.header);

    let table_rows: Vec<Row> = rows
        .iter()
        .filter_map(|id| tree.node(*id))
        .map(|node| {
            let value_style = if node.parent.is_none() && node.value == NOT_MONITORED {
                app.theme.inactive
            } else {
                Style::default()
            };
            Row::new(vec![
                Cell::from(topic_cell(node)),
                Cell::from(node.type_name.clone()),
                Cell::from(node.bandwidth.clone()).style(app.theme.live),
                Cell::from(node.rate.clone()).style(app.theme.live),
                Cell::from(node.value.clone()).style(value_style),
            ])
        })
        .collect();

    let position_info = match app.selected_row() {
        Some(row) => format!(" [{}/{}]", row + 1, rows.len()),
        None => String::new(),
    };
    let title = format!(" Topics ({}){} ", tree.roots().len(), position_info);

    let table = Table::new(table_rows, widths)
        .header(header)
        .column_spacing(2)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_type(app.theme.border_type)
                .border_style(Style::default().fg(app.theme.border)),
        )
        .row_highlight_style(app.theme.selected);

    let selected = app.selected_row();
    app.table_state.select(selected);
    frame.render_stateful_widget(table, area, &mut app.table_state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::refresh::PanelOptions;
    use crate::data::{MessageSchema, TopicPanel, TopicTree, TypeRegistry};
    use crate::testing::FakeBus;
    use crate::ui::{ColumnLayout, Theme};
    use ratatui::{backend::TestBackend, Terminal};
    use std::sync::Arc;

    #[test]
    fn topic_cell_indents_and_marks() {
        let types = TypeRegistry::new();
        let schema = MessageSchema::parse("demo/Stamped", "Header header").unwrap();
        let mut tree = TopicTree::new();
        let root = tree.build_topic("/s", "demo/Stamped", &schema, None, &types);

        assert_eq!(topic_cell(tree.node(root).unwrap()), "▶ /s");
        tree.set_expanded(root, true);
        assert_eq!(topic_cell(tree.node(root).unwrap()), "▼ /s");

        let seq = tree.find("/s/header/seq").unwrap();
        assert_eq!(topic_cell(tree.node(seq).unwrap()), "      seq");
    }

    #[test]
    fn render_fits_columns_to_visible_rows() {
        let bus = FakeBus::new();
        bus.set_schema("/alpha", MessageSchema::parse("demo/Blob", "string data").unwrap());
        bus.publish([("/alpha", "demo/Blob")].into_iter().collect());
        let panel = TopicPanel::new(
            Box::new(bus.source()),
            Box::new(bus.factory()),
            Arc::new(TypeRegistry::new()),
            PanelOptions::default(),
        );
        let mut app = App::new(panel, Theme::dark()).with_columns(ColumnLayout::new(40));
        app.panel.tick();

        let mut terminal = Terminal::new(TestBackend::new(100, 10)).unwrap();
        terminal
            .draw(|frame| {
                let area = frame.area();
                render(frame, &mut app, area);
            })
            .unwrap();

        // marker + "/alpha"
        assert_eq!(app.columns.width(Column::Topic), 8);
        assert_eq!(app.columns.width(Column::Value), 13);
        assert_eq!(app.table_state.selected(), Some(0));
    }
}
