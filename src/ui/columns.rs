//! Column table of the topic tree view.

use crate::data::format::{clamp_value_width, VALUE_COLUMN_MAX};
use crate::data::{TopicTree, TreeNode};

/// Indentation per tree level in the topic column.
pub const INDENT: u16 = 2;

/// Width of the expand/collapse marker in front of each label.
const MARKER_WIDTH: u16 = 2;

/// Columns of the tree view, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Topic,
    Type,
    Bandwidth,
    Rate,
    Value,
}

impl Column {
    pub const ALL: [Column; 5] = [
        Column::Topic,
        Column::Type,
        Column::Bandwidth,
        Column::Rate,
        Column::Value,
    ];

    pub fn index(self) -> usize {
        match self {
            Column::Topic => 0,
            Column::Type => 1,
            Column::Bandwidth => 2,
            Column::Rate => 3,
            Column::Value => 4,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Column::Topic => "Topic",
            Column::Type => "Type",
            Column::Bandwidth => "Bandwidth",
            Column::Rate => "Rate",
            Column::Value => "Value",
        }
    }

    /// Cell text of `node` in this column (the topic column without indent).
    pub fn text(self, node: &TreeNode) -> &str {
        match self {
            Column::Topic => &node.label,
            Column::Type => &node.type_name,
            Column::Bandwidth => &node.bandwidth,
            Column::Rate => &node.rate,
            Column::Value => &node.value,
        }
    }
}

fn text_width(text: &str) -> u16 {
    u16::try_from(text.chars().count()).unwrap_or(u16::MAX)
}

/// Column widths fitted to the visible rows of a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    widths: [u16; 5],
    value_max: u16,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self::new(VALUE_COLUMN_MAX)
    }
}

impl ColumnLayout {
    pub fn new(value_max: u16) -> Self {
        let mut widths = [0; 5];
        for column in Column::ALL {
            widths[column.index()] = text_width(column.title());
        }
        Self { widths, value_max }
    }

    /// Resize every column to its content, then clamp the value column.
    pub fn fit(&mut self, tree: &TopicTree) {
        let mut widths = [0u16; 5];
        for column in Column::ALL {
            widths[column.index()] = text_width(column.title());
        }

        for id in tree.visible_rows() {
            let Some(node) = tree.node(id) else {
                continue;
            };
            for column in Column::ALL {
                let mut width = text_width(column.text(node));
                if column == Column::Topic {
                    let indent = u16::try_from(node.depth).unwrap_or(u16::MAX);
                    width = width
                        .saturating_add(indent.saturating_mul(INDENT))
                        .saturating_add(MARKER_WIDTH);
                }
                let slot = &mut widths[column.index()];
                *slot = (*slot).max(width);
            }
        }

        let value = Column::Value.index();
        widths[value] = clamp_value_width(widths[value], self.value_max);
        self.widths = widths;
    }

    pub fn width(&self, column: Column) -> u16 {
        self.widths[column.index()]
    }

    pub fn widths(&self) -> [u16; 5] {
        self.widths
    }
}
