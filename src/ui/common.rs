//! Common UI components drawn around the topic tree.
//!
//! This module contains the header bar, status bar, help overlay and the
//! context menu.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
    Frame,
};

use crate::app::App;
use crate::data::format::format_bandwidth;
use crate::data::ContextAction;
use crate::monitor::{BandwidthStats, RateStats};

/// Render the header bar with source and topic counts.
pub fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let registry = app.panel.registry();
    let monitored = registry.handles().filter(|(_, m)| m.is_monitoring()).count();

    let (status_icon, status_style) = match app.panel.source_error() {
        Some(_) => ("●", Style::default().fg(app.theme.error)),
        None => ("●", app.theme.live),
    };

    let line = Line::from(vec![
        Span::styled(format!(" {} ", status_icon), status_style),
        Span::styled("TOPICWATCH ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("│ "),
        Span::raw(app.source_description().to_string()),
        Span::raw(" │ "),
        Span::styled(
            format!("{}", registry.len()),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(" topics │ "),
        Span::styled(format!("{}", monitored), app.theme.live),
        Span::raw(" monitored"),
    ]);

    frame.render_widget(Paragraph::new(line), area);
}

/// Detailed rate statistics, in the form rostopic hz prints them.
pub fn rate_details(rate: &RateStats) -> String {
    format!(
        "rate {:.3} Hz  min {:.3}s  max {:.3}s  std dev {:.5}s  window {}",
        rate.rate, rate.min_delta, rate.max_delta, rate.std_dev, rate.window
    )
}

/// Detailed bandwidth statistics.
pub fn bandwidth_details(bandwidth: &BandwidthStats) -> String {
    format!(
        "bw {}  mean {:.0}B  min {}B  max {}B",
        format_bandwidth(Some(bandwidth.bytes_per_sec)),
        bandwidth.mean_size,
        bandwidth.min_size,
        bandwidth.max_size
    )
}

/// Render the status bar at the bottom.
///
/// Shows a temporary status message if one is active, otherwise the source
/// error, otherwise the statistics of the selected topic and the controls.
pub fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    if let Some(msg) = app.get_status_message() {
        let paragraph =
            Paragraph::new(format!(" {} ", msg)).style(Style::default().fg(app.theme.highlight));
        frame.render_widget(paragraph, area);
        return;
    }

    if let Some(err) = app.panel.source_error() {
        let paragraph = Paragraph::new(format!(" Error: {} | ?:help q:quit", err))
            .style(Style::default().fg(app.theme.error));
        frame.render_widget(paragraph, area);
        return;
    }

    let controls = "Space:expand m:monitor Enter:menu ?:help q:quit";
    let monitor = app
        .selected_topic()
        .and_then(|topic| app.panel.monitor(&topic).map(|m| (topic, m)));

    let status = match monitor {
        Some((topic, m)) if m.is_monitoring() => {
            let mut parts = vec![topic];
            if let Some(rate) = m.rate() {
                parts.push(rate_details(&rate));
            }
            if let Some(bandwidth) = m.bandwidth() {
                parts.push(bandwidth_details(&bandwidth));
            }
            format!(" {} | {}", parts.join(" │ "), controls)
        }
        Some((topic, _)) => format!(" {} not monitored | {}", topic, controls),
        None => format!(" {}", controls),
    };

    let paragraph = Paragraph::new(status).style(Style::default().add_modifier(Modifier::DIM));
    frame.render_widget(paragraph, area);
}

/// Render the help overlay with keyboard shortcuts.
///
/// Displayed as a centered modal on top of the tree.
pub fn render_help(frame: &mut Frame, app: &App, area: Rect) {
    let help_text = vec![
        Line::from(vec![Span::styled("Keyboard Shortcuts", app.theme.header)]),
        Line::from(""),
        Line::from(vec![Span::styled(
            " Navigation",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from("  ↑/↓ j/k     Move selection"),
        Line::from("  PgUp/PgDn   Jump 10 rows"),
        Line::from("  Home/End    Jump to first/last"),
        Line::from("  Space       Expand/collapse"),
        Line::from("  →/l ←/h     Expand / collapse or parent"),
        Line::from(""),
        Line::from(vec![Span::styled(
            " Topics",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from("  m           Toggle monitoring"),
        Line::from("  Enter       Context menu"),
        Line::from("  Right click Context menu at row"),
        Line::from(""),
        Line::from(vec![Span::styled(
            " General",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from("  e           Export to JSON"),
        Line::from("  q           Quit"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::DIM),
        )]),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    let paragraph = Paragraph::new(help_text).block(block);

    let help_width = 44u16.min(area.width.saturating_sub(4));
    let help_height = 22u16.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(help_width)) / 2;
    let y = area.y + (area.height.saturating_sub(help_height)) / 2;
    let help_area = Rect::new(x, y, help_width, help_height);

    frame.render_widget(Clear, help_area);
    frame.render_widget(paragraph, help_area);
}

/// Render the context menu next to the selected row.
///
/// `row_y` is the screen row of the node the menu belongs to.
pub fn render_context_menu(frame: &mut Frame, app: &App, area: Rect, row_y: u16) {
    let Some(menu) = &app.context_menu else {
        return;
    };

    let items: Vec<ListItem> = ContextAction::ALL
        .iter()
        .map(|action| ListItem::new(format!(" {} ", action.label())))
        .collect();

    let width = 26u16.min(area.width);
    let height = (ContextAction::ALL.len() as u16 + 2).min(area.height);
    let y = row_y
        .saturating_add(1)
        .min(area.y + area.height.saturating_sub(height));
    let x = area.x + 4.min(area.width.saturating_sub(width));
    let menu_area = Rect::new(x, y, width, height);

    let list = List::new(items)
        .block(
            Block::default()
                .title(format!(" {} ", menu.key.1))
                .borders(Borders::ALL)
                .border_type(app.theme.border_type)
                .border_style(Style::default().fg(app.theme.highlight)),
        )
        .highlight_style(app.theme.selected);

    let mut state = ListState::default();
    state.select(Some(menu.selected));

    frame.render_widget(Clear, menu_area);
    frame.render_stateful_widget(list, menu_area, &mut state);
}
