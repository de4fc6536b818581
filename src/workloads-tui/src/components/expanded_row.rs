//! Detail pane for an expanded row.

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use workload_table::{ExpandedData, ExpandedView};

fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) if v.fract() == 0.0 => format!("{v:.0}"),
        Some(v) => format!("{v:.2}"),
        None => "-".to_string(),
    }
}

pub fn render(frame: &mut Frame, area: Rect, view: &ExpandedView) {
    let mut lines = vec![
        Line::from(vec![
            Span::styled("Link: ", Style::default().fg(Color::DarkGray)),
            Span::raw(view.link().to_string()),
        ]),
        Line::from(vec![
            Span::styled("Cluster: ", Style::default().fg(Color::DarkGray)),
            Span::raw(view.row().cluster.clone()),
        ]),
        Line::default(),
    ];

    match view.data() {
        ExpandedData::NotLoaded | ExpandedData::Loading => {
            lines.push(Line::styled(
                "Loading...",
                Style::default().fg(Color::Yellow),
            ));
        }
        ExpandedData::Error(message) => {
            lines.push(Line::styled(
                format!("Error: {message}"),
                Style::default().fg(Color::Red),
            ));
        }
        ExpandedData::Loaded(_) => {
            for (title, value) in view.panel_values() {
                lines.push(Line::from(vec![
                    Span::styled(
                        format!("{title:<14}"),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                    Span::raw(format_value(value)),
                ]));
            }
        }
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("{} ({})", view.key(), view.row().namespace));
    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}
