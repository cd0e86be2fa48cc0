use chrono::Utc;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

use super::truncate;
use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let title = match &app.loaded_chapter {
        Some(ch) => format!(" Cards · {} ", ch),
        None => " Cards ".to_string(),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .title_style(Style::default().fg(Color::Cyan));

    if app.cards.items.is_empty() {
        let paragraph = Paragraph::new("No cards in this chapter")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(paragraph, area);
        return;
    }

    let now = Utc::now();
    let items: Vec<ListItem> = app
        .cards
        .items
        .iter()
        .map(|card| {
            let para = card.para_idx.map_or("-".to_string(), |p| p.to_string());
            let gate = if card.suspended {
                ("susp ", Color::DarkGray)
            } else if card.blocked {
                ("gate ", Color::Red)
            } else {
                ("     ", Color::White)
            };
            let due = if card.is_due(now) {
                ("now".to_string(), Color::Yellow)
            } else {
                (card.due.format("%b %d").to_string(), Color::White)
            };

            ListItem::new(Line::from(vec![
                Span::styled(format!("{:>4} ", para), Style::default().fg(Color::DarkGray)),
                Span::styled(gate.0, Style::default().fg(gate.1)),
                Span::styled(
                    format!("{:<9}", card.status.label()),
                    Style::default().fg(Color::Cyan),
                ),
                Span::styled(format!("{:<7}", due.0), Style::default().fg(due.1)),
                Span::styled(
                    if card.flagged { "⚑ " } else { "  " },
                    Style::default().fg(Color::Red),
                ),
                Span::styled(truncate(&card.front, 50), Style::default().fg(Color::White)),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(app.cards.selected);
    f.render_stateful_widget(list, area, &mut state);
}
