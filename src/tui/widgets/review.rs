use chrono::{DateTime, Utc};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use super::truncate;
use crate::models::{Card, CardStatus};
use crate::scheduler::preview_due;
use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    draw_queue(f, app, chunks[0]);
    draw_card(f, app, chunks[1]);
}

fn draw_queue(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" Queue ({}) ", app.pool.items.len()))
        .title_style(Style::default().fg(Color::Cyan));

    if app.pool.items.is_empty() {
        let paragraph = Paragraph::new(format!(
            "Nothing due. Unlocked up to paragraph {}.",
            app.boundary
        ))
        .style(Style::default().fg(Color::Green))
        .block(block)
        .wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem> = app
        .pool
        .items
        .iter()
        .map(|entry| {
            let card = &entry.card;
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:>4} ", card.para_idx.map_or("-".to_string(), |p| p.to_string())),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(
                    format!("{:<9}", card.status.label()),
                    Style::default().fg(status_color(card.status)),
                ),
                Span::styled(
                    if card.flagged { "⚑ " } else { "  " },
                    Style::default().fg(Color::Red),
                ),
                Span::styled(truncate(&card.front, 40), Style::default().fg(Color::White)),
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
    state.select(app.pool.selected);
    f.render_stateful_widget(list, area, &mut state);
}

fn draw_card(f: &mut Frame, app: &App, area: Rect) {
    let Some(entry) = app.pool.selected_item() else {
        let block = Block::default().borders(Borders::ALL).title(" Card ");
        f.render_widget(Paragraph::new("No card selected").block(block), area);
        return;
    };
    let card = &entry.card;
    let now = Utc::now();

    let mut text = vec![
        Line::from(Span::styled(
            card.front.as_str(),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];

    if app.revealed {
        text.push(Line::from(Span::styled("─".repeat(20), Style::default().fg(Color::DarkGray))));
        text.push(Line::from(Span::styled(card.back.as_str(), Style::default().fg(Color::Green))));
        text.push(Line::from(""));
        text.push(rating_preview(app, card, now));
    } else {
        text.push(Line::from(Span::styled(
            "Press space to show the answer",
            Style::default().fg(Color::DarkGray),
        )));
    }

    text.push(Line::from(""));
    text.push(Line::from(vec![
        Span::styled("Tag: ", Style::default().fg(Color::Gray)),
        Span::styled(truncate(&card.tag, 60), Style::default().fg(Color::Cyan)),
    ]));

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", truncate(&card.chapter, 40)))
        .title_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    let paragraph = Paragraph::new(text).block(block).wrap(Wrap { trim: false });
    f.render_widget(paragraph, area);
}

fn rating_preview(app: &App, card: &Card, now: DateTime<Utc>) -> Line<'static> {
    let mut spans = Vec::new();
    for (i, (rating, due)) in preview_due(card, app.scheduler_config(), now)
        .into_iter()
        .enumerate()
    {
        spans.push(Span::styled(format!("{} ", i + 1), Style::default().fg(Color::Cyan)));
        spans.push(Span::raw(format!("{} ", rating.label())));
        spans.push(Span::styled(
            format!("{}   ", format_delta(now, due)),
            Style::default().fg(Color::DarkGray),
        ));
    }
    Line::from(spans)
}

fn format_delta(now: DateTime<Utc>, due: DateTime<Utc>) -> String {
    let minutes = (due - now).num_minutes();
    if minutes < 1 {
        "<1m".to_string()
    } else if minutes < 60 {
        format!("{}m", minutes)
    } else if minutes < 60 * 24 {
        format!("{}h", minutes / 60)
    } else {
        format!("{}d", minutes / (60 * 24))
    }
}

fn status_color(status: CardStatus) -> Color {
    match status {
        CardStatus::New => Color::Blue,
        CardStatus::Learning => Color::Yellow,
        CardStatus::Review => Color::Green,
        CardStatus::Relearn => Color::Red,
    }
}
