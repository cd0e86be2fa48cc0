use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs},
    Frame,
};

use super::widgets::{cards, reader, review};
use super::{App, View};

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tab bar
            Constraint::Min(0),    // Content
            Constraint::Length(1), // Status line
            Constraint::Length(1), // Help bar
        ])
        .split(f.area());

    draw_tabs(f, app, chunks[0]);
    draw_content(f, app, chunks[1]);
    draw_status(f, app, chunks[2]);
    draw_help_bar(f, app, chunks[3]);
}

fn draw_tabs(f: &mut Frame, app: &App, area: Rect) {
    let tab_titles = vec![
        format!("Review ({})", app.pool.items.len()),
        "Reader".to_string(),
        format!("Cards ({})", app.cards.items.len()),
    ];
    let selected = match app.view {
        View::Review => 0,
        View::Reader => 1,
        View::Cards => 2,
    };

    let tabs = Tabs::new(tab_titles)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" Paragate · {} ", app.scope.label())),
        )
        .select(selected)
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    f.render_widget(tabs, area);
}

fn draw_content(f: &mut Frame, app: &App, area: Rect) {
    match app.view {
        View::Review => review::draw(f, app, area),
        View::Reader => reader::draw(f, app, area),
        View::Cards => cards::draw(f, app, area),
    }
}

fn draw_status(f: &mut Frame, app: &App, area: Rect) {
    let line = match &app.status {
        Some(msg) if msg.starts_with("Error") => {
            Line::from(Span::styled(msg.as_str(), Style::default().fg(Color::Red)))
        }
        Some(msg) => Line::from(Span::styled(msg.as_str(), Style::default().fg(Color::Green))),
        None => Line::from(""),
    };
    f.render_widget(Paragraph::new(line), area);
}

fn draw_help_bar(f: &mut Frame, app: &App, area: Rect) {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Cyan));

    let mut spans = vec![key("h/l"), Span::raw(" Views  ")];

    match app.view {
        View::Review => {
            spans.extend(vec![key("j/k"), Span::raw(" Nav  ")]);
            if app.revealed {
                spans.extend(vec![key("1-4"), Span::raw(" Again/Hard/Good/Easy  ")]);
            } else {
                spans.extend(vec![key("<Space>"), Span::raw(" Show  ")]);
            }
            spans.extend(vec![
                key("b"),
                Span::raw(" Bury  "),
                key("s"),
                Span::raw(" Suspend  "),
                key("f"),
                Span::raw(" Flag  "),
            ]);
        }
        View::Reader => {
            spans.extend(vec![key("j/k"), Span::raw(" Scroll  "), key("g"), Span::raw(" Top  ")]);
        }
        View::Cards => {
            spans.extend(vec![
                key("j/k"),
                Span::raw(" Nav  "),
                key("g/G"),
                Span::raw(" Top/Bot  "),
                key("s"),
                Span::raw(" Suspend  "),
                key("f"),
                Span::raw(" Flag  "),
            ]);
        }
    }

    spans.extend(vec![key("^r"), Span::raw(" Refresh  "), key("q"), Span::raw(" Quit")]);

    let help = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));

    f.render_widget(help, area);
}
