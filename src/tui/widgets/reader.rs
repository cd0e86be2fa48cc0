use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let title = match &app.loaded_chapter {
        Some(ch) => format!(" {} · unlocked to {} ", ch, app.boundary),
        None => " Reader ".to_string(),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .title_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    if app.paragraphs.is_empty() {
        let paragraph = Paragraph::new("No document to show")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(paragraph, area);
        return;
    }

    let mut lines: Vec<Line> = Vec::new();
    for p in &app.paragraphs {
        let hidden = app.boundary.obscures(p.id);
        for (i, raw) in p.markdown.lines().enumerate() {
            let number = if i == 0 { format!("{:>4} ", p.id) } else { "     ".to_string() };
            let (content, style) = if hidden {
                (obscure(raw), Style::default().fg(Color::DarkGray))
            } else {
                (raw.to_string(), Style::default().fg(Color::White))
            };
            lines.push(Line::from(vec![
                Span::styled(number, Style::default().fg(Color::DarkGray)),
                Span::styled(content, style),
            ]));
        }
        lines.push(Line::from(""));
    }

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.reader_scroll, 0));
    f.render_widget(paragraph, area);
}

// Keeps the shape of the text so the reader can see how much is left.
fn obscure(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_whitespace() { c } else { '░' })
        .collect()
}
