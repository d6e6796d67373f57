use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

use super::centered_rect;
use super::rich::html_text;
use crate::app::App;

const CLOSE_LABEL: &str = " ✕ Close ";

/// Content box of the reader and its close control.
pub fn areas(area: Rect) -> (Rect, Rect) {
    let content = centered_rect(80, 80, area);
    let width = (CLOSE_LABEL.chars().count() as u16).min(content.width.saturating_sub(2));
    let close = Rect {
        x: content.x + content.width.saturating_sub(width + 1),
        y: content.y,
        width,
        height: 1,
    };
    (content, close)
}

pub fn render(app: &App, frame: &mut Frame) {
    let (content, close) = areas(frame.area());

    // Clear the area behind the popup
    frame.render_widget(Clear, content);

    let (title, body): (String, Text) = match (app.reader_view(), app.loading) {
        (_, Some(title)) => (
            title.to_string(),
            Text::from(Line::from(Span::styled(
                " Loading…",
                Style::default().fg(Color::DarkGray),
            ))),
        ),
        (Some((title, html)), None) => (title.to_string(), html_text(html)),
        (None, None) => return,
    };

    let paragraph = Paragraph::new(body)
        .wrap(Wrap { trim: false })
        .scroll((app.reader_scroll, 0))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(format!(" {} ", title))
                .title_bottom(
                    Line::from(" ↑↓ scroll · Esc close ").style(Style::default().fg(Color::DarkGray)),
                ),
        );
    frame.render_widget(paragraph, content);

    let close_button = Paragraph::new(CLOSE_LABEL).style(
        Style::default()
            .fg(Color::Black)
            .bg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    );
    frame.render_widget(close_button, close);
}
