mod help;
mod page;
mod reader;
pub mod rich;

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Position, Rect},
};
use unicode_width::UnicodeWidthStr;

use crate::app::{App, ModalPart};
use crate::dom::Document;
use crate::markup::ATTR_NAV_LINK;

pub const SIDEBAR_WIDTH: u16 = 30;

/// Top-level render dispatch.
pub fn render(app: &App, frame: &mut Frame) {
    page::render(app, frame);

    if app.modal.is_open() || app.loading.is_some() {
        reader::render(app, frame);
    }

    // Render help overlay on top if active
    if app.show_help {
        help::render(frame);
    }
}

/// Screen regions of the page view.
#[derive(Debug, Clone, Copy)]
pub struct PageLayout {
    pub sidebar: Option<Rect>,
    pub tabs: Rect,
    pub filter: Rect,
    pub body: Rect,
    pub status: Rect,
}

pub fn page_layout(area: Rect, sidebar_open: bool) -> PageLayout {
    let (sidebar, main) = if sidebar_open && area.width > SIDEBAR_WIDTH * 2 {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(20)])
            .split(area);
        (Some(columns[0]), columns[1])
    } else {
        (None, area)
    };

    // Layout: tabs(3) + filter(3) + body(min) + status(1)
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(1),
        ])
        .split(main);

    PageLayout {
        sidebar,
        tabs: chunks[0],
        filter: chunks[1],
        body: chunks[2],
        status: chunks[3],
    }
}

/// Navigation labels with the column range each occupies inside the tab bar.
pub fn nav_tabs(doc: &Document) -> Vec<(String, String, u16, u16)> {
    let mut out = Vec::new();
    let mut x: u16 = 1;
    for link in doc.query_all(ATTR_NAV_LINK) {
        let Some(id) = doc.attr(link, ATTR_NAV_LINK) else {
            continue;
        };
        let label = format!(" {} ", doc.text(link));
        let width = label.width() as u16;
        out.push((id.to_string(), label, x, x + width));
        x += width + 1;
    }
    out
}

/// Page whose navigation tab is under (`column`, `row`).
pub fn nav_hit(app: &App, area: Rect, column: u16, row: u16) -> Option<String> {
    let layout = page_layout(area, app.sidebar_open());
    if !layout.tabs.contains(Position::new(column, row)) {
        return None;
    }
    let offset = column - layout.tabs.x;
    nav_tabs(&app.doc)
        .into_iter()
        .find(|(_, _, start, end)| offset >= *start && offset < *end)
        .map(|(id, _, _, _)| id)
}

/// Part of the reader a click at (`column`, `row`) landed on.
pub fn modal_hit(area: Rect, column: u16, row: u16) -> ModalPart {
    let (content, close) = reader::areas(area);
    let position = Position::new(column, row);
    if close.contains(position) {
        ModalPart::Close
    } else if content.contains(position) {
        ModalPart::Content
    } else {
        ModalPart::Backdrop
    }
}

/// Create a centered rectangle using percentage of parent area.
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}

/// Truncate a string to `max_width` columns, adding "…" if truncated.
pub fn truncate_str(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }
    let mut result = String::new();
    let mut used = 0;
    for c in s.chars() {
        let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w + 1 > max_width {
            break;
        }
        used += w;
        result.push(c);
    }
    result.push('…');
    result
}
