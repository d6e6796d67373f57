use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};

use super::{PageLayout, nav_tabs, page_layout, truncate_str};
use crate::app::App;
use crate::dom::{CLASS_ACTIVE, Document, NodeId};
use crate::filter::FilterController;
use crate::markup::{ATTR_PAGE, ATTR_SELECT_VALUE, ATTR_SIDEBAR};

pub fn render(app: &App, frame: &mut Frame) {
    let layout = page_layout(frame.area(), app.sidebar_open());

    if let Some(area) = layout.sidebar {
        render_sidebar(app, frame, area);
    }
    render_tabs(app, frame, layout.tabs);
    render_filter_bar(app, frame, layout.filter);
    render_body(app, frame, layout.body);
    render_status(app, frame, layout.status);

    if app.dropdown_open() {
        render_dropdown(app, frame, &layout);
    }
}

// ── Navigation ──

fn render_tabs(app: &App, frame: &mut Frame, area: Rect) {
    let current = app.current_page();
    let mut spans = Vec::new();
    for (id, label, _, _) in nav_tabs(&app.doc) {
        let style = if id == current {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        spans.push(Span::styled(label, style));
        spans.push(Span::raw(" "));
    }

    let tabs = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(format!(" {} ", app.config.title)),
    );
    frame.render_widget(tabs, area);
}

// ── Filter bar ──

fn render_filter_bar(app: &App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Filter (f / c) ");

    let Some(section) = app.current_section() else {
        let empty = Paragraph::new(" Nothing to filter on this page")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(empty, area);
        return;
    };

    let slot = app
        .doc
        .first_with(ATTR_SELECT_VALUE, &section)
        .map(|id| app.doc.text(id).to_string())
        .unwrap_or_default();
    let mut spans = vec![
        Span::styled(
            format!(" [{} ▾] ", slot),
            Style::default().fg(Color::Yellow),
        ),
        Span::raw(" "),
    ];
    for (control, _, label) in FilterController::controls(&app.doc, &section) {
        let style = if app.doc.has_class(control, CLASS_ACTIVE) {
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::Gray)
        };
        spans.push(Span::styled(label, style));
        spans.push(Span::raw("  "));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_dropdown(app: &App, frame: &mut Frame, layout: &PageLayout) {
    let Some(section) = app.filters.open_dropdown() else {
        return;
    };
    let controls = FilterController::controls(&app.doc, section);
    let width = controls
        .iter()
        .map(|(_, _, label)| label.chars().count() as u16)
        .max()
        .unwrap_or(8)
        + 6;
    let area = Rect {
        x: layout.filter.x + 1,
        y: layout.filter.y + 2,
        width: width.min(layout.filter.width.saturating_sub(2)),
        height: (controls.len() as u16 + 2).min(layout.body.height + 1),
    };

    let items: Vec<ListItem> = controls
        .into_iter()
        .map(|(_, _, label)| ListItem::new(label))
        .collect();
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow)),
        )
        .highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White))
        .highlight_symbol("▸ ");

    let mut state = ListState::default();
    state.select(Some(app.dropdown_cursor));
    frame.render_widget(Clear, area);
    frame.render_stateful_widget(list, area, &mut state);
}

// ── Page body ──

/// Direct heading/paragraph text of a page element.
fn page_intro(doc: &Document, page: NodeId) -> (String, Vec<String>) {
    let mut heading = String::new();
    let mut paragraphs = Vec::new();
    for child in doc.children(page) {
        match doc.element(*child).map(|el| el.tag()) {
            Some("h2") => heading = doc.text(*child).to_string(),
            Some("p") => paragraphs.push(doc.text(*child).to_string()),
            _ => {}
        }
    }
    (heading, paragraphs)
}

/// Title and detail lines of one filterable item.
fn item_lines(doc: &Document, item: NodeId) -> (String, Vec<String>) {
    let mut title = doc.text(item).to_string();
    let mut details = Vec::new();
    for child in doc.children(item) {
        match doc.element(*child).map(|el| el.tag()) {
            Some("h4") => title = doc.text(*child).to_string(),
            Some("p") => details.push(doc.text(*child).to_string()),
            _ => {}
        }
    }
    (title, details)
}

fn render_body(app: &App, frame: &mut Frame, area: Rect) {
    let Some(page) = app.doc.first_with(ATTR_PAGE, app.current_page()) else {
        return;
    };
    let (heading, paragraphs) = page_intro(&app.doc, page);
    let items = app.visible_items();

    let intro_height = (paragraphs.len() as u16 + 3).min(area.height);
    let chunks = if items.is_empty() && app.current_section().is_none() {
        vec![area, Rect::default()]
    } else {
        Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(intro_height), Constraint::Min(3)])
            .split(area)
            .to_vec()
    };

    let mut lines = vec![Line::from(Span::styled(
        format!(" {}", heading),
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    ))];
    // Blurbs may carry inline markdown.
    for paragraph in &paragraphs {
        for mut line in tui_markdown::from_str(paragraph).lines {
            line.spans.insert(0, Span::raw(" "));
            lines.push(line);
        }
    }
    let intro = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((app.router.scroll(), 0))
        .block(
            Block::default()
                .borders(Borders::BOTTOM)
                .border_style(Style::default().fg(Color::DarkGray)),
        );
    frame.render_widget(intro, chunks[0]);

    if chunks[1].height == 0 {
        return;
    }

    let width = chunks[1].width as usize;
    let list_items: Vec<ListItem> = items
        .iter()
        .map(|item| {
            let (title, details) = item_lines(&app.doc, *item);
            let mut lines = vec![Line::from(Span::styled(
                title,
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ))];
            for detail in details {
                lines.push(Line::from(Span::styled(
                    format!("  {}", truncate_str(&detail, width.saturating_sub(6))),
                    Style::default().fg(Color::DarkGray),
                )));
            }
            ListItem::new(lines)
        })
        .collect();

    let counter = format!(" {} shown ", items.len());
    let list = List::new(list_items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray))
                .title(" Items ")
                .title_bottom(Line::from(counter).alignment(Alignment::Right)),
        )
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▸ ");

    let mut state = ListState::default();
    if !items.is_empty() {
        state.select(Some(app.selected.min(items.len() - 1)));
    }
    frame.render_stateful_widget(list, chunks[1], &mut state);
}

// ── Sidebar ──

fn render_sidebar(app: &App, frame: &mut Frame, area: Rect) {
    let mut lines = Vec::new();
    if let Some(sidebar) = app.doc.query_all(ATTR_SIDEBAR).first() {
        for node in app.doc.descendants(*sidebar) {
            match app.doc.element(node).map(|el| el.tag()) {
                Some("h1") => {
                    lines.push(Line::from(Span::styled(
                        app.doc.text(node).to_string(),
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::BOLD),
                    )));
                    lines.push(Line::from(""));
                }
                Some("li") => lines.push(Line::from(app.doc.text(node).to_string())),
                _ => {}
            }
        }
    }

    let sidebar = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(" Contacts "),
    );
    frame.render_widget(sidebar, area);
}

// ── Status bar ──

fn render_status(app: &App, frame: &mut Frame, area: Rect) {
    let key = |k: &'static str| {
        Span::styled(
            k,
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
    };
    let status_line = Line::from(vec![
        key(" ←→"),
        Span::raw(" Pages  "),
        key("s"),
        Span::raw(" Sidebar  "),
        key("?"),
        Span::raw(" Help  "),
        key("q"),
        Span::raw(" Quit  "),
        Span::styled(&app.status_msg, Style::default().fg(Color::DarkGray)),
    ]);
    frame.render_widget(Paragraph::new(status_line), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ArticleCatalog;
    use crate::config::SiteConfig;
    use crate::markup;

    #[test]
    fn test_item_lines_for_article_card() {
        let mut doc = markup::build(&SiteConfig::default(), &ArticleCatalog::builtin());
        let list = doc.first_with(markup::ATTR_ARTICLE_LIST, "articles").unwrap();
        let meta = ArticleCatalog::builtin().list()[1];
        let card = markup::article_card(&mut doc, list, "articles", &meta);

        let (title, details) = item_lines(&doc, card);
        assert_eq!(title, meta.title);
        assert_eq!(details.len(), 2);
        assert!(details[0].contains("Networking"));
    }

    #[test]
    fn test_page_intro() {
        let doc = markup::build(&SiteConfig::default(), &ArticleCatalog::builtin());
        let page = doc.first_with(ATTR_PAGE, "about").unwrap();
        let (heading, paragraphs) = page_intro(&doc, page);
        assert_eq!(heading, "About");
        assert_eq!(paragraphs.len(), 1);
    }
}
