use ratatui::{
    Frame,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

use super::centered_rect;

fn section(title: &'static str) -> Line<'static> {
    Line::from(vec![Span::styled(
        title,
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )])
}

fn binding(keys: &'static str, action: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::styled(keys, Style::default().fg(Color::Yellow)),
        Span::raw(action),
    ])
}

pub fn render(frame: &mut Frame) {
    let area = centered_rect(70, 70, frame.area());

    // Clear the area behind the popup
    frame.render_widget(Clear, area);

    let help_text = vec![
        Line::from(""),
        section("  Global"),
        binding("    ?         ", "Toggle this help"),
        binding("    q         ", "Quit application"),
        binding("    s         ", "Show / hide the contacts sidebar"),
        Line::from(""),
        section("  Pages"),
        binding("    ←/h →/l   ", "Previous / next page"),
        binding("    1-9       ", "Jump to a page"),
        binding("    Backspace ", "Back to the previous page"),
        binding("    PgUp/PgDn ", "Scroll the page intro"),
        Line::from(""),
        section("  Filtering"),
        binding("    f / F     ", "Next / previous category"),
        binding("    c         ", "Open the category dropdown"),
        binding("    ↑/k ↓/j   ", "Move through items"),
        binding("    Enter     ", "Open the selected article"),
        Line::from(""),
        section("  Reader"),
        binding("    ↑/↓       ", "Scroll"),
        binding("    Esc       ", "Close (or cancel a load in progress)"),
        binding("    Click     ", "Close button or outside the box closes"),
        Line::from(""),
    ];

    let help = Paragraph::new(help_text)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(" Help · Keybindings ")
                .title_bottom(
                    Line::from(" Press ? or Esc to close ").style(Style::default().fg(Color::DarkGray)),
                ),
        )
        .style(Style::default().fg(Color::White));

    frame.render_widget(help, area);
}
