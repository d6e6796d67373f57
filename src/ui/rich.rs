//! Terminal rendering of the HTML held in a modal body.
//!
//! Only the tags the markdown engine emits are understood. Anything else
//! contributes its text and nothing more.

use std::sync::LazyLock;

use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
};
use regex::Regex;

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<!--.*?-->|<(/?)([A-Za-z][A-Za-z0-9]*)([^>]*?)(/?)>").expect("valid regex")
});
static ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z-]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#)
        .expect("valid regex")
});

const RULE: &str = "────────────────────────────────";

fn attr<'a>(attrs: &'a str, name: &str) -> Option<&'a str> {
    ATTR.captures_iter(attrs).find_map(|caps| {
        if !caps[1].eq_ignore_ascii_case(name) {
            return None;
        }
        Some(
            caps.get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map_or("", |m| m.as_str()),
        )
    })
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

#[derive(Default)]
struct Builder {
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    styles: Vec<(String, Style)>,
    lists: Vec<Option<u64>>,
    quote_depth: usize,
    in_pre: bool,
}

impl Builder {
    fn style(&self) -> Style {
        self.styles
            .iter()
            .fold(Style::default(), |acc, (_, style)| acc.patch(*style))
    }

    fn push_text(&mut self, text: &str) {
        if self.current.is_empty() && self.quote_depth > 0 {
            self.current.push(Span::styled(
                "│ ".repeat(self.quote_depth),
                Style::default().fg(Color::DarkGray),
            ));
        }
        self.current.push(Span::styled(text.to_string(), self.style()));
    }

    fn text(&mut self, raw: &str) {
        let text = unescape(raw);
        if self.in_pre {
            let mut parts = text.split('\n').peekable();
            while let Some(part) = parts.next() {
                if !part.is_empty() {
                    self.push_text(part);
                }
                if parts.peek().is_some() {
                    self.break_line();
                }
            }
            return;
        }

        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let leading = text.starts_with(char::is_whitespace) && !self.current.is_empty();
        let trailing = text.ends_with(char::is_whitespace) && !collapsed.is_empty();
        if collapsed.is_empty() {
            if leading {
                self.push_text(" ");
            }
            return;
        }
        let mut out = String::new();
        if leading {
            out.push(' ');
        }
        out.push_str(&collapsed);
        if trailing {
            out.push(' ');
        }
        self.push_text(&out);
    }

    /// End the current line, even if it is empty.
    fn break_line(&mut self) {
        let spans = std::mem::take(&mut self.current);
        self.lines.push(Line::from(spans));
    }

    /// End the current line if anything is on it.
    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.break_line();
        }
    }

    /// Close a block and leave one blank line after it.
    fn end_block(&mut self) {
        self.flush();
        if self.lists.is_empty() && self.lines.last().is_some_and(|l| l.width() > 0) {
            self.lines.push(Line::default());
        }
    }

    fn open(&mut self, tag: &str, attrs: &str) {
        match tag {
            "p" | "div" | "table" => {
                self.flush();
                if attr(attrs, "class").is_some_and(|c| c.split_whitespace().any(|c| c == "load-error")) {
                    self.styles.push((tag.to_string(), Style::default().fg(Color::Red)));
                }
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                self.flush();
                self.styles.push((
                    tag.to_string(),
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                ));
                let level = tag[1..].parse::<usize>().unwrap_or(1);
                self.push_text(&format!("{} ", "#".repeat(level)));
            }
            "pre" => {
                self.flush();
                self.in_pre = true;
                // Set by the modal's formatting pass.
                let formatted = attr(attrs, "style").is_some_and(|s| s.contains("white-space: pre"));
                let style = if formatted {
                    Style::default().fg(Color::Yellow)
                } else {
                    Style::default()
                };
                self.styles.push((tag.to_string(), style));
            }
            "code" if !self.in_pre => {
                self.styles
                    .push((tag.to_string(), Style::default().fg(Color::Yellow)));
            }
            "strong" | "b" => self
                .styles
                .push((tag.to_string(), Style::default().add_modifier(Modifier::BOLD))),
            "em" | "i" => self
                .styles
                .push((tag.to_string(), Style::default().add_modifier(Modifier::ITALIC))),
            "del" | "s" => self.styles.push((
                tag.to_string(),
                Style::default().add_modifier(Modifier::CROSSED_OUT),
            )),
            "a" => self.styles.push((
                tag.to_string(),
                Style::default()
                    .fg(Color::Blue)
                    .add_modifier(Modifier::UNDERLINED),
            )),
            "ul" => {
                self.flush();
                self.lists.push(None);
            }
            "ol" => {
                self.flush();
                let start = attr(attrs, "start").and_then(|s| s.parse().ok()).unwrap_or(1);
                self.lists.push(Some(start));
            }
            "li" => {
                self.flush();
                let indent = "  ".repeat(self.lists.len().saturating_sub(1));
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{}{}. ", indent, n);
                        *n += 1;
                        marker
                    }
                    _ => format!("{}• ", indent),
                };
                self.current
                    .push(Span::styled(marker, Style::default().fg(Color::DarkGray)));
            }
            "blockquote" => {
                self.flush();
                self.quote_depth += 1;
            }
            "td" | "th" if !self.current.is_empty() => {
                self.current
                    .push(Span::styled(" │ ", Style::default().fg(Color::DarkGray)));
            }
            "br" => self.break_line(),
            "hr" => {
                self.flush();
                self.lines.push(Line::from(Span::styled(
                    RULE,
                    Style::default().fg(Color::DarkGray),
                )));
                self.lines.push(Line::default());
            }
            "img" => {
                let alt = attr(attrs, "alt").unwrap_or("image");
                self.push_text(&format!("[{}]", unescape(alt)));
            }
            "input" => {
                let mark = if attr(attrs, "checked").is_some() { "[x] " } else { "[ ] " };
                self.push_text(mark);
            }
            _ => {}
        }
    }

    fn close(&mut self, tag: &str) {
        if let Some(pos) = self.styles.iter().rposition(|(t, _)| t == tag) {
            self.styles.truncate(pos);
        }
        match tag {
            "p" | "div" | "table" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => self.end_block(),
            "pre" => {
                self.in_pre = false;
                self.end_block();
            }
            "ul" | "ol" => {
                self.lists.pop();
                self.end_block();
            }
            "li" | "tr" => self.flush(),
            "blockquote" => {
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.end_block();
            }
            _ => {}
        }
    }

    fn finish(mut self) -> Text<'static> {
        self.flush();
        while self.lines.last().is_some_and(|l| l.width() == 0) {
            self.lines.pop();
        }
        Text::from(self.lines)
    }
}

/// Convert body HTML into styled terminal text.
pub fn html_text(html: &str) -> Text<'static> {
    let mut builder = Builder::default();
    let mut last = 0;
    for caps in TAG.captures_iter(html) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        builder.text(&html[last..whole.start()]);
        last = whole.end();
        let Some(name) = caps.get(2) else {
            continue;
        };
        let tag = name.as_str().to_ascii_lowercase();
        let attrs = caps.get(3).map_or("", |m| m.as_str());
        if &caps[1] == "/" {
            builder.close(&tag);
        } else {
            builder.open(&tag, attrs);
        }
    }
    builder.text(&html[last..]);
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modal::format_code_blocks;
    use crate::render::{MarkdownEngine, RichTextEngine};

    fn plain(text: &Text) -> Vec<String> {
        text.lines
            .iter()
            .map(|line| line.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn test_heading_and_paragraph() {
        let text = html_text("<h1>Heading</h1>\n<p>Body   text\nwraps</p>\n");
        assert_eq!(plain(&text), vec!["# Heading", "", "Body text wraps"]);
        assert!(text.lines[0].spans[1].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_entities_are_unescaped() {
        let text = html_text("<p>a &lt; b &amp;&amp; c</p>");
        assert_eq!(plain(&text), vec!["a < b && c"]);
    }

    #[test]
    fn test_pre_keeps_lines() {
        let text = html_text("<pre><code>fn main() {\n    x();\n}\n</code></pre>\n<p>after</p>");
        assert_eq!(plain(&text), vec!["fn main() {", "    x();", "}", "", "after"]);
    }

    #[test]
    fn test_formatted_pre_is_styled() {
        let raw = "<pre><code>x</code></pre>";
        let before = html_text(raw);
        let after = html_text(&format_code_blocks(raw));
        assert_eq!(before.lines[0].spans[0].style.fg, None);
        assert_eq!(after.lines[0].spans[0].style.fg, Some(Color::Yellow));
    }

    #[test]
    fn test_lists() {
        let text = html_text("<ul>\n<li>one</li>\n<li>two</li>\n</ul>\n<ol start=\"3\"><li>c</li></ol>");
        assert_eq!(plain(&text), vec!["• one", "• two", "", "3. c"]);
    }

    #[test]
    fn test_load_error_is_red() {
        let text = html_text("<p class=\"load-error\">The article could not be loaded.</p>");
        assert_eq!(text.lines[0].spans[0].style.fg, Some(Color::Red));
    }

    #[test]
    fn test_breaks_follow_engine_output() {
        let html = MarkdownEngine::default().render("line one\nline two");
        assert_eq!(plain(&html_text(&html)), vec!["line one line two"]);

        let html = "<p>line one<br />\nline two</p>";
        assert_eq!(plain(&html_text(html)), vec!["line one", "line two"]);
    }
}
