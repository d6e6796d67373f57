use std::collections::HashMap;

use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd, html};

use crate::dom::escape_html;

/// How fenced and indented code blocks are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeBlockRendering {
    /// Escape the contents ourselves and keep the language tag as a class.
    CustomEscaping,
    /// Leave code blocks to the engine.
    Engine,
}

/// How single newlines inside a paragraph are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineBreaks {
    /// Only explicit hard breaks produce `<br>`.
    LiteralOnly,
    /// Every newline produces `<br>`.
    Newlines,
}

/// Options recognised by the conversion engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub code_blocks: CodeBlockRendering,
    pub line_breaks: LineBreaks,
    pub gfm: bool,
    pub typographic_substitution: bool,
    pub sanitize_html: bool,
    pub heading_ids: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            code_blocks: CodeBlockRendering::CustomEscaping,
            line_breaks: LineBreaks::LiteralOnly,
            gfm: true,
            typographic_substitution: false,
            // Article bodies are authored by the site owner.
            sanitize_html: false,
            heading_ids: false,
        }
    }
}

/// A pluggable markdown-to-HTML conversion engine.
pub trait RichTextEngine: Send + Sync {
    fn name(&self) -> &str;
    fn render(&self, markdown: &str) -> String;
}

/// Default engine, backed by pulldown-cmark.
#[derive(Debug, Clone, Default)]
pub struct MarkdownEngine {
    options: EngineOptions,
}

impl MarkdownEngine {
    pub fn new(options: EngineOptions) -> Self {
        Self { options }
    }

    fn parser_options(&self) -> Options {
        let mut options = Options::empty();
        if self.options.gfm {
            options |= Options::ENABLE_TABLES
                | Options::ENABLE_STRIKETHROUGH
                | Options::ENABLE_TASKLISTS
                | Options::ENABLE_FOOTNOTES
                | Options::ENABLE_GFM;
        }
        if self.options.typographic_substitution {
            options |= Options::ENABLE_SMART_PUNCTUATION;
        }
        options
    }
}

impl RichTextEngine for MarkdownEngine {
    fn name(&self) -> &str {
        "pulldown-cmark"
    }

    fn render(&self, markdown: &str) -> String {
        let parser = Parser::new_ext(markdown, self.parser_options());
        let mut events: Vec<Event> = Vec::new();
        // (language, contents) of the code block being collected
        let mut code_block: Option<(String, String)> = None;

        for event in parser {
            if let Some((lang, contents)) = code_block.as_mut() {
                match event {
                    Event::Text(text) => contents.push_str(&text),
                    Event::End(TagEnd::CodeBlock) => {
                        let block = code_block_html(lang, contents);
                        events.push(Event::Html(CowStr::from(block)));
                        code_block = None;
                    }
                    _ => {}
                }
                continue;
            }

            match event {
                Event::Start(Tag::CodeBlock(kind))
                    if self.options.code_blocks == CodeBlockRendering::CustomEscaping =>
                {
                    let lang = match kind {
                        CodeBlockKind::Fenced(info) => {
                            info.split_whitespace().next().unwrap_or("").to_string()
                        }
                        CodeBlockKind::Indented => String::new(),
                    };
                    code_block = Some((lang, String::new()));
                }
                Event::SoftBreak if self.options.line_breaks == LineBreaks::Newlines => {
                    events.push(Event::HardBreak);
                }
                Event::Html(raw) | Event::InlineHtml(raw) if self.options.sanitize_html => {
                    events.push(Event::Text(raw));
                }
                other => events.push(other),
            }
        }

        if self.options.heading_ids {
            assign_heading_ids(&mut events);
        }

        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, events.into_iter());
        out
    }
}

fn code_block_html(lang: &str, contents: &str) -> String {
    if lang.is_empty() {
        format!("<pre><code>{}</code></pre>\n", escape_html(contents))
    } else {
        format!(
            "<pre><code class=\"language-{}\">{}</code></pre>\n",
            escape_html(lang),
            escape_html(contents)
        )
    }
}

fn assign_heading_ids(events: &mut [Event<'_>]) {
    let mut seen: HashMap<String, usize> = HashMap::new();
    for i in 0..events.len() {
        if !matches!(&events[i], Event::Start(Tag::Heading { id: None, .. })) {
            continue;
        }
        let mut text = String::new();
        for event in &events[i + 1..] {
            match event {
                Event::End(TagEnd::Heading(_)) => break,
                Event::Text(t) | Event::Code(t) => text.push_str(t),
                _ => {}
            }
        }
        let base = slugify(&text);
        let count = seen.entry(base.clone()).or_insert(0);
        let slug = if *count == 0 {
            base
        } else {
            format!("{}-{}", base, count)
        };
        *count += 1;
        if let Event::Start(Tag::Heading { id, .. }) = &mut events[i] {
            *id = Some(CowStr::from(slug));
        }
    }
}

fn slugify(text: &str) -> String {
    let mut slug = String::new();
    for c in text.trim().chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if (c.is_whitespace() || c == '-') && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(markdown: &str) -> String {
        MarkdownEngine::default().render(markdown)
    }

    #[test]
    fn test_heading_without_id() {
        assert_eq!(render("# Heading\nBody text"), "<h1>Heading</h1>\n<p>Body text</p>\n");
    }

    #[test]
    fn test_code_block_escaped_with_language_class() {
        let html = render("```rust\nif a < b && c > d {}\n```\n");
        assert_eq!(
            html,
            "<pre><code class=\"language-rust\">if a &lt; b &amp;&amp; c &gt; d {}\n</code></pre>\n"
        );
    }

    #[test]
    fn test_code_block_language_uses_first_word() {
        let html = render("```toml title=\"Cargo.toml\"\n[package]\n```\n");
        assert!(html.contains("class=\"language-toml\""));
    }

    #[test]
    fn test_indented_code_block_has_no_class() {
        let html = render("    <tag>\n");
        assert_eq!(html, "<pre><code>&lt;tag&gt;\n</code></pre>\n");
    }

    #[test]
    fn test_single_newline_is_not_a_break() {
        let html = render("line one\nline two");
        assert!(!html.contains("<br"));
        assert!(html.contains("line one\nline two"));
    }

    #[test]
    fn test_newlines_mode_breaks() {
        let engine = MarkdownEngine::new(EngineOptions {
            line_breaks: LineBreaks::Newlines,
            ..EngineOptions::default()
        });
        assert!(engine.render("line one\nline two").contains("<br />"));
    }

    #[test]
    fn test_no_typographic_substitution() {
        let html = render("\"quoted\" -- dash...");
        assert!(!html.contains('\u{201c}'));
        assert!(!html.contains('\u{2013}'));
        assert!(html.contains("--"));
    }

    #[test]
    fn test_gfm_extensions() {
        let html = render("~~gone~~\n\n| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("<del>gone</del>"));
        assert!(html.contains("<table>"));
    }

    #[test]
    fn test_raw_html_passes_through() {
        let html = render("<div class=\"note\">hi</div>\n");
        assert!(html.contains("<div class=\"note\">hi</div>"));
    }

    #[test]
    fn test_sanitize_escapes_raw_html() {
        let engine = MarkdownEngine::new(EngineOptions {
            sanitize_html: true,
            ..EngineOptions::default()
        });
        let html = engine.render("<script>x</script>\n");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_heading_ids_when_enabled() {
        let engine = MarkdownEngine::new(EngineOptions {
            heading_ids: true,
            ..EngineOptions::default()
        });
        let html = engine.render("## Getting Started\n\n## Getting Started\n");
        assert!(html.contains("<h2 id=\"getting-started\">"));
        assert!(html.contains("<h2 id=\"getting-started-1\">"));
    }
}
