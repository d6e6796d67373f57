use std::collections::BTreeMap;

/// Line that opens and closes a metadata block.
pub const MARKER: &str = "---";

/// Informational fields parsed from a leading metadata block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontMatter<'a> {
    pub fields: BTreeMap<String, String>,
    pub body: &'a str,
    pub has_block: bool,
}

impl FrontMatter<'_> {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

/// Split `text` into (block contents, body) if it opens with a marker line
/// and has a closing marker line later on.
fn split_block(text: &str) -> Option<(&str, &str)> {
    let mut offset = 0;
    let mut block_start = None;
    for line in text.split_inclusive('\n') {
        let bare = line.trim_end_matches('\n').trim_end_matches('\r');
        match block_start {
            None => {
                if bare != MARKER {
                    return None;
                }
                block_start = Some(offset + line.len());
            }
            Some(start) if bare == MARKER => {
                return Some((&text[start..offset], &text[offset + line.len()..]));
            }
            Some(_) => {}
        }
        offset += line.len();
    }
    None
}

/// Remove the leading metadata block, up to and including its closing marker
/// line. Text without a complete block is returned unchanged.
pub fn strip_metadata_block(text: &str) -> &str {
    split_block(text).map(|(_, body)| body).unwrap_or(text)
}

/// Parse the simple `key: value` lines of a leading metadata block.
pub fn parse(text: &str) -> FrontMatter<'_> {
    let Some((block, body)) = split_block(text) else {
        return FrontMatter {
            fields: BTreeMap::new(),
            body: text,
            has_block: false,
        };
    };

    let mut fields = BTreeMap::new();
    for line in block.lines() {
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            fields.insert(key.to_string(), unquote(value.trim()).to_string());
        }
    }

    FrontMatter {
        fields,
        body,
        has_block: true,
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_block() {
        let text = "---\ntitle: X\n---\n# Heading\nBody text";
        assert_eq!(strip_metadata_block(text), "# Heading\nBody text");
    }

    #[test]
    fn test_strip_only_up_to_second_marker() {
        let text = "---\na: 1\n---\nintro\n---\nmore";
        assert_eq!(strip_metadata_block(text), "intro\n---\nmore");
    }

    #[test]
    fn test_crlf_markers() {
        let text = "---\r\ntitle: X\r\n---\r\nBody";
        assert_eq!(strip_metadata_block(text), "Body");
    }

    #[test]
    fn test_no_block_is_untouched() {
        let text = "# Heading\n---\nBody";
        assert_eq!(strip_metadata_block(text), text);
    }

    #[test]
    fn test_unclosed_block_is_untouched() {
        let text = "---\ntitle: X\n# Heading";
        assert_eq!(strip_metadata_block(text), text);
    }

    #[test]
    fn test_marker_must_be_whole_line() {
        let text = "----\ntitle: X\n---\nBody";
        assert_eq!(strip_metadata_block(text), text);
    }

    #[test]
    fn test_closing_marker_at_eof() {
        assert_eq!(strip_metadata_block("---\ntitle: X\n---"), "");
    }

    #[test]
    fn test_parse_fields() {
        let text = "---\ntitle: \"Ring: Buffers\"\ncategory: Systems\nnot a field\n---\nBody";
        let fm = parse(text);
        assert!(fm.has_block);
        assert_eq!(fm.get("title"), Some("Ring: Buffers"));
        assert_eq!(fm.get("category"), Some("Systems"));
        assert_eq!(fm.fields.len(), 2);
        assert_eq!(fm.body, "Body");
    }

    #[test]
    fn test_parse_without_block() {
        let fm = parse("plain");
        assert!(!fm.has_block);
        assert!(fm.fields.is_empty());
        assert_eq!(fm.body, "plain");
    }
}
