//! Compare the metadata blocks inside article sources with the catalog.
//!
//! The catalog is what the site displays; this only reports where the two
//! have drifted apart.

use std::fmt;

use chrono::NaiveDate;
use tracing::debug;

use crate::catalog::{ArticleCatalog, ArticleMetadata};
use crate::frontmatter;
use crate::loader::ArticleSource;

/// A disagreement between one source file and its catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    Unreachable { reason: String },
    NoMetadataBlock,
    Mismatch {
        field: &'static str,
        catalog: String,
        file: String,
    },
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::Unreachable { reason } => write!(f, "source unreachable: {}", reason),
            Finding::NoMetadataBlock => write!(f, "no metadata block"),
            Finding::Mismatch {
                field,
                catalog,
                file,
            } => write!(f, "{}: catalog has '{}', file has '{}'", field, catalog, file),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleAudit {
    pub slug: &'static str,
    pub findings: Vec<Finding>,
}

impl ArticleAudit {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Check every catalog entry against its source file.
pub async fn audit(catalog: &ArticleCatalog, source: &dyn ArticleSource) -> Vec<ArticleAudit> {
    let mut out = Vec::with_capacity(catalog.len());
    for meta in catalog.list() {
        let findings = match source.fetch(meta.source_path).await {
            Ok(text) => compare(meta, &text),
            Err(e) => vec![Finding::Unreachable {
                reason: e.to_string(),
            }],
        };
        debug!("{}: {} findings", meta.slug, findings.len());
        out.push(ArticleAudit {
            slug: meta.slug,
            findings,
        });
    }
    out
}

/// Findings for one source text.
pub fn compare(meta: &ArticleMetadata, text: &str) -> Vec<Finding> {
    let parsed = frontmatter::parse(text);
    if !parsed.has_block {
        return vec![Finding::NoMetadataBlock];
    }

    let mut findings = Vec::new();
    let mut check = |field: &'static str, catalog: &str, same: bool, file: &str| {
        if !same {
            findings.push(Finding::Mismatch {
                field,
                catalog: catalog.to_string(),
                file: file.to_string(),
            });
        }
    };

    if let Some(title) = parsed.get("title") {
        check("title", meta.title, title == meta.title, title);
    }
    if let Some(category) = parsed.get("category") {
        check(
            "category",
            meta.category,
            category.eq_ignore_ascii_case(meta.category),
            category,
        );
    }
    if let Some(date) = parsed.get("date") {
        check(
            "date",
            meta.published_label,
            date_matches_label(date, meta.published_label),
            date,
        );
    }
    findings
}

/// `2025-03-14` matches the label `Mar 2025`; anything unparseable has to
/// match the label verbatim.
fn date_matches_label(date: &str, label: &str) -> bool {
    match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        Ok(day) => day.format("%b %Y").to_string() == label,
        Err(_) => date == label,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::tests::StubSource;

    fn ring_buffer() -> &'static ArticleMetadata {
        ArticleCatalog::builtin().find("ring_buffer").unwrap()
    }

    #[test]
    fn test_matching_block_is_clean() {
        let text = "---\ntitle: Building a Lock-Free Ring Buffer\ncategory: systems\ndate: 2025-03-14\n---\nbody";
        assert!(compare(ring_buffer(), text).is_empty());
    }

    #[test]
    fn test_mismatches_are_reported() {
        let text = "---\ntitle: Ring Buffers\ncategory: Networking\ndate: 2024-12-01\n---\nbody";
        let findings = compare(ring_buffer(), text);
        let fields: Vec<&str> = findings
            .iter()
            .filter_map(|f| match f {
                Finding::Mismatch { field, .. } => Some(*field),
                _ => None,
            })
            .collect();
        assert_eq!(fields, vec!["title", "category", "date"]);
        assert!(findings[0].to_string().contains("Ring Buffers"));
    }

    #[test]
    fn test_missing_block() {
        assert_eq!(compare(ring_buffer(), "# Just a body"), vec![Finding::NoMetadataBlock]);
    }

    #[tokio::test]
    async fn test_audit_covers_every_entry() {
        let source = StubSource::with(&[(
            "blog/ring_buffer.md",
            "---\ntitle: Building a Lock-Free Ring Buffer\n---\nbody",
        )]);
        let catalog = ArticleCatalog::builtin();
        let results = audit(&catalog, &source).await;
        assert_eq!(results.len(), catalog.len());
        assert!(results[0].is_clean());
        assert!(matches!(results[1].findings[0], Finding::Unreachable { .. }));
    }
}
