use serde::Serialize;

/// Display metadata for one article. The catalog is authoritative for these
/// fields; the metadata block inside the source file is informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleMetadata {
    pub title: &'static str,
    pub description: &'static str,
    pub published_label: &'static str,
    pub estimated_read_time: &'static str,
    pub category: &'static str,
    pub slug: &'static str,
    pub source_path: &'static str,
    pub image_path: &'static str,
}

/// Articles published on the site, newest first.
pub const ARTICLES: &[ArticleMetadata] = &[
    ArticleMetadata {
        title: "Building a Lock-Free Ring Buffer",
        description: "A single-producer, single-consumer queue with nothing but two atomic indices.",
        published_label: "Mar 2025",
        estimated_read_time: "9 min read",
        category: "Systems",
        slug: "ring_buffer",
        source_path: "blog/ring_buffer.md",
        image_path: "assets/images/blog-ring-buffer.png",
    },
    ArticleMetadata {
        title: "What a TCP State Machine Taught Me",
        description: "Walking through the eleven states while writing a toy userspace stack.",
        published_label: "Jan 2025",
        estimated_read_time: "12 min read",
        category: "Networking",
        slug: "tcp_state_machine",
        source_path: "blog/tcp_state_machine.md",
        image_path: "assets/images/blog-tcp.png",
    },
    ArticleMetadata {
        title: "Bloom Filters in Practice",
        description: "Sizing, hashing and the false-positive rate you actually get.",
        published_label: "Nov 2024",
        estimated_read_time: "7 min read",
        category: "Algorithms",
        slug: "bloom_filters",
        source_path: "blog/bloom_filters.md",
        image_path: "assets/images/blog-bloom.png",
    },
    ArticleMetadata {
        title: "Error Handling Without Tears",
        description: "Typed errors at library seams, context at the edges.",
        published_label: "Aug 2024",
        estimated_read_time: "6 min read",
        category: "Systems",
        slug: "error_handling",
        source_path: "blog/error_handling.md",
        image_path: "assets/images/blog-errors.png",
    },
    ArticleMetadata {
        title: "Consistent Hashing From Scratch",
        description: "Rings, virtual nodes and what happens when a shard disappears.",
        published_label: "May 2024",
        estimated_read_time: "10 min read",
        category: "Distributed",
        slug: "consistent_hashing",
        source_path: "blog/consistent_hashing.md",
        image_path: "assets/images/blog-hashing.png",
    },
];

/// Fixed, ordered list of article metadata.
#[derive(Debug, Clone, Copy)]
pub struct ArticleCatalog {
    entries: &'static [ArticleMetadata],
}

impl ArticleCatalog {
    pub const fn new(entries: &'static [ArticleMetadata]) -> Self {
        Self { entries }
    }

    /// The site's built-in catalog.
    pub const fn builtin() -> Self {
        Self::new(ARTICLES)
    }

    /// All entries in catalog order. Each call starts from the beginning.
    pub fn list(&self) -> &'static [ArticleMetadata] {
        self.entries
    }

    pub fn find(&self, slug: &str) -> Option<&'static ArticleMetadata> {
        self.entries.iter().find(|a| a.slug == slug)
    }

    /// Distinct categories in first-seen order.
    pub fn categories(&self) -> Vec<&'static str> {
        let mut out: Vec<&'static str> = Vec::new();
        for article in self.entries {
            if !out.iter().any(|c| c.eq_ignore_ascii_case(article.category)) {
                out.push(article.category);
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Default for ArticleCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_list_is_restartable() {
        let catalog = ArticleCatalog::builtin();
        let first: Vec<&str> = catalog.list().iter().map(|a| a.slug).collect();
        let second: Vec<&str> = catalog.list().iter().map(|a| a.slug).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), catalog.len());
    }

    #[test]
    fn test_slugs_are_unique() {
        let slugs: HashSet<&str> = ARTICLES.iter().map(|a| a.slug).collect();
        assert_eq!(slugs.len(), ARTICLES.len());
    }

    #[test]
    fn test_find() {
        let catalog = ArticleCatalog::builtin();
        let article = catalog.find("ring_buffer").unwrap();
        assert_eq!(article.source_path, "blog/ring_buffer.md");
        assert!(catalog.find("missing").is_none());
    }

    #[test]
    fn test_categories_are_distinct_and_ordered() {
        let catalog = ArticleCatalog::builtin();
        assert_eq!(
            catalog.categories(),
            vec!["Systems", "Networking", "Algorithms", "Distributed"]
        );
    }
}
