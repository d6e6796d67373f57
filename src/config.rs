//! Site description: pages, filterable sections and where articles live.
//!
//! Loaded from `site.toml` (an explicit `--config` path, or the user config
//! directory), falling back to the built-in site.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::ArticleCatalog;
use crate::error::SiteError;
use crate::render::{CodeBlockRendering, EngineOptions, LineBreaks, MarkdownEngine, RichTextEngine};

/// Category value meaning "no filtering".
pub const ALL_CATEGORY: &str = "all";

/// A top-level page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageConfig {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub blurb: String,
}

/// One filterable item of a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemConfig {
    pub title: String,
    pub category: String,
    #[serde(default)]
    pub summary: String,
}

/// A filterable collection living on one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionConfig {
    pub id: String,
    pub page: String,
    pub label: String,
    /// Items come from the article catalog instead of `items`.
    #[serde(default)]
    pub catalog: bool,
    #[serde(default)]
    pub items: Vec<ItemConfig>,
}

/// A label/value line in the sidebar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidebarEntry {
    pub label: String,
    pub value: String,
}

/// Markdown conversion settings (`[render]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// With this off, articles show a "renderer not available" message.
    pub enabled: bool,
    pub newlines_as_breaks: bool,
    pub smart_punctuation: bool,
    pub sanitize_html: bool,
    pub heading_ids: bool,
    /// Leave code blocks to pulldown-cmark instead of escaping them ourselves.
    pub engine_code_blocks: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            newlines_as_breaks: false,
            smart_punctuation: false,
            sanitize_html: false,
            heading_ids: false,
            engine_code_blocks: false,
        }
    }
}

impl RenderConfig {
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            code_blocks: if self.engine_code_blocks {
                CodeBlockRendering::Engine
            } else {
                CodeBlockRendering::CustomEscaping
            },
            line_breaks: if self.newlines_as_breaks {
                LineBreaks::Newlines
            } else {
                LineBreaks::LiteralOnly
            },
            typographic_substitution: self.smart_punctuation,
            sanitize_html: self.sanitize_html,
            heading_ids: self.heading_ids,
            ..EngineOptions::default()
        }
    }

    pub fn engine(&self) -> Option<Arc<dyn RichTextEngine>> {
        self.enabled
            .then(|| Arc::new(MarkdownEngine::new(self.engine_options())) as Arc<dyn RichTextEngine>)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub title: String,
    pub default_page: String,
    /// Base URL or directory that article source paths are relative to.
    pub article_base: String,
    #[serde(default)]
    pub sidebar: Vec<SidebarEntry>,
    pub pages: Vec<PageConfig>,
    #[serde(default)]
    pub sections: Vec<SectionConfig>,
    #[serde(default)]
    pub render: RenderConfig,
}

impl SiteConfig {
    /// Gets the configuration directory path.
    ///
    /// - Linux: `~/.config/sitedeck/`
    /// - macOS: `~/Library/Application Support/dev.sitedeck.sitedeck/`
    /// - Windows: `%APPDATA%\sitedeck\sitedeck\config\`
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "sitedeck", "sitedeck")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Directory for logs and named sessions.
    pub fn cache_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "sitedeck", "sitedeck")
            .map(|dirs| dirs.cache_dir().to_path_buf())
    }

    /// Load from `path`, or from the config dir, or fall back to the
    /// built-in site.
    pub fn load(path: Option<&Path>) -> Result<Self, SiteError> {
        let candidate = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Self::config_dir()
                .map(|dir| dir.join("site.toml"))
                .filter(|p| p.exists()),
        };

        match candidate {
            Some(p) => {
                info!("Loading site config from {}", p.display());
                let text = std::fs::read_to_string(&p)?;
                Self::from_toml(&text)
            }
            None => {
                debug!("No site.toml found, using the built-in site");
                Ok(Self::default())
            }
        }
    }

    pub fn from_toml(text: &str) -> Result<Self, SiteError> {
        let config: SiteConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SiteError> {
        if self.pages.is_empty() {
            return Err(SiteError::Config("at least one page is required".into()));
        }
        let mut page_ids = HashSet::new();
        for page in &self.pages {
            if !page_ids.insert(page.id.as_str()) {
                return Err(SiteError::Config(format!("duplicate page id '{}'", page.id)));
            }
        }
        if !page_ids.contains(self.default_page.as_str()) {
            return Err(SiteError::Config(format!(
                "default page '{}' is not one of the pages",
                self.default_page
            )));
        }

        let mut section_ids = HashSet::new();
        let mut pages_with_sections = HashSet::new();
        for section in &self.sections {
            if !section_ids.insert(section.id.as_str()) {
                return Err(SiteError::Config(format!(
                    "duplicate section id '{}'",
                    section.id
                )));
            }
            if !page_ids.contains(section.page.as_str()) {
                return Err(SiteError::Config(format!(
                    "section '{}' refers to unknown page '{}'",
                    section.id, section.page
                )));
            }
            if !pages_with_sections.insert(section.page.as_str()) {
                return Err(SiteError::Config(format!(
                    "page '{}' has more than one filterable section",
                    section.page
                )));
            }
        }
        if self.sections.iter().filter(|s| s.catalog).count() > 1 {
            return Err(SiteError::Config(
                "only one section may list the article catalog".into(),
            ));
        }
        Ok(())
    }

    /// The section listing the article catalog.
    pub fn catalog_section(&self) -> Option<&SectionConfig> {
        self.sections.iter().find(|s| s.catalog)
    }

    /// Filter categories for a section as (value, label) pairs, `all` first.
    pub fn section_categories(
        &self,
        section: &SectionConfig,
        catalog: &ArticleCatalog,
    ) -> Vec<(String, String)> {
        let mut labels: Vec<&str> = Vec::new();
        if section.catalog {
            labels.extend(catalog.categories());
        } else {
            for item in &section.items {
                if !labels.iter().any(|l| l.eq_ignore_ascii_case(&item.category)) {
                    labels.push(&item.category);
                }
            }
        }

        let mut out = vec![(ALL_CATEGORY.to_string(), "All".to_string())];
        out.extend(labels.into_iter().map(|l| (l.to_lowercase(), l.to_string())));
        out
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        let page = |id: &str, label: &str, blurb: &str| PageConfig {
            id: id.to_string(),
            label: label.to_string(),
            blurb: blurb.to_string(),
        };
        let item = |title: &str, category: &str, summary: &str| ItemConfig {
            title: title.to_string(),
            category: category.to_string(),
            summary: summary.to_string(),
        };

        Self {
            title: "Personal site".to_string(),
            default_page: "about".to_string(),
            article_base: ".".to_string(),
            sidebar: vec![
                SidebarEntry {
                    label: "Email".to_string(),
                    value: "hello@example.com".to_string(),
                },
                SidebarEntry {
                    label: "Location".to_string(),
                    value: "Remote".to_string(),
                },
            ],
            pages: vec![
                page("about", "About", "Systems programmer who likes small, fast tools."),
                page("resume", "Resume", "Ten years of backend, storage and networking work."),
                page("portfolio", "Portfolio", "Things I have built."),
                page("blog", "Blog", "Notes on systems, networking and algorithms."),
                page("contact", "Contact", "Say hello."),
            ],
            sections: vec![
                SectionConfig {
                    id: "portfolio".to_string(),
                    page: "portfolio".to_string(),
                    label: "Projects".to_string(),
                    catalog: false,
                    items: vec![
                        item("Packet inspector", "Applications", "Live pcap viewer for the terminal."),
                        item("Static site builder", "Web development", "Markdown in, HTML out."),
                        item("Portfolio theme", "Web design", "A single-page theme with filters."),
                        item("Log shipper", "Applications", "Tails files and batches them upstream."),
                        item("Status dashboard", "Web development", "Uptime checks with a tiny UI."),
                    ],
                },
                SectionConfig {
                    id: "articles".to_string(),
                    page: "blog".to_string(),
                    label: "Articles".to_string(),
                    catalog: true,
                    items: Vec::new(),
                },
            ],
            render: RenderConfig::default(),
        }
    }
}
