//! Builds the element tree for a site and defines the attribute contract the
//! controllers rely on.

use crate::catalog::{ArticleCatalog, ArticleMetadata};
use crate::config::{SectionConfig, SiteConfig};
use crate::dom::{Document, NodeId};

pub const ATTR_SIDEBAR: &str = "data-sidebar";
pub const ATTR_SIDEBAR_BTN: &str = "data-sidebar-btn";
pub const ATTR_NAV_LINK: &str = "data-nav-link";
pub const ATTR_PAGE: &str = "data-page";
pub const ATTR_SECTION: &str = "data-section";
pub const ATTR_SELECT: &str = "data-select";
pub const ATTR_SELECT_VALUE: &str = "data-select-value";
pub const ATTR_SELECT_LIST: &str = "data-select-list";
pub const ATTR_SELECT_ITEM: &str = "data-select-item";
pub const ATTR_FILTER_BTN: &str = "data-filter-btn";
pub const ATTR_FILTER_ITEM: &str = "data-filter-item";
pub const ATTR_CATEGORY: &str = "data-category";
pub const ATTR_ITEM_LIST: &str = "data-item-list";
pub const ATTR_ARTICLE_LIST: &str = "data-article-list";
pub const ATTR_SLUG: &str = "data-slug";

/// Build the full document for `config`. The article listing is left empty;
/// it is filled in on first activation of its page.
pub fn build(config: &SiteConfig, catalog: &ArticleCatalog) -> Document {
    let mut doc = Document::new();
    let root = doc.root();

    // ── Sidebar ──
    let sidebar = doc.el(root, "aside", &[(ATTR_SIDEBAR, "")]);
    let toggle = doc.el(sidebar, "button", &[(ATTR_SIDEBAR_BTN, "")]);
    doc.set_text(toggle, "Show contacts");
    let name = doc.el(sidebar, "h1", &[]);
    doc.set_text(name, &config.title);
    let contacts = doc.el(sidebar, "ul", &[]);
    for entry in &config.sidebar {
        let li = doc.el(contacts, "li", &[]);
        doc.set_text(li, &format!("{}: {}", entry.label, entry.value));
    }

    // ── Navigation ──
    let nav = doc.el(root, "nav", &[]);
    for page in &config.pages {
        let link = doc.el(nav, "button", &[(ATTR_NAV_LINK, page.id.as_str())]);
        doc.set_text(link, &page.label);
    }

    // ── Pages ──
    let main = doc.el(root, "main", &[]);
    for page in &config.pages {
        let article = doc.el(main, "article", &[(ATTR_PAGE, page.id.as_str())]);
        let heading = doc.el(article, "h2", &[]);
        doc.set_text(heading, &page.label);
        if !page.blurb.is_empty() {
            let blurb = doc.el(article, "p", &[]);
            doc.set_text(blurb, &page.blurb);
        }
        for section in config.sections.iter().filter(|s| s.page == page.id) {
            build_section(&mut doc, article, config, section, catalog);
        }
    }

    doc
}

fn build_section(
    doc: &mut Document,
    page: NodeId,
    config: &SiteConfig,
    section: &SectionConfig,
    catalog: &ArticleCatalog,
) {
    let id = section.id.as_str();
    let categories = config.section_categories(section, catalog);
    let container = doc.el(page, "section", &[(ATTR_SECTION, id)]);
    let heading = doc.el(container, "h3", &[]);
    doc.set_text(heading, &section.label);

    // Dropdown: display slot plus option list.
    let select = doc.el(container, "div", &[(ATTR_SELECT, id)]);
    let value = doc.el(select, "button", &[(ATTR_SELECT_VALUE, id)]);
    doc.set_text(value, "Select category");
    let options = doc.el(select, "ul", &[(ATTR_SELECT_LIST, id)]);
    for (category, label) in &categories {
        let option = doc.el(
            options,
            "li",
            &[(ATTR_SELECT_ITEM, category.as_str()), (ATTR_SECTION, id)],
        );
        doc.set_text(option, label);
    }

    // Button group.
    let buttons = doc.el(container, "ul", &[]);
    for (category, label) in &categories {
        let li = doc.el(buttons, "li", &[]);
        let button = doc.el(
            li,
            "button",
            &[(ATTR_FILTER_BTN, category.as_str()), (ATTR_SECTION, id)],
        );
        doc.set_text(button, label);
    }

    if section.catalog {
        doc.el(container, "ul", &[(ATTR_ARTICLE_LIST, id)]);
    } else {
        let list = doc.el(container, "ul", &[(ATTR_ITEM_LIST, id)]);
        for item in &section.items {
            let li = doc.el(
                list,
                "li",
                &[(ATTR_FILTER_ITEM, id), (ATTR_CATEGORY, item.category.as_str())],
            );
            doc.set_text(li, &item.title);
            if !item.summary.is_empty() {
                let summary = doc.el(li, "p", &[]);
                doc.set_text(summary, &item.summary);
            }
        }
    }
}

/// Append one article card to a catalog listing.
pub fn article_card(
    doc: &mut Document,
    list: NodeId,
    section: &str,
    meta: &ArticleMetadata,
) -> NodeId {
    let card = doc.el(
        list,
        "li",
        &[
            (ATTR_FILTER_ITEM, section),
            (ATTR_CATEGORY, meta.category),
            (ATTR_SLUG, meta.slug),
        ],
    );
    doc.el(card, "img", &[("src", meta.image_path), ("alt", meta.title)]);
    let title = doc.el(card, "h4", &[]);
    doc.set_text(title, meta.title);
    let details = doc.el(card, "p", &[]);
    doc.add_class(details, "meta");
    doc.set_text(
        details,
        &format!(
            "{} · {} · {}",
            meta.category, meta.published_label, meta.estimated_read_time
        ),
    );
    let description = doc.el(card, "p", &[]);
    doc.set_text(description, meta.description);
    card
}

#[cfg(test)]
mod tests {
    use super::*;

    fn built() -> Document {
        build(&SiteConfig::default(), &ArticleCatalog::builtin())
    }

    #[test]
    fn test_every_page_has_a_nav_link() {
        let doc = built();
        let pages: Vec<&str> = doc
            .query_all(ATTR_PAGE)
            .into_iter()
            .filter_map(|id| doc.attr(id, ATTR_PAGE))
            .collect();
        let links: Vec<&str> = doc
            .query_all(ATTR_NAV_LINK)
            .into_iter()
            .filter_map(|id| doc.attr(id, ATTR_NAV_LINK))
            .collect();
        assert_eq!(pages, links);
        assert_eq!(pages, vec!["about", "resume", "portfolio", "blog", "contact"]);
    }

    #[test]
    fn test_portfolio_items_live_inside_their_page() {
        let doc = built();
        let page = doc.first_with(ATTR_PAGE, "portfolio").unwrap();
        let items = doc.query_attr(ATTR_FILTER_ITEM, "portfolio");
        assert_eq!(items.len(), 5);
        assert!(items.iter().all(|i| doc.is_within(*i, page)));
    }

    #[test]
    fn test_catalog_listing_starts_empty() {
        let doc = built();
        let list = doc.first_with(ATTR_ARTICLE_LIST, "articles").unwrap();
        assert!(doc.children(list).is_empty());
        let buttons = doc.query_attr(ATTR_SECTION, "articles");
        assert!(buttons.iter().any(|b| doc.attr(*b, ATTR_FILTER_BTN) == Some("systems")));
    }

    #[test]
    fn test_article_card_attributes() {
        let mut doc = built();
        let list = doc.first_with(ATTR_ARTICLE_LIST, "articles").unwrap();
        let meta = ArticleCatalog::builtin().list()[0];
        let card = article_card(&mut doc, list, "articles", &meta);
        let details = doc.children(card)[2];
        assert!(doc.has_class(details, "meta"));
        assert_eq!(doc.attr(details, "class"), None);
        assert_eq!(doc.attr(card, ATTR_SLUG), Some("ring_buffer"));
        assert_eq!(doc.attr(card, ATTR_CATEGORY), Some("Systems"));
        assert_eq!(doc.attr(card, ATTR_FILTER_ITEM), Some("articles"));
    }
}
