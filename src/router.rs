use tracing::{debug, info, warn};

use crate::dom::{CLASS_ACTIVE, Document};
use crate::error::SiteError;
use crate::markup::{ATTR_NAV_LINK, ATTR_PAGE};
use crate::session::{ACTIVE_PAGE_KEY, SessionStore};

/// Which page is currently shown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageState {
    pub current_page: String,
}

/// Result of activating a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageActivation {
    pub page: String,
    pub previous: Option<String>,
    /// The requested id was unknown and a fallback page was shown instead.
    pub fell_back: bool,
}

impl PageActivation {
    pub fn changed(&self) -> bool {
        self.previous.as_deref() != Some(self.page.as_str())
    }
}

pub struct PageRouter {
    state: PageState,
    default_page: String,
    session: Box<dyn SessionStore>,
    history: Vec<String>,
    scroll: u16,
}

impl PageRouter {
    pub fn new(default_page: impl Into<String>, session: Box<dyn SessionStore>) -> Self {
        Self {
            state: PageState::default(),
            default_page: default_page.into(),
            session,
            history: Vec::new(),
            scroll: 0,
        }
    }

    pub fn current(&self) -> &str {
        &self.state.current_page
    }

    /// Vertical scroll offset of the page viewport.
    pub fn scroll(&self) -> u16 {
        self.scroll
    }

    /// Move the viewport by `delta` lines, staying within `0..=max`.
    pub fn scroll_by(&mut self, delta: i16, max: u16) {
        self.scroll = self.scroll.saturating_add_signed(delta).min(max);
    }

    /// Page identifiers in document order.
    pub fn pages(doc: &Document) -> Vec<String> {
        doc.query_all(ATTR_PAGE)
            .into_iter()
            .filter_map(|id| doc.attr(id, ATTR_PAGE).map(str::to_string))
            .collect()
    }

    /// Show page `id` and hide every other one. Unknown ids fall back to the
    /// default page, or the first page if the default is missing too.
    pub fn set_active_page(
        &mut self,
        doc: &mut Document,
        id: &str,
    ) -> Result<PageActivation, SiteError> {
        let pages = Self::pages(doc);
        let (target, fell_back) = if pages.iter().any(|p| p == id) {
            (id.to_string(), false)
        } else {
            let error = SiteError::UnknownPageId(id.to_string());
            let fallback = if pages.contains(&self.default_page) {
                self.default_page.clone()
            } else {
                pages.first().cloned().ok_or(error)?
            };
            warn!("Unknown page id '{}', showing '{}' instead", id, fallback);
            (fallback, true)
        };

        for page in doc.query_all(ATTR_PAGE) {
            let on = doc.attr(page, ATTR_PAGE) == Some(target.as_str());
            doc.set_class(page, CLASS_ACTIVE, on);
        }
        for link in doc.query_all(ATTR_NAV_LINK) {
            let on = doc.attr(link, ATTR_NAV_LINK) == Some(target.as_str());
            doc.set_class(link, CLASS_ACTIVE, on);
        }

        let previous = (!self.state.current_page.is_empty())
            .then(|| std::mem::take(&mut self.state.current_page));
        self.state.current_page = target.clone();
        self.session.set(ACTIVE_PAGE_KEY, &target);
        debug!("Active page: {}", target);

        Ok(PageActivation {
            page: target,
            previous,
            fell_back,
        })
    }

    /// A navigation control was activated.
    pub fn navigate(&mut self, doc: &mut Document, id: &str) -> Result<PageActivation, SiteError> {
        let activation = self.set_active_page(doc, id)?;
        if let Some(previous) = &activation.previous {
            if activation.changed() {
                self.history.push(previous.clone());
            }
        }
        self.scroll = 0;
        info!("Navigated to {}", activation.page);
        Ok(activation)
    }

    /// Re-show the page persisted in the session, or the default page.
    pub fn restore(&mut self, doc: &mut Document) -> Result<PageActivation, SiteError> {
        let id = self
            .session
            .get(ACTIVE_PAGE_KEY)
            .unwrap_or_else(|| self.default_page.clone());
        self.set_active_page(doc, &id)
    }

    /// Return to the page shown before the last navigation.
    pub fn back(&mut self, doc: &mut Document) -> Result<Option<PageActivation>, SiteError> {
        let Some(previous) = self.history.pop() else {
            return Ok(None);
        };
        let activation = self.set_active_page(doc, &previous)?;
        self.scroll = 0;
        Ok(Some(activation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ArticleCatalog;
    use crate::config::SiteConfig;
    use crate::markup;
    use crate::session::MemorySession;

    fn setup() -> (Document, PageRouter) {
        let doc = markup::build(&SiteConfig::default(), &ArticleCatalog::builtin());
        let router = PageRouter::new("about", Box::new(MemorySession::new()));
        (doc, router)
    }

    fn active(doc: &Document, attr: &str) -> Vec<String> {
        doc.query_all(attr)
            .into_iter()
            .filter(|id| doc.has_class(*id, CLASS_ACTIVE))
            .filter_map(|id| doc.attr(id, attr).map(str::to_string))
            .collect()
    }

    #[test]
    fn test_exactly_one_page_and_link_active() {
        let (mut doc, mut router) = setup();
        for id in ["blog", "resume", "resume", "contact"] {
            router.set_active_page(&mut doc, id).unwrap();
            assert_eq!(active(&doc, ATTR_PAGE), vec![id.to_string()]);
            assert_eq!(active(&doc, ATTR_NAV_LINK), vec![id.to_string()]);
        }
    }

    #[test]
    fn test_unknown_id_falls_back_to_default() {
        let (mut doc, mut router) = setup();
        router.set_active_page(&mut doc, "blog").unwrap();
        let activation = router.set_active_page(&mut doc, "nope").unwrap();
        assert!(activation.fell_back);
        assert_eq!(activation.page, "about");
        assert_eq!(active(&doc, ATTR_PAGE), vec!["about".to_string()]);
    }

    #[test]
    fn test_missing_default_falls_back_to_first_page() {
        let mut doc = markup::build(&SiteConfig::default(), &ArticleCatalog::builtin());
        let mut router = PageRouter::new("gone", Box::new(MemorySession::new()));
        let activation = router.set_active_page(&mut doc, "nope").unwrap();
        assert_eq!(activation.page, "about");
    }

    #[test]
    fn test_no_pages_is_an_error() {
        let mut doc = Document::new();
        let mut router = PageRouter::new("about", Box::new(MemorySession::new()));
        assert!(matches!(
            router.set_active_page(&mut doc, "about"),
            Err(SiteError::UnknownPageId(_))
        ));
    }

    #[test]
    fn test_restore_reads_persisted_page() {
        let (mut doc, _) = setup();
        let mut session = MemorySession::new();
        session.set(ACTIVE_PAGE_KEY, "portfolio");
        let mut router = PageRouter::new("about", Box::new(session));
        assert_eq!(router.restore(&mut doc).unwrap().page, "portfolio");
    }

    #[test]
    fn test_restore_fresh_session_uses_default() {
        let (mut doc, mut router) = setup();
        let activation = router.restore(&mut doc).unwrap();
        assert_eq!(activation.page, "about");
        assert_eq!(activation.previous, None);
    }

    #[test]
    fn test_navigate_persists_and_resets_scroll() {
        let (mut doc, mut router) = setup();
        router.restore(&mut doc).unwrap();
        router.scroll_by(12, 20);
        assert_eq!(router.scroll(), 12);
        router.navigate(&mut doc, "blog").unwrap();
        assert_eq!(router.scroll(), 0);
        assert_eq!(router.session.get(ACTIVE_PAGE_KEY).as_deref(), Some("blog"));
    }

    #[test]
    fn test_scroll_is_clamped() {
        let (mut doc, mut router) = setup();
        router.restore(&mut doc).unwrap();
        router.scroll_by(-3, 4);
        assert_eq!(router.scroll(), 0);
        router.scroll_by(i16::MAX, 4);
        assert_eq!(router.scroll(), 4);
        router.scroll_by(-1, 4);
        assert_eq!(router.scroll(), 3);
        router.scroll_by(0, 1);
        assert_eq!(router.scroll(), 1);
    }

    #[test]
    fn test_back_walks_history() {
        let (mut doc, mut router) = setup();
        router.restore(&mut doc).unwrap();
        router.navigate(&mut doc, "blog").unwrap();
        router.navigate(&mut doc, "blog").unwrap();
        router.navigate(&mut doc, "contact").unwrap();

        assert_eq!(router.back(&mut doc).unwrap().unwrap().page, "blog");
        assert_eq!(router.back(&mut doc).unwrap().unwrap().page, "about");
        assert!(router.back(&mut doc).unwrap().is_none());
        assert_eq!(active(&doc, ATTR_PAGE), vec!["about".to_string()]);
    }
}
