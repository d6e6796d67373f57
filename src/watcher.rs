use tracing::{info, warn};

use crate::catalog::ArticleCatalog;
use crate::dom::Document;
use crate::error::SiteError;
use crate::filter::FilterController;
use crate::markup::{self, ATTR_ARTICLE_LIST};
use crate::router::PageActivation;

/// Renders the article listing the first time its page is shown.
#[derive(Debug, Clone)]
pub struct ActivationWatcher {
    page: String,
    section: String,
    fired: bool,
}

impl ActivationWatcher {
    /// Watch `page` and fill the listing of catalog section `section`.
    pub fn new(page: impl Into<String>, section: impl Into<String>) -> Self {
        Self {
            page: page.into(),
            section: section.into(),
            fired: false,
        }
    }

    /// Called on every page activation. Returns how many cards were rendered,
    /// which is zero for every call but the first successful activation of
    /// the page. A failed attempt leaves the watcher armed.
    pub fn notify(
        &mut self,
        doc: &mut Document,
        activation: &PageActivation,
        catalog: &ArticleCatalog,
        filters: &mut FilterController,
    ) -> Result<usize, SiteError> {
        if self.fired || activation.page != self.page {
            return Ok(0);
        }
        let Some(list) = doc.first_with(ATTR_ARTICLE_LIST, &self.section) else {
            warn!("No article listing for section '{}'", self.section);
            return Err(SiteError::UnknownSection(self.section.clone()));
        };
        for stale in doc.children(list).to_vec() {
            doc.remove(stale);
        }
        for meta in catalog.list() {
            markup::article_card(doc, list, &self.section, meta);
        }
        filters.reapply(doc, &self.section)?;
        self.fired = true;
        info!("Rendered {} articles on '{}'", catalog.len(), self.page);
        Ok(catalog.len())
    }
}
