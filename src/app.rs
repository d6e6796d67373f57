use std::time::{Duration, Instant};

use crossterm::event::KeyCode;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::catalog::ArticleCatalog;
use crate::config::SiteConfig;
use crate::dom::{CLASS_ACTIVE, Document, NodeId};
use crate::error::SiteError;
use crate::filter::FilterController;
use crate::loader::{ContentLoader, LoadOutcome, LoadToken, PendingLoad};
use crate::markup::{self, ATTR_FILTER_ITEM, ATTR_PAGE, ATTR_SIDEBAR, ATTR_SIDEBAR_BTN, ATTR_SLUG};
use crate::modal::ModalPresenter;
use crate::router::{PageActivation, PageRouter};
use crate::scheduler::{Deferred, Scheduler, TaskId};
use crate::session::SessionStore;
use crate::watcher::ActivationWatcher;

pub const DEFAULT_STATUS: &str = "←/→ pages · ↑/↓ items · f filter · Enter open · ? help";

/// How long transient status messages stay up.
const STATUS_TTL: Duration = Duration::from_secs(3);

/// Which part of the modal a click landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalPart {
    Close,
    Content,
    Backdrop,
}

/// Main application state.
pub struct App {
    pub config: SiteConfig,
    pub catalog: ArticleCatalog,
    pub doc: Document,
    pub router: PageRouter,
    pub filters: FilterController,
    pub loader: ContentLoader,
    pub modal: ModalPresenter,
    pub watcher: Option<ActivationWatcher>,
    pub scheduler: Scheduler,

    pub should_quit: bool,
    pub show_help: bool,

    // Page view state
    pub selected: usize,
    pub dropdown_cursor: usize,

    // Reader (modal) state
    pub reader_scroll: u16,
    pub loading: Option<&'static str>,

    // Status message
    pub status_msg: String,
    status_task: Option<TaskId>,

    load_tx: mpsc::UnboundedSender<(LoadToken, LoadOutcome)>,
    load_rx: mpsc::UnboundedReceiver<(LoadToken, LoadOutcome)>,
}

impl App {
    /// Build the document, wire up the controllers and show the persisted page.
    pub fn new(
        config: SiteConfig,
        catalog: ArticleCatalog,
        loader: ContentLoader,
        session: Box<dyn SessionStore>,
    ) -> Result<Self, SiteError> {
        let mut doc = markup::build(&config, &catalog);
        let mut filters = FilterController::new();
        filters.init(&mut doc)?;
        let router = PageRouter::new(config.default_page.clone(), session);
        let watcher = config
            .catalog_section()
            .map(|s| ActivationWatcher::new(s.page.clone(), s.id.clone()));
        let (load_tx, load_rx) = mpsc::unbounded_channel();

        let mut app = Self {
            config,
            catalog,
            doc,
            router,
            filters,
            loader,
            modal: ModalPresenter::new(),
            watcher,
            scheduler: Scheduler::new(),
            should_quit: false,
            show_help: false,
            selected: 0,
            dropdown_cursor: 0,
            reader_scroll: 0,
            loading: None,
            status_msg: DEFAULT_STATUS.to_string(),
            status_task: None,
            load_tx,
            load_rx,
        };

        let activation = app.router.restore(&mut app.doc)?;
        app.after_activation(&activation)?;
        Ok(app)
    }

    // ── Pages ──

    pub fn pages(&self) -> Vec<String> {
        PageRouter::pages(&self.doc)
    }

    pub fn current_page(&self) -> &str {
        self.router.current()
    }

    /// Activate a navigation control.
    pub fn navigate(&mut self, id: &str) {
        let result = self
            .router
            .navigate(&mut self.doc, id)
            .and_then(|activation| self.after_activation(&activation));
        if let Err(e) = result {
            warn!("Navigation to {} failed: {}", id, e);
            self.flash(e.user_message());
        }
    }

    fn after_activation(&mut self, activation: &PageActivation) -> Result<(), SiteError> {
        if activation.fell_back {
            self.flash(format!("Showing '{}' instead", activation.page));
        }
        if activation.changed() {
            self.filters.close_dropdown(&mut self.doc);
            self.selected = 0;
        }
        if let Some(watcher) = self.watcher.as_mut() {
            watcher.notify(&mut self.doc, activation, &self.catalog, &mut self.filters)?;
        }
        Ok(())
    }

    fn page_offset(&mut self, delta: isize) {
        let pages = self.pages();
        if pages.is_empty() {
            return;
        }
        let current = pages
            .iter()
            .position(|p| p == self.current_page())
            .unwrap_or(0);
        let next = (current as isize + delta).rem_euclid(pages.len() as isize) as usize;
        let id = pages[next].clone();
        self.navigate(&id);
    }

    pub fn next_page(&mut self) {
        self.page_offset(1);
    }

    pub fn prev_page(&mut self) {
        self.page_offset(-1);
    }

    /// Scroll the page intro, no further than its last line.
    pub fn scroll_page(&mut self, delta: i16) {
        let lines = self
            .doc
            .first_with(ATTR_PAGE, self.router.current())
            .map_or(0, |page| {
                self.doc
                    .children(page)
                    .iter()
                    .filter(|child| {
                        matches!(self.doc.element(**child).map(|el| el.tag()), Some("h2" | "p"))
                    })
                    .count()
            });
        let max = u16::try_from(lines.saturating_sub(1)).unwrap_or(u16::MAX);
        self.router.scroll_by(delta, max);
    }

    /// Navigate to the n-th page (zero based).
    pub fn goto_page(&mut self, index: usize) {
        if let Some(id) = self.pages().get(index).cloned() {
            self.navigate(&id);
        }
    }

    pub fn back(&mut self) {
        match self.router.back(&mut self.doc) {
            Ok(Some(activation)) => {
                if let Err(e) = self.after_activation(&activation) {
                    self.flash(e.user_message());
                }
            }
            Ok(None) => self.flash("Nothing to go back to"),
            Err(e) => self.flash(e.user_message()),
        }
    }

    // ── Filters ──

    /// Section on the current page, if it has one.
    pub fn current_section(&self) -> Option<String> {
        FilterController::active_section(&self.doc, self.current_page()).ok()
    }

    /// Activate the next (or previous) filter button of the current section.
    pub fn cycle_filter(&mut self, forward: bool) {
        let section = match FilterController::active_section(&self.doc, self.current_page()) {
            Ok(s) => s,
            Err(e) => {
                self.flash(e.user_message());
                return;
            }
        };
        let controls = FilterController::controls(&self.doc, &section);
        if controls.is_empty() {
            return;
        }
        let active = self
            .filters
            .state(&section)
            .and_then(|s| s.active_control)
            .and_then(|c| controls.iter().position(|(id, _, _)| *id == c))
            .unwrap_or(0);
        let next = if forward {
            (active + 1) % controls.len()
        } else {
            (active + controls.len() - 1) % controls.len()
        };
        let value = controls[next].1.clone();
        match self.filters.select_control(&mut self.doc, &section, &value) {
            Ok(shown) => {
                self.selected = 0;
                self.flash(format!("{}: {} shown", controls[next].2, shown));
            }
            Err(e) => self.flash(e.user_message()),
        }
    }

    pub fn toggle_dropdown(&mut self) {
        let Some(section) = self.current_section() else {
            self.flash(
                SiteError::FilterContextMissing {
                    page: self.current_page().to_string(),
                }
                .user_message(),
            );
            return;
        };
        match self.filters.toggle_dropdown(&mut self.doc, &section) {
            Ok(true) => {
                let controls = FilterController::controls(&self.doc, &section);
                let active = self.filters.state(&section).map(|s| s.active_category.clone());
                self.dropdown_cursor = controls
                    .iter()
                    .position(|(_, value, _)| Some(value) == active.as_ref())
                    .unwrap_or(0);
            }
            Ok(false) => {}
            Err(e) => self.flash(e.user_message()),
        }
    }

    pub fn dropdown_open(&self) -> bool {
        self.filters.open_dropdown().is_some()
    }

    pub fn dropdown_move(&mut self, delta: isize) {
        let Some(section) = self.filters.open_dropdown() else {
            return;
        };
        let count = FilterController::controls(&self.doc, section).len();
        if count == 0 {
            return;
        }
        self.dropdown_cursor =
            (self.dropdown_cursor as isize + delta).rem_euclid(count as isize) as usize;
    }

    pub fn dropdown_choose(&mut self) {
        let Some(section) = self.filters.open_dropdown().map(str::to_string) else {
            return;
        };
        let controls = FilterController::controls(&self.doc, &section);
        let Some((_, value, _)) = controls.get(self.dropdown_cursor) else {
            return;
        };
        if let Err(e) = self.filters.select_option(&mut self.doc, &section, value) {
            self.flash(e.user_message());
        }
        self.selected = 0;
    }

    pub fn close_dropdown(&mut self) {
        self.filters.close_dropdown(&mut self.doc);
    }

    /// Items of the current section that pass its filter.
    pub fn visible_items(&self) -> Vec<NodeId> {
        let Some(section) = self.current_section() else {
            return Vec::new();
        };
        let Some(page) = self.doc.first_with(ATTR_PAGE, self.current_page()) else {
            return Vec::new();
        };
        self.doc
            .query_attr(ATTR_FILTER_ITEM, &section)
            .into_iter()
            .filter(|id| self.doc.is_within(*id, page) && self.doc.has_class(*id, CLASS_ACTIVE))
            .collect()
    }

    pub fn select_next(&mut self) {
        let count = self.visible_items().len();
        if self.selected + 1 < count {
            self.selected += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    // ── Sidebar ──

    pub fn sidebar_open(&self) -> bool {
        self.doc
            .query_all(ATTR_SIDEBAR)
            .first()
            .is_some_and(|id| self.doc.has_class(*id, CLASS_ACTIVE))
    }

    pub fn toggle_sidebar(&mut self) {
        let Some(sidebar) = self.doc.query_all(ATTR_SIDEBAR).first().copied() else {
            return;
        };
        let open = self.doc.toggle_class(sidebar, CLASS_ACTIVE);
        if let Some(button) = self.doc.query_all(ATTR_SIDEBAR_BTN).first().copied() {
            self.doc.set_class(button, CLASS_ACTIVE, open);
            self.doc
                .set_text(button, if open { "Hide contacts" } else { "Show contacts" });
        }
    }

    // ── Articles ──

    /// Open the selected item if it is an article card.
    pub fn open_selected(&mut self) {
        let items = self.visible_items();
        let Some(item) = items.get(self.selected) else {
            return;
        };
        match self.doc.attr(*item, ATTR_SLUG).map(str::to_string) {
            Some(slug) => self.open_article(&slug),
            None => self.flash("Only articles can be opened"),
        }
    }

    /// Start loading an article; the modal appears once it arrives.
    pub fn open_article(&mut self, slug: &str) {
        let Some(meta) = self.catalog.find(slug) else {
            self.flash(format!("No article called '{}'", slug));
            return;
        };
        let PendingLoad { token, future } = self.loader.begin(meta);
        let tx = self.load_tx.clone();
        tokio::spawn(async move {
            match future.await {
                Ok(outcome) => {
                    let _ = tx.send((token, outcome));
                }
                Err(_) => debug!("Load {:?} aborted", token),
            }
        });
        self.loading = Some(meta.title);
        self.status_msg = format!("Loading {}...", meta.title);
    }

    /// Drain finished loads. Returns true if a modal was shown.
    pub fn poll_loads(&mut self) -> bool {
        let mut shown = false;
        while let Ok((token, outcome)) = self.load_rx.try_recv() {
            shown |= self.accept_load(token, outcome);
        }
        shown
    }

    fn accept_load(&mut self, token: LoadToken, outcome: LoadOutcome) -> bool {
        if !self.loader.finish(token) {
            return false;
        }
        self.loading = None;
        self.status_msg = DEFAULT_STATUS.to_string();
        self.modal.show(
            &mut self.doc,
            &mut self.scheduler,
            outcome.title(),
            &outcome.body_html(),
        );
        self.reader_scroll = 0;
        true
    }

    /// Cancel a load that hasn't arrived yet.
    pub fn cancel_load(&mut self) -> bool {
        if self.loader.cancel() {
            self.loading = None;
            self.flash("Loading cancelled");
            true
        } else {
            false
        }
    }

    // ── Modal ──

    /// Hand a key press to every registered key listener.
    pub fn dispatch_key(&mut self, code: KeyCode) -> bool {
        for (listener, _) in self.doc.key_listeners() {
            if self
                .modal
                .handle_key(&mut self.doc, &mut self.scheduler, listener, code)
            {
                self.modal_closed();
                return true;
            }
        }
        false
    }

    pub fn modal_click(&mut self, part: ModalPart) -> bool {
        let Some(open) = self.modal.current() else {
            return false;
        };
        let target = match part {
            ModalPart::Close => open.close,
            ModalPart::Content => open.content,
            ModalPart::Backdrop => open.overlay,
        };
        let closed = self.modal.click(&mut self.doc, &mut self.scheduler, target);
        if closed {
            self.modal_closed();
        }
        closed
    }

    fn modal_closed(&mut self) {
        self.reader_scroll = 0;
    }

    /// Title and body HTML of the open modal, as the presenter holds them.
    pub fn reader_view(&self) -> Option<(&str, &str)> {
        let open = self.modal.current()?;
        Some((self.doc.text(open.heading), self.doc.html(open.body).unwrap_or("")))
    }

    pub fn scroll_reader(&mut self, delta: i32) {
        self.reader_scroll = (self.reader_scroll as i32 + delta).max(0) as u16;
    }

    // ── Deferred work ──

    /// Show `msg` for a few seconds, then put the default status back.
    pub fn flash(&mut self, msg: impl Into<String>) {
        if let Some(task) = self.status_task.take() {
            self.scheduler.cancel(task);
        }
        self.status_msg = msg.into();
        self.status_task = Some(self.scheduler.defer(
            STATUS_TTL,
            Deferred::RestoreStatus {
                text: DEFAULT_STATUS.to_string(),
            },
        ));
    }

    /// Run every deferred task that is due.
    pub fn run_deferred(&mut self, now: Instant) {
        for task in self.scheduler.take_due(now) {
            match task {
                Deferred::FormatCodeBlocks { overlay } => {
                    self.modal.on_format_due(&mut self.doc, overlay);
                }
                Deferred::RestoreStatus { text } => {
                    self.status_task = None;
                    if self.loading.is_none() {
                        self.status_msg = text;
                    }
                }
            }
        }
    }

    /// Drop everything in flight before the terminal is restored.
    pub fn shutdown(&mut self) {
        self.loader.cancel();
        if self.modal.dismiss(
            &mut self.doc,
            &mut self.scheduler,
            crate::modal::DismissTrigger::CancelKey,
        ) {
            self.modal_closed();
        }
        debug!("Dropping {} deferred tasks", self.scheduler.pending());
        self.scheduler.clear();
        self.status_task = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::tests::{StubSource, markdown_loader};
    use crate::modal::{ATTR_MODAL, ATTR_MODAL_BODY, PRE_STYLE};
    use crate::session::MemorySession;
    use crate::ui::rich::html_text;
    use std::sync::Arc;

    fn app() -> App {
        let source = StubSource::with(&[
            ("blog/ring_buffer.md", "---\ntitle: x\n---\n# Ring\n\n```c\nint a;\n```\n"),
            ("blog/bloom_filters.md", "# Bloom"),
        ]);
        App::new(
            SiteConfig::default(),
            ArticleCatalog::builtin(),
            markdown_loader(source),
            Box::new(MemorySession::new()),
        )
        .unwrap()
    }

    fn app_with(config: SiteConfig, files: &[(&str, &str)]) -> App {
        let engine = config.render.engine();
        let loader = ContentLoader::new(Arc::new(StubSource::with(files)), engine);
        App::new(config, ArticleCatalog::builtin(), loader, Box::new(MemorySession::new())).unwrap()
    }

    async fn wait_for_load(app: &mut App) -> bool {
        let (token, outcome) = app.load_rx.recv().await.unwrap();
        app.accept_load(token, outcome)
    }

    #[test]
    fn test_starts_on_default_page() {
        let app = app();
        assert_eq!(app.current_page(), "about");
        assert!(app.visible_items().is_empty());
    }

    #[test]
    fn test_page_cycling_wraps() {
        let mut app = app();
        app.prev_page();
        assert_eq!(app.current_page(), "contact");
        app.next_page();
        app.next_page();
        assert_eq!(app.current_page(), "resume");
        app.back();
        assert_eq!(app.current_page(), "about");
    }

    #[test]
    fn test_blog_listing_rendered_on_first_visit() {
        let mut app = app();
        app.navigate("blog");
        assert_eq!(app.visible_items().len(), 5);
        app.navigate("about");
        app.navigate("blog");
        assert_eq!(app.doc.query_all(ATTR_SLUG).len(), 5);
    }

    #[test]
    fn test_cycle_filter_narrows_items() {
        let mut app = app();
        app.navigate("portfolio");
        app.cycle_filter(true);
        assert_eq!(app.visible_items().len(), 2);
        app.cycle_filter(false);
        assert_eq!(app.visible_items().len(), 5);
    }

    #[test]
    fn test_cycle_filter_without_section_flashes() {
        let mut app = app();
        app.cycle_filter(true);
        assert!(app.status_msg.contains("Nothing to filter"));
    }

    #[test]
    fn test_dropdown_choose() {
        let mut app = app();
        app.navigate("portfolio");
        app.toggle_dropdown();
        assert!(app.dropdown_open());
        assert_eq!(app.dropdown_cursor, 0);
        app.dropdown_move(3);
        app.dropdown_choose();
        assert!(!app.dropdown_open());
        assert_eq!(app.visible_items().len(), 1);
    }

    #[test]
    fn test_sidebar_toggle() {
        let mut app = app();
        assert!(!app.sidebar_open());
        app.toggle_sidebar();
        assert!(app.sidebar_open());
        app.toggle_sidebar();
        assert!(!app.sidebar_open());
    }

    #[tokio::test]
    async fn test_open_article_shows_modal_then_escape_closes() {
        let mut app = app();
        app.navigate("blog");
        app.open_selected();
        assert!(app.loading.is_some());
        assert!(wait_for_load(&mut app).await);

        assert!(app.modal.is_open());
        assert_eq!(app.reader_view().map(|(title, _)| title), Some("Building a Lock-Free Ring Buffer"));
        assert_eq!(app.doc.query_all(ATTR_MODAL).len(), 1);

        app.run_deferred(Instant::now() + Duration::from_secs(1));
        let body = app.doc.query_all(ATTR_MODAL_BODY)[0];
        assert!(app.doc.html(body).unwrap().contains(PRE_STYLE));

        assert!(app.dispatch_key(KeyCode::Esc));
        assert!(!app.modal.is_open());
        assert!(app.reader_view().is_none());
        assert_eq!(app.doc.query_all(ATTR_MODAL).len(), 0);
        assert_eq!(app.doc.key_listener_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_load_shows_inline_message() {
        let mut app = app();
        app.open_article("tcp_state_machine");
        assert!(wait_for_load(&mut app).await);
        let body = app.doc.query_all(ATTR_MODAL_BODY)[0];
        assert!(app.doc.html(body).unwrap().contains("load-error"));

        assert!(!app.modal_click(ModalPart::Content));
        assert!(app.modal_click(ModalPart::Backdrop));
        assert!(!app.modal.is_open());
    }

    #[tokio::test]
    async fn test_superseded_load_is_not_shown() {
        let mut app = app();
        app.open_article("ring_buffer");
        app.open_article("bloom_filters");
        assert!(wait_for_load(&mut app).await);
        assert_eq!(app.reader_view().map(|(title, _)| title), Some("Bloom Filters in Practice"));
        assert!(!app.poll_loads());
    }

    #[tokio::test]
    async fn test_shutdown_clears_everything() {
        let mut app = app();
        app.open_article("ring_buffer");
        wait_for_load(&mut app).await;
        app.flash("hello");
        app.shutdown();
        assert!(!app.modal.is_open());
        assert_eq!(app.scheduler.pending(), 0);
        assert_eq!(app.doc.key_listener_count(), 0);
    }

    #[test]
    fn test_flash_restores_default_status() {
        let mut app = app();
        app.flash("temporary");
        assert_eq!(app.status_msg, "temporary");
        app.run_deferred(Instant::now() + STATUS_TTL);
        assert_eq!(app.status_msg, DEFAULT_STATUS);
    }

    #[test]
    fn test_page_scroll_stops_at_last_intro_line() {
        let mut app = app();
        app.scroll_page(5);
        assert_eq!(app.router.scroll(), 1);
        app.scroll_page(-5);
        assert_eq!(app.router.scroll(), 0);
    }

    #[test]
    fn test_failed_listing_still_resets_page_state() {
        let mut app = app();
        app.navigate("portfolio");
        app.toggle_dropdown();
        assert!(app.dropdown_open());
        let list = app.doc.first_with(markup::ATTR_ARTICLE_LIST, "articles").unwrap();
        app.doc.remove(list);

        app.navigate("blog");
        assert_eq!(app.current_page(), "blog");
        assert!(!app.dropdown_open());
        assert_eq!(app.selected, 0);
        assert!(app.status_msg.contains("articles"));
    }

    #[tokio::test]
    async fn test_render_options_reach_the_reader() {
        let files = [("blog/bloom_filters.md", "## Why\nline one\nline two\n")];

        let mut plain = app_with(SiteConfig::default(), &files);
        plain.open_article("bloom_filters");
        assert!(wait_for_load(&mut plain).await);
        let (_, body) = plain.reader_view().unwrap();
        assert!(!body.contains("<br"));
        assert_eq!(html_text(body).lines.len(), 3);

        let mut config = SiteConfig::default();
        config.render.newlines_as_breaks = true;
        config.render.heading_ids = true;
        let mut tuned = app_with(config, &files);
        tuned.open_article("bloom_filters");
        assert!(wait_for_load(&mut tuned).await);
        let (title, body) = tuned.reader_view().unwrap();
        assert_eq!(title, "Bloom Filters in Practice");
        assert!(body.contains("<h2 id=\"why\">"));
        assert_eq!(html_text(body).lines.len(), 4);
    }

    #[tokio::test]
    async fn test_disabled_renderer_shows_message_in_reader() {
        let mut config = SiteConfig::default();
        config.render.enabled = false;
        let mut app = app_with(config, &[("blog/bloom_filters.md", "# Bloom")]);
        app.open_article("bloom_filters");
        assert!(wait_for_load(&mut app).await);
        let (_, body) = app.reader_view().unwrap();
        assert!(body.contains("load-error"));
        assert!(body.contains("renderer"));
    }
}
