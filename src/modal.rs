//! The single overlay surface used to read an article.

use std::sync::LazyLock;
use std::time::Duration;

use crossterm::event::KeyCode;
use regex::Regex;
use tracing::debug;

use crate::dom::{Document, ListenerId, NodeId};
use crate::scheduler::{Deferred, Scheduler, TaskId};

pub const ATTR_MODAL: &str = "data-modal";
pub const ATTR_MODAL_CONTENT: &str = "data-modal-content";
pub const ATTR_MODAL_CLOSE: &str = "data-modal-close";
pub const ATTR_MODAL_BODY: &str = "data-modal-body";

/// Delay before the code-block styling pass runs on a freshly shown modal.
pub const FORMAT_DELAY: Duration = Duration::from_millis(50);

/// Style given to every preformatted block in a modal body.
pub const PRE_STYLE: &str = "font-family: monospace; white-space: pre; overflow-x: auto";

static PRE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<pre\b([^>]*)>").expect("valid regex"));
static STYLE_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\s+style\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#).expect("valid regex")
});

/// What closed the modal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DismissTrigger {
    CloseControl,
    Backdrop,
    CancelKey,
}

/// Handles to the nodes and registrations of the open modal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenModal {
    pub overlay: NodeId,
    pub content: NodeId,
    pub heading: NodeId,
    pub close: NodeId,
    pub body: NodeId,
    pub listener: ListenerId,
    pub format_task: Option<TaskId>,
}

#[derive(Debug, Default)]
pub struct ModalPresenter {
    open: Option<OpenModal>,
}

impl ModalPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn current(&self) -> Option<&OpenModal> {
        self.open.as_ref()
    }

    /// Build and attach a modal. Any modal already open is dismissed first.
    pub fn show(
        &mut self,
        doc: &mut Document,
        scheduler: &mut Scheduler,
        title: &str,
        body_html: &str,
    ) -> NodeId {
        if self.is_open() {
            debug!("Replacing the open modal");
            self.dismiss(doc, scheduler, DismissTrigger::CloseControl);
        }

        let overlay = doc.create("div");
        doc.set_attr(overlay, ATTR_MODAL, "");
        let content = doc.el(overlay, "div", &[(ATTR_MODAL_CONTENT, "")]);
        let heading = doc.el(content, "h2", &[]);
        doc.set_text(heading, title);
        let close = doc.el(content, "button", &[(ATTR_MODAL_CLOSE, "")]);
        doc.set_text(close, "Close");
        let body = doc.el(content, "div", &[(ATTR_MODAL_BODY, "")]);
        doc.set_html(body, body_html);

        let root = doc.root();
        doc.append(root, overlay);
        let listener = doc.add_key_listener(overlay);
        let format_task = scheduler.defer(FORMAT_DELAY, Deferred::FormatCodeBlocks { overlay });

        self.open = Some(OpenModal {
            overlay,
            content,
            heading,
            close,
            body,
            listener,
            format_task: Some(format_task),
        });
        debug!("Modal shown: {}", title);
        overlay
    }

    /// A click landed on `target`. Returns true if it closed the modal.
    pub fn click(&mut self, doc: &mut Document, scheduler: &mut Scheduler, target: NodeId) -> bool {
        let Some(open) = &self.open else {
            return false;
        };
        let trigger = if doc.is_within(target, open.close) {
            DismissTrigger::CloseControl
        } else if doc.is_within(target, open.overlay) && !doc.is_within(target, open.content) {
            DismissTrigger::Backdrop
        } else {
            return false;
        };
        self.dismiss(doc, scheduler, trigger)
    }

    /// Key press delivered to `listener`. Only Esc on the open modal's
    /// listener does anything.
    pub fn handle_key(
        &mut self,
        doc: &mut Document,
        scheduler: &mut Scheduler,
        listener: ListenerId,
        key: KeyCode,
    ) -> bool {
        let ours = self.open.as_ref().is_some_and(|o| o.listener == listener);
        if ours && key == KeyCode::Esc {
            return self.dismiss(doc, scheduler, DismissTrigger::CancelKey);
        }
        false
    }

    /// Tear the modal down. Safe to call when nothing is open.
    pub fn dismiss(
        &mut self,
        doc: &mut Document,
        scheduler: &mut Scheduler,
        trigger: DismissTrigger,
    ) -> bool {
        let Some(open) = self.open.take() else {
            return false;
        };
        doc.remove_key_listener(open.listener);
        doc.remove(open.overlay);
        if let Some(task) = open.format_task {
            scheduler.cancel(task);
        }
        debug!(
            "Modal dismissed via {:?}, {} key listeners left",
            trigger,
            doc.key_listener_count()
        );
        true
    }

    /// The deferred formatting pass for `overlay` came due.
    pub fn on_format_due(&mut self, doc: &mut Document, overlay: NodeId) -> bool {
        match self.open.as_mut() {
            Some(open) if open.overlay == overlay => {
                open.format_task = None;
                apply_formatting(doc, open.body)
            }
            _ => false,
        }
    }
}

/// Give every `<pre>` block in a modal body the fixed monospace style.
pub fn apply_formatting(doc: &mut Document, body: NodeId) -> bool {
    let Some(html) = doc.html(body) else {
        return false;
    };
    let formatted = format_code_blocks(html);
    doc.set_html(body, &formatted);
    true
}

/// Replace any style on `<pre>` tags with [`PRE_STYLE`], keeping other
/// attributes.
pub fn format_code_blocks(html: &str) -> String {
    PRE_TAG
        .replace_all(html, |caps: &regex::Captures| {
            let attrs = STYLE_ATTR.replace_all(&caps[1], "");
            format!("<pre{} style=\"{}\">", attrs, PRE_STYLE)
        })
        .into_owned()
}
