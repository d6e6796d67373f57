//! A small arena-backed element tree.
//!
//! Controllers never hold references into the tree; they hold [`NodeId`]s and
//! go through [`Document`] for every read and write, so removed subtrees simply
//! stop resolving. Slots of removed elements are reused under a new generation,
//! so a stale id never resolves to the element that took its place.

use std::collections::{BTreeMap, BTreeSet};

/// Class that marks a page, control or item as active/visible.
pub const CLASS_ACTIVE: &str = "active";

/// Handle to an element in a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

/// Handle to a registered key-press listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// A single element.
#[derive(Debug, Clone)]
pub struct Element {
    tag: String,
    attrs: BTreeMap<String, String>,
    classes: BTreeSet<String>,
    text: String,
    html: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Element {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attrs: BTreeMap::new(),
            classes: BTreeSet::new(),
            text: String::new(),
            html: None,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    element: Option<Element>,
}

impl Slot {
    fn get(&self, id: NodeId) -> Option<&Element> {
        self.element.as_ref().filter(|_| self.generation == id.generation)
    }
}

/// The element tree plus the global key-press listener registry.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Slot>,
    free: Vec<usize>,
    root: NodeId,
    key_listeners: BTreeMap<ListenerId, NodeId>,
    next_listener: u64,
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Slot {
                generation: 0,
                element: Some(Element::new("body")),
            }],
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
            key_listeners: BTreeMap::new(),
            next_listener: 1,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Create a detached element.
    pub fn create(&mut self, tag: &str) -> NodeId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.nodes[index];
            slot.element = Some(Element::new(tag));
            return NodeId {
                index,
                generation: slot.generation,
            };
        }
        self.nodes.push(Slot {
            generation: 0,
            element: Some(Element::new(tag)),
        });
        NodeId {
            index: self.nodes.len() - 1,
            generation: 0,
        }
    }

    /// Create an element with attributes and append it to `parent`.
    pub fn el(&mut self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let id = self.create(tag);
        for (name, value) in attrs {
            self.set_attr(id, name, value);
        }
        self.append(parent, id);
        id
    }

    /// Append `child` to `parent`, detaching it from any previous parent.
    pub fn append(&mut self, parent: NodeId, child: NodeId) -> bool {
        if parent == child || !self.contains(parent) || !self.contains(child) {
            return false;
        }
        if self.is_within(parent, child) {
            return false;
        }
        self.detach(child);
        if let Some(el) = self.element_mut(child) {
            el.parent = Some(parent);
        }
        if let Some(el) = self.element_mut(parent) {
            el.children.push(child);
        }
        true
    }

    fn detach(&mut self, id: NodeId) {
        let parent = self.element(id).and_then(|el| el.parent);
        if let Some(parent) = parent {
            if let Some(el) = self.element_mut(parent) {
                el.children.retain(|c| *c != id);
            }
        }
        if let Some(el) = self.element_mut(id) {
            el.parent = None;
        }
    }

    /// Remove an element and its whole subtree. Returns false if it was
    /// already gone (or is the root).
    pub fn remove(&mut self, id: NodeId) -> bool {
        if id == self.root || !self.contains(id) {
            return false;
        }
        self.detach(id);
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let Some(slot) = self.nodes.get_mut(next.index) else {
                continue;
            };
            if slot.generation != next.generation {
                continue;
            }
            if let Some(el) = slot.element.take() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(next.index);
                stack.extend(el.children);
            }
        }
        // Listeners owned by removed nodes go with them.
        let nodes = &self.nodes;
        self.key_listeners
            .retain(|_, owner| nodes.get(owner.index).is_some_and(|slot| slot.get(*owner).is_some()));
        true
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        self.nodes.get(id.index).and_then(|slot| slot.get(id))
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        self.nodes
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.element.as_mut())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    /// Whether `id` is `ancestor` or one of its descendants.
    pub fn is_within(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(node) = cursor {
            if node == ancestor {
                return true;
            }
            cursor = self.element(node).and_then(|el| el.parent);
        }
        false
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.element(id).and_then(|el| el.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.element(id).map(|el| el.children.as_slice()).unwrap_or(&[])
    }

    // ── Attributes and classes ──

    /// `class` is split into the class set rather than stored as an attribute.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        let Some(el) = self.element_mut(id) else {
            return;
        };
        if name == "class" {
            el.classes
                .extend(value.split_whitespace().map(str::to_string));
        } else {
            el.attrs.insert(name.to_string(), value.to_string());
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)
            .and_then(|el| el.attrs.get(name))
            .map(String::as_str)
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.element(id).is_some_and(|el| el.classes.contains(class))
    }

    pub fn set_class(&mut self, id: NodeId, class: &str, on: bool) {
        if let Some(el) = self.element_mut(id) {
            if on {
                el.classes.insert(class.to_string());
            } else {
                el.classes.remove(class);
            }
        }
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        self.set_class(id, class, true);
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) {
        self.set_class(id, class, false);
    }

    /// Flip a class and return its new state.
    pub fn toggle_class(&mut self, id: NodeId, class: &str) -> bool {
        let on = !self.has_class(id, class);
        self.set_class(id, class, on);
        on
    }

    pub fn set_text(&mut self, id: NodeId, text: &str) {
        if let Some(el) = self.element_mut(id) {
            el.text = text.to_string();
        }
    }

    pub fn text(&self, id: NodeId) -> &str {
        self.element(id).map(|el| el.text.as_str()).unwrap_or("")
    }

    /// Set trusted inner HTML, rendered verbatim after the text content.
    pub fn set_html(&mut self, id: NodeId, html: &str) {
        if let Some(el) = self.element_mut(id) {
            el.html = Some(html.to_string());
        }
    }

    pub fn html(&self, id: NodeId) -> Option<&str> {
        self.element(id).and_then(|el| el.html.as_deref())
    }

    // ── Queries ──

    /// All descendants of `scope` in document order, `scope` excluded.
    pub fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(scope).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// Attached elements carrying attribute `name`, in document order.
    pub fn query_all(&self, name: &str) -> Vec<NodeId> {
        self.query_within(self.root, name)
    }

    /// Descendants of `scope` carrying attribute `name`.
    pub fn query_within(&self, scope: NodeId, name: &str) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|id| self.attr(*id, name).is_some())
            .collect()
    }

    /// Attached elements whose attribute `name` equals `value`.
    pub fn query_attr(&self, name: &str, value: &str) -> Vec<NodeId> {
        self.query_all(name)
            .into_iter()
            .filter(|id| self.attr(*id, name) == Some(value))
            .collect()
    }

    pub fn first_with(&self, name: &str, value: &str) -> Option<NodeId> {
        self.query_attr(name, value).into_iter().next()
    }

    // ── Key listeners ──

    /// Register a global key-press listener owned by `owner`.
    pub fn add_key_listener(&mut self, owner: NodeId) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.key_listeners.insert(id, owner);
        id
    }

    pub fn remove_key_listener(&mut self, id: ListenerId) -> bool {
        self.key_listeners.remove(&id).is_some()
    }

    /// Snapshot of registered listeners, oldest first.
    pub fn key_listeners(&self) -> Vec<(ListenerId, NodeId)> {
        self.key_listeners.iter().map(|(id, owner)| (*id, *owner)).collect()
    }

    pub fn key_listener_count(&self) -> usize {
        self.key_listeners.len()
    }

    // ── Serialisation ──

    /// Serialise an element and its subtree to HTML.
    pub fn to_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_html(id, &mut out);
        out
    }

    fn write_html(&self, id: NodeId, out: &mut String) {
        let Some(el) = self.element(id) else {
            return;
        };
        out.push('<');
        out.push_str(&el.tag);
        if !el.classes.is_empty() {
            let classes: Vec<&str> = el.classes.iter().map(String::as_str).collect();
            out.push_str(&format!(" class=\"{}\"", escape_html(&classes.join(" "))));
        }
        for (name, value) in &el.attrs {
            out.push_str(&format!(" {}=\"{}\"", name, escape_html(value)));
        }
        out.push('>');
        out.push_str(&escape_html(&el.text));
        if let Some(html) = &el.html {
            out.push_str(html);
        }
        for child in &el.children {
            self.write_html(*child, out);
        }
        out.push_str(&format!("</{}>", el.tag));
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Escape the HTML-special characters of `text`.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_query() {
        let mut doc = Document::new();
        let root = doc.root();
        let nav = doc.el(root, "nav", &[]);
        let a = doc.el(nav, "button", &[("data-nav-link", "about")]);
        let b = doc.el(nav, "button", &[("data-nav-link", "blog")]);

        assert_eq!(doc.query_all("data-nav-link"), vec![a, b]);
        assert_eq!(doc.first_with("data-nav-link", "blog"), Some(b));
        assert!(doc.is_within(b, nav));
        assert!(doc.is_within(b, root));
    }

    #[test]
    fn test_detached_nodes_are_not_queried() {
        let mut doc = Document::new();
        let orphan = doc.create("div");
        doc.set_attr(orphan, "data-page", "about");
        assert!(doc.query_all("data-page").is_empty());
        assert!(!doc.is_within(orphan, doc.root()));
    }

    #[test]
    fn test_remove_subtree_once() {
        let mut doc = Document::new();
        let root = doc.root();
        let overlay = doc.el(root, "div", &[("data-modal", "")]);
        let inner = doc.el(overlay, "p", &[]);

        assert!(doc.remove(overlay));
        assert!(!doc.contains(overlay));
        assert!(!doc.contains(inner));
        assert!(doc.children(root).is_empty());
        assert!(!doc.remove(overlay));
        assert!(!doc.remove(root));
    }

    #[test]
    fn test_removed_slots_are_reused_without_reviving_old_ids() {
        let mut doc = Document::new();
        let root = doc.root();
        let first = doc.el(root, "div", &[("data-modal", "")]);
        doc.el(first, "p", &[]);
        let size = doc.nodes.len();

        for _ in 0..10 {
            let overlay = doc.query_all("data-modal")[0];
            doc.remove(overlay);
            let overlay = doc.el(root, "div", &[("data-modal", "")]);
            doc.el(overlay, "p", &[]);
        }
        assert_eq!(doc.nodes.len(), size);
        assert!(!doc.contains(first));
        assert!(!doc.remove(first));
        assert_eq!(doc.query_all("data-modal").len(), 1);
    }

    #[test]
    fn test_class_attribute_goes_to_class_set() {
        let mut doc = Document::new();
        let root = doc.root();
        let p = doc.el(root, "p", &[("class", "meta note")]);
        doc.add_class(p, CLASS_ACTIVE);
        assert!(doc.has_class(p, "meta"));
        assert_eq!(doc.to_html(p), "<p class=\"active meta note\"></p>");
    }

    #[test]
    fn test_removing_owner_drops_listener() {
        let mut doc = Document::new();
        let root = doc.root();
        let overlay = doc.el(root, "div", &[]);
        doc.add_key_listener(overlay);
        assert_eq!(doc.key_listener_count(), 1);
        doc.remove(overlay);
        assert_eq!(doc.key_listener_count(), 0);
    }

    #[test]
    fn test_append_rejects_cycles() {
        let mut doc = Document::new();
        let root = doc.root();
        let outer = doc.el(root, "div", &[]);
        let inner = doc.el(outer, "div", &[]);
        assert!(!doc.append(inner, outer));
        assert_eq!(doc.parent(outer), Some(root));
    }

    #[test]
    fn test_classes() {
        let mut doc = Document::new();
        let root = doc.root();
        let item = doc.el(root, "li", &[]);
        assert!(doc.toggle_class(item, CLASS_ACTIVE));
        assert!(doc.has_class(item, CLASS_ACTIVE));
        doc.remove_class(item, CLASS_ACTIVE);
        assert!(!doc.has_class(item, CLASS_ACTIVE));
    }

    #[test]
    fn test_to_html_escapes_text_but_not_inner_html() {
        let mut doc = Document::new();
        let root = doc.root();
        let div = doc.el(root, "div", &[("data-x", "a\"b")]);
        doc.add_class(div, "box");
        doc.set_text(div, "1 < 2");
        doc.set_html(div, "<em>ok</em>");
        assert_eq!(
            doc.to_html(div),
            "<div class=\"box\" data-x=\"a&quot;b\">1 &lt; 2<em>ok</em></div>"
        );
    }
}
