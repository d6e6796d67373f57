//! Category filtering for every filterable section.
//!
//! Each section carries a dropdown (`data-select*`) and a button group
//! (`data-filter-btn`); both drive the same predicate over the section's
//! items. Filtering never reaches outside the page element the section lives
//! on.

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::ALL_CATEGORY;
use crate::dom::{CLASS_ACTIVE, Document, NodeId};
use crate::error::SiteError;
use crate::markup::{
    ATTR_CATEGORY, ATTR_FILTER_BTN, ATTR_FILTER_ITEM, ATTR_PAGE, ATTR_SECTION, ATTR_SELECT,
    ATTR_SELECT_ITEM, ATTR_SELECT_VALUE,
};

/// Filter state of one section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    pub active_category: String,
    pub active_control: Option<NodeId>,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            active_category: ALL_CATEGORY.to_string(),
            active_control: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct FilterController {
    sections: BTreeMap<String, FilterState>,
    open_dropdown: Option<String>,
}

impl FilterController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, section: &str) -> Option<&FilterState> {
        self.sections.get(section)
    }

    pub fn open_dropdown(&self) -> Option<&str> {
        self.open_dropdown.as_deref()
    }

    /// Section ids present in the document, in document order.
    pub fn sections(doc: &Document) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for id in doc.descendants(doc.root()) {
            let value = doc
                .attr(id, ATTR_SECTION)
                .or_else(|| doc.attr(id, ATTR_FILTER_ITEM));
            if let Some(value) = value {
                if !out.iter().any(|s| s == value) {
                    out.push(value.to_string());
                }
            }
        }
        out
    }

    /// Filter buttons of `section` as (control, value, label).
    pub fn controls(doc: &Document, section: &str) -> Vec<(NodeId, String, String)> {
        doc.query_all(ATTR_FILTER_BTN)
            .into_iter()
            .filter(|id| doc.attr(*id, ATTR_SECTION) == Some(section))
            .filter_map(|id| {
                let value = doc.attr(id, ATTR_FILTER_BTN)?.to_string();
                Some((id, value, doc.text(id).to_string()))
            })
            .collect()
    }

    /// Activate the first control of every section and apply its category.
    pub fn init(&mut self, doc: &mut Document) -> Result<(), SiteError> {
        for section in Self::sections(doc) {
            let controls = Self::controls(doc, &section);
            for (control, _, _) in &controls {
                doc.remove_class(*control, CLASS_ACTIVE);
            }
            let state = match controls.first() {
                Some((control, value, _)) => {
                    doc.add_class(*control, CLASS_ACTIVE);
                    FilterState {
                        active_category: value.clone(),
                        active_control: Some(*control),
                    }
                }
                None => FilterState::default(),
            };
            let category = state.active_category.clone();
            self.sections.insert(section.clone(), state);
            sync_options(doc, &section, &category);
            self.set_category(doc, &section, &category)?;
        }
        Ok(())
    }

    /// Show the items of `section` whose category matches and hide the rest.
    /// Returns how many items are shown.
    pub fn set_category(
        &mut self,
        doc: &mut Document,
        section: &str,
        category: &str,
    ) -> Result<usize, SiteError> {
        let page = section_page(doc, section)
            .ok_or_else(|| SiteError::UnknownSection(section.to_string()))?;
        let wanted = category.to_lowercase();
        let mut shown = 0;

        for item in doc.query_attr(ATTR_FILTER_ITEM, section) {
            if !doc.is_within(item, page) {
                continue;
            }
            let visible = wanted == ALL_CATEGORY
                || doc
                    .attr(item, ATTR_CATEGORY)
                    .is_some_and(|c| c.to_lowercase() == wanted);
            doc.set_class(item, CLASS_ACTIVE, visible);
            if visible {
                shown += 1;
            }
        }

        self.sections
            .entry(section.to_string())
            .or_default()
            .active_category = wanted;
        debug!("Section {}: category '{}' shows {} items", section, category, shown);
        Ok(shown)
    }

    /// A filter button was clicked.
    pub fn select_control(
        &mut self,
        doc: &mut Document,
        section: &str,
        category: &str,
    ) -> Result<usize, SiteError> {
        let wanted = category.to_lowercase();
        let control = Self::controls(doc, section)
            .into_iter()
            .find(|(_, value, _)| value.to_lowercase() == wanted);

        if let Some(slot) = doc.first_with(ATTR_SELECT_VALUE, section) {
            let label = control
                .as_ref()
                .map(|(_, _, label)| label.clone())
                .unwrap_or_else(|| category.to_string());
            doc.set_text(slot, &label);
        }

        let state = self.sections.entry(section.to_string()).or_default();
        if let Some(previous) = state.active_control.take() {
            doc.remove_class(previous, CLASS_ACTIVE);
        }
        if let Some((id, _, _)) = &control {
            doc.add_class(*id, CLASS_ACTIVE);
            state.active_control = Some(*id);
        }

        sync_options(doc, section, &wanted);
        self.set_category(doc, section, &wanted)
    }

    /// A dropdown option was chosen.
    pub fn select_option(
        &mut self,
        doc: &mut Document,
        section: &str,
        category: &str,
    ) -> Result<usize, SiteError> {
        let shown = self.select_control(doc, section, category)?;
        self.close_dropdown(doc);
        Ok(shown)
    }

    /// Open or close the dropdown of `section`. Returns whether it is open.
    pub fn toggle_dropdown(&mut self, doc: &mut Document, section: &str) -> Result<bool, SiteError> {
        let select = doc
            .first_with(ATTR_SELECT, section)
            .ok_or_else(|| SiteError::UnknownSection(section.to_string()))?;
        if self.open_dropdown.as_deref() != Some(section) {
            self.close_dropdown(doc);
        }
        let open = doc.toggle_class(select, CLASS_ACTIVE);
        self.open_dropdown = open.then(|| section.to_string());
        Ok(open)
    }

    pub fn close_dropdown(&mut self, doc: &mut Document) {
        if let Some(section) = self.open_dropdown.take() {
            if let Some(select) = doc.first_with(ATTR_SELECT, &section) {
                doc.remove_class(select, CLASS_ACTIVE);
            }
        }
    }

    /// The filterable section on page `page`.
    pub fn active_section(doc: &Document, page: &str) -> Result<String, SiteError> {
        let missing = || SiteError::FilterContextMissing {
            page: page.to_string(),
        };
        let element = doc.first_with(ATTR_PAGE, page).ok_or_else(missing)?;
        doc.query_within(element, ATTR_SECTION)
            .into_iter()
            .find_map(|id| doc.attr(id, ATTR_SECTION).map(str::to_string))
            .ok_or_else(missing)
    }

    /// Run the section's current predicate again, e.g. after items were added.
    pub fn reapply(&mut self, doc: &mut Document, section: &str) -> Result<usize, SiteError> {
        let category = self
            .sections
            .get(section)
            .map(|s| s.active_category.clone())
            .unwrap_or_else(|| ALL_CATEGORY.to_string());
        self.set_category(doc, section, &category)
    }
}

/// Page element that `section` lives on.
fn section_page(doc: &Document, section: &str) -> Option<NodeId> {
    let anchor = doc.first_with(ATTR_SECTION, section)?;
    let mut cursor = Some(anchor);
    while let Some(node) = cursor {
        if doc.attr(node, ATTR_PAGE).is_some() {
            return Some(node);
        }
        cursor = doc.parent(node);
    }
    None
}

/// Mark the dropdown option for `category` and clear the others.
fn sync_options(doc: &mut Document, section: &str, category: &str) {
    for option in doc.query_all(ATTR_SELECT_ITEM) {
        if doc.attr(option, ATTR_SECTION) != Some(section) {
            continue;
        }
        let on = doc
            .attr(option, ATTR_SELECT_ITEM)
            .is_some_and(|v| v.to_lowercase() == category);
        doc.set_class(option, CLASS_ACTIVE, on);
    }
}
