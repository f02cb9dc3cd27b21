//! Element queries and the two interchangeable ways of running them against
//! a page: hand-written tree walks ([`RawDom`]) and the CSS selector engine
//! ([`SelectorDom`]).

pub mod class_list;
mod query;
mod raw;
mod selector;

use kuchiki::NodeRef;

pub use query::{AttrMatch, Compound, Query};
pub use raw::RawDom;
pub use selector::SelectorDom;

/// Where to look for a trigger's panel, relative to the trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PanelLookup {
    /// The immediately following element sibling, if it matches.
    NextSibling,
    /// The first matching element sibling in document order.
    Siblings,
    /// The first matching descendant in document order.
    Descendants,
}

/// Element selection and mutation used by the dropdown controller.
///
/// Both backends must agree on every answer; they differ only in how the
/// answer is computed.
pub trait DomBackend {
    fn name(&self) -> &'static str;

    /// Every element under `root` (inclusive) matching `query`, in document
    /// order.
    fn select_all(&self, root: &NodeRef, query: &Query) -> Vec<NodeRef>;

    fn matches(&self, node: &NodeRef, query: &Query) -> bool;

    /// Nearest inclusive ancestor matching `query`.
    fn closest(&self, node: &NodeRef, query: &Query) -> Option<NodeRef>;

    /// Run one panel lookup step from `trigger`.
    fn find_related(&self, trigger: &NodeRef, lookup: PanelLookup, query: &Query)
        -> Option<NodeRef>;

    fn has_class(&self, node: &NodeRef, class: &str) -> bool {
        attribute(node, "class").is_some_and(|value| class_list::contains(&value, class))
    }

    /// Returns whether the class list changed.
    fn add_class(&self, node: &NodeRef, class: &str) -> bool {
        let current = attribute(node, "class").unwrap_or_default();
        match class_list::with_added(&current, class) {
            Some(updated) => set_attribute(node, "class", &updated),
            None => false,
        }
    }

    /// Returns whether the class list changed.
    fn remove_class(&self, node: &NodeRef, class: &str) -> bool {
        let Some(current) = attribute(node, "class") else {
            return false;
        };
        match class_list::with_removed(&current, class) {
            Some(updated) => set_attribute(node, "class", &updated),
            None => false,
        }
    }

    fn attribute(&self, node: &NodeRef, name: &str) -> Option<String> {
        attribute(node, name)
    }

    fn set_attribute(&self, node: &NodeRef, name: &str, value: &str) -> bool {
        set_attribute(node, name, value)
    }
}

/// Attribute value of an element node, `None` for non-elements. HTML
/// attribute names are case-insensitive.
pub fn attribute(node: &NodeRef, name: &str) -> Option<String> {
    node.as_element()?
        .attributes
        .borrow()
        .get(name.to_ascii_lowercase())
        .map(str::to_string)
}

/// Set an attribute on an element node. Returns `false` for non-elements.
pub fn set_attribute(node: &NodeRef, name: &str, value: &str) -> bool {
    let Some(element) = node.as_element() else {
        return false;
    };
    element
        .attributes
        .borrow_mut()
        .insert(name.to_ascii_lowercase(), value.to_string());
    true
}

pub fn has_class(node: &NodeRef, class: &str) -> bool {
    attribute(node, "class").is_some_and(|value| class_list::contains(&value, class))
}

/// Short CSS-like label for logs, e.g. `a#profile.dropdown-toggle.profile-pic`.
pub fn describe(node: &NodeRef) -> String {
    let Some(element) = node.as_element() else {
        return "#document".to_string();
    };
    let mut label = element.name.local.to_string();
    let attributes = element.attributes.borrow();
    if let Some(id) = attributes.get("id") {
        label.push('#');
        label.push_str(id);
    }
    if let Some(classes) = attributes.get("class") {
        for class in classes.split_ascii_whitespace() {
            label.push('.');
            label.push_str(class);
        }
    }
    label
}
