use kuchiki::iter::NodeIterator;
use kuchiki::NodeRef;
use tracing::trace;

use super::{FrameworkAdapter, FrameworkDropdown, WidgetError};
use crate::dom::{self, class_list};
use crate::page::ClickEvent;

const TOGGLE_SELECTOR: &str = r#"[data-bs-toggle="dropdown"]"#;
const MENU_SELECTOR: &str = ".dropdown-menu";
const OPEN_MENU_SELECTOR: &str = ".dropdown-menu.show";
const EXPANDED_SELECTOR: &str =
    r#"[data-bs-toggle="dropdown"][aria-expanded="true"], .dropdown-toggle[aria-expanded="true"]"#;
const CLASS_SHOW: &str = "show";

/// Bootstrap 5 dropdown behaviour: `data-bs-toggle="dropdown"` triggers, the
/// menu located as Bootstrap does (following sibling, preceding sibling, then
/// anywhere under the trigger's parent), one open menu per page.
#[derive(Debug, Clone)]
pub struct BootstrapDropdowns {
    version: String,
}

impl Default for BootstrapDropdowns {
    fn default() -> Self {
        Self {
            version: "5.3".to_string(),
        }
    }
}

impl BootstrapDropdowns {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(node: &NodeRef, selector: &str) -> bool {
    match kuchiki::Selectors::compile(selector) {
        Ok(selectors) => node
            .clone()
            .into_element_ref()
            .is_some_and(|element| selectors.matches(&element)),
        Err(()) => false,
    }
}

fn locate_menu(trigger: &NodeRef) -> Option<NodeRef> {
    let next = trigger
        .following_siblings()
        .elements()
        .map(|element| element.as_node().clone())
        .find(|sibling| matches(sibling, MENU_SELECTOR));
    if next.is_some() {
        return next;
    }

    let previous = trigger
        .preceding_siblings()
        .elements()
        .map(|element| element.as_node().clone())
        .find(|sibling| matches(sibling, MENU_SELECTOR));
    if previous.is_some() {
        return previous;
    }

    let parent = trigger.parent()?;
    let menu = parent.select_first(MENU_SELECTOR).ok()?;
    Some(menu.as_node().clone())
}

impl FrameworkAdapter for BootstrapDropdowns {
    fn name(&self) -> &str {
        "bootstrap"
    }

    fn version(&self) -> Option<&str> {
        Some(&self.version)
    }

    fn claims(&self, trigger: &NodeRef) -> bool {
        matches(trigger, TOGGLE_SELECTOR)
    }

    fn create_dropdown(&self, trigger: &NodeRef) -> Result<Box<dyn FrameworkDropdown>, WidgetError> {
        if trigger.as_element().is_none() {
            return Err(WidgetError::NotAnElement {
                trigger: dom::describe(trigger),
            });
        }
        let menu = locate_menu(trigger).ok_or_else(|| WidgetError::MenuNotFound {
            trigger: dom::describe(trigger),
        })?;
        Ok(Box::new(BootstrapDropdown {
            trigger: trigger.clone(),
            menu,
            disposed: false,
        }))
    }
}

#[derive(Debug)]
pub struct BootstrapDropdown {
    trigger: NodeRef,
    menu: NodeRef,
    disposed: bool,
}

impl BootstrapDropdown {
    fn is_disabled(&self) -> bool {
        dom::attribute(&self.trigger, "disabled").is_some()
            || dom::has_class(&self.trigger, "disabled")
    }

    fn document(&self) -> NodeRef {
        self.trigger
            .inclusive_ancestors()
            .last()
            .unwrap_or_else(|| self.trigger.clone())
    }

    fn clear_menus(&self) {
        let document = self.document();
        if let Ok(open) = document.select(OPEN_MENU_SELECTOR) {
            for menu in open.collect::<Vec<_>>() {
                remove_class(menu.as_node(), CLASS_SHOW);
            }
        }
        if let Ok(expanded) = document.select(EXPANDED_SELECTOR) {
            for toggle in expanded.collect::<Vec<_>>() {
                dom::set_attribute(toggle.as_node(), "aria-expanded", "false");
            }
        }
    }

    fn show(&mut self) {
        self.clear_menus();
        add_class(&self.menu, CLASS_SHOW);
        dom::set_attribute(&self.trigger, "aria-expanded", "true");
    }
}

fn add_class(node: &NodeRef, class: &str) {
    let current = dom::attribute(node, "class").unwrap_or_default();
    if let Some(updated) = class_list::with_added(&current, class) {
        dom::set_attribute(node, "class", &updated);
    }
}

fn remove_class(node: &NodeRef, class: &str) {
    let current = dom::attribute(node, "class").unwrap_or_default();
    if let Some(updated) = class_list::with_removed(&current, class) {
        dom::set_attribute(node, "class", &updated);
    }
}

fn is_anchor(node: &NodeRef) -> bool {
    node.as_element()
        .is_some_and(|element| &*element.name.local == "a")
}

impl FrameworkDropdown for BootstrapDropdown {
    fn toggle(&mut self, event: &mut ClickEvent) {
        if is_anchor(event.target()) || is_anchor(&self.trigger) {
            event.prevent_default();
        }
        if self.disposed || self.is_disabled() {
            trace!(target = "bootstrap", trigger = %dom::describe(&self.trigger), "toggle ignored");
            return;
        }
        if self.is_shown() {
            self.hide();
        } else {
            self.show();
        }
    }

    fn hide(&mut self) {
        if self.disposed {
            return;
        }
        remove_class(&self.menu, CLASS_SHOW);
        dom::set_attribute(&self.trigger, "aria-expanded", "false");
    }

    fn is_shown(&self) -> bool {
        dom::has_class(&self.menu, CLASS_SHOW)
    }

    fn dispose(&mut self) {
        self.disposed = true;
    }
}
