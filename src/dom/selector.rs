use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use kuchiki::iter::NodeIterator;
use kuchiki::{NodeRef, Selectors};
use tracing::warn;

use super::{DomBackend, PanelLookup, Query};

/// Runs queries through the CSS selector engine, the way a page script would
/// with a DOM helper library. Compiled selectors are cached per query.
#[derive(Default)]
pub struct SelectorDom {
    compiled: RefCell<HashMap<String, Option<Rc<Selectors>>>>,
}

impl std::fmt::Debug for SelectorDom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectorDom")
            .field("cached", &self.compiled.borrow().len())
            .finish()
    }
}

impl SelectorDom {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when the query does not compile; that is logged once and the
    /// query then matches nothing.
    fn compile(&self, query: &Query) -> Option<Rc<Selectors>> {
        let css = query.to_css();
        if let Some(cached) = self.compiled.borrow().get(&css) {
            return cached.clone();
        }

        let compiled = match Selectors::compile(&css) {
            Ok(selectors) => Some(Rc::new(selectors)),
            Err(()) => {
                warn!(target = "dropdown", selector = %css, "selector failed to compile");
                None
            }
        };
        self.compiled.borrow_mut().insert(css, compiled.clone());
        compiled
    }

    fn node_matches(selectors: &Selectors, node: &NodeRef) -> bool {
        node.clone()
            .into_element_ref()
            .is_some_and(|element| selectors.matches(&element))
    }
}

impl DomBackend for SelectorDom {
    fn name(&self) -> &'static str {
        "selector"
    }

    fn select_all(&self, root: &NodeRef, query: &Query) -> Vec<NodeRef> {
        let Some(selectors) = self.compile(query) else {
            return Vec::new();
        };
        root.inclusive_descendants()
            .elements()
            .filter(|element| selectors.matches(element))
            .map(|element| element.as_node().clone())
            .collect()
    }

    fn matches(&self, node: &NodeRef, query: &Query) -> bool {
        self.compile(query)
            .is_some_and(|selectors| Self::node_matches(&selectors, node))
    }

    fn closest(&self, node: &NodeRef, query: &Query) -> Option<NodeRef> {
        let selectors = self.compile(query)?;
        node.inclusive_ancestors()
            .find(|ancestor| Self::node_matches(&selectors, ancestor))
    }

    fn find_related(
        &self,
        trigger: &NodeRef,
        lookup: PanelLookup,
        query: &Query,
    ) -> Option<NodeRef> {
        let selectors = self.compile(query)?;
        match lookup {
            // `.next(selector)`: only the adjacent element sibling qualifies.
            PanelLookup::NextSibling => trigger
                .following_siblings()
                .elements()
                .next()
                .filter(|element| selectors.matches(element))
                .map(|element| element.as_node().clone()),
            PanelLookup::Siblings => {
                let parent = trigger.parent()?;
                parent
                    .children()
                    .elements()
                    .filter(|element| element.as_node() != trigger)
                    .find(|element| selectors.matches(element))
                    .map(|element| element.as_node().clone())
            }
            PanelLookup::Descendants => trigger
                .descendants()
                .elements()
                .find(|element| selectors.matches(element))
                .map(|element| element.as_node().clone()),
        }
    }
}
