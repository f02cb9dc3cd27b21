use kuchiki::iter::NodeIterator;
use kuchiki::NodeRef;

use super::{DomBackend, PanelLookup, Query};

/// Walks the tree by hand: parent links, sibling links and attribute reads.
/// Used when no selector engine is wanted.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawDom;

impl RawDom {
    pub fn new() -> Self {
        Self
    }
}

fn next_element_sibling(node: &NodeRef) -> Option<NodeRef> {
    let mut cursor = node.next_sibling();
    while let Some(sibling) = cursor {
        if sibling.as_element().is_some() {
            return Some(sibling);
        }
        cursor = sibling.next_sibling();
    }
    None
}

impl DomBackend for RawDom {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn select_all(&self, root: &NodeRef, query: &Query) -> Vec<NodeRef> {
        root.inclusive_descendants()
            .filter(|node| query.matches(node))
            .collect()
    }

    fn matches(&self, node: &NodeRef, query: &Query) -> bool {
        query.matches(node)
    }

    fn closest(&self, node: &NodeRef, query: &Query) -> Option<NodeRef> {
        let mut cursor = Some(node.clone());
        while let Some(current) = cursor {
            if query.matches(&current) {
                return Some(current);
            }
            cursor = current.parent();
        }
        None
    }

    fn find_related(
        &self,
        trigger: &NodeRef,
        lookup: PanelLookup,
        query: &Query,
    ) -> Option<NodeRef> {
        match lookup {
            PanelLookup::NextSibling => {
                next_element_sibling(trigger).filter(|sibling| query.matches(sibling))
            }
            PanelLookup::Siblings => {
                let parent = trigger.parent()?;
                parent
                    .children()
                    .elements()
                    .map(|element| element.as_node().clone())
                    .find(|child| child != trigger && query.matches(child))
            }
            PanelLookup::Descendants => trigger.descendants().find(|node| query.matches(node)),
        }
    }
}
