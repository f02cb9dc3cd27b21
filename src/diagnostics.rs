use kuchiki::NodeRef;

use crate::config::DropdownConfig;
use crate::dom::{DomBackend, Query};
use crate::telemetry::{AncestorProbe, PanelProbe, VisibilityReport};

/// Inspect the probe container's panels without touching them.
///
/// There is no style engine behind the page, so where a browser would report
/// computed `display`/`overflow` the probe reports inline `style` attributes.
pub fn probe_visibility(
    document: &NodeRef,
    backend: &dyn DomBackend,
    config: &DropdownConfig,
) -> VisibilityReport {
    let settings = &config.diagnostics;
    let containers = backend.select_all(document, &Query::class(&settings.probe_container));

    let mut panels = Vec::new();
    let mut panel_nodes = Vec::new();
    let mut triggers = 0usize;
    let trigger_query = config.trigger_query();
    let panel_query = config.panel_query();
    for container in &containers {
        triggers += backend.select_all(container, &trigger_query).len();
        for panel in backend.select_all(container, &panel_query) {
            panels.push(PanelProbe {
                classes: backend.attribute(&panel, "class").unwrap_or_default(),
                shown: backend.has_class(&panel, &config.markers.shown_class),
                style: backend.attribute(&panel, "style"),
            });
            panel_nodes.push(panel);
        }
    }

    let ancestors = match panel_nodes.first() {
        Some(first) => settings
            .ancestor_classes
            .iter()
            .map(|class| {
                let ancestor = backend.closest(first, &Query::class(class));
                AncestorProbe {
                    class: class.clone(),
                    found: ancestor.is_some(),
                    style: ancestor.and_then(|node| backend.attribute(&node, "style")),
                }
            })
            .collect(),
        None => Vec::new(),
    };

    VisibilityReport {
        probe_container: settings.probe_container.clone(),
        triggers,
        panels,
        ancestors,
    }
}
