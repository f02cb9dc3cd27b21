//! UI framework integration: an adapter that can build its own dropdown
//! widget for a trigger element.

mod bootstrap;

use kuchiki::NodeRef;
use thiserror::Error;

use crate::page::ClickEvent;

pub use bootstrap::{BootstrapDropdown, BootstrapDropdowns};

#[derive(Debug, Error)]
pub enum WidgetError {
    #[error("no dropdown menu found for {trigger}")]
    MenuNotFound { trigger: String },
    #[error("{trigger} is not an element")]
    NotAnElement { trigger: String },
    #[error("widget construction failed for {trigger}: {reason}")]
    Construction { trigger: String, reason: String },
}

/// A framework capable of managing dropdowns on its own.
pub trait FrameworkAdapter {
    fn name(&self) -> &str;

    fn version(&self) -> Option<&str> {
        None
    }

    /// Whether this framework would manage `trigger` (its own marker).
    fn claims(&self, trigger: &NodeRef) -> bool;

    fn create_dropdown(&self, trigger: &NodeRef) -> Result<Box<dyn FrameworkDropdown>, WidgetError>;
}

/// One framework-managed dropdown bound to a single trigger.
pub trait FrameworkDropdown {
    /// React to a click on the trigger.
    fn toggle(&mut self, event: &mut ClickEvent);

    fn hide(&mut self);

    fn is_shown(&self) -> bool;

    fn dispose(&mut self);
}
