use std::rc::Rc;

use kuchiki::NodeRef;

/// Identifies a listener registered on a [`super::Page`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

pub type ClickHandler = Rc<dyn Fn(&mut ClickEvent)>;
pub type ReadyHandler = Rc<dyn Fn()>;

/// A click travelling from its target up to the document.
#[derive(Debug, Clone)]
pub struct ClickEvent {
    target: NodeRef,
    current_target: NodeRef,
    default_prevented: bool,
    propagation_stopped: bool,
}

impl ClickEvent {
    pub(crate) fn new(target: NodeRef) -> Self {
        Self {
            current_target: target.clone(),
            target,
            default_prevented: false,
            propagation_stopped: false,
        }
    }

    /// The element the click originated from.
    pub fn target(&self) -> &NodeRef {
        &self.target
    }

    /// The node whose listeners are currently running.
    pub fn current_target(&self) -> &NodeRef {
        &self.current_target
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }

    pub(crate) fn set_current_target(&mut self, node: NodeRef) {
        self.current_target = node;
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub default_prevented: bool,
    pub propagation_stopped: bool,
    pub listeners_invoked: usize,
}

impl From<&ClickEvent> for DispatchOutcome {
    fn from(event: &ClickEvent) -> Self {
        Self {
            default_prevented: event.default_prevented,
            propagation_stopped: event.propagation_stopped,
            listeners_invoked: 0,
        }
    }
}

pub(crate) struct ClickListener {
    pub id: ListenerId,
    pub node: NodeRef,
    pub handler: ClickHandler,
}

pub(crate) struct ReadyListener {
    pub id: ListenerId,
    pub handler: ReadyHandler,
}
