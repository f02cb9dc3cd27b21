//! A parsed HTML page with just enough of a browser around it to host
//! dropdown wiring: ready state, click bubbling, one-shot timers and named
//! global entry points.

mod events;
mod timers;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use kuchiki::traits::*;
use kuchiki::{parse_html, NodeRef};
use thiserror::Error;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, trace};

pub use events::{ClickEvent, ClickHandler, DispatchOutcome, ListenerId, ReadyHandler};
pub use timers::TimerId;

use events::{ClickListener, ReadyListener};
use timers::TimerQueue;

#[derive(Debug, Error)]
pub enum PageError {
    #[error("no global named `{0}` is exposed on the page")]
    UnknownGlobal(String),
    #[error("failed to compile selector `{0}`")]
    InvalidSelector(String),
    #[error("no element matches `{0}`")]
    NoMatch(String),
}

/// Mirrors `document.readyState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Interactive,
}

struct PageInner {
    document: NodeRef,
    ready_state: Cell<ReadyState>,
    next_listener_id: Cell<u64>,
    click_listeners: RefCell<Vec<ClickListener>>,
    ready_listeners: RefCell<Vec<ReadyListener>>,
    timers: TimerQueue,
    globals: RefCell<HashMap<String, Rc<dyn Fn()>>>,
}

/// Shared handle to a page. Cloning is cheap and every clone sees the same
/// document, listeners and timers.
#[derive(Clone)]
pub struct Page {
    inner: Rc<PageInner>,
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("ready_state", &self.ready_state())
            .field("click_listeners", &self.listener_count())
            .field("pending_timers", &self.pending_timers())
            .finish()
    }
}

impl Page {
    /// Parse `html` into a page whose content is already available.
    pub fn parse(html: &str) -> Self {
        Self::with_state(parse_html().one(html), ReadyState::Interactive)
    }

    /// Parse `html` but leave the page in the loading state until
    /// [`Page::finish_loading`] fires the content-loaded signal.
    pub fn parse_loading(html: &str) -> Self {
        Self::with_state(parse_html().one(html), ReadyState::Loading)
    }

    fn with_state(document: NodeRef, ready_state: ReadyState) -> Self {
        Self {
            inner: Rc::new(PageInner {
                document,
                ready_state: Cell::new(ready_state),
                next_listener_id: Cell::new(1),
                click_listeners: RefCell::new(Vec::new()),
                ready_listeners: RefCell::new(Vec::new()),
                timers: TimerQueue::new(),
                globals: RefCell::new(HashMap::new()),
            }),
        }
    }

    /// The document node. Document-level listeners are registered on it.
    pub fn document(&self) -> &NodeRef {
        &self.inner.document
    }

    pub fn ready_state(&self) -> ReadyState {
        self.inner.ready_state.get()
    }

    fn next_listener_id(&self) -> ListenerId {
        let id = self.inner.next_listener_id.get();
        self.inner.next_listener_id.set(id + 1);
        ListenerId(id)
    }

    /// Register a listener for the content-loaded signal. It fires at most
    /// once, and only if the page is still loading when the signal arrives.
    pub fn on_content_loaded(&self, handler: ReadyHandler) -> ListenerId {
        let id = self.next_listener_id();
        self.inner
            .ready_listeners
            .borrow_mut()
            .push(ReadyListener { id, handler });
        id
    }

    /// Move to [`ReadyState::Interactive`] and fire content-loaded listeners.
    /// Calling it again is a no-op.
    pub fn finish_loading(&self) {
        if self.ready_state() != ReadyState::Loading {
            return;
        }
        self.inner.ready_state.set(ReadyState::Interactive);
        let listeners = std::mem::take(&mut *self.inner.ready_listeners.borrow_mut());
        debug!(
            target = "page",
            listeners = listeners.len(),
            "content loaded"
        );
        for listener in listeners {
            (listener.handler)();
        }
    }

    pub fn add_click_listener(&self, node: &NodeRef, handler: ClickHandler) -> ListenerId {
        let id = self.next_listener_id();
        self.inner.click_listeners.borrow_mut().push(ClickListener {
            id,
            node: node.clone(),
            handler,
        });
        id
    }

    /// Remove a click or content-loaded listener. Returns whether it existed.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut clicks = self.inner.click_listeners.borrow_mut();
        let before = clicks.len();
        clicks.retain(|listener| listener.id != id);
        if clicks.len() != before {
            return true;
        }
        drop(clicks);

        let mut ready = self.inner.ready_listeners.borrow_mut();
        let before = ready.len();
        ready.retain(|listener| listener.id != id);
        ready.len() != before
    }

    /// Number of registered click listeners across the whole page.
    pub fn listener_count(&self) -> usize {
        self.inner.click_listeners.borrow().len()
    }

    /// Number of click listeners registered directly on `node`.
    pub fn listeners_on(&self, node: &NodeRef) -> usize {
        self.inner
            .click_listeners
            .borrow()
            .iter()
            .filter(|listener| listener.node == *node)
            .count()
    }

    /// Dispatch a click at `target`, bubbling through its ancestors up to the
    /// document until a listener stops propagation.
    pub fn click(&self, target: &NodeRef) -> DispatchOutcome {
        let mut event = ClickEvent::new(target.clone());
        let mut invoked = 0usize;

        for node in target.inclusive_ancestors() {
            let handlers: Vec<ClickHandler> = self
                .inner
                .click_listeners
                .borrow()
                .iter()
                .filter(|listener| listener.node == node)
                .map(|listener| Rc::clone(&listener.handler))
                .collect();

            if handlers.is_empty() {
                continue;
            }

            event.set_current_target(node);
            for handler in handlers {
                handler(&mut event);
                invoked += 1;
            }
            if event.propagation_stopped() {
                break;
            }
        }

        trace!(
            target = "page",
            listeners = invoked,
            default_prevented = event.default_prevented(),
            propagation_stopped = event.propagation_stopped(),
            "click dispatched"
        );

        DispatchOutcome {
            listeners_invoked: invoked,
            ..DispatchOutcome::from(&event)
        }
    }

    /// Click the first element matching a CSS selector.
    pub fn click_selector(&self, selector: &str) -> Result<DispatchOutcome, PageError> {
        let target = self
            .query(selector)?
            .ok_or_else(|| PageError::NoMatch(selector.to_string()))?;
        Ok(self.click(&target))
    }

    /// First element matching a CSS selector, in document order.
    pub fn query(&self, selector: &str) -> Result<Option<NodeRef>, PageError> {
        let mut matches = self.query_all(selector)?;
        Ok(if matches.is_empty() {
            None
        } else {
            Some(matches.remove(0))
        })
    }

    pub fn query_all(&self, selector: &str) -> Result<Vec<NodeRef>, PageError> {
        let selected = self
            .inner
            .document
            .select(selector)
            .map_err(|_| PageError::InvalidSelector(selector.to_string()))?;
        Ok(selected.map(|element| element.as_node().clone()).collect())
    }

    pub fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerId {
        self.inner.timers.register(delay, callback)
    }

    pub fn clear_timeout(&self, id: TimerId) -> bool {
        self.inner.timers.clear(id)
    }

    pub fn pending_timers(&self) -> usize {
        self.inner.timers.len()
    }

    /// Run every timer whose deadline has passed. Returns how many ran.
    pub fn run_due_timers(&self) -> usize {
        let due = self.inner.timers.take_due(Instant::now());
        let count = due.len();
        for callback in due {
            callback();
        }
        count
    }

    /// Sleep until every pending timer has fired, including timers scheduled
    /// by other timers.
    pub async fn settle(&self) {
        while let Some(deadline) = self.inner.timers.next_deadline() {
            sleep_until(deadline).await;
            self.run_due_timers();
        }
    }

    /// Expose a callable under `name`, replacing any previous binding.
    pub fn expose_global(&self, name: &str, function: Rc<dyn Fn()>) {
        self.inner
            .globals
            .borrow_mut()
            .insert(name.to_string(), function);
    }

    pub fn remove_global(&self, name: &str) -> bool {
        self.inner.globals.borrow_mut().remove(name).is_some()
    }

    pub fn has_global(&self, name: &str) -> bool {
        self.inner.globals.borrow().contains_key(name)
    }

    pub fn call_global(&self, name: &str) -> Result<(), PageError> {
        let function = self
            .inner
            .globals
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| PageError::UnknownGlobal(name.to_string()))?;
        function();
        Ok(())
    }

    /// Serialize the current document tree.
    pub fn to_html(&self) -> String {
        self.inner.document.to_string()
    }

    /// Drop every timer and listener. Used when a page is torn down.
    pub fn clear(&self) {
        self.inner.timers.clear_all();
        self.inner.click_listeners.borrow_mut().clear();
        self.inner.ready_listeners.borrow_mut().clear();
        self.inner.globals.borrow_mut().clear();
    }
}
