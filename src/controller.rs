//! The dropdown controller: discovers triggers, picks one strategy per
//! trigger, and keeps at most one panel open across the page.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use kuchiki::NodeRef;
use tracing::{debug, trace};

use crate::config::DropdownConfig;
use crate::diagnostics::probe_visibility;
use crate::dom::{self, DomBackend, PanelLookup, Query, RawDom};
use crate::framework::{FrameworkAdapter, FrameworkDropdown};
use crate::page::{ClickEvent, ListenerId, Page, ReadyState, TimerId};
use crate::telemetry::{DropdownObserver, LifecycleEvent, StrategyKind, TracingObserver};

/// Result of toggling one trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub panel_found: bool,
    pub was_shown: bool,
    pub shown: bool,
}

struct GroupPlan {
    name: String,
    query: Query,
    lookups: Vec<PanelLookup>,
}

struct Queries {
    triggers: Query,
    panels: Query,
    shown_panels: Query,
    expanded_triggers: Query,
    containers: Query,
    probe_container: Query,
}

enum Strategy {
    Manual { group: usize },
    Framework(Rc<RefCell<Box<dyn FrameworkDropdown>>>),
}

struct Binding {
    trigger: NodeRef,
    listener: ListenerId,
    strategy: Strategy,
}

enum Route {
    Manual { group: usize },
    Framework(Rc<RefCell<Box<dyn FrameworkDropdown>>>),
}

struct ControllerState {
    page: Page,
    config: DropdownConfig,
    groups: Vec<GroupPlan>,
    queries: Queries,
    backend: Box<dyn DomBackend>,
    framework: Option<Box<dyn FrameworkAdapter>>,
    observer: Rc<dyn DropdownObserver>,
    bindings: RefCell<Vec<Binding>>,
    document_listener: Cell<Option<ListenerId>>,
    ready_listener: Cell<Option<ListenerId>>,
    diagnostic_timer: Cell<Option<TimerId>>,
    initialized: Cell<bool>,
    disposed: Cell<bool>,
}

/// Configures and installs a [`DropdownController`] on a page.
pub struct DropdownControllerBuilder {
    page: Page,
    config: DropdownConfig,
    backend: Option<Box<dyn DomBackend>>,
    framework: Option<Box<dyn FrameworkAdapter>>,
    observer: Option<Rc<dyn DropdownObserver>>,
}

impl DropdownControllerBuilder {
    pub fn config(mut self, config: DropdownConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a specific DOM backend instead of [`RawDom`].
    pub fn dom_backend(mut self, backend: impl DomBackend + 'static) -> Self {
        self.backend = Some(Box::new(backend));
        self
    }

    pub fn framework(mut self, framework: impl FrameworkAdapter + 'static) -> Self {
        self.framework = Some(Box::new(framework));
        self
    }

    pub fn observer(mut self, observer: Rc<dyn DropdownObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Expose the re-initialisation global and initialise now, or once the
    /// page finishes loading.
    pub fn install(self) -> DropdownController {
        let config = self.config;
        let groups = config
            .groups
            .iter()
            .map(|group| GroupPlan {
                name: group.name.clone(),
                query: config.group_query(group),
                lookups: group.panel_lookup.clone(),
            })
            .collect();
        let queries = Queries {
            triggers: config.trigger_query(),
            panels: config.panel_query(),
            shown_panels: config.shown_panel_query(),
            expanded_triggers: config.expanded_trigger_query(),
            containers: config.container_query(),
            probe_container: Query::class(&config.diagnostics.probe_container),
        };

        let state = Rc::new(ControllerState {
            page: self.page,
            config,
            groups,
            queries,
            backend: self.backend.unwrap_or_else(|| Box::new(RawDom::new())),
            framework: self.framework,
            observer: self.observer.unwrap_or_else(|| Rc::new(TracingObserver)),
            bindings: RefCell::new(Vec::new()),
            document_listener: Cell::new(None),
            ready_listener: Cell::new(None),
            diagnostic_timer: Cell::new(None),
            initialized: Cell::new(false),
            disposed: Cell::new(false),
        });

        let weak = Rc::downgrade(&state);
        state.page.expose_global(
            &state.config.global_entry_point,
            Rc::new(move || {
                if let Some(state) = weak.upgrade() {
                    state.initialize(false);
                }
            }),
        );

        if state.page.ready_state() == ReadyState::Loading {
            let weak = Rc::downgrade(&state);
            let id = state.page.on_content_loaded(Rc::new(move || {
                if let Some(state) = weak.upgrade() {
                    state.ready_listener.set(None);
                    state.initialize(true);
                }
            }));
            state.ready_listener.set(Some(id));
            debug!(target = "dropdown", "page still loading; initialization deferred");
        } else {
            state.initialize(false);
        }

        DropdownController { state }
    }
}

/// Owns the dropdown wiring of one page. Listeners hold only weak references
/// back to the controller, so dropping every handle leaves them inert;
/// [`DropdownController::dispose`] removes them from the page.
pub struct DropdownController {
    state: Rc<ControllerState>,
}

impl DropdownController {
    pub fn builder(page: &Page) -> DropdownControllerBuilder {
        DropdownControllerBuilder {
            page: page.clone(),
            config: DropdownConfig::default(),
            backend: None,
            framework: None,
            observer: None,
        }
    }

    /// Rediscover triggers and rebind them. Previous bindings are removed
    /// first, so repeated calls never stack listeners.
    pub fn initialize(&self) {
        self.state.initialize(false);
    }

    /// Toggle `trigger` as if it had been clicked. `None` when the trigger is
    /// not bound.
    pub fn toggle(&self, trigger: &NodeRef) -> Option<ToggleOutcome> {
        let mut event = ClickEvent::new(trigger.clone());
        self.state.on_trigger_click(trigger, &mut event)
    }

    /// Close every open panel unless `target` is inside a dropdown container
    /// or a trigger. Returns the number of panels closed.
    pub fn dismiss_if_outside(&self, target: &NodeRef) -> usize {
        self.state.dismiss_if_outside(target)
    }

    pub fn bound_triggers(&self) -> Vec<NodeRef> {
        self.state
            .bindings
            .borrow()
            .iter()
            .map(|binding| binding.trigger.clone())
            .collect()
    }

    pub fn strategy_of(&self, trigger: &NodeRef) -> Option<StrategyKind> {
        let bindings = self.state.bindings.borrow();
        let binding = bindings.iter().find(|binding| binding.trigger == *trigger)?;
        Some(self.state.strategy_kind(&binding.strategy))
    }

    /// Whether the trigger's dropdown is currently open.
    pub fn is_open(&self, trigger: &NodeRef) -> Option<bool> {
        let bindings = self.state.bindings.borrow();
        let binding = bindings.iter().find(|binding| binding.trigger == *trigger)?;
        Some(match &binding.strategy {
            Strategy::Manual { group } => self
                .state
                .resolve_panel(trigger, *group)
                .is_some_and(|panel| self.state.is_shown(&panel)),
            Strategy::Framework(widget) => widget.try_borrow().is_ok_and(|w| w.is_shown()),
        })
    }

    /// Panel a trigger resolves to through its group's lookup order.
    pub fn panel_for(&self, trigger: &NodeRef) -> Option<NodeRef> {
        let group = self.state.group_for(trigger)?;
        self.state.resolve_panel(trigger, group)
    }

    pub fn is_initialized(&self) -> bool {
        self.state.initialized.get()
    }

    pub fn is_disposed(&self) -> bool {
        self.state.disposed.get()
    }

    pub fn config(&self) -> &DropdownConfig {
        &self.state.config
    }

    pub fn page(&self) -> &Page {
        &self.state.page
    }

    /// Remove every listener, timer and global this controller installed.
    pub fn dispose(&self) {
        self.state.dispose();
    }
}

impl ControllerState {
    fn emit(&self, event: LifecycleEvent) {
        self.observer.notify(&event);
    }

    fn document(&self) -> &NodeRef {
        self.page.document()
    }

    fn strategy_kind(&self, strategy: &Strategy) -> StrategyKind {
        match strategy {
            Strategy::Manual { group } => StrategyKind::Manual {
                group: self.groups[*group].name.clone(),
            },
            Strategy::Framework(_) => StrategyKind::Framework {
                framework: self
                    .framework
                    .as_ref()
                    .map(|framework| framework.name().to_string())
                    .unwrap_or_default(),
            },
        }
    }

    fn group_for(&self, trigger: &NodeRef) -> Option<usize> {
        self.groups
            .iter()
            .position(|group| self.backend.matches(trigger, &group.query))
    }

    fn resolve_panel(&self, trigger: &NodeRef, group: usize) -> Option<NodeRef> {
        self.groups[group]
            .lookups
            .iter()
            .find_map(|lookup| {
                self.backend
                    .find_related(trigger, *lookup, &self.queries.panels)
            })
    }

    fn is_shown(&self, panel: &NodeRef) -> bool {
        self.backend
            .has_class(panel, &self.config.markers.shown_class)
    }

    fn count_probe_triggers(&self) -> usize {
        self.backend
            .select_all(self.document(), &self.queries.probe_container)
            .iter()
            .map(|container| {
                self.backend
                    .select_all(container, &self.queries.triggers)
                    .len()
            })
            .sum()
    }

    fn initialize(self: &Rc<Self>, deferred: bool) {
        if self.disposed.get() {
            return;
        }

        let triggers = self
            .backend
            .select_all(self.document(), &self.queries.triggers);
        self.emit(LifecycleEvent::InitStarted {
            backend: self.backend.name().to_string(),
            framework: self
                .framework
                .as_ref()
                .map(|framework| framework.name().to_string()),
            framework_version: self
                .framework
                .as_ref()
                .and_then(|framework| framework.version().map(str::to_string)),
            triggers: triggers.len(),
            probe_triggers: self.count_probe_triggers(),
            deferred,
        });

        self.unbind_triggers();

        let mut manual = 0usize;
        let mut framework = 0usize;
        let mut failed = 0usize;
        for (index, trigger) in triggers.into_iter().enumerate() {
            let Some(group) = self.group_for(&trigger) else {
                continue;
            };
            let strategy = match self.framework_widget(index, &trigger) {
                Some(Ok(widget)) => {
                    framework += 1;
                    Strategy::Framework(Rc::new(RefCell::new(widget)))
                }
                Some(Err(())) => {
                    failed += 1;
                    manual += 1;
                    Strategy::Manual { group }
                }
                None => {
                    manual += 1;
                    Strategy::Manual { group }
                }
            };
            let kind = self.strategy_kind(&strategy);

            let weak: Weak<Self> = Rc::downgrade(self);
            let bound = trigger.clone();
            let listener = self.page.add_click_listener(
                &trigger,
                Rc::new(move |event: &mut ClickEvent| {
                    if let Some(state) = weak.upgrade() {
                        state.on_trigger_click(&bound, event);
                    }
                }),
            );

            let description = dom::describe(&trigger);
            self.bindings.borrow_mut().push(Binding {
                trigger,
                listener,
                strategy,
            });
            self.emit(LifecycleEvent::TriggerBound {
                index,
                trigger: description,
                strategy: kind,
            });
        }

        self.ensure_document_listener();
        self.schedule_diagnostics();
        self.initialized.set(true);

        self.emit(LifecycleEvent::InitFinished {
            manual,
            framework,
            failed,
        });
    }

    /// `None` when the framework does not take the trigger, `Some(Err(()))`
    /// when it tried and failed (already reported).
    fn framework_widget(
        &self,
        index: usize,
        trigger: &NodeRef,
    ) -> Option<Result<Box<dyn FrameworkDropdown>, ()>> {
        let framework = self.framework.as_ref()?;
        if !framework.claims(trigger) {
            return None;
        }
        Some(framework.create_dropdown(trigger).map_err(|err| {
            self.emit(LifecycleEvent::BindFailed {
                index,
                trigger: dom::describe(trigger),
                error: err.to_string(),
            });
        }))
    }

    fn ensure_document_listener(self: &Rc<Self>) {
        if self.document_listener.get().is_some() {
            return;
        }
        let weak = Rc::downgrade(self);
        let id = self.page.add_click_listener(
            self.page.document(),
            Rc::new(move |event: &mut ClickEvent| {
                if let Some(state) = weak.upgrade() {
                    state.dismiss_if_outside(event.target());
                }
            }),
        );
        self.document_listener.set(Some(id));
    }

    fn schedule_diagnostics(self: &Rc<Self>) {
        if let Some(previous) = self.diagnostic_timer.take() {
            self.page.clear_timeout(previous);
        }
        if !self.config.diagnostics.enabled || !self.observer.wants_diagnostics() {
            return;
        }
        let weak = Rc::downgrade(self);
        let id = self.page.set_timeout(
            self.config.diagnostics.delay(),
            Box::new(move || {
                if let Some(state) = weak.upgrade() {
                    state.diagnostic_timer.set(None);
                    let report =
                        probe_visibility(state.document(), state.backend.as_ref(), &state.config);
                    state.emit(LifecycleEvent::Diagnostic(report));
                }
            }),
        );
        self.diagnostic_timer.set(Some(id));
    }

    /// Remove trigger listeners and dispose framework widgets. Returns the
    /// number of listeners removed.
    fn unbind_triggers(&self) -> usize {
        let bindings = std::mem::take(&mut *self.bindings.borrow_mut());
        let mut removed = 0;
        for binding in bindings {
            if self.page.remove_listener(binding.listener) {
                removed += 1;
            }
            if let Strategy::Framework(widget) = binding.strategy {
                if let Ok(mut widget) = widget.try_borrow_mut() {
                    widget.dispose();
                }
            }
        }
        removed
    }

    fn on_trigger_click(&self, trigger: &NodeRef, event: &mut ClickEvent) -> Option<ToggleOutcome> {
        let (route, kind) = {
            let bindings = self.bindings.borrow();
            let binding = bindings.iter().find(|binding| binding.trigger == *trigger)?;
            let route = match &binding.strategy {
                Strategy::Manual { group } => Route::Manual { group: *group },
                Strategy::Framework(widget) => Route::Framework(Rc::clone(widget)),
            };
            (route, self.strategy_kind(&binding.strategy))
        };

        let outcome = match route {
            Route::Manual { group } => {
                event.prevent_default();
                event.stop_propagation();
                self.toggle_manual(trigger, group)
            }
            Route::Framework(widget) => {
                let was_shown = widget.try_borrow().ok()?.is_shown();
                if !was_shown {
                    self.close_all();
                }
                let mut dropdown = widget.try_borrow_mut().ok()?;
                dropdown.toggle(event);
                ToggleOutcome {
                    panel_found: true,
                    was_shown,
                    shown: dropdown.is_shown(),
                }
            }
        };

        self.emit(LifecycleEvent::Toggled {
            trigger: dom::describe(trigger),
            strategy: kind,
            panel_found: outcome.panel_found,
            was_shown: outcome.was_shown,
            shown: outcome.shown,
        });
        Some(outcome)
    }

    fn toggle_manual(&self, trigger: &NodeRef, group: usize) -> ToggleOutcome {
        let expanded = &self.config.markers.expanded_attribute;
        let panel = self.resolve_panel(trigger, group);
        let was_shown = panel.as_ref().is_some_and(|panel| self.is_shown(panel));

        self.close_all();

        let shown = match &panel {
            Some(panel) if !was_shown => {
                self.backend
                    .add_class(panel, &self.config.markers.shown_class);
                self.backend.set_attribute(trigger, expanded, "true");
                true
            }
            _ => {
                self.backend.set_attribute(trigger, expanded, "false");
                false
            }
        };

        ToggleOutcome {
            panel_found: panel.is_some(),
            was_shown,
            shown,
        }
    }

    fn any_shown(&self) -> bool {
        let framework_open = self.bindings.borrow().iter().any(|binding| match &binding.strategy {
            Strategy::Framework(widget) => widget.try_borrow().is_ok_and(|w| w.is_shown()),
            Strategy::Manual { .. } => false,
        });
        framework_open
            || !self
                .backend
                .select_all(self.document(), &self.queries.shown_panels)
                .is_empty()
    }

    /// Hide every shown panel and collapse every expanded trigger. Framework
    /// widgets are closed through their own API first.
    fn close_all(&self) -> usize {
        let mut closed = 0;
        for binding in self.bindings.borrow().iter() {
            if let Strategy::Framework(widget) = &binding.strategy {
                if let Ok(mut widget) = widget.try_borrow_mut() {
                    if widget.is_shown() {
                        widget.hide();
                        closed += 1;
                    }
                }
            }
        }

        let shown_class = &self.config.markers.shown_class;
        for panel in self
            .backend
            .select_all(self.document(), &self.queries.shown_panels)
        {
            if self.backend.remove_class(&panel, shown_class) {
                closed += 1;
            }
        }

        let expanded = &self.config.markers.expanded_attribute;
        for trigger in self
            .backend
            .select_all(self.document(), &self.queries.expanded_triggers)
        {
            self.backend.set_attribute(&trigger, expanded, "false");
        }
        closed
    }

    fn dismiss_if_outside(&self, target: &NodeRef) -> usize {
        if self.disposed.get() {
            return 0;
        }
        let inside = self
            .backend
            .closest(target, &self.queries.containers)
            .is_some()
            || self
                .backend
                .closest(target, &self.queries.triggers)
                .is_some();
        if inside {
            trace!(target = "dropdown", clicked = %dom::describe(target), "click inside a dropdown");
            return 0;
        }
        if !self.any_shown() {
            return 0;
        }

        let closed = self.close_all();
        if closed > 0 {
            self.emit(LifecycleEvent::Dismissed { closed });
        }
        closed
    }

    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        let mut removed = self.unbind_triggers();
        if let Some(id) = self.document_listener.take() {
            if self.page.remove_listener(id) {
                removed += 1;
            }
        }
        if let Some(id) = self.ready_listener.take() {
            self.page.remove_listener(id);
        }
        if let Some(id) = self.diagnostic_timer.take() {
            self.page.clear_timeout(id);
        }
        self.page.remove_global(&self.config.global_entry_point);
        self.initialized.set(false);
        self.emit(LifecycleEvent::Disposed {
            listeners_removed: removed,
        });
    }
}
