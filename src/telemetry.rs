//! Lifecycle events emitted by the dropdown controller and the observers
//! that consume them.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use serde::Serialize;
use tracing::{debug, info, warn};

/// How a trigger's clicks are handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyKind {
    /// Controller-owned toggle using the named trigger group.
    Manual { group: String },
    /// A widget built by the framework adapter.
    Framework { framework: String },
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manual { group } => write!(f, "manual:{group}"),
            Self::Framework { framework } => write!(f, "framework:{framework}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanelProbe {
    pub classes: String,
    pub shown: bool,
    pub style: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AncestorProbe {
    pub class: String,
    pub found: bool,
    pub style: Option<String>,
}

/// What the deferred visibility probe saw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisibilityReport {
    pub probe_container: String,
    pub triggers: usize,
    pub panels: Vec<PanelProbe>,
    pub ancestors: Vec<AncestorProbe>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    InitStarted {
        backend: String,
        framework: Option<String>,
        framework_version: Option<String>,
        triggers: usize,
        probe_triggers: usize,
        deferred: bool,
    },
    TriggerBound {
        index: usize,
        trigger: String,
        strategy: StrategyKind,
    },
    BindFailed {
        index: usize,
        trigger: String,
        error: String,
    },
    InitFinished {
        manual: usize,
        framework: usize,
        failed: usize,
    },
    Toggled {
        trigger: String,
        strategy: StrategyKind,
        panel_found: bool,
        was_shown: bool,
        shown: bool,
    },
    Dismissed {
        closed: usize,
    },
    Diagnostic(VisibilityReport),
    Disposed {
        listeners_removed: usize,
    },
}

/// Receives lifecycle events. Observers are advisory: nothing they do feeds
/// back into dropdown behaviour.
pub trait DropdownObserver {
    fn notify(&self, event: &LifecycleEvent);

    /// Whether the deferred visibility probe should be scheduled at all.
    fn wants_diagnostics(&self) -> bool {
        true
    }
}

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl DropdownObserver for TracingObserver {
    fn notify(&self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::InitStarted {
                backend,
                framework,
                framework_version,
                triggers,
                probe_triggers,
                deferred,
            } => {
                info!(
                    target = "dropdown",
                    backend = %backend,
                    framework = framework.as_deref().unwrap_or("none"),
                    framework_version = framework_version.as_deref().unwrap_or("unknown"),
                    triggers,
                    probe_triggers,
                    deferred,
                    "initializing dropdowns"
                );
                if framework.is_none() {
                    debug!(target = "dropdown", "no framework adapter; manual handlers only");
                }
            }
            LifecycleEvent::TriggerBound {
                index,
                trigger,
                strategy,
            } => {
                debug!(target = "dropdown", index, trigger = %trigger, strategy = %strategy, "trigger bound");
            }
            LifecycleEvent::BindFailed {
                index,
                trigger,
                error,
            } => {
                warn!(target = "dropdown", index, trigger = %trigger, error = %error, "framework widget failed; using manual handler");
            }
            LifecycleEvent::InitFinished {
                manual,
                framework,
                failed,
            } => {
                info!(target = "dropdown", manual, framework, failed, "dropdowns initialized");
            }
            LifecycleEvent::Toggled {
                trigger,
                strategy,
                panel_found,
                was_shown,
                shown,
            } => {
                debug!(
                    target = "dropdown",
                    trigger = %trigger,
                    strategy = %strategy,
                    panel_found,
                    was_shown,
                    shown,
                    "dropdown toggled"
                );
            }
            LifecycleEvent::Dismissed { closed } => {
                debug!(target = "dropdown", closed, "closed open dropdowns (click outside)");
            }
            LifecycleEvent::Diagnostic(report) => {
                info!(
                    target = "dropdown",
                    container = %report.probe_container,
                    triggers = report.triggers,
                    panels = report.panels.len(),
                    "visibility probe"
                );
                for panel in &report.panels {
                    debug!(
                        target = "dropdown",
                        classes = %panel.classes,
                        shown = panel.shown,
                        style = panel.style.as_deref().unwrap_or(""),
                        "probed panel"
                    );
                }
                for ancestor in &report.ancestors {
                    debug!(
                        target = "dropdown",
                        class = %ancestor.class,
                        found = ancestor.found,
                        style = ancestor.style.as_deref().unwrap_or(""),
                        "probed panel ancestor"
                    );
                }
            }
            LifecycleEvent::Disposed { listeners_removed } => {
                info!(target = "dropdown", listeners_removed, "dropdown controller disposed");
            }
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: RefCell<Vec<LifecycleEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.borrow().clone()
    }

    pub fn take(&self) -> Vec<LifecycleEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }
}

impl DropdownObserver for RecordingObserver {
    fn notify(&self, event: &LifecycleEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}

/// Writes each event as one JSON line.
pub struct JsonLinesObserver<W: Write> {
    writer: RefCell<W>,
}

impl<W: Write> JsonLinesObserver<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: RefCell::new(writer),
        }
    }
}

impl<W: Write> DropdownObserver for JsonLinesObserver<W> {
    fn notify(&self, event: &LifecycleEvent) {
        let mut writer = self.writer.borrow_mut();
        let written = serde_json::to_writer(&mut *writer, event)
            .map_err(std::io::Error::from)
            .and_then(|()| writeln!(writer));
        if let Err(err) = written {
            warn!(target = "dropdown", error = %err, "failed to write lifecycle event");
        }
    }
}

/// Forwards every event to each inner observer in order.
#[derive(Default)]
pub struct FanoutObserver {
    observers: Vec<Rc<dyn DropdownObserver>>,
}

impl FanoutObserver {
    pub fn new(observers: Vec<Rc<dyn DropdownObserver>>) -> Self {
        Self { observers }
    }
}

impl DropdownObserver for FanoutObserver {
    fn notify(&self, event: &LifecycleEvent) {
        for observer in &self.observers {
            observer.notify(event);
        }
    }

    fn wants_diagnostics(&self) -> bool {
        self.observers
            .iter()
            .any(|observer| observer.wants_diagnostics())
    }
}
