// Library exports for the binary and integration tests

pub mod config;
pub mod controller;
pub mod diagnostics;
pub mod dom;
pub mod framework;
pub mod page;
pub mod steps;
pub mod telemetry;

pub use config::DropdownConfig;
pub use controller::{DropdownController, DropdownControllerBuilder, ToggleOutcome};
pub use dom::{DomBackend, PanelLookup, Query, RawDom, SelectorDom};
pub use framework::{BootstrapDropdowns, FrameworkAdapter, FrameworkDropdown, WidgetError};
pub use page::{ClickEvent, Page, PageError};
pub use telemetry::{DropdownObserver, LifecycleEvent, RecordingObserver, StrategyKind};
