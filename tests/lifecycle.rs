use std::io::Write;
use std::rc::Rc;
use std::time::Duration;

use menubind::dom;
use menubind::telemetry::DropdownObserver;
use menubind::{DropdownConfig, DropdownController, LifecycleEvent, Page, RecordingObserver};
use tempfile::NamedTempFile;

const PAGE: &str = r##"
    <header class="main-header">
        <nav class="navbar">
            <div class="topbar-user dropdown">
                <a id="me" class="dropdown-toggle profile-pic" href="#">me</a>
                <ul id="me-menu" class="dropdown-menu"></ul>
            </div>
        </nav>
    </header>
    <div class="dropdown">
        <button id="tools" class="dropdown-toggle">tools</button>
        <ul id="tools-menu" class="dropdown-menu"></ul>
    </div>
    <p id="outside">outside</p>
"##;

fn shown(page: &Page, selector: &str) -> bool {
    dom::has_class(&page.query(selector).unwrap().unwrap(), "show")
}

fn count(events: &[LifecycleEvent], predicate: impl Fn(&LifecycleEvent) -> bool) -> usize {
    events.iter().filter(|event| predicate(event)).count()
}

#[test]
fn late_triggers_are_bound_by_the_global_entry_point() {
    let page = Page::parse(r#"<div id="host"></div><p id="outside">x</p>"#);
    let controller = DropdownController::builder(&page).install();
    assert!(controller.bound_triggers().is_empty());

    let host = page.query("#host").unwrap().unwrap();
    let fragment = Page::parse(
        r#"<div class="dropdown"><a id="late" class="dropdown-toggle">late</a><ul id="late-menu" class="dropdown-menu"></ul></div>"#,
    );
    let inserted = fragment.query(".dropdown").unwrap().unwrap();
    inserted.detach();
    host.append(inserted);

    page.call_global("reinitializeDropdowns").unwrap();
    page.call_global("reinitializeDropdowns").unwrap();
    assert_eq!(controller.bound_triggers().len(), 1);

    page.click_selector("#late").unwrap();
    assert!(shown(&page, "#late-menu"));
    page.click_selector("#outside").unwrap();
    assert!(!shown(&page, "#late-menu"));
}

#[test]
fn reinitializing_never_duplicates_listeners() {
    let page = Page::parse(PAGE);
    let observer = Rc::new(RecordingObserver::new());
    let controller = DropdownController::builder(&page)
        .observer(observer.clone())
        .install();
    for _ in 0..5 {
        controller.initialize();
    }
    assert_eq!(page.listener_count(), 3);

    observer.take();
    page.click_selector("#tools").unwrap();
    let toggles = count(&observer.events(), |event| {
        matches!(event, LifecycleEvent::Toggled { .. })
    });
    assert_eq!(toggles, 1);
    assert!(shown(&page, "#tools-menu"));
}

#[test]
fn install_on_loading_page_waits_for_content_loaded() {
    let page = Page::parse_loading(PAGE);
    let observer = Rc::new(RecordingObserver::new());
    let controller = DropdownController::builder(&page)
        .observer(observer.clone())
        .install();

    assert!(observer.events().is_empty());
    assert_eq!(page.listener_count(), 0);
    page.click_selector("#tools").unwrap();
    assert!(!shown(&page, "#tools-menu"));

    page.finish_loading();
    assert!(controller.is_initialized());
    assert_eq!(page.listener_count(), 3);
    page.click_selector("#tools").unwrap();
    assert!(shown(&page, "#tools-menu"));
}

#[test]
fn dispose_before_content_loaded_cancels_initialization() {
    let page = Page::parse_loading(PAGE);
    let controller = DropdownController::builder(&page).install();
    controller.dispose();
    page.finish_loading();

    assert!(!controller.is_initialized());
    assert_eq!(page.listener_count(), 0);
}

#[test]
fn dispose_unbinds_everything() {
    let page = Page::parse(PAGE);
    let observer = Rc::new(RecordingObserver::new());
    let controller = DropdownController::builder(&page)
        .observer(observer.clone())
        .install();
    page.click_selector("#tools").unwrap();

    controller.dispose();
    assert_eq!(page.listener_count(), 0);
    assert_eq!(page.pending_timers(), 0);
    assert!(!page.has_global("reinitializeDropdowns"));
    assert!(page.call_global("reinitializeDropdowns").is_err());

    page.click_selector("#outside").unwrap();
    assert!(shown(&page, "#tools-menu"));
    controller.initialize();
    assert!(controller.bound_triggers().is_empty());

    let disposed = count(&observer.events(), |event| {
        matches!(event, LifecycleEvent::Disposed { .. })
    });
    assert_eq!(disposed, 1);
}

#[tokio::test(start_paused = true)]
async fn diagnostic_fires_once_without_touching_the_page() {
    let page = Page::parse(PAGE);
    let observer = Rc::new(RecordingObserver::new());
    let controller = DropdownController::builder(&page)
        .observer(observer.clone())
        .install();
    page.click_selector("#me").unwrap();
    controller.initialize();

    tokio::time::sleep(Duration::from_millis(999)).await;
    assert_eq!(page.run_due_timers(), 0);

    let before = page.to_html();
    page.settle().await;
    assert_eq!(page.to_html(), before);

    let reports: Vec<_> = observer
        .events()
        .into_iter()
        .filter_map(|event| match event {
            LifecycleEvent::Diagnostic(report) => Some(report),
            _ => None,
        })
        .collect();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].triggers, 1);
    assert_eq!(reports[0].panels.len(), 1);
    assert!(reports[0].panels[0].shown);
    assert!(reports[0].ancestors.iter().all(|ancestor| ancestor.found));

    page.settle().await;
    assert_eq!(page.pending_timers(), 0);
}

/// Records lifecycle events but opts out of the visibility probe.
#[derive(Default)]
struct Quiet(RecordingObserver);

impl DropdownObserver for Quiet {
    fn notify(&self, event: &LifecycleEvent) {
        self.0.notify(event);
    }

    fn wants_diagnostics(&self) -> bool {
        false
    }
}

#[test]
fn diagnostic_is_skipped_when_nobody_listens() {
    let page = Page::parse(PAGE);
    let _controller = DropdownController::builder(&page)
        .observer(Rc::new(Quiet::default()))
        .install();
    assert_eq!(page.pending_timers(), 0);

    let mut config = DropdownConfig::default();
    config.diagnostics.enabled = false;
    let page = Page::parse(PAGE);
    let _controller = DropdownController::builder(&page).config(config).install();
    assert_eq!(page.pending_timers(), 0);
}

#[test]
fn custom_markers_from_yaml() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
markers:
  panel_class: menu
  shown_class: open
  container_class: menu-host
global_entry_point: rebindMenus
groups:
  - name: menus
    classes: [menu-button]
    panel_lookup: [siblings]
"#
    )
    .unwrap();
    let config = DropdownConfig::load(Some(file.path().to_path_buf())).unwrap();

    let page = Page::parse(
        r#"
        <div class="menu-host">
            <button id="b" class="menu-button">b</button>
            <hr>
            <ol id="m" class="menu"></ol>
        </div>
        <p id="outside">x</p>
        "#,
    );
    let controller = DropdownController::builder(&page).config(config).install();
    assert!(page.has_global("rebindMenus"));
    assert_eq!(controller.bound_triggers().len(), 1);

    let menu = page.query("#m").unwrap().unwrap();
    page.click_selector("#b").unwrap();
    assert!(dom::has_class(&menu, "open"));
    page.click_selector("#outside").unwrap();
    assert!(!dom::has_class(&menu, "open"));
}
