use kuchiki::NodeRef;
use menubind::dom::{self, DomBackend};
use menubind::{DropdownController, LifecycleEvent, Page, RawDom, RecordingObserver, SelectorDom};
use std::rc::Rc;

const PAGE: &str = r##"
    <!DOCTYPE html>
    <html>
        <body>
            <nav class="navbar">
                <div class="dropdown">
                    <a id="trigger-a" class="dropdown-toggle" href="#">A</a>
                    <ul id="panel-a" class="dropdown-menu"><li><a id="item-a" href="#">one</a></li></ul>
                </div>
                <div class="dropdown">
                    <button id="trigger-b" class="dropdown-toggle">B</button>
                    <ul id="panel-b" class="dropdown-menu"><li>two</li></ul>
                </div>
            </nav>
            <main>
                <p id="neutral">Nothing to see here</p>
            </main>
        </body>
    </html>
"##;

fn node(page: &Page, selector: &str) -> NodeRef {
    page.query(selector)
        .unwrap()
        .unwrap_or_else(|| panic!("missing {selector}"))
}

fn shown(page: &Page, selector: &str) -> bool {
    dom::has_class(&node(page, selector), "show")
}

fn expanded(page: &Page, selector: &str) -> bool {
    dom::attribute(&node(page, selector), "aria-expanded").as_deref() == Some("true")
}

fn shown_panels(page: &Page) -> usize {
    page.query_all(".dropdown-menu.show").unwrap().len()
}

fn install_with(page: &Page, backend: impl DomBackend + 'static) -> DropdownController {
    DropdownController::builder(page).dom_backend(backend).install()
}

#[test]
fn scenario_click_a_then_b_then_neutral() {
    let page = Page::parse(PAGE);
    let _controller = install_with(&page, RawDom::new());

    page.click_selector("#trigger-a").unwrap();
    assert!(shown(&page, "#panel-a"));
    assert!(!shown(&page, "#panel-b"));
    assert!(expanded(&page, "#trigger-a"));

    page.click_selector("#trigger-b").unwrap();
    assert!(!shown(&page, "#panel-a"));
    assert!(shown(&page, "#panel-b"));
    assert!(expanded(&page, "#trigger-b"));
    assert!(!expanded(&page, "#trigger-a"));

    page.click_selector("#neutral").unwrap();
    assert!(!shown(&page, "#panel-b"));
    assert!(!expanded(&page, "#trigger-b"));
    assert_eq!(shown_panels(&page), 0);
}

#[test]
fn clicking_twice_restores_visibility() {
    let page = Page::parse(PAGE);
    let _controller = install_with(&page, SelectorDom::new());

    page.click_selector("#trigger-a").unwrap();
    page.click_selector("#trigger-a").unwrap();
    assert!(!shown(&page, "#panel-a"));
    assert!(!expanded(&page, "#trigger-a"));
}

#[test]
fn at_most_one_panel_after_every_click() {
    let page = Page::parse(PAGE);
    let _controller = install_with(&page, RawDom::new());

    let clicks = [
        "#trigger-a",
        "#trigger-b",
        "#trigger-b",
        "#trigger-a",
        "#item-a",
        "#trigger-b",
        "#neutral",
        "#trigger-a",
    ];
    for selector in clicks {
        page.click_selector(selector).unwrap();
        assert!(shown_panels(&page) <= 1, "after clicking {selector}");
        for (trigger, panel) in [("#trigger-a", "#panel-a"), ("#trigger-b", "#panel-b")] {
            assert_eq!(expanded(&page, trigger), shown(&page, panel), "after clicking {selector}");
        }
    }
}

#[test]
fn click_inside_open_panel_keeps_it_open() {
    let page = Page::parse(PAGE);
    let _controller = install_with(&page, RawDom::new());

    page.click_selector("#trigger-a").unwrap();
    page.click_selector("#item-a").unwrap();
    assert!(shown(&page, "#panel-a"));
}

#[test]
fn sibling_panel_wins_over_descendant() {
    const NESTED: &str = r#"
        <div class="dropdown">
            <button id="t" class="dropdown-toggle"><ul id="inner" class="dropdown-menu"></ul></button>
            <span>spacer</span>
            <ul id="outer" class="dropdown-menu"></ul>
        </div>
    "#;

    let page = Page::parse(NESTED);
    let controller = install_with(&page, RawDom::new());
    let panel = controller.panel_for(&node(&page, "#t"));
    assert_eq!(
        panel.and_then(|panel| dom::attribute(&panel, "id")).as_deref(),
        Some("outer")
    );

    page.click_selector("#t").unwrap();
    assert!(shown(&page, "#outer"));
    assert!(!shown(&page, "#inner"));
}

#[test]
fn trigger_without_panel_only_collapses() {
    let page = Page::parse(
        r#"
        <div class="dropdown">
            <a id="a" class="dropdown-toggle">a</a>
            <ul id="menu" class="dropdown-menu"></ul>
        </div>
        <div class="dropdown"><a id="lonely" class="dropdown-toggle">lonely</a></div>
        "#,
    );
    let observer = Rc::new(RecordingObserver::new());
    let _controller = DropdownController::builder(&page)
        .observer(observer.clone())
        .install();

    page.click_selector("#a").unwrap();
    observer.take();
    page.click_selector("#lonely").unwrap();

    assert!(!shown(&page, "#menu"));
    assert!(!expanded(&page, "#lonely"));
    assert!(matches!(
        observer.events().as_slice(),
        [LifecycleEvent::Toggled {
            panel_found: false,
            shown: false,
            ..
        }]
    ));
}

#[test]
fn profile_trigger_only_uses_next_sibling() {
    let page = Page::parse(
        r#"
        <div class="topbar-user dropdown">
            <a id="me" class="dropdown-toggle profile-pic">me</a>
            <span>name</span>
            <ul id="menu" class="dropdown-menu"></ul>
        </div>
        "#,
    );
    let controller = install_with(&page, RawDom::new());
    assert!(controller.panel_for(&node(&page, "#me")).is_none());

    page.click_selector("#me").unwrap();
    assert!(!shown(&page, "#menu"));
}

fn install_raw(page: &Page) -> DropdownController {
    install_with(page, RawDom::new())
}

fn install_selector(page: &Page) -> DropdownController {
    install_with(page, SelectorDom::new())
}

fn snapshots_after_clicks(install: fn(&Page) -> DropdownController) -> Vec<String> {
    let clicks = [
        "#trigger-a",
        "#trigger-b",
        "#item-a",
        "#neutral",
        "#trigger-b",
        "#trigger-b",
        "#trigger-a",
    ];
    let page = Page::parse(PAGE);
    let _controller = install(&page);
    clicks
        .iter()
        .map(|selector| {
            page.click_selector(selector).unwrap();
            page.to_html()
        })
        .collect()
}

#[test]
fn backends_agree_on_a_click_sequence() {
    assert_eq!(
        snapshots_after_clicks(install_raw),
        snapshots_after_clicks(install_selector)
    );
}

fn bound_and_opened(config: &menubind::DropdownConfig, backend: impl DomBackend + 'static) -> (usize, bool) {
    let page = Page::parse(
        r#"
        <div class="dropdown">
            <button id="t" data-toggle="dd">t</button>
            <ul id="m" class="dropdown-menu"></ul>
        </div>
        "#,
    );
    let controller = DropdownController::builder(&page)
        .config(config.clone())
        .dom_backend(backend)
        .install();
    page.click_selector("#t").unwrap();
    let opened = shown(&page, "#m")
        && dom::attribute(&node(&page, "#t"), "aria-expanded").as_deref() == Some("true");
    (controller.bound_triggers().len(), opened)
}

#[test]
fn mixed_case_attribute_names_behave_the_same_in_both_backends() {
    let config = menubind::DropdownConfig::from_yaml(
        r#"
markers:
  framework_attribute: Data-Toggle
  framework_value: dd
  expanded_attribute: Aria-Expanded
groups:
  - name: toggles
    framework_marker: true
    panel_lookup: [next-sibling]
"#,
    )
    .unwrap();

    assert_eq!(bound_and_opened(&config, RawDom::new()), (1, true));
    assert_eq!(bound_and_opened(&config, SelectorDom::new()), (1, true));
}
