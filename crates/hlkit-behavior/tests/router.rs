//! Router and registry behavior against the headless engine

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use hlkit_behavior::behaviors::TABS;
use hlkit_behavior::{BehaviorTable, EventHandler, Handler, NotifyHandler, RegistryError, Router};
use hlkit_dom::event::{KeyEvent, MouseEvent, keys};
use hlkit_dom::types::ResourceType;
use hlkit_dom::{
    DomApi, DomResult, Element, ElementState, EventGroups, HeadlessEngine, Hwnd, KeyModifiers,
    LoadDataRequest, MouseButtons,
};

const PAGE: &str = r#"<html><body>
<div id="outer"><p id="inner">text</p></div>
<div id="a" behavior="tabs"><ul class="strip"><li panel="x">x</li></ul><div name="x"></div></div>
<div id="b" behavior="tabs"><ul class="strip"><li panel="y">y</li></ul><div name="y"></div></div>
</body></html>"#;

fn setup() -> (Rc<HeadlessEngine>, Rc<Router>, Hwnd, Element) {
    let engine = Rc::new(HeadlessEngine::new());
    let api: Rc<dyn DomApi> = engine.clone();
    let router = Rc::new(Router::new(api.clone()));
    Router::install(&router);
    let hwnd = engine.create_window();
    router.connect_window(hwnd).unwrap();
    engine.load_html(hwnd, PAGE).unwrap();
    let root = Element::root_of(api, hwnd).unwrap().unwrap();
    (engine, router, hwnd, root)
}

/// Handler counting attach, detach and mouse deliveries.
#[derive(Default)]
struct Counter {
    attached: Cell<u32>,
    detached: Cell<u32>,
    mouse: Cell<u32>,
    handle_mouse: bool,
}

impl EventHandler for Counter {
    fn subscription(&self) -> EventGroups {
        EventGroups::MOUSE
    }

    fn attached(&self, _element: &Element) {
        self.attached.set(self.attached.get() + 1);
    }

    fn detached(&self, _element: &Element) {
        self.detached.set(self.detached.get() + 1);
    }

    fn on_mouse(&self, _element: &Element, _params: &mut hlkit_dom::event::MouseParams) -> bool {
        self.mouse.set(self.mouse.get() + 1);
        self.handle_mouse
    }
}

// ============================================================================
// ATTACHMENT
// ============================================================================

#[test]
fn test_attach_is_idempotent() {
    let (engine, router, _hwnd, root) = setup();
    let inner = root.select_id("inner").unwrap();
    let counter = Rc::new(Counter::default());
    let handler: Rc<dyn EventHandler> = counter.clone();

    router.attach_handler(&inner, handler.clone()).unwrap();
    router.attach_handler(&inner, handler.clone()).unwrap();
    assert_eq!(counter.attached.get(), 1);
    assert_eq!(router.handler_count(&inner), 1);
    assert_eq!(engine.handler_count(inner.handle()), 1);

    engine.mouse(inner.handle(), MouseEvent::Down, MouseButtons::MAIN).unwrap();
    assert_eq!(counter.mouse.get(), 1);
}

#[test]
fn test_detach_retires_the_tag() {
    let (engine, router, _hwnd, root) = setup();
    let inner = root.select_id("inner").unwrap();
    let counter = Rc::new(Counter::default());
    let handler: Rc<dyn EventHandler> = counter.clone();
    let tags_before = router.tag_count();

    router.attach_handler(&inner, handler.clone()).unwrap();
    assert_eq!(router.tag_count(), tags_before + 1);
    router.detach_handler(&inner, &handler).unwrap();

    assert_eq!(counter.detached.get(), 1);
    assert_eq!(router.tag_count(), tags_before);
    assert!(!router.is_attached(&inner, &handler));
    assert_eq!(engine.handler_count(inner.handle()), 0);

    engine.mouse(inner.handle(), MouseEvent::Down, MouseButtons::MAIN).unwrap();
    assert_eq!(counter.mouse.get(), 0);
}

#[test]
fn test_detach_unattached_pair_fails() {
    let (_engine, router, _hwnd, root) = setup();
    let inner = root.select_id("inner").unwrap();
    let handler: Rc<dyn EventHandler> = Rc::new(Counter::default());
    assert_eq!(router.detach_handler(&inner, &handler), Err(RegistryError::NotAttached));
    assert_eq!(router.detach_window_handler(Hwnd::from_raw(77)), Err(RegistryError::NotAttached));
}

#[test]
fn test_attach_to_deleted_element_rolls_back() {
    let (_engine, router, _hwnd, root) = setup();
    let inner = root.select_id("inner").unwrap();
    let stale = inner.clone();
    inner.delete().unwrap();
    let tags_before = router.tag_count();

    let err = router.attach_handler(&stale, Rc::new(Counter::default())).unwrap_err();
    assert_eq!(err, RegistryError::AttachFailed(DomResult::InvalidHandle));
    assert_eq!(router.tag_count(), tags_before);
    assert_eq!(router.handler_count(&stale), 0);
}

#[test]
fn test_deleting_element_delivers_detach() {
    let (_engine, router, _hwnd, root) = setup();
    let outer = root.select_id("outer").unwrap();
    let inner = root.select_id("inner").unwrap();
    let counter = Rc::new(Counter::default());
    router.attach_handler(&inner, counter.clone()).unwrap();
    let tags = router.tag_count();

    outer.delete().unwrap();
    assert_eq!(counter.detached.get(), 1);
    assert_eq!(router.tag_count(), tags - 1);
    assert_eq!(router.handler_count(&inner), 0);
}

#[test]
fn test_handled_stops_bubbling() {
    let (engine, router, _hwnd, root) = setup();
    let outer = root.select_id("outer").unwrap();
    let inner = root.select_id("inner").unwrap();
    let inner_counter = Rc::new(Counter { handle_mouse: true, ..Counter::default() });
    let outer_counter = Rc::new(Counter::default());
    router.attach_handler(&inner, inner_counter.clone()).unwrap();
    router.attach_handler(&outer, outer_counter.clone()).unwrap();

    assert!(engine.mouse(inner.handle(), MouseEvent::Down, MouseButtons::MAIN).unwrap());
    assert_eq!(inner_counter.mouse.get(), 1);
    assert_eq!(outer_counter.mouse.get(), 0);
}

#[test]
fn test_unsubscribed_groups_are_not_delivered() {
    let (engine, router, hwnd, root) = setup();
    let inner = root.select_id("inner").unwrap();
    let calls = Rc::new(Cell::new(0));
    let seen = calls.clone();
    let handler = Handler::new().on_mouse(move |_, _| {
        seen.set(seen.get() + 1);
        false
    });
    router.attach_handler(&inner, Rc::new(handler)).unwrap();
    inner.set_state(ElementState::FOCUS, true).unwrap();

    engine.key(hwnd, KeyEvent::Down, keys::VK_RETURN, KeyModifiers::NONE).unwrap();
    assert_eq!(calls.get(), 0);
    engine.mouse(inner.handle(), MouseEvent::Move, MouseButtons::NONE).unwrap();
    assert_eq!(calls.get(), 1);
}

// ============================================================================
// PANIC BOUNDARY
// ============================================================================

#[test]
fn test_panicking_handler_reports_unhandled() {
    let (engine, router, _hwnd, root) = setup();
    let inner = root.select_id("inner").unwrap();
    let outer = root.select_id("outer").unwrap();
    let panicky = Handler::new().on_mouse(|_, _| panic!("handler bug"));
    router.attach_handler(&inner, Rc::new(panicky)).unwrap();
    let counter = Rc::new(Counter::default());
    router.attach_handler(&outer, counter.clone()).unwrap();

    assert!(!engine.mouse(inner.handle(), MouseEvent::Down, MouseButtons::MAIN).unwrap());
    assert_eq!(counter.mouse.get(), 1);
    assert!(!engine.mouse(inner.handle(), MouseEvent::Up, MouseButtons::NONE).unwrap());
    assert_eq!(counter.mouse.get(), 2);
}

// ============================================================================
// WINDOW HANDLERS
// ============================================================================

#[test]
fn test_window_handler_sees_unhandled_events() {
    let (engine, router, hwnd, root) = setup();
    let inner = root.select_id("inner").unwrap();
    let counter = Rc::new(Counter { handle_mouse: true, ..Counter::default() });
    router.attach_window_handler(hwnd, counter.clone()).unwrap();

    assert!(engine.mouse(inner.handle(), MouseEvent::Down, MouseButtons::MAIN).unwrap());
    assert_eq!(counter.mouse.get(), 1);

    let replacement = Rc::new(Counter::default());
    router.attach_window_handler(hwnd, replacement.clone()).unwrap();
    engine.mouse(inner.handle(), MouseEvent::Down, MouseButtons::MAIN).unwrap();
    assert_eq!(counter.mouse.get(), 1);
    assert_eq!(replacement.mouse.get(), 1);

    router.detach_window_handler(hwnd).unwrap();
    engine.mouse(inner.handle(), MouseEvent::Down, MouseButtons::MAIN).unwrap();
    assert_eq!(replacement.mouse.get(), 1);
}

// ============================================================================
// NAMED BEHAVIORS
// ============================================================================

#[test]
fn test_behavior_ref_count_tracks_elements() {
    let (engine, router, hwnd, root) = setup();
    assert_eq!(router.behavior_ref_count(TABS), 2);

    root.select_id("a").unwrap().delete().unwrap();
    assert_eq!(router.behavior_ref_count(TABS), 1);

    engine.load_html(hwnd, "<p>empty</p>").unwrap();
    assert_eq!(router.behavior_ref_count(TABS), 0);
    assert_eq!(router.tag_count(), 0);
}

#[test]
fn test_window_table_shadows_builtins() {
    let engine = Rc::new(HeadlessEngine::new());
    let api: Rc<dyn DomApi> = engine.clone();
    let router = Rc::new(Router::new(api.clone()));
    Router::install(&router);
    let hwnd = engine.create_window();

    let counter = Rc::new(Counter::default());
    let table = BehaviorTable::new().with(TABS, counter.clone()).with("custom", counter.clone());
    router.set_notify_handler(hwnd, Rc::new(table)).unwrap();
    engine
        .load_html(hwnd, r#"<div behavior="tabs"><ul class="strip"><li panel="q">q</li></ul></div><p behavior="custom unknown">c</p>"#)
        .unwrap();

    assert_eq!(counter.attached.get(), 2);
    assert_eq!(router.behavior_ref_count(TABS), 1);
    assert_eq!(router.behavior_ref_count("custom"), 1);
    assert_eq!(router.behavior_ref_count("unknown"), 0);
    let root = Element::root_of(api, hwnd).unwrap().unwrap();
    assert!(root.select("[panel]:current").unwrap().is_empty());
}

#[test]
fn test_inserted_markup_binds_behaviors() {
    let (_engine, router, _hwnd, root) = setup();
    let outer = root.select_id("outer").unwrap();
    outer
        .append_html(r#"<div behavior="tabs"><ul class="strip"><li panel="z">z</li></ul><div name="z"></div></div>"#)
        .unwrap();
    assert_eq!(router.behavior_ref_count(TABS), 3);
    assert_eq!(outer.select("[panel]:current").unwrap().len(), 1);
}

// ============================================================================
// NOTIFICATIONS
// ============================================================================

#[derive(Default)]
struct Pages {
    completed: Cell<u32>,
    loaded: RefCell<Vec<String>>,
}

impl NotifyHandler for Pages {
    fn load_data(&self, request: &mut LoadDataRequest) -> bool {
        if request.uri == "app://hello.html" {
            request.data = Some(b"<p>hello</p>".to_vec());
            return true;
        }
        false
    }

    fn data_loaded(&self, uri: &str, _data_type: ResourceType, _data: &[u8]) -> bool {
        self.loaded.borrow_mut().push(uri.to_string());
        true
    }

    fn document_complete(&self, _hwnd: Hwnd) -> bool {
        self.completed.set(self.completed.get() + 1);
        true
    }
}

#[test]
fn test_load_data_prefers_window_handler_then_loaders() {
    let (engine, router, hwnd, _root) = setup();
    let pages = Rc::new(Pages::default());
    router.set_notify_handler(hwnd, pages.clone()).unwrap();
    router.with_resources(|loaders| {
        loaders.register("app", Box::new(|_| Some((b"from loader".to_vec(), ResourceType::Style))));
    });

    let data = engine.request_data(hwnd, "app://hello.html", ResourceType::Html);
    assert_eq!(data.as_deref(), Some(&b"<p>hello</p>"[..]));
    let data = engine.request_data(hwnd, "app://site.css", ResourceType::Html);
    assert_eq!(data.as_deref(), Some(&b"from loader"[..]));
    assert!(engine.request_data(hwnd, "other://x", ResourceType::Html).is_none());
    assert_eq!(*pages.loaded.borrow(), vec!["app://hello.html".to_string(), "app://site.css".to_string()]);

    engine.load_html(hwnd, "<p>again</p>").unwrap();
    assert_eq!(pages.completed.get(), 1);
}

#[test]
fn test_callbacks_without_router_are_unhandled() {
    let (engine, router, _hwnd, root) = setup();
    let inner = root.select_id("inner").unwrap();
    let counter = Rc::new(Counter { handle_mouse: true, ..Counter::default() });
    router.attach_handler(&inner, counter.clone()).unwrap();

    let installed = Router::uninstall();
    assert!(installed.is_some());
    assert!(!engine.mouse(inner.handle(), MouseEvent::Down, MouseButtons::MAIN).unwrap());
    assert_eq!(counter.mouse.get(), 0);

    Router::install(&router);
    assert!(engine.mouse(inner.handle(), MouseEvent::Down, MouseButtons::MAIN).unwrap());
}
