//! Element wrapper tests against the headless engine
//!
//! Every wrapper operation goes through `DomApi`, so these also cover the
//! headless primitives end to end.

use std::cell::RefCell;
use std::rc::Rc;

use hlkit_dom::event::{FocusEvent, KeyEvent, MouseEvent, keys};
use hlkit_dom::{
    AttachBehaviorRequest, BehaviorBinding, BehaviorEvent, BehaviorMethod, ClickReason, DomApi,
    DomError, Element, ElementHandle, ElementState, EventGroups, EventParams, HeadlessEngine, Hwnd,
    KeyModifiers, MouseButtons, Notification,
};

const PAGE: &str = r#"<html><body>
<div id="panel" class="box wide">
  <p id="a" class="x y">Alpha</p>
  <p id="b" count="12" ratio="oops">Beta</p>
  <a id="link" href="/next">next</a>
</div>
<ul id="list"><li>c</li><li>a</li><li>b</li></ul>
</body></html>"#;

fn setup() -> (Rc<HeadlessEngine>, Rc<dyn DomApi>, Hwnd, Element) {
    let engine = Rc::new(HeadlessEngine::new());
    let api: Rc<dyn DomApi> = engine.clone();
    let hwnd = engine.create_window();
    engine.load_html(hwnd, PAGE).unwrap();
    let root = Element::root_of(api.clone(), hwnd).unwrap().unwrap();
    (engine, api, hwnd, root)
}

thread_local! {
    static LOG: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

fn log(entry: String) {
    LOG.with(|l| l.borrow_mut().push(entry));
}

fn take_log() -> Vec<String> {
    LOG.with(|l| std::mem::take(&mut *l.borrow_mut()))
}

/// Records everything it sees; handles behavior events when `tag == 1`.
fn recording_proc(tag: usize, he: ElementHandle, params: &mut EventParams) -> bool {
    match params {
        EventParams::Init(p) => log(format!("init {:?} {}", p.cmd, he.raw())),
        EventParams::Behavior(p) => {
            log(format!("behavior {:?} at {}", p.cmd, he.raw()));
            return tag == 1;
        }
        EventParams::Mouse(p) => log(format!("mouse {:?}", p.cmd)),
        EventParams::Key(p) => log(format!("key {:#x} at {}", p.key_code, he.raw())),
        EventParams::Timer(p) => {
            log(format!("timer {}", p.timer_id));
            return p.timer_id == 7;
        }
        _ => {}
    }
    false
}

// ============================================================================
// REFERENCE COUNTING
// ============================================================================

#[test]
fn test_wrapper_holds_one_reference() {
    let (engine, api, _, root) = setup();
    let he = root.handle();
    assert_eq!(engine.ref_count(he), 1);

    let copy = root.clone();
    assert_eq!(engine.ref_count(he), 2);
    assert_eq!(copy, root);
    drop(copy);
    assert_eq!(engine.ref_count(he), 1);

    let mut root = root;
    root.release();
    root.release();
    assert_eq!(engine.ref_count(he), 0);
    assert!(root.handle().is_null());

    let created = Element::create(api, "div").unwrap();
    assert_eq!(engine.ref_count(created.handle()), 1);
}

#[test]
fn test_acquire_null_handle_fails() {
    let (_, api, _, _) = setup();
    assert_eq!(Element::acquire(api.clone(), ElementHandle::NULL).unwrap_err(), DomError::InvalidHandle);
    assert!(Element::wrap(api, ElementHandle::NULL).is_none());
}

// ============================================================================
// NAVIGATION AND STRUCTURE
// ============================================================================

#[test]
fn test_navigation() {
    let (_, _, hwnd, root) = setup();
    assert_eq!(root.tag().unwrap(), "html");
    assert!(root.parent().unwrap().is_none());

    let panel = root.select_id("panel").unwrap();
    assert_eq!(panel.child_count().unwrap(), 3);
    let b = panel.child(1).unwrap().unwrap();
    assert_eq!(b.attr("id").unwrap().as_deref(), Some("b"));
    assert_eq!(b.index().unwrap(), 1);
    assert_eq!(b.parent().unwrap().unwrap(), panel);
    assert!(panel.child(3).unwrap().is_none());
    assert_eq!(b.hwnd().unwrap(), hwnd);
    assert_eq!(b.root().unwrap().unwrap(), root);
}

#[test]
fn test_uid_lookup() {
    let (_, api, hwnd, root) = setup();
    let a = root.select_id("a").unwrap();
    let uid = a.uid().unwrap();
    assert_eq!(Element::by_uid(api.clone(), hwnd, uid).unwrap().unwrap(), a);
    assert!(Element::by_uid(api, hwnd, u32::MAX).unwrap().is_none());
}

#[test]
fn test_insert_moves_element() {
    let (_, api, _, root) = setup();
    let panel = root.select_id("panel").unwrap();
    let list = root.select_id("list").unwrap();
    let a = root.select_id("a").unwrap();

    list.insert_child(&a, 0).unwrap();
    assert_eq!(panel.child_count().unwrap(), 2);
    assert_eq!(list.child(0).unwrap().unwrap(), a);

    let item = Element::with_text(api, "li", "d").unwrap();
    list.append_child(&item).unwrap();
    assert_eq!(list.child_count().unwrap(), 5);
    assert_eq!(item.index().unwrap(), 4);
    assert_eq!(item.text().unwrap(), "d");
}

#[test]
fn test_insert_into_own_descendant_fails() {
    let (_, _, _, root) = setup();
    let panel = root.select_id("panel").unwrap();
    let a = root.select_id("a").unwrap();
    assert!(a.insert_child(&panel, 0).is_err());
}

#[test]
fn test_swap_and_sort() {
    let (_, _, _, root) = setup();
    let list = root.select_id("list").unwrap();
    let texts = |l: &Element| {
        l.children().unwrap().iter().map(|c| c.text().unwrap()).collect::<Vec<_>>()
    };
    assert_eq!(texts(&list), ["c", "a", "b"]);

    list.sort_children(|x, y| x.text().unwrap().cmp(&y.text().unwrap())).unwrap();
    assert_eq!(texts(&list), ["a", "b", "c"]);

    let first = list.child(0).unwrap().unwrap();
    let last = list.child(2).unwrap().unwrap();
    first.swap(&last).unwrap();
    assert_eq!(texts(&list), ["c", "b", "a"]);
}

#[test]
fn test_delete_invalidates_handle() {
    let (_, _, _, root) = setup();
    let panel = root.select_id("panel").unwrap();
    let a = root.select_id("a").unwrap();
    let copy = a.clone();
    a.delete().unwrap();
    assert_eq!(panel.child_count().unwrap(), 2);
    assert_eq!(copy.tag().unwrap_err(), DomError::InvalidHandle);
}

#[test]
fn test_clone_element_is_detached_copy() {
    let (_, _, _, root) = setup();
    let a = root.select_id("a").unwrap();
    let copy = a.clone_element().unwrap();
    assert_ne!(copy, a);
    assert!(copy.parent().unwrap().is_none());
    assert_eq!(copy.outer_html().unwrap(), a.outer_html().unwrap());
    assert_ne!(copy.uid().unwrap(), a.uid().unwrap());
}

// ============================================================================
// CONTENT, ATTRIBUTES, STYLES
// ============================================================================

#[test]
fn test_html_modes() {
    let (_, _, _, root) = setup();
    let list = root.select_id("list").unwrap();
    list.set_html("<li>one</li>").unwrap();
    list.prepend_html("<li>zero</li>").unwrap();
    list.append_html("<li>two</li>").unwrap();
    assert_eq!(list.html().unwrap(), "<li>zero</li><li>one</li><li>two</li>");
    assert_eq!(list.outer_html().unwrap(), "<ul id=\"list\"><li>zero</li><li>one</li><li>two</li></ul>");

    list.set_text("plain").unwrap();
    assert_eq!(list.child_count().unwrap(), 0);
    assert_eq!(list.text().unwrap(), "plain");
}

#[test]
fn test_attributes() {
    let (_, _, _, root) = setup();
    let b = root.select_id("b").unwrap();
    assert_eq!(b.attr_as_int("count").unwrap(), Some(12));
    assert_eq!(b.attr_as_int("missing").unwrap(), None);
    assert!(matches!(b.attr_as_float("ratio"), Err(DomError::InvalidValue { .. })));

    b.set_attr("count", 13).unwrap();
    assert_eq!(b.attr("count").unwrap().as_deref(), Some("13"));
    b.remove_attr("count").unwrap();
    assert_eq!(b.attr("count").unwrap(), None);
    assert_eq!(b.attrs().unwrap(), vec![("id".to_string(), "b".to_string()), ("ratio".to_string(), "oops".to_string())]);
}

#[test]
fn test_classes() {
    let (_, _, _, root) = setup();
    let a = root.select_id("a").unwrap();
    assert!(a.has_class("x").unwrap());
    a.add_class("x").unwrap();
    assert_eq!(a.attr("class").unwrap().as_deref(), Some("x y"));
    a.add_class("z").unwrap();
    a.remove_class("x").unwrap();
    assert_eq!(a.attr("class").unwrap().as_deref(), Some("y z"));
    a.remove_class("y").unwrap();
    a.remove_class("z").unwrap();
    assert_eq!(a.attr("class").unwrap(), None);
    assert_eq!(a.describe().unwrap(), "p#a");
}

#[test]
fn test_show_hide() {
    let (engine, _, _, root) = setup();
    let panel = root.select_id("panel").unwrap();
    panel.hide().unwrap();
    assert_eq!(panel.style("display").unwrap().as_deref(), Some("none"));
    assert!(!panel.has_class("show").unwrap());

    panel.show().unwrap();
    assert_eq!(panel.style("display").unwrap(), None);
    assert!(panel.has_class("show").unwrap());
    assert_eq!(engine.redraw_requests(panel.handle()), 2);

    panel.set_style("color", "red").unwrap();
    panel.clear_styles().unwrap();
    assert_eq!(panel.style("color").unwrap(), None);
}

// ============================================================================
// SELECTORS
// ============================================================================

#[test]
fn test_selectors() {
    let (_, _, _, root) = setup();
    let panel = root.select_id("panel").unwrap();
    assert_eq!(panel.select("p").unwrap().len(), 2);
    assert_eq!(root.select("#panel > p.x").unwrap().len(), 1);
    assert!(root.find_first("table").unwrap().is_none());
    assert_eq!(root.select_first("table").unwrap_err(), DomError::NoMatch("table".into()));
    assert_eq!(root.select_unique("p").unwrap_err(), DomError::AmbiguousMatch("p".into()));
    assert_eq!(root.select("p[").unwrap_err(), DomError::InvalidSelector("p[".into()));

    let a = root.select_id("a").unwrap();
    assert_eq!(a.select_parent("div.box").unwrap().unwrap(), panel);
    assert!(a.test("p").unwrap());
    assert!(!a.test("div").unwrap());
    assert!(a.select_parent_limit("div", 1).unwrap().is_none());
    assert!(root.test(":root").unwrap());
}

#[test]
fn test_state_selectors() {
    let (_, _, _, root) = setup();
    let b = root.select_id("b").unwrap();
    b.set_state(ElementState::CURRENT, true).unwrap();
    assert_eq!(root.select_first(":current").unwrap(), b);
    b.set_state(ElementState::CURRENT, false).unwrap();
    assert!(root.find_first(":current").unwrap().is_none());
}

// ============================================================================
// EVENTS
// ============================================================================

#[test]
fn test_send_event_bubbles_to_handled() {
    let (_, api, _, root) = setup();
    let panel = root.select_id("panel").unwrap();
    let a = root.select_id("a").unwrap();
    take_log();

    api.attach_event_handler(panel.handle(), recording_proc, 1, EventGroups::BEHAVIOR_EVENT).unwrap();
    api.attach_event_handler(root.handle(), recording_proc, 2, EventGroups::BEHAVIOR_EVENT).unwrap();
    assert_eq!(take_log().len(), 2);

    assert!(a.send_event(BehaviorEvent::ButtonClick, None, ClickReason::ByMouseClick.raw()).unwrap());
    assert_eq!(take_log(), vec![format!("behavior ButtonClick at {}", panel.handle().raw())]);
}

#[test]
fn test_attach_is_idempotent_and_detach_notifies() {
    let (engine, api, _, root) = setup();
    let a = root.select_id("a").unwrap();
    take_log();
    api.attach_event_handler(a.handle(), recording_proc, 3, EventGroups::ALL).unwrap();
    api.attach_event_handler(a.handle(), recording_proc, 3, EventGroups::ALL).unwrap();
    assert_eq!(engine.handler_count(a.handle()), 1);
    api.detach_event_handler(a.handle(), recording_proc, 3).unwrap();
    assert!(api.detach_event_handler(a.handle(), recording_proc, 3).is_err());
    let raw = a.handle().raw();
    assert_eq!(take_log(), vec![format!("init Attach {}", raw), format!("init Detach {}", raw)]);
}

#[test]
fn test_subscription_filters_events() {
    let (engine, api, _, root) = setup();
    let a = root.select_id("a").unwrap();
    api.attach_event_handler(a.handle(), recording_proc, 3, EventGroups::MOUSE | EventGroups::DISABLE_INITIALIZATION)
        .unwrap();
    take_log();
    a.send_event(BehaviorEvent::ButtonClick, None, 0).unwrap();
    engine.mouse(a.handle(), MouseEvent::Down, MouseButtons::MAIN).unwrap();
    assert_eq!(take_log(), vec!["mouse Down".to_string()]);
}

#[test]
fn test_post_event_waits_for_pump() {
    let (engine, api, _, root) = setup();
    let a = root.select_id("a").unwrap();
    api.attach_event_handler(a.handle(), recording_proc, 1, EventGroups::BEHAVIOR_EVENT).unwrap();
    take_log();
    a.post_event(BehaviorEvent::HyperlinkClick, Some(&a), ClickReason::ByKeyClick.raw()).unwrap();
    assert!(take_log().is_empty());
    assert_eq!(engine.pending_posted(), 1);
    assert_eq!(engine.pump(), 1);
    assert_eq!(take_log(), vec![format!("behavior HyperlinkClick at {}", a.handle().raw())]);
}

#[test]
fn test_unhandled_do_click_synthesizes_button_click() {
    let (_, api, _, root) = setup();
    let panel = root.select_id("panel").unwrap();
    let a = root.select_id("a").unwrap();
    api.attach_event_handler(panel.handle(), recording_proc, 2, EventGroups::BEHAVIOR_EVENT).unwrap();
    take_log();
    assert!(a.call_behavior_method(BehaviorMethod::DoClick).unwrap());
    assert!(!a.call_behavior_method(BehaviorMethod::IsEmpty).unwrap());
    assert_eq!(take_log(), vec![format!("behavior ButtonClick at {}", panel.handle().raw())]);
}

#[test]
fn test_deleting_subtree_detaches_handlers() {
    let (_, api, _, root) = setup();
    let panel = root.select_id("panel").unwrap();
    let a = root.select_id("a").unwrap();
    api.attach_event_handler(a.handle(), recording_proc, 3, EventGroups::ALL).unwrap();
    take_log();
    let raw = a.handle().raw();
    panel.delete().unwrap();
    assert_eq!(take_log(), vec![format!("init Detach {}", raw)]);
}

#[test]
fn test_key_events_follow_focus_and_event_root() {
    let (engine, api, hwnd, root) = setup();
    let link = root.select_id("link").unwrap();
    let list = root.select_id("list").unwrap();
    api.attach_event_handler(root.handle(), recording_proc, 3, EventGroups::KEY).unwrap();

    assert!(engine.request_focus(link.handle()).unwrap());
    assert!(link.state(ElementState::FOCUS).unwrap());
    assert_eq!(Element::focused(api.clone(), hwnd).unwrap().unwrap(), link);

    take_log();
    engine.key(hwnd, KeyEvent::Down, keys::VK_RETURN, KeyModifiers::NONE).unwrap();
    assert_eq!(take_log(), vec![format!("key 0xd at {}", root.handle().raw())]);

    api.attach_event_handler(list.handle(), recording_proc, 4, EventGroups::KEY).unwrap();
    assert!(list.set_event_root().unwrap().is_none());
    assert_eq!(engine.event_root(hwnd), list.handle());
    take_log();
    engine.key(hwnd, KeyEvent::Down, keys::VK_ESCAPE, KeyModifiers::NONE).unwrap();
    assert_eq!(take_log(), vec![format!("key 0x1b at {}", list.handle().raw())]);

    list.reset_event_root().unwrap();
    assert!(engine.event_root(hwnd).is_null());
}

#[test]
fn test_focus_moves_between_elements() {
    let (engine, _, _, root) = setup();
    let a = root.select_id("a").unwrap();
    let link = root.select_id("link").unwrap();
    assert!(!engine.request_focus(a.handle()).unwrap());
    a.set_state(ElementState::FOCUS, true).unwrap();
    link.set_state(ElementState::FOCUS, true).unwrap();
    assert!(!a.state(ElementState::FOCUS).unwrap());
    assert!(link.state(ElementState::FOCUS).unwrap());
}

#[test]
fn test_timers_stop_when_unhandled() {
    let (engine, api, _, root) = setup();
    let a = root.select_id("a").unwrap();
    api.attach_event_handler(a.handle(), recording_proc, 3, EventGroups::TIMER).unwrap();
    a.set_timer(100, 7).unwrap();
    a.set_timer(100, 8).unwrap();
    take_log();
    assert_eq!(engine.fire_timers(), 2);
    assert_eq!(engine.fire_timers(), 1);
    a.cancel_timer(7).unwrap();
    assert_eq!(engine.fire_timers(), 0);
    assert_eq!(take_log(), vec!["timer 7", "timer 8", "timer 7"]);
}

// ============================================================================
// NOTIFICATIONS
// ============================================================================

fn binding_notify(_hwnd: Hwnd, notification: &mut Notification) -> bool {
    match notification {
        Notification::AttachBehavior(AttachBehaviorRequest { name, binding, .. }) if name == "recorder" => {
            *binding = Some(BehaviorBinding {
                proc: recording_proc,
                tag: 9,
                subscription: EventGroups::ALL,
            });
            true
        }
        Notification::LoadData(request) if request.uri == "res://greeting" => {
            request.data = Some(b"hi".to_vec());
            true
        }
        Notification::DocumentComplete => {
            log("complete".to_string());
            true
        }
        _ => false,
    }
}

#[test]
fn test_markup_behaviors_are_bound_on_load() {
    let engine = Rc::new(HeadlessEngine::new());
    let api: Rc<dyn DomApi> = engine.clone();
    let hwnd = engine.create_window();
    api.set_notify_callback(hwnd, Some(binding_notify)).unwrap();
    take_log();
    engine
        .load_html(hwnd, r#"<body><div id="w" behavior="recorder"></div><p behavior="unknown"></p></body>"#)
        .unwrap();
    let root = Element::root_of(api.clone(), hwnd).unwrap().unwrap();
    let w = root.select_id("w").unwrap();
    assert_eq!(engine.handler_count(w.handle()), 1);
    assert_eq!(take_log(), vec![format!("init Attach {}", w.handle().raw()), "complete".to_string()]);

    // Inserted markup is bound too.
    w.set_html(r#"<span behavior="recorder"></span>"#).unwrap();
    let span = w.select_first("span").unwrap();
    assert_eq!(engine.handler_count(span.handle()), 1);
}

#[test]
fn test_request_data_through_notify() {
    let engine = HeadlessEngine::new();
    let hwnd = engine.create_window();
    engine.set_notify_callback(hwnd, Some(binding_notify)).unwrap();
    assert_eq!(engine.request_data(hwnd, "res://greeting", hlkit_dom::types::ResourceType::Html), Some(b"hi".to_vec()));
    assert_eq!(engine.request_data(hwnd, "res://missing", hlkit_dom::types::ResourceType::Html), None);
}

#[test]
fn test_focus_event_can_be_refused() {
    fn refuse(_: usize, _: ElementHandle, params: &mut EventParams) -> bool {
        if let EventParams::Focus(p) = params {
            assert_eq!(p.cmd, FocusEvent::Got);
            p.cancel = true;
            return true;
        }
        false
    }
    let (engine, api, _, root) = setup();
    let link = root.select_id("link").unwrap();
    api.attach_event_handler(link.handle(), refuse, 1, EventGroups::FOCUS).unwrap();
    assert!(!engine.request_focus(link.handle()).unwrap());
}
