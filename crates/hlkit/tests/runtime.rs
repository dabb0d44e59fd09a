//! Runtime installation, work queue and configuration

use std::rc::Rc;

use hlkit::behavior::behaviors::{LIGHT_BOX_DIALOG, TABS};
use hlkit::dom::types::ResourceType;
use hlkit::{Config, Element, HeadlessEngine, Hwnd, Router, Runtime, RuntimeError};

const PAGE: &str = r#"<html><body>
<div id="tabs" behavior="tabs">
  <ul class="strip">
    <li id="t1" panel="p1" selected>One</li>
    <li id="t2" panel="p2">Two</li>
  </ul>
  <div id="p1" name="p1">first</div>
  <div id="p2" name="p2">second</div>
</div>
<div id="log"></div>
<div id="dlg" behavior="light-box-dialog">
  <button role="ok-button">OK</button>
</div>
</body></html>"#;

fn start(config: Config) -> (Rc<HeadlessEngine>, Runtime, Hwnd) {
    let engine = Rc::new(HeadlessEngine::new());
    let runtime = Runtime::new(engine.clone(), config).unwrap();
    let hwnd = engine.create_window();
    runtime.connect_window(hwnd).unwrap();
    engine.load_html(hwnd, PAGE).unwrap();
    (engine, runtime, hwnd)
}

fn root(runtime: &Runtime, hwnd: Hwnd) -> Element {
    Element::root_of(runtime.api().clone(), hwnd).unwrap().unwrap()
}

// ============================================================================
// INSTALLATION
// ============================================================================

#[test]
fn test_runtime_installs_router() {
    let (_engine, runtime, _hwnd) = start(Config::default());
    let current = Router::current().unwrap();
    assert!(Rc::ptr_eq(&current, runtime.router()));
    assert_eq!(runtime.router().behavior_ref_count(TABS), 1);
    assert_eq!(runtime.router().behavior_ref_count(LIGHT_BOX_DIALOG), 1);
}

#[test]
fn test_second_runtime_on_thread_refused() {
    let (engine, runtime, _hwnd) = start(Config::default());
    let second = Runtime::new(engine.clone(), Config::default());
    assert!(matches!(second, Err(RuntimeError::AlreadyInstalled)));

    drop(runtime);
    assert!(Router::current().is_none());
    assert!(Runtime::new(engine, Config::default()).is_ok());
}

#[test]
fn test_builtins_can_be_disabled() {
    let config = Config { builtin_behaviors: false, ..Config::default() };
    let (_engine, runtime, hwnd) = start(config);
    assert_eq!(runtime.router().behavior_ref_count(TABS), 0);

    let tabs = root(&runtime, hwnd).select_id("tabs").unwrap();
    assert_eq!(runtime.router().handler_count(&tabs), 0);
}

// ============================================================================
// WORK QUEUE
// ============================================================================

#[test]
fn test_jobs_from_other_threads_run_on_drain() {
    let (_engine, runtime, hwnd) = start(Config::default());
    let sender = runtime.sender();

    let worker = std::thread::spawn(move || {
        for i in 0..3 {
            sender
                .post(move |rt: &Runtime| {
                    let log = root(rt, hwnd).select_id("log").unwrap();
                    log.append_html(&format!("<p>job {}</p>", i)).unwrap();
                })
                .unwrap();
        }
    });
    worker.join().unwrap();

    let log = root(&runtime, hwnd).select_id("log").unwrap();
    assert_eq!(log.child_count().unwrap(), 0);
    assert_eq!(runtime.drain_queue(), 3);
    assert_eq!(log.text().unwrap(), "job 0job 1job 2");
    assert_eq!(runtime.drain_queue(), 0);
}

#[test]
fn test_jobs_queued_by_jobs_run_in_same_drain() {
    let (_engine, runtime, _hwnd) = start(Config::default());
    runtime
        .sender()
        .post(|rt: &Runtime| {
            rt.sender().post(|_: &Runtime| {}).unwrap();
        })
        .unwrap();
    assert_eq!(runtime.drain_queue(), 2);
}

#[test]
fn test_post_after_runtime_dropped() {
    let (_engine, runtime, _hwnd) = start(Config::default());
    let sender = runtime.sender();
    drop(runtime);
    assert!(matches!(sender.post(|_: &Runtime| {}), Err(RuntimeError::QueueClosed)));
}

// ============================================================================
// DIALOGS
// ============================================================================

#[test]
fn test_show_and_hide_dialog_by_id() {
    let (_engine, runtime, hwnd) = start(Config::default());
    assert!(runtime.show_dialog(hwnd, "dlg").unwrap());
    assert_eq!(root(&runtime, hwnd).select(".shim").unwrap().len(), 1);

    assert!(runtime.hide_dialog(hwnd, "dlg").unwrap());
    assert!(root(&runtime, hwnd).select(".shim").unwrap().is_empty());
    assert!(!runtime.hide_dialog(hwnd, "dlg").unwrap());
}

#[test]
fn test_dialog_id_not_found() {
    let (_engine, runtime, hwnd) = start(Config::default());
    match runtime.show_dialog(hwnd, "missing") {
        Err(RuntimeError::ElementNotFound(id)) => assert_eq!(id, "missing"),
        other => panic!("expected ElementNotFound, got {:?}", other.map(|_| ())),
    }
}

// ============================================================================
// RESOURCES
// ============================================================================

#[test]
fn test_resources_dir_from_config() {
    let dir = std::env::temp_dir().join(format!("hlkit-runtime-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("frame.html"), "<p>frame</p>").unwrap();

    let config = Config { resources_dir: Some(dir.clone()), ..Config::default() };
    let (engine, runtime, hwnd) = start(config);
    let data = engine.request_data(hwnd, "resources://frame.html", ResourceType::Html);
    assert_eq!(data.as_deref(), Some(&b"<p>frame</p>"[..]));
    assert_eq!(runtime.router().with_resources(|r| r.cached()), 1);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_config_from_toml_drives_runtime() {
    let config = Config::from_toml("builtin_behaviors = false\nresource_cache = false").unwrap();
    let (_engine, runtime, _hwnd) = start(config);
    assert!(!runtime.config().resource_cache);
    assert_eq!(runtime.router().behavior_ref_count(TABS), 0);
}
