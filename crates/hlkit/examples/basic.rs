//! Example: tabs driven through the headless engine

use std::rc::Rc;

use hlkit::dom::event::MouseEvent;
use hlkit::dom::MouseButtons;
use hlkit::{logging, Config, Element, HeadlessEngine, Runtime};

const PAGE: &str = r#"<html><body>
<div id="tabs" behavior="tabs">
  <ul class="strip">
    <li id="general" panel="general-panel" selected>General</li>
    <li id="advanced" panel="advanced-panel">Advanced</li>
  </ul>
  <div name="general-panel">General settings</div>
  <div name="advanced-panel">Advanced settings</div>
</div>
</body></html>"#;

fn main() -> hlkit::Result<()> {
    let config = Config::from_env();
    logging::init(&config)?;

    let engine = Rc::new(HeadlessEngine::new());
    let runtime = Runtime::new(engine.clone(), config)?;
    let hwnd = engine.create_window();
    runtime.connect_window(hwnd)?;
    engine.load_html(hwnd, PAGE)?;

    println!("hlkit v{} initialized", hlkit::VERSION);

    let root = Element::root_of(runtime.api().clone(), hwnd)?
        .ok_or_else(|| hlkit::RuntimeError::ElementNotFound("root".to_string()))?;
    let advanced = root.select_id("advanced")?;
    if let Err(code) = engine.mouse(advanced.handle(), MouseEvent::Down, MouseButtons::MAIN) {
        eprintln!("mouse down refused: {}", code);
    }

    for panel in root.select("[name]:expanded")? {
        println!("expanded: {}", panel.attr("name")?.unwrap_or_default());
    }
    Ok(())
}
