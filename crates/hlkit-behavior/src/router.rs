//! Callback router
//!
//! The engine calls back into two free functions, [`element_proc`] and
//! [`notify_proc`]. Both find the router installed on the current thread,
//! resolve the tag or window they were given and hand a typed event to the
//! registered handler. A panic inside a handler is caught at this boundary
//! and reported as "not handled".
//!
//! Tags are retired when the engine delivers the detach event for them,
//! or after an explicit detach the engine accepted without reporting it.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::thread::{self, ThreadId};

use hlkit_dom::event::InitEvent;
use hlkit_dom::{
    BehaviorBinding, DomApi, DomError, Element, ElementHandle, EventGroups, EventParams, Hwnd,
    Notification,
};

use crate::behaviors::{self, LightBoxDialog};
use crate::error::{RegistryError, Result};
use crate::handler::{self, EventHandler};
use crate::notify::NotifyHandler;
use crate::registry::{HandlerKey, HandlerRegistry, Owner};
use crate::resource::ResourceLoaders;
use crate::tag::Tag;

thread_local! {
    static CURRENT: RefCell<Option<Rc<Router>>> = const { RefCell::new(None) };
}

/// Dispatch hub between the engine and Rust handlers.
///
/// Single-threaded: a router is created, installed and used on the UI
/// thread that owns the engine windows.
pub struct Router {
    api: Rc<dyn DomApi>,
    registry: RefCell<HandlerRegistry>,
    builtins: RefCell<HashMap<String, Rc<dyn EventHandler>>>,
    notify_handlers: RefCell<HashMap<Hwnd, Rc<dyn NotifyHandler>>>,
    resources: RefCell<ResourceLoaders>,
    dialog: Rc<LightBoxDialog>,
    owner: ThreadId,
}

impl Router {
    /// Router with the built-in behaviors registered.
    pub fn new(api: Rc<dyn DomApi>) -> Self {
        let router = Self::without_builtins(api);
        for (name, handler) in behaviors::builtin(router.dialog.clone()) {
            router.register_builtin(name, handler);
        }
        router
    }

    pub fn without_builtins(api: Rc<dyn DomApi>) -> Self {
        Self {
            api,
            registry: RefCell::new(HandlerRegistry::new()),
            builtins: RefCell::new(HashMap::new()),
            notify_handlers: RefCell::new(HashMap::new()),
            resources: RefCell::new(ResourceLoaders::new()),
            dialog: Rc::new(LightBoxDialog::new()),
            owner: thread::current().id(),
        }
    }

    // ========================================================================
    // Installation
    // ========================================================================

    /// Make `router` the target of engine callbacks on this thread.
    /// Returns the router it replaced.
    pub fn install(router: &Rc<Router>) -> Option<Rc<Router>> {
        debug_assert_eq!(router.owner, thread::current().id(), "router installed off its thread");
        CURRENT.with(|c| c.borrow_mut().replace(router.clone()))
    }

    pub fn uninstall() -> Option<Rc<Router>> {
        CURRENT.with(|c| c.borrow_mut().take())
    }

    pub fn current() -> Option<Rc<Router>> {
        CURRENT.with(|c| c.borrow().clone())
    }

    fn is_installed(&self) -> bool {
        Self::current().is_some_and(|r| std::ptr::eq(Rc::as_ptr(&r), self))
    }

    fn ensure_installed(&self) -> Result<()> {
        debug_assert_eq!(self.owner, thread::current().id(), "router used off its thread");
        if self.is_installed() { Ok(()) } else { Err(RegistryError::NoRouter) }
    }

    pub fn api(&self) -> &Rc<dyn DomApi> {
        &self.api
    }

    // ========================================================================
    // Element handlers
    // ========================================================================

    /// Attach `handler` to `element`. Attaching the same handler twice is a
    /// no-op.
    pub fn attach_handler(&self, element: &Element, handler: Rc<dyn EventHandler>) -> Result<()> {
        self.ensure_installed()?;
        let he = element.handle();
        if he.is_null() {
            return Err(DomError::InvalidHandle.into());
        }
        let (tag, mask) = {
            let mut registry = self.registry.borrow_mut();
            if registry.element_tag(he, HandlerKey::of(&handler)).is_some() {
                tracing::debug!("handler already attached to {:?}", he);
                return Ok(());
            }
            let tag = registry.add_element(he, handler);
            let mask = registry.resolve(tag).map_or(EventGroups::NONE, |e| e.subscription);
            (tag, mask)
        };
        if let Err(code) = self.api.attach_event_handler(he, element_proc, tag.to_raw(), mask) {
            self.registry.borrow_mut().retire(tag);
            return Err(RegistryError::AttachFailed(code));
        }
        tracing::debug!("attached handler to {:?} as {:?}", he, tag);
        Ok(())
    }

    pub fn detach_handler(&self, element: &Element, handler: &Rc<dyn EventHandler>) -> Result<()> {
        let he = element.handle();
        let tag = self
            .registry
            .borrow()
            .element_tag(he, HandlerKey::of(handler))
            .ok_or(RegistryError::NotAttached)?;
        self.api
            .detach_event_handler(he, element_proc, tag.to_raw())
            .map_err(RegistryError::DetachFailed)?;
        if self.registry.borrow_mut().retire(tag).is_some() {
            tracing::debug!("detach of {:?} was not reported back; retired {:?}", he, tag);
        }
        Ok(())
    }

    pub fn is_attached(&self, element: &Element, handler: &Rc<dyn EventHandler>) -> bool {
        self.registry.borrow().element_tag(element.handle(), HandlerKey::of(handler)).is_some()
    }

    pub fn handler_count(&self, element: &Element) -> usize {
        self.registry.borrow().element_handler_count(element.handle())
    }

    /// Live tags of every kind.
    pub fn tag_count(&self) -> usize {
        self.registry.borrow().tag_count()
    }

    // ========================================================================
    // Window handlers
    // ========================================================================

    /// Install `handler` as the window-level handler of `hwnd`, replacing
    /// any previous one.
    pub fn attach_window_handler(&self, hwnd: Hwnd, handler: Rc<dyn EventHandler>) -> Result<()> {
        self.ensure_installed()?;
        if self.registry.borrow().window_tag(hwnd).is_some() {
            self.detach_window_handler(hwnd)?;
        }
        let (tag, mask) = {
            let mut registry = self.registry.borrow_mut();
            let tag = registry.add_window(hwnd, handler);
            let mask = registry.resolve(tag).map_or(EventGroups::NONE, |e| e.subscription);
            (tag, mask)
        };
        if let Err(code) = self.api.window_attach_event_handler(hwnd, element_proc, tag.to_raw(), mask) {
            self.registry.borrow_mut().retire(tag);
            return Err(RegistryError::AttachFailed(code));
        }
        Ok(())
    }

    pub fn detach_window_handler(&self, hwnd: Hwnd) -> Result<()> {
        let tag = self.registry.borrow().window_tag(hwnd).ok_or(RegistryError::NotAttached)?;
        self.api
            .window_detach_event_handler(hwnd, element_proc, tag.to_raw())
            .map_err(RegistryError::DetachFailed)?;
        self.registry.borrow_mut().retire(tag);
        Ok(())
    }

    // ========================================================================
    // Notifications and named behaviors
    // ========================================================================

    /// Receive the notifications of `hwnd`, so markup in it can bind the
    /// built-in behaviors and `resources://` URIs resolve.
    pub fn connect_window(&self, hwnd: Hwnd) -> Result<()> {
        self.ensure_installed()?;
        self.api
            .set_notify_callback(hwnd, Some(notify_proc))
            .map_err(|code| DomError::from_status("set notify callback", code))?;
        Ok(())
    }

    /// Connect `hwnd` and route its notifications to `handler` first.
    pub fn set_notify_handler(&self, hwnd: Hwnd, handler: Rc<dyn NotifyHandler>) -> Result<()> {
        self.connect_window(hwnd)?;
        self.notify_handlers.borrow_mut().insert(hwnd, handler);
        Ok(())
    }

    pub fn remove_notify_handler(&self, hwnd: Hwnd) -> bool {
        self.notify_handlers.borrow_mut().remove(&hwnd).is_some()
    }

    /// Make `handler` available to markup as `behavior="name"`.
    pub fn register_builtin(&self, name: &str, handler: Rc<dyn EventHandler>) {
        self.builtins.borrow_mut().insert(name.to_string(), handler);
    }

    pub fn unregister_builtin(&self, name: &str) -> bool {
        self.builtins.borrow_mut().remove(name).is_some()
    }

    /// Resolve `name` for `hwnd`: the window's notification handler first,
    /// then the built-ins. Each successful resolution counts one element.
    pub fn attach_behavior(&self, hwnd: Hwnd, name: &str) -> Option<BehaviorBinding> {
        let window = self.notify_handlers.borrow().get(&hwnd).cloned();
        let handler = match window.and_then(|h| h.behavior(name)) {
            Some(handler) => handler,
            None => self.builtins.borrow().get(name).cloned()?,
        };
        let (tag, subscription) = self.registry.borrow_mut().add_behavior(name, handler);
        tracing::debug!("behavior {:?} bound as {:?}", name, tag);
        Some(BehaviorBinding { proc: element_proc, tag: tag.to_raw(), subscription })
    }

    /// Elements currently bound to the behavior named `name`.
    pub fn behavior_ref_count(&self, name: &str) -> usize {
        self.registry.borrow().behavior_ref_count(name)
    }

    pub fn with_resources<R>(&self, f: impl FnOnce(&mut ResourceLoaders) -> R) -> R {
        f(&mut self.resources.borrow_mut())
    }

    // ========================================================================
    // Dialogs
    // ========================================================================

    pub fn dialog(&self) -> &Rc<LightBoxDialog> {
        &self.dialog
    }

    /// Show a `light-box-dialog` element modally.
    pub fn show_dialog(&self, dialog: &Element) -> hlkit_dom::Result<bool> {
        self.dialog.show(dialog)
    }

    pub fn hide_dialog(&self, dialog: &Element) -> hlkit_dom::Result<bool> {
        self.dialog.hide(dialog)
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Deliver one engine event for `raw_tag`. Unknown or retired tags
    /// report "not handled".
    pub fn dispatch(&self, raw_tag: usize, he: ElementHandle, params: &mut EventParams) -> bool {
        let Some(tag) = Tag::from_raw(raw_tag) else {
            return false;
        };
        let entry = self.registry.borrow().resolve(tag).cloned();
        let Some(entry) = entry else {
            tracing::trace!("event for retired tag {:#x}", raw_tag);
            return false;
        };

        if let EventParams::Init(init) = params {
            let element = Element::wrap(self.api.clone(), he);
            return match init.cmd {
                InitEvent::Attach => {
                    if let Some(element) = &element {
                        entry.handler.attached(element);
                    }
                    true
                }
                InitEvent::Detach => {
                    if let Some(element) = &element {
                        entry.handler.detached(element);
                    }
                    self.registry.borrow_mut().retire(tag);
                    if let Owner::Behavior(name) = &entry.owner {
                        tracing::debug!("behavior {:?} detached from {:?}", name, he);
                    }
                    true
                }
                InitEvent::Other(_) => true,
            };
        }

        if !params.is_selected_by(entry.subscription) {
            return false;
        }
        let Some(element) = Element::wrap(self.api.clone(), he) else {
            return false;
        };
        handler::dispatch(entry.handler.as_ref(), &element, params)
    }

    /// Service one window notification.
    pub fn notify(&self, hwnd: Hwnd, notification: &mut Notification) -> bool {
        let handler = self.notify_handlers.borrow().get(&hwnd).cloned();
        match notification {
            Notification::AttachBehavior(request) => {
                if request.element.is_null() {
                    return false;
                }
                request.binding = self.attach_behavior(hwnd, &request.name);
                if request.binding.is_none() {
                    tracing::debug!("no behavior named {:?}", request.name);
                }
                request.binding.is_some()
            }
            Notification::LoadData(request) => {
                if handler.as_ref().is_some_and(|h| h.load_data(request)) {
                    return true;
                }
                match self.resources.borrow().load(&request.uri) {
                    Some((data, data_type)) => {
                        request.data = Some(data);
                        request.data_type = data_type;
                        true
                    }
                    None => false,
                }
            }
            Notification::DataLoaded { uri, data_type, data } => {
                handler.is_some_and(|h| h.data_loaded(uri, *data_type, data))
            }
            Notification::DocumentComplete => handler.is_some_and(|h| h.document_complete(hwnd)),
            Notification::CreateControl { element } => {
                self.with_element(*element, |el| handler.is_some_and(|h| h.create_control(el)))
            }
            Notification::ControlCreated { element } => {
                self.with_element(*element, |el| handler.is_some_and(|h| h.control_created(el)))
            }
            Notification::DestroyControl { element } => {
                self.with_element(*element, |el| handler.is_some_and(|h| h.destroy_control(el)))
            }
        }
    }

    fn with_element(&self, he: ElementHandle, f: impl FnOnce(&Element) -> bool) -> bool {
        Element::wrap(self.api.clone(), he).is_some_and(|el| f(&el))
    }
}

/// Element procedure handed to the engine for every attachment.
pub fn element_proc(tag: usize, he: ElementHandle, params: &mut EventParams) -> bool {
    let Some(router) = Router::current() else {
        tracing::warn!("event for {:?} with no router installed", he);
        return false;
    };
    match panic::catch_unwind(AssertUnwindSafe(|| router.dispatch(tag, he, params))) {
        Ok(handled) => handled,
        Err(payload) => {
            tracing::error!("event handler on {:?} panicked: {}", he, panic_message(payload.as_ref()));
            false
        }
    }
}

/// Notification procedure handed to the engine per window.
pub fn notify_proc(hwnd: Hwnd, notification: &mut Notification) -> bool {
    let Some(router) = Router::current() else {
        tracing::warn!("notification for {:?} with no router installed", hwnd);
        return false;
    };
    match panic::catch_unwind(AssertUnwindSafe(|| router.notify(hwnd, notification))) {
        Ok(serviced) => serviced,
        Err(payload) => {
            tracing::error!("notification handler for {:?} panicked: {}", hwnd, panic_message(payload.as_ref()));
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Handler;
    use hlkit_dom::HeadlessEngine;

    fn setup() -> (Rc<HeadlessEngine>, Rc<Router>, Hwnd) {
        let engine = Rc::new(HeadlessEngine::new());
        let router = Rc::new(Router::new(engine.clone()));
        Router::install(&router);
        let hwnd = engine.create_window();
        (engine, router, hwnd)
    }

    #[test]
    fn test_attach_requires_installed_router() {
        Router::uninstall();
        let engine = Rc::new(HeadlessEngine::new());
        let router = Router::new(engine.clone());
        let hwnd = engine.create_window();
        engine.load_html(hwnd, "<p>x</p>").unwrap();
        let root = Element::root_of(engine.clone(), hwnd).unwrap().unwrap();
        let err = router.attach_handler(&root, Rc::new(Handler::new())).unwrap_err();
        assert!(matches!(err, RegistryError::NoRouter));
    }

    #[test]
    fn test_unknown_tag_is_not_handled() {
        let (_engine, router, _hwnd) = setup();
        let mut params = EventParams::attach();
        assert!(!router.dispatch(0, ElementHandle::from_raw(1), &mut params));
        assert!(!router.dispatch(0x1234, ElementHandle::from_raw(1), &mut params));
        Router::uninstall();
    }

    #[test]
    fn test_builtins_resolve_by_name() {
        let (_engine, router, hwnd) = setup();
        assert!(router.attach_behavior(hwnd, behaviors::TABS).is_some());
        assert!(router.attach_behavior(hwnd, "no-such-behavior").is_none());
        assert_eq!(router.behavior_ref_count(behaviors::TABS), 1);
        Router::uninstall();
    }

    #[test]
    fn test_unknown_init_code_is_handled() {
        let (engine, router, hwnd) = setup();
        engine.load_html(hwnd, "<p>x</p>").unwrap();
        let root = Element::root_of(engine.clone(), hwnd).unwrap().unwrap();
        let handler: Rc<dyn EventHandler> = Rc::new(Handler::new());
        router.attach_handler(&root, handler.clone()).unwrap();
        let tag = router.registry.borrow().element_tag(root.handle(), HandlerKey::of(&handler)).unwrap();

        let mut params = EventParams::Init(hlkit_dom::event::InitParams { cmd: InitEvent::Other(7) });
        assert!(router.dispatch(tag.to_raw(), root.handle(), &mut params));
        assert!(router.is_attached(&root, &handler));
        Router::uninstall();
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
