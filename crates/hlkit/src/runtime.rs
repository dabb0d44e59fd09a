//! UI-thread runtime
//!
//! Owns the router installed on the UI thread and the queue through which
//! other threads hand work to it. Jobs run only inside
//! [`Runtime::drain_queue`], on the thread that created the runtime.

use std::rc::Rc;
use std::sync::mpsc;

use hlkit_behavior::{EventHandler, NotifyHandler, Router};
use hlkit_dom::{DomApi, Element, Hwnd};

use crate::config::Config;
use crate::error::{Result, RuntimeError};

/// Work sent to the UI thread.
pub type Job = Box<dyn FnOnce(&Runtime) + Send>;

pub struct Runtime {
    router: Rc<Router>,
    sender: mpsc::Sender<Job>,
    queue: mpsc::Receiver<Job>,
    config: Config,
}

impl Runtime {
    /// Build a router over `api` and install it on this thread.
    pub fn new(api: Rc<dyn DomApi>, config: Config) -> Result<Self> {
        if Router::current().is_some() {
            return Err(RuntimeError::AlreadyInstalled);
        }
        let router = if config.builtin_behaviors {
            Router::new(api)
        } else {
            Router::without_builtins(api)
        };
        router.with_resources(|loaders| {
            loaders.set_resources_dir(config.resources_dir.clone());
            loaders.set_cache(config.resource_cache);
        });
        let router = Rc::new(router);
        Router::install(&router);

        let (sender, queue) = mpsc::channel();
        tracing::debug!(
            "runtime installed (builtins: {}, resources: {:?})",
            config.builtin_behaviors,
            config.resources_dir
        );
        Ok(Self { router, sender, queue, config })
    }

    pub fn router(&self) -> &Rc<Router> {
        &self.router
    }

    pub fn api(&self) -> &Rc<dyn DomApi> {
        self.router.api()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ========================================================================
    // Windows and handlers
    // ========================================================================

    /// Route the window's notifications through the router.
    pub fn connect_window(&self, hwnd: Hwnd) -> Result<()> {
        Ok(self.router.connect_window(hwnd)?)
    }

    pub fn set_notify_handler(&self, hwnd: Hwnd, handler: Rc<dyn NotifyHandler>) -> Result<()> {
        Ok(self.router.set_notify_handler(hwnd, handler)?)
    }

    pub fn attach(&self, element: &Element, handler: Rc<dyn EventHandler>) -> Result<()> {
        Ok(self.router.attach_handler(element, handler)?)
    }

    pub fn detach(&self, element: &Element, handler: &Rc<dyn EventHandler>) -> Result<()> {
        Ok(self.router.detach_handler(element, handler)?)
    }

    pub fn attach_window(&self, hwnd: Hwnd, handler: Rc<dyn EventHandler>) -> Result<()> {
        Ok(self.router.attach_window_handler(hwnd, handler)?)
    }

    pub fn detach_window(&self, hwnd: Hwnd) -> Result<()> {
        Ok(self.router.detach_window_handler(hwnd)?)
    }

    /// Serve the behavior `name` with `handler` for every window.
    pub fn register_behavior(&self, name: &str, handler: Rc<dyn EventHandler>) {
        self.router.register_builtin(name, handler);
    }

    // ========================================================================
    // Dialogs
    // ========================================================================

    /// Show the light-box dialog with id `id` in `hwnd`'s document.
    pub fn show_dialog(&self, hwnd: Hwnd, id: &str) -> Result<bool> {
        let dialog = self.element_by_id(hwnd, id)?;
        Ok(self.router.show_dialog(&dialog)?)
    }

    pub fn hide_dialog(&self, hwnd: Hwnd, id: &str) -> Result<bool> {
        let dialog = self.element_by_id(hwnd, id)?;
        Ok(self.router.hide_dialog(&dialog)?)
    }

    fn element_by_id(&self, hwnd: Hwnd, id: &str) -> Result<Element> {
        let root = Element::root_of(self.api().clone(), hwnd)?
            .ok_or_else(|| RuntimeError::ElementNotFound(id.to_string()))?;
        root.find_first(&format!("#{}", id))?
            .ok_or_else(|| RuntimeError::ElementNotFound(id.to_string()))
    }

    // ========================================================================
    // Work queue
    // ========================================================================

    /// Handle other threads use to queue work for this runtime.
    pub fn sender(&self) -> UiSender {
        UiSender { tx: self.sender.clone() }
    }

    /// Run queued jobs until the queue is empty, including jobs queued by
    /// the jobs themselves. Returns how many ran.
    pub fn drain_queue(&self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.queue.try_recv() {
            job(self);
            ran += 1;
        }
        if ran > 0 {
            tracing::trace!("drained {} queued jobs", ran);
        }
        ran
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        if Router::current().is_some_and(|r| Rc::ptr_eq(&r, &self.router)) {
            Router::uninstall();
            tracing::debug!("runtime uninstalled");
        }
    }
}

/// Cloneable, `Send` handle onto a runtime's work queue.
#[derive(Clone)]
pub struct UiSender {
    tx: mpsc::Sender<Job>,
}

impl UiSender {
    /// Queue `job` to run on the UI thread at its next drain.
    pub fn post(&self, job: impl FnOnce(&Runtime) + Send + 'static) -> Result<()> {
        self.tx.send(Box::new(job)).map_err(|_| RuntimeError::QueueClosed)
    }
}

impl std::fmt::Debug for UiSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiSender").finish_non_exhaustive()
    }
}
