//! Window notification handlers

use std::collections::HashMap;
use std::rc::Rc;

use hlkit_dom::types::ResourceType;
use hlkit_dom::{Element, Hwnd, LoadDataRequest};

use crate::handler::EventHandler;

/// Per-window notification handler.
///
/// Every method defaults to "not serviced". [`behavior`](Self::behavior)
/// is the window's own name to handler table, consulted before the
/// built-in behaviors.
pub trait NotifyHandler {
    fn create_control(&self, _element: &Element) -> bool {
        false
    }

    fn control_created(&self, _element: &Element) -> bool {
        false
    }

    fn destroy_control(&self, _element: &Element) -> bool {
        false
    }

    /// Supply the bytes for `request.uri` by filling `request.data`.
    fn load_data(&self, _request: &mut LoadDataRequest) -> bool {
        false
    }

    fn data_loaded(&self, _uri: &str, _data_type: ResourceType, _data: &[u8]) -> bool {
        false
    }

    fn document_complete(&self, _hwnd: Hwnd) -> bool {
        false
    }

    fn behavior(&self, _name: &str) -> Option<Rc<dyn EventHandler>> {
        None
    }
}

/// Notification handler that only contributes named behaviors.
#[derive(Default)]
pub struct BehaviorTable {
    behaviors: HashMap<String, Rc<dyn EventHandler>>,
}

impl BehaviorTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, handler: Rc<dyn EventHandler>) -> Self {
        self.register(name, handler);
        self
    }

    pub fn register(&mut self, name: &str, handler: Rc<dyn EventHandler>) {
        self.behaviors.insert(name.to_string(), handler);
    }

    pub fn len(&self) -> usize {
        self.behaviors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.behaviors.is_empty()
    }
}

impl NotifyHandler for BehaviorTable {
    fn behavior(&self, name: &str) -> Option<Rc<dyn EventHandler>> {
        self.behaviors.get(name).cloned()
    }
}
