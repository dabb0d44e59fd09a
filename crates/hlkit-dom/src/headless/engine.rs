//! In-memory engine
//!
//! Implements every [`DomApi`] primitive over the arena tree and delivers
//! events to attached element procedures: target first, then each
//! ancestor, then the window handlers, stopping at the first handler that
//! reports the event handled.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use super::tree::{Attachment, NodeId, NodeRef, Tree};
use crate::api::{DomApi, ElementComparator, SelectVisitor};
use crate::error::{DomError, ResultExt};
use crate::event::{
    AttachBehaviorRequest, BehaviorEvent, BehaviorEventParams, BehaviorMethod, ClickReason,
    ElementProc, EventGroups, EventParams, FocusEvent, FocusParams, InitEvent, InitParams,
    KeyEvent, KeyModifiers, KeyParams, LoadDataRequest, MethodParams, MouseButtons, MouseEvent,
    MouseParams, Notification, NotifyProc, TimerParams,
};
use crate::selector::SelectorList;
use crate::types::{
    ApiResult, DomResult, ElementAreas, ElementHandle, ElementState, Hwnd, Point, Rect,
    ResourceType, SetHtmlMode, UpdateFlags,
};

/// Attribute naming the behaviors requested for an element.
pub const BEHAVIOR_ATTRIBUTE: &str = "behavior";

#[derive(Debug)]
struct Window {
    root: NodeId,
    focus: Option<NodeId>,
    event_root: Option<NodeId>,
    capture: Option<NodeId>,
    notify: Option<NotifyProc>,
    handlers: Vec<Attachment>,
}

#[derive(Debug, Clone, Copy)]
struct Posted {
    target: ElementHandle,
    cmd: BehaviorEvent,
    source: ElementHandle,
    reason: usize,
}

#[derive(Debug, Default)]
struct State {
    tree: Tree,
    windows: HashMap<Hwnd, Window>,
    next_hwnd: usize,
    posted: VecDeque<Posted>,
}

impl State {
    fn window(&self, hwnd: Hwnd) -> ApiResult<&Window> {
        self.windows.get(&hwnd).ok_or(DomResult::InvalidHwnd)
    }

    fn window_mut(&mut self, hwnd: Hwnd) -> ApiResult<&mut Window> {
        self.windows.get_mut(&hwnd).ok_or(DomResult::InvalidHwnd)
    }

    /// Window whose document contains `id`.
    fn window_of(&self, id: NodeId) -> Option<Hwnd> {
        let top = self.tree.top(id);
        self.windows.iter().find(|(_, w)| w.root == top).map(|(h, _)| *h)
    }

    fn node_ref(&self, id: NodeId) -> NodeRef<'_> {
        let root = self.window_of(id).and_then(|h| self.windows.get(&h)).map(|w| w.root);
        NodeRef { tree: &self.tree, id, root }
    }

    /// Forget focus, event root and capture that point into `subtree`.
    fn forget_within(&mut self, subtree: NodeId) {
        let tree = &self.tree;
        for window in self.windows.values_mut() {
            for slot in [&mut window.focus, &mut window.event_root, &mut window.capture] {
                if slot.is_some_and(|id| tree.contains(subtree, id)) {
                    *slot = None;
                }
            }
        }
    }
}

/// Headless implementation of the DOM primitive surface.
///
/// Single-threaded like the native engine: share it through `Rc`, and let
/// element procedures re-enter it freely.
#[derive(Debug, Default)]
pub struct HeadlessEngine {
    state: RefCell<State>,
}

impl HeadlessEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a window holding an empty document.
    pub fn create_window(&self) -> Hwnd {
        let mut s = self.state.borrow_mut();
        s.next_hwnd += 1;
        let hwnd = Hwnd::from_raw(s.next_hwnd);
        let root = match s.tree.import_document("") {
            Ok(root) => root,
            Err(_) => s.tree.new_element("html"),
        };
        s.windows.insert(
            hwnd,
            Window {
                root,
                focus: None,
                event_root: None,
                capture: None,
                notify: None,
                handlers: Vec::new(),
            },
        );
        tracing::debug!("created headless window {:?}", hwnd);
        hwnd
    }

    /// Replace the window's document with `html`.
    ///
    /// The old document is torn down (handlers receive detach), behaviors
    /// named in `behavior` attributes are requested through the window's
    /// notification procedure, and `DocumentComplete` is raised last.
    pub fn load_html(&self, hwnd: Hwnd, html: &str) -> Result<(), DomError> {
        let (old_root, new_root) = {
            let mut s = self.state.borrow_mut();
            s.window(hwnd).op("load html")?;
            let new_root = s.tree.import_document(html).op("load html")?;
            let window = s.window_mut(hwnd).op("load html")?;
            let old_root = std::mem::replace(&mut window.root, new_root);
            window.focus = None;
            window.event_root = None;
            window.capture = None;
            (old_root, new_root)
        };
        self.teardown(old_root);
        self.bind_behaviors(new_root);
        self.notify(hwnd, &mut Notification::DocumentComplete);
        tracing::debug!("loaded document into {:?}", hwnd);
        Ok(())
    }

    /// Ask the window's notification procedure for the bytes behind `uri`.
    pub fn request_data(&self, hwnd: Hwnd, uri: &str, data_type: ResourceType) -> Option<Vec<u8>> {
        let mut request = Notification::LoadData(LoadDataRequest {
            uri: uri.to_string(),
            data_type,
            principal: ElementHandle::NULL,
            data: None,
        });
        self.notify(hwnd, &mut request);
        let Notification::LoadData(LoadDataRequest { data: Some(data), .. }) = request else {
            return None;
        };
        self.notify(
            hwnd,
            &mut Notification::DataLoaded { uri: uri.to_string(), data_type, data: data.clone() },
        );
        Some(data)
    }

    /// Deliver every posted event, including ones posted while pumping.
    pub fn pump(&self) -> usize {
        let mut delivered = 0;
        loop {
            let next = self.state.borrow_mut().posted.pop_front();
            let Some(posted) = next else {
                return delivered;
            };
            if self.send_event(posted.target, posted.cmd, posted.source, posted.reason).is_ok() {
                delivered += 1;
            }
        }
    }

    pub fn pending_posted(&self) -> usize {
        self.state.borrow().posted.len()
    }

    /// Deliver a mouse event to `he` and its ancestors.
    pub fn mouse(&self, he: ElementHandle, cmd: MouseEvent, buttons: MouseButtons) -> ApiResult<bool> {
        let id = self.state.borrow().tree.live(he)?;
        let mut params = EventParams::Mouse(MouseParams::new(cmd, he).with_buttons(buttons));
        Ok(self.propagate(id, None, &mut params))
    }

    /// Deliver a key event to the focused element, or to the event root
    /// when focus lies outside it.
    pub fn key(&self, hwnd: Hwnd, cmd: KeyEvent, key_code: u32, modifiers: KeyModifiers) -> ApiResult<bool> {
        let (target, stop) = {
            let s = self.state.borrow();
            let window = s.window(hwnd)?;
            let mut target = window.focus.unwrap_or(window.root);
            if let Some(event_root) = window.event_root {
                if !s.tree.contains(event_root, target) {
                    target = event_root;
                }
            }
            (target, window.event_root)
        };
        let mut key = KeyParams::new(cmd, key_code).with_modifiers(modifiers);
        key.target = target.handle();
        let mut params = EventParams::Key(key);
        Ok(self.propagate(target, stop, &mut params))
    }

    /// Offer focus to `he`. Granted when a handler accepts the focus event
    /// or the element is focusable by markup.
    pub fn request_focus(&self, he: ElementHandle) -> ApiResult<bool> {
        let id = self.state.borrow().tree.live(he)?;
        let mut params = EventParams::Focus(FocusParams::new(FocusEvent::Got, he));
        let accepted = self.deliver_to(id, &mut params);
        let cancelled = matches!(&params, EventParams::Focus(p) if p.cancel);
        let focusable = {
            let s = self.state.borrow();
            let node = s.tree.node(id);
            node.attr("tabindex").is_some()
                || node.state.has(ElementState::FOCUSABLE)
                || matches!(node.tag(), "input" | "button" | "select" | "textarea")
                || (node.tag() == "a" && node.attr("href").is_some())
        };
        if cancelled || !(accepted || focusable) {
            return Ok(false);
        }
        self.set_element_state(he, ElementState::FOCUS, ElementState::NONE, true)?;
        Ok(true)
    }

    /// Fire every running timer once. A timer whose handler does not
    /// report the tick handled is stopped.
    pub fn fire_timers(&self) -> usize {
        let timers = self.state.borrow().tree.running_timers();
        let mut fired = 0;
        for (id, timer_id) in timers {
            if self.state.borrow().tree.node(id).deleted {
                continue;
            }
            let mut params = EventParams::Timer(TimerParams { timer_id });
            fired += 1;
            if !self.deliver_to(id, &mut params) {
                self.state.borrow_mut().tree.node_mut(id).timers.retain(|t| *t != timer_id);
            }
        }
        fired
    }

    /// Outstanding `use_element` references on `he`.
    pub fn ref_count(&self, he: ElementHandle) -> u32 {
        let s = self.state.borrow();
        s.tree.any(he).map_or(0, |id| s.tree.node(id).refs)
    }

    /// Number of element procedures attached to `he`.
    pub fn handler_count(&self, he: ElementHandle) -> usize {
        let s = self.state.borrow();
        s.tree.live(he).map_or(0, |id| s.tree.node(id).attachments.len())
    }

    /// Update/redraw requests received by `he`.
    pub fn redraw_requests(&self, he: ElementHandle) -> u32 {
        let s = self.state.borrow();
        s.tree.any(he).map_or(0, |id| s.tree.node(id).redraws)
    }

    /// Current event root of a window.
    pub fn event_root(&self, hwnd: Hwnd) -> ElementHandle {
        let s = self.state.borrow();
        s.windows
            .get(&hwnd)
            .and_then(|w| w.event_root)
            .map_or(ElementHandle::NULL, NodeId::handle)
    }

    // ========================================================================
    // Delivery
    // ========================================================================

    /// Offer `params` to the handlers attached to `id`, in attach order.
    fn deliver_to(&self, id: NodeId, params: &mut EventParams) -> bool {
        let attachments = {
            let s = self.state.borrow();
            let node = s.tree.node(id);
            if node.deleted {
                return false;
            }
            node.attachments.clone()
        };
        for attachment in attachments {
            if !params.is_selected_by(attachment.subscription) || !self.still_attached(id, &attachment) {
                continue;
            }
            if (attachment.proc)(attachment.tag, id.handle(), params) {
                return true;
            }
        }
        false
    }

    fn still_attached(&self, id: NodeId, attachment: &Attachment) -> bool {
        let s = self.state.borrow();
        s.tree.node(id).attachments.iter().any(|a| a.same(attachment.proc, attachment.tag))
    }

    /// Bubble from `target` up to `stop` (inclusive), then to the window
    /// handlers when no stop is set.
    fn propagate(&self, target: NodeId, stop: Option<NodeId>, params: &mut EventParams) -> bool {
        let (chain, hwnd) = {
            let s = self.state.borrow();
            let mut chain = vec![target];
            let mut cur = target;
            while Some(cur) != stop {
                match s.tree.parent(cur) {
                    Some(parent) => {
                        chain.push(parent);
                        cur = parent;
                    }
                    None => break,
                }
            }
            (chain, s.window_of(target))
        };
        for id in chain {
            if self.deliver_to(id, params) {
                params.mark_handled();
                return true;
            }
        }
        match (hwnd, stop) {
            (Some(hwnd), None) => self.deliver_to_window(hwnd, params),
            _ => false,
        }
    }

    fn deliver_to_window(&self, hwnd: Hwnd, params: &mut EventParams) -> bool {
        let (handlers, root) = {
            let s = self.state.borrow();
            match s.windows.get(&hwnd) {
                Some(w) => (w.handlers.clone(), w.root.handle()),
                None => return false,
            }
        };
        for handler in handlers {
            let live = self
                .state
                .borrow()
                .windows
                .get(&hwnd)
                .is_some_and(|w| w.handlers.iter().any(|h| h.same(handler.proc, handler.tag)));
            if live && params.is_selected_by(handler.subscription) && (handler.proc)(handler.tag, root, params) {
                return true;
            }
        }
        false
    }

    fn deliver_init(&self, id: NodeId, attachment: &Attachment, cmd: InitEvent) {
        let mut params = EventParams::Init(InitParams { cmd });
        if params.is_selected_by(attachment.subscription) {
            (attachment.proc)(attachment.tag, id.handle(), &mut params);
        }
    }

    fn notify(&self, hwnd: Hwnd, notification: &mut Notification) -> bool {
        let proc = self.state.borrow().windows.get(&hwnd).and_then(|w| w.notify);
        proc.is_some_and(|proc| proc(hwnd, notification))
    }

    /// Request markup-declared behaviors for `id` and its descendants.
    fn bind_behaviors(&self, id: NodeId) {
        let (hwnd, pending) = {
            let s = self.state.borrow();
            let Some(hwnd) = s.window_of(id) else {
                return;
            };
            let pending: Vec<(NodeId, String)> = s
                .tree
                .descendants(id, true)
                .into_iter()
                .filter(|d| !s.tree.node(*d).behavior_bound)
                .filter_map(|d| s.tree.node(d).attr(BEHAVIOR_ATTRIBUTE).map(|b| (d, b.to_string())))
                .collect();
            (hwnd, pending)
        };
        for (node, names) in pending {
            self.state.borrow_mut().tree.node_mut(node).behavior_bound = true;
            for name in names.split_whitespace() {
                let mut notification = Notification::AttachBehavior(AttachBehaviorRequest {
                    element: node.handle(),
                    name: name.to_string(),
                    binding: None,
                });
                self.notify(hwnd, &mut notification);
                let Notification::AttachBehavior(AttachBehaviorRequest { binding: Some(binding), .. }) =
                    notification
                else {
                    tracing::debug!("no behavior named {:?} for {:?}", name, node.handle());
                    continue;
                };
                if let Err(code) =
                    self.attach_event_handler(node.handle(), binding.proc, binding.tag, binding.subscription)
                {
                    tracing::warn!("binding behavior {:?} failed: {}", name, code);
                }
            }
        }
    }

    /// Detach every handler in the subtree, then delete and unlink it.
    fn teardown(&self, id: NodeId) {
        let nodes = {
            let s = self.state.borrow();
            let mut nodes = s.tree.descendants(id, true);
            nodes.reverse();
            nodes
        };
        for node in &nodes {
            let attachments = std::mem::take(&mut self.state.borrow_mut().tree.node_mut(*node).attachments);
            for attachment in &attachments {
                self.deliver_init(*node, attachment, InitEvent::Detach);
            }
        }
        let mut s = self.state.borrow_mut();
        s.forget_within(id);
        s.tree.unlink(id);
        for node in nodes {
            let n = s.tree.node_mut(node);
            n.deleted = true;
            n.timers.clear();
        }
    }

    /// Delete every child node of `id`, elements and text alike.
    fn clear_children(&self, id: NodeId) {
        let children = self.state.borrow().tree.node(id).children.clone();
        for child in children {
            let is_element = self.state.borrow().tree.node(child).is_element();
            if is_element {
                self.teardown(child);
            } else {
                self.state.borrow_mut().tree.unlink(child);
            }
        }
    }
}

impl DomApi for HeadlessEngine {
    fn use_element(&self, he: ElementHandle) -> ApiResult<()> {
        let mut s = self.state.borrow_mut();
        let id = s.tree.any(he)?;
        s.tree.node_mut(id).refs += 1;
        Ok(())
    }

    fn unuse_element(&self, he: ElementHandle) -> ApiResult<()> {
        let mut s = self.state.borrow_mut();
        let id = s.tree.any(he)?;
        let node = s.tree.node_mut(id);
        if node.refs == 0 {
            return Err(DomResult::OperationFailed);
        }
        node.refs -= 1;
        Ok(())
    }

    fn root_element(&self, hwnd: Hwnd) -> ApiResult<ElementHandle> {
        Ok(self.state.borrow().window(hwnd)?.root.handle())
    }

    fn focus_element(&self, hwnd: Hwnd) -> ApiResult<ElementHandle> {
        let s = self.state.borrow();
        Ok(s.window(hwnd)?.focus.map_or(ElementHandle::NULL, NodeId::handle))
    }

    fn find_element(&self, hwnd: Hwnd, _pt: Point) -> ApiResult<ElementHandle> {
        // No layout: every point lands on the root.
        self.root_element(hwnd)
    }

    fn element_by_uid(&self, hwnd: Hwnd, uid: u32) -> ApiResult<ElementHandle> {
        let s = self.state.borrow();
        let root = s.window(hwnd)?.root;
        Ok(s.tree
            .descendants(root, true)
            .into_iter()
            .find(|id| s.tree.node(*id).uid == uid)
            .map_or(ElementHandle::NULL, NodeId::handle))
    }

    fn element_uid(&self, he: ElementHandle) -> ApiResult<u32> {
        let s = self.state.borrow();
        Ok(s.tree.node(s.tree.live(he)?).uid)
    }

    fn element_hwnd(&self, he: ElementHandle, _root_window: bool) -> ApiResult<Hwnd> {
        let s = self.state.borrow();
        let id = s.tree.live(he)?;
        Ok(s.window_of(id).unwrap_or(Hwnd::NULL))
    }

    fn create_element(&self, tag: &str, text: Option<&str>) -> ApiResult<ElementHandle> {
        if tag.is_empty() {
            return Err(DomResult::InvalidParameter);
        }
        let mut s = self.state.borrow_mut();
        let id = s.tree.new_element(tag);
        if let Some(text) = text.filter(|t| !t.is_empty()) {
            let text = s.tree.new_text(text);
            s.tree.append(id, text);
        }
        s.tree.node_mut(id).refs = 1;
        Ok(id.handle())
    }

    fn clone_element(&self, he: ElementHandle) -> ApiResult<ElementHandle> {
        let mut s = self.state.borrow_mut();
        let id = s.tree.live(he)?;
        let copy = s.tree.deep_clone(id);
        s.tree.node_mut(copy).refs = 1;
        Ok(copy.handle())
    }

    fn delete_element(&self, he: ElementHandle) -> ApiResult<()> {
        let id = self.state.borrow().tree.live(he)?;
        self.teardown(id);
        Ok(())
    }

    fn detach_element(&self, he: ElementHandle) -> ApiResult<()> {
        let mut s = self.state.borrow_mut();
        let id = s.tree.live(he)?;
        s.forget_within(id);
        s.tree.unlink(id);
        Ok(())
    }

    fn swap_elements(&self, a: ElementHandle, b: ElementHandle) -> ApiResult<()> {
        let mut s = self.state.borrow_mut();
        let a = s.tree.live(a)?;
        let b = s.tree.live(b)?;
        if a == b {
            return Ok(());
        }
        if s.tree.contains(a, b) || s.tree.contains(b, a) {
            return Err(DomResult::InvalidParameter);
        }
        s.tree.swap(a, b);
        Ok(())
    }

    fn insert_element(&self, he: ElementHandle, parent: ElementHandle, index: u32) -> ApiResult<()> {
        let id = {
            let mut s = self.state.borrow_mut();
            let id = s.tree.live(he)?;
            let parent = s.tree.live(parent)?;
            if s.tree.contains(id, parent) {
                return Err(DomResult::InvalidParameter);
            }
            s.tree.insert(parent, index as usize, id);
            id
        };
        self.bind_behaviors(id);
        Ok(())
    }

    fn children_count(&self, he: ElementHandle) -> ApiResult<u32> {
        let s = self.state.borrow();
        Ok(s.tree.element_children(s.tree.live(he)?).len() as u32)
    }

    fn nth_child(&self, he: ElementHandle, n: u32) -> ApiResult<ElementHandle> {
        let s = self.state.borrow();
        let children = s.tree.element_children(s.tree.live(he)?);
        children.get(n as usize).map(|c| c.handle()).ok_or(DomResult::InvalidParameter)
    }

    fn parent_element(&self, he: ElementHandle) -> ApiResult<ElementHandle> {
        let s = self.state.borrow();
        Ok(s.tree.parent(s.tree.live(he)?).map_or(ElementHandle::NULL, NodeId::handle))
    }

    fn element_index(&self, he: ElementHandle) -> ApiResult<u32> {
        let s = self.state.borrow();
        Ok(s.tree.element_index(s.tree.live(he)?).unwrap_or(0) as u32)
    }

    fn element_html(&self, he: ElementHandle, outer: bool) -> ApiResult<String> {
        let s = self.state.borrow();
        Ok(s.tree.serialize(s.tree.live(he)?, outer))
    }

    fn set_element_html(&self, he: ElementHandle, html: &str, mode: SetHtmlMode) -> ApiResult<()> {
        let id = self.state.borrow().tree.live(he)?;
        if mode == SetHtmlMode::ReplaceContent {
            self.clear_children(id);
        }
        let nodes = {
            let mut s = self.state.borrow_mut();
            let nodes = s.tree.import_fragment(html)?;
            for (i, node) in nodes.iter().enumerate() {
                match mode {
                    SetHtmlMode::InsertAtStart => {
                        s.tree.node_mut(*node).parent = Some(id);
                        s.tree.node_mut(id).children.insert(i, *node);
                    }
                    _ => s.tree.append(id, *node),
                }
            }
            nodes
        };
        for node in nodes {
            self.bind_behaviors(node);
        }
        Ok(())
    }

    fn element_text(&self, he: ElementHandle) -> ApiResult<String> {
        let s = self.state.borrow();
        Ok(s.tree.text_content(s.tree.live(he)?))
    }

    fn set_element_text(&self, he: ElementHandle, text: &str) -> ApiResult<()> {
        let id = self.state.borrow().tree.live(he)?;
        self.clear_children(id);
        let mut s = self.state.borrow_mut();
        if !text.is_empty() {
            let text = s.tree.new_text(text);
            s.tree.append(id, text);
        }
        Ok(())
    }

    fn element_type(&self, he: ElementHandle) -> ApiResult<String> {
        let s = self.state.borrow();
        Ok(s.tree.node(s.tree.live(he)?).tag().to_string())
    }

    fn attribute_count(&self, he: ElementHandle) -> ApiResult<u32> {
        let s = self.state.borrow();
        Ok(s.tree.node(s.tree.live(he)?).attrs.len() as u32)
    }

    fn nth_attribute(&self, he: ElementHandle, n: u32) -> ApiResult<(String, String)> {
        let s = self.state.borrow();
        s.tree
            .node(s.tree.live(he)?)
            .attrs
            .get(n as usize)
            .cloned()
            .ok_or(DomResult::InvalidParameter)
    }

    fn attribute_by_name(&self, he: ElementHandle, name: &str) -> ApiResult<Option<String>> {
        let s = self.state.borrow();
        Ok(s.tree.node(s.tree.live(he)?).attr(name).map(str::to_string))
    }

    fn set_attribute_by_name(&self, he: ElementHandle, name: &str, value: Option<&str>) -> ApiResult<()> {
        if name.is_empty() {
            return Err(DomResult::InvalidParameter);
        }
        let mut s = self.state.borrow_mut();
        let id = s.tree.live(he)?;
        s.tree.node_mut(id).set_attr(name, value);
        Ok(())
    }

    fn style_attribute(&self, he: ElementHandle, name: &str) -> ApiResult<Option<String>> {
        let s = self.state.borrow();
        Ok(s.tree.node(s.tree.live(he)?).style(name).map(str::to_string))
    }

    fn set_style_attribute(&self, he: ElementHandle, name: &str, value: Option<&str>) -> ApiResult<()> {
        if name.is_empty() {
            return Err(DomResult::InvalidParameter);
        }
        let mut s = self.state.borrow_mut();
        let id = s.tree.live(he)?;
        s.tree.node_mut(id).set_style(name, value);
        Ok(())
    }

    fn clear_style_attributes(&self, he: ElementHandle) -> ApiResult<()> {
        let mut s = self.state.borrow_mut();
        let id = s.tree.live(he)?;
        s.tree.node_mut(id).styles.clear();
        Ok(())
    }

    fn element_state(&self, he: ElementHandle) -> ApiResult<ElementState> {
        let s = self.state.borrow();
        Ok(s.tree.node(s.tree.live(he)?).state)
    }

    fn set_element_state(
        &self,
        he: ElementHandle,
        set: ElementState,
        clear: ElementState,
        update: bool,
    ) -> ApiResult<()> {
        let mut s = self.state.borrow_mut();
        let id = s.tree.live(he)?;
        if set.has(ElementState::FOCUS) {
            if let Some(hwnd) = s.window_of(id) {
                let previous = s.window_mut(hwnd)?.focus.replace(id);
                if let Some(previous) = previous.filter(|p| *p != id) {
                    let prev = s.tree.node_mut(previous);
                    prev.state = prev.state.without(ElementState::FOCUS);
                }
            }
        } else if clear.has(ElementState::FOCUS) {
            if let Some(hwnd) = s.window_of(id) {
                let window = s.window_mut(hwnd)?;
                if window.focus == Some(id) {
                    window.focus = None;
                }
            }
        }
        let node = s.tree.node_mut(id);
        node.state = node.state.without(clear).union(set);
        if update {
            node.redraws += 1;
        }
        Ok(())
    }

    fn update_element(&self, he: ElementHandle, _flags: UpdateFlags) -> ApiResult<()> {
        let mut s = self.state.borrow_mut();
        let id = s.tree.live(he)?;
        s.tree.node_mut(id).redraws += 1;
        Ok(())
    }

    fn element_location(&self, he: ElementHandle, _areas: ElementAreas) -> ApiResult<Rect> {
        // No layout: every box is empty.
        self.state.borrow().tree.live(he)?;
        Ok(Rect::default())
    }

    fn select_elements(
        &self,
        he: ElementHandle,
        selector: &str,
        visitor: &mut SelectVisitor<'_>,
    ) -> ApiResult<()> {
        let list = SelectorList::parse(selector).map_err(|_| DomResult::InvalidParameter)?;
        let matches: Vec<ElementHandle> = {
            let s = self.state.borrow();
            let id = s.tree.live(he)?;
            s.tree
                .descendants(id, false)
                .into_iter()
                .filter(|d| list.matches(&s.node_ref(*d)))
                .map(NodeId::handle)
                .collect()
        };
        for m in matches {
            if visitor(m) {
                break;
            }
        }
        Ok(())
    }

    fn select_parent(&self, he: ElementHandle, selector: &str, depth: u32) -> ApiResult<ElementHandle> {
        let list = SelectorList::parse(selector).map_err(|_| DomResult::InvalidParameter)?;
        let s = self.state.borrow();
        let mut cur = Some(s.tree.live(he)?);
        let mut level = 0;
        while let Some(id) = cur {
            if depth != 0 && level >= depth {
                break;
            }
            if list.matches(&s.node_ref(id)) {
                return Ok(id.handle());
            }
            cur = s.tree.parent(id);
            level += 1;
        }
        Ok(ElementHandle::NULL)
    }

    fn sort_elements(
        &self,
        he: ElementHandle,
        start: u32,
        end: u32,
        cmp: &mut ElementComparator<'_>,
    ) -> ApiResult<()> {
        let (id, mut items) = {
            let s = self.state.borrow();
            let id = s.tree.live(he)?;
            let children = s.tree.element_children(id);
            let (start, end) = (start as usize, end as usize);
            if start > end || end > children.len() {
                return Err(DomResult::InvalidParameter);
            }
            (id, children[start..end].iter().map(|c| c.handle()).collect::<Vec<_>>())
        };
        items.sort_by(|a, b| cmp(*a, *b));
        let sorted: Vec<NodeId> = items.into_iter().filter_map(NodeId::from_handle).collect();
        self.state.borrow_mut().tree.reorder(id, start as usize, &sorted);
        Ok(())
    }

    fn set_timer(&self, he: ElementHandle, millis: u32, timer_id: usize) -> ApiResult<()> {
        let mut s = self.state.borrow_mut();
        let id = s.tree.live(he)?;
        let timers = &mut s.tree.node_mut(id).timers;
        timers.retain(|t| *t != timer_id);
        if millis > 0 {
            timers.push(timer_id);
        }
        Ok(())
    }

    fn set_event_root(&self, he: ElementHandle) -> ApiResult<ElementHandle> {
        let mut s = self.state.borrow_mut();
        if he.is_null() {
            let mut previous = ElementHandle::NULL;
            for window in s.windows.values_mut() {
                if let Some(root) = window.event_root.take() {
                    previous = root.handle();
                }
            }
            return Ok(previous);
        }
        let id = s.tree.live(he)?;
        let hwnd = s.window_of(id).ok_or(DomResult::InvalidHwnd)?;
        let previous = s.window_mut(hwnd)?.event_root.replace(id);
        Ok(previous.map_or(ElementHandle::NULL, NodeId::handle))
    }

    fn set_capture(&self, he: ElementHandle) -> ApiResult<()> {
        let mut s = self.state.borrow_mut();
        let id = s.tree.live(he)?;
        let hwnd = s.window_of(id).ok_or(DomResult::InvalidHwnd)?;
        s.window_mut(hwnd)?.capture = Some(id);
        Ok(())
    }

    fn release_capture(&self, hwnd: Hwnd) -> ApiResult<()> {
        self.state.borrow_mut().window_mut(hwnd)?.capture = None;
        Ok(())
    }

    fn send_event(
        &self,
        he: ElementHandle,
        cmd: BehaviorEvent,
        source: ElementHandle,
        reason: usize,
    ) -> ApiResult<bool> {
        let id = self.state.borrow().tree.live(he)?;
        let mut params = EventParams::Behavior(BehaviorEventParams::new(cmd, he, source, reason));
        Ok(self.propagate(id, None, &mut params))
    }

    fn post_event(
        &self,
        he: ElementHandle,
        cmd: BehaviorEvent,
        source: ElementHandle,
        reason: usize,
    ) -> ApiResult<()> {
        let mut s = self.state.borrow_mut();
        s.tree.live(he)?;
        s.posted.push_back(Posted { target: he, cmd, source, reason });
        Ok(())
    }

    fn call_behavior_method(&self, he: ElementHandle, params: &mut MethodParams) -> ApiResult<bool> {
        let id = self.state.borrow().tree.live(he)?;
        let mut event = EventParams::MethodCall(params.clone());
        let handled = self.deliver_to(id, &mut event);
        if let EventParams::MethodCall(out) = event {
            *params = out;
        }
        if handled {
            return Ok(true);
        }
        match params.method {
            // Default button behavior: a click is a synthesized BUTTON_CLICK.
            BehaviorMethod::DoClick => {
                self.send_event(he, BehaviorEvent::ButtonClick, he, ClickReason::Synthesized.raw())?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn attach_event_handler(
        &self,
        he: ElementHandle,
        proc: ElementProc,
        tag: usize,
        subscription: EventGroups,
    ) -> ApiResult<()> {
        let (id, attachment) = {
            let mut s = self.state.borrow_mut();
            let id = s.tree.live(he)?;
            let node = s.tree.node_mut(id);
            if node.attachments.iter().any(|a| a.same(proc, tag)) {
                return Ok(());
            }
            let attachment = Attachment { proc, tag, subscription };
            node.attachments.push(attachment);
            (id, attachment)
        };
        self.deliver_init(id, &attachment, InitEvent::Attach);
        Ok(())
    }

    fn detach_event_handler(&self, he: ElementHandle, proc: ElementProc, tag: usize) -> ApiResult<()> {
        let (id, attachment) = {
            let mut s = self.state.borrow_mut();
            let id = s.tree.live(he)?;
            let node = s.tree.node_mut(id);
            let pos = node
                .attachments
                .iter()
                .position(|a| a.same(proc, tag))
                .ok_or(DomResult::InvalidParameter)?;
            (id, node.attachments.remove(pos))
        };
        self.deliver_init(id, &attachment, InitEvent::Detach);
        Ok(())
    }

    fn window_attach_event_handler(
        &self,
        hwnd: Hwnd,
        proc: ElementProc,
        tag: usize,
        subscription: EventGroups,
    ) -> ApiResult<()> {
        let mut s = self.state.borrow_mut();
        let window = s.window_mut(hwnd)?;
        if !window.handlers.iter().any(|h| h.same(proc, tag)) {
            window.handlers.push(Attachment { proc, tag, subscription });
        }
        Ok(())
    }

    fn window_detach_event_handler(&self, hwnd: Hwnd, proc: ElementProc, tag: usize) -> ApiResult<()> {
        let mut s = self.state.borrow_mut();
        let window = s.window_mut(hwnd)?;
        let before = window.handlers.len();
        window.handlers.retain(|h| !h.same(proc, tag));
        if window.handlers.len() == before {
            return Err(DomResult::InvalidParameter);
        }
        Ok(())
    }

    fn set_notify_callback(&self, hwnd: Hwnd, proc: Option<NotifyProc>) -> ApiResult<()> {
        self.state.borrow_mut().window_mut(hwnd)?.notify = proc;
        Ok(())
    }
}
