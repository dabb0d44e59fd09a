//! Light-box dialog behavior
//!
//! Show moves the dialog into a full-window `div.shim` appended to the
//! document root, forces `display: block` and makes the dialog the
//! keyboard event root. Hide undoes all of it: the dialog goes back to
//! its original parent and index, the shim is deleted and focus returns
//! to the element that held it before.
//!
//! Enter clicks the `[role='ok-button']` child, Escape the
//! `[role='cancel-button']` one. A button click from either closes the
//! dialog.

use std::cell::RefCell;
use std::collections::HashMap;

use hlkit_dom::event::{BehaviorEventParams, KeyEvent, KeyParams, keys};
use hlkit_dom::{
    BehaviorEvent, BehaviorMethod, DomError, Element, ElementHandle, ElementState, EventGroups, Result,
};

use crate::handler::EventHandler;

const OK_BUTTON: &str = "ok-button";
const CANCEL_BUTTON: &str = "cancel-button";
const SHIM_CLASS: &str = "shim";

/// What a shown dialog needs to go back where it was.
#[derive(Debug)]
struct Shown {
    parent: Element,
    index: u32,
    shim: Element,
    focus_uid: Option<u32>,
    display: Option<String>,
    previous_root: Option<Element>,
}

/// Per-element state keyed by handle; `None` while the dialog is hidden.
#[derive(Debug, Default)]
pub struct LightBoxDialog {
    states: RefCell<HashMap<ElementHandle, Option<Shown>>>,
}

impl LightBoxDialog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_attached_to(&self, dialog: &Element) -> bool {
        self.states.borrow().contains_key(&dialog.handle())
    }

    pub fn is_shown(&self, dialog: &Element) -> bool {
        self.states.borrow().get(&dialog.handle()).is_some_and(Option::is_some)
    }

    /// Show `dialog` modally. `Ok(false)` when the behavior is not attached
    /// to it or it is already shown.
    pub fn show(&self, dialog: &Element) -> Result<bool> {
        match self.states.borrow().get(&dialog.handle()) {
            None => {
                tracing::warn!("show: {} has no light-box-dialog behavior", dialog);
                return Ok(false);
            }
            Some(Some(_)) => return Ok(false),
            Some(None) => {}
        }
        let Some(parent) = dialog.parent()? else {
            tracing::warn!("show: {} is not in a document", dialog);
            return Ok(false);
        };
        let Some(root) = dialog.root()? else {
            return Ok(false);
        };
        let index = dialog.index()?;
        let hwnd = dialog.root_hwnd()?;
        let focus_uid = match Element::focused(dialog.api().clone(), hwnd)? {
            Some(focus) => Some(focus.uid()?),
            None => None,
        };
        let display = dialog.style("display")?;

        let shim = Element::create(dialog.api().clone(), "div")?;
        shim.set_attr("class", SHIM_CLASS)?;
        root.append_child(&shim)?;
        if let Err(e) = shim.insert_child(dialog, 0) {
            if let Err(cleanup) = shim.delete() {
                tracing::warn!("show: shim cleanup for {} failed: {}", dialog, cleanup);
            }
            return Err(e);
        }

        let mut shown = Shown { parent, index, shim, focus_uid, display, previous_root: None };
        let presented = dialog.set_style("display", "block").and_then(|()| dialog.set_event_root());
        match presented {
            Ok(previous_root) => shown.previous_root = previous_root,
            Err(e) => {
                // The event root was not taken, so only the placement is undone.
                if let Err(cleanup) = restore(dialog, shown, false) {
                    tracing::warn!("show: rollback of {} incomplete: {}", dialog, cleanup);
                }
                return Err(e);
            }
        }

        tracing::debug!("dialog {} shown", dialog);
        self.states.borrow_mut().insert(dialog.handle(), Some(shown));
        Ok(true)
    }

    /// Close a shown `dialog`. `Ok(false)` when it is not shown.
    ///
    /// The dialog is released even when a step fails: it leaves the shim,
    /// the shim is deleted and keyboard routing is reset. The first failure
    /// is returned afterwards.
    pub fn hide(&self, dialog: &Element) -> Result<bool> {
        let shown = match self.states.borrow_mut().get_mut(&dialog.handle()) {
            None => {
                tracing::warn!("hide: {} has no light-box-dialog behavior", dialog);
                return Ok(false);
            }
            Some(slot) => slot.take(),
        };
        let Some(shown) = shown else {
            return Ok(false);
        };
        restore(dialog, shown, true)?;
        tracing::debug!("dialog {} hidden", dialog);
        Ok(true)
    }

    fn click_button(&self, dialog: &Element, role: &str) -> Result<bool> {
        match dialog.find_first(&format!("[role='{role}']"))? {
            Some(button) => {
                button.call_behavior_method(BehaviorMethod::DoClick)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Undo `show`. Every step runs; the first error is returned.
fn restore(dialog: &Element, shown: Shown, root_taken: bool) -> Result<()> {
    let Shown { parent, index, shim, focus_uid, display, previous_root } = shown;
    let mut first = None;

    note(&mut first, reinsert(dialog, &parent, index, &shim));
    note(&mut first, shim.delete());
    note(
        &mut first,
        match &display {
            Some(display) => dialog.set_style("display", display.as_str()),
            None => dialog.remove_style("display"),
        },
    );
    if root_taken {
        let back = match &previous_root {
            Some(previous) => previous.set_event_root().map(|_| ()),
            None => dialog.reset_event_root(),
        };
        note(&mut first, back.or_else(|e| {
            tracing::warn!("dialog {}: previous event root lost: {}", dialog, e);
            dialog.reset_event_root()
        }));
    }
    if let Some(uid) = focus_uid {
        note(&mut first, refocus(dialog, uid));
    }

    match first {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Put `dialog` back at `index` in `parent`. When the parent is gone the
/// dialog takes the shim's place so it stays in the document.
fn reinsert(dialog: &Element, parent: &Element, index: u32, shim: &Element) -> Result<()> {
    let back = parent.child_count().and_then(|count| parent.insert_child(dialog, index.min(count)));
    let Err(e) = back else {
        return Ok(());
    };
    tracing::warn!("dialog {}: original parent unavailable: {}", dialog, e);
    if let Some(host) = shim.parent()? {
        host.insert_child(dialog, shim.index()?)?;
    }
    Err(e)
}

/// Focus the element with `uid` if it still exists.
fn refocus(dialog: &Element, uid: u32) -> Result<()> {
    let hwnd = dialog.root_hwnd()?;
    match Element::by_uid(dialog.api().clone(), hwnd, uid)? {
        Some(focus) => focus.set_state(ElementState::FOCUS, true),
        None => Ok(()),
    }
}

fn note(first: &mut Option<DomError>, step: Result<()>) {
    if let Err(e) = step {
        tracing::warn!("dialog restore step failed: {}", e);
        first.get_or_insert(e);
    }
}

impl EventHandler for LightBoxDialog {
    fn subscription(&self) -> EventGroups {
        EventGroups::KEY | EventGroups::BEHAVIOR_EVENT
    }

    fn attached(&self, element: &Element) {
        self.states.borrow_mut().insert(element.handle(), None);
    }

    fn detached(&self, element: &Element) {
        let shown = self.states.borrow_mut().remove(&element.handle()).flatten();
        if let Some(shown) = shown {
            if let Err(e) = shown.shim.delete() {
                tracing::warn!("dialog {} detached while shown: {}", element, e);
            }
        }
    }

    fn on_key(&self, element: &Element, params: &mut KeyParams) -> bool {
        if params.cmd != KeyEvent::Down || !params.phase.is_plain_bubbling() {
            return false;
        }
        let role = match params.key_code {
            keys::VK_RETURN => OK_BUTTON,
            keys::VK_ESCAPE => CANCEL_BUTTON,
            _ => return false,
        };
        self.click_button(element, role).unwrap_or_else(|e| {
            tracing::warn!("dialog {}: {} click failed: {}", element, role, e);
            false
        })
    }

    fn on_event(&self, element: &Element, params: &mut BehaviorEventParams) -> bool {
        if params.cmd != BehaviorEvent::ButtonClick || !params.phase.is_plain_bubbling() {
            return false;
        }
        let Some(target) = Element::wrap(element.api().clone(), params.target) else {
            return false;
        };
        let role = target.attr("role").ok().flatten();
        if matches!(role.as_deref(), Some(OK_BUTTON | CANCEL_BUTTON)) {
            if let Err(e) = self.hide(element) {
                tracing::warn!("dialog {}: hide failed: {}", element, e);
            }
        }
        false
    }
}
