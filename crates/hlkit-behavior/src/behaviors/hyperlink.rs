//! Hyperlink behavior
//!
//! Turns a press and release of the main button, or Space/Enter on key
//! up, into one posted `HyperlinkClick` event. The pressed state lives in
//! the element's `:pressed` flag.

use hlkit_dom::event::{FocusParams, KeyEvent, KeyParams, MouseEvent, MouseParams, keys};
use hlkit_dom::{BehaviorEvent, ClickReason, Element, ElementState, EventGroups, MouseButtons, Result};

use crate::handler::EventHandler;

#[derive(Debug, Default, Clone, Copy)]
pub struct Hyperlink;

impl Hyperlink {
    pub fn new() -> Self {
        Self
    }

    fn click(&self, link: &Element, reason: ClickReason) -> Result<()> {
        tracing::debug!("hyperlink {} activated ({:?})", link, reason);
        link.post_event(BehaviorEvent::HyperlinkClick, Some(link), reason.raw())
    }

    fn on_mouse_inner(&self, link: &Element, params: &MouseParams) -> Result<bool> {
        match params.cmd {
            MouseEvent::Down if params.buttons.has(MouseButtons::MAIN) => {
                link.set_state(ElementState::PRESSED, true)?;
                Ok(true)
            }
            MouseEvent::Up if link.state(ElementState::PRESSED)? => {
                link.set_state(ElementState::PRESSED, false)?;
                self.click(link, ClickReason::ByMouseClick)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

impl EventHandler for Hyperlink {
    fn subscription(&self) -> EventGroups {
        EventGroups::MOUSE | EventGroups::KEY | EventGroups::FOCUS
    }

    fn on_mouse(&self, element: &Element, params: &mut MouseParams) -> bool {
        self.on_mouse_inner(element, params).unwrap_or_else(|e| {
            tracing::warn!("hyperlink {}: {}", element, e);
            false
        })
    }

    fn on_key(&self, element: &Element, params: &mut KeyParams) -> bool {
        if params.cmd != KeyEvent::Up || !params.phase.is_plain_bubbling() {
            return false;
        }
        if !matches!(params.key_code, keys::VK_SPACE | keys::VK_RETURN) {
            return false;
        }
        match self.click(element, ClickReason::ByKeyClick) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("hyperlink {}: {}", element, e);
                false
            }
        }
    }

    /// Links accept focus.
    fn on_focus(&self, _element: &Element, _params: &mut FocusParams) -> bool {
        true
    }
}
