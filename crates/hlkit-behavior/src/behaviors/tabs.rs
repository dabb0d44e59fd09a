//! Tabs behavior
//!
//! Markup shape:
//!
//! ```html
//! <div behavior="tabs">
//!   <ul class="strip">
//!     <li panel="p1" selected>One</li>
//!     <li panel="p2">Two</li>
//!   </ul>
//!   <div name="p1">...</div>
//!   <div name="p2">...</div>
//! </div>
//! ```
//!
//! The current tab carries `:current` and the `selected` attribute; its
//! panel is `:expanded` and every other panel `:collapsed`. All state
//! lives in the DOM.

use hlkit_dom::event::{BehaviorEventParams, KeyEvent, KeyParams, MouseEvent, MouseParams, keys};
use hlkit_dom::{BehaviorEvent, Element, ElementState, EventGroups, KeyModifiers, Result};

use crate::handler::EventHandler;

const STRIP: &str = ".strip";
const TAB: &str = "[panel]";
const PANEL_ATTR: &str = "panel";
const SELECTED_ATTR: &str = "selected";

#[derive(Debug, Default, Clone, Copy)]
pub struct Tabs;

impl Tabs {
    pub fn new() -> Self {
        Self
    }

    /// Mark the `selected` tab (or the first one) current.
    pub fn init(&self, tabs: &Element) -> Result<bool> {
        let Some(strip) = tabs.find_first(STRIP)? else {
            tracing::warn!("tabs {}: strip not found", tabs);
            return Ok(false);
        };
        let chosen = match strip.find_first("[panel][selected]")? {
            Some(tab) => tab,
            None => match strip.find_first(TAB)? {
                Some(tab) => tab,
                None => {
                    tracing::warn!("tabs {}: no tabs found", tabs);
                    return Ok(false);
                }
            },
        };
        let Some(panel) = panel_of(tabs, &chosen)? else {
            tracing::warn!("tabs {}: no panel for {}", tabs, chosen);
            return Ok(false);
        };
        for tab in strip.select(TAB)? {
            if tab == chosen {
                continue;
            }
            tab.set_state(ElementState::CURRENT, false)?;
            if let Some(other) = panel_of(tabs, &tab)? {
                set_expanded(&other, false)?;
            }
        }
        strip.set_state(ElementState::CURRENT, true)?;
        chosen.set_state(ElementState::CURRENT, true)?;
        set_expanded(&panel, true)?;
        Ok(true)
    }

    /// Make `tab` the current tab. `Ok(false)` when its panel is missing.
    pub fn select(&self, tabs: &Element, tab: &Element) -> Result<bool> {
        let Some(panel) = panel_of(tabs, tab)? else {
            tracing::warn!("tabs {}: no panel for {}", tabs, tab);
            return Ok(false);
        };
        let Some(strip) = tabs.find_first(STRIP)? else {
            tracing::warn!("tabs {}: strip not found", tabs);
            return Ok(false);
        };
        if let Some(old) = strip.find_first("[panel]:current")? {
            if old == *tab {
                return Ok(true);
            }
            old.set_state(ElementState::CURRENT, false)?;
            old.remove_attr(SELECTED_ATTR)?;
            if let Some(old_panel) = panel_of(tabs, &old)? {
                set_expanded(&old_panel, false)?;
            }
        }
        tab.set_state(ElementState::CURRENT, true)?;
        tab.set_attr(SELECTED_ATTR, "")?;
        set_expanded(&panel, true)?;
        tracing::debug!("tabs {}: selected {}", tabs, tab);
        Ok(true)
    }

    /// Step `direction` tabs from the current one, wrapping at both ends.
    pub fn select_relative(&self, tabs: &Element, direction: isize) -> Result<bool> {
        let Some(current) = self.current_tab(tabs)? else {
            return Ok(false);
        };
        let all = self.tabs(tabs)?;
        let Some(index) = all.iter().position(|t| *t == current) else {
            return Ok(false);
        };
        let next = (index as isize + direction).rem_euclid(all.len() as isize) as usize;
        self.select(tabs, &all[next])
    }

    pub fn select_first(&self, tabs: &Element) -> Result<bool> {
        match self.tabs(tabs)?.first() {
            Some(tab) => self.select(tabs, tab),
            None => Ok(false),
        }
    }

    pub fn select_last(&self, tabs: &Element) -> Result<bool> {
        match self.tabs(tabs)?.last() {
            Some(tab) => self.select(tabs, tab),
            None => Ok(false),
        }
    }

    pub fn current_tab(&self, tabs: &Element) -> Result<Option<Element>> {
        match tabs.find_first(STRIP)? {
            Some(strip) => strip.find_first("[panel]:current"),
            None => Ok(None),
        }
    }

    /// Tabs of the strip in document order.
    pub fn tabs(&self, tabs: &Element) -> Result<Vec<Element>> {
        match tabs.find_first(STRIP)? {
            Some(strip) => strip.select(TAB),
            None => Ok(Vec::new()),
        }
    }

    /// Nearest ancestor-or-self of `target` inside `tabs` that is a tab.
    fn target_tab(&self, tabs: &Element, target: Option<Element>) -> Result<Option<Element>> {
        let mut cur = target;
        while let Some(el) = cur {
            if el == *tabs {
                return Ok(None);
            }
            if el.attr(PANEL_ATTR)?.is_some_and(|p| !p.is_empty()) {
                return Ok(Some(el));
            }
            cur = el.parent()?;
        }
        Ok(None)
    }

    fn on_key_inner(&self, tabs: &Element, params: &KeyParams) -> Result<bool> {
        if params.cmd != KeyEvent::Down || !params.phase.is_plain_bubbling() {
            return Ok(false);
        }
        if self.current_tab(tabs)?.is_none() {
            return Ok(false);
        }
        match params.key_code {
            keys::VK_TAB if params.modifiers.has(KeyModifiers::CONTROL) => {
                let direction = if params.modifiers.has(KeyModifiers::SHIFT) { -1 } else { 1 };
                self.select_relative(tabs, direction)
            }
            keys::VK_LEFT => self.select_relative(tabs, -1),
            keys::VK_RIGHT => self.select_relative(tabs, 1),
            keys::VK_HOME => self.select_first(tabs),
            keys::VK_END => self.select_last(tabs),
            _ => Ok(false),
        }
    }

    fn activate(&self, tabs: &Element, target: Option<Element>) -> Result<bool> {
        match self.target_tab(tabs, target)? {
            Some(tab) => self.select(tabs, &tab),
            None => Ok(false),
        }
    }
}

/// Panel whose `name` matches the tab's `panel` attribute.
fn panel_of(tabs: &Element, tab: &Element) -> Result<Option<Element>> {
    let Some(name) = tab.attr(PANEL_ATTR)?.filter(|n| !n.is_empty()) else {
        return Ok(None);
    };
    for candidate in tabs.select("[name]")? {
        if candidate.attr("name")?.as_deref() == Some(name.as_str()) {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

fn set_expanded(panel: &Element, expanded: bool) -> Result<()> {
    panel.set_state(ElementState::COLLAPSED, !expanded)?;
    panel.set_state(ElementState::EXPANDED, expanded)
}

fn handled(result: Result<bool>, what: &str) -> bool {
    result.unwrap_or_else(|e| {
        tracing::warn!("tabs {} failed: {}", what, e);
        false
    })
}

impl EventHandler for Tabs {
    fn subscription(&self) -> EventGroups {
        EventGroups::MOUSE | EventGroups::KEY | EventGroups::BEHAVIOR_EVENT
    }

    fn attached(&self, element: &Element) {
        handled(self.init(element), "init");
    }

    fn on_mouse(&self, element: &Element, params: &mut MouseParams) -> bool {
        if !matches!(params.cmd, MouseEvent::Down | MouseEvent::DoubleClick) {
            return false;
        }
        let target = Element::wrap(element.api().clone(), params.target);
        handled(self.activate(element, target), "mouse")
    }

    fn on_key(&self, element: &Element, params: &mut KeyParams) -> bool {
        handled(self.on_key_inner(element, params), "key")
    }

    fn on_event(&self, element: &Element, params: &mut BehaviorEventParams) -> bool {
        if params.cmd != BehaviorEvent::ActivateChild {
            return false;
        }
        let target = Element::wrap(element.api().clone(), params.target);
        handled(self.activate(element, target), "activate child")
    }
}
