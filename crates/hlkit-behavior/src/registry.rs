//! Handler registry tables
//!
//! Pure bookkeeping: which handler each tag resolves to, which tags are
//! attached to which element or window, and how many elements share each
//! named behavior. The [`Router`](crate::Router) owns one registry and
//! makes the engine calls around it.

use std::collections::HashMap;
use std::rc::Rc;

use hlkit_dom::{ElementHandle, EventGroups, Hwnd};

use crate::handler::EventHandler;
use crate::tag::{Tag, TagTable};

/// Identity of a handler object (its allocation address).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerKey(usize);

impl HandlerKey {
    pub fn of(handler: &Rc<dyn EventHandler>) -> Self {
        Self(Rc::as_ptr(handler) as *const () as usize)
    }
}

/// What a tag was minted for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    Element(ElementHandle),
    Window(Hwnd),
    /// Named behavior bound by the engine from markup
    Behavior(String),
}

#[derive(Clone)]
pub struct TagEntry {
    pub handler: Rc<dyn EventHandler>,
    pub key: HandlerKey,
    pub owner: Owner,
    pub subscription: EventGroups,
}

/// Subscription mask for `handler`: its declared groups, with attach and
/// detach always delivered.
pub fn subscription_of(handler: &dyn EventHandler) -> EventGroups {
    handler.subscription().without(EventGroups::DISABLE_INITIALIZATION)
}

#[derive(Default)]
pub struct HandlerRegistry {
    tags: TagTable<TagEntry>,
    elements: HashMap<ElementHandle, HashMap<HandlerKey, Tag>>,
    windows: HashMap<Hwnd, Tag>,
    /// Elements using each (handler, name) binding
    behaviors: HashMap<(HandlerKey, String), usize>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&self, tag: Tag) -> Option<&TagEntry> {
        self.tags.get(tag)
    }

    /// Live tags of every kind.
    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    // ========================================================================
    // Elements
    // ========================================================================

    pub fn element_tag(&self, he: ElementHandle, key: HandlerKey) -> Option<Tag> {
        self.elements.get(&he).and_then(|m| m.get(&key)).copied()
    }

    /// Mint a tag and record the (element, handler) pair.
    pub fn add_element(&mut self, he: ElementHandle, handler: Rc<dyn EventHandler>) -> Tag {
        let key = HandlerKey::of(&handler);
        let subscription = subscription_of(handler.as_ref());
        let tag = self.tags.insert(TagEntry { handler, key, owner: Owner::Element(he), subscription });
        self.elements.entry(he).or_default().insert(key, tag);
        tag
    }

    /// Forget the pair; the per-element map goes with its last handler.
    pub fn remove_element(&mut self, he: ElementHandle, key: HandlerKey) -> Option<Tag> {
        let handlers = self.elements.get_mut(&he)?;
        let tag = handlers.remove(&key);
        if handlers.is_empty() {
            self.elements.remove(&he);
        }
        tag
    }

    pub fn element_handler_count(&self, he: ElementHandle) -> usize {
        self.elements.get(&he).map_or(0, HashMap::len)
    }

    pub fn tracked_elements(&self) -> usize {
        self.elements.len()
    }

    // ========================================================================
    // Windows
    // ========================================================================

    pub fn window_tag(&self, hwnd: Hwnd) -> Option<Tag> {
        self.windows.get(&hwnd).copied()
    }

    pub fn add_window(&mut self, hwnd: Hwnd, handler: Rc<dyn EventHandler>) -> Tag {
        let key = HandlerKey::of(&handler);
        let subscription = subscription_of(handler.as_ref());
        let tag = self.tags.insert(TagEntry { handler, key, owner: Owner::Window(hwnd), subscription });
        self.windows.insert(hwnd, tag);
        tag
    }

    pub fn remove_window(&mut self, hwnd: Hwnd) -> Option<Tag> {
        self.windows.remove(&hwnd)
    }

    // ========================================================================
    // Named behaviors
    // ========================================================================

    /// Count one more element using `handler` under `name` and mint its tag.
    pub fn add_behavior(&mut self, name: &str, handler: Rc<dyn EventHandler>) -> (Tag, EventGroups) {
        let key = HandlerKey::of(&handler);
        let subscription = subscription_of(handler.as_ref());
        *self.behaviors.entry((key, name.to_string())).or_default() += 1;
        let tag = self.tags.insert(TagEntry {
            handler,
            key,
            owner: Owner::Behavior(name.to_string()),
            subscription,
        });
        (tag, subscription)
    }

    /// Elements currently using the behavior named `name`.
    pub fn behavior_ref_count(&self, name: &str) -> usize {
        self.behaviors.iter().filter(|((_, n), _)| n == name).map(|(_, count)| count).sum()
    }

    pub fn has_behavior(&self, key: HandlerKey) -> bool {
        self.behaviors.keys().any(|(k, _)| *k == key)
    }

    // ========================================================================
    // Retirement
    // ========================================================================

    /// Retire `tag` and undo whatever it was minted for. The only way a tag
    /// stops resolving.
    pub fn retire(&mut self, tag: Tag) -> Option<TagEntry> {
        let entry = self.tags.remove(tag)?;
        match &entry.owner {
            Owner::Element(he) => {
                if self.element_tag(*he, entry.key) == Some(tag) {
                    self.remove_element(*he, entry.key);
                }
            }
            Owner::Window(hwnd) => {
                if self.windows.get(hwnd) == Some(&tag) {
                    self.windows.remove(hwnd);
                }
            }
            Owner::Behavior(name) => {
                let binding = (entry.key, name.clone());
                if let Some(count) = self.behaviors.get_mut(&binding) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        self.behaviors.remove(&binding);
                        tracing::debug!("behavior {:?} released by its last element", name);
                    }
                }
            }
        }
        Some(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Handler;

    fn handler() -> Rc<dyn EventHandler> {
        Rc::new(Handler::new().on_mouse(|_, _| true))
    }

    #[test]
    fn test_element_entries() {
        let mut registry = HandlerRegistry::new();
        let he = ElementHandle::from_raw(5);
        let h = handler();
        let key = HandlerKey::of(&h);
        let tag = registry.add_element(he, h.clone());
        assert_eq!(registry.element_tag(he, key), Some(tag));
        assert_eq!(registry.resolve(tag).map(|e| e.subscription), Some(EventGroups::MOUSE));

        let retired = registry.retire(tag).unwrap();
        assert_eq!(retired.owner, Owner::Element(he));
        assert!(registry.resolve(tag).is_none());
        assert_eq!(registry.tracked_elements(), 0);
        assert!(registry.retire(tag).is_none());
    }

    #[test]
    fn test_keys_distinguish_instances() {
        let a = handler();
        let b = handler();
        assert_ne!(HandlerKey::of(&a), HandlerKey::of(&b));
        assert_eq!(HandlerKey::of(&a), HandlerKey::of(&a.clone()));
    }

    #[test]
    fn test_behavior_counts() {
        let mut registry = HandlerRegistry::new();
        let h = handler();
        let tags: Vec<Tag> = (0..3).map(|_| registry.add_behavior("tabs", h.clone()).0).collect();
        assert_eq!(registry.behavior_ref_count("tabs"), 3);
        registry.retire(tags[0]);
        assert_eq!(registry.behavior_ref_count("tabs"), 2);
        assert!(registry.has_behavior(HandlerKey::of(&h)));
        registry.retire(tags[1]);
        registry.retire(tags[2]);
        assert_eq!(registry.behavior_ref_count("tabs"), 0);
        assert!(!registry.has_behavior(HandlerKey::of(&h)));
    }

    #[test]
    fn test_one_handler_under_two_names() {
        let mut registry = HandlerRegistry::new();
        let h = handler();
        let (a, _) = registry.add_behavior("tabs", h.clone());
        registry.add_behavior("custom", h.clone());
        assert_eq!(registry.behavior_ref_count("tabs"), 1);
        assert_eq!(registry.behavior_ref_count("custom"), 1);
        registry.retire(a);
        assert_eq!(registry.behavior_ref_count("tabs"), 0);
        assert!(registry.has_behavior(HandlerKey::of(&h)));
    }

    #[test]
    fn test_disable_initialization_is_cleared() {
        struct Quiet;
        impl EventHandler for Quiet {
            fn subscription(&self) -> EventGroups {
                EventGroups::KEY | EventGroups::DISABLE_INITIALIZATION
            }
        }
        assert_eq!(subscription_of(&Quiet), EventGroups::KEY);
    }
}
