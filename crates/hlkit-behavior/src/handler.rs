//! Event handlers
//!
//! An [`EventHandler`] has one method per event group. The subscription
//! mask it reports decides which groups the engine delivers; attach and
//! detach are always delivered. [`Handler`] builds one from closures and
//! derives the mask from the slots that are filled.

use std::fmt;

use hlkit_dom::event::{
    BehaviorEventParams, DataArrivedParams, DrawParams, ExchangeParams, FocusParams,
    GestureParams, KeyParams, MouseParams, ScrollParams, TimerParams,
};
use hlkit_dom::{Element, EventGroups, EventParams, MethodParams};

/// Typed element event handler.
///
/// Every `on_*` method returns the "handled" flag: `true` stops further
/// propagation and suppresses the engine's default action for that one
/// event.
pub trait EventHandler {
    /// Event groups to deliver besides attach/detach.
    fn subscription(&self) -> EventGroups {
        EventGroups::NONE
    }

    fn attached(&self, _element: &Element) {}
    fn detached(&self, _element: &Element) {}

    fn on_mouse(&self, _element: &Element, _params: &mut MouseParams) -> bool {
        false
    }

    fn on_key(&self, _element: &Element, _params: &mut KeyParams) -> bool {
        false
    }

    fn on_focus(&self, _element: &Element, _params: &mut FocusParams) -> bool {
        false
    }

    fn on_draw(&self, _element: &Element, _params: &mut DrawParams) -> bool {
        false
    }

    fn on_timer(&self, _element: &Element, _params: &TimerParams) -> bool {
        false
    }

    fn on_event(&self, _element: &Element, _params: &mut BehaviorEventParams) -> bool {
        false
    }

    fn on_method_call(&self, _element: &Element, _params: &mut MethodParams) -> bool {
        false
    }

    fn on_data_arrived(&self, _element: &Element, _params: &mut DataArrivedParams) -> bool {
        false
    }

    fn on_size(&self, _element: &Element) {}

    fn on_scroll(&self, _element: &Element, _params: &mut ScrollParams) -> bool {
        false
    }

    fn on_exchange(&self, _element: &Element, _params: &mut ExchangeParams) -> bool {
        false
    }

    fn on_gesture(&self, _element: &Element, _params: &mut GestureParams) -> bool {
        false
    }
}

/// Route a non-initialization event to the matching typed method.
pub(crate) fn dispatch(handler: &dyn EventHandler, element: &Element, params: &mut EventParams) -> bool {
    match params {
        EventParams::Init(_) => false,
        EventParams::Mouse(p) => handler.on_mouse(element, p),
        EventParams::Key(p) => handler.on_key(element, p),
        EventParams::Focus(p) => handler.on_focus(element, p),
        EventParams::Draw(p) => handler.on_draw(element, p),
        EventParams::Timer(p) => handler.on_timer(element, p),
        EventParams::Behavior(p) => handler.on_event(element, p),
        EventParams::MethodCall(p) => handler.on_method_call(element, p),
        EventParams::DataArrived(p) => handler.on_data_arrived(element, p),
        EventParams::Size => {
            handler.on_size(element);
            false
        }
        EventParams::Scroll(p) => handler.on_scroll(element, p),
        EventParams::Exchange(p) => handler.on_exchange(element, p),
        EventParams::Gesture(p) => handler.on_gesture(element, p),
    }
}

type Slot<P> = Option<Box<dyn Fn(&Element, &mut P) -> bool>>;

/// Handler assembled from optional closures.
///
/// ```rust,ignore
/// let counter = Handler::new().on_mouse(|_, p| p.cmd == MouseEvent::Down);
/// assert_eq!(counter.subscription(), EventGroups::MOUSE);
/// ```
#[derive(Default)]
pub struct Handler {
    attached: Option<Box<dyn Fn(&Element)>>,
    detached: Option<Box<dyn Fn(&Element)>>,
    mouse: Slot<MouseParams>,
    key: Slot<KeyParams>,
    focus: Slot<FocusParams>,
    draw: Slot<DrawParams>,
    timer: Slot<TimerParams>,
    event: Slot<BehaviorEventParams>,
    method_call: Slot<MethodParams>,
    data_arrived: Slot<DataArrivedParams>,
    size: Option<Box<dyn Fn(&Element)>>,
    scroll: Slot<ScrollParams>,
    exchange: Slot<ExchangeParams>,
    gesture: Slot<GestureParams>,
}

macro_rules! slot_setter {
    ($name:ident, $field:ident, $params:ty) => {
        pub fn $name(mut self, f: impl Fn(&Element, &mut $params) -> bool + 'static) -> Self {
            self.$field = Some(Box::new(f));
            self
        }
    };
}

impl Handler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_attached(mut self, f: impl Fn(&Element) + 'static) -> Self {
        self.attached = Some(Box::new(f));
        self
    }

    pub fn on_detached(mut self, f: impl Fn(&Element) + 'static) -> Self {
        self.detached = Some(Box::new(f));
        self
    }

    pub fn on_size(mut self, f: impl Fn(&Element) + 'static) -> Self {
        self.size = Some(Box::new(f));
        self
    }

    slot_setter!(on_mouse, mouse, MouseParams);
    slot_setter!(on_key, key, KeyParams);
    slot_setter!(on_focus, focus, FocusParams);
    slot_setter!(on_draw, draw, DrawParams);
    slot_setter!(on_timer, timer, TimerParams);
    slot_setter!(on_event, event, BehaviorEventParams);
    slot_setter!(on_method_call, method_call, MethodParams);
    slot_setter!(on_data_arrived, data_arrived, DataArrivedParams);
    slot_setter!(on_scroll, scroll, ScrollParams);
    slot_setter!(on_exchange, exchange, ExchangeParams);
    slot_setter!(on_gesture, gesture, GestureParams);
}

fn call<P>(slot: &Slot<P>, element: &Element, params: &mut P) -> bool {
    slot.as_ref().is_some_and(|f| f(element, params))
}

impl EventHandler for Handler {
    fn subscription(&self) -> EventGroups {
        [
            (self.mouse.is_some(), EventGroups::MOUSE),
            (self.key.is_some(), EventGroups::KEY),
            (self.focus.is_some(), EventGroups::FOCUS),
            (self.draw.is_some(), EventGroups::DRAW),
            (self.timer.is_some(), EventGroups::TIMER),
            (self.event.is_some(), EventGroups::BEHAVIOR_EVENT),
            (self.method_call.is_some(), EventGroups::METHOD_CALL),
            (self.data_arrived.is_some(), EventGroups::DATA_ARRIVED),
            (self.size.is_some(), EventGroups::SIZE),
            (self.scroll.is_some(), EventGroups::SCROLL),
            (self.exchange.is_some(), EventGroups::EXCHANGE),
            (self.gesture.is_some(), EventGroups::GESTURE),
        ]
        .into_iter()
        .filter(|(set, _)| *set)
        .fold(EventGroups::NONE, |mask, (_, group)| mask | group)
    }

    fn attached(&self, element: &Element) {
        if let Some(f) = &self.attached {
            f(element);
        }
    }

    fn detached(&self, element: &Element) {
        if let Some(f) = &self.detached {
            f(element);
        }
    }

    fn on_mouse(&self, element: &Element, params: &mut MouseParams) -> bool {
        call(&self.mouse, element, params)
    }

    fn on_key(&self, element: &Element, params: &mut KeyParams) -> bool {
        call(&self.key, element, params)
    }

    fn on_focus(&self, element: &Element, params: &mut FocusParams) -> bool {
        call(&self.focus, element, params)
    }

    fn on_draw(&self, element: &Element, params: &mut DrawParams) -> bool {
        call(&self.draw, element, params)
    }

    fn on_timer(&self, element: &Element, params: &TimerParams) -> bool {
        let mut params = *params;
        call(&self.timer, element, &mut params)
    }

    fn on_event(&self, element: &Element, params: &mut BehaviorEventParams) -> bool {
        call(&self.event, element, params)
    }

    fn on_method_call(&self, element: &Element, params: &mut MethodParams) -> bool {
        call(&self.method_call, element, params)
    }

    fn on_data_arrived(&self, element: &Element, params: &mut DataArrivedParams) -> bool {
        call(&self.data_arrived, element, params)
    }

    fn on_size(&self, element: &Element) {
        if let Some(f) = &self.size {
            f(element);
        }
    }

    fn on_scroll(&self, element: &Element, params: &mut ScrollParams) -> bool {
        call(&self.scroll, element, params)
    }

    fn on_exchange(&self, element: &Element, params: &mut ExchangeParams) -> bool {
        call(&self.exchange, element, params)
    }

    fn on_gesture(&self, element: &Element, params: &mut GestureParams) -> bool {
        call(&self.gesture, element, params)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").field("subscription", &self.subscription()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_handler_subscribes_to_nothing() {
        assert_eq!(Handler::new().subscription(), EventGroups::NONE);
    }

    #[test]
    fn test_mask_follows_filled_slots() {
        let handler = Handler::new()
            .on_mouse(|_, _| true)
            .on_event(|_, _| false)
            .on_attached(|_| {});
        let mask = handler.subscription();
        assert!(mask.contains(EventGroups::MOUSE | EventGroups::BEHAVIOR_EVENT));
        assert!(!mask.has(EventGroups::KEY));
        assert!(!mask.has(EventGroups::DISABLE_INITIALIZATION));
    }

    #[test]
    fn test_size_slot_subscribes_to_size() {
        let handler = Handler::new().on_size(|_| {});
        assert_eq!(handler.subscription(), EventGroups::SIZE);
    }
}
