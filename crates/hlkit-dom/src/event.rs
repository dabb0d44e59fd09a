//! Event payloads
//!
//! Typed forms of the parameter blocks the engine hands to element
//! procedures, the subscription mask that selects them, and the
//! notification records raised per window.

use crate::types::{ElementHandle, Hwnd, Point, Rect, ResourceType, Size, bit_set};

bit_set! {
    /// Event groups a handler subscribes to (`HANDLE_*`).
    pub struct EventGroups {
        const INITIALIZATION = 0x0000;
        const MOUSE = 0x0001;
        const KEY = 0x0002;
        const FOCUS = 0x0004;
        const SCROLL = 0x0008;
        const TIMER = 0x0010;
        const SIZE = 0x0020;
        const DRAW = 0x0040;
        const DATA_ARRIVED = 0x0080;
        const BEHAVIOR_EVENT = 0x0100;
        const METHOD_CALL = 0x0200;
        const EXCHANGE = 0x1000;
        const GESTURE = 0x2000;
        const ALL = 0xFFFF;
        /// Suppresses attach/detach delivery when set
        const DISABLE_INITIALIZATION = 0x8000_0000;
    }
}

bit_set! {
    /// Keyboard modifier state (`*_KEY_PRESSED`).
    pub struct KeyModifiers {
        const CONTROL = 0x1;
        const SHIFT = 0x2;
        const ALT = 0x4;
    }
}

bit_set! {
    /// Mouse button state.
    pub struct MouseButtons {
        const MAIN = 0x1;
        const PROP = 0x2;
        const MIDDLE = 0x4;
    }
}

bit_set! {
    /// Propagation phase bits carried in the high part of an event command.
    pub struct Phase {
        const SINKING = 0x0_8000;
        const HANDLED = 0x1_0000;
    }
}

impl Phase {
    pub const BUBBLING: Self = Self::NONE;

    /// Split a raw command into its event code and phase bits.
    #[inline]
    pub fn split(cmd: u32) -> (u32, Phase) {
        (cmd & 0xFF, Phase::from_bits(cmd & (Self::SINKING | Self::HANDLED).bits()))
    }

    /// Bubbling phase of an event nobody has handled yet.
    #[inline]
    pub fn is_plain_bubbling(self) -> bool {
        self == Self::BUBBLING
    }
}

/// Virtual key codes used by the built-in behaviors.
pub mod keys {
    pub const VK_TAB: u32 = 0x09;
    pub const VK_RETURN: u32 = 0x0D;
    pub const VK_ESCAPE: u32 = 0x1B;
    pub const VK_SPACE: u32 = 0x20;
    pub const VK_END: u32 = 0x23;
    pub const VK_HOME: u32 = 0x24;
    pub const VK_LEFT: u32 = 0x25;
    pub const VK_UP: u32 = 0x26;
    pub const VK_RIGHT: u32 = 0x27;
    pub const VK_DOWN: u32 = 0x28;
}

/// Declares a closed event-code enum with an `Other` escape hatch.
macro_rules! event_codes {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $variant:ident = $value:literal, )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $variant, )*
            Other(u32),
        }

        impl $name {
            pub fn from_raw(raw: u32) -> Self {
                match raw {
                    $( $value => Self::$variant, )*
                    other => Self::Other(other),
                }
            }

            pub fn raw(self) -> u32 {
                match self {
                    $( Self::$variant => $value, )*
                    Self::Other(other) => other,
                }
            }
        }
    };
}

event_codes! {
    pub enum InitEvent {
        Detach = 0,
        Attach = 1,
    }
}

event_codes! {
    pub enum MouseEvent {
        Enter = 0,
        Leave = 1,
        Move = 2,
        Up = 3,
        Down = 4,
        DoubleClick = 5,
        Wheel = 6,
        Tick = 7,
        Idle = 8,
    }
}

event_codes! {
    pub enum KeyEvent {
        Down = 0,
        Up = 1,
        Char = 2,
    }
}

event_codes! {
    pub enum FocusEvent {
        Lost = 0,
        Got = 1,
    }
}

event_codes! {
    pub enum DrawLayer {
        Background = 0,
        Content = 1,
        Foreground = 2,
    }
}

event_codes! {
    /// Logical behavior events (`BUTTON_CLICK`, `HYPERLINK_CLICK`, ...).
    pub enum BehaviorEvent {
        ButtonClick = 0x00,
        ButtonPress = 0x01,
        ButtonStateChanged = 0x02,
        EditValueChanging = 0x03,
        EditValueChanged = 0x04,
        SelectSelectionChanged = 0x05,
        SelectStateChanged = 0x06,
        PopupRequest = 0x07,
        PopupReady = 0x08,
        PopupDismissed = 0x09,
        MenuItemActive = 0x0A,
        MenuItemClick = 0x0B,
        HyperlinkClick = 0x80,
        ElementCollapsed = 0x90,
        ElementExpanded = 0x91,
        ActivateChild = 0x92,
    }
}

event_codes! {
    /// Behavior methods invokable through `call_behavior_method`.
    pub enum BehaviorMethod {
        DoClick = 0,
        IsEmpty = 0xFC,
        GetValue = 0xFD,
        SetValue = 0xFE,
    }
}

/// Why a click-like behavior event was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum ClickReason {
    ByMouseClick = 0,
    ByKeyClick = 1,
    Synthesized = 2,
}

impl ClickReason {
    pub fn from_raw(raw: usize) -> Option<Self> {
        match raw {
            0 => Some(Self::ByMouseClick),
            1 => Some(Self::ByKeyClick),
            2 => Some(Self::Synthesized),
            _ => None,
        }
    }

    #[inline]
    pub fn raw(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitParams {
    pub cmd: InitEvent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MouseParams {
    pub cmd: MouseEvent,
    pub phase: Phase,
    pub target: ElementHandle,
    /// Position relative to the target element
    pub pos: Point,
    /// Position relative to the document root
    pub pos_document: Point,
    pub buttons: MouseButtons,
    pub modifiers: KeyModifiers,
    /// Cursor type the handler may override
    pub cursor_type: u32,
    pub is_on_icon: bool,
    pub dragging: ElementHandle,
    pub dragging_mode: u32,
}

impl MouseParams {
    pub fn new(cmd: MouseEvent, target: ElementHandle) -> Self {
        Self {
            cmd,
            phase: Phase::BUBBLING,
            target,
            pos: Point::default(),
            pos_document: Point::default(),
            buttons: MouseButtons::NONE,
            modifiers: KeyModifiers::NONE,
            cursor_type: 0,
            is_on_icon: false,
            dragging: ElementHandle::NULL,
            dragging_mode: 0,
        }
    }

    pub fn with_buttons(mut self, buttons: MouseButtons) -> Self {
        self.buttons = buttons;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyParams {
    pub cmd: KeyEvent,
    pub phase: Phase,
    pub target: ElementHandle,
    pub key_code: u32,
    pub modifiers: KeyModifiers,
}

impl KeyParams {
    pub fn new(cmd: KeyEvent, key_code: u32) -> Self {
        Self {
            cmd,
            phase: Phase::BUBBLING,
            target: ElementHandle::NULL,
            key_code,
            modifiers: KeyModifiers::NONE,
        }
    }

    pub fn with_modifiers(mut self, modifiers: KeyModifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FocusParams {
    pub cmd: FocusEvent,
    pub phase: Phase,
    pub target: ElementHandle,
    pub by_mouse_click: bool,
    /// Set by a handler to veto the focus change
    pub cancel: bool,
}

impl FocusParams {
    pub fn new(cmd: FocusEvent, target: ElementHandle) -> Self {
        Self { cmd, phase: Phase::BUBBLING, target, by_mouse_click: false, cancel: false }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawParams {
    pub cmd: DrawLayer,
    /// Opaque device context
    pub hdc: usize,
    pub area: Rect,
    pub reserved: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerParams {
    pub timer_id: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BehaviorEventParams {
    pub cmd: BehaviorEvent,
    pub phase: Phase,
    /// Element the event is addressed to
    pub target: ElementHandle,
    /// Element that raised the event
    pub source: ElementHandle,
    pub reason: usize,
}

impl BehaviorEventParams {
    pub fn new(cmd: BehaviorEvent, target: ElementHandle, source: ElementHandle, reason: usize) -> Self {
        Self { cmd, phase: Phase::BUBBLING, target, source, reason }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodParams {
    pub method: BehaviorMethod,
    /// Value slot for get/set value style methods
    pub value: Option<String>,
}

impl MethodParams {
    pub fn new(method: BehaviorMethod) -> Self {
        Self { method, value: None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataArrivedParams {
    pub initiator: ElementHandle,
    pub data: Vec<u8>,
    pub data_type: ResourceType,
    pub status: u32,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScrollParams {
    pub cmd: u32,
    pub target: ElementHandle,
    pub pos: i32,
    pub vertical: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeParams {
    pub cmd: u32,
    pub phase: Phase,
    pub target: ElementHandle,
    pub pos: Point,
    pub pos_view: Point,
    pub data_types: u32,
    pub drag_cmd: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GestureParams {
    pub cmd: u32,
    pub phase: Phase,
    pub target: ElementHandle,
    pub pos: Point,
    pub pos_view: Point,
    pub flags: u32,
    pub delta_time: u32,
    pub delta_xy: Size,
    pub delta_v: f64,
}

/// One event as delivered to an element procedure.
///
/// Each variant corresponds to exactly one subscription group.
#[derive(Debug, Clone, PartialEq)]
pub enum EventParams {
    Init(InitParams),
    Mouse(MouseParams),
    Key(KeyParams),
    Focus(FocusParams),
    Scroll(ScrollParams),
    Timer(TimerParams),
    Size,
    Draw(DrawParams),
    DataArrived(DataArrivedParams),
    Behavior(BehaviorEventParams),
    MethodCall(MethodParams),
    Exchange(ExchangeParams),
    Gesture(GestureParams),
}

impl EventParams {
    pub fn attach() -> Self {
        Self::Init(InitParams { cmd: InitEvent::Attach })
    }

    pub fn detach() -> Self {
        Self::Init(InitParams { cmd: InitEvent::Detach })
    }

    /// Subscription group that gates delivery of this event.
    pub fn group(&self) -> EventGroups {
        match self {
            Self::Init(_) => EventGroups::INITIALIZATION,
            Self::Mouse(_) => EventGroups::MOUSE,
            Self::Key(_) => EventGroups::KEY,
            Self::Focus(_) => EventGroups::FOCUS,
            Self::Scroll(_) => EventGroups::SCROLL,
            Self::Timer(_) => EventGroups::TIMER,
            Self::Size => EventGroups::SIZE,
            Self::Draw(_) => EventGroups::DRAW,
            Self::DataArrived(_) => EventGroups::DATA_ARRIVED,
            Self::Behavior(_) => EventGroups::BEHAVIOR_EVENT,
            Self::MethodCall(_) => EventGroups::METHOD_CALL,
            Self::Exchange(_) => EventGroups::EXCHANGE,
            Self::Gesture(_) => EventGroups::GESTURE,
        }
    }

    /// Whether a handler subscribed to `mask` should receive this event.
    pub fn is_selected_by(&self, mask: EventGroups) -> bool {
        match self {
            Self::Init(_) => !mask.has(EventGroups::DISABLE_INITIALIZATION),
            other => mask.has(other.group()),
        }
    }

    /// Mark the event as already handled for the rest of its propagation.
    pub fn mark_handled(&mut self) {
        let phase = match self {
            Self::Mouse(p) => &mut p.phase,
            Self::Key(p) => &mut p.phase,
            Self::Focus(p) => &mut p.phase,
            Self::Behavior(p) => &mut p.phase,
            Self::Exchange(p) => &mut p.phase,
            Self::Gesture(p) => &mut p.phase,
            _ => return,
        };
        *phase |= Phase::HANDLED;
    }
}

/// Element procedure registered with the engine.
///
/// Receives the attachment tag, the element and the event; returns the
/// "handled" flag. Returning `true` suppresses the engine default action.
pub type ElementProc = fn(tag: usize, he: ElementHandle, params: &mut EventParams) -> bool;

/// Procedure, tag and mask the engine should use for a resolved behavior.
#[derive(Debug, Clone, Copy)]
pub struct BehaviorBinding {
    pub proc: ElementProc,
    pub tag: usize,
    pub subscription: EventGroups,
}

/// Engine request to bind a markup-declared behavior to an element.
#[derive(Debug, Clone)]
pub struct AttachBehaviorRequest {
    pub element: ElementHandle,
    pub name: String,
    /// Filled in by the notification handler on success
    pub binding: Option<BehaviorBinding>,
}

/// Engine request for the bytes behind a URI.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadDataRequest {
    pub uri: String,
    pub data_type: ResourceType,
    pub principal: ElementHandle,
    /// Filled in by the notification handler to supply the data
    pub data: Option<Vec<u8>>,
}

/// Window-scoped notification raised by the engine.
#[derive(Debug, Clone)]
pub enum Notification {
    CreateControl { element: ElementHandle },
    ControlCreated { element: ElementHandle },
    DestroyControl { element: ElementHandle },
    LoadData(LoadDataRequest),
    DataLoaded { uri: String, data_type: ResourceType, data: Vec<u8> },
    DocumentComplete,
    AttachBehavior(AttachBehaviorRequest),
}

/// Notification procedure registered per window. Returns `true` when the
/// notification was serviced.
pub type NotifyProc = fn(hwnd: Hwnd, notification: &mut Notification) -> bool;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_split() {
        let (code, phase) = Phase::split(0x0_8000 | 4);
        assert_eq!(MouseEvent::from_raw(code), MouseEvent::Down);
        assert!(phase.has(Phase::SINKING));
        assert!(!phase.is_plain_bubbling());

        let (code, phase) = Phase::split(3);
        assert_eq!(code, 3);
        assert!(phase.is_plain_bubbling());
    }

    #[test]
    fn test_event_codes_round_trip_unknown() {
        assert_eq!(BehaviorEvent::from_raw(0x92), BehaviorEvent::ActivateChild);
        assert_eq!(BehaviorEvent::from_raw(0x1234), BehaviorEvent::Other(0x1234));
        assert_eq!(BehaviorEvent::Other(0x1234).raw(), 0x1234);
    }

    #[test]
    fn test_selection_by_mask() {
        let mouse = EventParams::Mouse(MouseParams::new(MouseEvent::Down, ElementHandle::NULL));
        assert!(mouse.is_selected_by(EventGroups::MOUSE | EventGroups::KEY));
        assert!(!mouse.is_selected_by(EventGroups::KEY));

        let attach = EventParams::attach();
        assert!(attach.is_selected_by(EventGroups::INITIALIZATION));
        assert!(!attach.is_selected_by(EventGroups::DISABLE_INITIALIZATION));
    }

    #[test]
    fn test_mark_handled() {
        let mut event = EventParams::Key(KeyParams::new(KeyEvent::Down, keys::VK_TAB));
        event.mark_handled();
        match event {
            EventParams::Key(p) => assert!(p.phase.has(Phase::HANDLED)),
            _ => unreachable!(),
        }
    }
}
