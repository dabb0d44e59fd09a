//! C-ABI trampolines
//!
//! `#[repr(C)]` mirrors of the engine's parameter blocks and the two
//! `extern "system"` entry points a native binding registers: the element
//! procedure and the window notification callback. Both decode into the
//! typed payloads and forward to [`element_proc`] / [`notify_proc`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::{CStr, c_char, c_void};

use hlkit_dom::event::{
    BehaviorEventParams, DataArrivedParams, DrawLayer, DrawParams, ExchangeParams, FocusEvent,
    FocusParams, GestureParams, InitEvent, InitParams, KeyEvent, KeyParams, MouseEvent, MouseParams,
    ScrollParams, TimerParams,
};
use hlkit_dom::types::ResourceType;
use hlkit_dom::utf;
use hlkit_dom::{
    AttachBehaviorRequest, BehaviorEvent, BehaviorMethod, ElementHandle, EventGroups, EventParams,
    Hwnd, KeyModifiers, LoadDataRequest, MethodParams, MouseButtons, Notification, Phase, Point,
    Rect, Size,
};

use crate::router::{element_proc, notify_proc};

pub const TRUE: i32 = 1;
pub const FALSE: i32 = 0;

/// Native element procedure signature.
pub type RawElementProc =
    unsafe extern "system" fn(tag: *mut c_void, he: *mut c_void, group: u32, params: *mut c_void) -> i32;

// ============================================================================
// Geometry
// ============================================================================

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct RawPoint {
    pub x: i32,
    pub y: i32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct RawSize {
    pub cx: i32,
    pub cy: i32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct RawRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl From<RawPoint> for Point {
    fn from(p: RawPoint) -> Self {
        Point::new(p.x, p.y)
    }
}

impl From<RawSize> for Size {
    fn from(s: RawSize) -> Self {
        Size { width: s.cx, height: s.cy }
    }
}

impl From<RawRect> for Rect {
    fn from(r: RawRect) -> Self {
        Rect::new(r.left, r.top, r.right, r.bottom)
    }
}

// ============================================================================
// Parameter blocks
// ============================================================================

#[repr(C)]
pub struct RawInitParams {
    pub cmd: u32,
}

#[repr(C)]
pub struct RawMouseParams {
    pub cmd: u32,
    pub target: *mut c_void,
    pub pos: RawPoint,
    pub pos_document: RawPoint,
    pub button_state: u32,
    pub alt_state: u32,
    pub cursor_type: u32,
    pub is_on_icon: i32,
    pub dragging: *mut c_void,
    pub dragging_mode: u32,
}

#[repr(C)]
pub struct RawKeyParams {
    pub cmd: u32,
    pub target: *mut c_void,
    pub key_code: u32,
    pub alt_state: u32,
}

#[repr(C)]
pub struct RawFocusParams {
    pub cmd: u32,
    pub target: *mut c_void,
    pub by_mouse_click: i32,
    pub cancel: i32,
}

#[repr(C)]
pub struct RawDrawParams {
    pub cmd: u32,
    pub hdc: *mut c_void,
    pub area: RawRect,
    pub reserved: u32,
}

#[repr(C)]
pub struct RawTimerParams {
    pub timer_id: usize,
}

/// Tagged value attached to behavior events. Carried but not decoded.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct RawJsonValue {
    pub t: u32,
    pub u: u32,
    pub d: u64,
}

#[repr(C)]
pub struct RawBehaviorEventParams {
    pub cmd: u32,
    pub target: *mut c_void,
    pub source: *mut c_void,
    pub reason: usize,
    pub data: RawJsonValue,
}

#[repr(C)]
pub struct RawMethodParams {
    pub method_id: u32,
}

#[repr(C)]
pub struct RawDataArrivedParams {
    pub initiator: *mut c_void,
    pub data: *const u8,
    pub data_size: u32,
    pub data_type: u32,
    pub status: u32,
    pub uri: *const u16,
}

#[repr(C)]
pub struct RawScrollParams {
    pub cmd: u32,
    pub target: *mut c_void,
    pub pos: i32,
    pub vertical: i32,
}

#[repr(C)]
pub struct RawExchangeParams {
    pub cmd: u32,
    pub target: *mut c_void,
    pub pos: RawPoint,
    pub pos_view: RawPoint,
    pub data_types: u32,
    pub drag_cmd: u32,
    pub fetch_data: *mut c_void,
}

#[repr(C)]
pub struct RawGestureParams {
    pub cmd: u32,
    pub target: *mut c_void,
    pub pos: RawPoint,
    pub pos_view: RawPoint,
    pub flags: u32,
    pub delta_time: u32,
    pub delta_xy: RawSize,
    pub delta_v: f64,
}

fn handle(ptr: *mut c_void) -> ElementHandle {
    ElementHandle::from_raw(ptr as usize)
}

/// Decode the parameter block of `group`.
///
/// # Safety
///
/// `params` must point to the block the engine documents for `group`,
/// valid for reads for the duration of the call.
pub unsafe fn decode(group: u32, params: *const c_void) -> Option<EventParams> {
    if params.is_null() {
        return None;
    }
    // SAFETY: the caller guarantees `params` points at the block for `group`.
    let event = unsafe {
        match EventGroups::from_bits(group) {
            EventGroups::INITIALIZATION => {
                let p = &*(params as *const RawInitParams);
                EventParams::Init(InitParams { cmd: InitEvent::from_raw(p.cmd) })
            }
            EventGroups::MOUSE => {
                let p = &*(params as *const RawMouseParams);
                let (cmd, phase) = Phase::split(p.cmd);
                EventParams::Mouse(MouseParams {
                    cmd: MouseEvent::from_raw(cmd),
                    phase,
                    target: handle(p.target),
                    pos: p.pos.into(),
                    pos_document: p.pos_document.into(),
                    buttons: MouseButtons::from_bits(p.button_state),
                    modifiers: KeyModifiers::from_bits(p.alt_state),
                    cursor_type: p.cursor_type,
                    is_on_icon: p.is_on_icon != 0,
                    dragging: handle(p.dragging),
                    dragging_mode: p.dragging_mode,
                })
            }
            EventGroups::KEY => {
                let p = &*(params as *const RawKeyParams);
                let (cmd, phase) = Phase::split(p.cmd);
                EventParams::Key(KeyParams {
                    cmd: KeyEvent::from_raw(cmd),
                    phase,
                    target: handle(p.target),
                    key_code: p.key_code,
                    modifiers: KeyModifiers::from_bits(p.alt_state),
                })
            }
            EventGroups::FOCUS => {
                let p = &*(params as *const RawFocusParams);
                let (cmd, phase) = Phase::split(p.cmd);
                EventParams::Focus(FocusParams {
                    cmd: FocusEvent::from_raw(cmd),
                    phase,
                    target: handle(p.target),
                    by_mouse_click: p.by_mouse_click != 0,
                    cancel: p.cancel != 0,
                })
            }
            EventGroups::DRAW => {
                let p = &*(params as *const RawDrawParams);
                EventParams::Draw(DrawParams {
                    cmd: DrawLayer::from_raw(p.cmd),
                    hdc: p.hdc as usize,
                    area: p.area.into(),
                    reserved: p.reserved,
                })
            }
            EventGroups::TIMER => {
                let p = &*(params as *const RawTimerParams);
                EventParams::Timer(TimerParams { timer_id: p.timer_id })
            }
            EventGroups::SIZE => EventParams::Size,
            EventGroups::BEHAVIOR_EVENT => {
                let p = &*(params as *const RawBehaviorEventParams);
                let (cmd, phase) = Phase::split(p.cmd);
                EventParams::Behavior(BehaviorEventParams {
                    cmd: BehaviorEvent::from_raw(cmd),
                    phase,
                    target: handle(p.target),
                    source: handle(p.source),
                    reason: p.reason,
                })
            }
            EventGroups::METHOD_CALL => {
                let p = &*(params as *const RawMethodParams);
                EventParams::MethodCall(MethodParams::new(BehaviorMethod::from_raw(p.method_id)))
            }
            EventGroups::DATA_ARRIVED => {
                let p = &*(params as *const RawDataArrivedParams);
                let data = if p.data.is_null() {
                    Vec::new()
                } else {
                    std::slice::from_raw_parts(p.data, p.data_size as usize).to_vec()
                };
                EventParams::DataArrived(DataArrivedParams {
                    initiator: handle(p.initiator),
                    data,
                    data_type: ResourceType::from_raw(p.data_type),
                    status: p.status,
                    uri: utf::from_utf16_ptr(p.uri).unwrap_or_default(),
                })
            }
            EventGroups::SCROLL => {
                let p = &*(params as *const RawScrollParams);
                EventParams::Scroll(ScrollParams {
                    cmd: p.cmd,
                    target: handle(p.target),
                    pos: p.pos,
                    vertical: p.vertical != 0,
                })
            }
            EventGroups::EXCHANGE => {
                let p = &*(params as *const RawExchangeParams);
                let (cmd, phase) = Phase::split(p.cmd);
                EventParams::Exchange(ExchangeParams {
                    cmd,
                    phase,
                    target: handle(p.target),
                    pos: p.pos.into(),
                    pos_view: p.pos_view.into(),
                    data_types: p.data_types,
                    drag_cmd: p.drag_cmd,
                })
            }
            EventGroups::GESTURE => {
                let p = &*(params as *const RawGestureParams);
                let (cmd, phase) = Phase::split(p.cmd);
                EventParams::Gesture(GestureParams {
                    cmd,
                    phase,
                    target: handle(p.target),
                    pos: p.pos.into(),
                    pos_view: p.pos_view.into(),
                    flags: p.flags,
                    delta_time: p.delta_time,
                    delta_xy: p.delta_xy.into(),
                    delta_v: p.delta_v,
                })
            }
            other => {
                tracing::debug!("unknown event group {:#x}", other.bits());
                return None;
            }
        }
    };
    Some(event)
}

/// Copy handler-writable fields back into the native block.
///
/// # Safety
///
/// Same contract as [`decode`], plus `params` must be valid for writes.
pub unsafe fn write_back(event: &EventParams, params: *mut c_void) {
    if params.is_null() {
        return;
    }
    // SAFETY: `params` is the block `event` was decoded from.
    unsafe {
        match event {
            EventParams::Mouse(p) => (*(params as *mut RawMouseParams)).cursor_type = p.cursor_type,
            EventParams::Focus(p) => (*(params as *mut RawFocusParams)).cancel = p.cancel as i32,
            _ => {}
        }
    }
}

/// Element procedure registered with the native engine.
///
/// # Safety
///
/// Called by the engine only, with `params` pointing at the block for
/// `group`.
pub unsafe extern "system" fn native_element_proc(
    tag: *mut c_void,
    he: *mut c_void,
    group: u32,
    params: *mut c_void,
) -> i32 {
    // SAFETY: forwarded engine contract.
    let Some(mut event) = (unsafe { decode(group, params) }) else {
        return FALSE;
    };
    let handled = element_proc(tag as usize, handle(he), &mut event);
    // SAFETY: forwarded engine contract.
    unsafe { write_back(&event, params) };
    if handled { TRUE } else { FALSE }
}

// ============================================================================
// Notifications
// ============================================================================

const HLN_FIRST: u32 = 0xAFF;
pub const HLN_CREATE_CONTROL: u32 = HLN_FIRST + 1;
pub const HLN_LOAD_DATA: u32 = HLN_FIRST + 2;
pub const HLN_CONTROL_CREATED: u32 = HLN_FIRST + 3;
pub const HLN_DATA_LOADED: u32 = HLN_FIRST + 4;
pub const HLN_DOCUMENT_COMPLETE: u32 = HLN_FIRST + 5;
pub const HLN_UPDATE_UI: u32 = HLN_FIRST + 6;
pub const HLN_DESTROY_CONTROL: u32 = HLN_FIRST + 7;
pub const HLN_ATTACH_BEHAVIOR: u32 = HLN_FIRST + 8;

/// Load-data return codes.
pub const LOAD_OK: usize = 0;
pub const LOAD_DISCARD: usize = 1;

#[repr(C)]
pub struct RawNotifyHeader {
    pub hwnd_from: *mut c_void,
    pub id_from: usize,
    pub code: u32,
}

#[repr(C)]
pub struct RawCreateControl {
    pub header: RawNotifyHeader,
    pub element: *mut c_void,
    pub in_hwnd_parent: *mut c_void,
    pub out_control_hwnd: *mut c_void,
    pub reserved1: isize,
    pub reserved2: isize,
}

#[repr(C)]
pub struct RawDestroyControl {
    pub header: RawNotifyHeader,
    pub element: *mut c_void,
    pub inout_control_hwnd: *mut c_void,
    pub reserved1: isize,
}

#[repr(C)]
pub struct RawLoadData {
    pub header: RawNotifyHeader,
    pub uri: *const u16,
    pub out_data: *const u8,
    pub out_data_size: u32,
    pub data_type: u32,
    pub principal: *mut c_void,
    pub initiator: *mut c_void,
}

#[repr(C)]
pub struct RawDataLoaded {
    pub header: RawNotifyHeader,
    pub uri: *const u16,
    pub data: *const u8,
    pub data_size: u32,
    pub data_type: u32,
    pub status: u32,
}

#[repr(C)]
pub struct RawAttachBehavior {
    pub header: RawNotifyHeader,
    pub element: *mut c_void,
    pub behavior_name: *const c_char,
    pub element_proc: Option<RawElementProc>,
    pub element_tag: *mut c_void,
    pub element_events: u32,
}

thread_local! {
    /// Bytes handed to the engine by load-data, kept alive until the
    /// engine reports the URI loaded or requests it again.
    static LOADED: RefCell<HashMap<String, Vec<u8>>> = RefCell::new(HashMap::new());
}

/// Notification callback registered per window with the native engine.
/// `vparam` carries the window the callback was registered for.
///
/// # Safety
///
/// Called by the engine only, with `lparam` pointing at a notification
/// record whose header code identifies its layout.
pub unsafe extern "system" fn native_notify_proc(
    _msg: u32,
    _wparam: usize,
    lparam: *mut c_void,
    vparam: *mut c_void,
) -> usize {
    if lparam.is_null() {
        return 0;
    }
    let hwnd = Hwnd::from_raw(vparam as usize);
    // SAFETY: every notification record starts with the header.
    let code = unsafe { (*(lparam as *const RawNotifyHeader)).code };
    // SAFETY: the header code selects the record layout.
    unsafe {
        match code {
            HLN_ATTACH_BEHAVIOR => attach_behavior(hwnd, &mut *(lparam as *mut RawAttachBehavior)),
            HLN_LOAD_DATA => load_data(hwnd, &mut *(lparam as *mut RawLoadData)),
            HLN_DATA_LOADED => {
                let record = &*(lparam as *const RawDataLoaded);
                let data = if record.data.is_null() {
                    Vec::new()
                } else {
                    std::slice::from_raw_parts(record.data, record.data_size as usize).to_vec()
                };
                let uri = utf::from_utf16_ptr(record.uri).unwrap_or_default();
                // The engine has its own copy now.
                LOADED.with(|loaded| loaded.borrow_mut().remove(&uri));
                let mut notification = Notification::DataLoaded {
                    uri,
                    data_type: ResourceType::from_raw(record.data_type),
                    data,
                };
                notify_proc(hwnd, &mut notification);
                0
            }
            HLN_DOCUMENT_COMPLETE => {
                notify_proc(hwnd, &mut Notification::DocumentComplete);
                0
            }
            HLN_CREATE_CONTROL => {
                let record = &*(lparam as *const RawCreateControl);
                notify_proc(hwnd, &mut Notification::CreateControl { element: handle(record.element) });
                0
            }
            HLN_CONTROL_CREATED => {
                let record = &*(lparam as *const RawCreateControl);
                notify_proc(hwnd, &mut Notification::ControlCreated { element: handle(record.element) });
                0
            }
            HLN_DESTROY_CONTROL => {
                let record = &*(lparam as *const RawDestroyControl);
                notify_proc(hwnd, &mut Notification::DestroyControl { element: handle(record.element) });
                0
            }
            _ => 0,
        }
    }
}

/// # Safety
///
/// `record.behavior_name` must be null or a NUL-terminated string.
unsafe fn attach_behavior(hwnd: Hwnd, record: &mut RawAttachBehavior) -> usize {
    if record.behavior_name.is_null() {
        return 0;
    }
    // SAFETY: the engine passes a NUL-terminated name.
    let name = unsafe { CStr::from_ptr(record.behavior_name) }.to_string_lossy().into_owned();
    let mut notification = Notification::AttachBehavior(AttachBehaviorRequest {
        element: handle(record.element),
        name,
        binding: None,
    });
    notify_proc(hwnd, &mut notification);
    if let Notification::AttachBehavior(AttachBehaviorRequest { binding: Some(binding), .. }) = notification {
        record.element_proc = Some(native_element_proc);
        record.element_tag = binding.tag as *mut c_void;
        record.element_events = binding.subscription.bits();
    }
    0
}

/// # Safety
///
/// `record.uri` must be null or a NUL-terminated UTF-16 string.
unsafe fn load_data(hwnd: Hwnd, record: &mut RawLoadData) -> usize {
    // SAFETY: forwarded engine contract.
    let Some(uri) = (unsafe { utf::from_utf16_ptr(record.uri) }) else {
        return LOAD_OK;
    };
    let mut notification = Notification::LoadData(LoadDataRequest {
        uri: uri.clone(),
        data_type: ResourceType::from_raw(record.data_type),
        principal: handle(record.principal),
        data: None,
    });
    notify_proc(hwnd, &mut notification);
    let Notification::LoadData(LoadDataRequest { data: Some(data), data_type, .. }) = notification else {
        return LOAD_OK;
    };
    LOADED.with(|loaded| {
        let mut loaded = loaded.borrow_mut();
        record.out_data = data.as_ptr();
        record.out_data_size = data.len() as u32;
        loaded.insert(uri, data);
    });
    record.data_type = data_type as u32;
    LOAD_OK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_key_splits_phase() {
        let raw = RawKeyParams {
            cmd: KeyEvent::Down.raw() | Phase::SINKING.bits(),
            target: 0x40 as *mut c_void,
            key_code: 0x0D,
            alt_state: KeyModifiers::CONTROL.bits(),
        };
        let event = unsafe { decode(EventGroups::KEY.bits(), &raw as *const _ as *const c_void) };
        let Some(EventParams::Key(p)) = event else {
            panic!("expected a key event");
        };
        assert_eq!(p.cmd, KeyEvent::Down);
        assert_eq!(p.phase, Phase::SINKING);
        assert_eq!(p.target, ElementHandle::from_raw(0x40));
        assert!(p.modifiers.has(KeyModifiers::CONTROL));
    }

    #[test]
    fn test_decode_init_and_unknown_group() {
        let raw = RawInitParams { cmd: 1 };
        let event = unsafe { decode(0, &raw as *const _ as *const c_void) };
        assert_eq!(event, Some(EventParams::attach()));
        assert!(unsafe { decode(0x4000, &raw as *const _ as *const c_void) }.is_none());
        assert!(unsafe { decode(0, std::ptr::null()) }.is_none());
    }

    #[test]
    fn test_focus_cancel_written_back() {
        let mut raw = RawFocusParams { cmd: 1, target: std::ptr::null_mut(), by_mouse_click: 1, cancel: 0 };
        let ptr = &mut raw as *mut _ as *mut c_void;
        let mut event = unsafe { decode(EventGroups::FOCUS.bits(), ptr) }.unwrap();
        if let EventParams::Focus(p) = &mut event {
            assert!(p.by_mouse_click);
            p.cancel = true;
        }
        unsafe { write_back(&event, ptr) };
        assert_eq!(raw.cancel, 1);
    }

    #[test]
    fn test_data_loaded_releases_kept_bytes() {
        let uri = "app://page.html";
        LOADED.with(|loaded| loaded.borrow_mut().insert(uri.to_string(), b"<p/>".to_vec()));
        let wide: Vec<u16> = uri.encode_utf16().chain(std::iter::once(0)).collect();
        let mut record = RawDataLoaded {
            header: RawNotifyHeader { hwnd_from: std::ptr::null_mut(), id_from: 0, code: HLN_DATA_LOADED },
            uri: wide.as_ptr(),
            data: std::ptr::null(),
            data_size: 0,
            data_type: 0,
            status: 0,
        };
        let lparam = &mut record as *mut _ as *mut c_void;
        assert_eq!(unsafe { native_notify_proc(0, 0, lparam, std::ptr::null_mut()) }, 0);
        assert!(LOADED.with(|loaded| !loaded.borrow().contains_key(uri)));
    }

    #[test]
    fn test_behavior_event_decoding() {
        let raw = RawBehaviorEventParams {
            cmd: 0x92,
            target: 0x10 as *mut c_void,
            source: 0x20 as *mut c_void,
            reason: 1,
            data: RawJsonValue::default(),
        };
        let event = unsafe { decode(EventGroups::BEHAVIOR_EVENT.bits(), &raw as *const _ as *const c_void) };
        let Some(EventParams::Behavior(p)) = event else {
            panic!("expected a behavior event");
        };
        assert_eq!(p.cmd, BehaviorEvent::ActivateChild);
        assert_eq!(p.source, ElementHandle::from_raw(0x20));
    }
}
