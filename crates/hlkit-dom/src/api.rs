//! DOM primitive surface
//!
//! One method per engine primitive. Every element-wrapper operation and
//! every registry call goes through this trait, so the same code runs
//! against the native library and against the in-memory engine.

use std::cmp::Ordering;

use crate::event::{BehaviorEvent, ElementProc, EventGroups, MethodParams, NotifyProc};
use crate::types::{
    ApiResult, ElementAreas, ElementHandle, ElementState, Hwnd, Point, Rect, SetHtmlMode,
    UpdateFlags,
};

/// Per-match visitor for [`DomApi::select_elements`]. Return `true` to stop.
pub type SelectVisitor<'a> = dyn FnMut(ElementHandle) -> bool + 'a;

/// Three-way comparator for [`DomApi::sort_elements`].
pub type ElementComparator<'a> = dyn FnMut(ElementHandle, ElementHandle) -> Ordering + 'a;

/// The engine's DOM and event-delivery primitives.
///
/// All methods must be called on the UI thread. Implementations may call
/// back into registered element procedures synchronously from inside any
/// mutating primitive.
pub trait DomApi {
    // ---- reference counting -------------------------------------------

    fn use_element(&self, he: ElementHandle) -> ApiResult<()>;
    fn unuse_element(&self, he: ElementHandle) -> ApiResult<()>;

    // ---- lookup ---------------------------------------------------------

    fn root_element(&self, hwnd: Hwnd) -> ApiResult<ElementHandle>;
    fn focus_element(&self, hwnd: Hwnd) -> ApiResult<ElementHandle>;
    fn find_element(&self, hwnd: Hwnd, pt: Point) -> ApiResult<ElementHandle>;
    fn element_by_uid(&self, hwnd: Hwnd, uid: u32) -> ApiResult<ElementHandle>;
    fn element_uid(&self, he: ElementHandle) -> ApiResult<u32>;
    /// Window of the element; with `root_window` the top-level window.
    fn element_hwnd(&self, he: ElementHandle, root_window: bool) -> ApiResult<Hwnd>;

    // ---- structure ------------------------------------------------------

    /// Create a detached element. The caller owns one reference.
    fn create_element(&self, tag: &str, text: Option<&str>) -> ApiResult<ElementHandle>;
    /// Deep copy, detached. The caller owns one reference.
    fn clone_element(&self, he: ElementHandle) -> ApiResult<ElementHandle>;
    fn delete_element(&self, he: ElementHandle) -> ApiResult<()>;
    fn detach_element(&self, he: ElementHandle) -> ApiResult<()>;
    fn swap_elements(&self, a: ElementHandle, b: ElementHandle) -> ApiResult<()>;
    fn insert_element(&self, he: ElementHandle, parent: ElementHandle, index: u32) -> ApiResult<()>;
    fn children_count(&self, he: ElementHandle) -> ApiResult<u32>;
    fn nth_child(&self, he: ElementHandle, n: u32) -> ApiResult<ElementHandle>;
    /// `NULL` for the root.
    fn parent_element(&self, he: ElementHandle) -> ApiResult<ElementHandle>;
    fn element_index(&self, he: ElementHandle) -> ApiResult<u32>;

    // ---- content --------------------------------------------------------

    fn element_html(&self, he: ElementHandle, outer: bool) -> ApiResult<String>;
    fn set_element_html(&self, he: ElementHandle, html: &str, mode: SetHtmlMode) -> ApiResult<()>;
    fn element_text(&self, he: ElementHandle) -> ApiResult<String>;
    fn set_element_text(&self, he: ElementHandle, text: &str) -> ApiResult<()>;
    fn element_type(&self, he: ElementHandle) -> ApiResult<String>;

    // ---- attributes and styles ------------------------------------------

    fn attribute_count(&self, he: ElementHandle) -> ApiResult<u32>;
    fn nth_attribute(&self, he: ElementHandle, n: u32) -> ApiResult<(String, String)>;
    fn attribute_by_name(&self, he: ElementHandle, name: &str) -> ApiResult<Option<String>>;
    /// `None` removes the attribute.
    fn set_attribute_by_name(&self, he: ElementHandle, name: &str, value: Option<&str>) -> ApiResult<()>;
    fn style_attribute(&self, he: ElementHandle, name: &str) -> ApiResult<Option<String>>;
    /// `None` removes the inline property.
    fn set_style_attribute(&self, he: ElementHandle, name: &str, value: Option<&str>) -> ApiResult<()>;
    fn clear_style_attributes(&self, he: ElementHandle) -> ApiResult<()>;

    // ---- state and geometry ---------------------------------------------

    fn element_state(&self, he: ElementHandle) -> ApiResult<ElementState>;
    fn set_element_state(
        &self,
        he: ElementHandle,
        set: ElementState,
        clear: ElementState,
        update: bool,
    ) -> ApiResult<()>;
    fn update_element(&self, he: ElementHandle, flags: UpdateFlags) -> ApiResult<()>;
    fn element_location(&self, he: ElementHandle, areas: ElementAreas) -> ApiResult<Rect>;

    // ---- selectors ------------------------------------------------------

    /// Visit every descendant of `he` matching `selector`, in document order.
    fn select_elements(
        &self,
        he: ElementHandle,
        selector: &str,
        visitor: &mut SelectVisitor<'_>,
    ) -> ApiResult<()>;
    /// Nearest ancestor (or self) matching `selector` within `depth` levels,
    /// `0` meaning unlimited.
    fn select_parent(&self, he: ElementHandle, selector: &str, depth: u32) -> ApiResult<ElementHandle>;
    /// Sort children `start..end` of `he`.
    fn sort_elements(
        &self,
        he: ElementHandle,
        start: u32,
        end: u32,
        cmp: &mut ElementComparator<'_>,
    ) -> ApiResult<()>;

    // ---- events ---------------------------------------------------------

    /// Start a timer; `millis == 0` cancels it.
    fn set_timer(&self, he: ElementHandle, millis: u32, timer_id: usize) -> ApiResult<()>;
    /// Redirect document-scoped keyboard input to `he`, `NULL` resets.
    /// Returns the previous root.
    fn set_event_root(&self, he: ElementHandle) -> ApiResult<ElementHandle>;
    fn set_capture(&self, he: ElementHandle) -> ApiResult<()>;
    fn release_capture(&self, hwnd: Hwnd) -> ApiResult<()>;
    /// Deliver a behavior event synchronously; returns the handled flag.
    fn send_event(
        &self,
        he: ElementHandle,
        cmd: BehaviorEvent,
        source: ElementHandle,
        reason: usize,
    ) -> ApiResult<bool>;
    /// Queue a behavior event for later delivery.
    fn post_event(
        &self,
        he: ElementHandle,
        cmd: BehaviorEvent,
        source: ElementHandle,
        reason: usize,
    ) -> ApiResult<()>;
    /// Returns `false` when no behavior handled the method.
    fn call_behavior_method(&self, he: ElementHandle, params: &mut MethodParams) -> ApiResult<bool>;

    // ---- handler registration ---------------------------------------------

    fn attach_event_handler(
        &self,
        he: ElementHandle,
        proc: ElementProc,
        tag: usize,
        subscription: EventGroups,
    ) -> ApiResult<()>;
    fn detach_event_handler(&self, he: ElementHandle, proc: ElementProc, tag: usize) -> ApiResult<()>;
    fn window_attach_event_handler(
        &self,
        hwnd: Hwnd,
        proc: ElementProc,
        tag: usize,
        subscription: EventGroups,
    ) -> ApiResult<()>;
    fn window_detach_event_handler(&self, hwnd: Hwnd, proc: ElementProc, tag: usize) -> ApiResult<()>;
    /// Install (or with `None` remove) the window notification procedure.
    fn set_notify_callback(&self, hwnd: Hwnd, proc: Option<NotifyProc>) -> ApiResult<()>;
}
