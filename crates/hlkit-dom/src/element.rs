//! Element handle wrapper
//!
//! [`Element`] owns one engine reference to a DOM node: acquired on
//! construction, released on drop or on an explicit [`Element::release`].
//! Two wrappers are equal when they refer to the same handle.
//!
//! ```rust,ignore
//! let root = Element::root_of(api.clone(), hwnd)?.ok_or(DomError::InvalidHandle)?;
//! let strip = root.select_first(".strip")?;
//! strip.set_state(ElementState::CURRENT, true)?;
//! ```

use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use crate::api::DomApi;
use crate::error::{DomError, Result, ResultExt};
use crate::event::{BehaviorEvent, BehaviorMethod, MethodParams};
use crate::types::{
    BoxKind, ElementAreas, ElementHandle, ElementState, Hwnd, Point, Rect, RelativeTo, SetHtmlMode,
    Size, UpdateFlags,
};
use crate::value::AttrValue;

/// Reference-counted wrapper around a native element handle.
pub struct Element {
    he: ElementHandle,
    api: Rc<dyn DomApi>,
}

impl Element {
    /// Acquire a reference to `he`.
    ///
    /// Fails with [`DomError::InvalidHandle`] for the bad-handle sentinel.
    pub fn acquire(api: Rc<dyn DomApi>, he: ElementHandle) -> Result<Self> {
        if he.is_null() {
            return Err(DomError::InvalidHandle);
        }
        api.use_element(he).op("use element")?;
        Ok(Self { he, api })
    }

    /// Like [`acquire`](Self::acquire) but maps "no element" to `None`.
    pub fn wrap(api: Rc<dyn DomApi>, he: ElementHandle) -> Option<Self> {
        if he.is_null() {
            return None;
        }
        Self::acquire(api, he).ok()
    }

    /// Take over a reference the engine already counted for the caller.
    fn adopt(api: Rc<dyn DomApi>, he: ElementHandle) -> Option<Self> {
        if he.is_null() { None } else { Some(Self { he, api }) }
    }

    /// Wrap another handle using this element's engine.
    fn sibling(&self, he: ElementHandle) -> Result<Option<Self>> {
        if he.is_null() {
            return Ok(None);
        }
        Self::acquire(self.api.clone(), he).map(Some)
    }

    /// Root element of a window's document.
    pub fn root_of(api: Rc<dyn DomApi>, hwnd: Hwnd) -> Result<Option<Self>> {
        let he = api.root_element(hwnd).op("get root element")?;
        Ok(Self::wrap(api, he))
    }

    /// Element currently holding keyboard focus in a window.
    pub fn focused(api: Rc<dyn DomApi>, hwnd: Hwnd) -> Result<Option<Self>> {
        let he = api.focus_element(hwnd).op("get focus element")?;
        Ok(Self::wrap(api, he))
    }

    /// Deepest element under a point of the window's client area.
    pub fn at_point(api: Rc<dyn DomApi>, hwnd: Hwnd, pt: Point) -> Result<Option<Self>> {
        let he = api.find_element(hwnd, pt).op("find element")?;
        Ok(Self::wrap(api, he))
    }

    /// Element by its document-wide uid, `None` if it no longer exists.
    pub fn by_uid(api: Rc<dyn DomApi>, hwnd: Hwnd, uid: u32) -> Result<Option<Self>> {
        match api.element_by_uid(hwnd, uid) {
            Ok(he) => Ok(Self::wrap(api, he)),
            Err(crate::types::DomResult::InvalidParameter) => Ok(None),
            Err(code) => Err(DomError::from_status("get element by uid", code)),
        }
    }

    /// Create a new detached element.
    pub fn create(api: Rc<dyn DomApi>, tag: &str) -> Result<Self> {
        Self::create_with(api, tag, None)
    }

    /// Create a new detached element with text content.
    pub fn with_text(api: Rc<dyn DomApi>, tag: &str, text: &str) -> Result<Self> {
        Self::create_with(api, tag, Some(text))
    }

    fn create_with(api: Rc<dyn DomApi>, tag: &str, text: Option<&str>) -> Result<Self> {
        let he = api.create_element(tag, text).op("create element")?;
        Self::adopt(api, he).ok_or(DomError::InvalidHandle)
    }

    #[inline]
    pub fn handle(&self) -> ElementHandle {
        self.he
    }

    #[inline]
    pub fn api(&self) -> &Rc<dyn DomApi> {
        &self.api
    }

    /// Release the engine reference now. Safe to call more than once.
    pub fn release(&mut self) {
        if self.he.is_null() {
            return;
        }
        if let Err(code) = self.api.unuse_element(self.he) {
            tracing::debug!("unuse of {:?} failed: {}", self.he, code);
        }
        self.he = ElementHandle::NULL;
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Parent element, `None` for the root or a detached element.
    pub fn parent(&self) -> Result<Option<Self>> {
        let he = self.api.parent_element(self.he).op("get parent element")?;
        self.sibling(he)
    }

    pub fn child_count(&self) -> Result<u32> {
        self.api.children_count(self.he).op("get children count")
    }

    /// Child at `index`, `None` past the end.
    pub fn child(&self, index: u32) -> Result<Option<Self>> {
        if index >= self.child_count()? {
            return Ok(None);
        }
        let he = self.api.nth_child(self.he, index).op("get nth child")?;
        self.sibling(he)
    }

    pub fn children(&self) -> Result<Vec<Self>> {
        let count = self.child_count()?;
        let mut out = Vec::with_capacity(count as usize);
        for i in 0..count {
            let he = self.api.nth_child(self.he, i).op("get nth child")?;
            if let Some(child) = self.sibling(he)? {
                out.push(child);
            }
        }
        Ok(out)
    }

    /// Index of this element among its parent's children.
    pub fn index(&self) -> Result<u32> {
        self.api.element_index(self.he).op("get element index")
    }

    /// Root element of the document this element lives in.
    pub fn root(&self) -> Result<Option<Self>> {
        let hwnd = self.hwnd()?;
        let he = self.api.root_element(hwnd).op("get root element")?;
        self.sibling(he)
    }

    pub fn hwnd(&self) -> Result<Hwnd> {
        self.api.element_hwnd(self.he, false).op("get element hwnd")
    }

    pub fn root_hwnd(&self) -> Result<Hwnd> {
        self.api.element_hwnd(self.he, true).op("get element root hwnd")
    }

    pub fn uid(&self) -> Result<u32> {
        self.api.element_uid(self.he).op("get element uid")
    }

    // ========================================================================
    // Structure
    // ========================================================================

    /// Insert `child` at `index`, moving it if it already has a parent.
    pub fn insert_child(&self, child: &Element, index: u32) -> Result<()> {
        self.api.insert_element(child.he, self.he, index).op("insert element")
    }

    pub fn append_child(&self, child: &Element) -> Result<()> {
        let count = self.child_count()?;
        self.insert_child(child, count)
    }

    /// Remove from the tree, keeping the element alive.
    pub fn detach(&self) -> Result<()> {
        self.api.detach_element(self.he).op("detach element")
    }

    /// Remove from the tree and destroy.
    pub fn delete(mut self) -> Result<()> {
        let result = self.api.delete_element(self.he).op("delete element");
        self.release();
        result
    }

    /// Deep, detached copy.
    pub fn clone_element(&self) -> Result<Self> {
        let he = self.api.clone_element(self.he).op("clone element")?;
        Self::adopt(self.api.clone(), he).ok_or(DomError::InvalidHandle)
    }

    pub fn swap(&self, other: &Element) -> Result<()> {
        self.api.swap_elements(self.he, other.he).op("swap elements")
    }

    /// Sort all children with a three-way comparator.
    pub fn sort_children<F>(&self, cmp: F) -> Result<()>
    where
        F: FnMut(&Element, &Element) -> Ordering,
    {
        let count = self.child_count()?;
        self.sort_children_range(0, count, cmp)
    }

    /// Sort children `start..end`.
    pub fn sort_children_range<F>(&self, start: u32, end: u32, mut cmp: F) -> Result<()>
    where
        F: FnMut(&Element, &Element) -> Ordering,
    {
        let api = self.api.clone();
        let mut compare = |a: ElementHandle, b: ElementHandle| {
            match (Element::wrap(api.clone(), a), Element::wrap(api.clone(), b)) {
                (Some(a), Some(b)) => cmp(&a, &b),
                _ => Ordering::Equal,
            }
        };
        self.api.sort_elements(self.he, start, end, &mut compare).op("sort elements")
    }

    // ========================================================================
    // Content
    // ========================================================================

    /// Tag name.
    pub fn tag(&self) -> Result<String> {
        self.api.element_type(self.he).op("get element type")
    }

    /// Inner markup.
    pub fn html(&self) -> Result<String> {
        self.api.element_html(self.he, false).op("get element html")
    }

    pub fn outer_html(&self) -> Result<String> {
        self.api.element_html(self.he, true).op("get element outer html")
    }

    pub fn set_html(&self, html: &str) -> Result<()> {
        self.api.set_element_html(self.he, html, SetHtmlMode::ReplaceContent).op("set element html")
    }

    pub fn prepend_html(&self, html: &str) -> Result<()> {
        self.api.set_element_html(self.he, html, SetHtmlMode::InsertAtStart).op("prepend element html")
    }

    pub fn append_html(&self, html: &str) -> Result<()> {
        self.api.set_element_html(self.he, html, SetHtmlMode::AppendAfterLast).op("append element html")
    }

    pub fn text(&self) -> Result<String> {
        self.api.element_text(self.he).op("get element text")
    }

    pub fn set_text(&self, text: &str) -> Result<()> {
        self.api.set_element_text(self.he, text).op("set element text")
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    /// Attribute value, `None` when absent.
    pub fn attr(&self, name: &str) -> Result<Option<String>> {
        self.api.attribute_by_name(self.he, name).op("get attribute")
    }

    pub fn attr_as_int(&self, name: &str) -> Result<Option<i64>> {
        match self.attr(name)? {
            None => Ok(None),
            Some(value) => value.trim().parse().map(Some).map_err(|_| DomError::InvalidValue {
                name: name.to_string(),
                value,
            }),
        }
    }

    pub fn attr_as_float(&self, name: &str) -> Result<Option<f64>> {
        match self.attr(name)? {
            None => Ok(None),
            Some(value) => value.trim().parse().map(Some).map_err(|_| DomError::InvalidValue {
                name: name.to_string(),
                value,
            }),
        }
    }

    /// Set (or with [`AttrValue::Remove`] remove) an attribute.
    pub fn set_attr(&self, name: &str, value: impl Into<AttrValue>) -> Result<()> {
        let value = value.into().serialize()?;
        self.api
            .set_attribute_by_name(self.he, name, value.as_deref())
            .op("set attribute")
    }

    /// Set an attribute from a dynamically typed value.
    pub fn set_attr_any(&self, name: &str, value: &dyn Any) -> Result<()> {
        self.set_attr(name, AttrValue::try_from_any(value)?)
    }

    pub fn remove_attr(&self, name: &str) -> Result<()> {
        self.set_attr(name, AttrValue::Remove)
    }

    pub fn attr_count(&self) -> Result<u32> {
        self.api.attribute_count(self.he).op("get attribute count")
    }

    /// Name and value of the attribute at `index`.
    pub fn attr_at(&self, index: u32) -> Result<(String, String)> {
        self.api.nth_attribute(self.he, index).op("get nth attribute")
    }

    pub fn attrs(&self) -> Result<Vec<(String, String)>> {
        (0..self.attr_count()?).map(|i| self.attr_at(i)).collect()
    }

    pub fn has_class(&self, class: &str) -> Result<bool> {
        Ok(self
            .attr("class")?
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class)))
    }

    pub fn add_class(&self, class: &str) -> Result<()> {
        let classes = self.attr("class")?.unwrap_or_default();
        if classes.split_whitespace().any(|c| c == class) {
            return Ok(());
        }
        let joined = if classes.trim().is_empty() {
            class.to_string()
        } else {
            format!("{} {}", classes.trim(), class)
        };
        self.set_attr("class", joined)
    }

    pub fn remove_class(&self, class: &str) -> Result<()> {
        let Some(classes) = self.attr("class")? else {
            return Ok(());
        };
        let kept: Vec<&str> = classes.split_whitespace().filter(|c| *c != class).collect();
        if kept.is_empty() {
            self.remove_attr("class")
        } else {
            self.set_attr("class", kept.join(" "))
        }
    }

    // ========================================================================
    // Styles
    // ========================================================================

    /// Inline style property, `None` when not set.
    pub fn style(&self, name: &str) -> Result<Option<String>> {
        self.api.style_attribute(self.he, name).op("get style attribute")
    }

    pub fn set_style(&self, name: &str, value: impl Into<AttrValue>) -> Result<()> {
        let value = value.into().serialize()?;
        self.api
            .set_style_attribute(self.he, name, value.as_deref())
            .op("set style attribute")
    }

    pub fn remove_style(&self, name: &str) -> Result<()> {
        self.set_style(name, AttrValue::Remove)
    }

    pub fn clear_styles(&self) -> Result<()> {
        self.api.clear_style_attributes(self.he).op("clear style attributes")
    }

    /// Make visible: adds class `show` and drops any inline `display`.
    pub fn show(&self) -> Result<()> {
        self.add_class("show")?;
        self.remove_style("display")?;
        self.update_with(true, false, true, false, true)
    }

    /// Hide: removes class `show` and sets `display: none`.
    pub fn hide(&self) -> Result<()> {
        self.remove_class("show")?;
        self.set_style("display", "none")?;
        self.update_with(true, false, true, false, true)
    }

    // ========================================================================
    // State
    // ========================================================================

    pub fn state_flags(&self) -> Result<ElementState> {
        self.api.element_state(self.he).op("get element state")
    }

    /// Replace the whole state bit set.
    pub fn set_state_flags(&self, flags: ElementState) -> Result<()> {
        let current = self.state_flags()?;
        self.api
            .set_element_state(self.he, flags, current.without(flags), true)
            .op("set element state")
    }

    pub fn state(&self, flag: ElementState) -> Result<bool> {
        Ok(self.state_flags()?.has(flag))
    }

    /// Turn `flag` on or off. Always requests a redraw.
    pub fn set_state(&self, flag: ElementState, on: bool) -> Result<()> {
        let (set, clear) = if on { (flag, ElementState::NONE) } else { (ElementState::NONE, flag) };
        self.api.set_element_state(self.he, set, clear, true).op("set element state")
    }

    pub fn update(&self, flags: UpdateFlags) -> Result<()> {
        self.api.update_element(self.he, flags).op("update element")
    }

    pub fn update_with(
        &self,
        restyle: bool,
        restyle_deep: bool,
        remeasure: bool,
        remeasure_deep: bool,
        render: bool,
    ) -> Result<()> {
        self.update(UpdateFlags::from_switches(restyle, restyle_deep, remeasure, remeasure_deep, render))
    }

    // ========================================================================
    // Geometry
    // ========================================================================

    pub fn location(&self, areas: ElementAreas) -> Result<Rect> {
        self.api.element_location(self.he, areas).op("get element location")
    }

    pub fn content_box(&self) -> Result<Rect> {
        self.location(ElementAreas::new(BoxKind::Content, RelativeTo::Element))
    }

    pub fn content_view_box(&self) -> Result<Rect> {
        self.location(ElementAreas::new(BoxKind::Content, RelativeTo::View))
    }

    pub fn content_box_size(&self) -> Result<Size> {
        Ok(self.content_box()?.size())
    }

    pub fn padding_box(&self) -> Result<Rect> {
        self.location(ElementAreas::new(BoxKind::Padding, RelativeTo::Element))
    }

    pub fn padding_view_box(&self) -> Result<Rect> {
        self.location(ElementAreas::new(BoxKind::Padding, RelativeTo::View))
    }

    pub fn padding_box_size(&self) -> Result<Size> {
        Ok(self.padding_box()?.size())
    }

    pub fn border_box(&self) -> Result<Rect> {
        self.location(ElementAreas::new(BoxKind::Border, RelativeTo::Element))
    }

    pub fn border_view_box(&self) -> Result<Rect> {
        self.location(ElementAreas::new(BoxKind::Border, RelativeTo::View))
    }

    pub fn border_box_size(&self) -> Result<Size> {
        Ok(self.border_box()?.size())
    }

    pub fn margin_box(&self) -> Result<Rect> {
        self.location(ElementAreas::new(BoxKind::Margin, RelativeTo::Element))
    }

    pub fn margin_view_box(&self) -> Result<Rect> {
        self.location(ElementAreas::new(BoxKind::Margin, RelativeTo::View))
    }

    pub fn margin_box_size(&self) -> Result<Size> {
        Ok(self.margin_box()?.size())
    }

    // ========================================================================
    // Selectors
    // ========================================================================

    /// All descendants matching `selector`, in document order.
    pub fn select(&self, selector: &str) -> Result<Vec<Self>> {
        let mut handles = Vec::new();
        self.visit(selector, |he| {
            handles.push(he);
            false
        })?;
        handles.into_iter().filter_map(|he| self.sibling(he).transpose()).collect()
    }

    /// First descendant matching `selector`, if any.
    pub fn find_first(&self, selector: &str) -> Result<Option<Self>> {
        let mut found = ElementHandle::NULL;
        self.visit(selector, |he| {
            found = he;
            true
        })?;
        self.sibling(found)
    }

    /// First match; fails with [`DomError::NoMatch`] when there is none.
    pub fn select_first(&self, selector: &str) -> Result<Self> {
        self.find_first(selector)?
            .ok_or_else(|| DomError::NoMatch(selector.to_string()))
    }

    /// The only match; fails when there is none or more than one.
    pub fn select_unique(&self, selector: &str) -> Result<Self> {
        let mut matches = self.select(selector)?;
        match matches.len() {
            0 => Err(DomError::NoMatch(selector.to_string())),
            1 => Ok(matches.remove(0)),
            _ => Err(DomError::AmbiguousMatch(selector.to_string())),
        }
    }

    /// Unique descendant with the given id.
    pub fn select_id(&self, id: &str) -> Result<Self> {
        self.select_unique(&format!("#{}", id))
    }

    /// Nearest ancestor-or-self matching `selector`.
    pub fn select_parent(&self, selector: &str) -> Result<Option<Self>> {
        self.select_parent_limit(selector, 0)
    }

    /// Like [`select_parent`](Self::select_parent) but at most `depth` levels up.
    pub fn select_parent_limit(&self, selector: &str, depth: u32) -> Result<Option<Self>> {
        let he = self
            .api
            .select_parent(self.he, selector, depth)
            .map_err(|code| selector_error("select parent", selector, code))?;
        self.sibling(he)
    }

    /// Does this element itself match `selector`?
    pub fn test(&self, selector: &str) -> Result<bool> {
        Ok(self.select_parent_limit(selector, 1)?.is_some())
    }

    fn visit(&self, selector: &str, mut f: impl FnMut(ElementHandle) -> bool) -> Result<()> {
        self.api
            .select_elements(self.he, selector, &mut f)
            .map_err(|code| selector_error("select elements", selector, code))
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Deliver a behavior event synchronously; returns the handled flag.
    pub fn send_event(&self, cmd: BehaviorEvent, source: Option<&Element>, reason: usize) -> Result<bool> {
        let source = source.map_or(ElementHandle::NULL, Element::handle);
        self.api.send_event(self.he, cmd, source, reason).op("send event")
    }

    /// Queue a behavior event for asynchronous delivery.
    pub fn post_event(&self, cmd: BehaviorEvent, source: Option<&Element>, reason: usize) -> Result<()> {
        let source = source.map_or(ElementHandle::NULL, Element::handle);
        self.api.post_event(self.he, cmd, source, reason).op("post event")
    }

    /// Invoke a behavior method; `false` when no behavior handled it.
    pub fn call_behavior_method(&self, method: BehaviorMethod) -> Result<bool> {
        let mut params = MethodParams::new(method);
        self.api.call_behavior_method(self.he, &mut params).op("call behavior method")
    }

    pub fn set_timer(&self, millis: u32, timer_id: usize) -> Result<()> {
        self.api.set_timer(self.he, millis, timer_id).op("set timer")
    }

    pub fn cancel_timer(&self, timer_id: usize) -> Result<()> {
        self.api.set_timer(self.he, 0, timer_id).op("cancel timer")
    }

    pub fn capture(&self) -> Result<()> {
        self.api.set_capture(self.he).op("set capture")
    }

    pub fn release_capture(&self) -> Result<()> {
        let hwnd = self.hwnd()?;
        self.api.release_capture(hwnd).op("release capture")
    }

    /// Route document-scoped keyboard input to this element.
    ///
    /// Returns the previous event root, if there was one.
    pub fn set_event_root(&self) -> Result<Option<Self>> {
        let prev = self.api.set_event_root(self.he).op("set event root")?;
        if prev == self.he { Ok(None) } else { self.sibling(prev) }
    }

    /// Restore document-wide keyboard routing.
    pub fn reset_event_root(&self) -> Result<()> {
        self.api.set_event_root(ElementHandle::NULL).op("reset event root").map(|_| ())
    }

    /// `tag#id.class1.class2`
    pub fn describe(&self) -> Result<String> {
        let mut s = self.tag()?;
        if let Some(id) = self.attr("id")? {
            s.push('#');
            s.push_str(&id);
        }
        if let Some(classes) = self.attr("class")? {
            for class in classes.split_whitespace() {
                s.push('.');
                s.push_str(class);
            }
        }
        Ok(s)
    }
}

fn selector_error(op: &'static str, selector: &str, code: crate::types::DomResult) -> DomError {
    match code {
        crate::types::DomResult::InvalidParameter => DomError::InvalidSelector(selector.to_string()),
        code => DomError::from_status(op, code),
    }
}

impl Drop for Element {
    fn drop(&mut self) {
        self.release();
    }
}

impl Clone for Element {
    fn clone(&self) -> Self {
        let mut he = self.he;
        if !he.is_null() {
            if let Err(code) = self.api.use_element(he) {
                tracing::warn!("use of {:?} failed while cloning wrapper: {}", he, code);
                he = ElementHandle::NULL;
            }
        }
        Self { he, api: self.api.clone() }
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.he == other.he
    }
}

impl Eq for Element {}

impl std::hash::Hash for Element {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.he.hash(state);
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Element").field(&self.he.raw()).finish()
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.describe() {
            Ok(s) => f.write_str(&s),
            Err(_) => write!(f, "<element {:#x}>", self.he.raw()),
        }
    }
}
