//! Core DOM types
//!
//! Opaque handles, native status codes and the bit sets used by the
//! HTMLayout DOM primitive surface.

use std::fmt;

/// Opaque reference to a DOM node owned by the engine.
///
/// Zero is the bad-handle sentinel and never refers to a live element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct ElementHandle(usize);

impl ElementHandle {
    /// The bad-handle sentinel
    pub const NULL: Self = Self(0);

    #[inline]
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> usize {
        self.0
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Opaque window identity (HWND).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Hwnd(usize);

impl Hwnd {
    pub const NULL: Self = Self(0);

    #[inline]
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> usize {
        self.0
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Status code returned by every DOM primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum DomResult {
    Ok = 0,
    InvalidHwnd = 1,
    InvalidHandle = 2,
    PassiveHandle = 3,
    InvalidParameter = 4,
    OperationFailed = 5,
    OkNotHandled = -1,
}

impl DomResult {
    /// Decode a raw status; unknown codes are treated as failures.
    pub fn from_raw(code: i32) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::InvalidHwnd,
            2 => Self::InvalidHandle,
            3 => Self::PassiveHandle,
            4 => Self::InvalidParameter,
            -1 => Self::OkNotHandled,
            _ => Self::OperationFailed,
        }
    }

    #[inline]
    pub fn code(self) -> i32 {
        self as i32
    }

    /// `Ok` and `OkNotHandled` both count as success.
    #[inline]
    pub fn is_ok(self) -> bool {
        matches!(self, Self::Ok | Self::OkNotHandled)
    }

    /// Turn a raw status into a `Result`.
    pub fn check(code: i32) -> ApiResult<()> {
        let status = Self::from_raw(code);
        if status.is_ok() { Ok(()) } else { Err(status) }
    }
}

impl fmt::Display for DomResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ok => "HLDOM_OK",
            Self::InvalidHwnd => "HLDOM_INVALID_HWND",
            Self::InvalidHandle => "HLDOM_INVALID_HANDLE",
            Self::PassiveHandle => "HLDOM_PASSIVE_HANDLE",
            Self::InvalidParameter => "HLDOM_INVALID_PARAMETER",
            Self::OperationFailed => "HLDOM_OPERATION_FAILED",
            Self::OkNotHandled => "HLDOM_OK_NOT_HANDLED",
        };
        write!(f, "{} ({})", name, self.code())
    }
}

/// Result of a raw DOM primitive call
pub type ApiResult<T> = Result<T, DomResult>;

/// Declares a `u32` bit-set newtype with the usual set operations.
macro_rules! bit_set {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $( $(#[$cmeta:meta])* const $flag:ident = $value:expr; )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name(u32);

        impl $name {
            pub const NONE: Self = Self(0);
            $( $(#[$cmeta])* pub const $flag: Self = Self($value); )*

            #[inline]
            pub const fn from_bits(bits: u32) -> Self {
                Self(bits)
            }

            #[inline]
            pub const fn bits(self) -> u32 {
                self.0
            }

            /// True if any bit of `other` is set in `self`.
            #[inline]
            pub const fn has(self, other: Self) -> bool {
                (self.0 & other.0) != 0
            }

            /// True if every bit of `other` is set in `self`.
            #[inline]
            pub const fn contains(self, other: Self) -> bool {
                (self.0 & other.0) == other.0
            }

            #[inline]
            pub const fn union(self, other: Self) -> Self {
                Self(self.0 | other.0)
            }

            #[inline]
            pub const fn without(self, other: Self) -> Self {
                Self(self.0 & !other.0)
            }

            #[inline]
            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }
        }

        impl std::ops::BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self::Output {
                self.union(rhs)
            }
        }

        impl std::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }

        impl std::ops::BitAnd for $name {
            type Output = Self;

            fn bitand(self, rhs: Self) -> Self::Output {
                Self(self.0 & rhs.0)
            }
        }
    };
}

pub(crate) use bit_set;

bit_set! {
    /// Semantic UI state bits, consumed by CSS state pseudo-classes.
    pub struct ElementState {
        const LINK = 0x0000_0001;
        const HOVER = 0x0000_0002;
        const ACTIVE = 0x0000_0004;
        const FOCUS = 0x0000_0008;
        const VISITED = 0x0000_0010;
        const CURRENT = 0x0000_0020;
        const CHECKED = 0x0000_0040;
        const DISABLED = 0x0000_0080;
        const READONLY = 0x0000_0100;
        const EXPANDED = 0x0000_0200;
        const COLLAPSED = 0x0000_0400;
        const INCOMPLETE = 0x0000_0800;
        const ANIMATING = 0x0000_1000;
        const FOCUSABLE = 0x0000_2000;
        const ANCHOR = 0x0000_4000;
        const SYNTHETIC = 0x0000_8000;
        const OWNS_POPUP = 0x0001_0000;
        const TABFOCUS = 0x0002_0000;
        const EMPTY = 0x0004_0000;
        const BUSY = 0x0008_0000;
        const DRAG_OVER = 0x0010_0000;
        const DROP_TARGET = 0x0020_0000;
        const MOVING = 0x0040_0000;
        const COPYING = 0x0080_0000;
        const DRAG_SOURCE = 0x0100_0000;
        const DROP_MARKER = 0x0200_0000;
        const PRESSED = 0x0400_0000;
        const POPUP = 0x0800_0000;
        const IS_LTR = 0x1000_0000;
        const IS_RTL = 0x2000_0000;
    }
}

bit_set! {
    /// Scope of an update request.
    pub struct UpdateFlags {
        const MEASURE_INPLACE = 0x0001;
        const MEASURE_DEEP = 0x0002;
        const RESET_STYLE_DEEP = 0x0010;
        const RESET_STYLE_THIS = 0x0020;
        const REDRAW_NOW = 0x8000;
    }
}

impl UpdateFlags {
    /// Build the flag set from the individual update switches.
    pub fn from_switches(
        restyle: bool,
        restyle_deep: bool,
        remeasure: bool,
        remeasure_deep: bool,
        render: bool,
    ) -> Self {
        let mut flags = Self::NONE;
        if restyle {
            flags |= Self::RESET_STYLE_THIS;
        }
        if restyle_deep {
            flags |= Self::RESET_STYLE_DEEP;
        }
        if remeasure {
            flags |= Self::MEASURE_INPLACE;
        }
        if remeasure_deep {
            flags |= Self::MEASURE_DEEP;
        }
        if render {
            flags |= Self::REDRAW_NOW;
        }
        flags
    }
}

/// CSS box an element location refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoxKind {
    Content,
    Padding,
    Border,
    Margin,
}

/// Coordinate origin for an element location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelativeTo {
    /// Relative to the document root
    Root,
    /// Relative to the element's own origin
    Element,
    /// Relative to the containing block
    Container,
    /// Relative to the view (window client area)
    View,
}

/// Box kind plus coordinate origin, encoded as the native `ELEMENT_AREAS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementAreas {
    pub kind: BoxKind,
    pub relative_to: RelativeTo,
}

impl ElementAreas {
    pub const fn new(kind: BoxKind, relative_to: RelativeTo) -> Self {
        Self { kind, relative_to }
    }

    pub const fn bits(self) -> u32 {
        let kind = match self.kind {
            BoxKind::Content => 0x00,
            BoxKind::Padding => 0x10,
            BoxKind::Border => 0x20,
            BoxKind::Margin => 0x30,
        };
        let rel = match self.relative_to {
            RelativeTo::Root => 0x01,
            RelativeTo::Element => 0x02,
            RelativeTo::Container => 0x03,
            RelativeTo::View => 0x04,
        };
        kind | rel
    }
}

/// Four-sided rectangle, right/bottom exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    pub const fn width(&self) -> i32 {
        self.right - self.left
    }

    pub const fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub const fn size(&self) -> Size {
        Size { width: self.width(), height: self.height() }
    }

    pub const fn contains(&self, pt: Point) -> bool {
        pt.x >= self.left && pt.x < self.right && pt.y >= self.top && pt.y < self.bottom
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

/// Where `set_element_html` puts the new markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SetHtmlMode {
    ReplaceContent = 0,
    InsertAtStart = 1,
    AppendAfterLast = 2,
}

/// Kind of resource requested through a load-data notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ResourceType {
    Html = 0,
    Image = 1,
    Style = 2,
    Cursor = 3,
    Script = 4,
}

impl ResourceType {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::Image,
            2 => Self::Style,
            3 => Self::Cursor,
            4 => Self::Script,
            _ => Self::Html,
        }
    }

    /// Guess the resource type from a file extension.
    ///
    /// Fonts and unknown extensions fall back to `Html`.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "css" => Self::Style,
            "js" => Self::Script,
            "png" | "jpg" | "jpeg" | "gif" | "bmp" | "ico" | "svg" | "webp" => Self::Image,
            "cur" => Self::Cursor,
            _ => Self::Html,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_handle() {
        assert!(ElementHandle::NULL.is_null());
        assert!(!ElementHandle::from_raw(7).is_null());
        assert_eq!(ElementHandle::default(), ElementHandle::NULL);
    }

    #[test]
    fn test_dom_result_decoding() {
        assert_eq!(DomResult::from_raw(0), DomResult::Ok);
        assert_eq!(DomResult::from_raw(-1), DomResult::OkNotHandled);
        assert_eq!(DomResult::from_raw(42), DomResult::OperationFailed);
        assert!(DomResult::check(-1).is_ok());
        assert_eq!(DomResult::check(2), Err(DomResult::InvalidHandle));
    }

    #[test]
    fn test_state_bits() {
        let state = ElementState::CURRENT | ElementState::EXPANDED;
        assert!(state.has(ElementState::CURRENT));
        assert!(!state.has(ElementState::COLLAPSED));
        assert!(state.contains(ElementState::CURRENT | ElementState::EXPANDED));
        assert_eq!(state.without(ElementState::CURRENT), ElementState::EXPANDED);
    }

    #[test]
    fn test_area_bits() {
        let areas = ElementAreas::new(BoxKind::Border, RelativeTo::View);
        assert_eq!(areas.bits(), 0x24);
        let areas = ElementAreas::new(BoxKind::Content, RelativeTo::Element);
        assert_eq!(areas.bits(), 0x02);
    }

    #[test]
    fn test_update_switches() {
        let flags = UpdateFlags::from_switches(true, false, true, false, true);
        assert_eq!(
            flags,
            UpdateFlags::RESET_STYLE_THIS | UpdateFlags::MEASURE_INPLACE | UpdateFlags::REDRAW_NOW
        );
    }

    #[test]
    fn test_resource_type_by_extension() {
        assert_eq!(ResourceType::from_extension("CSS"), ResourceType::Style);
        assert_eq!(ResourceType::from_extension("png"), ResourceType::Image);
        assert_eq!(ResourceType::from_extension("ttf"), ResourceType::Html);
    }
}
