//! # hlkit-dom
//!
//! Element handles, event payloads and the DOM primitive surface.
//!
//! - [`DomApi`]: one method per engine primitive, implemented by the
//!   native binding and by [`headless::HeadlessEngine`]
//! - [`Element`]: reference-counted wrapper with the scripting-style API
//! - [`event`]: event groups, codes and per-kind parameter blocks
//! - [`selector`]: the CSS selector subset understood by the engine

pub mod api;
pub mod element;
pub mod error;
pub mod event;
pub mod headless;
pub mod selector;
pub mod types;
pub mod utf;
pub mod value;

pub use api::{DomApi, ElementComparator, SelectVisitor};
pub use element::Element;
pub use error::{DomError, Result};
pub use event::{
    AttachBehaviorRequest, BehaviorBinding, BehaviorEvent, BehaviorMethod, ClickReason,
    ElementProc, EventGroups, EventParams, KeyModifiers, LoadDataRequest, MethodParams,
    MouseButtons, Notification, NotifyProc, Phase,
};
pub use headless::HeadlessEngine;
pub use types::{ApiResult, DomResult, ElementHandle, ElementState, Hwnd, Point, Rect, Size};
pub use value::AttrValue;
