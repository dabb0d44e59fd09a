//! # hlkit-behavior
//!
//! Routes engine callbacks to Rust event handlers.
//!
//! - [`Router`]: the thread-confined dispatch hub behind [`element_proc`]
//!   and [`notify_proc`]
//! - [`EventHandler`] / [`Handler`]: typed handler trait and closure builder
//! - [`HandlerRegistry`]: attachment tags, per-element tables and named
//!   behavior reference counts
//! - [`behaviors`]: the built-in `tabs`, `light-box-dialog` and
//!   `hyperlink` behaviors
//! - [`ffi`]: C-ABI trampolines for a native engine binding

pub mod behaviors;
pub mod error;
pub mod ffi;
pub mod handler;
pub mod notify;
pub mod registry;
pub mod resource;
pub mod router;
pub mod tag;

pub use behaviors::{Hyperlink, LightBoxDialog, Tabs};
pub use error::{RegistryError, Result};
pub use handler::{EventHandler, Handler};
pub use notify::{BehaviorTable, NotifyHandler};
pub use registry::HandlerRegistry;
pub use resource::ResourceLoaders;
pub use router::{Router, element_proc, notify_proc};
pub use tag::{Tag, TagTable};
