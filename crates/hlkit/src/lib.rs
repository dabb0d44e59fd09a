//! # hlkit
//!
//! Element behaviors for HTMLayout-style documents.
//!
//! ```rust,ignore
//! use std::rc::Rc;
//! use hlkit::{Config, HeadlessEngine, Runtime};
//!
//! let engine = Rc::new(HeadlessEngine::new());
//! let runtime = Runtime::new(engine.clone(), Config::from_env())?;
//! let hwnd = engine.create_window();
//! runtime.connect_window(hwnd)?;
//! engine.load_html(hwnd, r#"<div behavior="tabs">...</div>"#)?;
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use hlkit_behavior as behavior;
pub use hlkit_dom as dom;

pub use config::Config;
pub use error::{Result, RuntimeError};
pub use runtime::{Job, Runtime, UiSender};

pub use hlkit_behavior::{EventHandler, Handler, Hyperlink, LightBoxDialog, NotifyHandler, Router, Tabs};
pub use hlkit_dom::{DomApi, Element, ElementHandle, ElementState, HeadlessEngine, Hwnd};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
