//! Headless engine
//!
//! A complete in-memory implementation of [`DomApi`](crate::DomApi): an
//! arena document tree fed by html5ever, a CSS selector matcher, and
//! bubbling event delivery to attached element procedures. Used to run
//! behaviors without the native library.

mod engine;
mod tree;

pub use engine::{BEHAVIOR_ATTRIBUTE, HeadlessEngine};
