//! Registry error types

use hlkit_dom::{DomError, DomResult};

/// Errors from the handler registry and router.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    /// Detach of an (element, handler) or window pair that is not registered
    #[error("handler is not attached")]
    NotAttached,

    /// The engine refused to start delivering events
    #[error("engine refused attach: {0}")]
    AttachFailed(DomResult),

    /// The engine refused to stop delivering events
    #[error("engine refused detach: {0}")]
    DetachFailed(DomResult),

    /// No router is installed on the calling thread
    #[error("no router installed on this thread")]
    NoRouter,

    #[error(transparent)]
    Dom(#[from] DomError),
}

pub type Result<T> = std::result::Result<T, RegistryError>;
