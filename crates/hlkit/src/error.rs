//! Runtime error types

use hlkit_behavior::RegistryError;
use hlkit_dom::DomError;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Another router is already installed on this thread
    #[error("a router is already installed on this thread")]
    AlreadyInstalled,

    #[error("no element with id {0:?}")]
    ElementNotFound(String),

    /// The runtime behind a `UiSender` is gone
    #[error("UI queue is closed")]
    QueueClosed,

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Dom(#[from] DomError),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
