//! DOM error types

use crate::types::DomResult;

/// Errors surfaced by the element wrapper.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomError {
    /// The bad-handle sentinel was used where a live element is required
    #[error("invalid element handle")]
    InvalidHandle,

    /// The engine rejected a DOM primitive
    #[error("{op} failed: {code}")]
    OperationFailed { op: &'static str, code: DomResult },

    /// Malformed CSS selector
    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    /// A narrowing selector matched nothing
    #[error("no element matches {0:?}")]
    NoMatch(String),

    /// A unique selector matched more than one element
    #[error("more than one element matches {0:?}")]
    AmbiguousMatch(String),

    /// Attribute or style value of a kind the engine cannot store
    #[error("unsupported value type: {0}")]
    UnsupportedValueType(String),

    /// Attribute present but not convertible to the requested type
    #[error("attribute {name} has invalid value {value:?}")]
    InvalidValue { name: String, value: String },
}

impl DomError {
    /// Wrap a native status for operation `op`.
    pub fn from_status(op: &'static str, code: DomResult) -> Self {
        match code {
            DomResult::InvalidHandle => Self::InvalidHandle,
            code => Self::OperationFailed { op, code },
        }
    }
}

/// Result type for element wrapper operations
pub type Result<T> = std::result::Result<T, DomError>;

/// Attach the operation name to a raw primitive result.
pub(crate) trait ResultExt<T> {
    fn op(self, op: &'static str) -> Result<T>;
}

impl<T> ResultExt<T> for std::result::Result<T, DomResult> {
    #[inline]
    fn op(self, op: &'static str) -> Result<T> {
        self.map_err(|code| DomError::from_status(op, code))
    }
}
