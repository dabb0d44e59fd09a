//! Attribute and style values
//!
//! The engine stores attributes and inline styles as strings. Setters accept
//! a small closed set of value kinds and serialize them here.

use std::any::Any;
use std::fmt;

use crate::error::{DomError, Result};

/// Value accepted by attribute and style setters.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Str(String),
    Int(i64),
    Float(f64),
    /// Remove the attribute or style property
    Remove,
}

impl AttrValue {
    /// Serialized form, `None` for `Remove`.
    pub fn serialize(&self) -> Result<Option<String>> {
        match self {
            Self::Str(s) => Ok(Some(s.clone())),
            Self::Int(i) => Ok(Some(i.to_string())),
            Self::Float(f) if f.is_finite() => Ok(Some(f.to_string())),
            Self::Float(f) => Err(DomError::UnsupportedValueType(format!("non-finite float {}", f))),
            Self::Remove => Ok(None),
        }
    }

    /// Convert a dynamically typed value.
    ///
    /// Accepts strings, the primitive integer and float types, `()` and
    /// `Option::<String>::None` as removal. Anything else is rejected.
    pub fn try_from_any(value: &dyn Any) -> Result<Self> {
        macro_rules! ints {
            ($($t:ty),*) => {
                $( if let Some(v) = value.downcast_ref::<$t>() {
                    return i64::try_from(*v)
                        .map(Self::Int)
                        .map_err(|_| DomError::UnsupportedValueType(format!("{} out of range", v)));
                } )*
            };
        }

        if let Some(s) = value.downcast_ref::<String>() {
            return Ok(Self::Str(s.clone()));
        }
        if let Some(s) = value.downcast_ref::<&str>() {
            return Ok(Self::Str((*s).to_string()));
        }
        ints!(i8, i16, i32, i64, u8, u16, u32, u64, isize, usize);
        if let Some(f) = value.downcast_ref::<f64>() {
            return Ok(Self::Float(*f));
        }
        if let Some(f) = value.downcast_ref::<f32>() {
            return Ok(Self::Float(f64::from(*f)));
        }
        if value.is::<()>() || matches!(value.downcast_ref::<Option<String>>(), Some(None)) {
            return Ok(Self::Remove);
        }
        Err(DomError::UnsupportedValueType(format!("{:?}", value.type_id())))
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{}", v),
            Self::Remove => f.write_str("<remove>"),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i32> for AttrValue {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<i64> for AttrValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for AttrValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl<T: Into<AttrValue>> From<Option<T>> for AttrValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Remove, Into::into)
    }
}
