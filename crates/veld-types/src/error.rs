//! Runtime fault types.

use crate::value::Value;
use thiserror::Error;

/// A raised runtime fault.
#[derive(Debug, Clone, Error)]
pub enum Fault {
    /// A language-level value was thrown and not yet caught.
    #[error("uncaught exception: {0}")]
    Thrown(Value),

    /// An operation that is invalid by construction, such as formatting
    /// with the template sentinel.
    #[error("illegal operation: {0}")]
    IllegalOperation(String),
}

impl Fault {
    /// The thrown value, if this fault carries one.
    pub fn thrown_value(&self) -> Option<&Value> {
        match self {
            Self::Thrown(value) => Some(value),
            Self::IllegalOperation(_) => None,
        }
    }
}

/// Result alias for fallible runtime operations.
pub type VResult<T> = Result<T, Fault>;
