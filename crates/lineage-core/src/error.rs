//! Errors raised while reading or writing attributes.
//!
//! Absence is never an error: it resolves to `Ok(None)` or to a computed
//! default.

use std::fmt;

use crate::policy::FactoryError;
use crate::store::ContextKey;

/// Which generated accessor of an attribute is being called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessorHalf {
    Reader,
    Writer,
}

impl fmt::Display for AccessorHalf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessorHalf::Reader => f.write_str("reader"),
            AccessorHalf::Writer => f.write_str("writer"),
        }
    }
}

/// Errors from attribute reads and writes.
#[derive(Debug, thiserror::Error)]
pub enum AttributeError {
    #[error("default factory for `{key}` failed")]
    DefaultFactory {
        key: ContextKey,
        #[source]
        source: FactoryError,
    },

    #[error("value stored under `{key}` is not a `{expected}`")]
    TypeMismatch {
        key: ContextKey,
        expected: &'static str,
    },

    #[error("the {half} of `{key}` is private")]
    Private { key: ContextKey, half: AccessorHalf },

    #[error("`{key}` was declared without a {half}")]
    NotInstalled { key: ContextKey, half: AccessorHalf },

    #[error("no attribute `{name}` declared on `{owner}`")]
    Unknown { owner: String, name: String },
}
