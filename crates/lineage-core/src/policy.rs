//! Resolution policies: whether reads fall back to ancestors and whether a
//! default is computed when nothing is found.

use std::fmt;
use std::sync::Arc;

use crate::store::Value;

/// Error returned by a failing default factory.
pub type FactoryError = Box<dyn std::error::Error + Send + Sync>;

/// Computes a default value on demand.
pub type DefaultFactory = Arc<dyn Fn() -> Result<Value, FactoryError> + Send + Sync>;

/// The four combinations of the `inherit` and `default` flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    /// Current context only; absence resolves to nothing.
    None,
    /// Current context only; absence computes the default.
    Default,
    /// Full ancestor chain; absence resolves to nothing.
    Inherit,
    /// Full ancestor chain; absence computes the default.
    InheritDefault,
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PolicyKind::None => "none",
            PolicyKind::Default => "default",
            PolicyKind::Inherit => "inherit",
            PolicyKind::InheritDefault => "inherit+default",
        };
        f.write_str(s)
    }
}

/// How absence of a key is resolved for one attribute.
///
/// ```ignore
/// let policy = Policy::new().inherit(true).with_default(|| "en".to_string());
/// assert_eq!(policy.kind(), PolicyKind::InheritDefault);
/// ```
#[derive(Clone, Default)]
pub struct Policy {
    inherit: bool,
    default: Option<DefaultFactory>,
}

impl Policy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk the ancestor chain when the current context has no value.
    pub fn inherit(mut self, inherit: bool) -> Self {
        self.inherit = inherit;
        self
    }

    /// Compute the default with an infallible closure.
    pub fn with_default<T, F>(self, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.with_factory(Arc::new(move || -> Result<Value, FactoryError> {
            Ok(Arc::new(factory()))
        }))
    }

    /// Compute the default with a fallible closure. A failure is returned to
    /// the reader unchanged and is not retried.
    pub fn with_try_default<T, E, F>(self, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        E: Into<FactoryError>,
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
    {
        self.with_factory(Arc::new(move || -> Result<Value, FactoryError> {
            match factory() {
                Ok(value) => Ok(Arc::new(value)),
                Err(err) => Err(err.into()),
            }
        }))
    }

    pub fn with_factory(mut self, factory: DefaultFactory) -> Self {
        self.default = Some(factory);
        self
    }

    pub fn inherits(&self) -> bool {
        self.inherit
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub fn kind(&self) -> PolicyKind {
        match (self.inherit, self.default.is_some()) {
            (false, false) => PolicyKind::None,
            (false, true) => PolicyKind::Default,
            (true, false) => PolicyKind::Inherit,
            (true, true) => PolicyKind::InheritDefault,
        }
    }

    pub(crate) fn factory(&self) -> Option<&DefaultFactory> {
        self.default.as_ref()
    }
}

impl fmt::Debug for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Policy").field("kind", &self.kind()).finish()
    }
}
