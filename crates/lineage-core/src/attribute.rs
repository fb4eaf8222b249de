//! Typed attribute handles.

use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::AttributeError;
use crate::policy::Policy;
use crate::resolver::{Resolution, Resolver, Source};
use crate::store::{ContextKey, Value};

/// A statically typed view of one attribute on one owner.
///
/// Values are stored type-erased; reading a value stored under the same
/// key with a different type returns [`AttributeError::TypeMismatch`].
pub struct Attribute<T> {
    key: ContextKey,
    policy: Policy,
    resolver: Resolver,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Attribute<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(owner: &str, name: &str, policy: Policy, resolver: Resolver) -> Self {
        Self {
            key: ContextKey::new(owner, name),
            policy,
            resolver,
            _marker: PhantomData,
        }
    }

    /// An attribute resolved against the process-wide native provider.
    pub fn native(owner: &str, name: &str, policy: Policy) -> Self {
        Self::new(owner, name, policy, Resolver::native())
    }

    pub fn key(&self) -> &ContextKey {
        &self.key
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Effective value for the current context.
    pub fn try_get(&self) -> Result<Option<T>, AttributeError> {
        self.resolver
            .resolve(&self.key, &self.policy)?
            .map(|value| self.downcast(&value))
            .transpose()
    }

    /// Effective value for the current context.
    ///
    /// # Panics
    ///
    /// Panics if the default factory fails or the stored value has another
    /// type. Use [`try_get`](Self::try_get) to handle those cases.
    pub fn get(&self) -> Option<T> {
        match self.try_get() {
            Ok(value) => value,
            Err(err) => panic!("reading `{}`: {err}", self.key),
        }
    }

    /// Store `value` in the current context and return it.
    pub fn set(&self, value: T) -> T {
        self.resolver.assign(&self.key, Arc::new(value.clone()));
        value
    }

    /// Whether a value is stored anywhere this attribute's reads would look.
    pub fn is_set(&self) -> bool {
        self.resolver.is_set(&self.key, &self.policy)
    }

    /// Effective value together with where it was found.
    pub fn resolve_traced(&self) -> Result<(Option<T>, Source), AttributeError> {
        let Resolution { value, source } = self.resolver.resolve_traced(&self.key, &self.policy)?;
        let value = value.map(|v| self.downcast(&v)).transpose()?;
        Ok((value, source))
    }

    fn downcast(&self, value: &Value) -> Result<T, AttributeError> {
        value
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| AttributeError::TypeMismatch {
                key: self.key.clone(),
                expected: type_name::<T>(),
            })
    }
}

impl<T> fmt::Debug for Attribute<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("key", &self.key)
            .field("type", &type_name::<T>())
            .field("policy", &self.policy)
            .finish()
    }
}
