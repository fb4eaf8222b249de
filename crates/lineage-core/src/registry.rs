//! Accessor registry.
//!
//! Attributes are declared once per owner. Each declaration installs a
//! getter/setter closure pair bound to the attribute's key and policy in the
//! owner's table, which is created on the first declaration and lives as
//! long as the registry. Calls made through the owner's public table honor
//! the declared [`Visibility`] and [`Accessors`]; the [`AttributeHandle`]
//! returned by
//! [`AttributeRegistry::declare`] is the owner's own capability and can
//! always read and write.

use std::any::type_name;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use lineage_config::AttributeConfig;

use crate::error::{AccessorHalf, AttributeError};
use crate::policy::{DefaultFactory, FactoryError, Policy, PolicyKind};
use crate::resolver::{Resolution, Resolver};
use crate::store::{ContextKey, KEY_SEPARATOR, Value};

/// Errors raised while declaring attributes.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("attribute owner must not be empty")]
    EmptyOwner,

    #[error("attribute name on `{owner}` must not be empty")]
    EmptyName { owner: String },

    #[error("invalid visibility `{0}` (expected public, private, reader or writer)")]
    InvalidVisibility(String),

    #[error("invalid accessors `{0}` (expected both, reader or writer)")]
    InvalidAccessors(String),

    #[error("attribute {field} `{value}` must not contain `.`")]
    ReservedSeparator { field: &'static str, value: String },

    #[error("attribute `{key}` is already declared")]
    Duplicate { key: ContextKey },
}

/// Which generated accessors are callable by code other than the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    #[default]
    Public,
    /// Both reader and writer are private.
    Private,
    /// Only the reader is private.
    ReaderPrivate,
    /// Only the writer is private.
    WriterPrivate,
}

impl Visibility {
    pub fn allows(self, half: AccessorHalf) -> bool {
        match (self, half) {
            (Visibility::Public, _) => true,
            (Visibility::Private, _) => false,
            (Visibility::ReaderPrivate, AccessorHalf::Writer) => true,
            (Visibility::WriterPrivate, AccessorHalf::Reader) => true,
            _ => false,
        }
    }
}

impl FromStr for Visibility {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            "reader" => Ok(Visibility::ReaderPrivate),
            "writer" => Ok(Visibility::WriterPrivate),
            other => Err(ConfigurationError::InvalidVisibility(other.to_string())),
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::ReaderPrivate => "reader",
            Visibility::WriterPrivate => "writer",
        };
        f.write_str(s)
    }
}

/// Which accessors a declaration installs in the owner's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Accessors {
    #[default]
    Both,
    /// Read-only: no writer is installed.
    Reader,
    /// Write-only: no reader is installed.
    Writer,
}

impl Accessors {
    pub fn installs(self, half: AccessorHalf) -> bool {
        !matches!(
            (self, half),
            (Accessors::Reader, AccessorHalf::Writer) | (Accessors::Writer, AccessorHalf::Reader)
        )
    }
}

impl FromStr for Accessors {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "both" => Ok(Accessors::Both),
            "reader" => Ok(Accessors::Reader),
            "writer" => Ok(Accessors::Writer),
            other => Err(ConfigurationError::InvalidAccessors(other.to_string())),
        }
    }
}

impl fmt::Display for Accessors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Accessors::Both => "both",
            Accessors::Reader => "reader",
            Accessors::Writer => "writer",
        };
        f.write_str(s)
    }
}

/// Options for [`AttributeRegistry::declare`].
#[derive(Clone, Default)]
pub struct AttributeOptions {
    policy: Policy,
    visibility: Visibility,
    accessors: Accessors,
    description: Option<String>,
}

impl AttributeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inherit(mut self, inherit: bool) -> Self {
        self.policy = self.policy.inherit(inherit);
        self
    }

    pub fn default_value<T, F>(mut self, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.policy = self.policy.with_default(factory);
        self
    }

    pub fn try_default_value<T, E, F>(mut self, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        E: Into<FactoryError>,
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
    {
        self.policy = self.policy.with_try_default(factory);
        self
    }

    pub fn factory(mut self, factory: DefaultFactory) -> Self {
        self.policy = self.policy.with_factory(factory);
        self
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn accessors(mut self, accessors: Accessors) -> Self {
        self.accessors = accessors;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

type Getter = Arc<dyn Fn() -> Result<Resolution, AttributeError> + Send + Sync>;
type Setter = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Full-access handle to one declared attribute.
#[derive(Clone)]
pub struct AttributeHandle {
    key: ContextKey,
    name: String,
    kind: PolicyKind,
    visibility: Visibility,
    accessors: Accessors,
    description: Option<String>,
    getter: Getter,
    setter: Setter,
}

impl AttributeHandle {
    pub fn key(&self) -> &ContextKey {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy_kind(&self) -> PolicyKind {
        self.kind
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn accessors(&self) -> Accessors {
        self.accessors
    }

    pub fn get(&self) -> Result<Option<Value>, AttributeError> {
        (self.getter)().map(|r| r.value)
    }

    pub fn get_traced(&self) -> Result<Resolution, AttributeError> {
        (self.getter)()
    }

    pub fn set(&self, value: Value) -> Value {
        (self.setter)(value)
    }

    pub fn get_as<T: Clone + Send + Sync + 'static>(&self) -> Result<Option<T>, AttributeError> {
        match self.get()? {
            None => Ok(None),
            Some(value) => value.downcast_ref::<T>().cloned().map(Some).ok_or_else(|| {
                AttributeError::TypeMismatch {
                    key: self.key.clone(),
                    expected: type_name::<T>(),
                }
            }),
        }
    }

    pub fn set_as<T: Send + Sync + 'static>(&self, value: T) {
        self.set(Arc::new(value));
    }
}

impl fmt::Debug for AttributeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeHandle")
            .field("key", &self.key)
            .field("policy", &self.kind)
            .field("visibility", &self.visibility)
            .field("accessors", &self.accessors)
            .finish()
    }
}

/// Summary of one declared attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeInfo {
    pub name: String,
    pub key: ContextKey,
    pub policy: PolicyKind,
    pub visibility: Visibility,
    pub accessors: Accessors,
    pub description: Option<String>,
}

/// The public accessor table of one owner.
pub struct OwnerAccessors {
    owner: String,
    attributes: RwLock<BTreeMap<String, AttributeHandle>>,
}

impl OwnerAccessors {
    fn new(owner: &str) -> Self {
        Self {
            owner: owner.to_string(),
            attributes: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Read `name` through its public reader.
    pub fn get(&self, name: &str) -> Result<Option<Value>, AttributeError> {
        self.accessor(name, AccessorHalf::Reader)?.get()
    }

    pub fn get_as<T: Clone + Send + Sync + 'static>(
        &self,
        name: &str,
    ) -> Result<Option<T>, AttributeError> {
        self.accessor(name, AccessorHalf::Reader)?.get_as()
    }

    /// Write `name` through its public writer.
    pub fn set(&self, name: &str, value: Value) -> Result<Value, AttributeError> {
        Ok(self.accessor(name, AccessorHalf::Writer)?.set(value))
    }

    pub fn set_as<T: Send + Sync + 'static>(&self, name: &str, value: T) -> Result<(), AttributeError> {
        self.accessor(name, AccessorHalf::Writer)?.set_as(value);
        Ok(())
    }

    /// Declared attribute names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    pub fn describe(&self) -> Vec<AttributeInfo> {
        self.read()
            .values()
            .map(|h| AttributeInfo {
                name: h.name.clone(),
                key: h.key.clone(),
                policy: h.kind,
                visibility: h.visibility,
                accessors: h.accessors,
                description: h.description.clone(),
            })
            .collect()
    }

    fn accessor(&self, name: &str, half: AccessorHalf) -> Result<AttributeHandle, AttributeError> {
        let attributes = self.read();
        let handle = attributes.get(name).ok_or_else(|| AttributeError::Unknown {
            owner: self.owner.clone(),
            name: name.to_string(),
        })?;
        if !handle.accessors.installs(half) {
            return Err(AttributeError::NotInstalled {
                key: handle.key.clone(),
                half,
            });
        }
        if !handle.visibility.allows(half) {
            return Err(AttributeError::Private {
                key: handle.key.clone(),
                half,
            });
        }
        Ok(handle.clone())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, AttributeHandle>> {
        self.attributes.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for OwnerAccessors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnerAccessors")
            .field("owner", &self.owner)
            .field("attributes", &self.names())
            .finish()
    }
}

/// Owner tables keyed by owner identity.
pub struct AttributeRegistry {
    resolver: Resolver,
    owners: RwLock<HashMap<String, Arc<OwnerAccessors>>>,
}

impl AttributeRegistry {
    pub fn new(resolver: Resolver) -> Self {
        Self {
            resolver,
            owners: RwLock::new(HashMap::new()),
        }
    }

    /// A registry resolving against the process-wide native provider.
    pub fn native() -> Self {
        Self::new(Resolver::native())
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Declare attribute `name` on `owner` and install its accessors.
    pub fn declare(
        &self,
        owner: &str,
        name: &str,
        options: AttributeOptions,
    ) -> Result<AttributeHandle, ConfigurationError> {
        if owner.trim().is_empty() {
            return Err(ConfigurationError::EmptyOwner);
        }
        if name.trim().is_empty() {
            return Err(ConfigurationError::EmptyName {
                owner: owner.to_string(),
            });
        }
        for (field, value) in [("owner", owner), ("name", name)] {
            if value.contains(KEY_SEPARATOR) {
                return Err(ConfigurationError::ReservedSeparator {
                    field,
                    value: value.to_string(),
                });
            }
        }

        let key = ContextKey::new(owner, name);
        let AttributeOptions {
            policy,
            visibility,
            accessors,
            description,
        } = options;

        let getter: Getter = {
            let resolver = self.resolver.clone();
            let key = key.clone();
            let policy = policy.clone();
            Arc::new(move || resolver.resolve_traced(&key, &policy))
        };
        let setter: Setter = {
            let resolver = self.resolver.clone();
            let key = key.clone();
            Arc::new(move |value| resolver.assign(&key, value))
        };
        let handle = AttributeHandle {
            key: key.clone(),
            name: name.to_string(),
            kind: policy.kind(),
            visibility,
            accessors,
            description,
            getter,
            setter,
        };

        let table = self.owner_or_create(owner);
        let mut attributes = table.attributes.write().unwrap_or_else(PoisonError::into_inner);
        if attributes.contains_key(name) {
            return Err(ConfigurationError::Duplicate { key });
        }
        attributes.insert(name.to_string(), handle.clone());
        debug!(%key, policy = %handle.kind, %visibility, %accessors, "Attribute declared");
        Ok(handle)
    }

    /// Declare every attribute listed in configuration. String defaults
    /// become `String` values.
    pub fn declare_from_config(
        &self,
        attributes: &[AttributeConfig],
    ) -> Result<Vec<AttributeHandle>, ConfigurationError> {
        attributes
            .iter()
            .map(|attr| {
                let mut options = AttributeOptions::new()
                    .inherit(attr.inherit)
                    .visibility(attr.visibility.parse()?)
                    .accessors(attr.accessors.parse()?);
                if let Some(default) = attr.default.clone() {
                    options = options.default_value(move || default.clone());
                }
                if !attr.description.is_empty() {
                    options = options.description(attr.description.clone());
                }
                self.declare(&attr.owner, &attr.name, options)
            })
            .collect()
    }

    /// The public accessor table of `owner`, if anything was declared on it.
    pub fn owner(&self, owner: &str) -> Option<Arc<OwnerAccessors>> {
        self.owners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(owner)
            .cloned()
    }

    /// Owners with at least one declaration, sorted.
    pub fn owners(&self) -> Vec<String> {
        let mut owners: Vec<String> = self
            .owners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        owners.sort();
        owners
    }

    fn owner_or_create(&self, owner: &str) -> Arc<OwnerAccessors> {
        let mut owners = self.owners.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            owners
                .entry(owner.to_string())
                .or_insert_with(|| Arc::new(OwnerAccessors::new(owner))),
        )
    }
}

impl fmt::Debug for AttributeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeRegistry")
            .field("owners", &self.owners())
            .finish()
    }
}
