//! Dynamic assertions
//!
//! An assertion is a predicate that can veto a permission the role graph
//! grants, based on runtime context (the identity, request data, ...). It
//! never turns a deny into a grant.
//!
//! Assertions are registered under a permission name, or under
//! [`GLOBAL_ASSERTION_KEY`] to apply to every permission without its own
//! assertion. A registration holds either a ready assertion or an identifier
//! that an [`AssertionFactory`] turns into one on first use; the result
//! replaces the identifier in the registry.

use crate::error::{RbacError, Result};
use crate::role::RoleGraph;
use crate::types::{Identity, IdentityRole};
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Registry key for the assertion consulted when a permission has none
pub const GLOBAL_ASSERTION_KEY: &str = "__global__";

/// Everything an assertion gets to look at
#[derive(Debug, Clone, Copy)]
pub struct AssertionContext<'a> {
    /// Role graph the decision was made against
    pub graph: &'a RoleGraph,

    /// Identity being authorized, `None` when anonymous
    pub identity: Option<&'a Identity>,

    /// Roles resolved for the identity
    pub identity_roles: &'a [IdentityRole],

    /// Permission being checked
    pub permission: &'a str,

    /// Per-call context passed to `is_granted`
    pub context: Option<&'a serde_json::Value>,
}

/// A dynamic constraint on a granted permission
pub trait Assertion: Send + Sync {
    /// Returns false to veto the grant
    fn assert(&self, ctx: &AssertionContext<'_>) -> bool;
}

impl<F> Assertion for F
where
    F: Fn(&AssertionContext<'_>) -> bool + Send + Sync,
{
    fn assert(&self, ctx: &AssertionContext<'_>) -> bool {
        self(ctx)
    }
}

/// Turns assertion identifiers into assertions
pub trait AssertionFactory: Send + Sync {
    /// Create the assertion registered under `identifier`
    ///
    /// # Errors
    ///
    /// - `AssertionNotFound` if nothing is registered under the identifier
    /// - `AssertionNotCallable` if what is registered is not an assertion
    fn create(&self, identifier: &str) -> Result<Arc<dyn Assertion>>;
}

enum Plugin {
    Shared(Arc<dyn Assertion>),
    Invokable(Arc<dyn Fn() -> Arc<dyn Assertion> + Send + Sync>),
    Service(Arc<dyn Any + Send + Sync>),
}

/// Assertion factory backed by a table of named plugins
///
/// Plugins are shared assertion instances, invokables building a fresh
/// assertion per `create`, or arbitrary services. A service only resolves
/// if it is an `Arc<dyn Assertion>`.
#[derive(Default)]
pub struct AssertionPluginManager {
    plugins: HashMap<String, Plugin>,
}

impl AssertionPluginManager {
    /// Create an empty plugin manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a shared assertion instance
    pub fn register<A: Assertion + 'static>(&mut self, identifier: impl Into<String>, assertion: A) {
        self.plugins
            .insert(identifier.into(), Plugin::Shared(Arc::new(assertion)));
    }

    /// Register a constructor called on every `create`
    pub fn register_invokable<F>(&mut self, identifier: impl Into<String>, constructor: F)
    where
        F: Fn() -> Arc<dyn Assertion> + Send + Sync + 'static,
    {
        self.plugins
            .insert(identifier.into(), Plugin::Invokable(Arc::new(constructor)));
    }

    /// Register an arbitrary service
    pub fn register_service<T: Any + Send + Sync>(&mut self, identifier: impl Into<String>, service: T) {
        self.plugins
            .insert(identifier.into(), Plugin::Service(Arc::new(service)));
    }

    /// Whether something is registered under the identifier
    pub fn has(&self, identifier: &str) -> bool {
        self.plugins.contains_key(identifier)
    }
}

impl AssertionFactory for AssertionPluginManager {
    fn create(&self, identifier: &str) -> Result<Arc<dyn Assertion>> {
        match self.plugins.get(identifier) {
            None => Err(RbacError::AssertionNotFound(identifier.to_string())),
            Some(Plugin::Shared(assertion)) => Ok(Arc::clone(assertion)),
            Some(Plugin::Invokable(constructor)) => Ok(constructor()),
            Some(Plugin::Service(service)) => service
                .downcast_ref::<Arc<dyn Assertion>>()
                .cloned()
                .ok_or_else(|| RbacError::AssertionNotCallable(identifier.to_string())),
        }
    }
}

impl fmt::Debug for AssertionPluginManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut identifiers: Vec<&String> = self.plugins.keys().collect();
        identifiers.sort();
        f.debug_struct("AssertionPluginManager")
            .field("plugins", &identifiers)
            .finish()
    }
}

/// A registered assertion, resolved or not
#[derive(Clone)]
pub enum AssertionEntry {
    /// Identifier still to be resolved through the factory
    Unresolved(String),
    /// Ready to evaluate
    Resolved(Arc<dyn Assertion>),
}

impl AssertionEntry {
    /// Entry resolved later through the factory
    pub fn identifier(identifier: impl Into<String>) -> Self {
        AssertionEntry::Unresolved(identifier.into())
    }

    /// Entry holding an assertion
    pub fn assertion<A: Assertion + 'static>(assertion: A) -> Self {
        AssertionEntry::Resolved(Arc::new(assertion))
    }
}

impl fmt::Debug for AssertionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssertionEntry::Unresolved(id) => f.debug_tuple("Unresolved").field(id).finish(),
            AssertionEntry::Resolved(_) => f.write_str("Resolved(..)"),
        }
    }
}

/// Assertions by permission name
pub struct AssertionRegistry {
    entries: RwLock<HashMap<String, AssertionEntry>>,
    factory: Option<Arc<dyn AssertionFactory>>,
}

impl AssertionRegistry {
    /// Registry without a factory: identifiers will fail to resolve
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            factory: None,
        }
    }

    /// Registry resolving identifiers through `factory`
    pub fn with_factory(factory: Arc<dyn AssertionFactory>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            factory: Some(factory),
        }
    }

    /// Register an entry, replacing any previous one for the key
    ///
    /// Identifiers are stored as-is and only resolved on first `get`.
    pub fn register(&self, key: impl Into<String>, entry: AssertionEntry) {
        let key = key.into();
        debug!("Registering assertion for '{}': {:?}", key, entry);
        self.entries.write().insert(key, entry);
    }

    /// Register a ready assertion
    pub fn register_assertion<A: Assertion + 'static>(&self, key: impl Into<String>, assertion: A) {
        self.register(key, AssertionEntry::assertion(assertion));
    }

    /// Register an identifier for lazy resolution
    pub fn register_identifier(&self, key: impl Into<String>, identifier: impl Into<String>) {
        self.register(key, AssertionEntry::identifier(identifier));
    }

    /// Register identifiers from a permission -> identifier map
    pub fn register_assertion_map<'a>(&self, map: impl IntoIterator<Item = (&'a String, &'a String)>) {
        for (key, identifier) in map {
            self.register_identifier(key.clone(), identifier.clone());
        }
    }

    /// Drop the entry for a key
    pub fn unregister(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    /// Whether an entry exists for the key
    pub fn has(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Assertion registered under the key
    ///
    /// # Errors
    ///
    /// `AssertionNotFound` if nothing is registered or the identifier does
    /// not resolve, `AssertionNotCallable` if it resolves to a non-assertion.
    pub fn get(&self, key: &str) -> Result<Arc<dyn Assertion>> {
        self.find(key)?
            .ok_or_else(|| RbacError::AssertionNotFound(key.to_string()))
    }

    /// Like [`get`](Self::get), but `Ok(None)` when nothing is registered
    pub fn find(&self, key: &str) -> Result<Option<Arc<dyn Assertion>>> {
        let identifier = match self.entries.read().get(key) {
            None => return Ok(None),
            Some(AssertionEntry::Resolved(assertion)) => return Ok(Some(Arc::clone(assertion))),
            Some(AssertionEntry::Unresolved(identifier)) => identifier.clone(),
        };

        let factory = self
            .factory
            .as_ref()
            .ok_or_else(|| RbacError::AssertionNotFound(identifier.clone()))?;
        let assertion = factory.create(&identifier)?;
        debug!("Resolved assertion '{}' for '{}'", identifier, key);

        // re-registered while resolving: the newer entry wins
        let mut entries = self.entries.write();
        let still_pending = matches!(
            entries.get(key),
            Some(AssertionEntry::Unresolved(current)) if current == &identifier
        );
        if still_pending {
            entries.insert(key.to_string(), AssertionEntry::Resolved(Arc::clone(&assertion)));
        }

        Ok(Some(assertion))
    }

    /// Assertion applying to `permission`: its own, else the global one
    pub fn for_permission(&self, permission: &str) -> Result<Option<Arc<dyn Assertion>>> {
        match self.find(permission)? {
            Some(assertion) => Ok(Some(assertion)),
            None => self.find(GLOBAL_ASSERTION_KEY),
        }
    }
}

impl Default for AssertionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AssertionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssertionRegistry")
            .field("entries", &*self.entries.read())
            .field("has_factory", &self.factory.is_some())
            .finish()
    }
}
