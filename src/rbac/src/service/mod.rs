//! Authorization service
//!
//! Coordinates identity role resolution, the one-time role graph load and
//! the assertion registry to answer "is this permission granted?".

pub mod metrics;

pub use metrics::{MetricsSnapshot, ServiceMetrics};

use crate::assertion::{Assertion, AssertionContext, AssertionEntry, AssertionRegistry};
use crate::error::Result;
use crate::identity::{IdentityProvider, IdentityRoleProvider, IdentityRoleResolver};
use crate::role::{RoleGraph, RoleProvider};
use crate::types::{Identity, IdentityRole};

use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Load state of the service
///
/// `Uninitialized` until the first call with a non-empty set of identity
/// roles, `Loaded` afterwards, and back to `Uninitialized` on
/// [`AuthorizationService::invalidate`] or an identity change.
#[derive(Debug, Clone, Default)]
pub enum LoadState {
    /// Roles not fetched yet
    #[default]
    Uninitialized,
    /// Immutable snapshot of the fetched roles
    Loaded(Arc<RoleGraph>),
}

/// Authorization façade bound to one identity
///
/// # Pipeline
///
/// ```text
/// is_granted → identity roles ─(empty)→ false
///                   ↓
///             load role graph (once)
///                   ↓
///             any role grants? ─(no)→ false
///                   ↓
///             assertion (permission, else global) → decision
/// ```
///
/// Intended to be created per request. The loaded graph is shared as an
/// `Arc` snapshot, the load latch and identity are owned by the instance.
pub struct AuthorizationService {
    /// Source of role definitions
    role_provider: Arc<dyn RoleProvider>,

    /// Extracts roles from the identity
    role_resolver: Arc<dyn IdentityRoleResolver>,

    /// Identity this service decides for
    identity: Option<Identity>,

    /// Dynamic assertions by permission
    assertions: AssertionRegistry,

    /// Load latch
    state: RwLock<LoadState>,

    /// Decision counters
    metrics: Arc<ServiceMetrics>,
}

impl AuthorizationService {
    /// Create a service for `identity` (`None` for anonymous callers)
    pub fn new(role_provider: Arc<dyn RoleProvider>, identity: Option<Identity>) -> Self {
        Self {
            role_provider,
            role_resolver: Arc::new(IdentityRoleProvider),
            identity,
            assertions: AssertionRegistry::new(),
            state: RwLock::new(LoadState::Uninitialized),
            metrics: Arc::new(ServiceMetrics::new()),
        }
    }

    /// Create a service for the identity an identity source currently reports
    pub fn for_identity_provider(
        role_provider: Arc<dyn RoleProvider>,
        identity_provider: &dyn IdentityProvider,
    ) -> Self {
        Self::new(role_provider, identity_provider.identity())
    }

    /// Use a custom identity role resolver
    pub fn with_role_resolver(mut self, resolver: Arc<dyn IdentityRoleResolver>) -> Self {
        self.role_resolver = resolver;
        self
    }

    /// Use the given assertion registry (e.g. one with a factory)
    pub fn with_assertions(mut self, assertions: AssertionRegistry) -> Self {
        self.assertions = assertions;
        self
    }

    /// Share decision counters with other services
    pub fn with_metrics(mut self, metrics: Arc<ServiceMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Identity the service is bound to
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Rebind to another identity; the loaded roles are dropped
    pub fn set_identity(&mut self, identity: Option<Identity>) {
        self.identity = identity;
        *self.state.get_mut() = LoadState::Uninitialized;
    }

    /// Roles the bound identity holds
    pub fn identity_roles(&self) -> Vec<IdentityRole> {
        self.role_resolver.identity_roles(self.identity.as_ref())
    }

    /// Assertion registry
    pub fn assertions(&self) -> &AssertionRegistry {
        &self.assertions
    }

    /// Register an assertion (or identifier) for a permission or the global key
    pub fn register_assertion(&self, key: impl Into<String>, entry: AssertionEntry) {
        self.assertions.register(key, entry);
    }

    /// Whether an assertion is registered for the key
    pub fn has_assertion(&self, key: &str) -> bool {
        self.assertions.has(key)
    }

    /// Assertion registered for the key, resolving it if needed
    pub fn get_assertion(&self, key: &str) -> Result<Arc<dyn Assertion>> {
        self.assertions.get(key)
    }

    /// Decision counters
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Whether the role graph has been loaded
    pub async fn is_loaded(&self) -> bool {
        matches!(*self.state.read().await, LoadState::Loaded(_))
    }

    /// Drop the loaded roles; the next decision loads them again
    pub async fn invalidate(&self) {
        let mut state = self.state.write().await;
        if matches!(*state, LoadState::Loaded(_)) {
            info!("Role graph invalidated");
        }
        *state = LoadState::Uninitialized;
    }

    /// Is the permission granted to the bound identity?
    ///
    /// `Ok(false)` is a legitimate deny. Errors are configuration or data
    /// defects (unknown roles, provider failures, broken assertions).
    pub async fn is_granted(
        &self,
        permission: &str,
        context: Option<&serde_json::Value>,
    ) -> Result<bool> {
        self.decide(permission, None, context).await
    }

    /// Like [`is_granted`](Self::is_granted), with `assertion` used in place
    /// of whatever the registry holds for the permission
    pub async fn is_granted_with(
        &self,
        permission: &str,
        assertion: &dyn Assertion,
        context: Option<&serde_json::Value>,
    ) -> Result<bool> {
        self.decide(permission, Some(assertion), context).await
    }

    async fn decide(
        &self,
        permission: &str,
        assertion: Option<&dyn Assertion>,
        context: Option<&serde_json::Value>,
    ) -> Result<bool> {
        match self.evaluate(permission, assertion, context).await {
            Ok(granted) => {
                self.metrics.record_decision(granted);
                debug!(
                    "Decision: {} permission='{}' identity={:?}",
                    if granted { "GRANT" } else { "DENY" },
                    permission,
                    self.identity.as_ref().map(|i| i.id.as_str())
                );
                Ok(granted)
            }
            Err(e) => {
                self.metrics.record_error();
                warn!("Authorization of '{}' failed: {}", permission, e);
                Err(e)
            }
        }
    }

    async fn evaluate(
        &self,
        permission: &str,
        assertion: Option<&dyn Assertion>,
        context: Option<&serde_json::Value>,
    ) -> Result<bool> {
        let roles = self.identity_roles();
        if roles.is_empty() {
            debug!("Identity holds no roles, denying '{}'", permission);
            return Ok(false);
        }

        let graph = self.loaded_graph(&roles).await?;

        if !Self::roles_grant(&graph, &roles, permission)? {
            return Ok(false);
        }

        let registered;
        let assertion = match assertion {
            Some(assertion) => assertion,
            None => match self.assertions.for_permission(permission)? {
                Some(found) => {
                    registered = found;
                    &*registered
                }
                None => return Ok(true),
            },
        };

        let ctx = AssertionContext {
            graph: &graph,
            identity: self.identity.as_ref(),
            identity_roles: &roles,
            permission,
            context,
        };

        let passed = assertion.assert(&ctx);
        if !passed {
            self.metrics.record_veto();
            debug!("Assertion vetoed '{}'", permission);
        }
        Ok(passed)
    }

    /// Every named role and every child of a role value must exist; the
    /// first role granting wins
    fn roles_grant(graph: &RoleGraph, roles: &[IdentityRole], permission: &str) -> Result<bool> {
        for name in Self::names_to_load(roles) {
            graph.get_role(&name)?;
        }

        for role in roles {
            let granted = match role {
                IdentityRole::Name(name) => graph.role_has_permission(name, permission)?,
                IdentityRole::Role(role) => graph.role_grants(role, permission)?,
            };
            if granted {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Graph covering `roles`, fetching what is not loaded yet
    ///
    /// The first call fetches the roles and their descendants. Later calls
    /// reuse the latched graph and only fetch names it does not hold yet,
    /// since the resolver may return other roles on a later call. Both steps
    /// are double-checked under the write lock so concurrent callers share
    /// a single fetch.
    async fn loaded_graph(&self, roles: &[IdentityRole]) -> Result<Arc<RoleGraph>> {
        let names = Self::names_to_load(roles);

        if let LoadState::Loaded(graph) = &*self.state.read().await {
            if Self::covers(graph, &names) {
                return Ok(Arc::clone(graph));
            }
        }

        let mut state = self.state.write().await;
        let current = match &*state {
            LoadState::Loaded(graph) if Self::covers(graph, &names) => {
                return Ok(Arc::clone(graph));
            }
            LoadState::Loaded(graph) => Some(Arc::clone(graph)),
            LoadState::Uninitialized => None,
        };

        let missing: BTreeSet<String> = match &current {
            Some(graph) => names.into_iter().filter(|n| !graph.has_role(n)).collect(),
            None => names,
        };

        // partial lookup: names nobody knows surface as RoleNotFound later
        let fetched = self.role_provider.find_roles(&missing).await?;
        let graph = match current {
            None => {
                info!("Loading roles: {:?}", missing);
                RoleGraph::from_roles(fetched.into_values())?
            }
            Some(graph) => {
                info!("Extending role graph with: {:?}", missing);
                graph.extended(fetched.into_values())?
            }
        };
        let graph = Arc::new(graph);
        self.metrics.record_load();

        info!("Role graph loaded with {} roles", graph.len());
        *state = LoadState::Loaded(Arc::clone(&graph));
        Ok(graph)
    }

    fn covers(graph: &RoleGraph, names: &BTreeSet<String>) -> bool {
        names.iter().all(|name| graph.has_role(name))
    }

    /// Names to fetch: named roles plus the children of role values
    fn names_to_load(roles: &[IdentityRole]) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for role in roles {
            match role {
                IdentityRole::Name(name) => {
                    names.insert(name.clone());
                }
                IdentityRole::Role(role) => {
                    names.extend(role.children().iter().cloned());
                }
            }
        }
        names
    }
}

impl std::fmt::Debug for AuthorizationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationService")
            .field("identity", &self.identity)
            .field("assertions", &self.assertions)
            .field("metrics", &self.metrics.snapshot())
            .finish_non_exhaustive()
    }
}
