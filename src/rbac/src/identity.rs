//! Identity sources and identity role resolution

use crate::types::{Identity, IdentityRole};

/// Source of the current identity
///
/// Framework adapters implement this on top of their authentication layer.
/// `None` means the caller is anonymous.
pub trait IdentityProvider: Send + Sync {
    /// Current identity, if any
    fn identity(&self) -> Option<Identity>;
}

/// Identity provider returning a fixed identity
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityProvider {
    identity: Option<Identity>,
}

impl StaticIdentityProvider {
    /// Provider for the given identity
    pub fn new(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
        }
    }

    /// Provider for an anonymous caller
    pub fn anonymous() -> Self {
        Self { identity: None }
    }
}

impl IdentityProvider for StaticIdentityProvider {
    fn identity(&self) -> Option<Identity> {
        self.identity.clone()
    }
}

/// Extracts the roles held by an identity
///
/// Must not fail for an anonymous identity: it simply holds no roles.
pub trait IdentityRoleResolver: Send + Sync {
    /// Roles held by `identity`, possibly empty
    fn identity_roles(&self, identity: Option<&Identity>) -> Vec<IdentityRole>;
}

/// Default resolver: the roles the identity carries
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityRoleProvider;

impl IdentityRoleResolver for IdentityRoleProvider {
    fn identity_roles(&self, identity: Option<&Identity>) -> Vec<IdentityRole> {
        identity.map(|i| i.roles.clone()).unwrap_or_default()
    }
}

impl<F> IdentityRoleResolver for F
where
    F: Fn(Option<&Identity>) -> Vec<IdentityRole> + Send + Sync,
{
    fn identity_roles(&self, identity: Option<&Identity>) -> Vec<IdentityRole> {
        self(identity)
    }
}
