//! Core authorization types

use crate::role::Role;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Unique role identifier
pub type RoleName = String;

/// Unique permission identifier
pub type PermissionName = String;

/// A role held by an identity
///
/// Identities may carry plain role names, which are looked up in the role
/// graph, or role values that already contain their permissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityRole {
    /// Role referenced by name
    Name(RoleName),
    /// Role value carried by the identity
    Role(Arc<Role>),
}

impl IdentityRole {
    /// Name of the role, whichever form it takes
    pub fn name(&self) -> &str {
        match self {
            IdentityRole::Name(name) => name,
            IdentityRole::Role(role) => role.name(),
        }
    }
}

impl From<&str> for IdentityRole {
    fn from(name: &str) -> Self {
        IdentityRole::Name(name.to_string())
    }
}

impl From<String> for IdentityRole {
    fn from(name: String) -> Self {
        IdentityRole::Name(name)
    }
}

impl From<Role> for IdentityRole {
    fn from(role: Role) -> Self {
        IdentityRole::Role(Arc::new(role))
    }
}

impl From<Arc<Role>> for IdentityRole {
    fn from(role: Arc<Role>) -> Self {
        IdentityRole::Role(role)
    }
}

/// The caller an authorization service is bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Identity identifier (e.g., "user:alice@example.com")
    pub id: String,

    /// Roles held by the identity
    pub roles: Vec<IdentityRole>,

    /// Additional attributes, available to assertions
    pub attributes: HashMap<String, String>,
}

impl Identity {
    /// Create an identity without roles
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            roles: Vec::new(),
            attributes: HashMap::new(),
        }
    }

    /// Add a role (name or value)
    pub fn with_role(mut self, role: impl Into<IdentityRole>) -> Self {
        self.roles.push(role.into());
        self
    }

    /// Add an attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Default behavior of guard adapters when no explicit rule matches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtectionPolicy {
    /// Unmatched requests are let through
    Allow,
    /// Unmatched requests are refused
    #[default]
    Deny,
}

impl ProtectionPolicy {
    /// Whether a request no rule speaks about should be let through
    pub fn is_allowed_by_default(&self) -> bool {
        matches!(self, ProtectionPolicy::Allow)
    }
}
