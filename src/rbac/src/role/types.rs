//! Role definition

use crate::error::{RbacError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// A named role owning a set of permissions and referencing child roles
///
/// Children are stored by name; their storage belongs to the role graph.
/// A role effectively grants its own permissions plus those of every
/// descendant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    name: String,

    #[serde(default)]
    permissions: HashSet<String>,

    /// Ordered so traversal is deterministic
    #[serde(default)]
    children: BTreeSet<String>,
}

impl Role {
    /// Create a new role without permissions or children
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            permissions: HashSet::new(),
            children: BTreeSet::new(),
        }
    }

    /// Add a permission (builder form)
    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.add_permission(permission);
        self
    }

    /// Add a child role name (builder form)
    pub fn with_child(mut self, child: impl Into<String>) -> Self {
        self.add_child(child);
        self
    }

    /// Role name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a permission; returns false if it was already present
    pub fn add_permission(&mut self, permission: impl Into<String>) -> bool {
        self.permissions.insert(permission.into())
    }

    /// Add a child role name; returns false if it was already present
    pub fn add_child(&mut self, child: impl Into<String>) -> bool {
        self.children.insert(child.into())
    }

    /// Whether this role itself (ignoring children) holds the permission
    pub fn has_own_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    /// Own permissions
    pub fn permissions(&self) -> &HashSet<String> {
        &self.permissions
    }

    /// Child role names
    pub fn children(&self) -> &BTreeSet<String> {
        &self.children
    }

    /// Validate the role definition
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(RbacError::InvalidInput(
                "Role name cannot be empty".to_string(),
            ));
        }

        if self.permissions.iter().any(String::is_empty) {
            return Err(RbacError::InvalidInput(format!(
                "Role '{}' has an empty permission name",
                self.name
            )));
        }

        for child in &self.children {
            if child.is_empty() {
                return Err(RbacError::InvalidInput(format!(
                    "Role '{}' has an empty child role",
                    self.name
                )));
            }
            if child == &self.name {
                return Err(RbacError::CyclicRoleGraph {
                    path: vec![self.name.clone(), self.name.clone()],
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_creation() {
        let role = Role::new("member")
            .with_permission("write")
            .with_child("guest");

        assert_eq!(role.name(), "member");
        assert!(role.has_own_permission("write"));
        assert!(!role.has_own_permission("read"));
        assert!(role.children().contains("guest"));
    }

    #[test]
    fn test_permissions_are_deduplicated() {
        let mut role = Role::new("member");
        assert!(role.add_permission("write"));
        assert!(!role.add_permission("write"));
        assert_eq!(role.permissions().len(), 1);
    }

    #[test]
    fn test_role_validation() {
        assert!(Role::new("member").validate().is_ok());
        assert!(matches!(
            Role::new("").validate(),
            Err(RbacError::InvalidInput(_))
        ));
        assert!(matches!(
            Role::new("member").with_permission("").validate(),
            Err(RbacError::InvalidInput(_))
        ));
        assert!(matches!(
            Role::new("member").with_child("member").validate(),
            Err(RbacError::CyclicRoleGraph { .. })
        ));
    }

    #[test]
    fn test_role_deserialize_defaults() {
        let role: Role = serde_json::from_str(r#"{"name": "guest"}"#).unwrap();
        assert_eq!(role.name(), "guest");
        assert!(role.permissions().is_empty());
        assert!(role.children().is_empty());
    }
}
