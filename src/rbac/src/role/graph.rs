//! Role graph: an arena of roles addressed by name
//!
//! Child edges are stored as names on each [`Role`]. The graph keeps them
//! acyclic:
//! 1. `add_role` only accepts children that are already in the graph, so a
//!    fresh node can never close a cycle
//! 2. `add_child` runs a DFS from the child looking for the parent and
//!    rejects the edge with the full cycle path if it finds one
//!
//! Effective permission sets (own permissions plus every descendant's) are
//! memoized per role and dropped on any mutation.

use super::types::Role;
use crate::error::{RbacError, Result};
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Directed acyclic graph of roles
///
/// # Example
///
/// ```rust
/// use cretoai_rbac::role::{Role, RoleGraph};
///
/// # fn example() -> cretoai_rbac::Result<()> {
/// let mut graph = RoleGraph::new();
/// graph.add_role(Role::new("guest").with_permission("read"))?;
/// graph.add_role(Role::new("member").with_permission("write").with_child("guest"))?;
///
/// assert!(graph.role_has_permission("member", "read")?);
/// assert!(!graph.role_has_permission("guest", "write")?);
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct RoleGraph {
    /// Role nodes by name
    roles: HashMap<String, Role>,

    /// Memoized effective permissions, cleared on mutation
    closures: DashMap<String, Arc<HashSet<String>>>,
}

impl RoleGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from roles given in any order
    ///
    /// Nodes are inserted first and edges second, so a role may name a
    /// child that appears later in the input.
    pub fn from_roles(roles: impl IntoIterator<Item = Role>) -> Result<Self> {
        let mut graph = Self::new();
        let mut edges: Vec<(String, String)> = Vec::new();

        for role in roles {
            role.validate()?;
            let mut node = Role::new(role.name());
            for permission in role.permissions() {
                node.add_permission(permission.clone());
            }
            for child in role.children() {
                edges.push((role.name().to_string(), child.clone()));
            }
            graph.add_role(node)?;
        }

        for (parent, child) in edges {
            graph.add_child(&parent, &child)?;
        }

        Ok(graph)
    }

    /// New graph holding these roles plus the given ones
    ///
    /// Roles whose name is already present are skipped, so a provider
    /// returning known descendants again does not count as a duplicate.
    pub fn extended(&self, roles: impl IntoIterator<Item = Role>) -> Result<Self> {
        let added: Vec<Role> = roles
            .into_iter()
            .filter(|role| !self.roles.contains_key(role.name()))
            .collect();

        Self::from_roles(self.roles.values().cloned().chain(added))
    }

    /// Insert a role
    ///
    /// # Errors
    ///
    /// - `DuplicateRole` if the name is taken
    /// - `RoleNotFound` if a declared child is not in the graph yet
    pub fn add_role(&mut self, role: Role) -> Result<()> {
        role.validate()?;

        if self.roles.contains_key(role.name()) {
            return Err(RbacError::DuplicateRole(role.name().to_string()));
        }

        if let Some(missing) = role.children().iter().find(|c| !self.roles.contains_key(*c)) {
            return Err(RbacError::RoleNotFound(missing.clone()));
        }

        debug!("Adding role '{}' ({} permissions)", role.name(), role.permissions().len());
        self.roles.insert(role.name().to_string(), role);
        self.closures.clear();
        Ok(())
    }

    /// Get a role by name
    pub fn get_role(&self, name: &str) -> Result<&Role> {
        self.roles
            .get(name)
            .ok_or_else(|| RbacError::RoleNotFound(name.to_string()))
    }

    /// Whether a role with this name exists
    pub fn has_role(&self, name: &str) -> bool {
        self.roles.contains_key(name)
    }

    /// Number of roles
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Whether the graph holds no roles
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// All role names, sorted
    pub fn role_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.roles.keys().cloned().collect();
        names.sort();
        names
    }

    /// Grant a permission to an existing role
    pub fn add_permission(&mut self, role: &str, permission: impl Into<String>) -> Result<()> {
        let permission = permission.into();
        if permission.is_empty() {
            return Err(RbacError::InvalidInput(
                "Permission name cannot be empty".to_string(),
            ));
        }

        let node = self
            .roles
            .get_mut(role)
            .ok_or_else(|| RbacError::RoleNotFound(role.to_string()))?;

        if node.add_permission(permission) {
            self.closures.clear();
        }
        Ok(())
    }

    /// Make `child` a child of `parent`
    ///
    /// # Errors
    ///
    /// - `RoleNotFound` if either role is missing
    /// - `CyclicRoleGraph` if `parent` is reachable from `child`
    pub fn add_child(&mut self, parent: &str, child: &str) -> Result<()> {
        if !self.roles.contains_key(child) {
            return Err(RbacError::RoleNotFound(child.to_string()));
        }
        if !self.roles.contains_key(parent) {
            return Err(RbacError::RoleNotFound(parent.to_string()));
        }

        if let Some(path) = self.find_path(child, parent) {
            let mut cycle = Vec::with_capacity(path.len() + 1);
            cycle.push(parent.to_string());
            cycle.extend(path);
            return Err(RbacError::CyclicRoleGraph { path: cycle });
        }

        if let Some(node) = self.roles.get_mut(parent) {
            if node.add_child(child) {
                self.closures.clear();
            }
        }
        Ok(())
    }

    /// Does the named role, or any of its descendants, hold the permission?
    pub fn role_has_permission(&self, role: &str, permission: &str) -> Result<bool> {
        Ok(self.effective_permissions(role)?.contains(permission))
    }

    /// Same question for a role value that may not live in this graph
    ///
    /// Every child must be in this graph, whatever the permission. The
    /// role's own permissions are checked first, then each child by name.
    pub fn role_grants(&self, role: &Role, permission: &str) -> Result<bool> {
        for child in role.children() {
            self.get_role(child)?;
        }

        if role.has_own_permission(permission) {
            return Ok(true);
        }

        for child in role.children() {
            if self.role_has_permission(child, permission)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Own permissions of a role plus those of all its descendants
    pub fn effective_permissions(&self, role: &str) -> Result<Arc<HashSet<String>>> {
        if let Some(cached) = self.closures.get(role) {
            return Ok(Arc::clone(cached.value()));
        }

        let mut permissions = HashSet::new();
        for name in self.walk(role)? {
            // walk only yields names present in the graph
            if let Some(node) = self.roles.get(&name) {
                permissions.extend(node.permissions().iter().cloned());
            }
        }

        let permissions = Arc::new(permissions);
        self.closures.insert(role.to_string(), Arc::clone(&permissions));
        Ok(permissions)
    }

    /// Names of every role below `role`, depth-first, without duplicates
    pub fn descendants(&self, role: &str) -> Result<Vec<String>> {
        let mut names = self.walk(role)?;
        names.remove(0);
        Ok(names)
    }

    /// Depth-first walk starting at (and including) `role`
    ///
    /// The visited set keeps the walk finite even if an edge slipped past
    /// the cycle check.
    fn walk(&self, role: &str) -> Result<Vec<String>> {
        self.get_role(role)?;

        let mut visited: HashSet<&str> = HashSet::new();
        let mut order = Vec::new();
        let mut stack: Vec<&str> = vec![role];

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let node = self.get_role(current)?;
            order.push(current.to_string());

            // reversed so children are visited in their sorted order
            for child in node.children().iter().rev() {
                if !visited.contains(child.as_str()) {
                    stack.push(child);
                }
            }
        }

        Ok(order)
    }

    /// Path from `from` to `to` following child edges, both ends included
    fn find_path(&self, from: &str, to: &str) -> Option<Vec<String>> {
        let mut visited = HashSet::new();
        let mut path = Vec::new();
        if self.dfs_path(from, to, &mut visited, &mut path) {
            Some(path)
        } else {
            None
        }
    }

    fn dfs_path<'a>(
        &'a self,
        node: &'a str,
        target: &str,
        visited: &mut HashSet<&'a str>,
        path: &mut Vec<String>,
    ) -> bool {
        if !visited.insert(node) {
            return false;
        }

        path.push(node.to_string());
        if node == target {
            return true;
        }

        if let Some(role) = self.roles.get(node) {
            for child in role.children() {
                if self.dfs_path(child, target, visited, path) {
                    return true;
                }
            }
        }

        path.pop();
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// admin -> member -> guest, each parent inheriting its children
    fn hierarchy() -> RoleGraph {
        let mut graph = RoleGraph::new();
        graph.add_role(Role::new("guest").with_permission("read")).unwrap();
        graph
            .add_role(Role::new("member").with_permission("write").with_child("guest"))
            .unwrap();
        graph
            .add_role(Role::new("admin").with_permission("delete").with_child("member"))
            .unwrap();
        graph
    }

    #[test]
    fn test_empty_graph() {
        let graph = RoleGraph::new();
        assert!(graph.is_empty());
        assert!(matches!(
            graph.role_has_permission("guest", "read"),
            Err(RbacError::RoleNotFound(name)) if name == "guest"
        ));
    }

    #[test]
    fn test_own_permission() {
        let graph = hierarchy();
        assert!(graph.role_has_permission("guest", "read").unwrap());
        assert!(!graph.role_has_permission("guest", "write").unwrap());
        assert!(!graph.role_has_permission("guest", "delete").unwrap());
    }

    #[test]
    fn test_inherited_permissions() {
        let graph = hierarchy();
        assert!(graph.role_has_permission("member", "read").unwrap());
        assert!(graph.role_has_permission("member", "write").unwrap());
        assert!(!graph.role_has_permission("member", "delete").unwrap());

        assert!(graph.role_has_permission("admin", "read").unwrap());
        assert!(graph.role_has_permission("admin", "write").unwrap());
        assert!(graph.role_has_permission("admin", "delete").unwrap());
    }

    #[test]
    fn test_duplicate_role() {
        let mut graph = hierarchy();
        let result = graph.add_role(Role::new("guest"));
        assert_eq!(result, Err(RbacError::DuplicateRole("guest".to_string())));
    }

    #[test]
    fn test_add_role_with_unknown_child() {
        let mut graph = RoleGraph::new();
        let result = graph.add_role(Role::new("member").with_child("guest"));
        assert_eq!(result, Err(RbacError::RoleNotFound("guest".to_string())));
        assert!(!graph.has_role("member"));
    }

    #[test]
    fn test_add_permission_is_visible_immediately() {
        let mut graph = hierarchy();
        assert!(!graph.role_has_permission("admin", "audit").unwrap());

        graph.add_permission("guest", "audit").unwrap();
        assert!(graph.role_has_permission("guest", "audit").unwrap());
        assert!(graph.role_has_permission("admin", "audit").unwrap());
    }

    #[test]
    fn test_add_permission_unknown_role() {
        let mut graph = RoleGraph::new();
        assert!(matches!(
            graph.add_permission("ghost", "read"),
            Err(RbacError::RoleNotFound(_))
        ));
    }

    #[test]
    fn test_add_child_updates_closure() {
        let mut graph = RoleGraph::new();
        graph.add_role(Role::new("reader").with_permission("read")).unwrap();
        graph.add_role(Role::new("editor").with_permission("edit")).unwrap();

        assert!(!graph.role_has_permission("editor", "read").unwrap());
        graph.add_child("editor", "reader").unwrap();
        assert!(graph.role_has_permission("editor", "read").unwrap());
    }

    #[test]
    fn test_self_cycle_rejected() {
        let mut graph = hierarchy();
        let result = graph.add_child("guest", "guest");
        assert_eq!(
            result,
            Err(RbacError::CyclicRoleGraph {
                path: vec!["guest".to_string(), "guest".to_string()]
            })
        );
    }

    #[test]
    fn test_multi_role_cycle_rejected() {
        let mut graph = hierarchy();
        let result = graph.add_child("guest", "admin");

        match result {
            Err(RbacError::CyclicRoleGraph { path }) => {
                assert_eq!(path, vec!["guest", "admin", "member", "guest"]);
            }
            other => panic!("Expected CyclicRoleGraph error, got {:?}", other),
        }

        // graph left untouched
        assert!(!graph.role_has_permission("guest", "delete").unwrap());
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        // lead -> (manager, developer) -> employee
        let mut graph = RoleGraph::new();
        graph.add_role(Role::new("employee").with_permission("badge")).unwrap();
        graph.add_role(Role::new("manager").with_child("employee")).unwrap();
        graph.add_role(Role::new("developer").with_child("employee")).unwrap();
        graph
            .add_role(Role::new("lead").with_child("manager").with_child("developer"))
            .unwrap();

        assert!(graph.role_has_permission("lead", "badge").unwrap());
        assert_eq!(
            graph.descendants("lead").unwrap(),
            vec!["developer", "employee", "manager"]
        );
    }

    #[test]
    fn test_from_roles_any_order() {
        let graph = RoleGraph::from_roles(vec![
            Role::new("admin").with_permission("delete").with_child("member"),
            Role::new("member").with_permission("write").with_child("guest"),
            Role::new("guest").with_permission("read"),
        ])
        .unwrap();

        assert_eq!(graph.len(), 3);
        assert!(graph.role_has_permission("admin", "read").unwrap());
    }

    #[test]
    fn test_from_roles_rejects_cycle() {
        let result = RoleGraph::from_roles(vec![
            Role::new("a").with_child("b"),
            Role::new("b").with_child("a"),
        ]);
        assert!(matches!(result, Err(RbacError::CyclicRoleGraph { .. })));
    }

    #[test]
    fn test_from_roles_unknown_child() {
        let result = RoleGraph::from_roles(vec![Role::new("a").with_child("missing")]);
        assert_eq!(result.err(), Some(RbacError::RoleNotFound("missing".to_string())));
    }

    #[test]
    fn test_role_grants_external_role() {
        let graph = hierarchy();
        let editor = Role::new("editor").with_permission("edit").with_child("member");

        assert!(graph.role_grants(&editor, "edit").unwrap());
        assert!(graph.role_grants(&editor, "read").unwrap());
        assert!(!graph.role_grants(&editor, "delete").unwrap());

        let orphan = Role::new("orphan").with_permission("edit").with_child("ghost");
        for permission in ["read", "edit"] {
            assert_eq!(
                graph.role_grants(&orphan, permission),
                Err(RbacError::RoleNotFound("ghost".to_string()))
            );
        }
    }

    #[test]
    fn test_extended_adds_new_roles_only() {
        let graph = hierarchy();
        let extended = graph
            .extended(vec![
                Role::new("editor").with_permission("edit").with_child("member"),
                // already present, skipped
                Role::new("guest").with_permission("other"),
            ])
            .unwrap();

        assert_eq!(extended.len(), 4);
        assert!(extended.role_has_permission("editor", "read").unwrap());
        assert!(!extended.role_has_permission("guest", "other").unwrap());
        // the source graph is untouched
        assert!(!graph.has_role("editor"));
    }

    #[test]
    fn test_effective_permissions_cached() {
        let graph = hierarchy();
        let first = graph.effective_permissions("admin").unwrap();
        let second = graph.effective_permissions("admin").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.len(), 3);
    }
}
