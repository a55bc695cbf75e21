//! RBAC configuration loading and validation
//!
//! ```toml
//! protection_policy = "deny"
//!
//! [assertion_map]
//! edit = "owner_assertion"
//!
//! [role_provider.admin]
//! permissions = ["delete"]
//! children = ["member"]
//!
//! [role_provider.member]
//! permissions = ["write"]
//! ```

use crate::assertion::{AssertionFactory, AssertionRegistry};
use crate::error::{RbacError, Result};
use crate::role::{InMemoryRoleProvider, Role};
use crate::types::ProtectionPolicy;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

/// Complete RBAC configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RbacConfig {
    /// Guard default when no rule matches
    #[serde(default)]
    pub protection_policy: ProtectionPolicy,

    /// Permission (or global key) -> assertion identifier
    #[serde(default)]
    pub assertion_map: HashMap<String, String>,

    /// Roles for the in-memory role provider
    #[serde(default)]
    pub role_provider: BTreeMap<String, RoleSection>,
}

/// One `[role_provider.<name>]` table
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RoleSection {
    /// Permissions the role holds itself
    #[serde(default)]
    pub permissions: Vec<String>,

    /// Names of child roles, each defined in the same file
    #[serde(default)]
    pub children: Vec<String>,
}

impl RbacConfig {
    /// Load and validate a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read RBAC config: {}", path.display()))?;

        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid RBAC config: {}", path.display()))
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| RbacError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check role names and child references
    pub fn validate(&self) -> Result<()> {
        for (name, section) in &self.role_provider {
            if name.is_empty() {
                return Err(RbacError::Config("Role name cannot be empty".to_string()));
            }
            if let Some(child) = section
                .children
                .iter()
                .find(|c| !self.role_provider.contains_key(*c))
            {
                return Err(RbacError::Config(format!(
                    "Role '{}' references undefined child role '{}'",
                    name, child
                )));
            }
        }

        if let Some((key, _)) = self.assertion_map.iter().find(|(_, id)| id.is_empty()) {
            return Err(RbacError::Config(format!(
                "Empty assertion identifier for '{}'",
                key
            )));
        }

        Ok(())
    }

    /// Roles described by the `role_provider` section
    pub fn roles(&self) -> Vec<Role> {
        self.role_provider
            .iter()
            .map(|(name, section)| {
                let role = section
                    .permissions
                    .iter()
                    .fold(Role::new(name.clone()), |role, p| role.with_permission(p.clone()));
                section
                    .children
                    .iter()
                    .fold(role, |role, c| role.with_child(c.clone()))
            })
            .collect()
    }

    /// In-memory role provider holding the configured roles
    pub fn role_provider(&self) -> Result<InMemoryRoleProvider> {
        self.validate()?;
        let roles = self.roles();
        for role in &roles {
            role.validate()?;
        }
        Ok(InMemoryRoleProvider::with_roles(roles))
    }

    /// Assertion registry pre-filled from `assertion_map`
    pub fn assertion_registry(&self, factory: Option<Arc<dyn AssertionFactory>>) -> AssertionRegistry {
        let registry = match factory {
            Some(factory) => AssertionRegistry::with_factory(factory),
            None => AssertionRegistry::new(),
        };
        registry.register_assertion_map(&self.assertion_map);
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::RoleProvider;
    use std::collections::BTreeSet;
    use std::io::Write;

    const SAMPLE: &str = r#"
protection_policy = "allow"

[assertion_map]
edit = "owner_assertion"

[role_provider.admin]
permissions = ["delete"]
children = ["member"]

[role_provider.member]
permissions = ["write"]
children = ["guest"]

[role_provider.guest]
permissions = ["read"]
"#;

    #[test]
    fn test_parse_sample() {
        let config = RbacConfig::from_toml_str(SAMPLE).unwrap();

        assert_eq!(config.protection_policy, ProtectionPolicy::Allow);
        assert_eq!(config.assertion_map.get("edit").map(String::as_str), Some("owner_assertion"));
        assert_eq!(config.role_provider.len(), 3);
        assert_eq!(config.role_provider["admin"].children, vec!["member"]);
    }

    #[test]
    fn test_empty_config_defaults() {
        let config = RbacConfig::from_toml_str("").unwrap();
        assert_eq!(config, RbacConfig::default());
        assert_eq!(config.protection_policy, ProtectionPolicy::Deny);
    }

    #[test]
    fn test_undefined_child_rejected() {
        let result = RbacConfig::from_toml_str(
            r#"
[role_provider.admin]
children = ["ghost"]
"#,
        );
        match result {
            Err(RbacError::Config(msg)) => assert!(msg.contains("ghost")),
            other => panic!("Expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_policy_rejected() {
        let result = RbacConfig::from_toml_str(r#"protection_policy = "maybe""#);
        assert!(matches!(result, Err(RbacError::Config(_))));
    }

    #[tokio::test]
    async fn test_role_provider_from_config() {
        let config = RbacConfig::from_toml_str(SAMPLE).unwrap();
        let provider = config.role_provider().unwrap();

        let names: BTreeSet<String> = ["admin".to_string()].into();
        let roles = provider.get_roles(&names).await.unwrap();
        assert_eq!(roles.len(), 3);
        assert!(roles["member"].has_own_permission("write"));
    }

    #[test]
    fn test_assertion_registry_from_config() {
        let config = RbacConfig::from_toml_str(SAMPLE).unwrap();
        let registry = config.assertion_registry(None);
        assert!(registry.has("edit"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = RbacConfig::load(file.path()).unwrap();
        assert_eq!(config.role_provider.len(), 3);

        let missing = RbacConfig::load("/nonexistent/rbac.toml");
        assert!(missing.is_err());
    }
}
