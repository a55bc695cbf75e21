//! Role providers: where role definitions come from
//!
//! A provider answers "give me these roles". It returns the requested roles
//! together with all of their descendants, so the authorization service can
//! build its role graph from a single fetch.

use super::types::Role;
use crate::error::{RbacError, Result};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Source of role definitions
#[async_trait]
pub trait RoleProvider: Send + Sync {
    /// Look up the given roles and their descendants
    ///
    /// Names this provider does not know are left out of the result.
    async fn find_roles(&self, names: &BTreeSet<String>) -> Result<HashMap<String, Role>>;

    /// Like [`find_roles`](Self::find_roles), but every requested name must resolve
    async fn get_roles(&self, names: &BTreeSet<String>) -> Result<HashMap<String, Role>> {
        let roles = self.find_roles(names).await?;

        let missing: Vec<&str> = names
            .iter()
            .filter(|name| !roles.contains_key(*name))
            .map(String::as_str)
            .collect();

        if !missing.is_empty() {
            return Err(RbacError::RoleProvider(format!(
                "Unknown roles: {}",
                missing.join(", ")
            )));
        }

        Ok(roles)
    }
}

/// Provider backed by an in-memory role table
pub struct InMemoryRoleProvider {
    roles: Arc<RwLock<HashMap<String, Role>>>,
}

impl InMemoryRoleProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self {
            roles: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a provider holding the given roles
    ///
    /// Later roles with an already seen name replace earlier ones.
    pub fn with_roles(roles: impl IntoIterator<Item = Role>) -> Self {
        let roles = roles
            .into_iter()
            .map(|role| (role.name().to_string(), role))
            .collect();

        Self {
            roles: Arc::new(RwLock::new(roles)),
        }
    }

    /// Store or replace a role
    pub async fn put(&self, role: Role) -> Result<()> {
        role.validate()?;
        let mut roles = self.roles.write().await;
        roles.insert(role.name().to_string(), role);
        Ok(())
    }

    /// Remove a role
    pub async fn delete(&self, name: &str) -> Result<()> {
        let mut roles = self.roles.write().await;
        roles.remove(name);
        Ok(())
    }

    /// Number of stored roles
    pub async fn len(&self) -> usize {
        self.roles.read().await.len()
    }

    /// Whether no roles are stored
    pub async fn is_empty(&self) -> bool {
        self.roles.read().await.is_empty()
    }
}

impl Default for InMemoryRoleProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoleProvider for InMemoryRoleProvider {
    async fn find_roles(&self, names: &BTreeSet<String>) -> Result<HashMap<String, Role>> {
        let roles = self.roles.read().await;
        let mut found: HashMap<String, Role> = HashMap::new();
        let mut pending: Vec<&str> = names.iter().map(String::as_str).collect();

        while let Some(name) = pending.pop() {
            if found.contains_key(name) {
                continue;
            }
            let Some(role) = roles.get(name) else {
                continue;
            };
            pending.extend(role.children().iter().map(String::as_str));
            found.insert(name.to_string(), role.clone());
        }

        Ok(found)
    }
}

/// Provider merging several providers into one
///
/// Every provider is asked about every name that turns up, requested or
/// reached as a descendant, until nothing new appears. A name returned by
/// more than one provider is an error, even if the definitions are equal:
/// there is no precedence between sources.
pub struct ChainRoleProvider {
    providers: Vec<Arc<dyn RoleProvider>>,
}

impl ChainRoleProvider {
    /// Create a chain from the given providers
    pub fn new(providers: Vec<Arc<dyn RoleProvider>>) -> Self {
        Self { providers }
    }

    /// Append a provider
    pub fn push(&mut self, provider: Arc<dyn RoleProvider>) {
        self.providers.push(provider);
    }

    /// Number of chained providers
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the chain is empty
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[async_trait]
impl RoleProvider for ChainRoleProvider {
    async fn find_roles(&self, names: &BTreeSet<String>) -> Result<HashMap<String, Role>> {
        // role name -> (provider index, definition)
        let mut found: HashMap<String, (usize, Role)> = HashMap::new();
        let mut asked: HashSet<String> = HashSet::new();
        let mut wanted: BTreeSet<String> = names.clone();

        while !wanted.is_empty() {
            asked.extend(wanted.iter().cloned());

            for (index, provider) in self.providers.iter().enumerate() {
                let roles = provider.find_roles(&wanted).await.map_err(|e| {
                    warn!("Role provider #{} failed: {}", index, e);
                    e
                })?;

                for (name, role) in roles {
                    match found.get(&name) {
                        Some((origin, _)) if *origin == index => {}
                        Some((origin, _)) => {
                            return Err(RbacError::RoleProvider(format!(
                                "Role '{}' is defined by more than one provider (#{} and #{})",
                                name, origin, index
                            )));
                        }
                        None => {
                            found.insert(name, (index, role));
                        }
                    }
                }
            }

            // descendants one provider returned on its own are put to the others too
            wanted = found
                .iter()
                .flat_map(|(name, (_, role))| std::iter::once(name).chain(role.children().iter()))
                .filter(|name| !asked.contains(*name))
                .cloned()
                .collect();

            if !wanted.is_empty() {
                debug!("Chained providers: asking for {} more roles", wanted.len());
            }
        }

        Ok(found
            .into_iter()
            .map(|(name, (_, role))| (name, role))
            .collect())
    }
}
