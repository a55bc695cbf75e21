//! Roles module
//!
//! Role definitions, the role graph that answers permission lookups across
//! inherited roles, and the providers that supply role definitions.
//!
//! # Example
//!
//! ```rust
//! use cretoai_rbac::role::{InMemoryRoleProvider, Role, RoleGraph, RoleProvider};
//! use std::collections::BTreeSet;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = InMemoryRoleProvider::with_roles(vec![
//!     Role::new("guest").with_permission("read"),
//!     Role::new("member").with_permission("write").with_child("guest"),
//! ]);
//!
//! let names: BTreeSet<String> = ["member".to_string()].into();
//! let roles = provider.get_roles(&names).await?;
//! let graph = RoleGraph::from_roles(roles.into_values())?;
//!
//! assert!(graph.role_has_permission("member", "read")?);
//! # Ok(())
//! # }
//! ```

pub mod graph;
pub mod provider;
pub mod types;

pub use graph::RoleGraph;
pub use provider::{ChainRoleProvider, InMemoryRoleProvider, RoleProvider};
pub use types::Role;
