//! # CretoAI RBAC
//!
//! Role-based authorization core: hierarchical roles, permission lookup
//! across inherited roles, lazy role loading and assertion refinement.
//!
//! ## Features
//!
//! - **Role graph** with name-addressed roles, acyclic child edges and
//!   memoized effective permission sets
//! - **Pluggable role providers** (in-memory, chained) behind an async trait
//! - **One-time lazy loading** of roles per service instance, skipped
//!   entirely for identities without roles
//! - **Dynamic assertions** that can veto a grant, resolved lazily through a
//!   factory and memoized
//!
//! ## Example
//!
//! ```rust
//! use cretoai_rbac::{AuthorizationService, Identity, InMemoryRoleProvider, Role};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = Arc::new(InMemoryRoleProvider::with_roles(vec![
//!         Role::new("guest").with_permission("read"),
//!         Role::new("member").with_permission("write").with_child("guest"),
//!     ]));
//!
//!     let identity = Identity::new("user:alice@example.com").with_role("member");
//!     let service = AuthorizationService::new(provider, Some(identity));
//!
//!     if service.is_granted("read", None).await? {
//!         println!("Access granted!");
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod assertion;
pub mod config;
pub mod error;
pub mod identity;
pub mod role;
pub mod service;
pub mod types;

// Re-export commonly used types
pub use assertion::{
    Assertion, AssertionContext, AssertionEntry, AssertionFactory, AssertionPluginManager,
    AssertionRegistry, GLOBAL_ASSERTION_KEY,
};
pub use config::RbacConfig;
pub use error::{RbacError, Result};
pub use identity::{IdentityProvider, IdentityRoleProvider, IdentityRoleResolver, StaticIdentityProvider};
pub use role::{ChainRoleProvider, InMemoryRoleProvider, Role, RoleGraph, RoleProvider};
pub use service::{AuthorizationService, LoadState, MetricsSnapshot, ServiceMetrics};
pub use types::{Identity, IdentityRole, PermissionName, ProtectionPolicy, RoleName};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
