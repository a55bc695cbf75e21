//! Error types for the RBAC core
//!
//! A legitimate "no permission" outcome is never an error: it is a `false`
//! decision. Everything here is a configuration or data defect that callers
//! must be able to tell apart from a deny.

use thiserror::Error;

/// RBAC errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RbacError {
    /// A role with the same name is already in the graph
    #[error("Duplicate role: {0}")]
    DuplicateRole(String),

    /// A role name could not be found in the graph
    #[error("Role not found: {0}")]
    RoleNotFound(String),

    /// Adding a child edge would introduce a cycle
    #[error("Cyclic role graph: {}", path.join(" -> "))]
    CyclicRoleGraph {
        /// Offending path, first and last element are the same role
        path: Vec<String>,
    },

    /// A role provider failed or could not resolve a requested role
    #[error("Role provider error: {0}")]
    RoleProvider(String),

    /// An assertion identifier could not be resolved by the factory
    #[error("Assertion not found: {0}")]
    AssertionNotFound(String),

    /// An assertion identifier resolved to something that is not an assertion
    #[error("Assertion is not callable: {0}")]
    AssertionNotCallable(String),

    /// Invalid input (empty names and the like)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for RBAC operations
pub type Result<T> = std::result::Result<T, RbacError>;
