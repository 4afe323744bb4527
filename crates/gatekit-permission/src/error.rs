//! Error types for the permission engine.
//!
//! Denials are never errors: [`crate::PermissionManager::is_granted`]
//! returns a plain boolean. The variants below are configuration errors:
//! they signal a wrong or missing setup and propagate to the caller
//! immediately, without retries or internal logging.

use thiserror::Error;

/// Permission engine error types.
#[derive(Debug, Error)]
pub enum PermissionError {
    /// A config-declared operation has no stored permission row and no
    /// config-derived default while listing the permissions of a role.
    #[error("no permission is defined for the operation \"{operation}\" (class: {class:?}, field: {field:?})")]
    PermissionNotFound {
        /// The operation without a definition.
        operation: String,
        /// The class scope of the listing, if any.
        class: Option<String>,
        /// The field scope of the listing, if any.
        field: Option<String>,
    },

    /// Following the master mappings from a type leads back to an already
    /// visited type.
    #[error("the master configuration of \"{0}\" is cyclic")]
    MasterCycle(String),

    /// An identity of a kind without a registered sharing identity config
    /// was passed to the identity grouping.
    #[error("no sharing identity config is registered for the identity kind \"{0}\"")]
    IdentityConfigNotFound(String),
}

/// Result type for permission engine operations.
pub type PermissionResult<T> = Result<T, PermissionError>;
