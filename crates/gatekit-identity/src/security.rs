//! # Security identities
//!
//! A security identity names one facet of a principal: a role, a user id,
//! a group id, or an application-defined custom facet. Permission grants are
//! keyed by these values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of facet a [`SecurityIdentity`] describes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKind {
    /// A role membership (e.g. `ROLE_USER`).
    Role,

    /// A concrete user.
    User,

    /// A group membership.
    Group,

    /// An application-defined identity facet.
    Custom,
}

impl IdentityKind {
    /// Get the string representation of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityKind::Role => "role",
            IdentityKind::User => "user",
            IdentityKind::Group => "group",
            IdentityKind::Custom => "custom",
        }
    }
}

/// An immutable value identifying a principal facet.
///
/// Equality and hashing consider the kind and the identifier, nothing else.
/// Identities are created once per authenticated principal per request and
/// never mutated.
///
/// # Example
///
/// ```
/// use gatekit_identity::{IdentityKind, SecurityIdentity};
///
/// let sid = SecurityIdentity::role("ROLE_ADMIN");
/// assert_eq!(sid.kind(), IdentityKind::Role);
/// assert_eq!(sid.identifier(), "ROLE_ADMIN");
/// assert_eq!(sid.to_string(), "role:ROLE_ADMIN");
/// assert!(sid.is_role());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SecurityIdentity {
    kind: IdentityKind,
    identifier: String,
}

impl SecurityIdentity {
    /// Create an identity of an arbitrary kind.
    pub fn new(kind: IdentityKind, identifier: impl Into<String>) -> Self {
        Self {
            kind,
            identifier: identifier.into(),
        }
    }

    /// Create a role identity.
    pub fn role(identifier: impl Into<String>) -> Self {
        Self::new(IdentityKind::Role, identifier)
    }

    /// Create a user identity.
    pub fn user(identifier: impl Into<String>) -> Self {
        Self::new(IdentityKind::User, identifier)
    }

    /// Create a group identity.
    pub fn group(identifier: impl Into<String>) -> Self {
        Self::new(IdentityKind::Group, identifier)
    }

    /// Create a custom identity.
    pub fn custom(identifier: impl Into<String>) -> Self {
        Self::new(IdentityKind::Custom, identifier)
    }

    /// Get the identity kind.
    pub fn kind(&self) -> IdentityKind {
        self.kind
    }

    /// Get the identifier.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Check whether this is a role identity.
    ///
    /// Only role identities participate in the permission cache key; user,
    /// group and custom identities are resolved through sharing grants.
    pub fn is_role(&self) -> bool {
        self.kind == IdentityKind::Role
    }
}

impl fmt::Display for SecurityIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.identifier)
    }
}

/// Extract the sorted, de-duplicated identifiers of the role identities.
///
/// This is the canonical input for the permission cache key: two identity
/// sets carrying the same roles in any order map to the same key.
///
/// # Example
///
/// ```
/// use gatekit_identity::{role_identifiers, SecurityIdentity};
///
/// let sids = vec![
///     SecurityIdentity::role("ROLE_USER"),
///     SecurityIdentity::user("42"),
///     SecurityIdentity::role("ROLE_ADMIN"),
///     SecurityIdentity::role("ROLE_USER"),
/// ];
///
/// assert_eq!(role_identifiers(&sids), vec!["ROLE_ADMIN", "ROLE_USER"]);
/// ```
pub fn role_identifiers(sids: &[SecurityIdentity]) -> Vec<String> {
    let mut roles: Vec<String> = sids
        .iter()
        .filter(|sid| sid.is_role())
        .map(|sid| sid.identifier().to_string())
        .collect();
    roles.sort();
    roles.dedup();
    roles
}
