//! # Permission model
//!
//! The raw rows and transient values the engine moves around: stored
//! permission rows, the computed per-role checking results, and sharing
//! entries with their validity window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use gatekit_identity::SecurityIdentity;

/// Sentinel standing for the class scope in permission maps, where a field
/// name would otherwise appear.
pub const GLOBAL_SCOPE: &str = "_global";

/// Reserved class name of config-shaped permission rows.
pub const CONFIG_CLASS: &str = "_config";

/// Reserved field name of field-level config-shaped permission rows.
pub const CONFIG_FIELD: &str = "_config_field";

/// Map an optional class or field name to its permission map key.
pub fn scope_key(value: Option<&str>) -> &str {
    value.unwrap_or(GLOBAL_SCOPE)
}

/// The loaded permission map of one identity set:
/// class key → field key → granted operations.
pub type PermissionMap = HashMap<String, HashMap<String, HashSet<String>>>;

/// A raw permission row.
///
/// Rows are supplied by a permission provider and are not owned by the
/// engine. A row grants one operation, either at class scope (`field` is
/// `None`) or on one field.
///
/// # Example
///
/// ```
/// use gatekit_permission::Permission;
///
/// let row = Permission::for_class("document", "publish").with_role("ROLE_EDITOR");
/// assert_eq!(row.operation, "publish");
/// assert_eq!(row.class.as_deref(), Some("document"));
/// assert!(row.field.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Permission {
    /// The owning role, when the row was stored for a role.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// The subject class, `None` for rows applying to every class.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    /// The field, `None` for class-scoped rows.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// The granted operation.
    pub operation: String,
}

impl Permission {
    /// Create a row granting an operation on every class.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            role: None,
            class: None,
            field: None,
            operation: operation.into(),
        }
    }

    /// Create a class-scoped row.
    pub fn for_class(class: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            class: Some(class.into()),
            ..Self::new(operation)
        }
    }

    /// Create a field-scoped row.
    pub fn for_field(
        class: impl Into<String>,
        field: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            class: Some(class.into()),
            field: Some(field.into()),
            ..Self::new(operation)
        }
    }

    /// Create a class-level config-shaped row (reserved class sentinel).
    pub fn config(operation: impl Into<String>) -> Self {
        Self::for_class(CONFIG_CLASS, operation)
    }

    /// Create a field-level config-shaped row (reserved class and field
    /// sentinels).
    pub fn config_field(operation: impl Into<String>) -> Self {
        Self::for_field(CONFIG_CLASS, CONFIG_FIELD, operation)
    }

    /// Set the owning role (builder style).
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }
}

/// A permission row together with its computed decision.
///
/// Produced while listing the permissions of one role on one subject.
/// `config_default` marks rows that exist because the static config
/// declares the operation, as opposed to stored grants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PermissionChecking {
    /// The permission row that was checked.
    pub permission: Permission,
    /// Whether the role is granted the operation.
    pub granted: bool,
    /// Whether the row is a config-derived default.
    pub config_default: bool,
}

/// An ad-hoc grant of operations on one subject instance to specific
/// identities, outside the role system.
///
/// An entry is active iff it is enabled and the current time lies within
/// its optional `[started_at, ended_at]` window; both bounds are inclusive
/// and either may be absent.
///
/// # Example
///
/// ```
/// use chrono::Utc;
/// use gatekit_identity::SecurityIdentity;
/// use gatekit_permission::{Permission, SharingEntry};
///
/// let now = Utc::now();
/// let entry = SharingEntry::new("document", "7")
///     .with_identity(SecurityIdentity::role("ROLE_USER"))
///     .with_permission(Permission::new("edit"))
///     .with_window(Some(now), Some(now));
///
/// assert!(entry.is_active(now));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SharingEntry {
    /// Unique entry id.
    pub id: Uuid,
    /// The subject type the entry applies to.
    pub subject_type: String,
    /// The subject instance identifier.
    pub subject_id: String,
    /// The grantee identities.
    pub identities: Vec<SecurityIdentity>,
    /// Sharing roles whose stored permission rows also apply to the
    /// subject for the grantees.
    pub roles: Vec<String>,
    /// The directly granted permissions.
    pub permissions: Vec<Permission>,
    /// Whether the entry is enabled at all.
    pub enabled: bool,
    /// Inclusive start of the validity window, unbounded when absent.
    pub started_at: Option<DateTime<Utc>>,
    /// Inclusive end of the validity window, unbounded when absent.
    pub ended_at: Option<DateTime<Utc>>,
}

impl SharingEntry {
    /// Create an enabled, unbounded entry for a subject instance.
    pub fn new(subject_type: impl Into<String>, subject_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            subject_type: subject_type.into(),
            subject_id: subject_id.into(),
            identities: Vec::new(),
            roles: Vec::new(),
            permissions: Vec::new(),
            enabled: true,
            started_at: None,
            ended_at: None,
        }
    }

    /// Add a grantee identity (builder style).
    pub fn with_identity(mut self, identity: SecurityIdentity) -> Self {
        self.identities.push(identity);
        self
    }

    /// Add a sharing role (builder style).
    pub fn with_sharing_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    /// Add a granted permission (builder style).
    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permissions.push(permission);
        self
    }

    /// Set the validity window (builder style).
    pub fn with_window(
        mut self,
        started_at: Option<DateTime<Utc>>,
        ended_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.started_at = started_at;
        self.ended_at = ended_at;
        self
    }

    /// Disable the entry (builder style).
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Check whether the entry is active at the given instant.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.enabled
            && self.started_at.map_or(true, |started| started <= now)
            && self.ended_at.map_or(true, |ended| ended >= now)
    }
}
