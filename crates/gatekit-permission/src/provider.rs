//! # Permission and sharing providers
//!
//! Providers are the storage seam of the engine: the managers ask them for
//! raw permission rows and sharing entries and never touch a backend
//! directly. The in-memory implementations below back the tests and small
//! deployments; a database-backed provider implements the same traits.

use std::cell::{Cell, RefCell};

use chrono::Utc;

use gatekit_identity::{SecurityIdentity, SubjectIdentity};

use crate::config::PermissionConfig;
use crate::model::{Permission, SharingEntry};
use crate::sharing::SharingDeleteExecutor;

/// Storage backend for permission rows.
pub trait PermissionProvider {
    /// Fetch the permission rows stored for any of the given roles.
    fn get_permissions(&self, roles: &[String]) -> Vec<Permission>;

    /// Fetch the config-shaped rows, i.e. rows stored against the reserved
    /// config class sentinels rather than a concrete resource type.
    fn get_config_permissions(&self) -> Vec<Permission>;

    /// Fetch the rows of the given roles that apply to a subject: rows
    /// without a class always apply, rows with a class only when it equals
    /// the subject type. With no subject, every row of the roles applies.
    fn get_permissions_by_subject(
        &self,
        subject: Option<&SubjectIdentity>,
        roles: &[String],
    ) -> Vec<Permission>;

    /// Resolve the type a config's master mapping points at, `None` when
    /// the config has no master or the master type is undeclared.
    fn get_master_class(&self, config: &PermissionConfig) -> Option<String> {
        config
            .master()
            .and_then(|master| master.master_type())
            .map(str::to_string)
    }
}

/// Call counters of a [`MemoryPermissionProvider`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PermissionProviderStats {
    /// Number of [`PermissionProvider::get_permissions`] calls.
    pub get_permissions_calls: u64,
    /// Number of [`PermissionProvider::get_config_permissions`] calls.
    pub get_config_permissions_calls: u64,
    /// Number of [`PermissionProvider::get_permissions_by_subject`] calls.
    pub get_permissions_by_subject_calls: u64,
}

/// In-memory permission provider.
///
/// Rows are registered up front; the call counters let tests assert how
/// often the managers actually hit the storage seam.
///
/// # Example
///
/// ```
/// use gatekit_permission::{MemoryPermissionProvider, Permission, PermissionProvider};
///
/// let provider = MemoryPermissionProvider::new()
///     .with_permission(Permission::for_class("document", "publish").with_role("ROLE_EDITOR"));
///
/// let rows = provider.get_permissions(&["ROLE_EDITOR".to_string()]);
/// assert_eq!(rows.len(), 1);
/// assert_eq!(provider.stats().get_permissions_calls, 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryPermissionProvider {
    permissions: Vec<Permission>,
    config_permissions: Vec<Permission>,
    get_permissions_calls: Cell<u64>,
    get_config_permissions_calls: Cell<u64>,
    get_permissions_by_subject_calls: Cell<u64>,
}

impl MemoryPermissionProvider {
    /// Create a provider without any rows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stored permission row (builder style). The row should
    /// carry its owning role.
    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permissions.push(permission);
        self
    }

    /// Register a config-shaped row (builder style).
    pub fn with_config_permission(mut self, permission: Permission) -> Self {
        self.config_permissions.push(permission);
        self
    }

    /// Get the call counters.
    pub fn stats(&self) -> PermissionProviderStats {
        PermissionProviderStats {
            get_permissions_calls: self.get_permissions_calls.get(),
            get_config_permissions_calls: self.get_config_permissions_calls.get(),
            get_permissions_by_subject_calls: self.get_permissions_by_subject_calls.get(),
        }
    }
}

impl PermissionProvider for MemoryPermissionProvider {
    fn get_permissions(&self, roles: &[String]) -> Vec<Permission> {
        self.get_permissions_calls.set(self.get_permissions_calls.get() + 1);

        self.permissions
            .iter()
            .filter(|row| row.role.as_ref().is_some_and(|role| roles.contains(role)))
            .cloned()
            .collect()
    }

    fn get_config_permissions(&self) -> Vec<Permission> {
        self.get_config_permissions_calls
            .set(self.get_config_permissions_calls.get() + 1);

        self.config_permissions.clone()
    }

    fn get_permissions_by_subject(
        &self,
        subject: Option<&SubjectIdentity>,
        roles: &[String],
    ) -> Vec<Permission> {
        self.get_permissions_by_subject_calls
            .set(self.get_permissions_by_subject_calls.get() + 1);

        self.permissions
            .iter()
            .filter(|row| row.role.as_ref().is_some_and(|role| roles.contains(role)))
            .filter(|row| match (subject, row.class.as_deref()) {
                (Some(subject), Some(class)) => class == subject.type_name(),
                _ => true,
            })
            .cloned()
            .collect()
    }
}

/// Storage backend for sharing entries.
pub trait SharingProvider {
    /// Fetch the active sharing entries granting any of the given
    /// identities something on any of the given subjects.
    fn get_sharing_entries(
        &self,
        subjects: &[SubjectIdentity],
        sids: &[SecurityIdentity],
    ) -> Vec<SharingEntry>;

    /// Fetch the permission rows stored for the given sharing roles.
    fn get_permission_roles(&self, roles: &[String]) -> Vec<Permission>;
}

/// Call counters of a [`MemorySharingProvider`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SharingProviderStats {
    /// Number of [`SharingProvider::get_sharing_entries`] calls.
    pub get_sharing_entries_calls: u64,
    /// Number of [`SharingProvider::get_permission_roles`] calls.
    pub get_permission_roles_calls: u64,
    /// Number of sharing delete statements executed.
    pub delete_calls: u64,
}

/// In-memory sharing provider.
///
/// Entries can be added after construction, so tests can grant and revoke
/// mid-scenario. Inactive entries are filtered out at fetch time. As a
/// [`SharingDeleteExecutor`] it expects identity classes named after the
/// identity kind strings (`"user"`, `"role"`, `"group"`, `"custom"`).
#[derive(Debug, Default)]
pub struct MemorySharingProvider {
    entries: RefCell<Vec<SharingEntry>>,
    role_permissions: Vec<Permission>,
    get_sharing_entries_calls: Cell<u64>,
    get_permission_roles_calls: Cell<u64>,
    delete_calls: Cell<u64>,
}

impl MemorySharingProvider {
    /// Create a provider without any entries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sharing entry (builder style).
    pub fn with_entry(self, entry: SharingEntry) -> Self {
        self.entries.borrow_mut().push(entry);
        self
    }

    /// Register a sharing-role permission row (builder style). The row
    /// should carry its owning role.
    pub fn with_role_permission(mut self, permission: Permission) -> Self {
        self.role_permissions.push(permission);
        self
    }

    /// Add a sharing entry after construction.
    pub fn add_entry(&self, entry: SharingEntry) {
        self.entries.borrow_mut().push(entry);
    }

    /// Get the call counters.
    pub fn stats(&self) -> SharingProviderStats {
        SharingProviderStats {
            get_sharing_entries_calls: self.get_sharing_entries_calls.get(),
            get_permission_roles_calls: self.get_permission_roles_calls.get(),
            delete_calls: self.delete_calls.get(),
        }
    }
}

impl SharingProvider for MemorySharingProvider {
    fn get_sharing_entries(
        &self,
        subjects: &[SubjectIdentity],
        sids: &[SecurityIdentity],
    ) -> Vec<SharingEntry> {
        self.get_sharing_entries_calls
            .set(self.get_sharing_entries_calls.get() + 1);

        let now = Utc::now();

        self.entries
            .borrow()
            .iter()
            .filter(|entry| entry.is_active(now))
            .filter(|entry| {
                subjects.iter().any(|subject| {
                    subject.type_name() == entry.subject_type
                        && subject.identifier() == entry.subject_id
                })
            })
            .filter(|entry| {
                sids.is_empty() || entry.identities.iter().any(|identity| sids.contains(identity))
            })
            .cloned()
            .collect()
    }

    fn get_permission_roles(&self, roles: &[String]) -> Vec<Permission> {
        self.get_permission_roles_calls
            .set(self.get_permission_roles_calls.get() + 1);

        self.role_permissions
            .iter()
            .filter(|row| row.role.as_ref().is_some_and(|role| roles.contains(role)))
            .cloned()
            .collect()
    }
}

impl SharingDeleteExecutor for MemorySharingProvider {
    fn delete_sharing(
        &self,
        subjects: &std::collections::HashMap<String, Vec<String>>,
        identities: &std::collections::HashMap<String, Vec<String>>,
    ) {
        self.delete_calls.set(self.delete_calls.get() + 1);

        let mut entries = self.entries.borrow_mut();

        entries.retain(|entry| {
            !subjects
                .get(&entry.subject_type)
                .is_some_and(|ids| ids.contains(&entry.subject_id))
        });

        for entry in entries.iter_mut() {
            entry.identities.retain(|sid| {
                !identities
                    .get(sid.kind().as_str())
                    .is_some_and(|ids| ids.iter().any(|id| id == sid.identifier()))
            });
        }
    }
}
