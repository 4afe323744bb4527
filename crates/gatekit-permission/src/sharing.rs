//! # Sharing
//!
//! Sharing grants operations on specific subject instances to specific
//! identities, outside the role system: "alice may edit document 7 until
//! Friday". The [`SharingManager`] preloads the entries of a batch of
//! subjects in one provider call, caches them per subject (including
//! negative results), and answers instance-level checks the permission
//! manager could not grant from roles alone.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use chrono::Utc;
use tracing::debug;

use gatekit_identity::{IdentityKind, SecurityIdentity, SubjectIdentity};

use crate::error::{PermissionError, PermissionResult};
use crate::model::{Permission, SharingEntry};
use crate::provider::SharingProvider;

/// How identities of one kind are grouped for sharing storage.
///
/// The type name is the storage-facing name of the kind (e.g. identities
/// of kind `User` stored under `"user"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharingIdentityConfig {
    kind: IdentityKind,
    type_name: String,
}

impl SharingIdentityConfig {
    /// Create a config mapping an identity kind to a storage type name.
    pub fn new(kind: IdentityKind, type_name: impl Into<String>) -> Self {
        Self {
            kind,
            type_name: type_name.into(),
        }
    }

    /// Get the identity kind.
    pub fn kind(&self) -> IdentityKind {
        self.kind
    }

    /// Get the storage type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

/// Instance-level grant manager.
///
/// Only subject types registered with
/// [`SharingManager::with_subject_type`] participate; checks on any other
/// type are always denied here. The manager holds the identity set of the
/// current principal (set per request via
/// [`SharingManager::set_security_identities`]) and re-validates entry
/// activity at check time, so an entry expiring between preload and check
/// no longer grants.
pub struct SharingManager {
    provider: Rc<dyn SharingProvider>,
    subject_types: HashSet<String>,
    identity_configs: HashMap<IdentityKind, SharingIdentityConfig>,
    sids: RefCell<Vec<SecurityIdentity>>,
    entries: RefCell<HashMap<SubjectIdentity, Vec<SharingEntry>>>,
    role_permissions: RefCell<HashMap<String, Vec<Permission>>>,
}

impl fmt::Debug for SharingManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharingManager")
            .field("subject_types", &self.subject_types)
            .field("identity_configs", &self.identity_configs.len())
            .field("preloaded_subjects", &self.entries.borrow().len())
            .finish()
    }
}

impl SharingManager {
    /// Create a manager with no sharing-enabled subject types.
    pub fn new(provider: Rc<dyn SharingProvider>) -> Self {
        Self {
            provider,
            subject_types: HashSet::new(),
            identity_configs: HashMap::new(),
            sids: RefCell::new(Vec::new()),
            entries: RefCell::new(HashMap::new()),
            role_permissions: RefCell::new(HashMap::new()),
        }
    }

    /// Enable sharing for a subject type (builder style).
    pub fn with_subject_type(mut self, type_name: impl Into<String>) -> Self {
        self.subject_types.insert(type_name.into());
        self
    }

    /// Register a sharing identity config (builder style).
    pub fn with_identity_config(mut self, config: SharingIdentityConfig) -> Self {
        self.identity_configs.insert(config.kind(), config);
        self
    }

    /// Check whether sharing is enabled for a subject type.
    pub fn has_subject_type(&self, type_name: &str) -> bool {
        self.subject_types.contains(type_name)
    }

    /// Get the sharing identity config of a kind, if registered.
    pub fn identity_config(&self, kind: IdentityKind) -> Option<&SharingIdentityConfig> {
        self.identity_configs.get(&kind)
    }

    /// Set the identity set of the current principal. Clears the preload
    /// caches, which were built for the previous set.
    pub fn set_security_identities(&self, sids: Vec<SecurityIdentity>) {
        *self.sids.borrow_mut() = sids;
        self.clear();
    }

    /// Get the identity set of the current principal.
    pub fn security_identities(&self) -> Vec<SecurityIdentity> {
        self.sids.borrow().clone()
    }

    /// Group an identity set by the storage type name of each kind.
    ///
    /// # Errors
    ///
    /// [`PermissionError::IdentityConfigNotFound`] when an identity's kind
    /// has no registered config.
    pub fn group_security_identities(
        &self,
        sids: &[SecurityIdentity],
    ) -> PermissionResult<HashMap<String, Vec<String>>> {
        let mut groups: HashMap<String, Vec<String>> = HashMap::new();

        for sid in sids {
            let config = self.identity_configs.get(&sid.kind()).ok_or_else(|| {
                PermissionError::IdentityConfigNotFound(sid.kind().as_str().to_string())
            })?;

            groups
                .entry(config.type_name().to_string())
                .or_default()
                .push(sid.identifier().to_string());
        }

        Ok(groups)
    }

    /// Preload the sharing entries of a batch of subjects.
    ///
    /// Subjects of non-sharing types and subjects already preloaded are
    /// skipped; when every subject is skipped the provider is not called
    /// at all. Every fetched subject gets a cache slot, so a subject
    /// without entries is not fetched again.
    pub fn preload(&self, subjects: &[SubjectIdentity]) {
        let missing: Vec<SubjectIdentity> = {
            let entries = self.entries.borrow();
            subjects
                .iter()
                .filter(|subject| subject.is_instance())
                .filter(|subject| self.has_subject_type(subject.type_name()))
                .filter(|subject| !entries.contains_key(subject))
                .cloned()
                .collect()
        };

        if missing.is_empty() {
            return;
        }

        debug!(subjects = missing.len(), "preloading sharing entries");

        let sids = self.sids.borrow().clone();
        let fetched = self.provider.get_sharing_entries(&missing, &sids);

        let mut entries = self.entries.borrow_mut();
        for subject in &missing {
            entries.insert(subject.clone(), Vec::new());
        }
        let mut roles: Vec<String> = Vec::new();
        for entry in fetched {
            roles.extend(entry.roles.iter().cloned());
            let subject = SubjectIdentity::new(&entry.subject_type, &entry.subject_id);
            entries.entry(subject).or_default().push(entry);
        }
        drop(entries);

        self.preload_role_permissions(&roles);
    }

    /// Preload the permission rows of sharing roles not yet cached.
    pub fn preload_role_permissions(&self, roles: &[String]) {
        let missing: Vec<String> = {
            let cached = self.role_permissions.borrow();
            let mut missing: Vec<String> = roles
                .iter()
                .filter(|role| !cached.contains_key(*role))
                .cloned()
                .collect();
            missing.sort();
            missing.dedup();
            missing
        };

        if missing.is_empty() {
            return;
        }

        let rows = self.provider.get_permission_roles(&missing);

        let mut cached = self.role_permissions.borrow_mut();
        for role in &missing {
            cached.insert(role.clone(), Vec::new());
        }
        for row in rows {
            if let Some(role) = row.role.clone() {
                cached.entry(role).or_default().push(row);
            }
        }
    }

    /// Check whether the current identity set is granted an operation on a
    /// subject instance through sharing.
    ///
    /// The operation must already be alias-translated. Lazily preloads the
    /// subject when it was not part of a batch.
    pub fn is_granted(&self, operation: &str, subject: &SubjectIdentity, field: Option<&str>) -> bool {
        if !subject.is_instance() || !self.has_subject_type(subject.type_name()) {
            return false;
        }

        if !self.entries.borrow().contains_key(subject) {
            self.preload(std::slice::from_ref(subject));
        }

        let now = Utc::now();
        let sids = self.sids.borrow();
        let entries = self.entries.borrow();
        let Some(subject_entries) = entries.get(subject) else {
            return false;
        };

        subject_entries
            .iter()
            .filter(|entry| entry.is_active(now))
            .filter(|entry| entry.identities.iter().any(|identity| sids.contains(identity)))
            .any(|entry| {
                let direct = entry
                    .permissions
                    .iter()
                    .any(|row| self.permission_matches(row, operation, subject, field));

                direct || {
                    let role_rows = self.role_permissions.borrow();
                    entry.roles.iter().any(|role| {
                        role_rows.get(role).is_some_and(|rows| {
                            rows.iter()
                                .any(|row| self.permission_matches(row, operation, subject, field))
                        })
                    })
                }
            })
    }

    fn permission_matches(
        &self,
        row: &Permission,
        operation: &str,
        subject: &SubjectIdentity,
        field: Option<&str>,
    ) -> bool {
        if row.operation != operation {
            return false;
        }

        if row.class.as_deref().is_some_and(|class| class != subject.type_name()) {
            return false;
        }

        match (row.field.as_deref(), field) {
            (None, _) => true,
            (Some(row_field), Some(field)) => row_field == field,
            (Some(_), None) => false,
        }
    }

    /// Forget the preloaded entries of specific subjects.
    pub fn reset_preload(&self, subjects: &[SubjectIdentity]) {
        let mut entries = self.entries.borrow_mut();
        for subject in subjects {
            entries.remove(subject);
        }
    }

    /// Clear all preload caches.
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
        self.role_permissions.borrow_mut().clear();
    }
}

/// Executes batched sharing deletions.
///
/// Both maps are keyed by class: deleted subjects by their subject type,
/// deleted grantees by the storage type name of their identity kind.
pub trait SharingDeleteExecutor {
    /// Delete every sharing entry of the given subjects, and strip the
    /// given grantee identities from remaining entries, in one batch.
    fn delete_sharing(
        &self,
        subjects: &HashMap<String, Vec<String>>,
        identities: &HashMap<String, Vec<String>>,
    );
}

/// Collects subjects and grantees deleted during a unit of work and hands
/// them to an executor in one batch at flush time.
///
/// Classification goes through the sharing manager: subjects of
/// non-sharing types and identities of unconfigured kinds are silently
/// ignored, because no sharing entry can reference them.
pub struct SharingDeleteTracker {
    manager: Rc<SharingManager>,
    subjects: RefCell<HashMap<String, Vec<String>>>,
    identities: RefCell<HashMap<String, Vec<String>>>,
}

impl fmt::Debug for SharingDeleteTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharingDeleteTracker")
            .field("pending_subject_types", &self.subjects.borrow().len())
            .field("pending_identity_types", &self.identities.borrow().len())
            .finish()
    }
}

impl SharingDeleteTracker {
    /// Create a tracker classifying through the given manager.
    pub fn new(manager: Rc<SharingManager>) -> Self {
        Self {
            manager,
            subjects: RefCell::new(HashMap::new()),
            identities: RefCell::new(HashMap::new()),
        }
    }

    /// Record the deletion of a subject instance.
    pub fn schedule(&self, subject: &SubjectIdentity) {
        if !self.manager.has_subject_type(subject.type_name()) {
            return;
        }

        self.subjects
            .borrow_mut()
            .entry(subject.type_name().to_string())
            .or_default()
            .push(subject.identifier().to_string());
    }

    /// Record the deletion of a grantee identity.
    pub fn schedule_identity(&self, sid: &SecurityIdentity) {
        let Some(config) = self.manager.identity_config(sid.kind()) else {
            return;
        };

        self.identities
            .borrow_mut()
            .entry(config.type_name().to_string())
            .or_default()
            .push(sid.identifier().to_string());
    }

    /// Whether anything is pending.
    pub fn has_pending(&self) -> bool {
        !self.subjects.borrow().is_empty() || !self.identities.borrow().is_empty()
    }

    /// Execute one batched deletion for everything tracked, then forget
    /// it. A flush with nothing tracked executes nothing.
    pub fn flush(&self, executor: &dyn SharingDeleteExecutor) {
        if !self.has_pending() {
            return;
        }

        let subjects = std::mem::take(&mut *self.subjects.borrow_mut());
        let identities = std::mem::take(&mut *self.identities.borrow_mut());

        executor.delete_sharing(&subjects, &identities);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MemorySharingProvider;
    use chrono::Duration;

    fn manager_with(provider: Rc<MemorySharingProvider>) -> SharingManager {
        SharingManager::new(provider)
            .with_subject_type("document")
            .with_identity_config(SharingIdentityConfig::new(IdentityKind::User, "user"))
            .with_identity_config(SharingIdentityConfig::new(IdentityKind::Role, "role"))
    }

    #[test]
    fn test_direct_permission_grant() {
        let provider = Rc::new(MemorySharingProvider::new().with_entry(
            SharingEntry::new("document", "7")
                .with_identity(SecurityIdentity::user("alice"))
                .with_permission(Permission::new("edit")),
        ));
        let manager = manager_with(Rc::clone(&provider));
        manager.set_security_identities(vec![SecurityIdentity::user("alice")]);

        let subject = SubjectIdentity::new("document", "7");

        assert!(manager.is_granted("edit", &subject, None));
        assert!(!manager.is_granted("delete", &subject, None));
        assert!(!manager.is_granted("edit", &SubjectIdentity::new("document", "8"), None));
    }

    #[test]
    fn test_other_identity_not_granted() {
        let provider = Rc::new(MemorySharingProvider::new().with_entry(
            SharingEntry::new("document", "7")
                .with_identity(SecurityIdentity::user("alice"))
                .with_permission(Permission::new("edit")),
        ));
        let manager = manager_with(provider);
        manager.set_security_identities(vec![SecurityIdentity::user("mallory")]);

        assert!(!manager.is_granted("edit", &SubjectIdentity::new("document", "7"), None));
    }

    #[test]
    fn test_empty_identity_set_not_granted() {
        let provider = Rc::new(MemorySharingProvider::new().with_entry(
            SharingEntry::new("document", "7")
                .with_identity(SecurityIdentity::user("alice"))
                .with_permission(Permission::new("edit")),
        ));
        let manager = manager_with(provider);

        // no identities set: an active entry grants nothing
        assert!(!manager.is_granted("edit", &SubjectIdentity::new("document", "7"), None));
    }

    #[test]
    fn test_non_sharing_type_denied() {
        let provider = Rc::new(MemorySharingProvider::new().with_entry(
            SharingEntry::new("meeting", "7")
                .with_identity(SecurityIdentity::user("alice"))
                .with_permission(Permission::new("join")),
        ));
        let manager = manager_with(Rc::clone(&provider));
        manager.set_security_identities(vec![SecurityIdentity::user("alice")]);

        assert!(!manager.is_granted("join", &SubjectIdentity::new("meeting", "7"), None));
        // a non-sharing type never reaches the provider
        assert_eq!(provider.stats().get_sharing_entries_calls, 0);
    }

    #[test]
    fn test_class_scoped_row_matches_field_check() {
        let provider = Rc::new(MemorySharingProvider::new().with_entry(
            SharingEntry::new("document", "7")
                .with_identity(SecurityIdentity::user("alice"))
                .with_permission(Permission::new("view"))
                .with_permission(Permission::for_field("document", "title", "edit")),
        ));
        let manager = manager_with(provider);
        manager.set_security_identities(vec![SecurityIdentity::user("alice")]);

        let subject = SubjectIdentity::new("document", "7");

        // a class-scoped row covers any field; a field row covers only its own
        assert!(manager.is_granted("view", &subject, Some("title")));
        assert!(manager.is_granted("edit", &subject, Some("title")));
        assert!(!manager.is_granted("edit", &subject, Some("body")));
        assert!(!manager.is_granted("edit", &subject, None));
    }

    #[test]
    fn test_sharing_role_rows_apply() {
        let provider = Rc::new(
            MemorySharingProvider::new()
                .with_entry(
                    SharingEntry::new("document", "7")
                        .with_identity(SecurityIdentity::user("alice"))
                        .with_sharing_role("ROLE_DOC_REVIEWER"),
                )
                .with_role_permission(
                    Permission::for_class("document", "comment").with_role("ROLE_DOC_REVIEWER"),
                ),
        );
        let manager = manager_with(provider);
        manager.set_security_identities(vec![SecurityIdentity::user("alice")]);

        assert!(manager.is_granted("comment", &SubjectIdentity::new("document", "7"), None));
        assert!(!manager.is_granted("publish", &SubjectIdentity::new("document", "7"), None));
    }

    #[test]
    fn test_preload_batches_and_caches() {
        let provider = Rc::new(MemorySharingProvider::new().with_entry(
            SharingEntry::new("document", "7")
                .with_identity(SecurityIdentity::user("alice"))
                .with_permission(Permission::new("view")),
        ));
        let manager = manager_with(Rc::clone(&provider));
        manager.set_security_identities(vec![SecurityIdentity::user("alice")]);

        let subjects = vec![
            SubjectIdentity::new("document", "7"),
            SubjectIdentity::new("document", "8"),
        ];

        manager.preload(&subjects);
        assert_eq!(provider.stats().get_sharing_entries_calls, 1);

        // both subjects are cached, including the one with no entries
        manager.preload(&subjects);
        assert!(manager.is_granted("view", &subjects[0], None));
        assert!(!manager.is_granted("view", &subjects[1], None));
        assert_eq!(provider.stats().get_sharing_entries_calls, 1);

        manager.reset_preload(&subjects[..1]);
        manager.preload(&subjects);
        assert_eq!(provider.stats().get_sharing_entries_calls, 2);
    }

    #[test]
    fn test_entry_expiring_after_preload_no_longer_grants() {
        let now = Utc::now();
        let provider = Rc::new(MemorySharingProvider::new());
        let manager = manager_with(Rc::clone(&provider));
        manager.set_security_identities(vec![SecurityIdentity::user("alice")]);

        let subject = SubjectIdentity::new("document", "7");
        manager.preload(std::slice::from_ref(&subject));

        // slipped into the cache by hand with an already expired window
        manager.entries.borrow_mut().insert(
            subject.clone(),
            vec![SharingEntry::new("document", "7")
                .with_identity(SecurityIdentity::user("alice"))
                .with_permission(Permission::new("view"))
                .with_window(None, Some(now - Duration::seconds(1)))],
        );

        assert!(!manager.is_granted("view", &subject, None));
    }

    #[test]
    fn test_group_security_identities() {
        let provider = Rc::new(MemorySharingProvider::new());
        let manager = manager_with(provider);

        let groups = manager
            .group_security_identities(&[
                SecurityIdentity::user("alice"),
                SecurityIdentity::user("bob"),
                SecurityIdentity::role("ROLE_USER"),
            ])
            .unwrap();

        assert_eq!(groups["user"], vec!["alice", "bob"]);
        assert_eq!(groups["role"], vec!["ROLE_USER"]);

        let err = manager
            .group_security_identities(&[SecurityIdentity::group("staff")])
            .unwrap_err();
        assert!(matches!(err, PermissionError::IdentityConfigNotFound(ref kind) if kind == "group"));
    }

    #[test]
    fn test_delete_tracker_flushes_one_batch() {
        let provider = Rc::new(
            MemorySharingProvider::new()
                .with_entry(SharingEntry::new("document", "7"))
                .with_entry(SharingEntry::new("document", "8"))
                .with_entry(
                    SharingEntry::new("document", "9")
                        .with_identity(SecurityIdentity::user("alice"))
                        .with_identity(SecurityIdentity::user("bob"))
                        .with_permission(Permission::new("view")),
                ),
        );
        let manager = Rc::new(manager_with(Rc::clone(&provider)));
        let tracker = SharingDeleteTracker::new(Rc::clone(&manager));

        assert!(!tracker.has_pending());
        tracker.flush(provider.as_ref());
        assert_eq!(provider.stats().delete_calls, 0);

        tracker.schedule(&SubjectIdentity::new("document", "7"));
        tracker.schedule(&SubjectIdentity::new("document", "8"));
        // not a sharing type, silently ignored
        tracker.schedule(&SubjectIdentity::new("meeting", "3"));
        tracker.schedule_identity(&SecurityIdentity::user("alice"));
        // no identity config for groups, silently ignored
        tracker.schedule_identity(&SecurityIdentity::group("staff"));
        assert!(tracker.has_pending());

        tracker.flush(provider.as_ref());
        assert_eq!(provider.stats().delete_calls, 1);
        assert!(!tracker.has_pending());

        // the repeated flush has nothing left to do
        tracker.flush(provider.as_ref());
        assert_eq!(provider.stats().delete_calls, 1);

        manager.set_security_identities(vec![SecurityIdentity::user("bob")]);
        let remaining = manager.is_granted("view", &SubjectIdentity::new("document", "9"), None);
        assert!(remaining);
        manager.set_security_identities(vec![SecurityIdentity::user("alice")]);
        assert!(!manager.is_granted("view", &SubjectIdentity::new("document", "9"), None));
    }
}
