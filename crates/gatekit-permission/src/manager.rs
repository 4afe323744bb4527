//! # Permission manager
//!
//! The decision engine. A check runs through a strictly ordered chain:
//! master resolution, permission-map load (or cache hit), check hooks,
//! map lookup, sharing. Each step only runs when the previous one
//! abstained.
//!
//! The permission map of an identity set is computed at most once per
//! manager lifetime: the cache key is the sorted, de-duplicated list of
//! role identifiers, so two identity sets carrying the same roles share
//! one entry. Non-role identities never reach the cache key; they are
//! resolved through sharing.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use gatekit_identity::{role_identifiers, SecurityIdentity, SharedObject, SubjectIdentity};

use crate::config::ConfigRegistry;
use crate::error::{PermissionError, PermissionResult};
use crate::hooks::{CheckContext, PermissionHooks, PostLoadContext, PreLoadContext};
use crate::model::{
    scope_key, Permission, PermissionChecking, PermissionMap, CONFIG_CLASS, CONFIG_FIELD,
    GLOBAL_SCOPE,
};
use crate::provider::PermissionProvider;
use crate::sharing::SharingManager;

/// The permission decision engine.
///
/// # Example
///
/// ```
/// use std::rc::Rc;
/// use gatekit_identity::{SecurityIdentity, SubjectIdentity};
/// use gatekit_permission::{
///     ConfigRegistry, MemoryPermissionProvider, Permission, PermissionConfig, PermissionManager,
/// };
///
/// let provider = Rc::new(
///     MemoryPermissionProvider::new()
///         .with_permission(Permission::for_class("document", "publish").with_role("ROLE_EDITOR")),
/// );
/// let mut registry = ConfigRegistry::new();
/// registry.register(PermissionConfig::new("document").with_operations(&["read"]));
///
/// let manager = PermissionManager::new(provider, registry, None).unwrap();
///
/// let editor = [SecurityIdentity::role("ROLE_EDITOR")];
/// let subject = SubjectIdentity::from_class("document");
/// assert!(manager.is_granted(&editor, &["read", "publish"], Some(&subject), None));
/// assert!(!manager.is_granted(&editor, &["delete"], Some(&subject), None));
/// ```
pub struct PermissionManager {
    provider: Rc<dyn PermissionProvider>,
    registry: ConfigRegistry,
    sharing: Option<Rc<SharingManager>>,
    hooks: PermissionHooks,
    cache: RefCell<HashMap<String, PermissionMap>>,
    config_rows: RefCell<Option<Vec<Permission>>>,
    enabled: Cell<bool>,
}

impl fmt::Debug for PermissionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionManager")
            .field("enabled", &self.enabled.get())
            .field("sharing", &self.sharing.is_some())
            .field("cached_identity_sets", &self.cache.borrow().len())
            .finish()
    }
}

impl PermissionManager {
    /// Create a manager.
    ///
    /// # Errors
    ///
    /// [`PermissionError::MasterCycle`] when following the master mappings
    /// from any registered config leads back to an already visited type.
    pub fn new(
        provider: Rc<dyn PermissionProvider>,
        registry: ConfigRegistry,
        sharing: Option<Rc<SharingManager>>,
    ) -> PermissionResult<Self> {
        for config in registry.configs() {
            let mut visited = HashSet::new();
            visited.insert(config.type_name().to_string());

            let mut current = config;
            while let Some(master_class) = provider.get_master_class(current) {
                if !visited.insert(master_class.clone()) {
                    return Err(PermissionError::MasterCycle(config.type_name().to_string()));
                }
                match registry.get_config(&master_class) {
                    Some(next) => current = next,
                    None => break,
                }
            }
        }

        Ok(Self {
            provider,
            registry,
            sharing,
            hooks: PermissionHooks::new(),
            cache: RefCell::new(HashMap::new()),
            config_rows: RefCell::new(None),
            enabled: Cell::new(true),
        })
    }

    /// Get the registered hooks, for registration before the manager is
    /// shared.
    pub fn hooks_mut(&mut self) -> &mut PermissionHooks {
        &mut self.hooks
    }

    /// Get the config registry.
    pub fn registry(&self) -> &ConfigRegistry {
        &self.registry
    }

    /// Get the sharing manager, if one is attached.
    pub fn sharing(&self) -> Option<&Rc<SharingManager>> {
        self.sharing.as_ref()
    }

    /// Re-enable permission checking.
    pub fn enable(&self) {
        self.enabled.set(true);
    }

    /// Disable permission checking. A disabled manager grants everything.
    pub fn disable(&self) {
        self.enabled.set(false);
    }

    /// Whether permission checking is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    /// Set the identity set of the current principal on the attached
    /// sharing manager.
    pub fn set_security_identities(&self, sids: Vec<SecurityIdentity>) {
        if let Some(sharing) = &self.sharing {
            sharing.set_security_identities(sids);
        }
    }

    /// Check whether a subject type is under permission management (and,
    /// with a field, whether its config declares the field).
    pub fn is_managed(&self, subject: &SubjectIdentity, field: Option<&str>) -> bool {
        match self.registry.get_config(subject.type_name()) {
            Some(config) => field.map_or(true, |field| config.has_field(field)),
            None => false,
        }
    }

    /// Check whether every requested operation is granted to the identity
    /// set.
    ///
    /// The conjunction is vacuous: an empty operation list is granted. An
    /// operation neither declared by the config nor granted by a stored
    /// row or sharing entry is simply not granted, never an error.
    pub fn is_granted(
        &self,
        sids: &[SecurityIdentity],
        operations: &[&str],
        subject: Option<&SubjectIdentity>,
        field: Option<&str>,
    ) -> bool {
        if !self.enabled.get() {
            return true;
        }

        if let Some(sharing) = &self.sharing {
            if sharing.security_identities() != sids {
                sharing.set_security_identities(sids.to_vec());
            }
        }

        operations
            .iter()
            .all(|operation| self.is_granted_operation(sids, operation, subject, field))
    }

    fn is_granted_operation(
        &self,
        sids: &[SecurityIdentity],
        operation: &str,
        subject: Option<&SubjectIdentity>,
        field: Option<&str>,
    ) -> bool {
        let (effective, operation) = match subject {
            Some(subject) => {
                let (effective, operation) =
                    self.resolve_subject_operation(subject, operation, field);
                (Some(effective), operation)
            }
            None => (None, operation.to_string()),
        };

        let key = self.load_permissions(sids);

        {
            let cache = self.cache.borrow();
            let map = &cache[&key];

            let ctx = CheckContext {
                sids,
                subject: effective.as_ref(),
                field,
                operation: &operation,
                map,
            };
            if let Some(decision) = self.hooks.fire_check(&ctx) {
                return decision;
            }

            let class_key = scope_key(effective.as_ref().map(|subject| subject.type_name()));
            let granted = map
                .get(class_key)
                .and_then(|fields| fields.get(scope_key(field)))
                .is_some_and(|operations| operations.contains(&operation));
            if granted {
                return true;
            }
        }

        match (&self.sharing, effective.as_ref()) {
            (Some(sharing), Some(subject)) => sharing.is_granted(&operation, subject, field),
            _ => false,
        }
    }

    /// Re-target a subject at its master chain and translate the operation
    /// through the alias maps encountered on the way.
    ///
    /// A live object resolves through the registered accessor; a
    /// class-only subject substitutes the provider's master class. The
    /// walk stops at types without a config or master, or on an already
    /// visited type.
    fn resolve_subject_operation(
        &self,
        subject: &SubjectIdentity,
        operation: &str,
        field: Option<&str>,
    ) -> (SubjectIdentity, String) {
        let mut operation = operation.to_string();

        if let Some(config) = self.registry.get_config(subject.type_name()) {
            operation = match field.and_then(|field| config.field(field)) {
                Some(field_config) => field_config.mapping_permission(&operation).to_string(),
                None => config.mapping_permission(&operation).to_string(),
            };
        }

        let mut current = subject.clone();
        let mut visited = HashSet::new();
        while let Some(config) = self.registry.get_config(current.type_name()) {
            let Some(master) = config.master() else {
                break;
            };
            if !visited.insert(current.type_name().to_string()) {
                break;
            }
            if current.type_name() != subject.type_name() {
                operation = config.mapping_permission(&operation).to_string();
            }

            let next = current
                .object()
                .and_then(|object| master.resolve(&*object.borrow()))
                .or_else(|| {
                    self.provider
                        .get_master_class(config)
                        .map(SubjectIdentity::from_class)
                });
            match next {
                Some(next) => current = next,
                None => break,
            }
        }

        (current, operation)
    }

    /// Warm the caches for a batch of objects before per-field checks.
    ///
    /// Returns the subject identity of each object, in input order. The
    /// sharing preload covers the objects and their resolved masters in
    /// one provider lookup.
    pub fn preload_permissions(&self, objects: &[SharedObject]) -> Vec<SubjectIdentity> {
        let subjects: Vec<SubjectIdentity> =
            objects.iter().map(SubjectIdentity::from_object).collect();

        if let Some(sharing) = &self.sharing {
            let mut targets = subjects.clone();
            for subject in &subjects {
                let (effective, _) = self.resolve_subject_operation(subject, "", None);
                if effective != *subject {
                    targets.push(effective);
                }
            }
            sharing.preload(&targets);
        }

        subjects
    }

    /// Drop the sharing preloads of specific subjects.
    pub fn reset_preload(&self, subjects: &[SubjectIdentity]) {
        if let Some(sharing) = &self.sharing {
            sharing.reset_preload(subjects);
        }
    }

    /// Clear every cached permission map. The next check reloads from the
    /// provider.
    pub fn reset(&self) {
        self.cache.borrow_mut().clear();
        *self.config_rows.borrow_mut() = None;
        if let Some(sharing) = &self.sharing {
            sharing.clear();
        }
    }

    /// Load (or reuse) the permission map of an identity set, returning
    /// its cache key.
    fn load_permissions(&self, sids: &[SecurityIdentity]) -> String {
        let roles = role_identifiers(sids);
        let key = roles.join("|");

        if self.cache.borrow().contains_key(&key) {
            return key;
        }

        self.hooks.fire_pre_load(&PreLoadContext { roles: &roles });

        let rows = self.provider.get_permissions(&roles);
        debug!(roles = ?roles, rows = rows.len(), "loading permission map");

        let mut map = self.build_system_permissions();
        for row in rows {
            map.entry(scope_key(row.class.as_deref()).to_string())
                .or_default()
                .entry(scope_key(row.field.as_deref()).to_string())
                .or_default()
                .insert(row.operation);
        }

        self.hooks.fire_post_load(&mut PostLoadContext { roles: &roles, map: &mut map });

        self.cache.borrow_mut().insert(key.clone(), map);
        key
    }

    /// Seed a permission map with the system defaults: every operation
    /// declared by every registered config, at class and field scope.
    fn build_system_permissions(&self) -> PermissionMap {
        let mut map = PermissionMap::new();

        for config in self.registry.configs() {
            let class = map.entry(config.type_name().to_string()).or_default();

            class
                .entry(GLOBAL_SCOPE.to_string())
                .or_default()
                .extend(config.operations().iter().cloned());

            for field in config.fields() {
                class
                    .entry(field.field().to_string())
                    .or_default()
                    .extend(field.operations().iter().cloned());
            }
        }

        map
    }

    /// Load the role-independent config-shaped rows once.
    fn load_config_permissions(&self) {
        if self.config_rows.borrow().is_some() {
            return;
        }

        let rows = self.provider.get_config_permissions();
        debug!(rows = rows.len(), "loading config permissions");

        let mut map = PermissionMap::new();
        for row in &rows {
            map.entry(scope_key(row.class.as_deref()).to_string())
                .or_default()
                .entry(scope_key(row.field.as_deref()).to_string())
                .or_default()
                .insert(row.operation.clone());
        }

        self.cache.borrow_mut().insert(CONFIG_CLASS.to_string(), map);
        *self.config_rows.borrow_mut() = Some(rows);
    }

    fn config_permission(&self, operation: &str, field_level: bool) -> Option<Permission> {
        self.load_config_permissions();

        self.config_rows
            .borrow()
            .as_ref()
            .and_then(|rows| {
                rows.iter().find(|row| {
                    row.operation == operation
                        && row.class.as_deref() == Some(CONFIG_CLASS)
                        && if field_level {
                            row.field.as_deref() == Some(CONFIG_FIELD)
                        } else {
                            row.field.is_none()
                        }
                })
            })
            .cloned()
    }

    /// Check whether a config-shaped row declares the operation, at class
    /// or field level.
    pub fn is_config_permission(&self, operation: &str, field_level: bool) -> bool {
        self.load_config_permissions();

        let field_key = if field_level { CONFIG_FIELD } else { GLOBAL_SCOPE };
        self.cache
            .borrow()
            .get(CONFIG_CLASS)
            .and_then(|map| map.get(CONFIG_CLASS))
            .and_then(|fields| fields.get(field_key))
            .is_some_and(|operations| operations.contains(operation))
    }

    /// The sorted operation names of every config-shaped row.
    pub fn config_permission_operations(&self) -> Vec<String> {
        self.load_config_permissions();

        let rows = self.config_rows.borrow();
        let mut operations: Vec<String> = rows
            .iter()
            .flatten()
            .map(|row| row.operation.clone())
            .collect();
        operations.sort();
        operations.dedup();
        operations
    }

    /// A config-default grant of a master-typed subject holds iff the
    /// mapped operation is granted on the master subject for the role.
    fn is_config_granted(
        &self,
        role: &str,
        operation: &str,
        subject: Option<&SubjectIdentity>,
    ) -> bool {
        let Some(subject) = subject else {
            return true;
        };
        let Some(config) = self.registry.get_config(subject.type_name()) else {
            return true;
        };
        if config.master().is_none() {
            return true;
        }

        let (master, mapped) = self.resolve_subject_operation(subject, operation, None);
        if master == *subject {
            return true;
        }

        let sids = [SecurityIdentity::role(role)];
        self.is_granted(&sids, &[mapped.as_str()], Some(&master), None)
    }

    /// List the permissions of one role on a subject scope, with their
    /// computed decisions.
    ///
    /// Every operation declared by the scope's config appears exactly
    /// once: backed by a stored row of the role when one exists, otherwise
    /// synthesized from the config-shaped rows and flagged
    /// `config_default`.
    ///
    /// # Errors
    ///
    /// [`PermissionError::PermissionNotFound`] when a declared operation
    /// has neither a stored row nor a config-shaped row.
    pub fn get_role_permissions(
        &self,
        role: &str,
        subject: Option<&SubjectIdentity>,
        field: Option<&str>,
    ) -> PermissionResult<Vec<PermissionChecking>> {
        let config = subject.and_then(|subject| self.registry.get_config(subject.type_name()));

        let declared: Vec<String> = match (config, field) {
            (Some(config), Some(field)) => config
                .field(field)
                .map(|field_config| field_config.operations().to_vec())
                .unwrap_or_default(),
            (Some(config), None) => config.operations().to_vec(),
            (None, _) => self.config_permission_operations(),
        };

        let roles = vec![role.to_string()];
        let rows = self.provider.get_permissions_by_subject(subject, &roles);

        let mut checkings = Vec::with_capacity(declared.len());
        for operation in &declared {
            let stored = rows.iter().find(|row| {
                row.operation == *operation
                    && row.field.as_deref() == field
                    && match (row.class.as_deref(), subject) {
                        (None, _) => true,
                        (Some(class), Some(subject)) => class == subject.type_name(),
                        (Some(_), None) => false,
                    }
            });

            if let Some(row) = stored {
                checkings.push(PermissionChecking {
                    permission: row.clone(),
                    granted: true,
                    config_default: false,
                });
            } else if let Some(row) = self.config_permission(operation, field.is_some()) {
                checkings.push(PermissionChecking {
                    granted: self.is_config_granted(role, operation, subject),
                    permission: row,
                    config_default: true,
                });
            } else {
                return Err(PermissionError::PermissionNotFound {
                    operation: operation.clone(),
                    class: subject.map(|subject| subject.type_name().to_string()),
                    field: field.map(str::to_string),
                });
            }
        }

        Ok(checkings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MasterConfig, PermissionConfig, PermissionFieldConfig};
    use crate::model::SharingEntry;
    use crate::provider::{MemoryPermissionProvider, MemorySharingProvider};
    use crate::sharing::SharingIdentityConfig;
    use gatekit_identity::{IdentityKind, ObjectInstance};
    use serde_json::json;

    fn document_registry() -> ConfigRegistry {
        let mut registry = ConfigRegistry::new();
        registry.register(
            PermissionConfig::new("document")
                .with_operations(&["read"])
                .with_alias("view", "read")
                .with_field(
                    PermissionFieldConfig::new("title")
                        .with_operations(&["read"])
                        .with_alias("view", "read"),
                )
                .with_field(PermissionFieldConfig::new("body")),
        );
        registry
    }

    fn manager(provider: MemoryPermissionProvider) -> PermissionManager {
        PermissionManager::new(Rc::new(provider), document_registry(), None).unwrap()
    }

    #[test]
    fn test_config_declared_operations_default_granted() {
        let manager = manager(MemoryPermissionProvider::new());
        let sids = [SecurityIdentity::role("ROLE_USER")];
        let subject = SubjectIdentity::from_class("document");

        assert!(manager.is_granted(&sids, &["read"], Some(&subject), None));
        assert!(manager.is_granted(&sids, &["read"], Some(&subject), Some("title")));
        assert!(!manager.is_granted(&sids, &["edit"], Some(&subject), None));
        assert!(!manager.is_granted(&sids, &["read"], Some(&subject), Some("body")));
    }

    #[test]
    fn test_vacuous_conjunction() {
        let manager = manager(MemoryPermissionProvider::new());
        let sids = [SecurityIdentity::role("ROLE_USER")];

        assert!(manager.is_granted(&sids, &[], None, None));
        assert!(manager.is_granted(&sids, &[], Some(&SubjectIdentity::from_class("document")), None));
    }

    #[test]
    fn test_stored_row_grants_per_role() {
        let manager = manager(
            MemoryPermissionProvider::new().with_permission(
                Permission::for_class("document", "publish").with_role("ROLE_EDITOR"),
            ),
        );
        let subject = SubjectIdentity::from_class("document");

        let editor = [SecurityIdentity::role("ROLE_EDITOR")];
        let reader = [SecurityIdentity::role("ROLE_USER")];
        assert!(manager.is_granted(&editor, &["publish"], Some(&subject), None));
        assert!(!manager.is_granted(&reader, &["publish"], Some(&subject), None));

        // conjunction over operations
        assert!(manager.is_granted(&editor, &["read", "publish"], Some(&subject), None));
        assert!(!manager.is_granted(&editor, &["read", "delete"], Some(&subject), None));
    }

    #[test]
    fn test_alias_translation() {
        let manager = manager(MemoryPermissionProvider::new());
        let sids = [SecurityIdentity::role("ROLE_USER")];
        let subject = SubjectIdentity::from_class("document");

        assert!(manager.is_granted(&sids, &["view"], Some(&subject), None));
        assert!(manager.is_granted(&sids, &["view"], Some(&subject), Some("title")));
    }

    #[test]
    fn test_cache_loaded_once_per_role_set() {
        let provider = Rc::new(MemoryPermissionProvider::new());
        let manager = PermissionManager::new(
            Rc::clone(&provider) as Rc<dyn PermissionProvider>,
            document_registry(),
            None,
        )
        .unwrap();
        let subject = SubjectIdentity::from_class("document");

        let sids = [
            SecurityIdentity::role("ROLE_B"),
            SecurityIdentity::role("ROLE_A"),
            SecurityIdentity::user("alice"),
        ];
        manager.is_granted(&sids, &["read"], Some(&subject), None);
        manager.is_granted(&sids, &["edit"], Some(&subject), None);
        manager.is_granted(&sids, &["read"], Some(&subject), Some("title"));
        assert_eq!(provider.stats().get_permissions_calls, 1);

        // same roles in another order and without the user identity hit the
        // same entry
        let reordered = [SecurityIdentity::role("ROLE_A"), SecurityIdentity::role("ROLE_B")];
        manager.is_granted(&reordered, &["read"], Some(&subject), None);
        assert_eq!(provider.stats().get_permissions_calls, 1);

        let other = [SecurityIdentity::role("ROLE_C")];
        manager.is_granted(&other, &["read"], Some(&subject), None);
        assert_eq!(provider.stats().get_permissions_calls, 2);

        manager.reset();
        manager.is_granted(&reordered, &["read"], Some(&subject), None);
        assert_eq!(provider.stats().get_permissions_calls, 3);
    }

    #[test]
    fn test_disabled_manager_grants_everything() {
        let manager = manager(MemoryPermissionProvider::new());
        let sids = [SecurityIdentity::role("ROLE_USER")];
        let subject = SubjectIdentity::from_class("document");

        assert!(!manager.is_granted(&sids, &["delete"], Some(&subject), None));

        manager.disable();
        assert!(!manager.is_enabled());
        assert!(manager.is_granted(&sids, &["delete"], Some(&subject), None));

        manager.enable();
        assert!(!manager.is_granted(&sids, &["delete"], Some(&subject), None));
    }

    #[test]
    fn test_is_managed() {
        let manager = manager(MemoryPermissionProvider::new());

        let document = SubjectIdentity::from_class("document");
        assert!(manager.is_managed(&document, None));
        assert!(manager.is_managed(&document, Some("title")));
        assert!(!manager.is_managed(&document, Some("missing")));
        assert!(!manager.is_managed(&SubjectIdentity::from_class("meeting"), None));
    }

    #[test]
    fn test_check_hook_short_circuits() {
        let provider = Rc::new(MemoryPermissionProvider::new());
        let mut manager = PermissionManager::new(
            Rc::clone(&provider) as Rc<dyn PermissionProvider>,
            document_registry(),
            None,
        )
        .unwrap();
        manager.hooks_mut().on_check(|ctx| match ctx.operation {
            "read" => Some(false),
            "audit" => Some(true),
            _ => None,
        });

        let sids = [SecurityIdentity::role("ROLE_USER")];
        let subject = SubjectIdentity::from_class("document");

        // the hook overrides the config default and grants an undeclared op
        assert!(!manager.is_granted(&sids, &["read"], Some(&subject), None));
        assert!(manager.is_granted(&sids, &["audit"], Some(&subject), None));
        assert!(!manager.is_granted(&sids, &["delete"], Some(&subject), None));
    }

    #[test]
    fn test_post_load_hook_rewrites_map() {
        let mut manager = manager(MemoryPermissionProvider::new());
        manager.hooks_mut().on_post_load(|ctx| {
            ctx.map
                .entry("document".to_string())
                .or_default()
                .entry("_global".to_string())
                .or_default()
                .insert("archive".to_string());
        });

        let sids = [SecurityIdentity::role("ROLE_USER")];
        let subject = SubjectIdentity::from_class("document");
        assert!(manager.is_granted(&sids, &["archive"], Some(&subject), None));
    }

    #[test]
    fn test_master_cycle_rejected_at_construction() {
        let mut registry = ConfigRegistry::new();
        registry.register(
            PermissionConfig::new("task").with_master(MasterConfig::by_field("parent", "project")),
        );
        registry.register(
            PermissionConfig::new("project").with_master(MasterConfig::by_field("owner", "task")),
        );

        let err = PermissionManager::new(Rc::new(MemoryPermissionProvider::new()), registry, None)
            .unwrap_err();

        assert!(matches!(err, PermissionError::MasterCycle(_)));
    }

    #[test]
    fn test_master_cascade_through_sharing() {
        let mut registry = ConfigRegistry::new();
        registry.register(
            PermissionConfig::new("task").with_master(MasterConfig::by_field("parent", "project")),
        );
        registry.register(PermissionConfig::new("project"));

        let sharing_provider = Rc::new(MemorySharingProvider::new().with_entry(
            SharingEntry::new("project", "9")
                .with_identity(SecurityIdentity::user("alice"))
                .with_permission(Permission::new("edit")),
        ));
        let sharing = Rc::new(
            SharingManager::new(Rc::clone(&sharing_provider) as Rc<dyn crate::SharingProvider>)
                .with_subject_type("project")
                .with_identity_config(SharingIdentityConfig::new(IdentityKind::User, "user")),
        );

        let manager = PermissionManager::new(
            Rc::new(MemoryPermissionProvider::new()),
            registry,
            Some(sharing),
        )
        .unwrap();

        let task = ObjectInstance::new("task", "1").with_field("parent", json!("9")).shared();
        let subject = SubjectIdentity::from_object(&task);

        let alice = [SecurityIdentity::user("alice")];
        let bob = [SecurityIdentity::user("bob")];
        assert!(manager.is_granted(&alice, &["edit"], Some(&subject), None));
        assert!(!manager.is_granted(&bob, &["edit"], Some(&subject), None));

        // a task pointing at an unshared project is denied
        let stray = ObjectInstance::new("task", "2").with_field("parent", json!("8")).shared();
        let stray_subject = SubjectIdentity::from_object(&stray);
        assert!(!manager.is_granted(&alice, &["edit"], Some(&stray_subject), None));
    }

    #[test]
    fn test_preload_batches_sharing_lookups() {
        let sharing_provider = Rc::new(MemorySharingProvider::new().with_entry(
            SharingEntry::new("document", "7")
                .with_identity(SecurityIdentity::user("alice"))
                .with_permission(Permission::new("edit")),
        ));
        let sharing = Rc::new(
            SharingManager::new(Rc::clone(&sharing_provider) as Rc<dyn crate::SharingProvider>)
                .with_subject_type("document")
                .with_identity_config(SharingIdentityConfig::new(IdentityKind::User, "user")),
        );

        let manager = PermissionManager::new(
            Rc::new(MemoryPermissionProvider::new()),
            document_registry(),
            Some(sharing),
        )
        .unwrap();

        let alice = vec![SecurityIdentity::user("alice")];
        manager.set_security_identities(alice.clone());

        let objects: Vec<SharedObject> = (7..10)
            .map(|id| ObjectInstance::new("document", id.to_string()).shared())
            .collect();
        let subjects = manager.preload_permissions(&objects);
        assert_eq!(subjects.len(), 3);
        assert_eq!(sharing_provider.stats().get_sharing_entries_calls, 1);

        // per-object checks hit the preloaded cache
        assert!(manager.is_granted(&alice, &["edit"], Some(&subjects[0]), None));
        assert!(!manager.is_granted(&alice, &["edit"], Some(&subjects[1]), None));
        assert!(!manager.is_granted(&alice, &["edit"], Some(&subjects[2]), None));
        assert_eq!(sharing_provider.stats().get_sharing_entries_calls, 1);

        manager.reset_preload(&subjects);
        assert!(manager.is_granted(&alice, &["edit"], Some(&subjects[0]), None));
        assert_eq!(sharing_provider.stats().get_sharing_entries_calls, 2);
    }

    #[test]
    fn test_role_permission_listing() {
        let mut registry = ConfigRegistry::new();
        registry.register(PermissionConfig::new("document").with_operations(&["read", "edit"]));

        let provider = MemoryPermissionProvider::new()
            .with_permission(Permission::for_class("document", "edit").with_role("ROLE_EDITOR"))
            .with_config_permission(Permission::config("read"));

        let manager = PermissionManager::new(Rc::new(provider), registry, None).unwrap();
        let subject = SubjectIdentity::from_class("document");

        let checkings = manager
            .get_role_permissions("ROLE_EDITOR", Some(&subject), None)
            .unwrap();

        assert_eq!(checkings.len(), 2);

        let read = &checkings[0];
        assert_eq!(read.permission.operation, "read");
        assert!(read.granted);
        assert!(read.config_default);

        let edit = &checkings[1];
        assert_eq!(edit.permission.operation, "edit");
        assert!(edit.granted);
        assert!(!edit.config_default);
    }

    #[test]
    fn test_role_permission_listing_missing_definition() {
        let mut registry = ConfigRegistry::new();
        registry.register(PermissionConfig::new("document").with_operations(&["publish"]));

        let manager =
            PermissionManager::new(Rc::new(MemoryPermissionProvider::new()), registry, None)
                .unwrap();
        let subject = SubjectIdentity::from_class("document");

        let err = manager
            .get_role_permissions("ROLE_EDITOR", Some(&subject), None)
            .unwrap_err();

        assert!(matches!(
            err,
            PermissionError::PermissionNotFound { ref operation, .. } if operation == "publish"
        ));
    }

    #[test]
    fn test_config_permission_operations_sorted() {
        let provider = MemoryPermissionProvider::new()
            .with_config_permission(Permission::config("read"))
            .with_config_permission(Permission::config("create"))
            .with_config_permission(Permission::config_field("read"));

        let manager =
            PermissionManager::new(Rc::new(provider), ConfigRegistry::new(), None).unwrap();

        assert_eq!(manager.config_permission_operations(), vec!["create", "read"]);
        assert!(manager.is_config_permission("read", false));
        assert!(manager.is_config_permission("read", true));
        assert!(!manager.is_config_permission("create", true));
    }
}
