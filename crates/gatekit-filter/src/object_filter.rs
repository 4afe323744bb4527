//! # Object filter
//!
//! Blanks the fields a principal may not see and rolls back the field
//! changes they may not make, directly on live objects.
//!
//! The filter is transactional: inside a transaction, `filter` and
//! `restore` only queue; `commit` warms the permission caches for the
//! whole batch in one preload, fires the commit hooks, then does the
//! per-object work. Outside a transaction each call wraps itself in an
//! implicit single-object batch.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use serde_json::Value;
use tracing::debug;

use gatekit_identity::{FieldVote, SharedObject, SubjectIdentity};
use gatekit_permission::PermissionManager;

use crate::checker::{AuthorizationChecker, EDIT_OPERATION, VIEW_OPERATION};
use crate::hooks::{FilterHooks, RestoreContext};
use crate::tracker::ChangeTracker;
use crate::value_filter::ValueFilter;

/// The transactional field filter/restore engine.
///
/// # Example
///
/// ```
/// use std::rc::Rc;
/// use gatekit_identity::{ObjectInstance, SecurityIdentity};
/// use gatekit_permission::{
///     ConfigRegistry, MemoryPermissionProvider, PermissionConfig, PermissionFieldConfig,
///     PermissionManager,
/// };
/// use gatekit_filter::{
///     ManagerAuthorizationChecker, NeutralValueFilter, ObjectFilter, SnapshotTracker,
/// };
/// use serde_json::json;
///
/// let mut registry = ConfigRegistry::new();
/// registry.register(
///     PermissionConfig::new("document")
///         .with_field(PermissionFieldConfig::new("title").with_operations(&["read"])),
/// );
/// let manager = Rc::new(
///     PermissionManager::new(Rc::new(MemoryPermissionProvider::new()), registry, None).unwrap(),
/// );
/// let checker = Rc::new(ManagerAuthorizationChecker::new(
///     Rc::clone(&manager),
///     vec![SecurityIdentity::role("ROLE_USER")],
/// ));
/// let filter = ObjectFilter::new(
///     manager,
///     checker,
///     Rc::new(SnapshotTracker::new()),
///     Box::new(NeutralValueFilter),
/// );
///
/// let doc = ObjectInstance::new("document", "7")
///     .with_field("title", json!("visible"))
///     .with_field("secret", json!("hidden"))
///     .shared();
/// filter.filter(&doc);
///
/// assert_eq!(doc.borrow().field_value("title"), json!("visible"));
/// assert_eq!(doc.borrow().field_value("secret"), json!(null));
/// ```
pub struct ObjectFilter {
    manager: Rc<PermissionManager>,
    checker: Rc<dyn AuthorizationChecker>,
    tracker: Rc<dyn ChangeTracker>,
    value_filter: Box<dyn ValueFilter>,
    hooks: FilterHooks,
    excluded: HashSet<String>,
    transactional: Cell<bool>,
    to_filter: RefCell<Vec<SharedObject>>,
    to_restore: RefCell<Vec<SharedObject>>,
}

impl ObjectFilter {
    /// Create a filter over its collaborators.
    pub fn new(
        manager: Rc<PermissionManager>,
        checker: Rc<dyn AuthorizationChecker>,
        tracker: Rc<dyn ChangeTracker>,
        value_filter: Box<dyn ValueFilter>,
    ) -> Self {
        Self {
            manager,
            checker,
            tracker,
            value_filter,
            hooks: FilterHooks::new(),
            excluded: HashSet::new(),
            transactional: Cell::new(false),
            to_filter: RefCell::new(Vec::new()),
            to_restore: RefCell::new(Vec::new()),
        }
    }

    /// Get the registered hooks, for registration before the filter is
    /// shared.
    pub fn hooks_mut(&mut self) -> &mut FilterHooks {
        &mut self.hooks
    }

    /// Exclude object types from filtering and restoring entirely. An
    /// excluded object is returned untouched without any permission work.
    pub fn set_excluded_classes(&mut self, types: &[&str]) {
        self.excluded = types.iter().map(|name| name.to_string()).collect();
    }

    /// Whether a transaction is open.
    pub fn is_transactional(&self) -> bool {
        self.transactional.get()
    }

    /// Open a transaction. Only one flat batch exists at a time: beginning
    /// again inside a transaction merges into the pending batch.
    pub fn begin_transaction(&self) {
        self.transactional.set(true);
    }

    /// Commit the pending batch: one permission preload over the
    /// accumulated objects, pre-commit hooks, the per-object work,
    /// post-commit hooks, then the batch is cleared. Committing while idle
    /// runs the same sequence over empty lists.
    pub fn commit(&self) {
        self.do_commit();
        self.transactional.set(false);
    }

    /// Queue an object for field filtering. Outside a transaction the
    /// object is filtered immediately as a single-object batch.
    pub fn filter(&self, object: &SharedObject) {
        if self.is_excluded(object) {
            return;
        }

        self.tracker.attach(object);
        self.to_filter.borrow_mut().push(Rc::clone(object));

        if !self.transactional.get() {
            self.do_commit();
        }
    }

    /// Queue an object for restoring. Outside a transaction the object is
    /// restored immediately as a single-object batch.
    pub fn restore(&self, object: &SharedObject) {
        if self.is_excluded(object) {
            return;
        }

        self.to_restore.borrow_mut().push(Rc::clone(object));

        if !self.transactional.get() {
            self.do_commit();
        }
    }

    fn is_excluded(&self, object: &SharedObject) -> bool {
        self.excluded.contains(object.borrow().type_name())
    }

    fn do_commit(&self) {
        let filter_batch = std::mem::take(&mut *self.to_filter.borrow_mut());
        let restore_batch = std::mem::take(&mut *self.to_restore.borrow_mut());

        let mut objects: Vec<SharedObject> =
            Vec::with_capacity(filter_batch.len() + restore_batch.len());
        objects.extend(filter_batch.iter().cloned());
        objects.extend(restore_batch.iter().cloned());

        debug!(
            filtering = filter_batch.len(),
            restoring = restore_batch.len(),
            "committing object filter batch"
        );

        self.manager.preload_permissions(&objects);
        self.hooks.fire_pre_commit(&objects);

        for object in &filter_batch {
            self.do_filter(object);
        }
        for object in &restore_batch {
            self.do_restore(object);
        }

        self.hooks.fire_post_commit(&objects);
    }

    fn do_filter(&self, object: &SharedObject) {
        let subject = SubjectIdentity::from_object(object);
        let object_view = self.hooks.fire_object_view(&subject);

        // read everything up front; decisions may follow the object's own
        // field values (master accessors) and must not hold a borrow
        let fields: Vec<(String, Value)> = {
            let object = object.borrow();
            object
                .field_names()
                .into_iter()
                .map(|field| {
                    let value = object.field_value(&field);
                    (field, value)
                })
                .collect()
        };

        for (field, value) in fields {
            if value.is_null() {
                continue;
            }

            let visible = match object_view {
                Some(false) => false,
                _ => {
                    let vote = FieldVote::new(subject.clone(), field.as_str());
                    self.hooks
                        .fire_field_view(&vote)
                        .unwrap_or_else(|| self.checker.is_granted(VIEW_OPERATION, &vote))
                }
            };

            if !visible {
                let filtered = self.value_filter.filter_value(&value);
                object.borrow_mut().set_field_value(&field, filtered);
            }
        }
    }

    fn do_restore(&self, object: &SharedObject) {
        let subject = SubjectIdentity::from_object(object);
        let changes = self.tracker.change_set(object);

        for (field, change) in changes {
            let vote = FieldVote::new(subject.clone(), field.as_str());
            let ctx = RestoreContext {
                vote: &vote,
                old: &change.old,
                new: &change.new,
            };

            let view = self
                .hooks
                .fire_restore_view(&ctx)
                .unwrap_or_else(|| self.checker.is_granted(VIEW_OPERATION, &vote));
            let keep = view
                && self
                    .hooks
                    .fire_restore_edit(&ctx)
                    .unwrap_or_else(|| self.checker.is_granted(EDIT_OPERATION, &vote));

            if !keep {
                object.borrow_mut().set_field_value(&field, change.old.clone());
            }
        }
    }
}
