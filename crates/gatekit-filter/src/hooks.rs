//! # Filter hooks
//!
//! Extension points of the object filter, fired in registration order.
//! The decision hooks may force-grant or force-deny a single check
//! without consulting the authorization checker; the first hook returning
//! a decision wins. The commit hooks only observe.

use std::fmt;

use serde_json::Value;

use gatekit_identity::{FieldVote, SharedObject, SubjectIdentity};

/// Context of a restore decision: the field vote and both values.
pub struct RestoreContext<'a> {
    /// The field being restored.
    pub vote: &'a FieldVote,
    /// The value at attach time.
    pub old: &'a Value,
    /// The value the caller wrote.
    pub new: &'a Value,
}

type ObjectViewHook = Box<dyn Fn(&SubjectIdentity) -> Option<bool>>;
type FieldViewHook = Box<dyn Fn(&FieldVote) -> Option<bool>>;
type RestoreHook = Box<dyn Fn(&RestoreContext<'_>) -> Option<bool>>;
type CommitHook = Box<dyn Fn(&[SharedObject])>;

/// The registered hooks of an object filter.
#[derive(Default)]
pub struct FilterHooks {
    object_view: Vec<ObjectViewHook>,
    field_view: Vec<FieldViewHook>,
    restore_view: Vec<RestoreHook>,
    restore_edit: Vec<RestoreHook>,
    pre_commit: Vec<CommitHook>,
    post_commit: Vec<CommitHook>,
}

impl fmt::Debug for FilterHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterHooks")
            .field("object_view", &self.object_view.len())
            .field("field_view", &self.field_view.len())
            .field("restore_view", &self.restore_view.len())
            .field("restore_edit", &self.restore_edit.len())
            .field("pre_commit", &self.pre_commit.len())
            .field("post_commit", &self.post_commit.len())
            .finish()
    }
}

impl FilterHooks {
    /// Create an empty hook set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an object-level view hook. Denying filters every field of
    /// the object without per-field checks.
    pub fn on_object_view(&mut self, hook: impl Fn(&SubjectIdentity) -> Option<bool> + 'static) {
        self.object_view.push(Box::new(hook));
    }

    /// Register a field-level view hook, bypassing the authorization
    /// checker for that field when it decides.
    pub fn on_field_view(&mut self, hook: impl Fn(&FieldVote) -> Option<bool> + 'static) {
        self.field_view.push(Box::new(hook));
    }

    /// Register a view hook for restore decisions.
    pub fn on_restore_view(&mut self, hook: impl Fn(&RestoreContext<'_>) -> Option<bool> + 'static) {
        self.restore_view.push(Box::new(hook));
    }

    /// Register an edit hook for restore decisions.
    pub fn on_restore_edit(&mut self, hook: impl Fn(&RestoreContext<'_>) -> Option<bool> + 'static) {
        self.restore_edit.push(Box::new(hook));
    }

    /// Register a pre-commit observer carrying the accumulated objects.
    pub fn on_pre_commit(&mut self, hook: impl Fn(&[SharedObject]) + 'static) {
        self.pre_commit.push(Box::new(hook));
    }

    /// Register a post-commit observer carrying the accumulated objects.
    pub fn on_post_commit(&mut self, hook: impl Fn(&[SharedObject]) + 'static) {
        self.post_commit.push(Box::new(hook));
    }

    pub(crate) fn fire_object_view(&self, subject: &SubjectIdentity) -> Option<bool> {
        self.object_view.iter().find_map(|hook| hook(subject))
    }

    pub(crate) fn fire_field_view(&self, vote: &FieldVote) -> Option<bool> {
        self.field_view.iter().find_map(|hook| hook(vote))
    }

    pub(crate) fn fire_restore_view(&self, ctx: &RestoreContext<'_>) -> Option<bool> {
        self.restore_view.iter().find_map(|hook| hook(ctx))
    }

    pub(crate) fn fire_restore_edit(&self, ctx: &RestoreContext<'_>) -> Option<bool> {
        self.restore_edit.iter().find_map(|hook| hook(ctx))
    }

    pub(crate) fn fire_pre_commit(&self, objects: &[SharedObject]) {
        for hook in &self.pre_commit {
            hook(objects);
        }
    }

    pub(crate) fn fire_post_commit(&self, objects: &[SharedObject]) {
        for hook in &self.post_commit {
            hook(objects);
        }
    }
}
