//! # Permission hooks
//!
//! Extension points of the permission manager, registered as plain
//! closures and fired in registration order:
//!
//! - pre-load hooks observe a cache load before the provider is hit
//! - post-load hooks may rewrite the freshly built permission map
//! - check hooks may decide a permission check before the map is consulted;
//!   the first hook returning a decision wins and the rest never run
//!
//! Check hooks run while the manager's cache is borrowed, so they must not
//! call back into the manager.

use std::fmt;

use gatekit_identity::{SecurityIdentity, SubjectIdentity};

use crate::model::PermissionMap;

/// Context of a pre-load hook: the role identifiers about to be loaded.
#[derive(Debug)]
pub struct PreLoadContext<'a> {
    /// The sorted role identifiers of the identity set being loaded.
    pub roles: &'a [String],
}

/// Context of a post-load hook: the freshly built permission map, open for
/// rewriting.
pub struct PostLoadContext<'a> {
    /// The sorted role identifiers the map was built for.
    pub roles: &'a [String],
    /// The permission map about to be cached.
    pub map: &'a mut PermissionMap,
}

/// Context of a check hook: everything known about the check being decided.
pub struct CheckContext<'a> {
    /// The identity set performing the check.
    pub sids: &'a [SecurityIdentity],
    /// The subject being checked, `None` for global checks.
    pub subject: Option<&'a SubjectIdentity>,
    /// The field the check is narrowed to, if any.
    pub field: Option<&'a str>,
    /// The operation, already alias-translated.
    pub operation: &'a str,
    /// The loaded permission map of the identity set.
    pub map: &'a PermissionMap,
}

type PreLoadHook = Box<dyn Fn(&PreLoadContext<'_>)>;
type PostLoadHook = Box<dyn Fn(&mut PostLoadContext<'_>)>;
type CheckHook = Box<dyn Fn(&CheckContext<'_>) -> Option<bool>>;

/// The registered hooks of a permission manager.
#[derive(Default)]
pub struct PermissionHooks {
    pre_load: Vec<PreLoadHook>,
    post_load: Vec<PostLoadHook>,
    check: Vec<CheckHook>,
}

impl fmt::Debug for PermissionHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionHooks")
            .field("pre_load", &self.pre_load.len())
            .field("post_load", &self.post_load.len())
            .field("check", &self.check.len())
            .finish()
    }
}

impl PermissionHooks {
    /// Create an empty hook set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pre-load hook.
    pub fn on_pre_load(&mut self, hook: impl Fn(&PreLoadContext<'_>) + 'static) {
        self.pre_load.push(Box::new(hook));
    }

    /// Register a post-load hook.
    pub fn on_post_load(&mut self, hook: impl Fn(&mut PostLoadContext<'_>) + 'static) {
        self.post_load.push(Box::new(hook));
    }

    /// Register a check hook. Return `Some(decision)` to decide the check,
    /// `None` to abstain.
    pub fn on_check(&mut self, hook: impl Fn(&CheckContext<'_>) -> Option<bool> + 'static) {
        self.check.push(Box::new(hook));
    }

    pub(crate) fn fire_pre_load(&self, ctx: &PreLoadContext<'_>) {
        for hook in &self.pre_load {
            hook(ctx);
        }
    }

    pub(crate) fn fire_post_load(&self, ctx: &mut PostLoadContext<'_>) {
        for hook in &self.post_load {
            hook(ctx);
        }
    }

    /// Fire the check hooks in order; the first non-abstaining decision
    /// wins.
    pub(crate) fn fire_check(&self, ctx: &CheckContext<'_>) -> Option<bool> {
        self.check.iter().find_map(|hook| hook(ctx))
    }
}
