//! # Authorization checker
//!
//! The single primitive the object filter asks its security questions
//! through. Keeping it a trait lets tests and integrations substitute
//! their own decision source for the permission manager.

use std::cell::RefCell;
use std::rc::Rc;

use gatekit_identity::{FieldVote, SecurityIdentity};
use gatekit_permission::PermissionManager;

/// The operation checked before a field may be seen.
pub const VIEW_OPERATION: &str = "read";

/// The operation checked before a field change may be kept.
pub const EDIT_OPERATION: &str = "edit";

/// Answers field-scoped permission checks for the current principal.
pub trait AuthorizationChecker {
    /// Whether the current principal is granted the operation on the
    /// field-scoped subject.
    fn is_granted(&self, operation: &str, vote: &FieldVote) -> bool;
}

/// [`AuthorizationChecker`] backed by a [`PermissionManager`] and a
/// request-scoped identity set.
pub struct ManagerAuthorizationChecker {
    manager: Rc<PermissionManager>,
    sids: RefCell<Vec<SecurityIdentity>>,
}

impl ManagerAuthorizationChecker {
    /// Create a checker for an identity set.
    pub fn new(manager: Rc<PermissionManager>, sids: Vec<SecurityIdentity>) -> Self {
        Self {
            manager,
            sids: RefCell::new(sids),
        }
    }

    /// Replace the identity set, e.g. on principal switch.
    pub fn set_security_identities(&self, sids: Vec<SecurityIdentity>) {
        *self.sids.borrow_mut() = sids;
    }

    /// Get the current identity set.
    pub fn security_identities(&self) -> Vec<SecurityIdentity> {
        self.sids.borrow().clone()
    }
}

impl AuthorizationChecker for ManagerAuthorizationChecker {
    fn is_granted(&self, operation: &str, vote: &FieldVote) -> bool {
        let sids = self.sids.borrow().clone();
        self.manager
            .is_granted(&sids, &[operation], Some(vote.subject()), Some(vote.field()))
    }
}
