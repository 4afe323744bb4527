//! # Gatekit Filter
//!
//! Field-level enforcement on live objects, built on the gatekit
//! permission engine: blank out what the principal may not see, roll back
//! what they may not change.
//!
//! ## Overview
//!
//! The [`ObjectFilter`] works on [`gatekit_identity::SharedObject`]
//! handles in two directions:
//!
//! - **filter**: every field the current identities may not view is
//!   replaced by a neutral value produced by the pluggable [`ValueFilter`]
//!   (collections empty out, scalars null out).
//! - **restore**: every field change the tracker reports is kept only
//!   when the identities may both view and edit the field; otherwise the
//!   previous value is written back.
//!
//! Both directions batch: inside a transaction the objects accumulate,
//! and `commit` issues a single permission preload for the whole batch
//! before any per-field check runs.
//!
//! Decisions flow through the [`AuthorizationChecker`] seam, with
//! [`FilterHooks`] as force-grant/force-deny extension points in front of
//! it.
//!
//! ## Usage
//!
//! ```rust
//! use std::rc::Rc;
//! use gatekit_identity::{ObjectInstance, SecurityIdentity};
//! use gatekit_permission::{
//!     ConfigRegistry, MemoryPermissionProvider, PermissionConfig, PermissionFieldConfig,
//!     PermissionManager,
//! };
//! use gatekit_filter::{
//!     ManagerAuthorizationChecker, NeutralValueFilter, ObjectFilter, SnapshotTracker,
//! };
//! use serde_json::json;
//!
//! let mut registry = ConfigRegistry::new();
//! registry.register(
//!     PermissionConfig::new("document")
//!         .with_field(PermissionFieldConfig::new("title").with_operations(&["read"])),
//! );
//! let manager = Rc::new(
//!     PermissionManager::new(Rc::new(MemoryPermissionProvider::new()), registry, None).unwrap(),
//! );
//! let checker = Rc::new(ManagerAuthorizationChecker::new(
//!     Rc::clone(&manager),
//!     vec![SecurityIdentity::role("ROLE_USER")],
//! ));
//! let filter = ObjectFilter::new(
//!     manager,
//!     checker,
//!     Rc::new(SnapshotTracker::new()),
//!     Box::new(NeutralValueFilter),
//! );
//!
//! let doc = ObjectInstance::new("document", "7")
//!     .with_field("title", json!("visible"))
//!     .with_field("secret", json!("hidden"))
//!     .shared();
//! filter.filter(&doc);
//!
//! assert_eq!(doc.borrow().field_value("secret"), json!(null));
//! ```

pub mod checker;
pub mod hooks;
pub mod object_filter;
pub mod tracker;
pub mod value_filter;

// Re-export main types for convenience
pub use checker::{
    AuthorizationChecker, ManagerAuthorizationChecker, EDIT_OPERATION, VIEW_OPERATION,
};
pub use hooks::{FilterHooks, RestoreContext};
pub use object_filter::ObjectFilter;
pub use tracker::{ChangeTracker, FieldChange, SnapshotTracker};
pub use value_filter::{NeutralValueFilter, ValueFilter, ZeroValueRegistry};
