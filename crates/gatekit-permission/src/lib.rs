//! # Gatekit Permission
//!
//! The permission decision engine: per-type operation configs, an
//! identity-set-keyed permission cache, and instance-level sharing grants.
//!
//! ## Overview
//!
//! A check asks "may this identity set perform these operations on this
//! subject (or one of its fields)?". The [`PermissionManager`] answers it
//! through a strictly ordered chain:
//!
//! 1. **Master resolution**: a subject whose config declares a master
//!    mapping is re-targeted at its parent resource, and the operation is
//!    translated through the alias maps on the way.
//! 2. **Permission map**: the map of the identity set is loaded once per
//!    distinct role set: config-declared operations seed it as defaults,
//!    stored rows from the [`PermissionProvider`] overlay them, and hooks
//!    may rewrite the result.
//! 3. **Check hooks**: registered callbacks may decide a single check
//!    before the map is consulted.
//! 4. **Sharing**: when the map does not grant, the [`SharingManager`]
//!    resolves ad-hoc grants on the exact subject instance.
//!
//! Denials are booleans; errors are reserved for broken configuration.
//!
//! ## Usage
//!
//! ```rust
//! use std::rc::Rc;
//! use gatekit_identity::{SecurityIdentity, SubjectIdentity};
//! use gatekit_permission::{
//!     ConfigRegistry, MemoryPermissionProvider, Permission, PermissionConfig, PermissionManager,
//! };
//!
//! let provider = Rc::new(
//!     MemoryPermissionProvider::new()
//!         .with_permission(Permission::for_class("document", "publish").with_role("ROLE_EDITOR")),
//! );
//!
//! let mut registry = ConfigRegistry::new();
//! registry.register(PermissionConfig::new("document").with_operations(&["read"]));
//!
//! let manager = PermissionManager::new(provider, registry, None).unwrap();
//!
//! let editor = [SecurityIdentity::role("ROLE_EDITOR")];
//! let subject = SubjectIdentity::from_class("document");
//! assert!(manager.is_granted(&editor, &["read", "publish"], Some(&subject), None));
//! ```

pub mod config;
pub mod error;
pub mod hooks;
pub mod manager;
pub mod model;
pub mod provider;
pub mod sharing;

// Re-export main types for convenience
pub use config::{
    ConfigRegistry, MasterAccessor, MasterConfig, PermissionConfig, PermissionFieldConfig,
};
pub use error::{PermissionError, PermissionResult};
pub use hooks::{CheckContext, PermissionHooks, PostLoadContext, PreLoadContext};
pub use manager::PermissionManager;
pub use model::{
    scope_key, Permission, PermissionChecking, PermissionMap, SharingEntry, CONFIG_CLASS,
    CONFIG_FIELD, GLOBAL_SCOPE,
};
pub use provider::{
    MemoryPermissionProvider, MemorySharingProvider, PermissionProvider, PermissionProviderStats,
    SharingProvider, SharingProviderStats,
};
pub use sharing::{
    SharingDeleteExecutor, SharingDeleteTracker, SharingIdentityConfig, SharingManager,
};
