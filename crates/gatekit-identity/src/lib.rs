//! # Gatekit Identity
//!
//! Value types shared by the gatekit authorization crates:
//! security identities, subject identities and the objects they point at.
//!
//! ## Overview
//!
//! A permission check always involves two sides:
//!
//! - **Who**: a set of [`SecurityIdentity`] values describing the facets of
//!   a principal (their user id, their roles, their groups).
//! - **What**: a [`SubjectIdentity`] describing a resource: its type, an
//!   optional instance identifier, and optionally the live object itself.
//!   A [`FieldVote`] narrows a subject down to a single field.
//!
//! Identities are cheap, immutable values created per request. Subjects are
//! created per check and are never cached across requests.
//!
//! ## Domain objects
//!
//! The [`DomainObject`] trait is the minimal surface the authorization
//! engine needs from an application object: a type name, an identifier and
//! field access with [`serde_json::Value`] values. [`ObjectInstance`] is a
//! ready-made map-backed implementation.
//!
//! ## Principals
//!
//! [`Principal`] and the capability traits [`RoleBearer`] / [`GroupBearer`]
//! let the [`IdentityResolver`] derive the identity set of an authenticated
//! principal without assuming anything about the application's user model.
//!
//! ## Usage
//!
//! ```rust
//! use gatekit_identity::{SecurityIdentity, SubjectIdentity, ObjectInstance};
//! use serde_json::json;
//!
//! let sids = vec![
//!     SecurityIdentity::user("42"),
//!     SecurityIdentity::role("ROLE_USER"),
//! ];
//!
//! let doc = ObjectInstance::new("document", "7")
//!     .with_field("title", json!("Quarterly report"))
//!     .shared();
//! let subject = SubjectIdentity::from_object(&doc);
//!
//! assert_eq!(subject.type_name(), "document");
//! assert_eq!(subject.identifier(), "7");
//! assert!(sids[1].is_role());
//! ```

pub mod error;
pub mod principal;
pub mod security;
pub mod subject;

// Re-export main types for convenience
pub use error::{IdentityError, IdentityResult};
pub use principal::{GroupBearer, IdentityResolver, Principal, RoleBearer};
pub use security::{role_identifiers, IdentityKind, SecurityIdentity};
pub use subject::{DomainObject, FieldVote, ObjectInstance, SharedObject, SubjectIdentity};
