//! # Subjects
//!
//! A subject identifies the resource side of a permission check: a resource
//! type, optionally a specific instance, optionally narrowed to one field.
//!
//! Subjects are cheap per-check values. When built from a live object they
//! keep a handle to it so instance-level logic (master resolution, field
//! filtering) can follow field values without re-fetching the object.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::error::{IdentityError, IdentityResult};

/// The surface the authorization engine needs from an application object.
///
/// Field values travel as [`serde_json::Value`], which gives the object
/// filter a uniform representation to null out and restore without knowing
/// the application's concrete types.
pub trait DomainObject {
    /// The resource type name of the object (e.g. `"document"`).
    fn type_name(&self) -> &str;

    /// The instance identifier of the object.
    fn identifier(&self) -> String;

    /// The names of the object's fields.
    fn field_names(&self) -> Vec<String>;

    /// Read a field value. Unknown fields read as [`Value::Null`].
    fn field_value(&self, field: &str) -> Value;

    /// Replace a field value.
    fn set_field_value(&mut self, field: &str, value: Value);
}

/// A shared, mutable handle to a domain object.
///
/// The engine is single-threaded and request-scoped, so shared ownership
/// with interior mutability is all that is needed to keep one object in a
/// pending filter batch and in a subject identity at the same time.
pub type SharedObject = Rc<RefCell<dyn DomainObject>>;

/// A map-backed [`DomainObject`] implementation.
///
/// # Example
///
/// ```
/// use gatekit_identity::{DomainObject, ObjectInstance};
/// use serde_json::json;
///
/// let mut doc = ObjectInstance::new("document", "7")
///     .with_field("title", json!("Quarterly report"));
///
/// assert_eq!(doc.field_value("title"), json!("Quarterly report"));
/// doc.set_field_value("title", json!(null));
/// assert_eq!(doc.field_value("title"), json!(null));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObjectInstance {
    type_name: String,
    identifier: String,
    fields: BTreeMap<String, Value>,
}

impl ObjectInstance {
    /// Create an empty instance of the given type.
    pub fn new(type_name: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            identifier: identifier.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Add a field value (builder style).
    pub fn with_field(mut self, field: impl Into<String>, value: Value) -> Self {
        self.fields.insert(field.into(), value);
        self
    }

    /// Build an instance from a dynamic JSON value.
    ///
    /// The value must be a JSON object; its entries become the instance's
    /// fields.
    ///
    /// # Errors
    ///
    /// [`IdentityError::UnexpectedType`] when the value is not an object.
    ///
    /// # Example
    ///
    /// ```
    /// use gatekit_identity::{DomainObject, ObjectInstance};
    /// use serde_json::json;
    ///
    /// let doc = ObjectInstance::from_value("document", "7", json!({"title": "x"})).unwrap();
    /// assert_eq!(doc.field_value("title"), json!("x"));
    ///
    /// assert!(ObjectInstance::from_value("document", "7", json!(42)).is_err());
    /// ```
    pub fn from_value(
        type_name: impl Into<String>,
        identifier: impl Into<String>,
        value: Value,
    ) -> IdentityResult<Self> {
        match value {
            Value::Object(map) => Ok(Self {
                type_name: type_name.into(),
                identifier: identifier.into(),
                fields: map.into_iter().collect(),
            }),
            other => Err(IdentityError::UnexpectedType(json_type_name(&other).to_string())),
        }
    }

    /// Wrap the instance into a [`SharedObject`] handle.
    pub fn shared(self) -> SharedObject {
        Rc::new(RefCell::new(self))
    }
}

impl DomainObject for ObjectInstance {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn identifier(&self) -> String {
        self.identifier.clone()
    }

    fn field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    fn field_value(&self, field: &str) -> Value {
        self.fields.get(field).cloned().unwrap_or(Value::Null)
    }

    fn set_field_value(&mut self, field: &str, value: Value) {
        self.fields.insert(field.to_string(), value);
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// An immutable value identifying a resource.
///
/// A subject is either class-scoped (empty identifier, built with
/// [`SubjectIdentity::from_class`]) or instance-scoped (built with
/// [`SubjectIdentity::from_object`] or [`SubjectIdentity::new`]). Equality
/// and hashing consider the type and identifier only; the optional object
/// binding is a convenience handle, not part of the identity.
#[derive(Clone)]
pub struct SubjectIdentity {
    type_name: String,
    identifier: String,
    object: Option<SharedObject>,
}

impl SubjectIdentity {
    /// Create a subject for a specific instance without a live object.
    pub fn new(type_name: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            identifier: identifier.into(),
            object: None,
        }
    }

    /// Create a class-scoped subject (empty identifier).
    pub fn from_class(type_name: impl Into<String>) -> Self {
        Self::new(type_name, "")
    }

    /// Create a subject bound to a live object, deriving type and
    /// identifier from it.
    pub fn from_object(object: &SharedObject) -> Self {
        let (type_name, identifier) = {
            let obj = object.borrow();
            (obj.type_name().to_string(), obj.identifier())
        };

        Self {
            type_name,
            identifier,
            object: Some(Rc::clone(object)),
        }
    }

    /// Get the resource type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Get the instance identifier (empty for class-scoped subjects).
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Get the bound object, if the subject was built from one.
    pub fn object(&self) -> Option<&SharedObject> {
        self.object.as_ref()
    }

    /// Check whether this subject points at a specific instance.
    pub fn is_instance(&self) -> bool {
        !self.identifier.is_empty()
    }
}

impl fmt::Debug for SubjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubjectIdentity")
            .field("type_name", &self.type_name)
            .field("identifier", &self.identifier)
            .field("bound", &self.object.is_some())
            .finish()
    }
}

impl PartialEq for SubjectIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name && self.identifier == other.identifier
    }
}

impl Eq for SubjectIdentity {}

impl Hash for SubjectIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_name.hash(state);
        self.identifier.hash(state);
    }
}

/// A subject narrowed to a single field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldVote {
    subject: SubjectIdentity,
    field: String,
}

impl FieldVote {
    /// Create a field vote.
    pub fn new(subject: SubjectIdentity, field: impl Into<String>) -> Self {
        Self {
            subject,
            field: field.into(),
        }
    }

    /// Get the subject.
    pub fn subject(&self) -> &SubjectIdentity {
        &self.subject
    }

    /// Get the field name.
    pub fn field(&self) -> &str {
        &self.field
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subject_from_object() {
        let doc = ObjectInstance::new("document", "7")
            .with_field("title", json!("x"))
            .shared();
        let subject = SubjectIdentity::from_object(&doc);

        assert_eq!(subject.type_name(), "document");
        assert_eq!(subject.identifier(), "7");
        assert!(subject.is_instance());
        assert!(subject.object().is_some());
    }

    #[test]
    fn test_subject_from_class() {
        let subject = SubjectIdentity::from_class("document");

        assert_eq!(subject.type_name(), "document");
        assert_eq!(subject.identifier(), "");
        assert!(!subject.is_instance());
        assert!(subject.object().is_none());
    }

    #[test]
    fn test_subject_equality_ignores_binding() {
        let doc = ObjectInstance::new("document", "7").shared();
        let bound = SubjectIdentity::from_object(&doc);
        let unbound = SubjectIdentity::new("document", "7");

        assert_eq!(bound, unbound);
        assert_ne!(unbound, SubjectIdentity::new("document", "8"));
        assert_ne!(unbound, SubjectIdentity::new("meeting", "7"));
    }

    #[test]
    fn test_object_instance_fields() {
        let mut doc = ObjectInstance::new("document", "7").with_field("title", json!("x"));

        assert_eq!(doc.field_names(), vec!["title".to_string()]);
        assert_eq!(doc.field_value("title"), json!("x"));
        assert_eq!(doc.field_value("missing"), Value::Null);

        doc.set_field_value("title", json!(null));
        assert_eq!(doc.field_value("title"), Value::Null);
    }

    #[test]
    fn test_object_instance_from_value() {
        let doc = ObjectInstance::from_value("document", "7", json!({"a": 1, "b": "x"})).unwrap();
        assert_eq!(doc.field_value("a"), json!(1));
        assert_eq!(doc.field_value("b"), json!("x"));
    }

    #[test]
    fn test_object_instance_from_non_object_value() {
        let err = ObjectInstance::from_value("document", "7", json!(42)).unwrap_err();
        assert!(matches!(err, IdentityError::UnexpectedType(ref kind) if kind == "number"));
    }

    #[test]
    fn test_field_vote() {
        let vote = FieldVote::new(SubjectIdentity::new("document", "7"), "title");

        assert_eq!(vote.subject().type_name(), "document");
        assert_eq!(vote.field(), "title");
    }
}
