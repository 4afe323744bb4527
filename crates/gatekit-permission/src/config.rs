//! # Permission configuration
//!
//! The static registry describing, per resource type, which operations
//! exist at class level and per field, which fields are editable, and the
//! optional master mapping whose referenced parent cascades its permissions
//! to the type.
//!
//! Configs are registered once at startup and read-only afterwards.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use gatekit_identity::{DomainObject, SubjectIdentity};
use serde_json::Value;

/// Per-field permission configuration.
///
/// An operation requested for the field is first translated through the
/// alias map before membership is tested, so callers can use human-facing
/// operation names (e.g. `"view"`) that map to internal ones (e.g.
/// `"read"`).
///
/// # Example
///
/// ```
/// use gatekit_permission::PermissionFieldConfig;
///
/// let field = PermissionFieldConfig::new("title")
///     .with_operations(&["read"])
///     .with_alias("view", "read");
///
/// assert!(field.has_operation("read"));
/// assert!(field.has_operation("view"));
/// assert!(!field.has_operation("edit"));
/// assert!(!field.is_editable());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PermissionFieldConfig {
    field: String,
    operations: Vec<String>,
    aliases: HashMap<String, String>,
    editable: Option<bool>,
}

impl PermissionFieldConfig {
    /// Create a config for a field with no declared operations.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ..Self::default()
        }
    }

    /// Declare the operations of the field (builder style).
    pub fn with_operations(mut self, operations: &[&str]) -> Self {
        self.operations = operations.iter().map(|op| op.to_string()).collect();
        self
    }

    /// Map a human-facing operation name to an internal one (builder
    /// style).
    pub fn with_alias(mut self, alias: impl Into<String>, operation: impl Into<String>) -> Self {
        self.aliases.insert(alias.into(), operation.into());
        self
    }

    /// Set the editable flag explicitly (builder style).
    pub fn with_editable(mut self, editable: bool) -> Self {
        self.editable = Some(editable);
        self
    }

    /// Get the field name.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Get the declared operations.
    pub fn operations(&self) -> &[String] {
        &self.operations
    }

    /// Check whether the field declares an operation, alias-translated.
    pub fn has_operation(&self, operation: &str) -> bool {
        self.operations
            .iter()
            .any(|op| op == self.mapping_permission(operation))
    }

    /// Whether the field may be written: the explicit flag when set,
    /// otherwise editable iff no operations are declared.
    pub fn is_editable(&self) -> bool {
        self.editable.unwrap_or_else(|| self.operations.is_empty())
    }

    /// Translate an alias to its internal operation name; unknown names
    /// pass through unchanged.
    pub fn mapping_permission<'a>(&'a self, alias: &'a str) -> &'a str {
        self.aliases.get(alias).map(String::as_str).unwrap_or(alias)
    }
}

/// Resolves the master subject of a live object.
///
/// Registered per (type, field) at config time; replaces reflective field
/// traversal with an explicit accessor.
pub type MasterAccessor = Rc<dyn Fn(&dyn DomainObject) -> Option<SubjectIdentity>>;

/// Master mapping of a permission config.
///
/// The master is a parent resource reached through one of the type's
/// fields; permission checks on the type are re-targeted at it.
#[derive(Clone)]
pub struct MasterConfig {
    field: String,
    master_type: Option<String>,
    accessor: MasterAccessor,
}

impl MasterConfig {
    /// Create a master mapping with a custom accessor.
    ///
    /// The master type is left undeclared; set it with
    /// [`MasterConfig::with_master_type`] when the accessor always resolves
    /// to one type, so that cascaded class-scoped checks and cycle
    /// validation can follow the mapping without a live object.
    pub fn new(
        field: impl Into<String>,
        accessor: impl Fn(&dyn DomainObject) -> Option<SubjectIdentity> + 'static,
    ) -> Self {
        Self {
            field: field.into(),
            master_type: None,
            accessor: Rc::new(accessor),
        }
    }

    /// Create a master mapping whose accessor reads the field's scalar
    /// value as the identifier of a `master_type` instance.
    ///
    /// # Example
    ///
    /// ```
    /// use gatekit_identity::ObjectInstance;
    /// use gatekit_permission::MasterConfig;
    /// use serde_json::json;
    ///
    /// let master = MasterConfig::by_field("parent", "project");
    /// let task = ObjectInstance::new("task", "1").with_field("parent", json!("p-9"));
    ///
    /// let subject = master.resolve(&task).unwrap();
    /// assert_eq!(subject.type_name(), "project");
    /// assert_eq!(subject.identifier(), "p-9");
    /// ```
    pub fn by_field(field: impl Into<String>, master_type: impl Into<String>) -> Self {
        let field = field.into();
        let master_type = master_type.into();
        let field_name = field.clone();
        let resolved_type = master_type.clone();

        Self::new(field, move |object| match object.field_value(&field_name) {
            Value::String(id) => Some(SubjectIdentity::new(resolved_type.clone(), id)),
            Value::Number(id) => Some(SubjectIdentity::new(resolved_type.clone(), id.to_string())),
            _ => None,
        })
        .with_master_type(master_type)
    }

    /// Declare the type the accessor resolves to (builder style).
    pub fn with_master_type(mut self, master_type: impl Into<String>) -> Self {
        self.master_type = Some(master_type.into());
        self
    }

    /// Get the field holding the master reference.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Get the declared master type, if any.
    pub fn master_type(&self) -> Option<&str> {
        self.master_type.as_deref()
    }

    /// Resolve the master subject of an object, `None` when the field does
    /// not point at one.
    pub fn resolve(&self, object: &dyn DomainObject) -> Option<SubjectIdentity> {
        (self.accessor)(object)
    }
}

impl fmt::Debug for MasterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterConfig")
            .field("field", &self.field)
            .field("master_type", &self.master_type)
            .finish()
    }
}

/// Permission configuration of one resource type.
#[derive(Debug, Clone, Default)]
pub struct PermissionConfig {
    type_name: String,
    operations: Vec<String>,
    aliases: HashMap<String, String>,
    fields: HashMap<String, PermissionFieldConfig>,
    master: Option<MasterConfig>,
}

impl PermissionConfig {
    /// Create a config for a resource type.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ..Self::default()
        }
    }

    /// Declare the class-level operations (builder style).
    pub fn with_operations(mut self, operations: &[&str]) -> Self {
        self.operations = operations.iter().map(|op| op.to_string()).collect();
        self
    }

    /// Map a human-facing operation name to an internal one (builder
    /// style).
    pub fn with_alias(mut self, alias: impl Into<String>, operation: impl Into<String>) -> Self {
        self.aliases.insert(alias.into(), operation.into());
        self
    }

    /// Add a field config (builder style).
    pub fn with_field(mut self, field: PermissionFieldConfig) -> Self {
        self.fields.insert(field.field().to_string(), field);
        self
    }

    /// Declare the master mapping (builder style). At most one master per
    /// config.
    pub fn with_master(mut self, master: MasterConfig) -> Self {
        self.master = Some(master);
        self
    }

    /// Get the resource type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Get the class-level operations.
    pub fn operations(&self) -> &[String] {
        &self.operations
    }

    /// Check whether the class declares an operation, alias-translated.
    pub fn has_operation(&self, operation: &str) -> bool {
        self.operations
            .iter()
            .any(|op| op == self.mapping_permission(operation))
    }

    /// Get the field configs.
    pub fn fields(&self) -> impl Iterator<Item = &PermissionFieldConfig> {
        self.fields.values()
    }

    /// Get one field config.
    pub fn field(&self, field: &str) -> Option<&PermissionFieldConfig> {
        self.fields.get(field)
    }

    /// Check whether the config declares a field.
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Get the master mapping, if any.
    pub fn master(&self) -> Option<&MasterConfig> {
        self.master.as_ref()
    }

    /// Translate an alias to its internal operation name; unknown names
    /// pass through unchanged.
    pub fn mapping_permission<'a>(&'a self, alias: &'a str) -> &'a str {
        self.aliases.get(alias).map(String::as_str).unwrap_or(alias)
    }
}

/// Registry of permission configs, keyed by resource type.
///
/// Injected once into the permission manager and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct ConfigRegistry {
    configs: HashMap<String, PermissionConfig>,
}

impl ConfigRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a config, replacing any previous config of the same type.
    pub fn register(&mut self, config: PermissionConfig) {
        self.configs.insert(config.type_name().to_string(), config);
    }

    /// Check whether a type has a config.
    pub fn has_config(&self, type_name: &str) -> bool {
        self.configs.contains_key(type_name)
    }

    /// Get the config of a type.
    pub fn get_config(&self, type_name: &str) -> Option<&PermissionConfig> {
        self.configs.get(type_name)
    }

    /// Iterate over all registered configs.
    pub fn configs(&self) -> impl Iterator<Item = &PermissionConfig> {
        self.configs.values()
    }
}
