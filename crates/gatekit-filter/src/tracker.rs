//! # Change tracking
//!
//! Restoring an object needs to know what the caller changed since the
//! object entered the filter's custody. The tracker is a trait so an
//! integration with a persistence layer can surface its own unit-of-work
//! diff; [`SnapshotTracker`] is the self-contained implementation.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use gatekit_identity::SharedObject;

/// One changed field: the value at attach time and the value now.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldChange {
    /// The value when the object was attached.
    pub old: Value,
    /// The current value.
    pub new: Value,
}

/// Surfaces the changed fields of an object.
pub trait ChangeTracker {
    /// Take custody of an object. Idempotent: re-attaching does not renew
    /// the baseline.
    fn attach(&self, object: &SharedObject);

    /// The changed fields of an object, keyed by field name.
    ///
    /// An object that was never attached reports every non-null field as
    /// changed from [`Value::Null`].
    fn change_set(&self, object: &SharedObject) -> BTreeMap<String, FieldChange>;
}

/// In-memory [`ChangeTracker`] keyed by (type, identifier).
#[derive(Debug, Default)]
pub struct SnapshotTracker {
    snapshots: RefCell<HashMap<(String, String), BTreeMap<String, Value>>>,
}

impl SnapshotTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every snapshot.
    pub fn clear(&self) {
        self.snapshots.borrow_mut().clear();
    }

    fn key(object: &SharedObject) -> (String, String) {
        let object = object.borrow();
        (object.type_name().to_string(), object.identifier())
    }
}

impl ChangeTracker for SnapshotTracker {
    fn attach(&self, object: &SharedObject) {
        let key = Self::key(object);
        let mut snapshots = self.snapshots.borrow_mut();
        if snapshots.contains_key(&key) {
            return;
        }

        let snapshot = {
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
        snapshots.insert(key, snapshot);
    }

    fn change_set(&self, object: &SharedObject) -> BTreeMap<String, FieldChange> {
        let key = Self::key(object);
        let snapshots = self.snapshots.borrow();
        let current = object.borrow();

        match snapshots.get(&key) {
            Some(snapshot) => {
                let mut fields: Vec<String> = snapshot.keys().cloned().collect();
                fields.extend(current.field_names());
                fields.sort();
                fields.dedup();

                fields
                    .into_iter()
                    .filter_map(|field| {
                        let old = snapshot.get(&field).cloned().unwrap_or(Value::Null);
                        let new = current.field_value(&field);
                        (old != new).then_some((field, FieldChange { old, new }))
                    })
                    .collect()
            }
            None => current
                .field_names()
                .into_iter()
                .filter_map(|field| {
                    let new = current.field_value(&field);
                    (!new.is_null()).then_some((
                        field,
                        FieldChange {
                            old: Value::Null,
                            new,
                        },
                    ))
                })
                .collect(),
        }
    }
}
