//! In-memory entity instances.

use crate::catalog::{EntityDef, IDENTITY_FIELD};
use crate::error::{Error, Result};
use crate::value::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// One row of an entity, as held by the mapping layer.
///
/// Besides the current values a record keeps the snapshot captured when it
/// was loaded or last flushed. Updates are diffed against that snapshot.
#[derive(Debug, Clone)]
pub struct EntityRecord {
    entity: Arc<EntityDef>,
    id: Option<i64>,
    values: BTreeMap<String, Value>,
    snapshot: Option<BTreeMap<String, Value>>,
}

impl EntityRecord {
    /// Create a new, unsaved record.
    pub fn new(entity: Arc<EntityDef>) -> Self {
        Self {
            entity,
            id: None,
            values: BTreeMap::new(),
            snapshot: None,
        }
    }

    /// Build a record from a row read from storage.
    pub(crate) fn loaded(entity: Arc<EntityDef>, id: i64, values: BTreeMap<String, Value>) -> Self {
        Self {
            entity,
            id: Some(id),
            snapshot: Some(values.clone()),
            values,
        }
    }

    /// Entity definition of this record.
    pub fn entity(&self) -> &Arc<EntityDef> {
        &self.entity
    }

    /// Primary key, once inserted.
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    /// Check if the record has been inserted.
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Set a field value.
    ///
    /// The field must be a column of the entity and the value must fit its type.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<()> {
        let def = self.entity.get_field(field).ok_or_else(|| Error::UnknownField {
            entity: self.entity.type_name.clone(),
            field: field.to_string(),
        })?;

        let value = value.into();
        if !value.conforms_to(&def.field_type) {
            return Err(Error::InvalidData(format!(
                "{}.{} expects {:?}, got {:?}",
                self.entity.type_name, field, def.field_type, value
            )));
        }

        self.values.insert(field.to_string(), value);
        Ok(())
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Result<Self> {
        self.set(field, value)?;
        Ok(self)
    }

    /// Get a field value. `None` if the field was never set.
    pub fn get(&self, field: &str) -> Option<&Value> {
        if field == IDENTITY_FIELD {
            return None;
        }
        self.values.get(field)
    }

    /// Get a text field.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// Current values, in field-name order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Value captured when the record was loaded or last flushed.
    pub fn loaded_value(&self, field: &str) -> Option<&Value> {
        self.snapshot.as_ref().and_then(|s| s.get(field))
    }

    /// Check whether any value differs from the snapshot.
    pub fn is_dirty(&self) -> bool {
        self.entity.fields.iter().any(|f| {
            let current = self.values.get(&f.name).unwrap_or(&Value::Null);
            let loaded = self.loaded_value(&f.name).unwrap_or(&Value::Null);
            current != loaded
        })
    }

    /// Current value of every column, unset columns as null, in declaration order.
    pub(crate) fn column_values(&self) -> Vec<Value> {
        self.entity
            .fields
            .iter()
            .map(|f| self.values.get(&f.name).cloned().unwrap_or(Value::Null))
            .collect()
    }

    /// Fill unset fields that declare a default.
    pub(crate) fn apply_defaults(&mut self) {
        for field in &self.entity.fields {
            if let Some(default) = &field.default {
                self.values
                    .entry(field.name.clone())
                    .or_insert_with(|| default.clone());
            }
        }
    }

    pub(crate) fn set_id(&mut self, id: Option<i64>) {
        self.id = id;
    }

    /// Capture the current values as the new snapshot.
    pub(crate) fn mark_clean(&mut self) {
        self.snapshot = Some(self.values.clone());
    }
}

impl fmt::Display for EntityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "<{}(id={})>", self.entity.type_name, id),
            None => write!(f, "<{}(id=None)>", self.entity.type_name),
        }
    }
}
