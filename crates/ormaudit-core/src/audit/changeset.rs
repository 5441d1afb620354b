//! Field-level change extraction.

use crate::record::EntityRecord;
use crate::value::Value;

/// One changed field: name, rendered old value, rendered new value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldChange {
    /// Field name.
    pub field: String,
    /// Value before the write (`None` for null or unset).
    pub old_value: Option<String>,
    /// Value after the write (`None` for null).
    pub new_value: Option<String>,
}

impl FieldChange {
    /// Create a field change.
    pub fn new(
        field: impl Into<String>,
        old_value: Option<String>,
        new_value: Option<String>,
    ) -> Self {
        Self {
            field: field.into(),
            old_value,
            new_value,
        }
    }
}

/// The set of field changes produced by one write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    changes: Vec<FieldChange>,
}

impl ChangeSet {
    /// Changes recorded for a newly inserted record.
    ///
    /// Every non-key column holding a non-null value yields `(field, None, value)`.
    pub fn for_create(record: &EntityRecord) -> Self {
        let changes = record
            .values()
            .filter_map(|(field, value)| {
                value
                    .render()
                    .map(|rendered| FieldChange::new(field, None, Some(rendered)))
            })
            .collect();
        Self { changes }
    }

    /// Changes recorded for an update.
    ///
    /// Only fields whose current value differs from the loaded snapshot are
    /// included. Unset fields compare as null.
    pub fn for_update(record: &EntityRecord) -> Self {
        let changes = record
            .entity()
            .fields
            .iter()
            .filter_map(|def| {
                let current = record.get(&def.name).unwrap_or(&Value::Null);
                let loaded = record.loaded_value(&def.name).unwrap_or(&Value::Null);
                (current != loaded)
                    .then(|| FieldChange::new(def.name.as_str(), loaded.render(), current.render()))
            })
            .collect();
        Self { changes }
    }

    /// Iterate over the changes.
    pub fn iter(&self) -> std::slice::Iter<'_, FieldChange> {
        self.changes.iter()
    }

    /// Names of the changed fields.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.changes.iter().map(|c| c.field.as_str())
    }

    /// Get the change for a field.
    pub fn get(&self, field: &str) -> Option<&FieldChange> {
        self.changes.iter().find(|c| c.field == field)
    }

    /// Number of changed fields.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Check if nothing changed.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a FieldChange;
    type IntoIter = std::slice::Iter<'a, FieldChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

impl IntoIterator for ChangeSet {
    type Item = FieldChange;
    type IntoIter = std::vec::IntoIter<FieldChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}
