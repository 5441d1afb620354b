//! Field definitions for entities.

use super::naming::quote_identifier;
use super::types::{FieldType, ScalarType};
use crate::value::Value;

/// A column definition within an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    /// Field name (also the column name).
    pub name: String,
    /// Field data type.
    pub field_type: FieldType,
    /// Whether the field is required (NOT NULL).
    pub required: bool,
    /// Value applied on insert when the record leaves the field unset.
    pub default: Option<Value>,
}

impl FieldDef {
    /// Create a new required field.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
            default: None,
        }
    }

    /// Create an optional (nullable) field.
    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            default: None,
        }
    }

    /// Create an optional scalar field.
    pub fn optional_scalar(name: impl Into<String>, scalar: ScalarType) -> Self {
        Self::optional(name, FieldType::Scalar(scalar))
    }

    /// Set the default value.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Check if this field has a default value.
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Column definition used in `CREATE TABLE`.
    pub(crate) fn column_sql(&self) -> String {
        let mut sql = format!(
            "{} {}",
            quote_identifier(&self.name),
            self.field_type.sql_type()
        );
        if self.required {
            sql.push_str(" NOT NULL");
        }
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_def_builder() {
        let field = FieldDef::new("active", FieldType::scalar(ScalarType::Bool)).with_default(true);

        assert_eq!(field.name, "active");
        assert!(field.required);
        assert!(field.has_default());
        assert_eq!(field.default, Some(Value::Bool(true)));
    }

    #[test]
    fn test_optional_field() {
        let field = FieldDef::optional_scalar("description", ScalarType::Text);

        assert!(!field.required);
        assert!(!field.has_default());
    }

    #[test]
    fn test_column_sql() {
        let required = FieldDef::new("username", FieldType::scalar(ScalarType::Text));
        assert_eq!(required.column_sql(), "\"username\" TEXT NOT NULL");

        let tags = FieldDef::optional("tags", FieldType::array(ScalarType::Text));
        assert_eq!(tags.column_sql(), "\"tags\" TEXT");
    }
}
