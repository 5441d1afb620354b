//! Column type definitions for the catalog.

/// Scalar column types supported by the mapping layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    /// Boolean value (stored as 0/1).
    Bool,
    /// 64-bit signed integer.
    Integer,
    /// 64-bit floating point.
    Float,
    /// UTF-8 string.
    Text,
    /// UTC timestamp (stored as RFC 3339 text).
    Timestamp,
}

/// Field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// A single scalar value.
    Scalar(ScalarType),
    /// A list of scalar values (stored as a JSON array).
    Array(ScalarType),
}

impl ScalarType {
    /// SQLite column type for this scalar.
    pub fn sql_type(&self) -> &'static str {
        match self {
            ScalarType::Bool | ScalarType::Integer => "INTEGER",
            ScalarType::Float => "REAL",
            ScalarType::Text | ScalarType::Timestamp => "TEXT",
        }
    }

    /// Check if this type is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ScalarType::Integer | ScalarType::Float)
    }
}

impl FieldType {
    /// Create a scalar field type.
    pub fn scalar(scalar: ScalarType) -> Self {
        FieldType::Scalar(scalar)
    }

    /// Create an array of scalars field type.
    pub fn array(scalar: ScalarType) -> Self {
        FieldType::Array(scalar)
    }

    /// Check if this type is an array.
    pub fn is_array(&self) -> bool {
        matches!(self, FieldType::Array(_))
    }

    /// Get the element scalar type.
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            FieldType::Scalar(s) | FieldType::Array(s) => *s,
        }
    }

    /// SQLite column type for this field type.
    pub fn sql_type(&self) -> &'static str {
        match self {
            FieldType::Scalar(s) => s.sql_type(),
            FieldType::Array(_) => "TEXT",
        }
    }
}
