//! Entity definitions.

use super::field::FieldDef;
use super::naming::{quote_identifier, resolve_storage_name};
use super::relation::RelationDef;
use crate::error::{Error, Result};

/// Name of the integer primary key every entity carries.
pub const IDENTITY_FIELD: &str = "id";

/// An entity definition (table schema).
///
/// The storage name is derived from the type name once, when the definition
/// is created, and never changes afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDef {
    /// Entity type name (unique within a registry).
    pub type_name: String,
    storage_name: String,
    /// Column definitions, excluding the identity field.
    pub fields: Vec<FieldDef>,
    /// Many-to-many relations owned by this entity.
    pub relations: Vec<RelationDef>,
}

/// An entity type declared in Rust code.
///
/// Implementors can be registered with
/// [`Registry::register_model`](super::Registry::register_model) and looked up
/// by type afterwards.
pub trait Model {
    /// Entity type name.
    const TYPE_NAME: &'static str;

    /// Column definitions, excluding the identity field.
    fn fields() -> Vec<FieldDef>;

    /// Relations owned by this entity.
    fn relations() -> Vec<RelationDef> {
        Vec::new()
    }

    /// Build the entity definition.
    fn entity_def() -> EntityDef {
        EntityDef::new(Self::TYPE_NAME)
            .with_fields(Self::fields())
            .with_relations(Self::relations())
    }
}

impl EntityDef {
    /// Create a new entity definition.
    pub fn new(type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        let storage_name = resolve_storage_name(&type_name);
        Self {
            type_name,
            storage_name,
            fields: Vec::new(),
            relations: Vec::new(),
        }
    }

    /// Add a field to the entity.
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Add multiple fields.
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = FieldDef>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Add a relation.
    pub fn with_relation(mut self, relation: RelationDef) -> Self {
        self.relations.push(relation);
        self
    }

    /// Add multiple relations.
    pub fn with_relations(mut self, relations: impl IntoIterator<Item = RelationDef>) -> Self {
        self.relations.extend(relations);
        self
    }

    /// Storage (table) name derived from the type name.
    pub fn storage_name(&self) -> &str {
        &self.storage_name
    }

    /// Name of the primary key field.
    pub fn identity_field(&self) -> &str {
        IDENTITY_FIELD
    }

    /// Get a field by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check whether the entity has a non-key column with this name.
    pub fn has_field(&self, name: &str) -> bool {
        self.get_field(name).is_some()
    }

    /// Names of all non-key columns, in declaration order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Get a relation by name.
    pub fn get_relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Check the definition is usable.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.type_name.is_empty() {
            return Err(Error::Registry("entity type name is empty".into()));
        }

        let mut seen = std::collections::HashSet::new();
        for field in &self.fields {
            if field.name.is_empty() {
                return Err(Error::Registry(format!(
                    "{}: field name is empty",
                    self.type_name
                )));
            }
            if field.name == IDENTITY_FIELD {
                return Err(Error::Registry(format!(
                    "{}: `{}` is the implicit identity field",
                    self.type_name, IDENTITY_FIELD
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(Error::Registry(format!(
                    "{}: duplicate field `{}`",
                    self.type_name, field.name
                )));
            }
        }

        let mut relations = std::collections::HashSet::new();
        for relation in &self.relations {
            if !relations.insert(relation.name.as_str()) {
                return Err(Error::Registry(format!(
                    "{}: duplicate relation `{}`",
                    self.type_name, relation.name
                )));
            }
        }

        Ok(())
    }

    /// `CREATE TABLE` statement for this entity.
    pub(crate) fn create_table_sql(&self) -> String {
        let mut columns = vec![format!(
            "{} INTEGER PRIMARY KEY AUTOINCREMENT",
            quote_identifier(IDENTITY_FIELD)
        )];
        columns.extend(self.fields.iter().map(FieldDef::column_sql));

        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_identifier(&self.storage_name),
            columns.join(", ")
        )
    }

    /// `CREATE TABLE` statement for a relation's association table.
    pub(crate) fn association_table_sql(&self, relation: &RelationDef) -> String {
        let target = resolve_storage_name(&relation.to_entity);
        format!(
            "CREATE TABLE IF NOT EXISTS {table} (\
             {from} INTEGER NOT NULL REFERENCES {source}({id}) ON DELETE CASCADE, \
             {to} INTEGER NOT NULL REFERENCES {target}({id}) ON DELETE CASCADE, \
             PRIMARY KEY ({from}, {to}))",
            table = quote_identifier(&relation.association_table),
            from = quote_identifier(&relation.from_column),
            to = quote_identifier(&relation.to_column),
            source = quote_identifier(&self.storage_name),
            target = quote_identifier(&target),
            id = quote_identifier(IDENTITY_FIELD),
        )
    }
}
