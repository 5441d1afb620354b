//! Relation definitions between entities.

/// A many-to-many relation resolved through an association table.
///
/// `from_column` in the association table references the owning entity's
/// identity, `to_column` references the related entity's identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDef {
    /// Relation name (unique within the owning entity).
    pub name: String,
    /// Type name of the related entity.
    pub to_entity: String,
    /// Association table name.
    pub association_table: String,
    /// Association column referencing the owning entity.
    pub from_column: String,
    /// Association column referencing the related entity.
    pub to_column: String,
}

impl RelationDef {
    /// Create a many-to-many relation.
    pub fn many_to_many(
        name: impl Into<String>,
        to_entity: impl Into<String>,
        association_table: impl Into<String>,
        from_column: impl Into<String>,
        to_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            to_entity: to_entity.into(),
            association_table: association_table.into(),
            from_column: from_column.into(),
            to_column: to_column.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_many_to_many() {
        let rel = RelationDef::many_to_many("roles", "Role", "user_role_rel", "user_id", "role_id");

        assert_eq!(rel.name, "roles");
        assert_eq!(rel.to_entity, "Role");
        assert_eq!(rel.association_table, "user_role_rel");
        assert_eq!(rel.from_column, "user_id");
        assert_eq!(rel.to_column, "role_id");
    }
}
