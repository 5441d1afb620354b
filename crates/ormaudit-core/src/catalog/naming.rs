//! Storage naming convention.
//!
//! Entity types are declared with CamelCase names and stored in snake_case
//! tables: `DemoModel` is stored in `demo_model`.

/// Derive the storage (table) name for an entity type name.
///
/// The first character is lower-cased. Every later upper-case character is
/// replaced by an underscore followed by its lower-case form; all other
/// characters are kept as they are.
pub fn resolve_storage_name(type_name: &str) -> String {
    let mut chars = type_name.chars();
    let mut out = String::with_capacity(type_name.len() + 4);

    if let Some(first) = chars.next() {
        out.extend(first.to_lowercase());
    }

    for c in chars {
        if c.is_uppercase() {
            out.push('_');
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }

    out
}

/// Quote an identifier for use in generated SQL.
pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
