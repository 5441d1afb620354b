//! Output formatters.

use clap::ValueEnum;
use comfy_table::{Cell, Table};
use ormaudit_core::{AuditEntry, PermissionRecord, Principal};

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format
    Table,
    /// JSON format
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Trait for formatting output.
pub trait Formatter {
    /// Format permission records.
    fn format_permissions(&self, records: &[PermissionRecord]) -> String;

    /// Format audit trail entries.
    fn format_entries(&self, entries: &[AuditEntry]) -> String;

    /// Format an authenticated principal.
    fn format_principal(&self, principal: &Principal) -> String;

    /// Format a simple message.
    fn format_message(&self, message: &str) -> String;
}

/// Create a formatter for the given output format.
pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Table => Box::new(TableFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// Table formatter using comfy-table.
pub struct TableFormatter;

impl Formatter for TableFormatter {
    fn format_permissions(&self, records: &[PermissionRecord]) -> String {
        if records.is_empty() {
            return "No permission records".to_string();
        }

        let mut table = Table::new();
        table.set_header(vec!["entity", "read", "create", "update", "delete"]);
        for record in records {
            table.add_row(vec![
                Cell::new(&record.entity),
                Cell::new(flag(record.read)),
                Cell::new(flag(record.create)),
                Cell::new(flag(record.update)),
                Cell::new(flag(record.delete)),
            ]);
        }
        table.to_string()
    }

    fn format_entries(&self, entries: &[AuditEntry]) -> String {
        if entries.is_empty() {
            return "No audit entries".to_string();
        }

        let mut table = Table::new();
        table.set_header(vec![
            "id", "occurred_at", "entity", "operation", "record", "actor", "changes",
        ]);
        for entry in entries {
            let op = &entry.operation;
            let changes: Vec<String> = entry
                .fields
                .iter()
                .map(|f| {
                    format!(
                        "{}: {} -> {}",
                        f.field,
                        text_or_null(f.old_value.as_deref()),
                        text_or_null(f.new_value.as_deref())
                    )
                })
                .collect();
            table.add_row(vec![
                Cell::new(op.id),
                Cell::new(op.occurred_at.format("%Y-%m-%d %H:%M:%S")),
                Cell::new(&op.entity),
                Cell::new(op.operation),
                Cell::new(op.record_id),
                Cell::new(op.actor_id.map(|a| a.to_string()).unwrap_or_default()),
                Cell::new(changes.join("\n")),
            ]);
        }
        table.to_string()
    }

    fn format_principal(&self, principal: &Principal) -> String {
        match &principal.name {
            Some(name) => format!(
                "authenticated {} ({}) as user #{}",
                principal.username, name, principal.id
            ),
            None => format!("authenticated {} as user #{}", principal.username, principal.id),
        }
    }

    fn format_message(&self, message: &str) -> String {
        message.to_string()
    }
}

/// JSON formatter.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_permissions(&self, records: &[PermissionRecord]) -> String {
        serde_json::to_string_pretty(records).unwrap_or_else(|_| "[]".to_string())
    }

    fn format_entries(&self, entries: &[AuditEntry]) -> String {
        serde_json::to_string_pretty(entries).unwrap_or_else(|_| "[]".to_string())
    }

    fn format_principal(&self, principal: &Principal) -> String {
        serde_json::to_string_pretty(principal).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({
            "message": message
        })
        .to_string()
    }
}

fn flag(allowed: bool) -> &'static str {
    if allowed {
        "yes"
    } else {
        "no"
    }
}

fn text_or_null(value: Option<&str>) -> &str {
    value.unwrap_or("NULL")
}
