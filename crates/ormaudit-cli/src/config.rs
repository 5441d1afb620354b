//! Command-line arguments and the configuration derived from them.

use crate::formatter::OutputFormat;
use clap::{Parser, Subcommand};
use ormaudit_core::{InterceptorConfig, MapperConfig};
use std::path::PathBuf;

/// Default database file.
pub const DEFAULT_DB_PATH: &str = "./ormaudit.db";

/// ormaudit administration tool.
#[derive(Parser, Debug)]
#[command(name = "ormaudit")]
#[command(version, about = "Manage permissions and inspect the audit trail", long_about = None)]
pub struct Args {
    /// Path to the SQLite database.
    #[arg(long, env = "ORMAUDIT_DB", default_value = DEFAULT_DB_PATH, global = true)]
    pub db: PathBuf,

    /// Output format.
    #[arg(long, default_value = "table", value_enum, global = true)]
    pub format: OutputFormat,

    /// Check create/update/delete permissions on writes made by this tool.
    #[arg(long, global = true)]
    pub enforce_writes: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create the permission, audit and principal tables.
    Init,

    /// Create or replace the permission record of an entity.
    Grant {
        /// Storage name of the entity, e.g. `demo_model`.
        entity: String,
        /// Allow reads.
        #[arg(long)]
        read: bool,
        /// Allow inserts.
        #[arg(long)]
        create: bool,
        /// Allow updates.
        #[arg(long)]
        update: bool,
        /// Allow deletes.
        #[arg(long)]
        delete: bool,
    },

    /// Remove the permission record of an entity.
    Revoke {
        /// Storage name of the entity.
        entity: String,
    },

    /// List permission records.
    Permissions,

    /// Apply a JSON array of permission records.
    Import {
        /// Path to the JSON file.
        file: PathBuf,
    },

    /// Show the audit trail, newest first.
    Log {
        /// Only this entity (storage name).
        #[arg(long)]
        entity: Option<String>,
        /// Only this record id.
        #[arg(long)]
        record: Option<i64>,
        /// Maximum number of operations.
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },

    /// Manage users.
    #[command(subcommand)]
    User(UserCommand),

    /// Manage roles.
    #[command(subcommand)]
    Role(RoleCommand),

    /// Check a username and password.
    Login {
        /// Login name.
        username: String,
        /// Password.
        #[arg(long)]
        password: String,
    },

    /// Run the end-to-end demo on an in-memory database.
    Demo,
}

/// `user` subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    /// Add a user.
    Add {
        /// Login name.
        username: String,
        /// Password.
        #[arg(long)]
        password: String,
        /// Display name.
        #[arg(long)]
        name: Option<String>,
    },
}

/// `role` subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum RoleCommand {
    /// Add a role.
    Add {
        /// Role name.
        name: String,
    },
    /// Give a user a role.
    Assign {
        /// Login name of the user.
        username: String,
        /// Role name.
        role: String,
    },
}

/// Resolved configuration for one invocation.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Database file.
    pub db_path: PathBuf,
    /// Output format.
    pub format: OutputFormat,
    /// Mapper settings for the operator session.
    pub mapper: MapperConfig,
}

impl Args {
    /// Split into the configuration and the command to run.
    ///
    /// The operator works as the database owner: reads are not checked, and
    /// writes are checked only with `--enforce-writes`. Every write is audited.
    pub fn into_config(self) -> (CliConfig, Command) {
        let mut interceptor = InterceptorConfig::new().without_read_enforcement();
        if self.enforce_writes {
            interceptor = interceptor.with_write_enforcement();
        }

        let config = CliConfig {
            db_path: self.db,
            format: self.format,
            mapper: MapperConfig::default().with_interceptor(interceptor),
        };
        (config, self.command)
    }
}
