//! ormaudit command-line tool
//!
//! Manages permission records, principals and the audit trail of an
//! ormaudit SQLite database.

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod commands;
mod config;
mod error;
mod formatter;

use clap::Parser;
use config::Args;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ormaudit=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let (config, command) = args.into_config();
    tracing::debug!(
        db = %config.db_path.display(),
        format = %config.format,
        "configuration loaded"
    );

    let formatter = formatter::create_formatter(config.format);
    match commands::execute(&config, command, &*formatter) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("{}", formatter.format_message(&format!("Error: {}", e)));
            std::process::exit(1);
        }
    }
}
