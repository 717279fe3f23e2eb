//! CIF CLI - schema tooling for the connector.
//!
//! # Usage
//!
//! ```bash
//! # Build every resolver module's schema (exits non-zero on failure)
//! cif-cli schema check
//!
//! # Print the SDL served by one module
//! cif-cli schema print cart
//! ```
//!
//! # Commands
//!
//! - `schema check` - Validate the allow-lists against the storefront schema
//! - `schema print` - Export a module's filtered SDL

#![cfg_attr(not(test), forbid(unsafe_code))]

use cif_connector::resolvers::ResolverModule;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "cif-cli")]
#[command(author, version, about = "CIF connector tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect the storefront schemas
    Schema {
        #[command(subcommand)]
        action: SchemaAction,
    },
}

#[derive(Subcommand)]
enum SchemaAction {
    /// Build every resolver module's schema
    Check,
    /// Print a resolver module's SDL
    Print {
        /// Resolver module (`cart`, `category`, `customer`)
        module: ResolverModule,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), commands::schema::SchemaCommandError> {
    match cli.command {
        Commands::Schema { action } => match action {
            SchemaAction::Check => commands::schema::check(),
            SchemaAction::Print { module } => commands::schema::print(module),
        },
    }
}
