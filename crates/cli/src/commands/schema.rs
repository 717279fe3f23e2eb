//! Schema commands.
//!
//! Both commands build the same executable schemas the connector serves, so
//! a clean `check` means the connector will start.

use std::io::{self, Write};

use cif_connector::resolvers::{self, ResolverModule};
use cif_connector::schema::SchemaBuildError;
use thiserror::Error;

/// Errors from the schema commands.
#[derive(Debug, Error)]
pub enum SchemaCommandError {
    #[error("Schema build failed: {0}")]
    Build(#[from] SchemaBuildError),

    #[error("Failed to write output: {0}")]
    Io(#[from] io::Error),
}

/// Build every resolver module's schema.
///
/// # Errors
///
/// Returns the first module's build error.
pub fn check() -> Result<(), SchemaCommandError> {
    resolvers::warm_up()?;
    tracing::info!(modules = ResolverModule::ALL.len(), "All schemas build");
    Ok(())
}

/// Write a module's SDL to stdout.
///
/// # Errors
///
/// Returns the module's build error or a write failure.
pub fn print(module: ResolverModule) -> Result<(), SchemaCommandError> {
    write_sdl(module, &mut io::stdout().lock())
}

fn write_sdl(module: ResolverModule, out: &mut impl Write) -> Result<(), SchemaCommandError> {
    let sdl = module.sdl()?;
    out.write_all(sdl.as_bytes())?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_check_passes() {
        check().unwrap();
    }

    #[test]
    fn test_print_category_sdl() {
        let mut out = Vec::new();
        write_sdl(ResolverModule::Category, &mut out).unwrap();
        let sdl = String::from_utf8(out).unwrap();
        assert!(sdl.contains("categoryList"));
        assert!(!sdl.contains("type Mutation"));
    }
}
