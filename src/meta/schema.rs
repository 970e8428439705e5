//! SQLite schema definition

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use std::borrow::Cow;
use tracing::debug;

/// Built-in schema script, applied when no external script is configured
pub const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Resolve the schema script for a store.
///
/// A configured `schema_path` must exist and be readable; anything else is a
/// store initialization failure.
pub fn load_schema(store: &StoreConfig) -> Result<Cow<'static, str>> {
    let Some(path) = &store.schema_path else {
        return Ok(Cow::Borrowed(SCHEMA_SQL));
    };

    debug!("Loading schema from {:?}", path);
    std::fs::read_to_string(path)
        .map(Cow::Owned)
        .map_err(|e| Error::StoreInit(format!("schema not found at {}: {}", path.display(), e)))
}
