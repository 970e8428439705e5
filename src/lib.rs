//! brainstem - incremental indexer and relationship graph for a markdown brain
//!
//! This library provides:
//! - Classification of brain files into document types
//! - Entity and wiki-link extraction from markdown
//! - A SQLite store holding documents, entities, relationships and an FTS5 index
//! - Read-only graph queries over the store

pub mod commands;
pub mod config;
pub mod error;
pub mod graph;
pub mod meta;
pub mod parse;
pub mod progress;

pub use config::Config;
pub use error::{Error, Result};
