//! CLI commands implementation

pub mod index;
pub mod prune;
pub mod query;

pub use index::*;
pub use prune::*;
pub use query::*;
