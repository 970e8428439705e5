//! Default values for configuration

use crate::meta::DocType;
use std::collections::BTreeMap;

/// Default database file name, created inside the brain root
pub fn default_db_name() -> String {
    ".brain.db".to_string()
}

/// Default SQLite busy timeout in seconds
pub fn default_busy_timeout_secs() -> u64 {
    5
}

/// Default root files and the document type each one maps to
pub fn default_root_files() -> BTreeMap<String, DocType> {
    BTreeMap::from([
        ("handoff.md".to_string(), DocType::Handoff),
        ("commitments.md".to_string(), DocType::Commitment),
        ("config.md".to_string(), DocType::Config),
        ("health.md".to_string(), DocType::Health),
        ("preferences.md".to_string(), DocType::Preferences),
    ])
}

/// Default directory prefixes and the document type of files beneath them
pub fn default_dir_prefixes() -> BTreeMap<String, DocType> {
    BTreeMap::from([
        ("threads".to_string(), DocType::Thread),
        ("people".to_string(), DocType::Person),
        ("archive/meetings".to_string(), DocType::Meeting),
    ])
}

/// Default maximum timeline hits
pub fn default_timeline_limit() -> usize {
    20
}

/// Default snippet width in tokens
pub fn default_snippet_tokens() -> usize {
    40
}

/// Default number of entities in the most-connected list
pub fn default_top_connected() -> usize {
    10
}

/// Default: show a progress bar while indexing
pub fn default_show_progress() -> bool {
    true
}

/// Default brain root (~/brain), overridden by `--root` / `BRAIN_ROOT`
pub fn default_brain_root() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("brain")
}
