//! Document classification and entity extraction
//!
//! This module handles:
//! - Mapping brain-relative paths to document types
//! - Discovering indexable files under a brain root
//! - Turning a document into the entities, links and search names it implies

mod markdown;

pub use markdown::*;

use crate::config::ClassifyConfig;
use crate::error::{Error, Result};
use crate::meta::{DocType, EntityType, Metadata, RelationType};
use serde_json::{json, Value};
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Longest stored commitment name
const COMMITMENT_NAME_CHARS: usize = 80;
/// Prefix of a commitment's text used for its slug
const COMMITMENT_SLUG_CHARS: usize = 40;

/// Static path → document type rules
#[derive(Debug, Clone)]
pub struct Classifier {
    root_files: Vec<(String, DocType)>,
    /// Longest prefix first, so nested prefixes win
    dir_prefixes: Vec<(String, DocType)>,
}

impl Classifier {
    pub fn new(config: &ClassifyConfig) -> Self {
        let root_files = config
            .root_files
            .iter()
            .map(|(name, doc_type)| (name.clone(), *doc_type))
            .collect();

        let mut dir_prefixes: Vec<(String, DocType)> = config
            .dir_prefixes
            .iter()
            .map(|(prefix, doc_type)| (prefix.trim_matches('/').to_string(), *doc_type))
            .filter(|(prefix, _)| !prefix.is_empty())
            .collect();
        dir_prefixes.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(&b.0)));

        Self {
            root_files,
            dir_prefixes,
        }
    }

    /// Document type for a brain-relative, `/`-separated path
    pub fn classify(&self, rel_path: &str) -> Option<DocType> {
        if let Some((_, doc_type)) = self.root_files.iter().find(|(name, _)| name == rel_path) {
            return Some(*doc_type);
        }

        if !rel_path.ends_with(".md") {
            return None;
        }

        self.dir_prefixes
            .iter()
            .find(|(prefix, _)| {
                rel_path
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
            })
            .map(|(_, doc_type)| *doc_type)
    }

    /// Every file under `root` that classifies, sorted by path
    pub fn find_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();

        for (name, _) in &self.root_files {
            let path = root.join(name);
            if path.is_file() {
                files.push(path);
            }
        }

        for (prefix, _) in &self.dir_prefixes {
            let dir = root.join(prefix);
            if !dir.is_dir() {
                continue;
            }

            let walker = WalkDir::new(&dir)
                .follow_links(true)
                .into_iter()
                .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()));

            for entry in walker {
                match entry {
                    Ok(e) if e.file_type().is_file() => {
                        let path = e.into_path();
                        let classified = relative_path(root, &path)
                            .ok()
                            .and_then(|rel| self.classify(&rel));
                        if classified.is_some() {
                            files.push(path);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => debug!("Skipping unreadable entry: {}", e),
                }
            }
        }

        files.sort();
        files.dedup();
        files
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

/// Brain-relative path with `/` separators
pub fn relative_path(root: &Path, path: &Path) -> Result<String> {
    let rel = path
        .strip_prefix(root)
        .map_err(|_| Error::InvalidPath(format!("{} is outside {}", path.display(), root.display())))?;

    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect();

    if parts.is_empty() {
        return Err(Error::InvalidPath(path.display().to_string()));
    }
    Ok(parts.join("/"))
}

/// An entity a document defines
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySpec {
    pub name: String,
    pub entity_type: EntityType,
    pub slug: String,
    pub metadata: Metadata,
}

/// Everything derived from one document
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// The entity the document stands for (threads, people, meetings)
    pub primary: Option<EntitySpec>,
    /// Entities listed inside the document (commitment items)
    pub items: Vec<EntitySpec>,
    /// Wiki-links, one per occurrence
    pub links: Vec<WikiLink>,
    /// Edge type for links; `None` means links produce no edges
    pub relation: Option<RelationType>,
    /// Names appended to the document's search record
    pub entity_names: Vec<String>,
}

/// Derive entities, links and search names from a classified document
pub fn extract(doc_type: DocType, rel_path: &str, title: &str, content: &str) -> Extraction {
    let mut extraction = Extraction {
        relation: doc_type.link_relation(),
        ..Extraction::default()
    };

    if let Some(entity_type) = doc_type.primary_entity() {
        let metadata = primary_metadata(doc_type, content);
        let slug = Some(stem_slug(rel_path))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| slugify(title));

        if slug.is_empty() {
            debug!(path = %rel_path, "No usable slug for primary entity");
        } else {
            extraction.entity_names.push(title.to_string());
            extraction.primary = Some(EntitySpec {
                name: title.to_string(),
                entity_type,
                slug,
                metadata,
            });
        }
    }

    if doc_type == DocType::Commitment {
        for item in extract_checklist(content) {
            let slug = slugify(&truncate_chars(&item.text, COMMITMENT_SLUG_CHARS));
            if slug.is_empty() {
                continue;
            }
            let name = truncate_chars(&item.text, COMMITMENT_NAME_CHARS);

            let mut metadata = Metadata::new();
            metadata.insert("completed".into(), Value::Bool(item.completed));
            if let Some(owner) = item.owner {
                metadata.insert("owner".into(), json!(owner));
            }
            if let Some(date) = item.date {
                metadata.insert("date".into(), json!(date.to_string()));
            }

            extraction.entity_names.push(name.clone());
            extraction.items.push(EntitySpec {
                name,
                entity_type: EntityType::Commitment,
                slug,
                metadata,
            });
        }
    }

    if extraction.relation.is_some() || doc_type == DocType::Handoff {
        extraction.links = extract_wiki_links(content)
            .into_iter()
            .filter(|link| !slugify(&link.name).is_empty())
            .collect();
        extraction
            .entity_names
            .extend(extraction.links.iter().map(|link| link.name.clone()));
    }

    extraction
}

fn stem_slug(rel_path: &str) -> String {
    Path::new(rel_path)
        .file_stem()
        .map(|s| slugify(&s.to_string_lossy()))
        .unwrap_or_default()
}

fn primary_metadata(doc_type: DocType, content: &str) -> Metadata {
    let mut metadata = Metadata::new();
    let dates = extract_dates(content);

    match doc_type {
        DocType::Thread => {
            if let Some(status) = extract_field(content, "Status") {
                metadata.insert("status".into(), json!(status));
            }
            if let Some(last) = dates.iter().max() {
                metadata.insert("last_date".into(), json!(last.to_string()));
            }
        }
        DocType::Person => {
            if let Some(role) = extract_field(content, "Role") {
                metadata.insert("role".into(), json!(role));
            }
            if let Some(last) = dates.iter().max() {
                metadata.insert("last_contact".into(), json!(last.to_string()));
            }
        }
        DocType::Meeting => {
            if let Some(first) = dates.iter().min() {
                metadata.insert("date".into(), json!(first.to_string()));
            }
        }
        _ => {}
    }

    metadata
}
