//! Index command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::meta::documents::{self, DocumentWrite, NewDocument};
use crate::meta::entities::{get_or_create, NewEntity};
use crate::meta::relationships::{self, NewRelationship};
use crate::meta::search::{self, SearchRecord};
use crate::meta::{load_schema, DocType, EntityType, MetaDb, RunStatus, StoreTotals};
use crate::parse::{extract, extract_title, relative_path, Classifier};
use crate::progress::FileProgress;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// Index options
#[derive(Debug, Clone, Default)]
pub struct IndexOptions {
    /// Drop the store and rebuild it from scratch
    pub full: bool,
}

/// Statistics from an index pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    pub files_found: usize,
    pub docs_indexed: usize,
    pub docs_unchanged: usize,
    pub docs_unreadable: usize,
    pub entities_written: usize,
    pub relationships_written: usize,
    pub errors: Vec<String>,
    pub totals: StoreTotals,
}

/// What one document contributed to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentOutcome {
    Unchanged,
    Indexed { entities: usize, relationships: usize },
}

/// Scan `root` and bring the store up to date with it
pub async fn cmd_index(config: &Config, root: &Path, options: IndexOptions) -> Result<IndexStats> {
    if !root.is_dir() {
        return Err(Error::InvalidPath(format!(
            "brain root {} is not a directory",
            root.display()
        )));
    }

    let db_path = config.db_path(root);

    if options.full {
        // Fail on a bad schema before anything is deleted
        load_schema(&config.store)?;
        info!("Full re-index: removing {}", db_path.display());
        MetaDb::remove_files(&db_path)?;
    }

    let db = MetaDb::open(&db_path, &config.store).await?;
    let classifier = Classifier::new(&config.classify);

    let files = classifier.find_files(root);
    info!("Found {} files to index under {}", files.len(), root.display());

    let mut stats = IndexStats {
        files_found: files.len(),
        ..IndexStats::default()
    };

    let run_id = db.start_index_run().await?;
    let progress = FileProgress::new(files.len(), "Indexing", config.index.show_progress);

    for file_path in &files {
        let rel_path = match relative_path(root, file_path) {
            Ok(rel_path) => rel_path,
            Err(e) => {
                warn!("{}", e);
                stats.errors.push(e.to_string());
                continue;
            }
        };
        progress.tick(&rel_path);

        let Some(doc_type) = classifier.classify(&rel_path) else {
            debug!(path = %rel_path, "Not a brain document");
            continue;
        };

        let content = match std::fs::read_to_string(file_path) {
            Ok(content) => content,
            Err(e) => {
                debug!(path = %rel_path, "Skipping unreadable file: {}", e);
                stats.docs_unreadable += 1;
                continue;
            }
        };

        match index_document(&db, &rel_path, doc_type, &content, options.full).await {
            Ok(DocumentOutcome::Unchanged) => stats.docs_unchanged += 1,
            Ok(DocumentOutcome::Indexed {
                entities,
                relationships,
            }) => {
                stats.docs_indexed += 1;
                stats.entities_written += entities;
                stats.relationships_written += relationships;
            }
            Err(e) => {
                let error_msg = format!("{}: {}", rel_path, e);
                warn!("{}", error_msg);
                stats.errors.push(error_msg);
            }
        }
    }

    progress.finish("Indexing complete");

    let status = if stats.errors.is_empty() {
        RunStatus::Completed
    } else {
        RunStatus::Failed
    };
    db.complete_index_run(
        run_id,
        status,
        stats.docs_indexed as i64,
        stats.docs_unchanged as i64,
        &stats.errors,
    )
    .await?;

    if status == RunStatus::Completed {
        db.set_last_indexed(Utc::now()).await?;
    }
    db.set_document_count(files.len() as u64).await?;

    stats.totals = db.totals().await?;
    info!(
        indexed = stats.docs_indexed,
        unchanged = stats.docs_unchanged,
        errors = stats.errors.len(),
        "Index pass finished"
    );

    db.close().await;
    Ok(stats)
}

/// Write one document and everything derived from it in a single transaction.
///
/// An error drops the transaction, leaving the previous state of the
/// document intact.
async fn index_document(
    db: &MetaDb,
    rel_path: &str,
    doc_type: DocType,
    content: &str,
    force: bool,
) -> Result<DocumentOutcome> {
    let title = extract_title(content, rel_path);
    let mut tx = db.begin().await?;

    let doc = NewDocument {
        path: rel_path,
        doc_type,
        title: &title,
        content,
    };
    let doc_id = match documents::upsert(&mut tx, &doc, force).await? {
        DocumentWrite::Unchanged => return Ok(DocumentOutcome::Unchanged),
        DocumentWrite::Written { id, .. } => id,
    };

    let extraction = extract(doc_type, rel_path, &title, content);
    let mut entities = 0;
    let mut edges = 0;

    let primary_id = match &extraction.primary {
        Some(spec) => {
            let id = get_or_create(
                &mut tx,
                &NewEntity {
                    name: &spec.name,
                    entity_type: spec.entity_type,
                    slug: Some(&spec.slug),
                    document_id: Some(doc_id),
                    metadata: Some(&spec.metadata),
                },
            )
            .await?;
            entities += 1;
            Some(id)
        }
        None => None,
    };

    for item in &extraction.items {
        get_or_create(
            &mut tx,
            &NewEntity {
                name: &item.name,
                entity_type: item.entity_type,
                slug: Some(&item.slug),
                document_id: Some(doc_id),
                metadata: Some(&item.metadata),
            },
        )
        .await?;
        entities += 1;
    }

    if let (Some(source_id), Some(relation)) = (primary_id, extraction.relation) {
        for link in &extraction.links {
            let target_id =
                get_or_create(&mut tx, &NewEntity::reference(&link.name, EntityType::Thread))
                    .await?;
            relationships::insert(
                &mut tx,
                &NewRelationship {
                    source_id,
                    target_id,
                    relation,
                    context: Some(&link.context),
                    source_document_id: doc_id,
                },
            )
            .await?;
            edges += 1;
        }
    }

    search::insert(
        &mut tx,
        &SearchRecord {
            document_id: doc_id,
            title: &title,
            content,
            entity_names: &extraction.entity_names,
            path: rel_path,
            doc_type,
        },
    )
    .await?;

    tx.commit().await?;
    debug!(path = %rel_path, doc_id, entities, edges, "Indexed document");

    Ok(DocumentOutcome::Indexed {
        entities,
        relationships: edges,
    })
}

/// Print index statistics; per-file errors go to stderr
pub fn print_index_stats(stats: &IndexStats) {
    println!("\n✓ Indexing complete");
    println!("  Files found: {}", stats.files_found);
    println!("  Indexed: {}", stats.docs_indexed);
    println!("  Skipped (unchanged): {}", stats.docs_unchanged);
    if stats.docs_unreadable > 0 {
        println!("  Unreadable: {}", stats.docs_unreadable);
    }
    println!("\nStore totals:");
    println!("  Documents: {}", stats.totals.documents);
    println!("  Entities: {}", stats.totals.entities);
    println!("  Relationships: {}", stats.totals.relationships);

    if !stats.errors.is_empty() {
        eprintln!("\nErrors:");
        for error in &stats.errors {
            eprintln!("- {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{entities, SCHEMA_SQL};
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn quiet_config() -> Config {
        let mut config = Config::default();
        config.index.show_progress = false;
        config
    }

    #[tokio::test]
    async fn test_index_records_run_and_settings() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "threads/alpha.md", "# Alpha\nSee [[Beta]].");
        write(root, "notes/ignored.md", "# Ignored");
        let config = quiet_config();

        let stats = cmd_index(&config, root, IndexOptions::default()).await.unwrap();
        assert_eq!(stats.files_found, 1);
        assert_eq!(stats.docs_indexed, 1);
        assert_eq!(stats.relationships_written, 1);
        assert!(stats.errors.is_empty());

        let db = MetaDb::open_existing(&config.db_path(root), &config.store)
            .await
            .unwrap();
        assert!(db.last_indexed().await.unwrap().is_some());
        assert_eq!(db.document_count().await.unwrap(), Some(1));
        let run = db.latest_index_run().await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.docs_indexed, 1);
    }

    #[tokio::test]
    async fn test_unreadable_file_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "people/ok.md", "# Ok");
        let bad = root.join("people/bad.md");
        std::fs::write(&bad, [0xff, 0xfe, 0x00, 0x80]).unwrap();

        let stats = cmd_index(&quiet_config(), root, IndexOptions::default())
            .await
            .unwrap();
        assert_eq!(stats.docs_indexed, 1);
        assert_eq!(stats.docs_unreadable, 1);
        assert!(stats.errors.is_empty());
    }

    #[tokio::test]
    async fn test_entity_metadata_follows_document() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        let config = quiet_config();
        write(root, "threads/vendor.md", "# Vendor\n**Status**: Active\n");
        cmd_index(&config, root, IndexOptions::default()).await.unwrap();

        write(root, "threads/vendor.md", "# Vendor Renewal\n**Status**: Done\n");
        cmd_index(&config, root, IndexOptions::default()).await.unwrap();

        let db = MetaDb::open_existing(&config.db_path(root), &config.store)
            .await
            .unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let entity = entities::resolve(&mut conn, "vendor", Some(EntityType::Thread))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entity.name, "Vendor Renewal");
        assert_eq!(entity.metadata["status"], "Done");
    }

    #[tokio::test]
    async fn test_missing_root_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let result = cmd_index(&quiet_config(), &tmp.path().join("nope"), IndexOptions::default()).await;
        assert!(matches!(result, Err(Error::InvalidPath(_))));
    }

    #[tokio::test]
    async fn test_full_reindex_with_missing_schema_keeps_store() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "threads/a.md", "# A");
        let mut config = quiet_config();
        cmd_index(&config, root, IndexOptions::default()).await.unwrap();

        config.store.schema_path = Some(root.join("missing.sql"));
        let result = cmd_index(&config, root, IndexOptions { full: true }).await;
        assert!(matches!(result, Err(Error::StoreInit(_))));
        assert!(config.db_path(root).exists());
    }

    /// Built-in schema plus a trigger that rejects every edge from one document
    fn schema_rejecting_edges_from(root: &Path, path: &str) -> std::path::PathBuf {
        let schema_path = root.join("reject.sql");
        let trigger = format!(
            r#"
CREATE TRIGGER IF NOT EXISTS reject_edges BEFORE INSERT ON relationships
WHEN (SELECT path FROM documents WHERE id = NEW.source_document_id) = '{path}'
BEGIN
    SELECT RAISE(ABORT, 'edge rejected');
END;
"#
        );
        std::fs::write(&schema_path, format!("{SCHEMA_SQL}\n{trigger}")).unwrap();
        schema_path
    }

    #[tokio::test]
    async fn test_failed_document_rolls_back_and_pass_continues() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        let mut config = quiet_config();
        config.store.schema_path = Some(schema_rejecting_edges_from(root, "threads/bad.md"));

        write(root, "threads/bad.md", "# Bad Original\n**Status**: Active\n");
        write(root, "threads/good.md", "# Good\n");
        let first = cmd_index(&config, root, IndexOptions::default()).await.unwrap();
        assert_eq!(first.docs_indexed, 2);
        assert!(first.errors.is_empty());

        let db = MetaDb::open_existing(&config.db_path(root), &config.store)
            .await
            .unwrap();
        let indexed_at = db.last_indexed().await.unwrap().unwrap();
        db.close().await;

        write(root, "threads/bad.md", "# Bad Rewritten\n**Status**: Done\nSee [[Elsewhere]].\n");
        write(root, "threads/good.md", "# Good\nSee [[Elsewhere]].\n");
        let second = cmd_index(&config, root, IndexOptions::default()).await.unwrap();

        assert_eq!(second.docs_indexed, 1);
        assert_eq!(second.errors.len(), 1);
        assert!(second.errors[0].starts_with("threads/bad.md: "));
        assert_eq!(second.totals.relationships, 1);

        let db = MetaDb::open_existing(&config.db_path(root), &config.store)
            .await
            .unwrap();
        let run = db.latest_index_run().await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.errors(), second.errors);
        assert_eq!(db.last_indexed().await.unwrap(), Some(indexed_at));

        // The failed document keeps its previous row and entity
        let title: String = sqlx::query_scalar("SELECT title FROM documents WHERE path = ?")
            .bind("threads/bad.md")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(title, "Bad Original");

        let mut conn = db.pool().acquire().await.unwrap();
        let entity = entities::resolve(&mut conn, "bad", Some(EntityType::Thread))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entity.name, "Bad Original");
        assert_eq!(entity.metadata["status"], "Active");
    }
}
