//! Prune command - drop documents whose files are gone, and orphan entities

use crate::config::Config;
use crate::error::Result;
use crate::meta::{documents, entities, MetaDb};
use crate::parse::Classifier;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Prune options
#[derive(Debug, Clone, Default)]
pub struct PruneOptions {
    /// Report what would be removed without writing
    pub dry_run: bool,
    /// Also remove entities with no owning document and no edges
    pub orphans: bool,
}

/// Prune statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PruneStats {
    pub dry_run: bool,
    /// Paths of removed (or, in a dry run, removable) documents
    pub documents_removed: Vec<String>,
    /// Names of removed orphan entities
    pub orphans_removed: Vec<String>,
}

pub async fn cmd_prune(config: &Config, root: &Path, options: PruneOptions) -> Result<PruneStats> {
    info!(dry_run = options.dry_run, "Starting prune operation");

    let db = MetaDb::open_existing(&config.db_path(root), &config.store).await?;
    let classifier = Classifier::new(&config.classify);

    let mut stats = PruneStats {
        dry_run: options.dry_run,
        ..PruneStats::default()
    };

    let mut conn = db.pool().acquire().await?;
    let stale: Vec<_> = documents::list_refs(&mut conn)
        .await?
        .into_iter()
        .filter(|doc| classifier.classify(&doc.path).is_none() || !root.join(&doc.path).is_file())
        .collect();
    drop(conn);

    for doc in stale {
        if !options.dry_run {
            let mut tx = db.begin().await?;
            documents::delete(&mut tx, doc.id).await?;
            tx.commit().await?;
            debug!(path = %doc.path, doc_type = %doc.doc_type, "Removed stale document");
        }
        stats.documents_removed.push(doc.path);
    }

    if options.orphans {
        let mut tx = db.begin().await?;
        for orphan in entities::list_orphans(&mut tx).await? {
            if !options.dry_run {
                entities::delete(&mut tx, orphan.id).await?;
            }
            stats
                .orphans_removed
                .push(format!("{} ({})", orphan.name, orphan.entity_type));
        }
        if options.dry_run {
            tx.rollback().await?;
        } else {
            tx.commit().await?;
        }
    }

    info!(
        documents = stats.documents_removed.len(),
        orphans = stats.orphans_removed.len(),
        dry_run = options.dry_run,
        "Prune finished"
    );

    db.close().await;
    Ok(stats)
}

/// Print prune statistics
pub fn print_prune_stats(stats: &PruneStats) {
    let verb = if stats.dry_run { "Would remove" } else { "Removed" };

    println!("\n🧹 Prune{}\n", if stats.dry_run { " (dry run)" } else { "" });
    println!("{} {} stale document(s)", verb, stats.documents_removed.len());
    for path in &stats.documents_removed {
        println!("  - {}", path);
    }

    if !stats.orphans_removed.is_empty() {
        println!("{} {} orphan entit(ies)", verb, stats.orphans_removed.len());
        for name in &stats.orphans_removed {
            println!("  - {}", name);
        }
    }
}
