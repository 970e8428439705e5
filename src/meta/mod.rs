//! Graph storage using SQLite
//!
//! This module owns the on-disk store for a brain:
//! - Documents (one row per indexed markdown file)
//! - Entities (deduplicated by `(type, slug)`)
//! - Relationships (directed edges attributed to a source document)
//! - The FTS5 search index
//! - Indexer settings and index run history

pub mod documents;
pub mod entities;
pub mod relationships;
mod schema;
pub mod search;

pub use schema::*;

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{FromRow, Sqlite, Transaction};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Free-form entity metadata, stored as a JSON object
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Document classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocType {
    Thread,
    Person,
    Meeting,
    Commitment,
    Handoff,
    Config,
    Health,
    Preferences,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Thread => "thread",
            DocType::Person => "person",
            DocType::Meeting => "meeting",
            DocType::Commitment => "commitment",
            DocType::Handoff => "handoff",
            DocType::Config => "config",
            DocType::Health => "health",
            DocType::Preferences => "preferences",
        }
    }

    /// Entity type of the single entity a document of this type stands for
    pub fn primary_entity(&self) -> Option<EntityType> {
        match self {
            DocType::Thread => Some(EntityType::Thread),
            DocType::Person => Some(EntityType::Person),
            DocType::Meeting => Some(EntityType::Meeting),
            _ => None,
        }
    }

    /// Edge type produced by `[[wiki-links]]` inside a document of this type
    pub fn link_relation(&self) -> Option<RelationType> {
        match self {
            DocType::Thread => Some(RelationType::RelatedTo),
            DocType::Person => Some(RelationType::DiscussedAt),
            DocType::Meeting => Some(RelationType::MentionedIn),
            _ => None,
        }
    }
}

impl std::fmt::Display for DocType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "thread" => Ok(DocType::Thread),
            "person" => Ok(DocType::Person),
            "meeting" => Ok(DocType::Meeting),
            "commitment" => Ok(DocType::Commitment),
            "handoff" => Ok(DocType::Handoff),
            "config" => Ok(DocType::Config),
            "health" => Ok(DocType::Health),
            "preferences" => Ok(DocType::Preferences),
            _ => Err(Error::UnknownKind {
                kind: "document type",
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for DocType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Entity kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Thread,
    Person,
    Meeting,
    Commitment,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Thread => "thread",
            EntityType::Person => "person",
            EntityType::Meeting => "meeting",
            EntityType::Commitment => "commitment",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "thread" => Ok(EntityType::Thread),
            "person" => Ok(EntityType::Person),
            "meeting" => Ok(EntityType::Meeting),
            "commitment" => Ok(EntityType::Commitment),
            _ => Err(Error::UnknownKind {
                kind: "entity type",
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for EntityType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Edge kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    RelatedTo,
    DiscussedAt,
    MentionedIn,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::RelatedTo => "related_to",
            RelationType::DiscussedAt => "discussed_at",
            RelationType::MentionedIn => "mentioned_in",
        }
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "related_to" => Ok(RelationType::RelatedTo),
            "discussed_at" => Ok(RelationType::DiscussedAt),
            "mentioned_in" => Ok(RelationType::MentionedIn),
            _ => Err(Error::UnknownKind {
                kind: "relationship type",
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for RelationType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Index run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for RunStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            _ => Err(Error::UnknownKind {
                kind: "run status",
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for RunStatus {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Keys of the `indexer_meta` settings table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetaKey {
    LastIndexed,
    DocumentCount,
}

impl MetaKey {
    fn as_str(&self) -> &'static str {
        match self {
            MetaKey::LastIndexed => "last_indexed",
            MetaKey::DocumentCount => "document_count",
        }
    }
}

/// An index run record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct IndexRun {
    pub id: i64,
    pub started_at: String,
    pub completed_at: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: RunStatus,
    pub docs_indexed: i64,
    pub docs_skipped: i64,
    pub errors_json: Option<String>,
}

impl IndexRun {
    pub fn errors(&self) -> Vec<String> {
        self.errors_json
            .as_ref()
            .and_then(|j| serde_json::from_str(j).ok())
            .unwrap_or_default()
    }
}

/// Row counts over the three graph tables
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreTotals {
    pub documents: i64,
    pub entities: i64,
    pub relationships: i64,
}

/// Brain store handle
#[derive(Clone)]
pub struct MetaDb {
    pool: SqlitePool,
}

impl MetaDb {
    /// Open (creating if needed) the store at `db_path` and apply the schema
    pub async fn open(db_path: &Path, store: &StoreConfig) -> Result<Self> {
        let schema = load_schema(store)?;
        let db = Self::connect(db_path, store, true).await?;
        db.init_schema(&schema).await?;
        Ok(db)
    }

    /// Open an already-built store for reading
    pub async fn open_existing(db_path: &Path, store: &StoreConfig) -> Result<Self> {
        if !db_path.exists() {
            return Err(Error::StoreInit(format!(
                "database not found at {}; run 'brainstem index' first",
                db_path.display()
            )));
        }
        Self::connect(db_path, store, false).await
    }

    async fn connect(db_path: &Path, store: &StoreConfig, create: bool) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::StoreInit(format!("{}: {}", parent.display(), e)))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(create)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(store.busy_timeout_secs));

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| Error::StoreInit(format!("{}: {}", db_path.display(), e)))?;

        Ok(Self { pool })
    }

    /// Apply the schema script; every statement is `IF NOT EXISTS`
    pub async fn init_schema(&self, schema: &str) -> Result<()> {
        info!("Initializing database schema");
        sqlx::raw_sql(schema)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::StoreInit(format!("schema failed to apply: {}", e)))?;
        Ok(())
    }

    /// Delete the database file and its WAL side files
    pub fn remove_files(db_path: &Path) -> Result<()> {
        for suffix in ["", "-wal", "-shm"] {
            let mut name = db_path.as_os_str().to_owned();
            name.push(suffix);
            let path = PathBuf::from(name);
            if path.exists() {
                debug!("Removing {:?}", path);
                std::fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Begin a write transaction
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ===== Settings =====

    async fn get_meta(&self, key: MetaKey) -> Result<Option<String>> {
        let value = sqlx::query_scalar("SELECT value FROM indexer_meta WHERE key = ?")
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn set_meta(&self, key: MetaKey, value: String) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO indexer_meta (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key.as_str())
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Completion time of the last index pass that recorded no errors
    pub async fn last_indexed(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .get_meta(MetaKey::LastIndexed)
            .await?
            .and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
            .map(|dt| dt.with_timezone(&Utc)))
    }

    pub async fn set_last_indexed(&self, at: DateTime<Utc>) -> Result<()> {
        self.set_meta(MetaKey::LastIndexed, at.to_rfc3339()).await
    }

    /// Number of files seen by the last index pass
    pub async fn document_count(&self) -> Result<Option<u64>> {
        Ok(self
            .get_meta(MetaKey::DocumentCount)
            .await?
            .and_then(|v| v.parse().ok()))
    }

    pub async fn set_document_count(&self, count: u64) -> Result<()> {
        self.set_meta(MetaKey::DocumentCount, count.to_string()).await
    }

    // ===== Index Run Operations =====

    /// Record the start of an index pass
    pub async fn start_index_run(&self) -> Result<i64> {
        let id = sqlx::query_scalar(
            "INSERT INTO index_runs (started_at, status) VALUES (?, ?) RETURNING id",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(RunStatus::Running.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// Close an index pass with its final counters
    pub async fn complete_index_run(
        &self,
        id: i64,
        status: RunStatus,
        docs_indexed: i64,
        docs_skipped: i64,
        errors: &[String],
    ) -> Result<()> {
        let errors_json = if errors.is_empty() {
            None
        } else {
            Some(serde_json::to_string(errors)?)
        };
        sqlx::query(
            r#"
            UPDATE index_runs SET
                completed_at = ?,
                status = ?,
                docs_indexed = ?,
                docs_skipped = ?,
                errors_json = ?
            WHERE id = ?
            "#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(status.to_string())
        .bind(docs_indexed)
        .bind(docs_skipped)
        .bind(errors_json)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn latest_index_run(&self) -> Result<Option<IndexRun>> {
        let run = sqlx::query_as::<_, IndexRun>(
            "SELECT * FROM index_runs ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(run)
    }

    // ===== Statistics =====

    pub async fn totals(&self) -> Result<StoreTotals> {
        let documents = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        let entities = sqlx::query_scalar("SELECT COUNT(*) FROM entities")
            .fetch_one(&self.pool)
            .await?;
        let relationships = sqlx::query_scalar("SELECT COUNT(*) FROM relationships")
            .fetch_one(&self.pool)
            .await?;

        Ok(StoreTotals {
            documents,
            entities,
            relationships,
        })
    }
}
