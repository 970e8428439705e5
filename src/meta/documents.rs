//! Document rows: one per indexed file, keyed by path

use super::{relationships, search, DocType};
use crate::error::Result;
use chrono::Utc;
use sqlx::{FromRow, SqliteConnection};
use tracing::debug;

/// Identity and classification of a stored document, without its content
#[derive(Debug, Clone, FromRow)]
pub struct DocumentRef {
    pub id: i64,
    pub path: String,
    #[sqlx(rename = "type", try_from = "String")]
    pub doc_type: DocType,
}

/// Input for [`upsert`]
#[derive(Debug, Clone)]
pub struct NewDocument<'a> {
    pub path: &'a str,
    pub doc_type: DocType,
    pub title: &'a str,
    pub content: &'a str,
}

/// Outcome of [`upsert`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentWrite {
    /// Stored hash matched; nothing was written
    Unchanged,
    /// Row written and its derived relationships and search record purged
    Written { id: i64, created: bool },
}

/// Compute the change-detection hash of document content
pub fn compute_content_hash(content: &[u8]) -> String {
    blake3::hash(content).to_hex().to_string()
}

/// Insert or update a document row.
///
/// Unless `force` is set, a row whose stored hash equals the new content hash
/// is left alone. On every write the document's previously derived
/// relationships and search record are deleted, so the caller re-derives
/// them from scratch.
pub async fn upsert(
    conn: &mut SqliteConnection,
    doc: &NewDocument<'_>,
    force: bool,
) -> Result<DocumentWrite> {
    let content_hash = compute_content_hash(doc.content.as_bytes());

    let existing: Option<(i64, String)> =
        sqlx::query_as("SELECT id, content_hash FROM documents WHERE path = ?")
            .bind(doc.path)
            .fetch_optional(&mut *conn)
            .await?;

    if let Some((_, stored_hash)) = &existing {
        if !force && *stored_hash == content_hash {
            debug!(path = %doc.path, "Document unchanged");
            return Ok(DocumentWrite::Unchanged);
        }
    }

    let now = Utc::now().to_rfc3339();
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO documents (path, type, title, content, content_hash, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(path) DO UPDATE SET
            type = excluded.type,
            title = excluded.title,
            content = excluded.content,
            content_hash = excluded.content_hash,
            updated_at = excluded.updated_at
        RETURNING id
        "#,
    )
    .bind(doc.path)
    .bind(doc.doc_type.as_str())
    .bind(doc.title)
    .bind(doc.content)
    .bind(&content_hash)
    .bind(&now)
    .bind(&now)
    .fetch_one(&mut *conn)
    .await?;

    let created = existing.is_none();
    if !created {
        let edges = relationships::delete_for_document(conn, id).await?;
        search::delete_for_document(conn, id).await?;
        debug!(path = %doc.path, doc_id = id, edges, "Purged derived rows");
    }

    Ok(DocumentWrite::Written { id, created })
}

/// All stored documents, ordered by path
pub async fn list_refs(conn: &mut SqliteConnection) -> Result<Vec<DocumentRef>> {
    let docs = sqlx::query_as::<_, DocumentRef>("SELECT id, path, type FROM documents ORDER BY path")
        .fetch_all(&mut *conn)
        .await?;
    Ok(docs)
}

/// Delete a document together with everything derived from it.
///
/// Entities it owned are kept; their owning-document reference is cleared.
pub async fn delete(conn: &mut SqliteConnection, id: i64) -> Result<()> {
    relationships::delete_for_document(conn, id).await?;
    search::delete_for_document(conn, id).await?;

    sqlx::query("UPDATE entities SET document_id = NULL WHERE document_id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    sqlx::query("DELETE FROM documents WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}
