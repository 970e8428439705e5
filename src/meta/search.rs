//! FTS5 full-text index, one record per document

use super::DocType;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};

/// Marker placed before a matched term in snippets
pub const HIGHLIGHT_OPEN: &str = ">>>";
/// Marker placed after a matched term in snippets
pub const HIGHLIGHT_CLOSE: &str = "<<<";
/// Marker for text cut from either side of a snippet
pub const ELLIPSIS: &str = "...";

/// Input for [`insert`]
#[derive(Debug, Clone)]
pub struct SearchRecord<'a> {
    pub document_id: i64,
    pub title: &'a str,
    pub content: &'a str,
    pub entity_names: &'a [String],
    pub path: &'a str,
    pub doc_type: DocType,
}

/// A full-text hit
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SearchHit {
    #[sqlx(rename = "type", try_from = "String")]
    pub doc_type: DocType,
    pub title: String,
    pub path: String,
    pub snippet: String,
}

pub async fn insert(conn: &mut SqliteConnection, record: &SearchRecord<'_>) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO search_index (title, content, entity_names, path, document_id, type)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.title)
    .bind(record.content)
    .bind(record.entity_names.join(" "))
    .bind(record.path)
    .bind(record.document_id)
    .bind(record.doc_type.as_str())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn delete_for_document(conn: &mut SqliteConnection, document_id: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM search_index WHERE document_id = ?")
        .bind(document_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

/// Match `term` against every document, ordered by path.
///
/// `snippet_tokens` is the FTS5 snippet width and must be within 1..=64.
pub async fn search(
    conn: &mut SqliteConnection,
    term: &str,
    limit: usize,
    snippet_tokens: usize,
) -> Result<Vec<SearchHit>> {
    let query = escape_fts5_query(term);
    if query.is_empty() {
        return Ok(Vec::new());
    }

    let sql = format!(
        r#"
        SELECT type, title, path,
               snippet(search_index, 1, '{open}', '{close}', '{ellipsis}', {tokens}) AS snippet
        FROM search_index
        WHERE search_index MATCH ?
        ORDER BY path
        LIMIT ?
        "#,
        open = HIGHLIGHT_OPEN,
        close = HIGHLIGHT_CLOSE,
        ellipsis = ELLIPSIS,
        tokens = snippet_tokens.clamp(1, 64),
    );

    let hits = sqlx::query_as::<_, SearchHit>(&sql)
        .bind(query)
        .bind(limit as i64)
        .fetch_all(&mut *conn)
        .await?;
    Ok(hits)
}

/// Turn free text into an FTS5 query: every word becomes a quoted string,
/// so punctuation is matched literally and all words must appear.
pub fn escape_fts5_query(term: &str) -> String {
    term.split_whitespace()
        .map(|word| format!("\"{}\"", word.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::tests::setup_test_db;

    #[test]
    fn test_escape_fts5_query() {
        assert_eq!(escape_fts5_query("Project X"), "\"Project\" \"X\"");
        assert_eq!(escape_fts5_query("say \"hi\""), "\"say\" \"\"\"hi\"\"\"");
        assert_eq!(escape_fts5_query("q3-roadmap:"), "\"q3-roadmap:\"");
        assert_eq!(escape_fts5_query("   "), "");
    }

    #[tokio::test]
    async fn test_search_orders_by_path_and_highlights() {
        let (db, _tmp) = setup_test_db().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let names = vec!["Budget".to_string()];

        for (id, path) in [(1, "threads/b.md"), (2, "archive/meetings/a.md")] {
            insert(
                &mut conn,
                &SearchRecord {
                    document_id: id,
                    title: "Notes",
                    content: "We reviewed the budget with finance on Tuesday.",
                    entity_names: &names,
                    path,
                    doc_type: DocType::Thread,
                },
            )
            .await
            .unwrap();
        }

        let hits = search(&mut conn, "budget", 20, 40).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].path, "archive/meetings/a.md");
        assert!(hits[0].snippet.contains(">>>budget<<<"));

        assert_eq!(search(&mut conn, "budget", 1, 40).await.unwrap().len(), 1);
        assert!(search(&mut conn, "missing", 20, 40).await.unwrap().is_empty());

        delete_for_document(&mut conn, 1).await.unwrap();
        assert_eq!(search(&mut conn, "budget", 20, 40).await.unwrap().len(), 1);
    }
}
