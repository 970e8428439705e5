//! Directed, typed edges between entities

use super::RelationType;
use crate::error::Result;
use chrono::Utc;
use sqlx::SqliteConnection;

/// Input for [`insert`]
#[derive(Debug, Clone)]
pub struct NewRelationship<'a> {
    pub source_id: i64,
    pub target_id: i64,
    pub relation: RelationType,
    pub context: Option<&'a str>,
    pub source_document_id: i64,
}

/// Insert one edge. Edges are not deduplicated.
pub async fn insert(conn: &mut SqliteConnection, rel: &NewRelationship<'_>) -> Result<i64> {
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO relationships (source_id, target_id, type, context, source_document_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(rel.source_id)
    .bind(rel.target_id)
    .bind(rel.relation.as_str())
    .bind(rel.context)
    .bind(rel.source_document_id)
    .bind(Utc::now().to_rfc3339())
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

/// Delete every edge a document produced; returns the number removed
pub async fn delete_for_document(conn: &mut SqliteConnection, document_id: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM relationships WHERE source_document_id = ?")
        .bind(document_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::documents::{self, DocumentWrite, NewDocument};
    use crate::meta::entities::{get_or_create, NewEntity};
    use crate::meta::tests::setup_test_db;
    use crate::meta::{DocType, EntityType};

    #[tokio::test]
    async fn test_edges_are_scoped_to_their_document() {
        let (db, _tmp) = setup_test_db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let mut doc_ids = Vec::new();
        for path in ["people/ana.md", "people/ben.md"] {
            let doc = NewDocument {
                path,
                doc_type: DocType::Person,
                title: path,
                content: path,
            };
            let DocumentWrite::Written { id, .. } = documents::upsert(&mut conn, &doc, false)
                .await
                .unwrap()
            else {
                panic!("expected a write");
            };
            doc_ids.push(id);
        }

        let ana = get_or_create(&mut conn, &NewEntity::reference("Ana", EntityType::Person))
            .await
            .unwrap();
        let ben = get_or_create(&mut conn, &NewEntity::reference("Ben", EntityType::Person))
            .await
            .unwrap();
        let topic = get_or_create(&mut conn, &NewEntity::reference("Topic", EntityType::Thread))
            .await
            .unwrap();

        for (source, doc) in [(ana, doc_ids[0]), (ana, doc_ids[0]), (ben, doc_ids[1])] {
            insert(
                &mut conn,
                &NewRelationship {
                    source_id: source,
                    target_id: topic,
                    relation: RelationType::DiscussedAt,
                    context: Some("see [[Topic]]"),
                    source_document_id: doc,
                },
            )
            .await
            .unwrap();
        }

        assert_eq!(delete_for_document(&mut conn, doc_ids[0]).await.unwrap(), 2);
        assert_eq!(delete_for_document(&mut conn, doc_ids[0]).await.unwrap(), 0);

        let remaining: Vec<i64> = sqlx::query_scalar("SELECT source_document_id FROM relationships")
            .fetch_all(&mut *conn)
            .await
            .unwrap();
        assert_eq!(remaining, vec![doc_ids[1]]);
    }
}
