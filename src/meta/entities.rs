//! Entity resolution: find-or-create by `(type, slug)`

use super::{EntityType, Metadata};
use crate::error::Result;
use crate::parse::slugify;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, SqliteConnection};

/// A stored entity
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Entity {
    pub id: i64,
    pub name: String,
    #[sqlx(rename = "type", try_from = "String")]
    pub entity_type: EntityType,
    pub slug: String,
    pub document_id: Option<i64>,
    #[sqlx(json)]
    pub metadata: Metadata,
}

/// Input for [`get_or_create`]
#[derive(Debug, Clone)]
pub struct NewEntity<'a> {
    pub name: &'a str,
    pub entity_type: EntityType,
    /// Defaults to the slug of `name`
    pub slug: Option<&'a str>,
    pub document_id: Option<i64>,
    pub metadata: Option<&'a Metadata>,
}

impl<'a> NewEntity<'a> {
    /// A bare reference by name, as produced by a wiki-link
    pub fn reference(name: &'a str, entity_type: EntityType) -> Self {
        Self {
            name,
            entity_type,
            slug: None,
            document_id: None,
            metadata: None,
        }
    }
}

/// Find or create an entity and return its id.
///
/// A single upsert keyed on `(type, slug)`. When the entity already exists,
/// `document_id` and `metadata` are replaced only if new values are supplied;
/// the display name follows the owning document when one is supplied.
pub async fn get_or_create(conn: &mut SqliteConnection, entity: &NewEntity<'_>) -> Result<i64> {
    let slug = match entity.slug {
        Some(slug) => slug.to_string(),
        None => slugify(entity.name),
    };

    let id = sqlx::query_scalar(
        r#"
        INSERT INTO entities (name, type, slug, document_id, metadata)
        VALUES (?1, ?2, ?3, ?4, COALESCE(?5, '{}'))
        ON CONFLICT(type, slug) DO UPDATE SET
            name = CASE WHEN ?4 IS NULL THEN entities.name ELSE excluded.name END,
            document_id = COALESCE(?4, entities.document_id),
            metadata = COALESCE(?5, entities.metadata)
        RETURNING id
        "#,
    )
    .bind(entity.name)
    .bind(entity.entity_type.as_str())
    .bind(slug)
    .bind(entity.document_id)
    .bind(entity.metadata.map(Json))
    .fetch_one(&mut *conn)
    .await?;

    Ok(id)
}

/// Pick one entity by case-insensitive substring match on name or slug.
///
/// Several rows may match; the winner is an exact name or slug match if any,
/// then the shortest name, then the lowest id. Case is folded with Unicode
/// rules, so `émile` finds `Émile`.
pub async fn resolve(
    conn: &mut SqliteConnection,
    fragment: &str,
    entity_type: Option<EntityType>,
) -> Result<Option<Entity>> {
    let fragment = fragment.trim();
    if fragment.is_empty() {
        return Ok(None);
    }
    let needle = fragment.to_lowercase();
    let needle_slug = slugify(fragment);

    let candidates = sqlx::query_as::<_, Entity>(
        "SELECT * FROM entities WHERE ?1 IS NULL OR type = ?1 ORDER BY id",
    )
    .bind(entity_type.map(|t| t.as_str()))
    .fetch_all(&mut *conn)
    .await?;

    let best = candidates
        .into_iter()
        .filter_map(|entity| {
            let name = entity.name.to_lowercase();
            let slug_hit = |s: &str| !s.is_empty() && entity.slug.contains(s);
            let exact = name == needle || entity.slug == needle || entity.slug == needle_slug;
            if !(exact || name.contains(&needle) || slug_hit(&needle) || slug_hit(&needle_slug)) {
                return None;
            }
            Some(((!exact, entity.name.chars().count(), entity.id), entity))
        })
        .min_by_key(|(rank, _)| *rank)
        .map(|(_, entity)| entity);

    Ok(best)
}

/// Entities with no owning document and no edges in either direction
pub async fn list_orphans(conn: &mut SqliteConnection) -> Result<Vec<Entity>> {
    let orphans = sqlx::query_as::<_, Entity>(
        r#"
        SELECT * FROM entities e
        WHERE e.document_id IS NULL
          AND NOT EXISTS (SELECT 1 FROM relationships r WHERE r.source_id = e.id)
          AND NOT EXISTS (SELECT 1 FROM relationships r WHERE r.target_id = e.id)
        ORDER BY e.type, e.name, e.id
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(orphans)
}

pub async fn delete(conn: &mut SqliteConnection, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM entities WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
