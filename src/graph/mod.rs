//! Read-only graph queries over an indexed brain
//!
//! Every query returns a serializable report. A fragment that resolves to no
//! entity is a [`Resolved::NotFound`] value, not an error.

use crate::config::QueryConfig;
use crate::error::Result;
use crate::meta::entities::{self, Entity};
use crate::meta::search::{self, SearchHit};
use crate::meta::{DocType, EntityType, IndexRun, MetaDb, RelationType, StoreTotals};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqliteConnection};
use tracing::debug;

/// Outcome of a query that starts by resolving a name fragment
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolved<T> {
    Found(T),
    NotFound { query: String },
}

impl<T> Resolved<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Resolved::Found(report) => Some(report),
            Resolved::NotFound { .. } => None,
        }
    }
}

/// One edge, seen from the resolved entity
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Edge {
    pub edge_id: i64,
    #[sqlx(try_from = "String")]
    pub relation: RelationType,
    pub context: Option<String>,
    /// The entity at the other end
    pub entity_id: i64,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub entity_type: EntityType,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionsReport {
    pub entity: Entity,
    pub outgoing: Vec<Edge>,
    pub incoming: Vec<Edge>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThreadRef {
    pub name: String,
    pub slug: String,
    pub status: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MeetingMention {
    pub title: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PersonReport {
    pub person: Entity,
    pub threads: Vec<ThreadRef>,
    pub meetings: Vec<MeetingMention>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityRef {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeetingRef {
    pub name: String,
    pub slug: String,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThreadReport {
    pub thread: Entity,
    pub related: Vec<EntityRef>,
    pub meetings: Vec<MeetingRef>,
    pub people: Vec<EntityRef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelineReport {
    pub term: String,
    pub hits: Vec<SearchHit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeCount<K> {
    pub kind: K,
    pub count: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ConnectedEntity {
    pub id: i64,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub entity_type: EntityType,
    pub degree: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub totals: StoreTotals,
    pub documents_by_type: Vec<TypeCount<DocType>>,
    pub entities_by_type: Vec<TypeCount<EntityType>>,
    pub most_connected: Vec<ConnectedEntity>,
    /// Completion time of the last index pass without errors
    pub last_indexed: Option<DateTime<Utc>>,
    pub last_run: Option<IndexRun>,
}

/// Which edges of an entity to follow
#[derive(Debug, Clone, Copy)]
enum Direction {
    Outgoing,
    Incoming,
    Either,
}

impl Direction {
    fn join_clause(&self) -> &'static str {
        match self {
            Direction::Outgoing => "e.id = r.target_id AND r.source_id = ?1",
            Direction::Incoming => "e.id = r.source_id AND r.target_id = ?1",
            Direction::Either => {
                "(r.source_id = ?1 AND e.id = r.target_id) OR (r.target_id = ?1 AND e.id = r.source_id)"
            }
        }
    }
}

/// Query engine bound to an open store
pub struct GraphQuery<'a> {
    db: &'a MetaDb,
    config: &'a QueryConfig,
}

impl<'a> GraphQuery<'a> {
    pub fn new(db: &'a MetaDb, config: &'a QueryConfig) -> Self {
        Self { db, config }
    }

    /// Every edge touching the best match for `fragment`
    pub async fn connections(&self, fragment: &str) -> Result<Resolved<ConnectionsReport>> {
        let mut conn = self.db.pool().acquire().await?;
        let Some(entity) = entities::resolve(&mut conn, fragment, None).await? else {
            return Ok(not_found(fragment));
        };
        debug!(entity_id = entity.id, name = %entity.name, "Resolved entity");

        let outgoing = edges(&mut conn, entity.id, Direction::Outgoing).await?;
        let incoming = edges(&mut conn, entity.id, Direction::Incoming).await?;

        Ok(Resolved::Found(ConnectionsReport {
            entity,
            outgoing,
            incoming,
        }))
    }

    /// Threads a person is linked with, and meeting notes naming them
    pub async fn person(&self, fragment: &str) -> Result<Resolved<PersonReport>> {
        let mut conn = self.db.pool().acquire().await?;
        let Some(person) = entities::resolve(&mut conn, fragment, Some(EntityType::Person)).await?
        else {
            return Ok(not_found(fragment));
        };

        let threads = neighbors(&mut conn, person.id, EntityType::Thread, Direction::Either)
            .await?
            .into_iter()
            .map(|thread| ThreadRef {
                status: metadata_str(&thread, "status"),
                name: thread.name,
                slug: thread.slug,
            })
            .collect();

        let meetings = sqlx::query_as::<_, MeetingMention>(
            r#"
            SELECT title, path FROM documents
            WHERE type = ? AND instr(content, ?) > 0
            ORDER BY path DESC
            "#,
        )
        .bind(DocType::Meeting.as_str())
        .bind(&person.name)
        .fetch_all(&mut *conn)
        .await?;

        Ok(Resolved::Found(PersonReport {
            person,
            threads,
            meetings,
        }))
    }

    /// Related threads, meetings and people around a thread
    pub async fn thread(&self, fragment: &str) -> Result<Resolved<ThreadReport>> {
        let mut conn = self.db.pool().acquire().await?;
        let Some(thread) = entities::resolve(&mut conn, fragment, Some(EntityType::Thread)).await?
        else {
            return Ok(not_found(fragment));
        };

        let related = neighbors(&mut conn, thread.id, EntityType::Thread, Direction::Outgoing)
            .await?
            .into_iter()
            .map(entity_ref)
            .collect();

        let meetings = neighbors(&mut conn, thread.id, EntityType::Meeting, Direction::Incoming)
            .await?
            .into_iter()
            .map(|meeting| MeetingRef {
                date: metadata_str(&meeting, "date"),
                name: meeting.name,
                slug: meeting.slug,
            })
            .collect();

        let people = neighbors(&mut conn, thread.id, EntityType::Person, Direction::Either)
            .await?
            .into_iter()
            .map(entity_ref)
            .collect();

        Ok(Resolved::Found(ThreadReport {
            thread,
            related,
            meetings,
            people,
        }))
    }

    /// Full-text search ordered by path
    pub async fn timeline(&self, term: &str) -> Result<TimelineReport> {
        let mut conn = self.db.pool().acquire().await?;
        let hits = search::search(
            &mut conn,
            term,
            self.config.timeline_limit,
            self.config.snippet_tokens,
        )
        .await?;

        Ok(TimelineReport {
            term: term.to_string(),
            hits,
        })
    }

    /// Store-wide counts and the most connected entities
    pub async fn stats(&self) -> Result<StatsReport> {
        let totals = self.db.totals().await?;
        let mut conn = self.db.pool().acquire().await?;

        let documents_by_type = count_by_type(&mut conn, "documents").await?;
        let entities_by_type = count_by_type(&mut conn, "entities").await?;

        let most_connected = sqlx::query_as::<_, ConnectedEntity>(
            r#"
            SELECT e.id, e.name, e.type AS entity_type,
                   (SELECT COUNT(*) FROM relationships r WHERE r.source_id = e.id)
                 + (SELECT COUNT(*) FROM relationships r WHERE r.target_id = e.id) AS degree
            FROM entities e
            ORDER BY degree DESC, e.name, e.id
            LIMIT ?
            "#,
        )
        .bind(self.config.top_connected as i64)
        .fetch_all(&mut *conn)
        .await?;

        Ok(StatsReport {
            totals,
            documents_by_type,
            entities_by_type,
            most_connected,
            last_indexed: self.db.last_indexed().await?,
            last_run: self.db.latest_index_run().await?,
        })
    }
}

fn not_found<T>(fragment: &str) -> Resolved<T> {
    Resolved::NotFound {
        query: fragment.trim().to_string(),
    }
}

fn entity_ref(entity: Entity) -> EntityRef {
    EntityRef {
        name: entity.name,
        slug: entity.slug,
    }
}

fn metadata_str(entity: &Entity, key: &str) -> Option<String> {
    entity
        .metadata
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

async fn edges(conn: &mut SqliteConnection, entity_id: i64, direction: Direction) -> Result<Vec<Edge>> {
    let sql = format!(
        r#"
        SELECT r.id AS edge_id, r.type AS relation, r.context,
               e.id AS entity_id, e.name, e.type AS entity_type
        FROM relationships r
        JOIN entities e ON {join}
        ORDER BY e.type, e.name, r.id
        "#,
        join = direction.join_clause(),
    );

    let edges = sqlx::query_as::<_, Edge>(&sql)
        .bind(entity_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(edges)
}

/// Distinct entities of one type linked to `entity_id`, sorted by name
async fn neighbors(
    conn: &mut SqliteConnection,
    entity_id: i64,
    entity_type: EntityType,
    direction: Direction,
) -> Result<Vec<Entity>> {
    let sql = format!(
        r#"
        SELECT DISTINCT e.* FROM relationships r
        JOIN entities e ON {join}
        WHERE e.type = ?2 AND e.id <> ?1
        ORDER BY e.name, e.id
        "#,
        join = direction.join_clause(),
    );

    let entities = sqlx::query_as::<_, Entity>(&sql)
        .bind(entity_id)
        .bind(entity_type.as_str())
        .fetch_all(&mut *conn)
        .await?;
    Ok(entities)
}

async fn count_by_type<K>(conn: &mut SqliteConnection, table: &'static str) -> Result<Vec<TypeCount<K>>>
where
    K: std::str::FromStr<Err = crate::error::Error>,
{
    let sql = format!(
        "SELECT type, COUNT(*) AS n FROM {} GROUP BY type ORDER BY n DESC, type",
        table
    );
    let rows: Vec<(String, i64)> = sqlx::query_as(&sql).fetch_all(&mut *conn).await?;

    rows.into_iter()
        .map(|(kind, count)| Ok(TypeCount { kind: kind.parse()?, count }))
        .collect()
}
