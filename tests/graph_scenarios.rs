//! End-to-end scenarios: index a brain on disk, then query the graph.

use brainstem::commands::{cmd_index, cmd_query, IndexOptions, IndexStats, QueryCommand, QueryOutput};
use brainstem::config::Config;
use brainstem::graph::{GraphQuery, Resolved};
use brainstem::meta::{EntityType, MetaDb, RunStatus};
use std::path::Path;
use tempfile::TempDir;

fn config() -> Config {
    let mut config = Config::default();
    config.index.show_progress = false;
    config
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

async fn index(root: &Path) -> IndexStats {
    cmd_index(&config(), root, IndexOptions::default()).await.unwrap()
}

async fn open(root: &Path) -> MetaDb {
    let config = config();
    MetaDb::open_existing(&config.db_path(root), &config.store)
        .await
        .unwrap()
}

/// Two people, three threads (one linking Thread A), one meeting linking Thread A
fn small_brain(root: &Path) {
    write(root, "people/sarah-chen.md", "# Sarah Chen\n**Role**: VP Eng\n");
    write(root, "people/omar-haddad.md", "# Omar Haddad\n**Role**: Finance\n");
    write(root, "threads/thread-a.md", "# Thread A\n**Status**: 🟢 Active\n");
    write(root, "threads/thread-b.md", "# Thread B\nDepends on [[Thread A]].\n");
    write(root, "threads/thread-c.md", "# Thread C\n");
    write(
        root,
        "archive/meetings/2024-03-01-planning.md",
        "# Planning\n2024-03-01\nSarah Chen walked through [[Thread A]].\n",
    );
}

#[tokio::test]
async fn end_to_end_counts() {
    let tmp = TempDir::new().unwrap();
    small_brain(tmp.path());

    let stats = index(tmp.path()).await;
    assert_eq!(stats.docs_indexed, 6);
    assert_eq!(stats.totals.documents, 6);
    assert!(stats.totals.entities >= 6);
    assert_eq!(stats.totals.relationships, 2);
}

#[tokio::test]
async fn second_pass_writes_nothing() {
    let tmp = TempDir::new().unwrap();
    small_brain(tmp.path());

    let first = index(tmp.path()).await;
    let second = index(tmp.path()).await;

    assert_eq!(second.docs_indexed, 0);
    assert_eq!(second.docs_unchanged, 6);
    assert_eq!(second.totals, first.totals);
}

#[tokio::test]
async fn edited_document_replaces_its_edges() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write(root, "threads/hub.md", "# Hub\n[[One]] [[Two]] [[Three]]\n");
    index(root).await;
    assert_eq!(index(root).await.totals.relationships, 3);

    write(root, "threads/hub.md", "# Hub\nOnly [[Two]] now.\n");
    let stats = index(root).await;
    assert_eq!(stats.docs_indexed, 1);
    assert_eq!(stats.totals.relationships, 1);

    let db = open(root).await;
    let config = config();
    let report = GraphQuery::new(&db, &config.query)
        .connections("hub")
        .await
        .unwrap()
        .found()
        .unwrap();
    let targets: Vec<&str> = report.outgoing.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(targets, vec!["Two"]);
    assert_eq!(report.outgoing[0].context.as_deref(), Some("Only [[Two]] now."));
}

#[tokio::test]
async fn shared_link_resolves_to_one_entity() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write(root, "threads/alpha.md", "# Alpha\nSee [[Project X]].\n");
    write(root, "people/kim.md", "# Kim\nOwns [[Project X]].\n");
    index(root).await;

    let db = open(root).await;
    let config = config();
    let report = GraphQuery::new(&db, &config.query)
        .connections("Project X")
        .await
        .unwrap()
        .found()
        .unwrap();

    assert_eq!(report.entity.entity_type, EntityType::Thread);
    let sources: Vec<&str> = report.incoming.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(sources, vec!["Kim", "Alpha"]);
}

#[tokio::test]
async fn full_reindex_matches_incremental() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    small_brain(root);
    index(root).await;

    write(root, "threads/thread-c.md", "# Thread C\nBlocked by [[Thread B]] and [[Thread D]].\n");
    write(root, "threads/thread-b.md", "# Thread B\nNo longer depends on anything.\n");
    write(root, "people/lena.md", "# Lena\nPairing on [[Thread C]].\n");
    let incremental = index(root).await;
    assert_eq!(incremental.docs_indexed, 3);

    let full = cmd_index(&config(), root, IndexOptions { full: true })
        .await
        .unwrap();
    assert_eq!(full.docs_indexed, full.files_found);
    assert_eq!(full.totals, incremental.totals);
    assert_eq!(full.totals.relationships, 4);
}

#[tokio::test]
async fn isolated_entity_has_no_connections() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "threads/island.md", "# Island\nNo links here.\n");
    index(tmp.path()).await;

    let output = cmd_query(&config(), tmp.path(), QueryCommand::Connections("island".into()))
        .await
        .unwrap();
    let QueryOutput::Connections(Resolved::Found(report)) = output else {
        panic!("expected a resolved entity");
    };
    assert!(report.outgoing.is_empty());
    assert!(report.incoming.is_empty());
}

#[tokio::test]
async fn person_lists_linked_topic_and_meetings() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write(root, "people/person-p.md", "# Person P\nDiscussed [[Topic T]] on 2024-05-02.\n");
    write(root, "archive/meetings/2024-05-02.md", "# Sync\nPerson P joined.\n");
    write(root, "archive/meetings/2024-04-01.md", "# Kickoff\nperson p (lowercase) only.\n");
    index(root).await;

    let output = cmd_query(&config(), root, QueryCommand::Person("P".into()))
        .await
        .unwrap();
    let QueryOutput::Person(Resolved::Found(report)) = output else {
        panic!("expected a resolved person");
    };

    let threads: Vec<&str> = report.threads.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(threads, vec!["Topic T"]);
    let meetings: Vec<&str> = report.meetings.iter().map(|m| m.path.as_str()).collect();
    assert_eq!(meetings, vec!["archive/meetings/2024-05-02.md"]);
}

#[tokio::test]
async fn thread_report_and_timeline() {
    let tmp = TempDir::new().unwrap();
    small_brain(tmp.path());
    index(tmp.path()).await;

    let output = cmd_query(&config(), tmp.path(), QueryCommand::Thread("thread a".into()))
        .await
        .unwrap();
    let QueryOutput::Thread(Resolved::Found(report)) = output else {
        panic!("expected a resolved thread");
    };
    assert_eq!(report.thread.name, "Thread A");
    assert_eq!(report.meetings.len(), 1);
    assert_eq!(report.meetings[0].date.as_deref(), Some("2024-03-01"));
    assert!(report.related.is_empty());

    let output = cmd_query(&config(), tmp.path(), QueryCommand::Timeline("Thread A".into()))
        .await
        .unwrap();
    let QueryOutput::Timeline(timeline) = output else {
        panic!("expected a timeline");
    };
    let paths: Vec<&str> = timeline.hits.iter().map(|h| h.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "archive/meetings/2024-03-01-planning.md",
            "threads/thread-a.md",
            "threads/thread-b.md",
        ]
    );
    assert!(timeline.hits[0].snippet.contains(">>>Thread<<<"));
}

#[tokio::test]
async fn stats_match_table_counts() {
    let tmp = TempDir::new().unwrap();
    small_brain(tmp.path());
    index(tmp.path()).await;

    let db = open(tmp.path()).await;
    let config = config();
    let stats = GraphQuery::new(&db, &config.query).stats().await.unwrap();

    for (table, reported) in [
        ("documents", stats.totals.documents),
        ("entities", stats.totals.entities),
        ("relationships", stats.totals.relationships),
    ] {
        let direct: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(direct, reported, "{} count", table);
    }

    assert_eq!(stats.most_connected[0].name, "Thread A");
    assert_eq!(stats.most_connected[0].degree, 2);
    assert!(stats.last_indexed.is_some());
    let run = stats.last_run.unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.docs_indexed, 6);
    assert!(run.errors().is_empty());
}
