//! Query command implementation

use crate::config::Config;
use crate::error::Result;
use crate::graph::{
    ConnectionsReport, Edge, GraphQuery, PersonReport, Resolved, StatsReport, ThreadReport,
    TimelineReport,
};
use crate::meta::MetaDb;
use serde::Serialize;
use std::path::Path;

/// A graph query and its argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryCommand {
    Connections(String),
    Person(String),
    Thread(String),
    Timeline(String),
    Stats,
}

/// Result of any query, serialized as the inner report
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum QueryOutput {
    Connections(Resolved<ConnectionsReport>),
    Person(Resolved<PersonReport>),
    Thread(Resolved<ThreadReport>),
    Timeline(TimelineReport),
    Stats(StatsReport),
}

/// Run one query against the store under `root`
pub async fn cmd_query(config: &Config, root: &Path, command: QueryCommand) -> Result<QueryOutput> {
    let db = MetaDb::open_existing(&config.db_path(root), &config.store).await?;
    let graph = GraphQuery::new(&db, &config.query);

    let output = match command {
        QueryCommand::Connections(fragment) => QueryOutput::Connections(graph.connections(&fragment).await?),
        QueryCommand::Person(fragment) => QueryOutput::Person(graph.person(&fragment).await?),
        QueryCommand::Thread(fragment) => QueryOutput::Thread(graph.thread(&fragment).await?),
        QueryCommand::Timeline(term) => QueryOutput::Timeline(graph.timeline(&term).await?),
        QueryCommand::Stats => QueryOutput::Stats(graph.stats().await?),
    };

    db.close().await;
    Ok(output)
}

/// Print a query result to console
pub fn print_query_output(output: &QueryOutput) {
    match output {
        QueryOutput::Connections(resolved) => print_resolved(resolved, "entity", print_connections),
        QueryOutput::Person(resolved) => print_resolved(resolved, "person", print_person),
        QueryOutput::Thread(resolved) => print_resolved(resolved, "thread", print_thread),
        QueryOutput::Timeline(report) => print_timeline(report),
        QueryOutput::Stats(report) => print_stats(report),
    }
}

fn print_resolved<T>(resolved: &Resolved<T>, kind: &str, print: fn(&T)) {
    match resolved {
        Resolved::Found(report) => print(report),
        Resolved::NotFound { query } => println!("No {} found matching '{}'", kind, query),
    }
}

fn print_edge(arrow: &str, edge: &Edge) {
    println!(
        "  {} [{}] {} ({})",
        arrow, edge.relation, edge.name, edge.entity_type
    );
    if let Some(context) = &edge.context {
        println!("      \"{}\"", context);
    }
}

fn print_connections(report: &ConnectionsReport) {
    let entity = &report.entity;
    println!("\n🔗 {} [{}]\n", entity.name, entity.entity_type);
    for (key, value) in &entity.metadata {
        match value.as_str() {
            Some(text) => println!("  {}: {}", key, text),
            None => println!("  {}: {}", key, value),
        }
    }

    println!("\nOutgoing ({}):", report.outgoing.len());
    for edge in &report.outgoing {
        print_edge("→", edge);
    }

    println!("\nIncoming ({}):", report.incoming.len());
    for edge in &report.incoming {
        print_edge("←", edge);
    }
}

fn print_person(report: &PersonReport) {
    println!("\n👤 {}\n", report.person.name);

    println!("Threads ({}):", report.threads.len());
    for thread in &report.threads {
        match &thread.status {
            Some(status) => println!("  • {} - {}", thread.name, status),
            None => println!("  • {}", thread.name),
        }
    }

    println!("\nMeetings ({}):", report.meetings.len());
    for meeting in &report.meetings {
        println!("  • {} ({})", meeting.title, meeting.path);
    }
}

fn print_thread(report: &ThreadReport) {
    println!("\n🧵 {}\n", report.thread.name);
    if let Some(status) = report.thread.metadata.get("status").and_then(|v| v.as_str()) {
        println!("Status: {}\n", status);
    }

    println!("Related threads ({}):", report.related.len());
    for thread in &report.related {
        println!("  • {}", thread.name);
    }

    println!("\nMeetings ({}):", report.meetings.len());
    for meeting in &report.meetings {
        match &meeting.date {
            Some(date) => println!("  • {} ({})", meeting.name, date),
            None => println!("  • {}", meeting.name),
        }
    }

    println!("\nPeople ({}):", report.people.len());
    for person in &report.people {
        println!("  • {}", person.name);
    }
}

fn print_timeline(report: &TimelineReport) {
    println!("\n🕑 Timeline: {}\n", report.term);
    if report.hits.is_empty() {
        println!("No documents found matching '{}'", report.term);
        return;
    }

    for hit in &report.hits {
        println!("{} [{}] {}", hit.path, hit.doc_type, hit.title);
        println!("   {}\n", hit.snippet.replace('\n', " "));
    }
}

fn print_stats(report: &StatsReport) {
    println!("\n📊 Brain Stats\n");
    println!("Documents: {}", report.totals.documents);
    println!("Entities: {}", report.totals.entities);
    println!("Relationships: {}", report.totals.relationships);

    println!("\nDocuments by type:");
    for row in &report.documents_by_type {
        println!("  {}: {}", row.kind, row.count);
    }

    println!("\nEntities by type:");
    for row in &report.entities_by_type {
        println!("  {}: {}", row.kind, row.count);
    }

    println!("\nMost connected:");
    for entity in &report.most_connected {
        println!("  {} ({}): {}", entity.name, entity.entity_type, entity.degree);
    }

    match report.last_indexed {
        Some(at) => println!("\nLast indexed: {}", at.to_rfc3339()),
        None => println!("\nLast indexed: never"),
    }

    if let Some(run) = &report.last_run {
        println!(
            "Last run: {} ({} indexed, {} unchanged)",
            run.status, run.docs_indexed, run.docs_skipped
        );
        for error in run.errors() {
            println!("  ! {}", error);
        }
    }
}
