use std::path::PathBuf;

use anyhow::{Context, Result};
use console::style;
use ifcgraph_graph::SqliteGraphStore;
use serde::Serialize;

use crate::config::Config;
use crate::ui;

#[derive(Serialize)]
struct Stats {
    database: String,
    nodes: i64,
    relationships: i64,
    labels: Vec<Count>,
    relationship_types: Vec<Count>,
}

#[derive(Serialize)]
struct Count {
    name: String,
    count: i64,
}

impl From<(String, i64)> for Count {
    fn from((name, count): (String, i64)) -> Self {
        Self { name, count }
    }
}

pub async fn run(db: Option<PathBuf>, json: bool, config: &Config) -> Result<()> {
    let db_path = config.database_path(db);
    if !db_path.exists() {
        if json {
            println!("{}", serde_json::json!({ "database": db_path, "nodes": 0, "relationships": 0 }));
            return Ok(());
        }
        ui::error(&format!("No graph at {}", db_path.display()));
        ui::info("Load a model first:");
        println!("    ifcgraph load <MODEL>");
        return Ok(());
    }

    let store = SqliteGraphStore::open(&db_path)
        .await
        .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
    let stats = collect(&store, db_path.display().to_string()).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    ui::header(&format!("Graph {}", style(&stats.database).dim()));
    ui::count_row("Nodes", stats.nodes);
    ui::count_row("Relationships", stats.relationships);

    if !stats.labels.is_empty() {
        ui::header("Labels");
        for row in &stats.labels {
            ui::count_row(&row.name, row.count);
        }
    }
    if !stats.relationship_types.is_empty() {
        ui::header("Relationship types");
        for row in &stats.relationship_types {
            ui::count_row(&row.name, row.count);
        }
    }
    println!();
    Ok(())
}

async fn collect(store: &SqliteGraphStore, database: String) -> Result<Stats> {
    Ok(Stats {
        database,
        nodes: store.node_count().await?,
        relationships: store.relationship_count().await?,
        labels: store.node_count_by_label().await?.into_iter().map(Count::from).collect(),
        relationship_types: store
            .relationship_count_by_type()
            .await?
            .into_iter()
            .map(Count::from)
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifcgraph_graph::{GraphStoreAdapter, Identity, Node, Relationship};

    fn node(identity: &str, label: &str) -> Node {
        Node::new(Identity::from(identity)).with_label(label)
    }

    #[tokio::test]
    async fn test_collect_counts() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteGraphStore::open(&dir.path().join("graph.db")).await.unwrap();

        store.upsert_node(&node("1", "IfcWall")).await.unwrap();
        store.upsert_node(&node("2", "IfcWall")).await.unwrap();
        store.upsert_node(&node("3", "IfcOwnerHistory")).await.unwrap();
        store
            .create_relationship(&Relationship::new(
                Identity::from("1"),
                Identity::from("3"),
                "OwnerHistory",
            ))
            .await
            .unwrap();

        let stats = collect(&store, "memory".to_string()).await.unwrap();
        assert_eq!(stats.nodes, 3);
        assert_eq!(stats.relationships, 1);
        assert_eq!(stats.relationship_types.len(), 1);
        assert_eq!(stats.relationship_types[0].name, "OwnerHistory");

        let walls = stats.labels.iter().find(|c| c.name == "IfcWall").unwrap();
        assert_eq!(walls.count, 2);
    }
}
