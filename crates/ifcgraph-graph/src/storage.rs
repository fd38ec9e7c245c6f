//! Graph storage: the adapter the builder writes through, and its SQLite
//! implementation.

use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::instrument;

use crate::error::StoreWriteError;
use crate::schema::{GraphNode, GraphRelationship, Identity, Node, Properties, Relationship};

/// Write side of a property graph store.
///
/// `upsert_node` is idempotent on the node identity. `create_relationship`
/// must fail with [`StoreWriteError::MissingEndpoint`] when either endpoint
/// has not been upserted.
#[async_trait]
pub trait GraphStoreAdapter: Send + Sync {
    async fn upsert_node(&self, node: &Node) -> Result<(), StoreWriteError>;

    async fn create_relationship(&self, relationship: &Relationship) -> Result<(), StoreWriteError>;
}

/// Graph storage backed by SQLite.
#[derive(Clone)]
pub struct SqliteGraphStore {
    pool: SqlitePool,
}

type NodeRow = (String, String, String, String, String);
type RelationshipRow = (i64, String, String, String, String, String);

impl SqliteGraphStore {
    /// Create a new store with an existing connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) a database file and initialize the schema.
    pub async fn open(db_path: &Path) -> Result<Self, StoreWriteError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let options = SqliteConnectOptions::from_str("sqlite:")?
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        Self::init_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the graph schema.
    #[instrument(skip_all)]
    pub async fn init_schema(pool: &SqlitePool) -> Result<(), StoreWriteError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS graph_nodes (
                identity TEXT PRIMARY KEY,
                labels JSON NOT NULL,
                properties JSON NOT NULL,
                first_seen_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                last_seen_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS graph_relationships (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source TEXT NOT NULL REFERENCES graph_nodes(identity),
                target TEXT NOT NULL REFERENCES graph_nodes(identity),
                rel_type TEXT NOT NULL,
                properties JSON NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(pool)
        .await?;

        // Indexes for traversal
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_relationships_source ON graph_relationships(source)")
            .execute(pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_relationships_target ON graph_relationships(target)")
            .execute(pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_relationships_type ON graph_relationships(rel_type)")
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Remove every node and relationship before a full rebuild.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<(), StoreWriteError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM graph_relationships")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM graph_nodes").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Get a node by identity.
    pub async fn get_node(&self, identity: &str) -> Result<Option<GraphNode>, StoreWriteError> {
        let row = sqlx::query_as::<_, NodeRow>(
            "SELECT identity, labels, properties, first_seen_at, last_seen_at
             FROM graph_nodes WHERE identity = ?1",
        )
        .bind(identity)
        .fetch_optional(&self.pool)
        .await?;

        row.map(node_from_row).transpose()
    }

    /// Get all relationships originating from a node, in creation order.
    pub async fn relationships_from(
        &self,
        identity: &str,
    ) -> Result<Vec<GraphRelationship>, StoreWriteError> {
        let rows = sqlx::query_as::<_, RelationshipRow>(
            "SELECT id, source, target, rel_type, properties, created_at
             FROM graph_relationships WHERE source = ?1 ORDER BY id",
        )
        .bind(identity)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(relationship_from_row).collect()
    }

    /// Get all relationships pointing to a node, in creation order.
    pub async fn relationships_to(
        &self,
        identity: &str,
    ) -> Result<Vec<GraphRelationship>, StoreWriteError> {
        let rows = sqlx::query_as::<_, RelationshipRow>(
            "SELECT id, source, target, rel_type, properties, created_at
             FROM graph_relationships WHERE target = ?1 ORDER BY id",
        )
        .bind(identity)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(relationship_from_row).collect()
    }

    /// Get total node count.
    pub async fn node_count(&self) -> Result<i64, StoreWriteError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM graph_nodes")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Get total relationship count.
    pub async fn relationship_count(&self) -> Result<i64, StoreWriteError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM graph_relationships")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Get node count by label.
    pub async fn node_count_by_label(&self) -> Result<Vec<(String, i64)>, StoreWriteError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT label.value, COUNT(*) AS count
             FROM graph_nodes, json_each(graph_nodes.labels) AS label
             GROUP BY label.value ORDER BY count DESC, label.value",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Get relationship count by type.
    pub async fn relationship_count_by_type(&self) -> Result<Vec<(String, i64)>, StoreWriteError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT rel_type, COUNT(*) AS count FROM graph_relationships
             GROUP BY rel_type ORDER BY count DESC, rel_type",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn node_exists(&self, identity: &Identity) -> Result<bool, StoreWriteError> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM graph_nodes WHERE identity = ?1")
                .bind(identity.as_str())
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }
}

#[async_trait]
impl GraphStoreAdapter for SqliteGraphStore {
    /// Upsert a node. Labels are unioned with any stored labels; properties
    /// overwrite stored properties key by key.
    #[instrument(skip(self, node), fields(identity = %node.identity))]
    async fn upsert_node(&self, node: &Node) -> Result<(), StoreWriteError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, (String, String)>(
            "SELECT labels, properties FROM graph_nodes WHERE identity = ?1",
        )
        .bind(node.identity.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let (labels, properties) = match existing {
            Some((labels, properties)) => {
                let mut labels: BTreeSet<String> = serde_json::from_str(&labels)?;
                let mut properties: Properties = serde_json::from_str(&properties)?;
                labels.extend(node.labels.iter().cloned());
                properties.extend(node.properties.iter().map(|(k, v)| (k.clone(), v.clone())));
                (labels, properties)
            }
            None => (node.labels.clone(), node.properties.clone()),
        };

        sqlx::query(
            "INSERT INTO graph_nodes (identity, labels, properties, first_seen_at, last_seen_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(identity) DO UPDATE SET
                labels = excluded.labels,
                properties = excluded.properties,
                last_seen_at = excluded.last_seen_at",
        )
        .bind(node.identity.as_str())
        .bind(serde_json::to_string(&labels)?)
        .bind(serde_json::to_string(&properties)?)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self, relationship), fields(rel = %relationship))]
    async fn create_relationship(&self, relationship: &Relationship) -> Result<(), StoreWriteError> {
        for endpoint in [&relationship.source, &relationship.target] {
            if !self.node_exists(endpoint).await? {
                return Err(StoreWriteError::MissingEndpoint {
                    identity: endpoint.clone(),
                    rel_type: relationship.rel_type.clone(),
                });
            }
        }

        sqlx::query(
            "INSERT INTO graph_relationships (source, target, rel_type, properties, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(relationship.source.as_str())
        .bind(relationship.target.as_str())
        .bind(&relationship.rel_type)
        .bind(serde_json::to_string(&relationship.properties)?)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn node_from_row(row: NodeRow) -> Result<GraphNode, StoreWriteError> {
    let (identity, labels, properties, first_seen_at, last_seen_at) = row;
    Ok(GraphNode {
        identity: Identity::new(identity),
        labels: serde_json::from_str(&labels)?,
        properties: serde_json::from_str(&properties)?,
        first_seen_at: parse_timestamp(&first_seen_at),
        last_seen_at: parse_timestamp(&last_seen_at),
    })
}

fn relationship_from_row(row: RelationshipRow) -> Result<GraphRelationship, StoreWriteError> {
    let (id, source, target, rel_type, properties, created_at) = row;
    Ok(GraphRelationship {
        id,
        source: Identity::new(source),
        target: Identity::new(target),
        rel_type,
        properties: serde_json::from_str(&properties)?,
        created_at: parse_timestamp(&created_at),
    })
}
