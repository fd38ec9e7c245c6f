//! Cypher script output.
//!
//! Writes one statement per store call to any `io::Write`, for loading into
//! Neo4j with `cypher-shell`. Every node also carries the `Entity` label so
//! that `MERGE` and `MATCH` by `__identity` can use a single index:
//!
//! ```text
//! MERGE (n:Entity {__identity: '5'}) SET n:`IfcWall` SET n += {`Name`: 'Wall-1'};
//! MATCH (a:Entity {__identity: '7'}), (b:Entity {__identity: '2'}) CREATE (a)-[:`OwnerHistory`]->(b);
//! ```

use std::collections::HashSet;
use std::fmt::Write as _;
use std::io::Write;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::StoreWriteError;
use crate::schema::{Identity, Node, Properties, Relationship, IDENTITY};
use crate::storage::GraphStoreAdapter;

/// Label shared by every node the script creates.
pub const BASE_LABEL: &str = "Entity";

struct ScriptState<W> {
    out: W,
    written: HashSet<Identity>,
    statements: usize,
}

pub struct CypherScriptStore<W: Write + Send> {
    state: Mutex<ScriptState<W>>,
}

impl<W: Write + Send> CypherScriptStore<W> {
    pub fn new(out: W) -> Self {
        Self {
            state: Mutex::new(ScriptState {
                out,
                written: HashSet::new(),
                statements: 0,
            }),
        }
    }

    /// Write the index statement that makes the `MERGE`s fast.
    pub async fn write_preamble(&self) -> Result<(), StoreWriteError> {
        let mut state = self.state.lock().await;
        writeln!(
            state.out,
            "CREATE INDEX entity_identity IF NOT EXISTS FOR (n:{BASE_LABEL}) ON (n.{IDENTITY});"
        )?;
        state.statements += 1;
        Ok(())
    }

    /// Write a statement that deletes every node the script manages, so the
    /// load starts from an empty graph.
    pub async fn write_reset(&self) -> Result<(), StoreWriteError> {
        let mut state = self.state.lock().await;
        writeln!(state.out, "MATCH (n:{BASE_LABEL}) DETACH DELETE n;")?;
        state.statements += 1;
        Ok(())
    }

    pub async fn statement_count(&self) -> usize {
        self.state.lock().await.statements
    }

    /// Flush and hand back the writer.
    pub fn into_inner(self) -> Result<W, StoreWriteError> {
        let mut state = self.state.into_inner();
        state.out.flush()?;
        Ok(state.out)
    }
}

#[async_trait]
impl<W: Write + Send> GraphStoreAdapter for CypherScriptStore<W> {
    async fn upsert_node(&self, node: &Node) -> Result<(), StoreWriteError> {
        let mut statement = format!(
            "MERGE (n:{BASE_LABEL} {{{IDENTITY}: {}}})",
            string_literal(node.identity.as_str())
        );
        if !node.labels.is_empty() {
            statement.push_str(" SET n");
            for label in &node.labels {
                statement.push(':');
                statement.push_str(&quote_name(label));
            }
        }
        if !node.properties.is_empty() {
            let _ = write!(statement, " SET n += {}", map_literal(&node.properties));
        }

        let mut state = self.state.lock().await;
        writeln!(state.out, "{statement};")?;
        state.written.insert(node.identity.clone());
        state.statements += 1;
        Ok(())
    }

    async fn create_relationship(&self, relationship: &Relationship) -> Result<(), StoreWriteError> {
        let mut state = self.state.lock().await;
        for endpoint in [&relationship.source, &relationship.target] {
            if !state.written.contains(endpoint) {
                return Err(StoreWriteError::MissingEndpoint {
                    identity: endpoint.clone(),
                    rel_type: relationship.rel_type.clone(),
                });
            }
        }

        let properties = if relationship.properties.is_empty() {
            String::new()
        } else {
            format!(" {}", map_literal(&relationship.properties))
        };
        writeln!(
            state.out,
            "MATCH (a:{BASE_LABEL} {{{IDENTITY}: {}}}), (b:{BASE_LABEL} {{{IDENTITY}: {}}}) CREATE (a)-[:{}{}]->(b);",
            string_literal(relationship.source.as_str()),
            string_literal(relationship.target.as_str()),
            quote_name(&relationship.rel_type),
            properties,
        )?;
        state.statements += 1;
        Ok(())
    }
}

/// Backtick-quoted label, type or key.
fn quote_name(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn map_literal(properties: &Properties) -> String {
    let entries: Vec<String> = properties
        .iter()
        .map(|(k, v)| format!("{}: {}", quote_name(k), property_literal(v)))
        .collect();
    format!("{{{}}}", entries.join(", "))
}

/// A property value Neo4j can store: a scalar or a homogeneous list of
/// scalars. Anything else (nested lists, nulls inside lists, mixed element
/// types, maps) is written as its JSON text.
fn property_literal(value: &serde_json::Value) -> String {
    use serde_json::Value;

    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => string_literal(s),
        Value::Array(items) if is_storable_list(items) => {
            let items: Vec<String> = items.iter().map(property_literal).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Array(_) | Value::Object(_) => string_literal(&value.to_string()),
    }
}

fn is_storable_list(items: &[serde_json::Value]) -> bool {
    use serde_json::Value;

    #[derive(PartialEq)]
    enum Element {
        Bool,
        Integer,
        Float,
        String,
    }

    let element = |v: &Value| match v {
        Value::Bool(_) => Some(Element::Bool),
        Value::Number(n) if n.is_f64() => Some(Element::Float),
        Value::Number(_) => Some(Element::Integer),
        Value::String(_) => Some(Element::String),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    };

    let mut kinds = items.iter().map(element);
    match kinds.next() {
        None => true,
        Some(None) => false,
        Some(Some(first)) => kinds.all(|k| k.as_ref() == Some(&first)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_script_output() {
        let store = CypherScriptStore::new(Vec::new());
        store
            .upsert_node(
                &Node::new("7".into())
                    .with_label("IfcProject")
                    .with_property("Name", "It's")
                    .with_property("Coordinates", json!([0.0, 1.5])),
            )
            .await
            .unwrap();
        store
            .upsert_node(&Node::new("2".into()).with_label("IfcOwnerHistory"))
            .await
            .unwrap();
        store
            .create_relationship(&Relationship::new("7".into(), "2".into(), "OwnerHistory"))
            .await
            .unwrap();
        assert_eq!(store.statement_count().await, 3);

        let script = String::from_utf8(store.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = script.lines().collect();
        assert_eq!(
            lines[0],
            "MERGE (n:Entity {__identity: '7'}) SET n:`IfcProject` SET n += {`Coordinates`: [0.0, 1.5], `Name`: 'It\\'s'};"
        );
        assert_eq!(lines[1], "MERGE (n:Entity {__identity: '2'}) SET n:`IfcOwnerHistory`;");
        assert_eq!(
            lines[2],
            "MATCH (a:Entity {__identity: '7'}), (b:Entity {__identity: '2'}) CREATE (a)-[:`OwnerHistory`]->(b);"
        );
    }

    #[tokio::test]
    async fn test_preamble_and_reset() {
        let store = CypherScriptStore::new(Vec::new());
        store.write_preamble().await.unwrap();
        store.write_reset().await.unwrap();
        assert_eq!(store.statement_count().await, 2);

        let script = String::from_utf8(store.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = script.lines().collect();
        assert_eq!(
            lines,
            vec![
                "CREATE INDEX entity_identity IF NOT EXISTS FOR (n:Entity) ON (n.__identity);",
                "MATCH (n:Entity) DETACH DELETE n;",
            ]
        );
    }

    #[tokio::test]
    async fn test_unwritten_endpoint() {
        let store = CypherScriptStore::new(Vec::new());
        store.upsert_node(&Node::new("1".into())).await.unwrap();
        let err = store
            .create_relationship(&Relationship::new("1".into(), "9".into(), "Next"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreWriteError::MissingEndpoint { .. }));
    }

    #[tokio::test]
    async fn test_unstorable_lists_are_written_as_json() {
        let store = CypherScriptStore::new(Vec::new());
        store
            .upsert_node(
                &Node::new("9".into())
                    .with_property("CoordList", json!([[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]))
                    .with_property("Mixed", json!([1, "a", null]))
                    .with_property("Numbers", json!([1.5, 2]))
                    .with_property("Tags", json!(["a", "b"]))
                    .with_property("Empty", json!([])),
            )
            .await
            .unwrap();

        let script = String::from_utf8(store.into_inner().unwrap()).unwrap();
        assert_eq!(
            script.trim_end(),
            "MERGE (n:Entity {__identity: '9'}) SET n += {\
             `CoordList`: '[[0.0,0.0,0.0],[1.0,0.0,0.0]]', \
             `Empty`: [], \
             `Mixed`: '[1,\"a\",null]', \
             `Numbers`: '[1.5,2]', \
             `Tags`: ['a', 'b']};"
        );
    }

    #[test]
    fn test_quote_name() {
        assert_eq!(quote_name("Odd`Name"), "`Odd``Name`");
    }
}
