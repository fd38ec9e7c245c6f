//! Two-pass graph construction.
//!
//! The node pass upserts every top-level entity and every anonymous entity
//! nested under it (with the nesting relationship to it). The relationship
//! pass then creates all remaining relationships. Every store call is
//! awaited before the next projection step, and the relationship pass only
//! starts once the node pass has finished for every entity.

use std::collections::{hash_map::Entry, HashMap, VecDeque};
use std::fmt;

use chrono::{DateTime, Utc};
use ifcgraph_model::{EntityHandle, EntityModel};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::BuildError;
use crate::projector::{NodeProjector, ProjectionConfig, RelationshipProjector};
use crate::schema::{Identity, Relationship};
use crate::storage::GraphStoreAdapter;

/// Builder state. A builder runs once: `Idle → NodePass → RelationshipPass → Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildPhase {
    Idle,
    NodePass,
    RelationshipPass,
    Done,
}

impl BuildPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildPhase::Idle => "idle",
            BuildPhase::NodePass => "node pass",
            BuildPhase::RelationshipPass => "relationship pass",
            BuildPhase::Done => "done",
        }
    }
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives `(phase, index, total)` as entities are processed. `index` is
/// 1-based.
pub trait ProgressSink {
    fn report(&self, phase: BuildPhase, index: usize, total: usize);
}

impl<F: Fn(BuildPhase, usize, usize)> ProgressSink for F {
    fn report(&self, phase: BuildPhase, index: usize, total: usize) {
        self(phase, index, total)
    }
}

/// Discards progress.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _phase: BuildPhase, _index: usize, _total: usize) {}
}

/// Result of a successful build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildSummary {
    /// Node upserts issued (top-level plus anonymous).
    pub nodes: usize,
    /// Anonymous entities among `nodes`.
    pub anonymous: usize,
    /// Relationships created in both passes.
    pub relationships: usize,
    /// Relationships suppressed by the history pruning rule.
    pub pruned: usize,
    /// Relationships already created as nesting edges in the node pass.
    pub skipped_nesting: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BuildSummary {
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

type EdgeKey = (Identity, String, Identity);

fn edge_key(relationship: &Relationship) -> EdgeKey {
    (
        relationship.source.clone(),
        relationship.rel_type.clone(),
        relationship.target.clone(),
    )
}

/// Bookkeeping for one run.
#[derive(Default)]
struct RunState {
    /// Identities upserted so far and the entity each belongs to; checked
    /// before each relationship write.
    upserted: HashMap<Identity, EntityHandle>,
    /// Nesting edges created in the node pass, with multiplicity.
    nesting: HashMap<EdgeKey, usize>,
    /// Anonymous entities in materialization order.
    anonymous: Vec<EntityHandle>,
    nodes: usize,
    relationships: usize,
    pruned: usize,
    skipped_nesting: usize,
}

impl RunState {
    /// Record that `handle` owns `identity`. Returns `false` when it already
    /// does (an entity reached twice) and fails when another entity does.
    fn claim(&mut self, identity: &Identity, handle: EntityHandle) -> Result<bool, BuildError> {
        match self.upserted.entry(identity.clone()) {
            Entry::Occupied(entry) if *entry.get() == handle => Ok(false),
            Entry::Occupied(entry) => Err(BuildError::IdentityCollision {
                identity: identity.clone(),
                first: *entry.get(),
                second: handle,
            }),
            Entry::Vacant(entry) => {
                entry.insert(handle);
                Ok(true)
            }
        }
    }
}

/// Orchestrates the two passes against a [`GraphStoreAdapter`].
pub struct GraphBuilder {
    config: ProjectionConfig,
    phase: BuildPhase,
}

impl GraphBuilder {
    pub fn new(config: ProjectionConfig) -> Self {
        Self {
            config,
            phase: BuildPhase::Idle,
        }
    }

    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }

    pub fn phase(&self) -> BuildPhase {
        self.phase
    }

    /// Project `model` into `store`.
    ///
    /// Stops at the first error. The store is left with whatever was written
    /// up to that point; callers rebuild from an empty store.
    pub async fn build<M, S>(
        &mut self,
        model: &M,
        store: &S,
        progress: &dyn ProgressSink,
    ) -> Result<BuildSummary, BuildError>
    where
        M: EntityModel + ?Sized,
        S: GraphStoreAdapter + ?Sized,
    {
        if self.phase != BuildPhase::Idle {
            return Err(BuildError::AlreadyStarted(self.phase));
        }

        let started_at = Utc::now();
        let nodes = NodeProjector::new(model, &self.config);
        let relationships = RelationshipProjector::new(model, &self.config);
        let top_level = model.top_level_entities();
        let mut run = RunState::default();

        self.phase = BuildPhase::NodePass;
        info!("Starting node pass over {} entities", top_level.len());
        for (i, &handle) in top_level.iter().enumerate() {
            progress.report(BuildPhase::NodePass, i + 1, top_level.len());
            let node = nodes.project_node(handle)?;
            if !run.claim(&node.identity, handle)? {
                continue;
            }
            debug!("Upserting {} ({})", node.identity, model.type_name(handle)?);
            store.upsert_node(&node).await?;
            run.nodes += 1;

            Self::materialize_nested(handle, &nodes, &relationships, store, &mut run).await?;
        }
        info!(
            "Node pass complete: {} nodes ({} anonymous), {} nesting relationships",
            run.nodes,
            run.anonymous.len(),
            run.relationships
        );

        self.phase = BuildPhase::RelationshipPass;
        let order: Vec<EntityHandle> = top_level
            .iter()
            .chain(run.anonymous.iter())
            .copied()
            .collect();
        info!("Starting relationship pass over {} entities", order.len());
        for (i, &handle) in order.iter().enumerate() {
            progress.report(BuildPhase::RelationshipPass, i + 1, order.len());
            let projected = relationships.project_relationships(handle)?;
            run.pruned += projected.pruned.len();

            for relationship in projected.relationships {
                if let Some(count) = run.nesting.get_mut(&edge_key(&relationship)) {
                    if *count > 0 {
                        *count -= 1;
                        run.skipped_nesting += 1;
                        continue;
                    }
                }
                Self::write_relationship(&relationship, store, &mut run).await?;
            }
        }

        self.phase = BuildPhase::Done;
        let summary = BuildSummary {
            nodes: run.nodes,
            anonymous: run.anonymous.len(),
            relationships: run.relationships,
            pruned: run.pruned,
            skipped_nesting: run.skipped_nesting,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            "Build complete: {} nodes, {} relationships, {} pruned in {}ms",
            summary.nodes,
            summary.relationships,
            summary.pruned,
            summary.duration_ms()
        );
        Ok(summary)
    }

    /// Upsert the anonymous entities under `root`, breadth first, each with
    /// the relationship from the entity that holds it.
    async fn materialize_nested<M, S>(
        root: EntityHandle,
        nodes: &NodeProjector<'_, M>,
        relationships: &RelationshipProjector<'_, M>,
        store: &S,
        run: &mut RunState,
    ) -> Result<(), BuildError>
    where
        M: EntityModel + ?Sized,
        S: GraphStoreAdapter + ?Sized,
    {
        let mut queue = VecDeque::from([root]);
        while let Some(parent) = queue.pop_front() {
            for (attribute, child) in relationships.anonymous_children(parent)? {
                let node = nodes.project_node(child)?;
                if !run.claim(&node.identity, child)? {
                    continue;
                }
                debug!("Upserting anonymous {} via {}", node.identity, attribute);
                store.upsert_node(&node).await?;
                run.nodes += 1;
                run.anonymous.push(child);
                queue.push_back(child);

                // Pruned nesting edges are counted when the relationship
                // pass projects the same attribute.
                if let Some(relationship) = relationships.relationship(parent, child, &attribute)? {
                    Self::write_relationship(&relationship, store, run).await?;
                    *run.nesting.entry(edge_key(&relationship)).or_default() += 1;
                }
            }
        }
        Ok(())
    }

    async fn write_relationship<S>(
        relationship: &Relationship,
        store: &S,
        run: &mut RunState,
    ) -> Result<(), BuildError>
    where
        S: GraphStoreAdapter + ?Sized,
    {
        for endpoint in [&relationship.source, &relationship.target] {
            if !run.upserted.contains_key(endpoint) {
                return Err(BuildError::IntegrityViolation {
                    source_id: relationship.source.clone(),
                    target_id: relationship.target.clone(),
                    rel_type: relationship.rel_type.clone(),
                    missing: endpoint.clone(),
                });
            }
        }
        store.create_relationship(relationship).await?;
        run.relationships += 1;
        Ok(())
    }
}
