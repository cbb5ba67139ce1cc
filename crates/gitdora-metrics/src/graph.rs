//! Commit graph assembly from a streamed, most-recent-first record sequence.
//!
//! Parents are usually seen after their children, so edges are registered
//! optimistically and reconciled once the pass is over: any parent that never
//! showed up, and is not a unique prefix of an ingested hash, becomes a
//! boundary parent (history truncated at the ingestion window) and is treated
//! as a traversal root.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::ops::Bound;

use gitdora_core::{DoraError, Result};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{debug, warn};

use crate::record::CommitRecord;

/// A parent hash that never resolved to a record in the ingested history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmatchedParent {
    /// The commit that references the missing parent.
    pub child: String,
    /// The missing parent hash, now a boundary parent.
    pub parent: String,
}

/// Directed acyclic graph of commits with branch-head annotations.
///
/// The graph owns every [`CommitRecord`]; the child index only refers to
/// commits by hash.
///
/// # Examples
///
/// ```
/// use gitdora_metrics::graph::CommitGraph;
/// use gitdora_metrics::record::ingest;
///
/// let ingested = ingest([
///     "commit bbbb (HEAD -> main)\nparents aaaa\ndate 2023-01-02T00:00:00Z\n",
///     "commit aaaa\nparents 0000\ndate 2023-01-01T00:00:00Z\n",
/// ])
/// .unwrap();
/// let graph = CommitGraph::build(ingested.records).unwrap();
/// assert_eq!(graph.len(), 2);
/// assert!(graph.is_boundary("0000"));
/// assert_eq!(graph.branch_heads()["main"], "bbbb");
/// assert_eq!(graph.children("aaaa").collect::<Vec<_>>(), vec!["bbbb"]);
/// ```
#[derive(Debug, Default)]
pub struct CommitGraph {
    nodes: BTreeMap<String, CommitRecord>,
    order: Vec<String>,
    children: BTreeMap<String, BTreeSet<String>>,
    boundary: BTreeSet<String>,
    unmatched: Vec<UnmatchedParent>,
    branch_heads: BTreeMap<String, String>,
}

impl CommitGraph {
    /// Assemble the graph in a single pass over `records`.
    ///
    /// Branch heads come from the first (most recent) record carrying each
    /// branch name.
    ///
    /// # Errors
    ///
    /// Returns [`DoraError::EmptyHistory`] for an empty sequence,
    /// [`DoraError::DuplicateCommit`] when a hash repeats, and
    /// [`DoraError::CycleDetected`] when the parent links are cyclic.
    pub fn build(records: impl IntoIterator<Item = CommitRecord>) -> Result<Self> {
        let mut graph = Self::default();

        for record in records {
            if graph.nodes.contains_key(&record.hash) {
                return Err(DoraError::DuplicateCommit(record.hash));
            }
            for name in &record.branch_refs {
                graph
                    .branch_heads
                    .entry(name.clone())
                    .or_insert_with(|| record.hash.clone());
            }
            graph.order.push(record.hash.clone());
            graph.nodes.insert(record.hash.clone(), record);
        }

        if graph.nodes.is_empty() {
            return Err(DoraError::EmptyHistory { rejected: 0 });
        }

        graph.expand_abbreviated_parents();

        for hash in &graph.order {
            for parent in &graph.nodes[hash].parent_hashes {
                graph
                    .children
                    .entry(parent.clone())
                    .or_default()
                    .insert(hash.clone());
                if !graph.nodes.contains_key(parent) {
                    debug!(child = %hash, parent = %parent, "parent outside ingested history");
                    graph.boundary.insert(parent.clone());
                    graph.unmatched.push(UnmatchedParent {
                        child: hash.clone(),
                        parent: parent.clone(),
                    });
                }
            }
        }
        if !graph.boundary.is_empty() {
            warn!(
                boundary = graph.boundary.len(),
                references = graph.unmatched.len(),
                "unmatched parents treated as boundary parents"
            );
        }

        graph.check_acyclic()?;
        Ok(graph)
    }

    /// Replace each parent hash that is a unique prefix of an ingested hash
    /// with the full hash. Ambiguous prefixes are left alone.
    fn expand_abbreviated_parents(&mut self) {
        let mut expansions = Vec::new();
        for (hash, record) in &self.nodes {
            for (slot, parent) in record.parent_hashes.iter().enumerate() {
                if self.nodes.contains_key(parent) {
                    continue;
                }
                if let Some(full) = self.unique_prefix_match(parent) {
                    expansions.push((hash.clone(), slot, full.to_string()));
                }
            }
        }

        let mut touched = BTreeSet::new();
        for (hash, slot, full) in expansions {
            if let Some(record) = self.nodes.get_mut(&hash) {
                debug!(child = %hash, parent = %full, "expanded abbreviated parent");
                record.parent_hashes[slot] = full;
                touched.insert(hash);
            }
        }
        for hash in touched {
            if let Some(record) = self.nodes.get_mut(&hash) {
                let mut seen = BTreeSet::new();
                record.parent_hashes.retain(|p| seen.insert(p.clone()));
            }
        }
    }

    fn unique_prefix_match(&self, prefix: &str) -> Option<&str> {
        let mut matches = self
            .nodes
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .map(|(hash, _)| hash.as_str())
            .take_while(|hash| hash.starts_with(prefix));
        let first = matches.next()?;
        matches.next().is_none().then_some(first)
    }

    /// Topological feasibility check over the non-boundary edges.
    fn check_acyclic(&self) -> Result<()> {
        let mut dag: DiGraph<&str, ()> = DiGraph::with_capacity(self.order.len(), self.order.len());
        let index: HashMap<&str, NodeIndex> = self
            .order
            .iter()
            .map(|hash| (hash.as_str(), dag.add_node(hash.as_str())))
            .collect();

        for hash in &self.order {
            let child = index[hash.as_str()];
            for parent in &self.nodes[hash].parent_hashes {
                if let Some(&parent) = index.get(parent.as_str()) {
                    dag.add_edge(parent, child, ());
                }
            }
        }

        toposort(&dag, None)
            .map(|_| ())
            .map_err(|cycle| DoraError::CycleDetected {
                hash: dag[cycle.node_id()].to_string(),
            })
    }

    /// Number of commits in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph holds no commits.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a commit by full hash.
    pub fn get(&self, hash: &str) -> Option<&CommitRecord> {
        self.nodes.get(hash)
    }

    /// The first (most recent) record of the ingested sequence.
    pub fn head(&self) -> Option<&CommitRecord> {
        self.order.first().and_then(|hash| self.nodes.get(hash))
    }

    /// All records in ingestion order.
    pub fn records(&self) -> impl Iterator<Item = &CommitRecord> + '_ {
        self.order.iter().filter_map(|hash| self.nodes.get(hash))
    }

    /// Parents of `hash` that exist in the graph, in parent order.
    pub fn parents<'a>(&'a self, hash: &str) -> impl Iterator<Item = &'a CommitRecord> + 'a {
        self.nodes
            .get(hash)
            .into_iter()
            .flat_map(|record| record.parent_hashes.iter())
            .filter_map(|parent| self.nodes.get(parent))
    }

    /// The mainline parent of `hash`, unless it is missing or a boundary parent.
    pub fn first_parent(&self, hash: &str) -> Option<&CommitRecord> {
        self.nodes
            .get(hash)?
            .parent_hashes
            .first()
            .and_then(|parent| self.nodes.get(parent))
    }

    /// Hashes of the commits that list `hash` as a parent.
    pub fn children<'a>(&'a self, hash: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.children
            .get(hash)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// Whether `hash` is referenced as a parent but absent from the history.
    pub fn is_boundary(&self, hash: &str) -> bool {
        self.boundary.contains(hash)
    }

    /// Every boundary parent hash.
    pub fn boundary_parents(&self) -> &BTreeSet<String> {
        &self.boundary
    }

    /// Each child-to-missing-parent reference found while building.
    pub fn unmatched_parents(&self) -> &[UnmatchedParent] {
        &self.unmatched
    }

    /// Branch name to tip hash.
    pub fn branch_heads(&self) -> &BTreeMap<String, String> {
        &self.branch_heads
    }

    /// The alphabetically first branch whose head is `hash`.
    pub fn branch_at(&self, hash: &str) -> Option<&str> {
        self.branch_heads
            .iter()
            .find(|(_, tip)| tip.as_str() == hash)
            .map(|(name, _)| name.as_str())
    }

    /// All ancestors of `hash` (excluding itself), nearest first.
    ///
    /// Boundary parents are skipped, so truncated history ends the walk
    /// instead of failing it.
    pub fn ancestors(&self, hash: &str) -> Vec<&str> {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        let mut ancestors = Vec::new();

        if let Some(record) = self.nodes.get(hash) {
            seen.insert(record.hash.as_str());
            queue.push_back(record.hash.as_str());
        }
        while let Some(current) = queue.pop_front() {
            for parent in self.parents(current) {
                if seen.insert(parent.hash.as_str()) {
                    ancestors.push(parent.hash.as_str());
                    queue.push_back(parent.hash.as_str());
                }
            }
        }
        ancestors
    }
}
