//! Multi-hop neighbor index over a directed edge list.
//!
//! The index holds the adjacency in both directions as compressed sparse rows,
//! so a lookup can follow outgoing edges, incoming edges, or both ("inout").
//! Multi-edges and self-loops are kept exactly as they appear in the source
//! edge list.
//!
//! # Architecture
//!
//! ```text
//! edge list -> NeighborIndex (CSR out + CSR in, hop bound) -> cache file
//!                    |
//!                    +-- Arc --> NeighborView { num_hops, mode }  (one per task / worker)
//! ```
//!
//! A [`NeighborView`] is an immutable, cheaply clonable handle. Callers that
//! want a shallower traversal derive a new view with [`NeighborView::with_hops`];
//! the shared index is never mutated.

mod cache;

pub use cache::{build_or_load, CacheOptions};

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::error::{GraphshotError, Result};
use crate::graph::GraphFingerprint;
use crate::types::{NeighborMode, NodeId};

/// Compressed sparse row adjacency for one edge direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Csr {
    offsets: Vec<u64>,
    targets: Vec<NodeId>,
}

impl Csr {
    /// Build from `(row, col)` pairs with a stable counting sort.
    ///
    /// Within a row, targets keep the order in which the edges were listed.
    fn from_pairs(num_nodes: usize, pairs: impl Iterator<Item = (NodeId, NodeId)> + Clone) -> Self {
        let mut offsets = vec![0u64; num_nodes + 1];
        for (row, _) in pairs.clone() {
            offsets[row as usize + 1] += 1;
        }
        for i in 0..num_nodes {
            offsets[i + 1] += offsets[i];
        }

        let mut cursor: Vec<u64> = offsets[..num_nodes].to_vec();
        let mut targets = vec![0 as NodeId; offsets[num_nodes] as usize];
        for (row, col) in pairs {
            let slot = &mut cursor[row as usize];
            targets[*slot as usize] = col;
            *slot += 1;
        }

        Self { offsets, targets }
    }

    pub(crate) fn from_parts(offsets: Vec<u64>, targets: Vec<NodeId>) -> Option<Self> {
        let last = *offsets.last()?;
        let monotonic = offsets.windows(2).all(|w| w[0] <= w[1]);
        if offsets[0] != 0 || !monotonic || last as usize != targets.len() {
            return None;
        }
        Some(Self { offsets, targets })
    }

    pub(crate) fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    pub(crate) fn targets(&self) -> &[NodeId] {
        &self.targets
    }

    /// Neighbors of `node`, including repeats for multi-edges.
    pub fn row(&self, node: NodeId) -> &[NodeId] {
        let start = self.offsets[node as usize] as usize;
        let end = self.offsets[node as usize + 1] as usize;
        &self.targets[start..end]
    }

    pub fn num_rows(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn num_entries(&self) -> usize {
        self.targets.len()
    }
}

/// Bidirectional adjacency with a precomputed hop bound.
#[derive(Debug, Clone)]
pub struct NeighborIndex {
    num_nodes: usize,
    max_hops: usize,
    out: Csr,
    inc: Csr,
    fingerprint: GraphFingerprint,
}

impl NeighborIndex {
    /// Build the index from an edge list. O(V + E) time and memory.
    pub fn build(
        num_nodes: usize,
        edges: &[(NodeId, NodeId)],
        max_hops: usize,
        fingerprint: GraphFingerprint,
    ) -> Self {
        let out = Csr::from_pairs(num_nodes, edges.iter().copied());
        let inc = Csr::from_pairs(num_nodes, edges.iter().map(|&(s, d)| (d, s)));
        Self {
            num_nodes,
            max_hops,
            out,
            inc,
            fingerprint,
        }
    }

    pub(crate) fn from_parts(
        num_nodes: usize,
        max_hops: usize,
        out: Csr,
        inc: Csr,
        fingerprint: GraphFingerprint,
    ) -> Self {
        Self {
            num_nodes,
            max_hops,
            out,
            inc,
            fingerprint,
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn num_edges(&self) -> usize {
        self.out.num_entries()
    }

    /// Deepest traversal this index was built for.
    pub fn max_hops(&self) -> usize {
        self.max_hops
    }

    /// Fingerprint of the edge list the index was built from.
    pub fn fingerprint(&self) -> GraphFingerprint {
        self.fingerprint
    }

    pub fn out_neighbors(&self, node: NodeId) -> &[NodeId] {
        self.out.row(node)
    }

    pub fn in_neighbors(&self, node: NodeId) -> &[NodeId] {
        self.inc.row(node)
    }

    pub(crate) fn out_csr(&self) -> &Csr {
        &self.out
    }

    pub(crate) fn in_csr(&self) -> &Csr {
        &self.inc
    }

    /// Directed edges among `nodes`, relabeled to positions in `nodes`.
    ///
    /// Every source edge with both endpoints in the set appears once per
    /// occurrence, so multi-edges survive.
    pub fn induced_edges(&self, nodes: &[NodeId]) -> Vec<(u32, u32)> {
        let local: std::collections::HashMap<NodeId, u32> = nodes
            .iter()
            .enumerate()
            .map(|(i, &n)| (n, i as u32))
            .collect();

        let mut edges = Vec::new();
        for (i, &node) in nodes.iter().enumerate() {
            for target in self.out.row(node) {
                if let Some(&j) = local.get(target) {
                    edges.push((i as u32, j));
                }
            }
        }
        edges
    }
}

/// Immutable, cheaply clonable traversal handle over a shared [`NeighborIndex`].
#[derive(Debug, Clone)]
pub struct NeighborView {
    index: Arc<NeighborIndex>,
    num_hops: usize,
    mode: NeighborMode,
}

impl NeighborView {
    /// A view at the index's full hop bound, following both edge directions.
    pub fn new(index: Arc<NeighborIndex>) -> Self {
        let num_hops = index.max_hops();
        Self {
            index,
            num_hops,
            mode: NeighborMode::InOut,
        }
    }

    /// A new view limited to `hops` expansions.
    ///
    /// # Errors
    ///
    /// Returns `HopLimitExceeded` if `hops` is deeper than the index was built for.
    pub fn with_hops(&self, hops: usize) -> Result<Self> {
        if hops > self.index.max_hops() {
            return Err(GraphshotError::HopLimitExceeded {
                requested: hops,
                max_hops: self.index.max_hops(),
            });
        }
        Ok(Self {
            index: Arc::clone(&self.index),
            num_hops: hops,
            mode: self.mode,
        })
    }

    /// A new view following edges in `mode`.
    pub fn with_mode(&self, mode: NeighborMode) -> Self {
        Self {
            index: Arc::clone(&self.index),
            num_hops: self.num_hops,
            mode,
        }
    }

    pub fn num_hops(&self) -> usize {
        self.num_hops
    }

    pub fn mode(&self) -> NeighborMode {
        self.mode
    }

    pub fn index(&self) -> &NeighborIndex {
        &self.index
    }

    pub fn num_nodes(&self) -> usize {
        self.index.num_nodes()
    }

    fn check_nodes(&self, nodes: &[NodeId]) -> Result<()> {
        match nodes.iter().find(|&&n| n as usize >= self.index.num_nodes()) {
            Some(&node) => Err(GraphshotError::NodeOutOfBounds {
                node: node as u64,
                num_nodes: self.index.num_nodes(),
            }),
            None => Ok(()),
        }
    }

    /// One-hop neighbors of `node` in this view's mode (with repeats).
    pub fn adjacent(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let (out, inc): (&[NodeId], &[NodeId]) = match self.mode {
            NeighborMode::Out => (self.index.out_neighbors(node), &[]),
            NeighborMode::In => (&[], self.index.in_neighbors(node)),
            NeighborMode::InOut => (
                self.index.out_neighbors(node),
                self.index.in_neighbors(node),
            ),
        };
        out.iter().chain(inc.iter()).copied()
    }

    /// The `hops`-hop closure of `nodes`, in BFS discovery order.
    ///
    /// Seeds come first (deduplicated, in the order given), followed by newly
    /// discovered nodes level by level.
    ///
    /// # Errors
    ///
    /// Fails if `hops` exceeds this view's bound or a seed is out of range.
    pub fn query(&self, nodes: &[NodeId], hops: usize) -> Result<Vec<NodeId>> {
        if hops > self.num_hops {
            return Err(GraphshotError::HopLimitExceeded {
                requested: hops,
                max_hops: self.num_hops,
            });
        }
        self.check_nodes(nodes)?;

        let mut visited: HashSet<NodeId> = HashSet::with_capacity(nodes.len());
        let mut result = Vec::with_capacity(nodes.len());
        let mut queue = VecDeque::new();

        for &node in nodes {
            if visited.insert(node) {
                result.push(node);
                queue.push_back((node, 0usize));
            }
        }

        while let Some((current, depth)) = queue.pop_front() {
            if depth == hops {
                continue;
            }
            for neighbor in self.adjacent(current) {
                if visited.insert(neighbor) {
                    result.push(neighbor);
                    queue.push_back((neighbor, depth + 1));
                }
            }
        }

        Ok(result)
    }

    /// Nodes within this view's hop bound of `node`, excluding `node` itself.
    pub fn neighborhood(&self, node: NodeId) -> Result<Vec<NodeId>> {
        let mut closure = self.query(&[node], self.num_hops)?;
        closure.remove(0);
        Ok(closure)
    }
}
