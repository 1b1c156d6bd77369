//! In-memory graph store: node features plus a directed citation edge list.
//!
//! The store is immutable once built and is shared read-only (behind an `Arc`)
//! by every data-loading worker.
//!
//! # File format
//!
//! Graphs are persisted as a safetensors file with the tensors:
//!
//! ```text
//! x              [num_nodes, dim]  any float dtype (f16 stays f16 on disk)
//! edge_index     [2, num_edges]    u32 or i64, row 0 = src, row 1 = dst (optional)
//! y              [num_nodes]       i64 labels, negative = unlabeled (optional)
//! orig_node_ids  [num_nodes]       u32 ids in the parent graph (optional, subsets)
//! ```
//!
//! The edge list may be omitted when a neighbor cache already exists for the
//! graph; subgraph edges are then recovered from the cache.

use candle_core::{DType, Device, Tensor};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};
use xxhash_rust::xxh3::Xxh3;

use crate::error::{GraphshotError, Result};
use crate::types::NodeId;

/// Identity of an edge list, used to detect stale neighbor caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphFingerprint {
    pub num_nodes: u64,
    pub num_edges: u64,
    pub hash: u64,
}

impl fmt::Display for GraphFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "xxh3:{:016x} ({} nodes, {} edges)",
            self.hash, self.num_nodes, self.num_edges
        )
    }
}

/// Fingerprint an edge list without materializing it as bytes.
pub fn fingerprint_edges(num_nodes: usize, edges: &[(NodeId, NodeId)]) -> GraphFingerprint {
    const CHUNK_EDGES: usize = 8192;

    let mut hasher = Xxh3::new();
    hasher.update(&(num_nodes as u64).to_le_bytes());
    let mut buf = Vec::with_capacity(CHUNK_EDGES * 8);
    for chunk in edges.chunks(CHUNK_EDGES) {
        buf.clear();
        for &(src, dst) in chunk {
            buf.extend_from_slice(&src.to_le_bytes());
            buf.extend_from_slice(&dst.to_le_bytes());
        }
        hasher.update(&buf);
    }

    GraphFingerprint {
        num_nodes: num_nodes as u64,
        num_edges: edges.len() as u64,
        hash: hasher.digest(),
    }
}

/// Immutable node features and edge list for the graph being served.
#[derive(Debug, Clone)]
pub struct GraphStore {
    features: Tensor,
    num_nodes: usize,
    edges: Vec<(NodeId, NodeId)>,
    labels: Option<Vec<i64>>,
    orig_node_ids: Option<Vec<NodeId>>,
}

impl GraphStore {
    /// Create a store from a feature matrix and a directed edge list.
    ///
    /// # Errors
    ///
    /// Fails if `features` is not `[num_nodes, dim]` or any edge endpoint is
    /// `>= num_nodes`.
    pub fn new(features: Tensor, edges: Vec<(NodeId, NodeId)>, num_nodes: usize) -> Result<Self> {
        let (rows, _dim) = features.dims2().map_err(|e| {
            GraphshotError::invalid_graph(format!("features must be a 2D matrix: {}", e))
        })?;
        if rows != num_nodes {
            return Err(GraphshotError::invalid_graph(format!(
                "feature matrix has {} rows but graph has {} nodes",
                rows, num_nodes
            )));
        }
        if num_nodes > NodeId::MAX as usize {
            return Err(GraphshotError::invalid_graph(format!(
                "{} nodes exceeds the u32 node id space",
                num_nodes
            )));
        }

        // Load edges (reject any endpoint outside the node range)
        if let Some(&(src, dst)) = edges
            .iter()
            .find(|&&(s, d)| s as usize >= num_nodes || d as usize >= num_nodes)
        {
            let node = if src as usize >= num_nodes { src } else { dst };
            return Err(GraphshotError::NodeOutOfBounds {
                node: node as u64,
                num_nodes,
            });
        }

        Ok(Self {
            features,
            num_nodes,
            edges,
            labels: None,
            orig_node_ids: None,
        })
    }

    /// Create a store with features only, for graphs whose neighbor cache is already built.
    pub fn features_only(features: Tensor, num_nodes: usize) -> Result<Self> {
        Self::new(features, Vec::new(), num_nodes)
    }

    /// Attach per-node labels (negative = unlabeled).
    pub fn with_labels(mut self, labels: Vec<i64>) -> Result<Self> {
        if labels.len() != self.num_nodes {
            return Err(GraphshotError::invalid_graph(format!(
                "{} labels for {} nodes",
                labels.len(),
                self.num_nodes
            )));
        }
        self.labels = Some(labels);
        Ok(self)
    }

    /// Attach the local -> original id mapping of a node-subset graph.
    pub fn with_orig_node_ids(mut self, ids: Vec<NodeId>) -> Result<Self> {
        if ids.len() != self.num_nodes {
            return Err(GraphshotError::invalid_graph(format!(
                "{} original ids for {} nodes",
                ids.len(),
                self.num_nodes
            )));
        }
        self.orig_node_ids = Some(ids);
        Ok(self)
    }

    /// Load a graph from a safetensors file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading graph from: {}", path.display());

        if !path.exists() {
            return Err(GraphshotError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("graph file not found: {}", path.display()),
            )));
        }

        let mut tensors = candle_core::safetensors::load(path, &Device::Cpu)?;
        let features = tensors
            .remove("x")
            .ok_or_else(|| GraphshotError::invalid_graph("graph file has no 'x' tensor"))?;
        let num_nodes = features.dim(0)?;

        let edges = match tensors.remove("edge_index") {
            Some(edge_index) => edges_from_tensor(&edge_index)?,
            None => Vec::new(),
        };
        debug!(
            "Loaded graph tensors: {} nodes, {} edges, features {:?}",
            num_nodes,
            edges.len(),
            features.dtype()
        );

        let mut graph = Self::new(features, edges, num_nodes)?;
        if let Some(y) = tensors.remove("y") {
            graph = graph.with_labels(y.to_dtype(DType::I64)?.to_vec1::<i64>()?)?;
        }
        if let Some(ids) = tensors.remove("orig_node_ids") {
            graph = graph.with_orig_node_ids(ids.to_dtype(DType::U32)?.to_vec1::<u32>()?)?;
        }
        Ok(graph)
    }

    /// Save the graph to a safetensors file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut tensors: HashMap<String, Tensor> = HashMap::new();
        tensors.insert("x".to_string(), self.features.clone());
        if !self.edges.is_empty() {
            let mut flat = Vec::with_capacity(self.edges.len() * 2);
            flat.extend(self.edges.iter().map(|&(s, _)| s));
            flat.extend(self.edges.iter().map(|&(_, d)| d));
            let edge_index = Tensor::from_vec(flat, (2, self.edges.len()), &Device::Cpu)?;
            tensors.insert("edge_index".to_string(), edge_index);
        }
        if let Some(labels) = &self.labels {
            let y = Tensor::from_vec(labels.clone(), labels.len(), &Device::Cpu)?;
            tensors.insert("y".to_string(), y);
        }
        if let Some(ids) = &self.orig_node_ids {
            let t = Tensor::from_vec(ids.clone(), ids.len(), &Device::Cpu)?;
            tensors.insert("orig_node_ids".to_string(), t);
        }

        candle_core::safetensors::save(&tensors, path)?;
        debug!("Saved graph with {} nodes to {}", self.num_nodes, path.display());
        Ok(())
    }

    /// Gather feature rows for `nodes` as an f32 matrix.
    ///
    /// Half-precision features are cast after the gather, so only the
    /// selected rows are widened.
    pub fn gather(&self, nodes: &[NodeId]) -> Result<Tensor> {
        self.check_nodes(nodes)?;
        let index = Tensor::from_vec(nodes.to_vec(), nodes.len(), self.features.device())?;
        let rows = self.features.index_select(&index, 0)?;
        Ok(rows.to_dtype(DType::F32)?)
    }

    /// Fail with `NodeOutOfBounds` for the first id outside the graph.
    pub fn check_nodes(&self, nodes: &[NodeId]) -> Result<()> {
        match nodes.iter().find(|&&n| n as usize >= self.num_nodes) {
            Some(&node) => Err(GraphshotError::NodeOutOfBounds {
                node: node as u64,
                num_nodes: self.num_nodes,
            }),
            None => Ok(()),
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn has_edges(&self) -> bool {
        !self.edges.is_empty()
    }

    pub fn feature_dim(&self) -> usize {
        self.features.dims().get(1).copied().unwrap_or(0)
    }

    pub fn features(&self) -> &Tensor {
        &self.features
    }

    pub fn edges(&self) -> &[(NodeId, NodeId)] {
        &self.edges
    }

    /// Per-node labels, negative for unlabeled nodes.
    pub fn labels(&self) -> Option<&[i64]> {
        self.labels.as_deref()
    }

    pub fn orig_node_ids(&self) -> Option<&[NodeId]> {
        self.orig_node_ids.as_deref()
    }

    /// Fingerprint of this graph's edge list.
    pub fn fingerprint(&self) -> GraphFingerprint {
        fingerprint_edges(self.num_nodes, &self.edges)
    }
}

/// Convert a `[2, E]` edge tensor (u32 or i64) into edge pairs.
fn edges_from_tensor(edge_index: &Tensor) -> Result<Vec<(NodeId, NodeId)>> {
    let (rows, num_edges) = edge_index.dims2()?;
    if rows != 2 {
        return Err(GraphshotError::invalid_graph(format!(
            "edge_index must have 2 rows, found {}",
            rows
        )));
    }

    let rows: Vec<Vec<u32>> = match edge_index.dtype() {
        DType::U32 => edge_index.to_vec2::<u32>()?,
        DType::I64 => edge_index
            .to_vec2::<i64>()?
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|v| {
                        u32::try_from(v).map_err(|_| {
                            GraphshotError::invalid_graph(format!("edge endpoint {} is not a u32", v))
                        })
                    })
                    .collect::<Result<Vec<u32>>>()
            })
            .collect::<Result<Vec<_>>>()?,
        other => {
            return Err(GraphshotError::invalid_graph(format!(
                "unsupported edge_index dtype {:?}",
                other
            )))
        }
    };

    let mut edges = Vec::with_capacity(num_edges);
    edges.extend(rows[0].iter().copied().zip(rows[1].iter().copied()));
    Ok(edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn features(n: usize, dim: usize) -> Tensor {
        let data: Vec<f32> = (0..n * dim).map(|i| i as f32).collect();
        Tensor::from_vec(data, (n, dim), &Device::Cpu).unwrap()
    }

    #[test]
    fn test_rejects_out_of_range_edge() {
        let err = GraphStore::new(features(3, 2), vec![(0, 1), (2, 3)], 3).unwrap_err();
        assert!(matches!(
            err,
            GraphshotError::NodeOutOfBounds { node: 3, num_nodes: 3 }
        ));
    }

    #[test]
    fn test_rejects_shape_mismatch() {
        let err = GraphStore::new(features(4, 2), vec![], 3).unwrap_err();
        assert!(matches!(err, GraphshotError::InvalidGraph { .. }));
    }

    #[test]
    fn test_gather_rows() {
        let graph = GraphStore::new(features(4, 2), vec![(0, 1)], 4).unwrap();
        let rows = graph.gather(&[3, 1]).unwrap().to_vec2::<f32>().unwrap();
        assert_eq!(rows, vec![vec![6.0, 7.0], vec![2.0, 3.0]]);

        assert!(graph.gather(&[4]).is_err());
    }

    #[test]
    fn test_gather_casts_half_features() {
        let half = features(3, 2).to_dtype(DType::F16).unwrap();
        let graph = GraphStore::features_only(half, 3).unwrap();
        let rows = graph.gather(&[2]).unwrap();
        assert_eq!(rows.dtype(), DType::F32);
        assert_eq!(rows.to_vec2::<f32>().unwrap(), vec![vec![4.0, 5.0]]);
    }

    #[test]
    fn test_fingerprint_changes_with_edges() {
        let a = fingerprint_edges(4, &[(0, 1), (1, 2)]);
        let b = fingerprint_edges(4, &[(0, 1), (1, 3)]);
        let c = fingerprint_edges(4, &[(0, 1), (1, 2)]);
        assert_ne!(a, b);
        assert_eq!(a, c);
        assert!(a.to_string().starts_with("xxh3:"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("graph.safetensors");

        let graph = GraphStore::new(features(3, 2), vec![(0, 1), (1, 2), (1, 2)], 3)
            .unwrap()
            .with_labels(vec![0, -1, 4])
            .unwrap()
            .with_orig_node_ids(vec![10, 20, 30])
            .unwrap();
        graph.save(&path).unwrap();

        let loaded = GraphStore::load(&path).unwrap();
        assert_eq!(loaded.num_nodes(), 3);
        assert_eq!(loaded.edges(), &[(0, 1), (1, 2), (1, 2)]);
        assert_eq!(loaded.labels(), Some(&[0, -1, 4][..]));
        assert_eq!(loaded.orig_node_ids(), Some(&[10, 20, 30][..]));
        assert_eq!(loaded.fingerprint(), graph.fingerprint());
    }

    #[test]
    fn test_load_without_edges() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("graph.safetensors");
        GraphStore::features_only(features(2, 3), 2)
            .unwrap()
            .save(&path)
            .unwrap();

        let loaded = GraphStore::load(&path).unwrap();
        assert!(!loaded.has_edges());
        assert_eq!(loaded.feature_dim(), 3);
    }
}
