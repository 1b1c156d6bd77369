//! Dataset layout on disk and the subgraph dataset served to loaders.
//!
//! ```text
//! <root>/
//!   graph.safetensors                 full graph
//!   adj_bi.safetensors                neighbor cache for the full graph
//!   subset/subset_{size}.safetensors  node-subset graph (with orig_node_ids)
//!   subset/subset_{size}_adj.safetensors
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::Result;
use crate::graph::GraphStore;
use crate::neighbor::{build_or_load, CacheOptions, NeighborView};
use crate::subgraph::{Subgraph, SubgraphExtractor};
use crate::types::NodeId;

/// Default node count of the subset graph.
pub const DEFAULT_SUBSET_SIZE: usize = 20_000_000;

/// Path conventions under a dataset root.
#[derive(Debug, Clone)]
pub struct DatasetLayout {
    root: PathBuf,
}

impl DatasetLayout {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn graph_path(&self) -> PathBuf {
        self.root.join("graph.safetensors")
    }

    pub fn cache_path(&self) -> PathBuf {
        self.root.join("adj_bi.safetensors")
    }

    pub fn subset_graph_path(&self, size: usize) -> PathBuf {
        self.root.join("subset").join(format!("subset_{}.safetensors", size))
    }

    pub fn subset_cache_path(&self, size: usize) -> PathBuf {
        self.root.join("subset").join(format!("subset_{}_adj.safetensors", size))
    }

    /// Graph and cache paths to use, falling back to the full graph when a
    /// requested subset is missing.
    pub fn resolve(&self, use_subset: bool, subset_size: usize) -> (PathBuf, PathBuf) {
        if use_subset {
            let subset = self.subset_graph_path(subset_size);
            if subset.exists() {
                return (subset, self.subset_cache_path(subset_size));
            }
            warn!(
                "Subset file not found: {}. Using full dataset.",
                subset.display()
            );
        }
        (self.graph_path(), self.cache_path())
    }
}

/// A graph plus the neighbor view used to cut per-node subgraphs from it.
///
/// Clones share the graph and the neighbor index.
#[derive(Debug, Clone)]
pub struct SubgraphDataset {
    graph: Arc<GraphStore>,
    extractor: SubgraphExtractor,
}

impl SubgraphDataset {
    pub fn new(graph: Arc<GraphStore>, view: NeighborView) -> Self {
        Self {
            graph,
            extractor: SubgraphExtractor::new(view),
        }
    }

    /// Number of nodes that can be sampled.
    pub fn len(&self) -> usize {
        self.graph.num_nodes()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.num_nodes() == 0
    }

    pub fn graph(&self) -> &Arc<GraphStore> {
        &self.graph
    }

    pub fn view(&self) -> &NeighborView {
        self.extractor.view()
    }

    /// Default extraction depth.
    pub fn num_hops(&self) -> usize {
        self.extractor.view().num_hops()
    }

    /// Subgraph around `seeds`, at `hops` or the view's default depth.
    pub fn get_subgraph(&self, seeds: &[NodeId], hops: Option<usize>) -> Result<Subgraph> {
        let hops = hops.unwrap_or_else(|| self.num_hops());
        self.extractor.extract(seeds, hops, &self.graph)
    }
}

/// Open the dataset under `layout`, building the neighbor cache on first use.
pub fn open_dataset(
    layout: &DatasetLayout,
    n_hop: usize,
    use_subset: bool,
    subset_size: usize,
    cache_options: CacheOptions,
) -> Result<SubgraphDataset> {
    let (graph_path, cache_path) = layout.resolve(use_subset, subset_size);
    let graph = GraphStore::load(&graph_path)?;
    if let Some(ids) = graph.orig_node_ids() {
        info!("Loaded mapping for {} original nodes", ids.len());
    }

    let view = build_or_load(&cache_path, Some(&graph), n_hop, cache_options)?;
    info!(
        "Opened dataset {} ({} nodes, {} hops)",
        graph_path.display(),
        graph.num_nodes(),
        view.num_hops()
    );
    Ok(SubgraphDataset::new(Arc::new(graph), view))
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{Device, Tensor};
    use tempfile::TempDir;

    fn write_ring(path: &Path, n: u32) {
        let features = Tensor::ones((n as usize, 3), candle_core::DType::F32, &Device::Cpu).unwrap();
        let edges = (0..n).map(|i| (i, (i + 1) % n)).collect();
        GraphStore::new(features, edges, n as usize)
            .unwrap()
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_layout_paths() {
        let layout = DatasetLayout::new("/data/mag");
        assert_eq!(layout.graph_path(), PathBuf::from("/data/mag/graph.safetensors"));
        assert_eq!(
            layout.subset_cache_path(1000),
            PathBuf::from("/data/mag/subset/subset_1000_adj.safetensors")
        );
    }

    #[test]
    fn test_missing_subset_falls_back_to_full_graph() {
        let dir = TempDir::new().unwrap();
        let layout = DatasetLayout::new(dir.path());
        let (graph, cache) = layout.resolve(true, 500);
        assert_eq!(graph, layout.graph_path());
        assert_eq!(cache, layout.cache_path());
    }

    #[test]
    fn test_open_builds_cache_then_reuses_it() {
        let dir = TempDir::new().unwrap();
        let layout = DatasetLayout::new(dir.path());
        write_ring(&layout.graph_path(), 8);

        let dataset = open_dataset(&layout, 2, false, DEFAULT_SUBSET_SIZE, CacheOptions::default()).unwrap();
        assert!(layout.cache_path().exists());
        assert_eq!(dataset.len(), 8);

        let sub = dataset.get_subgraph(&[0], None).unwrap();
        assert_eq!(sub.num_nodes(), 5);
        let sub = dataset.get_subgraph(&[0], Some(0)).unwrap();
        assert_eq!(sub.node_ids, vec![0]);

        let reopened = open_dataset(&layout, 2, false, DEFAULT_SUBSET_SIZE, CacheOptions::default()).unwrap();
        assert_eq!(
            reopened.get_subgraph(&[3], None).unwrap().node_ids,
            dataset.get_subgraph(&[3], None).unwrap().node_ids
        );
    }

    #[test]
    fn test_open_subset() {
        let dir = TempDir::new().unwrap();
        let layout = DatasetLayout::new(dir.path());
        write_ring(&layout.subset_graph_path(4), 4);

        let dataset = open_dataset(&layout, 1, true, 4, CacheOptions::default()).unwrap();
        assert_eq!(dataset.len(), 4);
        assert!(layout.subset_cache_path(4).exists());
        assert!(!layout.cache_path().exists());
    }
}
