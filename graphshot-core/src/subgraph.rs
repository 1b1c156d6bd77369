//! Induced k-hop subgraph extraction.

use candle_core::Tensor;

use crate::error::{GraphshotError, Result};
use crate::graph::GraphStore;
use crate::neighbor::NeighborView;
use crate::types::NodeId;

/// Induced neighborhood around a seed set, relabeled to local indices.
///
/// Local index `i` refers to global node `node_ids[i]`; the first
/// `num_seeds` entries are the (deduplicated) seeds in the order given.
#[derive(Debug, Clone)]
pub struct Subgraph {
    pub node_ids: Vec<NodeId>,
    pub edges: Vec<(u32, u32)>,
    /// `[node_ids.len(), dim]` f32 features aligned with `node_ids`.
    pub features: Tensor,
    pub num_seeds: usize,
    /// Ids in the parent graph when the store is a node subset.
    pub orig_node_ids: Option<Vec<NodeId>>,
}

impl Subgraph {
    pub fn num_nodes(&self) -> usize {
        self.node_ids.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }
}

/// Extracts induced subgraphs through a neighbor view.
#[derive(Debug, Clone)]
pub struct SubgraphExtractor {
    view: NeighborView,
}

impl SubgraphExtractor {
    pub fn new(view: NeighborView) -> Self {
        Self { view }
    }

    pub fn view(&self) -> &NeighborView {
        &self.view
    }

    /// Extract the `hop_count`-hop induced subgraph around `seeds`.
    ///
    /// With `hop_count == 0` the result is exactly the seeds with no edges.
    ///
    /// # Errors
    ///
    /// - `NodeOutOfBounds` if a seed is not a node of `graph`
    /// - `HopLimitExceeded` if `hop_count` is deeper than the view
    pub fn extract(&self, seeds: &[NodeId], hop_count: usize, graph: &GraphStore) -> Result<Subgraph> {
        graph.check_nodes(seeds)?;
        if self.view.num_nodes() != graph.num_nodes() {
            return Err(GraphshotError::invalid_graph(format!(
                "neighbor index covers {} nodes but graph has {}",
                self.view.num_nodes(),
                graph.num_nodes()
            )));
        }

        let (node_ids, edges) = if hop_count == 0 {
            let mut seen = std::collections::HashSet::with_capacity(seeds.len());
            let nodes: Vec<NodeId> = seeds.iter().copied().filter(|n| seen.insert(*n)).collect();
            (nodes, Vec::new())
        } else {
            let nodes = self.view.query(seeds, hop_count)?;
            let edges = self.view.index().induced_edges(&nodes);
            (nodes, edges)
        };

        let num_seeds = {
            let mut seen = std::collections::HashSet::with_capacity(seeds.len());
            seeds.iter().filter(|n| seen.insert(**n)).count()
        };
        let features = graph.gather(&node_ids)?;
        let orig_node_ids = graph
            .orig_node_ids()
            .map(|orig| node_ids.iter().map(|&n| orig[n as usize]).collect());

        Ok(Subgraph {
            node_ids,
            edges,
            features,
            num_seeds,
            orig_node_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::fingerprint_edges;
    use crate::neighbor::NeighborIndex;
    use candle_core::{DType, Device};
    use std::collections::{BTreeSet, HashSet};
    use std::sync::Arc;

    fn setup(num_nodes: usize, edges: Vec<(NodeId, NodeId)>, hops: usize) -> (GraphStore, SubgraphExtractor) {
        let data: Vec<f32> = (0..num_nodes * 2).map(|i| i as f32).collect();
        let features = Tensor::from_vec(data, (num_nodes, 2), &Device::Cpu).unwrap();
        let fp = fingerprint_edges(num_nodes, &edges);
        let index = NeighborIndex::build(num_nodes, &edges, hops, fp);
        let graph = GraphStore::new(features, edges, num_nodes).unwrap();
        (graph, SubgraphExtractor::new(NeighborView::new(Arc::new(index))))
    }

    fn ring(n: u32) -> Vec<(NodeId, NodeId)> {
        (0..n).map(|i| (i, (i + 1) % n)).collect()
    }

    /// Undirected BFS straight off the edge list.
    fn brute_force_closure(edges: &[(NodeId, NodeId)], seeds: &[NodeId], hops: usize) -> BTreeSet<NodeId> {
        let mut reached: BTreeSet<NodeId> = seeds.iter().copied().collect();
        let mut frontier = reached.clone();
        for _ in 0..hops {
            let mut next = BTreeSet::new();
            for &(s, d) in edges {
                if frontier.contains(&s) && !reached.contains(&d) {
                    next.insert(d);
                }
                if frontier.contains(&d) && !reached.contains(&s) {
                    next.insert(s);
                }
            }
            reached.extend(next.iter().copied());
            frontier = next;
        }
        reached
    }

    #[test]
    fn test_ring_one_hop() {
        let (graph, extractor) = setup(10, ring(10), 2);
        let sub = extractor.extract(&[0], 1, &graph).unwrap();

        let nodes: HashSet<NodeId> = sub.node_ids.iter().copied().collect();
        assert_eq!(nodes, HashSet::from([0, 1, 9]));
        assert_eq!(sub.node_ids[0], 0);
        assert_eq!(sub.num_seeds, 1);
        // 0->1 and 9->0 are induced; 1->2 and 8->9 are not
        assert_eq!(sub.num_edges(), 2);
    }

    #[test]
    fn test_zero_hops_returns_seeds_only() {
        let (graph, extractor) = setup(10, ring(10), 2);
        let sub = extractor.extract(&[4, 2, 4], 0, &graph).unwrap();
        assert_eq!(sub.node_ids, vec![4, 2]);
        assert!(sub.edges.is_empty());
        assert_eq!(sub.num_seeds, 2);
        assert_eq!(
            sub.features.to_vec2::<f32>().unwrap(),
            vec![vec![8.0, 9.0], vec![4.0, 5.0]]
        );
    }

    #[test]
    fn test_matches_brute_force_bfs() {
        let edges = vec![
            (0, 1), (1, 2), (2, 0), (3, 4), (5, 3), (6, 6),
            (7, 1), (2, 8), (8, 9), (9, 10), (11, 10), (1, 2),
        ];
        let (graph, extractor) = setup(12, edges.clone(), 3);

        for seeds in [vec![0], vec![3], vec![6], vec![7, 11], vec![10, 0, 4]] {
            for hops in 0..=3 {
                let sub = extractor.extract(&seeds, hops, &graph).unwrap();
                let got: BTreeSet<NodeId> = sub.node_ids.iter().copied().collect();
                assert_eq!(got.len(), sub.node_ids.len(), "duplicate nodes");
                assert_eq!(
                    got,
                    brute_force_closure(&edges, &seeds, hops),
                    "seeds {:?}, hops {}",
                    seeds,
                    hops
                );
                assert_eq!(&sub.node_ids[..seeds.len()], &seeds[..]);
            }
        }
    }

    #[test]
    fn test_preserves_multi_edges() {
        let (graph, extractor) = setup(3, vec![(0, 1), (0, 1), (1, 2)], 1);
        let sub = extractor.extract(&[0], 1, &graph).unwrap();
        assert_eq!(sub.node_ids, vec![0, 1]);
        assert_eq!(sub.edges, vec![(0, 1), (0, 1)]);
    }

    #[test]
    fn test_seed_out_of_bounds() {
        let (graph, extractor) = setup(10, ring(10), 2);
        let err = extractor.extract(&[10], 1, &graph).unwrap_err();
        assert!(matches!(err, GraphshotError::NodeOutOfBounds { node: 10, .. }));
    }

    #[test]
    fn test_hops_beyond_view() {
        let (graph, extractor) = setup(10, ring(10), 1);
        assert!(matches!(
            extractor.extract(&[0], 2, &graph),
            Err(GraphshotError::HopLimitExceeded { .. })
        ));
    }

    #[test]
    fn test_maps_original_ids_for_subsets() {
        let (graph, extractor) = setup(4, vec![(0, 1), (1, 2)], 1);
        let graph = graph.with_orig_node_ids(vec![100, 200, 300, 400]).unwrap();
        let sub = extractor.extract(&[1], 1, &graph).unwrap();
        assert_eq!(sub.orig_node_ids, Some(vec![200, 300, 100]));
        assert_eq!(sub.features.dtype(), DType::F32);
    }
}
