//! Info command - graph and neighbor cache statistics
//!
//! Loads the graph and, when present, the neighbor cache, and reports whether
//! the cache still matches the graph's edges.

use anyhow::{Context, Result};
use colored::Colorize;
use graphshot_core::{build_or_load, CacheOptions, GraphStore};
use serde::Serialize;

use super::ResolvedDataset;
use crate::config::GraphshotConfig;
use crate::output::{OutputConfig, Outputter, TableDisplay, TableOutput};
use crate::DatasetArgs;

#[derive(Debug, Serialize)]
pub struct GraphInfo {
    pub path: String,
    pub num_nodes: usize,
    pub num_edges: usize,
    pub feature_dim: usize,
    pub feature_dtype: String,
    /// Nodes with a non-negative label, when the graph carries labels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labeled_nodes: Option<usize>,
    pub has_orig_node_ids: bool,
    pub fingerprint: String,
}

#[derive(Debug, Serialize)]
pub struct CacheInfo {
    pub path: String,
    pub max_hops: usize,
    pub num_edges: usize,
    pub fingerprint: String,
    /// Whether the cache was built from this graph's edges.
    pub fresh: bool,
}

#[derive(Debug, Serialize)]
pub struct InfoResult {
    pub root: String,
    pub graph: GraphInfo,
    /// `None` until `graphshot build-cache` has run.
    pub cache: Option<CacheInfo>,
}

impl TableDisplay for InfoResult {
    fn to_table(&self, config: &OutputConfig) -> String {
        let g = &self.graph;
        let mut pairs = vec![
            ("Graph", g.path.clone()),
            ("Nodes", g.num_nodes.to_string()),
            ("Edges", g.num_edges.to_string()),
            ("Features", format!("{} x {}", g.feature_dim, g.feature_dtype)),
            (
                "Labeled nodes",
                g.labeled_nodes.map_or_else(|| "-".to_string(), |n| n.to_string()),
            ),
            ("Original ids", if g.has_orig_node_ids { "yes" } else { "no" }.to_string()),
            ("Fingerprint", g.fingerprint.clone()),
        ];

        match &self.cache {
            Some(cache) => {
                let status = if cache.fresh {
                    "fresh".green().to_string()
                } else {
                    "STALE".red().bold().to_string()
                };
                pairs.push(("Cache", cache.path.clone()));
                pairs.push(("Cache hops", cache.max_hops.to_string()));
                pairs.push(("Cache status", status));
            }
            None => {
                pairs.push((
                    "Cache",
                    "not built (run `graphshot build-cache`)".yellow().to_string(),
                ));
            }
        }

        format!(
            "{} {}\n{}",
            "DATASET".cyan().bold(),
            self.root,
            TableOutput::format_key_value(&pairs, config)
        )
    }
}

pub fn run(args: &DatasetArgs, config: &GraphshotConfig, output: &OutputConfig) -> Result<()> {
    let dataset = ResolvedDataset::new(args, config);
    let (graph_path, cache_path) = dataset.paths();

    let graph = GraphStore::load(&graph_path)
        .with_context(|| format!("Failed to load graph from {}", graph_path.display()))?;
    let graph_fp = graph.fingerprint();

    let cache = if cache_path.exists() {
        // Hop 0 always fits the cached bound. Staleness is reported, not rejected.
        let view = build_or_load(&cache_path, None, 0, CacheOptions { verify: false })
            .with_context(|| format!("Failed to load neighbor cache from {}", cache_path.display()))?;
        let index = view.index();
        let fresh = if graph.has_edges() {
            index.fingerprint() == graph_fp
        } else {
            index.num_nodes() == graph.num_nodes()
        };
        Some(CacheInfo {
            path: cache_path.display().to_string(),
            max_hops: index.max_hops(),
            num_edges: index.num_edges(),
            fingerprint: index.fingerprint().to_string(),
            fresh,
        })
    } else {
        None
    };

    let result = InfoResult {
        root: dataset.layout.root().display().to_string(),
        graph: GraphInfo {
            path: graph_path.display().to_string(),
            num_nodes: graph.num_nodes(),
            num_edges: graph.num_edges(),
            feature_dim: graph.feature_dim(),
            feature_dtype: format!("{:?}", graph.features().dtype()).to_lowercase(),
            labeled_nodes: graph.labels().map(|l| l.iter().filter(|&&y| y >= 0).count()),
            has_orig_node_ids: graph.orig_node_ids().is_some(),
            fingerprint: graph_fp.to_string(),
        },
        cache,
    };
    result.output(output);
    Ok(())
}
