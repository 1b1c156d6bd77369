//! Subgraph command - extract the k-hop subgraph around seed nodes

use anyhow::{Context, Result};
use colored::Colorize;
use graphshot_core::NodeId;
use serde::Serialize;

use super::ResolvedDataset;
use crate::config::GraphshotConfig;
use crate::output::{id_list, OutputConfig, Outputter, TableDisplay, TableOutput};
use crate::DatasetArgs;

/// Edge rows printed in table mode.
const MAX_TABLE_EDGES: usize = 50;

#[derive(Debug, Serialize)]
pub struct SubgraphResult {
    pub seeds: Vec<NodeId>,
    pub hops: usize,
    pub num_nodes: usize,
    pub num_edges: usize,
    pub feature_dim: usize,
    /// Global node ids; the seeds come first.
    pub node_ids: Vec<NodeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orig_node_ids: Option<Vec<NodeId>>,
    /// Edges in local indices into `node_ids`.
    pub edges: Vec<(u32, u32)>,
}

impl TableDisplay for SubgraphResult {
    fn to_table(&self, config: &OutputConfig) -> String {
        let mut pairs = vec![
            ("Seeds", id_list(&self.seeds, config)),
            ("Hops", self.hops.to_string()),
            ("Nodes", self.num_nodes.to_string()),
            ("Edges", self.num_edges.to_string()),
            ("Feature dim", self.feature_dim.to_string()),
            ("Node ids", id_list(&self.node_ids, config)),
        ];
        if let Some(orig) = &self.orig_node_ids {
            pairs.push(("Original ids", id_list(orig, config)));
        }

        let mut out = format!(
            "{}\n{}",
            "SUBGRAPH".cyan().bold(),
            TableOutput::format_key_value(&pairs, config)
        );
        if !self.edges.is_empty() {
            let label = |local: u32| match self.node_ids.get(local as usize) {
                Some(global) => format!("{} ({})", local, global),
                None => local.to_string(),
            };
            let rows: Vec<Vec<String>> = self
                .edges
                .iter()
                .take(MAX_TABLE_EDGES)
                .map(|&(s, d)| vec![label(s), label(d)])
                .collect();
            out.push('\n');
            out.push_str(&TableOutput::from_rows(&["Source", "Target"], &rows, config));
            if self.edges.len() > MAX_TABLE_EDGES {
                out.push_str(&format!(
                    "\n{}",
                    format!("... {} more edges (use --format json)", self.edges.len() - MAX_TABLE_EDGES)
                        .dimmed()
                ));
            }
        }
        out
    }
}

pub fn run(
    args: &DatasetArgs,
    seeds: &[NodeId],
    hops: Option<usize>,
    config: &GraphshotConfig,
    output: &OutputConfig,
) -> Result<()> {
    let dataset = ResolvedDataset::new(args, config);
    let opened = dataset
        .open()
        .with_context(|| format!("Failed to open dataset at {}", dataset.layout.root().display()))?;

    let subgraph = opened.get_subgraph(seeds, hops)?;
    let result = SubgraphResult {
        seeds: seeds.to_vec(),
        hops: hops.unwrap_or_else(|| opened.num_hops()),
        num_nodes: subgraph.num_nodes(),
        num_edges: subgraph.num_edges(),
        feature_dim: subgraph.features.dims().get(1).copied().unwrap_or(0),
        node_ids: subgraph.node_ids,
        orig_node_ids: subgraph.orig_node_ids,
        edges: subgraph.edges,
    };
    result.output(output);
    Ok(())
}
