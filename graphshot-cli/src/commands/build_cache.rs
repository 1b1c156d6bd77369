//! Build-cache command - build (or validate) the neighbor cache once,
//! before any loader workers start.

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use std::time::Instant;

use super::{create_spinner, ResolvedDataset};
use crate::config::GraphshotConfig;
use crate::output::{OutputConfig, Outputter, TableDisplay, TableOutput};
use crate::DatasetArgs;

#[derive(Debug, Serialize)]
pub struct BuildCacheResult {
    pub graph_path: String,
    pub cache_path: String,
    /// False when an existing cache was loaded and validated instead.
    pub built: bool,
    pub num_nodes: usize,
    pub num_edges: usize,
    pub max_hops: usize,
    pub fingerprint: String,
    pub duration_ms: u64,
}

impl TableDisplay for BuildCacheResult {
    fn to_table(&self, config: &OutputConfig) -> String {
        let status = if self.built {
            "BUILT".green().bold()
        } else {
            "UP TO DATE".cyan().bold()
        };
        let pairs = vec![
            ("Graph", self.graph_path.clone()),
            ("Cache", self.cache_path.clone()),
            ("Nodes", self.num_nodes.to_string()),
            ("Edges", self.num_edges.to_string()),
            ("Max hops", self.max_hops.to_string()),
            ("Fingerprint", self.fingerprint.clone()),
            ("Time", format!("{}ms", self.duration_ms)),
        ];
        format!("{} neighbor cache\n{}", status, TableOutput::format_key_value(&pairs, config))
    }
}

pub fn run(args: &DatasetArgs, config: &GraphshotConfig, output: &OutputConfig) -> Result<()> {
    let start = Instant::now();
    let dataset = ResolvedDataset::new(args, config);
    let (graph_path, cache_path) = dataset.paths();
    let built = !cache_path.exists();

    let spinner = create_spinner();
    spinner.set_message(if built {
        format!("Building neighbor cache for {}...", graph_path.display())
    } else {
        format!("Validating {}...", cache_path.display())
    });
    let opened = dataset.open();
    spinner.finish_and_clear();
    let opened =
        opened.with_context(|| format!("Failed to open dataset at {}", dataset.layout.root().display()))?;

    let index = opened.view().index();
    let result = BuildCacheResult {
        graph_path: graph_path.display().to_string(),
        cache_path: cache_path.display().to_string(),
        built,
        num_nodes: index.num_nodes(),
        num_edges: index.num_edges(),
        max_hops: index.max_hops(),
        fingerprint: index.fingerprint().to_string(),
        duration_ms: start.elapsed().as_millis() as u64,
    };
    tracing::info!("Neighbor cache ready at {}", result.cache_path);
    result.output(output);
    Ok(())
}
