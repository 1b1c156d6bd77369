//! Sample command - dry-run the episodic data loader for one split
//!
//! Opens the dataset, wires the loader exactly as training would, pulls
//! every batch of one pass and prints a per-batch summary.

use anyhow::{Context, Result};
use candle_core::{Device, Tensor};
use colored::Colorize;
use graphshot_core::{
    DataLoader, LabelAssignment, LabelInputs, LoaderConfig, NodeId, Split, SubgraphDataset, TaskKind,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::{create_spinner, ResolvedDataset};
use crate::config::GraphshotConfig;
use crate::output::{id_list, OutputConfig, Outputter, TableDisplay, TableOutput};
use crate::DatasetArgs;

/// Tensor name looked up in a label metadata file.
const LABEL_META_TENSOR: &str = "label_meta";

#[derive(Debug, Clone)]
pub struct SampleArgs {
    pub split: Split,
    pub task: Option<TaskKind>,
    pub batches: Option<usize>,
    pub workers: Option<usize>,
    pub seed: Option<u64>,
    pub aug: Option<String>,
    pub aug_test: bool,
    pub label_meta: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct BatchSummary {
    pub index: usize,
    pub episodes: usize,
    pub n_way: usize,
    pub n_shot: usize,
    pub n_query: usize,
    pub samples: usize,
    pub nodes: usize,
    pub edges: usize,
    /// Seed node of every sample, support before query within each episode.
    pub sample_nodes: Vec<NodeId>,
}

#[derive(Debug, Serialize)]
pub struct SampleResult {
    pub task: TaskKind,
    pub split: Split,
    pub seed: u64,
    pub augmentation: String,
    pub workers: usize,
    pub batches: Vec<BatchSummary>,
    pub duration_ms: u64,
}

impl TableDisplay for SampleResult {
    fn to_table(&self, config: &OutputConfig) -> String {
        let header = format!(
            "{} {} on {} (seed {}, aug {}, {} workers)",
            "SAMPLE".cyan().bold(),
            self.task,
            self.split,
            self.seed,
            if self.augmentation.is_empty() { "none" } else { &self.augmentation },
            self.workers
        );
        let rows: Vec<Vec<String>> = self
            .batches
            .iter()
            .map(|b| {
                vec![
                    b.index.to_string(),
                    b.episodes.to_string(),
                    format!("{}w {}s {}q", b.n_way, b.n_shot, b.n_query),
                    b.samples.to_string(),
                    b.nodes.to_string(),
                    b.edges.to_string(),
                    id_list(&b.sample_nodes, config),
                ]
            })
            .collect();
        let table = TableOutput::from_rows(
            &["Batch", "Episodes", "Shape", "Samples", "Nodes", "Edges", "Seeds"],
            &rows,
            config,
        );
        let footer = format!("{} batches in {}ms", self.batches.len(), self.duration_ms).dimmed();
        format!("{}\n{}\n{}", header, table, footer)
    }
}

pub fn run(
    args: &DatasetArgs,
    sample: SampleArgs,
    config: &GraphshotConfig,
    output: &OutputConfig,
) -> Result<()> {
    let start = Instant::now();
    let dataset = ResolvedDataset::new(args, config);

    let spinner = create_spinner();
    spinner.set_message(format!("Opening dataset at {}...", dataset.layout.root().display()));
    let opened = dataset.open();
    spinner.finish_and_clear();
    let opened =
        opened.with_context(|| format!("Failed to open dataset at {}", dataset.layout.root().display()))?;

    let task = sample.task.unwrap_or(config.loader.task);
    let mut loader_config = LoaderConfig::new(
        task,
        sample.split,
        sample.batches.unwrap_or(config.loader.batch_count),
        config.sampler.param_sampler(),
    );
    loader_config.num_workers = sample.workers.unwrap_or(config.loader.num_workers);
    loader_config.aug = sample.aug.unwrap_or_else(|| config.augment.name.clone());
    loader_config.aug_test = sample.aug_test || config.augment.aug_test;
    loader_config.seed = sample.seed.or(config.loader.seed);

    let assignment = if task == TaskKind::Classification {
        Some(label_assignment(&opened, sample.split, config)?)
    } else {
        None
    };
    let label_meta = match &sample.label_meta {
        Some(path) => Some(load_label_meta(path)?),
        None => None,
    };

    let augments = sample.split.augments_by_default() || loader_config.aug_test;
    let augmentation = if augments { loader_config.aug.clone() } else { String::new() };

    let loader = DataLoader::new(
        opened,
        &loader_config,
        LabelInputs {
            assignment: assignment.as_ref(),
            label_meta,
        },
    )?;

    let total = loader.len();
    let spinner = create_spinner();
    let mut batches = Vec::with_capacity(total);
    for (i, batch) in loader.iter().enumerate() {
        spinner.set_message(format!("Loading batch {}/{}...", i + 1, total));
        let batch = match batch {
            Ok(batch) => batch,
            Err(e) => {
                spinner.finish_and_clear();
                return Err(e).with_context(|| format!("Failed to load batch {}", i));
            }
        };
        batches.push(BatchSummary {
            index: i,
            episodes: batch.spans.len(),
            n_way: batch.params.n_way,
            n_shot: batch.params.n_shot,
            n_query: batch.params.n_query,
            samples: batch.num_samples(),
            nodes: batch.num_nodes(),
            edges: batch.num_edges(),
            sample_nodes: batch.sample_nodes,
        });
    }
    spinner.finish_and_clear();

    let result = SampleResult {
        task,
        split: sample.split,
        seed: loader.sampler().seed(),
        augmentation,
        workers: loader_config.num_workers,
        batches,
        duration_ms: start.elapsed().as_millis() as u64,
    };
    result.output(output);
    Ok(())
}

/// Node labels of the graph restricted to the split's label set.
fn label_assignment(dataset: &SubgraphDataset, split: Split, config: &GraphshotConfig) -> Result<LabelAssignment> {
    let labels = dataset
        .graph()
        .labels()
        .context("The classification task needs node labels, but the graph file has none")?;
    let num_classes = match config.labels.num_classes {
        Some(n) => n,
        None => {
            let inferred = labels.iter().copied().max().map_or(0, |m| (m + 1).max(0) as usize);
            tracing::info!("Inferred {} classes from node labels", inferred);
            inferred
        }
    };
    Ok(LabelAssignment::for_split(
        labels.to_vec(),
        num_classes,
        split,
        config.labels.remove_cs,
        config.labels.seed,
    )?)
}

/// Read `[num_classes, dim]` label features from a safetensors file.
///
/// Uses the tensor named `label_meta`, or the only tensor in the file.
fn load_label_meta(path: &Path) -> Result<Tensor> {
    let mut tensors = candle_core::safetensors::load(path, &Device::Cpu)
        .with_context(|| format!("Failed to read label metadata from {}", path.display()))?;
    if let Some(meta) = tensors.remove(LABEL_META_TENSOR) {
        return Ok(meta);
    }
    let count = tensors.len();
    match (count, tensors.into_values().next()) {
        (1, Some(meta)) => Ok(meta),
        _ => anyhow::bail!(
            "{} has no '{}' tensor and holds {} tensors",
            path.display(),
            LABEL_META_TENSOR,
            count
        ),
    }
}
