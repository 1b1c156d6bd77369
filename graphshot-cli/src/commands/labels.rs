//! Labels command - show how the label space is partitioned across splits

use anyhow::{Context, Result};
use colored::Colorize;
use graphshot_core::{partition, LabelId, Split};
use serde::Serialize;

use crate::config::GraphshotConfig;
use crate::output::{id_list, OutputConfig, Outputter, TableDisplay, TableOutput};

#[derive(Debug, Clone)]
pub struct LabelsArgs {
    pub num_classes: Option<usize>,
    pub split: Option<Split>,
    pub keep_cs: bool,
    pub seed: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct SplitLabels {
    pub split: Split,
    pub count: usize,
    pub labels: Vec<LabelId>,
}

#[derive(Debug, Serialize)]
pub struct LabelsResult {
    pub num_classes: usize,
    pub remove_cs: bool,
    pub seed: u64,
    pub splits: Vec<SplitLabels>,
    /// CS labels held out of train and shared by val and test.
    pub held_out: Vec<LabelId>,
}

impl TableDisplay for LabelsResult {
    fn to_table(&self, config: &OutputConfig) -> String {
        let header = format!(
            "{} {} classes, seed {}, CS labels {}",
            "LABELS".cyan().bold(),
            self.num_classes,
            self.seed,
            if self.remove_cs { "held out" } else { "pooled" }
        );
        let mut rows: Vec<Vec<String>> = self
            .splits
            .iter()
            .map(|s| vec![s.split.to_string(), s.count.to_string(), id_list(&s.labels, config)])
            .collect();
        if !self.held_out.is_empty() {
            rows.push(vec![
                "held out".dimmed().to_string(),
                self.held_out.len().to_string(),
                id_list(&self.held_out, config),
            ]);
        }
        format!("{}\n{}", header, TableOutput::from_rows(&["Split", "Count", "Labels"], &rows, config))
    }
}

pub fn run(args: LabelsArgs, config: &GraphshotConfig, output: &OutputConfig) -> Result<()> {
    let num_classes = args
        .num_classes
        .or(config.labels.num_classes)
        .context("Number of classes is unknown; pass --num-classes or set [labels] num_classes")?;
    let remove_cs = config.labels.remove_cs && !args.keep_cs;
    let seed = args.seed.unwrap_or(config.labels.seed);

    let parts = partition(num_classes, remove_cs, seed)?;
    let splits = match args.split {
        Some(split) => vec![split],
        None => vec![Split::Train, Split::Val, Split::Test],
    };

    let result = LabelsResult {
        num_classes,
        remove_cs,
        seed,
        splits: splits
            .into_iter()
            .map(|split| SplitLabels {
                split,
                count: parts.labels(split).len(),
                labels: parts.labels(split).to_vec(),
            })
            .collect(),
        held_out: parts.additional.clone(),
    };
    result.output(output);
    Ok(())
}
