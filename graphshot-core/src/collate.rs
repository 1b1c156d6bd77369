//! Collation of per-node subgraphs into one model-ready batch.
//!
//! Each sampled node contributes one subgraph. Subgraphs are stacked in the
//! batch plan's node order; local edge indices are shifted by the number of
//! nodes stacked before them.

use candle_core::{DType, Device, Tensor};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::augment::Augmentation;
use crate::batch::{BatchPlan, EpisodeSpan};
use crate::error::{GraphshotError, Result};
use crate::params::EpisodeParams;
use crate::subgraph::Subgraph;
use crate::types::NodeId;

/// Width of the zero label placeholder.
pub const LABEL_META_DIM: usize = 768;

/// Per-label feature rows attached to each way.
#[derive(Debug, Clone)]
pub enum LabelMeta {
    /// Every way gets a zero row of width `dim`; used when labels carry no meaning.
    Zeros { dim: usize },
    /// `[num_classes, dim]` rows looked up by way label; unlabeled ways get zeros.
    Dense(Tensor),
}

impl LabelMeta {
    pub fn zeros() -> Self {
        LabelMeta::Zeros {
            dim: LABEL_META_DIM,
        }
    }

    pub fn dim(&self) -> usize {
        match self {
            LabelMeta::Zeros { dim } => *dim,
            LabelMeta::Dense(t) => t.dims().get(1).copied().unwrap_or(0),
        }
    }

    fn rows(&self, labels: &[Option<u32>]) -> Result<Tensor> {
        let dim = self.dim();
        match self {
            LabelMeta::Zeros { .. } => Ok(Tensor::zeros((labels.len(), dim), DType::F32, &Device::Cpu)?),
            LabelMeta::Dense(meta) => {
                let classes = meta.dim(0)?;
                let zero = Tensor::zeros(dim, DType::F32, &Device::Cpu)?;
                let mut rows = Vec::with_capacity(labels.len());
                for label in labels {
                    let row = match label {
                        Some(l) if (*l as usize) < classes => meta.get(*l as usize)?.to_dtype(DType::F32)?,
                        Some(l) => {
                            return Err(GraphshotError::sampling(format!(
                                "label {} has no row in label metadata of {} classes",
                                l, classes
                            )))
                        }
                        None => zero.clone(),
                    };
                    rows.push(row);
                }
                if rows.is_empty() {
                    return Ok(Tensor::zeros((0, dim), DType::F32, &Device::Cpu)?);
                }
                Ok(Tensor::stack(&rows, 0)?)
            }
        }
    }
}

/// One collated batch.
#[derive(Debug, Clone)]
pub struct BatchedInput {
    /// `[total_nodes, dim]` f32 features of every subgraph, augmented.
    pub x: Tensor,
    /// `[2, total_edges]` u32 edges in batch-global indices.
    pub edge_index: Tensor,
    /// `[total_nodes]` u32 index of the sample each node belongs to.
    pub node_graph: Tensor,
    /// `[num_samples]` u32 batch-global index of each sample's seed node.
    pub centers: Tensor,
    /// `[num_samples]` u32 way of each sample within its episode.
    pub way_labels: Tensor,
    /// `[num_samples]` u32 episode of each sample.
    pub episode_ids: Tensor,
    /// `[num_samples]` u8, 1 for query samples.
    pub is_query: Tensor,
    /// `[total_ways, meta_dim]` label features, one row per way in episode order.
    pub label_features: Tensor,
    /// Global node id of each sample's seed.
    pub sample_nodes: Vec<NodeId>,
    pub spans: Vec<EpisodeSpan>,
    pub params: EpisodeParams,
}

impl BatchedInput {
    pub fn num_samples(&self) -> usize {
        self.sample_nodes.len()
    }

    pub fn num_nodes(&self) -> usize {
        self.x.dims().first().copied().unwrap_or(0)
    }

    pub fn num_edges(&self) -> usize {
        self.edge_index.dims().get(1).copied().unwrap_or(0)
    }
}

/// Merges subgraphs into a [`BatchedInput`].
#[derive(Debug, Clone)]
pub struct Collator {
    label_meta: LabelMeta,
    aug: Augmentation,
}

impl Collator {
    pub fn new(label_meta: LabelMeta, aug: Augmentation) -> Self {
        Self { label_meta, aug }
    }

    pub fn augmentation(&self) -> &Augmentation {
        &self.aug
    }

    /// Collate `subgraphs`, one per node of `plan` in [`BatchPlan::node_ids`] order.
    pub fn collate(&self, plan: &BatchPlan, subgraphs: Vec<Subgraph>) -> Result<BatchedInput> {
        if subgraphs.len() != plan.num_nodes() {
            return Err(GraphshotError::sampling(format!(
                "batch {} planned {} nodes but got {} subgraphs",
                plan.index,
                plan.num_nodes(),
                subgraphs.len()
            )));
        }
        if subgraphs.is_empty() {
            return Err(GraphshotError::sampling(format!("batch {} is empty", plan.index)));
        }

        let total_nodes: usize = subgraphs.iter().map(|s| s.num_nodes()).sum();
        let total_edges: usize = subgraphs.iter().map(|s| s.num_edges()).sum();

        let mut src = Vec::with_capacity(total_edges);
        let mut dst = Vec::with_capacity(total_edges);
        let mut node_graph = Vec::with_capacity(total_nodes);
        let mut centers = Vec::with_capacity(subgraphs.len());
        let mut sample_nodes = Vec::with_capacity(subgraphs.len());
        let mut offset = 0u32;
        for (i, sub) in subgraphs.iter().enumerate() {
            for &(s, d) in &sub.edges {
                src.push(s + offset);
                dst.push(d + offset);
            }
            node_graph.extend(std::iter::repeat(i as u32).take(sub.num_nodes()));
            centers.push(offset);
            sample_nodes.push(sub.node_ids.first().copied().unwrap_or_default());
            offset += sub.num_nodes() as u32;
        }

        let features: Vec<&Tensor> = subgraphs.iter().map(|s| &s.features).collect();
        let x = Tensor::cat(&features, 0)?;
        let mut rng = ChaCha8Rng::seed_from_u64(plan.augment_seed);
        let x = self.aug.apply(&x, &mut rng)?;

        let mut way_labels = Vec::with_capacity(subgraphs.len());
        let mut episode_ids = Vec::with_capacity(subgraphs.len());
        let mut is_query = Vec::with_capacity(subgraphs.len());
        let mut labels = Vec::new();
        for (e, episode) in plan.episodes.iter().enumerate() {
            for (way, query, _) in episode.node_roles() {
                way_labels.push(way as u32);
                episode_ids.push(e as u32);
                is_query.push(u8::from(query));
            }
            labels.extend(episode.ways.iter().map(|w| w.label));
        }

        src.extend(dst);
        let device = Device::Cpu;
        let edge_index = Tensor::from_vec(src, (2, total_edges), &device)?;
        let num_samples = subgraphs.len();

        debug!(
            "Collated batch {}: {} samples, {} nodes, {} edges",
            plan.index, num_samples, total_nodes, total_edges
        );

        Ok(BatchedInput {
            x,
            edge_index,
            node_graph: Tensor::from_vec(node_graph, total_nodes, &device)?,
            centers: Tensor::from_vec(centers, num_samples, &device)?,
            way_labels: Tensor::from_vec(way_labels, num_samples, &device)?,
            episode_ids: Tensor::from_vec(episode_ids, num_samples, &device)?,
            is_query: Tensor::from_vec(is_query, num_samples, &device)?,
            label_features: self.label_meta.rows(&labels)?,
            sample_nodes,
            spans: plan.spans(),
            params: plan.params,
        })
    }
}
