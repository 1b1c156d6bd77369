//! Deterministic label partitioning into train/val/test label sets.
//!
//! The label universe `0..num_classes` is shuffled with a fixed seed and split
//! 5 / 5 / remainder into test / val / train. With `remove_cs`, the
//! computer-science labels (the arxiv subject areas) are pulled out of the
//! shuffled pool and appended to both val and test, so evaluation always sees
//! that held-out domain.
//!
//! Every caller re-derives the same partition from the same seed; nothing is
//! shared or persisted between train, val and test consumers.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::error::{GraphshotError, Result};
use crate::types::{NodeId, Split};

/// Class label id.
pub type LabelId = u32;

/// Seed of the label shuffle.
pub const DEFAULT_LABEL_SEED: u64 = 42;

/// Labels drawn into each of test and val from the shuffled pool.
pub const TEST_VAL_LENGTH: usize = 5;

/// Computer-science (arxiv) subject labels held out for evaluation.
pub const CS_ARXIV_LABELS: [LabelId; 40] = [
    0, 1, 3, 6, 9, 16, 17, 23, 24, 26, 29, 39, 42, 47, 52, 57, 59, 63, 73, 77, 79, 85, 86, 89, 94,
    95, 105, 109, 114, 119, 120, 122, 124, 130, 135, 137, 139, 147, 149, 152,
];

/// Train/val/test label sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelPartition {
    pub train: Vec<LabelId>,
    pub val: Vec<LabelId>,
    pub test: Vec<LabelId>,
    /// Held-out labels present in both val and test.
    pub additional: Vec<LabelId>,
}

impl LabelPartition {
    pub fn labels(&self, split: Split) -> &[LabelId] {
        match split {
            Split::Train => &self.train,
            Split::Val => &self.val,
            Split::Test => &self.test,
        }
    }

    pub fn label_set(&self, split: Split) -> BTreeSet<LabelId> {
        self.labels(split).iter().copied().collect()
    }
}

/// Partition `0..num_classes` into train/val/test label sets.
///
/// # Errors
///
/// Fails if fewer than `2 * TEST_VAL_LENGTH` labels remain in the pool after
/// the hold-out. A pool of exactly that size yields an empty train split.
pub fn partition(num_classes: usize, remove_cs: bool, seed: u64) -> Result<LabelPartition> {
    let additional: Vec<LabelId> = if remove_cs {
        CS_ARXIV_LABELS
            .iter()
            .copied()
            .filter(|&l| (l as usize) < num_classes)
            .collect()
    } else {
        Vec::new()
    };

    let held_out: BTreeSet<LabelId> = additional.iter().copied().collect();
    let mut pool: Vec<LabelId> = (0..num_classes as LabelId)
        .filter(|l| !held_out.contains(l))
        .collect();

    if pool.len() < TEST_VAL_LENGTH * 2 {
        return Err(GraphshotError::config(format!(
            "{} labels left after holding out {}, need at least {}",
            pool.len(),
            additional.len(),
            TEST_VAL_LENGTH * 2
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    pool.shuffle(&mut rng);

    let mut test = pool[..TEST_VAL_LENGTH].to_vec();
    test.extend_from_slice(&additional);
    let mut val = pool[TEST_VAL_LENGTH..TEST_VAL_LENGTH * 2].to_vec();
    val.extend_from_slice(&additional);
    let train = pool[TEST_VAL_LENGTH * 2..].to_vec();
    if train.is_empty() {
        warn!("No labels left for the train split ({} classes)", num_classes);
    }

    debug!(
        "Partitioned {} labels: {} train, {} val, {} test ({} held out)",
        num_classes,
        train.len(),
        val.len(),
        test.len(),
        additional.len()
    );

    Ok(LabelPartition {
        train,
        val,
        test,
        additional,
    })
}

/// Per-node labels together with the label set of one split.
#[derive(Debug, Clone)]
pub struct LabelAssignment {
    node_labels: Vec<i64>,
    label_set: BTreeSet<LabelId>,
    num_classes: usize,
    split: Split,
}

impl LabelAssignment {
    /// Resolve the label set for `split` over `node_labels` (negative = unlabeled).
    pub fn for_split(
        node_labels: Vec<i64>,
        num_classes: usize,
        split: Split,
        remove_cs: bool,
        seed: u64,
    ) -> Result<Self> {
        if split == Split::Test && !remove_cs {
            warn!("remove_cs is disabled for the test split; there might not be enough samples");
        }
        let partition = partition(num_classes, remove_cs, seed)?;
        Ok(Self {
            node_labels,
            label_set: partition.label_set(split),
            num_classes,
            split,
        })
    }

    pub fn split(&self) -> Split {
        self.split
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn label_set(&self) -> &BTreeSet<LabelId> {
        &self.label_set
    }

    pub fn num_nodes(&self) -> usize {
        self.node_labels.len()
    }

    /// Label of `node`, or `None` when it is unlabeled or out of range.
    pub fn label_of(&self, node: NodeId) -> Option<LabelId> {
        let label = *self.node_labels.get(node as usize)?;
        LabelId::try_from(label).ok()
    }

    /// Nodes of every label in this split's set, ascending by node id.
    ///
    /// Labels with no nodes are omitted.
    pub fn nodes_by_label(&self) -> BTreeMap<LabelId, Vec<NodeId>> {
        let mut groups: BTreeMap<LabelId, Vec<NodeId>> = BTreeMap::new();
        for (node, &label) in self.node_labels.iter().enumerate() {
            if let Ok(label) = LabelId::try_from(label) {
                if self.label_set.contains(&label) {
                    groups.entry(label).or_default().push(node as NodeId);
                }
            }
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAG_CLASSES: usize = 153;

    #[test]
    fn test_partition_is_idempotent() {
        let a = partition(MAG_CLASSES, true, DEFAULT_LABEL_SEED).unwrap();
        let b = partition(MAG_CLASSES, true, DEFAULT_LABEL_SEED).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_partition_sizes_and_overlap() {
        let p = partition(MAG_CLASSES, true, DEFAULT_LABEL_SEED).unwrap();
        let additional: BTreeSet<LabelId> = p.additional.iter().copied().collect();
        assert_eq!(additional.len(), 40);
        assert_eq!(p.val.len(), TEST_VAL_LENGTH + additional.len());
        assert_eq!(p.test.len(), TEST_VAL_LENGTH + additional.len());
        assert_eq!(p.train.len(), MAG_CLASSES - 40 - 2 * TEST_VAL_LENGTH);

        let train = p.label_set(Split::Train);
        let val = p.label_set(Split::Val);
        let test = p.label_set(Split::Test);
        assert!(train.is_disjoint(&val));
        assert!(train.is_disjoint(&test));
        let shared: BTreeSet<LabelId> = val.intersection(&test).copied().collect();
        assert_eq!(shared, additional);

        let all: BTreeSet<LabelId> = train.union(&val).chain(test.iter()).copied().collect();
        assert_eq!(all.len(), MAG_CLASSES);
    }

    #[test]
    fn test_partition_without_cs_removal() {
        let p = partition(MAG_CLASSES, false, DEFAULT_LABEL_SEED).unwrap();
        assert!(p.additional.is_empty());
        assert_eq!(p.val.len(), TEST_VAL_LENGTH);
        assert_eq!(p.test.len(), TEST_VAL_LENGTH);
        assert!(p.label_set(Split::Val).is_disjoint(&p.label_set(Split::Test)));
    }

    #[test]
    fn test_seed_changes_partition() {
        let a = partition(MAG_CLASSES, true, 42).unwrap();
        let b = partition(MAG_CLASSES, true, 7).unwrap();
        assert_ne!(a.train, b.train);
        assert_eq!(a.additional, b.additional);
    }

    #[test]
    fn test_small_label_universe() {
        assert!(partition(9, false, 42).is_err());
        let p = partition(10, false, 42).unwrap();
        assert!(p.train.is_empty());
        assert_eq!(p.val.len() + p.test.len(), 10);
        let p = partition(11, false, 42).unwrap();
        assert_eq!(p.train.len(), 1);
        // Only held-out ids below num_classes are kept
        let p = partition(60, true, 42).unwrap();
        assert!(p.additional.iter().all(|&l| l < 60));
    }

    #[test]
    fn test_assignment_groups_split_nodes() {
        let p = partition(20, false, 42).unwrap();
        let val_label = p.val[0] as i64;
        let train_label = p.train[0] as i64;
        let labels = vec![val_label, -1, train_label, val_label];

        let assignment = LabelAssignment::for_split(labels, 20, Split::Val, false, 42).unwrap();
        let groups = assignment.nodes_by_label();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[&(val_label as LabelId)], vec![0, 3]);
        assert_eq!(assignment.label_of(1), None);
        assert_eq!(assignment.label_of(2), Some(train_label as LabelId));
    }
}
