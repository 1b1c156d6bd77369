//! Shared identifiers and enums.
//!
//! Node ids are `u32`: large citation graphs stay below four billion papers,
//! and halving the id width halves the neighbor index on disk and in memory.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::GraphshotError;

/// Global node index into a [`GraphStore`](crate::graph::GraphStore).
pub type NodeId = u32;

/// Dataset split served by a loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }

    /// Default sampler seed for this split: the sum of its character codes.
    ///
    /// Distinct splits get distinct seeds, and the same split always gets
    /// the same one.
    pub fn default_seed(&self) -> u64 {
        self.as_str().chars().map(|c| c as u64).sum()
    }

    /// Whether augmentation is applied by default for this split.
    pub fn augments_by_default(&self) -> bool {
        matches!(self, Split::Train)
    }
}

impl FromStr for Split {
    type Err = GraphshotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "train" => Ok(Split::Train),
            "val" => Ok(Split::Val),
            "test" => Ok(Split::Test),
            other => Err(GraphshotError::InvalidSplit(other.to_string())),
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which edge direction a neighbor lookup follows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NeighborMode {
    /// Follow edges src -> dst.
    Out,
    /// Follow edges dst -> src.
    In,
    /// Follow both directions.
    #[default]
    InOut,
}

impl FromStr for NeighborMode {
    type Err = GraphshotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "out" | "outgoing" => Ok(NeighborMode::Out),
            "in" | "incoming" => Ok(NeighborMode::In),
            "inout" | "both" => Ok(NeighborMode::InOut),
            other => Err(GraphshotError::config(format!(
                "unknown neighbor mode '{}'",
                other
            ))),
        }
    }
}

/// Named episode task families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Same-graph contrastive pairs.
    SameGraph,
    /// Neighbor-matching pairs.
    NeighborMatching,
    /// Label classification over a split's label set.
    Classification,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::SameGraph => "same_graph",
            TaskKind::NeighborMatching => "neighbor_matching",
            TaskKind::Classification => "classification",
        }
    }
}

impl FromStr for TaskKind {
    type Err = GraphshotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "same_graph" => Ok(TaskKind::SameGraph),
            "neighbor_matching" => Ok(TaskKind::NeighborMatching),
            "classification" => Ok(TaskKind::Classification),
            other => Err(GraphshotError::UnknownTask(other.to_string())),
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_seeds_are_char_sums() {
        assert_eq!(Split::Train.default_seed(), 542);
        assert_eq!(Split::Val.default_seed(), 323);
        assert_eq!(Split::Test.default_seed(), 448);
    }

    #[test]
    fn test_invalid_split() {
        assert!(matches!(
            "dev".parse::<Split>(),
            Err(GraphshotError::InvalidSplit(_))
        ));
        assert_eq!("val".parse::<Split>().unwrap(), Split::Val);
    }

    #[test]
    fn test_unknown_task() {
        assert!(matches!(
            "link_prediction".parse::<TaskKind>(),
            Err(GraphshotError::UnknownTask(_))
        ));
        assert_eq!(
            "neighbor_matching".parse::<TaskKind>().unwrap(),
            TaskKind::NeighborMatching
        );
    }

    #[test]
    fn test_neighbor_mode_aliases() {
        assert_eq!("both".parse::<NeighborMode>().unwrap(), NeighborMode::InOut);
        assert_eq!("Outgoing".parse::<NeighborMode>().unwrap(), NeighborMode::Out);
        assert!("sideways".parse::<NeighborMode>().is_err());
    }
}
