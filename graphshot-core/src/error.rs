//! Error types for graphshot-core.

use thiserror::Error;

/// Result type alias for graphshot-core operations.
pub type Result<T> = std::result::Result<T, GraphshotError>;

/// Errors that can occur while loading graphs, caching neighbors or sampling episodes.
#[derive(Error, Debug)]
pub enum GraphshotError {
    /// Invalid configuration value.
    #[error("Invalid configuration: {message}")]
    Config {
        /// Description of the configuration problem.
        message: String,
    },

    /// Split name other than train, val or test.
    #[error("Invalid split: {0} (expected train, val or test)")]
    InvalidSplit(String),

    /// Task name with no matching episode task.
    #[error("Unknown task: {0}")]
    UnknownTask(String),

    /// Augmentation name with no matching policy.
    #[error("Unknown augmentation: {0}")]
    UnknownAugmentation(String),

    /// Node id outside the graph.
    #[error("Node {node} out of bounds for graph with {num_nodes} nodes")]
    NodeOutOfBounds {
        /// Offending node id.
        node: u64,
        /// Number of nodes in the graph.
        num_nodes: usize,
    },

    /// Graph data violates a structural invariant.
    #[error("Invalid graph: {message}")]
    InvalidGraph {
        /// Description of the violation.
        message: String,
    },

    /// Requested traversal is deeper than the neighbor index allows.
    #[error("Requested {requested} hops but the neighbor view only supports {max_hops}")]
    HopLimitExceeded {
        /// Hops requested by the caller.
        requested: usize,
        /// Hop bound of the view or index.
        max_hops: usize,
    },

    /// Neighborhood too small to draw disjoint support and query members.
    #[error("Neighborhood of node {node} has {available} members, need {required}")]
    InsufficientNeighborhood {
        /// Seed node whose neighborhood was sampled.
        node: u32,
        /// Members available in the neighborhood.
        available: usize,
        /// Members required (shot + query).
        required: usize,
    },

    /// Any other sampling precondition failure.
    #[error("Sampling error: {message}")]
    Sampling {
        /// Description of the sampling failure.
        message: String,
    },

    /// Cache file is absent and no graph was supplied to build it.
    #[error("No neighbor cache at {path} and no graph supplied to build one")]
    MissingGraph {
        /// Cache path that was checked.
        path: String,
    },

    /// Cache file was built from a different edge list.
    #[error("Neighbor cache at {path} was built from a different graph (cache {cached}, graph {current})")]
    StaleCache {
        /// Cache path.
        path: String,
        /// Fingerprint stored in the cache.
        cached: String,
        /// Fingerprint of the supplied graph.
        current: String,
    },

    /// Cache file exists but cannot be interpreted.
    #[error("Corrupt neighbor cache at {path}: {message}")]
    CorruptCache {
        /// Cache path.
        path: String,
        /// What was wrong with it.
        message: String,
    },

    /// IO error reading or writing graph and cache files.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Candle tensor operation error.
    #[error("Tensor error: {message}")]
    TensorError {
        /// Description of the tensor error.
        message: String,
    },
}

impl GraphshotError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        GraphshotError::Config {
            message: message.into(),
        }
    }

    pub(crate) fn sampling(message: impl Into<String>) -> Self {
        GraphshotError::Sampling {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_graph(message: impl Into<String>) -> Self {
        GraphshotError::InvalidGraph {
            message: message.into(),
        }
    }
}

impl From<candle_core::Error> for GraphshotError {
    fn from(err: candle_core::Error) -> Self {
        GraphshotError::TensorError {
            message: err.to_string(),
        }
    }
}
