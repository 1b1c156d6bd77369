//! Command implementations for the graphshot CLI
//!
//! Each command module provides a `run` function that executes the command logic.

pub mod build_cache;
pub mod info;
pub mod labels;
pub mod sample;
pub mod subgraph;

use graphshot_core::{CacheOptions, DatasetLayout};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

use crate::config::GraphshotConfig;
use crate::DatasetArgs;

/// Dataset flags merged with `[dataset]` and `[cache]` from the config file.
#[derive(Debug, Clone)]
pub struct ResolvedDataset {
    pub layout: DatasetLayout,
    pub n_hop: usize,
    pub use_subset: bool,
    pub subset_size: usize,
    pub cache: CacheOptions,
}

impl ResolvedDataset {
    pub fn new(args: &DatasetArgs, config: &GraphshotConfig) -> Self {
        Self {
            layout: DatasetLayout::new(config.dataset_root(args.root.clone())),
            n_hop: args.n_hop.unwrap_or(config.dataset.n_hop),
            use_subset: args.subset || config.dataset.use_subset,
            subset_size: args.subset_size.unwrap_or(config.dataset.subset_size),
            cache: CacheOptions {
                verify: config.cache.verify && !args.no_verify,
            },
        }
    }

    /// Graph and cache paths after subset fallback.
    pub fn paths(&self) -> (PathBuf, PathBuf) {
        self.layout.resolve(self.use_subset, self.subset_size)
    }

    pub fn open(&self) -> graphshot_core::Result<graphshot_core::SubgraphDataset> {
        graphshot_core::open_dataset(
            &self.layout,
            self.n_hop,
            self.use_subset,
            self.subset_size,
            self.cache,
        )
    }
}

/// Spinner on stderr; hidden automatically when stderr is not a terminal.
pub(crate) fn create_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    spinner
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> DatasetArgs {
        DatasetArgs {
            root: None,
            subset: false,
            subset_size: None,
            n_hop: None,
            no_verify: false,
        }
    }

    #[test]
    fn test_flags_override_config() {
        let mut config = GraphshotConfig::default();
        config.dataset.root = Some(PathBuf::from("/data/from-config"));
        config.dataset.n_hop = 3;

        let resolved = ResolvedDataset::new(&args(), &config);
        assert_eq!(resolved.layout.root(), std::path::Path::new("/data/from-config"));
        assert_eq!(resolved.n_hop, 3);
        assert!(resolved.cache.verify);

        let flags = DatasetArgs {
            root: Some(PathBuf::from("/data/cli")),
            n_hop: Some(1),
            no_verify: true,
            ..args()
        };
        let resolved = ResolvedDataset::new(&flags, &config);
        assert_eq!(resolved.layout.root(), std::path::Path::new("/data/cli"));
        assert_eq!(resolved.n_hop, 1);
        assert!(!resolved.cache.verify);
    }
}
