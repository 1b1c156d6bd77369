//! graphshot configuration loading from `.graphshot.toml`.
//!
//! Every section is optional. Values given on the command line override the
//! file; anything left unset falls back to the defaults below.
//!
//! # Example Configuration
//!
//! ```toml
//! [dataset]
//! root = "data/mag240m"
//! n_hop = 2
//! use_subset = true
//! subset_size = 20000000
//!
//! [labels]
//! num_classes = 153
//! remove_cs = true
//! seed = 42
//!
//! [sampler]
//! batch_size = 5
//! n_way = [2, 5]
//! n_shot = 3
//! n_query = 24
//! task_multiplier = 1
//!
//! [loader]
//! task = "neighbor_matching"
//! batch_count = 100
//! num_workers = 4
//!
//! [augment]
//! name = "drop_feature:0.1"
//! aug_test = false
//!
//! [cache]
//! verify = true
//!
//! [output]
//! format = "table"
//! color = true
//! ```

use anyhow::Context;
use graphshot_core::{ParamRange, ParamSampler, TaskKind, DEFAULT_LABEL_SEED, DEFAULT_SUBSET_SIZE};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default file name, looked up in the working directory.
pub const CONFIG_FILE: &str = ".graphshot.toml";

/// Root configuration structure loaded from `.graphshot.toml`.
#[derive(Debug, Deserialize, Default)]
pub struct GraphshotConfig {
    #[serde(default)]
    pub dataset: DatasetSection,

    #[serde(default)]
    pub labels: LabelsSection,

    #[serde(default)]
    pub sampler: SamplerSection,

    #[serde(default)]
    pub loader: LoaderSection,

    #[serde(default)]
    pub augment: AugmentSection,

    #[serde(default)]
    pub cache: CacheSection,

    #[serde(default)]
    pub output: OutputSettings,
}

/// Where the graph lives and how deep subgraphs reach.
#[derive(Debug, Deserialize)]
pub struct DatasetSection {
    /// Dataset directory holding `graph.safetensors` and the neighbor cache.
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Default hop count for extracted subgraphs.
    #[serde(default = "default_n_hop")]
    pub n_hop: usize,

    /// Prefer the `subset/` graph when it exists.
    #[serde(default)]
    pub use_subset: bool,

    #[serde(default = "default_subset_size")]
    pub subset_size: usize,
}

fn default_n_hop() -> usize {
    2
}

fn default_subset_size() -> usize {
    DEFAULT_SUBSET_SIZE
}

impl Default for DatasetSection {
    fn default() -> Self {
        Self {
            root: None,
            n_hop: default_n_hop(),
            use_subset: false,
            subset_size: default_subset_size(),
        }
    }
}

/// Label partitioning.
#[derive(Debug, Deserialize)]
pub struct LabelsSection {
    /// Number of classes in the graph's label space. Required for
    /// classification; inferred from the graph labels when unset.
    #[serde(default)]
    pub num_classes: Option<usize>,

    /// Hold the arXiv CS labels out of train/val and use them for test.
    #[serde(default = "default_true")]
    pub remove_cs: bool,

    #[serde(default = "default_label_seed")]
    pub seed: u64,
}

fn default_true() -> bool {
    true
}

fn default_label_seed() -> u64 {
    DEFAULT_LABEL_SEED
}

impl Default for LabelsSection {
    fn default() -> Self {
        Self {
            num_classes: None,
            remove_cs: true,
            seed: DEFAULT_LABEL_SEED,
        }
    }
}

/// Episode shape. Each value is a number or an inclusive `[min, max]` pair.
#[derive(Debug, Deserialize)]
pub struct SamplerSection {
    #[serde(default = "default_batch_size")]
    pub batch_size: ParamRange,

    #[serde(default = "default_n_way")]
    pub n_way: ParamRange,

    #[serde(default = "default_n_shot")]
    pub n_shot: ParamRange,

    #[serde(default = "default_n_query")]
    pub n_query: ParamRange,

    #[serde(default = "default_task_multiplier")]
    pub task_multiplier: ParamRange,
}

fn default_batch_size() -> ParamRange {
    ParamRange::Fixed(5)
}

fn default_n_way() -> ParamRange {
    ParamRange::Fixed(3)
}

fn default_n_shot() -> ParamRange {
    ParamRange::Fixed(3)
}

fn default_n_query() -> ParamRange {
    ParamRange::Fixed(24)
}

fn default_task_multiplier() -> ParamRange {
    ParamRange::Fixed(1)
}

impl Default for SamplerSection {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            n_way: default_n_way(),
            n_shot: default_n_shot(),
            n_query: default_n_query(),
            task_multiplier: default_task_multiplier(),
        }
    }
}

impl SamplerSection {
    pub fn param_sampler(&self) -> ParamSampler {
        ParamSampler {
            batch_size: self.batch_size,
            n_way: self.n_way,
            n_shot: self.n_shot,
            n_query: self.n_query,
            task_multiplier: self.task_multiplier,
        }
    }
}

/// Data loader defaults.
#[derive(Debug, Deserialize)]
pub struct LoaderSection {
    #[serde(default = "default_task")]
    pub task: TaskKind,

    #[serde(default = "default_batch_count")]
    pub batch_count: usize,

    /// Parallel batch workers; 0 loads in the calling thread.
    #[serde(default)]
    pub num_workers: usize,

    /// Overrides the per-split sampler seed.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_task() -> TaskKind {
    TaskKind::NeighborMatching
}

fn default_batch_count() -> usize {
    100
}

impl Default for LoaderSection {
    fn default() -> Self {
        Self {
            task: default_task(),
            batch_count: default_batch_count(),
            num_workers: 0,
            seed: None,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct AugmentSection {
    /// Augmentation policy name; empty means none.
    #[serde(default)]
    pub name: String,

    /// Augment val and test batches too.
    #[serde(default)]
    pub aug_test: bool,
}

#[derive(Debug, Deserialize)]
pub struct CacheSection {
    /// Reject a neighbor cache whose fingerprint does not match the graph.
    #[serde(default = "default_true")]
    pub verify: bool,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self { verify: true }
    }
}

/// Output formatting preferences. Command-line flags win.
#[derive(Debug, Deserialize, Default)]
pub struct OutputSettings {
    /// `table` or `json`.
    #[serde(default)]
    pub format: Option<String>,

    /// Force colors on or off; auto-detected from the TTY when unset.
    #[serde(default)]
    pub color: Option<bool>,

    /// Blank table borders and single-line JSON.
    #[serde(default)]
    pub compact: bool,
}

impl GraphshotConfig {
    /// Load configuration from `path`.
    ///
    /// A missing file yields defaults. Read or parse failures are logged as
    /// warnings and also yield defaults.
    pub fn load(path: &Path) -> Self {
        match Self::load_strict(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{:#}; using default configuration", e);
                Self::default()
            }
        }
    }

    /// Load configuration from `path`, failing on unreadable or malformed files.
    ///
    /// A missing file still yields defaults.
    pub fn load_strict(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Get the default output format, if configured.
    pub fn default_format(&self) -> Option<&str> {
        self.output.format.as_deref()
    }

    pub fn use_color(&self) -> Option<bool> {
        self.output.color
    }

    /// Dataset root: the CLI value, then `[dataset] root`, then the working directory.
    pub fn dataset_root(&self, cli: Option<PathBuf>) -> PathBuf {
        cli.or_else(|| self.dataset.root.clone())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = GraphshotConfig::default();
        assert_eq!(config.dataset.n_hop, 2);
        assert_eq!(config.dataset.subset_size, DEFAULT_SUBSET_SIZE);
        assert!(config.labels.remove_cs);
        assert_eq!(config.labels.seed, 42);
        assert_eq!(config.loader.task, TaskKind::NeighborMatching);
        assert!(config.cache.verify);
        assert!(config.default_format().is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[dataset]
root = "/data/mag240m"
n_hop = 1
use_subset = true
subset_size = 1000

[labels]
num_classes = 153
remove_cs = false
seed = 7

[sampler]
batch_size = 2
n_way = [2, 5]
n_query = 4

[loader]
task = "classification"
batch_count = 10
num_workers = 3
seed = 99

[augment]
name = "dropout:0.2"
aug_test = true

[cache]
verify = false

[output]
format = "json"
color = false
compact = true
"#;
        let config: GraphshotConfig = toml::from_str(toml_content).unwrap();

        assert_eq!(config.dataset.root, Some(PathBuf::from("/data/mag240m")));
        assert_eq!(config.dataset.n_hop, 1);
        assert!(config.dataset.use_subset);
        assert_eq!(config.dataset.subset_size, 1000);

        assert_eq!(config.labels.num_classes, Some(153));
        assert!(!config.labels.remove_cs);
        assert_eq!(config.labels.seed, 7);

        let params = config.sampler.param_sampler();
        assert_eq!(params.batch_size, ParamRange::Fixed(2));
        assert_eq!(params.n_way, ParamRange::Range(2, 5));
        assert_eq!(params.n_shot, ParamRange::Fixed(3));
        assert_eq!(params.n_query, ParamRange::Fixed(4));

        assert_eq!(config.loader.task, TaskKind::Classification);
        assert_eq!(config.loader.batch_count, 10);
        assert_eq!(config.loader.num_workers, 3);
        assert_eq!(config.loader.seed, Some(99));

        assert_eq!(config.augment.name, "dropout:0.2");
        assert!(config.augment.aug_test);
        assert!(!config.cache.verify);

        assert_eq!(config.default_format(), Some("json"));
        assert_eq!(config.use_color(), Some(false));
        assert!(config.output.compact);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = GraphshotConfig::load_strict(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.loader.batch_count, 100);
    }

    #[test]
    fn test_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[sampler]\nn_way = \"three\"\n").unwrap();

        assert!(GraphshotConfig::load_strict(&path).is_err());
        let config = GraphshotConfig::load(&path);
        assert_eq!(config.sampler.n_way, ParamRange::Fixed(3));
    }

    #[test]
    fn test_dataset_root_precedence() {
        let mut config = GraphshotConfig::default();
        assert_eq!(config.dataset_root(None), PathBuf::from("."));
        config.dataset.root = Some(PathBuf::from("from-config"));
        assert_eq!(config.dataset_root(None), PathBuf::from("from-config"));
        assert_eq!(
            config.dataset_root(Some(PathBuf::from("from-cli"))),
            PathBuf::from("from-cli")
        );
    }
}
