//! Neighbor index persistence.
//!
//! The index is written once per unique cache path and reloaded on every
//! later run. Building walks the whole edge list, so it should happen once,
//! single-threaded, before data-loading workers start.
//!
//! # Cache Format
//!
//! A safetensors file holding:
//!
//! ```text
//! meta         i64[5]   [format version, num_nodes, num_edges, max_hops, edge hash]
//! out_offsets  i64[V+1] CSR offsets for outgoing edges
//! out_targets  u32[E]
//! in_offsets   i64[V+1] CSR offsets for incoming edges
//! in_targets   u32[E]
//! ```
//!
//! Writes go to a temporary file in the cache directory that is then renamed
//! over the target, so a crash or a concurrent builder never leaves a
//! half-written cache behind.

use candle_core::{DType, Device, Tensor};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::{Csr, NeighborIndex, NeighborView};
use crate::error::{GraphshotError, Result};
use crate::graph::{GraphFingerprint, GraphStore};

/// Current cache format version. Increment when the layout changes.
const CACHE_VERSION: i64 = 1;

/// Options controlling how an existing cache is trusted.
#[derive(Debug, Clone, Copy)]
pub struct CacheOptions {
    /// Reject a cache whose fingerprint differs from the supplied graph.
    ///
    /// Only checked when a graph with edges is supplied; with no graph the
    /// cache is trusted as-is.
    pub verify: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self { verify: true }
    }
}

/// Load the neighbor index at `cache_path`, or build and persist it from `graph`.
///
/// When the file exists the graph is only used for the optional fingerprint
/// check. When it does not, `graph` is required.
///
/// # Errors
///
/// - `MissingGraph` if there is no cache file and no graph
/// - `InvalidGraph` if there is no cache file and the graph has no edge list
/// - `StaleCache` if verification is on and the graph's edges differ from the cache
/// - `HopLimitExceeded` if the cache was built for fewer hops than requested
pub fn build_or_load<P: AsRef<Path>>(
    cache_path: P,
    graph: Option<&GraphStore>,
    hop_count: usize,
    options: CacheOptions,
) -> Result<NeighborView> {
    let cache_path = cache_path.as_ref();

    if cache_path.exists() {
        info!("Using existing neighbor cache at {}", cache_path.display());
        let index = load(cache_path)?;
        if let Some(graph) = graph {
            check_fresh(&index, graph, cache_path, options)?;
        }
        return NeighborView::new(Arc::new(index)).with_hops(hop_count);
    }

    let graph = graph.ok_or_else(|| GraphshotError::MissingGraph {
        path: cache_path.display().to_string(),
    })?;
    if !graph.has_edges() {
        return Err(GraphshotError::invalid_graph(format!(
            "graph has no edge_index and there is no neighbor cache at {} to recover edges from",
            cache_path.display()
        )));
    }

    info!(
        "Building neighbor cache for {} nodes, {} edges ({} hops)...",
        graph.num_nodes(),
        graph.num_edges(),
        hop_count
    );
    let start = Instant::now();
    let index = NeighborIndex::build(
        graph.num_nodes(),
        graph.edges(),
        hop_count,
        graph.fingerprint(),
    );
    debug!("Built neighbor index in {:?}", start.elapsed());

    save(&index, cache_path)?;
    info!("Saved neighbor cache to {}", cache_path.display());

    Ok(NeighborView::new(Arc::new(index)))
}

fn check_fresh(
    index: &NeighborIndex,
    graph: &GraphStore,
    cache_path: &Path,
    options: CacheOptions,
) -> Result<()> {
    let cached = index.fingerprint();
    // One O(E) hash pass at most.
    let current_fp = graph.has_edges().then(|| graph.fingerprint());
    let stale = match current_fp {
        Some(fp) => fp != cached,
        None => graph.num_nodes() as u64 != cached.num_nodes,
    };
    if !stale {
        return Ok(());
    }

    let current = match current_fp {
        Some(fp) => fp.to_string(),
        None => format!("{} nodes", graph.num_nodes()),
    };
    if options.verify {
        return Err(GraphshotError::StaleCache {
            path: cache_path.display().to_string(),
            cached: cached.to_string(),
            current,
        });
    }
    warn!(
        "Neighbor cache {} was built from a different graph ({} vs {}); serving it anyway",
        cache_path.display(),
        cached,
        current
    );
    Ok(())
}

/// Persist an index atomically to `path`.
pub fn save(index: &NeighborIndex, path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let fp = index.fingerprint();
    let meta = vec![
        CACHE_VERSION,
        index.num_nodes() as i64,
        index.num_edges() as i64,
        index.max_hops() as i64,
        fp.hash as i64,
    ];

    let mut tensors: HashMap<String, Tensor> = HashMap::new();
    tensors.insert("meta".to_string(), Tensor::from_vec(meta, 5, &Device::Cpu)?);
    insert_csr(&mut tensors, "out", index.out_csr())?;
    insert_csr(&mut tensors, "in", index.in_csr())?;

    let tmp = tempfile::Builder::new()
        .prefix(".graphshot-cache")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    candle_core::safetensors::save(&tensors, tmp.path())?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn insert_csr(tensors: &mut HashMap<String, Tensor>, prefix: &str, csr: &Csr) -> Result<()> {
    let offsets: Vec<i64> = csr.offsets().iter().map(|&o| o as i64).collect();
    let len = offsets.len();
    tensors.insert(
        format!("{}_offsets", prefix),
        Tensor::from_vec(offsets, len, &Device::Cpu)?,
    );
    let targets = csr.targets().to_vec();
    let len = targets.len();
    tensors.insert(
        format!("{}_targets", prefix),
        Tensor::from_vec(targets, len, &Device::Cpu)?,
    );
    Ok(())
}

/// Load an index previously written by [`save`].
pub fn load(path: &Path) -> Result<NeighborIndex> {
    let corrupt = |message: String| GraphshotError::CorruptCache {
        path: path.display().to_string(),
        message,
    };

    let start = Instant::now();
    let mut tensors = candle_core::safetensors::load(path, &Device::Cpu)
        .map_err(|e| corrupt(e.to_string()))?;

    let meta = take(&mut tensors, "meta", DType::I64)
        .map_err(corrupt)?
        .to_vec1::<i64>()?;
    if meta.len() != 5 {
        return Err(corrupt(format!("meta has {} entries, expected 5", meta.len())));
    }
    if meta[0] != CACHE_VERSION {
        return Err(corrupt(format!(
            "cache version {} (expected {}); delete the file to rebuild",
            meta[0], CACHE_VERSION
        )));
    }
    let num_nodes = meta[1] as usize;
    let num_edges = meta[2] as usize;
    let max_hops = meta[3] as usize;
    let fingerprint = GraphFingerprint {
        num_nodes: num_nodes as u64,
        num_edges: num_edges as u64,
        hash: meta[4] as u64,
    };

    let out = take_csr(&mut tensors, "out").map_err(corrupt)?;
    let inc = take_csr(&mut tensors, "in").map_err(corrupt)?;
    for (name, csr) in [("out", &out), ("in", &inc)] {
        if csr.num_rows() != num_nodes || csr.num_entries() != num_edges {
            return Err(corrupt(format!(
                "{} adjacency has {} rows / {} entries, expected {} / {}",
                name,
                csr.num_rows(),
                csr.num_entries(),
                num_nodes,
                num_edges
            )));
        }
        if let Some(&target) = csr.targets().iter().find(|&&t| t as usize >= num_nodes) {
            return Err(corrupt(format!(
                "{} adjacency references node {} in a graph of {} nodes",
                name, target, num_nodes
            )));
        }
    }

    debug!(
        "Loaded neighbor cache ({} nodes, {} edges) in {:?}",
        num_nodes,
        num_edges,
        start.elapsed()
    );
    Ok(NeighborIndex::from_parts(
        num_nodes,
        max_hops,
        out,
        inc,
        fingerprint,
    ))
}

fn take(
    tensors: &mut HashMap<String, Tensor>,
    name: &str,
    dtype: DType,
) -> std::result::Result<Tensor, String> {
    let tensor = tensors
        .remove(name)
        .ok_or_else(|| format!("missing tensor '{}'", name))?;
    if tensor.dtype() != dtype {
        return Err(format!(
            "tensor '{}' has dtype {:?}, expected {:?}",
            name,
            tensor.dtype(),
            dtype
        ));
    }
    Ok(tensor)
}

fn take_csr(tensors: &mut HashMap<String, Tensor>, prefix: &str) -> std::result::Result<Csr, String> {
    let offsets = take(tensors, &format!("{}_offsets", prefix), DType::I64)?
        .to_vec1::<i64>()
        .map_err(|e| e.to_string())?;
    let targets = take(tensors, &format!("{}_targets", prefix), DType::U32)?
        .to_vec1::<u32>()
        .map_err(|e| e.to_string())?;
    if offsets.iter().any(|&o| o < 0) {
        return Err(format!("negative offset in {} adjacency", prefix));
    }
    let offsets = offsets.into_iter().map(|o| o as u64).collect();
    Csr::from_parts(offsets, targets)
        .ok_or_else(|| format!("inconsistent {} adjacency offsets", prefix))
}
