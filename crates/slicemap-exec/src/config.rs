//! Parallel execution configuration

use slicemap_core::{SliceMapError, SliceMapResult};

/// Environment variable overriding the worker count
pub const WORKERS_ENV: &str = "SLICEMAP_NUM_WORKERS";

/// Environment variable overriding the inline-execution threshold
pub const MIN_PARALLEL_BATCH_ENV: &str = "SLICEMAP_MIN_PARALLEL_BATCH";

/// Configuration for the parallel mappers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParallelConfig {
    /// Number of workers (None = one per available core)
    pub num_workers: Option<usize>,

    /// Batches with fewer columns than this run inline on the calling thread
    /// (default: 0, always honour the worker count)
    pub min_parallel_batch: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            num_workers: None,
            min_parallel_batch: 0,
        }
    }
}

impl ParallelConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker count
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.num_workers = Some(workers);
        self
    }

    /// Set the inline-execution threshold
    pub fn with_min_parallel_batch(mut self, columns: usize) -> Self {
        self.min_parallel_batch = columns;
        self
    }

    /// Read `SLICEMAP_NUM_WORKERS` and `SLICEMAP_MIN_PARALLEL_BATCH`
    ///
    /// Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(workers) = read_env(WORKERS_ENV) {
            config.num_workers = Some(workers);
        }
        if let Some(columns) = read_env(MIN_PARALLEL_BATCH_ENV) {
            config.min_parallel_batch = columns;
        }
        config
    }

    /// Worker count to use for a batch of `batch` columns
    ///
    /// Fails if the configured count is zero.
    pub fn resolve_workers(&self, batch: usize) -> SliceMapResult<usize> {
        let workers = match self.num_workers {
            Some(0) => return Err(SliceMapError::invalid("worker count must be at least 1")),
            Some(n) => n,
            None => std::thread::available_parallelism().map_or(1, |n| n.get()),
        };
        if batch < self.min_parallel_batch {
            Ok(1)
        } else {
            Ok(workers)
        }
    }
}

fn read_env(name: &str) -> Option<usize> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(variable = name, value = %raw, "ignoring unparseable setting");
            None
        }
    }
}
