//! Order-preserving parallel map.

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use tracing::{debug, warn};

/// I/O pools run this many workers per core.
const IO_OVERSUBSCRIPTION: usize = 4;

/// Which kind of work a pool is sized for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    /// CPU-bound work such as running adapters or verifying partitions.
    Cpu,
    /// Network-bound work such as downloading many URLs.
    Io,
}

impl PoolKind {
    pub fn default_workers(self) -> usize {
        match self {
            Self::Cpu => num_cpus::get(),
            Self::Io => num_cpus::get() * IO_OVERSUBSCRIPTION,
        }
    }

    fn thread_prefix(self) -> &'static str {
        match self {
            Self::Cpu => "epi-cpu",
            Self::Io => "epi-io",
        }
    }
}

/// A sized worker pool. Each [`WorkerPool::map`] call builds a dedicated
/// rayon pool so nested maps never share threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPool {
    kind: PoolKind,
    workers: usize,
}

impl WorkerPool {
    pub fn new(kind: PoolKind) -> Self {
        Self::with_workers(kind, kind.default_workers())
    }

    pub fn with_workers(kind: PoolKind, workers: usize) -> Self {
        Self { kind, workers }
    }

    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Apply `f` to every item and return the results in input order.
    ///
    /// Runs serially when the pool has at most one worker or there is at
    /// most one item.
    pub fn map<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Send + Sync,
    {
        if self.workers <= 1 || items.len() <= 1 {
            return items.iter().map(f).collect();
        }
        let prefix = self.kind.thread_prefix();
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.workers.min(items.len()))
            .thread_name(move |idx| format!("{prefix}-{idx}"))
            .build();
        match pool {
            Ok(pool) => {
                debug!(kind = ?self.kind, workers = self.workers, items = items.len(), "parallel map");
                pool.install(|| items.par_iter().map(&f).collect())
            }
            Err(error) => {
                warn!(%error, "failed to build worker pool, running serially");
                items.iter().map(f).collect()
            }
        }
    }
}
