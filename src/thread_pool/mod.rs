//! Worker pool collaborator
//!
//! The engine does not own a process-wide pool; callers hand it any
//! implementation of [`WorkerPool`]. Two are provided: a rayon-backed pool
//! with named threads, and an inline pool for the zero-worker
//! configuration where the scheduler runs one extraction per frame on the
//! owner thread.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{TerrainError, TerrainResult};

/// The two operations the scheduler needs from a pool: enqueue a unit of
/// work and report how many workers are free.
pub trait WorkerPool: Send + Sync {
    fn push(&self, task: Box<dyn FnOnce() + Send>);
    fn idle_count(&self) -> usize;
    fn worker_count(&self) -> usize;
}

/// Rayon-backed pool with a busy counter layered on top so `idle_count`
/// can answer without asking rayon.
pub struct RayonPool {
    pool: rayon::ThreadPool,
    busy: Arc<AtomicUsize>,
    workers: usize,
}

impl RayonPool {
    pub fn new(workers: usize) -> TerrainResult<Self> {
        if workers == 0 {
            return Err(TerrainError::InvalidConfig(
                "RayonPool needs at least one worker; use InlinePool for zero".into(),
            ));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|idx| format!("terrain-worker-{idx}"))
            .build()?;
        Ok(Self {
            pool,
            busy: Arc::new(AtomicUsize::new(0)),
            workers,
        })
    }
}

impl WorkerPool for RayonPool {
    fn push(&self, task: Box<dyn FnOnce() + Send>) {
        self.busy.fetch_add(1, Ordering::SeqCst);
        let busy = Arc::clone(&self.busy);
        self.pool.spawn(move || {
            task();
            busy.fetch_sub(1, Ordering::SeqCst);
        });
    }

    fn idle_count(&self) -> usize {
        // Queued tasks beyond the worker count drive this to zero, which
        // is exactly what dispatch wants to see.
        self.workers
            .saturating_sub(self.busy.load(Ordering::SeqCst))
    }

    fn worker_count(&self) -> usize {
        self.workers
    }
}

/// Zero-worker pool: the scheduler notices `worker_count() == 0` and runs
/// jobs itself, so `push` only exists as a safe fallback.
pub struct InlinePool;

impl WorkerPool for InlinePool {
    fn push(&self, task: Box<dyn FnOnce() + Send>) {
        task();
    }

    fn idle_count(&self) -> usize {
        0
    }

    fn worker_count(&self) -> usize {
        0
    }
}
