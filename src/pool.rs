//! Worker pool used by the batch runner.
//!
//! With the `parallel` feature the pool is a dedicated rayon thread pool;
//! without it every task runs in order on the calling thread.

use crate::error::Result;

#[cfg(feature = "parallel")]
pub struct WorkerPool {
    inner: rayon::ThreadPool,
}

#[cfg(feature = "parallel")]
impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self> {
        use crate::error::ResizeError;

        if workers == 0 {
            return Err(ResizeError::InvalidWorkers);
        }
        let inner = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("resize-worker-{i}"))
            .build()
            .map_err(|e| ResizeError::WorkerPool(e.to_string()))?;
        Ok(Self { inner })
    }

    pub fn workers(&self) -> usize {
        self.inner.current_num_threads()
    }

    /// Runs `task` once per item; blocks until every item is done.
    pub fn run<T, F>(&self, items: Vec<T>, task: F)
    where
        T: Send,
        F: Fn(T) + Send + Sync,
    {
        use rayon::prelude::*;

        self.inner.install(|| items.into_par_iter().for_each(task));
    }
}

#[cfg(not(feature = "parallel"))]
pub struct WorkerPool;

#[cfg(not(feature = "parallel"))]
impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(crate::error::ResizeError::InvalidWorkers);
        }
        if workers > 1 {
            tracing::debug!("Built without the parallel feature; using a single worker");
        }
        Ok(Self)
    }

    pub fn workers(&self) -> usize {
        1
    }

    pub fn run<T, F>(&self, items: Vec<T>, task: F)
    where
        T: Send,
        F: Fn(T) + Send + Sync,
    {
        items.into_iter().for_each(task);
    }
}
