use crate::Result;

/// A pool of worker threads for serving connections.
pub trait ThreadPool {
    /// Creates a new thread pool with the given number of threads.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker threads cannot be started.
    fn new(threads: u32) -> Result<Self>
    where
        Self: Sized;

    /// Runs `job` on one of the pool's threads.
    ///
    /// A panicking job must not take the pool down with it.
    fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static;
}

mod rayon_pool;
mod shared_queue;

pub use self::rayon_pool::RayonThreadPool;
pub use self::shared_queue::SharedQueueThreadPool;
