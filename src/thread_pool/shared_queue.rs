use std::panic::{self, AssertUnwindSafe};
use std::thread;

use crossbeam::channel::{self, Receiver, Sender};
use log::{debug, error};

use super::ThreadPool;
use crate::{KeyvError, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A thread pool whose workers pull jobs from one shared MPMC queue.
///
/// A panicking job is caught and logged; its worker keeps serving the
/// queue. Workers exit once the pool is dropped and the queue drains.
pub struct SharedQueueThreadPool {
    tx: Sender<Job>,
}

impl ThreadPool for SharedQueueThreadPool {
    fn new(threads: u32) -> Result<Self> {
        if threads == 0 {
            return Err(KeyvError::StringError(
                "thread pool needs at least one worker".to_owned(),
            ));
        }
        let (tx, rx) = channel::unbounded::<Job>();
        for id in 0..threads {
            spawn_worker(id, rx.clone())?;
        }
        Ok(SharedQueueThreadPool { tx })
    }

    fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.tx.send(Box::new(job)).is_err() {
            error!("Thread pool has no workers, dropping job");
        }
    }
}

fn spawn_worker(id: u32, rx: Receiver<Job>) -> Result<()> {
    thread::Builder::new()
        .name(format!("keyv-worker-{id}"))
        .spawn(move || {
            for job in rx.iter() {
                if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                    error!("Worker {id}: job panicked");
                }
            }
            debug!("Worker {id}: queue closed, exiting");
        })?;
    Ok(())
}
