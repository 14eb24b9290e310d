// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Fixed-size pool of worker threads fed from one shared channel.
//!
//! Each worker pulls jobs until it sees a stop message. `stop()` sends one
//! stop message per worker, so jobs queued before the call still run.

use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use tracing::{debug, error};

use crate::error::ServerError;

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Job),
    Stop,
}

/// Cloneable submit side of a [`WorkerPool`].
#[derive(Clone)]
pub struct PoolHandle {
    sender: Sender<Message>,
}

impl PoolHandle {
    /// Queue `job` for the next free worker.
    ///
    /// Fails with [`ServerError::WorkerPoolClosed`] once every worker has
    /// exited.
    pub fn submit<F>(&self, job: F) -> Result<(), ServerError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.sender
            .send(Message::Run(Box::new(job)))
            .map_err(|_| ServerError::WorkerPoolClosed)
    }
}

pub struct WorkerPool {
    handle: PoolHandle,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` workers. 0 means one per available core.
    pub fn new(size: usize) -> Result<Self, ServerError> {
        let size = if size == 0 {
            thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
        } else {
            size
        };

        let (sender, receiver) = channel::unbounded();
        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            let receiver = receiver.clone();
            let worker = thread::Builder::new()
                .name(format!("evloop-worker-{}", id))
                .spawn(move || worker_loop(id, receiver))?;
            workers.push(worker);
        }
        debug!(workers = size, "worker pool started");

        Ok(Self {
            handle: PoolHandle { sender },
            workers,
        })
    }

    pub fn handle(&self) -> PoolHandle {
        self.handle.clone()
    }

    pub fn submit<F>(&self, job: F) -> Result<(), ServerError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.handle.submit(job)
    }

    /// Number of live workers.
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Drain queued jobs, then join every worker.
    pub fn stop(&mut self) {
        for _ in 0..self.workers.len() {
            // A send only fails when every worker is already gone.
            let _ = self.handle.sender.send(Message::Stop);
        }
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!("worker thread exited abnormally");
            }
        }
        debug!("worker pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.stop();
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers.len())
            .finish()
    }
}

fn worker_loop(id: usize, receiver: Receiver<Message>) {
    while let Ok(message) = receiver.recv() {
        match message {
            Message::Run(job) => {
                if std::panic::catch_unwind(std::panic::AssertUnwindSafe(job)).is_err() {
                    error!(worker = id, "job panicked");
                }
            }
            Message::Stop => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn queued_jobs_finish_before_stop_returns() {
        let mut pool = WorkerPool::new(3).unwrap();
        assert_eq!(pool.size(), 3);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..50 {
            let counter = counter.clone();
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        pool.stop();
        assert_eq!(counter.load(Ordering::SeqCst), 50);
        assert_eq!(pool.size(), 0);
    }

    #[test]
    fn panicking_job_keeps_worker_alive() {
        let mut pool = WorkerPool::new(1).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        pool.submit(|| panic!("boom")).unwrap();
        let c = counter.clone();
        pool.submit(move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        pool.stop();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn submit_after_stop_is_rejected() {
        let mut pool = WorkerPool::new(2).unwrap();
        let handle = pool.handle();
        pool.stop();
        assert!(matches!(
            handle.submit(|| {}),
            Err(ServerError::WorkerPoolClosed)
        ));
    }

    #[test]
    fn zero_means_auto_size() {
        let pool = WorkerPool::new(0).unwrap();
        assert!(pool.size() >= 1);
    }
}
