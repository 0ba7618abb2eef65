//! Bounded worker pool with a pending-task barrier
//!
//! Used for CW one-shot finalization tasks and any sub-task parallelism the
//! engine offloads. `wait()` blocks until every submitted task has run to
//! completion; submissions after shutdown fail.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use crossbeam::channel::{self, Sender};

use crate::errors::{InternalError, Result};

type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct PoolState {
    pending: Mutex<usize>,
    done: Condvar,
}

pub struct ThreadPool {
    workers: Vec<JoinHandle<()>>,
    sender: Option<Sender<Task>>,
    state: Arc<PoolState>,
}

impl ThreadPool {
    pub fn new(threads: usize) -> Self {
        let threads = threads.max(1);
        let (sender, receiver) = channel::unbounded::<Task>();
        let state = Arc::new(PoolState::default());

        let workers = (0..threads)
            .map(|index| {
                let receiver = receiver.clone();
                let state = Arc::clone(&state);
                std::thread::Builder::new()
                    .name(format!("echosim-pool-{index}"))
                    .spawn(move || {
                        while let Ok(task) = receiver.recv() {
                            task();
                            let mut pending = state.pending.lock().expect("pool state poisoned");
                            *pending -= 1;
                            if *pending == 0 {
                                state.done.notify_all();
                            }
                        }
                    })
                    .expect("failed to spawn pool worker")
            })
            .collect();

        Self {
            workers,
            sender: Some(sender),
            state,
        }
    }

    /// Submit a task. Fails once the pool has shut down.
    pub fn execute(&self, task: impl FnOnce() + Send + 'static) -> Result<()> {
        let sender = self.sender.as_ref().ok_or(InternalError::PoolShutDown)?;
        {
            let mut pending = self.state.pending.lock().expect("pool state poisoned");
            *pending += 1;
        }
        if sender.send(Box::new(task)).is_err() {
            let mut pending = self.state.pending.lock().expect("pool state poisoned");
            *pending -= 1;
            return Err(InternalError::PoolShutDown.into());
        }
        Ok(())
    }

    /// Block until every submitted task has completed
    pub fn wait(&self) {
        let mut pending = self.state.pending.lock().expect("pool state poisoned");
        while *pending > 0 {
            pending = self.state.done.wait(pending).expect("pool state poisoned");
        }
    }

    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }

    /// Stop accepting tasks and join the workers
    pub fn shutdown(&mut self) {
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn tasks_run_and_wait_barrier_holds() {
        let pool = ThreadPool::new(4);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..64 {
            let counter = Arc::clone(&counter);
            pool.execute(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        pool.wait();
        assert_eq!(counter.load(Ordering::SeqCst), 64);
    }

    #[test]
    fn submit_after_shutdown_fails() {
        let mut pool = ThreadPool::new(1);
        pool.shutdown();
        assert!(pool.execute(|| {}).is_err());
    }

    #[test]
    fn wait_with_no_tasks_returns_immediately() {
        let pool = ThreadPool::new(2);
        pool.wait();
    }
}
