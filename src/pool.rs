//! FIFO worker thread pool.
//!
//! A fixed-size pool of worker threads pulling from one shared task queue. `submit`
//! returns a [`TaskHandle`], the Rust-idiomatic analogue of `std::future<T>`: a thin wrapper over a one-shot `crossbeam_channel::Receiver<T>` whose
//! `.join()` blocks for the result. Singleton/`call_once` semantics from the original
//! engine are dropped in favor of an explicit, owned `ThreadPool` value.

use crossbeam_channel::{Receiver, Sender};
use std::thread::JoinHandle;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A pending result from a [`ThreadPool::submit`] call.
pub struct TaskHandle<T> {
    receiver: Receiver<T>,
}

impl<T> TaskHandle<T> {
    /// Blocks until the task completes and returns its result.
    ///
    /// Panics if the worker that owned this task panicked before sending a result —
    /// matching `std::future::get()` rethrowing on a broken promise.
    pub fn join(self) -> T {
        self.receiver
            .recv()
            .expect("worker thread dropped its result sender without sending")
    }
}

/// Fixed-size FIFO worker pool. Tasks queue in submission order; any idle worker may pick
/// up the next one, so completion order is not guaranteed, but a single `submit` call
/// always observes its own task run exactly once.
pub struct ThreadPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Spawns `thread_count` workers sharing one unbounded FIFO queue. `thread_count` is
    /// clamped to at least 1.
    pub fn new(thread_count: usize) -> Self {
        let thread_count = thread_count.max(1);
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();

        let workers = (0..thread_count)
            .map(|_| {
                let receiver = receiver.clone();
                std::thread::spawn(move || {
                    while let Ok(job) = receiver.recv() {
                        job();
                    }
                })
            })
            .collect();

        ThreadPool {
            sender: Some(sender),
            workers,
        }
    }

    /// Sizes the pool to the machine's physical core count.
    pub fn sized_to_physical_cores() -> Self {
        ThreadPool::new(num_cpus::get_physical())
    }

    /// Queues `job` and returns a handle to its eventual result. Workers run jobs
    /// straight-line to completion; there is no cancellation.
    pub fn submit<F, T>(&self, job: F) -> TaskHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (result_tx, result_rx) = crossbeam_channel::bounded(1);
        let wrapped: Job = Box::new(move || {
            let result = job();
            let _ = result_tx.send(result);
        });

        self.sender
            .as_ref()
            .expect("pool not yet shut down")
            .send(wrapped)
            .expect("worker threads outlive every sender handle held by this pool");

        TaskHandle { receiver: result_rx }
    }

    /// Runs `items` across the pool, `chunk_count` chunks round-robin assigned by index
    ///, then reassembles
    /// results in original submission order regardless of which chunk finishes first.
    /// `work` receives one chunk (each item still paired with its original index) and
    /// must return one output per input, in the same order it was given.
    pub fn map_chunked<I, F, T>(&self, items: Vec<I>, chunk_count: usize, work: F) -> Vec<T>
    where
        I: Send + 'static,
        T: Send + 'static,
        F: Fn(I) -> T + Send + Sync + 'static,
    {
        let chunk_count = chunk_count.max(1);
        let mut chunks: Vec<Vec<(usize, I)>> = (0..chunk_count).map(|_| Vec::new()).collect();
        for (i, item) in items.into_iter().enumerate() {
            chunks[i % chunk_count].push((i, item));
        }

        let work = std::sync::Arc::new(work);
        let total = chunks.iter().map(Vec::len).sum();
        let handles: Vec<TaskHandle<Vec<(usize, T)>>> = chunks
            .into_iter()
            .map(|chunk| {
                let work = work.clone();
                self.submit(move || chunk.into_iter().map(|(i, item)| (i, work(item))).collect())
            })
            .collect();

        let mut out: Vec<Option<T>> = (0..total).map(|_| None).collect();
        for handle in handles {
            for (i, result) in handle.join() {
                out[i] = Some(result);
            }
        }
        out.into_iter().map(|v| v.expect("every index filled by its chunk")).collect()
    }

    /// Blocks until every queued task drains, then joins all worker threads. Dropping the
    /// last `Sender` closes the channel, which is what lets each worker's `recv` loop
    /// exit.
    pub fn shutdown(mut self) {
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_runs_and_returns_result() {
        let pool = ThreadPool::new(2);
        let handle = pool.submit(|| 2 + 2);
        assert_eq!(handle.join(), 4);
    }

    #[test]
    fn tasks_complete_independently_of_submission_order() {
        let pool = ThreadPool::new(4);
        let handles: Vec<_> = (0..16).map(|i| pool.submit(move || i * i)).collect();
        let results: Vec<i32> = handles.into_iter().map(TaskHandle::join).collect();
        assert_eq!(results, (0..16).map(|i| i * i).collect::<Vec<_>>());
    }

    #[test]
    fn map_chunked_preserves_original_order() {
        let pool = ThreadPool::new(4);
        let items: Vec<i32> = (0..37).collect();
        let results = pool.map_chunked(items.clone(), 4, |x| x * 2);
        let expected: Vec<i32> = items.iter().map(|x| x * 2).collect();
        assert_eq!(results, expected);
    }

    #[test]
    fn shutdown_joins_all_workers() {
        let pool = ThreadPool::new(3);
        let handle = pool.submit(|| 1);
        assert_eq!(handle.join(), 1);
        pool.shutdown();
    }
}
