//! Bounded-concurrency worker pool + done-channel collector (C6).
//!
//! Tasks are plain boxed futures; workers pull them off an mpsc channel and
//! run them to completion, delivering the result through a oneshot back to
//! whoever submitted the task, and also pushing the same handle onto the
//! pool's done-channel for a collector to drain.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex as StdMutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::{AbortHandle, JoinHandle};

/// Default grace period a graceful [`WorkerPool::shutdown`] waits for
/// in-flight work to drain before giving up on the join.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, thiserror::Error)]
pub enum PoolError {
    #[error("worker task panicked: {0}")]
    Panicked(String),
    #[error("pool is shutting down")]
    Closed,
}

type BoxedTask<T> = Pin<Box<dyn Future<Output = Result<T, PoolError>> + Send>>;

struct Task<T> {
    future: BoxedTask<T>,
    completion: oneshot::Sender<Result<T, PoolError>>,
}

/// A handle to a submitted task's eventual result.
pub struct Handle<T> {
    receiver: oneshot::Receiver<Result<T, PoolError>>,
}

impl<T> Handle<T> {
    pub async fn join(self) -> Result<T, PoolError> {
        self.receiver.await.unwrap_or(Err(PoolError::Closed))
    }
}

/// `num_workers` identical workers draining a bounded task channel.
pub struct WorkerPool<T: Send + 'static> {
    sender: mpsc::Sender<Task<T>>,
    workers: Vec<JoinHandle<()>>,
    running: Arc<AtomicUsize>,
    queue_capacity: usize,
    skip_queued: Arc<AtomicBool>,
    inflight: Arc<StdMutex<Vec<AbortHandle>>>,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// `queue_capacity == 0` means unbounded.
    pub fn new(num_workers: usize, queue_capacity: usize) -> Self {
        let capacity = if queue_capacity == 0 {
            // mpsc requires a positive bound; an "unbounded" pool still needs
            // room to hold every in-flight submission without blocking the
            // engine's single cooperative context.
            usize::MAX >> 32
        } else {
            queue_capacity
        };
        let (sender, receiver) = mpsc::channel::<Task<T>>(capacity);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let running = Arc::new(AtomicUsize::new(0));
        let skip_queued = Arc::new(AtomicBool::new(false));
        let inflight: Arc<StdMutex<Vec<AbortHandle>>> = Arc::new(StdMutex::new(Vec::new()));

        let mut workers = Vec::with_capacity(num_workers);
        for _ in 0..num_workers {
            let receiver = Arc::clone(&receiver);
            let running = Arc::clone(&running);
            let skip_queued = Arc::clone(&skip_queued);
            let inflight = Arc::clone(&inflight);
            workers.push(tokio::spawn(async move {
                loop {
                    let task = {
                        let mut rx = receiver.lock().await;
                        rx.recv().await
                    };
                    let Some(task) = task else { break };
                    // `shutdown(.., cancel_queue=true, ..)` flips this before
                    // the channel is drained, so any task still sitting
                    // unstarted in the queue is cancelled instead of run.
                    if skip_queued.load(Ordering::SeqCst) {
                        let _ = task.completion.send(Err(PoolError::Closed));
                        continue;
                    }

                    // Run the task on its own tokio task: a panic inside it
                    // surfaces as a `JoinError` here instead of taking this
                    // worker loop down, and `shutdown(.., cancel_tasks=true)`
                    // can abort it mid-flight via the stashed `AbortHandle`.
                    let handle = tokio::spawn(task.future);
                    let abort_handle = handle.abort_handle();
                    inflight.lock().unwrap().push(abort_handle);

                    running.fetch_add(1, Ordering::SeqCst);
                    let result = match handle.await {
                        Ok(result) => result,
                        Err(join_err) if join_err.is_cancelled() => Err(PoolError::Closed),
                        Err(join_err) => Err(PoolError::Panicked(join_err.to_string())),
                    };
                    running.fetch_sub(1, Ordering::SeqCst);
                    inflight.lock().unwrap().retain(|h| !h.is_finished());

                    let _ = task.completion.send(result);
                }
            }));
        }

        WorkerPool {
            sender,
            workers,
            running,
            queue_capacity: capacity,
            skip_queued,
            inflight,
        }
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Submit a single task, returning a handle to its result.
    pub async fn submit<F>(&self, future: F) -> Handle<T>
    where
        F: Future<Output = Result<T, PoolError>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let task = Task {
            future: Box::pin(future),
            completion: tx,
        };
        // Submission only fails once every worker has exited, which only
        // happens after `shutdown`; the caller's handle then resolves to
        // `PoolError::Closed` via `Handle::join`'s disconnected branch.
        let _ = self.sender.send(task).await;
        Handle { receiver: rx }
    }

    pub async fn submit_all<F, I>(&self, futures: I) -> Vec<Handle<T>>
    where
        F: Future<Output = Result<T, PoolError>> + Send + 'static,
        I: IntoIterator<Item = F>,
    {
        let mut handles = Vec::new();
        for future in futures {
            handles.push(self.submit(future).await);
        }
        handles
    }

    /// No worker running AND no task left in the channel.
    pub fn is_idle(&self) -> bool {
        self.running.load(Ordering::SeqCst) == 0 && self.sender.capacity() == self.queue_capacity
    }

    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop accepting new work, then wait up to `timeout` for workers to
    /// drain.
    ///
    /// - `cancel_queue`: any task still sitting unstarted in the channel is
    ///   cancelled (its handle resolves to `PoolError::Closed`) instead of
    ///   being run, and the channel is drained this way rather than left for
    ///   the workers to work through normally.
    /// - `cancel_tasks`: every in-flight task is aborted immediately instead
    ///   of being allowed to finish.
    ///
    /// If `timeout` elapses before every worker has joined, `shutdown`
    /// returns anyway; any worker still draining keeps running in the
    /// background.
    pub async fn shutdown(self, timeout: Duration, cancel_queue: bool, cancel_tasks: bool) {
        if cancel_queue {
            self.skip_queued.store(true, Ordering::SeqCst);
        }
        if cancel_tasks {
            self.shutdown_now();
        }
        drop(self.sender);

        let workers = self.workers;
        let drain = async move {
            for worker in workers {
                let _ = worker.await;
            }
        };
        let _ = tokio::time::timeout(timeout, drain).await;
    }

    /// Abort every worker loop and every in-flight task immediately,
    /// regardless of queued or running work. Used internally by
    /// `shutdown(.., cancel_tasks=true, ..)`; also exposed for a caller that
    /// needs an immediate, non-graceful stop without awaiting anything.
    pub fn shutdown_now(&self) {
        for handle in self.inflight.lock().unwrap().iter() {
            handle.abort();
        }
        for worker in &self.workers {
            worker.abort();
        }
    }
}

/// Wraps a [`WorkerPool`] with a done-channel: every submission's handle is
/// also pushed here once it resolves, so a single consumer task can drain
/// completions without holding on to every individual [`Handle`].
pub struct Collector<T: Send + 'static> {
    pool: WorkerPool<T>,
    done_tx: mpsc::UnboundedSender<Result<T, PoolError>>,
    done_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Result<T, PoolError>>>,
}

impl<T: Send + 'static> Collector<T> {
    pub fn new(num_workers: usize, queue_capacity: usize) -> Self {
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        Collector {
            pool: WorkerPool::new(num_workers, queue_capacity),
            done_tx,
            done_rx: tokio::sync::Mutex::new(done_rx),
        }
    }

    pub async fn submit<F>(&self, future: F)
    where
        F: Future<Output = Result<T, PoolError>> + Send + 'static,
    {
        let handle = self.pool.submit(future).await;
        let done_tx = self.done_tx.clone();
        tokio::spawn(async move {
            let result = handle.join().await;
            let _ = done_tx.send(result);
        });
    }

    /// Pull the next completed task's result, if any is ready without
    /// blocking forever on a pool that will never produce more.
    pub async fn next(&self) -> Option<Result<T, PoolError>> {
        let mut rx = self.done_rx.lock().await;
        rx.recv().await
    }

    pub fn is_idle(&self) -> bool {
        self.pool.is_idle()
    }

    pub fn running(&self) -> usize {
        self.pool.running()
    }

    pub async fn shutdown(self, timeout: Duration, cancel_queue: bool, cancel_tasks: bool) {
        self.pool.shutdown(timeout, cancel_queue, cancel_tasks).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn submitted_tasks_all_complete() {
        let pool: WorkerPool<i32> = WorkerPool::new(4, 0);
        let mut handles = Vec::new();
        for i in 0..10 {
            handles.push(pool.submit(async move { Ok(i * 2) }).await);
        }
        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.join().await.unwrap());
        }
        results.sort();
        assert_eq!(results, (0..10).map(|i| i * 2).collect::<Vec<_>>());
        pool.shutdown(DEFAULT_SHUTDOWN_TIMEOUT, false, false).await;
    }

    #[tokio::test]
    async fn pool_is_idle_once_all_tasks_finish() {
        let pool: WorkerPool<()> = WorkerPool::new(2, 0);
        let handle = pool
            .submit(async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(())
            })
            .await;
        handle.join().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(pool.is_idle());
        pool.shutdown(DEFAULT_SHUTDOWN_TIMEOUT, false, false).await;
    }

    #[tokio::test]
    async fn collector_drains_completions() {
        let collector: Collector<i32> = Collector::new(2, 0);
        collector.submit(async { Ok(1) }).await;
        collector.submit(async { Ok(2) }).await;
        let mut seen = Vec::new();
        for _ in 0..2 {
            seen.push(collector.next().await.unwrap().unwrap());
        }
        seen.sort();
        assert_eq!(seen, vec![1, 2]);
        collector.shutdown(DEFAULT_SHUTDOWN_TIMEOUT, false, false).await;
    }

    #[tokio::test]
    async fn worker_panic_is_isolated_as_pool_error() {
        let pool: WorkerPool<i32> = WorkerPool::new(1, 0);
        let panicking = pool.submit(async { panic!("boom") }).await;
        let err = panicking.join().await.unwrap_err();
        assert!(matches!(err, PoolError::Panicked(_)));

        // the worker loop survived the panic and keeps serving tasks
        let ok = pool.submit(async { Ok(42) }).await;
        assert_eq!(ok.join().await.unwrap(), 42);
        pool.shutdown(DEFAULT_SHUTDOWN_TIMEOUT, false, false).await;
    }

    #[tokio::test]
    async fn shutdown_with_cancel_queue_cancels_unstarted_tasks() {
        // a single worker, busy with a long-running task, so every task
        // submitted after it sits unstarted in the queue.
        let pool: WorkerPool<()> = WorkerPool::new(1, 0);
        let _busy = pool
            .submit(async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await;
        let queued = pool
            .submit(async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await;

        pool.shutdown(Duration::from_millis(50), true, true).await;

        let err = queued.join().await.unwrap_err();
        assert!(matches!(err, PoolError::Closed));
    }
}
