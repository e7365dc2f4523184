//! Generic bounded worker pool: a fixed number of tasks pull jobs from one
//! shared receiver and hand each to a caller-supplied handler. Enqueue is
//! non-blocking; a full channel drops the job and logs a warning rather than
//! applying backpressure to the caller.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub struct WorkerPool<J> {
    sender: mpsc::Sender<J>,
    handles: Vec<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl<J: Send + 'static> WorkerPool<J> {
    /// Spawns `workers` tasks sharing one `capacity`-bounded channel, each
    /// running `handler` on every job it receives until the channel closes
    /// or cancellation fires.
    pub fn spawn<F, Fut>(name: &'static str, workers: usize, capacity: usize, handler: F) -> Self
    where
        F: Fn(J) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let (sender, receiver) = mpsc::channel(capacity);
        let receiver = Arc::new(Mutex::new(receiver));
        let cancel = CancellationToken::new();
        let handler = Arc::new(handler);

        let handles = (0..workers)
            .map(|worker_id| {
                let receiver = receiver.clone();
                let cancel = cancel.clone();
                let handler = handler.clone();
                tokio::spawn(async move {
                    loop {
                        let job = {
                            let mut receiver = receiver.lock().await;
                            tokio::select! {
                                biased;
                                _ = cancel.cancelled() => None,
                                job = receiver.recv() => job,
                            }
                        };
                        match job {
                            Some(job) => handler(job).await,
                            None => {
                                tracing::debug!(pool = name, worker_id, "worker stopping");
                                break;
                            }
                        }
                    }
                })
            })
            .collect();

        Self {
            sender,
            handles,
            cancel,
        }
    }

    /// Enqueues `job` without blocking. Drops and warns if every worker is
    /// busy and the channel is already at capacity.
    pub fn try_enqueue(&self, job: J) {
        if let Err(err) = self.sender.try_send(job) {
            warn!(error = %err, "worker pool queue full, dropping job");
        }
    }

    pub async fn shutdown(self) {
        self.cancel.cancel();
        drop(self.sender);
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}
