use futures_util::future;
use pipe_trait::Pipe;
use std::{
    future::Future,
    sync::atomic::{AtomicUsize, Ordering},
};
use tokio::sync::{mpsc, Mutex, Notify};

/// Queue of jobs processed by a fixed number of workers.
///
/// Jobs may [submit](TaskQueue::submit) further jobs while they run, so a whole graph walk can
/// be fed through one queue: the worker count bounds the number of jobs in flight at every
/// depth, and [`drain`](TaskQueue::drain) returns once the queue is quiescent, that is when no
/// submitted job and nothing it transitively submitted remains.
///
/// Workers are futures polled by the task that calls `drain`. They suspend at every I/O call
/// of the handler, which is where all of the waiting happens.
#[derive(Debug)]
pub struct TaskQueue<Job> {
    sender: mpsc::UnboundedSender<Job>,
    receiver: Mutex<mpsc::UnboundedReceiver<Job>>,
    /// Jobs submitted but not yet finished.
    outstanding: AtomicUsize,
    quiescent: Notify,
    worker_count: usize,
}

impl<Job> TaskQueue<Job> {
    /// Create a queue that runs at most `worker_count` jobs at the same time.
    pub fn new(worker_count: usize) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        TaskQueue {
            sender,
            receiver: Mutex::new(receiver),
            outstanding: AtomicUsize::new(0),
            quiescent: Notify::new(),
            worker_count: worker_count.max(1),
        }
    }

    /// Enqueue a job. It runs once a worker is free.
    pub fn submit(&self, job: Job) {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        if self.sender.send(job).is_err() {
            // the receiver lives as long as `self`
            unreachable!("receiver of the task queue was dropped");
        }
    }

    /// Number of jobs submitted and not yet finished.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Run every submitted job through `handler` until the queue is quiescent.
    ///
    /// `handler` receives the queue so that it can submit follow-up jobs. A job counts as
    /// finished when its handler future resolves, and follow-ups submitted before that keep
    /// the queue alive.
    pub async fn drain<'queue, Handler, HandlerFuture>(&'queue self, handler: Handler)
    where
        Handler: Fn(Job, &'queue Self) -> HandlerFuture,
        HandlerFuture: Future<Output = ()>,
    {
        tracing::debug!(target: "harvest::task_queue", workers = self.worker_count, outstanding = self.outstanding(), "Start draining");

        (0..self.worker_count)
            .map(|_| self.work(&handler))
            .pipe(future::join_all)
            .await;

        tracing::debug!(target: "harvest::task_queue", "Quiescent");
    }

    async fn work<'queue, Handler, HandlerFuture>(&'queue self, handler: &Handler)
    where
        Handler: Fn(Job, &'queue Self) -> HandlerFuture,
        HandlerFuture: Future<Output = ()>,
    {
        while let Some(job) = self.next_job().await {
            handler(job, self).await;
            if self.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
                self.quiescent.notify_waiters();
            }
        }
    }

    /// Wait for the next job, or `None` once the queue is quiescent.
    async fn next_job(&self) -> Option<Job> {
        let mut receiver = self.receiver.lock().await;
        tokio::select! {
            biased;
            job = receiver.recv() => job,
            () = self.wait_quiescent() => None,
        }
    }

    async fn wait_quiescent(&self) {
        loop {
            let notified = self.quiescent.notified();
            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }
}
