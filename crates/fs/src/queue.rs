// Request queue: serializes outgoing authenticated requests.
//
// One logical worker runs tasks strictly in enqueue order, one at a time. The
// worker is spawned on demand and exits when the queue drains. In
// deduplicating mode, tasks enqueued while another runs collapse into a
// single pending successor and the replaced callers get `Superseded`.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::FsResult;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueError {
    /// A deduplicating queue replaced this request with a newer one.
    #[error("request superseded by a newer request")]
    Superseded,
    /// The task panicked or was dropped before producing a result.
    #[error("queued task aborted: {0}")]
    Aborted(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueMode {
    /// Every task runs, in order.
    #[default]
    Fifo,
    /// At most one task waits behind the running one; the newest wins.
    DedupeConcurrent,
}

type JobFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type Reject = Box<dyn FnOnce(QueueError) + Send>;

struct Job {
    run: JobFuture,
    reject: Reject,
}

#[derive(Default)]
struct State {
    /// A worker task is alive.
    running: bool,
    /// The worker is executing a job (as opposed to about to pop one).
    busy: bool,
    pending: VecDeque<Job>,
}

struct Shared {
    mode: QueueMode,
    state: Mutex<State>,
}

/// Single in-order pipeline for one connection. Clones share the pipeline.
#[derive(Clone)]
pub struct RequestQueue {
    shared: Arc<Shared>,
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::with_mode(QueueMode::Fifo)
    }

    pub fn deduplicating() -> Self {
        Self::with_mode(QueueMode::DedupeConcurrent)
    }

    pub fn with_mode(mode: QueueMode) -> Self {
        Self { shared: Arc::new(Shared { mode, state: Mutex::new(State::default()) }) }
    }

    pub fn mode(&self) -> QueueMode {
        self.shared.mode
    }

    /// Tasks not yet started.
    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Queue `task` and return a future resolving to its result.
    ///
    /// The task is placed in line when `enqueue` is called, not when the
    /// returned future is first polled. It is not started until every task
    /// enqueued before it has finished. Its failure reaches only this caller.
    pub fn enqueue<F, Fut, T>(&self, task: F) -> impl Future<Output = FsResult<T>> + Send + 'static
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = FsResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel::<FsResult<T>>();
        let slot = Arc::new(Mutex::new(Some(tx)));

        let run_slot = Arc::clone(&slot);
        let run: JobFuture = Box::pin(async move {
            let result = task().await;
            if let Some(tx) = run_slot.lock().unwrap_or_else(PoisonError::into_inner).take() {
                let _ = tx.send(result);
            }
        });
        let reject: Reject = Box::new(move |error| {
            if let Some(tx) = slot.lock().unwrap_or_else(PoisonError::into_inner).take() {
                let _ = tx.send(Err(error.into()));
            }
        });

        self.submit(Job { run, reject });

        async move {
            rx.await.unwrap_or_else(|_| {
                Err(QueueError::Aborted("task dropped without a result".into()).into())
            })
        }
    }

    fn submit(&self, job: Job) {
        let superseded = {
            let mut state = self.lock();
            let superseded: Vec<Job> = if self.shared.mode == QueueMode::DedupeConcurrent {
                // A job the worker has not picked up yet still counts as the
                // one about to run.
                let keep = usize::from(!state.busy).min(state.pending.len());
                state.pending.drain(keep..).collect()
            } else {
                Vec::new()
            };
            state.pending.push_back(job);
            if !state.running {
                state.running = true;
                tokio::spawn(run_worker(Arc::clone(&self.shared)));
            }
            superseded
        };

        for job in superseded {
            debug!("queued request superseded");
            (job.reject)(QueueError::Superseded);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn run_worker(shared: Arc<Shared>) {
    loop {
        let job = {
            let mut state = shared.state.lock().unwrap_or_else(PoisonError::into_inner);
            match state.pending.pop_front() {
                Some(job) => {
                    state.busy = true;
                    job
                }
                None => {
                    state.busy = false;
                    state.running = false;
                    return;
                }
            }
        };

        // Each task runs in its own tokio task so a panic stays contained.
        let Job { run, reject } = job;
        if let Err(error) = tokio::spawn(run).await {
            warn!(%error, "queued task did not complete");
            reject(QueueError::Aborted(error.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use proptest::prelude::*;

    use super::*;
    use crate::error::FsError;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Start(usize),
        End(usize),
    }

    fn recorder() -> Arc<Mutex<Vec<Event>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    async fn run_ordered(queue: &RequestQueue, delays: &[u8]) -> Vec<Event> {
        let events = recorder();
        let mut handles = Vec::new();
        for (index, delay) in delays.iter().copied().enumerate() {
            let queue = queue.clone();
            let events = Arc::clone(&events);
            // Enqueue synchronously in order, then await concurrently.
            let pending = queue.enqueue(move || async move {
                events.lock().unwrap().push(Event::Start(index));
                for _ in 0..delay {
                    tokio::task::yield_now().await;
                }
                events.lock().unwrap().push(Event::End(index));
                Ok(index)
            });
            handles.push(tokio::spawn(pending));
            tokio::task::yield_now().await;
        }
        for (index, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await.unwrap().unwrap(), index);
        }
        let events = events.lock().unwrap().clone();
        events
    }

    #[tokio::test]
    async fn runs_tasks_in_enqueue_order() {
        let queue = RequestQueue::new();
        let events = run_ordered(&queue, &[3, 0, 5, 1]).await;
        let expected: Vec<Event> =
            (0..4).flat_map(|i| [Event::Start(i), Event::End(i)]).collect();
        assert_eq!(events, expected);
    }

    #[tokio::test]
    async fn failure_reaches_only_its_caller() {
        let queue = RequestQueue::new();
        let first = queue.enqueue(|| async { Err::<(), _>(FsError::NotFound("a".into())) });
        let second = queue.enqueue(|| async { Ok(7) });
        let (first, second) = tokio::join!(first, second);
        assert_eq!(first, Err(FsError::NotFound("a".into())));
        assert_eq!(second, Ok(7));
    }

    #[tokio::test]
    async fn panicking_task_is_reported_and_queue_continues() {
        let queue = RequestQueue::new();
        let failed = queue
            .enqueue(|| async {
                if true {
                    panic!("boom");
                }
                Ok(())
            })
            .await;
        assert!(matches!(failed, Err(FsError::Queue(QueueError::Aborted(_)))));

        let next = queue.enqueue(|| async { Ok("still running") }).await;
        assert_eq!(next, Ok("still running"));
    }

    #[tokio::test]
    async fn worker_stops_when_drained() {
        let queue = RequestQueue::new();
        assert!(!queue.is_running());
        queue.enqueue(|| async { Ok(()) }).await.unwrap();
        // The worker flips `running` off after observing the empty queue.
        for _ in 0..10 {
            if !queue.is_running() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(!queue.is_running());
        assert_eq!(queue.pending_len(), 0);
    }

    #[tokio::test]
    async fn dedupe_mode_keeps_only_the_newest_successor() {
        let queue = RequestQueue::deduplicating();
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let (started_tx, started_rx) = oneshot::channel::<()>();

        let first = tokio::spawn(queue.enqueue(move || async move {
            let _ = started_tx.send(());
            let _ = release_rx.await;
            Ok("first")
        }));
        started_rx.await.unwrap();

        let second = queue.enqueue(|| async { Ok("second") });
        let third = queue.enqueue(|| async { Ok("third") });
        assert_eq!(queue.pending_len(), 1);
        assert_eq!(second.await, Err(FsError::Queue(QueueError::Superseded)));

        release_tx.send(()).unwrap();
        assert_eq!(first.await.unwrap(), Ok("first"));
        assert_eq!(third.await, Ok("third"));
    }

    #[tokio::test]
    async fn dedupe_mode_runs_the_first_task_enqueued_while_idle() {
        let queue = RequestQueue::deduplicating();
        let first = queue.enqueue(|| async { Ok(1) });
        let second = queue.enqueue(|| async { Ok(2) });
        assert_eq!(first.await, Ok(1));
        assert_eq!(second.await, Ok(2));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tasks_do_not_interleave() {
        let queue = RequestQueue::new();
        let events = recorder();
        let mut handles = Vec::new();
        for index in 0..3usize {
            let events = Arc::clone(&events);
            handles.push(tokio::spawn(queue.enqueue(move || async move {
                events.lock().unwrap().push(Event::Start(index));
                tokio::time::sleep(Duration::from_millis(50 * (3 - index as u64))).await;
                events.lock().unwrap().push(Event::End(index));
                Ok(())
            })));
            tokio::task::yield_now().await;
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        let expected: Vec<Event> =
            (0..3).flat_map(|i| [Event::Start(i), Event::End(i)]).collect();
        assert_eq!(*events.lock().unwrap(), expected);
    }

    proptest! {
        #[test]
        fn start_order_equals_enqueue_order(delays in prop::collection::vec(0u8..6, 1..12)) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let events = runtime.block_on(async {
                let queue = RequestQueue::new();
                run_ordered(&queue, &delays).await
            });
            let expected: Vec<Event> =
                (0..delays.len()).flat_map(|i| [Event::Start(i), Event::End(i)]).collect();
            prop_assert_eq!(events, expected);
        }
    }
}
