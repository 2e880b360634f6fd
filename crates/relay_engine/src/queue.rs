use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use crate::{MessageJob, SendJob};

/// Wait up to `wait` for `try_pop` to yield an item.
///
/// The `Notified` future is created before each check so a push landing
/// between the check and the wait is never missed.
async fn pop_within<T>(
    notify: &Notify,
    wait: Duration,
    mut try_pop: impl FnMut() -> Option<T>,
) -> Option<T> {
    let deadline = Instant::now() + wait;
    loop {
        let notified = notify.notified();
        if let Some(item) = try_pop() {
            return Some(item);
        }
        if tokio::time::timeout_at(deadline, notified).await.is_err() {
            return try_pop();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Pending(MessageJob);

impl Pending {
    fn key(&self) -> (i32, u64) {
        (self.0.priority, self.0.sequence)
    }
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    // BinaryHeap is a max-heap; invert so the lowest (priority, sequence) pops first.
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

/// Unbounded priority queue of message jobs: lower priority value first,
/// arrival order among equals.
pub(crate) struct IngestionQueue {
    heap: Mutex<BinaryHeap<Pending>>,
    notify: Notify,
    next_sequence: AtomicU64,
}

impl IngestionQueue {
    pub fn new() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            notify: Notify::new(),
            next_sequence: AtomicU64::new(0),
        }
    }

    /// Stamp the job with the next arrival sequence and queue it.
    pub fn push(&self, mut job: MessageJob) {
        job.sequence = self.next_sequence.fetch_add(1, AtomicOrdering::Relaxed);
        self.requeue(job);
    }

    /// Put a job back keeping its original sequence, so it regains its slot.
    pub fn requeue(&self, job: MessageJob) {
        lock(&self.heap).push(Pending(job));
        self.notify.notify_one();
    }

    pub fn try_pop(&self) -> Option<MessageJob> {
        lock(&self.heap).pop().map(|pending| pending.0)
    }

    pub async fn pop_timeout(&self, wait: Duration) -> Option<MessageJob> {
        pop_within(&self.notify, wait, || self.try_pop()).await
    }

    pub fn len(&self) -> usize {
        lock(&self.heap).len()
    }
}

/// FIFO of outbound segments; drain order is the global send order.
pub(crate) struct OutputQueue {
    items: Mutex<VecDeque<SendJob>>,
    notify: Notify,
}

impl OutputQueue {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    pub fn push(&self, job: SendJob) {
        lock(&self.items).push_back(job);
        self.notify.notify_one();
    }

    /// Return an item that was popped but not sent to the head of the queue.
    pub fn push_front(&self, job: SendJob) {
        lock(&self.items).push_front(job);
        self.notify.notify_one();
    }

    pub fn try_pop(&self) -> Option<SendJob> {
        lock(&self.items).pop_front()
    }

    pub async fn pop_timeout(&self, wait: Duration) -> Option<SendJob> {
        pop_within(&self.notify, wait, || self.try_pop()).await
    }

    pub fn len(&self) -> usize {
        lock(&self.items).len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use relay_core::{ConnectorParams, InboundMessage, JobId};

    use super::*;
    use crate::{Destination, SendError};

    struct Nowhere;

    impl Destination for Nowhere {
        fn identity(&self) -> &str {
            "nowhere"
        }

        fn send(&self, _text: &str, _mention: Option<&str>) -> Result<(), SendError> {
            Ok(())
        }
    }

    fn job(name: &str, priority: i32) -> MessageJob {
        MessageJob::new(
            JobId::new(name, 0),
            Arc::new(Nowhere),
            InboundMessage::new(name),
            ConnectorParams::default(),
            priority,
        )
    }

    fn drain_names(queue: &IngestionQueue) -> Vec<String> {
        std::iter::from_fn(|| queue.try_pop())
            .map(|job| job.message.content)
            .collect()
    }

    #[test]
    fn lower_priority_value_pops_first_and_ties_keep_arrival_order() {
        let queue = IngestionQueue::new();
        queue.push(job("late-normal", 0));
        queue.push(job("urgent", -1));
        queue.push(job("second-normal", 0));
        queue.push(job("background", 5));
        queue.push(job("third-normal", 0));

        assert_eq!(
            drain_names(&queue),
            vec![
                "urgent",
                "late-normal",
                "second-normal",
                "third-normal",
                "background"
            ]
        );
    }

    #[test]
    fn requeued_job_regains_its_place() {
        let queue = IngestionQueue::new();
        queue.push(job("first", 0));
        queue.push(job("second", 0));
        let first = queue.try_pop().unwrap();
        queue.requeue(first);
        assert_eq!(drain_names(&queue), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn pop_timeout_returns_none_when_idle() {
        let queue = IngestionQueue::new();
        let started = Instant::now();
        assert!(queue.pop_timeout(Duration::from_millis(30)).await.is_none());
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn pop_timeout_wakes_on_push_from_another_thread() {
        let queue = Arc::new(IngestionQueue::new());
        let producer = Arc::clone(&queue);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            producer.push(job("late", 0));
        });
        let popped = queue.pop_timeout(Duration::from_secs(5)).await;
        assert_eq!(popped.map(|job| job.message.content).as_deref(), Some("late"));
    }

    #[test]
    fn output_queue_is_fifo_and_push_front_restores_head() {
        let queue = OutputQueue::new();
        for text in ["a", "b", "c"] {
            queue.push(SendJob {
                destination: Arc::new(Nowhere),
                text: text.to_string(),
                mention: None,
                job_id: JobId::new("nowhere", 0),
                position: None,
            });
        }
        let head = queue.try_pop().unwrap();
        assert_eq!(head.text, "a");
        queue.push_front(head);
        let order: Vec<_> = std::iter::from_fn(|| queue.try_pop())
            .map(|job| job.text)
            .collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert_eq!(queue.len(), 0);
    }
}
