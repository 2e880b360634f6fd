use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use relay_core::{ConnectorParams, InboundMessage, JobId, Priority, ProcessorStatus};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::inflight::{InFlight, Reservations};
use crate::journal::Journal;
use crate::queue::{IngestionQueue, OutputQueue};
use crate::{
    dispatch, sender, Connector, Destination, LifecycleError, LogEntry, MessageJob,
    ProcessorConfig, SubmissionError,
};

/// Outcome of [`Processor::add_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Accepted; the reply will be delivered asynchronously.
    Queued(JobId),
    /// A job with the same id is already pending; nothing was queued.
    Duplicate(JobId),
}

impl Submission {
    pub fn job_id(&self) -> &JobId {
        match self {
            Submission::Queued(id) | Submission::Duplicate(id) => id,
        }
    }
}

/// Handles for one start/stop cycle of the background loop.
struct Run {
    ingress: mpsc::UnboundedSender<MessageJob>,
    cancel: CancellationToken,
}

/// State shared between the public handle, the loop thread and its tasks.
pub(crate) struct Shared {
    pub config: ProcessorConfig,
    pub connector: Arc<dyn Connector>,
    pub journal: Journal,
    pub ingestion: IngestionQueue,
    pub output: OutputQueue,
    pub in_flight: InFlight,
    pub reservations: Reservations,
    /// Held across dequeue, send and post-send delay. Lives outside any single
    /// run so a winding-down sender and a fresh one never interleave.
    pub send_lock: tokio::sync::Mutex<()>,
    running: AtomicBool,
    run: Mutex<Option<Run>>,
}

impl Shared {
    pub fn enqueue(&self, job: MessageJob) {
        self.journal.info(
            Some(&job.id),
            format!(
                "queued (priority {}): {}",
                job.priority,
                job.message.preview()
            ),
        );
        self.ingestion.push(job);
    }

    fn lock_run(&self) -> MutexGuard<'_, Option<Run>> {
        self.run.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Message relay processor: accepts inbound messages from any thread,
/// dispatches them to the connector on a background loop under a concurrency
/// cap, and delivers replies through a single serialized sender.
///
/// Cloning yields another handle to the same processor. Call [`stop`] to shut
/// the background thread down; dropping handles does not.
///
/// [`stop`]: Processor::stop
#[derive(Clone)]
pub struct Processor {
    shared: Arc<Shared>,
}

impl Processor {
    pub fn new(mut config: ProcessorConfig, connector: Arc<dyn Connector>) -> Self {
        config.max_concurrent = config.max_concurrent.max(1);
        let journal = Journal::new(config.max_log_lines);
        Self {
            shared: Arc::new(Shared {
                config,
                connector,
                journal,
                ingestion: IngestionQueue::new(),
                output: OutputQueue::new(),
                in_flight: InFlight::new(),
                reservations: Reservations::new(),
                send_lock: tokio::sync::Mutex::new(()),
                running: AtomicBool::new(false),
                run: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.shared.config
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Bring up the background loop. No-op when already running.
    ///
    /// On error nothing is left behind and the processor stays stopped.
    pub fn start(&self) -> Result<(), LifecycleError> {
        let mut run = self.shared.lock_run();
        if run.is_some() {
            return Ok(());
        }

        let runtime = (self.shared.config.runtime)().map_err(LifecycleError::Runtime)?;
        let (ingress_tx, ingress_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let shared = Arc::clone(&self.shared);
        let token = cancel.clone();
        thread::Builder::new()
            .name("relay-loop".to_string())
            .spawn(move || {
                runtime.block_on(run_loop(shared, token, ingress_rx));
                // Blocking connector calls cannot be interrupted; don't wait on them.
                runtime.shutdown_background();
            })
            .map_err(LifecycleError::Thread)?;

        *run = Some(Run {
            ingress: ingress_tx,
            cancel,
        });
        self.shared.running.store(true, Ordering::SeqCst);
        self.shared.journal.info(
            None,
            format!(
                "processor started (max concurrent {})",
                self.shared.config.max_concurrent
            ),
        );
        Ok(())
    }

    /// Stop the background loop. Safe to call at any time.
    ///
    /// Running jobs are aborted on a best-effort basis: a connector call that
    /// is already executing runs to completion on its pool thread, but its
    /// reply is discarded. The in-flight registry is emptied regardless.
    /// Queued messages stay queued for the next [`start`](Processor::start).
    pub fn stop(&self) {
        let run = self.shared.lock_run().take();
        self.shared.running.store(false, Ordering::SeqCst);
        let Some(run) = run else {
            return;
        };
        run.cancel.cancel();
        drop(run.ingress);

        let aborted = self.shared.in_flight.abort_all();
        self.shared.reservations.release_all(&aborted);
        self.shared.journal.info(
            None,
            format!("processor stopped ({} in-flight job(s) aborted)", aborted.len()),
        );
    }

    /// Queue a message for processing. Callable from any thread; never waits
    /// for the reply.
    ///
    /// Starts the processor when it is not running. A second call for the
    /// same destination within the same millisecond, while the first job is
    /// still pending, is dropped as a duplicate.
    pub fn add_message(
        &self,
        destination: Arc<dyn Destination>,
        message: InboundMessage,
        params: ConnectorParams,
        priority: Priority,
    ) -> Submission {
        let id = JobId::new(destination.identity(), (self.shared.config.clock)());

        if !self.is_running() {
            if let Err(err) = self.start() {
                self.shared
                    .journal
                    .error(Some(&id), format!("could not start processor: {err}"));
            }
        }

        if !self.shared.reservations.reserve(&id) {
            self.shared
                .journal
                .warn(Some(&id), "duplicate submission ignored");
            return Submission::Duplicate(id);
        }

        let job = MessageJob::new(id.clone(), destination, message, params, priority);
        let ingress = self
            .shared
            .lock_run()
            .as_ref()
            .map(|run| run.ingress.clone());
        let failure = match ingress {
            Some(tx) => tx
                .send(job)
                .err()
                .map(|rejected| (rejected.0, SubmissionError::LoopClosed)),
            None => Some((job, SubmissionError::NotRunning)),
        };
        if let Some((job, err)) = failure {
            // The queue outlives the loop; the next run picks the job up.
            self.shared
                .journal
                .warn(Some(&job.id), format!("{err}; queued directly"));
            self.shared.enqueue(job);
        }
        Submission::Queued(id)
    }

    pub fn get_status(&self) -> ProcessorStatus {
        ProcessorStatus {
            running: self.is_running(),
            queue_depth: self.shared.ingestion.len(),
            in_flight: self.shared.in_flight.len(),
            max_concurrent: self.shared.config.max_concurrent,
            log_count: self.shared.journal.len(),
            max_log_count: self.shared.journal.capacity(),
        }
    }

    /// Formatted log lines, oldest first: the last `lines`, or all.
    pub fn get_logs(&self, lines: Option<usize>) -> Vec<String> {
        self.shared.journal.lines(lines)
    }

    pub fn log_entries(&self, lines: Option<usize>) -> Vec<LogEntry> {
        self.shared.journal.entries(lines)
    }

    pub fn clear_logs(&self) {
        self.shared.journal.clear();
    }

    /// Segments waiting for the sender.
    pub fn pending_sends(&self) -> usize {
        self.shared.output.len()
    }
}

async fn run_loop(
    shared: Arc<Shared>,
    cancel: CancellationToken,
    ingress: mpsc::UnboundedReceiver<MessageJob>,
) {
    let pump = tokio::spawn(pump_ingress(Arc::clone(&shared), ingress));
    let sender = tokio::spawn({
        let shared = Arc::clone(&shared);
        let cancel = cancel.clone();
        async move {
            supervise(&shared, &cancel, "sender", || {
                sender::run(Arc::clone(&shared), cancel.clone())
            })
            .await;
        }
    });

    supervise(&shared, &cancel, "dispatcher", || {
        dispatch::run(Arc::clone(&shared), cancel.clone())
    })
    .await;

    cancel.cancel();
    let _ = sender.await;
    let _ = pump.await;
}

/// Run a driver to completion. A driver that panics is logged, backed off and
/// started again, unless the run has been cancelled.
async fn supervise<F, Fut>(shared: &Shared, cancel: &CancellationToken, name: &str, driver: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    loop {
        let err = match tokio::spawn(driver()).await {
            Ok(()) => return,
            Err(err) => err,
        };
        if !err.is_panic() {
            return;
        }
        shared
            .journal
            .error(None, format!("{name} error: {name} panicked"));
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(shared.config.driver_backoff) => {}
        }
    }
}

/// Move submitted jobs from the cross-thread channel into the queue. Ends
/// once `stop()` drops the sending side, after draining what was buffered.
async fn pump_ingress(shared: Arc<Shared>, mut ingress: mpsc::UnboundedReceiver<MessageJob>) {
    while let Some(job) = ingress.recv().await {
        shared.enqueue(job);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use super::*;
    use crate::EchoConnector;

    fn idle_processor() -> Processor {
        let config = ProcessorConfig {
            driver_backoff: Duration::from_millis(5),
            ..ProcessorConfig::default()
        };
        Processor::new(config, Arc::new(EchoConnector::default()))
    }

    #[tokio::test]
    async fn panicking_driver_is_logged_and_restarted() {
        let processor = idle_processor();
        let cancel = CancellationToken::new();
        let attempts = AtomicUsize::new(0);

        supervise(&processor.shared, &cancel, "dispatcher", || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    panic!("driver bug");
                }
            }
        })
        .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        let reported = processor
            .get_logs(None)
            .iter()
            .filter(|line| line.contains("[ERROR] dispatcher error: dispatcher panicked"))
            .count();
        assert_eq!(reported, 2);
    }

    #[tokio::test]
    async fn cancelled_run_does_not_restart_a_panicked_driver() {
        let processor = idle_processor();
        let cancel = CancellationToken::new();
        let attempts = AtomicUsize::new(0);

        supervise(&processor.shared, &cancel, "sender", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            cancel.cancel();
            async {
                panic!("driver bug");
            }
        })
        .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(processor
            .get_logs(None)
            .iter()
            .any(|line| line.contains("sender error: sender panicked")));
    }
}
