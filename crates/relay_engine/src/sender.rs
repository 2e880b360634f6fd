use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::processor::Shared;
use crate::{SendError, SendJob};

/// Single consumer of the output queue.
///
/// The send lock is taken before dequeuing and held through the send and the
/// post-send pause, so at most one `Destination::send` is ever in flight and
/// segments leave in exactly the order they were queued.
pub(crate) async fn run(shared: Arc<Shared>, cancel: CancellationToken) {
    shared.journal.info(None, "sender started");
    while !cancel.is_cancelled() {
        let _guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            guard = shared.send_lock.lock() => guard,
        };

        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            job = shared.output.pop_timeout(shared.config.idle_wait) => job,
        };
        let Some(job) = next else {
            continue;
        };
        if cancel.is_cancelled() {
            shared.output.push_front(job);
            break;
        }

        deliver(&shared, job).await;
    }
    shared.journal.info(None, "sender stopped");
}

async fn deliver(shared: &Shared, job: SendJob) {
    let destination = Arc::clone(&job.destination);
    let identity = destination.identity().to_string();
    let text = job.text.clone();
    let mention = job.mention.clone();

    let result = tokio::task::spawn_blocking(move || destination.send(&text, mention.as_deref()))
        .await
        .unwrap_or_else(|err| Err(SendError::from_join(&identity, err)));

    match result {
        Ok(()) => {
            let detail = match job.position {
                Some(position) => format!("segment {position} sent"),
                None => format!("reply sent, {} chars", job.text.chars().count()),
            };
            shared.journal.info(Some(&job.job_id), detail);
            tokio::time::sleep(shared.config.send_delay).await;
        }
        Err(err) => {
            shared
                .journal
                .error(Some(&job.job_id), format!("send failed: {err}"));
            tokio::time::sleep(shared.config.error_backoff).await;
        }
    }
}
