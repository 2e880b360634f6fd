use std::sync::Arc;
use std::time::Instant;

use relay_core::{split_reply, JobId, JobStatus};
use tokio_util::sync::CancellationToken;

use crate::processor::Shared;
use crate::{ConnectorError, MessageJob, SendJob};

/// Dispatch driver: keeps up to `max_concurrent` worker tasks busy until the
/// run is cancelled.
pub(crate) async fn run(shared: Arc<Shared>, cancel: CancellationToken) {
    shared.journal.info(None, "dispatcher started");
    while !cancel.is_cancelled() {
        step(&shared, &cancel).await;
    }
    shared.journal.info(None, "dispatcher stopped");
}

async fn step(shared: &Arc<Shared>, cancel: &CancellationToken) {
    if shared.in_flight.len() >= shared.config.max_concurrent {
        tokio::time::sleep(shared.config.capacity_poll).await;
        return;
    }

    let next = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        job = shared.ingestion.pop_timeout(shared.config.idle_wait) => job,
    };
    let Some(job) = next else {
        return;
    };
    if cancel.is_cancelled() {
        shared.ingestion.requeue(job);
        return;
    }

    let id = job.id.clone();
    let ticket = shared.in_flight.issue_ticket();
    let guard = InFlightGuard {
        shared: Arc::clone(shared),
        id: id.clone(),
        ticket,
    };
    let handle = tokio::spawn(process(Arc::clone(shared), job, guard));
    shared.in_flight.insert(id.clone(), ticket, handle.abort_handle());

    // `stop()` may have drained the registry between the spawn and the insert.
    if cancel.is_cancelled() {
        handle.abort();
        shared.in_flight.remove(&id, ticket);
        shared.reservations.release(&id);
    }
}

/// Deregisters a job when its task ends, however it ends: completion,
/// failure or abort all drop the guard.
struct InFlightGuard {
    shared: Arc<Shared>,
    id: JobId,
    ticket: u64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.shared.in_flight.remove(&self.id, self.ticket) {
            self.shared.reservations.release(&self.id);
        }
    }
}

async fn process(shared: Arc<Shared>, mut job: MessageJob, _guard: InFlightGuard) {
    let journal = &shared.journal;
    job.status = JobStatus::Processing;
    journal.info(
        Some(&job.id),
        format!("processing started: {}", job.message.preview()),
    );

    match call_connector(&shared, &job).await {
        Ok(reply) => {
            enqueue_reply(&shared, &job, &reply);
            job.status = JobStatus::Completed;
        }
        Err(err) => {
            job.status = JobStatus::Error;
            journal.error(Some(&job.id), format!("processing failed: {err}"));
            shared.output.push(SendJob {
                destination: Arc::clone(&job.destination),
                text: shared.config.fallback_reply.clone(),
                mention: None,
                job_id: job.id.clone(),
                position: None,
            });
        }
    }
    journal.info(Some(&job.id), format!("processing {}", job.status));
}

async fn call_connector(shared: &Shared, job: &MessageJob) -> Result<String, ConnectorError> {
    let params = job.params.clone();
    shared.journal.info(
        Some(&job.id),
        format!(
            "calling connector: platform {}, model {}, prompt {} chars",
            params.platform,
            params.model,
            params.system_prompt.chars().count()
        ),
    );

    let connector = Arc::clone(&shared.connector);
    let text = job.message.content.clone();
    let started = Instant::now();
    let reply = tokio::task::spawn_blocking(move || connector.call(&text, &params))
        .await
        .map_err(ConnectorError::from_join)??;

    shared.journal.info(
        Some(&job.id),
        format!(
            "connector replied in {:.2}s, {} chars",
            started.elapsed().as_secs_f64(),
            reply.chars().count()
        ),
    );
    Ok(reply)
}

fn enqueue_reply(shared: &Shared, job: &MessageJob, reply: &str) {
    let segments = split_reply(reply, shared.config.chunk_size);
    if segments.len() > 1 {
        shared.journal.info(
            Some(&job.id),
            format!("long reply split into {} segments", segments.len()),
        );
    }
    for segment in segments {
        shared.output.push(SendJob {
            destination: Arc::clone(&job.destination),
            text: segment.text,
            mention: job.message.sender.clone(),
            job_id: job.id.clone(),
            position: segment.position,
        });
    }
}
