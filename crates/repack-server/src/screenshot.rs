//! Background screenshot worker.
//!
//! Listens for [`SupporterEvent`]s and runs [`Screenshotter`] attempts for
//! records without an image. A failed attempt is re-enqueued after the
//! policy's delay. While a record has a job in flight, further events for it
//! are ignored. After falling behind the event channel, the worker rescans
//! the store for records still missing an image.

use std::{collections::HashSet, sync::Arc, time::Duration};

use repack_core::{
  event::SupporterEvent,
  remote::ScreenshotSource,
  screenshot::{AttemptOutcome, ScreenshotJob, Screenshotter},
  store::SupporterStore,
};
use tokio::sync::{broadcast, broadcast::error::RecvError, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct ScreenshotWorker<S, F> {
  shots: Arc<Screenshotter<S, F>>,
}

impl<S, F> ScreenshotWorker<S, F>
where
  S: SupporterStore + 'static,
  F: ScreenshotSource + 'static,
{
  pub fn new(shots: Screenshotter<S, F>) -> Self { Self { shots: Arc::new(shots) } }

  /// Consume `events` until every sender is dropped. Jobs still waiting for
  /// a retry at that point are abandoned.
  pub async fn run(self, mut events: broadcast::Receiver<SupporterEvent>) {
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<(Uuid, AttemptOutcome)>();
    let mut pending: HashSet<Uuid> = HashSet::new();

    loop {
      tokio::select! {
        event = events.recv() => match event {
          Ok(event) => {
            if let Some(id) = event.needs_screenshot() {
              self.enqueue(id, &mut pending, &done_tx);
            }
          }
          Err(RecvError::Lagged(skipped)) => {
            warn!(skipped, "screenshot worker lagged behind supporter events, rescanning");
            match self.shots.backlog().await {
              Ok(ids) => {
                for id in ids {
                  self.enqueue(id, &mut pending, &done_tx);
                }
              }
              Err(e) => warn!(error = %e, "failed to list records without a screenshot"),
            }
          }
          Err(RecvError::Closed) => break,
        },
        Some((id, outcome)) = done_rx.recv() => {
          match outcome {
            AttemptOutcome::Attached(asset) => {
              info!(supporter_id = %id, asset_id = %asset.asset_id, "screenshot attached");
              pending.remove(&id);
            }
            AttemptOutcome::Skipped => {
              debug!(supporter_id = %id, "screenshot not needed");
              pending.remove(&id);
            }
            AttemptOutcome::Retry { job, delay, error } => {
              warn!(
                supporter_id = %id,
                next_attempt = job.attempt,
                delay_secs = delay.as_secs_f64(),
                %error,
                "screenshot attempt failed, retrying"
              );
              self.spawn(job, delay, done_tx.clone());
            }
            AttemptOutcome::GaveUp { job, error } => {
              warn!(
                supporter_id = %id,
                attempts = job.attempt,
                %error,
                "giving up on screenshot"
              );
              pending.remove(&id);
            }
          }
        }
      }
    }

    if !pending.is_empty() {
      info!(abandoned = pending.len(), "screenshot worker stopping");
    }
  }

  fn enqueue(
    &self,
    id: Uuid,
    pending: &mut HashSet<Uuid>,
    done: &mpsc::UnboundedSender<(Uuid, AttemptOutcome)>,
  ) {
    if pending.insert(id) {
      self.spawn(ScreenshotJob::new(id), Duration::ZERO, done.clone());
    } else {
      debug!(supporter_id = %id, "screenshot already pending");
    }
  }

  fn spawn(
    &self,
    job: ScreenshotJob,
    delay: Duration,
    done: mpsc::UnboundedSender<(Uuid, AttemptOutcome)>,
  ) {
    let shots = self.shots.clone();
    tokio::spawn(async move {
      if !delay.is_zero() {
        tokio::time::sleep(delay).await;
      }
      let outcome = shots.attempt(job).await;
      // The worker may have stopped meanwhile.
      let _ = done.send((job.supporter_id, outcome));
    });
  }
}
