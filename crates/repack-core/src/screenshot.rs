//! Screenshot capture for supporter records, one attempt at a time.
//!
//! Scheduling lives with the caller (`repack-server`'s worker); this module
//! decides what a single attempt does and whether, and when, to try again.

use std::{sync::Arc, time::Duration};

use uuid::Uuid;

use crate::{
  Error, Result,
  media::{MediaAsset, NewMediaAsset},
  remote::{FetchedImage, ScreenshotSource},
  store::SupporterStore,
  supporter::SupporterRecord,
};

/// The only content type accepted from the screenshot service.
pub const SCREENSHOT_MEDIA_TYPE: &str = "image/jpeg";

// ─── Retry policy ────────────────────────────────────────────────────────────

/// Bounded exponential backoff between screenshot attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Delay before the second attempt.
  pub initial_delay:  Duration,
  /// Each further delay is this many times the previous one.
  pub backoff_factor: u32,
  /// Total attempts, including the first.
  pub max_attempts:   u32,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      initial_delay:  Duration::from_secs(60),
      backoff_factor: 2,
      max_attempts:   5,
    }
  }
}

impl RetryPolicy {
  /// The delay before the attempt following `attempt` (1-based), or `None`
  /// if `attempt` was the last one allowed.
  pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
    if attempt >= self.max_attempts {
      return None;
    }
    let factor = self
      .backoff_factor
      .max(1)
      .saturating_pow(attempt.saturating_sub(1));
    Some(self.initial_delay.saturating_mul(factor))
  }
}

// ─── Jobs and outcomes ───────────────────────────────────────────────────────

/// A pending screenshot for one supporter. The target URL is read from the
/// record at each attempt, so a newer submission's URL wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenshotJob {
  pub supporter_id: Uuid,
  /// 1-based attempt number.
  pub attempt:      u32,
}

impl ScreenshotJob {
  pub fn new(supporter_id: Uuid) -> Self { Self { supporter_id, attempt: 1 } }

  pub fn next(self) -> Self {
    Self { attempt: self.attempt + 1, ..self }
  }
}

#[derive(Debug)]
pub enum AttemptOutcome {
  Attached(MediaAsset),
  /// Nothing to do: the record is gone or already has an image.
  Skipped,
  /// The attempt failed; run `job` again after `delay`.
  Retry {
    job:   ScreenshotJob,
    delay: Duration,
    error: Error,
  },
  /// The attempt failed and no attempts remain.
  GaveUp { job: ScreenshotJob, error: Error },
}

/// Reject anything that is not a JPEG rendering.
pub fn accept(image: FetchedImage) -> Result<Vec<u8>> {
  match image.content_type.as_deref() {
    Some(SCREENSHOT_MEDIA_TYPE) => Ok(image.bytes),
    other => Err(Error::ContentTypeMismatch {
      found: other.map(str::to_owned),
    }),
  }
}

// ─── Screenshotter ───────────────────────────────────────────────────────────

pub struct Screenshotter<S, F> {
  store:  Arc<S>,
  source: Arc<F>,
  policy: RetryPolicy,
}

impl<S, F> Screenshotter<S, F>
where
  S: SupporterStore,
  F: ScreenshotSource,
{
  pub fn new(store: Arc<S>, source: Arc<F>, policy: RetryPolicy) -> Self {
    Self { store, source, policy }
  }

  pub fn policy(&self) -> RetryPolicy { self.policy }

  /// Every record that still has no image.
  pub async fn backlog(&self) -> Result<Vec<Uuid>, S::Error> {
    let records = self.store.list_supporters(None).await?;
    Ok(
      records
        .into_iter()
        .filter(|r| !r.has_image())
        .map(|r| r.supporter_id)
        .collect(),
    )
  }

  /// Run one attempt of `job`.
  pub async fn attempt(&self, job: ScreenshotJob) -> AttemptOutcome {
    let record = match self.store.get_supporter(job.supporter_id).await {
      Ok(Some(record)) => record,
      Ok(None) => return AttemptOutcome::Skipped,
      Err(e) => return self.failed(job, Error::Storage(e.to_string())),
    };

    if record.has_image() {
      return AttemptOutcome::Skipped;
    }

    match self.capture(&record).await {
      Ok(asset) => AttemptOutcome::Attached(asset),
      Err(error) => self.failed(job, error),
    }
  }

  async fn capture(&self, record: &SupporterRecord) -> Result<MediaAsset> {
    let image = self.source.fetch(&record.site_url).await?;
    let bytes = accept(image)?;
    let asset = NewMediaAsset::titled(
      record.display_title(),
      SCREENSHOT_MEDIA_TYPE,
      bytes,
    );
    self
      .store
      .attach_image(record.supporter_id, asset)
      .await
      .map_err(|e| Error::Storage(e.to_string()))
  }

  fn failed(&self, job: ScreenshotJob, error: Error) -> AttemptOutcome {
    match self.policy.delay_after(job.attempt) {
      Some(delay) => AttemptOutcome::Retry { job: job.next(), delay, error },
      None => AttemptOutcome::GaveUp { job, error },
    }
  }
}
