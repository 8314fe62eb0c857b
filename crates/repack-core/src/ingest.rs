//! Supporter submission ingestion.
//!
//! One pipeline serves every transport: validate the fields, gate on the
//! site being reachable, then upsert the record together with this week's
//! history entry. The returned [`SupporterEvent`] is published by the caller.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
  event::SupporterEvent,
  period::week_key,
  remote::SiteProbe,
  store::SupporterStore,
  submission::{FieldSource, Submission, ValidationError},
  supporter::{HistoryEntry, SupporterRecord, SupporterUpsert},
};

#[derive(Debug, Error)]
pub enum IngestError<E>
where
  E: std::error::Error + 'static,
{
  #[error(transparent)]
  Invalid(#[from] ValidationError),

  #[error("site {0} is not reachable")]
  Unreachable(String),

  #[error("store error: {0}")]
  Store(#[source] E),
}

/// The result of a successful submission.
#[derive(Debug, Clone)]
pub struct Ingested {
  pub record:  SupporterRecord,
  /// `true` if this submission created the record.
  pub created: bool,
  /// The history period the submission was filed under.
  pub period:  String,
  pub event:   SupporterEvent,
}

pub struct Ingestor<S, P> {
  store: Arc<S>,
  probe: Arc<P>,
}

impl<S, P> Clone for Ingestor<S, P> {
  fn clone(&self) -> Self {
    Self { store: self.store.clone(), probe: self.probe.clone() }
  }
}

impl<S, P> Ingestor<S, P>
where
  S: SupporterStore,
  P: SiteProbe,
{
  pub fn new(store: Arc<S>, probe: Arc<P>) -> Self { Self { store, probe } }

  /// Ingest one submission received at `received_at`.
  ///
  /// Nothing is written unless the submission is valid and the site is
  /// reachable.
  pub async fn ingest<F>(
    &self,
    source: &F,
    received_at: DateTime<Utc>,
  ) -> Result<Ingested, IngestError<S::Error>>
  where
    F: FieldSource + Sync,
  {
    let submission = Submission::parse(source)?;

    if !self.probe.is_reachable(&submission.site_url).await {
      return Err(IngestError::Unreachable(submission.site_url));
    }

    let existing = self
      .store
      .find_by_host(&submission.host)
      .await
      .map_err(IngestError::Store)?;
    let created = existing.is_none();

    let period = week_key(received_at);
    let record = self
      .store
      .upsert_with_history(
        existing.map(|r| r.supporter_id),
        SupporterUpsert::from(&submission),
        period.clone(),
        HistoryEntry::from(&submission),
      )
      .await
      .map_err(IngestError::Store)?;

    let event = SupporterEvent::upserted(&record);
    Ok(Ingested { record, created, period, event })
  }
}
