//! Storage traits for supporter records and aggregate counters.
//!
//! The traits are implemented by storage backends (e.g.
//! `repack-store-sqlite`). Ingestion, the HTTP layer and the screenshot
//! worker depend on these abstractions, not on any concrete backend.

use std::{collections::BTreeMap, future::Future};

use uuid::Uuid;

use crate::{
  media::{MediaAsset, NewMediaAsset},
  supporter::{HistoryEntry, SupporterRecord, SupporterStatus, SupporterUpsert},
  telemetry::Metric,
};

/// Counters of one metric: period key → value → count.
pub type MetricCounts = BTreeMap<String, BTreeMap<String, u64>>;

/// The error type shared by every storage trait of a backend.
pub trait Store: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;
}

// ─── Supporters ──────────────────────────────────────────────────────────────

/// Per-site supporter records, their weekly history and their screenshots.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait SupporterStore: Store {
  /// Exact lookup by site host. Returns `None` if no record exists.
  fn find_by_host<'a>(
    &'a self,
    host: &'a str,
  ) -> impl Future<Output = Result<Option<SupporterRecord>, Self::Error>> + Send + 'a;

  fn get_supporter(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<SupporterRecord>, Self::Error>> + Send + '_;

  /// List records ordered by host, optionally filtered by status.
  fn list_supporters(
    &self,
    status: Option<SupporterStatus>,
  ) -> impl Future<Output = Result<Vec<SupporterRecord>, Self::Error>> + Send + '_;

  /// Create or update the record for `input.host`.
  ///
  /// - `existing: None` creates a `Pending` record, or updates the record for
  ///   the same host if one was created concurrently.
  /// - `existing: Some(id)` updates that record; an error if it is gone.
  ///
  /// Updates keep `status` and `image_id`, and keep the stored coupon when
  /// `input.repack_coupon` is `None`.
  fn upsert_supporter(
    &self,
    existing: Option<Uuid>,
    input: SupporterUpsert,
  ) -> impl Future<Output = Result<SupporterRecord, Self::Error>> + Send + '_;

  /// Write the history entry for `period`, replacing any earlier entry for
  /// the same period.
  fn append_history(
    &self,
    supporter_id: Uuid,
    period: String,
    entry: HistoryEntry,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// [`upsert_supporter`](Self::upsert_supporter) followed by
  /// [`append_history`](Self::append_history) for the resulting record, as
  /// one atomic write: either both land or neither does.
  fn upsert_with_history(
    &self,
    existing: Option<Uuid>,
    input: SupporterUpsert,
    period: String,
    entry: HistoryEntry,
  ) -> impl Future<Output = Result<SupporterRecord, Self::Error>> + Send + '_;

  /// All history entries of a supporter, keyed by period.
  fn history(
    &self,
    supporter_id: Uuid,
  ) -> impl Future<Output = Result<BTreeMap<String, HistoryEntry>, Self::Error>>
  + Send
  + '_;

  /// Change a record's status. Returns `None` if the record does not exist.
  fn set_status(
    &self,
    supporter_id: Uuid,
    status: SupporterStatus,
  ) -> impl Future<Output = Result<Option<SupporterRecord>, Self::Error>> + Send + '_;

  /// Store `asset` and make it the record's image, atomically.
  fn attach_image(
    &self,
    supporter_id: Uuid,
    asset: NewMediaAsset,
  ) -> impl Future<Output = Result<MediaAsset, Self::Error>> + Send + '_;

  fn get_media(
    &self,
    asset_id: Uuid,
  ) -> impl Future<Output = Result<Option<MediaAsset>, Self::Error>> + Send + '_;
}

// ─── Counters ────────────────────────────────────────────────────────────────

/// Global monotonically increasing counters keyed by (metric, period, value).
///
/// Increments are atomic in the backend; concurrent reports never lose
/// updates.
pub trait CounterStore: Store {
  /// Add one to a counter, creating it at zero first. Returns the new count.
  fn increment(
    &self,
    metric: Metric,
    period: String,
    value: String,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Apply every increment of one report in a single transaction.
  fn increment_batch(
    &self,
    period: String,
    increments: Vec<(Metric, String)>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn counts(
    &self,
    metric: Metric,
  ) -> impl Future<Output = Result<MetricCounts, Self::Error>> + Send + '_;
}
