//! Supporter records, one per reporting site, and their weekly history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{sanitize::strip_all_tags, submission::Submission};

// ─── Status ──────────────────────────────────────────────────────────────────

/// Publication status of a supporter. New records start as `Pending`; every
/// other transition is made by an administrator, never by ingestion.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SupporterStatus {
  #[default]
  Pending,
  Published,
  Expired,
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// The stored state of a supporter site. At most one record exists per host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupporterRecord {
  pub supporter_id:     Uuid,
  pub host:             String,
  pub site_url:         String,
  pub site_lang:        String,
  pub repack_start:     i64,
  pub repack_counter:   String,
  pub repack_ratio:     String,
  pub repack_coupon:    Option<String>,
  pub repack_last_sent: i64,
  pub status:           SupporterStatus,
  /// The screenshot attached to this record, if any.
  pub image_id:         Option<Uuid>,
  /// Backdated to the site's own `repack_start`.
  pub created_at:       DateTime<Utc>,
  /// Backdated to the site's own `repack_last_sent`.
  pub modified_at:      DateTime<Utc>,
}

impl SupporterRecord {
  /// Title used for the record and for its screenshot's metadata.
  pub fn display_title(&self) -> &str { &self.host }

  pub fn has_image(&self) -> bool { self.image_id.is_some() }
}

// ─── Upsert input ────────────────────────────────────────────────────────────

/// Input to [`crate::store::SupporterStore::upsert_supporter`].
///
/// `status` and `image_id` are not part of the input: creation always yields
/// `Pending` and updates never touch either.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupporterUpsert {
  pub host:             String,
  pub site_url:         String,
  pub site_lang:        String,
  pub repack_start:     i64,
  pub repack_counter:   String,
  pub repack_ratio:     String,
  /// `None` keeps whatever coupon is already stored.
  pub repack_coupon:    Option<String>,
  pub repack_last_sent: i64,
  pub created_at:       DateTime<Utc>,
  pub modified_at:      DateTime<Utc>,
}

impl From<&Submission> for SupporterUpsert {
  fn from(s: &Submission) -> Self {
    Self {
      host:             strip_all_tags(&s.host),
      site_url:         strip_all_tags(&s.site_url),
      site_lang:        s.site_lang.clone(),
      repack_start:     s.repack_start,
      repack_counter:   s.repack_counter.clone(),
      repack_ratio:     s.repack_ratio.clone(),
      repack_coupon:    s.repack_coupon.clone(),
      repack_last_sent: s.repack_last_sent,
      created_at:       s.started_at(),
      modified_at:      s.last_sent_at(),
    }
  }
}

// ─── History ─────────────────────────────────────────────────────────────────

/// Snapshot of a supporter's counters for one week. A later submission in the
/// same week replaces the earlier snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
  pub repack_start:     i64,
  pub repack_last_sent: i64,
  pub repack_counter:   String,
  pub repack_ratio:     String,
}

impl From<&Submission> for HistoryEntry {
  fn from(s: &Submission) -> Self {
    Self {
      repack_start:     s.repack_start,
      repack_last_sent: s.repack_last_sent,
      repack_counter:   s.repack_counter.clone(),
      repack_ratio:     s.repack_ratio.clone(),
    }
  }
}

#[cfg(test)]
mod tests {
  use std::str::FromStr;

  use super::*;

  #[test]
  fn status_round_trips_through_strings() {
    assert_eq!(SupporterStatus::Published.to_string(), "published");
    assert_eq!(
      SupporterStatus::from_str("expired").unwrap(),
      SupporterStatus::Expired
    );
    assert!(SupporterStatus::from_str("draft").is_err());
  }
}
