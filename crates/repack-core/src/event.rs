//! Domain events published after supporter records change.

use serde::Serialize;
use uuid::Uuid;

use crate::supporter::{SupporterRecord, SupporterStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SupporterEvent {
  /// A record was created or updated by a valid submission.
  Upserted {
    supporter_id: Uuid,
    status:       SupporterStatus,
    has_image:    bool,
  },
  /// An administrator changed a record's status.
  StatusChanged {
    supporter_id: Uuid,
    status:       SupporterStatus,
    has_image:    bool,
  },
}

impl SupporterEvent {
  pub fn upserted(record: &SupporterRecord) -> Self {
    Self::Upserted {
      supporter_id: record.supporter_id,
      status:       record.status,
      has_image:    record.has_image(),
    }
  }

  pub fn status_changed(record: &SupporterRecord) -> Self {
    Self::StatusChanged {
      supporter_id: record.supporter_id,
      status:       record.status,
      has_image:    record.has_image(),
    }
  }

  pub fn supporter_id(&self) -> Uuid {
    match self {
      Self::Upserted { supporter_id, .. } | Self::StatusChanged { supporter_id, .. } => {
        *supporter_id
      }
    }
  }

  /// The supporter that still needs a screenshot, if this event calls for
  /// one.
  pub fn needs_screenshot(&self) -> Option<Uuid> {
    match self {
      Self::Upserted { supporter_id, has_image: false, .. }
      | Self::StatusChanged { supporter_id, has_image: false, .. } => {
        Some(*supporter_id)
      }
      _ => None,
    }
  }
}
