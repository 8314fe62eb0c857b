//! Media assets: screenshots attached to supporter records.
//!
//! Image bytes are stored alongside their metadata; the SHA-256 digest is
//! computed by the storage backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored image and its descriptive metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAsset {
  pub asset_id:     Uuid,
  pub supporter_id: Uuid,
  pub title:        String,
  pub caption:      String,
  pub alt_text:     String,
  pub description:  String,
  pub media_type:   String,
  /// Hex-encoded SHA-256 of `bytes`.
  pub content_hash: String,
  #[serde(skip)]
  pub bytes:        Vec<u8>,
  pub created_at:   DateTime<Utc>,
}

/// Input to [`crate::store::SupporterStore::attach_image`].
#[derive(Debug, Clone)]
pub struct NewMediaAsset {
  pub title:       String,
  pub caption:     String,
  pub alt_text:    String,
  pub description: String,
  pub media_type:  String,
  pub bytes:       Vec<u8>,
}

impl NewMediaAsset {
  /// An asset whose title, caption, alt text and description are all
  /// `title`.
  pub fn titled(
    title: &str,
    media_type: impl Into<String>,
    bytes: Vec<u8>,
  ) -> Self {
    Self {
      title: title.to_owned(),
      caption: title.to_owned(),
      alt_text: title.to_owned(),
      description: title.to_owned(),
      media_type: media_type.into(),
      bytes,
    }
  }
}
