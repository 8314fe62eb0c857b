//! Encoding and decoding helpers between domain types and the column
//! representations stored in SQLite.
//!
//! Timestamps are RFC 3339 strings, UUIDs hyphenated lowercase strings and
//! statuses their lowercase names. Image bytes are stored as a BLOB.

use std::str::FromStr as _;

use chrono::{DateTime, Utc};
use repack_core::{
  media::MediaAsset,
  supporter::{HistoryEntry, SupporterRecord, SupporterStatus},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn decode_status(s: &str) -> Result<SupporterStatus> {
  SupporterStatus::from_str(s)
    .map_err(|_| repack_core::Error::UnknownStatus(s.to_owned()).into())
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawSupporter::from_row`].
pub const SUPPORTER_COLUMNS: &str = "supporter_id, host, site_url, site_lang, \
   repack_start, repack_counter, repack_ratio, repack_coupon, \
   repack_last_sent, status, image_id, created_at, modified_at";

/// Raw values read directly from a `supporters` row.
pub struct RawSupporter {
  pub supporter_id:     String,
  pub host:             String,
  pub site_url:         String,
  pub site_lang:        String,
  pub repack_start:     i64,
  pub repack_counter:   String,
  pub repack_ratio:     String,
  pub repack_coupon:    Option<String>,
  pub repack_last_sent: i64,
  pub status:           String,
  pub image_id:         Option<String>,
  pub created_at:       String,
  pub modified_at:      String,
}

impl RawSupporter {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      supporter_id:     row.get(0)?,
      host:             row.get(1)?,
      site_url:         row.get(2)?,
      site_lang:        row.get(3)?,
      repack_start:     row.get(4)?,
      repack_counter:   row.get(5)?,
      repack_ratio:     row.get(6)?,
      repack_coupon:    row.get(7)?,
      repack_last_sent: row.get(8)?,
      status:           row.get(9)?,
      image_id:         row.get(10)?,
      created_at:       row.get(11)?,
      modified_at:      row.get(12)?,
    })
  }

  pub fn into_record(self) -> Result<SupporterRecord> {
    Ok(SupporterRecord {
      supporter_id:     decode_uuid(&self.supporter_id)?,
      host:             self.host,
      site_url:         self.site_url,
      site_lang:        self.site_lang,
      repack_start:     self.repack_start,
      repack_counter:   self.repack_counter,
      repack_ratio:     self.repack_ratio,
      repack_coupon:    self.repack_coupon,
      repack_last_sent: self.repack_last_sent,
      status:           decode_status(&self.status)?,
      image_id:         self.image_id.as_deref().map(decode_uuid).transpose()?,
      created_at:       decode_dt(&self.created_at)?,
      modified_at:      decode_dt(&self.modified_at)?,
    })
  }
}

pub fn history_from_row(
  row: &rusqlite::Row<'_>,
) -> rusqlite::Result<(String, HistoryEntry)> {
  Ok((row.get(0)?, HistoryEntry {
    repack_start:     row.get(1)?,
    repack_last_sent: row.get(2)?,
    repack_counter:   row.get(3)?,
    repack_ratio:     row.get(4)?,
  }))
}

/// Raw values read directly from a `media_assets` row.
pub struct RawMedia {
  pub asset_id:     String,
  pub supporter_id: String,
  pub title:        String,
  pub caption:      String,
  pub alt_text:     String,
  pub description:  String,
  pub media_type:   String,
  pub content_hash: String,
  pub bytes:        Vec<u8>,
  pub created_at:   String,
}

impl RawMedia {
  pub fn into_asset(self) -> Result<MediaAsset> {
    Ok(MediaAsset {
      asset_id:     decode_uuid(&self.asset_id)?,
      supporter_id: decode_uuid(&self.supporter_id)?,
      title:        self.title,
      caption:      self.caption,
      alt_text:     self.alt_text,
      description:  self.description,
      media_type:   self.media_type,
      content_hash: self.content_hash,
      bytes:        self.bytes,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}
