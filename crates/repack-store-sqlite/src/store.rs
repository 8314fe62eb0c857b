//! [`SqliteStore`], the SQLite implementation of [`SupporterStore`] and
//! [`CounterStore`].

use std::{collections::BTreeMap, path::Path};

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use repack_core::{
  media::{MediaAsset, NewMediaAsset},
  store::{CounterStore, MetricCounts, Store, SupporterStore},
  supporter::{HistoryEntry, SupporterRecord, SupporterStatus, SupporterUpsert},
  telemetry::Metric,
};

use crate::{
  Error, Result,
  encode::{
    RawMedia, RawSupporter, SUPPORTER_COLUMNS, encode_dt, encode_uuid,
    history_from_row,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A RePack store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

impl Store for SqliteStore {
  type Error = Error;
}

// ─── SupporterStore impl ─────────────────────────────────────────────────────

impl SupporterStore for SqliteStore {
  async fn find_by_host<'a>(
    &'a self,
    host: &'a str,
  ) -> Result<Option<SupporterRecord>> {
    let host = host.to_owned();
    let raw: Option<RawSupporter> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {SUPPORTER_COLUMNS} FROM supporters WHERE host = ?1"),
            rusqlite::params![host],
            RawSupporter::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawSupporter::into_record).transpose()
  }

  async fn get_supporter(&self, id: Uuid) -> Result<Option<SupporterRecord>> {
    let id_str = encode_uuid(id);
    let raw: Option<RawSupporter> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {SUPPORTER_COLUMNS} FROM supporters WHERE supporter_id = ?1"
            ),
            rusqlite::params![id_str],
            RawSupporter::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawSupporter::into_record).transpose()
  }

  async fn list_supporters(
    &self,
    status: Option<SupporterStatus>,
  ) -> Result<Vec<SupporterRecord>> {
    let status_str = status.map(|s| s.to_string());

    let raws: Vec<RawSupporter> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SUPPORTER_COLUMNS} FROM supporters
           WHERE ?1 IS NULL OR status = ?1
           ORDER BY host"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![status_str], RawSupporter::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSupporter::into_record).collect()
  }

  async fn upsert_supporter(
    &self,
    existing: Option<Uuid>,
    input: SupporterUpsert,
  ) -> Result<SupporterRecord> {
    let raw = self
      .conn
      .call(move |conn| Ok(write_supporter(conn, existing, &input)?))
      .await?;

    raw
      .ok_or(Error::SupporterNotFound(existing.unwrap_or_default()))?
      .into_record()
  }

  async fn append_history(
    &self,
    supporter_id: Uuid,
    period: String,
    entry: HistoryEntry,
  ) -> Result<()> {
    let id_str = encode_uuid(supporter_id);

    self
      .conn
      .call(move |conn| {
        write_history(conn, &id_str, &period, &entry)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn upsert_with_history(
    &self,
    existing: Option<Uuid>,
    input: SupporterUpsert,
    period: String,
    entry: HistoryEntry,
  ) -> Result<SupporterRecord> {
    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let Some(raw) = write_supporter(&tx, existing, &input)? else {
          return Ok(None);
        };
        write_history(&tx, &raw.supporter_id, &period, &entry)?;
        tx.commit()?;
        Ok(Some(raw))
      })
      .await?;

    raw
      .ok_or(Error::SupporterNotFound(existing.unwrap_or_default()))?
      .into_record()
  }

  async fn history(
    &self,
    supporter_id: Uuid,
  ) -> Result<BTreeMap<String, HistoryEntry>> {
    let id_str = encode_uuid(supporter_id);

    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT period, repack_start, repack_last_sent, repack_counter, repack_ratio
           FROM supporter_history WHERE supporter_id = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], history_from_row)?
          .collect::<rusqlite::Result<BTreeMap<_, _>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  async fn set_status(
    &self,
    supporter_id: Uuid,
    status: SupporterStatus,
  ) -> Result<Option<SupporterRecord>> {
    let id_str     = encode_uuid(supporter_id);
    let status_str = status.to_string();

    let raw: Option<RawSupporter> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "UPDATE supporters SET status = ?2 WHERE supporter_id = ?1
               RETURNING {SUPPORTER_COLUMNS}"
            ),
            rusqlite::params![id_str, status_str],
            RawSupporter::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawSupporter::into_record).transpose()
  }

  async fn attach_image(
    &self,
    supporter_id: Uuid,
    asset: NewMediaAsset,
  ) -> Result<MediaAsset> {
    let stored = MediaAsset {
      asset_id: Uuid::new_v4(),
      supporter_id,
      content_hash: hex::encode(Sha256::digest(&asset.bytes)),
      title: asset.title,
      caption: asset.caption,
      alt_text: asset.alt_text,
      description: asset.description,
      media_type: asset.media_type,
      bytes: asset.bytes,
      created_at: Utc::now(),
    };

    let asset_id_str     = encode_uuid(stored.asset_id);
    let supporter_id_str = encode_uuid(supporter_id);
    let at_str           = encode_dt(stored.created_at);
    let row              = stored.clone();

    let attached: bool = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let exists = tx
          .query_row(
            "SELECT 1 FROM supporters WHERE supporter_id = ?1",
            rusqlite::params![supporter_id_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !exists {
          return Ok(false);
        }

        tx.execute(
          "INSERT INTO media_assets (
             asset_id, supporter_id, title, caption, alt_text, description,
             media_type, content_hash, bytes, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
          rusqlite::params![
            asset_id_str,
            supporter_id_str,
            row.title,
            row.caption,
            row.alt_text,
            row.description,
            row.media_type,
            row.content_hash,
            row.bytes,
            at_str,
          ],
        )?;
        tx.execute(
          "UPDATE supporters SET image_id = ?2 WHERE supporter_id = ?1",
          rusqlite::params![supporter_id_str, asset_id_str],
        )?;

        tx.commit()?;
        Ok(true)
      })
      .await?;

    if !attached {
      return Err(Error::SupporterNotFound(supporter_id));
    }
    Ok(stored)
  }

  async fn get_media(&self, asset_id: Uuid) -> Result<Option<MediaAsset>> {
    let id_str = encode_uuid(asset_id);

    let raw: Option<RawMedia> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT asset_id, supporter_id, title, caption, alt_text,
                    description, media_type, content_hash, bytes, created_at
             FROM media_assets WHERE asset_id = ?1",
            rusqlite::params![id_str],
            |row| {
              Ok(RawMedia {
                asset_id:     row.get(0)?,
                supporter_id: row.get(1)?,
                title:        row.get(2)?,
                caption:      row.get(3)?,
                alt_text:     row.get(4)?,
                description:  row.get(5)?,
                media_type:   row.get(6)?,
                content_hash: row.get(7)?,
                bytes:        row.get(8)?,
                created_at:   row.get(9)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawMedia::into_asset).transpose()
  }
}

// ─── CounterStore impl ───────────────────────────────────────────────────────

const INCREMENT_SQL: &str = "
  INSERT INTO counters (metric, period, value, count) VALUES (?1, ?2, ?3, 1)
  ON CONFLICT(metric, period, value) DO UPDATE SET count = count + 1
  RETURNING count";

impl CounterStore for SqliteStore {
  async fn increment(
    &self,
    metric: Metric,
    period: String,
    value: String,
  ) -> Result<u64> {
    let metric_str = metric.to_string();

    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          INCREMENT_SQL,
          rusqlite::params![metric_str, period, value],
          |r| r.get(0),
        )?)
      })
      .await?;

    Ok(count.max(0) as u64)
  }

  async fn increment_batch(
    &self,
    period: String,
    increments: Vec<(Metric, String)>,
  ) -> Result<()> {
    if increments.is_empty() {
      return Ok(());
    }

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare_cached(INCREMENT_SQL)?;
          for (metric, value) in &increments {
            stmt.query_row(
              rusqlite::params![metric.as_ref(), period, value],
              |r| r.get::<_, i64>(0),
            )?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn counts(&self, metric: Metric) -> Result<MetricCounts> {
    let metric_str = metric.to_string();

    let rows: Vec<(String, String, i64)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT period, value, count FROM counters WHERE metric = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![metric_str], |r| {
            Ok((r.get(0)?, r.get(1)?, r.get(2)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut out = MetricCounts::new();
    for (period, value, count) in rows {
      out
        .entry(period)
        .or_default()
        .insert(value, count.max(0) as u64);
    }
    Ok(out)
  }
}

// ─── Statements ──────────────────────────────────────────────────────────────

/// Update the record `existing`, or create one for `input.host`. A create
/// racing another create for the same host becomes an update of the row that
/// won. Returns `None` if `existing` names no record.
fn write_supporter(
  conn: &rusqlite::Connection,
  existing: Option<Uuid>,
  input: &SupporterUpsert,
) -> rusqlite::Result<Option<RawSupporter>> {
  let created_str  = encode_dt(input.created_at);
  let modified_str = encode_dt(input.modified_at);

  match existing {
    Some(id) => conn
      .query_row(
        &format!(
          "UPDATE supporters SET
             host             = ?2,
             site_url         = ?3,
             site_lang        = ?4,
             repack_start     = ?5,
             repack_counter   = ?6,
             repack_ratio     = ?7,
             repack_coupon    = COALESCE(?8, repack_coupon),
             repack_last_sent = ?9,
             created_at       = ?10,
             modified_at      = ?11
           WHERE supporter_id = ?1
           RETURNING {SUPPORTER_COLUMNS}"
        ),
        rusqlite::params![
          encode_uuid(id),
          input.host,
          input.site_url,
          input.site_lang,
          input.repack_start,
          input.repack_counter,
          input.repack_ratio,
          input.repack_coupon,
          input.repack_last_sent,
          created_str,
          modified_str,
        ],
        RawSupporter::from_row,
      )
      .optional(),
    None => conn
      .query_row(
        &format!(
          "INSERT INTO supporters (
             supporter_id, host, site_url, site_lang, repack_start,
             repack_counter, repack_ratio, repack_coupon, repack_last_sent,
             created_at, modified_at, status
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
           ON CONFLICT(host) DO UPDATE SET
             site_url         = excluded.site_url,
             site_lang        = excluded.site_lang,
             repack_start     = excluded.repack_start,
             repack_counter   = excluded.repack_counter,
             repack_ratio     = excluded.repack_ratio,
             repack_coupon    = COALESCE(excluded.repack_coupon, supporters.repack_coupon),
             repack_last_sent = excluded.repack_last_sent,
             created_at       = excluded.created_at,
             modified_at      = excluded.modified_at
           RETURNING {SUPPORTER_COLUMNS}"
        ),
        rusqlite::params![
          encode_uuid(Uuid::new_v4()),
          input.host,
          input.site_url,
          input.site_lang,
          input.repack_start,
          input.repack_counter,
          input.repack_ratio,
          input.repack_coupon,
          input.repack_last_sent,
          created_str,
          modified_str,
          SupporterStatus::Pending.to_string(),
        ],
        RawSupporter::from_row,
      )
      .map(Some),
  }
}

/// Write the history entry for `period`, replacing an earlier one.
fn write_history(
  conn: &rusqlite::Connection,
  supporter_id: &str,
  period: &str,
  entry: &HistoryEntry,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO supporter_history (
       supporter_id, period, repack_start, repack_last_sent,
       repack_counter, repack_ratio
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
     ON CONFLICT(supporter_id, period) DO UPDATE SET
       repack_start     = excluded.repack_start,
       repack_last_sent = excluded.repack_last_sent,
       repack_counter   = excluded.repack_counter,
       repack_ratio     = excluded.repack_ratio",
    rusqlite::params![
      supporter_id,
      period,
      entry.repack_start,
      entry.repack_last_sent,
      entry.repack_counter,
      entry.repack_ratio,
    ],
  )?;
  Ok(())
}
