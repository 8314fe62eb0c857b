//! In-memory doubles for the storage and remote traits, used by unit tests.

use std::{
  collections::{BTreeMap, HashMap},
  sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
  },
};

use chrono::{TimeZone, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::{
  Error,
  media::{MediaAsset, NewMediaAsset},
  remote::{FetchedImage, ScreenshotSource, SiteProbe},
  store::{CounterStore, MetricCounts, Store, SupporterStore},
  supporter::{HistoryEntry, SupporterRecord, SupporterStatus, SupporterUpsert},
  telemetry::Metric,
};

#[derive(Debug, Error)]
pub enum MemoryError {
  #[error("supporter not found: {0}")]
  NotFound(Uuid),
}

#[derive(Default)]
struct State {
  supporters: HashMap<Uuid, SupporterRecord>,
  history:    HashMap<Uuid, BTreeMap<String, HistoryEntry>>,
  media:      HashMap<Uuid, MediaAsset>,
  counters:   HashMap<(Metric, String, String), u64>,
}

impl State {
  fn upsert(
    &mut self,
    existing: Option<Uuid>,
    input: SupporterUpsert,
  ) -> Result<SupporterRecord, MemoryError> {
    let id = existing.or_else(|| {
      self.supporters
        .values()
        .find(|r| r.host == input.host)
        .map(|r| r.supporter_id)
    });

    let record = match id {
      Some(id) => {
        let record =
          self.supporters.get_mut(&id).ok_or(MemoryError::NotFound(id))?;
        record.host = input.host;
        record.site_url = input.site_url;
        record.site_lang = input.site_lang;
        record.repack_start = input.repack_start;
        record.repack_counter = input.repack_counter;
        record.repack_ratio = input.repack_ratio;
        if input.repack_coupon.is_some() {
          record.repack_coupon = input.repack_coupon;
        }
        record.repack_last_sent = input.repack_last_sent;
        record.created_at = input.created_at;
        record.modified_at = input.modified_at;
        record.clone()
      }
      None => {
        let record = SupporterRecord {
          supporter_id:     Uuid::new_v4(),
          host:             input.host,
          site_url:         input.site_url,
          site_lang:        input.site_lang,
          repack_start:     input.repack_start,
          repack_counter:   input.repack_counter,
          repack_ratio:     input.repack_ratio,
          repack_coupon:    input.repack_coupon,
          repack_last_sent: input.repack_last_sent,
          status:           SupporterStatus::Pending,
          image_id:         None,
          created_at:       input.created_at,
          modified_at:      input.modified_at,
        };
        self.supporters.insert(record.supporter_id, record.clone());
        record
      }
    };
    Ok(record)
  }
}

#[derive(Default)]
pub struct MemoryStore {
  state: Mutex<State>,
}

impl MemoryStore {
  fn with<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
    let mut state = self.state.lock().unwrap();
    f(&mut state)
  }
}

impl Store for MemoryStore {
  type Error = MemoryError;
}

impl SupporterStore for MemoryStore {
  async fn find_by_host<'a>(
    &'a self,
    host: &'a str,
  ) -> Result<Option<SupporterRecord>, MemoryError> {
    Ok(self.with(|s| {
      s.supporters.values().find(|r| r.host == host).cloned()
    }))
  }

  async fn get_supporter(
    &self,
    id: Uuid,
  ) -> Result<Option<SupporterRecord>, MemoryError> {
    Ok(self.with(|s| s.supporters.get(&id).cloned()))
  }

  async fn list_supporters(
    &self,
    status: Option<SupporterStatus>,
  ) -> Result<Vec<SupporterRecord>, MemoryError> {
    let mut out: Vec<_> = self.with(|s| {
      s.supporters
        .values()
        .filter(|r| status.is_none_or(|st| r.status == st))
        .cloned()
        .collect()
    });
    out.sort_by(|a, b| a.host.cmp(&b.host));
    Ok(out)
  }

  async fn upsert_supporter(
    &self,
    existing: Option<Uuid>,
    input: SupporterUpsert,
  ) -> Result<SupporterRecord, MemoryError> {
    self.with(|s| s.upsert(existing, input))
  }

  async fn upsert_with_history(
    &self,
    existing: Option<Uuid>,
    input: SupporterUpsert,
    period: String,
    entry: HistoryEntry,
  ) -> Result<SupporterRecord, MemoryError> {
    self.with(|s| {
      let record = s.upsert(existing, input)?;
      s.history.entry(record.supporter_id).or_default().insert(period, entry);
      Ok(record)
    })
  }

  async fn append_history(
    &self,
    supporter_id: Uuid,
    period: String,
    entry: HistoryEntry,
  ) -> Result<(), MemoryError> {
    self.with(|s| {
      s.history.entry(supporter_id).or_default().insert(period, entry);
    });
    Ok(())
  }

  async fn history(
    &self,
    supporter_id: Uuid,
  ) -> Result<BTreeMap<String, HistoryEntry>, MemoryError> {
    Ok(self.with(|s| s.history.get(&supporter_id).cloned().unwrap_or_default()))
  }

  async fn set_status(
    &self,
    supporter_id: Uuid,
    status: SupporterStatus,
  ) -> Result<Option<SupporterRecord>, MemoryError> {
    Ok(self.with(|s| {
      s.supporters.get_mut(&supporter_id).map(|r| {
        r.status = status;
        r.clone()
      })
    }))
  }

  async fn attach_image(
    &self,
    supporter_id: Uuid,
    asset: NewMediaAsset,
  ) -> Result<MediaAsset, MemoryError> {
    self.with(|s| {
      let record = s
        .supporters
        .get_mut(&supporter_id)
        .ok_or(MemoryError::NotFound(supporter_id))?;
      let stored = MediaAsset {
        asset_id: Uuid::new_v4(),
        supporter_id,
        title: asset.title,
        caption: asset.caption,
        alt_text: asset.alt_text,
        description: asset.description,
        media_type: asset.media_type,
        content_hash: String::new(),
        bytes: asset.bytes,
        created_at: Utc::now(),
      };
      record.image_id = Some(stored.asset_id);
      s.media.insert(stored.asset_id, stored.clone());
      Ok(stored)
    })
  }

  async fn get_media(
    &self,
    asset_id: Uuid,
  ) -> Result<Option<MediaAsset>, MemoryError> {
    Ok(self.with(|s| s.media.get(&asset_id).cloned()))
  }
}

impl CounterStore for MemoryStore {
  async fn increment(
    &self,
    metric: Metric,
    period: String,
    value: String,
  ) -> Result<u64, MemoryError> {
    Ok(self.with(|s| {
      let count = s.counters.entry((metric, period, value)).or_default();
      *count += 1;
      *count
    }))
  }

  async fn increment_batch(
    &self,
    period: String,
    increments: Vec<(Metric, String)>,
  ) -> Result<(), MemoryError> {
    self.with(|s| {
      for (metric, value) in increments {
        *s.counters.entry((metric, period.clone(), value)).or_default() += 1;
      }
    });
    Ok(())
  }

  async fn counts(&self, metric: Metric) -> Result<MetricCounts, MemoryError> {
    Ok(self.with(|s| {
      let mut out = MetricCounts::new();
      for ((m, period, value), count) in &s.counters {
        if *m == metric {
          out
            .entry(period.clone())
            .or_default()
            .insert(value.clone(), *count);
        }
      }
      out
    }))
  }
}

// ─── Remote stubs ────────────────────────────────────────────────────────────

pub struct StaticProbe(pub bool);

impl SiteProbe for StaticProbe {
  async fn is_reachable<'a>(&'a self, _url: &'a str) -> bool { self.0 }
}

/// A screenshot source answering every request the same way.
pub struct StubSource {
  content_type: Option<String>,
  fail:         bool,
  calls:        AtomicUsize,
}

impl StubSource {
  pub fn jpeg() -> Self { Self::with_content_type("image/jpeg") }

  pub fn with_content_type(content_type: &str) -> Self {
    Self {
      content_type: Some(content_type.to_owned()),
      fail:         false,
      calls:        AtomicUsize::new(0),
    }
  }

  pub fn failing() -> Self {
    Self { content_type: None, fail: true, calls: AtomicUsize::new(0) }
  }

  pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

impl ScreenshotSource for StubSource {
  async fn fetch<'a>(&'a self, _site_url: &'a str) -> crate::Result<FetchedImage> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if self.fail {
      return Err(Error::Transport("connection refused".into()));
    }
    Ok(FetchedImage {
      content_type: self.content_type.clone(),
      bytes:        vec![0xff, 0xd8, 0xff],
    })
  }
}

pub fn sample_upsert(host: &str) -> SupporterUpsert {
  let at = Utc.with_ymd_and_hms(2021, 11, 15, 12, 0, 0).unwrap();
  SupporterUpsert {
    host:             host.to_owned(),
    site_url:         format!("https://{host}/"),
    site_lang:        "en_US".into(),
    repack_start:     at.timestamp(),
    repack_counter:   "10".into(),
    repack_ratio:     "0.5".into(),
    repack_coupon:    None,
    repack_last_sent: at.timestamp(),
    created_at:       at,
    modified_at:      at,
  }
}
