//! Router tests against an in-memory SQLite store.

use std::sync::Arc;

use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use axum::{
  body::Body,
  http::{Request, StatusCode, header},
  response::Response,
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use rand_core::OsRng;
use repack_core::{
  event::SupporterEvent,
  media::NewMediaAsset,
  remote::SiteProbe,
  store::{CounterStore, SupporterStore},
  supporter::SupporterStatus,
  telemetry::Metric,
};
use repack_store_sqlite::SqliteStore;
use serde_json::Value;
use tokio::sync::broadcast;
use tower::ServiceExt as _;

use crate::{AppState, AuthConfig, api_router};

struct StaticProbe(bool);

impl SiteProbe for StaticProbe {
  async fn is_reachable<'a>(&'a self, _url: &'a str) -> bool { self.0 }
}

struct Harness {
  store:  Arc<SqliteStore>,
  state:  AppState<SqliteStore, StaticProbe>,
  events: broadcast::Receiver<SupporterEvent>,
}

async fn harness(reachable: bool) -> Harness {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let salt = SaltString::generate(&mut OsRng);
  let hash = Argon2::default()
    .hash_password(b"secret", &salt)
    .unwrap()
    .to_string();
  let (tx, rx) = broadcast::channel(16);

  let state = AppState::new(
    store.clone(),
    Arc::new(StaticProbe(reachable)),
    tx,
    AuthConfig { username: "admin".into(), password_hash: hash },
  );
  Harness { store, state, events: rx }
}

impl Harness {
  async fn send(&self, method: &str, uri: &str, headers: &[(header::HeaderName, &str)], body: &str) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    for (k, v) in headers {
      builder = builder.header(k, *v);
    }
    let req = builder.body(Body::from(body.to_owned())).unwrap();
    api_router(self.state.clone()).oneshot(req).await.unwrap()
  }

  async fn post_form(&self, body: &str) -> Response {
    self
      .send(
        "POST",
        "/",
        &[(header::CONTENT_TYPE, "application/x-www-form-urlencoded")],
        body,
      )
      .await
  }

  async fn post_json(&self, body: &str) -> Response {
    self
      .send(
        "POST",
        "/community/v1/sites",
        &[(header::CONTENT_TYPE, "application/json")],
        body,
      )
      .await
  }

  async fn get(&self, uri: &str) -> Response { self.send("GET", uri, &[], "").await }
}

async fn text(resp: Response) -> String {
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  String::from_utf8(bytes.to_vec()).unwrap()
}

async fn json(resp: Response) -> Value {
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  serde_json::from_slice(&bytes).unwrap()
}

fn basic(user: &str, pass: &str) -> String {
  format!("Basic {}", B64.encode(format!("{user}:{pass}")))
}

const LEGACY_SUBMISSION: &str = "action=repack-stats\
  &siteURL=https%3A%2F%2Fexample.com%2F&siteLang=en_US\
  &repackStart=1637000000&repackCounter=10&repackRatio=0.5\
  &repackLastSent=1637600000";

const JSON_SUBMISSION: &str = r#"{
  "site_url": "https://example.com/",
  "site_lang": "de_DE",
  "repack_start": 1637000000,
  "repack_counter": "10",
  "repack_ratio": "0.5",
  "repack_coupon": "SAVE10",
  "repack_last_sent": 1637600000
}"#;

// ─── Legacy supporter path ───────────────────────────────────────────────────

#[tokio::test]
async fn legacy_submission_creates_record_and_history() {
  let mut h = harness(true).await;

  let resp = h.post_form(LEGACY_SUBMISSION).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(text(resp).await, "Data submitted successfully. Status Code: 200");

  let record = h.store.find_by_host("example.com").await.unwrap().unwrap();
  assert_eq!(record.status, SupporterStatus::Pending);
  assert_eq!(record.site_lang, "en_US");
  assert_eq!(h.store.history(record.supporter_id).await.unwrap().len(), 1);

  let event = h.events.try_recv().unwrap();
  assert_eq!(event.needs_screenshot(), Some(record.supporter_id));
}

#[tokio::test]
async fn legacy_missing_field_is_rejected_without_writes() {
  let h = harness(true).await;
  let body = LEGACY_SUBMISSION.replace("&repackLastSent=1637600000", "");

  let resp = h.post_form(&body).await;
  assert_eq!(resp.status(), StatusCode::FORBIDDEN);
  assert_eq!(
    text(resp).await,
    "Missing required fields: repackLastSent. Status Code: 403"
  );
  assert!(h.store.list_supporters(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn legacy_missing_site_url_is_rejected() {
  let mut h = harness(true).await;
  let body = LEGACY_SUBMISSION.replace("&siteURL=https%3A%2F%2Fexample.com%2F", "");

  let resp = h.post_form(&body).await;
  assert_eq!(resp.status(), StatusCode::FORBIDDEN);
  assert_eq!(text(resp).await, "Missing required fields: siteURL. Status Code: 403");
  assert!(h.store.list_supporters(None).await.unwrap().is_empty());
  assert!(h.store.counts(Metric::PhpVersion).await.unwrap().is_empty());
  assert!(h.events.try_recv().is_err());
}

#[tokio::test]
async fn legacy_unreachable_site_is_rejected() {
  let mut h = harness(false).await;

  let resp = h.post_form(LEGACY_SUBMISSION).await;
  assert_eq!(resp.status(), StatusCode::FORBIDDEN);
  assert_eq!(text(resp).await, "We were unable to reach your site. Status Code: 403");
  assert!(h.store.list_supporters(None).await.unwrap().is_empty());
  assert!(h.events.try_recv().is_err());
}

#[tokio::test]
async fn legacy_other_action_is_not_handled() {
  let h = harness(true).await;
  let resp = h.post_form("action=something-else&siteURL=https%3A%2F%2Fx.org").await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ─── Legacy telemetry path ───────────────────────────────────────────────────

#[tokio::test]
async fn legacy_telemetry_updates_counters() {
  let h = harness(true).await;

  let resp = h
    .post_form(
      "action=repack-stats&siteID=abc&phpVer=8.1&themeName=Twenty\
       &fieldTypes%5B%5D=a&fieldTypes%5B%5D=a&fieldTypes%5B%5D=b",
    )
    .await;
  assert_eq!(resp.status(), StatusCode::OK);

  let php = h.store.counts(Metric::PhpVersion).await.unwrap();
  let (_, values) = php.iter().next().unwrap();
  assert_eq!(values["8.1"], 1);

  let all = h.store.counts(Metric::FieldTypesAll).await.unwrap();
  let (_, all) = all.iter().next().unwrap();
  assert_eq!((all["a"], all["b"]), (2, 1));

  let singles = h.store.counts(Metric::FieldTypesSingles).await.unwrap();
  let (_, singles) = singles.iter().next().unwrap();
  assert_eq!((singles["a"], singles["b"]), (1, 1));
}

#[tokio::test]
async fn legacy_spam_report_is_dropped_silently() {
  let h = harness(true).await;

  let resp = h
    .post_form("action=repack-stats&themeName=Readline+Child&phpVer=8.1")
    .await;
  assert_eq!(resp.status(), StatusCode::OK);

  assert!(h.store.counts(Metric::PhpVersion).await.unwrap().is_empty());
  assert!(h.store.counts(Metric::ThemeName).await.unwrap().is_empty());
}

// ─── REST submission ─────────────────────────────────────────────────────────

#[tokio::test]
async fn json_submission_is_accepted() {
  let mut h = harness(true).await;

  let resp = h.post_json(JSON_SUBMISSION).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json(resp).await["message"], "Data submitted successfully.");

  let record = h.store.find_by_host("example.com").await.unwrap().unwrap();
  assert_eq!(record.repack_start, 1_637_000_000);
  assert_eq!(record.repack_coupon.as_deref(), Some("SAVE10"));
  assert!(matches!(
    h.events.try_recv().unwrap(),
    SupporterEvent::Upserted { has_image: false, .. }
  ));
}

#[tokio::test]
async fn json_missing_fields_are_itemized() {
  let h = harness(true).await;

  let resp = h
    .post_json(r#"{"site_url": "https://example.com/", "site_lang": null}"#)
    .await;
  assert_eq!(resp.status(), StatusCode::FORBIDDEN);

  let body = json(resp).await;
  assert_eq!(body["code"], "invalid_request");
  assert_eq!(body["data"]["status"], 403);
  assert_eq!(
    body["data"]["missing"],
    serde_json::json!([
      "site_lang",
      "repack_start",
      "repack_counter",
      "repack_ratio",
      "repack_last_sent"
    ])
  );
  assert!(body["message"].as_str().unwrap().starts_with("Missing required fields: site_lang"));
  assert!(h.store.list_supporters(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn json_body_that_is_not_an_object_lists_every_field() {
  let h = harness(true).await;
  let resp = h.post_json("[1, 2, 3]").await;
  assert_eq!(resp.status(), StatusCode::FORBIDDEN);
  assert_eq!(json(resp).await["data"]["missing"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn json_unreachable_site_is_rejected() {
  let h = harness(false).await;
  let resp = h.post_json(JSON_SUBMISSION).await;
  assert_eq!(resp.status(), StatusCode::FORBIDDEN);
  assert_eq!(json(resp).await["message"], "We were unable to reach your site.");
}

// ─── Reads ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_and_get_sites() {
  let h = harness(true).await;
  h.post_json(JSON_SUBMISSION).await;

  let list = json(h.get("/community/v1/sites").await).await;
  assert_eq!(list.as_array().unwrap().len(), 1);
  assert_eq!(list[0]["status"], "pending");

  let published = json(h.get("/community/v1/sites?status=published").await).await;
  assert!(published.as_array().unwrap().is_empty());

  let detail = json(h.get("/community/v1/sites/example.com").await).await;
  assert_eq!(detail["host"], "example.com");
  assert_eq!(detail["history"].as_object().unwrap().len(), 1);

  let missing = h.get("/community/v1/sites/unknown.org").await;
  assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn screenshot_is_served_once_attached() {
  let h = harness(true).await;
  h.post_json(JSON_SUBMISSION).await;

  let resp = h.get("/community/v1/sites/example.com/screenshot").await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);

  let record = h.store.find_by_host("example.com").await.unwrap().unwrap();
  h.store
    .attach_image(
      record.supporter_id,
      NewMediaAsset::titled("example.com", "image/jpeg", vec![0xff, 0xd8]),
    )
    .await
    .unwrap();

  let resp = h.get("/community/v1/sites/example.com/screenshot").await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/jpeg");
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  assert_eq!(&bytes[..], &[0xff, 0xd8]);
}

#[tokio::test]
async fn stats_by_metric() {
  let h = harness(true).await;
  h.post_form("action=repack-stats&fieldTypes%5B%5D=text&fieldTypes%5B%5D=text")
    .await;

  let body = json(h.get("/community/v1/stats/field_types/all").await).await;
  assert_eq!(body["metric"], "field_types/all");
  let periods = body["periods"].as_object().unwrap();
  let (_, values) = periods.iter().next().unwrap();
  assert_eq!(values["text"], 2);

  let unknown = h.get("/community/v1/stats/plugins").await;
  assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

// ─── Admin ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn status_change_requires_credentials() {
  let h = harness(true).await;
  h.post_json(JSON_SUBMISSION).await;
  let uri = "/community/v1/sites/example.com/status";
  let ct = (header::CONTENT_TYPE, "application/json");

  let resp = h.send("PUT", uri, &[ct.clone()], r#"{"status":"published"}"#).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));

  let auth = basic("admin", "secret");
  let resp = h
    .send(
      "PUT",
      uri,
      &[ct, (header::AUTHORIZATION, auth.as_str())],
      r#"{"status":"published"}"#,
    )
    .await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json(resp).await["status"], "published");

  // A later submission keeps the administrator's decision.
  h.post_json(JSON_SUBMISSION).await;
  let record = h.store.find_by_host("example.com").await.unwrap().unwrap();
  assert_eq!(record.status, SupporterStatus::Published);
}

#[tokio::test]
async fn status_change_publishes_event_for_screenshot() {
  let mut h = harness(true).await;
  h.post_json(JSON_SUBMISSION).await;
  let record = h.store.find_by_host("example.com").await.unwrap().unwrap();
  h.events.try_recv().unwrap();

  let auth = basic("admin", "secret");
  let resp = h
    .send(
      "PUT",
      "/community/v1/sites/example.com/status",
      &[
        (header::CONTENT_TYPE, "application/json"),
        (header::AUTHORIZATION, auth.as_str()),
      ],
      r#"{"status":"published"}"#,
    )
    .await;
  assert_eq!(resp.status(), StatusCode::OK);

  let event = h.events.try_recv().unwrap();
  assert!(matches!(
    event,
    SupporterEvent::StatusChanged { status: SupporterStatus::Published, .. }
  ));
  assert_eq!(event.needs_screenshot(), Some(record.supporter_id));
}
