//! Reachability probe for submitted site URLs.

use std::time::Duration;

use repack_core::remote::SiteProbe;
use reqwest::{Client, StatusCode, header::REFERER, redirect::Policy};
use tracing::debug;

use crate::Result;

/// Redirect hops followed before giving up.
pub const MAX_REDIRECTS: usize = 5;

/// Answers whether a site responds `200 OK` to a plain GET.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HttpProbe {
  client:  Client,
  referer: String,
}

impl HttpProbe {
  /// `referer` is sent with every probe so site owners can tell where the
  /// request came from.
  pub fn new(referer: impl Into<String>, timeout: Duration) -> Result<Self> {
    let client = Client::builder()
      .timeout(timeout)
      .redirect(Policy::limited(MAX_REDIRECTS))
      .build()?;
    Ok(Self { client, referer: referer.into() })
  }
}

impl SiteProbe for HttpProbe {
  async fn is_reachable<'a>(&'a self, url: &'a str) -> bool {
    let result = self
      .client
      .get(url)
      .header(REFERER, &self.referer)
      .send()
      .await;

    match result {
      Ok(resp) => {
        debug!(url, status = %resp.status(), "probe answered");
        resp.status() == StatusCode::OK
      }
      Err(e) => {
        debug!(url, error = %e, "probe failed");
        false
      }
    }
  }
}
