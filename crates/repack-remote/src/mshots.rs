//! Client for the mShots screenshot rendering service.
//!
//! A rendering is requested with `GET {endpoint}{urlencoded site}?w={width}`.
//! While a rendering is still in progress the service answers with a
//! placeholder that is not `image/jpeg`, which the caller treats as a failed
//! attempt.

use std::time::Duration;

use repack_core::remote::{FetchedImage, ScreenshotSource};
use reqwest::{Client, header::CONTENT_TYPE};
use tracing::debug;
use url::{Url, form_urlencoded};

use crate::Result;

pub const DEFAULT_ENDPOINT: &str = "https://s0.wordpress.com/mshots/v1/";
pub const DEFAULT_WIDTH: u32 = 1600;

#[derive(Clone)]
pub struct MshotsClient {
  client:   Client,
  endpoint: Url,
  width:    u32,
}

impl MshotsClient {
  pub fn new(endpoint: &str, width: u32, timeout: Duration) -> Result<Self> {
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self { client, endpoint: Url::parse(endpoint)?, width })
  }

  /// The rendering URL for `site_url`. The whole site URL is form-encoded
  /// into a single path segment.
  pub fn screenshot_url(&self, site_url: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(site_url.as_bytes()).collect();
    format!("{}{}?w={}", self.endpoint, encoded, self.width)
  }
}

impl ScreenshotSource for MshotsClient {
  async fn fetch<'a>(&'a self, site_url: &'a str) -> repack_core::Result<FetchedImage> {
    let url = self.screenshot_url(site_url);
    let resp = self.client.get(&url).send().await.map_err(crate::Error::from)?;

    let content_type = resp
      .headers()
      .get(CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .map(str::to_owned);
    debug!(%url, status = %resp.status(), ?content_type, "screenshot response");

    let bytes = resp.bytes().await.map_err(crate::Error::from)?;
    Ok(FetchedImage { content_type, bytes: bytes.to_vec() })
  }
}
