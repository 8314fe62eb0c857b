//! Outbound HTTP seams: the reachability probe and the screenshot service.
//!
//! Implemented with `reqwest` in `repack-remote`; tests substitute stubs.

use std::future::Future;

use crate::Result;

/// Checks whether a submitted site answers publicly.
pub trait SiteProbe: Send + Sync {
  /// `true` only if a GET to `url` completes and answers `200 OK`.
  fn is_reachable<'a>(
    &'a self,
    url: &'a str,
  ) -> impl Future<Output = bool> + Send + 'a;
}

/// The raw response of a screenshot request.
#[derive(Debug, Clone, Default)]
pub struct FetchedImage {
  pub content_type: Option<String>,
  pub bytes:        Vec<u8>,
}

/// Renders a screenshot of a site.
pub trait ScreenshotSource: Send + Sync {
  /// Request a rendering of `site_url`. Transport failures are reported as
  /// [`crate::Error::Transport`]; the content type is not checked here.
  fn fetch<'a>(
    &'a self,
    site_url: &'a str,
  ) -> impl Future<Output = Result<FetchedImage>> + Send + 'a;
}
