//! Thin HTTP clients for the two upstream protocols a source adapter can
//! pull tiles/maps from. Both speak plain `reqwest` GET requests; neither
//! tries to be a general WMS/TMS server, only the client half this workspace
//! needs to fill a cache.

mod tms;
mod wms;

pub use tms::TmsClient;
pub use wms::WmsClient;

use std::time::Duration;

/// Shared default: how long an upstream request may run before it's treated
/// as a failed source (spec.md §5).
pub(crate) const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(60);

pub(crate) fn build_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
	reqwest::Client::builder().timeout(timeout).build()
}
