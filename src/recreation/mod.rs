//! Recreation.gov permit availability API.
//!
//! - `client`: HTTP client with browser-like headers
//! - `payload`: shape-checked response decoding
//! - `discovery`: rate-limited division ID probing

pub mod client;
pub mod discovery;
pub mod payload;

pub use client::RecreationClient;
pub use discovery::DivisionDiscovery;
pub use payload::PermitPayload;

use futures::future::BoxFuture;

use crate::common::error::FetchResult;

/// Source of permit availability payloads.
///
/// Implemented by [`RecreationClient`]; tests substitute in-memory fakes.
pub trait AvailabilitySource: Send + Sync + 'static {
    /// Fetch the availability payload for a permit, optionally narrowed to
    /// one division.
    fn fetch<'a>(
        &'a self,
        permit_id: &'a str,
        division_id: Option<&'a str>,
    ) -> BoxFuture<'a, FetchResult<PermitPayload>>;
}
