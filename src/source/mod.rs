//! Data source abstraction layer.
//!
//! This module defines the [`DataSource`] trait, the [`FetchError`]
//! taxonomy and the JSON transport boundary.  Concrete sources live in
//! sub-modules: [`quotes`], [`weather`] and [`channel`].
//!
//! ## For contributors: adding a new source
//!
//! 1. Create a new file in this directory (e.g. `air_quality.rs`).
//! 2. Define the values type and a pure `parse_*` function that turns a
//!    [`Document`] into a [`DataSnapshot`].  Keep it free of I/O so tests can
//!    feed it fixtures.
//! 3. Define a struct holding the config handle and a [`JsonTransport`],
//!    and implement [`DataSource`] for it.
//! 4. Add `pub mod air_quality;` below and build an effect that drives it
//!    through a [`RefreshDriver`](crate::refresh::RefreshDriver).

pub mod channel;
mod error;
mod json;
pub mod quotes;
pub mod weather;

pub use error::FetchError;
pub use json::{build_url, Document, HttpTransport, JsonTransport};

use async_trait::async_trait;

use crate::snapshot::{DataSnapshot, SourceId};

/// Trait that every data source must implement.
///
/// [`fetch()`](DataSource::fetch) runs on the tokio runtime, never on the
/// render thread, so implementations must be `Send + Sync` and may await
/// network I/O freely.  A fetch either returns a fully-populated snapshot or
/// an error; it never touches display or animation state.
#[async_trait]
pub trait DataSource: Send + Sync + 'static {
    /// Source-specific payload carried by each snapshot.
    type Values: Send + Sync + 'static;

    /// Human-readable label used in logs.
    fn name(&self) -> &str;

    /// Perform one fetch-and-parse cycle for `source`.
    async fn fetch(&self, source: &SourceId) -> Result<DataSnapshot<Self::Values>, FetchError>;
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------
