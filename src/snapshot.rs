//! The immutable record every data source publishes.
//!
//! A [`DataSnapshot`] is the latest successfully fetched and parsed payload
//! for one source.  Snapshots are never mutated after construction; a newer
//! fetch replaces the whole value inside the
//! [`SharedStore`](crate::refresh::SharedStore).
//!
//! ## For contributors
//!
//! The `values` type parameter is source-specific (a quote, the weather, a
//! channel's statistics).  Give it only non-optional fields for data the
//! display cannot do without: a payload that lacks one of them must fail to
//! parse, so a snapshot can never exist half-filled.

use std::fmt;

use chrono::{DateTime, Utc};

/// Upper bound on the number of history points kept per snapshot.
pub const MAX_HISTORY: usize = 256;

/// Identifies one logical data source (a stock symbol, `weather`, ...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// One timestamped sample in a snapshot's history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryPoint {
    pub at: DateTime<Utc>,
    pub value: f64,
}

/// Latest successfully parsed data for one source.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSnapshot<V> {
    source: SourceId,
    fetched_at: DateTime<Utc>,
    values: V,
    history: Vec<HistoryPoint>,
}

impl<V> DataSnapshot<V> {
    /// Build a snapshot.  `history` keeps the order it was delivered in and
    /// is cut down to its first [`MAX_HISTORY`] points.
    pub fn new(
        source: SourceId,
        fetched_at: DateTime<Utc>,
        values: V,
        mut history: Vec<HistoryPoint>,
    ) -> Self {
        history.truncate(MAX_HISTORY);
        Self {
            source,
            fetched_at,
            values,
            history,
        }
    }

    pub fn source(&self) -> &SourceId {
        &self.source
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn values(&self) -> &V {
        &self.values
    }

    pub fn history(&self) -> &[HistoryPoint] {
        &self.history
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
