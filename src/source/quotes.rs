//! Stock quotes from the quote server.
//!
//! Each symbol is its own source: the stocks effect fans one refresh out into
//! independent single-symbol fetches, and each result is published as soon
//! as it lands.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{build_url, DataSource, Document, FetchError, JsonTransport};
use crate::config::SharedConfig;
use crate::snapshot::{DataSnapshot, HistoryPoint, SourceId};

/// Latest quote for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub symbol: String,
    /// Time the quote server stamped the data with.
    pub as_of: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Quote {
    /// Change since the open.
    pub fn change(&self) -> f64 {
        self.close - self.open
    }
}

/// Parse a quote server payload.
///
/// Every top-level field and every history point is required; the first one
/// missing fails the whole snapshot.
pub fn parse_quote(
    source: &SourceId,
    doc: &Document,
    fetched_at: DateTime<Utc>,
) -> Result<DataSnapshot<Quote>, FetchError> {
    let quote = Quote {
        symbol: doc.string("symbol")?.to_string(),
        as_of: timestamp(doc.integer("timestamp")?, "timestamp")?,
        open: doc.number("open")?,
        high: doc.number("high")?,
        low: doc.number("low")?,
        close: doc.number("close")?,
        volume: doc.number("volume")?,
    };

    let history = doc
        .root()
        .items("points")?
        .into_iter()
        .map(|point| {
            Ok(HistoryPoint {
                at: timestamp(point.integer("dt")?, "points.dt")?,
                value: point.number("val")?,
            })
        })
        .collect::<Result<Vec<_>, FetchError>>()?;

    Ok(DataSnapshot::new(source.clone(), fetched_at, quote, history))
}

fn timestamp(secs: i64, field: &str) -> Result<DateTime<Utc>, FetchError> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| FetchError::missing(field))
}

/// Quote server data source; the source id is the ticker symbol.
pub struct QuoteSource {
    config: SharedConfig,
    transport: Arc<dyn JsonTransport>,
}

impl QuoteSource {
    pub fn new(config: SharedConfig, transport: Arc<dyn JsonTransport>) -> Self {
        Self { config, transport }
    }
}

#[async_trait]
impl DataSource for QuoteSource {
    type Values = Quote;

    fn name(&self) -> &str {
        "quotes"
    }

    async fn fetch(&self, source: &SourceId) -> Result<DataSnapshot<Quote>, FetchError> {
        let server = self.config.load().stocks.server.clone();
        let url = build_url(&server, &[("ticker", source.as_str())])?;
        let doc = self.transport.fetch_json(&url).await?;
        parse_quote(source, &doc, Utc::now())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;
    use crate::source::testing::CannedTransport;
    use arc_swap::ArcSwap;
    use serde_json::{json, Value};

    fn payload() -> Value {
        json!({
            "symbol": "AAPL",
            "timestamp": 1_715_000_000,
            "open": 182.35,
            "high": 184.9,
            "low": 181.02,
            "close": 184.4,
            "volume": 51_234_567.0,
            "points": [
                { "dt": 1_715_000_000, "val": 184.4 },
                { "dt": 1_714_999_940, "val": 184.1 },
                { "dt": 1_714_999_880, "val": 183.7 }
            ]
        })
    }

    #[test]
    fn parse_quote_fills_every_field() {
        let doc = Document::from_value(payload());
        let fetched = Utc::now();
        let snap = parse_quote(&"AAPL".into(), &doc, fetched).unwrap();

        let q = snap.values();
        assert_eq!(q.symbol, "AAPL");
        assert_eq!(q.as_of.timestamp(), 1_715_000_000);
        assert_eq!(q.open, 182.35);
        assert_eq!(q.close, 184.4);
        assert_eq!(q.volume, 51_234_567.0);
        assert!((q.change() - 2.05).abs() < 1e-9);
        assert_eq!(snap.history().len(), 3);
        assert_eq!(snap.history()[1].value, 184.1);
        assert_eq!(snap.fetched_at(), fetched);
    }

    #[test]
    fn missing_close_fails_instead_of_defaulting() {
        let mut value = payload();
        value.as_object_mut().unwrap().remove("close");
        let err = parse_quote(&"AAPL".into(), &Document::from_value(value), Utc::now()).unwrap_err();
        assert_eq!(err, FetchError::missing("close"));
    }

    #[test]
    fn malformed_history_point_fails_the_snapshot() {
        let mut value = payload();
        value["points"][1]["val"] = json!("n/a");
        assert!(parse_quote(&"AAPL".into(), &Document::from_value(value), Utc::now()).is_err());
    }

    #[test]
    fn empty_symbol_payload_is_rejected() {
        let doc = Document::from_value(json!({}));
        assert!(matches!(
            parse_quote(&"AAPL".into(), &doc, Utc::now()),
            Err(FetchError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn fetch_requests_the_ticker_from_the_configured_server() {
        let config = Arc::new(ArcSwap::from_pointee(DeviceConfig::default()));
        let transport = Arc::new(CannedTransport::new().route("ticker=AAPL", Ok(payload())));
        let source = QuoteSource::new(config, transport.clone());

        let snap = source.fetch(&"AAPL".into()).await.unwrap();

        assert_eq!(snap.source().as_str(), "AAPL");
        assert_eq!(transport.requests(), vec!["http://localhost:8888/?ticker=AAPL"]);
    }

    #[tokio::test]
    async fn fetch_propagates_status_errors() {
        let config = Arc::new(ArcSwap::from_pointee(DeviceConfig::default()));
        let transport = Arc::new(CannedTransport::new().route("ticker", Err(FetchError::Status(503))));
        let source = QuoteSource::new(config, transport);

        assert_eq!(
            source.fetch(&"MSFT".into()).await.unwrap_err(),
            FetchError::Status(503)
        );
    }
}
