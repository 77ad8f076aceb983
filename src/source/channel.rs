//! Channel statistics (subscriber and view counts).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{build_url, DataSource, Document, FetchError, JsonTransport};
use crate::config::SharedConfig;
use crate::snapshot::{DataSnapshot, SourceId};

/// The single source id the subscribers effect uses.
pub const CHANNEL_SOURCE: &str = "channel";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelStats {
    pub subscribers: u64,
    pub views: u64,
}

/// Parse a statistics payload.  Counts may arrive as numbers or numeric
/// strings; the subscriber count is accepted as `subscribers_count` or
/// `subscribers`.
pub fn parse_channel_stats(
    source: &SourceId,
    doc: &Document,
    fetched_at: DateTime<Utc>,
) -> Result<DataSnapshot<ChannelStats>, FetchError> {
    let root = doc.root();
    let subscribers = root
        .count("subscribers_count")
        .or_else(|_| root.count("subscribers"))?;
    let stats = ChannelStats {
        subscribers,
        views: root.count("views")?,
    };
    Ok(DataSnapshot::new(source.clone(), fetched_at, stats, Vec::new()))
}

pub struct ChannelSource {
    config: SharedConfig,
    transport: Arc<dyn JsonTransport>,
}

impl ChannelSource {
    pub fn new(config: SharedConfig, transport: Arc<dyn JsonTransport>) -> Self {
        Self { config, transport }
    }
}

#[async_trait]
impl DataSource for ChannelSource {
    type Values = ChannelStats;

    fn name(&self) -> &str {
        "channel"
    }

    async fn fetch(&self, source: &SourceId) -> Result<DataSnapshot<ChannelStats>, FetchError> {
        let (stats_url, channel) = {
            let cfg = self.config.load();
            (cfg.subscribers.stats_url.clone(), cfg.subscribers.channel_id.clone())
        };
        if channel.is_empty() {
            return Err(FetchError::Config("no channel id".into()));
        }
        let url = build_url(&stats_url, &[("channel", channel.as_str())])?;
        let doc = self.transport.fetch_json(&url).await?;
        parse_channel_stats(source, &doc, Utc::now())
    }
}
