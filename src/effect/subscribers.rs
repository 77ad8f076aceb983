use std::sync::Arc;

use tokio::runtime::Handle;

use super::{summarize, Effect, Frame};
use crate::config::SharedConfig;
use crate::gfx::{text_width, Rgb, GLYPH_HEIGHT};
use crate::refresh::{FetchSupervisor, RefreshDriver, RefreshPolicy, SharedStore};
use crate::snapshot::SourceId;
use crate::source::channel::{ChannelSource, CHANNEL_SOURCE};
use crate::source::JsonTransport;

const BACKGROUND: Rgb = Rgb::new(0, 16, 64);
const BORDER: Rgb = Rgb::new(160, 160, 255);

/// Subscriber count for one channel.
pub struct SubscribersEffect {
    config: SharedConfig,
    driver: RefreshDriver<ChannelSource>,
    sources: [SourceId; 1],
}

impl SubscribersEffect {
    pub fn new(config: SharedConfig, transport: Arc<dyn JsonTransport>, runtime: Handle) -> Self {
        let cfg = config.load_full();
        let interval = cfg.subscribers.fetch_interval();
        let supervisor = FetchSupervisor::new(
            ChannelSource::new(config.clone(), transport),
            Arc::new(SharedStore::new()),
            runtime,
            cfg.worker_timeout(interval),
        );
        Self {
            driver: RefreshDriver::new(RefreshPolicy::new(interval, cfg.subscribers.error_backoff()), supervisor),
            config,
            sources: [SourceId::new(CHANNEL_SOURCE)],
        }
    }
}

impl Effect for SubscribersEffect {
    fn name(&self) -> &'static str {
        "subscribers"
    }

    fn frames_per_second(&self) -> u32 {
        20
    }

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let cfg = self.config.load_full();
        let subs = &cfg.subscribers;
        let interval = subs.fetch_interval();
        self.driver
            .set_intervals(interval, subs.error_backoff(), cfg.worker_timeout(interval));
        self.driver
            .tick(frame.now, frame.online, cfg.subscribers_fingerprint(), &self.sources);

        let canvas = &mut *frame.canvas;
        let (width, height) = (canvas.width(), canvas.height());
        canvas.fill_screen(BACKGROUND);
        canvas.draw_rect(0, 1, width - 1, height - 2, BORDER);
        canvas.draw_text(2, 3, &subs.channel_name, Rgb::WHITE);

        let count = match self.driver.store().read(&self.sources[0]).0 {
            Some(snapshot) => snapshot.values().subscribers.to_string(),
            None => "--".to_string(),
        };
        let x = width / 2 - text_width(&count) / 2;
        let y = height / 2 - GLYPH_HEIGHT / 2 + 3;
        for (dx, dy) in [(-1, 0), (1, 0), (0, -1), (0, 1)] {
            canvas.draw_text(x + dx, y + dy, &count, Rgb::BLACK);
        }
        canvas.draw_text(x, y, &count, Rgb::WHITE);
    }

    fn status(&self) -> String {
        format!("channel {}", summarize(self.driver.store()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;
    use crate::effect::testing::{inject, monday, shared};
    use crate::gfx::{DisplayList, DrawCmd};
    use crate::source::channel::ChannelStats;
    use crate::source::testing::CannedTransport;
    use std::time::Instant;

    fn effect() -> SubscribersEffect {
        let mut cfg = DeviceConfig::default();
        cfg.subscribers.channel_name = "Daves Garage".into();
        SubscribersEffect::new(shared(cfg), Arc::new(CannedTransport::new()), Handle::current())
    }

    fn draw(effect: &mut SubscribersEffect) -> DisplayList {
        let mut list = DisplayList::new(64, 32);
        let mut frame = Frame {
            now: Instant::now(),
            local: monday(),
            online: false,
            canvas: &mut list,
        };
        effect.draw(&mut frame);
        list
    }

    #[tokio::test]
    async fn shows_a_dash_until_the_first_count() {
        let list = draw(&mut effect());
        let texts: Vec<&str> = list.texts().collect();
        assert_eq!(texts[0], "Daves Garage");
        assert_eq!(texts.last(), Some(&"--"));
        assert_eq!(list.commands()[1], DrawCmd::Rect { x0: 0, y0: 1, x1: 63, y1: 30, color: BORDER });
    }

    #[tokio::test]
    async fn count_is_centred_with_a_black_outline() {
        let mut fx = effect();
        inject(fx.driver.store(), CHANNEL_SOURCE, ChannelStats { subscribers: 1_048_576, views: 9 }, Vec::new());

        let list = draw(&mut fx);
        let counts: Vec<(i32, i32, Rgb)> = list
            .commands()
            .iter()
            .filter_map(|c| match c {
                DrawCmd::Text { x, y, text, color } if text == "1048576" => Some((*x, *y, *color)),
                _ => None,
            })
            .collect();
        // Seven glyphs are 41 pixels wide.
        assert_eq!(counts.len(), 5);
        assert_eq!(counts[4], (32 - 20, 16, Rgb::WHITE));
        assert!(counts[..4].iter().all(|(_, _, color)| *color == Rgb::BLACK));
    }
}
