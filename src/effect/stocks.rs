use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::runtime::Handle;

use super::{summarize, Effect, Frame};
use crate::config::SharedConfig;
use crate::gfx::{text_width, Canvas, Rgb};
use crate::refresh::{FetchSupervisor, RefreshDriver, RefreshPolicy, SharedStore};
use crate::snapshot::{DataSnapshot, SourceId};
use crate::source::quotes::{Quote, QuoteSource};
use crate::source::JsonTransport;
use crate::transition::{AnimatedText, Point};

const HEADER_HEIGHT: i32 = 9;
const SYMBOL_ROW: f32 = 1.0;
const CHANGE_ROW: f32 = 10.0;
const VOLUME_ROW: f32 = 17.0;
const SPARKLINE_TOP: i32 = 24;

const SYMBOL_FLIGHT: Duration = Duration::from_millis(500);
const PRICE_FLIGHT: Duration = Duration::from_millis(750);
const CHANGE_FLIGHT: Duration = Duration::from_millis(1000);
const VOLUME_FLIGHT: Duration = Duration::from_millis(1000);

/// Rotating stock ticker.
///
/// Every configured symbol is its own source.  Quotes land in the store in
/// whatever order their fetches finish; the rotation walks whichever ones are
/// present, and jumps immediately when that number changes.
pub struct StocksEffect {
    config: SharedConfig,
    driver: RefreshDriver<QuoteSource>,
    symbols: Vec<SourceId>,
    index: usize,
    last_rotation: Option<Instant>,
    last_count: usize,
    shown: Option<SourceId>,
    symbol: AnimatedText,
    price: AnimatedText,
    change: AnimatedText,
    volume: AnimatedText,
}

impl StocksEffect {
    pub fn new(config: SharedConfig, transport: Arc<dyn JsonTransport>, runtime: Handle) -> Self {
        let cfg = config.load_full();
        let interval = cfg.stocks.fetch_interval();
        let supervisor = FetchSupervisor::new(
            QuoteSource::new(config.clone(), transport),
            Arc::new(SharedStore::new()),
            runtime,
            cfg.worker_timeout(interval),
        );
        let width = f32::from(cfg.display.width);
        let now = Instant::now();
        let label = |text: &str, x: f32, y: f32| AnimatedText::new(text, Rgb::GREY, Point::new(x, y), now);

        Self {
            driver: RefreshDriver::new(RefreshPolicy::new(interval, cfg.stocks.error_backoff()), supervisor),
            config,
            symbols: Vec::new(),
            index: 0,
            last_rotation: None,
            last_count: 0,
            shown: None,
            symbol: label("STOCK", 0.0, SYMBOL_ROW),
            price: label("PRICE", width - text_width("PRICE") as f32, SYMBOL_ROW),
            change: label("CHANGE", width - text_width("CHANGE") as f32, CHANGE_ROW),
            volume: label("VOLUME", width - text_width("VOLUME") as f32, VOLUME_ROW),
        }
    }

    fn sync_symbols(&mut self, configured: &[String]) {
        if self.symbols.len() == configured.len()
            && self.symbols.iter().zip(configured).all(|(id, s)| id.as_str() == s)
        {
            return;
        }
        self.symbols = configured.iter().map(|s| SourceId::new(s.as_str())).collect();
        self.driver.store().retain(&self.symbols);
        tracing::info!(symbols = ?configured, "stock symbols changed");
    }

    /// Advance the rotation if its timer ran out or the number of quotes
    /// changed, and send the new quote's texts flying in.
    fn rotate(&mut self, now: Instant, rotate_every: Duration, width: f32) {
        let quotes = self.driver.store().read_all();
        let due = self
            .last_rotation
            .map_or(true, |last| now.saturating_duration_since(last) >= rotate_every);
        if !due && quotes.len() == self.last_count {
            return;
        }
        self.last_rotation = Some(now);
        self.last_count = quotes.len();
        if quotes.is_empty() {
            return;
        }

        self.index = (self.index + 1) % quotes.len();
        if let Some((id, snapshot)) = quotes.iter().nth(self.index) {
            tracing::debug!(symbol = %id, "showing quote");
            self.shown = Some(id.clone());
            self.start_display(snapshot.values(), now, width);
        }
    }

    fn start_display(&mut self, quote: &Quote, now: Instant, width: f32) {
        let price = if quote.close >= 10_000.0 {
            format!("{:.0}", quote.close)
        } else {
            format!("{:.2}", quote.close)
        };
        let change = format!("{:.2}", quote.change());
        let change_color = if quote.close >= quote.open {
            Rgb::LIGHT_GREEN
        } else {
            Rgb::RED
        };
        let volume = format!("{:.0}", quote.volume);
        let right = |text: &str| width - text_width(text) as f32;

        self.symbol.retarget(
            quote.symbol.as_str(),
            Rgb::WHITE,
            Point::new(0.0, SYMBOL_ROW),
            Point::new(-width, SYMBOL_ROW),
            SYMBOL_FLIGHT,
            now,
        );
        self.price.retarget(
            price.as_str(),
            Rgb::WHITE,
            Point::new(right(&price), SYMBOL_ROW),
            Point::new(-width, SYMBOL_ROW),
            PRICE_FLIGHT,
            now,
        );
        self.change.retarget(
            change.as_str(),
            change_color,
            Point::new(right(&change), CHANGE_ROW),
            Point::new(-width, CHANGE_ROW),
            CHANGE_FLIGHT,
            now,
        );
        self.volume.retarget(
            volume.as_str(),
            Rgb::LIGHT_GREY,
            Point::new(right(&volume), VOLUME_ROW),
            Point::new(-2.0 * width, VOLUME_ROW),
            VOLUME_FLIGHT,
            now,
        );
    }

    fn draw_texts(&mut self, now: Instant, canvas: &mut dyn Canvas) {
        for text in [&mut self.symbol, &mut self.price, &mut self.change, &mut self.volume] {
            let at = text.sample(now);
            canvas.draw_text(at.x.round() as i32, at.y.round() as i32, &text.text, text.color);
        }
    }
}

/// Bars from the open price to each history point, newest at the right
/// edge.  Red below the open, green above.
fn draw_sparkline(snapshot: &DataSnapshot<Quote>, canvas: &mut dyn Canvas) {
    let width = canvas.width();
    let top = SPARKLINE_TOP;
    let bottom = canvas.height() - 1;
    let span = (bottom - top) as f64;
    let points = &snapshot.history()[..snapshot.history().len().min(width.max(0) as usize)];
    if points.is_empty() || span <= 0.0 {
        return;
    }

    let (min, max) = points
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| (lo.min(p.value), hi.max(p.value)));
    let range = max - min;
    if range <= 0.0 {
        return;
    }

    let scale = span / range;
    let to_y = |value: f64| (bottom as f64 - (value - min) * scale).round() as i32;
    let open = snapshot.values().open;
    let breakeven = to_y(open).clamp(top, bottom);

    for (i, point) in points.iter().enumerate() {
        let x = width - 1 - i as i32;
        let y = to_y(point.value).clamp(top, bottom);
        let color = if point.value < open { Rgb::RED } else { Rgb::GREEN };
        canvas.draw_line(x, breakeven, x, y, color);
    }
}

impl Effect for StocksEffect {
    fn name(&self) -> &'static str {
        "stocks"
    }

    fn frames_per_second(&self) -> u32 {
        25
    }

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let cfg = self.config.load_full();
        let interval = cfg.stocks.fetch_interval();
        self.sync_symbols(&cfg.stocks.symbols);
        self.driver
            .set_intervals(interval, cfg.stocks.error_backoff(), cfg.worker_timeout(interval));
        self.driver
            .tick(frame.now, frame.online, cfg.stocks_fingerprint(), &self.symbols);

        let width = frame.canvas.width();
        frame.canvas.fill_screen(Rgb::BLACK);
        frame.canvas.fill_rect(0, 0, width, HEADER_HEIGHT, Rgb::NAVY);

        self.rotate(frame.now, Duration::from_secs(cfg.display.rotate_secs), width as f32);
        self.draw_texts(frame.now, frame.canvas);

        if let Some((Some(snapshot), _)) = self.shown.as_ref().map(|id| self.driver.store().read(id)) {
            draw_sparkline(&snapshot, frame.canvas);
        }
    }

    fn status(&self) -> String {
        format!("quotes {}", summarize(self.driver.store()))
    }
}
