use std::sync::Arc;

use chrono::Datelike;
use tokio::runtime::Handle;

use super::{summarize, Effect, Frame};
use crate::config::SharedConfig;
use crate::gfx::{text_width, Canvas, Rgb, GLYPH_ADVANCE, GLYPH_HEIGHT};
use crate::refresh::{FetchSupervisor, RefreshDriver, RefreshPolicy, SharedStore};
use crate::snapshot::SourceId;
use crate::source::weather::{kelvin_to_celsius, kelvin_to_fahrenheit, WeatherSource, WEATHER_SOURCE};
use crate::source::JsonTransport;

const DAYS: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];
const ICON_TOP: i32 = 10;
const DIVIDER: Rgb = Rgb::new(0, 0, 128);
const TEMPERATURE: Rgb = Rgb::new(192, 192, 192);

/// Image for an OpenWeatherMap icon number, if there is one.
pub fn icon_path(code: u8) -> Option<&'static str> {
    match code {
        1 => Some("/bmp/clearsky.jpg"),
        2 => Some("/bmp/fewclouds.jpg"),
        3 => Some("/bmp/scatteredclouds.jpg"),
        4 => Some("/bmp/brokenclouds.jpg"),
        9 => Some("/bmp/showerrain.jpg"),
        10 => Some("/bmp/rain.jpg"),
        11 => Some("/bmp/thunderstorm.jpg"),
        13 => Some("/bmp/snow.jpg"),
        _ => None,
    }
}

/// Today and tomorrow side by side, with the current temperature in the
/// header.
pub struct WeatherEffect {
    config: SharedConfig,
    driver: RefreshDriver<WeatherSource>,
    sources: [SourceId; 1],
}

impl WeatherEffect {
    pub fn new(config: SharedConfig, transport: Arc<dyn JsonTransport>, runtime: Handle) -> Self {
        let cfg = config.load_full();
        let interval = cfg.weather.fetch_interval();
        let supervisor = FetchSupervisor::new(
            WeatherSource::new(config.clone(), transport),
            Arc::new(SharedStore::new()),
            runtime,
            cfg.worker_timeout(interval),
        );
        Self {
            driver: RefreshDriver::new(RefreshPolicy::new(interval, cfg.weather.error_backoff()), supervisor),
            config,
            sources: [SourceId::new(WEATHER_SOURCE)],
        }
    }
}

/// Whole degrees in the configured unit.
fn degrees(kelvin: f64, celsius: bool) -> String {
    let value = if celsius {
        kelvin_to_celsius(kelvin)
    } else {
        kelvin_to_fahrenheit(kelvin)
    };
    format!("{}", value.round() as i64)
}

fn draw_right(canvas: &mut dyn Canvas, right: i32, y: i32, text: &str, color: Rgb) {
    canvas.draw_text(right - text_width(text), y, text, color);
}

impl Effect for WeatherEffect {
    fn name(&self) -> &'static str {
        "weather"
    }

    fn frames_per_second(&self) -> u32 {
        25
    }

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let cfg = self.config.load_full();
        let weather = &cfg.weather;
        let has_key = !weather.api_key.is_empty();
        if has_key {
            let interval = weather.fetch_interval();
            self.driver
                .set_intervals(interval, weather.error_backoff(), cfg.worker_timeout(interval));
            self.driver
                .tick(frame.now, frame.online, cfg.weather_fingerprint(), &self.sources);
        }

        let canvas = &mut *frame.canvas;
        let width = canvas.width();
        let height = canvas.height();
        let half = width / 2 - 1;
        let snapshot = self.driver.store().read(&self.sources[0]).0;

        canvas.fill_screen(Rgb::BLACK);

        // Header: place name on the left, temperature now on the right.
        if has_key {
            let place = snapshot
                .as_ref()
                .and_then(|s| s.values().place.clone())
                .unwrap_or_else(|| weather.location.to_uppercase());
            let max_chars = ((width - 2 * GLYPH_ADVANCE) / GLYPH_ADVANCE).max(0) as usize;
            let place: String = place.chars().take(max_chars).collect();
            canvas.draw_text(0, 0, &place, Rgb::WHITE);
        } else {
            canvas.draw_text(0, 0, "NO API KEY", Rgb::WHITE);
        }
        if let Some(snapshot) = &snapshot {
            draw_right(canvas, width, 0, &degrees(snapshot.values().now_k, weather.use_celsius), TEMPERATURE);
        }

        let rule = GLYPH_HEIGHT + 1;
        canvas.draw_line(0, rule, width - 1, rule, DIVIDER);
        canvas.draw_line(half, rule, half, height - 1, DIVIDER);

        if let Some(snapshot) = &snapshot {
            let values = snapshot.values();
            if let Some(path) = values.today.icon.and_then(icon_path) {
                canvas.draw_image(0, ICON_TOP, path);
            }
            if let Some(path) = values.tomorrow.and_then(|t| t.icon).and_then(icon_path) {
                canvas.draw_image(half + 1, ICON_TOP, path);
            }
        }

        // Footer: day names, then high over low for each day.
        let bottom_row = height - GLYPH_HEIGHT;
        let upper_row = bottom_row - GLYPH_HEIGHT;
        let weekday = frame.local.weekday().num_days_from_sunday() as usize;
        canvas.draw_text(0, bottom_row, DAYS[weekday], Rgb::WHITE);
        canvas.draw_text(half + 2, bottom_row, DAYS[(weekday + 1) % 7], Rgb::WHITE);

        if let Some(snapshot) = &snapshot {
            let values = snapshot.values();
            let celsius = weather.use_celsius;
            draw_right(canvas, half, upper_row, &degrees(values.today.high_k, celsius), TEMPERATURE);
            draw_right(canvas, half, bottom_row, &degrees(values.today.low_k, celsius), TEMPERATURE);
            if let Some(tomorrow) = values.tomorrow {
                draw_right(canvas, width, upper_row, &degrees(tomorrow.high_k, celsius), TEMPERATURE);
                draw_right(canvas, width, bottom_row, &degrees(tomorrow.low_k, celsius), TEMPERATURE);
            }
        }
    }

    fn status(&self) -> String {
        if self.config.load().weather.api_key.is_empty() {
            return "weather: no API key".into();
        }
        format!("weather {}", summarize(self.driver.store()))
    }
}
