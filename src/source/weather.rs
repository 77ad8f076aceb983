//! Current conditions and tomorrow's forecast from OpenWeatherMap.
//!
//! One fetch is up to three requests: geocoding (only when the configured
//! location changed since the last resolve), current weather, and the 5-day
//! forecast.  Current weather is required.  The forecast is best effort: if
//! it fails the snapshot is published without tomorrow's numbers.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{Local, NaiveDate, Utc};

use super::{build_url, DataSource, Document, FetchError, JsonTransport};
use crate::config::{SharedConfig, WeatherConfig};
use crate::snapshot::{DataSnapshot, SourceId};

/// The single source id the weather effect uses.
pub const WEATHER_SOURCE: &str = "weather";

/// Weather values.  Temperatures are Kelvin; the effect converts on draw.
#[derive(Debug, Clone, PartialEq)]
pub struct Weather {
    /// City name reported by the API, if any.
    pub place: Option<String>,
    pub now_k: f64,
    pub today: DayForecast,
    pub tomorrow: Option<DayForecast>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayForecast {
    pub high_k: f64,
    pub low_k: f64,
    /// Numeric part of the OpenWeatherMap icon id (`"10d"` is 10).
    pub icon: Option<u8>,
}

pub fn kelvin_to_celsius(k: f64) -> f64 {
    k - 273.15
}

pub fn kelvin_to_fahrenheit(k: f64) -> f64 {
    (k - 273.15) * 9.0 / 5.0 + 32.0
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Coordinates from a geocoding response.  The zip endpoint answers with an
/// object, the direct endpoint with a list of matches.
pub fn parse_coordinates(doc: &Document, is_zip: bool) -> Result<(f64, f64), FetchError> {
    let place = if is_zip {
        doc.root()
    } else {
        doc.root()
            .node("0")
            .map_err(|_| FetchError::Parse("location not found".into()))?
    };
    Ok((place.number("lat")?, place.number("lon")?))
}

/// Current conditions: temperature plus today's high and low are required.
pub fn parse_current(doc: &Document) -> Result<(Option<String>, f64, DayForecast), FetchError> {
    let now_k = doc.number("main.temp")?;
    let today = DayForecast {
        high_k: doc.number("main.temp_max")?,
        low_k: doc.number("main.temp_min")?,
        icon: doc.string("weather.0.icon").ok().and_then(icon_code),
    };
    let place = doc
        .string("name")
        .ok()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from);
    Ok((place, now_k, today))
}

/// Tomorrow's high/low across every forecast slot dated `tomorrow`.
///
/// Returns `Ok(None)` when the forecast has no slot for that day.
pub fn parse_tomorrow(doc: &Document, tomorrow: NaiveDate) -> Result<Option<DayForecast>, FetchError> {
    let prefix = tomorrow.format("%Y-%m-%d").to_string();
    let mut forecast: Option<DayForecast> = None;

    for entry in doc.root().items("list")? {
        if !entry.string("dt_txt")?.starts_with(&prefix) {
            continue;
        }
        let high = entry.number("main.temp_max")?;
        let low = entry.number("main.temp_min")?;
        let icon = entry.string("weather.0.icon").ok().and_then(icon_code);

        forecast = Some(match forecast {
            None => DayForecast { high_k: high, low_k: low, icon },
            Some(day) => DayForecast {
                high_k: day.high_k.max(high),
                low_k: day.low_k.min(low),
                icon: day.icon.or(icon),
            },
        });
    }
    Ok(forecast)
}

fn icon_code(icon: &str) -> Option<u8> {
    let digits: String = icon.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct Resolved {
    query: (String, String, bool),
    lat: f64,
    lon: f64,
}

/// OpenWeatherMap data source.
pub struct WeatherSource {
    config: SharedConfig,
    transport: Arc<dyn JsonTransport>,
    resolved: Mutex<Option<Resolved>>,
}

impl WeatherSource {
    pub fn new(config: SharedConfig, transport: Arc<dyn JsonTransport>) -> Self {
        Self {
            config,
            transport,
            resolved: Mutex::new(None),
        }
    }

    async fn coordinates(&self, cfg: &WeatherConfig) -> Result<(f64, f64), FetchError> {
        let query = (
            cfg.location.clone(),
            cfg.country_code.clone(),
            cfg.location_is_zip,
        );
        let cached = self
            .resolved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(hit) = cached.filter(|r| r.query == query) {
            return Ok((hit.lat, hit.lon));
        }

        let place = format!("{},{}", cfg.location, cfg.country_code);
        let url = if cfg.location_is_zip {
            build_url(
                &format!("{}/geo/1.0/zip", cfg.api_base),
                &[("zip", place.as_str()), ("appid", cfg.api_key.as_str())],
            )?
        } else {
            build_url(
                &format!("{}/geo/1.0/direct", cfg.api_base),
                &[("q", place.as_str()), ("limit", "1"), ("appid", cfg.api_key.as_str())],
            )?
        };
        let (lat, lon) = parse_coordinates(&self.transport.fetch_json(&url).await?, cfg.location_is_zip)?;
        tracing::info!(location = %place, lat, lon, "resolved weather location");

        *self.resolved.lock().unwrap_or_else(PoisonError::into_inner) = Some(Resolved { query, lat, lon });
        Ok((lat, lon))
    }

    async fn tomorrow(&self, cfg: &WeatherConfig, lat: &str, lon: &str) -> Result<Option<DayForecast>, FetchError> {
        let url = build_url(
            &format!("{}/data/2.5/forecast", cfg.api_base),
            &[("lat", lat), ("lon", lon), ("appid", cfg.api_key.as_str())],
        )?;
        let doc = self.transport.fetch_json(&url).await?;
        let tomorrow = Local::now().date_naive().succ_opt().ok_or_else(|| FetchError::Parse("date overflow".into()))?;
        parse_tomorrow(&doc, tomorrow)
    }
}

#[async_trait]
impl DataSource for WeatherSource {
    type Values = Weather;

    fn name(&self) -> &str {
        "weather"
    }

    async fn fetch(&self, source: &SourceId) -> Result<DataSnapshot<Weather>, FetchError> {
        let cfg = self.config.load().weather.clone();
        if cfg.api_key.is_empty() {
            return Err(FetchError::Config("no OpenWeatherMap API key".into()));
        }

        let (lat, lon) = self.coordinates(&cfg).await?;
        let (lat, lon) = (lat.to_string(), lon.to_string());

        let url = build_url(
            &format!("{}/data/2.5/weather", cfg.api_base),
            &[("lat", lat.as_str()), ("lon", lon.as_str()), ("appid", cfg.api_key.as_str())],
        )?;
        let (place, now_k, today) = parse_current(&self.transport.fetch_json(&url).await?)?;

        let tomorrow = match self.tomorrow(&cfg, &lat, &lon).await {
            Ok(day) => day,
            Err(e) => {
                tracing::warn!(error = %e, "forecast unavailable, publishing today only");
                None
            }
        };

        let weather = Weather {
            place,
            now_k,
            today,
            tomorrow,
        };
        Ok(DataSnapshot::new(source.clone(), Utc::now(), weather, Vec::new()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
