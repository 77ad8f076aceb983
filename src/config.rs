//! Device configuration.
//!
//! Loaded from a TOML file (every key optional), with a few environment
//! overrides for secrets.  The live value sits behind an [`ArcSwap`] so the
//! render loop reads it without locking, and [`spawn_reload`] swaps in a new
//! value whenever the file changes on disk.
//!
//! Effects never compare whole configs.  Each one hashes the fields its
//! data depends on into a fingerprint (see [`DeviceConfig::stocks_fingerprint`]
//! and friends); a changed fingerprint forces an out-of-band refresh.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::{bail, Context, Result};
use arc_swap::ArcSwap;
use serde::Deserialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Config shared between the render loop and background tasks.
pub type SharedConfig = Arc<ArcSwap<DeviceConfig>>;

const ENV_WEATHER_KEY: &str = "OPENWEATHER_API_KEY";
const ENV_CHANNEL_ID: &str = "LIVEMATRIX_CHANNEL_ID";

/// How often [`spawn_reload`] checks the file's modification time.
const RELOAD_POLL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default)]
pub struct DeviceConfig {
    pub display: DisplayConfig,
    pub stocks: StocksConfig,
    pub weather: WeatherConfig,
    pub subscribers: SubscribersConfig,
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub width: u16,
    pub height: u16,
    /// Seconds each stock stays on screen before rotating to the next.
    pub rotate_secs: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 64,
            height: 32,
            rotate_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StocksConfig {
    /// Base URL of the quote server; quotes are read from `{server}/?ticker=SYM`.
    pub server: String,
    pub symbols: Vec<String>,
    pub fetch_secs: u64,
    pub backoff_secs: u64,
}

impl Default for StocksConfig {
    fn default() -> Self {
        Self {
            server: "http://localhost:8888/".into(),
            symbols: vec!["AAPL".into(), "MSFT".into(), "NVDA".into()],
            fetch_secs: 60,
            backoff_secs: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub api_base: String,
    pub api_key: String,
    /// City name, or a postal code when `location_is_zip` is set.
    pub location: String,
    pub country_code: String,
    pub location_is_zip: bool,
    pub use_celsius: bool,
    pub fetch_secs: u64,
    pub backoff_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openweathermap.org".into(),
            api_key: String::new(),
            location: "98052".into(),
            country_code: "US".into(),
            location_is_zip: true,
            use_celsius: false,
            fetch_secs: 600,
            backoff_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SubscribersConfig {
    /// Statistics endpoint; the channel id is sent as the `channel` query parameter.
    pub stats_url: String,
    pub channel_id: String,
    pub channel_name: String,
    pub fetch_secs: u64,
    pub backoff_secs: u64,
}

impl Default for SubscribersConfig {
    fn default() -> Self {
        Self {
            stats_url: "http://localhost:8889/channel".into(),
            channel_id: "9558daa1-eae8-482f-8066-17fa787bc0e4".into(),
            channel_name: "Daves Garage".into(),
            fetch_secs: 60,
            backoff_secs: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// `host:port` the connectivity probe connects to.  Empty disables the
    /// probe and treats the network as always up.
    pub probe_addr: String,
    pub probe_interval_secs: u64,
    pub request_timeout_secs: u64,
    /// A fetch still running after this many refresh intervals is failed.
    pub worker_timeout_factor: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            probe_addr: "1.1.1.1:53".into(),
            probe_interval_secs: 5,
            request_timeout_secs: 15,
            worker_timeout_factor: 2,
        }
    }
}

impl DeviceConfig {
    /// Parse and validate a TOML document.  Environment overrides are not
    /// applied here; see [`DeviceConfig::load`].
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(s).context("parsing config")?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, falling back to defaults when it does not exist, then
    /// apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading config from {}", path.display()))?;
            Self::from_toml_str(&content)
                .with_context(|| format!("loading config from {}", path.display()))?
        } else {
            tracing::info!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(ENV_WEATHER_KEY) {
            self.weather.api_key = key.trim().to_string();
        }
        if let Ok(id) = std::env::var(ENV_CHANNEL_ID) {
            self.subscribers.channel_id = id.trim().to_string();
        }
    }

    fn normalize(&mut self) {
        self.stocks.symbols = self
            .stocks
            .symbols
            .iter()
            .map(|s| s.trim().to_ascii_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        let mut seen = HashSet::new();
        self.stocks.symbols.retain(|s| seen.insert(s.clone()));
        self.weather.api_key = self.weather.api_key.trim().to_string();
    }

    fn validate(&self) -> Result<()> {
        if self.display.width == 0 || self.display.height == 0 {
            bail!("display width and height must be non-zero");
        }
        let intervals = [
            ("display.rotate_secs", self.display.rotate_secs),
            ("stocks.fetch_secs", self.stocks.fetch_secs),
            ("stocks.backoff_secs", self.stocks.backoff_secs),
            ("weather.fetch_secs", self.weather.fetch_secs),
            ("weather.backoff_secs", self.weather.backoff_secs),
            ("subscribers.fetch_secs", self.subscribers.fetch_secs),
            ("subscribers.backoff_secs", self.subscribers.backoff_secs),
            ("network.probe_interval_secs", self.network.probe_interval_secs),
            ("network.request_timeout_secs", self.network.request_timeout_secs),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, secs)| *secs == 0) {
            bail!("{name} must be greater than zero");
        }
        if self.network.worker_timeout_factor == 0 {
            bail!("network.worker_timeout_factor must be greater than zero");
        }
        Ok(())
    }

    // -- fingerprints --------------------------------------------------------

    pub fn stocks_fingerprint(&self) -> u64 {
        fingerprint(&(&self.stocks.server, &self.stocks.symbols))
    }

    pub fn weather_fingerprint(&self) -> u64 {
        let w = &self.weather;
        fingerprint(&(
            &w.api_base,
            &w.api_key,
            &w.location,
            &w.country_code,
            w.location_is_zip,
            w.use_celsius,
        ))
    }

    pub fn subscribers_fingerprint(&self) -> u64 {
        fingerprint(&(&self.subscribers.stats_url, &self.subscribers.channel_id))
    }

    /// Bound after which an in-flight fetch is abandoned.
    pub fn worker_timeout(&self, fetch_interval: Duration) -> Duration {
        fetch_interval * self.network.worker_timeout_factor
    }
}

fn fingerprint<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

impl StocksConfig {
    pub fn fetch_interval(&self) -> Duration {
        Duration::from_secs(self.fetch_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }
}

impl WeatherConfig {
    pub fn fetch_interval(&self) -> Duration {
        Duration::from_secs(self.fetch_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }
}

impl SubscribersConfig {
    pub fn fetch_interval(&self) -> Duration {
        Duration::from_secs(self.fetch_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }
}

// ---------------------------------------------------------------------------
// Hot reload
// ---------------------------------------------------------------------------

/// Watch `path` and swap a freshly parsed config into `config` whenever its
/// modification time moves forward.  A file that fails to parse is logged
/// and the previous config stays live.
pub fn spawn_reload(runtime: &Handle, config: SharedConfig, path: PathBuf) -> JoinHandle<()> {
    runtime.spawn(watch(config, path, RELOAD_POLL))
}

async fn watch(config: SharedConfig, path: PathBuf, poll: Duration) {
    let mut last_mtime = modified(&path).await;
    loop {
        tokio::time::sleep(poll).await;
        let mtime = modified(&path).await;
        let changed = match (last_mtime, mtime) {
            (Some(prev), Some(now)) => now > prev,
            (None, Some(_)) => true,
            _ => false,
        };
        if !changed {
            continue;
        }
        last_mtime = mtime;

        let reload_path = path.clone();
        match tokio::task::spawn_blocking(move || DeviceConfig::load(&reload_path)).await {
            Ok(Ok(fresh)) => {
                tracing::info!(path = %path.display(), "config reloaded");
                config.store(Arc::new(fresh));
            }
            Ok(Err(e)) => {
                tracing::error!(path = %path.display(), error = %format!("{e:#}"), "config reload failed, keeping previous config");
            }
            Err(e) => tracing::error!(error = %e, "config reload task failed"),
        }
    }
}

async fn modified(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path).await.and_then(|m| m.modified()).ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
