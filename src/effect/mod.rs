//! Display effects.
//!
//! An effect is what the matrix shows at a given moment.  The render loop
//! calls [`Effect::draw`] once per frame; each data-backed effect does its
//! whole frame there: refresh bookkeeping through its [`RefreshDriver`],
//! rotation, animation sampling and drawing.  Nothing in `draw` waits on the
//! network.
//!
//! ## For contributors
//!
//! To add an effect:
//!
//! 1. Create a module here with a struct implementing [`Effect`].
//! 2. If it needs data, give it a [`DataSource`](crate::source::DataSource)
//!    and a [`RefreshDriver`] the way `subscribers.rs` does.
//! 3. Add a variant to [`EffectKind`] and construct it in [`build_all`].
//!
//! [`RefreshDriver`]: crate::refresh::RefreshDriver

mod clock;
mod stocks;
mod subscribers;
mod weather;

pub use clock::ClockEffect;
pub use stocks::StocksEffect;
pub use subscribers::SubscribersEffect;
pub use weather::WeatherEffect;

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Local};
use clap::ValueEnum;
use tokio::runtime::Handle;

use crate::config::SharedConfig;
use crate::gfx::Canvas;
use crate::refresh::{FetchState, SharedStore};
use crate::source::JsonTransport;

/// Everything an effect may look at while drawing one frame.
pub struct Frame<'a> {
    /// Monotonic time used for refresh scheduling and animation.
    pub now: Instant,
    /// Wall-clock time for anything the viewer reads as a time or a date.
    pub local: DateTime<Local>,
    /// Whether the network is reachable; fetches only start when it is.
    pub online: bool,
    pub canvas: &'a mut dyn Canvas,
}

pub trait Effect {
    fn name(&self) -> &'static str;

    fn frames_per_second(&self) -> u32;

    fn draw(&mut self, frame: &mut Frame<'_>);

    /// One line describing the effect's data for the status bar.
    fn status(&self) -> String {
        String::new()
    }
}

/// Effect selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EffectKind {
    Stocks,
    Weather,
    Subscribers,
    Clock,
}

impl EffectKind {
    /// Position of this effect in the list returned by [`build_all`].
    pub fn index(self) -> usize {
        match self {
            EffectKind::Stocks => 0,
            EffectKind::Weather => 1,
            EffectKind::Subscribers => 2,
            EffectKind::Clock => 3,
        }
    }
}

/// Every effect, in [`EffectKind`] order.
pub fn build_all(config: &SharedConfig, transport: Arc<dyn JsonTransport>, runtime: &Handle) -> Vec<Box<dyn Effect>> {
    vec![
        Box::new(StocksEffect::new(config.clone(), Arc::clone(&transport), runtime.clone())),
        Box::new(WeatherEffect::new(config.clone(), Arc::clone(&transport), runtime.clone())),
        Box::new(SubscribersEffect::new(config.clone(), transport, runtime.clone())),
        Box::new(ClockEffect::new()),
    ]
}

/// Status-bar summary of a store: loaded count, fetches running, and the
/// first error still standing.
fn summarize<V>(store: &SharedStore<V>) -> String {
    let states = store.states();
    let mut parts = vec![format!("{}/{} loaded", store.read_all().len(), states.len())];

    let fetching = states
        .iter()
        .filter(|(_, state)| *state == FetchState::InFlight)
        .count();
    if fetching > 0 {
        parts.push(format!("{fetching} fetching"));
    }

    if let Some((id, error)) = states
        .iter()
        .find_map(|(id, _)| store.last_error(id).map(|e| (id, e)))
    {
        parts.push(format!("{id}: {error}"));
    }
    parts.join(", ")
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SourceId;
    use crate::source::FetchError;

    #[test]
    fn kinds_index_into_build_order() {
        let kinds = EffectKind::value_variants();
        let indices: Vec<usize> = kinds.iter().map(|k| k.index()).collect();
        assert_eq!(indices, [0, 1, 2, 3]);
    }

    #[test]
    fn summary_reports_loaded_fetching_and_errors() {
        let store: SharedStore<u32> = SharedStore::new();
        testing::inject(&store, "A", 1, Vec::new());

        let b = SourceId::from("B");
        let claim = store.begin_fetch(&b).unwrap();
        assert_eq!(summarize(&store), "1/2 loaded, 1 fetching");

        store.publish(&b, claim, Err(FetchError::Status(503)));
        assert!(summarize(&store).starts_with("1/2 loaded, B: "));
    }

    #[tokio::test]
    async fn build_all_matches_kind_names() {
        let config = testing::shared(Default::default());
        let transport = Arc::new(crate::source::testing::CannedTransport::new());
        let effects = build_all(&config, transport, &Handle::current());

        for kind in EffectKind::value_variants() {
            let name = kind.to_possible_value().map(|v| v.get_name().to_string());
            assert_eq!(Some(effects[kind.index()].name().to_string()), name);
        }
    }
}
