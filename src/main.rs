//! livematrix: a terminal-emulated LED matrix showing live stock quotes,
//! weather and channel subscriber counts.
//!
//! ## Architecture overview
//!
//! ```text
//!                 main thread                        tokio runtime
//! ┌──────────┐  draw()  ┌──────────┐  try_spawn  ┌────────────────────┐
//! │  ui.rs   │ ◄─────── │  app.rs  │ ──────────► │ fetch workers      │
//! │ (render) │          │ effects  │             │ connectivity probe │
//! └──────────┘          └──────────┘             │ config reload      │
//!                         ▲     │ read           └────────────────────┘
//!      handle_key_event() │     ▼                          │ publish
//!                   ┌──────────┐  ┌──────────────────────┐ │
//!                   │ input.rs │  │ SharedStore (per     │◄┘
//!                   └──────────┘  │ effect)              │
//!                                 └──────────────────────┘
//! ```
//!
//! * **`source/`**: the `DataSource` trait, the JSON transport and the
//!   quote, weather and channel sources.
//! * **`refresh/`**: refresh policy, shared store, fetch supervisor and the
//!   per-effect driver that ties them together.
//! * **`effect/`**: the effects; each one draws a frame without waiting on
//!   anything.
//! * **`transition`**: wall-clock animation.
//! * **`gfx/`**: the drawing surface effects record into, and the widget
//!   that shows it.
//! * **`config`**, **`connectivity`**: shared device config and the online
//!   flag, both kept current by background tasks.
//! * **`app`**, **`ui`**, **`input`**: program state, rendering and keys.
//! * **`main`**: wires everything together: parse args, start the runtime,
//!   set up the terminal, and run the frame loop.

mod app;
mod config;
mod connectivity;
mod effect;
mod gfx;
mod input;
mod refresh;
mod snapshot;
mod source;
mod transition;
mod ui;

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use chrono::Local;
use clap::Parser;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;
use config::DeviceConfig;
use connectivity::Connectivity;
use effect::EffectKind;
use source::{HttpTransport, JsonTransport};

#[derive(Parser, Debug)]
#[command(name = "livematrix")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Device configuration file (TOML).  Missing means defaults.
    #[arg(short, long, default_value = "livematrix.toml")]
    config: PathBuf,

    /// Effect to show first.
    #[arg(short, long, value_enum)]
    effect: Option<EffectKind>,

    /// Where to write logs; the terminal itself is taken by the display.
    #[arg(long, default_value = "livematrix.log")]
    log_file: PathBuf,
}

// ---------------------------------------------------------------------------
// RAII terminal guard
// ---------------------------------------------------------------------------

/// Manages terminal raw-mode and alternate-screen lifetime via [`Drop`].
///
/// Constructing this struct enters raw mode + alternate screen.  When the
/// value is dropped (normally or during stack unwinding) it restores the
/// terminal.
struct TerminalGuard {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

impl TerminalGuard {
    fn new() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        Ok(Self { terminal })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

/// Install a panic hook that restores the terminal before printing the
/// panic message.
fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(info);
    }));
}

fn init_logging(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("livematrix=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .init();
    Ok(())
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _ = dotenvy::dotenv();
    init_logging(&cli.log_file)?;

    // -- configuration -------------------------------------------------------
    let initial = DeviceConfig::load(&cli.config)?;
    tracing::info!(config = %cli.config.display(), "starting livematrix");
    let request_timeout = Duration::from_secs(initial.network.request_timeout_secs);
    let connectivity = Connectivity::new(initial.network.probe_addr.is_empty());
    let config = Arc::new(ArcSwap::from_pointee(initial));

    // -- background runtime --------------------------------------------------
    // Fetches, the connectivity probe and config reload all live here; the
    // frame loop below only ever hands work to it.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("livematrix-worker")
        .build()
        .context("starting tokio runtime")?;
    let transport: Arc<dyn JsonTransport> = Arc::new(HttpTransport::new(request_timeout)?);
    connectivity::spawn_probe(runtime.handle(), config.clone(), connectivity.clone());
    config::spawn_reload(runtime.handle(), config.clone(), cli.config.clone());

    let effects = effect::build_all(&config, transport, runtime.handle());
    let start = cli.effect.map_or(0, EffectKind::index);
    let mut app = App::new(effects, start, config, connectivity);

    // -- terminal setup (RAII: Drop restores on exit or panic) ---------------
    install_panic_hook();
    let mut guard = TerminalGuard::new()?;

    // -- main frame loop -----------------------------------------------------
    // Each iteration is one frame of the current effect:
    //   1. Let the effect draw (refresh bookkeeping happens in here too).
    //   2. Render the UI.
    //   3. Handle input until the frame's time budget is spent.
    loop {
        let frame_start = Instant::now();
        app.tick(frame_start, Local::now());
        guard.terminal.draw(|f| ui::draw(&app, f))?;

        let deadline = frame_start + app.frame_interval();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !event::poll(remaining)? {
                break;
            }
            if let Event::Key(key) = event::read()? {
                input::handle_key_event(&mut app, key);
            }
            if app.quit {
                break;
            }
        }

        if app.quit {
            break;
        }
    }

    drop(guard);
    tracing::info!("shutting down");
    runtime.shutdown_background();
    Ok(())
}
