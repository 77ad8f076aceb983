use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

use crate::config::SharedConfig;
use crate::connectivity::Connectivity;
use crate::effect::{Effect, Frame};
use crate::gfx::{Canvas, DisplayList};

pub struct App {
    effects: Vec<Box<dyn Effect>>,
    current: usize,
    config: SharedConfig,
    connectivity: Connectivity,
    /// The last frame drawn by the current effect.
    frame: DisplayList,
    /// Whether the user has requested to quit.
    pub quit: bool,
}

impl App {
    pub fn new(effects: Vec<Box<dyn Effect>>, start: usize, config: SharedConfig, connectivity: Connectivity) -> Self {
        let (width, height) = {
            let cfg = config.load();
            (cfg.display.width, cfg.display.height)
        };
        let current = if effects.is_empty() { 0 } else { start % effects.len() };
        Self {
            effects,
            current,
            config,
            connectivity,
            frame: DisplayList::new(width, height),
            quit: false,
        }
    }

    /// Draw one frame of the current effect.
    pub fn tick(&mut self, now: Instant, local: DateTime<Local>) {
        {
            let cfg = self.config.load();
            let (width, height) = (cfg.display.width, cfg.display.height);
            if (self.frame.width(), self.frame.height()) != (i32::from(width), i32::from(height)) {
                self.frame.resize(width, height);
            }
        }
        self.frame.clear();

        let online = self.connectivity.is_online();
        if let Some(effect) = self.effects.get_mut(self.current) {
            let mut frame = Frame {
                now,
                local,
                online,
                canvas: &mut self.frame,
            };
            effect.draw(&mut frame);
        }
    }

    pub fn frame(&self) -> &DisplayList {
        &self.frame
    }

    pub fn effect_name(&self) -> &'static str {
        self.effects.get(self.current).map_or("none", |e| e.name())
    }

    pub fn online(&self) -> bool {
        self.connectivity.is_online()
    }

    pub fn status(&self) -> String {
        self.effects
            .get(self.current)
            .map(|e| e.status())
            .unwrap_or_default()
    }

    /// Time budget of one frame for the current effect.
    pub fn frame_interval(&self) -> Duration {
        let fps = self
            .effects
            .get(self.current)
            .map_or(10, |e| e.frames_per_second())
            .max(1);
        Duration::from_secs(1) / fps
    }

    // -- navigation ----------------------------------------------------------

    pub fn next_effect(&mut self) {
        if self.effects.is_empty() {
            return;
        }
        self.current = (self.current + 1) % self.effects.len();
        tracing::info!(effect = self.effect_name(), "switched effect");
    }

    pub fn previous_effect(&mut self) {
        if self.effects.is_empty() {
            return;
        }
        self.current = (self.current + self.effects.len() - 1) % self.effects.len();
        tracing::info!(effect = self.effect_name(), "switched effect");
    }
}
