use std::f32::consts::TAU;

use chrono::Timelike;

use super::{Effect, Frame};
use crate::gfx::Rgb;

/// Analog clock face.  Has no data source; it draws straight from the
/// frame's local time.
#[derive(Debug, Default)]
pub struct ClockEffect;

impl ClockEffect {
    pub fn new() -> Self {
        Self
    }
}

/// End of a hand of `length` at `turns` of a full revolution clockwise from
/// twelve o'clock.
fn hand(cx: i32, cy: i32, length: f32, turns: f32) -> (i32, i32) {
    let angle = turns * TAU;
    (
        (cx as f32 + length * angle.sin()).round() as i32,
        (cy as f32 - length * angle.cos()).round() as i32,
    )
}

impl Effect for ClockEffect {
    fn name(&self) -> &'static str {
        "clock"
    }

    fn frames_per_second(&self) -> u32 {
        60
    }

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let time = frame.local.time();
        let seconds = time.second() as f32 + time.nanosecond().min(999_999_999) as f32 / 1e9;
        let minutes = time.minute() as f32 + seconds / 60.0;
        let hours = (time.hour() % 12) as f32 + minutes / 60.0;

        let canvas = &mut *frame.canvas;
        let (cx, cy) = (canvas.width() / 2, canvas.height() / 2);
        let radius = canvas.width().min(canvas.height()) as f32 / 2.0 - 0.5;

        canvas.fill_screen(Rgb::BLACK);
        canvas.draw_circle(cx, cy, 1.0, Rgb::BLUE);

        let (hx, hy) = hand(cx, cy, (radius - 3.0) * 0.75, hours / 12.0);
        let (mx, my) = hand(cx, cy, radius, minutes / 60.0);
        let (sx, sy) = hand(cx, cy, radius, seconds / 60.0);
        canvas.draw_line(cx, cy, hx, hy, Rgb::YELLOW);
        canvas.draw_line(cx, cy, mx, my, Rgb::YELLOW);
        canvas.draw_line(cx, cy, sx, sy, Rgb::WHITE);

        canvas.draw_circle(cx, cy, radius, Rgb::BLUE);
        canvas.draw_circle(cx, cy, radius + 1.0, Rgb::GREEN);

        for mark in 0..12 {
            let turns = mark as f32 / 12.0;
            let (x0, y0) = hand(cx, cy, radius - 4.0, turns);
            let (x1, y1) = hand(cx, cy, radius - 1.0, turns);
            canvas.draw_line(x0, y0, x1, y1, Rgb::RED);
        }
    }
}
