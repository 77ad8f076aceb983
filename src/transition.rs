//! Time-driven animation of on-screen elements.
//!
//! An [`Animated`] value interpolates from a start to an end over a fixed
//! duration, sampled against the wall clock.  Nothing here counts frames, so
//! a dropped frame or a different frame rate changes smoothness but never
//! speed.
//!
//! ## For contributors
//!
//! * To animate a new kind of value, implement [`Lerp`] for it.
//! * Always pass the frame's `now` in; never call `Instant::now()` inside an
//!   effect's drawing code, or tests lose their determinism.

use std::time::{Duration, Instant};

use crate::gfx::Rgb;

/// Linear interpolation between two values.  `t` is already clamped to
/// `[0, 1]` by the caller.
pub trait Lerp: Copy {
    fn lerp(self, end: Self, t: f32) -> Self;
}

impl Lerp for f32 {
    fn lerp(self, end: Self, t: f32) -> Self {
        if t >= 1.0 {
            return end;
        }
        self + (end - self) * t
    }
}

/// A position on the matrix, in pixels.  Fractional so slow motion does not
/// stutter between whole pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl Lerp for Point {
    fn lerp(self, end: Self, t: f32) -> Self {
        Point {
            x: self.x.lerp(end.x, t),
            y: self.y.lerp(end.y, t),
        }
    }
}

// ---------------------------------------------------------------------------
// Animated
// ---------------------------------------------------------------------------

/// One interpolation from `start` to `end`.
#[derive(Debug, Clone)]
pub struct Animated<T: Lerp> {
    start: T,
    end: T,
    started_at: Instant,
    duration: Duration,
    current: T,
}

impl<T: Lerp> Animated<T> {
    /// An element already sitting at `value`.
    pub fn at_rest(value: T, now: Instant) -> Self {
        Self::new(value, value, Duration::ZERO, now)
    }

    pub fn new(start: T, end: T, duration: Duration, now: Instant) -> Self {
        Self {
            start,
            end,
            started_at: now,
            duration,
            current: start,
        }
    }

    /// Fraction of the interpolation elapsed at `now`, always in `[0, 1]`.
    pub fn progress(&self, now: Instant) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started_at);
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).clamp(0.0, 1.0)
    }

    /// The interpolated value at `now`, without recording it.
    pub fn value_at(&self, now: Instant) -> T {
        self.start.lerp(self.end, self.progress(now))
    }

    /// Advance to `now` and return the value to draw.
    pub fn sample(&mut self, now: Instant) -> T {
        self.current = self.value_at(now);
        self.current
    }

    pub fn is_settled(&self, now: Instant) -> bool {
        self.progress(now) >= 1.0
    }

    /// Point the element at a new end value.
    ///
    /// A settled element starts again from `start`; one still moving starts
    /// from wherever it is at `now`, so a retarget never makes it jump.
    pub fn retarget(&mut self, end: T, start: T, duration: Duration, now: Instant) {
        let from = if self.is_settled(now) {
            start
        } else {
            self.value_at(now)
        };
        *self = Self::new(from, end, duration, now);
    }

    /// The last sampled value.
    #[cfg(test)]
    pub fn current(&self) -> T {
        self.current
    }

    #[cfg(test)]
    pub fn end(&self) -> T {
        self.end
    }
}

// ---------------------------------------------------------------------------
// AnimatedText
// ---------------------------------------------------------------------------

/// A label that flies to its position.  Text and colour switch immediately on
/// retarget; only the position is interpolated.
#[derive(Debug, Clone)]
pub struct AnimatedText {
    pub text: String,
    pub color: Rgb,
    position: Animated<Point>,
}

impl AnimatedText {
    pub fn new(text: impl Into<String>, color: Rgb, at: Point, now: Instant) -> Self {
        Self {
            text: text.into(),
            color,
            position: Animated::at_rest(at, now),
        }
    }

    pub fn retarget(&mut self, text: impl Into<String>, color: Rgb, to: Point, from: Point, duration: Duration, now: Instant) {
        self.text = text.into();
        self.color = color;
        self.position.retarget(to, from, duration, now);
    }

    pub fn sample(&mut self, now: Instant) -> Point {
        self.position.sample(now)
    }

    #[cfg(test)]
    pub fn target(&self) -> Point {
        self.position.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    // -- progress ------------------------------------------------------------

    #[test]
    fn progress_is_clamped() {
        let t0 = Instant::now() + Duration::from_secs(5);
        let anim = Animated::new(0.0_f32, 10.0, ms(1000), t0);

        assert_eq!(anim.progress(t0 - ms(500)), 0.0, "before start");
        assert_eq!(anim.progress(t0 + ms(500)), 0.5);
        assert_eq!(anim.progress(t0 + ms(5000)), 1.0, "long after end");
    }

    #[test]
    fn zero_duration_is_immediately_done() {
        let t0 = Instant::now();
        let anim = Animated::new(3.0_f32, 7.0, Duration::ZERO, t0);
        assert_eq!(anim.value_at(t0), 7.0);
        assert!(anim.is_settled(t0));
    }

    // -- sample --------------------------------------------------------------

    #[test]
    fn sample_lands_exactly_on_end() {
        let t0 = Instant::now();
        // 0.1 is not representable exactly; interpolation must not leave a
        // residue at the end.
        let mut anim = Animated::new(0.1_f32, 57.3, ms(750), t0);
        assert_eq!(anim.sample(t0 + ms(750)), 57.3);
        assert_eq!(anim.sample(t0 + ms(10_000)), 57.3);
        assert_eq!(anim.current(), 57.3);
    }

    #[test]
    fn sample_is_monotonic_in_time() {
        let t0 = Instant::now();
        let mut anim = Animated::new(-128.0_f32, 2.0, ms(1000), t0);
        let mut previous = f32::MIN;
        for step in 0..=120 {
            let value = anim.sample(t0 + ms(step * 10));
            assert!(value >= previous, "step {step}: {value} < {previous}");
            previous = value;
        }
        assert_eq!(previous, 2.0);
    }

    #[test]
    fn sampling_depends_on_elapsed_time_not_call_count() {
        let t0 = Instant::now();
        let mut sparse = Animated::new(0.0_f32, 100.0, ms(1000), t0);
        let mut dense = sparse.clone();

        for step in 1..=40 {
            dense.sample(t0 + ms(step * 10));
        }
        assert_eq!(sparse.sample(t0 + ms(400)), dense.current());
    }

    #[test]
    fn points_interpolate_per_axis() {
        let t0 = Instant::now();
        let anim = Animated::new(Point::new(0.0, 10.0), Point::new(20.0, 0.0), ms(1000), t0);
        assert_eq!(anim.value_at(t0 + ms(500)), Point::new(10.0, 5.0));
    }

    // -- retarget ------------------------------------------------------------

    #[test]
    fn retarget_mid_flight_starts_from_current_position() {
        let t0 = Instant::now();
        let mut anim = Animated::new(0.0_f32, 100.0, ms(1000), t0);
        let mid = t0 + ms(250);
        let before = anim.sample(mid);

        anim.retarget(-50.0, -200.0, ms(500), mid);
        assert_eq!(anim.sample(mid), before, "no snap on retarget");
        assert_eq!(anim.sample(mid + ms(500)), -50.0);
    }

    #[test]
    fn retarget_when_settled_uses_given_start() {
        let t0 = Instant::now();
        let mut anim = Animated::new(0.0_f32, 100.0, ms(100), t0);
        let later = t0 + ms(200);
        anim.sample(later);

        anim.retarget(30.0, -64.0, ms(500), later);
        assert_eq!(anim.sample(later), -64.0);
        assert_eq!(anim.sample(later + ms(500)), 30.0);
    }

    #[test]
    fn text_switches_immediately_but_position_moves() {
        let t0 = Instant::now();
        let mut label = AnimatedText::new("AAPL", Rgb::WHITE, Point::new(1.0, 1.0), t0);

        label.retarget("MSFT", Rgb::GREEN, Point::new(1.0, 1.0), Point::new(-64.0, 1.0), ms(500), t0);
        assert_eq!(label.text, "MSFT");
        assert_eq!(label.color, Rgb::GREEN);
        assert_eq!(label.sample(t0), Point::new(-64.0, 1.0));
        assert_eq!(label.sample(t0 + ms(500)), Point::new(1.0, 1.0));
        assert_eq!(label.target(), Point::new(1.0, 1.0));
    }
}
