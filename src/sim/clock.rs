//! Frame pacing for level simulations
//!
//! The platform calls [`GameClock::frame`] once per display refresh with a
//! monotonic timestamp; the clock turns that into a clamped delta and hands
//! it to the active level.

use crate::consts::DEFAULT_MAX_FRAME_DELTA_MS;

#[derive(Debug, Clone)]
pub struct GameClock {
    active: bool,
    last_timestamp: Option<f64>,
    max_delta_ms: f32,
}

impl Default for GameClock {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_DELTA_MS)
    }
}

impl GameClock {
    pub fn new(max_delta_ms: f32) -> Self {
        Self {
            active: false,
            last_timestamp: None,
            max_delta_ms: max_delta_ms.max(1.0),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn max_delta_ms(&self) -> f32 {
        self.max_delta_ms
    }

    /// Start or stop ticking. Stopping forgets the last timestamp so a later
    /// restart does not produce one huge delta.
    pub fn set_active(&mut self, active: bool) {
        if self.active == active {
            return;
        }
        self.active = active;
        if !active {
            self.last_timestamp = None;
        }
    }

    /// Process one display frame. Returns the delta handed to `on_tick`, if any.
    pub fn frame<F: FnMut(f32)>(&mut self, now_ms: f64, mut on_tick: F) -> Option<f32> {
        if !self.active {
            return None;
        }
        let Some(last) = self.last_timestamp.replace(now_ms) else {
            // First frame after activation only primes the timestamp
            return None;
        };
        let delta = ((now_ms - last) as f32).clamp(0.0, self.max_delta_ms);
        on_tick(delta);
        Some(delta)
    }

    /// Convenience wrapper: set activity, then process the frame
    pub fn run<F: FnMut(f32)>(&mut self, now_ms: f64, active: bool, on_tick: F) -> Option<f32> {
        self.set_active(active);
        self.frame(now_ms, on_tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_frame_only_records() {
        let mut clock = GameClock::default();
        clock.set_active(true);
        let mut calls = 0;
        assert_eq!(clock.frame(1000.0, |_| calls += 1), None);
        assert_eq!(calls, 0);
        assert_eq!(clock.frame(1016.0, |_| calls += 1), Some(16.0));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_inactive_clock_never_ticks() {
        let mut clock = GameClock::default();
        let mut calls = 0;
        clock.frame(0.0, |_| calls += 1);
        clock.frame(16.0, |_| calls += 1);
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_large_delta_is_clamped() {
        let mut clock = GameClock::new(100.0);
        clock.set_active(true);
        clock.frame(0.0, |_| {});
        assert_eq!(clock.frame(5000.0, |_| {}), Some(100.0));
    }

    #[test]
    fn test_backwards_timestamp_is_zero() {
        let mut clock = GameClock::default();
        clock.set_active(true);
        clock.frame(500.0, |_| {});
        assert_eq!(clock.frame(400.0, |_| {}), Some(0.0));
    }

    #[test]
    fn test_reactivation_forgets_timestamp() {
        let mut clock = GameClock::default();
        clock.set_active(true);
        clock.frame(0.0, |_| {});
        clock.frame(16.0, |_| {});
        clock.set_active(false);
        let mut deltas = Vec::new();
        assert_eq!(clock.run(10_000.0, true, |d| deltas.push(d)), None);
        assert_eq!(clock.run(10_020.0, true, |d| deltas.push(d)), Some(20.0));
        assert_eq!(deltas, vec![20.0]);
    }
}
