use std::time::{Duration, Instant};

use crate::{bbox::BBox, track::Track};

/// Moves each track's `display` box toward its `target` with exponential
/// convergence measured against wall time, so the visual speed does not
/// depend on how often detections or render ticks arrive.
#[derive(Clone, Debug)]
pub struct Smoother {
    rate: f64,
    max_step: Duration,
    last_tick: Option<Instant>,
}

impl Smoother {
    /// `rate` is the convergence rate per second and must be positive.
    pub fn new(rate: f64, max_step: Duration) -> Self {
        Self {
            rate,
            max_step,
            last_tick: None,
        }
    }

    /// Fraction of the remaining distance covered over `dt`. Lies in `[0, 1)`.
    pub fn blend_factor(&self, dt: Duration) -> f64 {
        1.0 - (-self.rate * dt.as_secs_f64()).exp()
    }

    /// Elapsed time since the previous tick, capped at `max_step`. The first
    /// tick after construction or [`reset`](Self::reset) has no predecessor
    /// and yields zero.
    pub fn step(&mut self, now: Instant) -> Duration {
        let dt = self
            .last_tick
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or_default()
            .min(self.max_step);
        self.last_tick = Some(now);
        dt
    }

    pub fn advance<'a>(&mut self, tracks: impl IntoIterator<Item = &'a mut Track>, now: Instant) {
        let dt = self.step(now);
        let k = self.blend_factor(dt);
        if k == 0.0 {
            return;
        }
        for track in tracks {
            track.display = approach(&track.display, &track.target, k);
        }
    }

    pub fn reset(&mut self) {
        self.last_tick = None;
    }
}

fn approach(display: &BBox, target: &BBox, k: f64) -> BBox {
    let display = display.to_vector();
    BBox::from_vector(&(display + (target.to_vector() - display) * k))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Detection;

    fn moved_track(now: Instant) -> Track {
        let mut track = Track::new(1, &Detection::new(BBox::new(0.0, 0.0, 10.0, 10.0), 0, 0.9), now);
        track.target = BBox::new(100.0, -50.0, 20.0, 5.0);
        track
    }

    #[test]
    fn test_first_tick_does_not_move() {
        let now = Instant::now();
        let mut smoother = Smoother::new(8.0, Duration::from_millis(100));
        let mut tracks = vec![moved_track(now)];

        smoother.advance(&mut tracks, now);

        assert_eq!(tracks[0].display, BBox::new(0.0, 0.0, 10.0, 10.0));
    }

    #[test]
    fn test_converges_monotonically_without_overshoot() {
        let start = Instant::now();
        let mut smoother = Smoother::new(10.0, Duration::from_millis(100));
        let mut tracks = vec![moved_track(start)];
        let target = tracks[0].target.to_vector();
        smoother.advance(&mut tracks, start);

        let mut previous = tracks[0].display.to_vector();
        for frame in 1..=120 {
            smoother.advance(&mut tracks, start + Duration::from_micros(16_667 * frame));
            let current = tracks[0].display.to_vector();
            for c in 0..4 {
                let before = (target[c] - previous[c]).abs();
                let after = (target[c] - current[c]).abs();
                assert!(after <= before, "component {c} moved away");
                assert!((target[c] - current[c]) * (target[c] - previous[c]) >= 0.0, "overshoot");
            }
            previous = current;
        }

        assert!((previous - target).amax() < 1e-5);
    }

    #[test]
    fn test_blend_factor_matches_exponential_formula() {
        let smoother = Smoother::new(8.0, Duration::from_millis(100));
        let k = smoother.blend_factor(Duration::from_millis(50));

        assert!((k - (1.0 - (-0.4f64).exp())).abs() < 1e-12);
        assert_eq!(smoother.blend_factor(Duration::ZERO), 0.0);
    }

    #[test]
    fn test_long_stall_is_capped() {
        let start = Instant::now();
        let mut smoother = Smoother::new(8.0, Duration::from_millis(100));
        smoother.step(start);

        assert_eq!(smoother.step(start + Duration::from_secs(5)), Duration::from_millis(100));
    }

    #[test]
    fn test_static_target_holds_display() {
        let start = Instant::now();
        let mut smoother = Smoother::new(8.0, Duration::from_millis(100));
        let mut tracks = vec![Track::new(
            3,
            &Detection::new(BBox::new(4.0, 4.0, 8.0, 8.0), 0, 0.9),
            start,
        )];

        smoother.advance(&mut tracks, start);
        smoother.advance(&mut tracks, start + Duration::from_millis(16));

        assert_eq!(tracks[0].display, BBox::new(4.0, 4.0, 8.0, 8.0));
    }
}
