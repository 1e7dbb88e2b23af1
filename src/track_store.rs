use std::time::Instant;

use tracing::{debug, warn};

use crate::{
    associate::associate,
    config::TrackerConfig,
    detection::Detection,
    smoother::Smoother,
    track::{Track, TrackView},
};

/// Owner of the authoritative track set.
///
/// Tracks are changed only through [`apply_detections`](Self::apply_detections)
/// and [`tick`](Self::tick); renderers read point-in-time snapshots.
pub struct TrackStore {
    tracks: Vec<Track>,
    next_id: u64,
    smoother: Smoother,
    config: TrackerConfig,
}

impl TrackStore {
    /// `config` is expected to have passed [`TrackerConfig::validate`].
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 1,
            smoother: Smoother::new(config.smoothing_rate, config.max_smoothing_step()),
            config,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Reconciles one batch of validated detections with the current tracks.
    ///
    /// ## Args
    ///  - detections: One detector response, already in source space.
    ///  - now: Time the response was received; stamped as `last_seen`.
    ///
    /// Matched tracks take the detection's box as their new target and blend
    /// its score in. Detections without a match start new tracks. Tracks left
    /// unmatched are not touched; only the expiry sweep removes them.
    pub fn apply_detections(&mut self, detections: &[Detection], now: Instant) {
        let detections: Vec<&Detection> = detections
            .iter()
            .filter(|detection| {
                let degenerate = detection.bbox.is_degenerate();
                if degenerate {
                    warn!(bbox = ?detection.bbox, "ignoring degenerate detection");
                }
                !degenerate
            })
            .collect();
        if detections.is_empty() {
            return;
        }

        let assignment = associate(
            &detections,
            &self.tracks,
            self.config.match_iou,
            self.config.assignment,
        );

        for &(i, j) in assignment.matched.iter() {
            self.tracks[j].update(detections[i], self.config.score_blend, now);
        }
        for &i in assignment.unmatched_detections.iter() {
            let track = Track::new(self.next_id, detections[i], now);
            debug!(id = track.id, class = track.class, "track created");
            self.next_id += 1;
            self.tracks.push(track);
        }
    }

    /// Advances smoothing and then drops expired tracks.
    pub fn tick(&mut self, now: Instant) {
        self.smoother.advance(self.tracks.iter_mut(), now);
        self.purge_expired(now);
    }

    pub fn purge_expired(&mut self, now: Instant) {
        let ttl = self.config.ttl();
        self.tracks.retain(|track| {
            let expired = track.is_expired(now, ttl);
            if expired {
                debug!(id = track.id, "track expired");
            }
            !expired
        });
    }

    /// Live tracks as of `now`. Tracks past their TTL are left out even when
    /// no tick has purged them yet.
    pub fn snapshot(&self, now: Instant) -> Vec<TrackView> {
        let ttl = self.config.ttl();
        self.tracks
            .iter()
            .filter(|track| !track.is_expired(now, ttl))
            .map(Track::view)
            .collect()
    }

    /// Drops every track. Ids keep counting so none is ever handed out twice.
    pub fn clear(&mut self) {
        self.tracks.clear();
        self.smoother.reset();
    }
}

impl Default for TrackStore {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, time::Duration};

    use super::*;
    use crate::{bbox::BBox, config::AssignmentStrategy};

    fn detection(x: f64, y: f64, class: u32, score: f64) -> Detection {
        Detection::new(BBox::new(x, y, 10.0, 10.0), class, score)
    }

    fn ms(start: Instant, millis: u64) -> Instant {
        start + Duration::from_millis(millis)
    }

    #[test]
    fn test_empty_store_creates_one_track_per_detection() {
        let now = Instant::now();
        let mut store = TrackStore::default();
        let detections: Vec<Detection> = (0..5)
            .map(|i| detection(i as f64 * 100.0, 0.0, i, 0.9))
            .collect();

        store.apply_detections(&detections, now);
        let snapshot = store.snapshot(now);
        let ids: HashSet<u64> = snapshot.iter().map(|t| t.id).collect();

        assert_eq!(snapshot.len(), 5);
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn test_matched_track_keeps_its_id() {
        let start = Instant::now();
        let mut store = TrackStore::default();

        store.apply_detections(&[detection(0.0, 0.0, 0, 0.9)], start);
        let id = store.snapshot(start)[0].id;
        store.apply_detections(&[detection(3.0, 0.0, 0, 0.8)], ms(start, 100));

        let snapshot = store.snapshot(ms(start, 100));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, id);
        assert!((snapshot[0].score - 0.87).abs() < 1e-12);
        assert_eq!(store.tracks[0].target, BBox::new(3.0, 0.0, 10.0, 10.0));
    }

    #[test]
    fn test_same_box_different_class_spawns_second_track() {
        let now = Instant::now();
        let mut store = TrackStore::default();

        store.apply_detections(&[detection(0.0, 0.0, 0, 0.9)], now);
        store.apply_detections(&[detection(0.0, 0.0, 1, 0.9)], now);

        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_same_class_low_overlap_spawns_independent_tracks() {
        let now = Instant::now();
        let mut store = TrackStore::default();

        store.apply_detections(&[detection(0.0, 0.0, 0, 0.9), detection(8.0, 0.0, 0, 0.9)], now);

        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_unmatched_track_is_frozen_until_expiry() {
        let start = Instant::now();
        let mut store = TrackStore::default();
        store.apply_detections(&[detection(0.0, 0.0, 0, 0.9)], start);

        store.apply_detections(&[detection(500.0, 500.0, 0, 0.5)], ms(start, 50));

        let original = &store.tracks[0];
        assert_eq!(original.target, BBox::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(original.score, 0.9);
        assert_eq!(original.last_seen, start);
    }

    #[test]
    fn test_degenerate_detection_is_ignored() {
        let now = Instant::now();
        let mut store = TrackStore::default();

        store.apply_detections(
            &[
                Detection::new(BBox::new(0.0, 0.0, 0.0, 10.0), 0, 0.9),
                Detection::new(BBox::new(0.0, 0.0, 10.0, -1.0), 0, 0.9),
                detection(0.0, 0.0, 0, 0.9),
            ],
            now,
        );

        assert_eq!(store.len(), 1);
        assert_eq!(store.snapshot(now)[0].id, 1);
    }

    #[test]
    fn test_expiry_boundary() {
        let start = Instant::now();
        let mut store = TrackStore::default();
        store.apply_detections(&[detection(0.0, 0.0, 0, 0.9)], start);

        assert_eq!(store.snapshot(ms(start, 399)).len(), 1);
        assert!(store.snapshot(ms(start, 401)).is_empty());

        store.tick(ms(start, 399));
        assert_eq!(store.len(), 1);
        store.tick(ms(start, 401));
        assert!(store.is_empty());
    }

    #[test]
    fn test_reappearing_object_gets_new_id() {
        let start = Instant::now();
        let mut store = TrackStore::default();
        store.apply_detections(&[detection(0.0, 0.0, 0, 0.9)], start);
        let first = store.snapshot(start)[0].id;

        store.tick(ms(start, 500));
        store.apply_detections(&[detection(0.0, 0.0, 0, 0.9)], ms(start, 510));

        let snapshot = store.snapshot(ms(start, 510));
        assert_eq!(snapshot.len(), 1);
        assert_ne!(snapshot[0].id, first);
    }

    #[test]
    fn test_clear_does_not_recycle_ids() {
        let now = Instant::now();
        let mut store = TrackStore::default();
        store.apply_detections(&[detection(0.0, 0.0, 0, 0.9)], now);
        let first = store.snapshot(now)[0].id;

        store.clear();
        store.apply_detections(&[detection(0.0, 0.0, 0, 0.9)], now);

        assert_eq!(store.len(), 1);
        assert!(store.snapshot(now)[0].id > first);
    }

    #[test]
    fn test_tick_smooths_display_toward_target() {
        let start = Instant::now();
        let mut store = TrackStore::default();
        store.apply_detections(&[detection(0.0, 0.0, 0, 0.9)], start);
        store.tick(start);
        store.apply_detections(&[detection(4.0, 0.0, 0, 0.9)], ms(start, 16));

        store.tick(ms(start, 32));

        let display = store.snapshot(ms(start, 32))[0].display;
        assert!(display.x > 0.0 && display.x < 4.0);
        assert_eq!(display.y, 0.0);
    }

    #[test]
    fn test_optimal_strategy_is_used_when_configured() {
        let now = Instant::now();
        let mut store = TrackStore::new(TrackerConfig {
            assignment: AssignmentStrategy::Optimal,
            ..TrackerConfig::default()
        });
        store.apply_detections(&[detection(0.0, 0.0, 0, 0.9), detection(7.0, 0.0, 0, 0.9)], now);

        store.apply_detections(&[detection(2.5, 0.0, 0, 0.9), detection(-2.0, 0.0, 0, 0.9)], now);

        assert_eq!(store.len(), 2);
    }
}
