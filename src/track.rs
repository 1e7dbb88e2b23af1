use std::time::{Duration, Instant};

use crate::{bbox::BBox, detection::Detection};

/// One persistent identity followed across detection cycles.
#[derive(Clone, Debug)]
pub struct Track {
    pub id: u64,
    pub class: u32,
    pub class_name: Option<String>,
    /// Running average of matched detection confidences.
    pub score: f64,
    pub last_seen: Instant,
    /// Latest observed position, replaced on every match.
    pub target: BBox,
    /// Smoothed position shown to the renderer.
    pub display: BBox,
}

impl AsRef<Track> for Track {
    fn as_ref(&self) -> &Track {
        self
    }
}

impl Track {
    pub fn new(id: u64, detection: &Detection, now: Instant) -> Self {
        Self {
            id,
            class: detection.class,
            class_name: detection.class_name.clone(),
            score: detection.score,
            last_seen: now,
            target: detection.bbox,
            display: detection.bbox,
        }
    }

    /// Folds a matching detection into the track. `display` is left for the
    /// smoother to move.
    pub fn update(&mut self, detection: &Detection, score_blend: f64, now: Instant) {
        self.target = detection.bbox;
        self.score = self.score * (1.0 - score_blend) + detection.score * score_blend;
        self.last_seen = now;
    }

    pub fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) > ttl
    }

    pub fn view(&self) -> TrackView {
        TrackView {
            id: self.id,
            class: self.class,
            class_name: self.class_name.clone(),
            score: self.score,
            display: self.display,
        }
    }
}

/// Read-only copy of a track handed to renderers.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackView {
    pub id: u64,
    pub class: u32,
    pub class_name: Option<String>,
    pub score: f64,
    pub display: BBox,
}
