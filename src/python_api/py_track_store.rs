use std::time::{Duration, Instant};

use pyo3::{PyRef, PyResult, exceptions::PyValueError, pyclass, pymethods};

use crate::{
    AssignmentStrategy, Detection, TrackStore, TrackerConfig,
    python_api::{PyDetection, PyTrack},
};

/// Track store driven by caller supplied millisecond timestamps.
#[pyclass(name = "TrackStore")]
pub struct PyTrackStore {
    inner: TrackStore,
    origin: Instant,
}

impl PyTrackStore {
    fn instant(&self, now_ms: f64) -> PyResult<Instant> {
        if !(now_ms.is_finite() && now_ms >= 0.0) {
            return Err(PyValueError::new_err(format!(
                "timestamp must be a non-negative number of milliseconds, got {now_ms}"
            )));
        }
        Ok(self.origin + Duration::from_secs_f64(now_ms / 1000.0))
    }
}

#[pymethods]
impl PyTrackStore {
    #[new]
    #[pyo3(signature = (match_iou=0.3, ttl_ms=400, smoothing_rate=8.0, optimal=false))]
    pub fn new(match_iou: f64, ttl_ms: u64, smoothing_rate: f64, optimal: bool) -> PyResult<Self> {
        let config = TrackerConfig {
            match_iou,
            ttl_ms,
            smoothing_rate,
            assignment: if optimal {
                AssignmentStrategy::Optimal
            } else {
                AssignmentStrategy::Greedy
            },
            ..TrackerConfig::default()
        };
        config
            .validate()
            .map_err(|e| PyValueError::new_err(e.to_string()))?;

        Ok(Self {
            inner: TrackStore::new(config),
            origin: Instant::now(),
        })
    }

    pub fn update(&mut self, detections: Vec<PyRef<PyDetection>>, now_ms: f64) -> PyResult<()> {
        let now = self.instant(now_ms)?;
        let inner_detections = detections
            .iter()
            .map(|detection| detection.inner.clone())
            .collect::<Vec<Detection>>();
        self.inner.apply_detections(&inner_detections, now);
        Ok(())
    }

    pub fn tick(&mut self, now_ms: f64) -> PyResult<Vec<PyTrack>> {
        let now = self.instant(now_ms)?;
        self.inner.tick(now);
        Ok(self.inner.snapshot(now).into_iter().map(PyTrack::from).collect())
    }

    pub fn snapshot(&self, now_ms: f64) -> PyResult<Vec<PyTrack>> {
        let now = self.instant(now_ms)?;
        Ok(self.inner.snapshot(now).into_iter().map(PyTrack::from).collect())
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }
}
