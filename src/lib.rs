mod associate;
mod bbox;
mod config;
mod detection;
mod error;
mod letterbox;
mod overlay;
mod pipeline;
#[cfg(feature = "python")]
mod python_api;
mod smoother;
mod track;
mod track_store;

pub use associate::{Assignment, associate, greedy_associate, optimal_associate};
pub use bbox::BBox;
pub use config::{AssignmentStrategy, PipelineConfig, TrackerConfig};
pub use detection::{
    Detection, Detector, Frame, RawDetection, decode_model_rows, decode_response, validate_batch,
};
pub use error::{ConfigError, DetectionError, DetectorError, PipelineError};
pub use letterbox::{CoordinateMapper, DisplaySurface, Letterbox, MAX_CANVAS_DPR, Padding};
pub use overlay::{
    Hsl, LabelMap, OverlayFrame, OverlayItem, OverlayStyle, label_text, layout_overlay,
};
pub use pipeline::{Pipeline, PipelineStats, PollOutcome, RateMeter};
pub use smoother::Smoother;
pub use track::{Track, TrackView};
pub use track_store::TrackStore;

#[cfg(feature = "python")]
use pyo3::{
    Bound, PyResult, pymodule,
    types::{PyModule, PyModuleMethods},
};

#[cfg(feature = "python")]
use crate::python_api::{PyBBox, PyDetection, PyTrack, PyTrackStore};

#[cfg(feature = "python")]
#[pymodule]
fn overlay_tracker(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyBBox>()?;
    m.add_class::<PyDetection>()?;
    m.add_class::<PyTrack>()?;
    m.add_class::<PyTrackStore>()?;

    Ok(())
}
