mod py_bbox;
mod py_detection;
mod py_track;
mod py_track_store;

pub use py_bbox::PyBBox;
pub use py_detection::PyDetection;
pub use py_track::PyTrack;
pub use py_track_store::PyTrackStore;
