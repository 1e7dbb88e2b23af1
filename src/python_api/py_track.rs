use pyo3::{pyclass, pymethods};

use crate::{TrackView, python_api::PyBBox};

#[pyclass(name = "Track")]
pub struct PyTrack {
    #[pyo3(get)]
    pub id: u64,
    #[pyo3(get)]
    pub class_id: u32,
    #[pyo3(get)]
    pub class_name: Option<String>,
    #[pyo3(get)]
    pub score: f64,
    pub display: PyBBox,
}

impl From<TrackView> for PyTrack {
    fn from(view: TrackView) -> Self {
        Self {
            id: view.id,
            class_id: view.class,
            class_name: view.class_name,
            score: view.score,
            display: PyBBox {
                inner: view.display,
            },
        }
    }
}

#[pymethods]
impl PyTrack {
    #[getter]
    fn display(&self) -> PyBBox {
        self.display.clone()
    }
}
