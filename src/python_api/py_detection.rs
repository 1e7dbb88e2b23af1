use pyo3::{PyResult, exceptions::PyValueError, pyclass, pymethods};

use crate::{Detection, RawDetection, python_api::PyBBox};

#[pyclass(name = "Detection")]
pub struct PyDetection {
    pub inner: Detection,
}

#[pymethods]
impl PyDetection {
    /// Validates the detection the same way detector output is validated.
    #[new]
    #[pyo3(signature = (bbox, class_id, score, class_name=None))]
    pub fn new(bbox: &PyBBox, class_id: u32, score: f64, class_name: Option<String>) -> PyResult<Self> {
        let b = bbox.inner;
        let raw = RawDetection {
            class_name,
            ..RawDetection::new(b.x, b.y, b.x_2(), b.y_2(), score, class_id as f64)
        };
        let inner = Detection::try_from(raw).map_err(|e| PyValueError::new_err(e.to_string()))?;
        Ok(Self { inner })
    }

    #[getter]
    fn bbox(&self) -> PyBBox {
        PyBBox {
            inner: self.inner.bbox,
        }
    }

    #[getter]
    fn class_id(&self) -> u32 {
        self.inner.class
    }

    #[getter]
    fn score(&self) -> f64 {
        self.inner.score
    }

    #[getter]
    fn class_name(&self) -> Option<String> {
        self.inner.class_name.clone()
    }
}
