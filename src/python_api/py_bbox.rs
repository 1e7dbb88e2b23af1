use pyo3::{pyclass, pymethods};

use crate::BBox;

#[pyclass(name = "BBox")]
#[derive(Clone)]
pub struct PyBBox {
    pub inner: BBox,
}

#[pymethods]
impl PyBBox {
    #[new]
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self {
            inner: BBox::new(x, y, w, h),
        }
    }

    #[staticmethod]
    pub fn from_corners(x_1: f64, y_1: f64, x_2: f64, y_2: f64) -> Self {
        Self {
            inner: BBox::from_corners(x_1, y_1, x_2, y_2),
        }
    }

    #[getter]
    fn x(&self) -> f64 {
        self.inner.x
    }

    #[getter]
    fn y(&self) -> f64 {
        self.inner.y
    }

    #[getter]
    fn w(&self) -> f64 {
        self.inner.w
    }

    #[getter]
    fn h(&self) -> f64 {
        self.inner.h
    }

    fn iou(&self, other: &PyBBox) -> f64 {
        self.inner.iou(&other.inner)
    }

    fn __repr__(&self) -> String {
        format!(
            "BBox(x={}, y={}, w={}, h={})",
            self.x(),
            self.y(),
            self.w(),
            self.h()
        )
    }

    fn __str__(&self) -> String {
        self.__repr__()
    }
}
