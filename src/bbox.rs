use nalgebra::Vector4;
use serde::{Deserialize, Serialize};

/// Axis aligned box stored as top-left corner plus extent.
#[derive(Clone, Copy, Default, Debug, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl BBox {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        BBox { x, y, w, h }
    }

    pub fn from_corners(x_1: f64, y_1: f64, x_2: f64, y_2: f64) -> Self {
        BBox {
            x: x_1,
            y: y_1,
            w: x_2 - x_1,
            h: y_2 - y_1,
        }
    }

    pub fn x_2(&self) -> f64 {
        self.x + self.w
    }

    pub fn y_2(&self) -> f64 {
        self.y + self.h
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn area(&self) -> f64 {
        self.w * self.h
    }

    /// True when the box has no usable area or carries non-finite values.
    pub fn is_degenerate(&self) -> bool {
        !(self.w > 0.0 && self.h > 0.0)
            || ![self.x, self.y, self.w, self.h]
                .iter()
                .all(|v| v.is_finite())
    }

    pub fn iou(&self, other: &Self) -> f64 {
        let iwidth = (self.x_2().min(other.x_2()) - self.x.max(other.x)).max(0.0);
        let iheight = (self.y_2().min(other.y_2()) - self.y.max(other.y)).max(0.0);
        let iarea = iwidth * iheight;

        let union = self.area() + other.area() - iarea;

        if union <= 0.0 {
            return 0.0;
        }

        iarea / union
    }

    pub fn to_vector(&self) -> Vector4<f64> {
        Vector4::new(self.x, self.y, self.w, self.h)
    }

    pub fn from_vector(v: &Vector4<f64>) -> Self {
        BBox::new(v[0], v[1], v[2], v[3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_corners_computes_extent() {
        let bbox = BBox::from_corners(1.0, 2.0, 4.0, 8.0);

        assert_eq!(bbox, BBox::new(1.0, 2.0, 3.0, 6.0));
        assert_eq!(bbox.x_2(), 4.0);
        assert_eq!(bbox.y_2(), 8.0);
    }

    #[test]
    fn test_inverted_corners_are_degenerate() {
        assert!(BBox::from_corners(3.0, 4.0, 2.0, 5.0).is_degenerate());
        assert!(BBox::new(0.0, 0.0, 0.0, 1.0).is_degenerate());
        assert!(BBox::new(f64::NAN, 0.0, 1.0, 1.0).is_degenerate());
        assert!(!BBox::new(0.0, 0.0, 1.0, 1.0).is_degenerate());
    }

    #[test]
    fn test_iou_of_identical_boxes_is_one() {
        let bbox = BBox::new(10.0, 20.0, 30.0, 40.0);

        assert_eq!(bbox.iou(&bbox), 1.0);
    }

    #[test]
    fn test_iou_returns_correct_value_1() {
        let bbox_1 = BBox::from_corners(1.0, 1.0, 2.0, 2.0);
        let bbox_2 = BBox::from_corners(1.0, 1.0, 1.5, 1.5);

        assert_eq!(bbox_1.iou(&bbox_2), 0.25)
    }

    #[test]
    fn test_iou_of_disjoint_boxes_is_zero() {
        let bbox_1 = BBox::from_corners(0.0, 0.0, 1.0, 2.0);
        let bbox_2 = BBox::from_corners(1.0, 2.0, 3.0, 3.0);

        assert_eq!(bbox_1.iou(&bbox_2), 0.0)
    }

    #[test]
    fn test_iou_of_contained_box() {
        let bbox_1 = BBox::from_corners(0.0, 0.0, 3.0, 3.0);
        let bbox_2 = BBox::from_corners(1.0, 1.0, 2.0, 2.0);

        assert_eq!(bbox_1.iou(&bbox_2), 1.0 / 9.0)
    }

    #[test]
    fn test_iou_with_empty_union_is_zero() {
        let empty = BBox::new(5.0, 5.0, 0.0, 0.0);

        assert_eq!(empty.iou(&empty), 0.0);
    }
}
