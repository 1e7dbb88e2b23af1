//! Conversions between the three coordinate spaces a box travels through:
//! letterboxed model input, native source frame and the display surface.
//!
//! Model and display letterboxes are derived from the same source extent but
//! from different target extents, so each keeps its own scale and padding and
//! boxes are moved between them only by composing through source space.

use crate::bbox::BBox;

/// Device pixel ratios above this are clamped to bound the backing store size.
pub const MAX_CANVAS_DPR: f64 = 1.5;

/// Aspect preserving resize of a source extent into a target extent, centred
/// with symmetric padding.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Letterbox {
    pub source_width: f64,
    pub source_height: f64,
    pub target_width: f64,
    pub target_height: f64,
    pub scale: f64,
    pub pad_x: f64,
    pub pad_y: f64,
}

/// Whole pixel padding around the scaled content. Opposite edges differ by at
/// most one pixel and always sum to the unused extent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Padding {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

impl Letterbox {
    /// Returns `None` when any extent is zero, negative or not finite.
    pub fn new(
        source_width: f64,
        source_height: f64,
        target_width: f64,
        target_height: f64,
    ) -> Option<Self> {
        if ![source_width, source_height, target_width, target_height]
            .into_iter()
            .all(positive)
        {
            return None;
        }

        let scale = (target_width / source_width).min(target_height / source_height);
        let pad_x = (target_width - source_width * scale) / 2.0;
        let pad_y = (target_height - source_height * scale) / 2.0;

        Some(Self {
            source_width,
            source_height,
            target_width,
            target_height,
            scale,
            pad_x,
            pad_y,
        })
    }

    /// Letterbox into a square target, e.g. a model input of `size`x`size`.
    pub fn square(source_width: f64, source_height: f64, size: f64) -> Option<Self> {
        Self::new(source_width, source_height, size, size)
    }

    pub fn scaled_extent(&self) -> (f64, f64) {
        (
            self.source_width * self.scale,
            self.source_height * self.scale,
        )
    }

    /// Scaled extent rounded to whole pixels.
    pub fn scaled_pixels(&self) -> (u32, u32) {
        let (w, h) = self.scaled_extent();
        (w.round() as u32, h.round() as u32)
    }

    pub fn integer_padding(&self) -> Padding {
        let (scaled_w, scaled_h) = self.scaled_pixels();
        let spare_x = (self.target_width.round() - scaled_w as f64).max(0.0);
        let spare_y = (self.target_height.round() - scaled_h as f64).max(0.0);

        Padding {
            left: (spare_x / 2.0).floor() as u32,
            right: (spare_x / 2.0).ceil() as u32,
            top: (spare_y / 2.0).floor() as u32,
            bottom: (spare_y / 2.0).ceil() as u32,
        }
    }

    pub fn forward_point(&self, x: f64, y: f64) -> (f64, f64) {
        (x * self.scale + self.pad_x, y * self.scale + self.pad_y)
    }

    pub fn inverse_point(&self, x: f64, y: f64) -> (f64, f64) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }

    /// Inverse of a point in a rasterised target, whose content starts at the
    /// floored [`integer_padding`](Self::integer_padding) rather than at the
    /// fractional offset.
    pub fn pixel_inverse_point(&self, x: f64, y: f64) -> (f64, f64) {
        let padding = self.integer_padding();
        (
            (x - padding.left as f64) / self.scale,
            (y - padding.top as f64) / self.scale,
        )
    }

    /// Source space to target space.
    pub fn forward(&self, bbox: &BBox) -> BBox {
        let (x, y) = self.forward_point(bbox.x, bbox.y);
        BBox::new(x, y, bbox.w * self.scale, bbox.h * self.scale)
    }

    /// Target space back to source space.
    pub fn inverse(&self, bbox: &BBox) -> BBox {
        let (x, y) = self.inverse_point(bbox.x, bbox.y);
        BBox::new(x, y, bbox.w / self.scale, bbox.h / self.scale)
    }

    /// The region of the target actually covered by source content.
    pub fn content_area(&self) -> BBox {
        let (w, h) = self.scaled_extent();
        BBox::new(self.pad_x, self.pad_y, w, h)
    }
}

/// Drawing surface as reported by the renderer, in CSS pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplaySurface {
    pub css_width: f64,
    pub css_height: f64,
    pub device_pixel_ratio: f64,
}

impl DisplaySurface {
    pub fn new(css_width: f64, css_height: f64, device_pixel_ratio: f64) -> Self {
        Self {
            css_width,
            css_height,
            device_pixel_ratio,
        }
    }

    pub fn effective_dpr(&self) -> f64 {
        if positive(self.device_pixel_ratio) {
            self.device_pixel_ratio.min(MAX_CANVAS_DPR)
        } else {
            1.0
        }
    }

    /// Size of the backing store in device pixels.
    pub fn backing_size(&self) -> (u32, u32) {
        let dpr = self.effective_dpr();
        (
            (self.css_width * dpr).round().max(0.0) as u32,
            (self.css_height * dpr).round().max(0.0) as u32,
        )
    }
}

/// Both letterboxes for one source extent, composed through source space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoordinateMapper {
    pub model: Letterbox,
    pub display: Letterbox,
    pub device_pixel_ratio: f64,
}

impl CoordinateMapper {
    pub fn new(
        source_width: f64,
        source_height: f64,
        model_size: f64,
        surface: &DisplaySurface,
    ) -> Option<Self> {
        Some(Self {
            model: Letterbox::square(source_width, source_height, model_size)?,
            display: Letterbox::new(
                source_width,
                source_height,
                surface.css_width,
                surface.css_height,
            )?,
            device_pixel_ratio: surface.effective_dpr(),
        })
    }

    pub fn source_to_model(&self, bbox: &BBox) -> BBox {
        self.model.forward(bbox)
    }

    pub fn model_to_source(&self, bbox: &BBox) -> BBox {
        self.model.inverse(bbox)
    }

    pub fn source_to_display(&self, bbox: &BBox) -> BBox {
        self.display.forward(bbox)
    }

    pub fn display_to_source(&self, bbox: &BBox) -> BBox {
        self.display.inverse(bbox)
    }

    pub fn model_to_display(&self, bbox: &BBox) -> BBox {
        self.source_to_display(&self.model_to_source(bbox))
    }

    /// Source space straight to device pixels of the backing store.
    pub fn source_to_device(&self, bbox: &BBox) -> BBox {
        let css = self.source_to_display(bbox);
        let dpr = self.device_pixel_ratio;
        BBox::new(css.x * dpr, css.y * dpr, css.w * dpr, css.h * dpr)
    }
}
