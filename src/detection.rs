use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::{
    bbox::BBox,
    error::{DetectionError, DetectorError},
    letterbox::Letterbox,
};

/// A validated single-frame observation in source-frame pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BBox,
    pub class: u32,
    pub score: f64,
    pub class_name: Option<String>,
}

impl Detection {
    pub fn new(bbox: BBox, class: u32, score: f64) -> Self {
        Self {
            bbox,
            class,
            score,
            class_name: None,
        }
    }

    pub fn with_class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }
}

impl AsRef<Detection> for Detection {
    fn as_ref(&self) -> &Detection {
        self
    }
}

/// Detection as delivered by a detector, before any validation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDetection {
    pub x1: Option<f64>,
    pub y1: Option<f64>,
    pub x2: Option<f64>,
    pub y2: Option<f64>,
    pub score: Option<f64>,
    pub class_id: Option<f64>,
    #[serde(default)]
    pub class_name: Option<String>,
}

impl RawDetection {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64, score: f64, class_id: f64) -> Self {
        Self {
            x1: Some(x1),
            y1: Some(y1),
            x2: Some(x2),
            y2: Some(y2),
            score: Some(score),
            class_id: Some(class_id),
            class_name: None,
        }
    }
}

fn required(value: Option<f64>, field: &str) -> Result<f64, DetectionError> {
    match value {
        Some(v) if v.is_finite() => Ok(v),
        Some(v) => Err(DetectionError::Malformed(format!("{field} is {v}"))),
        None => Err(DetectionError::Malformed(format!("{field} is missing"))),
    }
}

impl TryFrom<RawDetection> for Detection {
    type Error = DetectionError;

    fn try_from(raw: RawDetection) -> Result<Self, Self::Error> {
        let x1 = required(raw.x1, "x1")?;
        let y1 = required(raw.y1, "y1")?;
        let x2 = required(raw.x2, "x2")?;
        let y2 = required(raw.y2, "y2")?;
        let score = required(raw.score, "score")?;
        let class_id = required(raw.class_id, "classId")?.round();

        if !(0.0..=1.0).contains(&score) {
            return Err(DetectionError::Malformed(format!(
                "score {score} outside [0, 1]"
            )));
        }
        if class_id < 0.0 || class_id > u32::MAX as f64 {
            return Err(DetectionError::Malformed(format!(
                "classId {class_id} out of range"
            )));
        }

        let bbox = BBox::from_corners(x1, y1, x2, y2);
        if bbox.is_degenerate() {
            return Err(DetectionError::DegenerateBox {
                width: bbox.w,
                height: bbox.h,
            });
        }

        Ok(Detection {
            bbox,
            class: class_id as u32,
            score,
            class_name: raw.class_name,
        })
    }
}

/// Validates a batch, dropping (and logging) every detection that fails.
pub fn validate_batch(raw: impl IntoIterator<Item = RawDetection>) -> Vec<Detection> {
    let (valid, rejected): (Vec<Detection>, Vec<DetectionError>) = raw
        .into_iter()
        .map(Detection::try_from)
        .partition_result();

    for error in &rejected {
        warn!("dropping detection: {error}");
    }

    valid
}

/// Decodes the JSON body of a remote detector response.
///
/// Elements are decoded one at a time so a single malformed entry is dropped
/// without losing the rest of the batch. Only a body that is not a JSON array
/// is an error.
pub fn decode_response(body: &str) -> Result<Vec<RawDetection>, DetectorError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| DetectorError::Decode(e.to_string()))?;
    let Value::Array(items) = value else {
        return Err(DetectorError::Decode(
            "expected an array of detections".to_string(),
        ));
    };

    Ok(items
        .into_iter()
        .filter_map(
            |item| match serde_json::from_value::<RawDetection>(item) {
                Ok(raw) => Some(raw),
                Err(e) => {
                    warn!("dropping undecodable detection: {e}");
                    None
                }
            },
        )
        .collect())
}

/// Converts raw model rows `[x1, y1, x2, y2, confidence, class]` from
/// letterboxed model space into source-space detections, discarding rows
/// below `min_confidence`.
///
/// The model input tensor is padded with whole pixels, so rows are mapped
/// back against the integer padding of `letterbox`.
pub fn decode_model_rows(
    rows: &[[f32; 6]],
    letterbox: &Letterbox,
    min_confidence: f64,
) -> Vec<RawDetection> {
    rows.iter()
        .filter(|row| row[4] as f64 >= min_confidence)
        .map(|&[x1, y1, x2, y2, confidence, class]| {
            let (sx1, sy1) = letterbox.pixel_inverse_point(x1 as f64, y1 as f64);
            let (sx2, sy2) = letterbox.pixel_inverse_point(x2 as f64, y2 as f64);
            RawDetection::new(sx1, sy1, sx2, sy2, confidence as f64, class as f64)
        })
        .collect()
}

/// One captured video frame handed to the detector.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// The external detector. Implementations may block; the pipeline calls them
/// from a dedicated worker and never more than once at a time.
pub trait Detector: Send + 'static {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>, DetectorError>;
}

impl<F> Detector for F
where
    F: FnMut(&Frame) -> Result<Vec<RawDetection>, DetectorError> + Send + 'static,
{
    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>, DetectorError> {
        self(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_raw_detection_converts() {
        let mut raw = RawDetection::new(10.0, 20.0, 50.0, 80.0, 0.9, 2.4);
        raw.class_name = Some("B".to_string());

        let detection = Detection::try_from(raw).unwrap();

        assert_eq!(detection.bbox, BBox::new(10.0, 20.0, 40.0, 60.0));
        assert_eq!(detection.class, 2);
        assert_eq!(detection.class_name.as_deref(), Some("B"));
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let mut raw = RawDetection::new(10.0, 20.0, 50.0, 80.0, 0.9, 1.0);
        raw.score = None;

        assert!(matches!(
            Detection::try_from(raw),
            Err(DetectionError::Malformed(_))
        ));
    }

    #[test]
    fn test_out_of_range_values_are_malformed() {
        let score = RawDetection::new(0.0, 0.0, 1.0, 1.0, 1.5, 0.0);
        let class = RawDetection::new(0.0, 0.0, 1.0, 1.0, 0.5, -1.0);
        let nan = RawDetection::new(f64::NAN, 0.0, 1.0, 1.0, 0.5, 0.0);

        for raw in [score, class, nan] {
            assert!(matches!(
                Detection::try_from(raw),
                Err(DetectionError::Malformed(_))
            ));
        }
    }

    #[test]
    fn test_zero_width_box_is_degenerate() {
        let raw = RawDetection::new(10.0, 20.0, 10.0, 80.0, 0.9, 0.0);

        assert_eq!(
            Detection::try_from(raw),
            Err(DetectionError::DegenerateBox {
                width: 0.0,
                height: 60.0
            })
        );
    }

    #[test]
    fn test_validate_batch_keeps_only_valid_entries() {
        let batch = vec![
            RawDetection::new(0.0, 0.0, 10.0, 10.0, 0.9, 0.0),
            RawDetection::new(5.0, 5.0, 1.0, 1.0, 0.9, 0.0),
            RawDetection::default(),
            RawDetection::new(20.0, 20.0, 30.0, 30.0, 0.7, 1.0),
        ];

        let valid = validate_batch(batch);

        assert_eq!(valid.len(), 2);
        assert_eq!(valid[1].class, 1);
    }

    #[test]
    fn test_decode_response_isolates_bad_elements() {
        let body = r#"[
            {"x1": 1, "y1": 2, "x2": 11, "y2": 12, "score": 0.8, "classId": 3, "className": "C"},
            {"x1": "left", "y1": 2, "x2": 11, "y2": 12, "score": 0.8, "classId": 3},
            {"x1": 1, "y1": 2, "x2": 11, "y2": 12, "classId": 4}
        ]"#;

        let raw = decode_response(body).unwrap();

        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0].class_name.as_deref(), Some("C"));
        assert_eq!(raw[1].score, None);
        assert_eq!(validate_batch(raw).len(), 1);
    }

    #[test]
    fn test_decode_response_rejects_non_array_body() {
        assert!(matches!(
            decode_response(r#"{"error": "busy"}"#),
            Err(DetectorError::Decode(_))
        ));
        assert!(matches!(
            decode_response("<html>"),
            Err(DetectorError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_model_rows_maps_back_to_source() {
        let letterbox = Letterbox::square(1280.0, 720.0, 640.0).unwrap();
        let rows = [
            [50.0, 240.0, 200.0, 290.0, 0.9, 1.0],
            [0.0, 140.0, 10.0, 150.0, 0.2, 0.0],
        ];

        let raw = decode_model_rows(&rows, &letterbox, 0.4);

        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0], RawDetection::new(100.0, 200.0, 400.0, 300.0, 0.9f32 as f64, 1.0));
    }

    #[test]
    fn test_decode_model_rows_uses_whole_pixel_padding() {
        // 721 * 0.5 = 360.5 rows of content, rounded to 361, leaving 279 spare
        // rows of which 139 sit above the content.
        let letterbox = Letterbox::square(1280.0, 721.0, 640.0).unwrap();
        assert_eq!(letterbox.integer_padding().top, 139);

        let raw = decode_model_rows(&[[0.0, 139.0, 64.0, 189.0, 0.9, 0.0]], &letterbox, 0.4);

        assert_eq!(raw[0], RawDetection::new(0.0, 0.0, 128.0, 100.0, 0.9f32 as f64, 0.0));
    }
}
