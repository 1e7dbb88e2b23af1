//! Everything a renderer needs to draw the current tracks: label text, class
//! colours, stroke metrics and on-screen placement. Drawing itself is left to
//! the caller.

use std::{collections::HashMap, fmt};

use serde::Deserialize;

use crate::{
    bbox::BBox,
    error::ConfigError,
    letterbox::{DisplaySurface, Letterbox},
    track::TrackView,
};

const FONT_SCALE: f64 = 4.0;

/// Class names by class id, as shipped alongside the model.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LabelMap {
    names: HashMap<u32, String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LabelsFile {
    List(Vec<String>),
    Map(HashMap<String, String>),
}

impl LabelMap {
    pub fn new(names: HashMap<u32, String>) -> Self {
        Self { names }
    }

    /// Accepts either a JSON array indexed by class id or an object keyed by
    /// the id as a string.
    pub fn from_json(source: &str) -> Result<Self, ConfigError> {
        let file: LabelsFile = serde_json::from_str(source)
            .map_err(|e| ConfigError::Invalid(format!("labels: {e}")))?;

        let names: HashMap<u32, String> = match file {
            LabelsFile::List(list) => list
                .into_iter()
                .enumerate()
                .map(|(i, name)| (i as u32, name))
                .collect(),
            LabelsFile::Map(map) => map
                .into_iter()
                .map(|(key, name)| {
                    key.trim()
                        .parse::<u32>()
                        .map(|id| (id, name))
                        .map_err(|_| ConfigError::Invalid(format!("labels: bad class id {key:?}")))
                })
                .collect::<Result<_, _>>()?,
        };

        Ok(Self { names })
    }

    pub fn get(&self, class: u32) -> Option<&str> {
        self.names.get(&class).map(String::as_str)
    }

    /// Name carried by the detection first, then the label map, then a
    /// generic placeholder.
    pub fn resolve(&self, track: &TrackView) -> String {
        track
            .class_name
            .clone()
            .or_else(|| self.get(track.class).map(str::to_owned))
            .unwrap_or_else(|| format!("cls {}", track.class))
    }
}

pub fn label_text(label: &str, score: f64) -> String {
    format!("{label} ({score:.2})")
}

/// Colour in HSL, spreading neighbouring class ids around the hue circle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hsl {
    pub hue: f64,
    pub saturation: f64,
    pub lightness: f64,
}

impl Hsl {
    pub fn for_class(class: u32) -> Self {
        Self {
            hue: (class as f64 * 137.508) % 360.0,
            saturation: 90.0,
            lightness: 55.0,
        }
    }
}

impl fmt::Display for Hsl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hsl({}deg {}% {}%)",
            self.hue, self.saturation, self.lightness
        )
    }
}

/// Stroke and label metrics scaled to the size of the drawn video.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlayStyle {
    pub line_width: f64,
    pub font_px: f64,
    pub pad_x: f64,
    pub pad_y: f64,
}

impl OverlayStyle {
    pub fn for_extent(width: f64, height: f64) -> Self {
        let line_width = (width.min(height) / 110.0).round().max(6.0);
        Self {
            line_width,
            font_px: (line_width * FONT_SCALE).round().max(20.0),
            pad_x: (line_width * 2.0).round().max(10.0),
            pad_y: (line_width * 1.2).round().max(6.0),
        }
    }

    pub fn label_height(&self) -> f64 {
        self.font_px + self.pad_y
    }
}

/// One track ready to draw, in CSS pixels of the display surface.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayItem {
    pub id: u64,
    pub rect: BBox,
    pub color: Hsl,
    pub text: String,
    /// Background box of the label.
    pub label: BBox,
    /// Top-left corner of the label text inside `label`.
    pub text_origin: (f64, f64),
}

#[derive(Clone, Debug, PartialEq)]
pub struct OverlayFrame {
    pub style: OverlayStyle,
    /// Part of the surface covered by video.
    pub content: BBox,
    pub items: Vec<OverlayItem>,
}

/// Lays out a snapshot for drawing on `surface`, given the current source
/// frame extent. `measure` returns the rendered width of a string at the
/// given font size.
///
/// Labels sit above their box unless that would push them out of the video
/// area, in which case they move just inside the top edge.
pub fn layout_overlay<M>(
    tracks: &[TrackView],
    labels: &LabelMap,
    source_width: f64,
    source_height: f64,
    surface: &DisplaySurface,
    measure: M,
) -> Option<OverlayFrame>
where
    M: Fn(&str, f64) -> f64,
{
    let letterbox = Letterbox::new(
        source_width,
        source_height,
        surface.css_width,
        surface.css_height,
    )?;
    let content = letterbox.content_area();
    let style = OverlayStyle::for_extent(content.w, content.h);

    let items = tracks
        .iter()
        .map(|track| {
            let rect = letterbox.forward(&track.display);
            let text = label_text(&labels.resolve(track), track.score);
            let label_w = measure(&text, style.font_px) + style.pad_x;
            let label_h = style.label_height();

            let x = rect.x - (style.line_width / 2.0).floor();
            let mut y = rect.y - label_h - style.line_width;
            if y < content.y + style.line_width {
                y = rect.y + style.line_width;
            }

            OverlayItem {
                id: track.id,
                rect,
                color: Hsl::for_class(track.class),
                text,
                label: BBox::new(x, y, label_w, label_h),
                text_origin: (
                    x + (style.pad_x / 2.0).round(),
                    y + ((label_h - style.font_px) / 2.0).round(),
                ),
            }
        })
        .collect();

    Some(OverlayFrame {
        style,
        content,
        items,
    })
}
