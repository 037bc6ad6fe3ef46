//! Annotation model — shapes drawn over a capture and burned in on save.
//!
//! Shapes live in image-pixel space, so the same list renders identically
//! whatever zoom the editor view happens to use. The layer is append-only
//! with a single-step undo (pop last); insertion order is z-order.

pub mod canvas;
pub mod raster;

pub use canvas::{AnnotationCanvas, AnnotationTool, ViewShape};

use crate::geometry::{Point, Rect};
use image::{Rgba, RgbaImage};
use raster::Coverage;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::str::FromStr;

/// Arrowhead side length, in the units of the space the arrow is drawn in.
pub const ARROW_HEAD_LENGTH: f64 = 15.0;
/// Half-angle between the shaft and each side of the head (30°).
pub const ARROW_HEAD_ANGLE: f64 = PI / 6.0;

/// Opacity of shapes already committed to the layer.
pub const COMMITTED_OPACITY: f64 = 0.8;
/// Opacity of the shape still being dragged out.
pub const PREVIEW_OPACITY: f64 = 0.7;

pub const DEFAULT_STROKE_WIDTH: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShapeKind {
    Rectangle,
    Circle,
    Line,
    Arrow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    /// The editor's accent blue, RGB(0.2, 0.5, 1.0).
    pub const ACCENT: Color = Color::rgb(51, 128, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Pixel value with the color's own alpha multiplied by `opacity`.
    pub fn with_opacity(&self, opacity: f64) -> Rgba<u8> {
        let a = (f64::from(self.a) * opacity.clamp(0.0, 1.0)).round() as u8;
        Rgba([self.r, self.g, self.b, a])
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::ACCENT
    }
}

impl FromStr for Color {
    type Err = String;

    /// Accepts `#RRGGBB` or `#RRGGBBAA` (the `#` is optional).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if !hex.is_ascii() {
            return Err(format!("Invalid color '{}'", s));
        }
        let byte = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|e| format!("Invalid color '{}': {}", s, e))
        };
        match hex.len() {
            6 => Ok(Color::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Ok(Color {
                r: byte(0)?,
                g: byte(2)?,
                b: byte(4)?,
                a: byte(6)?,
            }),
            _ => Err(format!("Invalid color '{}': expected #RRGGBB or #RRGGBBAA", s)),
        }
    }
}

/// One annotation, in image-pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationShape {
    pub kind: ShapeKind,
    pub start: Point,
    pub end: Point,
    pub color: Color,
    pub stroke_width: f64,
}

impl AnnotationShape {
    pub fn new(kind: ShapeKind, start: Point, end: Point) -> Self {
        Self {
            kind,
            start,
            end,
            color: Color::default(),
            stroke_width: DEFAULT_STROKE_WIDTH,
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_stroke_width(mut self, stroke_width: f64) -> Self {
        self.stroke_width = stroke_width;
        self
    }

    /// Bounding box of the two corners; drag direction does not matter.
    pub fn bounds(&self) -> Rect {
        Rect::from_corners(self.start, self.end)
    }

    /// Arrowhead triangle for arrows, `None` for every other kind.
    pub fn arrowhead(&self) -> Option<[Point; 3]> {
        match self.kind {
            ShapeKind::Arrow => Some(arrowhead(self.start, self.end)),
            _ => None,
        }
    }
}

/// Triangle at `end` pointing along `start → end`: the tip, then the two
/// barbs at ±30° from the shaft, [`ARROW_HEAD_LENGTH`] back from the tip.
pub fn arrowhead(start: Point, end: Point) -> [Point; 3] {
    let angle = (end.y - start.y).atan2(end.x - start.x);
    let barb = |theta: f64| {
        Point::new(
            end.x - ARROW_HEAD_LENGTH * theta.cos(),
            end.y - ARROW_HEAD_LENGTH * theta.sin(),
        )
    };
    [end, barb(angle - ARROW_HEAD_ANGLE), barb(angle + ARROW_HEAD_ANGLE)]
}

/// Draws one shape onto `image` at the given opacity.
pub fn draw_shape(image: &mut RgbaImage, shape: &AnnotationShape, opacity: f64) {
    let pad = shape.stroke_width / 2.0 + 1.0;
    let head = shape.arrowhead();
    let mut points = vec![shape.start, shape.end];
    if let Some(tri) = head {
        points.extend_from_slice(&tri);
    }
    let mut coverage = Coverage::new(image, raster::padded_bounds(&points, pad));

    match shape.kind {
        ShapeKind::Rectangle => raster::stroke_rect(&mut coverage, shape.bounds(), shape.stroke_width),
        ShapeKind::Circle => raster::stroke_ellipse(&mut coverage, shape.bounds(), shape.stroke_width),
        ShapeKind::Line => {
            raster::stroke_segment(&mut coverage, shape.start, shape.end, shape.stroke_width)
        }
        ShapeKind::Arrow => {
            raster::stroke_segment(&mut coverage, shape.start, shape.end, shape.stroke_width);
            if let Some(tri) = head {
                raster::fill_triangle(&mut coverage, tri);
            }
        }
    }

    coverage.paint(image, shape.color.with_opacity(opacity));
}

/// Ordered shapes bound to one base image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationLayer {
    shapes: Vec<AnnotationShape>,
}

impl AnnotationLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, shape: AnnotationShape) {
        self.shapes.push(shape);
    }

    /// Removes the most recent shape. No-op on an empty layer.
    pub fn undo(&mut self) -> Option<AnnotationShape> {
        self.shapes.pop()
    }

    pub fn clear(&mut self) {
        self.shapes.clear();
    }

    pub fn shapes(&self) -> &[AnnotationShape] {
        &self.shapes
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Burns every shape into a copy of `base`, oldest first.
    pub fn flatten(&self, base: &RgbaImage) -> RgbaImage {
        self.render_with_preview(base, None)
    }

    /// Like [`flatten`](Self::flatten), plus an in-progress shape on top at
    /// [`PREVIEW_OPACITY`].
    pub fn render_with_preview(
        &self,
        base: &RgbaImage,
        preview: Option<&AnnotationShape>,
    ) -> RgbaImage {
        let mut out = base.clone();
        for shape in &self.shapes {
            draw_shape(&mut out, shape, COMMITTED_OPACITY);
        }
        if let Some(shape) = preview {
            draw_shape(&mut out, shape, PREVIEW_OPACITY);
        }
        out
    }
}
