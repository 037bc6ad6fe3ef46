//! Coordinate mapping: points, rectangles and the spaces they live in.
//!
//! Three spaces meet here:
//! - view space: the editor or overlay widget, in logical points
//! - image space: pixels of a captured bitmap, top-left origin
//! - global space: the virtual desktop spanning every display
//!
//! Everything in this module is pure arithmetic. Validation of display
//! descriptors and view sizes happens when the layout/fit is constructed,
//! so the mapping functions themselves cannot fail.

pub mod display;
pub mod fit;

pub use display::{DisplayDescriptor, DisplayLayout, LayoutError, PixelRect, ScaleConvention};
pub use fit::AspectFit;

use serde::{Deserialize, Serialize};

/// Which corner a coordinate space measures from.
///
/// AppKit-style pointer APIs report bottom-up coordinates; bitmaps and most
/// capture APIs are top-down. Every space carries its convention explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Origin {
    TopLeft,
    BottomLeft,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// True when both dimensions are finite and strictly positive.
    pub fn is_usable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// Axis-aligned rectangle with non-negative width and height.
///
/// `x`/`y` is the corner nearest the origin of whatever space the rectangle
/// lives in. Construct through [`Rect::new`] or [`Rect::from_corners`] to
/// keep the size normalized.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// Builds a rectangle, flipping negative sizes so the result is normalized.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        let (x, width) = if width < 0.0 { (x + width, -width) } else { (x, width) };
        let (y, height) = if height < 0.0 { (y + height, -height) } else { (y, height) };
        Self { x, y, width, height }
    }

    /// Bounding box of two arbitrary corners. Corner order is irrelevant.
    pub fn from_corners(a: Point, b: Point) -> Self {
        let min_x = a.x.min(b.x);
        let min_y = a.y.min(b.y);
        Self {
            x: min_x,
            y: min_y,
            width: a.x.max(b.x) - min_x,
            height: a.y.max(b.y) - min_y,
        }
    }

    pub fn min_x(&self) -> f64 {
        self.x
    }

    pub fn min_y(&self) -> f64 {
        self.y
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Half-open containment: the far edges belong to the neighbour.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min_x() && p.x < self.max_x() && p.y >= self.min_y() && p.y < self.max_y()
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Rect {
        Rect {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    /// Multiplies every field by `factor` (logical points → physical pixels).
    pub fn scale(&self, factor: f64) -> Rect {
        Rect::new(
            self.x * factor,
            self.y * factor,
            self.width * factor,
            self.height * factor,
        )
    }
}

/// Overlay feedback text for a selection, e.g. `"200 × 150"`.
pub fn size_label(rect: &Rect) -> String {
    format!("{} × {}", rect.width as i64, rect.height as i64)
}
