//! Multi-display layout and the global → capture → bitmap pixel mapping.
//!
//! Pointer locations arrive in the global space of the display layout.
//! Capture APIs want a top-left-origin rectangle relative to one display's
//! bitmap, in that bitmap's pixels. The steps:
//!
//! 1. global → capture space (flip Y when the layout is bottom-up)
//! 2. capture space → display-local (subtract the display's top-left)
//! 3. display-local points → bitmap pixels ([`ScaleConvention`])

use super::{Origin, Point, Rect, Size};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One attached monitor as seen by the capture boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayDescriptor {
    pub id: u32,
    /// Corner nearest the layout's origin, in global logical points.
    pub origin: Point,
    /// Logical size in points.
    pub size: Size,
    /// Physical pixels per logical point (2.0 on Retina panels).
    pub scale_factor: f64,
    pub is_primary: bool,
}

impl DisplayDescriptor {
    pub fn new(id: u32, origin: Point, size: Size, scale_factor: f64) -> Self {
        Self {
            id,
            origin,
            size,
            scale_factor,
            is_primary: false,
        }
    }

    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    fn is_valid(&self) -> bool {
        self.size.is_usable()
            && self.scale_factor.is_finite()
            && self.scale_factor > 0.0
            && self.origin.x.is_finite()
            && self.origin.y.is_finite()
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum LayoutError {
    #[error("No displays attached")]
    Empty,

    #[error("Display {0} reports an unusable size or scale factor")]
    InvalidDisplay(u32),
}

/// A validated, non-empty set of displays sharing one global space.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayLayout {
    displays: Vec<DisplayDescriptor>,
    origin: Origin,
}

impl DisplayLayout {
    pub fn new(displays: Vec<DisplayDescriptor>, origin: Origin) -> Result<Self, LayoutError> {
        if displays.is_empty() {
            return Err(LayoutError::Empty);
        }
        if let Some(bad) = displays.iter().find(|d| !d.is_valid()) {
            return Err(LayoutError::InvalidDisplay(bad.id));
        }
        Ok(Self { displays, origin })
    }

    pub fn displays(&self) -> &[DisplayDescriptor] {
        &self.displays
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// The display flagged primary, or the first one when none is.
    pub fn primary(&self) -> &DisplayDescriptor {
        self.displays
            .iter()
            .find(|d| d.is_primary)
            .unwrap_or(&self.displays[0])
    }

    /// Top edge of the union of all displays (`max(origin.y + height)`).
    pub fn max_screen_y(&self) -> f64 {
        self.displays
            .iter()
            .map(|d| d.origin.y + d.size.height)
            .fold(f64::MIN, f64::max)
    }

    /// Maps a rectangle from the layout's global space to top-left capture space.
    ///
    /// Bottom-up layouts flip against [`max_screen_y`](Self::max_screen_y);
    /// X and the size pass through unchanged.
    pub fn to_capture_rect(&self, global: Rect) -> Rect {
        match self.origin {
            Origin::TopLeft => global,
            Origin::BottomLeft => Rect::new(
                global.min_x(),
                self.max_screen_y() - global.max_y(),
                global.width,
                global.height,
            ),
        }
    }

    /// A display's bounds expressed in capture space.
    pub fn capture_bounds(&self, display: &DisplayDescriptor) -> Rect {
        let bounds = Rect::new(
            display.origin.x,
            display.origin.y,
            display.size.width,
            display.size.height,
        );
        self.to_capture_rect(bounds)
    }

    /// The display whose bounds contain the rectangle's top-left corner,
    /// then its center, falling back to the primary display.
    pub fn display_for(&self, capture_rect: &Rect) -> &DisplayDescriptor {
        let corner = Point::new(capture_rect.x, capture_rect.y);
        let center = capture_rect.center();
        self.displays
            .iter()
            .find(|d| self.capture_bounds(d).contains(corner))
            .or_else(|| {
                self.displays
                    .iter()
                    .find(|d| self.capture_bounds(d).contains(center))
            })
            .unwrap_or_else(|| self.primary())
    }

    /// Capture-space rectangle relative to one display's top-left corner.
    pub fn to_display_local(&self, capture_rect: &Rect, display: &DisplayDescriptor) -> Rect {
        let bounds = self.capture_bounds(display);
        capture_rect.translate(-bounds.x, -bounds.y)
    }
}

/// How the capture boundary sizes its bitmaps.
///
/// `Backing` bitmaps are physical pixels (logical size × backing scale), so
/// crop rectangles get multiplied by the display's scale factor. `Logical`
/// bitmaps already match the point grid and crops are used as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScaleConvention {
    #[default]
    Backing,
    Logical,
}

impl ScaleConvention {
    pub fn factor(&self, display: &DisplayDescriptor) -> f64 {
        match self {
            ScaleConvention::Backing => display.scale_factor,
            ScaleConvention::Logical => 1.0,
        }
    }

    /// Bitmap dimensions to request for a whole display.
    pub fn bitmap_size(&self, display: &DisplayDescriptor) -> (u32, u32) {
        let f = self.factor(display);
        (
            (display.size.width * f).round() as u32,
            (display.size.height * f).round() as u32,
        )
    }

    /// Display-local logical rectangle → bitmap pixel rectangle.
    ///
    /// Returns `None` when the rectangle starts left of or above the bitmap.
    pub fn to_pixels(&self, local: &Rect, display: &DisplayDescriptor) -> Option<PixelRect> {
        PixelRect::from_rect(&local.scale(self.factor(display)))
    }
}

impl FromStr for ScaleConvention {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "backing" | "physical" => Ok(ScaleConvention::Backing),
            "logical" | "points" => Ok(ScaleConvention::Logical),
            other => Err(format!("Unknown scale convention '{}'", other)),
        }
    }
}

/// Integer crop rectangle in bitmap pixels, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Rounds each field to the nearest pixel. Negative origins have no
    /// pixel representation and yield `None`.
    pub fn from_rect(rect: &Rect) -> Option<Self> {
        let (x, y) = (rect.x.round(), rect.y.round());
        if x < 0.0 || y < 0.0 || !x.is_finite() || !y.is_finite() {
            return None;
        }
        Some(Self {
            x: x as u32,
            y: y as u32,
            width: rect.width.round().max(0.0) as u32,
            height: rect.height.round().max(0.0) as u32,
        })
    }

    /// Far corner, widened so the sum cannot overflow.
    pub fn far_corner(&self) -> (u64, u64) {
        (
            self.x as u64 + self.width as u64,
            self.y as u64 + self.height as u64,
        )
    }

    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        let (fx, fy) = self.far_corner();
        fx <= width as u64 && fy <= height as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn side_by_side() -> DisplayLayout {
        DisplayLayout::new(
            vec![
                DisplayDescriptor::new(1, Point::new(0.0, 0.0), Size::new(1920.0, 1080.0), 2.0)
                    .primary(),
                DisplayDescriptor::new(2, Point::new(1920.0, 0.0), Size::new(1920.0, 1080.0), 2.0),
            ],
            Origin::BottomLeft,
        )
        .unwrap()
    }

    #[test]
    fn empty_layout_is_rejected() {
        assert_eq!(
            DisplayLayout::new(vec![], Origin::TopLeft),
            Err(LayoutError::Empty)
        );
    }

    #[test]
    fn zero_scale_display_is_rejected() {
        let bad = DisplayDescriptor::new(7, Point::default(), Size::new(800.0, 600.0), 0.0);
        assert_eq!(
            DisplayLayout::new(vec![bad], Origin::TopLeft),
            Err(LayoutError::InvalidDisplay(7))
        );
    }

    #[test]
    fn max_screen_y_spans_all_displays() {
        assert_eq!(side_by_side().max_screen_y(), 1080.0);

        let stacked = DisplayLayout::new(
            vec![
                DisplayDescriptor::new(1, Point::new(0.0, 0.0), Size::new(1440.0, 900.0), 2.0),
                DisplayDescriptor::new(2, Point::new(-200.0, 900.0), Size::new(2560.0, 1440.0), 1.0),
            ],
            Origin::BottomLeft,
        )
        .unwrap();
        assert_eq!(stacked.max_screen_y(), 2340.0);
    }

    #[test]
    fn bottom_up_global_rect_flips_to_capture_space() {
        let layout = side_by_side();
        let global = Rect::from_corners(Point::new(500.0, 200.0), Point::new(700.0, 400.0));
        let capture = layout.to_capture_rect(global);
        assert_eq!(capture, Rect::new(500.0, 680.0, 200.0, 200.0));
    }

    #[test]
    fn top_left_layout_passes_through() {
        let layout = DisplayLayout::new(
            vec![DisplayDescriptor::new(1, Point::default(), Size::new(1280.0, 800.0), 1.0)],
            Origin::TopLeft,
        )
        .unwrap();
        let r = Rect::new(10.0, 20.0, 30.0, 40.0);
        assert_eq!(layout.to_capture_rect(r), r);
    }

    #[test]
    fn display_for_picks_second_monitor_and_localizes() {
        let layout = side_by_side();
        let capture = Rect::new(2000.0, 100.0, 50.0, 50.0);
        let display = layout.display_for(&capture);
        assert_eq!(display.id, 2);
        assert_eq!(
            layout.to_display_local(&capture, display),
            Rect::new(80.0, 100.0, 50.0, 50.0)
        );
    }

    #[test]
    fn display_for_falls_back_to_primary() {
        let layout = side_by_side();
        let offscreen = Rect::new(-5000.0, -5000.0, 10.0, 10.0);
        assert_eq!(layout.display_for(&offscreen).id, 1);
    }

    #[test]
    fn lower_display_in_bottom_up_layout_sits_below_the_top() {
        // Secondary monitor hanging below the primary in AppKit coordinates.
        let layout = DisplayLayout::new(
            vec![
                DisplayDescriptor::new(1, Point::new(0.0, 0.0), Size::new(1440.0, 900.0), 2.0)
                    .primary(),
                DisplayDescriptor::new(2, Point::new(0.0, -1080.0), Size::new(1920.0, 1080.0), 1.0),
            ],
            Origin::BottomLeft,
        )
        .unwrap();
        let lower = &layout.displays()[1];
        assert_eq!(
            layout.capture_bounds(lower),
            Rect::new(0.0, 900.0, 1920.0, 1080.0)
        );
    }

    #[test]
    fn backing_convention_scales_crop() {
        let layout = side_by_side();
        let display = layout.primary();
        let local = Rect::new(500.0, 680.0, 200.0, 200.0);
        assert_eq!(
            ScaleConvention::Backing.to_pixels(&local, display),
            Some(PixelRect::new(1000, 1360, 400, 400))
        );
        assert_eq!(
            ScaleConvention::Logical.to_pixels(&local, display),
            Some(PixelRect::new(500, 680, 200, 200))
        );
        assert_eq!(ScaleConvention::Backing.bitmap_size(display), (3840, 2160));
    }

    #[test]
    fn negative_origin_has_no_pixel_rect() {
        assert_eq!(PixelRect::from_rect(&Rect::new(-4.0, 0.0, 10.0, 10.0)), None);
    }

    #[test]
    fn pixel_rect_bounds_check() {
        let r = PixelRect::new(80, 80, 30, 30);
        assert!(!r.fits_within(100, 100));
        assert!(PixelRect::new(70, 70, 30, 30).fits_within(100, 100));
    }

    #[test]
    fn scale_convention_parses() {
        assert_eq!("Logical".parse::<ScaleConvention>(), Ok(ScaleConvention::Logical));
        assert_eq!("backing".parse::<ScaleConvention>(), Ok(ScaleConvention::Backing));
        assert!("retina".parse::<ScaleConvention>().is_err());
    }
}
