//! Software rasterizer for annotation strokes.
//!
//! Each primitive first marks a coverage mask, then the mask is blended onto
//! the image once. Overlapping parts of one stroke (rectangle corners, the
//! arrow shaft under its head) therefore keep the shape's opacity instead of
//! compounding it.
//!
//! Pixel `(i, j)` is sampled at its center `(i + 0.5, j + 0.5)`.

use crate::geometry::{Point, Rect};
use image::{Rgba, RgbaImage};

/// Source-over blend of `src` onto `dst`.
pub fn blend_pixel(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let a = f64::from(src[3]) / 255.0;
    if a <= 0.0 {
        return dst;
    }
    let inv = 1.0 - a;
    let channel = |d: u8, s: u8| (f64::from(d) * inv + f64::from(s) * a).round().clamp(0.0, 255.0) as u8;
    let out_a = (f64::from(dst[3]) * inv + f64::from(src[3]))
        .round()
        .clamp(0.0, 255.0) as u8;
    Rgba([
        channel(dst[0], src[0]),
        channel(dst[1], src[1]),
        channel(dst[2], src[2]),
        out_a,
    ])
}

/// Pixels touched by one shape, limited to the shape's clamped bounding box.
pub struct Coverage {
    x0: u32,
    y0: u32,
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl Coverage {
    /// Mask covering `bounds` (image space) clipped to the image.
    pub fn new(image: &RgbaImage, bounds: Rect) -> Self {
        let clip = |v: f64, max: u32| v.clamp(0.0, max as f64) as u32;
        let x0 = clip(bounds.min_x().floor(), image.width());
        let y0 = clip(bounds.min_y().floor(), image.height());
        let x1 = clip(bounds.max_x().ceil(), image.width());
        let y1 = clip(bounds.max_y().ceil(), image.height());
        let width = x1.saturating_sub(x0);
        let height = y1.saturating_sub(y0);
        Self {
            x0,
            y0,
            width,
            height,
            bits: vec![false; width as usize * height as usize],
        }
    }

    /// Marks every pixel whose center satisfies `inside`.
    pub fn mark(&mut self, inside: impl Fn(Point) -> bool) {
        for row in 0..self.height {
            for col in 0..self.width {
                let center = Point::new(
                    f64::from(self.x0 + col) + 0.5,
                    f64::from(self.y0 + row) + 0.5,
                );
                if inside(center) {
                    self.bits[(row * self.width + col) as usize] = true;
                }
            }
        }
    }

    pub fn count(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }

    /// Blends `color` once onto every covered pixel.
    pub fn paint(&self, image: &mut RgbaImage, color: Rgba<u8>) {
        for row in 0..self.height {
            for col in 0..self.width {
                if self.bits[(row * self.width + col) as usize] {
                    let (x, y) = (self.x0 + col, self.y0 + row);
                    let dst = *image.get_pixel(x, y);
                    image.put_pixel(x, y, blend_pixel(dst, color));
                }
            }
        }
    }
}

fn half_width(stroke_width: f64) -> f64 {
    (stroke_width / 2.0).max(0.5)
}

/// Distance from `p` to the segment `a..b`.
pub fn distance_to_segment(p: Point, a: Point, b: Point) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len2 = dx * dx + dy * dy;
    if len2 <= f64::EPSILON {
        return p.distance(&a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len2).clamp(0.0, 1.0);
    p.distance(&Point::new(a.x + t * dx, a.y + t * dy))
}

/// Bounding box of a set of points grown by `pad` on every side.
pub fn padded_bounds(points: &[Point], pad: f64) -> Rect {
    let min_x = points.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
    let min_y = points.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
    let max_x = points.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
    let max_y = points.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
    Rect::new(min_x - pad, min_y - pad, max_x - min_x + 2.0 * pad, max_y - min_y + 2.0 * pad)
}

pub fn stroke_segment(coverage: &mut Coverage, a: Point, b: Point, stroke_width: f64) {
    let hw = half_width(stroke_width);
    coverage.mark(|p| distance_to_segment(p, a, b) <= hw);
}

/// Outline of `rect`, centered on its edges.
pub fn stroke_rect(coverage: &mut Coverage, rect: Rect, stroke_width: f64) {
    let hw = half_width(stroke_width);
    let outer = Rect::new(rect.x - hw, rect.y - hw, rect.width + 2.0 * hw, rect.height + 2.0 * hw);
    let inner_w = rect.width - 2.0 * hw;
    let inner_h = rect.height - 2.0 * hw;
    coverage.mark(|p| {
        let in_outer = p.x >= outer.min_x() && p.x <= outer.max_x() && p.y >= outer.min_y() && p.y <= outer.max_y();
        let in_inner = inner_w > 0.0
            && inner_h > 0.0
            && p.x > rect.x + hw
            && p.x < rect.x + hw + inner_w
            && p.y > rect.y + hw
            && p.y < rect.y + hw + inner_h;
        in_outer && !in_inner
    });
}

/// Outline of the ellipse inscribed in `rect`.
///
/// Uses the first-order (Sampson) distance `|f| / |∇f|` of the implicit
/// ellipse equation, which is exact on the axes and close enough elsewhere
/// for stroke widths of a few pixels.
pub fn stroke_ellipse(coverage: &mut Coverage, rect: Rect, stroke_width: f64) {
    let hw = half_width(stroke_width);
    let c = rect.center();
    let (a, b) = (rect.width / 2.0, rect.height / 2.0);

    if a <= f64::EPSILON || b <= f64::EPSILON {
        // Collapsed to a line (or a point).
        let from = Point::new(rect.min_x(), rect.min_y());
        let to = Point::new(rect.max_x(), rect.max_y());
        stroke_segment(coverage, from, to, stroke_width);
        return;
    }

    coverage.mark(|p| {
        let dx = p.x - c.x;
        let dy = p.y - c.y;
        let f = (dx * dx) / (a * a) + (dy * dy) / (b * b) - 1.0;
        let gx = 2.0 * dx / (a * a);
        let gy = 2.0 * dy / (b * b);
        let grad = (gx * gx + gy * gy).sqrt();
        if grad <= f64::EPSILON {
            return false;
        }
        (f / grad).abs() <= hw
    });
}

/// Solid triangle.
pub fn fill_triangle(coverage: &mut Coverage, t: [Point; 3]) {
    let [p1, p2, p3] = t;
    let area = (p2.x - p1.x) * (p3.y - p1.y) - (p3.x - p1.x) * (p2.y - p1.y);
    if area.abs() < f64::EPSILON {
        return;
    }
    coverage.mark(|p| {
        let w0 = (p2.x - p1.x) * (p.y - p1.y) - (p2.y - p1.y) * (p.x - p1.x);
        let w1 = (p3.x - p2.x) * (p.y - p2.y) - (p3.y - p2.y) * (p.x - p2.x);
        let w2 = (p1.x - p3.x) * (p.y - p3.y) - (p1.y - p3.y) * (p.x - p3.x);
        (w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0) || (w0 <= 0.0 && w1 <= 0.0 && w2 <= 0.0)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255]))
    }

    #[test]
    fn opaque_blend_replaces() {
        let out = blend_pixel(Rgba([1, 2, 3, 255]), Rgba([200, 100, 50, 255]));
        assert_eq!(out, Rgba([200, 100, 50, 255]));
    }

    #[test]
    fn transparent_blend_keeps_destination() {
        let out = blend_pixel(Rgba([1, 2, 3, 255]), Rgba([200, 100, 50, 0]));
        assert_eq!(out, Rgba([1, 2, 3, 255]));
    }

    #[test]
    fn segment_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 0.0);
        assert_eq!(distance_to_segment(Point::new(5.0, 3.0), a, b), 3.0);
        assert_eq!(distance_to_segment(Point::new(13.0, 4.0), a, b), 5.0);
    }

    #[test]
    fn rect_outline_leaves_interior_untouched() {
        let img = white(40, 40);
        let mut cov = Coverage::new(&img, Rect::new(0.0, 0.0, 40.0, 40.0));
        stroke_rect(&mut cov, Rect::new(10.0, 10.0, 20.0, 20.0), 2.0);
        let mut out = img.clone();
        cov.paint(&mut out, Rgba([255, 0, 0, 255]));
        assert_eq!(*out.get_pixel(10, 20), Rgba([255, 0, 0, 255]));
        assert_eq!(*out.get_pixel(20, 20), Rgba([255, 255, 255, 255]));
        assert_eq!(*out.get_pixel(2, 2), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn ellipse_outline_hits_axes_not_center() {
        let img = white(60, 40);
        let mut cov = Coverage::new(&img, Rect::new(0.0, 0.0, 60.0, 40.0));
        stroke_ellipse(&mut cov, Rect::new(10.0, 10.0, 40.0, 20.0), 2.0);
        let mut out = img.clone();
        cov.paint(&mut out, Rgba([0, 0, 255, 255]));
        // Leftmost point of the ellipse is (10, 20).
        assert_eq!(*out.get_pixel(10, 19), Rgba([0, 0, 255, 255]));
        assert_eq!(*out.get_pixel(30, 20), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn overlapping_strokes_blend_once() {
        let img = white(20, 20);
        let mut cov = Coverage::new(&img, Rect::new(0.0, 0.0, 20.0, 20.0));
        stroke_segment(&mut cov, Point::new(0.0, 10.0), Point::new(20.0, 10.0), 3.0);
        stroke_segment(&mut cov, Point::new(10.0, 0.0), Point::new(10.0, 20.0), 3.0);
        let mut out = img.clone();
        cov.paint(&mut out, Rgba([0, 0, 0, 128]));
        // Crossing pixel and a single-stroke pixel end up identical.
        assert_eq!(out.get_pixel(10, 10), out.get_pixel(2, 10));
    }

    #[test]
    fn triangle_fill_covers_interior() {
        let img = white(20, 20);
        let mut cov = Coverage::new(&img, Rect::new(0.0, 0.0, 20.0, 20.0));
        fill_triangle(
            &mut cov,
            [Point::new(0.0, 0.0), Point::new(20.0, 0.0), Point::new(0.0, 20.0)],
        );
        let mut out = img.clone();
        cov.paint(&mut out, Rgba([0, 255, 0, 255]));
        assert_eq!(*out.get_pixel(2, 2), Rgba([0, 255, 0, 255]));
        assert_eq!(*out.get_pixel(18, 18), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn coverage_clips_to_image() {
        let img = white(10, 10);
        let cov = Coverage::new(&img, Rect::new(-50.0, -50.0, 200.0, 200.0));
        assert_eq!(cov.width, 10);
        assert_eq!(cov.height, 10);
        assert_eq!(cov.count(), 0);
    }
}
