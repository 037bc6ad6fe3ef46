//! Annotation editor session: one base image, its layer, and the drag
//! currently being drawn in view coordinates.

use super::{arrowhead, AnnotationLayer, AnnotationShape, Color, ShapeKind, DEFAULT_STROKE_WIDTH};
use crate::geometry::{AspectFit, Origin, Point, Size};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnnotationTool {
    #[default]
    Rectangle,
    Circle,
    Line,
    Arrow,
    /// Selection pointer. Drags with it still draw a rectangle.
    Pointer,
}

impl AnnotationTool {
    pub fn shape_kind(&self) -> ShapeKind {
        match self {
            AnnotationTool::Rectangle | AnnotationTool::Pointer => ShapeKind::Rectangle,
            AnnotationTool::Circle => ShapeKind::Circle,
            AnnotationTool::Line => ShapeKind::Line,
            AnnotationTool::Arrow => ShapeKind::Arrow,
        }
    }
}

/// A shape mapped into view coordinates for the editor to stroke on screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewShape {
    pub kind: ShapeKind,
    pub start: Point,
    pub end: Point,
    pub color: Color,
    pub stroke_width: f64,
    pub opacity: f64,
    pub arrowhead: Option<[Point; 3]>,
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    start: Point,
    current: Option<Point>,
}

pub struct AnnotationCanvas {
    base: RgbaImage,
    layer: AnnotationLayer,
    tool: AnnotationTool,
    color: Color,
    stroke_width: f64,
    view_origin: Origin,
    fit: Option<AspectFit>,
    drag: Option<Drag>,
}

impl AnnotationCanvas {
    pub fn new(base: RgbaImage, view: Size, view_origin: Origin) -> Self {
        let fit = AspectFit::new(view, image_size(&base), view_origin);
        Self {
            base,
            layer: AnnotationLayer::new(),
            tool: AnnotationTool::default(),
            color: Color::default(),
            stroke_width: DEFAULT_STROKE_WIDTH,
            view_origin,
            fit,
            drag: None,
        }
    }

    pub fn with_stroke_width(mut self, stroke_width: f64) -> Self {
        self.stroke_width = stroke_width;
        self
    }

    pub fn base(&self) -> &RgbaImage {
        &self.base
    }

    pub fn layer(&self) -> &AnnotationLayer {
        &self.layer
    }

    pub fn tool(&self) -> AnnotationTool {
        self.tool
    }

    pub fn set_tool(&mut self, tool: AnnotationTool) {
        self.tool = tool;
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    pub fn fit(&self) -> Option<&AspectFit> {
        self.fit.as_ref()
    }

    /// Recomputes the letterbox fit. Stored shapes are in image space and
    /// are unaffected; an in-progress drag is dropped.
    pub fn resize_view(&mut self, view: Size) {
        self.fit = AspectFit::new(view, image_size(&self.base), self.view_origin);
        self.drag = None;
    }

    /// Starts a drag. Returns `false` when the view has no usable size.
    pub fn press(&mut self, at: Point) -> bool {
        if self.fit.is_none() {
            return false;
        }
        self.drag = Some(Drag {
            start: at,
            current: None,
        });
        true
    }

    /// Moves the drag's free end; returns the live shape in view space.
    pub fn drag_to(&mut self, at: Point) -> Option<ViewShape> {
        let drag = self.drag.as_mut()?;
        drag.current = Some(at);
        self.preview_shape_in_view()
    }

    /// Ends the drag and appends the shape in image space.
    ///
    /// A press released without any drag movement draws nothing.
    pub fn release(&mut self, at: Point) -> Option<AnnotationShape> {
        let drag = self.drag.take()?;
        drag.current?;
        let shape = self.shape_between(drag.start, at)?;
        log::info!(
            "[ANNOTATE] Added {:?} ({:.1},{:.1})→({:.1},{:.1})",
            shape.kind,
            shape.start.x,
            shape.start.y,
            shape.end.x,
            shape.end.y
        );
        self.layer.append(shape);
        Some(shape)
    }

    pub fn undo(&mut self) -> Option<AnnotationShape> {
        self.layer.undo()
    }

    pub fn clear(&mut self) {
        self.layer.clear();
        self.drag = None;
    }

    /// The in-progress shape, in image space.
    pub fn in_progress(&self) -> Option<AnnotationShape> {
        let drag = self.drag?;
        self.shape_between(drag.start, drag.current?)
    }

    /// Committed shapes plus the in-progress one, mapped to view space.
    pub fn shapes_in_view(&self) -> Vec<ViewShape> {
        let Some(fit) = self.fit else {
            return Vec::new();
        };
        let mut out: Vec<ViewShape> = self
            .layer
            .shapes()
            .iter()
            .map(|s| to_view(&fit, s, super::COMMITTED_OPACITY))
            .collect();
        out.extend(self.preview_shape_in_view());
        out
    }

    /// Base image with committed shapes and the live preview composited.
    pub fn render(&self) -> RgbaImage {
        let preview = self.in_progress();
        self.layer.render_with_preview(&self.base, preview.as_ref())
    }

    /// Final image: committed shapes only.
    pub fn flatten(&self) -> RgbaImage {
        self.layer.flatten(&self.base)
    }

    /// The live drag, mapped into view space for the shell to stroke.
    pub fn preview_shape_in_view(&self) -> Option<ViewShape> {
        let fit = self.fit?;
        self.in_progress()
            .map(|shape| to_view(&fit, &shape, super::PREVIEW_OPACITY))
    }

    fn shape_between(&self, start: Point, end: Point) -> Option<AnnotationShape> {
        let fit = self.fit?;
        Some(
            AnnotationShape::new(
                self.tool.shape_kind(),
                fit.view_to_image(start),
                fit.view_to_image(end),
            )
            .with_color(self.color)
            .with_stroke_width(self.stroke_width),
        )
    }
}

fn image_size(image: &RgbaImage) -> Size {
    Size::new(f64::from(image.width()), f64::from(image.height()))
}

fn to_view(fit: &AspectFit, shape: &AnnotationShape, opacity: f64) -> ViewShape {
    let start = fit.image_to_view(shape.start);
    let end = fit.image_to_view(shape.end);
    ViewShape {
        kind: shape.kind,
        start,
        end,
        color: shape.color,
        stroke_width: shape.stroke_width,
        opacity,
        arrowhead: (shape.kind == ShapeKind::Arrow).then(|| arrowhead(start, end)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn canvas(origin: Origin) -> AnnotationCanvas {
        // 200x100 image in a 400x400 view: scale 2, 100pt bars top and bottom.
        let base = RgbaImage::from_pixel(200, 100, Rgba([255, 255, 255, 255]));
        AnnotationCanvas::new(base, Size::new(400.0, 400.0), origin)
    }

    #[test]
    fn drag_appends_shape_in_image_space() {
        let mut c = canvas(Origin::TopLeft);
        c.set_tool(AnnotationTool::Line);
        assert!(c.press(Point::new(0.0, 100.0)));
        c.drag_to(Point::new(200.0, 200.0));
        let shape = c.release(Point::new(400.0, 300.0)).unwrap();
        assert_eq!(shape.kind, ShapeKind::Line);
        assert_eq!(shape.start, Point::new(0.0, 0.0));
        assert_eq!(shape.end, Point::new(200.0, 100.0));
        assert_eq!(c.layer().len(), 1);
    }

    #[test]
    fn bottom_up_view_flips_into_image_space() {
        let mut c = canvas(Origin::BottomLeft);
        c.press(Point::new(0.0, 100.0));
        c.drag_to(Point::new(10.0, 110.0));
        let shape = c.release(Point::new(400.0, 300.0)).unwrap();
        // View bottom edge of the picture is image row 100.
        assert_eq!(shape.start, Point::new(0.0, 100.0));
        assert_eq!(shape.end, Point::new(200.0, 0.0));
    }

    #[test]
    fn click_without_drag_draws_nothing() {
        let mut c = canvas(Origin::TopLeft);
        c.press(Point::new(50.0, 150.0));
        assert_eq!(c.release(Point::new(50.0, 150.0)), None);
        assert!(c.layer().is_empty());
    }

    #[test]
    fn pointer_tool_draws_rectangles() {
        let mut c = canvas(Origin::TopLeft);
        c.set_tool(AnnotationTool::Pointer);
        c.press(Point::new(20.0, 120.0));
        c.drag_to(Point::new(60.0, 160.0));
        assert_eq!(c.release(Point::new(60.0, 160.0)).unwrap().kind, ShapeKind::Rectangle);
    }

    #[test]
    fn preview_is_reported_in_view_space() {
        let mut c = canvas(Origin::TopLeft);
        c.set_tool(AnnotationTool::Arrow);
        c.press(Point::new(100.0, 200.0));
        let live = c.drag_to(Point::new(300.0, 200.0)).unwrap();
        assert_eq!(live.start, Point::new(100.0, 200.0));
        assert_eq!(live.end, Point::new(300.0, 200.0));
        assert_eq!(live.opacity, super::super::PREVIEW_OPACITY);
        let head = live.arrowhead.unwrap();
        assert_eq!(head[0], Point::new(300.0, 200.0));
        assert!(c.layer().is_empty());
    }

    #[test]
    fn shapes_survive_view_resize() {
        let mut c = canvas(Origin::TopLeft);
        c.press(Point::new(0.0, 100.0));
        c.drag_to(Point::new(400.0, 300.0));
        c.release(Point::new(400.0, 300.0));
        let before = c.flatten();

        c.resize_view(Size::new(1000.0, 250.0));
        assert_eq!(c.flatten(), before);
        let view = c.shapes_in_view();
        // 200x100 image in 1000x250 view: scale 2.5, 250pt side margins.
        assert_eq!(view[0].start, Point::new(250.0, 0.0));
        assert_eq!(view[0].end, Point::new(750.0, 250.0));
    }

    #[test]
    fn unusable_view_refuses_drags() {
        let base = RgbaImage::new(10, 10);
        let mut c = AnnotationCanvas::new(base, Size::new(0.0, 0.0), Origin::TopLeft);
        assert!(!c.press(Point::new(1.0, 1.0)));
        assert!(c.shapes_in_view().is_empty());
    }

    #[test]
    fn render_includes_preview_but_flatten_does_not() {
        let mut c = canvas(Origin::TopLeft);
        c.press(Point::new(0.0, 100.0));
        c.drag_to(Point::new(400.0, 300.0));
        assert_ne!(c.render(), c.flatten());
        assert_eq!(&c.flatten(), c.base());
    }
}
