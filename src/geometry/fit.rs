//! Aspect-fit mapping between an editor view and the image it displays.

use super::{Origin, Point, Size};

/// An image scaled to fit inside a view, centered with letterbox margins.
///
/// View coordinates use `view_origin`; image coordinates are always
/// top-left. Shapes are stored in image space so they survive view resizes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AspectFit {
    view: Size,
    image: Size,
    view_origin: Origin,
    scale: f64,
    offset: Point,
}

impl AspectFit {
    /// Returns `None` when either size is empty or non-finite.
    pub fn new(view: Size, image: Size, view_origin: Origin) -> Option<Self> {
        if !view.is_usable() || !image.is_usable() {
            return None;
        }
        let scale = (view.width / image.width).min(view.height / image.height);
        let offset = Point::new(
            (view.width - image.width * scale) / 2.0,
            (view.height - image.height * scale) / 2.0,
        );
        Some(Self {
            view,
            image,
            view_origin,
            scale,
            offset,
        })
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Letterbox margin on the left and on the view's origin side.
    pub fn offset(&self) -> Point {
        self.offset
    }

    pub fn view_size(&self) -> Size {
        self.view
    }

    pub fn image_size(&self) -> Size {
        self.image
    }

    pub fn view_to_image(&self, view: Point) -> Point {
        let x = (view.x - self.offset.x) / self.scale;
        let y = (view.y - self.offset.y) / self.scale;
        match self.view_origin {
            Origin::TopLeft => Point::new(x, y),
            Origin::BottomLeft => Point::new(x, self.image.height - y),
        }
    }

    pub fn image_to_view(&self, image: Point) -> Point {
        let y = match self.view_origin {
            Origin::TopLeft => image.y,
            Origin::BottomLeft => self.image.height - image.y,
        };
        Point::new(
            self.offset.x + image.x * self.scale,
            self.offset.y + y * self.scale,
        )
    }
}
