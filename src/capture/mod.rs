//! Screen capture domain — public API.
//!
//! The OS capture call sits behind [`ScreenSource`]; everything above it
//! (display lookup, rectangle mapping, cropping) is platform-independent.
//! Captures run on tokio's blocking pool and never touch app state
//! directly: callers post the result back to the UI executor.

mod region;
#[cfg(feature = "desktop")]
mod screenshot;

pub use region::{crop, CropError};
#[cfg(feature = "desktop")]
pub use screenshot::XcapSource;

use crate::geometry::{DisplayDescriptor, DisplayLayout, LayoutError, Origin, Rect, ScaleConvention};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CaptureKind {
    FullScreen,
    Area,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum CaptureError {
    #[error("Screen recording permission has not been granted")]
    PermissionDenied,

    #[error("No display found")]
    NoDisplayFound,

    #[error("Capture region {requested:?} lies outside the {}x{} bitmap", bitmap.0, bitmap.1)]
    CropOutOfBounds {
        /// Display-local region, in bitmap pixels.
        requested: Rect,
        bitmap: (u32, u32),
    },

    #[error("Screen capture failed: {0}")]
    CaptureApiFailure(String),
}

impl From<LayoutError> for CaptureError {
    fn from(e: LayoutError) -> Self {
        match e {
            LayoutError::Empty => CaptureError::NoDisplayFound,
            other => CaptureError::CaptureApiFailure(other.to_string()),
        }
    }
}

/// What the OS capture boundary is asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRequest {
    pub display: DisplayDescriptor,
    /// Window ids to leave out of the capture (our own overlay).
    pub excluded_windows: Vec<u32>,
    pub pixel_width: u32,
    pub pixel_height: u32,
}

/// The OS capture boundary. Calls block; the orchestrator keeps them off
/// the async runtime.
pub trait ScreenSource: Send + Sync {
    fn displays(&self) -> Result<Vec<DisplayDescriptor>, CaptureError>;

    /// Origin convention of the global space `displays()` reports in.
    fn origin(&self) -> Origin;

    fn capture(&self, request: &CaptureRequest) -> Result<RgbaImage, CaptureError>;
}

/// Turns capture intents into bitmaps.
#[derive(Clone)]
pub struct CaptureOrchestrator {
    source: Arc<dyn ScreenSource>,
    convention: ScaleConvention,
    excluded_windows: Vec<u32>,
}

impl CaptureOrchestrator {
    pub fn new(source: Arc<dyn ScreenSource>, convention: ScaleConvention) -> Self {
        Self {
            source,
            convention,
            excluded_windows: Vec::new(),
        }
    }

    pub fn with_excluded_windows(mut self, windows: Vec<u32>) -> Self {
        self.excluded_windows = windows;
        self
    }

    pub fn convention(&self) -> ScaleConvention {
        self.convention
    }

    /// Snapshot of the attached displays.
    pub fn display_layout(&self) -> Result<DisplayLayout, CaptureError> {
        let displays = self.source.displays()?;
        Ok(DisplayLayout::new(displays, self.source.origin())?)
    }

    /// Captures the primary display at its native resolution.
    pub async fn capture_full_screen(&self) -> Result<RgbaImage, CaptureError> {
        let this = self.clone();
        run_blocking(move || this.full_screen_blocking()).await
    }

    /// Captures `rect` (top-left capture space, logical points).
    pub async fn capture_area(&self, rect: Rect) -> Result<RgbaImage, CaptureError> {
        let this = self.clone();
        run_blocking(move || this.area_blocking(rect)).await
    }

    fn full_screen_blocking(&self) -> Result<RgbaImage, CaptureError> {
        let start = Instant::now();
        let layout = self.display_layout()?;
        let display = layout.primary();
        let image = self.source.capture(&self.request_for(display))?;
        log::info!(
            "[CAPTURE] Full screen of display {}: {}x{} in {}ms",
            display.id,
            image.width(),
            image.height(),
            start.elapsed().as_millis()
        );
        Ok(image)
    }

    fn area_blocking(&self, rect: Rect) -> Result<RgbaImage, CaptureError> {
        let start = Instant::now();
        let layout = self.display_layout()?;
        let display = layout.display_for(&rect);
        let local = layout.to_display_local(&rect, display);
        let factor = self.convention.factor(display);

        let image = self.source.capture(&self.request_for(display))?;
        let out_of_bounds = || CaptureError::CropOutOfBounds {
            requested: local.scale(factor),
            bitmap: image.dimensions(),
        };

        let pixels = self
            .convention
            .to_pixels(&local, display)
            .ok_or_else(&out_of_bounds)?;
        let cropped = crop(&image, pixels).map_err(|_| out_of_bounds())?;

        log::info!(
            "[CAPTURE] Area {:?} on display {} -> pixels {:?} ({}x{}) in {}ms",
            rect,
            display.id,
            pixels,
            cropped.width(),
            cropped.height(),
            start.elapsed().as_millis()
        );
        Ok(cropped)
    }

    fn request_for(&self, display: &DisplayDescriptor) -> CaptureRequest {
        let (pixel_width, pixel_height) = self.convention.bitmap_size(display);
        CaptureRequest {
            display: display.clone(),
            excluded_windows: self.excluded_windows.clone(),
            pixel_width,
            pixel_height,
        }
    }
}

async fn run_blocking<F>(f: F) -> Result<RgbaImage, CaptureError>
where
    F: FnOnce() -> Result<RgbaImage, CaptureError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CaptureError::CaptureApiFailure(format!("Capture task failed: {}", e)))?
}

/// A capture in flight. Dropping the handle does not stop it; [`cancel`]
/// does.
///
/// [`cancel`]: CaptureTask::cancel
#[derive(Debug)]
pub struct CaptureTask {
    kind: CaptureKind,
    handle: tokio::task::JoinHandle<()>,
}

impl CaptureTask {
    /// Spawns `work` on the current tokio runtime.
    pub fn spawn<F>(kind: CaptureKind, work: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            kind,
            handle: tokio::spawn(work),
        }
    }

    pub fn kind(&self) -> CaptureKind {
        self.kind
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
