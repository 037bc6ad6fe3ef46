//! Screen capture using the `xcap` crate.
//!
//! This is the infrastructure layer — it talks to the OS.
//! xcap reports monitor bounds in a top-left global space and returns
//! bitmaps at the monitor's native resolution.

use super::{CaptureError, CaptureRequest, ScreenSource};
use crate::geometry::{DisplayDescriptor, Origin, Point, Size};
use image::RgbaImage;
use xcap::Monitor;

/// [`ScreenSource`] backed by `xcap::Monitor`.
#[derive(Debug, Default)]
pub struct XcapSource;

impl XcapSource {
    pub fn new() -> Self {
        Self
    }

    fn monitor_for(&self, id: u32) -> Result<Monitor, CaptureError> {
        let monitors = Monitor::all().map_err(api_failure)?;
        monitors
            .into_iter()
            .find(|m| m.id().map(|m_id| m_id == id).unwrap_or(false))
            .ok_or(CaptureError::NoDisplayFound)
    }
}

impl ScreenSource for XcapSource {
    fn displays(&self) -> Result<Vec<DisplayDescriptor>, CaptureError> {
        let monitors = Monitor::all().map_err(api_failure)?;
        let mut displays = Vec::with_capacity(monitors.len());
        for m in &monitors {
            let mut display = DisplayDescriptor::new(
                m.id().map_err(api_failure)?,
                Point::new(
                    f64::from(m.x().map_err(api_failure)?),
                    f64::from(m.y().map_err(api_failure)?),
                ),
                Size::new(
                    f64::from(m.width().map_err(api_failure)?),
                    f64::from(m.height().map_err(api_failure)?),
                ),
                f64::from(m.scale_factor().map_err(api_failure)?),
            );
            display.is_primary = m.is_primary().unwrap_or(false);
            displays.push(display);
        }
        Ok(displays)
    }

    fn origin(&self) -> Origin {
        Origin::TopLeft
    }

    fn capture(&self, request: &CaptureRequest) -> Result<RgbaImage, CaptureError> {
        if !request.excluded_windows.is_empty() {
            // xcap captures whole monitors; the overlay is already closed by now.
            log::debug!(
                "[CAPTURE] Ignoring {} excluded window(s)",
                request.excluded_windows.len()
            );
        }

        let monitor = self.monitor_for(request.display.id)?;
        let image = monitor.capture_image().map_err(api_failure)?;

        // An empty bitmap is what macOS hands back without Screen Recording access.
        if image.width() == 0 || image.height() == 0 {
            return Err(CaptureError::PermissionDenied);
        }
        if (image.width(), image.height()) != (request.pixel_width, request.pixel_height) {
            log::debug!(
                "[CAPTURE] Requested {}x{}, monitor returned {}x{}",
                request.pixel_width,
                request.pixel_height,
                image.width(),
                image.height()
            );
        }
        Ok(image)
    }
}

fn api_failure(e: impl std::fmt::Display) -> CaptureError {
    let message = e.to_string();
    if message.to_lowercase().contains("permission") {
        CaptureError::PermissionDenied
    } else {
        CaptureError::CaptureApiFailure(message)
    }
}
