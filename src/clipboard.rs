//! System clipboard seam.
//!
//! Every write replaces whatever the clipboard held. The payload carries the
//! raw RGBA bitmap and its PNG encoding; a sink publishes both so pasting
//! apps can pick either.

use crate::storage::{encode_png, PersistError};
use image::codecs::tiff::TiffEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbaImage};
use std::io::Cursor;

#[derive(Debug, thiserror::Error)]
pub enum ClipboardError {
    #[error("Clipboard write failed: {0}")]
    ClipboardWriteFailure(String),
}

impl From<PersistError> for ClipboardError {
    fn from(e: PersistError) -> Self {
        ClipboardError::ClipboardWriteFailure(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClipboardPayload {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA8.
    pub rgba: Vec<u8>,
    pub png: Vec<u8>,
}

impl ClipboardPayload {
    pub fn from_image(image: &RgbaImage) -> Result<Self, ClipboardError> {
        Ok(Self {
            width: image.width(),
            height: image.height(),
            rgba: image.as_raw().clone(),
            png: encode_png(image)?,
        })
    }

    /// The bitmap as an uncompressed TIFF, the pasteboard's native image type.
    pub fn tiff(&self) -> Result<Vec<u8>, ClipboardError> {
        let mut bytes = Cursor::new(Vec::new());
        TiffEncoder::new(&mut bytes)
            .write_image(&self.rgba, self.width, self.height, ExtendedColorType::Rgba8)
            .map_err(|e| ClipboardError::ClipboardWriteFailure(e.to_string()))?;
        Ok(bytes.into_inner())
    }
}

pub trait ClipboardSink: Send {
    fn write_image(&mut self, payload: &ClipboardPayload) -> Result<(), ClipboardError>;
}

/// Copies `image` to `sink`, logging the outcome. Failures are returned for
/// the caller to report; they never undo the capture.
pub fn copy_image(sink: &mut dyn ClipboardSink, image: &RgbaImage) -> Result<(), ClipboardError> {
    let start = std::time::Instant::now();
    let payload = ClipboardPayload::from_image(image)?;
    sink.write_image(&payload)?;
    log::info!(
        "[CLIPBOARD] Copied {}x{} image ({} PNG bytes) in {}ms",
        payload.width,
        payload.height,
        payload.png.len(),
        start.elapsed().as_millis()
    );
    Ok(())
}

#[cfg(feature = "desktop")]
pub use system::SystemClipboard;

#[cfg(feature = "desktop")]
mod system {
    use super::{ClipboardError, ClipboardPayload, ClipboardSink};

    /// The OS clipboard. A fresh handle is opened per write so no clipboard
    /// connection outlives the call.
    ///
    /// On macOS the general pasteboard gets TIFF and PNG data for one item.
    /// Elsewhere `arboard` publishes the bitmap in the platform's formats.
    #[derive(Debug, Default)]
    pub struct SystemClipboard;

    impl ClipboardSink for SystemClipboard {
        #[cfg(target_os = "macos")]
        fn write_image(&mut self, payload: &ClipboardPayload) -> Result<(), ClipboardError> {
            pasteboard::write(payload)
        }

        #[cfg(not(target_os = "macos"))]
        fn write_image(&mut self, payload: &ClipboardPayload) -> Result<(), ClipboardError> {
            let mut clipboard = arboard::Clipboard::new()
                .map_err(|e| ClipboardError::ClipboardWriteFailure(e.to_string()))?;
            clipboard
                .set_image(arboard::ImageData {
                    width: payload.width as usize,
                    height: payload.height as usize,
                    bytes: std::borrow::Cow::Borrowed(&payload.rgba),
                })
                .map_err(|e| ClipboardError::ClipboardWriteFailure(e.to_string()))
        }
    }

    #[cfg(target_os = "macos")]
    mod pasteboard {
        use super::{ClipboardError, ClipboardPayload};
        use objc2_app_kit::{NSPasteboard, NSPasteboardTypePNG, NSPasteboardTypeTIFF};
        use objc2_foundation::NSData;

        #[allow(unused_unsafe)]
        pub(super) fn write(payload: &ClipboardPayload) -> Result<(), ClipboardError> {
            let tiff = NSData::with_bytes(&payload.tiff()?);
            let png = NSData::with_bytes(&payload.png);
            let written = unsafe {
                let board = NSPasteboard::generalPasteboard();
                board.clearContents();
                board.setData_forType(Some(&tiff), NSPasteboardTypeTIFF)
                    && board.setData_forType(Some(&png), NSPasteboardTypePNG)
            };
            if written {
                Ok(())
            } else {
                Err(ClipboardError::ClipboardWriteFailure(
                    "pasteboard rejected the image data".into(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[derive(Default)]
    struct Recorder {
        writes: Vec<ClipboardPayload>,
    }

    impl ClipboardSink for Recorder {
        fn write_image(&mut self, payload: &ClipboardPayload) -> Result<(), ClipboardError> {
            self.writes.push(payload.clone());
            Ok(())
        }
    }

    struct Broken;

    impl ClipboardSink for Broken {
        fn write_image(&mut self, _: &ClipboardPayload) -> Result<(), ClipboardError> {
            Err(ClipboardError::ClipboardWriteFailure("pasteboard unavailable".into()))
        }
    }

    #[test]
    fn payload_carries_raw_and_png() {
        let img = RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 4]));
        let payload = ClipboardPayload::from_image(&img).unwrap();
        assert_eq!((payload.width, payload.height), (3, 2));
        assert_eq!(payload.rgba.len(), 3 * 2 * 4);
        assert_eq!(&payload.png[1..4], b"PNG");
    }

    #[test]
    fn sink_receives_decodable_png_and_tiff() {
        let img = RgbaImage::from_fn(4, 3, |x, y| Rgba([x as u8 * 60, y as u8 * 80, 7, 255]));
        let mut sink = Recorder::default();
        copy_image(&mut sink, &img).unwrap();

        let payload = &sink.writes[0];
        let png = image::load_from_memory_with_format(&payload.png, image::ImageFormat::Png)
            .unwrap()
            .to_rgba8();
        assert_eq!(png, img);

        let tiff = image::load_from_memory_with_format(&payload.tiff().unwrap(), image::ImageFormat::Tiff)
            .unwrap()
            .to_rgba8();
        assert_eq!(tiff, img);
    }

    #[test]
    fn each_copy_is_one_write() {
        let mut sink = Recorder::default();
        copy_image(&mut sink, &RgbaImage::new(1, 1)).unwrap();
        copy_image(&mut sink, &RgbaImage::new(2, 2)).unwrap();
        assert_eq!(sink.writes.len(), 2);
        assert_eq!(sink.writes[1].width, 2);
    }

    #[test]
    fn sink_failure_is_reported() {
        let err = copy_image(&mut Broken, &RgbaImage::new(1, 1)).unwrap_err();
        assert!(err.to_string().contains("pasteboard unavailable"));
    }
}
