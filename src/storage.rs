//! PNG persistence under the output folder.
//!
//! Layout:
//!   <root>/Screenshot_<yyyy-MM-dd_HH-mm-ss>.png
//!   <root>/Annotated/Screenshot_<yyyy-MM-dd_HH-mm-ss>_annotated.png
//!
//! `<root>` defaults to `<Pictures>/SimpleShot`. Directories are created on
//! first write. Failures here are reported but never undo a capture.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Local};
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder, RgbaImage};
use std::path::{Path, PathBuf};
use std::time::Instant;

pub const APP_FOLDER: &str = "SimpleShot";
pub const ANNOTATED_FOLDER: &str = "Annotated";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("PNG encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Failed to write {}: {source}", path.display())]
    FileWriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove {}: {source}", path.display())]
    FileRemoveFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where captures and annotated copies are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl Default for OutputLayout {
    fn default() -> Self {
        Self::new(Self::default_root())
    }
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `<Pictures>/SimpleShot`, or `./SimpleShot` when the platform has no
    /// pictures folder.
    pub fn default_root() -> PathBuf {
        dirs::picture_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_FOLDER)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn annotated_dir(&self) -> PathBuf {
        self.root.join(ANNOTATED_FOLDER)
    }

    pub fn capture_path(&self, timestamp: &DateTime<Local>) -> PathBuf {
        self.root
            .join(format!("Screenshot_{}.png", timestamp.format(TIMESTAMP_FORMAT)))
    }

    pub fn annotated_path(&self, timestamp: &DateTime<Local>) -> PathBuf {
        self.annotated_dir().join(format!(
            "Screenshot_{}_annotated.png",
            timestamp.format(TIMESTAMP_FORMAT)
        ))
    }
}

/// First of `path`, `<stem>_2.<ext>`, `<stem>_3.<ext>`, ... that `taken`
/// rejects. Two captures in the same second would otherwise share a name.
pub fn unique_path(path: PathBuf, taken: impl Fn(&Path) -> bool) -> PathBuf {
    if !taken(&path) {
        return path;
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let mut n = 2u32;
    loop {
        let candidate = path.with_file_name(format!("{}_{}{}", stem, n, ext));
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Lossless PNG at the strongest compression level.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, PersistError> {
    let mut bytes = Vec::new();
    PngEncoder::new_with_quality(&mut bytes, CompressionType::Best, FilterType::Adaptive)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgba8,
        )
        .map_err(|e| PersistError::EncodingFailed(e.to_string()))?;
    Ok(bytes)
}

/// PNG as a `data:` URL for the webview.
pub fn png_data_url(image: &RgbaImage) -> Result<String, PersistError> {
    let png = encode_png(image)?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}

/// Encodes and writes `image`, creating parent directories.
pub fn write_png(path: &Path, image: &RgbaImage) -> Result<(), PersistError> {
    let start = Instant::now();
    let write_failure = |source: std::io::Error| PersistError::FileWriteFailure {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_failure)?;
    }
    let bytes = encode_png(image)?;
    std::fs::write(path, &bytes).map_err(write_failure)?;

    log::info!(
        "[STORAGE] Wrote {} ({} bytes) in {}ms",
        path.display(),
        bytes.len(),
        start.elapsed().as_millis()
    );
    Ok(())
}

/// Deletes a capture file. A file that is already gone is not an error.
pub fn remove_file(path: &Path) -> Result<(), PersistError> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            log::info!("[STORAGE] Removed {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(PersistError::FileRemoveFailure {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use image::Rgba;

    fn ts() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 42).unwrap()
    }

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("simpleshot_storage_{}_{}", name, std::process::id()))
    }

    #[test]
    fn file_names_follow_timestamp_format() {
        let layout = OutputLayout::new("/shots");
        assert_eq!(
            layout.capture_path(&ts()),
            PathBuf::from("/shots/Screenshot_2024-03-09_07-05-42.png")
        );
        assert_eq!(
            layout.annotated_path(&ts()),
            PathBuf::from("/shots/Annotated/Screenshot_2024-03-09_07-05-42_annotated.png")
        );
    }

    #[test]
    fn default_root_ends_with_app_folder() {
        assert!(OutputLayout::default().root().ends_with(APP_FOLDER));
    }

    #[test]
    fn unique_path_appends_counter() {
        let base = PathBuf::from("/shots/Screenshot_x.png");
        let taken = |p: &Path| {
            p == Path::new("/shots/Screenshot_x.png") || p == Path::new("/shots/Screenshot_x_2.png")
        };
        assert_eq!(unique_path(base.clone(), taken), PathBuf::from("/shots/Screenshot_x_3.png"));
        assert_eq!(unique_path(base.clone(), |_| false), base);
    }

    #[test]
    fn write_png_creates_directories_and_valid_file() {
        let root = scratch("write");
        let path = OutputLayout::new(&root).annotated_path(&ts());
        let img = RgbaImage::from_pixel(8, 4, Rgba([10, 20, 30, 255]));

        write_png(&path, &img).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..8], &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]);
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded, img);

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn remove_missing_file_is_ok() {
        assert!(remove_file(&scratch("never_written.png")).is_ok());
    }

    #[test]
    fn data_url_has_png_prefix() {
        let url = png_data_url(&RgbaImage::new(2, 2)).unwrap();
        assert!(url.starts_with("data:image/png;base64,iVBORw0KGgo"));
    }
}
