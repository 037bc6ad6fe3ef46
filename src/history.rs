//! In-memory capture history, newest first.
//!
//! Records own their bitmaps. File paths are filled in once the background
//! write finishes; a failed write leaves the record in place without a path.

use crate::capture::CaptureKind;
use chrono::{DateTime, Local};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CaptureId(pub u64);

impl std::fmt::Display for CaptureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct CaptureRecord {
    pub id: CaptureId,
    pub image: RgbaImage,
    pub kind: CaptureKind,
    pub timestamp: DateTime<Local>,
    pub file_path: Option<PathBuf>,
    pub annotated: Option<RgbaImage>,
    /// Claimed when the annotation is saved; the write may still be running.
    pub annotated_path: Option<PathBuf>,
}

impl CaptureRecord {
    /// The annotated version when there is one, else the original capture.
    pub fn display_image(&self) -> &RgbaImage {
        self.annotated.as_ref().unwrap_or(&self.image)
    }

    /// Files on disk belonging to this record.
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.file_path
            .as_deref()
            .into_iter()
            .chain(self.annotated_path.as_deref())
    }

    pub fn summary(&self) -> CaptureSummary {
        let image = self.display_image();
        CaptureSummary {
            id: self.id,
            kind: self.kind,
            timestamp: self.timestamp.to_rfc3339(),
            width: image.width(),
            height: image.height(),
            file_path: self.file_path.as_ref().map(|p| p.display().to_string()),
            annotated: self.annotated.is_some(),
        }
    }
}

/// What the history window lists for each capture.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSummary {
    pub id: CaptureId,
    pub kind: CaptureKind,
    pub timestamp: String,
    pub width: u32,
    pub height: u32,
    pub file_path: Option<String>,
    pub annotated: bool,
}

#[derive(Debug, Default)]
pub struct History {
    next_id: u64,
    records: Vec<CaptureRecord>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a capture at the front and returns its id.
    pub fn insert(&mut self, image: RgbaImage, kind: CaptureKind, timestamp: DateTime<Local>) -> CaptureId {
        self.next_id += 1;
        let id = CaptureId(self.next_id);
        log::info!(
            "[HISTORY] Recorded {:?} capture {} ({}x{})",
            kind,
            id,
            image.width(),
            image.height()
        );
        self.records.insert(
            0,
            CaptureRecord {
                id,
                image,
                kind,
                timestamp,
                file_path: None,
                annotated: None,
                annotated_path: None,
            },
        );
        id
    }

    pub fn get(&self, id: CaptureId) -> Option<&CaptureRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    fn get_mut(&mut self, id: CaptureId) -> Option<&mut CaptureRecord> {
        self.records.iter_mut().find(|r| r.id == id)
    }

    /// Returns `false` when the record has been deleted in the meantime.
    pub fn set_file_path(&mut self, id: CaptureId, path: PathBuf) -> bool {
        match self.get_mut(id) {
            Some(record) => {
                record.file_path = Some(path);
                true
            }
            None => false,
        }
    }

    /// Replaces any earlier annotated version.
    pub fn attach_annotation(
        &mut self,
        id: CaptureId,
        image: RgbaImage,
        path: Option<PathBuf>,
    ) -> bool {
        match self.get_mut(id) {
            Some(record) => {
                record.annotated = Some(image);
                record.annotated_path = path;
                true
            }
            None => false,
        }
    }

    /// Records where the annotated version was written.
    pub fn set_annotated_path(&mut self, id: CaptureId, path: PathBuf) -> bool {
        match self.get_mut(id) {
            Some(record) if record.annotated.is_some() => {
                record.annotated_path = Some(path);
                true
            }
            _ => false,
        }
    }

    /// Removes one record. Deleting its files is up to the caller.
    pub fn remove(&mut self, id: CaptureId) -> Option<CaptureRecord> {
        let index = self.records.iter().position(|r| r.id == id)?;
        Some(self.records.remove(index))
    }

    /// Removes every record, newest first.
    pub fn clear(&mut self) -> Vec<CaptureRecord> {
        std::mem::take(&mut self.records)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CaptureRecord> {
        self.records.iter()
    }

    pub fn latest(&self) -> Option<&CaptureRecord> {
        self.records.first()
    }

    pub fn summaries(&self) -> Vec<CaptureSummary> {
        self.records.iter().map(CaptureRecord::summary).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True when any record already uses `path` for its capture or
    /// annotated file.
    pub fn uses_path(&self, path: &Path) -> bool {
        self.records.iter().any(|r| r.files().any(|p| p == path))
    }
}
