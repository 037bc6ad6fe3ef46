//! App state and the handlers that run on the UI executor.
//!
//! `Workspace` owns every piece of mutable state: history, the selection
//! overlay slot, the open editor, the clipboard sink, and the captures in
//! flight. Handlers are plain `&mut self` methods; callers reach them through
//! a [`WorkspaceHandle`].
//!
//! Capture flow after a successful grab:
//!   history insert → clipboard write → background PNG write → (settle delay)
//!   `CaptureRecorded` broadcast
//! A failed clipboard or file write is reported but the record stays.

use crate::annotation::AnnotationCanvas;
use crate::capture::{CaptureError, CaptureKind, CaptureOrchestrator, CaptureTask};
use crate::clipboard::{self, ClipboardError, ClipboardSink};
use crate::config::Settings;
use crate::dispatch::{UiClosed, UiHandle};
use crate::geometry::{DisplayDescriptor, Origin, Point, Rect, Size};
use crate::history::{CaptureId, CaptureRecord, CaptureSummary, History};
use crate::selection::{
    OverlaySlot, OverlayTicket, SelectionError, SelectionFeedback, SelectionOutcome,
};
use crate::storage::{self, OutputLayout, PersistError};
use chrono::Local;
use image::RgbaImage;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast;

pub type WorkspaceHandle = UiHandle<Workspace>;

const EVENT_CAPACITY: usize = 64;

/// Time for the overlay windows to leave the screen before an area grab.
const OVERLAY_TEARDOWN: Duration = Duration::from_millis(80);

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Clipboard(#[from] ClipboardError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error("Capture {0} not found")]
    UnknownCapture(CaptureId),

    #[error("No annotation editor is open")]
    NoEditor,

    #[error(transparent)]
    UiClosed(#[from] UiClosed),
}

/// The overlay the shell should show: one window per display, all sharing
/// the ticket.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlaySession {
    pub ticket: OverlayTicket,
    /// Overlay that was force-closed to make room; its windows must go.
    pub replaced: Option<OverlayTicket>,
    pub origin: Origin,
    pub displays: Vec<DisplayDescriptor>,
}

/// Notifications for the shell and the webviews.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum AppEvent {
    OverlayOpened { overlay: OverlaySession },
    OverlayClosed { ticket: OverlayTicket },
    CaptureRecorded { capture: CaptureSummary },
    CaptureSaved { id: CaptureId, path: String },
    CaptureFailed {
        kind: CaptureKind,
        message: String,
        permission_denied: bool,
    },
    PersistFailed { id: CaptureId, message: String },
    ClipboardFailed { message: String },
    EditorOpened { id: CaptureId },
    EditorClosed { id: CaptureId },
    AnnotationSaved { id: CaptureId, path: String },
    HistoryChanged,
}

/// The annotation editor bound to one history record.
pub struct EditorSession {
    pub capture: CaptureId,
    pub canvas: AnnotationCanvas,
}

type WriteDone = Box<dyn FnOnce(&mut Workspace, PathBuf, Result<(), PersistError>) + Send>;

pub struct Workspace {
    settings: Settings,
    capture: CaptureOrchestrator,
    history: History,
    overlays: OverlaySlot,
    editor: Option<EditorSession>,
    output: OutputLayout,
    clipboard: Box<dyn ClipboardSink>,
    ui: WorkspaceHandle,
    events: broadcast::Sender<AppEvent>,
    /// Paths claimed by writes that have not finished yet.
    pending_paths: HashSet<PathBuf>,
    tasks: Vec<CaptureTask>,
}

impl Workspace {
    pub fn new(
        settings: Settings,
        capture: CaptureOrchestrator,
        output: OutputLayout,
        clipboard: Box<dyn ClipboardSink>,
        ui: WorkspaceHandle,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        log::info!(
            "[UI] Workspace ready: output={}, scale={:?}",
            output.root().display(),
            capture.convention()
        );
        Self {
            settings,
            capture,
            history: History::new(),
            overlays: OverlaySlot::new(),
            editor: None,
            output,
            clipboard,
            ui,
            events,
            pending_paths: HashSet::new(),
            tasks: Vec::new(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.events.subscribe()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn overlays(&self) -> &OverlaySlot {
        &self.overlays
    }

    pub fn output(&self) -> &OutputLayout {
        &self.output
    }

    fn emit(&self, event: AppEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    // ── Selection ───────────────────────────────────────────────────

    /// Opens a fresh selection overlay, force-closing any previous one.
    pub fn begin_selection(&mut self) -> Result<OverlaySession, WorkspaceError> {
        let layout = self.capture.display_layout()?;
        let origin = layout.origin();
        let displays = layout.displays().to_vec();
        let opened = self.overlays.open(layout);
        let session = OverlaySession {
            ticket: opened.ticket,
            replaced: opened.replaced,
            origin,
            displays,
        };
        log::info!(
            "[SELECTION] Overlay {:?} opened across {} display(s)",
            session.ticket,
            session.displays.len()
        );
        self.emit(AppEvent::OverlayOpened {
            overlay: session.clone(),
        });
        Ok(session)
    }

    pub fn selection_press(&mut self, ticket: OverlayTicket, at: Point) -> Result<(), WorkspaceError> {
        Ok(self.overlays.press(ticket, at)?)
    }

    pub fn selection_move(
        &mut self,
        ticket: OverlayTicket,
        at: Point,
    ) -> Result<Option<SelectionFeedback>, WorkspaceError> {
        Ok(self.overlays.drag_to(ticket, at)?)
    }

    /// Ends the drag and closes the overlay. A committed selection starts an
    /// area capture.
    pub fn selection_release(
        &mut self,
        ticket: OverlayTicket,
        at: Point,
    ) -> Result<SelectionOutcome, WorkspaceError> {
        let outcome = self.overlays.release(ticket, at)?;
        self.emit(AppEvent::OverlayClosed { ticket });
        if let SelectionOutcome::Committed(rect) = outcome {
            self.dispatch_capture(CaptureKind::Area, Some(rect));
        }
        Ok(outcome)
    }

    /// Escape. Captures already dispatched keep running.
    pub fn selection_cancel(&mut self, ticket: OverlayTicket) -> Result<(), WorkspaceError> {
        self.overlays.cancel(ticket)?;
        self.emit(AppEvent::OverlayClosed { ticket });
        Ok(())
    }

    // ── Capture ─────────────────────────────────────────────────────

    pub fn capture_full_screen(&mut self) {
        self.dispatch_capture(CaptureKind::FullScreen, None);
    }

    /// Captures `rect` (top-left capture space) directly, without an overlay.
    pub fn capture_area(&mut self, rect: Rect) {
        self.dispatch_capture(CaptureKind::Area, Some(rect));
    }

    /// Number of captures still running.
    pub fn captures_in_flight(&mut self) -> usize {
        self.tasks.retain(|t| !t.is_finished());
        self.tasks.len()
    }

    /// Aborts every capture still running.
    pub fn cancel_captures(&mut self) -> usize {
        let tasks = std::mem::take(&mut self.tasks);
        let mut cancelled = 0;
        for task in tasks.iter().filter(|t| !t.is_finished()) {
            task.cancel();
            cancelled += 1;
        }
        if cancelled > 0 {
            log::info!("[CAPTURE] Cancelled {} capture(s) in flight", cancelled);
        }
        cancelled
    }

    fn dispatch_capture(&mut self, kind: CaptureKind, area: Option<Rect>) {
        self.tasks.retain(|t| !t.is_finished());
        let capture = self.capture.clone();
        let ui = self.ui.clone();
        log::info!("[CAPTURE] Dispatching {:?} capture", kind);
        let task = CaptureTask::spawn(kind, async move {
            let result = match area {
                Some(rect) => {
                    tokio::time::sleep(OVERLAY_TEARDOWN).await;
                    capture.capture_area(rect).await
                }
                None => capture.capture_full_screen().await,
            };
            let posted = ui.post(move |ws| match result {
                Ok(image) => {
                    ws.record_capture(image, kind);
                }
                Err(e) => ws.capture_failed(kind, e),
            });
            if posted.is_err() {
                log::warn!("[CAPTURE] UI executor gone, dropping {:?} result", kind);
            }
        });
        self.tasks.push(task);
    }

    /// Stores a finished capture: history first, then clipboard, then a
    /// background file write. Observers hear about it after the clipboard
    /// settle delay.
    pub fn record_capture(&mut self, image: RgbaImage, kind: CaptureKind) -> CaptureId {
        let timestamp = Local::now();
        let id = self.history.insert(image.clone(), kind, timestamp);

        self.copy_to_clipboard(&image);

        let path = self.claim_path(self.output.capture_path(&timestamp));
        self.spawn_write(
            path,
            image,
            Box::new(move |ws: &mut Workspace, path: PathBuf, result: Result<(), PersistError>| {
                ws.finish_capture_write(id, path, result)
            }),
        );

        let ui = self.ui.clone();
        let settle = self.settings.clipboard_settle;
        tokio::spawn(async move {
            tokio::time::sleep(settle).await;
            let _ = ui.post(move |ws| {
                if let Some(record) = ws.history.get(id) {
                    let capture = record.summary();
                    ws.emit(AppEvent::CaptureRecorded { capture });
                }
            });
        });

        id
    }

    pub fn capture_failed(&mut self, kind: CaptureKind, error: CaptureError) {
        log::error!("[CAPTURE] {:?} capture failed: {}", kind, error);
        self.emit(AppEvent::CaptureFailed {
            kind,
            message: error.to_string(),
            permission_denied: matches!(error, CaptureError::PermissionDenied),
        });
    }

    fn finish_capture_write(&mut self, id: CaptureId, path: PathBuf, result: Result<(), PersistError>) {
        self.pending_paths.remove(&path);
        match result {
            Ok(()) => {
                if self.history.set_file_path(id, path.clone()) {
                    self.emit(AppEvent::CaptureSaved {
                        id,
                        path: path.display().to_string(),
                    });
                } else {
                    log::info!(
                        "[STORAGE] Capture {} was deleted before {} landed, removing it",
                        id,
                        path.display()
                    );
                    self.remove_file_logged(&path);
                }
            }
            Err(e) => {
                log::error!("[STORAGE] Capture {} not saved: {}", id, e);
                self.emit(AppEvent::PersistFailed {
                    id,
                    message: e.to_string(),
                });
            }
        }
    }

    // ── Editor ──────────────────────────────────────────────────────

    /// Opens the editor on a capture, showing its annotated version when
    /// there is one. Replaces any editor already open.
    pub fn open_editor(
        &mut self,
        id: CaptureId,
        view: Size,
        view_origin: Origin,
    ) -> Result<(), WorkspaceError> {
        let record = self.history.get(id).ok_or(WorkspaceError::UnknownCapture(id))?;
        let canvas = AnnotationCanvas::new(record.display_image().clone(), view, view_origin)
            .with_stroke_width(self.settings.stroke_width);
        // A replaced session is dropped silently; the window is reused.
        if let Some(previous) = self.editor.replace(EditorSession { capture: id, canvas }) {
            log::info!("[ANNOTATE] Editor moved from capture {}", previous.capture);
        }
        log::info!("[ANNOTATE] Editor opened on capture {}", id);
        self.emit(AppEvent::EditorOpened { id });
        Ok(())
    }

    pub fn editor(&self) -> Result<&EditorSession, WorkspaceError> {
        self.editor.as_ref().ok_or(WorkspaceError::NoEditor)
    }

    pub fn editor_mut(&mut self) -> Result<&mut EditorSession, WorkspaceError> {
        self.editor.as_mut().ok_or(WorkspaceError::NoEditor)
    }

    pub fn close_editor(&mut self) -> Option<CaptureId> {
        let session = self.editor.take()?;
        self.emit(AppEvent::EditorClosed {
            id: session.capture,
        });
        Some(session.capture)
    }

    /// Flattens the editor's shapes into the capture, copies the result,
    /// writes it under `Annotated/`, and closes the editor.
    pub fn save_annotation(&mut self) -> Result<CaptureId, WorkspaceError> {
        let session = self.editor.as_ref().ok_or(WorkspaceError::NoEditor)?;
        let id = session.capture;
        let record = self.history.get(id).ok_or(WorkspaceError::UnknownCapture(id))?;
        let timestamp = record.timestamp;
        let previous_path = record.annotated_path.clone();

        let flattened = session.canvas.flatten();
        log::info!(
            "[ANNOTATE] Saving {} shape(s) onto capture {}",
            session.canvas.layer().len(),
            id
        );

        // The record owns its annotated path from the moment it is claimed,
        // so a re-save overwrites it even while the first write is in flight.
        let path = match previous_path {
            Some(path) => {
                self.pending_paths.insert(path.clone());
                path
            }
            None => self.claim_path(self.output.annotated_path(&timestamp)),
        };
        self.history
            .attach_annotation(id, flattened.clone(), Some(path.clone()));
        self.copy_to_clipboard(&flattened);

        self.spawn_write(
            path,
            flattened,
            Box::new(move |ws: &mut Workspace, path: PathBuf, result: Result<(), PersistError>| {
                ws.finish_annotation_write(id, path, result)
            }),
        );

        self.close_editor();
        self.emit(AppEvent::HistoryChanged);
        Ok(id)
    }

    fn finish_annotation_write(&mut self, id: CaptureId, path: PathBuf, result: Result<(), PersistError>) {
        self.pending_paths.remove(&path);
        match result {
            Ok(()) => {
                if self.history.set_annotated_path(id, path.clone()) {
                    self.emit(AppEvent::AnnotationSaved {
                        id,
                        path: path.display().to_string(),
                    });
                } else {
                    self.remove_file_logged(&path);
                }
            }
            Err(e) => {
                log::error!("[STORAGE] Annotation for {} not saved: {}", id, e);
                self.emit(AppEvent::PersistFailed {
                    id,
                    message: e.to_string(),
                });
            }
        }
    }

    // ── History ─────────────────────────────────────────────────────

    pub fn capture_summaries(&self) -> Vec<CaptureSummary> {
        self.history.summaries()
    }

    /// The image the history window shows for a capture.
    pub fn capture_image(&self, id: CaptureId) -> Result<&RgbaImage, WorkspaceError> {
        self.history
            .get(id)
            .map(CaptureRecord::display_image)
            .ok_or(WorkspaceError::UnknownCapture(id))
    }

    pub fn copy_capture(&mut self, id: CaptureId) -> Result<(), WorkspaceError> {
        let record = self.history.get(id).ok_or(WorkspaceError::UnknownCapture(id))?;
        clipboard::copy_image(self.clipboard.as_mut(), record.display_image())?;
        Ok(())
    }

    /// Removes a capture and its files.
    pub fn delete_capture(&mut self, id: CaptureId) -> Result<(), WorkspaceError> {
        let record = self.history.remove(id).ok_or(WorkspaceError::UnknownCapture(id))?;
        self.remove_record_files(&record);
        if self.editor.as_ref().map(|e| e.capture) == Some(id) {
            self.close_editor();
        }
        log::info!("[HISTORY] Deleted capture {}", id);
        self.emit(AppEvent::HistoryChanged);
        Ok(())
    }

    /// Removes every capture and its files. Returns how many were removed.
    pub fn clear_history(&mut self) -> usize {
        let records = self.history.clear();
        for record in &records {
            self.remove_record_files(record);
        }
        self.close_editor();
        log::info!("[HISTORY] Cleared {} capture(s)", records.len());
        self.emit(AppEvent::HistoryChanged);
        records.len()
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Stops captures, drops the overlay and editor, and ends the executor.
    pub fn shutdown(&mut self) {
        self.cancel_captures();
        if let Some(ticket) = self.overlays.close() {
            self.emit(AppEvent::OverlayClosed { ticket });
        }
        self.close_editor();
        self.ui.shutdown();
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn copy_to_clipboard(&mut self, image: &RgbaImage) {
        if let Err(e) = clipboard::copy_image(self.clipboard.as_mut(), image) {
            log::warn!("[CLIPBOARD] {}", e);
            self.emit(AppEvent::ClipboardFailed {
                message: e.to_string(),
            });
        }
    }

    /// Reserves a file name nothing else is using or about to write.
    fn claim_path(&mut self, wanted: PathBuf) -> PathBuf {
        let history = &self.history;
        let pending = &self.pending_paths;
        let path = storage::unique_path(wanted, |p| {
            pending.contains(p) || history.uses_path(p) || p.exists()
        });
        self.pending_paths.insert(path.clone());
        path
    }

    fn spawn_write(&self, path: PathBuf, image: RgbaImage, done: WriteDone) {
        let ui = self.ui.clone();
        tokio::task::spawn_blocking(move || {
            let result = storage::write_png(&path, &image);
            if ui.post(move |ws| done(ws, path, result)).is_err() {
                log::warn!("[STORAGE] UI executor gone before a write finished");
            }
        });
    }

    fn remove_record_files(&self, record: &CaptureRecord) {
        for path in record.files() {
            self.remove_file_logged(path);
        }
    }

    fn remove_file_logged(&self, path: &std::path::Path) {
        if let Err(e) = storage::remove_file(path) {
            log::warn!("[STORAGE] {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureRequest, ScreenSource};
    use crate::clipboard::ClipboardPayload;
    use crate::dispatch::{self, UiExecutor};
    use crate::geometry::ScaleConvention;
    use image::Rgba;
    use std::sync::{Arc, Mutex};

    struct OneDisplay;

    impl ScreenSource for OneDisplay {
        fn displays(&self) -> Result<Vec<DisplayDescriptor>, CaptureError> {
            Ok(vec![DisplayDescriptor::new(
                1,
                Point::new(0.0, 0.0),
                Size::new(400.0, 300.0),
                1.0,
            )
            .primary()])
        }

        fn origin(&self) -> Origin {
            Origin::TopLeft
        }

        fn capture(&self, request: &CaptureRequest) -> Result<RgbaImage, CaptureError> {
            Ok(RgbaImage::from_pixel(
                request.pixel_width,
                request.pixel_height,
                Rgba([200, 200, 200, 255]),
            ))
        }
    }

    #[derive(Clone, Default)]
    struct SharedClipboard(Arc<Mutex<Vec<(u32, u32)>>>);

    impl ClipboardSink for SharedClipboard {
        fn write_image(&mut self, payload: &ClipboardPayload) -> Result<(), ClipboardError> {
            self.0.lock().unwrap().push((payload.width, payload.height));
            Ok(())
        }
    }

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("simpleshot_ws_{}_{}", name, std::process::id()))
    }

    fn workspace(root: &PathBuf, clipboard: SharedClipboard) -> (Workspace, dispatch::UiReceiver<Workspace>) {
        let (ui, rx) = dispatch::channel();
        let settings = Settings {
            clipboard_settle: Duration::from_millis(5),
            ..Settings::default()
        };
        let capture = CaptureOrchestrator::new(Arc::new(OneDisplay), ScaleConvention::Backing);
        let ws = Workspace::new(
            settings,
            capture,
            OutputLayout::new(root),
            Box::new(clipboard),
            ui,
        );
        (ws, rx)
    }

    #[test]
    fn begin_selection_replaces_open_overlay() {
        let root = scratch("overlay");
        let (mut ws, _rx) = workspace(&root, SharedClipboard::default());
        let mut events = ws.subscribe();

        let first = ws.begin_selection().unwrap();
        let second = ws.begin_selection().unwrap();
        assert_eq!(second.replaced, Some(first.ticket));
        assert_eq!(second.displays.len(), 1);
        assert!(ws.selection_press(first.ticket, Point::new(1.0, 1.0)).is_err());

        assert!(matches!(events.try_recv(), Ok(AppEvent::OverlayOpened { .. })));
        match events.try_recv() {
            Ok(AppEvent::OverlayOpened { overlay }) => assert_eq!(overlay.ticket, second.ticket),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn cancelled_selection_dispatches_nothing() {
        let root = scratch("cancel");
        let (mut ws, _rx) = workspace(&root, SharedClipboard::default());
        let session = ws.begin_selection().unwrap();
        ws.selection_press(session.ticket, Point::new(10.0, 10.0)).unwrap();
        let outcome = ws.selection_release(session.ticket, Point::new(15.0, 200.0)).unwrap();
        assert_eq!(outcome, SelectionOutcome::Cancelled);
        assert_eq!(ws.captures_in_flight(), 0);
        assert!(ws.overlays().active().is_none());
    }

    #[test]
    fn editor_requires_known_capture() {
        let root = scratch("editor");
        let (mut ws, _rx) = workspace(&root, SharedClipboard::default());
        assert!(matches!(
            ws.open_editor(CaptureId(99), Size::new(100.0, 100.0), Origin::TopLeft),
            Err(WorkspaceError::UnknownCapture(CaptureId(99)))
        ));
        assert!(matches!(ws.save_annotation(), Err(WorkspaceError::NoEditor)));
    }

    #[tokio::test]
    async fn record_capture_copies_then_saves() {
        let root = scratch("record");
        let clipboard = SharedClipboard::default();
        let (ws, rx) = workspace(&root, clipboard.clone());
        let mut events = ws.subscribe();
        let mut exec = UiExecutor::new(rx, ws);

        let id = exec
            .state_mut()
            .record_capture(RgbaImage::new(30, 20), CaptureKind::Area);
        // Clipboard is written synchronously, before any file lands.
        assert_eq!(clipboard.0.lock().unwrap().as_slice(), &[(30, 20)]);
        assert!(exec.state().history().get(id).unwrap().file_path.is_none());

        let mut saved = None;
        let mut recorded = false;
        while saved.is_none() || !recorded {
            tokio::time::sleep(Duration::from_millis(5)).await;
            exec.drain();
            while let Ok(event) = events.try_recv() {
                match event {
                    AppEvent::CaptureSaved { id: saved_id, path } => {
                        assert_eq!(saved_id, id);
                        saved = Some(PathBuf::from(path));
                    }
                    AppEvent::CaptureRecorded { capture } => {
                        assert_eq!(capture.id, id);
                        recorded = true;
                    }
                    _ => {}
                }
            }
        }

        let path = saved.unwrap();
        assert!(path.exists());
        assert_eq!(exec.state().history().get(id).unwrap().file_path.as_ref(), Some(&path));

        exec.state_mut().delete_capture(id).unwrap();
        assert!(!path.exists());
        let _ = std::fs::remove_dir_all(&root);
    }

    /// Drains the executor until `done` has seen every event it needs.
    async fn drain_until(
        exec: &mut UiExecutor<Workspace>,
        events: &mut broadcast::Receiver<AppEvent>,
        mut done: impl FnMut(&AppEvent) -> bool,
    ) -> bool {
        for _ in 0..400 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            exec.drain();
            while let Ok(event) = events.try_recv() {
                if done(&event) {
                    return true;
                }
            }
        }
        false
    }

    fn draw_rectangle(ws: &mut Workspace, from: f64, to: f64) {
        let canvas = &mut ws.editor_mut().unwrap().canvas;
        canvas.press(Point::new(from, from));
        canvas.drag_to(Point::new((from + to) / 2.0, (from + to) / 2.0));
        canvas.release(Point::new(to, to));
    }

    #[tokio::test]
    async fn save_annotation_flattens_into_history() {
        let root = scratch("annotate");
        let _ = std::fs::remove_dir_all(&root);
        let clipboard = SharedClipboard::default();
        let (ws, rx) = workspace(&root, clipboard.clone());
        let mut events = ws.subscribe();
        let mut exec = UiExecutor::new(rx, ws);
        let ws = exec.state_mut();

        let id = ws.record_capture(
            RgbaImage::from_pixel(100, 100, Rgba([255, 255, 255, 255])),
            CaptureKind::FullScreen,
        );
        ws.open_editor(id, Size::new(100.0, 100.0), Origin::TopLeft).unwrap();
        draw_rectangle(ws, 10.0, 90.0);

        assert_eq!(ws.save_annotation().unwrap(), id);
        assert!(ws.editor().is_err());
        let record = ws.history().get(id).unwrap();
        assert!(record.annotated.is_some());
        assert_ne!(record.display_image(), &record.image);
        let annotated = record.annotated_path.clone().unwrap();
        assert!(annotated.starts_with(root.join("Annotated")));
        assert_eq!(clipboard.0.lock().unwrap().len(), 2);

        // Let the background writes land before cleaning up.
        let (mut capture_saved, mut annotation_saved) = (false, false);
        assert!(
            drain_until(&mut exec, &mut events, |event| {
                match event {
                    AppEvent::CaptureSaved { .. } => capture_saved = true,
                    AppEvent::AnnotationSaved { .. } => annotation_saved = true,
                    _ => {}
                }
                capture_saved && annotation_saved
            })
            .await
        );
        assert!(annotated.exists());
        assert_eq!(exec.state_mut().clear_history(), 1);
        assert!(!annotated.exists());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn back_to_back_saves_share_one_annotated_file() {
        let root = scratch("resave");
        let _ = std::fs::remove_dir_all(&root);
        let (ws, rx) = workspace(&root, SharedClipboard::default());
        let mut events = ws.subscribe();
        let mut exec = UiExecutor::new(rx, ws);
        let ws = exec.state_mut();

        let id = ws.record_capture(
            RgbaImage::from_pixel(60, 60, Rgba([255, 255, 255, 255])),
            CaptureKind::Area,
        );
        // The second save runs before the executor sees the first write finish.
        for to in [40.0, 55.0] {
            ws.open_editor(id, Size::new(60.0, 60.0), Origin::TopLeft).unwrap();
            draw_rectangle(ws, 5.0, to);
            ws.save_annotation().unwrap();
        }
        let claimed = ws.history().get(id).unwrap().annotated_path.clone().unwrap();
        let name = claimed.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.ends_with("_annotated.png"), "{}", name);

        let (mut capture_saved, mut annotation_writes) = (false, 0);
        assert!(
            drain_until(&mut exec, &mut events, |event| {
                match event {
                    AppEvent::CaptureSaved { .. } => capture_saved = true,
                    AppEvent::AnnotationSaved { path, .. } => {
                        assert_eq!(PathBuf::from(path), claimed);
                        annotation_writes += 1;
                    }
                    _ => {}
                }
                capture_saved && annotation_writes == 2
            })
            .await
        );

        let annotated_dir = root.join("Annotated");
        assert_eq!(std::fs::read_dir(&annotated_dir).unwrap().count(), 1);
        exec.state_mut().clear_history();
        assert_eq!(std::fs::read_dir(&annotated_dir).unwrap().count(), 0);
        let _ = std::fs::remove_dir_all(&root);
    }
}
