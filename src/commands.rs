//! Tauri command handlers.
//!
//! These are thin wrappers that bridge frontend invoke() calls to the
//! workspace. Each one posts a job to the UI executor and waits for the
//! result; errors cross the boundary as strings.

use crate::annotation::{AnnotationTool, Color, ViewShape};
use crate::geometry::{Origin, Point, Size};
use crate::history::{CaptureId, CaptureSummary};
use crate::selection::{OverlayTicket, SelectionFeedback, SelectionOutcome};
use crate::storage;
use crate::windows;
use crate::workspace::{OverlaySession, Workspace, WorkspaceError, WorkspaceHandle};
use serde::Serialize;
use tauri::State;

/// Runs `job` on the UI executor and flattens both error layers.
async fn on_ui<R>(
    ui: &WorkspaceHandle,
    job: impl FnOnce(&mut Workspace) -> Result<R, WorkspaceError> + Send + 'static,
) -> Result<R, String>
where
    R: Send + 'static,
{
    ui.call(job)
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())
}

/// What the editor window needs to draw itself.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorView {
    pub id: CaptureId,
    pub tool: AnnotationTool,
    pub image_width: u32,
    pub image_height: u32,
    pub shapes: Vec<ViewShape>,
}

fn editor_view(ws: &Workspace) -> Result<EditorView, WorkspaceError> {
    let session = ws.editor()?;
    let base = session.canvas.base();
    Ok(EditorView {
        id: session.capture,
        tool: session.canvas.tool(),
        image_width: base.width(),
        image_height: base.height(),
        shapes: session.canvas.shapes_in_view(),
    })
}

fn editor_shapes(ws: &Workspace) -> Result<Vec<ViewShape>, WorkspaceError> {
    Ok(ws.editor()?.canvas.shapes_in_view())
}

// ── Selection overlay ───────────────────────────────────────────────

#[tauri::command]
pub async fn begin_selection(ui: State<'_, WorkspaceHandle>) -> Result<OverlaySession, String> {
    on_ui(&ui, |ws| ws.begin_selection()).await
}

#[tauri::command]
pub async fn selection_press(
    ui: State<'_, WorkspaceHandle>,
    ticket: u64,
    x: f64,
    y: f64,
) -> Result<(), String> {
    on_ui(&ui, move |ws| ws.selection_press(OverlayTicket(ticket), Point::new(x, y))).await
}

/// Returns the rectangle and size label to draw while dragging.
#[tauri::command]
pub async fn selection_move(
    ui: State<'_, WorkspaceHandle>,
    ticket: u64,
    x: f64,
    y: f64,
) -> Result<Option<SelectionFeedback>, String> {
    on_ui(&ui, move |ws| ws.selection_move(OverlayTicket(ticket), Point::new(x, y))).await
}

/// Returns whether the selection was committed (and a capture started).
#[tauri::command]
pub async fn selection_release(
    ui: State<'_, WorkspaceHandle>,
    ticket: u64,
    x: f64,
    y: f64,
) -> Result<bool, String> {
    let outcome = on_ui(&ui, move |ws| {
        ws.selection_release(OverlayTicket(ticket), Point::new(x, y))
    })
    .await?;
    Ok(matches!(outcome, SelectionOutcome::Committed(_)))
}

#[tauri::command]
pub async fn selection_cancel(ui: State<'_, WorkspaceHandle>, ticket: u64) -> Result<(), String> {
    on_ui(&ui, move |ws| ws.selection_cancel(OverlayTicket(ticket))).await
}

#[tauri::command]
pub async fn capture_full_screen(ui: State<'_, WorkspaceHandle>) -> Result<(), String> {
    on_ui(&ui, |ws| {
        ws.capture_full_screen();
        Ok(())
    })
    .await
}

// ── History ─────────────────────────────────────────────────────────

#[tauri::command]
pub async fn list_captures(ui: State<'_, WorkspaceHandle>) -> Result<Vec<CaptureSummary>, String> {
    on_ui(&ui, |ws| Ok(ws.capture_summaries())).await
}

/// The capture (annotated version if any) as a PNG data URL.
#[tauri::command]
pub async fn capture_image(ui: State<'_, WorkspaceHandle>, id: u64) -> Result<String, String> {
    let start = std::time::Instant::now();
    let image = on_ui(&ui, move |ws| ws.capture_image(CaptureId(id)).cloned()).await?;
    let url = tauri::async_runtime::spawn_blocking(move || storage::png_data_url(&image))
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())?;
    log::info!(
        "[UI] Encoded capture #{} for the webview in {}ms ({} bytes)",
        id,
        start.elapsed().as_millis(),
        url.len()
    );
    Ok(url)
}

#[tauri::command]
pub async fn copy_capture(ui: State<'_, WorkspaceHandle>, id: u64) -> Result<(), String> {
    on_ui(&ui, move |ws| ws.copy_capture(CaptureId(id))).await
}

#[tauri::command]
pub async fn delete_capture(ui: State<'_, WorkspaceHandle>, id: u64) -> Result<(), String> {
    on_ui(&ui, move |ws| ws.delete_capture(CaptureId(id))).await
}

#[tauri::command]
pub async fn clear_history(ui: State<'_, WorkspaceHandle>) -> Result<usize, String> {
    on_ui(&ui, |ws| Ok(ws.clear_history())).await
}

// ── Annotation editor ───────────────────────────────────────────────

#[tauri::command]
pub async fn open_editor(
    ui: State<'_, WorkspaceHandle>,
    id: u64,
    view_width: f64,
    view_height: f64,
) -> Result<(), String> {
    on_ui(&ui, move |ws| {
        ws.open_editor(
            CaptureId(id),
            Size::new(view_width, view_height),
            Origin::TopLeft,
        )
    })
    .await
}

#[tauri::command]
pub async fn editor_state(ui: State<'_, WorkspaceHandle>) -> Result<EditorView, String> {
    on_ui(&ui, |ws| editor_view(ws)).await
}

#[tauri::command]
pub async fn editor_resize(
    ui: State<'_, WorkspaceHandle>,
    view_width: f64,
    view_height: f64,
) -> Result<Vec<ViewShape>, String> {
    on_ui(&ui, move |ws| {
        ws.editor_mut()?
            .canvas
            .resize_view(Size::new(view_width, view_height));
        editor_shapes(ws)
    })
    .await
}

#[tauri::command]
pub async fn editor_set_tool(ui: State<'_, WorkspaceHandle>, tool: AnnotationTool) -> Result<(), String> {
    on_ui(&ui, move |ws| {
        ws.editor_mut()?.canvas.set_tool(tool);
        Ok(())
    })
    .await
}

/// `color` is `#RRGGBB` or `#RRGGBBAA`.
#[tauri::command]
pub async fn editor_set_color(ui: State<'_, WorkspaceHandle>, color: String) -> Result<(), String> {
    let color: Color = color.parse()?;
    on_ui(&ui, move |ws| {
        ws.editor_mut()?.canvas.set_color(color);
        Ok(())
    })
    .await
}

#[tauri::command]
pub async fn editor_press(ui: State<'_, WorkspaceHandle>, x: f64, y: f64) -> Result<bool, String> {
    on_ui(&ui, move |ws| Ok(ws.editor_mut()?.canvas.press(Point::new(x, y)))).await
}

#[tauri::command]
pub async fn editor_drag(ui: State<'_, WorkspaceHandle>, x: f64, y: f64) -> Result<Vec<ViewShape>, String> {
    on_ui(&ui, move |ws| {
        ws.editor_mut()?.canvas.drag_to(Point::new(x, y));
        editor_shapes(ws)
    })
    .await
}

#[tauri::command]
pub async fn editor_release(ui: State<'_, WorkspaceHandle>, x: f64, y: f64) -> Result<Vec<ViewShape>, String> {
    on_ui(&ui, move |ws| {
        ws.editor_mut()?.canvas.release(Point::new(x, y));
        editor_shapes(ws)
    })
    .await
}

#[tauri::command]
pub async fn editor_undo(ui: State<'_, WorkspaceHandle>) -> Result<Vec<ViewShape>, String> {
    on_ui(&ui, |ws| {
        ws.editor_mut()?.canvas.undo();
        editor_shapes(ws)
    })
    .await
}

#[tauri::command]
pub async fn editor_clear(ui: State<'_, WorkspaceHandle>) -> Result<Vec<ViewShape>, String> {
    on_ui(&ui, |ws| {
        ws.editor_mut()?.canvas.clear();
        editor_shapes(ws)
    })
    .await
}

#[tauri::command]
pub async fn save_annotation(ui: State<'_, WorkspaceHandle>) -> Result<CaptureId, String> {
    on_ui(&ui, |ws| ws.save_annotation()).await
}

#[tauri::command]
pub async fn close_editor(ui: State<'_, WorkspaceHandle>) -> Result<(), String> {
    on_ui(&ui, |ws| {
        ws.close_editor();
        Ok(())
    })
    .await
}

// ── Windows ─────────────────────────────────────────────────────────

#[tauri::command]
pub fn open_history(app: tauri::AppHandle) -> Result<(), String> {
    windows::show_history(&app).map_err(|e| e.to_string())
}

#[tauri::command]
pub fn open_privacy_settings(app: tauri::AppHandle) -> Result<(), String> {
    windows::open_privacy_settings(&app).map_err(|e| e.to_string())
}
