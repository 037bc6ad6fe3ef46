//! Window management for the desktop shell.
//!
//! The workspace never touches windows itself. It broadcasts [`AppEvent`]s
//! and this module turns them into overlay, editor, and history windows,
//! then forwards every event to the webviews.

use crate::geometry::{DisplayLayout, Origin};
use crate::workspace::{AppEvent, OverlaySession, WorkspaceHandle};
use tauri::{AppHandle, Emitter, Manager, WebviewUrl, WebviewWindowBuilder, WindowEvent};
use tauri_plugin_dialog::{DialogExt, MessageDialogButtons, MessageDialogKind};
use tokio::sync::broadcast::{self, error::RecvError};

/// Event channel every webview listens on.
pub const EVENT_CHANNEL: &str = "simpleshot://event";

const PRIVACY_SETTINGS_URL: &str =
    "x-apple.systempreferences:com.apple.preference.security?Privacy_ScreenCapture";

/// Pumps workspace events into the shell until the workspace goes away.
pub fn forward_events(app: AppHandle, mut events: broadcast::Receiver<AppEvent>) {
    tauri::async_runtime::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => handle_event(&app, event),
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("[WINDOW] Event forwarder fell behind, skipped {}", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
        log::info!("[WINDOW] Event forwarder stopped");
    });
}

fn handle_event(app: &AppHandle, event: AppEvent) {
    match &event {
        AppEvent::OverlayOpened { overlay } => {
            if let Some(replaced) = overlay.replaced {
                close_windows_with_prefix(app, &overlay_prefix(replaced.0));
            }
            open_overlay(app, overlay);
        }
        AppEvent::OverlayClosed { ticket } => {
            close_windows_with_prefix(app, &overlay_prefix(ticket.0));
        }
        AppEvent::EditorOpened { id } => open_editor(app, id.0),
        AppEvent::EditorClosed { .. } => close_windows_with_prefix(app, "editor"),
        AppEvent::CaptureFailed {
            message,
            permission_denied: true,
            ..
        } => prompt_for_permission(app, message),
        _ => {}
    }

    if let Err(e) = app.emit(EVENT_CHANNEL, &event) {
        log::warn!("[WINDOW] Failed to emit event: {}", e);
    }
}

fn overlay_prefix(ticket: u64) -> String {
    format!("overlay-{}-", ticket)
}

fn close_windows_with_prefix(app: &AppHandle, prefix: &str) {
    for (label, window) in app.webview_windows() {
        if label.starts_with(prefix) {
            if let Err(e) = window.close() {
                log::warn!("[WINDOW] Failed to close {}: {}", label, e);
            }
        }
    }
}

/// One borderless, always-on-top window per display. The page gets the
/// display's top-left in capture space so it can report global points.
fn open_overlay(app: &AppHandle, overlay: &OverlaySession) {
    let start = std::time::Instant::now();
    let layout = match DisplayLayout::new(overlay.displays.clone(), overlay.origin) {
        Ok(layout) => layout,
        Err(e) => {
            log::error!("[WINDOW] Cannot lay out overlay: {}", e);
            return;
        }
    };
    // Bottom-up layouts need the page to flip Y back into global space.
    let flip = match overlay.origin {
        Origin::TopLeft => String::new(),
        Origin::BottomLeft => format!("&flipY={}", layout.max_screen_y()),
    };

    for display in layout.displays() {
        let bounds = layout.capture_bounds(display);
        let label = format!("{}{}", overlay_prefix(overlay.ticket.0), display.id);
        let url = format!(
            "overlay.html?ticket={}&left={}&top={}{}",
            overlay.ticket.0, bounds.x, bounds.y, flip
        );
        let built = WebviewWindowBuilder::new(app, &label, WebviewUrl::App(url.into()))
            .title("SimpleShot Selection")
            .position(bounds.x, bounds.y)
            .inner_size(bounds.width, bounds.height)
            .transparent(true)
            .decorations(false)
            .always_on_top(true)
            .skip_taskbar(true)
            .resizable(false)
            .focused(true)
            .build();
        if let Err(e) = built {
            log::error!("[WINDOW] Failed to open {}: {}", label, e);
        }
    }
    log::info!(
        "[WINDOW] Overlay {} shown on {} display(s) in {}ms",
        overlay.ticket.0,
        layout.displays().len(),
        start.elapsed().as_millis()
    );
}

fn open_editor(app: &AppHandle, id: u64) {
    // An open editor page reloads itself on EditorOpened.
    if let Some(window) = app.get_webview_window("editor") {
        let _ = window.set_focus();
        return;
    }
    let url = format!("editor.html?id={}", id);
    match WebviewWindowBuilder::new(app, "editor", WebviewUrl::App(url.into()))
        .title("SimpleShot Editor")
        .inner_size(960.0, 680.0)
        .min_inner_size(480.0, 360.0)
        .center()
        .build()
    {
        Ok(window) => {
            // Closing the window discards unsaved shapes.
            let handle = app.clone();
            window.on_window_event(move |event| {
                if let WindowEvent::Destroyed = event {
                    if let Some(ui) = handle.try_state::<WorkspaceHandle>() {
                        let _ = ui.post(|ws| {
                            ws.close_editor();
                        });
                    }
                }
            });
            log::info!("[WINDOW] Editor opened for capture #{}", id);
        }
        Err(e) => log::error!("[WINDOW] Failed to open editor: {}", e),
    }
}

/// Open (or focus) the history window.
pub fn show_history(app: &AppHandle) -> tauri::Result<()> {
    if let Some(window) = app.get_webview_window("history") {
        window.show()?;
        return window.set_focus();
    }
    WebviewWindowBuilder::new(app, "history", WebviewUrl::App("index.html".into()))
        .title("SimpleShot")
        .inner_size(720.0, 520.0)
        .center()
        .build()?;
    log::info!("[WINDOW] History opened");
    Ok(())
}

/// Opens the Screen Recording pane of System Settings.
#[allow(deprecated)]
pub fn open_privacy_settings(app: &AppHandle) -> Result<(), tauri_plugin_shell::Error> {
    use tauri_plugin_shell::ShellExt;
    app.shell().open(PRIVACY_SETTINGS_URL, None)
}

fn prompt_for_permission(app: &AppHandle, message: &str) {
    let handle = app.clone();
    app.dialog()
        .message(format!(
            "{}\n\nSimpleShot needs Screen Recording access. Grant it in System Settings, then try again.",
            message
        ))
        .title("Screen Recording Permission")
        .kind(MessageDialogKind::Warning)
        .buttons(MessageDialogButtons::OkCancelCustom(
            "Open System Settings".into(),
            "Cancel".into(),
        ))
        .show(move |open| {
            if open {
                if let Err(e) = open_privacy_settings(&handle) {
                    log::error!("[WINDOW] Could not open System Settings: {}", e);
                }
            }
        });
}
