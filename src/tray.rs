//! System tray setup and menu handler.
//!
//! The tray is the always-available entry point next to the hotkeys.
//! Left-click opens the capture history; the menu offers both capture
//! modes and Quit.

use crate::workspace::{Workspace, WorkspaceHandle};
use crate::{hotkeys, windows};
use tauri::{
    image::Image as TauriImage,
    menu::{MenuBuilder, MenuItemBuilder, PredefinedMenuItem},
    tray::TrayIconBuilder,
    AppHandle, Manager,
};

/// Sets up the system tray icon with its menu.
pub fn setup_tray(app: &AppHandle) -> Result<(), Box<dyn std::error::Error>> {
    let full_item = MenuItemBuilder::with_id("capture-full", "Capture Full Screen").build(app)?;
    let area_item = MenuItemBuilder::with_id("capture-area", "Capture Area").build(app)?;
    let history_item = MenuItemBuilder::with_id("history", "History…").build(app)?;
    let quit_item = MenuItemBuilder::with_id("quit", "Quit SimpleShot").build(app)?;
    let menu = MenuBuilder::new(app)
        .item(&full_item)
        .item(&area_item)
        .item(&PredefinedMenuItem::separator(app)?)
        .item(&history_item)
        .item(&quit_item)
        .build()?;

    // Decode the PNG icon to RGBA for Tauri's Image type
    let icon_bytes = include_bytes!("../icons/32x32.png");
    let icon_img = image::load_from_memory(icon_bytes)
        .map_err(|e| format!("Failed to decode tray icon: {}", e))?;
    let rgba = icon_img.to_rgba8();
    let (w, h) = (rgba.width(), rgba.height());
    let tray_icon = TauriImage::new_owned(rgba.into_raw(), w, h);

    let _tray = TrayIconBuilder::new()
        .icon(tray_icon)
        .tooltip("SimpleShot")
        .menu(&menu)
        .show_menu_on_left_click(false)
        .on_tray_icon_event(|tray_icon, event| {
            if let tauri::tray::TrayIconEvent::Click {
                button: tauri::tray::MouseButton::Left,
                button_state: tauri::tray::MouseButtonState::Up,
                ..
            } = event
            {
                if let Err(e) = windows::show_history(tray_icon.app_handle()) {
                    log::error!("[TRAY] Failed to open history: {}", e);
                }
            }
        })
        .on_menu_event(|app, event| match event.id().as_ref() {
            "capture-full" => post(app, |ws| ws.capture_full_screen()),
            "capture-area" => post(app, |ws| {
                if let Err(e) = ws.begin_selection() {
                    log::error!("[TRAY] Could not start selection: {}", e);
                }
            }),
            "history" => {
                if let Err(e) = windows::show_history(app) {
                    log::error!("[TRAY] Failed to open history: {}", e);
                }
            }
            "quit" => {
                log::info!("[TRAY] Quit requested from tray menu");
                post(app, |ws| ws.shutdown());
                hotkeys::unregister_all(app);
                app.exit(0);
            }
            other => log::debug!("[TRAY] Unhandled menu item {}", other),
        })
        .build(app)?;

    Ok(())
}

fn post(app: &AppHandle, job: impl FnOnce(&mut Workspace) + Send + 'static) {
    let Some(ui) = app.try_state::<WorkspaceHandle>() else {
        log::warn!("[TRAY] Workspace not ready yet");
        return;
    };
    if ui.post(job).is_err() {
        log::warn!("[TRAY] UI executor is gone");
    }
}
