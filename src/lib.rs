//! SimpleShot — screenshot capture and annotation.
//!
//! The core (geometry, selection, capture orchestration, annotation,
//! storage, history, and the workspace) builds without a window system so
//! it can be tested headless. The `desktop` feature adds the Tauri shell:
//! - System tray (tray.rs)
//! - Global hotkeys (hotkeys.rs)
//! - Overlay/editor/history windows (windows.rs)
//! - Tauri command handlers for frontend communication (commands.rs)

pub mod annotation;
pub mod capture;
pub mod clipboard;
pub mod config;
pub mod dispatch;
pub mod geometry;
pub mod history;
pub mod hotkeys;
pub mod selection;
pub mod storage;
pub mod workspace;

#[cfg(feature = "desktop")]
mod commands;
#[cfg(feature = "desktop")]
mod tray;
#[cfg(feature = "desktop")]
mod windows;

/// Entry point — called by Tauri runtime.
#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use capture::{CaptureOrchestrator, XcapSource};
    use clipboard::SystemClipboard;
    use config::Settings;
    use dispatch::UiExecutor;
    use hotkeys::HotkeyBindings;
    use std::sync::Arc;
    use storage::OutputLayout;
    use tauri::Manager;
    use workspace::Workspace;

    config::load_env_files(std::path::Path::new(env!("CARGO_MANIFEST_DIR")));
    env_logger::init();

    let settings = Settings::from_env();
    let bindings = HotkeyBindings::from_settings(&settings);

    tauri::Builder::default()
        .plugin(tauri_plugin_shell::init())
        .plugin(tauri_plugin_dialog::init())
        .plugin(hotkeys::plugin(bindings.clone()))
        .invoke_handler(tauri::generate_handler![
            commands::begin_selection,
            commands::selection_press,
            commands::selection_move,
            commands::selection_release,
            commands::selection_cancel,
            commands::capture_full_screen,
            commands::list_captures,
            commands::capture_image,
            commands::copy_capture,
            commands::delete_capture,
            commands::clear_history,
            commands::open_editor,
            commands::editor_state,
            commands::editor_resize,
            commands::editor_set_tool,
            commands::editor_set_color,
            commands::editor_press,
            commands::editor_drag,
            commands::editor_release,
            commands::editor_undo,
            commands::editor_clear,
            commands::save_annotation,
            commands::close_editor,
            commands::open_history,
            commands::open_privacy_settings,
        ])
        .setup(move |app| {
            log::info!("SimpleShot starting up");

            #[cfg(target_os = "macos")]
            app.set_activation_policy(tauri::ActivationPolicy::Accessory);

            let (ui, receiver) = dispatch::channel::<Workspace>();
            let capture = CaptureOrchestrator::new(Arc::new(XcapSource::new()), settings.scale_convention);
            let output = OutputLayout::new(
                settings
                    .output_dir
                    .clone()
                    .unwrap_or_else(OutputLayout::default_root),
            );
            let ws = Workspace::new(
                settings.clone(),
                capture,
                output,
                Box::new(SystemClipboard),
                ui.clone(),
            );
            windows::forward_events(app.handle().clone(), ws.subscribe());
            tauri::async_runtime::spawn(UiExecutor::new(receiver, ws).run());
            app.manage(ui);

            tray::setup_tray(app.handle())?;
            hotkeys::register(app.handle(), &bindings);

            log::info!("System tray initialized — ready for captures");
            Ok(())
        })
        .build(tauri::generate_context!())
        .expect("Error running SimpleShot")
        .run(|_app, event| {
            // Closing the last window keeps the tray app alive; only Quit exits.
            if let tauri::RunEvent::ExitRequested { code: None, api, .. } = event {
                api.prevent_exit();
            }
        });
}
