//! Global hotkeys: full-screen capture and region selection.
//!
//! Bindings come from [`Settings`]; registration goes through
//! `tauri-plugin-global-shortcut` in the desktop build.

use crate::config::Settings;
use crate::workspace::{Workspace, WorkspaceError};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum HotkeyAction {
    FullScreen,
    BeginSelection,
}

impl HotkeyAction {
    /// Runs the action's handler on the workspace.
    pub fn run(&self, ws: &mut Workspace) -> Result<(), WorkspaceError> {
        match self {
            HotkeyAction::FullScreen => {
                ws.capture_full_screen();
                Ok(())
            }
            HotkeyAction::BeginSelection => ws.begin_selection().map(|_| ()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotkeyBindings {
    pub full_screen: String,
    pub selection: String,
}

impl HotkeyBindings {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            full_screen: settings.fullscreen_hotkey.clone(),
            selection: settings.area_hotkey.clone(),
        }
    }

    pub fn entries(&self) -> [(HotkeyAction, &str); 2] {
        [
            (HotkeyAction::FullScreen, self.full_screen.as_str()),
            (HotkeyAction::BeginSelection, self.selection.as_str()),
        ]
    }

    /// Action bound to an accelerator string, compared case-insensitively
    /// with surrounding whitespace ignored.
    pub fn action_for(&self, accelerator: &str) -> Option<HotkeyAction> {
        let wanted = normalize(accelerator);
        self.entries()
            .into_iter()
            .find(|(_, binding)| normalize(binding) == wanted)
            .map(|(action, _)| action)
    }
}

fn normalize(accelerator: &str) -> String {
    accelerator
        .split('+')
        .map(|part| part.trim().to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("+")
}

#[cfg(feature = "desktop")]
pub use desktop::{plugin, register, unregister_all};

#[cfg(feature = "desktop")]
mod desktop {
    use super::{HotkeyAction, HotkeyBindings};
    use crate::workspace::WorkspaceHandle;
    use tauri::{AppHandle, Manager, Runtime};
    use tauri_plugin_global_shortcut::{GlobalShortcutExt, Shortcut, ShortcutState};

    /// The global-shortcut plugin with our press handler installed.
    pub fn plugin<R: Runtime>(bindings: HotkeyBindings) -> tauri::plugin::TauriPlugin<R> {
        let parsed: Vec<(HotkeyAction, Shortcut)> = bindings
            .entries()
            .into_iter()
            .filter_map(|(action, accel)| match accel.parse::<Shortcut>() {
                Ok(shortcut) => Some((action, shortcut)),
                Err(e) => {
                    log::warn!("[HOTKEY] Invalid accelerator '{}': {}", accel, e);
                    None
                }
            })
            .collect();

        tauri_plugin_global_shortcut::Builder::new()
            .with_handler(move |app, shortcut, event| {
                if event.state() != ShortcutState::Pressed {
                    return;
                }
                let Some(action) = parsed
                    .iter()
                    .find(|(_, s)| s == shortcut)
                    .map(|(action, _)| *action)
                else {
                    return;
                };
                log::info!("[HOTKEY] {:?}", action);
                let Some(ui) = app.try_state::<WorkspaceHandle>() else {
                    return;
                };
                let posted = ui.post(move |ws| {
                    if let Err(e) = action.run(ws) {
                        log::error!("[HOTKEY] {:?} failed: {}", action, e);
                    }
                });
                if posted.is_err() {
                    log::warn!("[HOTKEY] UI executor is gone");
                }
            })
            .build()
    }

    /// Registers every binding. A binding another app already owns is
    /// logged and skipped.
    pub fn register<R: Runtime>(app: &AppHandle<R>, bindings: &HotkeyBindings) {
        for (action, accel) in bindings.entries() {
            match app.global_shortcut().register(accel) {
                Ok(()) => log::info!("[HOTKEY] {} → {:?}", accel, action),
                Err(e) => log::warn!("[HOTKEY] Could not register {}: {}", accel, e),
            }
        }
    }

    pub fn unregister_all<R: Runtime>(app: &AppHandle<R>) {
        if let Err(e) = app.global_shortcut().unregister_all() {
            log::warn!("[HOTKEY] Failed to unregister shortcuts: {}", e);
        }
    }
}
