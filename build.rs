//! Build script for the SimpleShot Tauri app.
//!
//! Only the desktop build needs Tauri's generated context; the headless
//! core has nothing to generate.

fn main() {
    #[cfg(feature = "desktop")]
    tauri_build::build();
}
