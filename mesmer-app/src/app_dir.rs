//! Locations of files the app reads and writes. Settings live next to the
//! executable so a standalone copy carries its own state.

use std::path::PathBuf;

use crate::settings::SETTINGS_FILE;

/// Directory containing the running executable. Falls back to current directory if unavailable.
pub fn exe_directory() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

pub fn settings_path() -> PathBuf {
    exe_directory().join(SETTINGS_FILE)
}

/// Default target for exported pre-renders: the user's picture folder when
/// the platform has one, else `images/` beside the executable.
pub fn default_images_directory() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| dirs.picture_dir().map(|p| p.join("Mesmer")))
        .unwrap_or_else(|| exe_directory().join("images"))
}

/// GLSL sources: `shaders/` beside the executable, or the crate's own
/// directory when running from a source checkout.
pub fn shaders_directory() -> PathBuf {
    let beside_exe = exe_directory().join("shaders");
    if beside_exe.is_dir() {
        return beside_exe;
    }
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("shaders")
}
