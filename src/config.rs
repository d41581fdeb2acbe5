// src/config.rs
use std::{env, time::Duration};

use log::{info, warn};

// --- Defaults ---
const DEFAULT_CAMERA_INDEX: u32 = 0;
const REQUESTED_WIDTH: u32 = 640;
const REQUESTED_HEIGHT: u32 = 480;
const REQUESTED_FPS: u32 = 30;
const THUMBNAIL_MAX: u32 = 400;
const PREVIEW_HIDE_DELAY: Duration = Duration::from_millis(500);

/// Environment variable selecting the capture device index.
pub const CAMERA_ENV_VAR: &str = "QR_SCANNER_CAMERA";

#[derive(Debug, Clone, PartialEq)]
pub struct ScannerConfig {
    pub camera_index: u32,
    pub requested_width: u32,
    pub requested_height: u32,
    pub requested_fps: u32,
    /// Bounding box (in pixels, both axes) for the file preview thumbnail.
    pub thumbnail_max: u32,
    /// How long the preview stays visible after an image yields no codes.
    pub preview_hide_delay: Duration,
    pub window_size: [f32; 2],
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            camera_index: DEFAULT_CAMERA_INDEX,
            requested_width: REQUESTED_WIDTH,
            requested_height: REQUESTED_HEIGHT,
            requested_fps: REQUESTED_FPS,
            thumbnail_max: THUMBNAIL_MAX,
            preview_hide_delay: PREVIEW_HIDE_DELAY,
            window_size: [600.0, 700.0],
        }
    }
}

impl ScannerConfig {
    /// Defaults, with the camera index optionally overridden from the environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = env::var(CAMERA_ENV_VAR) {
            config.apply_camera_override(&raw);
        }
        config
    }

    fn apply_camera_override(&mut self, raw: &str) {
        match raw.trim().parse::<u32>() {
            Ok(index) => {
                info!("Using camera index {} from {}", index, CAMERA_ENV_VAR);
                self.camera_index = index;
            }
            Err(err) => {
                warn!(
                    "Ignoring {}={:?}: {}. Falling back to camera {}.",
                    CAMERA_ENV_VAR, raw, err, self.camera_index
                );
            }
        }
    }
}
