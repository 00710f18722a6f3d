//! Capture backend using the `screenshots` crate.
//!
//! Last-resort strategy that works on every platform the crate supports:
//! grab the whole screen the target sits on, then crop to the window's
//! physical bounds. No window-manager cooperation required, but the window
//! must actually be visible on screen.

use screenshots::Screen;

use super::{BackendError, BackendKind, CaptureBackend, CaptureResult, CaptureScope};

/// Whole-screen snapshot backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct SnapshotBackend;

impl SnapshotBackend {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureBackend for SnapshotBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::ScreenSnapshot
    }

    fn capture(&self, scope: &CaptureScope) -> Result<CaptureResult, BackendError> {
        let screens = Screen::all().map_err(|e| BackendError::Failed(e.to_string()))?;
        if screens.is_empty() {
            return Err(BackendError::Failed("no screens reported".into()));
        }

        match scope {
            CaptureScope::FullScreen => {
                let screen = primary_or_first(&screens);
                let shot = screen
                    .capture()
                    .map_err(|e| BackendError::Failed(e.to_string()))?;
                let (width, height) = (shot.width(), shot.height());
                Ok(CaptureResult::new(
                    shot.to_vec(),
                    width,
                    height,
                    BackendKind::ScreenSnapshot,
                ))
            }
            CaptureScope::Window(window) => {
                // The screen whose logical bounds contain the window origin;
                // fall back to primary for windows dragged off-layout.
                let screen = screens
                    .iter()
                    .find(|s| {
                        let d = s.display_info;
                        window.bounds.x >= d.x
                            && window.bounds.y >= d.y
                            && window.bounds.x < d.x + d.width as i32
                            && window.bounds.y < d.y + d.height as i32
                    })
                    .unwrap_or_else(|| primary_or_first(&screens));

                let shot = screen
                    .capture()
                    .map_err(|e| BackendError::Failed(e.to_string()))?;
                // Rebuild under our own `image` version; the crate pins its
                // own and the buffer types do not unify across versions.
                let full: image::RgbaImage =
                    image::RgbaImage::from_raw(shot.width(), shot.height(), shot.to_vec())
                        .ok_or_else(|| {
                            BackendError::FormatIncompatible(
                                "snapshot buffer does not match reported dimensions".into(),
                            )
                        })?;

                // Window bounds are physical; the snapshot is physical too,
                // so only the screen origin (logical, scaled up) moves.
                let d = screen.display_info;
                let scale = d.scale_factor.max(1.0);
                let origin_x = (d.x as f32 * scale) as i32;
                let origin_y = (d.y as f32 * scale) as i32;

                let crop_x = (window.bounds.x - origin_x).max(0) as u32;
                let crop_y = (window.bounds.y - origin_y).max(0) as u32;
                if crop_x >= full.width() || crop_y >= full.height() {
                    return Err(BackendError::Failed(
                        "window bounds fall outside the snapshot".into(),
                    ));
                }
                let crop_w = window.bounds.width.min(full.width() - crop_x);
                let crop_h = window.bounds.height.min(full.height() - crop_y);
                if crop_w == 0 || crop_h == 0 {
                    return Err(BackendError::Failed(
                        "window bounds clamp to an empty crop".into(),
                    ));
                }

                let cropped =
                    image::imageops::crop_imm(&full, crop_x, crop_y, crop_w, crop_h).to_image();
                let (width, height) = cropped.dimensions();
                Ok(CaptureResult::new(
                    cropped.into_raw(),
                    width,
                    height,
                    BackendKind::ScreenSnapshot,
                ))
            }
        }
    }
}

fn primary_or_first(screens: &[Screen]) -> &Screen {
    screens
        .iter()
        .find(|s| s.display_info.is_primary)
        .unwrap_or(&screens[0])
}
