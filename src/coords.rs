//! Coordinate normalization between logical screen space, physical capture
//! space, and window-local space.
//!
//! The conversion order is fixed: **scale first, then subtract the window
//! offset**. Window bounds are recorded in physical pixels, so a region
//! selected in logical units must be brought onto the physical grid before
//! the offset subtraction. Swapping the two steps shifts the result by a
//! scale-dependent amount without any error.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geometry::{Display, PhysicalRegion, Rect, ScreenRegion, TargetWindow, WindowRegion};

/// Smallest window-local region worth extracting. Anything thinner than this
/// cannot hold a recognizable digit.
pub const MIN_REGION_WIDTH: u32 = 10;
pub const MIN_REGION_HEIGHT: u32 = 5;

/// Which pixel grid the active capture backend returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelSpace {
    /// Backend output matches logical coordinates; no scaling needed.
    Logical,
    /// Backend output is the physical pixel grid; regions selected in
    /// logical units must be multiplied by the display scale factor.
    Physical,
}

impl Default for PixelSpace {
    fn default() -> Self {
        PixelSpace::Physical
    }
}

/// Named, versionable correction rule applied before the window-offset
/// subtraction. Each rule is a pure function over the display, window, and
/// raw rectangle; which one runs is configuration, not hard-coded offsets.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum CorrectionRule {
    /// Pass the rectangle through untouched.
    None,
    /// Multiply all four fields by the display scale factor (rounding down)
    /// when the backend reads physical pixels.
    DpiScale,
    /// `DpiScale` plus a fixed client-area inset for windows whose recorded
    /// bounds include decorations (title bar, borders) the capture excludes.
    DpiScaleWithClientOffset { left: i32, top: i32 },
}

impl Default for CorrectionRule {
    fn default() -> Self {
        Self::DpiScale
    }
}

impl CorrectionRule {
    /// Applies this rule to a raw screen-space rectangle.
    pub fn apply(&self, display: &Display, _window: &TargetWindow, rect: Rect) -> Rect {
        match self {
            CorrectionRule::None => rect,
            CorrectionRule::DpiScale => scale_rect(rect, display.scale_factor),
            CorrectionRule::DpiScaleWithClientOffset { left, top } => {
                let scaled = scale_rect(rect, display.scale_factor);
                Rect::new(scaled.x - left, scaled.y - top, scaled.width, scaled.height)
            }
        }
    }
}

fn scale_rect(rect: Rect, factor: f32) -> Rect {
    if (factor - 1.0).abs() < f32::EPSILON {
        return rect;
    }
    Rect::new(
        (rect.x as f32 * factor) as i32,
        (rect.y as f32 * factor) as i32,
        (rect.width as f32 * factor) as u32,
        (rect.height as f32 * factor) as u32,
    )
}

/// Maps a screen-space region onto the capture grid.
///
/// When `pixel_space` is [`PixelSpace::Physical`], the configured correction
/// rule scales the region onto the physical grid first; with
/// [`PixelSpace::Logical`] the rule's scaling step is skipped because both
/// sides already share a grid.
pub fn to_physical(
    screen: ScreenRegion,
    window: &TargetWindow,
    display: &Display,
    pixel_space: PixelSpace,
    rule: CorrectionRule,
) -> Result<PhysicalRegion> {
    let corrected = match pixel_space {
        PixelSpace::Physical => rule.apply(display, window, screen.rect()),
        PixelSpace::Logical => match rule {
            // Skip the scaling step but keep any fixed inset.
            CorrectionRule::DpiScaleWithClientOffset { left, top } => {
                let r = screen.rect();
                Rect::new(r.x - left, r.y - top, r.width, r.height)
            }
            _ => screen.rect(),
        },
    };
    PhysicalRegion::new(corrected.x, corrected.y, corrected.width, corrected.height)
}

/// Converts a screen-space region into the window-local space of `window`,
/// clamped to the window's bounds.
///
/// Returns [`Error::RegionOutOfBounds`] if clamping leaves less than the
/// minimum usable size.
pub fn to_window_local(
    screen: ScreenRegion,
    window: &TargetWindow,
    display: &Display,
    pixel_space: PixelSpace,
    rule: CorrectionRule,
) -> Result<WindowRegion> {
    let physical = to_physical(screen, window, display, pixel_space, rule)?;

    // Offset subtraction happens strictly after scaling.
    let local_x = physical.x() - window.bounds.x;
    let local_y = physical.y() - window.bounds.y;

    clamp_to_window(local_x, local_y, physical.width(), physical.height(), window)
}

/// Inverse of the offset step: reconstructs the screen-space rectangle from a
/// window-local one. Only a true inverse when no clamping occurred during
/// the forward conversion and the scale factor was 1.0.
pub fn to_screen(local: WindowRegion, window: &TargetWindow) -> Result<ScreenRegion> {
    ScreenRegion::new(
        local.x() + window.bounds.x,
        local.y() + window.bounds.y,
        local.width(),
        local.height(),
    )
}

fn clamp_to_window(
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    window: &TargetWindow,
) -> Result<WindowRegion> {
    let win_w = window.bounds.width as i32;
    let win_h = window.bounds.height as i32;

    let left = x.clamp(0, win_w);
    let top = y.clamp(0, win_h);
    // The clamped origin eats into the span when the region started left of
    // or above the window.
    let right = (x + width as i32).clamp(0, win_w);
    let bottom = (y + height as i32).clamp(0, win_h);

    let clamped_w = (right - left).max(0) as u32;
    let clamped_h = (bottom - top).max(0) as u32;

    if clamped_w < MIN_REGION_WIDTH || clamped_h < MIN_REGION_HEIGHT {
        return Err(Error::RegionOutOfBounds);
    }

    WindowRegion::new(left, top, clamped_w, clamped_h)
}
