//! Screen/window raster capture through a chain of fallback backends.
//!
//! Backends are tried in a fixed priority order — compositor capture, then a
//! device-context blit, then a whole-screen snapshot — with the last
//! successful one attempted first on the next call. See [`CaptureEngine`].

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::geometry::TargetWindow;

pub mod engine;
pub mod snapshot;

#[cfg(windows)]
pub mod gdi;
#[cfg(windows)]
pub mod graphics;

pub use engine::CaptureEngine;
pub use snapshot::SnapshotBackend;

#[cfg(windows)]
pub use gdi::GdiBackend;
#[cfg(windows)]
pub use graphics::GraphicsCaptureBackend;

/// What to capture: everything, or one window.
#[derive(Clone, Debug)]
pub enum CaptureScope {
    FullScreen,
    Window(TargetWindow),
}

/// Identity of a concrete capture strategy, in priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    /// Windows.Graphics.Capture compositor API.
    GraphicsCapture,
    /// BitBlt through a graphics-device-context copy.
    GdiBlit,
    /// Whole-screen snapshot cropped to the window bounds.
    ScreenSnapshot,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::GraphicsCapture => write!(f, "graphics-capture"),
            BackendKind::GdiBlit => write!(f, "gdi-blit"),
            BackendKind::ScreenSnapshot => write!(f, "screen-snapshot"),
        }
    }
}

/// Why one backend attempt failed. Drives the fallback decision; never
/// surfaced to callers directly.
#[derive(Debug)]
pub enum BackendError {
    /// The backend cannot serve this scope at all (e.g. no full-screen
    /// support). Fall through immediately, never retry.
    Unsupported(String),
    /// The display pipeline negotiated a format/mode this backend cannot
    /// read. Recognized distinctly so the fallback runs immediately instead
    /// of retrying pointlessly.
    FormatIncompatible(String),
    /// Any other failure for this attempt.
    Failed(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::Unsupported(msg) => write!(f, "unsupported: {}", msg),
            BackendError::FormatIncompatible(msg) => write!(f, "format incompatible: {}", msg),
            BackendError::Failed(msg) => write!(f, "{}", msg),
        }
    }
}

/// An owned RGBA raster produced by one backend.
///
/// Exclusively owned by the caller that requested it; backends may reuse
/// internal handles, so the buffer is copied out before this is built and is
/// never shared across threads.
#[derive(Clone, Debug)]
pub struct CaptureResult {
    /// Tightly packed RGBA, row-major, `width * height * 4` bytes.
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub backend_used: BackendKind,
    pub captured_at: DateTime<Local>,
}

impl CaptureResult {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, backend_used: BackendKind) -> Self {
        Self {
            pixels,
            width,
            height,
            backend_used,
            captured_at: Local::now(),
        }
    }

    /// A zero-length buffer is never a valid success.
    pub fn is_well_formed(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.pixels.len() == (self.width as usize * self.height as usize * 4)
    }
}

/// One concrete strategy for producing a screen/window raster.
pub trait CaptureBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn capture(&self, scope: &CaptureScope) -> std::result::Result<CaptureResult, BackendError>;
}
