//! Error taxonomy for the capture/recognition pipeline.
//!
//! Backend-internal capture failures are absorbed by the engine's fallback
//! chain and only surface as [`Error::CaptureBackendFailed`] once every
//! backend has been exhausted. All other variants are per-cycle or per-region
//! and are reported alongside sibling successes.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The OS display subsystem could not be queried. Fatal for the cycle.
    #[error("display subsystem unavailable: {0}")]
    DisplayUnavailable(String),

    /// No window matched the filter, or the window closed since the last
    /// enumeration. Triggers re-enumeration before the cycle is failed.
    #[error("no window matching the filter was found")]
    WindowNotFound,

    /// The window exists but the OS refused its geometry (e.g. minimized).
    #[error("window geometry unavailable: {0}")]
    GeometryUnavailable(String),

    /// Every capture backend in the chain failed.
    #[error("all capture backends failed: {0}")]
    CaptureBackendFailed(String),

    /// The wall-clock budget for the whole backend chain was exceeded.
    #[error("capture exceeded the {0:?} budget")]
    CaptureTimeout(Duration),

    /// A screen region mapped outside the target window.
    #[error("region falls outside the window bounds")]
    RegionOutOfBounds,

    /// Clamping against the capture left an unusably small area.
    #[error("region too small after clamping ({width}x{height})")]
    RegionTooSmall { width: u32, height: u32 },

    /// The text-recognition engine itself failed (not low confidence).
    #[error("recognition failed: {0}")]
    RecognitionFailed(String),

    /// A rectangle with zero width or height, or otherwise malformed.
    #[error("invalid region: {0}")]
    InvalidRegion(String),

    /// Structurally invalid detection configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
