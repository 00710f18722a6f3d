//! Reads numeric values (bet, win, balance) off an application's screen.
//!
//! The pipeline: locate the target window, capture its pixels through a
//! chain of fallback backends, map configured screen regions into the
//! captured raster, and recognize the digits inside each region with a
//! confidence score attached. The [`detect`] module wires the stages into a
//! loop that samples on timer ticks, clicks near a configured trigger
//! point, or explicit requests.
//!
//! Everything platform-specific sits behind traits ([`DisplayTopology`],
//! [`WindowLocator`], [`CaptureBackend`]); the coordinate math, extraction,
//! recognition, and loop logic are portable.

pub mod capture;
pub mod coords;
pub mod detect;
pub mod display;
pub mod error;
pub mod extract;
pub mod geometry;
pub mod input;
pub mod recognize;
pub mod window;

pub use capture::{BackendKind, CaptureBackend, CaptureEngine, CaptureResult, CaptureScope};
pub use coords::{CorrectionRule, PixelSpace};
pub use detect::{
    DetectionConfig, DetectionHandle, DetectionLoop, SampleEntry, SampleReport, Sampler,
    ScopeConfig, TriggerKind,
};
pub use display::DisplayTopology;
pub use error::{Error, Result};
pub use extract::SubImage;
pub use geometry::{Display, PhysicalRegion, Rect, ScreenRegion, TargetWindow, WindowRegion};
pub use recognize::{FieldKind, RecognitionResult, TextRecognizer, ValueRecognizer};
pub use window::{WindowFilter, WindowLocator};
