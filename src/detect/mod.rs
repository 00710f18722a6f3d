//! The detection loop: watches for triggers (timer ticks, clicks near the
//! configured trigger point, manual requests) and runs one sampling cycle
//! per accepted trigger, emitting a [`SampleReport`] for each.

use chrono::{DateTime, Local};

use crate::error::Result;
use crate::recognize::{FieldKind, RecognitionResult};

pub mod config;
pub mod runner;
pub mod sampler;

pub use config::{DetectionConfig, ScopeConfig};
pub use runner::{DetectionHandle, DetectionLoop};
pub use sampler::Sampler;

/// What started a sampling cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerKind {
    /// Periodic timer tick.
    Timer,
    /// Click near the configured trigger point, at this logical screen
    /// position.
    Click { x: i32, y: i32 },
    /// Explicit request from the embedding application.
    Manual,
}

/// One region's outcome within a cycle.
#[derive(Debug)]
pub struct SampleEntry {
    pub field: FieldKind,
    /// A recognition result (possibly low-confidence or value-less) or the
    /// typed error that stopped this region from being read.
    pub outcome: Result<RecognitionResult>,
}

/// The artifact of one accepted trigger: exactly one entry per configured
/// region, in field order.
#[derive(Debug)]
pub struct SampleReport {
    pub trigger: TriggerKind,
    pub trigger_at: DateTime<Local>,
    pub entries: Vec<SampleEntry>,
}

impl SampleReport {
    /// The parsed value for one field, if that region was read reliably.
    pub fn value(&self, field: FieldKind) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.field == field)
            .and_then(|e| e.outcome.as_ref().ok())
            .filter(|r| r.is_reliable())
            .and_then(|r| r.parsed_value)
    }

    /// True when every region produced a reliable parsed value.
    pub fn is_complete(&self) -> bool {
        !self.entries.is_empty()
            && self.entries.iter().all(|e| {
                e.outcome
                    .as_ref()
                    .map(|r| r.is_reliable() && r.parsed_value.is_some())
                    .unwrap_or(false)
            })
    }
}
