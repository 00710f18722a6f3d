//! Detection configuration.
//!
//! The only input the pipeline requires from the outside. Opaque to the
//! core beyond structural validation; persisting it is the consumer's
//! concern, but the types round-trip through serde so a consumer can store
//! them as JSON.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::coords::{CorrectionRule, PixelSpace};
use crate::error::{Error, Result};
use crate::geometry::ScreenRegion;
use crate::recognize::FieldKind;
use crate::window::WindowFilter;

/// Smallest click-trigger radius, regardless of region sizes.
pub const MIN_TRIGGER_RADIUS: i32 = 20;

/// What the pipeline observes.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum ScopeConfig {
    /// Capture the whole (primary) screen.
    FullScreen,
    /// Locate and capture one application window.
    Window(WindowFilter),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Screen location whose proximity to a click starts a sampling cycle.
    /// `None` disables click triggering.
    #[serde(default)]
    pub trigger_point: Option<ScreenRegion>,

    /// Value regions to read each cycle, in logical screen coordinates.
    pub regions: BTreeMap<FieldKind, ScreenRegion>,

    pub scope: ScopeConfig,

    /// Periodic sampling interval in milliseconds; `None` disables the
    /// timer and leaves only click triggering.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: Option<u64>,

    /// Click triggers within this window of the previous trigger are
    /// duplicates of one physical action and are dropped.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Window geometry older than this is re-validated before sampling.
    #[serde(default = "default_window_staleness_ms")]
    pub window_staleness_ms: u64,

    /// When set, a click trigger is rejected if the trigger region's mean
    /// luma is below this (the button was dim/disabled).
    #[serde(default)]
    pub min_trigger_luma: Option<f32>,

    #[serde(default)]
    pub pixel_space: PixelSpace,

    #[serde(default)]
    pub correction_rule: CorrectionRule,
}

fn default_poll_interval_ms() -> Option<u64> {
    Some(5_000)
}

fn default_debounce_ms() -> u64 {
    750
}

fn default_window_staleness_ms() -> u64 {
    2_000
}

impl DetectionConfig {
    /// Structural validation: at least one region, sane rectangles, and at
    /// least one trigger source.
    pub fn validate(&self) -> Result<()> {
        if self.regions.is_empty() {
            return Err(Error::InvalidConfig("no regions configured".into()));
        }
        for (field, region) in &self.regions {
            if region.width() == 0 || region.height() == 0 {
                return Err(Error::InvalidConfig(format!(
                    "region \"{}\" has zero area",
                    field
                )));
            }
        }
        if self.poll_interval_ms.is_none() && self.trigger_point.is_none() {
            return Err(Error::InvalidConfig(
                "neither timer nor trigger point configured; nothing would ever sample".into(),
            ));
        }
        if let Some(luma) = self.min_trigger_luma {
            if self.trigger_point.is_none() {
                return Err(Error::InvalidConfig(
                    "min_trigger_luma requires a trigger point".into(),
                ));
            }
            if !(0.0..=255.0).contains(&luma) {
                return Err(Error::InvalidConfig(format!(
                    "min_trigger_luma {} outside 0-255",
                    luma
                )));
            }
        }
        Ok(())
    }

    /// Click-trigger radius, derived from the configured region sizes so a
    /// bigger layout tolerates a sloppier click.
    pub fn trigger_radius(&self) -> i32 {
        let largest = self
            .regions
            .values()
            .chain(self.trigger_point.iter())
            .map(|r| r.width().max(r.height()) as i32)
            .max()
            .unwrap_or(0);
        (largest / 2).max(MIN_TRIGGER_RADIUS)
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval_ms.map(Duration::from_millis)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn window_staleness(&self) -> Duration {
        Duration::from_millis(self.window_staleness_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn minimal_config() -> DetectionConfig {
        let mut regions = BTreeMap::new();
        regions.insert(
            FieldKind::Bet,
            ScreenRegion::new(100, 100, 120, 40).unwrap(),
        );
        DetectionConfig {
            trigger_point: None,
            regions,
            scope: ScopeConfig::FullScreen,
            poll_interval_ms: Some(1000),
            debounce_ms: 750,
            window_staleness_ms: 2000,
            min_trigger_luma: None,
            pixel_space: PixelSpace::Physical,
            correction_rule: CorrectionRule::DpiScale,
        }
    }

    #[test]
    fn test_validate_requires_regions() {
        let mut config = minimal_config();
        config.regions.clear();
        assert!(config.validate().is_err());
        assert!(minimal_config().validate().is_ok());
    }

    #[test]
    fn test_validate_requires_some_trigger_source() {
        let mut config = minimal_config();
        config.poll_interval_ms = None;
        assert!(config.validate().is_err());

        config.trigger_point = Some(ScreenRegion::new(50, 50, 80, 30).unwrap());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_luma_gate_needs_trigger_point() {
        let mut config = minimal_config();
        config.min_trigger_luma = Some(90.0);
        assert!(config.validate().is_err());

        config.trigger_point = Some(ScreenRegion::new(50, 50, 80, 30).unwrap());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_trigger_radius_scales_with_regions() {
        let mut config = minimal_config();
        // Largest dimension 120 -> radius 60.
        assert_eq!(config.trigger_radius(), 60);

        config.regions.insert(
            FieldKind::Balance,
            ScreenRegion::new(0, 0, 400, 50).unwrap(),
        );
        assert_eq!(config.trigger_radius(), 200);
    }

    #[test]
    fn test_trigger_radius_floor() {
        let mut config = minimal_config();
        config.regions.clear();
        config
            .regions
            .insert(FieldKind::Bet, ScreenRegion::new(0, 0, 20, 10).unwrap());
        assert_eq!(config.trigger_radius(), MIN_TRIGGER_RADIUS);
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = minimal_config();
        let json = serde_json::to_string(&config).unwrap();
        let back: DetectionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.regions.len(), 1);
        assert_eq!(back.debounce_ms, 750);
        assert!(matches!(back.scope, ScopeConfig::FullScreen));
    }

    #[test]
    fn test_config_defaults_fill_in() {
        let json = r#"{
            "regions": { "bet": { "x": 10, "y": 10, "width": 100, "height": 30 } },
            "scope": { "scope": "full_screen" }
        }"#;
        let config: DetectionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.debounce_ms, 750);
        assert_eq!(config.poll_interval_ms, Some(5000));
        assert!(config.validate().is_ok());
    }
}
