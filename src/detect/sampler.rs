//! One sampling cycle: locate → normalize → capture → extract → recognize.

use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use log::{debug, warn};

use crate::capture::{CaptureEngine, CaptureResult, CaptureScope};
use crate::coords;
use crate::display::DisplayTopology;
use crate::error::{Error, Result};
use crate::extract;
use crate::geometry::{Display, Rect, ScreenRegion, TargetWindow};
use crate::recognize::{FieldKind, ValueRecognizer, preprocess};
use crate::window::WindowLocator;

use super::config::{DetectionConfig, ScopeConfig};
use super::{SampleEntry, SampleReport, TriggerKind};

/// Owns the pipeline stages and runs them for every configured region on
/// each trigger. One sampler serves one detection loop; nothing here is
/// shared across concurrent cycles.
pub struct Sampler {
    topology: Arc<dyn DisplayTopology>,
    locator: Arc<dyn WindowLocator>,
    engine: CaptureEngine,
    recognizer: ValueRecognizer,
    config: DetectionConfig,
    /// Last located window; re-validated once it exceeds the configured
    /// staleness.
    window: Option<TargetWindow>,
}

impl Sampler {
    pub fn new(
        topology: Arc<dyn DisplayTopology>,
        locator: Arc<dyn WindowLocator>,
        engine: CaptureEngine,
        recognizer: ValueRecognizer,
        config: DetectionConfig,
    ) -> Self {
        Self {
            topology,
            locator,
            engine,
            recognizer,
            config,
            window: None,
        }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Runs one full cycle. Always yields one entry per configured region —
    /// value or typed error, never an omission — except when the trigger
    /// itself is rejected by the luma gate, which yields `None`.
    pub fn sample(&mut self, trigger: TriggerKind) -> Option<SampleReport> {
        let trigger_at = Local::now();

        let target = match self.resolve_target() {
            Ok(target) => target,
            Err(e) => return Some(self.fail_all(trigger, trigger_at, &e)),
        };

        let scope = match &target.window {
            Some(w) => CaptureScope::Window(w.clone()),
            None => CaptureScope::FullScreen,
        };
        let capture = match self.engine.capture(&scope) {
            Ok(capture) => capture,
            Err(e) => return Some(self.fail_all(trigger, trigger_at, &e)),
        };

        if !self.trigger_region_lit(&trigger, &capture, &target) {
            debug!("click trigger rejected: trigger region below luma threshold");
            return None;
        }

        let entries: Vec<SampleEntry> = self
            .config
            .regions
            .iter()
            .map(|(&field, &region)| SampleEntry {
                field,
                outcome: self.read_region(field, region, &capture, &target),
            })
            .collect();

        Some(SampleReport {
            trigger,
            trigger_at,
            entries,
        })
    }

    /// Normalizes, extracts, and recognizes one region against an existing
    /// capture.
    fn read_region(
        &self,
        field: FieldKind,
        region: ScreenRegion,
        capture: &CaptureResult,
        target: &ResolvedTarget,
    ) -> Result<crate::recognize::RecognitionResult> {
        let anchor = target.anchor();
        let local = coords::to_window_local(
            region,
            &anchor,
            &target.display,
            self.config.pixel_space,
            self.config.correction_rule,
        )?;
        let sub = extract::extract(capture, &local)?;
        let result = self.recognizer.recognize(&sub, field, capture.backend_used);
        debug!(
            "region {}: \"{}\" -> {:?} (conf {:.0})",
            field, result.raw_text, result.parsed_value, result.confidence
        );
        Ok(result)
    }

    /// Locates (or re-validates) the capture target for this cycle.
    fn resolve_target(&mut self) -> Result<ResolvedTarget> {
        match &self.config.scope {
            ScopeConfig::FullScreen => {
                let display = self.topology.primary_display()?;
                Ok(ResolvedTarget {
                    window: None,
                    display,
                })
            }
            ScopeConfig::Window(filter) => {
                let needs_lookup = match &self.window {
                    None => true,
                    Some(w) => w.age() > self.config.window_staleness(),
                };

                if needs_lookup {
                    self.window = None;
                    let candidates = self.locator.list_windows(filter)?;
                    let window = candidates.into_iter().next().ok_or(Error::WindowNotFound)?;
                    debug!(
                        "armed on window \"{}\" ({}) at {:?}",
                        window.title, window.process_name, window.bounds
                    );
                    self.window = Some(window);
                } else if let Some(w) = &self.window {
                    // Cheap freshness check: geometry may have moved even
                    // within the staleness window budget.
                    match self.locator.capture_geometry(w) {
                        Ok(bounds) => {
                            let mut updated = w.clone();
                            updated.bounds = bounds;
                            updated.last_validated_at = Instant::now();
                            self.window = Some(updated);
                        }
                        Err(Error::WindowNotFound) => {
                            // Closed since last cycle: one re-enumeration
                            // before the cycle fails.
                            warn!("target window closed; re-enumerating");
                            self.window = None;
                            let candidates = self.locator.list_windows(filter)?;
                            self.window = Some(
                                candidates.into_iter().next().ok_or(Error::WindowNotFound)?,
                            );
                        }
                        Err(e) => return Err(e),
                    }
                }

                let window = self.window.clone().ok_or(Error::WindowNotFound)?;
                let display = self
                    .topology
                    .display_at(window.bounds.x, window.bounds.y)?;
                Ok(ResolvedTarget {
                    window: Some(window),
                    display,
                })
            }
        }
    }

    /// Applies the optional luma gate to click triggers.
    fn trigger_region_lit(
        &self,
        trigger: &TriggerKind,
        capture: &CaptureResult,
        target: &ResolvedTarget,
    ) -> bool {
        let (TriggerKind::Click { .. }, Some(threshold), Some(region)) =
            (trigger, self.config.min_trigger_luma, self.config.trigger_point)
        else {
            return true;
        };

        let anchor = target.anchor();
        let Ok(local) = coords::to_window_local(
            region,
            &anchor,
            &target.display,
            self.config.pixel_space,
            self.config.correction_rule,
        ) else {
            // A trigger region that does not map into the capture cannot be
            // probed; let the cycle run rather than silently starving.
            return true;
        };
        match extract::extract(capture, &local) {
            Ok(sub) => preprocess::mean_luma(&sub.image) >= threshold,
            Err(_) => true,
        }
    }

    /// One error per configured region when the whole cycle failed before
    /// any region could be read.
    fn fail_all(&self, trigger: TriggerKind, trigger_at: chrono::DateTime<Local>, cause: &Error) -> SampleReport {
        warn!("sampling cycle failed: {}", cause);
        let entries = self
            .config
            .regions
            .keys()
            .map(|&field| SampleEntry {
                field,
                outcome: Err(clone_error(cause)),
            })
            .collect();
        SampleReport {
            trigger,
            trigger_at,
            entries,
        }
    }
}

/// The window (if any) and display a cycle runs against.
struct ResolvedTarget {
    window: Option<TargetWindow>,
    display: Display,
}

impl ResolvedTarget {
    /// The rectangle screen regions are normalized against: the target
    /// window, or a synthetic window spanning the display for full-screen
    /// captures (origin subtraction then degenerates to the display origin).
    fn anchor(&self) -> TargetWindow {
        match &self.window {
            Some(w) => w.clone(),
            None => {
                let scale = self.display.scale_factor;
                let b = self.display.bounds;
                TargetWindow {
                    process_name: String::new(),
                    title: String::new(),
                    bounds: Rect::new(
                        (b.x as f32 * scale) as i32,
                        (b.y as f32 * scale) as i32,
                        (b.width as f32 * scale) as u32,
                        (b.height as f32 * scale) as u32,
                    ),
                    handle: 0,
                    last_validated_at: Instant::now(),
                }
            }
        }
    }
}

/// The error enum carries owned strings, so cloning is a reconstruction.
fn clone_error(e: &Error) -> Error {
    match e {
        Error::DisplayUnavailable(s) => Error::DisplayUnavailable(s.clone()),
        Error::WindowNotFound => Error::WindowNotFound,
        Error::GeometryUnavailable(s) => Error::GeometryUnavailable(s.clone()),
        Error::CaptureBackendFailed(s) => Error::CaptureBackendFailed(s.clone()),
        Error::CaptureTimeout(d) => Error::CaptureTimeout(*d),
        Error::RegionOutOfBounds => Error::RegionOutOfBounds,
        Error::RegionTooSmall { width, height } => Error::RegionTooSmall {
            width: *width,
            height: *height,
        },
        Error::RecognitionFailed(s) => Error::RecognitionFailed(s.clone()),
        Error::InvalidRegion(s) => Error::InvalidRegion(s.clone()),
        Error::InvalidConfig(s) => Error::InvalidConfig(s.clone()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use super::*;
    use crate::capture::engine::testing::ScriptedBackend;
    use crate::capture::{BackendKind, CaptureEngine};
    use crate::coords::{CorrectionRule, PixelSpace};
    use crate::display::testing::FixedTopology;
    use crate::recognize::ValueRecognizer;
    use crate::recognize::testing::CannedEngine;
    use crate::window::WindowFilter;
    use crate::window::testing::StaticLocator;

    fn config(scope: ScopeConfig) -> DetectionConfig {
        let mut regions = BTreeMap::new();
        regions.insert(
            FieldKind::Bet,
            ScreenRegion::new(300, 250, 100, 40).unwrap(),
        );
        regions.insert(
            FieldKind::Balance,
            ScreenRegion::new(300, 320, 100, 40).unwrap(),
        );
        DetectionConfig {
            trigger_point: Some(ScreenRegion::new(600, 500, 80, 30).unwrap()),
            regions,
            scope,
            poll_interval_ms: Some(1000),
            debounce_ms: 750,
            window_staleness_ms: 2000,
            min_trigger_luma: None,
            pixel_space: PixelSpace::Physical,
            correction_rule: CorrectionRule::DpiScale,
        }
    }

    fn sampler_with(
        backend: ScriptedBackend,
        engine: CannedEngine,
        config: DetectionConfig,
    ) -> Sampler {
        Sampler::new(
            Arc::new(FixedTopology::single(1.0)),
            Arc::new(StaticLocator::at(100, 100, 1200, 800)),
            CaptureEngine::new(vec![Box::new(backend)]),
            ValueRecognizer::new(Box::new(engine)),
            config,
        )
    }

    #[test]
    fn test_window_cycle_reads_every_region() {
        let backend = ScriptedBackend {
            dims: (1200, 800),
            ..ScriptedBackend::succeeding(BackendKind::GdiBlit)
        };
        let mut sampler = sampler_with(
            backend,
            CannedEngine::reading("€12,50", 88.0),
            config(ScopeConfig::Window(WindowFilter::default())),
        );

        let report = sampler.sample(TriggerKind::Timer).unwrap();
        assert_eq!(report.entries.len(), 2);
        assert_eq!(report.value(FieldKind::Bet), Some(12.50));

        // Window at (100,100): screen (300,250) lands at local (200,150).
        let bet = report
            .entries
            .iter()
            .find(|e| e.field == FieldKind::Bet)
            .unwrap();
        let result = bet.outcome.as_ref().unwrap();
        assert_eq!((result.region.x(), result.region.y()), (200, 150));
    }

    #[test]
    fn test_full_screen_cycle_uses_display_as_anchor() {
        let backend = ScriptedBackend {
            dims: (1920, 1080),
            ..ScriptedBackend::succeeding(BackendKind::ScreenSnapshot)
        };
        let mut sampler = sampler_with(
            backend,
            CannedEngine::reading("1500", 80.0),
            config(ScopeConfig::FullScreen),
        );

        let report = sampler.sample(TriggerKind::Manual).unwrap();
        let bet = report
            .entries
            .iter()
            .find(|e| e.field == FieldKind::Bet)
            .unwrap();
        // Display origin (0,0): regions keep their screen coordinates.
        let result = bet.outcome.as_ref().unwrap();
        assert_eq!((result.region.x(), result.region.y()), (300, 250));
    }

    #[test]
    fn test_capture_failure_yields_one_error_per_region() {
        let backend = ScriptedBackend {
            dims: (1200, 800),
            ..ScriptedBackend::failing(BackendKind::GdiBlit)
        };
        let mut sampler = sampler_with(
            backend,
            CannedEngine::reading("1500", 80.0),
            config(ScopeConfig::Window(WindowFilter::default())),
        );

        let report = sampler.sample(TriggerKind::Timer).unwrap();
        assert_eq!(report.entries.len(), 2);
        for entry in &report.entries {
            assert!(matches!(
                entry.outcome,
                Err(Error::CaptureBackendFailed(_))
            ));
        }
        assert!(!report.is_complete());
    }

    #[test]
    fn test_region_outside_window_fails_only_that_region() {
        let backend = ScriptedBackend {
            dims: (1200, 800),
            ..ScriptedBackend::succeeding(BackendKind::GdiBlit)
        };
        let mut config = config(ScopeConfig::Window(WindowFilter::default()));
        config.regions.insert(
            FieldKind::Win,
            ScreenRegion::new(5000, 5000, 100, 40).unwrap(),
        );
        let mut sampler = sampler_with(backend, CannedEngine::reading("12", 80.0), config);

        let report = sampler.sample(TriggerKind::Timer).unwrap();
        assert_eq!(report.entries.len(), 3);
        let win = report
            .entries
            .iter()
            .find(|e| e.field == FieldKind::Win)
            .unwrap();
        assert!(matches!(win.outcome, Err(Error::RegionOutOfBounds)));
        assert!(report.value(FieldKind::Bet).is_some());
    }

    #[test]
    fn test_dark_trigger_region_rejects_click() {
        // Scripted captures are all-black; any positive luma threshold
        // rejects the click.
        let make_backend = || ScriptedBackend {
            dims: (1200, 800),
            ..ScriptedBackend::succeeding(BackendKind::GdiBlit)
        };
        let mut cfg = config(ScopeConfig::Window(WindowFilter::default()));
        cfg.min_trigger_luma = Some(50.0);

        let mut sampler = sampler_with(
            make_backend(),
            CannedEngine::reading("12", 80.0),
            cfg.clone(),
        );
        assert!(sampler.sample(TriggerKind::Click { x: 600, y: 500 }).is_none());

        // Timer triggers bypass the gate.
        let mut sampler = sampler_with(make_backend(), CannedEngine::reading("12", 80.0), cfg);
        assert!(sampler.sample(TriggerKind::Timer).is_some());
    }

    #[test]
    fn test_recognizer_failure_still_produces_entries() {
        let backend = ScriptedBackend {
            dims: (1200, 800),
            ..ScriptedBackend::succeeding(BackendKind::GdiBlit)
        };
        let mut sampler = sampler_with(
            backend,
            CannedEngine::broken(),
            config(ScopeConfig::Window(WindowFilter::default())),
        );

        let report = sampler.sample(TriggerKind::Timer).unwrap();
        for entry in &report.entries {
            let result = entry.outcome.as_ref().unwrap();
            assert_eq!(result.confidence, 0.0);
            assert!(result.error.is_some());
        }
    }

    #[test]
    fn test_missing_window_fails_cycle_with_window_not_found() {
        struct EmptyLocator;
        impl crate::window::WindowLocator for EmptyLocator {
            fn list_windows(&self, _f: &WindowFilter) -> Result<Vec<TargetWindow>> {
                Ok(Vec::new())
            }
            fn capture_geometry(&self, _w: &TargetWindow) -> Result<Rect> {
                Err(Error::WindowNotFound)
            }
        }

        let backend = ScriptedBackend {
            dims: (1200, 800),
            ..ScriptedBackend::succeeding(BackendKind::GdiBlit)
        };
        let mut sampler = Sampler::new(
            Arc::new(FixedTopology::single(1.0)),
            Arc::new(EmptyLocator),
            CaptureEngine::new(vec![Box::new(backend)]),
            ValueRecognizer::new(Box::new(CannedEngine::reading("12", 80.0))),
            config(ScopeConfig::Window(WindowFilter::default())),
        );

        let report = sampler.sample(TriggerKind::Timer).unwrap();
        for entry in &report.entries {
            assert!(matches!(entry.outcome, Err(Error::WindowNotFound)));
        }
    }

    #[test]
    fn test_window_revalidated_after_staleness() {
        let backend = ScriptedBackend {
            dims: (1200, 800),
            ..ScriptedBackend::succeeding(BackendKind::GdiBlit)
        };
        let mut cfg = config(ScopeConfig::Window(WindowFilter::default()));
        cfg.window_staleness_ms = 0;
        let mut sampler = sampler_with(backend, CannedEngine::reading("12", 80.0), cfg);

        sampler.sample(TriggerKind::Timer).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        // Stale immediately: the second cycle re-enumerates instead of
        // trusting cached geometry.
        let report = sampler.sample(TriggerKind::Timer).unwrap();
        assert!(report.value(FieldKind::Bet).is_some());
    }
}
