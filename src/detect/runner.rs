//! Loop lifecycle: trigger watching on a worker thread, report delivery
//! over a channel, cooperative shutdown.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::debug;

use crate::error::Result;
use crate::input::MouseEvent;

use super::sampler::Sampler;
use super::{SampleReport, TriggerKind};

/// Idle wait between trigger checks when nothing is pending.
const TICK: Duration = Duration::from_millis(25);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LoopState {
    /// Worker started, trigger sources not yet wired.
    Idle,
    /// Watching for triggers.
    Armed,
    /// A cycle is running; further triggers wait for the next pass.
    Sampling,
}

/// Owns a configured [`Sampler`] and runs it on a worker thread once
/// spawned. Construction is cheap; nothing happens until [`spawn`].
///
/// [`spawn`]: DetectionLoop::spawn
pub struct DetectionLoop {
    sampler: Sampler,
}

impl DetectionLoop {
    pub fn new(sampler: Sampler) -> Self {
        Self { sampler }
    }

    /// Validates the configuration and starts the worker thread, wired to
    /// the platform mouse monitor.
    ///
    /// Reports arrive on the handle until [`DetectionHandle::stop`] is
    /// called or the handle is dropped.
    pub fn spawn(self) -> Result<DetectionHandle> {
        self.sampler.config().validate()?;
        let stop = Arc::new(AtomicBool::new(false));
        let mouse_rx = Self::mouse_events(&self.sampler, &stop);
        Ok(self.start(mouse_rx, stop))
    }

    /// Like [`spawn`], but click triggers come from the supplied stream
    /// instead of the platform monitor. Lets an embedding application (or a
    /// test) feed pointer events from its own source.
    ///
    /// [`spawn`]: DetectionLoop::spawn
    pub fn spawn_with_events(self, mouse_rx: Receiver<MouseEvent>) -> Result<DetectionHandle> {
        self.sampler.config().validate()?;
        let stop = Arc::new(AtomicBool::new(false));
        Ok(self.start(mouse_rx, stop))
    }

    fn start(self, mouse_rx: Receiver<MouseEvent>, stop: Arc<AtomicBool>) -> DetectionHandle {
        let (report_tx, report_rx) = channel();
        let (manual_tx, manual_rx) = channel();

        let worker_stop = stop.clone();
        let sampler = self.sampler;
        let worker = thread::spawn(move || {
            run_loop(sampler, mouse_rx, manual_rx, report_tx, worker_stop);
        });

        DetectionHandle {
            stop,
            worker: Some(worker),
            reports: report_rx,
            manual: manual_tx,
        }
    }

    #[cfg(windows)]
    fn mouse_events(sampler: &Sampler, stop: &Arc<AtomicBool>) -> Receiver<MouseEvent> {
        if sampler.config().trigger_point.is_some() {
            crate::input::spawn_mouse_monitor(stop.clone())
        } else {
            // No trigger point, no monitor; a closed channel reads as
            // permanently quiet.
            channel().1
        }
    }

    #[cfg(not(windows))]
    fn mouse_events(_sampler: &Sampler, _stop: &Arc<AtomicBool>) -> Receiver<MouseEvent> {
        channel().1
    }
}

/// Running loop: raise the stop flag (or drop the handle) to shut down.
pub struct DetectionHandle {
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    reports: Receiver<SampleReport>,
    manual: Sender<()>,
}

impl DetectionHandle {
    /// Requests one sampling cycle outside the timer and click triggers.
    pub fn trigger_now(&self) {
        let _ = self.manual.send(());
    }

    /// A report, if one is ready.
    pub fn try_recv(&self) -> Option<SampleReport> {
        self.reports.try_recv().ok()
    }

    /// Waits up to `timeout` for the next report.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<SampleReport> {
        self.reports.recv_timeout(timeout).ok()
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some() && !self.stop.load(Ordering::SeqCst)
    }

    /// Stops the worker and waits for it to exit. No new cycles start after
    /// this returns; reports already produced remain drainable.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for DetectionHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(
    mut sampler: Sampler,
    mouse: Receiver<MouseEvent>,
    manual: Receiver<()>,
    reports: Sender<SampleReport>,
    stop: Arc<AtomicBool>,
) {
    let mut state = LoopState::Idle;
    debug!("detection loop starting in state {:?}", state);
    let mut last_click: Option<Instant> = None;

    let poll = sampler.config().poll_interval();
    let mut next_tick = poll.map(|p| Instant::now() + p);
    let trigger_center = sampler.config().trigger_point.map(|r| r.center());
    let radius = sampler.config().trigger_radius() as i64;
    let debounce = sampler.config().debounce();

    state = LoopState::Armed;
    debug!(
        "detection loop {:?} (radius {}, poll {:?})",
        state, radius, poll
    );

    while !stop.load(Ordering::SeqCst) {
        let mut pending: Option<TriggerKind> = None;

        while manual.try_recv().is_ok() {
            pending = Some(TriggerKind::Manual);
        }

        while let Ok(event) = mouse.try_recv() {
            if !event.button_down {
                continue;
            }
            let Some((cx, cy)) = trigger_center else {
                continue;
            };
            let dx = (event.x - cx) as i64;
            let dy = (event.y - cy) as i64;
            if dx * dx + dy * dy > radius * radius {
                continue;
            }
            if let Some(prev) = last_click {
                if prev.elapsed() < debounce {
                    debug!("click at ({}, {}) debounced", event.x, event.y);
                    continue;
                }
            }
            last_click = Some(Instant::now());
            pending = Some(TriggerKind::Click {
                x: event.x,
                y: event.y,
            });
        }

        if pending.is_none() {
            if let (Some(tick), Some(interval)) = (next_tick, poll) {
                if Instant::now() >= tick {
                    pending = Some(TriggerKind::Timer);
                    // Rescheduled from now, not from the missed tick: a
                    // cycle that outlasts the interval must not bank a
                    // backlog of immediate triggers.
                    next_tick = Some(Instant::now() + interval);
                }
            }
        }

        let Some(trigger) = pending else {
            thread::sleep(TICK);
            continue;
        };

        state = LoopState::Sampling;
        debug!("trigger {:?}, state {:?}", trigger, state);

        if let Some(report) = sampler.sample(trigger) {
            if stop.load(Ordering::SeqCst) {
                break;
            }
            if reports.send(report).is_err() {
                // Receiver dropped without stop(); nothing left to serve.
                break;
            }
        }

        state = LoopState::Armed;
    }

    debug!("detection loop stopped in state {:?}", state);
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::capture::engine::testing::ScriptedBackend;
    use crate::capture::{BackendKind, CaptureEngine};
    use crate::coords::{CorrectionRule, PixelSpace};
    use crate::detect::config::{DetectionConfig, ScopeConfig};
    use crate::display::testing::FixedTopology;
    use crate::geometry::ScreenRegion;
    use crate::recognize::testing::CannedEngine;
    use crate::recognize::{FieldKind, ValueRecognizer};
    use crate::window::testing::StaticLocator;

    fn full_screen_config(poll_interval_ms: Option<u64>) -> DetectionConfig {
        let mut regions = BTreeMap::new();
        regions.insert(
            FieldKind::Bet,
            ScreenRegion::new(100, 100, 120, 40).unwrap(),
        );
        DetectionConfig {
            trigger_point: Some(ScreenRegion::new(900, 500, 80, 30).unwrap()),
            regions,
            scope: ScopeConfig::FullScreen,
            poll_interval_ms,
            debounce_ms: 750,
            window_staleness_ms: 2000,
            min_trigger_luma: None,
            pixel_space: PixelSpace::Physical,
            correction_rule: CorrectionRule::DpiScale,
        }
    }

    fn sampler_reading(text: &str, config: DetectionConfig) -> Sampler {
        let backend = ScriptedBackend {
            dims: (1920, 1080),
            ..ScriptedBackend::succeeding(BackendKind::ScreenSnapshot)
        };
        Sampler::new(
            Arc::new(FixedTopology::single(1.0)),
            Arc::new(StaticLocator::at(0, 0, 1920, 1080)),
            CaptureEngine::new(vec![Box::new(backend)]),
            ValueRecognizer::new(Box::new(CannedEngine::reading(text, 90.0))),
            config,
        )
    }

    #[test]
    fn test_timer_trigger_emits_reports() {
        let sampler = sampler_reading("€12,50", full_screen_config(Some(30)));
        let mut handle = DetectionLoop::new(sampler).spawn().unwrap();

        let report = handle
            .recv_timeout(Duration::from_secs(2))
            .expect("timer report");
        assert_eq!(report.trigger, TriggerKind::Timer);
        assert_eq!(report.value(FieldKind::Bet), Some(12.50));
        assert!(report.is_complete());

        handle.stop();
    }

    #[test]
    fn test_manual_trigger_without_timer() {
        let sampler = sampler_reading("1500", full_screen_config(None));
        let mut handle = DetectionLoop::new(sampler).spawn().unwrap();

        handle.trigger_now();
        let report = handle
            .recv_timeout(Duration::from_secs(2))
            .expect("manual report");
        assert_eq!(report.trigger, TriggerKind::Manual);
        assert_eq!(report.value(FieldKind::Bet), Some(1500.0));

        handle.stop();
    }

    #[test]
    fn test_spawn_rejects_invalid_config() {
        let mut config = full_screen_config(Some(1000));
        config.regions.clear();
        let sampler = sampler_reading("0", config);
        assert!(DetectionLoop::new(sampler).spawn().is_err());
    }

    #[test]
    fn test_stop_joins_worker() {
        let sampler = sampler_reading("42", full_screen_config(Some(10_000)));
        let mut handle = DetectionLoop::new(sampler).spawn().unwrap();
        assert!(handle.is_running());

        handle.stop();
        assert!(!handle.is_running());
        // Idempotent.
        handle.stop();
    }

    #[test]
    fn test_dropped_handle_shuts_down() {
        let sampler = sampler_reading("42", full_screen_config(Some(10_000)));
        let handle = DetectionLoop::new(sampler).spawn().unwrap();
        drop(handle);
    }

    fn click_at(x: i32, y: i32) -> MouseEvent {
        MouseEvent {
            x,
            y,
            button_down: true,
            at: chrono::Local::now(),
        }
    }

    #[test]
    fn test_click_inside_radius_triggers() {
        // Trigger point (900,500,80,30) -> center (940,515); largest region
        // dimension 120 -> radius 60.
        let sampler = sampler_reading("€12,50", full_screen_config(None));
        let (events, events_rx) = std::sync::mpsc::channel();
        let mut handle = DetectionLoop::new(sampler)
            .spawn_with_events(events_rx)
            .unwrap();

        events.send(click_at(940, 515)).unwrap();
        let report = handle
            .recv_timeout(Duration::from_secs(2))
            .expect("click report");
        assert_eq!(report.trigger, TriggerKind::Click { x: 940, y: 515 });
        assert_eq!(report.value(FieldKind::Bet), Some(12.50));

        handle.stop();
    }

    #[test]
    fn test_click_outside_radius_ignored() {
        let sampler = sampler_reading("€12,50", full_screen_config(None));
        let (events, events_rx) = std::sync::mpsc::channel();
        let mut handle = DetectionLoop::new(sampler)
            .spawn_with_events(events_rx)
            .unwrap();

        // 100 px right of center, outside the 60 px radius.
        events.send(click_at(1040, 515)).unwrap();
        assert!(handle.recv_timeout(Duration::from_millis(300)).is_none());

        handle.stop();
    }

    #[test]
    fn test_second_click_within_debounce_dropped() {
        let sampler = sampler_reading("€12,50", full_screen_config(None));
        let (events, events_rx) = std::sync::mpsc::channel();
        let mut handle = DetectionLoop::new(sampler)
            .spawn_with_events(events_rx)
            .unwrap();

        // Two presses of one physical double-tap, well inside the 750 ms
        // debounce window.
        events.send(click_at(940, 515)).unwrap();
        events.send(click_at(942, 516)).unwrap();

        let first = handle
            .recv_timeout(Duration::from_secs(2))
            .expect("first click report");
        assert!(matches!(first.trigger, TriggerKind::Click { .. }));
        assert!(handle.recv_timeout(Duration::from_millis(300)).is_none());

        handle.stop();
    }

    #[test]
    fn test_timer_reschedules_from_now_after_slow_cycle() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        use crate::capture::{BackendError, CaptureBackend, CaptureResult, CaptureScope};

        // First capture outlasts the poll interval; later ones are instant.
        struct SlowFirstBackend {
            calls: AtomicUsize,
        }
        impl CaptureBackend for SlowFirstBackend {
            fn kind(&self) -> BackendKind {
                BackendKind::ScreenSnapshot
            }
            fn capture(
                &self,
                _scope: &CaptureScope,
            ) -> std::result::Result<CaptureResult, BackendError> {
                if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    std::thread::sleep(Duration::from_millis(300));
                }
                Ok(CaptureResult::new(
                    vec![0u8; 1920 * 1080 * 4],
                    1920,
                    1080,
                    BackendKind::ScreenSnapshot,
                ))
            }
        }

        let sampler = Sampler::new(
            Arc::new(FixedTopology::single(1.0)),
            Arc::new(StaticLocator::at(0, 0, 1920, 1080)),
            CaptureEngine::new(vec![Box::new(SlowFirstBackend {
                calls: AtomicUsize::new(0),
            })]),
            ValueRecognizer::new(Box::new(CannedEngine::reading("42", 90.0))),
            full_screen_config(Some(100)),
        );
        let mut handle = DetectionLoop::new(sampler).spawn().unwrap();

        let _first = handle.recv_timeout(Duration::from_secs(2)).expect("report 1");
        let second = handle.recv_timeout(Duration::from_secs(2)).expect("report 2");
        let third = handle.recv_timeout(Duration::from_secs(2)).expect("report 3");

        // The ticks missed during the slow cycle must not fire back to back
        // afterwards; the schedule restarts a full interval out.
        let gap = third.trigger_at.signed_duration_since(second.trigger_at);
        assert!(
            gap >= chrono::Duration::milliseconds(60),
            "timer triggers bunched: gap {:?}",
            gap
        );

        handle.stop();
    }
}
