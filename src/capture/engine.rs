//! Backend orchestration: priority order, optimistic reordering, and the
//! wall-clock budget.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::error::{Error, Result};

use super::{BackendError, BackendKind, CaptureBackend, CaptureResult, CaptureScope};

/// Default wall-clock budget for one `capture()` call across all backends.
pub const DEFAULT_CAPTURE_BUDGET: Duration = Duration::from_secs(15);

/// Sentinel for "no backend has succeeded yet" in the hint slot.
const NO_HINT: usize = usize::MAX;

/// Tries capture backends in priority order, remembering the last one that
/// succeeded and attempting it first on the next call.
///
/// The hint lives inside the engine instance rather than module-level state,
/// so independent pipelines (one per test, or several watchers in one
/// process) never interfere. It is updated atomically and read
/// optimistically: a stale hint costs at most one extra fallback attempt.
pub struct CaptureEngine {
    backends: Vec<Box<dyn CaptureBackend>>,
    last_success: AtomicUsize,
    budget: Duration,
}

impl CaptureEngine {
    /// Builds an engine over an explicit backend list, highest priority
    /// first.
    pub fn new(backends: Vec<Box<dyn CaptureBackend>>) -> Self {
        Self {
            backends,
            last_success: AtomicUsize::new(NO_HINT),
            budget: DEFAULT_CAPTURE_BUDGET,
        }
    }

    /// The full priority list for the running platform.
    pub fn with_default_backends() -> Self {
        let mut backends: Vec<Box<dyn CaptureBackend>> = Vec::new();
        #[cfg(windows)]
        {
            backends.push(Box::new(super::GraphicsCaptureBackend::new()));
            backends.push(Box::new(super::GdiBackend::new()));
        }
        backends.push(Box::new(super::SnapshotBackend::new()));
        Self::new(backends)
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    /// The backend that most recently produced a valid capture, if any.
    pub fn last_successful_backend(&self) -> Option<BackendKind> {
        match self.last_success.load(Ordering::Relaxed) {
            NO_HINT => None,
            idx => self.backends.get(idx).map(|b| b.kind()),
        }
    }

    /// Captures the requested scope, falling through the backend chain.
    ///
    /// Returns a well-formed buffer or a typed error; a backend handing back
    /// a zero-length or mis-sized buffer counts as that backend failing.
    /// Exceeding the wall-clock budget aborts the remaining backends with
    /// [`Error::CaptureTimeout`].
    pub fn capture(&self, scope: &CaptureScope) -> Result<CaptureResult> {
        if self.backends.is_empty() {
            return Err(Error::CaptureBackendFailed("no backends configured".into()));
        }

        let started = Instant::now();
        let mut failures: Vec<String> = Vec::new();

        for idx in self.attempt_order() {
            if started.elapsed() >= self.budget {
                warn!(
                    "capture budget exhausted after {} attempt(s)",
                    failures.len()
                );
                return Err(Error::CaptureTimeout(self.budget));
            }

            let backend = &self.backends[idx];
            match backend.capture(scope) {
                Ok(result) if result.is_well_formed() => {
                    debug!(
                        "capture ok via {} ({}x{})",
                        backend.kind(),
                        result.width,
                        result.height
                    );
                    self.last_success.store(idx, Ordering::Relaxed);
                    return Ok(result);
                }
                Ok(result) => {
                    // Empty "success" is a backend bug; treat as failure.
                    failures.push(format!(
                        "{}: returned malformed buffer ({}x{}, {} bytes)",
                        backend.kind(),
                        result.width,
                        result.height,
                        result.pixels.len()
                    ));
                }
                Err(err) => {
                    match &err {
                        BackendError::Unsupported(_) | BackendError::FormatIncompatible(_) => {
                            // Recognized incompatibility: no point retrying,
                            // go straight to the next backend.
                            debug!("backend {} skipped: {}", backend.kind(), err);
                        }
                        BackendError::Failed(_) => {
                            warn!("backend {} failed: {}", backend.kind(), err);
                        }
                    }
                    failures.push(format!("{}: {}", backend.kind(), err));
                }
            }
        }

        if started.elapsed() >= self.budget {
            return Err(Error::CaptureTimeout(self.budget));
        }
        Err(Error::CaptureBackendFailed(failures.join("; ")))
    }

    /// Index order for this attempt: hinted backend first, then the rest in
    /// priority order.
    fn attempt_order(&self) -> Vec<usize> {
        let hint = self.last_success.load(Ordering::Relaxed);
        let mut order: Vec<usize> = Vec::with_capacity(self.backends.len());
        if hint != NO_HINT && hint < self.backends.len() {
            order.push(hint);
        }
        let rest: Vec<usize> = (0..self.backends.len())
            .filter(|&i| !order.contains(&i))
            .collect();
        order.extend(rest);
        order
    }
}
