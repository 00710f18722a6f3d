//! Target-window discovery.
//!
//! Platform-specific window enumeration hides behind the [`WindowLocator`]
//! trait; callers never see the platform branch. A port to another OS only
//! reimplements this trait and the capture backend list.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::geometry::{Rect, TargetWindow};

#[cfg(windows)]
mod win32;

#[cfg(windows)]
pub use win32::Win32Locator;

/// Windows smaller than this are tooltips, dialogs, or splash screens and
/// are never useful capture targets.
pub const MIN_WINDOW_WIDTH: u32 = 300;
pub const MIN_WINDOW_HEIGHT: u32 = 200;

/// Filter for candidate application windows.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WindowFilter {
    /// Case-insensitive substrings matched against the process executable
    /// name. An empty list matches every process.
    pub process_substrings: Vec<String>,
    #[serde(default = "default_min_width")]
    pub min_width: u32,
    #[serde(default = "default_min_height")]
    pub min_height: u32,
}

fn default_min_width() -> u32 {
    MIN_WINDOW_WIDTH
}

fn default_min_height() -> u32 {
    MIN_WINDOW_HEIGHT
}

impl Default for WindowFilter {
    fn default() -> Self {
        Self {
            process_substrings: Vec::new(),
            min_width: MIN_WINDOW_WIDTH,
            min_height: MIN_WINDOW_HEIGHT,
        }
    }
}

impl WindowFilter {
    pub fn for_process(substring: impl Into<String>) -> Self {
        Self {
            process_substrings: vec![substring.into()],
            ..Self::default()
        }
    }

    /// True if a window with this process name and size passes the filter.
    pub fn matches(&self, process_name: &str, width: u32, height: u32) -> bool {
        if width < self.min_width || height < self.min_height {
            return false;
        }
        if self.process_substrings.is_empty() {
            return true;
        }
        let lower = process_name.to_lowercase();
        self.process_substrings
            .iter()
            .any(|s| lower.contains(&s.to_lowercase()))
    }
}

/// Enumerates candidate windows and resolves their live geometry.
pub trait WindowLocator: Send + Sync {
    /// All visible windows passing the filter, front-to-back where the OS
    /// provides an ordering.
    fn list_windows(&self, filter: &WindowFilter) -> Result<Vec<TargetWindow>>;

    /// Fresh physical-pixel geometry for a previously located window.
    ///
    /// Fails with [`crate::Error::WindowNotFound`] if the window closed, or
    /// [`crate::Error::GeometryUnavailable`] if it exists but the OS refuses
    /// geometry (e.g. minimized) — never a placeholder rectangle.
    fn capture_geometry(&self, window: &TargetWindow) -> Result<Rect>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_rejects_small_windows() {
        let filter = WindowFilter::default();
        assert!(!filter.matches("game.exe", 200, 150));
        assert!(filter.matches("game.exe", 800, 600));
    }

    #[test]
    fn test_filter_process_substring_case_insensitive() {
        let filter = WindowFilter::for_process("Chrome");
        assert!(filter.matches("chrome.exe", 800, 600));
        assert!(filter.matches("GoogleChrome.exe", 800, 600));
        assert!(!filter.matches("firefox.exe", 800, 600));
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = WindowFilter::default();
        assert!(filter.matches("anything.exe", 640, 480));
    }
}
