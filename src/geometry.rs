//! Rectangles, coordinate spaces, and the display/window records they
//! describe.
//!
//! A rectangle is only meaningful together with the coordinate space it lives
//! in, so each space gets its own type: [`ScreenRegion`] (logical screen
//! coordinates, what a user selects with the mouse), [`PhysicalRegion`]
//! (the pixel grid a capture backend reads), and [`WindowRegion`] (relative
//! to a target window's top-left corner). Mixing spaces is a compile error,
//! not a runtime surprise.

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// A plain rectangle with no attached coordinate space. Building block for
/// the typed regions below; the signed origin tolerates multi-monitor
/// layouts where secondary displays sit left of or above the primary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    /// True if `(px, py)` lies inside the rectangle.
    pub fn contains(&self, px: i32, py: i32) -> bool {
        px >= self.x && py >= self.y && px < self.right() && py < self.bottom()
    }
}

macro_rules! region_space {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Rect);

        impl $name {
            /// Builds a region, rejecting zero-area rectangles.
            pub fn new(x: i32, y: i32, width: u32, height: u32) -> crate::Result<Self> {
                if width == 0 || height == 0 {
                    return Err(crate::Error::InvalidRegion(format!(
                        "zero-area region {}x{}",
                        width, height
                    )));
                }
                Ok(Self(Rect::new(x, y, width, height)))
            }

            pub fn rect(&self) -> Rect {
                self.0
            }

            pub fn x(&self) -> i32 {
                self.0.x
            }

            pub fn y(&self) -> i32 {
                self.0.y
            }

            pub fn width(&self) -> u32 {
                self.0.width
            }

            pub fn height(&self) -> u32 {
                self.0.height
            }

            /// Center point, used for trigger-radius checks.
            pub fn center(&self) -> (i32, i32) {
                (
                    self.0.x + (self.0.width / 2) as i32,
                    self.0.y + (self.0.height / 2) as i32,
                )
            }
        }
    };
}

region_space! {
    /// A rectangle in logical screen coordinates, prior to DPI scaling.
    ScreenRegion
}

region_space! {
    /// A rectangle on the physical pixel grid a capture backend reads.
    PhysicalRegion
}

region_space! {
    /// A rectangle relative to a target window's top-left corner. Origin is
    /// always non-negative; produced by the coordinate normalizer, never
    /// constructed directly from user input.
    WindowRegion
}

/// One attached display, enumerated fresh on every topology query because
/// monitors can be hot-plugged and scale factors reconfigured between cycles.
#[derive(Clone, Debug, PartialEq)]
pub struct Display {
    /// Stable OS device name (e.g. `\\.\DISPLAY1`).
    pub id: String,
    /// Full bounds in logical units.
    pub bounds: Rect,
    /// Usable bounds excluding taskbars/docks.
    pub work_area: Rect,
    /// DPI scale factor, >= 1.0.
    pub scale_factor: f32,
    pub is_primary: bool,
}

/// A live application window as last seen by the locator.
///
/// Becomes stale the instant the window moves or closes; consumers either
/// re-validate through [`crate::window::WindowLocator`] or accept staleness
/// explicitly via [`TargetWindow::age`].
#[derive(Clone, Debug)]
pub struct TargetWindow {
    pub process_name: String,
    pub title: String,
    /// Bounds in physical pixels, screen-origin relative.
    pub bounds: Rect,
    /// Opaque OS handle (HWND value on Windows).
    pub handle: u64,
    pub last_validated_at: Instant,
}

impl TargetWindow {
    /// Time since the locator last confirmed this window's geometry.
    pub fn age(&self) -> std::time::Duration {
        self.last_validated_at.elapsed()
    }
}
