//! Display topology queries: monitor geometry, work areas, and DPI scale
//! factors.
//!
//! Topology is never cached. Monitors can be hot-plugged and resolutions
//! changed between capture cycles, so every cycle queries fresh.

use crate::error::{Error, Result};
use crate::geometry::Display;

/// Source of monitor geometry and scale factors. Leaf dependency of the
/// normalizer and the capture engine; trait-shaped so tests can supply a
/// synthetic layout.
pub trait DisplayTopology: Send + Sync {
    /// Enumerates all attached displays. Fails only if the OS display
    /// subsystem itself is unreachable.
    fn list_displays(&self) -> Result<Vec<Display>>;

    /// The primary display, or the first enumerated one if the OS reports
    /// no primary flag.
    fn primary_display(&self) -> Result<Display> {
        let displays = self.list_displays()?;
        displays
            .iter()
            .find(|d| d.is_primary)
            .or_else(|| displays.first())
            .cloned()
            .ok_or_else(|| Error::DisplayUnavailable("no displays enumerated".into()))
    }

    /// The display whose bounds contain `(x, y)`, falling back to primary
    /// for points in the void between monitors.
    fn display_at(&self, x: i32, y: i32) -> Result<Display> {
        let displays = self.list_displays()?;
        displays
            .iter()
            .find(|d| d.bounds.contains(x, y))
            .cloned()
            .map(Ok)
            .unwrap_or_else(|| self.primary_display())
    }
}

#[cfg(windows)]
pub use win32::Win32Topology;

#[cfg(windows)]
mod win32 {
    use std::ffi::OsString;
    use std::mem;
    use std::os::windows::ffi::OsStringExt;

    use windows::Win32::Foundation::{BOOL, LPARAM, RECT};
    use windows::Win32::Graphics::Gdi::{
        EnumDisplayMonitors, GetMonitorInfoW, HDC, HMONITOR, MONITORINFOEXW, MONITORINFOF_PRIMARY,
    };
    use windows::Win32::UI::HiDpi::{GetDpiForMonitor, MDT_EFFECTIVE_DPI};

    use crate::error::{Error, Result};
    use crate::geometry::{Display, Rect};

    use super::DisplayTopology;

    const BASE_DPI: f32 = 96.0;

    /// Live monitor enumeration through `EnumDisplayMonitors`.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct Win32Topology;

    impl DisplayTopology for Win32Topology {
        fn list_displays(&self) -> Result<Vec<Display>> {
            unsafe extern "system" fn enum_proc(
                monitor: HMONITOR,
                _hdc: HDC,
                _rect: *mut RECT,
                data: LPARAM,
            ) -> BOOL {
                let displays = unsafe { &mut *(data.0 as *mut Vec<Display>) };
                let mut info = MONITORINFOEXW::default();
                info.monitorInfo.cbSize = mem::size_of::<MONITORINFOEXW>() as u32;
                if unsafe { GetMonitorInfoW(monitor, &mut info.monitorInfo as *mut _ as *mut _) }
                    .as_bool()
                {
                    let name_len = info
                        .szDevice
                        .iter()
                        .position(|&c| c == 0)
                        .unwrap_or(info.szDevice.len());
                    let id = OsString::from_wide(&info.szDevice[..name_len])
                        .to_string_lossy()
                        .to_string();

                    // EFFECTIVE DPI tracks per-monitor scaling changes at
                    // runtime; failure falls back to 96 (scale 1.0).
                    let mut dpi_x = BASE_DPI as u32;
                    let mut dpi_y = BASE_DPI as u32;
                    let _ = unsafe {
                        GetDpiForMonitor(monitor, MDT_EFFECTIVE_DPI, &mut dpi_x, &mut dpi_y)
                    };
                    let scale_factor = (dpi_x as f32 / BASE_DPI).max(1.0);

                    displays.push(Display {
                        id,
                        bounds: rect_from(info.monitorInfo.rcMonitor),
                        work_area: rect_from(info.monitorInfo.rcWork),
                        scale_factor,
                        is_primary: (info.monitorInfo.dwFlags & MONITORINFOF_PRIMARY) != 0,
                    });
                }
                BOOL(1)
            }

            let mut displays: Vec<Display> = Vec::new();
            let ok = unsafe {
                EnumDisplayMonitors(
                    HDC::default(),
                    None,
                    Some(enum_proc),
                    LPARAM(&mut displays as *mut Vec<Display> as isize),
                )
            };
            if !ok.as_bool() {
                return Err(Error::DisplayUnavailable(
                    "EnumDisplayMonitors failed".into(),
                ));
            }
            if displays.is_empty() {
                return Err(Error::DisplayUnavailable("no monitors reported".into()));
            }
            Ok(displays)
        }
    }

    fn rect_from(r: RECT) -> Rect {
        Rect::new(r.left, r.top, (r.right - r.left) as u32, (r.bottom - r.top) as u32)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FixedTopology;
    use super::*;
    use crate::geometry::Rect;

    #[test]
    fn test_primary_display_prefers_flag() {
        let mut topo = FixedTopology::single(1.0);
        topo.0.push(Display {
            id: "test-1".into(),
            bounds: Rect::new(1920, 0, 2560, 1440),
            work_area: Rect::new(1920, 0, 2560, 1440),
            scale_factor: 2.0,
            is_primary: false,
        });
        assert_eq!(topo.primary_display().unwrap().id, "test-0");
    }

    #[test]
    fn test_display_at_falls_back_to_primary() {
        let topo = FixedTopology::single(1.0);
        // Point far outside any monitor.
        assert_eq!(topo.display_at(99999, 99999).unwrap().id, "test-0");
        assert_eq!(topo.display_at(10, 10).unwrap().id, "test-0");
    }
}
