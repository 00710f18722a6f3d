//! Capture backend using a GDI device-context blit.
//!
//! Software path: copies the window (or virtual screen) into a compatible
//! bitmap with `BitBlt` and reads the bits back through `GetDIBits`. Slower
//! than compositor capture and blind to hardware-overlay content, but it
//! keeps working on hardware where the frame-pool path fails.
//!
//! Window-scoped rasters span the full window rect (`GetWindowDC`, not the
//! client-area DC): every backend serves the same origin, so a
//! [`crate::geometry::WindowRegion`] indexes the same pixels no matter which
//! backend the engine landed on.

use std::mem;

use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Gdi::{
    BI_RGB, BITMAPINFO, BITMAPINFOHEADER, BitBlt, CreateCompatibleBitmap, CreateCompatibleDC,
    DIB_RGB_COLORS, DeleteDC, DeleteObject, GetDC, GetDIBits, GetWindowDC, ReleaseDC, SRCCOPY,
    SelectObject,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetSystemMetrics, GetWindowRect, IsWindow, SM_CXVIRTUALSCREEN, SM_CYVIRTUALSCREEN,
    SM_XVIRTUALSCREEN, SM_YVIRTUALSCREEN,
};

use super::{BackendError, BackendKind, CaptureBackend, CaptureResult, CaptureScope};

/// GDI BitBlt backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct GdiBackend;

impl GdiBackend {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureBackend for GdiBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::GdiBlit
    }

    fn capture(&self, scope: &CaptureScope) -> Result<CaptureResult, BackendError> {
        let (pixels, width, height) = match scope {
            CaptureScope::Window(window) => {
                let hwnd = HWND(window.handle as usize as *mut std::ffi::c_void);
                unsafe {
                    if !IsWindow(hwnd).as_bool() {
                        return Err(BackendError::Failed("window handle no longer valid".into()));
                    }
                }
                // Full window rect, matching the origin the locator records
                // in TargetWindow.bounds.
                let mut rect = windows::Win32::Foundation::RECT::default();
                unsafe {
                    GetWindowRect(hwnd, &mut rect)
                        .map_err(|e| BackendError::Failed(e.to_string()))?;
                }
                let width = (rect.right - rect.left).max(0) as u32;
                let height = (rect.bottom - rect.top).max(0) as u32;
                blit(Some(hwnd), 0, 0, width, height)?
            }
            CaptureScope::FullScreen => {
                let (x, y, width, height) = unsafe {
                    (
                        GetSystemMetrics(SM_XVIRTUALSCREEN),
                        GetSystemMetrics(SM_YVIRTUALSCREEN),
                        GetSystemMetrics(SM_CXVIRTUALSCREEN).max(0) as u32,
                        GetSystemMetrics(SM_CYVIRTUALSCREEN).max(0) as u32,
                    )
                };
                blit(None, x, y, width, height)?
            }
        };

        Ok(CaptureResult::new(pixels, width, height, BackendKind::GdiBlit))
    }
}

/// Blits `width x height` at `(src_x, src_y)` from the window DC of `hwnd`
/// (or the screen DC when `None`) and returns tightly packed RGBA.
fn blit(
    hwnd: Option<HWND>,
    src_x: i32,
    src_y: i32,
    width: u32,
    height: u32,
) -> Result<(Vec<u8>, u32, u32), BackendError> {
    if width == 0 || height == 0 {
        return Err(BackendError::Failed(format!(
            "degenerate source area {}x{}",
            width, height
        )));
    }

    unsafe {
        // The window DC spans the whole window rect including the frame;
        // the client-area DC would shift every region by the non-client
        // insets relative to the other backends.
        let src_dc = match hwnd {
            Some(h) => GetWindowDC(h),
            None => GetDC(HWND::default()),
        };
        if src_dc.is_invalid() {
            return Err(BackendError::Failed("GetDC failed".into()));
        }

        let mem_dc = CreateCompatibleDC(src_dc);
        let bitmap = CreateCompatibleBitmap(src_dc, width as i32, height as i32);
        let old = SelectObject(mem_dc, bitmap);

        let blt = BitBlt(
            mem_dc,
            0,
            0,
            width as i32,
            height as i32,
            src_dc,
            src_x,
            src_y,
            SRCCOPY,
        );

        let result = if blt.is_err() {
            Err(BackendError::Failed("BitBlt failed".into()))
        } else {
            read_dib(mem_dc, bitmap, width, height)
        };

        SelectObject(mem_dc, old);
        let _ = DeleteObject(bitmap);
        let _ = DeleteDC(mem_dc);
        ReleaseDC(hwnd.unwrap_or_default(), src_dc);

        result.map(|pixels| (pixels, width, height))
    }
}

unsafe fn read_dib(
    mem_dc: windows::Win32::Graphics::Gdi::HDC,
    bitmap: windows::Win32::Graphics::Gdi::HBITMAP,
    width: u32,
    height: u32,
) -> Result<Vec<u8>, BackendError> {
    let mut info = BITMAPINFO {
        bmiHeader: BITMAPINFOHEADER {
            biSize: mem::size_of::<BITMAPINFOHEADER>() as u32,
            biWidth: width as i32,
            // Negative height requests a top-down DIB.
            biHeight: -(height as i32),
            biPlanes: 1,
            biBitCount: 32,
            biCompression: BI_RGB.0,
            ..Default::default()
        },
        ..Default::default()
    };

    let mut bgra = vec![0u8; (width * height * 4) as usize];
    let copied = unsafe {
        GetDIBits(
            mem_dc,
            bitmap,
            0,
            height,
            Some(bgra.as_mut_ptr() as *mut _),
            &mut info,
            DIB_RGB_COLORS,
        )
    };
    if copied == 0 {
        // GetDIBits refusing the requested 32-bit layout means the current
        // display mode uses a depth this path cannot read.
        return Err(BackendError::FormatIncompatible(
            "GetDIBits rejected 32-bit readback".into(),
        ));
    }

    // BGRA -> RGBA in place.
    for px in bgra.chunks_exact_mut(4) {
        px.swap(0, 2);
        px[3] = 255;
    }
    Ok(bgra)
}
