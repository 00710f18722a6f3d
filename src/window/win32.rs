//! Win32 window enumeration via `EnumWindows`.

use std::ffi::OsString;
use std::os::windows::ffi::OsStringExt;
use std::time::Instant;

use log::debug;
use windows::Win32::Foundation::{BOOL, CloseHandle, HWND, LPARAM, RECT, TRUE};
use windows::Win32::System::Threading::{
    OpenProcess, PROCESS_NAME_WIN32, PROCESS_QUERY_LIMITED_INFORMATION, QueryFullProcessImageNameW,
};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetWindowRect, GetWindowTextLengthW, GetWindowTextW, GetWindowThreadProcessId,
    IsIconic, IsWindow, IsWindowVisible,
};

use crate::error::{Error, Result};
use crate::geometry::{Rect, TargetWindow};

use super::{WindowFilter, WindowLocator};

/// Locator backed by the native window manager.
#[derive(Clone, Copy, Debug, Default)]
pub struct Win32Locator;

struct EnumData<'a> {
    filter: &'a WindowFilter,
    found: Vec<TargetWindow>,
}

impl WindowLocator for Win32Locator {
    fn list_windows(&self, filter: &WindowFilter) -> Result<Vec<TargetWindow>> {
        unsafe extern "system" fn enum_callback(hwnd: HWND, lparam: LPARAM) -> BOOL {
            unsafe {
                let data = &mut *(lparam.0 as *mut EnumData);

                if !IsWindowVisible(hwnd).as_bool() {
                    return TRUE;
                }

                // Titleless windows are never main application windows.
                let title_len = GetWindowTextLengthW(hwnd);
                if title_len == 0 {
                    return TRUE;
                }
                let mut title_buf: Vec<u16> = vec![0; (title_len + 1) as usize];
                GetWindowTextW(hwnd, &mut title_buf);
                let title = OsString::from_wide(&title_buf[..title_len as usize])
                    .to_string_lossy()
                    .to_string();

                let Some(process_name) = process_name_for(hwnd) else {
                    return TRUE;
                };

                let mut rect = RECT::default();
                if GetWindowRect(hwnd, &mut rect).is_err() {
                    return TRUE;
                }
                let width = (rect.right - rect.left).max(0) as u32;
                let height = (rect.bottom - rect.top).max(0) as u32;

                if data.filter.matches(&process_name, width, height) {
                    data.found.push(TargetWindow {
                        process_name,
                        title,
                        bounds: Rect::new(rect.left, rect.top, width, height),
                        handle: hwnd.0 as usize as u64,
                        last_validated_at: Instant::now(),
                    });
                }

                TRUE
            }
        }

        let mut data = EnumData {
            filter,
            found: Vec::new(),
        };
        unsafe {
            // EnumWindows reports FALSE if the callback stops enumeration
            // early; we always run to completion, so surface real failures.
            if EnumWindows(Some(enum_callback), LPARAM(&mut data as *mut _ as isize)).is_err() {
                return Err(Error::DisplayUnavailable("EnumWindows failed".into()));
            }
        }

        debug!(
            "window enumeration: {} candidate(s) for filter {:?}",
            data.found.len(),
            filter.process_substrings
        );
        Ok(data.found)
    }

    fn capture_geometry(&self, window: &TargetWindow) -> Result<Rect> {
        let hwnd = HWND(window.handle as usize as *mut std::ffi::c_void);

        unsafe {
            if !IsWindow(hwnd).as_bool() {
                return Err(Error::WindowNotFound);
            }
            if IsIconic(hwnd).as_bool() {
                return Err(Error::GeometryUnavailable(format!(
                    "window \"{}\" is minimized",
                    window.title
                )));
            }
        }

        let mut rect = RECT::default();
        unsafe {
            GetWindowRect(hwnd, &mut rect)
                .map_err(|e| Error::GeometryUnavailable(e.to_string()))?;
        }
        let width = (rect.right - rect.left).max(0) as u32;
        let height = (rect.bottom - rect.top).max(0) as u32;
        if width == 0 || height == 0 {
            return Err(Error::GeometryUnavailable(format!(
                "window \"{}\" reports zero-area geometry",
                window.title
            )));
        }

        Ok(Rect::new(rect.left, rect.top, width, height))
    }
}

/// Resolves the executable file name of the process owning `hwnd`.
unsafe fn process_name_for(hwnd: HWND) -> Option<String> {
    unsafe {
        let mut process_id: u32 = 0;
        GetWindowThreadProcessId(hwnd, Some(&mut process_id));
        if process_id == 0 {
            return None;
        }

        let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, process_id).ok()?;

        let mut name_buf: Vec<u16> = vec![0; 1024];
        let mut len = name_buf.len() as u32;
        let result = QueryFullProcessImageNameW(
            handle,
            PROCESS_NAME_WIN32,
            windows::core::PWSTR(name_buf.as_mut_ptr()),
            &mut len,
        );
        let _ = CloseHandle(handle);

        if result.is_err() || len == 0 {
            return None;
        }

        let full_path = OsString::from_wide(&name_buf[..len as usize])
            .to_string_lossy()
            .to_string();
        Some(
            full_path
                .rsplit('\\')
                .next()
                .unwrap_or(&full_path)
                .to_string(),
        )
    }
}
