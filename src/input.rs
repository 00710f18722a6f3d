//! Input-event monitoring for click-near-trigger-point sampling.
//!
//! The monitor runs on its own thread and streams typed events over an mpsc
//! channel; the detection loop consumes them without ever blocking on the
//! monitor's lifecycle. Cancellation is the channel closing: the thread
//! exits when the stop flag is raised or the receiver is dropped.

use chrono::{DateTime, Local};

/// One observed pointer event.
#[derive(Clone, Copy, Debug)]
pub struct MouseEvent {
    /// Pointer position in logical screen coordinates.
    pub x: i32,
    pub y: i32,
    /// True for a button-press edge (not held state).
    pub button_down: bool,
    pub at: DateTime<Local>,
}

/// Spawns the platform mouse monitor. Events arrive on the returned
/// receiver until `stop` is raised.
#[cfg(windows)]
pub fn spawn_mouse_monitor(
    stop: std::sync::Arc<std::sync::atomic::AtomicBool>,
) -> std::sync::mpsc::Receiver<MouseEvent> {
    win32::spawn(stop)
}

#[cfg(windows)]
mod win32 {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc::{Receiver, channel};
    use std::thread;
    use std::time::Duration;

    use chrono::Local;
    use log::debug;
    use windows::Win32::Foundation::POINT;
    use windows::Win32::UI::Input::KeyboardAndMouse::{GetAsyncKeyState, VK_LBUTTON};
    use windows::Win32::UI::WindowsAndMessaging::GetCursorPos;

    use super::MouseEvent;

    const POLL_INTERVAL: Duration = Duration::from_millis(15);

    pub fn spawn(stop: Arc<AtomicBool>) -> Receiver<MouseEvent> {
        let (sender, receiver) = channel();

        thread::spawn(move || {
            let mut was_down = false;
            debug!("mouse monitor started");

            while !stop.load(Ordering::SeqCst) {
                let mut pt = POINT::default();
                if unsafe { GetCursorPos(&mut pt) }.is_ok() {
                    // High bit set while the button is held; emit only the
                    // press edge.
                    let is_down =
                        (unsafe { GetAsyncKeyState(VK_LBUTTON.0 as i32) } as u16 & 0x8000) != 0;
                    if is_down && !was_down {
                        let event = MouseEvent {
                            x: pt.x,
                            y: pt.y,
                            button_down: true,
                            at: Local::now(),
                        };
                        if sender.send(event).is_err() {
                            // Receiver gone: the loop shut down.
                            break;
                        }
                    }
                    was_down = is_down;
                }
                thread::sleep(POLL_INTERVAL);
            }
            debug!("mouse monitor stopped");
        });

        receiver
    }
}
