//! Win32 backend: window enumeration and activation plus `SendInput`
//! keyboard/mouse synthesis.

use tracing::debug;

use windows::Win32::Foundation::{BOOL, HWND, LPARAM, TRUE, WPARAM};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT, KEYEVENTF_KEYUP,
    KEYEVENTF_UNICODE, MOUSEEVENTF_ABSOLUTE, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP,
    MOUSEEVENTF_MOVE, MOUSEINPUT, VIRTUAL_KEY,
};
use windows::Win32::UI::WindowsAndMessaging::{
    BringWindowToTop, EnumWindows, GetClassNameW, GetForegroundWindow, GetSystemMetrics,
    GetWindowTextW, GetWindowThreadProcessId, IsIconic, IsWindowVisible, SendMessageW,
    SetForegroundWindow, ShowWindow, SM_CXSCREEN, SM_CYSCREEN, SW_MINIMIZE, SW_RESTORE,
    WM_INPUTLANGCHANGEREQUEST,
};

use crate::errors::AutoLoginError;
use crate::platform::DesktopBackend;
use crate::types::Point;
use crate::window::WindowHandle;

pub struct WindowsBackend;

impl WindowsBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WindowsBackend {
    fn default() -> Self {
        Self::new()
    }
}

unsafe extern "system" fn collect_window(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let windows = &mut *(lparam.0 as *mut Vec<WindowHandle>);

    if !IsWindowVisible(hwnd).as_bool() {
        return TRUE;
    }

    let mut title_buf = [0u16; 512];
    let title_len = GetWindowTextW(hwnd, &mut title_buf).max(0) as usize;
    let mut class_buf = [0u16; 256];
    let class_len = GetClassNameW(hwnd, &mut class_buf).max(0) as usize;
    let mut pid = 0u32;
    GetWindowThreadProcessId(hwnd, Some(&mut pid));

    windows.push(WindowHandle {
        raw: hwnd.0 as isize,
        title: String::from_utf16_lossy(&title_buf[..title_len]),
        class_name: String::from_utf16_lossy(&class_buf[..class_len]),
        pid,
    });

    TRUE
}

fn hwnd_of(window: &WindowHandle) -> HWND {
    HWND(window.raw as *mut core::ffi::c_void)
}

impl DesktopBackend for WindowsBackend {
    fn enumerate_windows(&self) -> Result<Vec<WindowHandle>, AutoLoginError> {
        let mut windows: Vec<WindowHandle> = Vec::new();
        unsafe {
            EnumWindows(
                Some(collect_window),
                LPARAM(&mut windows as *mut _ as isize),
            )
        }
        .map_err(|e| AutoLoginError::Platform(format!("window enumeration failed: {e}")))?;
        debug!(count = windows.len(), "enumerated visible top-level windows");
        Ok(windows)
    }

    fn set_foreground(&self, window: &WindowHandle) -> Result<(), AutoLoginError> {
        let hwnd = hwnd_of(window);
        unsafe {
            if IsIconic(hwnd).as_bool() {
                let _ = ShowWindow(hwnd, SW_RESTORE);
            }
            let _ = BringWindowToTop(hwnd);
            if SetForegroundWindow(hwnd).as_bool() {
                Ok(())
            } else {
                Err(AutoLoginError::ActivationDenied(format!(
                    "foreground request for '{}' was denied",
                    window.title
                )))
            }
        }
    }

    fn minimize(&self, window: &WindowHandle) -> Result<(), AutoLoginError> {
        unsafe {
            let _ = ShowWindow(hwnd_of(window), SW_MINIMIZE);
        }
        Ok(())
    }

    fn restore(&self, window: &WindowHandle) -> Result<(), AutoLoginError> {
        unsafe {
            let _ = ShowWindow(hwnd_of(window), SW_RESTORE);
        }
        Ok(())
    }

    fn switch_input_locale(&self, locale: u32) -> Result<(), AutoLoginError> {
        unsafe {
            let hwnd = GetForegroundWindow();
            if hwnd.0.is_null() {
                return Err(AutoLoginError::Platform(
                    "no foreground window to receive the locale change".to_string(),
                ));
            }
            SendMessageW(
                hwnd,
                WM_INPUTLANGCHANGEREQUEST,
                WPARAM(0),
                LPARAM(locale as isize),
            );
        }
        Ok(())
    }

    fn send_char(&self, ch: char) -> Result<(), AutoLoginError> {
        let mut units = [0u16; 2];
        let encoded = ch.encode_utf16(&mut units);

        let mut inputs = Vec::with_capacity(encoded.len() * 2);
        for &unit in encoded.iter() {
            for flags in [KEYEVENTF_UNICODE, KEYEVENTF_UNICODE | KEYEVENTF_KEYUP] {
                inputs.push(INPUT {
                    r#type: INPUT_KEYBOARD,
                    Anonymous: INPUT_0 {
                        ki: KEYBDINPUT {
                            wVk: VIRTUAL_KEY(0),
                            wScan: unit,
                            dwFlags: flags,
                            time: 0,
                            dwExtraInfo: 0,
                        },
                    },
                });
            }
        }

        let sent = unsafe { SendInput(&inputs, std::mem::size_of::<INPUT>() as i32) };
        if sent as usize != inputs.len() {
            return Err(AutoLoginError::Platform(format!(
                "SendInput inserted {sent} of {} key events",
                inputs.len()
            )));
        }
        Ok(())
    }

    fn click(&self, point: Point) -> Result<(), AutoLoginError> {
        fn to_absolute(point: Point) -> (i32, i32) {
            let screen_w = unsafe { GetSystemMetrics(SM_CXSCREEN) };
            let screen_h = unsafe { GetSystemMetrics(SM_CYSCREEN) };
            let abs_x = ((point.x as f64 / screen_w as f64) * 65535.0).round() as i32;
            let abs_y = ((point.y as f64 / screen_h as f64) * 65535.0).round() as i32;
            (abs_x, abs_y)
        }

        let (abs_x, abs_y) = to_absolute(point);
        let mouse_input = |dx: i32, dy: i32, flags| INPUT {
            r#type: INPUT_MOUSE,
            Anonymous: INPUT_0 {
                mi: MOUSEINPUT {
                    dx,
                    dy,
                    mouseData: 0,
                    dwFlags: flags,
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        };

        let inputs = [
            mouse_input(abs_x, abs_y, MOUSEEVENTF_MOVE | MOUSEEVENTF_ABSOLUTE),
            mouse_input(0, 0, MOUSEEVENTF_LEFTDOWN),
            mouse_input(0, 0, MOUSEEVENTF_LEFTUP),
        ];

        let sent = unsafe { SendInput(&inputs, std::mem::size_of::<INPUT>() as i32) };
        if sent as usize != inputs.len() {
            return Err(AutoLoginError::Platform(format!(
                "SendInput inserted {sent} of {} mouse events",
                inputs.len()
            )));
        }
        Ok(())
    }
}
