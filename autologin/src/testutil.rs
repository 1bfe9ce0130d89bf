//! Shared helpers for the unit tests: synthetic frames, a scripted
//! capturer and a recording desktop backend.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use image::{GrayImage, Luma};

use crate::capture::{Frame, ScreenCapturer};
use crate::errors::AutoLoginError;
use crate::platform::DesktopBackend;
use crate::types::Point;
use crate::window::WindowHandle;

/// Deterministic per-seed noise. The hash mixing matters: patterns from
/// different seeds must be genuinely decorrelated, since NCC is invariant
/// to additive shifts.
pub fn speckle(width: u32, height: u32, seed: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let mut v = x.wrapping_mul(73_856_093) ^ y.wrapping_mul(19_349_663)
            ^ seed.wrapping_mul(83_492_791);
        v ^= v >> 13;
        v = v.wrapping_mul(0x5bd1_e995);
        v ^= v >> 15;
        Luma([v as u8])
    })
}

/// Copy `needle` into `haystack` with its top-left corner at (`x`, `y`).
pub fn embed(haystack: &mut GrayImage, needle: &GrayImage, x: u32, y: u32) {
    for ny in 0..needle.height() {
        for nx in 0..needle.width() {
            haystack.put_pixel(x + nx, y + ny, *needle.get_pixel(nx, ny));
        }
    }
}

pub fn frame_from_gray(gray: &GrayImage, origin: Point) -> Frame {
    let mut data = Vec::with_capacity((gray.width() * gray.height() * 4) as usize);
    for p in gray.pixels() {
        data.extend_from_slice(&[p.0[0], p.0[0], p.0[0], 255]);
    }
    Frame::from_rgba(data, gray.width(), gray.height(), origin)
}

/// Replays a prepared sequence of capture outcomes, then keeps failing.
pub struct ScriptedCapturer {
    script: Mutex<VecDeque<Result<Frame, AutoLoginError>>>,
    calls: AtomicU32,
}

impl ScriptedCapturer {
    pub fn new(script: Vec<Result<Frame, AutoLoginError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicU32::new(0),
        }
    }

    /// Returns the same frame for every capture.
    pub fn repeating(frame: Frame, copies: usize) -> Self {
        Self::new((0..copies).map(|_| Ok(frame.clone())).collect())
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl ScreenCapturer for ScriptedCapturer {
    async fn capture(&self) -> Result<Frame, AutoLoginError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AutoLoginError::Capture("capture script exhausted".to_string())))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    Foreground(isize),
    Minimize(isize),
    Restore(isize),
    Locale(u32),
    Char(char),
    Click(Point),
}

/// Records every backend call; failure behavior is scripted per test.
#[derive(Default)]
pub struct MockBackend {
    events: Mutex<Vec<BackendEvent>>,
    windows: Mutex<Vec<WindowHandle>>,
    foreground_denials: AtomicU32,
    locale_fails: AtomicBool,
}

impl MockBackend {
    pub fn events(&self) -> Vec<BackendEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn set_windows(&self, windows: Vec<WindowHandle>) {
        *self.windows.lock().unwrap() = windows;
    }

    /// Deny the next `n` foreground requests.
    pub fn deny_foreground_times(&self, n: u32) {
        self.foreground_denials.store(n, Ordering::Relaxed);
    }

    pub fn fail_locale_switches(&self) {
        self.locale_fails.store(true, Ordering::Relaxed);
    }

    fn record(&self, event: BackendEvent) {
        self.events.lock().unwrap().push(event);
    }

    /// Typed characters, in order.
    pub fn typed(&self) -> String {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                BackendEvent::Char(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    /// Click points, in order.
    pub fn clicks(&self) -> Vec<Point> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                BackendEvent::Click(p) => Some(p),
                _ => None,
            })
            .collect()
    }
}

impl DesktopBackend for MockBackend {
    fn enumerate_windows(&self) -> Result<Vec<WindowHandle>, AutoLoginError> {
        Ok(self.windows.lock().unwrap().clone())
    }

    fn set_foreground(&self, window: &WindowHandle) -> Result<(), AutoLoginError> {
        self.record(BackendEvent::Foreground(window.raw));
        let denials = self.foreground_denials.load(Ordering::Relaxed);
        if denials > 0 {
            self.foreground_denials.store(denials - 1, Ordering::Relaxed);
            return Err(AutoLoginError::ActivationDenied(format!(
                "denied foreground for '{}'",
                window.title
            )));
        }
        Ok(())
    }

    fn minimize(&self, window: &WindowHandle) -> Result<(), AutoLoginError> {
        self.record(BackendEvent::Minimize(window.raw));
        Ok(())
    }

    fn restore(&self, window: &WindowHandle) -> Result<(), AutoLoginError> {
        self.record(BackendEvent::Restore(window.raw));
        Ok(())
    }

    fn switch_input_locale(&self, locale: u32) -> Result<(), AutoLoginError> {
        if self.locale_fails.load(Ordering::Relaxed) {
            return Err(AutoLoginError::Platform("locale switch refused".to_string()));
        }
        self.record(BackendEvent::Locale(locale));
        Ok(())
    }

    fn send_char(&self, ch: char) -> Result<(), AutoLoginError> {
        self.record(BackendEvent::Char(ch));
        Ok(())
    }

    fn click(&self, point: Point) -> Result<(), AutoLoginError> {
        self.record(BackendEvent::Click(point));
        Ok(())
    }
}
