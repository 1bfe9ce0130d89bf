//! Platform backends for window management and input synthesis.

use std::sync::Arc;

use crate::errors::AutoLoginError;
use crate::types::Point;
use crate::window::WindowHandle;

/// The OS services the automation core needs. One implementation per
/// platform; tests substitute a recording mock.
pub trait DesktopBackend: Send + Sync {
    /// Snapshot of all visible top-level windows.
    fn enumerate_windows(&self) -> Result<Vec<WindowHandle>, AutoLoginError>;

    /// Request the foreground for `window`. `ActivationDenied` when the OS
    /// refuses the request.
    fn set_foreground(&self, window: &WindowHandle) -> Result<(), AutoLoginError>;

    fn minimize(&self, window: &WindowHandle) -> Result<(), AutoLoginError>;

    fn restore(&self, window: &WindowHandle) -> Result<(), AutoLoginError>;

    /// Ask the foreground window to switch its input locale.
    fn switch_input_locale(&self, locale: u32) -> Result<(), AutoLoginError>;

    /// Synthesize one character key press (down + up).
    fn send_char(&self, ch: char) -> Result<(), AutoLoginError>;

    /// Button-down/button-up pair at absolute screen coordinates.
    fn click(&self, point: Point) -> Result<(), AutoLoginError>;
}

#[cfg(target_os = "windows")]
pub mod windows;

/// Create the backend for the current platform.
pub fn create_backend() -> Result<Arc<dyn DesktopBackend>, AutoLoginError> {
    #[cfg(target_os = "windows")]
    {
        Ok(Arc::new(windows::WindowsBackend::new()))
    }
    #[cfg(not(target_os = "windows"))]
    {
        Err(AutoLoginError::UnsupportedPlatform(
            "window activation and input synthesis are only implemented for Windows".to_string(),
        ))
    }
}
