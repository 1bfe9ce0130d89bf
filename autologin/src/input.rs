//! Keyboard and mouse synthesis policy on top of the platform backend.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::errors::AutoLoginError;
use crate::platform::DesktopBackend;
use crate::types::Point;

/// Pacing between synthesized keystrokes, so slow-rendering targets do not
/// drop input.
pub const DEFAULT_KEYSTROKE_INTERVAL: Duration = Duration::from_millis(100);

/// The layout credential text is typed under: English (US).
const ENGLISH_US_LOCALE: u32 = 0x0409;

/// Synthesizes text entry and clicks. Typed values never reach the logs;
/// only their length may be recorded.
pub struct InputSynthesizer {
    backend: Arc<dyn DesktopBackend>,
    keystroke_interval: Duration,
}

impl InputSynthesizer {
    pub fn new(backend: Arc<dyn DesktopBackend>) -> Self {
        Self {
            backend,
            keystroke_interval: DEFAULT_KEYSTROKE_INTERVAL,
        }
    }

    pub fn with_keystroke_interval(mut self, interval: Duration) -> Self {
        self.keystroke_interval = interval;
        self
    }

    /// Best-effort switch of the active input locale to English. Failure is
    /// logged and never aborts the caller; the text is then typed under
    /// whatever layout is active.
    pub fn ensure_english_locale(&self) {
        if let Err(e) = self.backend.switch_input_locale(ENGLISH_US_LOCALE) {
            warn!(error = %e, "input locale switch failed, typing with the active layout");
        }
    }

    /// Types `text` one key event per character with the configured
    /// inter-character delay.
    pub async fn type_text(&self, text: &str) -> Result<(), AutoLoginError> {
        for (index, ch) in text.chars().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.keystroke_interval).await;
            }
            self.backend.send_char(ch)?;
        }
        debug!(chars = text.chars().count(), "typed text into the focused field");
        Ok(())
    }

    /// Button-down/button-up pair at absolute screen coordinates.
    pub fn click(&self, point: Point) -> Result<(), AutoLoginError> {
        debug!(x = point.x, y = point.y, "clicking");
        self.backend.click(point)
    }
}
