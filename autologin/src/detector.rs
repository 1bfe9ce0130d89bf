//! Bounded-retry detection of the login prompt.
//!
//! A single failed match may just be a loading screen, so the protocol gives
//! the UI up to `max_attempts * interval` to settle before concluding that
//! no login is needed.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::capture::ScreenCapturer;
use crate::matcher::{self, MatchResult};
use crate::retry;
use crate::template::Template;

/// Detection protocol settings.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub max_attempts: u32,
    pub interval: Duration,
    pub threshold: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            interval: Duration::from_secs(30),
            threshold: 0.8,
        }
    }
}

/// Terminal state of a detection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    /// The needs-login element is on screen.
    LoginRequired,
    /// Attempts exhausted with the screen inspected at least once.
    NotRequired,
    /// No attempt ever produced a frame; the screen was never inspected.
    Failed,
}

/// Capture + match loop deciding whether a login prompt is present.
pub struct LoginDetector {
    capturer: Arc<dyn ScreenCapturer>,
    template: Arc<Template>,
    config: DetectorConfig,
}

impl LoginDetector {
    pub fn new(
        capturer: Arc<dyn ScreenCapturer>,
        template: Arc<Template>,
        config: DetectorConfig,
    ) -> Self {
        Self {
            capturer,
            template,
            config,
        }
    }

    /// Runs the bounded detection protocol to a terminal state. A capture
    /// failure counts as a miss for its attempt; a found element ends the
    /// run immediately with no further sleeping.
    pub async fn detect(&self) -> Detection {
        let frames_inspected = AtomicU32::new(0);

        let hit = retry::retry_with_interval(
            self.config.max_attempts,
            self.config.interval,
            |attempt| self.cycle(attempt, &frames_inspected),
        )
        .await;

        match hit {
            Some(score) => {
                info!(score, "login prompt detected");
                Detection::LoginRequired
            }
            None if frames_inspected.load(Ordering::Relaxed) == 0 => {
                warn!("every capture attempt failed, login state is unknown");
                Detection::Failed
            }
            None => {
                info!(
                    attempts = self.config.max_attempts,
                    "no login prompt detected, concluding login is not required"
                );
                Detection::NotRequired
            }
        }
    }

    async fn cycle(&self, attempt: u32, frames_inspected: &AtomicU32) -> Option<f64> {
        debug!(attempt, "capturing frame for login detection");
        let frame = match self.capturer.capture().await {
            Ok(frame) => frame,
            Err(e) => {
                warn!(attempt, error = %e, "capture failed, counting the attempt as a miss");
                return None;
            }
        };
        frames_inspected.fetch_add(1, Ordering::Relaxed);

        match matcher::find(&frame, &self.template, self.config.threshold) {
            MatchResult::Found { score, .. } => Some(score),
            MatchResult::NotFound { score } => {
                debug!(attempt, score, "needs-login element not on screen");
                None
            }
        }
    }
}
