//! The login flow: a sequential state machine that clicks through optional
//! pre-login screens, fills both credential fields and submits.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::capture::ScreenCapturer;
use crate::errors::AutoLoginError;
use crate::input::InputSynthesizer;
use crate::matcher::{self, MatchResult};
use crate::template::{Template, TemplateSet};
use crate::types::Point;

/// Delays between flow steps; tests zero them out.
#[derive(Debug, Clone)]
pub struct FlowTiming {
    /// Let the UI stabilize after activation/detection.
    pub settle: Duration,
    pub after_optional_click: Duration,
    pub after_field_click: Duration,
    pub after_typing: Duration,
    pub after_submit: Duration,
}

impl Default for FlowTiming {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(2),
            after_optional_click: Duration::from_secs(1),
            after_field_click: Duration::from_millis(500),
            after_typing: Duration::from_millis(500),
            after_submit: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FlowConfig {
    pub timing: FlowTiming,
    /// Where the submit control sits when no submit template asset exists.
    /// Resolution-dependent; the template asset is the robust path.
    pub submit_fallback: Point,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            timing: FlowTiming::default(),
            submit_fallback: Point::new(960, 500),
        }
    }
}

/// Where the flow currently is. Mostly diagnostic; the terminal result is
/// what callers act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Settling,
    DismissingOverlay,
    EnteringGame,
    TypingUsername,
    TypingPassword,
    Submitting,
    Confirming,
    Done,
}

/// Per-attempt login context. Credentials live in memory only and are
/// excluded from all log output.
pub struct LoginSession {
    username: String,
    password: String,
    state: LoginState,
    attempt: u32,
}

impl LoginSession {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            state: LoginState::Settling,
            attempt: 1,
        }
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    pub fn state(&self) -> LoginState {
        self.state
    }

    fn advance(&mut self, state: LoginState) {
        debug!(from = ?self.state, to = ?state, "login flow state change");
        self.state = state;
    }
}

impl fmt::Debug for LoginSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginSession")
            .field("username_chars", &self.username.chars().count())
            .field("password_chars", &self.password.chars().count())
            .field("state", &self.state)
            .field("attempt", &self.attempt)
            .finish()
    }
}

/// Terminal state of a flow run.
#[derive(Debug)]
pub enum FlowOutcome {
    Success,
    Failed(AutoLoginError),
}

impl FlowOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FlowOutcome::Success)
    }
}

/// Drives the login sequence. Only a missing required field is a hard stop;
/// unmatched optional elements are skip-and-continue. The controller only
/// returns its terminal state; deciding whether to exit the process is the
/// caller's business.
pub struct LoginFlowController {
    capturer: Arc<dyn ScreenCapturer>,
    input: InputSynthesizer,
    templates: Arc<TemplateSet>,
    config: FlowConfig,
}

impl LoginFlowController {
    pub fn new(
        capturer: Arc<dyn ScreenCapturer>,
        input: InputSynthesizer,
        templates: Arc<TemplateSet>,
        config: FlowConfig,
    ) -> Self {
        Self {
            capturer,
            input,
            templates,
            config,
        }
    }

    pub async fn run(&self, mut session: LoginSession) -> FlowOutcome {
        let timing = &self.config.timing;
        info!(attempt = session.attempt, "starting login flow");
        tokio::time::sleep(timing.settle).await;

        session.advance(LoginState::DismissingOverlay);
        if let Some(template) = &self.templates.loading_circle {
            if self.click_optional(template).await {
                tokio::time::sleep(timing.after_optional_click).await;
            }
        }

        session.advance(LoginState::EnteringGame);
        if let Some(template) = &self.templates.enter_game {
            if self.click_optional(template).await {
                tokio::time::sleep(timing.after_optional_click).await;
            }
        }

        session.advance(LoginState::TypingUsername);
        if let Err(e) = self
            .fill_field(&self.templates.username_field, &session.username)
            .await
        {
            return FlowOutcome::Failed(e);
        }

        session.advance(LoginState::TypingPassword);
        if let Err(e) = self
            .fill_field(&self.templates.password_field, &session.password)
            .await
        {
            return FlowOutcome::Failed(e);
        }

        session.advance(LoginState::Submitting);
        if let Err(e) = self.submit().await {
            return FlowOutcome::Failed(e);
        }
        tokio::time::sleep(timing.after_submit).await;

        // Some UIs show one more confirmation screen after the submit.
        session.advance(LoginState::Confirming);
        if let Some(template) = &self.templates.enter_game {
            self.click_optional(template).await;
        }

        session.advance(LoginState::Done);
        info!("login flow completed");
        FlowOutcome::Success
    }

    /// Click the field, settle, make sure the layout is English, type the
    /// value, settle again. A field that never matches is the hard stop.
    async fn fill_field(&self, template: &Template, value: &str) -> Result<(), AutoLoginError> {
        let timing = &self.config.timing;
        let Some((point, score)) = self.locate(template).await else {
            warn!(template = template.name(), "required field not on screen");
            return Err(AutoLoginError::FieldNotFound(template.name().to_string()));
        };

        info!(template = template.name(), score, "clicking field");
        self.input.click(point)?;
        tokio::time::sleep(timing.after_field_click).await;

        self.input.ensure_english_locale();
        self.input.type_text(value).await?;
        tokio::time::sleep(timing.after_typing).await;
        Ok(())
    }

    async fn submit(&self) -> Result<(), AutoLoginError> {
        if let Some(template) = &self.templates.submit_button {
            if self.click_optional(template).await {
                return Ok(());
            }
            warn!("submit template missed, falling back to the fixed coordinate");
        }
        info!(
            x = self.config.submit_fallback.x,
            y = self.config.submit_fallback.y,
            "clicking submit at the configured coordinate"
        );
        self.input.click(self.config.submit_fallback)
    }

    /// Click an element when it is on screen; a miss is not an error.
    async fn click_optional(&self, template: &Template) -> bool {
        let Some((point, score)) = self.locate(template).await else {
            debug!(template = template.name(), "optional element not on screen, skipping");
            return false;
        };
        info!(template = template.name(), score, "clicking optional element");
        match self.input.click(point) {
            Ok(()) => true,
            Err(e) => {
                warn!(template = template.name(), error = %e, "click failed, skipping");
                false
            }
        }
    }

    /// Fresh capture + match; returns the element's center in absolute
    /// screen coordinates. Capture failure is logged and treated as a miss.
    async fn locate(&self, template: &Template) -> Option<(Point, f64)> {
        let frame = match self.capturer.capture().await {
            Ok(frame) => frame,
            Err(e) => {
                warn!(template = template.name(), error = %e, "capture failed while locating element");
                return None;
            }
        };

        match matcher::find(&frame, template, template.threshold()) {
            MatchResult::Found { region, score } => {
                let center = region.center();
                Some((
                    Point::new(frame.origin.x + center.x, frame.origin.y + center.y),
                    score,
                ))
            }
            MatchResult::NotFound { score } => {
                debug!(template = template.name(), score, "element not found");
                None
            }
        }
    }
}
