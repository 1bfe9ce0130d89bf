//! Top-level orchestration: make sure the target is up, decide whether a
//! login prompt is showing, and drive the flow when it is.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::capture::{MonitorCapturer, ScreenCapturer};
use crate::detector::{Detection, DetectorConfig, LoginDetector};
use crate::errors::AutoLoginError;
use crate::flow::{FlowConfig, FlowOutcome, LoginFlowController, LoginSession};
use crate::input::InputSynthesizer;
use crate::platform::{self, DesktopBackend};
use crate::process::ProcessSupervisor;
use crate::template::TemplateSet;
use crate::window::{WindowLocator, WindowQuery};

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub window: WindowQuery,
    /// Settle time after a fresh launch before detection starts.
    pub startup_wait: Duration,
    /// Settle time after switching to an already-running window.
    pub activation_wait: Duration,
    pub detector: DetectorConfig,
    pub flow: FlowConfig,
}

impl RunnerConfig {
    pub fn for_target(process_name: impl Into<String>, title_contains: Vec<String>) -> Self {
        Self {
            window: WindowQuery {
                title_contains,
                process_name: process_name.into(),
            },
            startup_wait: Duration::from_secs(60),
            activation_wait: Duration::from_secs(30),
            detector: DetectorConfig::default(),
            flow: FlowConfig::default(),
        }
    }
}

/// What a completed run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// A login prompt was found and the flow completed.
    LoggedIn,
    /// No login prompt appeared; nothing to do.
    LoginNotRequired,
}

pub struct LoginRunner {
    backend: Arc<dyn DesktopBackend>,
    capturer: Arc<dyn ScreenCapturer>,
    templates: Arc<TemplateSet>,
    supervisor: ProcessSupervisor,
    config: RunnerConfig,
}

impl LoginRunner {
    /// Wires the platform backend and monitor capturer. Fails on platforms
    /// without a backend.
    pub fn new(templates: Arc<TemplateSet>, config: RunnerConfig) -> Result<Self, AutoLoginError> {
        let backend = platform::create_backend()?;
        Ok(Self::with_parts(
            backend,
            Arc::new(MonitorCapturer),
            templates,
            config,
        ))
    }

    pub fn with_parts(
        backend: Arc<dyn DesktopBackend>,
        capturer: Arc<dyn ScreenCapturer>,
        templates: Arc<TemplateSet>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            backend,
            capturer,
            templates,
            supervisor: ProcessSupervisor::new(),
            config,
        }
    }

    /// The whole run. `executable` is consulted only when the target is not
    /// already running; `credentials` only when a login prompt shows up.
    pub async fn run(
        &self,
        credentials: Option<(String, String)>,
        executable: Option<&Path>,
    ) -> Result<RunOutcome, AutoLoginError> {
        if self.supervisor.is_running(&self.config.window.process_name) {
            info!("target already running, switching to its window");
            self.bring_to_front();
            info!(wait = ?self.config.activation_wait, "waiting for the application to settle");
            tokio::time::sleep(self.config.activation_wait).await;
        } else {
            let path = executable.ok_or_else(|| {
                AutoLoginError::Config(
                    "target is not running and no executable path is configured".to_string(),
                )
            })?;
            self.supervisor.launch(path)?;
            info!(wait = ?self.config.startup_wait, "waiting for the application to load");
            tokio::time::sleep(self.config.startup_wait).await;
        }

        let detector = LoginDetector::new(
            self.capturer.clone(),
            self.templates.needs_login()?.clone(),
            self.config.detector.clone(),
        );

        match detector.detect().await {
            Detection::NotRequired => {
                info!("no login required");
                Ok(RunOutcome::LoginNotRequired)
            }
            Detection::Failed => Err(AutoLoginError::Capture(
                "login detection never captured a frame".to_string(),
            )),
            Detection::LoginRequired => {
                let Some((username, password)) = credentials else {
                    return Err(AutoLoginError::Credential(
                        "login is required but no credentials were provided".to_string(),
                    ));
                };

                let flow = LoginFlowController::new(
                    self.capturer.clone(),
                    InputSynthesizer::new(self.backend.clone()),
                    self.templates.clone(),
                    self.config.flow.clone(),
                );

                match flow.run(LoginSession::new(username, password)).await {
                    FlowOutcome::Success => Ok(RunOutcome::LoggedIn),
                    FlowOutcome::Failed(e) => Err(e),
                }
            }
        }
    }

    /// Locate + activate, both best-effort: detection works without focus,
    /// so a missing window or a denied foreground request only degrades.
    fn bring_to_front(&self) {
        let locator = WindowLocator::new(self.backend.clone());
        match locator.locate(&self.config.window) {
            Ok(Some(window)) => {
                if let Err(e) = locator.activate(&window) {
                    warn!(error = %e, "continuing without a guaranteed-focused window");
                }
            }
            Ok(None) => {
                warn!("target process is running but no window was found, using the screen as-is");
            }
            Err(e) => {
                warn!(error = %e, "window lookup failed, using the screen as-is");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Template;
    use crate::testutil::{embed, frame_from_gray, speckle, MockBackend, ScriptedCapturer};
    use crate::types::Point;
    use std::sync::Arc;

    fn templates() -> Arc<TemplateSet> {
        let field = |name: &str, seed| {
            Arc::new(Template::new(name, speckle(16, 16, seed), 0.7).unwrap())
        };
        Arc::new(TemplateSet {
            enter_game: Some(Arc::new(
                Template::new("enter-game", speckle(16, 16, 31), 0.8).unwrap(),
            )),
            loading_circle: None,
            username_field: field("username-field", 32),
            password_field: field("password-field", 33),
            submit_button: None,
        })
    }

    fn fast_config() -> RunnerConfig {
        // The test binary itself certainly runs, steering run() down the
        // already-running branch without launching anything. Only a prefix
        // of the name is used; some platforms truncate process names.
        let exe_prefix: String = std::env::current_exe()
            .ok()
            .and_then(|p| p.file_stem().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "cargo".to_string())
            .chars()
            .take(8)
            .collect();
        let mut config = RunnerConfig::for_target(
            exe_prefix,
            vec!["no-such-window-title-xyz".to_string()],
        );
        config.activation_wait = Duration::ZERO;
        config.startup_wait = Duration::ZERO;
        config.detector.interval = Duration::ZERO;
        config.flow.timing.settle = Duration::ZERO;
        config.flow.timing.after_optional_click = Duration::ZERO;
        config.flow.timing.after_field_click = Duration::ZERO;
        config.flow.timing.after_typing = Duration::ZERO;
        config.flow.timing.after_submit = Duration::ZERO;
        config
    }

    fn login_screen() -> crate::capture::Frame {
        let mut screen = speckle(200, 150, 77);
        embed(&mut screen, &speckle(16, 16, 31), 120, 20);
        embed(&mut screen, &speckle(16, 16, 32), 40, 50);
        embed(&mut screen, &speckle(16, 16, 33), 40, 90);
        frame_from_gray(&screen, Point::new(0, 0))
    }

    #[tokio::test(start_paused = true)]
    async fn login_required_without_credentials_is_a_credential_error() {
        let backend = Arc::new(MockBackend::default());
        let capturer = Arc::new(ScriptedCapturer::repeating(login_screen(), 4));
        let runner =
            LoginRunner::with_parts(backend, capturer, templates(), fast_config());

        let err = runner.run(None, None).await.unwrap_err();
        assert!(matches!(err, AutoLoginError::Credential(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn quiet_screen_concludes_login_not_required() {
        let backend = Arc::new(MockBackend::default());
        let quiet = frame_from_gray(&speckle(200, 150, 555), Point::new(0, 0));
        let capturer = Arc::new(ScriptedCapturer::repeating(quiet, 4));
        let runner =
            LoginRunner::with_parts(backend, capturer, templates(), fast_config());

        let outcome = runner.run(None, None).await.unwrap();
        assert_eq!(outcome, RunOutcome::LoginNotRequired);
    }

    #[tokio::test(start_paused = true)]
    async fn full_run_logs_in_when_the_prompt_is_showing() {
        let backend = Arc::new(MockBackend::default());
        let capturer = Arc::new(ScriptedCapturer::repeating(login_screen(), 16));
        let runner =
            LoginRunner::with_parts(backend.clone(), capturer, templates(), fast_config());

        let outcome = runner
            .run(Some(("alice".to_string(), "pw".to_string())), None)
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::LoggedIn);
        assert_eq!(backend.typed(), "alicepw");
    }
}
