//! Target-window discovery and activation.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::errors::AutoLoginError;
use crate::platform::DesktopBackend;
use crate::process::ProcessSupervisor;

/// Opaque reference to a top-level window. Valid only until the underlying
/// window is destroyed; never persisted.
#[derive(Debug, Clone)]
pub struct WindowHandle {
    /// OS window id, opaque to everything but the platform backend.
    pub raw: isize,
    pub title: String,
    pub class_name: String,
    /// Owning process id.
    pub pid: u32,
}

/// What to look for when locating the target window.
#[derive(Debug, Clone)]
pub struct WindowQuery {
    /// Case-insensitive substrings matched against window titles.
    pub title_contains: Vec<String>,
    /// Process image name for the PID fallback scan.
    pub process_name: String,
}

/// Finds the target window by title heuristic, falling back to a
/// process-based lookup, and brings it to the foreground.
pub struct WindowLocator {
    backend: Arc<dyn DesktopBackend>,
    supervisor: ProcessSupervisor,
}

impl WindowLocator {
    pub fn new(backend: Arc<dyn DesktopBackend>) -> Self {
        Self {
            backend,
            supervisor: ProcessSupervisor::new(),
        }
    }

    /// Title search over all visible top-level windows first; when nothing
    /// matches, scan processes for the image name and re-enumerate filtering
    /// by owning pid. `Ok(None)` means no window was found either way.
    pub fn locate(&self, query: &WindowQuery) -> Result<Option<WindowHandle>, AutoLoginError> {
        let windows = self.backend.enumerate_windows()?;
        debug!(count = windows.len(), "inspecting top-level windows");

        if let Some(window) = find_by_title(&windows, &query.title_contains) {
            info!(title = %window.title, "found target window by title");
            return Ok(Some(window.clone()));
        }

        warn!(
            process = %query.process_name,
            "no window title matched, falling back to a process scan"
        );
        let pids = self.supervisor.pids_matching(&query.process_name);
        if pids.is_empty() {
            return Ok(None);
        }

        let windows = self.backend.enumerate_windows()?;
        Ok(find_by_pid(&windows, &pids).map(|window| {
            info!(title = %window.title, pid = window.pid, "found target window by process id");
            window.clone()
        }))
    }

    /// Foreground `window`. When the OS denies the request, toggle the
    /// window minimized and restored once, then retry exactly once more.
    /// Denial after the retry is returned to the caller, who may continue
    /// without a guaranteed-focused window.
    pub fn activate(&self, window: &WindowHandle) -> Result<(), AutoLoginError> {
        match self.backend.set_foreground(window) {
            Ok(()) => {
                info!(title = %window.title, "window activated");
                return Ok(());
            }
            Err(e) => {
                warn!(error = %e, "foreground request denied, toggling window state before retrying");
            }
        }

        if let Err(e) = self.backend.minimize(window) {
            warn!(error = %e, "minimize toggle failed");
        }
        if let Err(e) = self.backend.restore(window) {
            warn!(error = %e, "restore toggle failed");
        }

        match self.backend.set_foreground(window) {
            Ok(()) => {
                info!(title = %window.title, "window activated after toggle");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "window activation failed, callers continue without focus");
                Err(e)
            }
        }
    }
}

pub(crate) fn find_by_title<'a>(
    windows: &'a [WindowHandle],
    needles: &[String],
) -> Option<&'a WindowHandle> {
    windows.iter().find(|window| {
        let title = window.title.to_lowercase();
        needles
            .iter()
            .any(|needle| !needle.is_empty() && title.contains(&needle.to_lowercase()))
    })
}

pub(crate) fn find_by_pid<'a>(
    windows: &'a [WindowHandle],
    pids: &[u32],
) -> Option<&'a WindowHandle> {
    pids.iter()
        .find_map(|pid| windows.iter().find(|window| window.pid == *pid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{BackendEvent, MockBackend};

    fn window(raw: isize, title: &str, pid: u32) -> WindowHandle {
        WindowHandle {
            raw,
            title: title.to_string(),
            class_name: "UnityWndClass".to_string(),
            pid,
        }
    }

    fn titles(needles: &[&str]) -> Vec<String> {
        needles.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn title_match_is_case_insensitive_substring() {
        let windows = vec![
            window(1, "Editor - notes.txt", 100),
            window(2, "My Game Launcher", 200),
        ];
        let found = find_by_title(&windows, &titles(&["game launcher"])).unwrap();
        assert_eq!(found.raw, 2);

        assert!(find_by_title(&windows, &titles(&["browser"])).is_none());
        assert!(find_by_title(&windows, &titles(&[""])).is_none());
    }

    #[test]
    fn first_title_match_wins_across_any_needle() {
        let windows = vec![
            window(1, "Genshin Impact", 100),
            window(2, "YuanShen", 200),
        ];
        let found = find_by_title(&windows, &titles(&["yuanshen", "genshin"])).unwrap();
        assert_eq!(found.raw, 1);
    }

    #[test]
    fn pid_fallback_takes_first_window_across_candidate_pids() {
        let windows = vec![
            window(1, "", 100),
            window(2, "", 200),
            window(3, "", 300),
        ];
        let found = find_by_pid(&windows, &[500, 300, 200]).unwrap();
        assert_eq!(found.raw, 3);

        assert!(find_by_pid(&windows, &[9999]).is_none());
    }

    #[test]
    fn activation_retries_once_after_a_minimize_restore_toggle() {
        let backend = Arc::new(MockBackend::default());
        backend.set_windows(vec![window(7, "Target", 42)]);
        backend.deny_foreground_times(1);
        let locator = WindowLocator::new(backend.clone());

        locator.activate(&window(7, "Target", 42)).unwrap();

        assert_eq!(
            backend.events(),
            vec![
                BackendEvent::Foreground(7),
                BackendEvent::Minimize(7),
                BackendEvent::Restore(7),
                BackendEvent::Foreground(7),
            ]
        );
    }

    #[test]
    fn activation_denied_twice_surfaces_the_error() {
        let backend = Arc::new(MockBackend::default());
        backend.deny_foreground_times(2);
        let locator = WindowLocator::new(backend.clone());

        let err = locator.activate(&window(7, "Target", 42)).unwrap_err();
        assert!(matches!(err, AutoLoginError::ActivationDenied(_)));
        // Exactly one toggle and one retry, never more.
        assert_eq!(
            backend.events(),
            vec![
                BackendEvent::Foreground(7),
                BackendEvent::Minimize(7),
                BackendEvent::Restore(7),
                BackendEvent::Foreground(7),
            ]
        );
    }

    #[test]
    fn locate_prefers_title_over_process_fallback() {
        let backend = Arc::new(MockBackend::default());
        backend.set_windows(vec![
            window(1, "Something Else", 10),
            window(2, "Genshin Impact", 20),
        ]);
        let locator = WindowLocator::new(backend.clone());

        let query = WindowQuery {
            title_contains: titles(&["genshin"]),
            process_name: "no-such-process-image-xyz".to_string(),
        };
        let found = locator.locate(&query).unwrap().unwrap();
        assert_eq!(found.raw, 2);
    }

    #[test]
    fn locate_without_title_or_process_match_is_none() {
        let backend = Arc::new(MockBackend::default());
        backend.set_windows(vec![window(1, "Unrelated", 10)]);
        let locator = WindowLocator::new(backend.clone());

        let query = WindowQuery {
            title_contains: titles(&["genshin"]),
            process_name: "no-such-process-image-xyz".to_string(),
        };
        assert!(locator.locate(&query).unwrap().is_none());
    }
}
