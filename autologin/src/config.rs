//! YAML-backed configuration: where the target executable lives, which
//! window titles to look for, and where the submit fallback click lands.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::AutoLoginError;
use crate::types::Point;

fn default_submit_point() -> Point {
    Point::new(960, 500)
}

#[derive(Debug, Serialize, Deserialize)]
struct ConfigFile {
    /// Full path to the target executable. Empty until configured.
    #[serde(default)]
    executable_path: String,
    /// Extra case-insensitive title substrings for window lookup.
    #[serde(default)]
    window_titles: Vec<String>,
    /// Screen coordinate of the submit control when no submit template
    /// asset is shipped.
    #[serde(default = "default_submit_point")]
    submit_point: Point,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            executable_path: String::new(),
            window_titles: Vec::new(),
            submit_point: default_submit_point(),
        }
    }
}

pub struct ConfigStore {
    path: PathBuf,
    expected_executable: String,
    data: ConfigFile,
}

impl ConfigStore {
    /// Loads `path`, writing a default file when none exists.
    /// `expected_executable` is the image name a configured path must end
    /// with.
    pub fn open(
        path: impl Into<PathBuf>,
        expected_executable: &str,
    ) -> Result<Self, AutoLoginError> {
        let path = path.into();
        let data = if path.exists() {
            let yaml = fs::read_to_string(&path).map_err(|e| {
                AutoLoginError::Config(format!("failed to read {}: {e}", path.display()))
            })?;
            serde_yaml::from_str(&yaml).map_err(|e| {
                AutoLoginError::Config(format!("malformed config file {}: {e}", path.display()))
            })?
        } else {
            debug!(path = %path.display(), "no config file, creating defaults");
            ConfigFile::default()
        };

        let store = Self {
            path,
            expected_executable: expected_executable.to_string(),
            data,
        };
        if !store.path.exists() {
            store.save()?;
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` until a path has been configured.
    pub fn executable_path(&self) -> Option<&Path> {
        if self.data.executable_path.is_empty() {
            None
        } else {
            Some(Path::new(&self.data.executable_path))
        }
    }

    pub fn window_titles(&self) -> &[String] {
        &self.data.window_titles
    }

    pub fn submit_point(&self) -> Point {
        self.data.submit_point
    }

    /// Validate and persist the executable path.
    pub fn set_executable_path(&mut self, path: &Path) -> Result<(), AutoLoginError> {
        self.validate_executable_path(path)?;
        self.data.executable_path = path.display().to_string();
        self.save()?;
        info!(path = %path.display(), "executable path configured");
        Ok(())
    }

    /// The path must exist and its file name must match the expected target
    /// image name.
    pub fn validate_executable_path(&self, path: &Path) -> Result<(), AutoLoginError> {
        if !path.exists() {
            return Err(AutoLoginError::Config(format!(
                "executable does not exist: {}",
                path.display()
            )));
        }
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !file_name.eq_ignore_ascii_case(&self.expected_executable) {
            return Err(AutoLoginError::Config(format!(
                "expected a path to {}, got {}",
                self.expected_executable,
                path.display()
            )));
        }
        Ok(())
    }

    fn save(&self) -> Result<(), AutoLoginError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AutoLoginError::Config(format!(
                    "failed to create config directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        let yaml = serde_yaml::to_string(&self.data)
            .map_err(|e| AutoLoginError::Config(format!("failed to encode config: {e}")))?;
        fs::write(&self.path, yaml).map_err(|e| {
            AutoLoginError::Config(format!("failed to write {}: {e}", self.path.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXE: &str = "Game.exe";

    #[test]
    fn open_creates_a_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let store = ConfigStore::open(&path, EXE).unwrap();
        assert!(path.exists());
        assert!(store.executable_path().is_none());
        assert_eq!(store.submit_point(), Point::new(960, 500));
    }

    #[test]
    fn set_path_validates_existence_and_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ConfigStore::open(dir.path().join("config.yaml"), EXE).unwrap();

        let missing = dir.path().join(EXE);
        assert!(matches!(
            store.set_executable_path(&missing).unwrap_err(),
            AutoLoginError::Config(_)
        ));

        let wrong_name = dir.path().join("Other.exe");
        fs::write(&wrong_name, b"").unwrap();
        assert!(matches!(
            store.set_executable_path(&wrong_name).unwrap_err(),
            AutoLoginError::Config(_)
        ));

        let good = dir.path().join(EXE);
        fs::write(&good, b"").unwrap();
        store.set_executable_path(&good).unwrap();
        assert_eq!(store.executable_path(), Some(good.as_path()));
    }

    #[test]
    fn file_name_match_ignores_ascii_case() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ConfigStore::open(dir.path().join("config.yaml"), EXE).unwrap();
        let lower = dir.path().join("game.exe");
        fs::write(&lower, b"").unwrap();
        store.set_executable_path(&lower).unwrap();
    }

    #[test]
    fn configuration_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        let exe = dir.path().join(EXE);
        fs::write(&exe, b"").unwrap();

        {
            let mut store = ConfigStore::open(&config_path, EXE).unwrap();
            store.set_executable_path(&exe).unwrap();
        }

        let store = ConfigStore::open(&config_path, EXE).unwrap();
        assert_eq!(store.executable_path(), Some(exe.as_path()));
    }

    #[test]
    fn malformed_config_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "executable_path: [not a string").unwrap();
        assert!(matches!(
            ConfigStore::open(&path, EXE).unwrap_err(),
            AutoLoginError::Config(_)
        ));
    }
}
