//! Process supervision: checking whether the target is running and
//! launching it.

use std::path::Path;
use std::process::Command;

use sysinfo::System;
use tracing::{debug, info};

use crate::errors::AutoLoginError;

pub struct ProcessSupervisor;

impl ProcessSupervisor {
    pub fn new() -> Self {
        Self
    }

    /// True when a process whose image name contains `image_name` is
    /// running.
    pub fn is_running(&self, image_name: &str) -> bool {
        !self.pids_matching(image_name).is_empty()
    }

    /// Pids of processes whose image name contains `image_name`,
    /// case-insensitively.
    pub fn pids_matching(&self, image_name: &str) -> Vec<u32> {
        let system = System::new_all();
        let needle = image_name.to_lowercase();
        let pids: Vec<u32> = system
            .processes()
            .iter()
            .filter(|(_, process)| {
                process
                    .name()
                    .to_string_lossy()
                    .to_lowercase()
                    .contains(&needle)
            })
            .map(|(pid, _)| pid.as_u32())
            .collect();
        debug!(image = %image_name, matches = pids.len(), "scanned process list");
        pids
    }

    /// Spawn the executable with its own directory as working directory.
    /// The child runs detached; only its pid is kept.
    pub fn launch(&self, path: &Path) -> Result<u32, AutoLoginError> {
        if !path.exists() {
            return Err(AutoLoginError::Launch(format!(
                "executable does not exist: {}",
                path.display()
            )));
        }

        let mut command = Command::new(path);
        if let Some(dir) = path.parent() {
            command.current_dir(dir);
        }
        let child = command
            .spawn()
            .map_err(|e| AutoLoginError::Launch(format!("failed to spawn {}: {e}", path.display())))?;

        let pid = child.id();
        info!(pid, path = %path.display(), "launched target executable");
        Ok(pid)
    }
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new()
    }
}
