//! Platform locations for the settings document and the log file.

use anyhow::{anyhow, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

const APP_NAME: &str = "TubeShell";
const BIN_NAME: &str = "tubeshell";

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME)
        .ok_or_else(|| anyhow!("Failed to determine user config directory"))
}

/// `<config dir>/settings.json`, e.g. `~/.config/tubeshell/settings.json` on
/// Linux.
pub fn default_settings_file() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("settings.json"))
}

/// Default value of the `logFile` setting. Falls back to `./logs` when the
/// platform has no home directory.
pub fn default_log_file() -> PathBuf {
    let dir = project_dirs()
        .map(|dirs| dirs.data_local_dir().join("logs"))
        .unwrap_or_else(|_| PathBuf::from("logs"));
    dir.join(format!("{BIN_NAME}.log"))
}
