use anyhow::Result;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "pm-setup";
const CONFIG_FILE: &str = "pm-setup.toml";
pub const CONFIG_ENV: &str = "PM_SETUP_CONFIG";

/// Resolve the executable's folder, or the working directory when that is unknown.
pub fn resolve_deployment_folder() -> PathBuf {
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(dir) = exe_path.parent() {
            return dir.to_path_buf();
        }
    }

    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Resolve the data folder (records, master key, logs).
///
/// `override_dir` (from configuration) wins; otherwise `<user data dir>/pm-setup`, falling
/// back to `<exe folder>/pm-setup-data` on systems without a data dir.
pub fn resolve_data_folder(override_dir: Option<&Path>) -> PathBuf {
    if let Some(dir) = override_dir {
        return dir.to_path_buf();
    }
    match dirs::data_dir() {
        Some(base) => base.join(APP_DIR),
        None => resolve_deployment_folder().join("pm-setup-data"),
    }
}

/// Resolve log folder (absolute path), creating it.
pub fn resolve_log_folder(data_folder: &Path) -> Result<PathBuf> {
    let log_dir = data_folder.join("logs");
    std::fs::create_dir_all(&log_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create log folder {:?}: {}", log_dir, e))?;
    Ok(log_dir)
}

/// Folder holding the persisted key-value records.
pub fn resolve_records_folder(data_folder: &Path) -> PathBuf {
    data_folder.join("records")
}

/// Configuration file location: `$PM_SETUP_CONFIG`, else `<user config dir>/pm-setup/pm-setup.toml`.
pub fn resolve_config_file() -> Option<PathBuf> {
    if let Some(explicit) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(explicit));
    }
    dirs::config_dir().map(|base| base.join(APP_DIR).join(CONFIG_FILE))
}
