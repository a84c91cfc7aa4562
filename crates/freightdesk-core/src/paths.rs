use directories::ProjectDirs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub const APP_QUALIFIER: &str = "com";
pub const APP_ORG: &str = "freightdesk";
pub const APP_NAME: &str = "freightdesk";

pub const SETTINGS_FILE: &str = "settings.json";
pub const SESSION_FILE: &str = "session.json";

pub fn data_dir() -> Result<PathBuf, ConfigError> {
    if let Ok(override_path) = std::env::var("FREIGHTDESK_DATA_DIR") {
        return Ok(PathBuf::from(override_path));
    }
    let dirs = ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME).ok_or(ConfigError::NoDataDir)?;
    Ok(dirs.data_dir().to_path_buf())
}

pub fn settings_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SETTINGS_FILE)
}

pub fn session_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SESSION_FILE)
}
