use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::error::ConfigError;

pub const API_URL_ENV: &str = "FREIGHTDESK_API_URL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSettings {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Route the navigator is sent to after logout.
    #[serde(default = "default_login_route")]
    pub login_route: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            login_route: default_login_route(),
        }
    }
}

impl ClientSettings {
    /// Reads `path` (defaults when missing) and applies the environment override.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut settings = Self::load_file(path)?;
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                settings.api_base_url = url;
            }
        }
        Ok(settings)
    }

    /// Only what is on disk; used when the file is about to be rewritten.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        let data = std::fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    pub fn endpoint(&self, route: &str) -> String {
        format!(
            "{}/{}",
            self.api_base_url.trim_end_matches('/'),
            route.trim_start_matches('/')
        )
    }
}

fn default_api_base_url() -> String {
    "http://localhost:3333".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_login_route() -> String {
    "/login".to_string()
}
