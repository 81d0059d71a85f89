use adw::Application;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::models::Party;
use crate::api::{ApiResult, ClientConfig};

const SETTINGS_FILE: &str = "crowdship-admin.toml";
const SERVER_URL_ENV: &str = "CROWDSHIP_API_URL";

#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    #[error("No config dir")]
    NoConfigDir,
    #[error("Failed to write settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to encode settings: {0}")]
    Encode(#[from] toml::ser::Error),
}

/// Persisted sign-in: where the API lives, the bearer token and who we are.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppState {
    pub base_url: String,
    pub token: Option<String>,
    pub admin: Option<Party>,
}

impl AppState {
    fn settings_path() -> Option<PathBuf> {
        let base = BaseDirs::new()?;
        Some(base.config_dir().join(SETTINGS_FILE))
    }

    /// Missing or unreadable settings fall back to a signed-out default.
    pub fn load() -> Self {
        Self::settings_path()
            .map(|p| Self::load_from(&p))
            .unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(text) => toml::from_str(&text).unwrap_or_else(|e| {
                log::warn!("Ignoring unreadable settings at {}: {e}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        let path = Self::settings_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn is_signed_in(&self) -> bool {
        !self.base_url.is_empty()
            && self.token.as_deref().is_some_and(|t| !t.is_empty())
            && self.admin.is_some()
    }

    pub fn sign_out(&mut self) {
        self.token = None;
        self.admin = None;
    }

    pub fn client_config(&self) -> ApiResult<ClientConfig> {
        ClientConfig::new(&self.base_url, self.token.clone())
    }

    /// Server URL to pre-fill on the login form.
    pub fn default_server_url(&self) -> String {
        match std::env::var(SERVER_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => url,
            _ => self.base_url.clone(),
        }
    }
}

pub fn build_ui(app: &Application) {
    let state = AppState::load();
    if state.is_signed_in() {
        crate::ui::main_window::show_main_window(app);
    } else {
        crate::ui::login::show_login_window(app);
    }
}
