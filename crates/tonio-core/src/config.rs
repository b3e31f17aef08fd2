//! Configuration for applications embedding the client.
//!
//! The client itself never reads configuration; the embedding application
//! loads a [`Config`] and passes the relevant parts in at construction.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default captioning service URL.
pub const DEFAULT_SERVICE_URL: &str = "https://services.tonio.com/api/v1/";

/// Default identity toolkit endpoint for password sign-in.
pub const DEFAULT_AUTH_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// Default secure token endpoint for id token refresh.
pub const DEFAULT_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1";

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "error";

/// Identity provider project settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Web API key of the identity project.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

fn default_auth_url() -> String {
    DEFAULT_AUTH_URL.to_string()
}

fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.to_string()
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            auth_url: default_auth_url(),
            token_url: default_token_url(),
            project_id: None,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Captioning service base URL.
    #[serde(default = "default_service_url")]
    pub service_url: Option<String>,
    /// Account email used for sign-in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Account password used for sign-in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub identity: IdentityConfig,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_service_url() -> Option<String> {
    Some(DEFAULT_SERVICE_URL.to_string())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            service_url: default_service_url(),
            email: None,
            password: None,
            identity: IdentityConfig::default(),
        }
    }
}

impl Config {
    /// Load `<base>/config.json` if present, then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.apply_env(|name| std::env::var(name).ok());

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|source| CoreError::MalformedConfig {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save configuration to `<base>/config.json`.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override fields from `TONIO_*` variables resolved through `lookup`.
    /// Blank values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(url) = var("TONIO_URL") {
            self.service_url = Some(url);
        }
        if let Some(email) = var("TONIO_EMAIL") {
            self.email = Some(email);
        }
        if let Some(password) = var("TONIO_PASSWORD") {
            self.password = Some(password);
        }
        if let Some(api_key) = var("TONIO_API_KEY") {
            self.identity.api_key = api_key;
        }
        if let Some(level) = var("TONIO_LOG_LEVEL") {
            self.log_level = level;
        }
    }

    /// The service URL, parsed. Fails when it is missing or malformed.
    pub fn service_url(&self) -> CoreResult<Url> {
        let raw = self
            .service_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| CoreError::MissingSetting("service_url"))?;
        Url::parse(raw).map_err(CoreError::from)
    }

    /// Email and password, when both are configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.email.as_deref(), self.password.as_deref()) {
            (Some(email), Some(password)) => Some((email, password)),
            _ => None,
        }
    }
}
