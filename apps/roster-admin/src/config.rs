use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

const CONFIG_PATHS: [&str; 2] = ["/etc/roster/admin.toml", "./admin.toml"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Unset means requests wait for as long as the backend takes.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
}

fn default_api_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_listen_port() -> u16 {
    8080
}

fn default_export_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            auth_token: None,
            listen_port: default_listen_port(),
            request_timeout_secs: None,
            export_dir: default_export_dir(),
        }
    }
}

impl AdminConfig {
    pub fn load() -> Result<Self, ConfigError> {
        for path in CONFIG_PATHS {
            if let Ok(contents) = fs::read_to_string(path) {
                tracing::info!("Loading config from {}", path);
                return Self::from_toml_str(&contents).map_err(|e| match e {
                    ConfigError::Toml { source, .. } => ConfigError::Toml {
                        path: path.to_string(),
                        source,
                    },
                    other => other,
                });
            }
        }

        tracing::info!("Loading config from environment");
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents).map_err(|source| ConfigError::Toml {
            path: "<inline>".to_string(),
            source,
        })?;
        Ok(config.normalized())
    }

    /// Builds the config from `ROSTER_*` variables resolved through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("ROSTER_API_URL") {
            config.api_url = url;
        }
        config.auth_token = lookup("ROSTER_AUTH_TOKEN").filter(|t| !t.trim().is_empty());
        if let Some(port) = lookup("ROSTER_LISTEN_PORT") {
            config.listen_port = parse_var("ROSTER_LISTEN_PORT", &port)?;
        }
        if let Some(secs) = lookup("ROSTER_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = Some(parse_var("ROSTER_REQUEST_TIMEOUT_SECS", &secs)?);
        }
        if let Some(dir) = lookup("ROSTER_EXPORT_DIR") {
            config.export_dir = PathBuf::from(dir);
        }

        Ok(config.normalized())
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = normalize_url(&api_url.into());
        self
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    fn normalized(mut self) -> Self {
        self.api_url = normalize_url(&self.api_url);
        self.auth_token = self
            .auth_token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        self
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn normalize_url(raw: &str) -> String {
    let mut url = raw.trim().to_string();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        url = format!("http://{}", url);
    }
    while url.ends_with('/') {
        url.pop();
    }
    url
}
