use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "dashboard.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },
}

/// Service configuration, read from TOML with environment overrides
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    /// Address the dashboard service listens on
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// Upstream HR analytics API, without the `/api/v1` prefix
    #[serde(default = "default_api_url")]
    pub api_base_url: String,

    /// Fixed timeout for every upstream request
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Browser origin allowed by CORS
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,

    /// tracing filter used when RUST_LOG is not set
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Sessions with no writes for this long are dropped
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_api_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_frontend_url() -> String {
    "http://localhost:5173".to_string()
}

fn default_log_filter() -> String {
    "hr_dashboard_api=info,tower_http=info".to_string()
}

fn default_session_idle_secs() -> u64 {
    3600
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            api_base_url: default_api_url(),
            request_timeout_secs: default_timeout_secs(),
            frontend_url: default_frontend_url(),
            log_filter: default_log_filter(),
            session_idle_secs: default_session_idle_secs(),
        }
    }
}

impl DashboardConfig {
    /// Loads `path` if it exists, falling back to defaults, then applies
    /// environment overrides
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;
            Self::from_toml(&contents).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Overrides fields from `HR_DASHBOARD_*` variables
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(value) = var("HR_DASHBOARD_BIND") {
            self.bind = value.parse().map_err(|_| ConfigError::InvalidEnv {
                key: "HR_DASHBOARD_BIND",
                value: value.clone(),
            })?;
        }
        if let Some(value) = var("HR_DASHBOARD_API_URL") {
            self.api_base_url = value;
        }
        if let Some(value) = var("HR_DASHBOARD_TIMEOUT_SECS") {
            self.request_timeout_secs = value.parse().map_err(|_| ConfigError::InvalidEnv {
                key: "HR_DASHBOARD_TIMEOUT_SECS",
                value: value.clone(),
            })?;
        }
        if let Some(value) = var("HR_DASHBOARD_FRONTEND_URL") {
            self.frontend_url = value;
        }
        if let Some(value) = var("HR_DASHBOARD_SESSION_IDLE_SECS") {
            self.session_idle_secs = value.parse().map_err(|_| ConfigError::InvalidEnv {
                key: "HR_DASHBOARD_SESSION_IDLE_SECS",
                value: value.clone(),
            })?;
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_when_file_missing() {
        let config = DashboardConfig::load(Path::new("/nonexistent/dashboard.toml")).unwrap();
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.session_idle(), Duration::from_secs(3600));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "api_base_url = \"http://analytics:8000\"").unwrap();
        writeln!(temp_file, "request_timeout_secs = 10").unwrap();

        let config = DashboardConfig::load(temp_file.path()).unwrap();
        assert_eq!(config.api_base_url, "http://analytics:8000");
        assert_eq!(config.request_timeout_secs, 10);
        assert_eq!(config.frontend_url, "http://localhost:5173");
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "request_timeout_secs = \"soon\"").unwrap();

        let err = DashboardConfig::load(temp_file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("HR_DASHBOARD_BIND", "0.0.0.0:9000"),
            ("HR_DASHBOARD_API_URL", "http://backend:8000"),
            ("HR_DASHBOARD_SESSION_IDLE_SECS", "600"),
        ]);
        let mut config = DashboardConfig::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.bind, "0.0.0.0:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.api_base_url, "http://backend:8000");
        assert_eq!(config.session_idle_secs, 600);
    }

    #[test]
    fn test_invalid_env_value_rejected() {
        let mut config = DashboardConfig::default();
        let err = config
            .apply_env(|key| (key == "HR_DASHBOARD_TIMEOUT_SECS").then(|| "thirty".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { key: "HR_DASHBOARD_TIMEOUT_SECS", .. }));
    }
}
