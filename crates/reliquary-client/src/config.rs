use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Client settings, read from the environment (and `.env`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the record service.
    pub api_url: String,
    /// Where the session is persisted between runs.
    pub session_path: PathBuf,
    pub fetch_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:3000".into(),
            session_path: PathBuf::from("reliquary-session.json"),
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; unset variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = lookup("RELIQUARY_API_URL") {
            config.api_url = url;
        }
        if let Some(path) = lookup("RELIQUARY_SESSION_PATH") {
            config.session_path = PathBuf::from(path);
        }
        if let Some(raw) = lookup("RELIQUARY_FETCH_TIMEOUT_SECS") {
            let secs: u64 = raw
                .trim()
                .parse()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::Invalid {
                    name: "RELIQUARY_FETCH_TIMEOUT_SECS",
                    expected: "a positive number of seconds",
                    value: raw.clone(),
                })?;
            config.fetch_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}
