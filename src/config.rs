// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Client configuration
//!
//! Loaded once by the caller and passed explicitly to the authenticator and
//! the client; library code never reads the environment itself.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::{ExchangeStrategy, ExtractorPatterns};
use crate::constants::{defaults, env_vars, urls};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GarminConfig {
    /// REST and OAuth service base URL
    pub connect_api_url: String,
    /// Single sign-on base URL
    pub sso_url: String,
    pub session_path: PathBuf,
    /// Assumed bearer token validity; the provider does not report it
    pub token_lifetime_hours: i64,
    pub request_timeout_secs: u64,
    /// Log raw SSO response bodies at debug level
    pub debug_logging: bool,
    pub user_agent: String,
    /// OAuth1 consumer credentials used to sign token requests
    pub consumer_key: String,
    pub consumer_secret: String,
    pub exchange_strategy: ExchangeStrategy,
    /// Overrides for SSO response scraping
    pub extractor_patterns: ExtractorPatterns,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Default for GarminConfig {
    fn default() -> Self {
        Self {
            connect_api_url: urls::CONNECT_API_URL.to_string(),
            sso_url: urls::SSO_URL.to_string(),
            session_path: default_session_path(),
            token_lifetime_hours: defaults::TOKEN_LIFETIME_HOURS,
            request_timeout_secs: defaults::REQUEST_TIMEOUT_SECS,
            debug_logging: false,
            user_agent: defaults::USER_AGENT.to_string(),
            consumer_key: String::new(),
            consumer_secret: String::new(),
            exchange_strategy: ExchangeStrategy::default(),
            extractor_patterns: ExtractorPatterns::default(),
            username: None,
            password: None,
        }
    }
}

/// `~/.garmin/session.json`, or relative to the working directory when there
/// is no home directory
pub fn default_session_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(defaults::SESSION_FILE))
        .unwrap_or_else(|| PathBuf::from(defaults::SESSION_FILE))
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join(defaults::CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

impl GarminConfig {
    /// Read the TOML file at `path` (or the default location) if it exists,
    /// otherwise build the configuration from `.env` and the process
    /// environment
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = path.unwrap_or_else(default_config_path);

        if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file {}", config_path.display()))?;
            let config: Self = toml::from_str(&content).context("Failed to parse config file")?;
            config.validate()?;
            Ok(config)
        } else {
            dotenv::dotenv().ok();
            Self::from_env()
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for the `GARMIN_*`
    /// variables
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup(env_vars::API_URL) {
            config.connect_api_url = url;
        }
        if let Some(url) = lookup(env_vars::SSO_URL) {
            config.sso_url = url;
        }
        if let Some(path) = lookup(env_vars::SESSION_PATH) {
            config.session_path = PathBuf::from(path);
        }
        if let Some(hours) = lookup(env_vars::TOKEN_LIFETIME_HOURS) {
            config.token_lifetime_hours = hours.trim().parse().with_context(|| {
                format!("{} must be a whole number of hours", env_vars::TOKEN_LIFETIME_HOURS)
            })?;
        }
        if let Some(flag) = lookup(env_vars::DEBUG_AUTH) {
            config.debug_logging = matches!(flag.trim(), "1" | "true" | "TRUE" | "yes");
        }
        if let Some(key) = lookup(env_vars::CONSUMER_KEY) {
            config.consumer_key = key;
        }
        if let Some(secret) = lookup(env_vars::CONSUMER_SECRET) {
            config.consumer_secret = secret;
        }
        config.username = lookup(env_vars::USERNAME).filter(|u| !u.is_empty());
        config.password = lookup(env_vars::PASSWORD).filter(|p| !p.is_empty());

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.connect_api_url)
            .with_context(|| format!("Invalid connect_api_url: {}", self.connect_api_url))?;
        url::Url::parse(&self.sso_url)
            .with_context(|| format!("Invalid sso_url: {}", self.sso_url))?;
        if !(1..=defaults::MAX_TOKEN_LIFETIME_HOURS).contains(&self.token_lifetime_hours) {
            bail!(
                "token_lifetime_hours must be between 1 and {}",
                defaults::MAX_TOKEN_LIFETIME_HOURS
            );
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be positive");
        }
        Ok(())
    }

    /// Write the configuration as TOML, creating parent directories
    pub fn save(&self, path: Option<PathBuf>) -> Result<()> {
        let config_path = path.unwrap_or_else(default_config_path);

        let parent = config_path.parent().context("Invalid config path")?;
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Saturates at `TimeDelta::MAX` for unvalidated configurations; computing
    /// an expiry from that fails with `InvalidInput`
    pub fn token_lifetime(&self) -> chrono::TimeDelta {
        chrono::TimeDelta::try_hours(self.token_lifetime_hours).unwrap_or(chrono::TimeDelta::MAX)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn session_path(&self) -> &Path {
        &self.session_path
    }

    /// Configuration pointing both base URLs at one server, for tests against
    /// a local mock
    pub fn for_base_url(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        Self {
            connect_api_url: base.clone(),
            sso_url: base,
            consumer_key: "test_consumer_key".to_string(),
            consumer_secret: "test_consumer_secret".to_string(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    /// Helper function to create a temporary config file
    fn create_temp_config_file(content: &str) -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, content).expect("Failed to write temp config");
        (temp_dir, config_path)
    }

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = GarminConfig::default();
        assert_eq!(config.connect_api_url, urls::CONNECT_API_URL);
        assert_eq!(config.sso_url, urls::SSO_URL);
        assert_eq!(config.token_lifetime_hours, 8);
        assert_eq!(config.exchange_strategy, ExchangeStrategy::RequestToken);
        assert!(config.session_path.ends_with(".garmin/session.json"));
        assert!(!config.debug_logging);
    }

    #[test]
    fn test_config_load_from_file() {
        let config_content = r#"
connect_api_url = "https://api.example.com"
sso_url = "https://sso.example.com"
session_path = "/tmp/garmin-session.json"
token_lifetime_hours = 4
debug_logging = true
consumer_key = "file_key"
consumer_secret = "file_secret"
exchange_strategy = "direct_ticket"

[extractor_patterns]
ticket = 'embed\?ticket=([^"]+)"'
"#;

        let (_temp_dir, config_path) = create_temp_config_file(config_content);
        let config = GarminConfig::load(Some(config_path)).expect("Failed to load config");

        assert_eq!(config.connect_api_url, "https://api.example.com");
        assert_eq!(config.session_path, PathBuf::from("/tmp/garmin-session.json"));
        assert_eq!(config.token_lifetime_hours, 4);
        assert!(config.debug_logging);
        assert_eq!(config.consumer_key, "file_key");
        assert_eq!(config.exchange_strategy, ExchangeStrategy::DirectTicket);
        assert!(config.extractor_patterns.ticket.is_some());
        // Unset fields fall back to defaults
        assert_eq!(config.request_timeout_secs, defaults::REQUEST_TIMEOUT_SECS);
        assert!(config.username.is_none());
    }

    #[test]
    fn test_config_from_lookup() {
        let config = GarminConfig::from_lookup(lookup_from(&[
            (env_vars::USERNAME, "athlete@example.com"),
            (env_vars::PASSWORD, "hunter2"),
            (env_vars::SESSION_PATH, "/var/lib/garmin/session.json"),
            (env_vars::DEBUG_AUTH, "true"),
            (env_vars::TOKEN_LIFETIME_HOURS, "12"),
            (env_vars::CONSUMER_KEY, "env_key"),
        ]))
        .expect("Failed to build config");

        assert_eq!(config.username.as_deref(), Some("athlete@example.com"));
        assert_eq!(config.password.as_deref(), Some("hunter2"));
        assert_eq!(
            config.session_path,
            PathBuf::from("/var/lib/garmin/session.json")
        );
        assert!(config.debug_logging);
        assert_eq!(config.token_lifetime(), chrono::Duration::hours(12));
        assert_eq!(config.consumer_key, "env_key");
        assert_eq!(config.sso_url, urls::SSO_URL);
    }

    #[test]
    fn test_config_from_lookup_rejects_bad_lifetime() {
        let result =
            GarminConfig::from_lookup(lookup_from(&[(env_vars::TOKEN_LIFETIME_HOURS, "soon")]));
        assert!(result.is_err());

        let result =
            GarminConfig::from_lookup(lookup_from(&[(env_vars::TOKEN_LIFETIME_HOURS, "0")]));
        assert!(result.is_err());

        let result = GarminConfig::from_lookup(lookup_from(&[(
            env_vars::TOKEN_LIFETIME_HOURS,
            "100000000000",
        )]));
        assert!(result.is_err());

        let result = GarminConfig::from_lookup(lookup_from(&[(
            env_vars::TOKEN_LIFETIME_HOURS,
            &defaults::MAX_TOKEN_LIFETIME_HOURS.to_string(),
        )]));
        assert!(result.is_ok());
    }

    #[test]
    fn test_unvalidated_huge_lifetime_does_not_panic() {
        let config = GarminConfig {
            token_lifetime_hours: i64::MAX,
            ..GarminConfig::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(config.token_lifetime(), chrono::TimeDelta::MAX);
    }

    #[test]
    fn test_config_empty_credentials_are_absent() {
        let config = GarminConfig::from_lookup(lookup_from(&[(env_vars::USERNAME, "")])).unwrap();
        assert!(config.username.is_none());
    }

    #[test]
    fn test_config_save_creates_directory() {
        let config = GarminConfig {
            consumer_key: "saved_key".to_string(),
            ..GarminConfig::default()
        };
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let nested_path = temp_dir.path().join("nested").join("directory").join("config.toml");

        config
            .save(Some(nested_path.clone()))
            .expect("Failed to save config with nested path");
        assert!(nested_path.exists());

        let loaded = GarminConfig::load(Some(nested_path)).expect("Failed to load saved config");
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let (_temp_dir, config_path) = create_temp_config_file("this is not valid toml [[[");

        let result = GarminConfig::load(Some(config_path));
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Failed to parse config file"));
    }

    #[test]
    fn test_config_load_invalid_url() {
        let (_temp_dir, config_path) = create_temp_config_file(r#"sso_url = "not a url""#);
        assert!(GarminConfig::load(Some(config_path)).is_err());
    }

    #[test]
    fn test_for_base_url() {
        let config = GarminConfig::for_base_url("http://127.0.0.1:1234/");
        assert_eq!(config.connect_api_url, "http://127.0.0.1:1234");
        assert_eq!(config.sso_url, "http://127.0.0.1:1234");
        assert!(!config.consumer_key.is_empty());
    }
}
