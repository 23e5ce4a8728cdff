//! Configuration structures and loading logic.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::api::client::DEFAULT_USER_AGENT;
use crate::api::{Credentials, LoginOptions};
use crate::audio::DEFAULT_FFMPEG;
use crate::download::{RetryPolicy, DEFAULT_MAX_RETRIES};
use crate::error::{Error, Result};
use crate::fs::expand_home;
use crate::task::TaskOptions;

/// Config file looked up in the working directory first.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub account: AccountConfig,

    #[serde(default)]
    pub options: OptionsConfig,
}

/// Account credentials configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Username, email or phone number used to log in.
    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Answer to the phone number challenge, when the platform asks for one.
    #[serde(default)]
    pub phone_number: Option<String>,
}

/// Download options configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionsConfig {
    /// Where finished files and task working directories go.
    #[serde(default)]
    pub output_directory: Option<PathBuf>,

    /// Log in through a browser straight away.
    #[serde(default)]
    pub browser_login: bool,

    /// Never fall back to browser login.
    #[serde(default)]
    pub disable_browser_login: bool,

    /// Retries per segment after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff before the first retry; doubles on each further retry.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_browser_timeout_secs")]
    pub browser_timeout_secs: u64,

    /// Chrome binary for browser login; a per-OS default is used when unset.
    #[serde(default)]
    pub chrome_executable: Option<PathBuf>,

    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for OptionsConfig {
    fn default() -> Self {
        Self {
            output_directory: None,
            browser_login: false,
            disable_browser_login: false,
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            browser_timeout_secs: default_browser_timeout_secs(),
            chrome_executable: None,
            ffmpeg_path: None,
            user_agent: default_user_agent(),
        }
    }
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_request_timeout_secs() -> u64 {
    300
}

fn default_browser_timeout_secs() -> u64 {
    120
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Config(format!(
                    "Configuration file not found: {}. Create one from config.example.toml",
                    path.display()
                ))
            } else {
                Error::Io(e)
            }
        })?;

        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// `config.toml` in the working directory, else the one in the user config dir.
    pub fn default_path() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Some(local);
        }

        ProjectDirs::from("", "", "spaces-dl")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
            .filter(|path| path.exists())
    }

    /// Get the effective output directory.
    pub fn output_directory(&self) -> PathBuf {
        self.options
            .output_directory
            .as_deref()
            .map(expand_home)
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }

    pub fn credentials(&self) -> Credentials {
        let credentials = Credentials::new(&self.account.username, &self.account.password);
        match self.account.phone_number.as_deref() {
            Some(phone) if !phone.is_empty() => credentials.with_phone_number(phone),
            _ => credentials,
        }
    }

    /// Options for a download task built from this configuration.
    pub fn task_options(&self) -> TaskOptions {
        let options = &self.options;
        TaskOptions {
            login: LoginOptions {
                browser_login: options.browser_login,
                disable_browser_login: options.disable_browser_login,
                browser_timeout: Duration::from_secs(options.browser_timeout_secs),
                chrome_executable: options.chrome_executable.as_deref().map(expand_home),
            },
            retry: RetryPolicy::new(
                options.max_retries,
                Duration::from_millis(options.retry_delay_ms),
            ),
            request_timeout: Duration::from_secs(options.request_timeout_secs),
            ffmpeg_path: options
                .ffmpeg_path
                .as_deref()
                .map(expand_home)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_FFMPEG)),
            user_agent: options.user_agent.clone(),
        }
    }
}
