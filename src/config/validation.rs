//! Configuration validation logic.

use std::sync::OnceLock;

use regex::Regex;

use crate::config::loader::Config;
use crate::error::{Error, Result};

/// Values that show up when a config was copied without being filled in.
const PLACEHOLDERS: [&str; 4] = ["replaceme", "your_username", "your_password", "changeme"];

/// Validate the entire configuration.
pub fn validate_config(config: &Config) -> Result<()> {
    let options = &config.options;

    if options.browser_login && options.disable_browser_login {
        return Err(Error::ConfigValidation {
            field: "browser_login".to_string(),
            message: "browser_login and disable_browser_login cannot both be set".to_string(),
        });
    }

    // Browser login leaves the form to the user when credentials are missing.
    if !options.browser_login {
        validate_credential("username", &config.account.username)?;
        validate_credential("password", &config.account.password)?;
    }

    if options.request_timeout_secs == 0 {
        return Err(Error::ConfigValidation {
            field: "request_timeout_secs".to_string(),
            message: "Request timeout must be greater than zero".to_string(),
        });
    }

    if options.browser_timeout_secs == 0 {
        return Err(Error::ConfigValidation {
            field: "browser_timeout_secs".to_string(),
            message: "Browser login timeout must be greater than zero".to_string(),
        });
    }

    if options.user_agent.trim().is_empty() {
        return Err(Error::MissingConfig("user_agent".to_string()));
    }

    Ok(())
}

/// Validate one account credential.
pub fn validate_credential(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::MissingConfig(format!("account.{}", field)));
    }

    let lower = value.to_lowercase();
    if PLACEHOLDERS.iter().any(|p| lower.contains(p)) {
        return Err(Error::ConfigValidation {
            field: format!("account.{}", field),
            message: format!(
                "The {} appears to be a placeholder. Please provide your actual account details.",
                field
            ),
        });
    }

    Ok(())
}

/// Extract a space ID from a space URL or a bare ID.
pub fn parse_space_id(input: &str) -> Result<String> {
    static SPACE_URL: OnceLock<Regex> = OnceLock::new();
    static SPACE_ID: OnceLock<Regex> = OnceLock::new();

    let input = input.trim();

    // If it's a URL, extract the space ID
    if input.starts_with("http://") || input.starts_with("https://") {
        // Pattern: https://x.com/i/spaces/1YqKDqDXAbwKV
        let url_pattern = SPACE_URL.get_or_init(|| {
            Regex::new(r"/i/spaces/([A-Za-z0-9]+)").expect("space URL pattern is valid")
        });

        if let Some(id) = url_pattern.captures(input).and_then(|c| c.get(1)) {
            return Ok(id.as_str().to_string());
        }

        return Err(Error::ConfigValidation {
            field: "space_id".to_string(),
            message: format!("Could not extract space ID from URL: {}", input),
        });
    }

    let id_pattern = SPACE_ID
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9]{8,20}$").expect("space ID pattern is valid"));
    if id_pattern.is_match(input) {
        return Ok(input.to_string());
    }

    Err(Error::ConfigValidation {
        field: "space_id".to_string(),
        message: format!(
            "Invalid space ID: '{}'. Must be an alphanumeric ID or a space URL.",
            input
        ),
    })
}
