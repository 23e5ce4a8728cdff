//! Browser-driven login fallback.
//!
//! Launches a visible Chrome, fills in the login form and reads the session
//! cookies straight from the browser once they appear. Without credentials the
//! form is left to the user. Every wait polls until it succeeds; the caller's
//! timeout is the only bound.

use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::Page;
use futures::StreamExt;

use crate::api::auth::LoginOptions;
use crate::api::client::{find_cookie, Cookies};
use crate::api::endpoints::LOGIN_PAGE_URL;
use crate::api::session::{Credentials, AUTH_TOKEN_COOKIE, CSRF_COOKIE};
use crate::error::{Error, Result};

/// Cookies that must be present after a browser login.
const REQUIRED_COOKIES: [&str; 3] = [AUTH_TOKEN_COOKIE, CSRF_COOKIE, "twid"];

/// Pause between checks of the page while waiting for it to change.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

const USERNAME_INPUT: &str = r#"input[name="text"]"#;
const PASSWORD_INPUT: &str = r#"input[name="password"]"#;

/// Log in through a real browser and return the session cookies.
pub async fn browser_login(credentials: &Credentials, options: &LoginOptions) -> Result<Cookies> {
    tracing::info!(
        "Attempting to login with browser. Enter in your login details when browser launches"
    );

    let executable = options
        .chrome_executable
        .clone()
        .or_else(default_chrome_executable)
        .ok_or_else(|| Error::Browser("Chrome not installed on your machine".into()))?;

    let config = BrowserConfig::builder()
        .with_head()
        .chrome_executable(executable)
        .no_sandbox()
        .arg("--disable-infobars")
        .arg("--disable-setuid-sandbox")
        .build()
        .map_err(Error::Browser)?;

    let (mut browser, mut handler) = Browser::launch(config)
        .await
        .map_err(|e| Error::Browser(format!("Failed to launch browser: {}", e)))?;

    let handler_task = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if event.is_err() {
                break;
            }
        }
    });

    let timeout = options.browser_timeout;
    let result = match tokio::time::timeout(timeout, drive_login(&browser, credentials)).await {
        Ok(result) => result,
        Err(_) => Err(Error::LoginTimeout(timeout.as_secs())),
    };

    if let Err(e) = browser.close().await {
        tracing::warn!("Failed to close browser: {}", e);
    }
    let _ = browser.wait().await;
    handler_task.abort();

    if let Err(ref e) = result {
        tracing::error!("Error during browser login: {}", e);
    }
    result
}

/// Screen shown after the username has been submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NextScreen {
    Password,
    PhoneChallenge,
}

async fn drive_login(browser: &Browser, credentials: &Credentials) -> Result<Cookies> {
    tracing::info!("Navigating to login page...");
    let page = browser.new_page(LOGIN_PAGE_URL).await.map_err(browser_err)?;

    if needs_manual_entry(credentials) {
        tracing::info!("No credentials configured. Log in using the browser window");
        return wait_for_session(&page).await;
    }

    tracing::info!("Filling out username...");
    fill(&page, USERNAME_INPUT, &credentials.username).await?;
    click_button(&page, "Next").await?;

    if wait_for_next_screen(&page).await? == NextScreen::PhoneChallenge {
        tracing::info!("Phone number verification detected...");
        let Some(phone) = credentials.phone_number.as_deref() else {
            tracing::info!("No phone number configured. Finish the login in the browser window");
            return wait_for_session(&page).await;
        };
        fill(&page, USERNAME_INPUT, phone).await?;
        click_button(&page, "Next").await?;
    }

    tracing::info!("Filling out password...");
    fill(&page, PASSWORD_INPUT, &credentials.password).await?;
    click_button(&page, "Log in").await?;

    tracing::info!("Waiting for login to complete...");
    wait_for_session(&page).await
}

/// The form cannot be filled in automatically without a username and password.
fn needs_manual_entry(credentials: &Credentials) -> bool {
    credentials.username.trim().is_empty() || credentials.password.trim().is_empty()
}

/// First required cookie absent from `cookies`.
fn missing_cookie(cookies: &[(String, String)]) -> Option<&'static str> {
    REQUIRED_COOKIES
        .into_iter()
        .find(|name| find_cookie(cookies, name).is_none())
}

/// Poll the browser cookie jar until the session cookies are set.
async fn wait_for_session(page: &Page) -> Result<Cookies> {
    loop {
        match page.get_cookies().await {
            Ok(jar) => {
                let cookies: Cookies = jar.into_iter().map(|c| (c.name, c.value)).collect();
                match missing_cookie(&cookies) {
                    None => {
                        tracing::info!("Login process completed. Extracting cookies...");
                        return Ok(cookies);
                    }
                    Some(name) => tracing::trace!("Waiting for cookie {}", name),
                }
            }
            Err(e) => tracing::debug!("Reading browser cookies failed: {}", e),
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Wait until either the password field or the phone challenge is shown.
async fn wait_for_next_screen(page: &Page) -> Result<NextScreen> {
    loop {
        if page.find_element(PASSWORD_INPUT).await.is_ok() {
            return Ok(NextScreen::Password);
        }
        if page_mentions(page, "phone number").await? {
            return Ok(NextScreen::PhoneChallenge);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

async fn wait_for_element(page: &Page, selector: &str) -> Element {
    loop {
        match page.find_element(selector).await {
            Ok(element) => return element,
            Err(e) => tracing::trace!("Waiting for {}: {}", selector, e),
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

async fn fill(page: &Page, selector: &str, text: &str) -> Result<()> {
    wait_for_element(page, selector)
        .await
        .click()
        .await
        .map_err(browser_err)?
        .type_str(text)
        .await
        .map_err(browser_err)?;
    Ok(())
}

async fn click_button(page: &Page, label: &str) -> Result<()> {
    let script = format!(
        r#"(() => {{
            const target = Array.from(document.querySelectorAll('[role="button"], button'))
                .find(el => el.textContent.trim() === {label});
            if (target) {{ target.click(); return true; }}
            return false;
        }})()"#,
        label = serde_json::to_string(label)?
    );

    while !evaluate_bool(page, &script).await? {
        tracing::trace!("Waiting for button '{}'", label);
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    Ok(())
}

async fn page_mentions(page: &Page, needle: &str) -> Result<bool> {
    let script = format!(
        "(document.body.textContent || '').toLowerCase().includes({})",
        serde_json::to_string(needle)?
    );
    evaluate_bool(page, &script).await
}

async fn evaluate_bool(page: &Page, script: &str) -> Result<bool> {
    page.evaluate(script.to_string())
        .await
        .map_err(browser_err)?
        .into_value()
        .map_err(|e| Error::Browser(format!("Unexpected script result: {}", e)))
}

fn browser_err(err: chromiumoxide::error::CdpError) -> Error {
    Error::Browser(err.to_string())
}

/// Where Chrome usually lives on this platform.
pub fn default_chrome_executable() -> Option<PathBuf> {
    let path = if cfg!(target_os = "windows") {
        r"C:\Program Files\Google\Chrome\Application\chrome.exe"
    } else if cfg!(target_os = "macos") {
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"
    } else if cfg!(target_os = "linux") {
        "/usr/bin/google-chrome"
    } else {
        return None;
    };
    Some(PathBuf::from(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_chrome_executable_known_platform() {
        if cfg!(any(target_os = "windows", target_os = "macos", target_os = "linux")) {
            assert!(default_chrome_executable().is_some());
        }
    }

    fn cookies(names: &[&str]) -> Cookies {
        names
            .iter()
            .map(|n| (n.to_string(), "value".to_string()))
            .collect()
    }

    #[test]
    fn test_missing_cookie() {
        assert_eq!(missing_cookie(&cookies(&["auth_token", "ct0", "twid"])), None);
        assert_eq!(missing_cookie(&cookies(&["auth_token", "twid"])), Some("ct0"));
        assert_eq!(missing_cookie(&cookies(&["guest_id"])), Some("auth_token"));
    }

    #[test]
    fn test_manual_entry_without_credentials() {
        assert!(needs_manual_entry(&Credentials::default()));
        assert!(needs_manual_entry(&Credentials::new("spacefan", " ")));
        assert!(!needs_manual_entry(&Credentials::new("spacefan", "hunter22")));
    }
}
