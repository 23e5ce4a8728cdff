//! Credentials and per-task request headers.

use std::collections::BTreeMap;
use std::fmt;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::{Error, Result};

/// Cookie carrying the session's auth token once logged in.
pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// Cookie carrying the CSRF token once logged in.
pub const CSRF_COOKIE: &str = "ct0";

/// Login credentials for the account used to fetch spaces.
#[derive(Clone, Default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Only asked for when the login page challenges for it.
    pub phone_number: Option<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            phone_number: None,
        }
    }

    pub fn with_phone_number(mut self, phone_number: impl Into<String>) -> Self {
        self.phone_number = Some(phone_number.into());
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("phone_number", &self.phone_number.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Request headers sent with every API call of a single task.
///
/// A `Session` is never mutated in place: every merge returns a new value, so a
/// session handed to one task cannot pick up headers set by another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    // Keys are stored lowercased.
    headers: BTreeMap<String, String>,
}

impl Session {
    /// Create a session with the browser-like base headers.
    pub fn new(user_agent: &str) -> Self {
        Self::default()
            .with_header("user-agent", user_agent)
            .with_header("accept", "*/*")
            .with_header("referer", "https://twitter.com/")
            .with_header("content-type", "application/json")
    }

    /// Return a copy of this session with `name` set to `value`.
    pub fn with_header(&self, name: &str, value: impl Into<String>) -> Self {
        let mut headers = self.headers.clone();
        headers.insert(name.to_ascii_lowercase(), value.into());
        Self { headers }
    }

    /// Return a copy of this session with several headers set at once.
    pub fn with_headers<'a, I, V>(&self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, V)>,
        V: Into<String>,
    {
        let mut headers = self.headers.clone();
        for (name, value) in pairs {
            headers.insert(name.to_ascii_lowercase(), value.into());
        }
        Self { headers }
    }

    /// Return a copy whose `cookie` header is exactly the given pairs.
    pub fn with_cookies<S: AsRef<str>>(&self, cookies: &[(S, S)]) -> Self {
        let cookie = cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name.as_ref(), value.as_ref()))
            .collect::<Vec<_>>()
            .join("; ");
        self.with_header("cookie", cookie)
    }

    /// Look up a header value (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Look up a value inside the `cookie` header.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.header("cookie")?.split(';').find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then_some(value)
        })
    }

    /// A session holding both the auth token and CSRF cookies is logged in.
    pub fn is_authenticated(&self) -> bool {
        self.cookie(AUTH_TOKEN_COOKIE).is_some() && self.cookie(CSRF_COOKIE).is_some()
    }

    /// Convert into a reqwest header map.
    pub fn to_header_map(&self) -> Result<HeaderMap> {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Api(format!("Invalid header name '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::Api(format!("Invalid value for header '{}': {}", name, e)))?;
            map.insert(name, value);
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_header_leaves_original_untouched() {
        let base = Session::new("test-agent");
        let updated = base.with_header("X-Guest-Token", "1234");

        assert_eq!(base.header("x-guest-token"), None);
        assert_eq!(updated.header("X-Guest-Token"), Some("1234"));
        assert_eq!(updated.header("user-agent"), Some("test-agent"));
    }

    #[test]
    fn test_cookie_lookup() {
        let session = Session::default().with_cookies(&[("auth_token", "abc"), ("ct0", "def")]);
        assert_eq!(session.header("cookie"), Some("auth_token=abc; ct0=def"));
        assert_eq!(session.cookie("ct0"), Some("def"));
        assert_eq!(session.cookie("twid"), None);
    }

    #[test]
    fn test_authenticated_requires_both_cookies() {
        let guest = Session::default().with_cookies(&[("att", "x")]);
        assert!(!guest.is_authenticated());

        let half = Session::default().with_cookies(&[("auth_token", "abc")]);
        assert!(!half.is_authenticated());

        let full = half.with_cookies(&[("auth_token", "abc"), ("ct0", "def")]);
        assert!(full.is_authenticated());
    }

    #[test]
    fn test_to_header_map() {
        let session = Session::new("agent").with_header("X-Csrf-Token", "tok");
        let map = session.to_header_map().unwrap();
        assert_eq!(map.get("x-csrf-token").unwrap(), "tok");
        assert_eq!(map.get("accept").unwrap(), "*/*");
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("alice", "hunter2").with_phone_number("+100");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("+100"));
    }
}
