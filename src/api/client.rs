//! HTTP client bound to a single task's session.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use crate::api::session::Session;
use crate::download::segments::SegmentFetcher;
use crate::error::{Error, Result};

/// Default browser user agent.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/100.0.4896.100 Safari/537.36";

/// Cookie name/value pairs read from a response's `Set-Cookie` headers.
pub type Cookies = Vec<(String, String)>;

/// API client for one task. Owns its own connection pool and session.
pub struct XApi {
    client: Client,
    session: Session,
}

impl XApi {
    /// Create a new client with a finite per-request timeout.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Api(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            session: Session::new(user_agent),
        })
    }

    /// Current session headers.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Replace the session with an updated value.
    pub fn set_session(&mut self, session: Session) {
        self.session = session;
    }

    /// Make a GET request carrying the session headers.
    pub async fn get(&self, url: &str) -> Result<Response> {
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .headers(self.session.to_header_map()?)
            .send()
            .await?;

        check_status(response).await
    }

    /// Make a POST request with a JSON body carrying the session headers.
    pub async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<Response> {
        tracing::debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .headers(self.session.to_header_map()?)
            .json(body)
            .send()
            .await?;

        check_status(response).await
    }

    /// GET a URL and return its body as text.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.get(url).await?;
        Ok(response.text().await?)
    }

    /// GET a URL and parse its JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, what: &str) -> Result<T> {
        let text = self.get_text(url).await?;
        parse_json(&text, what)
    }

    /// POST a JSON body and parse the JSON response, keeping any cookies it set.
    pub async fn post_json_with_cookies<T: DeserializeOwned>(
        &self,
        url: &str,
        body: &serde_json::Value,
        what: &str,
    ) -> Result<(T, Cookies)> {
        let response = self.post_json(url, body).await?;
        let cookies = response_cookies(&response);
        let text = response.text().await?;
        Ok((parse_json(&text, what)?, cookies))
    }
}

#[async_trait]
impl SegmentFetcher for XApi {
    async fn fetch_segment(&self, url: &str) -> Result<Vec<u8>> {
        // Segments live on a CDN and need no session headers.
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(Error::HttpStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// Map server-side failures to errors; client errors are passed back to the caller.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    tracing::debug!("Response status: {}", status);

    if status == 429 {
        return Err(Error::RateLimited(60));
    }

    if status == 401 || status == 403 {
        let body = response.text().await.unwrap_or_default();
        tracing::error!("Auth error response: {}", body);
        return Err(Error::Authentication(format!(
            "HTTP {}: {}",
            status,
            if body.is_empty() {
                "Authentication failed"
            } else {
                &body
            }
        )));
    }

    if status.is_server_error() {
        return Err(Error::HttpStatus {
            status: status.as_u16(),
            url: response.url().to_string(),
        });
    }

    Ok(response)
}

/// Collect the cookies set by a response.
pub fn response_cookies(response: &Response) -> Cookies {
    response
        .cookies()
        .map(|c| (c.name().to_string(), c.value().to_string()))
        .collect()
}

/// Find a cookie value by name.
pub fn find_cookie<'a>(cookies: &'a [(String, String)], name: &str) -> Option<&'a str> {
    cookies
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}

fn parse_json<T: DeserializeOwned>(text: &str, what: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|e| {
        Error::Api(format!(
            "Failed to parse {}: {} - Response: {}",
            what,
            e,
            excerpt(text, 500)
        ))
    })
}

/// At most `max_chars` characters of `text`, cut on a character boundary.
fn excerpt(text: &str, max_chars: usize) -> &str {
    text.char_indices()
        .nth(max_chars)
        .map_or(text, |(end, _)| &text[..end])
}
