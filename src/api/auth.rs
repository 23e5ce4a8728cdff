//! Login flow: guest token bootstrap, subtask loop, and session verification.

use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde_json::{json, Value};

use crate::api::browser::browser_login;
use crate::api::client::{find_cookie, Cookies, XApi};
use crate::api::endpoints::{
    BEARER, CHECK_USER_URL, URL_BASE, URL_FLOW_START, URL_FLOW_TASK, VERIFY_CREDENTIALS_URL,
};
use crate::api::session::{Credentials, Session, AUTH_TOKEN_COOKIE, CSRF_COOKIE};
use crate::api::types::{AccountListResponse, FlowResponse};
use crate::error::{Error, Result};

pub const LOGIN_JS_INSTRUMENTATION: &str = "LoginJsInstrumentationSubtask";
pub const LOGIN_ENTER_USER_IDENTIFIER: &str = "LoginEnterUserIdentifierSSO";
pub const LOGIN_ENTER_PASSWORD: &str = "LoginEnterPassword";
pub const ACCOUNT_DUPLICATION_CHECK: &str = "AccountDuplicationCheck";

/// Cookie the login flow hands out before any credentials are submitted.
const ATT_COOKIE: &str = "att";

/// Default wall-clock bound for browser login.
pub const DEFAULT_BROWSER_TIMEOUT: Duration = Duration::from_secs(120);

/// How the login should be carried out.
#[derive(Debug, Clone)]
pub struct LoginOptions {
    /// Skip the programmatic flow and log in through a browser.
    pub browser_login: bool,
    /// Never fall back to a browser when the programmatic flow stalls.
    pub disable_browser_login: bool,
    pub browser_timeout: Duration,
    pub chrome_executable: Option<PathBuf>,
}

impl Default for LoginOptions {
    fn default() -> Self {
        Self {
            browser_login: false,
            disable_browser_login: false,
            browser_timeout: DEFAULT_BROWSER_TIMEOUT,
            chrome_executable: None,
        }
    }
}

/// Server-driven position in the login flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginFlowState {
    pub subtask_id: String,
    pub flow_token: String,
}

impl LoginFlowState {
    /// Take the next state from a flow response.
    pub fn from_response(response: FlowResponse) -> Result<Self> {
        let subtask_id = response
            .next_subtask()
            .ok_or_else(|| Error::Authentication("Login flow returned no next subtask".into()))?
            .to_string();

        Ok(Self {
            subtask_id,
            flow_token: response.flow_token,
        })
    }

    /// Submitting this subtask completes the programmatic flow.
    pub fn is_terminal(&self) -> bool {
        self.subtask_id == ACCOUNT_DUPLICATION_CHECK
    }
}

type PayloadBuilder = fn(&Credentials) -> Value;

/// Subtasks we know how to answer, and how.
const SUBTASK_PAYLOADS: &[(&str, PayloadBuilder)] = &[
    (LOGIN_JS_INSTRUMENTATION, js_instrumentation_input),
    (LOGIN_ENTER_USER_IDENTIFIER, user_identifier_input),
    (LOGIN_ENTER_PASSWORD, password_input),
    (ACCOUNT_DUPLICATION_CHECK, duplication_check_input),
];

fn js_instrumentation_input(_: &Credentials) -> Value {
    json!({
        "subtask_inputs": [{
            "subtask_id": LOGIN_JS_INSTRUMENTATION,
            "js_instrumentation": { "response": "{}", "link": "next_link" },
        }]
    })
}

fn user_identifier_input(credentials: &Credentials) -> Value {
    json!({
        "subtask_inputs": [{
            "subtask_id": LOGIN_ENTER_USER_IDENTIFIER,
            "settings_list": {
                "setting_responses": [{
                    "key": "user_identifier",
                    "response_data": { "text_data": { "result": credentials.username } },
                }],
                "link": "next_link",
            },
        }]
    })
}

fn password_input(credentials: &Credentials) -> Value {
    json!({
        "subtask_inputs": [{
            "subtask_id": LOGIN_ENTER_PASSWORD,
            "enter_password": { "password": credentials.password, "link": "next_link" },
        }]
    })
}

fn duplication_check_input(_: &Credentials) -> Value {
    json!({
        "subtask_inputs": [{
            "subtask_id": ACCOUNT_DUPLICATION_CHECK,
            "check_logged_in_account": { "link": "AccountDuplicationCheck_false" },
        }]
    })
}

/// Build the request body answering `state`, or `None` for an unknown subtask.
pub fn subtask_request(state: &LoginFlowState, credentials: &Credentials) -> Option<Value> {
    let (_, build) = SUBTASK_PAYLOADS
        .iter()
        .find(|(name, _)| *name == state.subtask_id)?;

    let mut body = build(credentials);
    body["flow_token"] = Value::String(state.flow_token.clone());
    Some(body)
}

/// Extract the guest token from the landing page's inline scripts.
pub fn extract_guest_token(html: &str) -> Result<String> {
    static SCRIPT: OnceLock<Regex> = OnceLock::new();
    static GUEST_TOKEN: OnceLock<Regex> = OnceLock::new();

    let script = SCRIPT.get_or_init(|| {
        Regex::new(r"(?is)<script[^>]*>(.*?)</script>").expect("script pattern is valid")
    });
    let guest_token = GUEST_TOKEN
        .get_or_init(|| Regex::new(r#""gt=(\d{19})"#).expect("guest token pattern is valid"));

    script
        .captures_iter(html)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .find(|text| text.contains("document.cookie"))
        .and_then(|text| guest_token.captures(text))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| Error::Authentication("Failed to get guest token".into()))
}

/// Return a session carrying the auth cookies and matching CSRF header.
pub fn with_auth_cookies(session: &Session, cookies: &[(String, String)]) -> Result<Session> {
    let auth_token = find_cookie(cookies, AUTH_TOKEN_COOKIE)
        .ok_or_else(|| Error::MissingCookie(AUTH_TOKEN_COOKIE.into()))?;
    let csrf_token =
        find_cookie(cookies, CSRF_COOKIE).ok_or_else(|| Error::MissingCookie(CSRF_COOKIE.into()))?;

    let mut pairs = vec![(AUTH_TOKEN_COOKIE, auth_token), (CSRF_COOKIE, csrf_token)];
    if let Some(twid) = find_cookie(cookies, "twid") {
        pairs.push(("twid", twid));
    }

    Ok(session
        .with_cookies(&pairs)
        .with_header("x-csrf-token", csrf_token))
}

#[derive(Debug, PartialEq, Eq)]
enum FlowOutcome {
    /// Cookies set by the final subtask response.
    Completed(Cookies),
    /// The server asked for something we cannot answer programmatically.
    NeedsBrowser,
}

/// Log in and leave `api` holding an authenticated, verified session.
pub async fn authenticate(
    api: &mut XApi,
    credentials: &Credentials,
    options: &LoginOptions,
) -> Result<()> {
    tracing::info!("Starting authentication flow");

    let landing = api.get_text(URL_BASE).await?;
    tracing::info!("Retrieving guest token...");
    let guest_token = extract_guest_token(&landing)?;
    api.set_session(api.session().with_headers([
        ("x-guest-token", guest_token),
        ("authorization", BEARER.to_string()),
    ]));

    let (flow, cookies) = api
        .post_json_with_cookies::<FlowResponse>(URL_FLOW_START, &json!({}), "login flow")
        .await
        .map_err(as_auth_error)?;
    let att = find_cookie(&cookies, ATT_COOKIE)
        .ok_or_else(|| Error::MissingCookie(ATT_COOKIE.into()))?;
    api.set_session(api.session().with_cookies(&[(ATT_COOKIE, att)]));

    let outcome = if options.browser_login {
        FlowOutcome::NeedsBrowser
    } else {
        tracing::info!(
            "Attempting to login with username and password. Make sure 2FA is disabled on your account"
        );
        run_login_flow(api, credentials, options, LoginFlowState::from_response(flow)?).await?
    };

    let cookies = match outcome {
        FlowOutcome::Completed(cookies) => cookies,
        FlowOutcome::NeedsBrowser => browser_login(credentials, options).await?,
    };

    tracing::info!("Getting authentication and CSRF tokens...");
    api.set_session(with_auth_cookies(api.session(), &cookies)?);

    check_user(api, &credentials.username).await?;
    verify_login(api).await?;

    tracing::info!("Login success");
    Ok(())
}

/// Answer subtasks until the duplication check has been submitted.
async fn run_login_flow(
    api: &XApi,
    credentials: &Credentials,
    options: &LoginOptions,
    mut state: LoginFlowState,
) -> Result<FlowOutcome> {
    loop {
        let Some(body) = subtask_request(&state, credentials) else {
            return on_unrecognized(options, state.subtask_id);
        };

        tracing::info!("Performing next subtask: {}", state.subtask_id);
        let (flow, cookies) = api
            .post_json_with_cookies::<FlowResponse>(URL_FLOW_TASK, &body, "login subtask")
            .await
            .map_err(as_auth_error)?;

        match advance(&state, flow, cookies)? {
            FlowStep::Next(next) => state = next,
            FlowStep::Done(outcome) => return Ok(outcome),
        }
    }
}

/// Where the flow goes after a subtask response.
#[derive(Debug, PartialEq, Eq)]
enum FlowStep {
    Next(LoginFlowState),
    Done(FlowOutcome),
}

/// Cookies are only taken from the response to the duplication check.
fn advance(submitted: &LoginFlowState, flow: FlowResponse, cookies: Cookies) -> Result<FlowStep> {
    if submitted.is_terminal() {
        return Ok(FlowStep::Done(FlowOutcome::Completed(cookies)));
    }
    LoginFlowState::from_response(flow).map(FlowStep::Next)
}

/// A subtask we cannot answer ends the flow, in a browser unless that is disabled.
fn on_unrecognized(options: &LoginOptions, subtask_id: String) -> Result<FlowOutcome> {
    tracing::error!("Subtask {} not recognized.", subtask_id);
    if options.disable_browser_login {
        return Err(Error::UnrecognizedSubtask(subtask_id));
    }
    Ok(FlowOutcome::NeedsBrowser)
}

/// Suspended accounts cannot access spaces.
async fn check_user(api: &XApi, username: &str) -> Result<()> {
    let status: AccountListResponse = api.get_json(CHECK_USER_URL, "account status").await?;
    ensure_not_suspended(&status, username)
}

fn ensure_not_suspended(status: &AccountListResponse, username: &str) -> Result<()> {
    match status.users.first() {
        Some(user) if user.is_suspended => Err(Error::AccountSuspended(
            user.screen_name.clone().unwrap_or_else(|| username.to_string()),
        )),
        Some(_) => Ok(()),
        None => Err(Error::Authentication(
            "Account status lookup returned no users".into(),
        )),
    }
}

/// Round-trip an authenticated call to confirm the session works.
async fn verify_login(api: &XApi) -> Result<()> {
    let response = api.get(VERIFY_CREDENTIALS_URL).await?;
    let status = response.status();
    if status != 200 {
        return Err(Error::Authentication(format!(
            "Login verification failed with status {}",
            status
        )));
    }
    tracing::info!("Login verified successfully");
    Ok(())
}

// Malformed flow responses mean the server rejected the step.
fn as_auth_error(err: Error) -> Error {
    match err {
        Error::Api(message) => Error::Authentication(message),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(subtask: &str) -> LoginFlowState {
        LoginFlowState {
            subtask_id: subtask.to_string(),
            flow_token: "g;token:1".to_string(),
        }
    }

    #[test]
    fn test_extract_guest_token() {
        let html = r#"<html><head>
            <script>window.__INITIAL_STATE__ = {};</script>
            <script type="text/javascript">document.cookie = decodeURIComponent("gt=1234567890123456789; Max-Age=10800");</script>
            </head></html>"#;
        assert_eq!(extract_guest_token(html).unwrap(), "1234567890123456789");
    }

    #[test]
    fn test_extract_guest_token_missing() {
        let html = "<script>document.cookie = 'x=1';</script>";
        assert!(matches!(
            extract_guest_token(html),
            Err(Error::Authentication(_))
        ));
    }

    #[test]
    fn test_subtask_request_carries_flow_token() {
        let creds = Credentials::new("alice", "hunter2");
        let body = subtask_request(&state(LOGIN_ENTER_PASSWORD), &creds).unwrap();
        assert_eq!(body["flow_token"], "g;token:1");
        assert_eq!(
            body["subtask_inputs"][0]["enter_password"]["password"],
            "hunter2"
        );
    }

    #[test]
    fn test_subtask_request_username() {
        let creds = Credentials::new("alice", "hunter2");
        let body = subtask_request(&state(LOGIN_ENTER_USER_IDENTIFIER), &creds).unwrap();
        let setting = &body["subtask_inputs"][0]["settings_list"]["setting_responses"][0];
        assert_eq!(setting["key"], "user_identifier");
        assert_eq!(setting["response_data"]["text_data"]["result"], "alice");
    }

    #[test]
    fn test_unrecognized_subtask_has_no_payload() {
        let creds = Credentials::new("alice", "hunter2");
        assert!(subtask_request(&state("LoginAcid"), &creds).is_none());
        assert!(subtask_request(&state(LOGIN_JS_INSTRUMENTATION), &creds).is_some());
    }

    #[test]
    fn test_only_duplication_check_is_terminal() {
        assert!(state(ACCOUNT_DUPLICATION_CHECK).is_terminal());
        assert!(!state(LOGIN_ENTER_PASSWORD).is_terminal());
    }

    #[test]
    fn test_flow_state_from_response() {
        let response: FlowResponse = serde_json::from_str(
            r#"{"flow_token":"g;next","subtasks":[{"subtask_id":"LoginEnterPassword"}]}"#,
        )
        .unwrap();
        let next = LoginFlowState::from_response(response).unwrap();
        assert_eq!(next.subtask_id, LOGIN_ENTER_PASSWORD);
        assert_eq!(next.flow_token, "g;next");

        let empty: FlowResponse = serde_json::from_str(r#"{"flow_token":"g;x"}"#).unwrap();
        assert!(LoginFlowState::from_response(empty).is_err());
    }

    #[test]
    fn test_with_auth_cookies() {
        let cookies = vec![
            ("auth_token".to_string(), "tok".to_string()),
            ("ct0".to_string(), "csrf".to_string()),
        ];
        let session = with_auth_cookies(&Session::new("agent"), &cookies).unwrap();
        assert!(session.is_authenticated());
        assert_eq!(session.header("x-csrf-token"), Some("csrf"));
        assert_eq!(session.header("cookie"), Some("auth_token=tok; ct0=csrf"));
    }

    #[test]
    fn test_with_auth_cookies_missing_csrf() {
        let cookies = vec![("auth_token".to_string(), "tok".to_string())];
        assert!(matches!(
            with_auth_cookies(&Session::default(), &cookies),
            Err(Error::MissingCookie(name)) if name == "ct0"
        ));
    }

    fn flow(json: &str) -> FlowResponse {
        serde_json::from_str(json).unwrap()
    }

    fn cookies(pairs: &[(&str, &str)]) -> Cookies {
        pairs
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_unrecognized_subtask_falls_back_to_browser() {
        let outcome = on_unrecognized(&LoginOptions::default(), "LoginAcid".into()).unwrap();
        assert_eq!(outcome, FlowOutcome::NeedsBrowser);
    }

    #[test]
    fn test_unrecognized_subtask_is_fatal_without_browser() {
        let options = LoginOptions {
            disable_browser_login: true,
            ..Default::default()
        };
        let err = on_unrecognized(&options, "LoginAcid".into()).unwrap_err();
        assert!(matches!(err, Error::UnrecognizedSubtask(ref id) if id == "LoginAcid"));
        assert_eq!(err.class(), crate::error::ErrorClass::FatalAuth);
    }

    #[test]
    fn test_cookies_come_from_duplication_check_response() {
        let jar = cookies(&[("auth_token", "tok"), ("ct0", "csrf")]);
        let step = advance(
            &state(ACCOUNT_DUPLICATION_CHECK),
            flow(r#"{"flow_token":"g;done"}"#),
            jar.clone(),
        )
        .unwrap();
        assert_eq!(step, FlowStep::Done(FlowOutcome::Completed(jar)));
    }

    #[test]
    fn test_earlier_subtask_moves_to_next_state() {
        let step = advance(
            &state(LOGIN_ENTER_USER_IDENTIFIER),
            flow(r#"{"flow_token":"g;2","subtasks":[{"subtask_id":"LoginEnterPassword"}]}"#),
            cookies(&[("auth_token", "early")]),
        )
        .unwrap();
        assert_eq!(
            step,
            FlowStep::Next(LoginFlowState {
                subtask_id: LOGIN_ENTER_PASSWORD.into(),
                flow_token: "g;2".into(),
            })
        );
    }

    #[test]
    fn test_suspended_account_is_rejected() {
        let status: AccountListResponse = serde_json::from_str(
            r#"{"users":[{"screen_name":"spacefan","is_suspended":true}]}"#,
        )
        .unwrap();
        assert!(matches!(
            ensure_not_suspended(&status, "login@example.com"),
            Err(Error::AccountSuspended(name)) if name == "spacefan"
        ));
    }

    #[test]
    fn test_account_status_checks() {
        let active: AccountListResponse =
            serde_json::from_str(r#"{"users":[{"screen_name":"spacefan"}]}"#).unwrap();
        assert!(ensure_not_suspended(&active, "spacefan").is_ok());

        let empty: AccountListResponse = serde_json::from_str(r#"{"users":[]}"#).unwrap();
        assert!(matches!(
            ensure_not_suspended(&empty, "spacefan"),
            Err(Error::Authentication(_))
        ));
    }
}
