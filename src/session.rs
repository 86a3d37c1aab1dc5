// The MediaWiki login/edit handshake.
//
// A run walks `NoToken → HaveLoginToken → LoggedIn → HaveCsrfToken →
// Submitted`, one API call per transition. Tokens travel through
// `HandshakeState` rather than being passed around by the caller, so a
// step invoked out of order fails with `WikiError::OutOfOrder`.

use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::api::{Params, Transport};
use crate::config::Credentials;
use crate::error::{is_throttle_code, EditFailure, Result, TokenType, WikiError};
use crate::retry::RetryPolicy;

const SUCCESS: &str = "Success";

/// Where the handshake currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeState {
    NoToken,
    HaveLoginToken(String),
    LoggedIn,
    HaveCsrfToken(String),
    Submitted { revid: Option<u64> },
}

impl HandshakeState {
    pub fn name(&self) -> &'static str {
        match self {
            HandshakeState::NoToken => "NoToken",
            HandshakeState::HaveLoginToken(_) => "HaveLoginToken",
            HandshakeState::LoggedIn => "LoggedIn",
            HandshakeState::HaveCsrfToken(_) => "HaveCsrfToken",
            HandshakeState::Submitted { .. } => "Submitted",
        }
    }
}

/// The four network steps of a run, reported to a [`StepObserver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    LoginToken,
    Login,
    CsrfToken,
    Edit,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::LoginToken => "get login token",
            Step::Login => "log in",
            Step::CsrfToken => "get CSRF token",
            Step::Edit => "submit edit",
        })
    }
}

/// Progress hooks around each step of [`WikiSession::submit`].
pub trait StepObserver {
    fn started(&self, _step: Step) {}
    fn finished(&self, _step: Step) {}
}

/// Observer that ignores everything.
impl StepObserver for () {}

/// A page edit to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRequest {
    pub title: String,
    pub content: String,
    pub summary: String,
}

/// What the wiki reported for a successful edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditOutcome {
    pub title: String,
    pub new_revid: Option<u64>,
    /// The submitted text matched the current revision.
    pub no_change: bool,
}

// Only the keys the client reads are modelled; everything else is ignored.

#[derive(Debug, Default, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    query: Option<QueryBody>,
    #[serde(default)]
    login: Option<LoginBody>,
    #[serde(default)]
    edit: Option<EditBody>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct QueryBody {
    #[serde(default)]
    tokens: Option<TokensBody>,
}

#[derive(Debug, Deserialize)]
struct TokensBody {
    logintoken: Option<String>,
    csrftoken: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginBody {
    result: Option<String>,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EditBody {
    result: Option<String>,
    newrevid: Option<u64>,
    nochange: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    info: Option<String>,
}

impl ApiResponse {
    /// Responses that do not fit the shape are treated as empty.
    fn parse(value: &Value) -> Self {
        ApiResponse::deserialize(value).unwrap_or_else(|e| {
            debug!(error = %e, response = %value, "Unexpected API response shape");
            ApiResponse::default()
        })
    }

    fn token(&self, token_type: TokenType) -> Option<&str> {
        let tokens = self.query.as_ref()?.tokens.as_ref()?;
        let token = match token_type {
            TokenType::Login => tokens.logintoken.as_deref(),
            TokenType::Csrf => tokens.csrftoken.as_deref(),
        };
        token.filter(|t| !t.is_empty())
    }

    fn error_code(&self) -> Option<&str> {
        self.error.as_ref()?.code.as_deref()
    }

    fn error_info(&self) -> Option<&str> {
        self.error.as_ref()?.info.as_deref()
    }
}

/// Scope of one submission run.
///
/// Dropping it removes the cookie jar and writes the closing log entry, so
/// both happen on every exit path of whatever holds it.
pub struct RunGuard {
    cookie_jar: PathBuf,
}

impl RunGuard {
    pub fn new(cookie_jar: impl Into<PathBuf>) -> Self {
        RunGuard {
            cookie_jar: cookie_jar.into(),
        }
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.cookie_jar) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.cookie_jar.display(), error = %e, "Could not remove cookie jar"),
        }
        info!("Submission run finished.");
    }
}

/// One authenticated session against the wiki API.
pub struct WikiSession<T: Transport> {
    transport: T,
    credentials: Credentials,
    retry: RetryPolicy,
    bot_edit: bool,
    state: HandshakeState,
}

impl<T: Transport> WikiSession<T> {
    pub fn new(transport: T, credentials: Credentials, retry: RetryPolicy) -> Self {
        WikiSession {
            transport,
            credentials,
            retry,
            bot_edit: true,
            state: HandshakeState::NoToken,
        }
    }

    /// Whether edits carry the `bot` flag (on by default).
    pub fn bot_edit(mut self, bot_edit: bool) -> Self {
        self.bot_edit = bot_edit;
        self
    }

    pub fn state(&self) -> &HandshakeState {
        &self.state
    }

    fn out_of_order(&self, step: &'static str) -> WikiError {
        WikiError::OutOfOrder {
            step,
            state: self.state.name(),
        }
    }

    /// `NoToken → HaveLoginToken`. Starts a fresh cookie session.
    pub fn request_login_token(&mut self) -> Result<()> {
        if self.state != HandshakeState::NoToken {
            return Err(self.out_of_order("request a login token"));
        }
        info!("Attempting to get login token...");
        let token = self.request_token(TokenType::Login, true)?;
        self.state = HandshakeState::HaveLoginToken(token);
        info!("Login token obtained.");
        Ok(())
    }

    /// `HaveLoginToken → LoggedIn`. The login token is spent either way;
    /// on failure the session falls back to `NoToken`.
    pub fn login(&mut self) -> Result<()> {
        let login_token = match std::mem::replace(&mut self.state, HandshakeState::NoToken) {
            HandshakeState::HaveLoginToken(token) => token,
            other => {
                self.state = other;
                return Err(self.out_of_order("log in"));
            }
        };

        info!(username = %self.credentials.username, "Attempting to log in as {}...", self.credentials.username);
        let params: Params = vec![
            ("action", "login".into()),
            ("lgname", self.credentials.username.clone()),
            ("lgpassword", self.credentials.password().to_string()),
            ("lgtoken", login_token),
        ];
        let value = self.transport.call(&params, false)?;
        let response = ApiResponse::parse(&value);

        let login = response.login.as_ref();
        if login.and_then(|l| l.result.as_deref()) != Some(SUCCESS) {
            if response.error_code().is_some_and(is_throttle_code) {
                return Err(lagged(&response, &value));
            }
            let reason = login
                .and_then(|l| l.reason.clone())
                .unwrap_or_else(|| "Unknown reason".to_string());
            error!(reason = %reason, response = %value, "Login failed: {reason}");
            return Err(WikiError::Login { reason });
        }

        self.state = HandshakeState::LoggedIn;
        info!("Login successful.");
        Ok(())
    }

    /// `LoggedIn → HaveCsrfToken`.
    pub fn request_csrf_token(&mut self) -> Result<()> {
        if self.state != HandshakeState::LoggedIn {
            return Err(self.out_of_order("request a CSRF token"));
        }
        info!("Attempting to get CSRF token...");
        let token = self.request_token(TokenType::Csrf, false)?;
        self.state = HandshakeState::HaveCsrfToken(token);
        info!("CSRF token obtained.");
        Ok(())
    }

    /// `HaveCsrfToken → Submitted`. A rejected edit keeps the CSRF token.
    pub fn edit(&mut self, request: &EditRequest) -> Result<EditOutcome> {
        let csrf_token = match &self.state {
            HandshakeState::HaveCsrfToken(token) => token.clone(),
            _ => return Err(self.out_of_order("submit an edit")),
        };

        info!(
            title = %request.title,
            summary = %request.summary,
            "Attempting to submit page: '{}' with summary: '{}'...",
            request.title,
            request.summary
        );
        let mut params: Params = vec![
            ("action", "edit".into()),
            ("title", request.title.clone()),
            ("text", request.content.clone()),
            ("summary", request.summary.clone()),
            ("token", csrf_token),
        ];
        if self.bot_edit {
            params.push(("bot", "1".into()));
        }

        let value = self.transport.call(&params, false)?;
        let response = ApiResponse::parse(&value);
        let edit = response.edit.as_ref();

        if edit.and_then(|e| e.result.as_deref()) != Some(SUCCESS) {
            let code = response.error_code().unwrap_or("N/A");
            let info = response.error_info().unwrap_or("Unknown error");
            error!(
                title = %request.title,
                code,
                info,
                response = %value,
                "Edit failed for '{}': {code} - {info}",
                request.title
            );
            return Err(EditFailure::from_api_error(code, info).into());
        }

        let new_revid = edit.and_then(|e| e.newrevid);
        let no_change = edit.is_some_and(|e| e.nochange.is_some());
        self.state = HandshakeState::Submitted { revid: new_revid };

        match new_revid {
            Some(revid) => info!(
                title = %request.title,
                revid,
                "Page '{}' submitted successfully. New revision ID: {revid}",
                request.title
            ),
            None => info!(title = %request.title, no_change, "Page '{}' submitted successfully without a new revision.", request.title),
        }

        Ok(EditOutcome {
            title: request.title.clone(),
            new_revid,
            no_change,
        })
    }

    fn request_token(&mut self, token_type: TokenType, fresh_session: bool) -> Result<String> {
        let params: Params = vec![
            ("action", "query".into()),
            ("meta", "tokens".into()),
            ("type", token_type.as_param().into()),
        ];
        let value = self.transport.call(&params, fresh_session)?;
        let response = ApiResponse::parse(&value);

        match response.token(token_type) {
            Some(token) => Ok(token.to_string()),
            None if response.error_code().is_some_and(is_throttle_code) => Err(lagged(&response, &value)),
            None => {
                error!(
                    token_type = token_type.response_key(),
                    response = %value,
                    "Failed to get {token_type} token"
                );
                Err(WikiError::TokenMissing { token_type })
            }
        }
    }

    /// Run the whole handshake and submit `request`.
    ///
    /// Each step is retried on transient errors. A retried login asks for a
    /// fresh login token first, since the previous one was consumed. Hold a
    /// [`RunGuard`] around the call to clean up the cookie jar afterwards.
    pub fn submit(&mut self, request: &EditRequest, observer: &dyn StepObserver) -> Result<EditOutcome> {
        info!(title = %request.title, "Starting wiki submission process for page: {}", request.title);

        let result = self.run_handshake(request, observer);
        if let Err(e) = &result {
            error!(error = %e, "An unrecoverable error occurred: {e}");
        }
        result
    }

    fn run_handshake(&mut self, request: &EditRequest, observer: &dyn StepObserver) -> Result<EditOutcome> {
        self.state = HandshakeState::NoToken;
        let retry = self.retry.clone();

        observer.started(Step::LoginToken);
        retry.run("login token", || self.request_login_token())?;
        observer.finished(Step::LoginToken);

        observer.started(Step::Login);
        retry.run("login", || {
            if self.state == HandshakeState::NoToken {
                self.request_login_token()?;
            }
            self.login()
        })?;
        observer.finished(Step::Login);

        observer.started(Step::CsrfToken);
        retry.run("csrf token", || self.request_csrf_token())?;
        observer.finished(Step::CsrfToken);

        observer.started(Step::Edit);
        let outcome = retry.run("edit", || self.edit(request))?;
        observer.finished(Step::Edit);

        info!("Wiki submission completed successfully!");
        Ok(outcome)
    }
}

fn lagged(response: &ApiResponse, value: &Value) -> WikiError {
    let code = response.error_code().unwrap_or("maxlag");
    let info = response.error_info().unwrap_or("replication lag").to_string();
    warn!(code, info = %info, response = %value, "Wiki asked the client to slow down");
    WikiError::Lagged { info }
}
