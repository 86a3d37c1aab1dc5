// Error taxonomy for the submission client.
//
// Every failure is produced as a structured variant at the point where it
// happens. The retry wrapper asks `is_transient()` instead of looking at
// message text.

use std::fmt;
use thiserror::Error;

/// Which token a `query&meta=tokens` request was asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Login,
    Csrf,
}

impl TokenType {
    /// Value of the `type` request parameter.
    pub fn as_param(self) -> &'static str {
        match self {
            TokenType::Login => "login",
            TokenType::Csrf => "csrf",
        }
    }

    /// Key under `query.tokens` holding the token.
    pub fn response_key(self) -> &'static str {
        match self {
            TokenType::Login => "logintoken",
            TokenType::Csrf => "csrftoken",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::Login => f.write_str("login"),
            TokenType::Csrf => f.write_str("CSRF"),
        }
    }
}

/// Why an HTTP call did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailure {
    /// Connect or total timeout was hit.
    Timeout,
    /// DNS, connect, TLS or connection-reset problems.
    Network,
    /// Anything else the HTTP client reported.
    Other,
}

impl TransportFailure {
    /// Map a curl exit status onto a failure kind.
    ///
    /// See the "EXIT CODES" section of curl(1).
    pub fn from_curl_exit(code: i32) -> Self {
        match code {
            28 => TransportFailure::Timeout,
            5 | 6 | 7 | 35 | 52 | 55 | 56 => TransportFailure::Network,
            _ => TransportFailure::Other,
        }
    }

    /// Map a reqwest error onto a failure kind.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportFailure::Timeout
        } else if err.is_connect() || err.is_request() {
            TransportFailure::Network
        } else {
            TransportFailure::Other
        }
    }
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportFailure::Timeout => f.write_str("timeout"),
            TransportFailure::Network => f.write_str("network"),
            TransportFailure::Other => f.write_str("other"),
        }
    }
}

/// Edit rejections, each with a message the user can act on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditFailure {
    #[error("CSRF token is invalid. Please get a new CSRF token and try again.")]
    BadToken,
    #[error("Wiki is currently lagging. Please try again later. ({info})")]
    Lagged { info: String },
    #[error("Edit rate limit exceeded. Please try again later. ({info})")]
    RateLimited { info: String },
    #[error("Content detected as spam. Please review your content.")]
    Spam,
    #[error("Content blocked by abuse filter. Please review your content.")]
    AbuseFilter,
    #[error("Edit failed: {code} - {info}")]
    Other { code: String, info: String },
}

/// API error codes that mean "slow down", on any action.
pub fn is_throttle_code(code: &str) -> bool {
    matches!(code, "maxlag" | "ratelimited" | "actionthrottledtext")
}

impl EditFailure {
    /// Classify the `error.code` / `error.info` pair of a failed edit.
    pub fn from_api_error(code: &str, info: &str) -> Self {
        match code {
            "badtoken" => EditFailure::BadToken,
            "maxlag" => EditFailure::Lagged {
                info: info.to_string(),
            },
            "ratelimited" | "actionthrottledtext" => EditFailure::RateLimited {
                info: info.to_string(),
            },
            "spamdetected" | "spamblacklist" => EditFailure::Spam,
            c if c == "abusefilter" || c.starts_with("abusefilter-") => EditFailure::AbuseFilter,
            _ => EditFailure::Other {
                code: code.to_string(),
                info: info.to_string(),
            },
        }
    }
}

/// Errors raised by the submission client.
#[derive(Debug, Error)]
pub enum WikiError {
    /// The HTTP client process could not be started at all.
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A request value could not be written to its temporary file.
    #[error("failed to stage request value in a temporary file: {source}")]
    Staging {
        #[source]
        source: std::io::Error,
    },

    /// The HTTP call did not complete.
    #[error("{kind} failure calling the wiki API: {detail}")]
    Transport {
        kind: TransportFailure,
        detail: String,
    },

    /// The response body was not valid JSON.
    #[error("failed to decode JSON response from API: {source}")]
    Decode {
        body: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not retrieve {token_type} token")]
    TokenMissing { token_type: TokenType },

    /// The API refused a non-edit request for lag or rate limiting.
    #[error("wiki is lagging or rate limiting requests: {info}")]
    Lagged { info: String },

    #[error("login failed: {reason}")]
    Login { reason: String },

    #[error(transparent)]
    Edit(#[from] EditFailure),

    /// A handshake step was invoked from the wrong state.
    #[error("cannot {step} while in state {state}")]
    OutOfOrder {
        step: &'static str,
        state: &'static str,
    },

    #[error("failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<WikiError>,
    },
}

impl WikiError {
    /// Whether retrying the same step may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            WikiError::Transport { kind, .. } => {
                matches!(kind, TransportFailure::Timeout | TransportFailure::Network)
            }
            WikiError::Lagged { .. } => true,
            WikiError::Edit(EditFailure::Lagged { .. } | EditFailure::RateLimited { .. }) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, WikiError>;
