// Configuration for a submission run.
//
// Values that used to be process-wide constants (endpoint, cookie jar, log
// file, timeouts) live here and are handed to the client at construction.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "https://wiki.archlinux.org/api.php";
pub const DEFAULT_USER_AGENT: &str = "ArchWikiBot/1.0 (Linux Bluetooth Troubleshooting Project)";
pub const DEFAULT_LOG_FILE: &str = "archwiki_submission.log";
pub const DEFAULT_EDIT_SUMMARY: &str = "Automated update for Bluetooth troubleshooting documentation";
pub const DEFAULT_MAX_RETRIES: u32 = 5;

pub const USERNAME_VAR: &str = "ARCHWIKI_USERNAME";
pub const PASSWORD_VAR: &str = "ARCHWIKI_PASSWORD";

/// How API calls reach the wiki.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Backend {
    /// Shell out to the curl binary, cookies kept in the jar file.
    #[default]
    Curl,
    /// In-process blocking HTTP client with an in-memory cookie store.
    Http,
}

/// Everything a `WikiSession` needs to know about its environment.
#[derive(Debug, Clone)]
pub struct WikiConfig {
    pub api_url: String,
    pub user_agent: String,
    pub cookie_jar: PathBuf,
    pub log_file: PathBuf,
    pub connect_timeout: Duration,
    pub max_time: Duration,
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backend: Backend,
    pub curl_program: PathBuf,
    pub bot_edit: bool,
}

impl Default for WikiConfig {
    fn default() -> Self {
        WikiConfig {
            api_url: DEFAULT_API_URL.into(),
            user_agent: DEFAULT_USER_AGENT.into(),
            cookie_jar: default_cookie_jar(),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            connect_timeout: Duration::from_secs(30),
            max_time: Duration::from_secs(120),
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: Duration::from_secs(1),
            backend: Backend::default(),
            curl_program: PathBuf::from("curl"),
            bot_edit: true,
        }
    }
}

impl WikiConfig {
    /// Build a config from defaults, overridden by `ARCHWIKI_API_URL`,
    /// `ARCHWIKI_COOKIE_JAR`, `ARCHWIKI_LOG_FILE` and `ARCHWIKI_CURL`.
    pub fn from_env() -> Self {
        let mut config = WikiConfig::default();
        if let Some(url) = non_empty_var("ARCHWIKI_API_URL") {
            config.api_url = url;
        }
        if let Some(jar) = non_empty_var("ARCHWIKI_COOKIE_JAR") {
            config.cookie_jar = PathBuf::from(jar);
        }
        if let Some(log) = non_empty_var("ARCHWIKI_LOG_FILE") {
            config.log_file = PathBuf::from(log);
        }
        if let Some(curl) = non_empty_var("ARCHWIKI_CURL") {
            config.curl_program = PathBuf::from(curl);
        }
        config
    }
}

/// The jar is scoped to one process so parallel runs never share cookies.
fn default_cookie_jar() -> PathBuf {
    std::env::temp_dir().join(format!("archwiki_cookies_{}.txt", std::process::id()))
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Please set ARCHWIKI_USERNAME and ARCHWIKI_PASSWORD environment variables ({missing} is not set).")]
pub struct MissingCredentials {
    pub missing: &'static str,
}

/// Bot account username and password.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Read `ARCHWIKI_USERNAME` and `ARCHWIKI_PASSWORD`. Empty values count as unset.
    pub fn from_env() -> Result<Self, MissingCredentials> {
        let username = non_empty_var(USERNAME_VAR).ok_or(MissingCredentials {
            missing: USERNAME_VAR,
        })?;
        let password = non_empty_var(PASSWORD_VAR).ok_or(MissingCredentials {
            missing: PASSWORD_VAR,
        })?;
        Ok(Credentials { username, password })
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
