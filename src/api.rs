// API call wrapper: sends one form-encoded POST to the wiki's api.php and
// hands back the decoded JSON body.
//
// Two transports share the `Transport` trait. `CurlTransport` shells out to
// curl and keeps cookies in a jar file between calls; `HttpTransport` uses
// a blocking reqwest client with an in-memory cookie store.

use crate::config::{Backend, WikiConfig};
use crate::error::{Result, TransportFailure, WikiError};
use reqwest::blocking::Client;
use serde_json::Value;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, error};

/// Request parameters in the order they are sent.
pub type Params = Vec<(&'static str, String)>;

/// Parameters whose values must never reach a log line.
const SECRET_PARAMS: &[&str] = &["lgpassword", "lgtoken", "token"];

/// One API round trip.
///
/// `fresh_session` is true for the first call of a run: any cookies left
/// over from an earlier session are discarded instead of sent.
pub trait Transport {
    fn call(&mut self, params: &Params, fresh_session: bool) -> Result<Value>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn call(&mut self, params: &Params, fresh_session: bool) -> Result<Value> {
        (**self).call(params, fresh_session)
    }
}

/// Build the transport selected in `config`.
pub fn transport_for(config: &WikiConfig) -> Result<Box<dyn Transport>> {
    let transport: Box<dyn Transport> = match config.backend {
        Backend::Curl => Box::new(CurlTransport::new(config)),
        Backend::Http => Box::new(HttpTransport::new(config)?),
    };
    Ok(transport)
}

/// Every request asks for JSON.
fn with_format(params: &Params) -> Params {
    let mut all = params.clone();
    if !all.iter().any(|(k, _)| *k == "format") {
        all.push(("format", "json".into()));
    }
    all
}

/// Render params for logging with credentials and tokens masked.
pub fn redact(params: &Params) -> String {
    params
        .iter()
        .map(|(k, v)| {
            if SECRET_PARAMS.contains(k) {
                format!("{k}=<redacted>")
            } else if v.len() > 200 {
                format!("{k}=<{} bytes>", v.len())
            } else {
                format!("{k}={v}")
            }
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn decode(body: &str) -> Result<Value> {
    serde_json::from_str(body).map_err(|source| {
        error!(body = %body, "Failed to decode JSON response");
        WikiError::Decode {
            body: body.to_string(),
            source,
        }
    })
}

/// Values longer than this are handed to curl through a file; a single
/// argv entry is capped at 128 KiB on Linux.
pub const INLINE_VALUE_LIMIT: usize = 16 * 1024;

/// Arguments for one curl invocation plus the files they point at.
///
/// The staged files are deleted when this is dropped, so keep it alive
/// until curl has exited.
pub struct CurlCommand {
    pub args: Vec<String>,
    staged: Vec<NamedTempFile>,
}

impl CurlCommand {
    /// Number of values passed through a file instead of inline.
    pub fn staged_count(&self) -> usize {
        self.staged.len()
    }
}

fn stage_value(value: &str) -> Result<NamedTempFile> {
    let stage = |value: &str| -> std::io::Result<NamedTempFile> {
        let mut file = tempfile::Builder::new().prefix("wikisubmit-").tempfile()?;
        file.write_all(value.as_bytes())?;
        file.flush()?;
        Ok(file)
    };
    stage(value).map_err(|source| {
        error!(error = %source, "Failed to stage request value");
        WikiError::Staging { source }
    })
}

/// Shells out to curl for every call.
pub struct CurlTransport {
    program: PathBuf,
    api_url: String,
    cookie_jar: PathBuf,
    user_agent: String,
    connect_timeout: Duration,
    max_time: Duration,
}

impl CurlTransport {
    pub fn new(config: &WikiConfig) -> Self {
        CurlTransport {
            program: config.curl_program.clone(),
            api_url: config.api_url.clone(),
            cookie_jar: config.cookie_jar.clone(),
            user_agent: config.user_agent.clone(),
            connect_timeout: config.connect_timeout,
            max_time: config.max_time,
        }
    }

    /// Argument vector for one call, without the program name.
    ///
    /// Long values (page text, mostly) are written to temporary files and
    /// passed as `key@path`, which curl reads and URL-encodes itself.
    pub fn command(&self, params: &Params, fresh_session: bool) -> Result<CurlCommand> {
        let jar = self.cookie_jar.to_string_lossy().into_owned();
        let mut args: Vec<String> = vec!["-s".into(), "-X".into(), "POST".into(), self.api_url.clone()];

        // A fresh session only writes the jar; later calls send it back too.
        if !fresh_session {
            args.push("-b".into());
            args.push(jar.clone());
        }
        args.push("-c".into());
        args.push(jar);

        let mut staged = Vec::new();
        for (key, value) in with_format(params) {
            args.push("--data-urlencode".into());
            if value.len() > INLINE_VALUE_LIMIT {
                let file = stage_value(&value)?;
                args.push(format!("{key}@{}", file.path().display()));
                staged.push(file);
            } else {
                args.push(format!("{key}={value}"));
            }
        }

        args.push("--user-agent".into());
        args.push(self.user_agent.clone());
        args.push("--connect-timeout".into());
        args.push(self.connect_timeout.as_secs().max(1).to_string());
        args.push("--max-time".into());
        args.push(self.max_time.as_secs().max(1).to_string());
        Ok(CurlCommand { args, staged })
    }
}

impl Transport for CurlTransport {
    fn call(&mut self, params: &Params, fresh_session: bool) -> Result<Value> {
        let program = self.program.to_string_lossy().into_owned();
        debug!(
            program = %program,
            params = %redact(&with_format(params)),
            fresh_session,
            "Executing curl command"
        );

        let command = self.command(params, fresh_session)?;
        let output = Command::new(&self.program)
            .args(&command.args)
            .output()
            .map_err(|source| {
                error!(program = %program, error = %source, "Failed to launch curl");
                WikiError::Spawn {
                    program: program.clone(),
                    source,
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let code = output.status.code().unwrap_or(-1);
            let kind = TransportFailure::from_curl_exit(code);
            error!(exit_code = code, %kind, stderr = %stderr, "Curl command failed");
            return Err(WikiError::Transport {
                kind,
                detail: format!("curl exited with code {code}: {stderr}"),
            });
        }

        decode(&String::from_utf8_lossy(&output.stdout))
    }
}

/// In-process transport built on reqwest's blocking client.
pub struct HttpTransport {
    client: Client,
    api_url: String,
    user_agent: String,
    connect_timeout: Duration,
    max_time: Duration,
}

impl HttpTransport {
    pub fn new(config: &WikiConfig) -> Result<Self> {
        let client = build_client(&config.user_agent, config.connect_timeout, config.max_time)?;
        Ok(HttpTransport {
            client,
            api_url: config.api_url.clone(),
            user_agent: config.user_agent.clone(),
            connect_timeout: config.connect_timeout,
            max_time: config.max_time,
        })
    }
}

fn build_client(user_agent: &str, connect_timeout: Duration, max_time: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(user_agent)
        .cookie_store(true)
        .connect_timeout(connect_timeout)
        .timeout(max_time)
        .build()
        .map_err(|e| WikiError::Transport {
            kind: TransportFailure::Other,
            detail: format!("failed to build HTTP client: {e}"),
        })
}

impl Transport for HttpTransport {
    fn call(&mut self, params: &Params, fresh_session: bool) -> Result<Value> {
        if fresh_session {
            // Dropping the old client drops its cookie store with it.
            self.client = build_client(&self.user_agent, self.connect_timeout, self.max_time)?;
        }
        let form = with_format(params);
        debug!(url = %self.api_url, params = %redact(&form), fresh_session, "Sending API request");

        let to_transport = |e: reqwest::Error| {
            let kind = TransportFailure::from_reqwest(&e);
            error!(%kind, error = %e, "HTTP request failed");
            WikiError::Transport {
                kind,
                detail: e.to_string(),
            }
        };

        let res = self
            .client
            .post(&self.api_url)
            .form(&form)
            .send()
            .map_err(to_transport)?;
        let body = res.text().map_err(to_transport)?;
        decode(&body)
    }
}
