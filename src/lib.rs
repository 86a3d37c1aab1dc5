// Library root
// -----------
// This crate exposes the library surface behind the `wikisubmit` CLI. The
// binary (`main.rs`) parses arguments and hands a request to `session`.
//
// Module responsibilities:
// - `config`: run configuration and bot credentials from the environment.
// - `error`: structured error kinds, including which ones are transient.
// - `api`: one API call over curl or an in-process HTTP client.
// - `session`: the login-token / login / CSRF-token / edit handshake.
// - `retry`: exponential backoff around each handshake step.
// - `logging`: console + append-only log file.
// - `ui`: spinner and confirmation prompt.
pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod retry;
pub mod session;
pub mod ui;

pub use api::{transport_for, CurlTransport, HttpTransport, Transport};
pub use config::{Backend, Credentials, WikiConfig, DEFAULT_EDIT_SUMMARY};
pub use error::{EditFailure, WikiError};
pub use retry::RetryPolicy;
pub use session::{EditOutcome, EditRequest, HandshakeState, WikiSession};
