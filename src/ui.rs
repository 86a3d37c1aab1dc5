// UI layer: terminal feedback around a submission run. A spinner follows
// the handshake steps and an optional prompt confirms before anything is
// sent.

use crate::session::{EditRequest, Step, StepObserver};
use anyhow::Result;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Shows one spinner for the whole run, relabelled at each step.
pub struct SpinnerObserver {
    spinner: ProgressBar,
}

impl SpinnerObserver {
    pub fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
            spinner.set_style(style);
        }
        spinner.enable_steady_tick(Duration::from_millis(80));
        SpinnerObserver { spinner }
    }

    /// Clear the spinner once the run is over.
    pub fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl Default for SpinnerObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl StepObserver for SpinnerObserver {
    fn started(&self, step: Step) {
        let msg = match step {
            Step::LoginToken => "Requesting login token...",
            Step::Login => "Logging in...",
            Step::CsrfToken => "Requesting CSRF token...",
            Step::Edit => "Submitting page...",
        };
        self.spinner.set_message(msg);
    }
}

/// Ask before submitting. Returns false when the user declines.
pub fn confirm_submission(request: &EditRequest, username: &str) -> Result<bool> {
    let prompt = format!(
        "Submit {} bytes to '{}' as {} (summary: '{}')?",
        request.content.len(),
        request.title,
        username,
        request.summary
    );
    let answer = Confirm::new().with_prompt(prompt).default(false).interact()?;
    Ok(answer)
}
