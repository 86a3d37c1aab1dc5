// CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use wikisubmit::{Backend, WikiConfig, DEFAULT_EDIT_SUMMARY};

/// Submit page content to a MediaWiki wiki as a bot account.
///
/// Credentials are read from ARCHWIKI_USERNAME and ARCHWIKI_PASSWORD.
#[derive(Parser, Debug)]
#[command(name = "wikisubmit")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output and show a progress spinner instead
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and replace a page's text with the contents of a file
    Submit(SubmitArgs),
}

#[derive(clap::Args, Debug)]
pub struct SubmitArgs {
    /// Title of the wiki page to edit
    pub page_title: String,

    /// Path to the file containing the page content
    pub content_file: PathBuf,

    /// Edit summary for the wiki edit
    #[arg(default_value = DEFAULT_EDIT_SUMMARY)]
    pub edit_summary: String,

    /// API endpoint (overrides ARCHWIKI_API_URL)
    #[arg(long)]
    pub api_url: Option<String>,

    /// Append-only log file (overrides ARCHWIKI_LOG_FILE)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Cookie jar used during the run; removed when it ends
    #[arg(long)]
    pub cookie_jar: Option<PathBuf>,

    /// Attempts per step for transient failures (1-20)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u32).range(1..=20))]
    pub max_retries: Option<u32>,

    /// How API calls are made
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// Do not flag the edit as a bot edit
    #[arg(long)]
    pub no_bot: bool,

    /// Ask for confirmation before submitting
    #[arg(short, long)]
    pub confirm: bool,
}

impl SubmitArgs {
    /// Layer command-line overrides on top of `config`.
    pub fn apply(&self, config: &mut WikiConfig) {
        if let Some(url) = &self.api_url {
            config.api_url = url.clone();
        }
        if let Some(log_file) = &self.log_file {
            config.log_file = log_file.clone();
        }
        if let Some(jar) = &self.cookie_jar {
            config.cookie_jar = jar.clone();
        }
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if self.no_bot {
            config.bot_edit = false;
        }
    }
}
