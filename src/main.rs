// Entrypoint for the CLI application.
// - Keeps `main` small: resolve configuration, set up logging, then hand the
//   edit request to a `WikiSession`.
// - Returns `anyhow::Result` so every failure ends in a non-zero exit.
// - A `RunGuard` lives for the whole run once logging is up, so the cookie
//   jar is removed and the closing log line written on every exit path.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use wikisubmit::session::{EditRequest, RunGuard};
use wikisubmit::ui::{confirm_submission, SpinnerObserver};
use wikisubmit::{logging, transport_for, Credentials, RetryPolicy, WikiConfig, WikiSession};

mod cli;

use cli::{Args, Command};

fn main() -> Result<()> {
    let args = Args::parse();
    let Command::Submit(submit) = args.command;

    let credentials = match Credentials::from_env() {
        Ok(credentials) => credentials,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let mut config = WikiConfig::from_env();
    submit.apply(&mut config);
    logging::init(&config.log_file, logging::console_level(args.verbose, args.quiet))?;
    let _run = RunGuard::new(config.cookie_jar.clone());

    let content = std::fs::read_to_string(&submit.content_file)
        .with_context(|| format!("Failed to read content file {}", submit.content_file.display()))
        .inspect_err(|e| error!("{e:#}"))?;

    let request = EditRequest {
        title: submit.page_title,
        content,
        summary: submit.edit_summary,
    };

    if submit.confirm && !confirm_submission(&request, &credentials.username)? {
        info!("Submission cancelled.");
        return Ok(());
    }

    let transport = transport_for(&config)?;
    let retry = RetryPolicy::new(config.max_retries, config.backoff_base);
    let mut session = WikiSession::new(transport, credentials, retry).bot_edit(config.bot_edit);

    let outcome = if args.quiet {
        let spinner = SpinnerObserver::new();
        let result = session.submit(&request, &spinner);
        spinner.finish();
        result
    } else {
        session.submit(&request, &())
    }?;

    match outcome.new_revid {
        Some(revid) => println!("Submitted '{}' (revision {revid})", outcome.title),
        None => println!("Submitted '{}' (no change)", outcome.title),
    }
    Ok(())
}
