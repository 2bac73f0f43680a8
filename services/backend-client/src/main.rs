//! Backend client CLI
//!
//! Command-line front end for the backend API:
//! 1. Loads config and the persisted session
//! 2. Runs one command through the authenticated request executor
//! 3. Prints the result as JSON on stdout
//!
//! Exit codes: 0 success, 1 failure (`code: message` on stderr),
//! 2 when the user has to sign in or subscribe first.

mod api;
mod config;
mod notifier;
mod session;

#[cfg(test)]
mod test_support;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use session_client::CallError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::IssueReport;
use crate::config::Config;
use crate::notifier::ConsoleNotifier;
use crate::session::Session;

const USAGE: &str = "usage: backend-client [--config PATH] <command>

commands:
  synonyms WORD...                         look up synonyms
  folders                                  list saved folders
  coupons                                  list available coupons
  settings-get                             print synced settings
  settings-put FILE                        upload settings from a JSON file
  report-issue TITLE DESCRIPTION [URL]     send a problem report
  login                                    sign in with BACKEND_ACCESS_TOKEN / BACKEND_REFRESH_TOKEN
  logout                                   forget stored credentials
  status                                   show session state";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Synonyms(Vec<String>),
    Folders,
    Coupons,
    SettingsGet,
    SettingsPut(PathBuf),
    ReportIssue {
        title: String,
        description: String,
        page_url: Option<String>,
    },
    Login,
    Logout,
    Status,
}

#[derive(Debug, PartialEq, Eq)]
struct Cli {
    config_path: Option<String>,
    command: Command,
}

/// Parse `[--config PATH] <command> [args...]` (program name already stripped).
fn parse_args(args: &[String]) -> Result<Cli> {
    let mut config_path = None;
    let mut rest = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let path = iter.next().context("--config requires a path")?;
            config_path = Some(path.clone());
        } else {
            rest.push(arg.clone());
        }
    }

    let Some((name, params)) = rest.split_first() else {
        bail!("missing command\n\n{USAGE}");
    };

    let command = match (name.as_str(), params) {
        ("synonyms", []) => bail!("synonyms needs at least one word"),
        ("synonyms", words) => Command::Synonyms(words.to_vec()),
        ("folders", []) => Command::Folders,
        ("coupons", []) => Command::Coupons,
        ("settings-get", []) => Command::SettingsGet,
        ("settings-put", [file]) => Command::SettingsPut(PathBuf::from(file)),
        ("report-issue", [title, description]) => Command::ReportIssue {
            title: title.clone(),
            description: description.clone(),
            page_url: None,
        },
        ("report-issue", [title, description, url]) => Command::ReportIssue {
            title: title.clone(),
            description: description.clone(),
            page_url: Some(url.clone()),
        },
        ("login", []) => Command::Login,
        ("logout", []) => Command::Logout,
        ("status", []) => Command::Status,
        _ => bail!("invalid command: {}\n\n{USAGE}", rest.join(" ")),
    };

    Ok(Cli {
        config_path,
        command,
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    // JSON logs on stderr, LOG_LEVEL / RUST_LOG support; stdout carries results
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!(error = %format!("{e:#}"), "command failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<u8> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_args(&args)?;

    let config_path = Config::resolve_path(cli.config_path.as_deref());
    info!(path = %config_path.display(), "loading configuration");
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let session = Session::open(&config, Arc::new(ConsoleNotifier::default())).await?;

    // Ctrl-C aborts the in-flight request instead of killing the process
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling request");
            on_interrupt.cancel();
        }
    });

    let backend = session.backend();
    let code = match cli.command {
        Command::Synonyms(words) => {
            print_outcome(backend.synonyms().lookup(&words, &cancel).await)
        }
        Command::Folders => print_outcome(backend.folders().list(&cancel).await),
        Command::Coupons => print_outcome(backend.coupons().list(&cancel).await),
        Command::SettingsGet => print_outcome(backend.settings().fetch(&cancel).await),
        Command::SettingsPut(path) => {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let settings: serde_json::Value = serde_json::from_str(&contents)
                .with_context(|| format!("{} is not valid JSON", path.display()))?;
            print_outcome(backend.settings().save(settings, &cancel).await)
        }
        Command::ReportIssue {
            title,
            description,
            page_url,
        } => {
            let report = IssueReport {
                title,
                description,
                page_url,
            };
            print_outcome(backend.issues().report(&report, &cancel).await)
        }
        Command::Login => {
            let Some(tokens) = config.login_tokens()? else {
                bail!("no access token: set BACKEND_ACCESS_TOKEN or [session].access_token_file");
            };
            session.login(tokens).await?;
            print_outcome(Ok::<_, CallError>(session.status().await))
        }
        Command::Logout => {
            session.logout().await?;
            print_outcome(Ok::<_, CallError>(session.status().await))
        }
        Command::Status => print_outcome(Ok::<_, CallError>(session.status().await)),
    };

    Ok(code)
}

const EXIT_SUCCESS: u8 = 0;
const EXIT_FAILURE: u8 = 1;
const EXIT_PROMPT: u8 = 2;

/// Render a call result and pick the exit code.
fn print_outcome<T: Serialize>(result: Result<T, CallError>) -> u8 {
    match result {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(json) => {
                println!("{json}");
                EXIT_SUCCESS
            }
            Err(e) => {
                eprintln!("OUTPUT_ERROR: {e}");
                EXIT_FAILURE
            }
        },
        // The console notifier has already shown the prompt
        Err(CallError::LoginRequired | CallError::SubscriptionRequired) => EXIT_PROMPT,
        Err(CallError::Failed(e)) => {
            eprintln!("{e}");
            EXIT_FAILURE
        }
        Err(CallError::Decode(message)) => {
            eprintln!("DECODE_ERROR: {message}");
            EXIT_FAILURE
        }
    }
}
