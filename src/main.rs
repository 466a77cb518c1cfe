//! Purpose: `ds-sse-validate` CLI entry point.
//! Role: Binary crate root; parses args, resolves config, runs the status and fetch sessions.
//! Invariants: Exit 0 iff the status stream validated, 1 otherwise; fetch never changes it.
//! Invariants: Usage errors exit via `api::to_exit_code` before any connection is made.
//! Invariants: The success line goes to stdout and the failure line to stderr;
//! Invariants: `--json` prints the full report on stdout instead.
#![allow(clippy::result_large_err)]
use std::io::{self, IsTerminal};

use clap::{Parser, error::ErrorKind as ClapErrorKind};
use ds_sse::api::{Error, ErrorKind, RunReport, StreamFilter, run_streams, to_exit_code};
use ds_sse::config::{Config, Overrides};
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "ds-sse-validate",
    version,
    about = "Validate the status and fetch event streams of a local repository service"
)]
struct Cli {
    #[arg(long, help = "Service base URL [env: DS_BASE_URL] (default: http://127.0.0.1:7777)")]
    base_url: Option<String>,
    #[arg(long, help = "Bearer token sent as Authorization header [env: DS_TOKEN]")]
    token: Option<String>,
    #[arg(long, help = "Per-stream deadline in milliseconds [env: SSE_TIMEOUT_MS] (default: 5000)")]
    timeout_ms: Option<u64>,
    #[arg(
        long,
        help = "Complete events inspected per stream before giving up [env: SSE_MAX_EVENTS] (default: 1)"
    )]
    max_events: Option<u64>,
    #[arg(long, help = "Only stream repositories under this directory")]
    path: Option<String>,
    #[arg(long, help = "Only stream repositories owned by this account")]
    account: Option<String>,
    #[arg(long, help = "Only stream repositories with uncommitted changes")]
    dirty: bool,
    #[arg(long, help = "Run the fetch stream after the status stream instead of alongside it")]
    sequential: bool,
    #[arg(long, help = "Print the full report as JSON on stdout")]
    json: bool,
    #[arg(short, long, help = "Log per-event diagnostics to stderr")]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            base_url: self.base_url.clone(),
            token: self.token.clone(),
            timeout_ms: self.timeout_ms,
            max_events: self.max_events,
            filter: StreamFilter {
                path: self.path.clone(),
                account: self.account.clone(),
                dirty: self.dirty,
            },
            sequential: self.sequential,
        }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                return Ok(RunOutcome::ok());
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Run `ds-sse-validate --help` for usage."));
            }
        },
    };

    init_tracing(cli.verbose);

    let config = Config::from_env(cli.overrides())?;
    let client = config.client()?;
    tracing::debug!(
        base_url = %client.base_url(),
        timeout_ms = config.limits.deadline.as_millis() as u64,
        max_events = config.limits.max_events,
        "starting stream validation"
    );

    let report = run_streams(&client, config.limits, config.mode);
    emit_report(&report, cli.json);
    Ok(RunOutcome::with_code(report.exit_code()))
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn emit_report(report: &RunReport, json: bool) {
    if json {
        emit_json(report.to_json());
        return;
    }
    if report.status_ok() {
        println!("{}", report.summary_line());
    } else {
        eprintln!("{}", report.summary_line());
    }
}

fn emit_json(value: Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("error: {}", error_message(err));
        if let Some(hint) = err.hint() {
            eprintln!("hint: {hint}");
        }
        return;
    }

    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::Connection => "connection failed".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(url) = err.url() {
        inner.insert("url".to_string(), json!(url));
    }
    if let Some(status) = err.status() {
        inner.insert("status".to_string(), json!(status));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn clap_error_summary(err: &clap::Error) -> String {
    let rendered = err.to_string();
    rendered
        .lines()
        .find(|line| !line.trim().is_empty())
        .map(|line| line.trim_start_matches("error:").trim().to_string())
        .unwrap_or_else(|| "invalid arguments".to_string())
}
