//! Purpose: Run the status and fetch stream sessions and combine their verdicts.
//! Exports: `RunMode`, `RunReport`, `run_pair`, `run_streams`.
//! Role: Aggregation step between session outcomes and the process exit code.
//! Invariants: Both sessions always run to a terminal state before the report exists.
//! Invariants: Only the status stream decides success; the fetch verdict is informational.
//! Invariants: Sessions share no mutable state; each returns its own outcome.
use super::remote::{StreamClient, StreamEndpoint};
use crate::core::session::{SessionLimits, SessionOutcome};
use serde_json::{Value, json};
use std::thread;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum RunMode {
    #[default]
    Concurrent,
    Sequential,
}

#[derive(Clone, Debug)]
pub struct RunReport {
    pub status: SessionOutcome,
    pub fetch: SessionOutcome,
}

impl RunReport {
    pub fn status_ok(&self) -> bool {
        self.status.verdict().observed_valid
    }

    pub fn fetch_ok(&self) -> bool {
        self.fetch.verdict().observed_valid
    }

    pub fn exit_code(&self) -> i32 {
        if self.status_ok() { 0 } else { 1 }
    }

    pub fn summary_line(&self) -> String {
        if self.status_ok() {
            format!(
                "SSE validation OK: statusOK={} fetchOK={}",
                self.status_ok(),
                self.fetch_ok()
            )
        } else {
            "SSE validation failed: no valid repo events observed".to_string()
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "statusOK": self.status_ok(),
            "fetchOK": self.fetch_ok(),
            "streams": {
                "status": outcome_json(&self.status),
                "fetch": outcome_json(&self.fetch),
            },
        })
    }
}

fn outcome_json(outcome: &SessionOutcome) -> Value {
    json!({
        "state": outcome.state.label(),
        "ok": outcome.verdict().observed_valid,
        "events": outcome.events_observed,
        "frames": outcome.frames_seen,
        "elapsed_ms": outcome.elapsed.as_millis() as u64,
        "summary": outcome.summary,
        "issue": outcome.last_issue.as_ref().map(ToString::to_string),
        "error": outcome.error,
    })
}

/// Runs both sessions and joins them before building the report.
pub fn run_pair<S, F>(mode: RunMode, status: S, fetch: F) -> RunReport
where
    S: FnOnce() -> SessionOutcome + Send,
    F: FnOnce() -> SessionOutcome + Send,
{
    match mode {
        RunMode::Sequential => {
            let status = status();
            let fetch = fetch();
            RunReport { status, fetch }
        }
        RunMode::Concurrent => thread::scope(|scope| {
            let fetch = scope.spawn(fetch);
            let status = status();
            let fetch = fetch
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
            RunReport { status, fetch }
        }),
    }
}

pub fn run_streams(client: &StreamClient, limits: SessionLimits, mode: RunMode) -> RunReport {
    run_pair(
        mode,
        || client.run_session(StreamEndpoint::Status, limits),
        || client.run_session(StreamEndpoint::Fetch, limits),
    )
}
