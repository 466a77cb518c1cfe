//! Purpose: Define the public Rust API boundary for the stream validator.
//! Exports: Core types plus the HTTP stream client and the two-stream runner.
//! Role: Stable surface used by the CLI and integration tests.
//! Invariants: Internal session bookkeeping stays private to `core::session`.

mod remote;
mod runner;

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::event::{Event, parse_event};
pub use crate::core::frame::{FrameDecoder, FrameReader};
pub use crate::core::session::{
    SessionLimits, SessionOutcome, SessionState, StreamVerdict, run_session,
};
pub use crate::core::validate::{
    FetchResult, PayloadIssue, PayloadKind, RepoStatus, validate_fetch, validate_repo,
};
pub use remote::{DEFAULT_BASE_URL, StreamBody, StreamClient, StreamEndpoint, StreamFilter};
pub use runner::{RunMode, RunReport, run_pair, run_streams};
